//! EPUB归档读取与校验
//!
//! 重新打开打包生成的归档，检查OCF要求的mimetype条目，并提供条目读取。

use std::fs::File;
use std::io::Read;
use std::path::Path;
use zip::{CompressionMethod, ZipArchive};

use crate::epub::builder::EPUB_MIMETYPE;
use crate::epub::container::{CONTAINER_PATH, Container};
use crate::epub::error::{EpubError, Result};
use crate::epub::lint::megabytes;
use crate::epub::opf::Opf;
use crate::epub::report::{ReportSink, Severity};

/// 归档大小的警告阈值
pub const MAX_ARCHIVE_BYTES: u64 = 50 * 1024 * 1024;

/// 检查归档文件大小
///
/// 超过 [`MAX_ARCHIVE_BYTES`] 时记一条警告，不视为错误。
///
/// # 返回值
/// * `Result<u64>` - 归档的字节数
pub fn check_archive_size(path: &Path, sink: &mut dyn ReportSink) -> Result<u64> {
    let size = std::fs::metadata(path)?.len();
    log::info!("EPUB大小: {:.2}MB", megabytes(size));

    if size > MAX_ARCHIVE_BYTES {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        sink.issue(
            Severity::Warning,
            &name,
            &format!("EPUB过大: {:.2}MB，建议优化", megabytes(size)),
        );
    }

    Ok(size)
}

/// 已校验的EPUB归档
pub struct PackageArchive {
    archive: ZipArchive<File>,
}

impl PackageArchive {
    /// 打开并校验归档
    ///
    /// # 参数
    /// * `path` - epub文件的路径
    ///
    /// # 返回值
    /// * `Result<PackageArchive>` - mimetype条目不合规时返回错误
    pub fn open<P: AsRef<Path>>(path: P) -> Result<PackageArchive> {
        let file = File::open(path)?;
        let archive = ZipArchive::new(file)?;

        let mut package = PackageArchive { archive };
        package.validate()?;

        Ok(package)
    }

    /// 校验mimetype条目
    ///
    /// 检查步骤：
    /// 1. 第一个条目必须名为mimetype
    /// 2. 该条目不能压缩
    /// 3. 内容必须为"application/epub+zip"
    fn validate(&mut self) -> Result<()> {
        if self.archive.is_empty() {
            return Err(EpubError::MissingMimetype);
        }

        let mut first = self.archive.by_index(0)?;
        if first.name() != "mimetype" {
            return Err(EpubError::MissingMimetype);
        }

        let mut content = String::new();
        first.read_to_string(&mut content)?;

        if content != EPUB_MIMETYPE {
            return Err(EpubError::InvalidMimetype {
                expected: EPUB_MIMETYPE.to_string(),
                found: content,
            });
        }

        if first.compression() != CompressionMethod::Stored {
            return Err(EpubError::InvalidMimetype {
                expected: "未压缩的mimetype条目".to_string(),
                found: format!("{:?}", first.compression()),
            });
        }

        log::debug!("mimetype条目校验通过");
        Ok(())
    }

    /// 列出归档中的所有条目，保持写入顺序
    pub fn list_files(&mut self) -> Result<Vec<String>> {
        let mut files = Vec::with_capacity(self.archive.len());

        for i in 0..self.archive.len() {
            let file = self.archive.by_index(i)?;
            files.push(file.name().to_string());
        }

        Ok(files)
    }

    /// 提取指定条目的文本内容
    pub fn extract_file(&mut self, filename: &str) -> Result<String> {
        let mut file = self.archive.by_name(filename)?;
        let mut content = String::new();
        file.read_to_string(&mut content)?;
        Ok(content)
    }

    /// 解析META-INF/container.xml
    pub fn parse_container(&mut self) -> Result<Container> {
        let container_content = self.extract_file(CONTAINER_PATH)?;
        Container::parse_xml(&container_content)
    }

    /// 容器中登记的OPF路径
    pub fn opf_path(&mut self) -> Result<String> {
        let container = self.parse_container()?;

        container.get_opf_path().ok_or_else(|| {
            EpubError::ContainerParseError("container.xml中没有找到有效的rootfile".to_string())
        })
    }

    /// 解析归档中的OPF
    pub fn parse_opf(&mut self) -> Result<Opf> {
        let opf_path = self.opf_path()?;
        let opf_content = self.extract_file(&opf_path)?;
        Opf::parse_xml(&opf_content)
    }
}
