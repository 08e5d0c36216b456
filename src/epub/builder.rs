//! EPUB打包模块
//!
//! [`PackageBuilder`] 把项目目录中的散落文件整理为标准的OEBPS目录结构，
//! 生成content.opf与container.xml，并打包为EPUB归档。

use crate::epub::container::{CONTAINER_PATH, Container};
use crate::epub::error::{EpubError, Result};
use crate::epub::fs::{collect_files, relative_href};
use crate::epub::opf::{ManifestItem, Metadata, Opf, ResourceKind, SpineItem};
use crate::epub::report::ReportSink;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// EPUB的mimetype内容
pub const EPUB_MIMETYPE: &str = "application/epub+zip";

/// 内容根目录名
pub const OEBPS_DIR: &str = "OEBPS";

/// 清单文件名
pub const OPF_FILE: &str = "content.opf";

/// 默认的归档文件名
pub const DEFAULT_ARCHIVE_NAME: &str = "curls-and-contemplation.epub";

/// 标准EPUB目录结构
///
/// `root` 为项目目录，内容位于 `root/OEBPS`，容器描述位于 `root/META-INF`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageTree {
    root: PathBuf,
}

impl PackageTree {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// 项目目录
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// OEBPS目录，清单中的href相对于此目录
    pub fn oebps_dir(&self) -> PathBuf {
        self.root.join(OEBPS_DIR)
    }

    /// 指定资源类型的子目录
    pub fn kind_dir(&self, kind: ResourceKind) -> PathBuf {
        self.oebps_dir().join(kind.dir_name())
    }

    /// content.opf路径
    pub fn opf_path(&self) -> PathBuf {
        self.oebps_dir().join(OPF_FILE)
    }

    /// META-INF/container.xml路径
    pub fn container_path(&self) -> PathBuf {
        self.root.join(CONTAINER_PATH)
    }

    /// mimetype文件路径
    pub fn mimetype_path(&self) -> PathBuf {
        self.root.join("mimetype")
    }

    /// container.xml中记录的OPF路径
    pub fn opf_full_path() -> String {
        format!("{}/{}", OEBPS_DIR, OPF_FILE)
    }
}

/// EPUB打包器
#[derive(Debug, Clone)]
pub struct PackageBuilder {
    source_dir: PathBuf,
}

impl PackageBuilder {
    /// 创建打包器
    ///
    /// # 参数
    /// * `source_dir` - 存放散落源文件的项目目录，输出的OEBPS也位于其中
    pub fn new<P: Into<PathBuf>>(source_dir: P) -> Self {
        Self {
            source_dir: source_dir.into(),
        }
    }

    /// 输出的目录结构
    pub fn tree(&self) -> PackageTree {
        PackageTree::new(&self.source_dir)
    }

    /// 把源文件复制到对应的类型子目录
    ///
    /// 目标文件已存在时不会覆盖：内容相同则静默跳过，
    /// 内容不同则作为冲突通过 `sink` 报告。重复执行结果不变。
    pub fn organize(&self, sink: &mut dyn ReportSink) -> Result<PackageTree> {
        if !self.source_dir.is_dir() {
            return Err(EpubError::MissingRoot(self.source_dir.clone()));
        }

        let tree = self.tree();
        for kind in ResourceKind::ALL {
            fs::create_dir_all(tree.kind_dir(kind))?;
        }

        let mut sources = Vec::new();
        for entry in fs::read_dir(&self.source_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                sources.push(entry.path());
            }
        }
        sources.sort();

        for source in sources {
            let Some(kind) = ResourceKind::from_path(&source) else {
                continue;
            };
            let Some(file_name) = source.file_name() else {
                continue;
            };
            let dest = tree.kind_dir(kind).join(file_name);
            let display_name = file_name.to_string_lossy();

            if dest.exists() {
                if fs::read(&dest)? != fs::read(&source)? {
                    sink.skip(
                        &display_name,
                        &format!(
                            "Not copied: {}/{} already exists with different content",
                            kind.dir_name(),
                            display_name
                        ),
                    );
                } else {
                    log::debug!("{} 已存在，跳过", dest.display());
                }
                continue;
            }

            fs::copy(&source, &dest)?;
            log::debug!("复制 {} -> {}", source.display(), dest.display());
        }

        Ok(tree)
    }

    /// 根据目录内容生成清单
    ///
    /// 每个类型子目录按文件名排序后依次编号；脊柱按相同顺序包含全部文档，
    /// 即文件名顺序就是阅读顺序。
    pub fn build_manifest(&self, tree: &PackageTree, metadata: Metadata) -> Result<Opf> {
        let mut opf = Opf::new(metadata);
        let oebps_dir = tree.oebps_dir();

        for kind in ResourceKind::ALL {
            let dir = tree.kind_dir(kind);
            if !dir.is_dir() {
                continue;
            }

            let files = collect_files(&dir)?
                .into_iter()
                .filter(|path| belongs_to(kind, path));

            for (index, path) in files.enumerate() {
                let Some(href) = relative_href(&oebps_dir, &path) else {
                    continue;
                };
                let id = kind.item_id(index + 1);
                if kind == ResourceKind::Text {
                    opf.spine.push(SpineItem::new(id.clone()));
                }
                opf.manifest.push(ManifestItem::new(
                    id,
                    href,
                    kind.media_type(&path).to_string(),
                ));
            }
        }

        Ok(opf)
    }

    /// 写入content.opf
    pub fn write_manifest(
        &self,
        tree: &PackageTree,
        opf: &Opf,
        sink: &mut dyn ReportSink,
    ) -> Result<PathBuf> {
        let path = tree.opf_path();
        fs::create_dir_all(tree.oebps_dir())?;
        fs::write(&path, opf.to_xml())?;
        sink.fix(OPF_FILE, "Created EPUB manifest file");
        Ok(path)
    }

    /// 写入mimetype与META-INF/container.xml
    pub fn write_container(&self, tree: &PackageTree) -> Result<()> {
        let container_path = tree.container_path();
        if let Some(parent) = container_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let container = Container::for_opf(&PackageTree::opf_full_path());
        fs::write(&container_path, container.to_xml())?;
        fs::write(tree.mimetype_path(), EPUB_MIMETYPE)?;
        Ok(())
    }

    /// 打包为EPUB归档
    ///
    /// 条目顺序：`mimetype`（不压缩）、`META-INF/container.xml`、OEBPS下的全部文件。
    /// 归档先写入同目录下的临时文件，全部成功后才移动到 `output`；
    /// 任何一步失败都会删除临时文件并返回错误。
    pub fn package(
        &self,
        tree: &PackageTree,
        output: &Path,
        sink: &mut dyn ReportSink,
    ) -> Result<PathBuf> {
        let oebps_dir = tree.oebps_dir();
        if !oebps_dir.is_dir() {
            return Err(EpubError::MissingRoot(oebps_dir));
        }

        let file_name = output
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_ARCHIVE_NAME.to_string());
        let partial = output.with_file_name(format!(".{}.partial", file_name));

        if let Err(e) = write_archive(tree, &partial) {
            let _ = fs::remove_file(&partial);
            return Err(e);
        }
        if let Err(e) = fs::rename(&partial, output) {
            let _ = fs::remove_file(&partial);
            return Err(e.into());
        }

        sink.fix("EPUB", &format!("Created package: {}", output.display()));
        Ok(output.to_path_buf())
    }
}

/// 判断子目录中的文件是否属于该类型
///
/// images目录接受任意文件（无法识别的扩展名使用默认媒体类型），
/// 其他目录只接受对应扩展名。
fn belongs_to(kind: ResourceKind, path: &Path) -> bool {
    match kind {
        ResourceKind::Image => true,
        _ => ResourceKind::from_path(path) == Some(kind),
    }
}

fn write_archive(tree: &PackageTree, destination: &Path) -> Result<()> {
    let file = File::create(destination)?;
    let mut zip = ZipWriter::new(file);

    let options_stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let options_deflate =
        SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file("mimetype", options_stored)?;
    zip.write_all(EPUB_MIMETYPE.as_bytes())?;

    zip.start_file(CONTAINER_PATH, options_deflate)?;
    let container_path = tree.container_path();
    if container_path.is_file() {
        io::copy(&mut File::open(&container_path)?, &mut zip)?;
    } else {
        let container = Container::for_opf(&PackageTree::opf_full_path());
        zip.write_all(container.to_xml().as_bytes())?;
    }

    for path in collect_files(&tree.oebps_dir())? {
        let Some(href) = relative_href(tree.root(), &path) else {
            continue;
        };
        zip.start_file(href, options_deflate)?;
        io::copy(&mut File::open(&path)?, &mut zip)?;
    }

    zip.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epub::report::MemorySink;
    use std::collections::HashSet;
    use std::io::Read;
    use zip::ZipArchive;

    fn sample_project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("2-introduction.xhtml"), "<html>intro</html>").unwrap();
        fs::write(root.join("1-cover.xhtml"), "<html>cover</html>").unwrap();
        fs::write(root.join("style.css"), "body {}").unwrap();
        fs::write(root.join("fonts.css"), "@font-face {}").unwrap();
        fs::write(root.join("lora.woff2"), [0u8, 1, 2]).unwrap();
        fs::write(root.join("cover.JPG"), [0xffu8, 0xd8]).unwrap();
        fs::write(root.join("logo.png"), [0x89u8, 0x50]).unwrap();
        fs::write(root.join("book-map.yaml"), "book: {}").unwrap();
        dir
    }

    fn snapshot(tree: &PackageTree) -> Vec<(String, Vec<u8>)> {
        collect_files(&tree.oebps_dir())
            .unwrap()
            .into_iter()
            .map(|path| {
                let href = relative_href(&tree.oebps_dir(), &path).unwrap();
                (href, fs::read(path).unwrap())
            })
            .collect()
    }

    #[test]
    fn test_organize_sorts_files_by_type() {
        let dir = sample_project();
        let mut sink = MemorySink::new();
        let tree = PackageBuilder::new(dir.path()).organize(&mut sink).unwrap();

        let hrefs: Vec<String> = snapshot(&tree).into_iter().map(|(href, _)| href).collect();
        assert_eq!(
            hrefs,
            vec![
                "fonts/lora.woff2",
                "images/cover.JPG",
                "images/logo.png",
                "styles/fonts.css",
                "styles/style.css",
                "text/1-cover.xhtml",
                "text/2-introduction.xhtml",
            ]
        );
        assert!(sink.is_empty());
    }

    #[test]
    fn test_organize_is_idempotent() {
        let dir = sample_project();
        let builder = PackageBuilder::new(dir.path());
        let mut sink = MemorySink::new();

        let tree = builder.organize(&mut sink).unwrap();
        let first = snapshot(&tree);
        builder.organize(&mut sink).unwrap();
        let second = snapshot(&tree);

        assert_eq!(first, second);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_organize_never_overwrites_and_reports_collision() {
        let dir = sample_project();
        let builder = PackageBuilder::new(dir.path());
        let mut sink = MemorySink::new();
        let tree = builder.organize(&mut sink).unwrap();

        fs::write(dir.path().join("style.css"), "body { color: red }").unwrap();
        builder.organize(&mut sink).unwrap();

        let kept = fs::read_to_string(tree.kind_dir(ResourceKind::Style).join("style.css")).unwrap();
        assert_eq!(kept, "body {}");
        assert_eq!(sink.skips().count(), 1);
    }

    #[test]
    fn test_organize_missing_source_dir() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let mut sink = MemorySink::new();
        assert!(matches!(
            PackageBuilder::new(&missing).organize(&mut sink),
            Err(EpubError::MissingRoot(_))
        ));
    }

    #[test]
    fn test_build_manifest_ids_and_spine() {
        let dir = sample_project();
        let builder = PackageBuilder::new(dir.path());
        let mut sink = MemorySink::new();
        let tree = builder.organize(&mut sink).unwrap();
        let opf = builder.build_manifest(&tree, Metadata::default()).unwrap();

        let ids: Vec<&str> = opf.manifest.iter().map(|item| item.id.as_str()).collect();
        assert_eq!(ids, vec!["text001", "text002", "css1", "css2", "font1", "img1", "img2"]);

        let unique: HashSet<&str> = ids.iter().copied().collect();
        assert_eq!(unique.len(), ids.len());

        let spine: Vec<&str> = opf.spine.iter().map(|item| item.idref.as_str()).collect();
        assert_eq!(spine, vec!["text001", "text002"]);
        assert_eq!(opf.get_manifest_item("text001").unwrap().href, "text/1-cover.xhtml");

        let cover = opf.get_manifest_item("img1").unwrap();
        assert_eq!(cover.href, "images/cover.JPG");
        assert_eq!(cover.media_type, "image/jpeg");
        assert_eq!(opf.get_manifest_item("font1").unwrap().media_type, "font/woff2");
    }

    #[test]
    fn test_package_writes_mimetype_first_and_stored() {
        let dir = sample_project();
        let builder = PackageBuilder::new(dir.path());
        let mut sink = MemorySink::new();
        let tree = builder.organize(&mut sink).unwrap();
        let opf = builder.build_manifest(&tree, Metadata::default()).unwrap();
        builder.write_manifest(&tree, &opf, &mut sink).unwrap();
        builder.write_container(&tree).unwrap();

        let output = dir.path().join(DEFAULT_ARCHIVE_NAME);
        builder.package(&tree, &output, &mut sink).unwrap();

        let mut archive = ZipArchive::new(File::open(&output).unwrap()).unwrap();
        {
            let mut first = archive.by_index(0).unwrap();
            assert_eq!(first.name(), "mimetype");
            assert_eq!(first.compression(), CompressionMethod::Stored);
            let mut content = String::new();
            first.read_to_string(&mut content).unwrap();
            assert_eq!(content, EPUB_MIMETYPE);
        }
        assert_eq!(archive.by_index(1).unwrap().name(), CONTAINER_PATH);
        assert!(archive.by_name("OEBPS/content.opf").is_ok());
        assert!(archive.by_name("OEBPS/text/1-cover.xhtml").is_ok());
        assert!(archive.by_name("book-map.yaml").is_err());

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".partial"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_package_failure_leaves_no_archive() {
        let dir = sample_project();
        let builder = PackageBuilder::new(dir.path());
        let mut sink = MemorySink::new();
        let tree = builder.organize(&mut sink).unwrap();

        let output = dir.path().join("missing-dir").join("book.epub");
        assert!(builder.package(&tree, &output, &mut sink).is_err());
        assert!(!output.exists());
        assert_eq!(sink.fixes().count(), 0);
    }

    #[test]
    fn test_package_requires_oebps() {
        let dir = tempfile::tempdir().unwrap();
        let builder = PackageBuilder::new(dir.path());
        let mut sink = MemorySink::new();
        let output = dir.path().join("book.epub");
        assert!(matches!(
            builder.package(&builder.tree(), &output, &mut sink),
            Err(EpubError::MissingRoot(_))
        ));
    }
}
