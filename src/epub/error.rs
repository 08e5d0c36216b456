use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EpubError>;

/// Epub打包与审计过程中的错误类型
///
/// 这里只包含导致操作无法继续的致命错误。
/// 清单缺失文件、孤立文件等结构性问题作为审计结果返回，而不是错误。
#[derive(Error, Debug)]
pub enum EpubError {
    #[error("IO错误: {0}")]
    Io(#[from] io::Error),

    #[error("Zip文件错误: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML解析错误: {0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("项目目录不存在: {}", .0.display())]
    MissingRoot(PathBuf),

    #[error("找不到清单文件: {}", .0.display())]
    MissingManifest(PathBuf),

    #[error("缺少mimetype文件")]
    MissingMimetype,

    #[error("无效的mimetype: {expected}, 找到: {found}")]
    InvalidMimetype { expected: String, found: String },

    #[error("container.xml解析错误: {0}")]
    ContainerParseError(String),

    #[error("OPF文件解析错误: {0}")]
    OpfParseError(String),

    #[error("配置文件错误: {0}")]
    ConfigError(String),

    #[error("报告写入错误: {0}")]
    Report(String),
}
