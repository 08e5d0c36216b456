pub mod epub;

// === 核心API重新导出 ===

/// 打包器与审计器（主要接口）
pub use epub::{ManifestAuditor, PackageBuilder};

/// 完整的修复流程
pub use epub::{EpubFixer, FixOutcome};

/// 错误处理
pub use epub::{EpubError, Result};

// === 数据结构 ===

/// 审计结果
pub use epub::{AuditResult, AuditSummary, Defect, DefectKind};

/// 阅读顺序比较器
pub use epub::{LeadingOrdinal, OrderingComparator};

/// 报告接收器
pub use epub::{LogSink, MemorySink, Record, RecordKind, ReportSink, Severity};

/// 文件名规范化
pub use epub::{RenameMapping, normalize_filename};

// === 底层组件（高级用法） ===

/// 容器与归档组件
pub use epub::{Container, DEFAULT_ARCHIVE_NAME, PackageArchive, PackageTree, RootFile};

/// OPF组件
pub use epub::{BookMap, ManifestItem, Metadata, Opf, ResourceKind, SpineItem};

// === 库信息 ===

/// epubforge库的版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// epubforge库的描述
pub const DESCRIPTION: &str = "EPUB打包与清单审计工具";

// === 便捷函数 ===

/// 审计一个已整理好的EPUB目录
///
/// 这是 `ManifestAuditor::new(path).audit()` 的便捷包装函数。
///
/// # 示例
///
/// ```no_run
/// let result = epubforge::audit("book")?;
/// println!("{}", result.render_text());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn audit<P: AsRef<std::path::Path>>(root: P) -> Result<AuditResult> {
    ManifestAuditor::new(root.as_ref()).audit()
}

/// 打开并校验EPUB归档
pub fn open<P: AsRef<std::path::Path>>(path: P) -> Result<PackageArchive> {
    PackageArchive::open(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_description() {
        assert!(!DESCRIPTION.is_empty());
    }

    #[test]
    fn test_audit_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent");
        assert!(matches!(audit(&missing), Err(EpubError::MissingRoot(_))));
    }
}
