pub mod archive;
pub mod audit;
pub mod builder;
pub mod container;
pub mod error;
pub mod fixer;
pub mod fs;
pub mod lint;
pub mod markup;
pub mod normalize;
pub mod opf;
pub mod patch;
pub mod report;

// 重新导出错误处理
pub use error::{EpubError, Result};

// 重新导出容器相关
pub use container::{Container, RootFile};

// 重新导出归档读取
pub use archive::PackageArchive;

// 重新导出打包相关
pub use builder::{DEFAULT_ARCHIVE_NAME, EPUB_MIMETYPE, PackageBuilder, PackageTree};

// 重新导出审计相关
pub use audit::{
    AuditResult,
    AuditSummary,
    Defect,
    DefectKind,
    LeadingOrdinal,
    ManifestAuditor,
    OrderingComparator,
};

// 重新导出源文件处理
pub use fixer::{EpubFixer, FixOutcome};
pub use lint::{Diagnostic, LintSummary};
pub use markup::MarkupFix;
pub use normalize::{RenameMapping, normalize_filename};

// 重新导出报告
pub use report::{LogSink, MemorySink, Record, RecordKind, ReportSink, Severity};

// 重新导出OPF相关
pub use opf::{
    BookMap,
    Metadata,
    ManifestItem,
    Opf,
    ResourceKind,
    SpineItem,
};
