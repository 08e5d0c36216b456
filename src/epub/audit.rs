//! 清单与脊柱审计模块
//!
//! [`ManifestAuditor`] 只读地检查一个EPUB目录结构与其content.opf是否一致：
//!
//! 1. 清单中的每个href都指向存在的文件；
//! 2. 磁盘上的每个文件都出现在清单中（孤立文件只作为警告）；
//! 3. 脊柱中的每个idref都能在清单中找到，且文件名序号不递减（顺序问题只作为警告）。
//!
//! 所有逐项问题都收集在 [`AuditResult`] 中，只有前置条件失败（目录或清单不存在、
//! 清单无法解析）才返回错误。

use crate::epub::builder::{OEBPS_DIR, OPF_FILE};
use crate::epub::container::{CONTAINER_PATH, Container};
use crate::epub::error::{EpubError, Result};
use crate::epub::fs::{collect_files, relative_href};
use crate::epub::opf::{ManifestItem, Opf};
use crate::epub::report::Severity;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// 问题类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DefectKind {
    /// 清单引用的文件不存在
    MissingFile,
    /// 磁盘上存在但未列入清单的文件
    Orphan,
    /// 脊柱引用了清单中不存在的ID
    UnknownIdref,
    /// 清单中出现重复ID
    DuplicateId,
    /// 脊柱中的文件序号出现倒退
    ReadingOrder,
}

/// 一个审计问题
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Defect {
    pub kind: DefectKind,
    pub severity: Severity,
    /// 问题对象：href、文件路径或idref
    pub subject: String,
    pub message: String,
}

impl Defect {
    fn new(kind: DefectKind, severity: Severity, subject: &str, message: String) -> Self {
        Self {
            kind,
            severity,
            subject: subject.to_string(),
            message,
        }
    }

    /// 是否为导致审计失败的硬性问题
    pub fn is_hard(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Defect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// 审计统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditSummary {
    pub manifest_items: usize,
    pub spine_items: usize,
    /// 脊柱中指向XHTML文档的项数
    pub spine_documents: usize,
    /// OPF目录下的文件数（不含OPF本身）
    pub files_on_disk: usize,
}

/// 审计结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditResult {
    pub missing: Vec<Defect>,
    pub orphans: Vec<Defect>,
    pub spine_issues: Vec<Defect>,
    pub summary: AuditSummary,
}

impl AuditResult {
    /// 审计是否通过
    ///
    /// 没有缺失文件且脊柱中没有硬性问题时通过。孤立文件与阅读顺序问题不影响结果。
    pub fn passed(&self) -> bool {
        self.missing.is_empty() && !self.spine_issues.iter().any(Defect::is_hard)
    }

    /// 按检查顺序列出全部问题
    pub fn issues(&self) -> impl Iterator<Item = &Defect> {
        self.missing
            .iter()
            .chain(self.orphans.iter())
            .chain(self.spine_issues.iter())
    }

    /// 阅读顺序问题
    pub fn reading_order_issues(&self) -> impl Iterator<Item = &Defect> {
        self.spine_issues
            .iter()
            .filter(|defect| defect.kind == DefectKind::ReadingOrder)
    }

    /// 生成文本报告
    pub fn render_text(&self) -> String {
        let mut report = String::from("MANIFEST & SPINE AUDIT REPORT\n");
        report.push_str(&"=".repeat(50));
        report.push_str("\n\n");

        let issues: Vec<&Defect> = self.issues().collect();
        if issues.is_empty() {
            report.push_str("✅ AUDIT PASSED - No issues found\n\n");
            report.push_str("All manifest entries correspond to existing files\n");
            report.push_str("No orphan files detected\n");
            report.push_str("Spine references are valid and in correct order\n");
        } else {
            let verdict = if self.passed() { "PASSED WITH WARNINGS" } else { "FAILED" };
            report.push_str(&format!(
                "{} AUDIT {} - {} ISSUES\n\n",
                if self.passed() { "⚠️" } else { "❌" },
                verdict,
                issues.len()
            ));
            for (i, issue) in issues.iter().enumerate() {
                report.push_str(&format!("{}. [{}] {}\n", i + 1, issue.severity, issue));
            }
        }

        let summary = &self.summary;
        report.push_str(&format!(
            "\nManifest items: {}\nSpine items: {}\nXHTML files in spine: {}\nFiles on disk: {}\n",
            summary.manifest_items, summary.spine_items, summary.spine_documents, summary.files_on_disk
        ));
        report
    }

    /// 生成JSON报告
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| EpubError::Report(e.to_string()))
    }
}

/// 阅读顺序比较器
///
/// 从清单项中提取序号；审计器要求脊柱中相邻的两个有序号的项满足
/// [`OrderingComparator::in_order`]。不同命名约定的项目可以提供自己的实现。
pub trait OrderingComparator {
    /// 提取序号，无法提取时返回 `None`（该项不参与顺序检查）
    fn ordinal(&self, item: &ManifestItem) -> Option<u64>;

    /// `current` 是否可以排在 `previous` 之后
    fn in_order(&self, previous: u64, current: u64) -> bool {
        current >= previous
    }
}

/// 默认比较器：取 `text/` 下文件名开头的数字作为序号
///
/// 数字之后必须是 `-` 或 `.`，例如 `text/12-chapter.xhtml` 的序号是12，
/// `text/12intro.xhtml` 没有序号。
#[derive(Debug, Clone)]
pub struct LeadingOrdinal {
    prefix: String,
}

impl Default for LeadingOrdinal {
    fn default() -> Self {
        Self::with_prefix("text/")
    }
}

impl LeadingOrdinal {
    /// 只检查href以 `prefix` 开头的项
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
        }
    }
}

impl OrderingComparator for LeadingOrdinal {
    fn ordinal(&self, item: &ManifestItem) -> Option<u64> {
        let file_name = item.href.strip_prefix(self.prefix.as_str())?;
        let digits_end = file_name
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(file_name.len());
        if digits_end == 0 {
            return None;
        }
        match file_name[digits_end..].chars().next() {
            None | Some('-') | Some('.') => file_name[..digits_end].parse().ok(),
            _ => None,
        }
    }
}

/// 清单与脊柱审计器
pub struct ManifestAuditor {
    root: PathBuf,
    comparator: Box<dyn OrderingComparator>,
}

impl fmt::Debug for ManifestAuditor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManifestAuditor").field("root", &self.root).finish()
    }
}

impl ManifestAuditor {
    /// 创建审计器
    ///
    /// # 参数
    /// * `root` - EPUB目录结构的根目录（包含OEBPS与META-INF）
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            comparator: Box::new(LeadingOrdinal::default()),
        }
    }

    /// 替换阅读顺序比较器
    pub fn with_comparator<C: OrderingComparator + 'static>(mut self, comparator: C) -> Self {
        self.comparator = Box::new(comparator);
        self
    }

    /// 定位content.opf
    ///
    /// 优先使用META-INF/container.xml中的rootfile，无法读取时使用 `OEBPS/content.opf`。
    pub fn locate_opf(&self) -> PathBuf {
        let container_path = self.root.join(CONTAINER_PATH);
        if let Ok(content) = fs::read_to_string(&container_path) {
            match Container::parse_xml(&content) {
                Ok(container) => {
                    if let Some(opf_path) = container.get_opf_path() {
                        return self.root.join(opf_path);
                    }
                }
                Err(e) => log::warn!("{} 无法解析，使用默认OPF路径: {}", CONTAINER_PATH, e),
            }
        }
        self.root.join(OEBPS_DIR).join(OPF_FILE)
    }

    /// 执行全部检查
    pub fn audit(&self) -> Result<AuditResult> {
        if !self.root.is_dir() {
            return Err(EpubError::MissingRoot(self.root.clone()));
        }

        let opf_path = self.locate_opf();
        if !opf_path.is_file() {
            return Err(EpubError::MissingManifest(opf_path));
        }
        let opf = Opf::parse_xml(&fs::read_to_string(&opf_path)?)?;
        let base_dir = opf_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());

        let mut result = AuditResult {
            missing: self.check_manifest_files(&opf, &base_dir),
            ..AuditResult::default()
        };
        let files_on_disk = self.check_orphan_files(&opf, &base_dir, &opf_path, &mut result)?;
        self.check_spine_integrity(&opf, &mut result);

        result.summary.manifest_items = opf.manifest.len();
        result.summary.spine_items = opf.spine.len();
        result.summary.files_on_disk = files_on_disk;

        log::info!(
            "审计完成: 缺失 {}，孤立 {}，脊柱问题 {}",
            result.missing.len(),
            result.orphans.len(),
            result.spine_issues.len()
        );
        Ok(result)
    }

    /// 检查清单项指向的文件是否存在
    ///
    /// href按URL解码后再与磁盘比较；没有href的项同样视为缺失。
    fn check_manifest_files(&self, opf: &Opf, base_dir: &Path) -> Vec<Defect> {
        let mut missing = Vec::new();
        for item in &opf.manifest {
            match item.file_path() {
                None => missing.push(Defect::new(
                    DefectKind::MissingFile,
                    Severity::Error,
                    &item.id,
                    format!("Missing: manifest item '{}' has no href", item.id),
                )),
                Some(path) if !base_dir.join(&path).is_file() => missing.push(Defect::new(
                    DefectKind::MissingFile,
                    Severity::Error,
                    &item.href,
                    format!("Missing: {} (referenced in manifest)", item.href),
                )),
                Some(_) => {}
            }
        }
        missing
    }

    /// 检查未列入清单的文件，返回磁盘上的文件数
    fn check_orphan_files(
        &self,
        opf: &Opf,
        base_dir: &Path,
        opf_path: &Path,
        result: &mut AuditResult,
    ) -> Result<usize> {
        let declared: HashSet<String> = opf
            .manifest
            .iter()
            .filter_map(ManifestItem::file_path)
            .collect();

        let mut files_on_disk = 0;
        for path in collect_files(base_dir)? {
            if path == opf_path {
                continue;
            }
            let Some(href) = relative_href(base_dir, &path) else {
                continue;
            };
            files_on_disk += 1;
            if !declared.contains(&href) {
                result.orphans.push(Defect::new(
                    DefectKind::Orphan,
                    Severity::Warning,
                    &href,
                    format!("Orphan: {} (not in manifest)", href),
                ));
            }
        }
        Ok(files_on_disk)
    }

    /// 检查脊柱引用与阅读顺序
    fn check_spine_integrity(&self, opf: &Opf, result: &mut AuditResult) {
        let mut seen: HashMap<&str, usize> = HashMap::new();
        for item in opf.manifest.iter().filter(|item| !item.id.is_empty()) {
            *seen.entry(item.id.as_str()).or_default() += 1;
        }
        let mut duplicates: Vec<(&str, usize)> =
            seen.into_iter().filter(|(_, count)| *count > 1).collect();
        duplicates.sort();
        for (id, count) in duplicates {
            result.spine_issues.push(Defect::new(
                DefectKind::DuplicateId,
                Severity::Error,
                id,
                format!("Manifest ID '{}' declared {} times", id, count),
            ));
        }

        let index = opf.manifest_index();
        let mut previous: Option<u64> = None;

        for (position, spine_item) in opf.spine.iter().enumerate() {
            let Some(item) = index.get(spine_item.idref.as_str()) else {
                result.spine_issues.push(Defect::new(
                    DefectKind::UnknownIdref,
                    Severity::Error,
                    &spine_item.idref,
                    format!(
                        "Spine item {}: ID '{}' not found in manifest",
                        position + 1,
                        spine_item.idref
                    ),
                ));
                continue;
            };

            if item.is_xhtml() || item.href.ends_with(".xhtml") {
                result.summary.spine_documents += 1;
            }

            let Some(ordinal) = self.comparator.ordinal(item) else {
                continue;
            };
            if let Some(prev) = previous {
                if !self.comparator.in_order(prev, ordinal) {
                    result.spine_issues.push(Defect::new(
                        DefectKind::ReadingOrder,
                        Severity::Warning,
                        &item.href,
                        format!(
                            "Reading order issue: {} (#{}) after #{}",
                            item.href, ordinal, prev
                        ),
                    ));
                }
            }
            previous = Some(ordinal);
        }
    }
}
