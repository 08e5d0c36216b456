//! XHTML检查模块
//!
//! 检查XHTML文件是否为格式良好的XML，以及是否满足EPUB阅读器的常见要求。
//! 只报告问题，不修改文件。

use crate::epub::error::Result;
use crate::epub::markup::XHTML_NAMESPACE;
use crate::epub::normalize::list_files_with_extension;
use crate::epub::report::{ReportSink, Severity};
use once_cell::sync::Lazy;
use quick_xml::Reader;
use quick_xml::events::Event;
use scraper::{Html, Selector};
use std::fs;
use std::path::Path;

/// 单个图片文件的大小上限
pub const MAX_IMAGE_BYTES: u64 = 1024 * 1024;

/// 需要检查大小的图片扩展名
const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

static STYLESHEET_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"link[rel~="stylesheet"]"#).unwrap());
static STYLE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("style").unwrap());

/// 单条检查结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
}

impl Diagnostic {
    fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }
}

/// 目录检查的汇总
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LintSummary {
    pub files_checked: usize,
    pub errors: usize,
    pub warnings: usize,
}

impl LintSummary {
    pub fn passed(&self) -> bool {
        self.errors == 0
    }
}

/// 检查XML格式是否良好
///
/// 标签不匹配、未闭合的元素以及XML未定义的实体都会导致失败。
/// 返回第一个发现的问题。
pub fn check_well_formed(content: &str) -> Option<String> {
    let mut reader = Reader::from_str(content);
    let mut depth = 0usize;

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => {
                return Some(format!("位置 {}: {}", reader.error_position(), e));
            }
        };

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                for attr in e.attributes() {
                    let checked = attr
                        .map_err(quick_xml::Error::from)
                        .and_then(|attr| attr.unescape_value().map(|_| ()));
                    if let Err(e) = checked {
                        return Some(format!("位置 {}: {}", reader.buffer_position(), e));
                    }
                }
                if matches!(event, Event::Start(_)) {
                    depth += 1;
                }
            }
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Text(e) => {
                if let Err(e) = e.unescape() {
                    return Some(format!("位置 {}: {}", reader.buffer_position(), e));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if depth > 0 {
        return Some(format!("文档结束时仍有 {} 个元素未闭合", depth));
    }
    None
}

/// 检查单个XHTML文档
pub fn lint_document(content: &str) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    if let Some(problem) = check_well_formed(content) {
        diagnostics.push(Diagnostic::error(format!("XML格式错误: {}", problem)));
    }

    if !content.to_ascii_lowercase().contains("<!doctype html") {
        diagnostics.push(Diagnostic::warning("缺少 <!DOCTYPE html> 声明"));
    }

    if !content.contains(&format!("xmlns=\"{}\"", XHTML_NAMESPACE)) {
        diagnostics.push(Diagnostic::warning("缺少XHTML命名空间声明"));
    }

    let document = Html::parse_document(content);

    let hrefs: Vec<&str> = document
        .select(&STYLESHEET_SELECTOR)
        .filter_map(|link| link.value().attr("href"))
        .collect();
    let fonts = hrefs.iter().position(|href| href.ends_with("fonts.css"));
    let style = hrefs.iter().position(|href| href.ends_with("style.css"));
    if let (Some(fonts), Some(style)) = (fonts, style) {
        if style < fonts {
            diagnostics.push(Diagnostic::warning("fonts.css 应在 style.css 之前引入"));
        }
    }

    if document.select(&STYLE_SELECTOR).next().is_some() {
        diagnostics.push(Diagnostic::warning("包含内联 <style> 元素，应移到外部样式表"));
    }

    diagnostics
}

/// 检查单个XHTML文件
pub fn lint_file(path: &Path) -> Result<Vec<Diagnostic>> {
    let content = fs::read_to_string(path)?;
    Ok(lint_document(&content))
}

/// 检查目录中图片文件的大小
///
/// 超过 [`MAX_IMAGE_BYTES`] 的图片记为警告。
///
/// # 返回值
/// * `Result<usize>` - 过大的图片数
pub fn check_image_sizes(dir: &Path, sink: &mut dyn ReportSink) -> Result<usize> {
    let mut oversized = 0;

    for extension in IMAGE_EXTENSIONS {
        for name in list_files_with_extension(dir, extension)? {
            let size = fs::metadata(dir.join(&name))?.len();
            if size > MAX_IMAGE_BYTES {
                oversized += 1;
                sink.issue(
                    Severity::Warning,
                    &name,
                    &format!("图片过大: {:.2}MB (应小于1MB)", megabytes(size)),
                );
            } else {
                log::debug!("{}: {:.2}MB", name, megabytes(size));
            }
        }
    }

    Ok(oversized)
}

pub(crate) fn megabytes(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

/// 检查目录中的所有XHTML文件与图片大小
///
/// 每个问题作为 `Issue` 记录写入报告接收器。
pub fn lint_dir(dir: &Path, sink: &mut dyn ReportSink) -> Result<LintSummary> {
    let mut summary = LintSummary::default();

    for name in list_files_with_extension(dir, "xhtml")? {
        let diagnostics = lint_file(&dir.join(&name))?;
        summary.files_checked += 1;

        for diagnostic in diagnostics {
            match diagnostic.severity {
                Severity::Error => summary.errors += 1,
                Severity::Warning => summary.warnings += 1,
                Severity::Info => {}
            }
            sink.issue(diagnostic.severity, &name, &diagnostic.message);
        }
    }

    summary.warnings += check_image_sizes(dir, sink)?;

    log::info!(
        "检查了 {} 个XHTML文件: {} 个错误, {} 个警告",
        summary.files_checked,
        summary.errors,
        summary.warnings
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epub::report::MemorySink;

    const CLEAN: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml">
<head>
  <title>Chapter</title>
  <link rel="stylesheet" type="text/css" href="../styles/fonts.css" />
  <link rel="stylesheet" type="text/css" href="../styles/style.css" />
</head>
<body><p>Text&#160;here &amp; there</p></body>
</html>"#;

    #[test]
    fn test_clean_document() {
        assert!(lint_document(CLEAN).is_empty());
    }

    #[test]
    fn test_xhtml11_doctype_accepted() {
        let doc = CLEAN.replace(
            "<!DOCTYPE html>",
            r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.1//EN" "http://www.w3.org/TR/xhtml11/DTD/xhtml11.dtd">"#,
        );
        assert!(lint_document(&doc).is_empty());
    }

    #[test]
    fn test_mismatched_tags() {
        assert!(check_well_formed("<html><p>text</div></html>").is_some());
    }

    #[test]
    fn test_unclosed_element() {
        assert!(check_well_formed("<html><body><p>text</p>").is_some());
    }

    #[test]
    fn test_undefined_entity() {
        assert!(check_well_formed("<p>a&nbsp;b</p>").is_some());
        assert!(check_well_formed("<p>a&#160;b</p>").is_none());
    }

    #[test]
    fn test_compliance_warnings() {
        let diagnostics = lint_document("<html><head><style>p{}</style></head><body/></html>");
        let warnings = diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count();
        assert_eq!(warnings, 3);
        assert!(diagnostics.iter().all(|d| d.severity != Severity::Error));
    }

    #[test]
    fn test_stylesheet_order_warning() {
        let reversed = CLEAN
            .replace("styles/fonts.css", "styles/TMP.css")
            .replace("styles/style.css", "styles/fonts.css")
            .replace("styles/TMP.css", "styles/style.css");
        let diagnostics = lint_document(&reversed);
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("fonts.css"));
    }

    #[test]
    fn test_lint_dir_records_issues() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("1-good.xhtml"), CLEAN).unwrap();
        fs::write(dir.path().join("2-bad.xhtml"), "<p>unclosed").unwrap();
        fs::write(dir.path().join("notes.txt"), "<p>").unwrap();

        let mut sink = MemorySink::new();
        let summary = lint_dir(dir.path(), &mut sink).unwrap();

        assert_eq!(summary.files_checked, 2);
        assert_eq!(summary.errors, 1);
        assert!(!summary.passed());
        assert!(
            sink.issues_at_least(Severity::Error)
                .all(|record| record.file == "2-bad.xhtml")
        );
    }

    #[test]
    fn test_oversized_images_warned() {
        let dir = tempfile::tempdir().unwrap();
        fs::File::create(dir.path().join("big.JPG"))
            .unwrap()
            .set_len(MAX_IMAGE_BYTES + 1)
            .unwrap();
        fs::File::create(dir.path().join("small.png"))
            .unwrap()
            .set_len(MAX_IMAGE_BYTES)
            .unwrap();
        fs::File::create(dir.path().join("huge.gif"))
            .unwrap()
            .set_len(MAX_IMAGE_BYTES * 2)
            .unwrap();

        let mut sink = MemorySink::new();
        let summary = lint_dir(dir.path(), &mut sink).unwrap();

        assert_eq!(summary.files_checked, 0);
        assert_eq!(summary.warnings, 1);
        assert!(summary.passed());
        let warnings: Vec<_> = sink.issues_at_least(Severity::Warning).collect();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].file, "big.JPG");
    }
}
