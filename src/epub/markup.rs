//! XHTML标记修复模块
//!
//! 对项目目录中的XHTML源文件做文本级修复：命名实体替换为数字实体、补全命名空间声明、
//! 展开不应自闭合的元素、统一样式表链接路径与顺序，以及为空的测验选项列表填充占位选项。

use crate::epub::error::Result;
use crate::epub::normalize::list_files_with_extension;
use crate::epub::report::ReportSink;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::fs;
use std::path::Path;

/// XHTML命名空间
pub const XHTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// EPUB操作命名空间
pub const EPUB_NAMESPACE: &str = "http://www.idpf.org/2007/ops";

/// XML未预定义、需要改写为数字形式的实体
const ENTITY_FIXES: [(&str, &str); 8] = [
    ("&nbsp;", "&#160;"),
    ("&mdash;", "&#8212;"),
    ("&ndash;", "&#8211;"),
    ("&ldquo;", "&#8220;"),
    ("&rdquo;", "&#8221;"),
    ("&lsquo;", "&#8216;"),
    ("&rsquo;", "&#8217;"),
    ("&hellip;", "&#8230;"),
];

static HTML_OPEN_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<html([^>]*?)>").unwrap());
static SELF_CLOSED_CONTAINER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<(div|p|h[1-6]|span|a)\s([^>]*?)/>").unwrap());
static LOOSE_STYLESHEET_HREF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"href=["'](?:\.\./)?(fonts|style)\.css["']"#).unwrap());
static STYLESHEET_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<link\b[^>]*href="\.\./styles/(fonts|style)\.css"[^>]*/?>"#).unwrap()
});

static EMPTY_QUIZ_OPTIONS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(<ul class="quiz-options"[^>]*>)\s*(</ul>)"#).unwrap());

/// 测验占位选项的标签
const QUIZ_LABELS: [char; 4] = ['A', 'B', 'C', 'D'];

/// 一次修复的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupFix {
    /// 修复后的内容
    pub content: String,
    /// 每一项修改的描述
    pub changes: Vec<String>,
}

impl MarkupFix {
    fn unchanged(content: &str) -> Self {
        Self {
            content: content.to_string(),
            changes: Vec::new(),
        }
    }
}

/// 修复实体、命名空间与自闭合元素
pub fn fix_markup(content: &str) -> MarkupFix {
    let mut fix = MarkupFix::unchanged(content);

    for (entity, numeric) in ENTITY_FIXES {
        if fix.content.contains(entity) {
            fix.content = fix.content.replace(entity, numeric);
            fix.changes.push(format!("Replaced {} with {}", entity, numeric));
        }
    }

    let xhtml_declaration = format!("xmlns=\"{}\"", XHTML_NAMESPACE);
    if fix.content.contains("<html") && !fix.content.contains(&xhtml_declaration) {
        fix.content = fix.content.replacen("<html", &format!("<html {}", xhtml_declaration), 1);
        fix.changes.push("Added XHTML namespace".to_string());
    }

    let epub_declaration = format!("xmlns:epub=\"{}\"", EPUB_NAMESPACE);
    if fix.content.contains("<html")
        && fix.content.contains("epub:")
        && !fix.content.contains(&epub_declaration)
    {
        fix.content = HTML_OPEN_TAG
            .replacen(&fix.content, 1, |caps: &Captures<'_>| {
                format!("<html{} {}>", &caps[1], epub_declaration)
            })
            .into_owned();
        fix.changes.push("Added EPUB namespace".to_string());
    }

    if SELF_CLOSED_CONTAINER.is_match(&fix.content) {
        fix.content = SELF_CLOSED_CONTAINER
            .replace_all(&fix.content, |caps: &Captures<'_>| {
                let tag = &caps[1];
                format!("<{} {}></{}>", tag, caps[2].trim_end(), tag)
            })
            .into_owned();
        fix.changes.push("Expanded self-closing container elements".to_string());
    }

    fix
}

/// 统一样式表链接
///
/// `fonts.css`、`style.css` 及其 `../` 形式改写为 `../styles/` 下的路径；
/// 若 `style.css` 的链接出现在 `fonts.css` 之前，交换两者的位置。
pub fn fix_stylesheet_links(content: &str) -> MarkupFix {
    let mut fix = MarkupFix::unchanged(content);

    let mut rewritten = Vec::new();
    fix.content = LOOSE_STYLESHEET_HREF
        .replace_all(&fix.content, |caps: &Captures<'_>| {
            let replacement = format!("href=\"../styles/{}.css\"", &caps[1]);
            if !rewritten.contains(&replacement) {
                rewritten.push(replacement.clone());
            }
            replacement
        })
        .into_owned();
    for replacement in rewritten {
        fix.changes.push(format!("Fixed CSS path: {}", replacement));
    }

    let mut fonts_link = None;
    let mut style_link = None;
    for caps in STYLESHEET_LINK.captures_iter(&fix.content) {
        let Some(link) = caps.get(0) else { continue };
        let slot = if &caps[1] == "fonts" { &mut fonts_link } else { &mut style_link };
        if slot.is_none() {
            *slot = Some(link.range());
        }
    }

    if let (Some(fonts), Some(style)) = (fonts_link, style_link) {
        if style.start < fonts.start {
            let style_tag = fix.content[style.clone()].to_string();
            let fonts_tag = fix.content[fonts.clone()].to_string();
            let mut reordered = String::with_capacity(fix.content.len());
            reordered.push_str(&fix.content[..style.start]);
            reordered.push_str(&fonts_tag);
            reordered.push_str(&fix.content[style.end..fonts.start]);
            reordered.push_str(&style_tag);
            reordered.push_str(&fix.content[fonts.end..]);
            fix.content = reordered;
            fix.changes
                .push("Moved fonts.css link before style.css".to_string());
        }
    }

    fix
}

/// 为空的 `quiz-options` 列表填充A到D四个占位选项
///
/// 已有选项的列表保持不变。
pub fn populate_quiz(content: &str) -> MarkupFix {
    let mut fix = MarkupFix::unchanged(content);

    if !EMPTY_QUIZ_OPTIONS.is_match(content) {
        return fix;
    }

    let options: String = QUIZ_LABELS
        .iter()
        .map(|label| {
            format!(
                "\n  <li><span class=\"opt-label\">{0}.</span> Option {0} (placeholder)</li>",
                label
            )
        })
        .collect();

    fix.content = EMPTY_QUIZ_OPTIONS
        .replace_all(content, |caps: &Captures<'_>| {
            format!("{}{}\n{}", &caps[1], options, &caps[2])
        })
        .into_owned();
    fix.changes.push("Added placeholder quiz options".to_string());
    fix
}

/// 为章节文件中空的测验填充占位选项
///
/// 只处理文件名（不区分大小写）包含 `chapter` 的XHTML文件。
///
/// # 返回值
/// * `Result<usize>` - 被修改的文件数
pub fn populate_project_quizzes(project_dir: &Path, sink: &mut dyn ReportSink) -> Result<usize> {
    let mut changed_files = 0;

    for name in list_files_with_extension(project_dir, "xhtml")? {
        if !name.to_lowercase().contains("chapter") {
            continue;
        }

        let path = project_dir.join(&name);
        let original = fs::read_to_string(&path)?;
        let quiz = populate_quiz(&original);
        if quiz.changes.is_empty() {
            continue;
        }

        fs::write(&path, &quiz.content)?;
        changed_files += 1;
        for change in &quiz.changes {
            sink.fix(&name, change);
        }
    }

    Ok(changed_files)
}

/// 修复项目目录中的所有XHTML文件
///
/// 只有内容发生变化的文件会被写回。
///
/// # 返回值
/// * `Result<usize>` - 被修改的文件数
pub fn fix_project_markup(project_dir: &Path, sink: &mut dyn ReportSink) -> Result<usize> {
    let mut changed_files = 0;

    for name in list_files_with_extension(project_dir, "xhtml")? {
        let path = project_dir.join(&name);
        let original = fs::read_to_string(&path)?;

        let markup = fix_markup(&original);
        let links = fix_stylesheet_links(&markup.content);

        if links.content == original {
            continue;
        }

        fs::write(&path, &links.content)?;
        changed_files += 1;
        for change in markup.changes.iter().chain(links.changes.iter()) {
            sink.fix(&name, change);
        }
    }

    Ok(changed_files)
}
