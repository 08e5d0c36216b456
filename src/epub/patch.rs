//! 引用修补模块
//!
//! 将一次重命名过程产生的 [`RenameMapping`] 应用到目录文档和构建映射中。

use crate::epub::error::Result;
use crate::epub::normalize::RenameMapping;
use crate::epub::opf::{BOOK_MAP_FILE, BookMap};
use crate::epub::report::ReportSink;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::fs;
use std::path::Path;

/// 项目中的目录文档
pub const TOC_FILE: &str = "3-tableofcontents.xhtml";

static DOUBLE_QUOTED_HREF: Lazy<Regex> = Lazy::new(|| Regex::new(r#"href="([^"]*)""#).unwrap());
static SINGLE_QUOTED_HREF: Lazy<Regex> = Lazy::new(|| Regex::new(r"href='([^']*)'").unwrap());

/// 把href属性值中的旧文件名替换为新文件名
///
/// 只有整个路径（`#` 之前的部分）与映射中的旧文件名完全相同时才替换，
/// 其他属性和其他href保持不变。每个属性只替换一次，因此
/// 重复应用同一映射不会产生链式替换。
pub fn patch_references(content: &str, mapping: &RenameMapping) -> String {
    if mapping.is_empty() {
        return content.to_string();
    }

    let patched = replace_hrefs(&DOUBLE_QUOTED_HREF, content, '"', mapping);
    replace_hrefs(&SINGLE_QUOTED_HREF, &patched, '\'', mapping).into_owned()
}

fn replace_hrefs<'a>(
    pattern: &Regex,
    content: &'a str,
    quote: char,
    mapping: &RenameMapping,
) -> Cow<'a, str> {
    pattern.replace_all(content, |caps: &Captures<'_>| {
        let value = &caps[1];
        let (path, fragment) = match value.find('#') {
            Some(pos) => value.split_at(pos),
            None => (value, ""),
        };
        match mapping.get(path) {
            Some(new_name) => format!("href={quote}{new_name}{fragment}{quote}"),
            None => caps[0].to_string(),
        }
    })
}

/// 修补单个文件中的引用
///
/// # 返回值
/// * `Result<bool>` - 文件内容是否发生变化
pub fn patch_file(path: &Path, mapping: &RenameMapping) -> Result<bool> {
    let content = fs::read_to_string(path)?;
    let patched = patch_references(&content, mapping);
    if patched == content {
        return Ok(false);
    }
    fs::write(path, patched)?;
    Ok(true)
}

/// 把映射应用到项目目录中所有引用文件的文档
///
/// 包括目录文档 `3-tableofcontents.xhtml` 与 `book-map.yaml`。
/// 不存在的文件直接跳过。
pub fn patch_project_references(
    project_dir: &Path,
    mapping: &RenameMapping,
    sink: &mut dyn ReportSink,
) -> Result<()> {
    if mapping.is_empty() {
        return Ok(());
    }

    let toc_path = project_dir.join(TOC_FILE);
    if toc_path.exists() && patch_file(&toc_path, mapping)? {
        sink.fix(TOC_FILE, "Updated file references");
    }

    let book_map_path = project_dir.join(BOOK_MAP_FILE);
    if book_map_path.exists() {
        let mut book_map = BookMap::from_file(&book_map_path)?;
        let changes = book_map.apply_renames(mapping);
        for (old_value, new_value) in &changes {
            sink.fix(BOOK_MAP_FILE, &format!("Updated {} to {}", old_value, new_value));
        }
        if !changes.is_empty() {
            book_map.write_to(&book_map_path)?;
        }
    }

    Ok(())
}
