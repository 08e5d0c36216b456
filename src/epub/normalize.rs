//! 文件名规范化模块
//!
//! 提供纯函数 [`normalize_filename`]，以及一次重命名过程所用的
//! [`RenameMapping`]。映射只在一次规范化过程中存在，应用到所有引用后即丢弃。

use crate::epub::error::Result;
use crate::epub::report::ReportSink;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// 需要去除的临时后缀标记
const VOLATILE_SUFFIX: &str = "_final";

/// 历史上命名错误的文件名片段及其修正
const KNOWN_FIXES: [(&str, &str); 6] = [
    ("continuedlearningcommitment-2", "continued-learning-commitment"),
    ("affirmationsclose", "affirmations-close"),
    ("selfcarejournal", "self-care-journal"),
    ("journalpage", "journal-page"),
    ("professionaldevelopment", "professional-development"),
    ("affirmationodyssey", "affirmation-odyssey"),
];

static HYPHEN_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new("-+").unwrap());

/// 规范化文件名
///
/// 依次执行：去除 `_final` 标记、转小写、空格替换为连字符、
/// 合并连续连字符、应用已知错误文件名的修正表。
///
/// # 示例
///
/// ```rust
/// use epubforge::normalize_filename;
///
/// assert_eq!(normalize_filename("My File_final.xhtml"), "my-file.xhtml");
/// ```
pub fn normalize_filename(filename: &str) -> String {
    let name = filename.replace(VOLATILE_SUFFIX, "");
    let name = name.to_lowercase();
    let name = name.replace(' ', "-");
    let mut name = HYPHEN_RUNS.replace_all(&name, "-").into_owned();

    for (from, to) in KNOWN_FIXES {
        name = name.replace(from, to);
    }

    name
}

/// 原文件名到规范化文件名的映射
///
/// 保持插入顺序，重命名和引用修补都按该顺序进行。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenameMapping {
    entries: Vec<(String, String)>,
}

impl RenameMapping {
    /// 添加一条映射，已存在的原文件名会被覆盖
    pub fn insert(&mut self, old_name: &str, new_name: &str) {
        match self.entries.iter_mut().find(|(old, _)| old == old_name) {
            Some(entry) => entry.1 = new_name.to_string(),
            None => self.entries.push((old_name.to_string(), new_name.to_string())),
        }
    }

    /// 查找原文件名对应的新文件名
    pub fn get(&self, old_name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(old, _)| old == old_name)
            .map(|(_, new)| new.as_str())
    }

    /// 是否已有某个新文件名作为目标
    pub fn has_target(&self, new_name: &str) -> bool {
        self.entries.iter().any(|(_, new)| new == new_name)
    }

    pub fn remove(&mut self, old_name: &str) {
        self.entries.retain(|(old, _)| old != old_name);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(old, new)| (old.as_str(), new.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 列出目录中（不递归）指定扩展名的文件名，按名称排序
pub(crate) fn list_files_with_extension(dir: &Path, extension: &str) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
        if matches {
            if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

/// 目录中所有条目的原始名称
fn entry_names(dir: &Path) -> Result<HashSet<String>> {
    let mut names = HashSet::new();
    for entry in fs::read_dir(dir)? {
        names.insert(entry?.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}

/// 目标文件名是否已被另一个文件占用
///
/// 只改大小写时，大小写不敏感的文件系统会把源文件本身当作目标，
/// 此时只认目录中名称完全相同的条目。
fn target_taken(project_dir: &Path, entries: &HashSet<String>, old_name: &str, new_name: &str) -> bool {
    if entries.contains(new_name) {
        return true;
    }
    !old_name.eq_ignore_ascii_case(new_name) && project_dir.join(new_name).exists()
}

/// 为项目目录中的XHTML文件生成重命名映射
///
/// 只包含名称实际发生变化的文件。若多个文件规范化后同名，
/// 或目标文件已存在，后出现的文件不会进入映射，并通过 `sink` 报告。
pub fn plan_renames(project_dir: &Path, sink: &mut dyn ReportSink) -> Result<RenameMapping> {
    let mut mapping = RenameMapping::default();
    let entries = entry_names(project_dir)?;

    for old_name in list_files_with_extension(project_dir, "xhtml")? {
        let new_name = normalize_filename(&old_name);
        if new_name == old_name {
            continue;
        }

        if mapping.has_target(&new_name) || target_taken(project_dir, &entries, &old_name, &new_name) {
            sink.skip(
                &old_name,
                &format!("Not renamed: {} already taken by another file", new_name),
            );
            continue;
        }

        mapping.insert(&old_name, &new_name);
    }

    Ok(mapping)
}

/// 按映射在磁盘上执行重命名
///
/// 源文件已不存在的映射项会被移出映射，保证之后的引用修补
/// 只针对真正完成的重命名。
pub fn apply_renames(
    project_dir: &Path,
    mapping: &mut RenameMapping,
    sink: &mut dyn ReportSink,
) -> Result<()> {
    let pending: Vec<(String, String)> = mapping
        .iter()
        .map(|(old, new)| (old.to_string(), new.to_string()))
        .collect();

    for (old_name, new_name) in pending {
        let old_path = project_dir.join(&old_name);
        if !old_path.exists() {
            mapping.remove(&old_name);
            continue;
        }

        let new_path = project_dir.join(&new_name);
        if old_name.eq_ignore_ascii_case(&new_name) {
            // 大小写不敏感的文件系统上直接改名可能不生效
            let staging = project_dir.join(format!(".{}.renaming", new_name));
            fs::rename(&old_path, &staging)?;
            fs::rename(&staging, &new_path)?;
        } else {
            fs::rename(&old_path, &new_path)?;
        }
        sink.fix(&old_name, &format!("Renamed to {}", new_name));
    }

    Ok(())
}
