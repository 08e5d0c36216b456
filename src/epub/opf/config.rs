//! 构建映射配置模块
//!
//! 读写项目根目录下的 `book-map.yaml`。该文件提供content.opf的元数据，
//! 并记录源文件与输出路径的对应关系。

use crate::epub::error::{EpubError, Result};
use crate::epub::normalize::RenameMapping;
use crate::epub::opf::metadata::Metadata;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// 构建映射文件名
pub const BOOK_MAP_FILE: &str = "book-map.yaml";

/// 标识符配置，对应YAML中的 `identifier: { text: ... }`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentifierConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// 其他未识别的字段，写回时原样保留
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yml::Value>,
}

/// `book` 段：图书元数据，所有字段可选
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<IdentifierConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rights: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yml::Value>,
}

/// `files` 段中的一项
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yml::Value>,
}

/// `book-map.yaml` 的完整内容
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookMap {
    #[serde(default)]
    pub book: BookConfig,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileEntry>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yml::Value>,
}

impl BookMap {
    /// 从指定路径加载构建映射
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| EpubError::ConfigError(format!("无法读取配置文件: {}", e)))?;

        serde_yml::from_str(&content)
            .map_err(|e| EpubError::ConfigError(format!("配置文件格式错误: {}", e)))
    }

    /// 加载项目目录下的 `book-map.yaml`，文件不存在时返回默认配置
    pub fn load_or_default<P: AsRef<Path>>(project_dir: P) -> Result<Self> {
        let path = project_dir.as_ref().join(BOOK_MAP_FILE);
        if path.exists() {
            Self::from_file(path)
        } else {
            log::debug!("未找到 {}，使用默认元数据", path.display());
            Ok(Self::default())
        }
    }

    /// 写回到指定路径
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml_content = serde_yml::to_string(self)
            .map_err(|e| EpubError::ConfigError(format!("序列化配置失败: {}", e)))?;

        fs::write(path.as_ref(), yaml_content)
            .map_err(|e| EpubError::ConfigError(format!("写入配置文件失败: {}", e)))
    }

    /// 将重命名映射应用到 `files` 段
    ///
    /// `input` 直接按映射替换；`output` 的文件名若在映射中，
    /// 则改写为 `OEBPS/text/<新文件名>`。
    ///
    /// # 返回值
    /// * `Vec<(String, String)>` - 被改写的 `input` 与 `output` 值（旧值, 新值），为空表示没有变化
    pub fn apply_renames(&mut self, mapping: &RenameMapping) -> Vec<(String, String)> {
        let mut changes = Vec::new();

        for entry in &mut self.files {
            if let Some(input) = entry.input.as_mut() {
                if let Some(new_name) = mapping.get(input.as_str()) {
                    changes.push((input.clone(), new_name.to_string()));
                    *input = new_name.to_string();
                }
            }

            if let Some(output) = entry.output.as_mut() {
                let file_name = Path::new(output.as_str())
                    .file_name()
                    .and_then(|name| name.to_str())
                    .map(str::to_string);
                if let Some(new_name) = file_name.as_deref().and_then(|name| mapping.get(name)) {
                    let new_output = format!("OEBPS/text/{}", new_name);
                    if *output != new_output {
                        changes.push((output.clone(), new_output.clone()));
                        *output = new_output;
                    }
                }
            }
        }

        changes
    }

    /// 合并默认值，得到写入content.opf的元数据
    pub fn metadata(&self) -> Metadata {
        let defaults = Metadata::default();
        let book = &self.book;
        let pick = |value: &Option<String>, default: String| value.clone().unwrap_or(default);

        Metadata {
            title: pick(&book.title, defaults.title),
            creator: pick(&book.author, defaults.creator),
            identifier: book
                .identifier
                .as_ref()
                .and_then(|identifier| identifier.text.clone())
                .unwrap_or(defaults.identifier),
            language: pick(&book.language, defaults.language),
            date: pick(&book.date, defaults.date),
            rights: pick(&book.rights, defaults.rights),
            publisher: pick(&book.publisher, defaults.publisher),
            subjects: defaults.subjects,
            modified: defaults.modified,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
book:
  title: Test Title
  author: Someone
  identifier:
    text: urn:isbn:123
    scheme: ISBN
  cover: cover.jpg
files:
  - input: Chapter One_final.xhtml
    output: build/Chapter One_final.xhtml
    role: chapter
  - input: untouched.xhtml
"#;

    #[test]
    fn test_metadata_merges_defaults() {
        let map: BookMap = serde_yml::from_str(SAMPLE).unwrap();
        let metadata = map.metadata();

        assert_eq!(metadata.title, "Test Title");
        assert_eq!(metadata.creator, "Someone");
        assert_eq!(metadata.identifier, "urn:isbn:123");
        assert_eq!(metadata.language, "en-US");
        assert_eq!(metadata.publisher, "MD Warren");
    }

    #[test]
    fn test_default_map_uses_default_metadata() {
        assert_eq!(BookMap::default().metadata(), Metadata::default());
    }

    #[test]
    fn test_apply_renames_updates_input_and_output() {
        let mut map: BookMap = serde_yml::from_str(SAMPLE).unwrap();
        let mut mapping = RenameMapping::default();
        mapping.insert("Chapter One_final.xhtml", "chapter-one.xhtml");

        let changes = map.apply_renames(&mapping);

        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].1, "chapter-one.xhtml");
        assert_eq!(changes[1].1, "OEBPS/text/chapter-one.xhtml");
        assert_eq!(map.files[0].input.as_deref(), Some("chapter-one.xhtml"));
        assert_eq!(map.files[0].output.as_deref(), Some("OEBPS/text/chapter-one.xhtml"));
        assert_eq!(map.files[1].input.as_deref(), Some("untouched.xhtml"));
    }

    #[test]
    fn test_round_trip_keeps_unknown_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(BOOK_MAP_FILE);

        let map: BookMap = serde_yml::from_str(SAMPLE).unwrap();
        map.write_to(&path).unwrap();
        let reloaded = BookMap::from_file(&path).unwrap();

        assert!(reloaded.book.extra.contains_key("cover"));
        assert!(reloaded.files[0].extra.contains_key("role"));
        assert_eq!(
            reloaded.book.identifier.and_then(|id| id.text),
            Some("urn:isbn:123".to_string())
        );
    }

    #[test]
    fn test_load_or_default_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let map = BookMap::load_or_default(dir.path()).unwrap();
        assert!(map.files.is_empty());
    }

    #[test]
    fn test_invalid_yaml_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(BOOK_MAP_FILE);
        fs::write(&path, "book: [unclosed").unwrap();
        assert!(matches!(BookMap::from_file(&path), Err(EpubError::ConfigError(_))));
    }
}
