//! 元数据模块
//!
//! 提供写入content.opf的图书元数据结构，以及本项目的默认值。

use serde::Serialize;

/// 默认书名
pub const DEFAULT_TITLE: &str = "Curls & Contemplation";
/// 默认作者
pub const DEFAULT_CREATOR: &str = "MD Warren";
/// 默认唯一标识符
pub const DEFAULT_IDENTIFIER: &str = "urn:uuid:9fa5e2ef-5fd8-4f5b-9077-0b9e856cda3d";
/// 默认语言
pub const DEFAULT_LANGUAGE: &str = "en-US";
/// 默认出版日期
pub const DEFAULT_DATE: &str = "2025-01-27";
/// 默认最后修改时间
pub const DEFAULT_MODIFIED: &str = "2025-01-27T10:00:00Z";
/// 默认版权声明
pub const DEFAULT_RIGHTS: &str = "© 2025 MD Warren. All rights reserved.";
/// 默认主题
pub const DEFAULT_SUBJECTS: [&str; 4] = ["Beauty", "Business", "Personal Development", "Hairstyling"];

/// OPF文件中的元数据信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Metadata {
    /// 书名
    pub title: String,
    /// 作者
    pub creator: String,
    /// 唯一标识符（对应package的unique-identifier）
    pub identifier: String,
    /// 语言
    pub language: String,
    /// 出版日期
    pub date: String,
    /// 版权信息
    pub rights: String,
    /// 出版社
    pub publisher: String,
    /// 主题列表
    pub subjects: Vec<String>,
    /// dcterms:modified
    pub modified: Option<String>,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            creator: DEFAULT_CREATOR.to_string(),
            identifier: DEFAULT_IDENTIFIER.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            date: DEFAULT_DATE.to_string(),
            rights: DEFAULT_RIGHTS.to_string(),
            publisher: DEFAULT_CREATOR.to_string(),
            subjects: DEFAULT_SUBJECTS.iter().map(|s| s.to_string()).collect(),
            modified: Some(DEFAULT_MODIFIED.to_string()),
        }
    }
}

impl Metadata {
    /// 创建所有字段为空的元数据，用于解析已有的OPF文件
    pub fn empty() -> Self {
        Self {
            title: String::new(),
            creator: String::new(),
            identifier: String::new(),
            language: String::new(),
            date: String::new(),
            rights: String::new(),
            publisher: String::new(),
            subjects: Vec::new(),
            modified: None,
        }
    }

    /// 根据Dublin Core元素的本地名称写入对应字段
    ///
    /// 重复出现的单值元素保留第一个值，`subject` 会累积。
    /// 返回该元素是否被识别。
    pub fn set_dublin_core(&mut self, element: &str, value: String) -> bool {
        let slot = match element {
            "title" => &mut self.title,
            "creator" => &mut self.creator,
            "identifier" => &mut self.identifier,
            "language" => &mut self.language,
            "date" => &mut self.date,
            "rights" => &mut self.rights,
            "publisher" => &mut self.publisher,
            "subject" => {
                self.subjects.push(value);
                return true;
            }
            _ => return false,
        };
        if slot.is_empty() {
            *slot = value;
        }
        true
    }
}
