//! 清单模块
//!
//! 提供EPUB包中文件清单的结构定义，以及按扩展名推断资源类型的规则。

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use serde::Serialize;
use std::path::Path;

/// XHTML文档的媒体类型
pub const XHTML_MEDIA_TYPE: &str = "application/xhtml+xml";

/// 无法从扩展名区分的图片使用的默认媒体类型
pub const FALLBACK_IMAGE_MEDIA_TYPE: &str = "image/png";

/// 写入href时需要转义的字符
///
/// 不包含 `%`，已经编码的href再次编码时保持不变。
const HREF_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// 把文件系统相对路径编码为清单中的href
pub fn encode_href(path: &str) -> String {
    utf8_percent_encode(path, HREF_ENCODE_SET).to_string()
}

/// 把清单中的href还原为相对文件路径
///
/// 去掉片段标识与开头的 `./`，并解码百分号转义。
pub fn decode_href(href: &str) -> String {
    let path = href.split('#').next().unwrap_or(href);
    let path = path.strip_prefix("./").unwrap_or(path);
    percent_decode_str(path).decode_utf8_lossy().into_owned()
}

/// 清单项信息
///
/// 解析得到的清单项会保留缺少属性的条目，缺失的属性为空字符串，
/// 由审计器决定如何报告。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestItem {
    /// 项目ID
    pub id: String,
    /// 文件路径(相对于OPF文件)
    pub href: String,
    /// 媒体类型
    pub media_type: String,
    /// 属性(如nav、cover-image等)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<String>,
}

impl ManifestItem {
    /// 创建新的清单项
    pub fn new(id: String, href: String, media_type: String) -> Self {
        Self {
            id,
            href,
            media_type,
            properties: None,
        }
    }

    /// href对应的相对文件路径，没有href时返回 `None`
    pub fn file_path(&self) -> Option<String> {
        if self.href.is_empty() {
            return None;
        }
        Some(decode_href(&self.href))
    }

    /// 检查是否为XHTML文件
    pub fn is_xhtml(&self) -> bool {
        self.media_type == XHTML_MEDIA_TYPE
    }
}

/// 包内资源的类型，每种类型对应OEBPS下的一个固定子目录
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// XHTML文档
    Text,
    /// CSS样式表
    Style,
    /// 嵌入字体
    Font,
    /// 位图图片
    Image,
}

impl ResourceKind {
    /// 按清单生成顺序排列的全部类型
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Text,
        ResourceKind::Style,
        ResourceKind::Font,
        ResourceKind::Image,
    ];

    /// 根据文件扩展名判断资源类型（不区分大小写）
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "xhtml" => Some(ResourceKind::Text),
            "css" => Some(ResourceKind::Style),
            "woff2" => Some(ResourceKind::Font),
            "jpg" | "jpeg" | "png" => Some(ResourceKind::Image),
            _ => None,
        }
    }

    /// OEBPS下对应的子目录名
    pub fn dir_name(self) -> &'static str {
        match self {
            ResourceKind::Text => "text",
            ResourceKind::Style => "styles",
            ResourceKind::Font => "fonts",
            ResourceKind::Image => "images",
        }
    }

    /// 清单ID前缀
    pub fn id_prefix(self) -> &'static str {
        match self {
            ResourceKind::Text => "text",
            ResourceKind::Style => "css",
            ResourceKind::Font => "font",
            ResourceKind::Image => "img",
        }
    }

    /// 生成第 `ordinal` 个（从1开始）该类型资源的清单ID
    ///
    /// 文档使用三位补零的序号（`text001`），它们同时决定脊柱顺序；
    /// 其余资源直接使用序号（`css1`、`img2`）。
    pub fn item_id(self, ordinal: usize) -> String {
        match self {
            ResourceKind::Text => format!("{}{:03}", self.id_prefix(), ordinal),
            _ => format!("{}{}", self.id_prefix(), ordinal),
        }
    }

    /// 根据扩展名推断媒体类型
    pub fn media_type(self, path: &Path) -> &'static str {
        match self {
            ResourceKind::Text => XHTML_MEDIA_TYPE,
            ResourceKind::Style => "text/css",
            ResourceKind::Font => "font/woff2",
            ResourceKind::Image => {
                let extension = path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| ext.to_ascii_lowercase());
                match extension.as_deref() {
                    Some("jpg") | Some("jpeg") => "image/jpeg",
                    _ => FALLBACK_IMAGE_MEDIA_TYPE,
                }
            }
        }
    }
}
