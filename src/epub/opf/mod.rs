//! OPF（Open Packaging Format）模块
//!
//! 此模块提供content.opf的数据结构、解析与生成，以及构建映射配置。

mod config;
mod manifest;
mod metadata;
mod parser;
mod spine;
mod writer;

pub use config::{BOOK_MAP_FILE, BookConfig, BookMap, FileEntry, IdentifierConfig};
pub use manifest::{
    FALLBACK_IMAGE_MEDIA_TYPE, ManifestItem, ResourceKind, XHTML_MEDIA_TYPE, decode_href, encode_href,
};
pub use metadata::Metadata;
pub use parser::Opf;
pub use spine::SpineItem;
