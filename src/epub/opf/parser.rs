//! OPF解析器模块
//!
//! 提供OPF（Open Packaging Format）文件的XML解析功能。

use crate::epub::error::{EpubError, Result};
use crate::epub::opf::{manifest::ManifestItem, metadata::Metadata, spine::SpineItem};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::collections::HashMap;

/// OPF文件解析结果
///
/// 清单与脊柱都按文档中的出现顺序保存。清单中的重复ID会被原样保留，
/// 由审计器报告。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opf {
    /// EPUB版本
    pub version: String,
    /// 元数据
    pub metadata: Metadata,
    /// 清单项(文件列表)
    pub manifest: Vec<ManifestItem>,
    /// 脊柱(阅读顺序)
    pub spine: Vec<SpineItem>,
}

#[derive(PartialEq, Eq)]
enum Section {
    None,
    Metadata,
    Manifest,
    Spine,
}

impl Opf {
    /// 创建EPUB 3.0的空OPF
    pub fn new(metadata: Metadata) -> Self {
        Self {
            version: "3.0".to_string(),
            metadata,
            manifest: Vec::new(),
            spine: Vec::new(),
        }
    }

    /// 解析OPF文件内容
    ///
    /// # 参数
    /// * `xml_content` - OPF文件的XML内容
    ///
    /// # 返回值
    /// * `Result<Opf, EpubError>` - 解析后的OPF信息
    pub fn parse_xml(xml_content: &str) -> Result<Opf> {
        let mut reader = Reader::from_str(xml_content);
        reader.config_mut().trim_text(true);

        let mut opf = Opf::new(Metadata::empty());
        opf.version.clear();

        let mut buf = Vec::new();
        let mut section = Section::None;
        let mut current_element: Option<String> = None;
        let mut current_meta_property: Option<String> = None;
        let mut text_content = String::new();
        let mut seen_package = false;

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| EpubError::OpfParseError(format!("XML解析错误: {}", e)))?;

            match event {
                Event::Start(ref e) => {
                    let local_name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                    match local_name.as_str() {
                        "package" => {
                            seen_package = true;
                            opf.version = attribute(e, b"version")?.unwrap_or_default();
                        }
                        "metadata" => section = Section::Metadata,
                        "manifest" => section = Section::Manifest,
                        "spine" => section = Section::Spine,
                        "item" if section == Section::Manifest => {
                            opf.manifest.push(parse_manifest_item(e)?);
                        }
                        "itemref" if section == Section::Spine => {
                            opf.spine.extend(parse_spine_item(e)?);
                        }
                        "meta" if section == Section::Metadata => {
                            current_meta_property = attribute(e, b"property")?;
                            text_content.clear();
                        }
                        _ if section == Section::Metadata => {
                            current_element = Some(local_name.clone());
                            text_content.clear();
                        }
                        _ => {}
                    }
                }
                Event::Empty(ref e) => match e.local_name().as_ref() {
                    b"package" => {
                        seen_package = true;
                    }
                    b"item" if section == Section::Manifest => {
                        opf.manifest.push(parse_manifest_item(e)?);
                    }
                    b"itemref" if section == Section::Spine => {
                        opf.spine.extend(parse_spine_item(e)?);
                    }
                    _ => {}
                },
                Event::End(ref e) => match e.local_name().as_ref() {
                    b"metadata" | b"manifest" | b"spine" => section = Section::None,
                    b"meta" if section == Section::Metadata => {
                        if current_meta_property.take().as_deref() == Some("dcterms:modified") {
                            opf.metadata.modified = Some(text_content.trim().to_string());
                        }
                    }
                    _ if section == Section::Metadata => {
                        if let Some(element) = current_element.take() {
                            let value = text_content.trim();
                            if !value.is_empty() {
                                opf.metadata.set_dublin_core(&element, value.to_string());
                            }
                        }
                    }
                    _ => {}
                },
                Event::Text(e) => {
                    if section == Section::Metadata {
                        let text = e
                            .unescape()
                            .map_err(|e| EpubError::OpfParseError(format!("文本解码错误: {}", e)))?;
                        text_content.push_str(&text);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if !seen_package {
            return Err(EpubError::OpfParseError("缺少package根元素".to_string()));
        }

        Ok(opf)
    }

    /// 根据ID获取清单项（重复ID时返回第一个）
    pub fn get_manifest_item(&self, id: &str) -> Option<&ManifestItem> {
        self.manifest.iter().find(|item| item.id == id)
    }

    /// 建立ID到清单项的索引（重复ID时保留第一个，没有ID的项不进入索引）
    pub fn manifest_index(&self) -> HashMap<&str, &ManifestItem> {
        let mut index = HashMap::with_capacity(self.manifest.len());
        for item in self.manifest.iter().filter(|item| !item.id.is_empty()) {
            index.entry(item.id.as_str()).or_insert(item);
        }
        index
    }
}

/// 读取元素上指定本地名称的属性
fn attribute(e: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>> {
    for attr_result in e.attributes() {
        let attr = attr_result.map_err(|err| EpubError::XmlError(quick_xml::Error::InvalidAttr(err)))?;
        if attr.key.local_name().as_ref() == name {
            let value = attr
                .unescape_value()
                .map_err(|err| EpubError::OpfParseError(format!("属性解码错误: {}", err)))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// 解析清单项
///
/// 缺少的属性保留为空字符串，条目本身不丢弃。
fn parse_manifest_item(e: &BytesStart<'_>) -> Result<ManifestItem> {
    let id = attribute(e, b"id")?.unwrap_or_default();
    let href = attribute(e, b"href")?.unwrap_or_default();
    let media_type = attribute(e, b"media-type")?.unwrap_or_default();

    if id.is_empty() || href.is_empty() || media_type.is_empty() {
        log::debug!("不完整的清单项: id={:?} href={:?} media-type={:?}", id, href, media_type);
    }

    let mut item = ManifestItem::new(id, href, media_type);
    item.properties = attribute(e, b"properties")?;
    Ok(item)
}

/// 解析脊柱项
fn parse_spine_item(e: &BytesStart<'_>) -> Result<Option<SpineItem>> {
    let Some(idref) = attribute(e, b"idref")?.filter(|idref| !idref.is_empty()) else {
        return Ok(None);
    };
    let linear = attribute(e, b"linear")?.as_deref() != Some("no");
    Ok(Some(SpineItem::with_linear(idref, linear)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_OPF: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="BookId">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title>Curls &amp; Contemplation</dc:title>
    <dc:creator>MD Warren</dc:creator>
    <dc:identifier id="BookId">urn:uuid:1234</dc:identifier>
    <dc:language>en-US</dc:language>
    <dc:subject>Beauty</dc:subject>
    <dc:subject>Business</dc:subject>
    <meta property="dcterms:modified">2025-01-27T10:00:00Z</meta>
  </metadata>
  <manifest>
    <item id="text001" href="text/1-cover.xhtml" media-type="application/xhtml+xml"/>
    <item id="text002" href="text/2-intro.xhtml" media-type="application/xhtml+xml"></item>
    <item id="css1" href="styles/style.css" media-type="text/css"/>
    <item id="broken" href="" media-type="text/css"/>
  </manifest>
  <spine>
    <itemref idref="text001"/>
    <itemref idref="text002" linear="no"/>
  </spine>
</package>"#;

    #[test]
    fn test_parse_metadata() {
        let opf = Opf::parse_xml(SAMPLE_OPF).unwrap();
        assert_eq!(opf.version, "3.0");
        assert_eq!(opf.metadata.title, "Curls & Contemplation");
        assert_eq!(opf.metadata.identifier, "urn:uuid:1234");
        assert_eq!(opf.metadata.subjects, vec!["Beauty", "Business"]);
        assert_eq!(opf.metadata.modified.as_deref(), Some("2025-01-27T10:00:00Z"));
    }

    #[test]
    fn test_parse_manifest_and_spine_in_order() {
        let opf = Opf::parse_xml(SAMPLE_OPF).unwrap();
        let ids: Vec<&str> = opf.manifest.iter().map(|item| item.id.as_str()).collect();
        assert_eq!(ids, vec!["text001", "text002", "css1", "broken"]);

        assert_eq!(opf.spine.len(), 2);
        assert!(opf.spine[0].linear);
        assert!(!opf.spine[1].linear);
    }

    #[test]
    fn test_incomplete_items_are_kept() {
        let xml = r#"<package version="3.0"><manifest>
<item id="css1" media-type="text/css"/>
<item id="text001" href="text/1-a.xhtml"/>
</manifest><spine><itemref idref="text001"/></spine></package>"#;
        let opf = Opf::parse_xml(xml).unwrap();
        assert_eq!(opf.manifest.len(), 2);
        assert_eq!(opf.manifest[0].href, "");
        assert_eq!(opf.manifest[1].media_type, "");
        assert!(opf.manifest_index().contains_key("text001"));
    }

    #[test]
    fn test_duplicate_ids_are_kept() {
        let xml = r#"<package version="3.0"><manifest>
<item id="a" href="one.xhtml" media-type="application/xhtml+xml"/>
<item id="a" href="two.xhtml" media-type="application/xhtml+xml"/>
</manifest><spine/></package>"#;
        let opf = Opf::parse_xml(xml).unwrap();
        assert_eq!(opf.manifest.len(), 2);
        assert_eq!(opf.get_manifest_item("a").unwrap().href, "one.xhtml");
        assert_eq!(opf.manifest_index().len(), 1);
    }

    #[test]
    fn test_malformed_opf_is_error() {
        assert!(Opf::parse_xml("<package><manifest></spine></package>").is_err());
        assert!(matches!(
            Opf::parse_xml("<notapackage/>"),
            Err(EpubError::OpfParseError(_))
        ));
    }
}
