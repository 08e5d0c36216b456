//! META-INF/container.xml的读写

use crate::epub::error::{EpubError, Result};
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

/// OPF包文件的媒体类型
pub const OPF_MEDIA_TYPE: &str = "application/oebps-package+xml";

/// 容器描述文件在包中的路径
pub const CONTAINER_PATH: &str = "META-INF/container.xml";

/// Container.xml中的rootfile信息
#[derive(Debug, Clone)]
pub struct RootFile {
    pub full_path: String,
    pub media_type: String,
}

/// Container.xml的解析结果
#[derive(Debug, Clone)]
pub struct Container {
    pub rootfiles: Vec<RootFile>,
}

impl Container {
    /// 创建只包含一个OPF rootfile的容器
    ///
    /// # 参数
    /// * `opf_path` - OPF文件相对于包根目录的路径，如 `OEBPS/content.opf`
    pub fn for_opf(opf_path: &str) -> Container {
        Container {
            rootfiles: vec![RootFile {
                full_path: opf_path.to_string(),
                media_type: OPF_MEDIA_TYPE.to_string(),
            }],
        }
    }

    /// 解析container.xml内容
    ///
    /// 只收集 `rootfiles` 内同时带有 `full-path` 与 `media-type` 的条目；
    /// 一个有效条目都没有时返回 `ContainerParseError`。
    pub fn parse_xml(xml_content: &str) -> Result<Container> {
        let mut reader = Reader::from_str(xml_content);
        reader.config_mut().trim_text(true);

        let mut rootfiles = Vec::new();
        let mut depth_in_rootfiles = 0usize;

        loop {
            match reader.read_event()? {
                Event::Start(e) if e.local_name().as_ref() == b"rootfiles" => {
                    depth_in_rootfiles += 1;
                }
                Event::End(e) if e.local_name().as_ref() == b"rootfiles" => {
                    depth_in_rootfiles = depth_in_rootfiles.saturating_sub(1);
                }
                Event::Start(e) | Event::Empty(e)
                    if depth_in_rootfiles > 0 && e.local_name().as_ref() == b"rootfile" =>
                {
                    if let Some(rootfile) = parse_rootfile(&e)? {
                        rootfiles.push(rootfile);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if rootfiles.is_empty() {
            return Err(EpubError::ContainerParseError(
                "没有找到任何rootfile条目".to_string(),
            ));
        }

        Ok(Container { rootfiles })
    }

    /// 获取主要的OPF文件路径
    ///
    /// 优先返回媒体类型为 `application/oebps-package+xml` 的rootfile，
    /// 否则退回到第一个rootfile。
    pub fn get_opf_path(&self) -> Option<String> {
        self.rootfiles
            .iter()
            .find(|rootfile| rootfile.media_type == OPF_MEDIA_TYPE)
            .or_else(|| self.rootfiles.first())
            .map(|rootfile| rootfile.full_path.clone())
    }

    /// 序列化为container.xml文本
    pub fn to_xml(&self) -> String {
        let mut xml = String::from(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <container version=\"1.0\" xmlns=\"urn:oasis:names:tc:opendocument:xmlns:container\">\n  <rootfiles>\n",
        );
        for rootfile in &self.rootfiles {
            xml.push_str(&format!(
                "    <rootfile full-path=\"{}\" media-type=\"{}\"/>\n",
                escape(rootfile.full_path.as_str()),
                escape(rootfile.media_type.as_str()),
            ));
        }
        xml.push_str("  </rootfiles>\n</container>");
        xml
    }
}

fn parse_rootfile(element: &BytesStart<'_>) -> Result<Option<RootFile>> {
    let mut full_path = None;
    let mut media_type = None;

    for attr in element.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let value = attr.unescape_value()?.into_owned();
        match attr.key.local_name().as_ref() {
            b"full-path" => full_path = Some(value),
            b"media-type" => media_type = Some(value),
            _ => {}
        }
    }

    Ok(match (full_path, media_type) {
        (Some(full_path), Some(media_type)) if !full_path.is_empty() => Some(RootFile {
            full_path,
            media_type,
        }),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_container_xml() {
        let container_xml = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
    <rootfiles>
        <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
        <rootfile full-path="OEBPS/toc.ncx" media-type="application/x-dtbncx+xml"/>
    </rootfiles>
</container>"#;

        let container = Container::parse_xml(container_xml).unwrap();
        assert_eq!(container.rootfiles.len(), 2);
        assert_eq!(container.rootfiles[0].full_path, "OEBPS/content.opf");
        assert_eq!(container.rootfiles[1].media_type, "application/x-dtbncx+xml");
    }

    #[test]
    fn test_get_opf_path_prefers_package_media_type() {
        let container = Container {
            rootfiles: vec![
                RootFile {
                    full_path: "OEBPS/toc.ncx".to_string(),
                    media_type: "application/x-dtbncx+xml".to_string(),
                },
                RootFile {
                    full_path: "OEBPS/content.opf".to_string(),
                    media_type: OPF_MEDIA_TYPE.to_string(),
                },
            ],
        };

        assert_eq!(container.get_opf_path(), Some("OEBPS/content.opf".to_string()));
    }

    #[test]
    fn test_empty_container_is_error() {
        let xml = r#"<container><rootfiles></rootfiles></container>"#;
        assert!(matches!(
            Container::parse_xml(xml),
            Err(EpubError::ContainerParseError(_))
        ));
    }

    #[test]
    fn test_generated_container_parses_back() {
        let xml = Container::for_opf("OEBPS/content.opf").to_xml();
        let container = Container::parse_xml(&xml).unwrap();
        assert_eq!(container.get_opf_path(), Some("OEBPS/content.opf".to_string()));
    }
}
