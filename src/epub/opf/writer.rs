//! OPF生成模块
//!
//! 将 [`Opf`] 序列化为content.opf文本。

use crate::epub::opf::manifest::encode_href;
use crate::epub::opf::parser::Opf;
use quick_xml::escape::escape;

/// package元素上的唯一标识符引用
const UNIQUE_IDENTIFIER_ID: &str = "BookId";

impl Opf {
    /// 序列化为content.opf文本
    ///
    /// 输出顺序固定：metadata、manifest、spine。相同的输入总是得到相同的文本。
    pub fn to_xml(&self) -> String {
        let metadata = &self.metadata;
        let mut opf = String::new();

        opf.push_str(&format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <package xmlns=\"http://www.idpf.org/2007/opf\" version=\"{}\" unique-identifier=\"{}\">\n\
             \x20 <metadata xmlns:dc=\"http://purl.org/dc/elements/1.1/\">\n",
            escape(self.version.as_str()),
            UNIQUE_IDENTIFIER_ID,
        ));

        push_element(&mut opf, "dc:title", &metadata.title);
        push_element(&mut opf, "dc:creator", &metadata.creator);
        opf.push_str(&format!(
            "    <dc:identifier id=\"{}\">{}</dc:identifier>\n",
            UNIQUE_IDENTIFIER_ID,
            escape(metadata.identifier.as_str())
        ));
        push_element(&mut opf, "dc:language", &metadata.language);
        push_element(&mut opf, "dc:date", &metadata.date);
        push_element(&mut opf, "dc:rights", &metadata.rights);
        push_element(&mut opf, "dc:publisher", &metadata.publisher);
        for subject in &metadata.subjects {
            push_element(&mut opf, "dc:subject", subject);
        }
        if let Some(modified) = &metadata.modified {
            opf.push_str(&format!(
                "    <meta property=\"dcterms:modified\">{}</meta>\n",
                escape(modified.as_str())
            ));
        }
        opf.push_str("  </metadata>\n\n  <manifest>\n");

        for item in &self.manifest {
            opf.push_str(&format!(
                "    <item id=\"{}\" href=\"{}\" media-type=\"{}\"",
                escape(item.id.as_str()),
                escape(encode_href(&item.href).as_str()),
                escape(item.media_type.as_str())
            ));
            if let Some(properties) = &item.properties {
                opf.push_str(&format!(" properties=\"{}\"", escape(properties.as_str())));
            }
            opf.push_str("/>\n");
        }

        opf.push_str("  </manifest>\n\n  <spine>\n");
        for item in &self.spine {
            opf.push_str(&format!("    <itemref idref=\"{}\"", escape(item.idref.as_str())));
            if !item.linear {
                opf.push_str(" linear=\"no\"");
            }
            opf.push_str("/>\n");
        }
        opf.push_str("  </spine>\n</package>\n");

        opf
    }
}

fn push_element(opf: &mut String, name: &str, value: &str) {
    if value.is_empty() {
        return;
    }
    opf.push_str(&format!("    <{name}>{}</{name}>\n", escape(value)));
}
