// 📄 XML Reader
// Loads a vendor PLC export into a raw element tree. Well-formedness and the root
// dialect are checked here; nothing about PLC semantics is.

use crate::error::{ImportError, ImportResult};
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// ============================================================================
// VENDOR DIALECTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Vendor {
    Rockwell,
    Siemens,
    Schneider,
}

impl Vendor {
    /// Detect the vendor from the root element's local name
    pub fn from_root(local_name: &str) -> Option<Vendor> {
        match local_name {
            "RSLogix5000Content" => Some(Vendor::Rockwell),
            "SiemensProject" => Some(Vendor::Siemens),
            "UnityProject" => Some(Vendor::Schneider),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Vendor::Rockwell => "rockwell",
            Vendor::Siemens => "siemens",
            Vendor::Schneider => "schneider",
        }
    }

    /// Only the Rockwell L5X layout has a mapping schema
    pub fn has_schema(&self) -> bool {
        matches!(self, Vendor::Rockwell)
    }
}

// ============================================================================
// RAW TREE
// ============================================================================

/// One XML element. Attributes are kept sorted so attribute order never matters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlNode {
    pub name: String,
    pub attributes: BTreeMap<String, String>,
    /// Text and CDATA before the first child element, trimmed
    pub text: String,
    pub children: Vec<XmlNode>,
    /// Text following this element inside its parent, so mixed content keeps its order
    pub tail: String,
}

impl XmlNode {
    pub fn new(name: impl Into<String>) -> Self {
        XmlNode {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Serialize with sorted attributes and trimmed text.
    /// Two exports that differ only in whitespace or attribute order serialize identically.
    pub fn to_canonical_xml(&self) -> String {
        let mut out = String::new();
        self.write_canonical(&mut out);
        out
    }

    fn write_canonical(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attributes {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&escape(value.as_str()));
            out.push('"');
        }
        if self.text.is_empty() && self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        out.push_str(&escape(self.text.as_str()));
        for child in &self.children {
            child.write_canonical(out);
            out.push_str(&escape(child.tail.as_str()));
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

/// Output of the reader: the tree plus what the root told us about the dialect
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub root: XmlNode,
    pub vendor: Vendor,
    pub schema_revision: String,
}

// ============================================================================
// READER
// ============================================================================

pub struct XmlReader {
    supported_majors: Vec<u32>,
}

impl XmlReader {
    pub fn new(supported_majors: Vec<u32>) -> Self {
        XmlReader { supported_majors }
    }

    /// Read a file, returning the parsed tree and the untouched bytes (needed for hashing)
    pub fn read_file(&self, path: &Path) -> ImportResult<(RawDocument, Vec<u8>)> {
        let bytes = std::fs::read(path).map_err(|source| ImportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let document = self.read(&bytes)?;
        Ok((document, bytes))
    }

    pub fn read(&self, bytes: &[u8]) -> ImportResult<RawDocument> {
        let root = parse_tree(bytes)?;

        let vendor = Vendor::from_root(&root.name).ok_or_else(|| {
            ImportError::UnsupportedSchemaVersion {
                found: root.name.clone(),
                detail: "unrecognized PLC vendor root element".to_string(),
            }
        })?;

        if !vendor.has_schema() {
            return Err(ImportError::UnsupportedSchemaVersion {
                found: root.name.clone(),
                detail: format!("no schema registered for vendor '{}'", vendor.code()),
            });
        }

        let revision = root
            .attr("SchemaRevision")
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| ImportError::UnsupportedSchemaVersion {
                found: String::new(),
                detail: format!("root <{}> has no SchemaRevision attribute", root.name),
            })?
            .to_string();

        let major = revision
            .split('.')
            .next()
            .and_then(|m| m.trim().parse::<u32>().ok());
        match major {
            Some(m) if self.supported_majors.contains(&m) => {}
            _ => {
                return Err(ImportError::UnsupportedSchemaVersion {
                    found: revision,
                    detail: format!("supported major revisions: {:?}", self.supported_majors),
                })
            }
        }

        Ok(RawDocument {
            root,
            vendor,
            schema_revision: revision,
        })
    }
}

impl Default for XmlReader {
    fn default() -> Self {
        XmlReader::new(vec![1])
    }
}

/// Read with the default supported revisions
pub fn read_document(bytes: &[u8]) -> ImportResult<RawDocument> {
    XmlReader::default().read(bytes)
}

fn parse_tree(bytes: &[u8]) -> ImportResult<XmlNode> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| ImportError::malformed(format!("document is not UTF-8: {e}"), e.valid_up_to() as u64))?;

    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;

    loop {
        let position = reader.buffer_position() as u64;
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => {
                return Err(ImportError::malformed(
                    e.to_string(),
                    reader.error_position() as u64,
                ))
            }
        };

        match event {
            Event::Start(ref e) => {
                if root.is_some() {
                    return Err(ImportError::malformed("content after the root element", position));
                }
                stack.push(start_node(e, position)?);
            }
            Event::Empty(ref e) => {
                if root.is_some() {
                    return Err(ImportError::malformed("content after the root element", position));
                }
                let node = start_node(e, position)?;
                close_node(node, &mut stack, &mut root);
            }
            Event::End(_) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| ImportError::malformed("unexpected closing tag", position))?;
                close_node(node, &mut stack, &mut root);
            }
            Event::Text(ref t) => {
                let value = t
                    .unescape()
                    .map_err(|e| ImportError::malformed(e.to_string(), position))?;
                append_text(&mut stack, value.trim(), position)?;
            }
            Event::CData(ref c) => {
                let value = std::str::from_utf8(c)
                    .map_err(|e| ImportError::malformed(e.to_string(), position))?;
                append_text(&mut stack, value.trim(), position)?;
            }
            Event::Eof => break,
            // declaration, comments, processing instructions, doctype
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(ImportError::malformed(
            format!("unclosed element <{}>", stack[stack.len() - 1].name),
            reader.buffer_position() as u64,
        ));
    }

    root.ok_or_else(|| ImportError::malformed("document has no root element", 0))
}

fn start_node(e: &BytesStart<'_>, position: u64) -> ImportResult<XmlNode> {
    let name = std::str::from_utf8(e.local_name().as_ref())
        .map_err(|err| ImportError::malformed(format!("invalid element name: {err}"), position))?
        .to_string();

    let mut node = XmlNode::new(name);
    for attr in e.attributes() {
        let attr = attr.map_err(|err| ImportError::malformed(err.to_string(), position))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|err| ImportError::malformed(err.to_string(), position))?;
        if key == "xmlns" || key.starts_with("xmlns:") {
            continue;
        }
        let value = attr
            .unescape_value()
            .map_err(|err| ImportError::malformed(err.to_string(), position))?;
        if node.attributes.insert(key.to_string(), value.into_owned()).is_some() {
            return Err(ImportError::malformed(format!("duplicate attribute '{key}'"), position));
        }
    }
    Ok(node)
}

fn close_node(node: XmlNode, stack: &mut [XmlNode], root: &mut Option<XmlNode>) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => *root = Some(node),
    }
}

fn append_text(stack: &mut [XmlNode], value: &str, position: u64) -> ImportResult<()> {
    if value.is_empty() {
        return Ok(());
    }
    match stack.last_mut() {
        Some(node) => {
            let target = match node.children.last_mut() {
                Some(previous) => &mut previous.tail,
                None => &mut node.text,
            };
            if !target.is_empty() {
                target.push(' ');
            }
            target.push_str(value);
            Ok(())
        }
        None => Err(ImportError::malformed("text outside the root element", position)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<RSLogix5000Content SchemaRevision="1.0" SoftwareRevision="32.00">
  <Controller Name="C1"/>
</RSLogix5000Content>"#;

    #[test]
    fn test_reads_minimal_export() {
        let doc = read_document(MINIMAL.as_bytes()).unwrap();
        assert_eq!(doc.vendor, Vendor::Rockwell);
        assert_eq!(doc.schema_revision, "1.0");
        assert_eq!(doc.root.children.len(), 1);
        assert_eq!(doc.root.children[0].attr("Name"), Some("C1"));
    }

    #[test]
    fn test_unparsable_xml_is_malformed() {
        let err = read_document(b"<RSLogix5000Content SchemaRevision=\"1.0\"><Controller></RSLogix5000Content>")
            .unwrap_err();
        assert!(matches!(err, ImportError::MalformedDocument { .. }), "{err}");

        let err = read_document(b"<RSLogix5000Content SchemaRevision=\"1.0\">").unwrap_err();
        assert!(matches!(err, ImportError::MalformedDocument { .. }), "{err}");

        let err = read_document(b"").unwrap_err();
        assert!(matches!(err, ImportError::MalformedDocument { .. }), "{err}");
    }

    #[test]
    fn test_non_utf8_is_malformed() {
        let err = read_document(&[0x3c, 0x61, 0xff, 0x3e]).unwrap_err();
        assert!(matches!(err, ImportError::MalformedDocument { .. }));
    }

    #[test]
    fn test_missing_schema_revision_is_unsupported() {
        let err = read_document(b"<RSLogix5000Content><Controller Name=\"C1\"/></RSLogix5000Content>")
            .unwrap_err();
        assert!(matches!(err, ImportError::UnsupportedSchemaVersion { .. }), "{err}");
    }

    #[test]
    fn test_unknown_root_is_unsupported() {
        let err = read_document(b"<Project SchemaRevision=\"1.0\"/>").unwrap_err();
        assert!(matches!(err, ImportError::UnsupportedSchemaVersion { .. }));
    }

    #[test]
    fn test_vendor_without_schema_is_unsupported() {
        let err = read_document(b"<SiemensProject SchemaRevision=\"1.0\"/>").unwrap_err();
        match err {
            ImportError::UnsupportedSchemaVersion { detail, .. } => assert!(detail.contains("siemens")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unsupported_major_revision() {
        let err = read_document(b"<RSLogix5000Content SchemaRevision=\"2.1\"/>").unwrap_err();
        assert!(matches!(err, ImportError::UnsupportedSchemaVersion { ref found, .. } if found == "2.1"));

        let reader = XmlReader::new(vec![1, 2]);
        assert!(reader.read(b"<RSLogix5000Content SchemaRevision=\"2.1\"/>").is_ok());
    }

    #[test]
    fn test_namespace_prefix_is_stripped() {
        let doc = read_document(
            b"<l5x:RSLogix5000Content xmlns:l5x=\"urn:rockwell\" SchemaRevision=\"1.0\"/>",
        )
        .unwrap();
        assert_eq!(doc.root.name, "RSLogix5000Content");
        assert!(doc.root.attr("xmlns:l5x").is_none());
    }

    #[test]
    fn test_canonical_form_ignores_attribute_order_and_whitespace() {
        let a = read_document(
            b"<RSLogix5000Content SchemaRevision=\"1.0\" B=\"2\" A=\"1\">\n  <X>  hi  </X>\n</RSLogix5000Content>",
        )
        .unwrap();
        let b = read_document(
            b"<RSLogix5000Content A=\"1\" SchemaRevision=\"1.0\" B=\"2\"><X>hi</X></RSLogix5000Content>",
        )
        .unwrap();
        assert_eq!(a.root.to_canonical_xml(), b.root.to_canonical_xml());
    }

    #[test]
    fn test_cdata_and_entities_become_text() {
        let doc = read_document(
            b"<RSLogix5000Content SchemaRevision=\"1.0\"><D><![CDATA[a < b]]></D><E>x &amp; y</E></RSLogix5000Content>",
        )
        .unwrap();
        assert_eq!(doc.root.child("D").unwrap().text, "a < b");
        assert_eq!(doc.root.child("E").unwrap().text, "x & y");
        assert!(doc.root.to_canonical_xml().contains("<D>a &lt; b</D>"));
    }

    #[test]
    fn test_mixed_content_keeps_text_position() {
        let split = read_document(b"<RSLogix5000Content SchemaRevision=\"1.0\"><a>x<b/>y</a></RSLogix5000Content>").unwrap();
        let joined = read_document(b"<RSLogix5000Content SchemaRevision=\"1.0\"><a>x y<b/></a></RSLogix5000Content>").unwrap();

        let a = split.root.child("a").unwrap();
        assert_eq!(a.text, "x");
        assert_eq!(a.children[0].tail, "y");
        assert_eq!(a.to_canonical_xml(), "<a>x<b/>y</a>");
        assert_ne!(a.to_canonical_xml(), joined.root.child("a").unwrap().to_canonical_xml());
    }

    #[test]
    fn test_read_file_returns_raw_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plant.L5X");
        std::fs::write(&path, MINIMAL).unwrap();

        let (doc, bytes) = XmlReader::default().read_file(&path).unwrap();
        assert_eq!(doc.vendor, Vendor::Rockwell);
        assert_eq!(bytes, MINIMAL.as_bytes());

        let err = XmlReader::default().read_file(&dir.path().join("missing.L5X")).unwrap_err();
        assert!(matches!(err, ImportError::Io { .. }));
    }
}
