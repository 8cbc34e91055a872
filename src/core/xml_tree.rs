//! Structural XML decoding into an untyped [`XmlNode`] tree.
//!
//! The tree follows the usual "XML as JSON" collapsing rules:
//!
//! - an element with only text becomes [`XmlNode::Text`];
//! - attributes and child elements share one [`XmlNode::Map`] namespace;
//! - repeated same-named children collapse into an [`XmlNode::List`];
//! - text next to attributes or children is kept under [`TEXT_KEY`].
//!
//! Because a lone child is never wrapped in a list, consumers reading a
//! repeatable field must go through [`XmlNode::items`].

use crate::utils::error::{EtlError, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Field holding the text of an element that also has attributes or children.
pub const TEXT_KEY: &str = "$t";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Text(String),
    List(Vec<XmlNode>),
    Map(BTreeMap<String, XmlNode>),
}

impl XmlNode {
    pub fn kind(&self) -> &'static str {
        match self {
            XmlNode::Text(_) => "text",
            XmlNode::List(_) => "sequence",
            XmlNode::Map(_) => "element",
        }
    }

    pub fn get(&self, name: &str) -> Option<&XmlNode> {
        match self {
            XmlNode::Map(fields) => fields.get(name),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            XmlNode::Text(text) => Some(text),
            _ => None,
        }
    }

    /// View a repeatable node as a sequence: a list yields its items, any
    /// other node yields itself as a one-element slice.
    pub fn items(&self) -> &[XmlNode] {
        match self {
            XmlNode::List(items) => items,
            other => std::slice::from_ref(other),
        }
    }
}

struct Frame {
    name: String,
    fields: BTreeMap<String, XmlNode>,
    text: String,
}

impl Frame {
    fn open(start: &BytesStart<'_>) -> Result<Self> {
        let name = utf8(start.name().as_ref(), "element name")?;
        let mut fields = BTreeMap::new();

        for attr in start.attributes() {
            let attr = attr.map_err(|e| malformed(format!("bad attribute in <{}>: {}", name, e)))?;
            let key = utf8(attr.key.as_ref(), "attribute name")?;
            let value = attr
                .unescape_value()
                .map_err(|e| malformed(format!("bad attribute {} in <{}>: {}", key, name, e)))?;
            insert_field(&mut fields, key, XmlNode::Text(value.into_owned()));
        }

        Ok(Self {
            name,
            fields,
            text: String::new(),
        })
    }

    fn finish(self) -> (String, XmlNode) {
        let Frame {
            name,
            mut fields,
            text,
        } = self;

        let node = if fields.is_empty() {
            XmlNode::Text(text)
        } else {
            if !text.is_empty() {
                insert_field(&mut fields, TEXT_KEY.to_string(), XmlNode::Text(text));
            }
            XmlNode::Map(fields)
        };
        (name, node)
    }
}

// 同名欄位第二次出現時轉為 List
fn insert_field(fields: &mut BTreeMap<String, XmlNode>, name: String, node: XmlNode) {
    match fields.entry(name) {
        Entry::Vacant(slot) => {
            slot.insert(node);
        }
        Entry::Occupied(mut slot) => match slot.get_mut() {
            XmlNode::List(items) => items.push(node),
            existing => {
                let first = std::mem::replace(existing, XmlNode::List(Vec::with_capacity(2)));
                *existing = XmlNode::List(vec![first, node]);
            }
        },
    }
}

fn malformed(message: impl Into<String>) -> EtlError {
    EtlError::MalformedXml {
        message: message.into(),
    }
}

fn utf8(bytes: &[u8], what: &str) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| malformed(format!("invalid UTF-8 in {}: {}", what, e)))
}

fn attach(
    stack: &mut [Frame],
    root: &mut Option<(String, XmlNode)>,
    name: String,
    node: XmlNode,
) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        insert_field(&mut parent.fields, name, node);
        return Ok(());
    }

    if let Some((existing, _)) = root {
        return Err(malformed(format!(
            "multiple root elements: <{}> after <{}>",
            name, existing
        )));
    }
    *root = Some((name, node));
    Ok(())
}

/// Decode a whole document into `{rootName: node}`.
pub fn decode(bytes: &[u8]) -> Result<XmlNode> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<(String, XmlNode)> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if stack.is_empty() {
                    if let Some((existing, _)) = &root {
                        return Err(malformed(format!(
                            "multiple root elements after <{}>",
                            existing
                        )));
                    }
                }
                stack.push(Frame::open(&e)?);
            }
            Ok(Event::Empty(e)) => {
                let (name, node) = Frame::open(&e)?.finish();
                attach(&mut stack, &mut root, name, node)?;
            }
            Ok(Event::End(e)) => {
                let frame = stack.pop().ok_or_else(|| {
                    malformed(format!(
                        "unexpected closing tag </{}>",
                        String::from_utf8_lossy(e.name().as_ref())
                    ))
                })?;
                let (name, node) = frame.finish();
                attach(&mut stack, &mut root, name, node)?;
            }
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape()
                    .map_err(|err| malformed(format!("bad text content: {}", err)))?;
                match stack.last_mut() {
                    Some(top) => top.text.push_str(&text),
                    None if text.trim().is_empty() => {}
                    None => return Err(malformed("text outside of the root element")),
                }
            }
            Ok(Event::CData(e)) => {
                let text = utf8(&e, "CDATA section")?;
                match stack.last_mut() {
                    Some(top) => top.text.push_str(&text),
                    None => return Err(malformed("CDATA outside of the root element")),
                }
            }
            Ok(Event::Eof) => break,
            // 宣告、註解、處理指令、DOCTYPE
            Ok(_) => {}
            Err(e) => {
                return Err(malformed(format!(
                    "error at position {}: {}",
                    reader.error_position(),
                    e
                )))
            }
        }
    }

    if let Some(open) = stack.last() {
        return Err(malformed(format!(
            "unexpected end of document inside <{}>",
            open.name
        )));
    }

    let (name, node) = root.ok_or_else(|| malformed("document has no root element"))?;
    let mut top = BTreeMap::new();
    top.insert(name, node);
    Ok(XmlNode::Map(top))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(value: &str) -> XmlNode {
        XmlNode::Text(value.to_string())
    }

    #[test]
    fn test_text_only_element_collapses_to_scalar() {
        let tree = decode(b"<?xml version=\"1.0\"?><Hotel>HTL1</Hotel>").unwrap();
        assert_eq!(tree.get("Hotel"), Some(&text("HTL1")));
    }

    #[test]
    fn test_repeated_children_become_sequence() {
        let tree = decode(
            br#"<Rates>
                  <Plan>BAR</Plan>
                  <Rate><Amount>100</Amount></Rate>
                  <Rate><Amount>50</Amount></Rate>
                </Rates>"#,
        )
        .unwrap();

        let rates = tree.get("Rates").unwrap();
        assert_eq!(rates.get("Plan"), Some(&text("BAR")));
        match rates.get("Rate") {
            Some(XmlNode::List(items)) => {
                assert_eq!(items.len(), 2);
                assert_eq!(items[1].get("Amount"), Some(&text("50")));
            }
            other => panic!("expected a sequence, got {:?}", other),
        }
    }

    #[test]
    fn test_single_child_is_not_wrapped() {
        let tree = decode(b"<Rates><Rate><Amount>100</Amount></Rate></Rates>").unwrap();
        let rate = tree.get("Rates").and_then(|r| r.get("Rate")).unwrap();

        assert_eq!(rate.kind(), "element");
        assert_eq!(rate.items().len(), 1);
        assert_eq!(rate.items()[0].get("Amount"), Some(&text("100")));
    }

    #[test]
    fn test_attributes_share_namespace_with_children() {
        let tree =
            decode(br#"<Rate Currency="USD" Amount="100"><Note>x</Note></Rate>"#).unwrap();
        let rate = tree.get("Rate").unwrap();

        assert_eq!(rate.get("Currency"), Some(&text("USD")));
        assert_eq!(rate.get("Amount"), Some(&text("100")));
        assert_eq!(rate.get("Note"), Some(&text("x")));
    }

    #[test]
    fn test_mixed_text_is_kept_under_text_key() {
        let tree = decode(br#"<Amount currency="EUR">120</Amount>"#).unwrap();
        let amount = tree.get("Amount").unwrap();

        assert_eq!(amount.get(TEXT_KEY), Some(&text("120")));
        assert_eq!(amount.get("currency"), Some(&text("EUR")));
    }

    #[test]
    fn test_empty_element_and_entities() {
        let tree = decode(
            b"<R><Comments/><Street>Fish &amp; Chips Ave</Street><Note><![CDATA[<raw>]]></Note></R>",
        )
        .unwrap();
        let r = tree.get("R").unwrap();

        assert_eq!(r.get("Comments"), Some(&text("")));
        assert_eq!(r.get("Street"), Some(&text("Fish & Chips Ave")));
        assert_eq!(r.get("Note"), Some(&text("<raw>")));
    }

    #[test]
    fn test_malformed_documents() {
        let cases: [&[u8]; 6] = [
            b"<a><b></a>",
            b"<a><b></b>",
            b"</a>",
            b"",
            b"<a/><b/>",
            b"<a>\xff</a>",
        ];

        for case in cases {
            assert!(
                matches!(decode(case), Err(EtlError::MalformedXml { .. })),
                "expected MalformedXml for {:?}",
                String::from_utf8_lossy(case)
            );
        }
    }

    #[test]
    fn test_leading_bom_is_ignored() {
        let tree = decode(b"\xEF\xBB\xBF<ID>B1</ID>").unwrap();
        assert_eq!(tree.get("ID"), Some(&text("B1")));
    }
}
