use std::collections::HashMap;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::{KmlError, Result};

/// Read-only navigation over a parsed markup tree.
///
/// The extractor only needs these operations, so any parser that can answer
/// them can feed it.
pub trait MarkupTree {
    type Node: Copy;

    /// Elements named `tag` in document order: descendants of `scope`, or the
    /// whole document when `scope` is `None`.
    fn elements_by_tag(&self, scope: Option<Self::Node>, tag: &str) -> Vec<Self::Node>;

    /// `node` itself or its nearest ancestor named `tag`.
    fn closest(&self, node: Self::Node, tag: &str) -> Option<Self::Node>;

    /// First element in document order whose `id` attribute equals `id`.
    fn element_by_id(&self, id: &str) -> Option<Self::Node>;

    /// Concatenated text of `node` and its descendants, trimmed.
    fn text(&self, node: Self::Node) -> String;

    fn tag_name(&self, node: Self::Node) -> &str;

    fn attribute(&self, node: Self::Node, name: &str) -> Option<&str>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug)]
enum Content {
    Element(NodeId),
    Text(String),
}

#[derive(Debug)]
struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    parent: Option<NodeId>,
    children: Vec<Content>,
    /// One past the arena index of the last descendant.
    end: usize,
}

/// Arena-backed element tree. Arena order is document order, so the
/// descendants of an element occupy the contiguous range after it.
#[derive(Debug, Default)]
pub struct Document {
    elements: Vec<Element>,
    ids: HashMap<String, NodeId>,
}

impl Document {
    /// Parse a complete XML document.
    ///
    /// Fails with [`KmlError::Malformed`] when the input is not well-formed:
    /// reader errors, mismatched or unclosed tags, and zero or several root
    /// elements.
    pub fn parse(xml: &str) -> Result<Self> {
        let xml = xml.strip_prefix('\u{feff}').unwrap_or(xml);
        let mut reader = Reader::from_str(xml);
        let mut doc = Document::default();
        let mut open: Vec<NodeId> = Vec::new();

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    let id = doc.open_element(&e, open.last().copied())?;
                    open.push(id);
                }
                Ok(Event::Empty(e)) => {
                    let id = doc.open_element(&e, open.last().copied())?;
                    doc.close_element(id);
                }
                Ok(Event::End(e)) => {
                    let name = decode_name(e.local_name().as_ref())?.to_string();
                    match open.pop() {
                        Some(id) if doc.elements[id.0].name == name => doc.close_element(id),
                        Some(id) => {
                            return Err(KmlError::malformed(format!(
                                "expected </{}>, found </{name}>",
                                doc.elements[id.0].name
                            )));
                        }
                        None => {
                            return Err(KmlError::malformed(format!("unexpected </{name}>")));
                        }
                    }
                }
                Ok(Event::Text(e)) => {
                    let raw = std::str::from_utf8(e.as_ref()).map_err(KmlError::malformed)?;
                    doc.push_text(open.last().copied(), raw)?;
                }
                Ok(Event::CData(e)) => {
                    let raw = std::str::from_utf8(e.as_ref()).map_err(KmlError::malformed)?;
                    doc.push_text(open.last().copied(), raw)?;
                }
                Ok(Event::GeneralRef(e)) => {
                    if open.is_empty() {
                        return Err(KmlError::malformed("entity reference outside root element"));
                    }
                    if let Ok(Some(ch)) = e.resolve_char_ref() {
                        doc.push_text(open.last().copied(), ch.encode_utf8(&mut [0; 4]))?;
                    } else {
                        let name = std::str::from_utf8(e.as_ref()).unwrap_or_default();
                        let resolved = match name {
                            "amp" => "&",
                            "lt" => "<",
                            "gt" => ">",
                            "quot" => "\"",
                            "apos" => "'",
                            _ => "", // Unknown entity, skip
                        };
                        doc.push_text(open.last().copied(), resolved)?;
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(e.into()),
                _ => {}
            }
        }

        if let Some(id) = open.last() {
            return Err(KmlError::malformed(format!(
                "unclosed <{}>",
                doc.elements[id.0].name
            )));
        }
        if doc.elements.is_empty() {
            return Err(KmlError::malformed("no root element"));
        }

        Ok(doc)
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.elements[node.0].parent
    }

    fn open_element(&mut self, start: &BytesStart<'_>, parent: Option<NodeId>) -> Result<NodeId> {
        if parent.is_none() && !self.elements.is_empty() {
            return Err(KmlError::malformed("more than one root element"));
        }

        let name = decode_name(start.local_name().as_ref())?.to_string();
        let mut attributes = Vec::new();
        for attr_result in start.attributes() {
            let attr = attr_result.map_err(|e| KmlError::from(quick_xml::Error::from(e)))?;
            let key = decode_name(attr.key.local_name().as_ref())?.to_string();
            let raw = std::str::from_utf8(&attr.value).map_err(KmlError::malformed)?;
            let value = quick_xml::escape::unescape(raw).map_err(KmlError::malformed)?;
            attributes.push((key, value.into_owned()));
        }

        let id = NodeId(self.elements.len());
        if let Some((_, value)) = attributes.iter().find(|(key, _)| key == "id") {
            self.ids.entry(value.clone()).or_insert(id);
        }
        if let Some(parent) = parent {
            self.elements[parent.0].children.push(Content::Element(id));
        }
        self.elements.push(Element {
            name,
            attributes,
            parent,
            children: Vec::new(),
            end: id.0 + 1,
        });

        Ok(id)
    }

    fn close_element(&mut self, id: NodeId) {
        self.elements[id.0].end = self.elements.len();
    }

    /// Only whitespace may appear outside the root element.
    fn push_text(&mut self, parent: Option<NodeId>, text: &str) -> Result<()> {
        let Some(parent) = parent else {
            if text.trim().is_empty() {
                return Ok(());
            }
            return Err(KmlError::malformed("text outside root element"));
        };
        if text.is_empty() {
            return Ok(());
        }
        let children = &mut self.elements[parent.0].children;
        match children.last_mut() {
            Some(Content::Text(existing)) => existing.push_str(text),
            _ => children.push(Content::Text(text.to_string())),
        }
        Ok(())
    }

    /// Depth-first over an explicit stack so nesting depth is bounded by the
    /// heap, not the call stack.
    fn collect_text(&self, node: NodeId, out: &mut String) {
        let mut pending: Vec<&Content> = self.elements[node.0].children.iter().rev().collect();
        while let Some(child) = pending.pop() {
            match child {
                Content::Text(text) => out.push_str(text),
                Content::Element(id) => pending.extend(self.elements[id.0].children.iter().rev()),
            }
        }
    }
}

impl MarkupTree for Document {
    type Node = NodeId;

    fn elements_by_tag(&self, scope: Option<NodeId>, tag: &str) -> Vec<NodeId> {
        let range = match scope {
            Some(node) => node.0 + 1..self.elements[node.0].end,
            None => 0..self.elements.len(),
        };
        range
            .filter(|&i| self.elements[i].name == tag)
            .map(NodeId)
            .collect()
    }

    fn closest(&self, node: NodeId, tag: &str) -> Option<NodeId> {
        let mut current = Some(node);
        while let Some(id) = current {
            if self.elements[id.0].name == tag {
                return Some(id);
            }
            current = self.parent(id);
        }
        None
    }

    fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.ids.get(id).copied()
    }

    fn text(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out.trim().to_string()
    }

    fn tag_name(&self, node: NodeId) -> &str {
        &self.elements[node.0].name
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.elements[node.0]
            .attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

fn decode_name(raw: &[u8]) -> Result<&str> {
    std::str::from_utf8(raw).map_err(KmlError::malformed)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
    <Style id="s1"><IconStyle><scale>1.5</scale></IconStyle></Style>
    <Placemark id="p1">
      <name>First</name>
      <LineString><coordinates>1,2 3,4</coordinates></LineString>
    </Placemark>
    <Placemark>
      <name>Second</name>
      <Point><coordinates>5,6</coordinates></Point>
    </Placemark>
  </Document>
</kml>"#;

    #[test]
    fn test_elements_by_tag_document_order() {
        let doc = Document::parse(SAMPLE).unwrap();
        let placemarks = doc.elements_by_tag(None, "Placemark");
        assert_eq!(placemarks.len(), 2);
        let names: Vec<String> = doc
            .elements_by_tag(None, "name")
            .into_iter()
            .map(|n| doc.text(n))
            .collect();
        assert_eq!(names, vec!["First", "Second"]);
    }

    #[test]
    fn test_elements_by_tag_scoped() {
        let doc = Document::parse(SAMPLE).unwrap();
        let second = doc.elements_by_tag(None, "Placemark")[1];
        let coords = doc.elements_by_tag(Some(second), "coordinates");
        assert_eq!(coords.len(), 1);
        assert_eq!(doc.text(coords[0]), "5,6");
        // The scope itself is not included
        assert!(doc.elements_by_tag(Some(second), "Placemark").is_empty());
    }

    #[test]
    fn test_closest_walks_ancestors() {
        let doc = Document::parse(SAMPLE).unwrap();
        let line = doc.elements_by_tag(None, "LineString")[0];
        let pm = doc.closest(line, "Placemark").unwrap();
        assert_eq!(doc.attribute(pm, "id"), Some("p1"));
        assert_eq!(doc.closest(pm, "Placemark"), Some(pm));
        assert!(doc.closest(line, "Folder").is_none());
    }

    #[test]
    fn test_element_by_id() {
        let doc = Document::parse(SAMPLE).unwrap();
        let style = doc.element_by_id("s1").unwrap();
        assert_eq!(doc.tag_name(style), "Style");
        assert!(doc.element_by_id("missing").is_none());
    }

    #[test]
    fn test_duplicate_id_first_wins() {
        let doc = Document::parse(r#"<a><b id="x">one</b><c id="x">two</c></a>"#).unwrap();
        let found = doc.element_by_id("x").unwrap();
        assert_eq!(doc.tag_name(found), "b");
    }

    #[test]
    fn test_text_concatenates_and_trims() {
        let doc = Document::parse("<a>  one <b>two</b> three  </a>").unwrap();
        assert_eq!(doc.text(doc.root()), "one two three");
    }

    #[test]
    fn test_cdata_and_entities() {
        let doc = Document::parse(
            "<a><![CDATA[Caf\u{e9} & Bar]]> &lt;x&gt; &#65;&#x42; &unknown;</a>",
        )
        .unwrap();
        assert_eq!(doc.text(doc.root()), "Caf\u{e9} & Bar <x> AB");
    }

    #[test]
    fn test_attribute_unescaped() {
        let doc = Document::parse(r#"<a href="x?a=1&amp;b=2"/>"#).unwrap();
        assert_eq!(doc.attribute(doc.root(), "href"), Some("x?a=1&b=2"));
    }

    #[test]
    fn test_namespace_prefix_stripped() {
        let doc = Document::parse(
            r#"<kml:kml xmlns:kml="http://www.opengis.net/kml/2.2"><kml:Point/></kml:kml>"#,
        )
        .unwrap();
        assert_eq!(doc.tag_name(doc.root()), "kml");
        assert_eq!(doc.elements_by_tag(None, "Point").len(), 1);
    }

    #[test]
    fn test_bom_ignored() {
        let doc = Document::parse("\u{feff}<kml/>").unwrap();
        assert_eq!(doc.tag_name(doc.root()), "kml");
    }

    #[test]
    fn test_parent() {
        let doc = Document::parse("<a><b/></a>").unwrap();
        let b = doc.elements_by_tag(None, "b")[0];
        assert_eq!(doc.parent(b), Some(doc.root()));
        assert_eq!(doc.parent(doc.root()), None);
    }

    #[test]
    fn test_whitespace_around_root() {
        let doc = Document::parse("\n  <kml>x</kml>\n\t ").unwrap();
        assert_eq!(doc.text(doc.root()), "x");
    }

    #[test]
    fn test_deeply_nested_text() {
        let depth = 100_000;
        let xml = format!("<name>{}x{}</name>", "<b>".repeat(depth), "</b>".repeat(depth));
        let doc = Document::parse(&xml).unwrap();
        assert_eq!(doc.text(doc.root()), "x");
        assert_eq!(doc.elements_by_tag(None, "b").len(), depth);
    }

    #[test]
    fn test_malformed_inputs() {
        let cases = [
            "",
            "   ",
            "<kml><Document></kml>",
            "<kml><Placemark>",
            "<kml></kml></extra>",
            "<a/><b/>",
            "<kml attr=\"unterminated></kml>",
            "not kml <kml/>",
            "<kml/> trailing junk",
            "<![CDATA[x]]><kml/>",
            "<kml/>&amp;",
        ];
        for xml in cases {
            let err = Document::parse(xml).unwrap_err();
            assert!(
                matches!(err, KmlError::Malformed { .. }),
                "expected malformed for {xml:?}, got {err:?}"
            );
        }
    }
}
