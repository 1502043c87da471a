//! A small element tree for building package parts, serialized with quick-xml.
//!
//! Parts are assembled as values first and written in one pass, so builders
//! can attach children in any order they discover them while the writer
//! emits schema order as given.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::{Cursor, Write};

use crate::error::Result;

/// Namespace URIs used across the package.
pub mod ns {
    pub const MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
    pub const REL: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
    pub const PACKAGE_REL: &str =
        "http://schemas.openxmlformats.org/package/2006/relationships";
    pub const CONTENT_TYPES: &str =
        "http://schemas.openxmlformats.org/package/2006/content-types";
    pub const MC: &str = "http://schemas.openxmlformats.org/markup-compatibility/2006";
    pub const X14AC: &str = "http://schemas.microsoft.com/office/spreadsheetml/2009/9/ac";
    pub const X14: &str = "http://schemas.microsoft.com/office/spreadsheetml/2009/9/main";
    pub const XM: &str = "http://schemas.microsoft.com/office/excel/2006/main";
    pub const DRAWING: &str =
        "http://schemas.openxmlformats.org/drawingml/2006/spreadsheetDrawing";
    pub const DRAWINGML: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
    pub const CHART: &str = "http://schemas.openxmlformats.org/drawingml/2006/chart";
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Element {
            name: name.into(),
            ..Default::default()
        }
    }

    /// `<name val="value"/>`, the shape of most chart properties.
    pub fn val(name: impl Into<String>, value: impl ToString) -> Self {
        Element::new(name).attr("val", value)
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.attributes.push((name.into(), value.to_string()));
        self
    }

    pub fn opt_attr<V: ToString>(self, name: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.attr(name, value),
            None => self,
        }
    }

    /// Adds `name="1"` when the flag is set.
    pub fn flag(self, name: impl Into<String>, set: bool) -> Self {
        if set {
            self.attr(name, "1")
        } else {
            self
        }
    }

    pub fn child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    pub fn opt_child(self, child: Option<Element>) -> Self {
        match child {
            Some(child) => self.child(child),
            None => self,
        }
    }

    pub fn children(mut self, children: impl IntoIterator<Item = Element>) -> Self {
        self.children
            .extend(children.into_iter().map(Node::Element));
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// First child element with the given name.
    pub fn find(&self, name: &str) -> Option<&Element> {
        self.elements().find(|e| e.name == name)
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    /// Concatenated text content of the direct children.
    pub fn text_content(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Text(t) => Some(t.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }

    pub fn write<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        let mut start = BytesStart::new(self.name.as_str());
        for (name, value) in &self.attributes {
            start.push_attribute((name.as_str(), value.as_str()));
        }

        if self.children.is_empty() {
            writer.write_event(Event::Empty(start))?;
            return Ok(());
        }

        writer.write_event(Event::Start(start))?;
        for child in &self.children {
            match child {
                Node::Element(element) => element.write(writer)?,
                Node::Text(text) => writer.write_event(Event::Text(BytesText::new(text)))?,
            }
        }
        writer.write_event(Event::End(BytesEnd::new(self.name.as_str())))?;
        Ok(())
    }

    /// Serialize as a standalone part with an XML declaration.
    pub fn to_document(&self) -> Result<String> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
        writer.get_mut().write_all(b"\n")?;
        self.write(&mut writer)?;
        Ok(String::from_utf8_lossy(&writer.into_inner().into_inner()).into_owned())
    }

    /// Serialize without a declaration.
    pub fn to_fragment(&self) -> Result<String> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        self.write(&mut writer)?;
        Ok(String::from_utf8_lossy(&writer.into_inner().into_inner()).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fragment_escapes_text_and_attributes() {
        let element = Element::new("c")
            .attr("r", "A1")
            .attr("note", "a<b & \"c\"")
            .child(Element::new("v").text("1 < 2"))
            .child(Element::new("empty"));
        assert_eq!(
            element.to_fragment().unwrap(),
            r#"<c r="A1" note="a&lt;b &amp; &quot;c&quot;"><v>1 &lt; 2</v><empty/></c>"#
        );
    }

    #[test]
    fn test_document_has_declaration() {
        let doc = Element::new("root").to_document().unwrap();
        assert!(doc.starts_with(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#));
        assert!(doc.ends_with("<root/>"));
    }

    #[test]
    fn test_optional_helpers() {
        let element = Element::new("row")
            .opt_attr("ht", None::<f64>)
            .opt_attr("s", Some(3))
            .flag("hidden", false)
            .flag("customFormat", true)
            .opt_child(None);
        assert_eq!(element.attribute("s"), Some("3"));
        assert_eq!(element.attribute("customFormat"), Some("1"));
        assert_eq!(element.attribute("ht"), None);
        assert!(!element.has_children());
    }
}
