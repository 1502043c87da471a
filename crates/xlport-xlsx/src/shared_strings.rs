//! Shared string table: interned cell text with reverse lookup.

use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;

use crate::error::Result;
use crate::xml::{ns, Element};

pub const PART: &str = "xl/sharedStrings.xml";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SharedStrings {
    strings: Vec<String>,
    lookup: HashMap<String, usize>,
    references: usize,
}

impl SharedStrings {
    pub fn new() -> Self {
        SharedStrings::default()
    }

    /// Index of `text`, appending it on first sight. A single leading `'`
    /// quote-escape marker is not part of the stored text.
    pub fn ensure(&mut self, text: &str) -> usize {
        let text = text.strip_prefix('\'').unwrap_or(text);
        self.references += 1;
        if let Some(&index) = self.lookup.get(text) {
            return index;
        }
        let index = self.strings.len();
        self.strings.push(text.to_string());
        self.lookup.insert(text.to_string(), index);
        index
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.strings.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Total number of cell references handed out by `ensure`.
    pub fn count(&self) -> usize {
        self.references
    }

    pub fn to_xml(&self) -> Result<String> {
        Element::new("sst")
            .attr("xmlns", ns::MAIN)
            .attr("count", self.references)
            .attr("uniqueCount", self.strings.len())
            .children(self.strings.iter().map(|s| {
                let needs_preserve = s.starts_with(char::is_whitespace)
                    || s.ends_with(char::is_whitespace);
                let t = Element::new("t").text(s.as_str());
                let t = if needs_preserve {
                    t.attr("xml:space", "preserve")
                } else {
                    t
                };
                Element::new("si").child(t)
            }))
            .to_document()
    }

    /// Read a shared string part. Rich runs are flattened to their text and
    /// phonetic runs are dropped.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(false);

        let mut table = SharedStrings::new();
        let mut buf = Vec::new();
        let mut current: Option<String> = None;
        let mut in_text = false;
        let mut phonetic_depth = 0usize;

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) => match e.local_name().as_ref() {
                    b"si" => current = Some(String::new()),
                    b"rPh" => phonetic_depth += 1,
                    b"t" if phonetic_depth == 0 => in_text = true,
                    _ => {}
                },
                Event::End(e) => match e.local_name().as_ref() {
                    b"si" => {
                        let text = current.take().unwrap_or_default();
                        table.lookup.entry(text.clone()).or_insert(table.strings.len());
                        table.strings.push(text);
                    }
                    b"rPh" => phonetic_depth = phonetic_depth.saturating_sub(1),
                    b"t" => in_text = false,
                    _ => {}
                },
                Event::Empty(e) if e.local_name().as_ref() == b"si" => {
                    table.lookup.entry(String::new()).or_insert(table.strings.len());
                    table.strings.push(String::new());
                }
                Event::Text(e) if in_text => {
                    if let Some(text) = current.as_mut() {
                        text.push_str(&e.unescape()?);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_ensure_dedupes_and_strips_quote_marker() {
        let mut strings = SharedStrings::new();
        assert_eq!(strings.ensure("apple"), 0);
        assert_eq!(strings.ensure("pear"), 1);
        assert_eq!(strings.ensure("apple"), 0);
        assert_eq!(strings.ensure("'123"), 2);
        assert_eq!(strings.get(2), Some("123"));
        assert_eq!(strings.ensure("123"), 2);
        assert_eq!(strings.len(), 3);
        assert_eq!(strings.count(), 5);
    }

    #[test]
    fn test_xml_counts_and_whitespace() {
        let mut strings = SharedStrings::new();
        strings.ensure(" padded ");
        strings.ensure("a & b");
        strings.ensure("a & b");

        let xml = strings.to_xml().unwrap();
        assert!(xml.contains(r#"count="3" uniqueCount="2""#));
        assert!(xml.contains(r#"<t xml:space="preserve"> padded </t>"#));
        assert!(xml.contains("<t>a &amp; b</t>"));
    }

    #[test]
    fn test_reads_rich_runs_and_skips_phonetics() {
        let xml = r#"<?xml version="1.0"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="3" uniqueCount="3">
  <si><t>plain</t></si>
  <si><r><rPr><b/></rPr><t>bold </t></r><r><t>tail</t></r></si>
  <si><t>東京</t><rPh sb="0" eb="2"><t>トウキョウ</t></rPh></si>
  <si/>
</sst>"#;
        let strings = SharedStrings::from_xml(xml).unwrap();
        assert_eq!(strings.get(0), Some("plain"));
        assert_eq!(strings.get(1), Some("bold tail"));
        assert_eq!(strings.get(2), Some("東京"));
        assert_eq!(strings.get(3), Some(""));
    }

    proptest! {
        #[test]
        fn prop_repeat_ensure_never_grows(texts in proptest::collection::vec("[a-z ]{0,6}", 1..20)) {
            let mut strings = SharedStrings::new();
            let first: Vec<_> = texts.iter().map(|t| strings.ensure(t)).collect();
            let size = strings.len();
            let second: Vec<_> = texts.iter().map(|t| strings.ensure(t)).collect();
            prop_assert_eq!(first, second);
            prop_assert_eq!(strings.len(), size);
        }

        #[test]
        fn prop_xml_round_trip(texts in proptest::collection::vec("[a-zA-Z0-9 <>&\"]{0,8}", 0..10)) {
            let mut strings = SharedStrings::new();
            for text in &texts {
                strings.ensure(text);
            }
            let parsed = SharedStrings::from_xml(&strings.to_xml().unwrap()).unwrap();
            prop_assert_eq!(parsed.len(), strings.len());
            for i in 0..strings.len() {
                prop_assert_eq!(parsed.get(i), strings.get(i));
            }
        }
    }
}
