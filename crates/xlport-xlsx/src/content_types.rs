//! The `[Content_Types].xml` manifest.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::xml::{ns, Element};

pub const PART: &str = "[Content_Types].xml";

pub mod types {
    pub const RELATIONSHIPS: &str = "application/vnd.openxmlformats-package.relationships+xml";
    pub const XML: &str = "application/xml";
    pub const WORKBOOK: &str =
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml";
    pub const WORKSHEET: &str =
        "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";
    pub const STYLES: &str =
        "application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml";
    pub const THEME: &str = "application/vnd.openxmlformats-officedocument.theme+xml";
    pub const SHARED_STRINGS: &str =
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml";
    pub const TABLE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.table+xml";
    pub const DRAWING: &str = "application/vnd.openxmlformats-officedocument.drawing+xml";
    pub const CHART: &str = "application/vnd.openxmlformats-officedocument.drawingml.chart+xml";
    pub const CORE_PROPERTIES: &str = "application/vnd.openxmlformats-package.core-properties+xml";
    pub const EXTENDED_PROPERTIES: &str =
        "application/vnd.openxmlformats-officedocument.extended-properties+xml";
}

/// Extension defaults plus per-part overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentTypes {
    defaults: BTreeMap<String, String>,
    overrides: BTreeMap<String, String>,
}

impl Default for ContentTypes {
    fn default() -> Self {
        let mut content_types = ContentTypes {
            defaults: BTreeMap::new(),
            overrides: BTreeMap::new(),
        };
        content_types.add_default("rels", types::RELATIONSHIPS);
        content_types.add_default("xml", types::XML);
        content_types
    }
}

impl ContentTypes {
    pub fn new() -> Self {
        ContentTypes::default()
    }

    pub fn add_default(&mut self, extension: &str, content_type: &str) {
        self.defaults
            .insert(extension.to_ascii_lowercase(), content_type.to_string());
    }

    /// Register a part by its archive path (with or without leading `/`).
    pub fn add_override(&mut self, part: &str, content_type: &str) {
        let name = format!("/{}", part.trim_start_matches('/'));
        self.overrides.insert(name, content_type.to_string());
    }

    pub fn default_for(&self, extension: &str) -> Option<&str> {
        self.defaults
            .get(&extension.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn override_for(&self, part: &str) -> Option<&str> {
        self.overrides
            .get(&format!("/{}", part.trim_start_matches('/')))
            .map(String::as_str)
    }

    pub fn to_xml(&self) -> Result<String> {
        Element::new("Types")
            .attr("xmlns", ns::CONTENT_TYPES)
            .children(self.defaults.iter().map(|(extension, content_type)| {
                Element::new("Default")
                    .attr("Extension", extension)
                    .attr("ContentType", content_type)
            }))
            .children(self.overrides.iter().map(|(part, content_type)| {
                Element::new("Override")
                    .attr("PartName", part)
                    .attr("ContentType", content_type)
            }))
            .to_document()
    }
}
