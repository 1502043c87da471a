//! Per-part relationship manifests (`_rels/*.rels`).

use roxmltree::Document;

use crate::error::Result;
use crate::xml::{ns, Element};

/// Relationship type URIs.
pub mod rel_types {
    pub const OFFICE_DOCUMENT: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
    pub const WORKSHEET: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
    pub const STYLES: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";
    pub const THEME: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme";
    pub const SHARED_STRINGS: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings";
    pub const TABLE: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/table";
    pub const DRAWING: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/drawing";
    pub const CHART: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/chart";
    pub const IMAGE: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
    pub const HYPERLINK: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";
    pub const CORE_PROPERTIES: &str =
        "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties";
    pub const EXTENDED_PROPERTIES: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    pub external: bool,
}

/// Relationships of one part. Ids are `rId1, rId2, …` and never reused.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relationships {
    items: Vec<Relationship>,
    next_id: u32,
}

impl Relationships {
    pub fn new() -> Self {
        Relationships {
            items: Vec::new(),
            next_id: 1,
        }
    }

    /// Add an internal relationship and return its id.
    pub fn add(&mut self, rel_type: &str, target: impl Into<String>) -> String {
        self.push(rel_type, target.into(), false)
    }

    /// Add a relationship to a URI outside the package.
    pub fn add_external(&mut self, rel_type: &str, target: impl Into<String>) -> String {
        self.push(rel_type, target.into(), true)
    }

    fn push(&mut self, rel_type: &str, target: String, external: bool) -> String {
        let id = format!("rId{}", self.next_id.max(1));
        self.next_id = self.next_id.max(1) + 1;
        self.items.push(Relationship {
            id: id.clone(),
            rel_type: rel_type.to_string(),
            target,
            external,
        });
        id
    }

    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.items.iter().find(|rel| rel.id == id)
    }

    pub fn find_by_type<'a>(&'a self, rel_type: &'a str) -> impl Iterator<Item = &'a Relationship> {
        self.items.iter().filter(move |rel| rel.rel_type == rel_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn to_element(&self) -> Element {
        Element::new("Relationships")
            .attr("xmlns", ns::PACKAGE_REL)
            .children(self.items.iter().map(|rel| {
                Element::new("Relationship")
                    .attr("Id", &rel.id)
                    .attr("Type", &rel.rel_type)
                    .attr("Target", &rel.target)
                    .opt_attr("TargetMode", rel.external.then_some("External"))
            }))
    }

    pub fn to_xml(&self) -> Result<String> {
        self.to_element().to_document()
    }

    pub fn from_xml(xml: &str) -> Result<Self> {
        let doc = Document::parse(xml)?;
        let mut rels = Relationships::new();
        for node in doc
            .descendants()
            .filter(|n| n.is_element() && n.tag_name().name() == "Relationship")
        {
            let Some(id) = node.attribute("Id") else {
                continue;
            };
            if let Some(n) = id.strip_prefix("rId").and_then(|n| n.parse::<u32>().ok()) {
                rels.next_id = rels.next_id.max(n + 1);
            }
            rels.items.push(Relationship {
                id: id.to_string(),
                rel_type: node.attribute("Type").unwrap_or_default().to_string(),
                target: node.attribute("Target").unwrap_or_default().to_string(),
                external: node.attribute("TargetMode") == Some("External"),
            });
        }
        Ok(rels)
    }
}

/// `xl/worksheets/sheet1.xml` → `xl/worksheets/_rels/sheet1.xml.rels`
pub fn rels_path_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

/// Resolve a relationship target against the part that owns it.
///
/// ```
/// use xlport_xlsx::relationships::resolve_target;
///
/// assert_eq!(resolve_target("xl/workbook.xml", "worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
/// assert_eq!(resolve_target("xl/worksheets/sheet1.xml", "../tables/table1.xml"), "xl/tables/table1.xml");
/// assert_eq!(resolve_target("xl/workbook.xml", "/xl/styles.xml"), "xl/styles.xml");
/// ```
pub fn resolve_target(base_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = base_part.split('/').collect();
    segments.pop();
    for segment in target.split('/') {
        match segment {
            "." | "" => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}
