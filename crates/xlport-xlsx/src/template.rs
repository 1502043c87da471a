//! The versioned starting package every export is built on.

use crate::error::{Result, XlsxError};
use crate::package::Package;

/// Version of the embedded default template.
pub const TEMPLATE_VERSION: &str = "1.0.0";

pub const STYLES_PART: &str = "xl/styles.xml";
pub const THEME_PART: &str = "xl/theme/theme1.xml";

const DEFAULT_PARTS: [(&str, &str); 9] = [
    (
        "[Content_Types].xml",
        include_str!("../template/[Content_Types].xml"),
    ),
    ("_rels/.rels", include_str!("../template/_rels/.rels")),
    ("docProps/core.xml", include_str!("../template/docProps/core.xml")),
    ("docProps/app.xml", include_str!("../template/docProps/app.xml")),
    ("xl/workbook.xml", include_str!("../template/xl/workbook.xml")),
    (
        "xl/_rels/workbook.xml.rels",
        include_str!("../template/xl/_rels/workbook.xml.rels"),
    ),
    (STYLES_PART, include_str!("../template/xl/styles.xml")),
    (THEME_PART, include_str!("../template/xl/theme/theme1.xml")),
    (
        "xl/worksheets/sheet1.xml",
        include_str!("../template/xl/worksheets/sheet1.xml"),
    ),
];

/// A template package known to carry the parts the exporter seeds from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    package: Package,
}

impl Default for Template {
    fn default() -> Self {
        let mut package = Package::new();
        for (path, text) in DEFAULT_PARTS {
            package.set(path, text);
        }
        Template { package }
    }
}

impl Template {
    /// Use a caller-supplied package (zip bytes) as the template.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Template::from_package(Package::from_bytes(bytes)?)
    }

    pub fn from_package(package: Package) -> Result<Self> {
        for required in [STYLES_PART, THEME_PART] {
            if package.get(required).is_none() {
                return Err(XlsxError::MissingTemplatePart(required));
            }
        }
        Ok(Template { package })
    }

    pub fn styles_xml(&self) -> &str {
        self.package.get(STYLES_PART).unwrap_or_default()
    }

    pub fn theme_xml(&self) -> &str {
        self.package.get(THEME_PART).unwrap_or_default()
    }

    /// A fresh copy of the template's parts for one export.
    pub fn to_package(&self) -> Package {
        self.package.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_template_parts() {
        let template = Template::default();
        assert!(template.styles_xml().contains("<cellXfs"));
        assert!(template.theme_xml().contains("clrScheme"));
        assert_eq!(template.to_package().len(), DEFAULT_PARTS.len());
    }

    #[test]
    fn test_custom_template_requires_styles_and_theme() {
        let mut package = Template::default().to_package();
        package.remove(THEME_PART);
        let bytes = package.to_bytes().unwrap();

        assert!(matches!(
            Template::from_bytes(&bytes),
            Err(XlsxError::MissingTemplatePart(THEME_PART))
        ));
    }

    #[test]
    fn test_custom_template_round_trips_through_zip() {
        let bytes = Template::default().to_package().to_bytes().unwrap();
        let template = Template::from_bytes(&bytes).unwrap();
        assert_eq!(template, Template::default());
    }
}
