use serde::{Deserialize, Serialize};

use crate::error::CellError;
use crate::range::CellRange;
use crate::style::StyleRef;

/// Represents the resolved value stored in a cell
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum CellValue {
    #[default]
    Empty,
    Number(f64),
    Text(String),
    Boolean(bool),
    Error(CellError),
}

impl CellValue {
    /// Check if the value is empty
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Try to get the value as a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            CellValue::Text(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Render the value as text, the way a header or label cell shows it
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            CellValue::Text(s) => s.clone(),
            CellValue::Boolean(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            CellValue::Error(e) => e.to_string(),
        }
    }

    /// Text values starting with a single `'` are forced to string typing.
    pub fn is_quote_escaped(&self) -> bool {
        matches!(self, CellValue::Text(s) if s.starts_with('\''))
    }
}

/// One cell of a serialized sheet.
///
/// When `formula` is present, `value` holds the value the host's calculation
/// engine computed for it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    #[serde(default)]
    pub value: CellValue,
    /// Formula text including the leading `=`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<StyleRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hyperlink: Option<String>,
    /// Name of the table this cell belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    /// Merge area covering this cell.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge: Option<CellRange>,
    /// Spill area of an array formula anchored in this cell.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spill: Option<CellRange>,
}

impl Cell {
    pub fn new(value: CellValue) -> Self {
        Cell {
            value,
            ..Default::default()
        }
    }

    /// Create a cell with a number value
    pub fn number(value: f64) -> Self {
        Cell::new(CellValue::Number(value))
    }

    /// Create a cell with a text value
    pub fn text(value: impl Into<String>) -> Self {
        Cell::new(CellValue::Text(value.into()))
    }

    /// Create a cell with a boolean value
    pub fn boolean(value: bool) -> Self {
        Cell::new(CellValue::Boolean(value))
    }

    /// Create a formula cell with its calculated value
    pub fn formula(expression: impl Into<String>, cached: CellValue) -> Self {
        Cell {
            value: cached,
            formula: Some(expression.into()),
            ..Default::default()
        }
    }

    pub fn with_style(mut self, style: impl Into<StyleRef>) -> Self {
        self.style = Some(style.into());
        self
    }

    pub fn with_hyperlink(mut self, target: impl Into<String>) -> Self {
        self.hyperlink = Some(target.into());
        self
    }

    pub fn with_merge(mut self, area: CellRange) -> Self {
        self.merge = Some(area);
        self
    }

    /// Check if this is a formula
    pub fn is_formula(&self) -> bool {
        self.formula.is_some()
    }

    /// A cell carries content when it has a value or a formula.
    pub fn has_content(&self) -> bool {
        self.formula.is_some() || !self.value.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::Style;

    #[test]
    fn test_cell_value_as_number() {
        assert_eq!(CellValue::Number(42.0).as_number(), Some(42.0));
        assert_eq!(CellValue::Boolean(true).as_number(), Some(1.0));
        assert_eq!(CellValue::Text("123".to_string()).as_number(), Some(123.0));
        assert_eq!(CellValue::Empty.as_number(), None);
    }

    #[test]
    fn test_cell_value_as_text() {
        assert_eq!(CellValue::Number(42.0).as_text(), "42");
        assert_eq!(CellValue::Number(42.5).as_text(), "42.5");
        assert_eq!(CellValue::Boolean(true).as_text(), "TRUE");
        assert_eq!(CellValue::Text("hello".to_string()).as_text(), "hello");
    }

    #[test]
    fn test_cell_creation() {
        let cell = Cell::number(42.0);
        assert_eq!(cell.value.as_number(), Some(42.0));
        assert!(cell.has_content());

        let cell = Cell::formula("=A1+B1", CellValue::Number(3.0));
        assert!(cell.is_formula());
        assert_eq!(cell.formula.as_deref(), Some("=A1+B1"));

        let cell = Cell::default().with_style(Style::default().with_bold(true));
        assert!(!cell.has_content());
    }

    #[test]
    fn test_cell_json_shape() {
        let json = r#"{"value":{"type":"Number","value":7},"style":2,"table":"Sales"}"#;
        let cell: Cell = serde_json::from_str(json).unwrap();
        assert_eq!(cell.value, CellValue::Number(7.0));
        assert_eq!(cell.style, Some(StyleRef::Index(2)));
        assert_eq!(cell.table.as_deref(), Some("Sales"));
    }

    #[test]
    fn test_quote_escape_marker() {
        assert!(CellValue::Text("'0012".into()).is_quote_escaped());
        assert!(!CellValue::Text("0012".into()).is_quote_escaped());
    }
}
