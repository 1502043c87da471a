use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::ModelError;
use crate::sheet::SerializedSheet;
use crate::style::{Style, StyleRef};
use crate::table::Table;

/// Maximum length of a sheet name in a workbook
pub const MAX_SHEET_NAME_LEN: usize = 31;

const FORBIDDEN_SHEET_CHARS: &[char] = &['[', ']', ':', '*', '?', '/', '\\'];

/// A workbook-level named range or expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedExpression {
    pub name: String,
    /// Formula text, with or without a leading `=`.
    pub expression: String,
    /// Id of the sheet the name is scoped to; workbook scope when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default)]
    pub hidden: bool,
}

/// A user-defined function: `name(parameters...) = expression`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MacroFunction {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<String>,
    pub expression: String,
}

/// Snapshot of a whole workbook as handed over by the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SerializedModel {
    pub sheets: Vec<SerializedSheet>,
    /// Id of the active sheet.
    pub active_sheet: Option<String>,
    pub named: Vec<NamedExpression>,
    pub macros: Vec<MacroFunction>,
    pub tables: Vec<Table>,
    /// Shared style array that `StyleRef::Index` points into.
    pub styles: Vec<Style>,
}

impl SerializedModel {
    pub fn new(sheets: Vec<SerializedSheet>) -> Self {
        SerializedModel {
            active_sheet: sheets.first().map(|s| s.id.clone()),
            sheets,
            ..Default::default()
        }
    }

    pub fn sheet_by_id(&self, id: &str) -> Option<&SerializedSheet> {
        self.sheets.iter().find(|s| s.id == id)
    }

    pub fn sheet_index(&self, id: &str) -> Option<usize> {
        self.sheets.iter().position(|s| s.id == id)
    }

    pub fn sheet_by_name(&self, name: &str) -> Option<&SerializedSheet> {
        self.sheets.iter().find(|s| s.name.eq_ignore_ascii_case(name))
    }

    pub fn table_by_name(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Resolve a style reference against the shared style array
    pub fn resolve_style<'a>(&'a self, style: Option<&'a StyleRef>) -> Option<&'a Style> {
        style.and_then(|s| s.resolve(&self.styles))
    }

    /// Check the structural rules a workbook must satisfy.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.sheets.is_empty() {
            return Err(ModelError::Empty);
        }
        let mut seen = HashSet::new();
        for sheet in &self.sheets {
            validate_sheet_name(&sheet.name)?;
            if !seen.insert(sheet.name.to_lowercase()) {
                return Err(ModelError::DuplicateSheetName(sheet.name.clone()));
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, ModelError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Validate a sheet name against workbook naming rules.
pub fn validate_sheet_name(name: &str) -> Result<(), ModelError> {
    let invalid = |reason| ModelError::InvalidSheetName {
        name: name.to_string(),
        reason,
    };
    if name.trim().is_empty() {
        return Err(invalid("name is empty"));
    }
    if name.chars().count() > MAX_SHEET_NAME_LEN {
        return Err(invalid("name is longer than 31 characters"));
    }
    if name.contains(FORBIDDEN_SHEET_CHARS) {
        return Err(invalid("name contains one of [ ] : * ? / \\"));
    }
    if name.starts_with('\'') || name.ends_with('\'') {
        return Err(invalid("name starts or ends with an apostrophe"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_bad_models() {
        assert!(matches!(SerializedModel::default().validate(), Err(ModelError::Empty)));

        let model = SerializedModel::new(vec![
            SerializedSheet::new("a", "Data"),
            SerializedSheet::new("b", "DATA"),
        ]);
        assert!(matches!(model.validate(), Err(ModelError::DuplicateSheetName(_))));

        let model = SerializedModel::new(vec![SerializedSheet::new("a", "Q1/Q2")]);
        assert!(matches!(model.validate(), Err(ModelError::InvalidSheetName { .. })));

        let model = SerializedModel::new(vec![SerializedSheet::new("a", "x".repeat(32))]);
        assert!(model.validate().is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let mut model = SerializedModel::new(vec![SerializedSheet::new("a", "Sheet1")]);
        model.styles.push(Style::new().with_bold(true));
        let json = model.to_json().unwrap();
        let back = SerializedModel::from_json(&json).unwrap();
        assert_eq!(back, model);
        assert_eq!(back.active_sheet.as_deref(), Some("a"));
    }

    #[test]
    fn test_out_of_range_style_is_no_style() {
        let model = SerializedModel::default();
        let style = StyleRef::Index(3);
        assert!(model.resolve_style(Some(&style)).is_none());
    }
}
