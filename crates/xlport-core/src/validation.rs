use crate::CellRange;
use serde::{Deserialize, Serialize};

/// Comparison operators for validation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ValidationOperator {
    Between,
    NotBetween,
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

/// Source for dropdown list values
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ListSource {
    /// Static list of values
    Values { items: Vec<String> },
    /// Reference to a cell range (stored as string like "A1:A10" or "Sheet2!B1:B20")
    Range { reference: String },
}

/// Validation criteria types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ValidationCriteria {
    /// Dropdown list
    List {
        source: ListSource,
        #[serde(default = "default_true", rename = "showDropdown")]
        show_dropdown: bool,
    },

    /// Whole number validation
    WholeNumber {
        operator: ValidationOperator,
        value1: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value2: Option<i64>,
    },

    /// Decimal number validation
    Decimal {
        operator: ValidationOperator,
        value1: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value2: Option<f64>,
    },

    /// Text length validation
    TextLength {
        operator: ValidationOperator,
        value1: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value2: Option<usize>,
    },

    /// Date validation (Unix timestamps in seconds)
    Date {
        operator: ValidationOperator,
        value1: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value2: Option<i64>,
    },

    /// Custom formula (must evaluate to TRUE)
    Custom { formula: String },

    /// Any value allowed (keeps the input message only)
    Any,
}

fn default_true() -> bool {
    true
}

/// Alert style when validation fails
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum AlertStyle {
    /// Prevents invalid entry (default)
    #[default]
    Stop,
    /// Shows warning but allows entry
    Warning,
    /// Shows information but allows entry
    Information,
}

/// Message to show to user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ValidationMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Error alert configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ValidationAlert {
    #[serde(default)]
    pub style: AlertStyle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A complete data validation rule
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataValidationRule {
    #[serde(default)]
    pub id: String,
    pub range: CellRange,
    pub criteria: ValidationCriteria,
    #[serde(default = "default_true")]
    pub allow_blank: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_message: Option<ValidationMessage>,
    #[serde(default)]
    pub error_alert: ValidationAlert,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl DataValidationRule {
    pub fn new(id: String, range: CellRange, criteria: ValidationCriteria) -> Self {
        Self {
            id,
            range,
            criteria,
            allow_blank: true,
            input_message: None,
            error_alert: ValidationAlert::default(),
            enabled: true,
        }
    }
}

/// Convert a Unix timestamp (seconds) to a 1900-system date serial.
///
/// ```
/// use xlport_core::validation::unix_to_serial_date;
///
/// assert_eq!(unix_to_serial_date(0), 25569.0);
/// assert_eq!(unix_to_serial_date(86_400), 25570.0);
/// ```
pub fn unix_to_serial_date(seconds: i64) -> f64 {
    seconds as f64 / 86_400.0 + 25_569.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_defaults() {
        let rule = DataValidationRule::new(
            "test".into(),
            CellRange::from_a1("A1:A10").unwrap(),
            ValidationCriteria::Any,
        );
        assert!(rule.allow_blank);
        assert!(rule.enabled);
        assert_eq!(rule.error_alert.style, AlertStyle::Stop);
    }

    #[test]
    fn test_list_criteria_json() {
        let json = r#"{
            "range": {"start": {"row": 0, "col": 0}, "end": {"row": 9, "col": 0}},
            "criteria": {"type": "list", "source": {"type": "values", "items": ["Yes", "No"]}}
        }"#;
        let rule: DataValidationRule = serde_json::from_str(json).unwrap();
        assert_eq!(
            rule.criteria,
            ValidationCriteria::List {
                source: ListSource::Values {
                    items: vec!["Yes".into(), "No".into()]
                },
                show_dropdown: true,
            }
        );
    }
}
