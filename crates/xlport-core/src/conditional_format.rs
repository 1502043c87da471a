use crate::{CellRange, Color};
use serde::{Deserialize, Serialize};

/// Comparison operators for value-based rules
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ComparisonOperator {
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Equal,
    NotEqual,
    Between,
    NotBetween,
}

/// Text match operators
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TextOperator {
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    IsEmpty,
    IsNotEmpty,
}

/// Differential format applied when a rule matches
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ConditionalFormat {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub italic: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub underline: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_color: Option<Color>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<Color>,
}

/// Types of conditional formatting rules
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ConditionalRule {
    /// Compare cell value against thresholds
    ValueBased {
        operator: ComparisonOperator,
        value1: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value2: Option<f64>, // For Between/NotBetween
        format: ConditionalFormat,
    },

    /// Match cell text against patterns
    TextBased {
        operator: TextOperator,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pattern: Option<String>,
        #[serde(default, rename = "caseSensitive")]
        case_sensitive: bool,
        format: ConditionalFormat,
    },

    /// Formula evaluated for the top-left cell of the range
    Expression {
        formula: String,
        format: ConditionalFormat,
    },

    /// Color scale based on value range in the data
    ColorScale {
        #[serde(rename = "minColor")]
        min_color: Color,
        #[serde(rename = "maxColor")]
        max_color: Color,
        #[serde(default, rename = "midColor", skip_serializing_if = "Option::is_none")]
        mid_color: Option<Color>,
    },

    DataBar { color: Color },
}

impl ConditionalRule {
    /// The differential format of rules that carry one
    pub fn format(&self) -> Option<&ConditionalFormat> {
        match self {
            ConditionalRule::ValueBased { format, .. }
            | ConditionalRule::TextBased { format, .. }
            | ConditionalRule::Expression { format, .. } => Some(format),
            ConditionalRule::ColorScale { .. } | ConditionalRule::DataBar { .. } => None,
        }
    }
}

/// A complete conditional formatting rule with range and priority
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConditionalFormattingRule {
    #[serde(default)]
    pub id: String,
    pub range: CellRange,
    pub rule: ConditionalRule,
    #[serde(default)]
    pub priority: i32, // Higher = applied later (overrides)
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl ConditionalFormattingRule {
    pub fn new(id: String, range: CellRange, rule: ConditionalRule) -> Self {
        Self {
            id,
            range,
            rule,
            priority: 0,
            enabled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_format_access() {
        let rule = ConditionalRule::ValueBased {
            operator: ComparisonOperator::GreaterThan,
            value1: 5.0,
            value2: None,
            format: ConditionalFormat {
                bold: Some(true),
                ..Default::default()
            },
        };
        assert_eq!(rule.format().and_then(|f| f.bold), Some(true));

        let scale = ConditionalRule::ColorScale {
            min_color: Color::WHITE,
            max_color: Color::RED,
            mid_color: None,
        };
        assert!(scale.format().is_none());
    }

    #[test]
    fn test_rule_json() {
        let json = r##"{"type":"colorScale","minColor":"#ffffff","maxColor":"#ff0000"}"##;
        let rule: ConditionalRule = serde_json::from_str(json).unwrap();
        assert_eq!(
            rule,
            ConditionalRule::ColorScale {
                min_color: Color::WHITE,
                max_color: Color::RED,
                mid_color: None,
            }
        );
    }
}
