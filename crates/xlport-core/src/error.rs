use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents possible cell errors (Excel-compatible)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellError {
    /// #DIV/0! - Division by zero
    DivisionByZero,
    /// #VALUE! - Invalid value type
    InvalidValue,
    /// #REF! - Invalid cell reference
    InvalidReference,
    /// #NAME? - Unrecognized function or name
    InvalidName,
    /// #NULL! - Null intersection
    NullError,
    /// #NUM! - Invalid numeric value
    NumError,
    /// #N/A - Value not available
    NotAvailable,
    /// #SPILL! - Array result blocked
    Spill,
    /// #CALC! - Calculation engine limitation
    Calc,
    /// Circular reference detected
    CircularReference,
}

impl CellError {
    /// The error literal as written into a workbook cell.
    ///
    /// Circular references have no literal of their own and are stored as `#REF!`.
    pub fn code(&self) -> &'static str {
        match self {
            CellError::DivisionByZero => "#DIV/0!",
            CellError::InvalidValue => "#VALUE!",
            CellError::InvalidReference | CellError::CircularReference => "#REF!",
            CellError::InvalidName => "#NAME?",
            CellError::NullError => "#NULL!",
            CellError::NumError => "#NUM!",
            CellError::NotAvailable => "#N/A",
            CellError::Spill => "#SPILL!",
            CellError::Calc => "#CALC!",
        }
    }

    /// Parse a workbook error literal such as `#DIV/0!`.
    pub fn from_code(code: &str) -> Option<Self> {
        let error = match code.trim().to_ascii_uppercase().as_str() {
            "#DIV/0!" => CellError::DivisionByZero,
            "#VALUE!" => CellError::InvalidValue,
            "#REF!" => CellError::InvalidReference,
            "#NAME?" => CellError::InvalidName,
            "#NULL!" => CellError::NullError,
            "#NUM!" => CellError::NumError,
            "#N/A" => CellError::NotAvailable,
            "#SPILL!" => CellError::Spill,
            "#CALC!" => CellError::Calc,
            _ => return None,
        };
        Some(error)
    }
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellError::CircularReference => write!(f, "#CIRCULAR!"),
            other => write!(f, "{}", other.code()),
        }
    }
}

/// Errors raised while validating or decoding a serialized model.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("invalid sheet name {name:?}: {reason}")]
    InvalidSheetName { name: String, reason: &'static str },
    #[error("duplicate sheet name {0:?}")]
    DuplicateSheetName(String),
    #[error("model has no sheets")]
    Empty,
    #[error("malformed model JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_round_trip() {
        for error in [
            CellError::DivisionByZero,
            CellError::InvalidValue,
            CellError::InvalidName,
            CellError::NotAvailable,
            CellError::Spill,
        ] {
            assert_eq!(CellError::from_code(error.code()), Some(error));
        }
        assert_eq!(CellError::from_code("#bogus"), None);
    }

    #[test]
    fn test_circular_is_stored_as_ref() {
        assert_eq!(CellError::CircularReference.code(), "#REF!");
        assert_eq!(CellError::CircularReference.to_string(), "#CIRCULAR!");
    }
}
