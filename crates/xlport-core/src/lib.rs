//! Serialized spreadsheet model.
//!
//! This is the snapshot a host application hands to the export engine and
//! the shape the importer produces: sheets with sparse cell data, layered
//! styles, tables, annotations, validations and conditional formats.

pub mod annotation;
pub mod cell;
pub mod conditional_format;
pub mod error;
pub mod model;
pub mod range;
pub mod sheet;
pub mod style;
pub mod table;
pub mod validation;

pub use annotation::{Annotation, AnnotationKind, LayoutCorner, Placement};
pub use cell::{Cell, CellValue};
pub use conditional_format::{
    ComparisonOperator, ConditionalFormat, ConditionalFormattingRule, ConditionalRule,
    TextOperator,
};
pub use error::{CellError, ModelError};
pub use model::{MacroFunction, NamedExpression, SerializedModel};
pub use range::{col_from_label, col_to_label, AreaRef, CellCoord, CellRange};
pub use sheet::{ColumnData, RowData, SerializedSheet, SheetVisibility};
pub use style::{
    BorderEdge, BorderStyle, Color, ColorRef, HorizontalAlign, Style, StyleRef, VerticalAlign,
};
pub use table::{Table, TableStyle};
pub use validation::{
    AlertStyle, DataValidationRule, ListSource, ValidationAlert, ValidationCriteria,
    ValidationMessage, ValidationOperator,
};
