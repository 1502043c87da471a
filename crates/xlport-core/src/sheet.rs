use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::annotation::Annotation;
use crate::cell::Cell;
use crate::conditional_format::ConditionalFormattingRule;
use crate::range::{CellCoord, CellRange};
use crate::style::{ColorRef, StyleRef};
use crate::validation::DataValidationRule;

/// Default row height in pixels
pub const DEFAULT_ROW_HEIGHT: f64 = 24.0;
/// Default column width in pixels
pub const DEFAULT_COL_WIDTH: f64 = 100.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SheetVisibility {
    #[default]
    Visible,
    Hidden,
    VeryHidden,
}

/// One row of sparse cell data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RowData {
    /// Height in pixels; the sheet default applies when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub hidden: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<StyleRef>,
    pub cells: BTreeMap<u32, Cell>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ColumnData {
    /// Width in pixels; the sheet default applies when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub hidden: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<StyleRef>,
}

/// A sheet as handed over by the host for export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedSheet {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub visibility: SheetVisibility,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_color: Option<ColorRef>,
    #[serde(default = "default_row_height")]
    pub default_row_height: f64,
    #[serde(default = "default_col_width")]
    pub default_column_width: f64,
    #[serde(default)]
    pub frozen_rows: u32,
    #[serde(default)]
    pub frozen_columns: u32,
    /// Sheet-wide style layer, the bottom of the cascade.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<StyleRef>,
    #[serde(default)]
    pub rows: BTreeMap<u32, RowData>,
    #[serde(default)]
    pub columns: BTreeMap<u32, ColumnData>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(default)]
    pub conditional_formats: Vec<ConditionalFormattingRule>,
    #[serde(default)]
    pub data_validations: Vec<DataValidationRule>,
    /// Background picture as a data URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_image: Option<String>,
}

fn default_row_height() -> f64 {
    DEFAULT_ROW_HEIGHT
}

fn default_col_width() -> f64 {
    DEFAULT_COL_WIDTH
}

impl SerializedSheet {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        SerializedSheet {
            id: id.into(),
            name: name.into(),
            visibility: SheetVisibility::Visible,
            tab_color: None,
            default_row_height: DEFAULT_ROW_HEIGHT,
            default_column_width: DEFAULT_COL_WIDTH,
            frozen_rows: 0,
            frozen_columns: 0,
            style: None,
            rows: BTreeMap::new(),
            columns: BTreeMap::new(),
            annotations: Vec::new(),
            conditional_formats: Vec::new(),
            data_validations: Vec::new(),
            background_image: None,
        }
    }

    pub fn get_cell(&self, coord: CellCoord) -> Option<&Cell> {
        self.rows.get(&coord.row)?.cells.get(&coord.col)
    }

    pub fn get_cell_mut(&mut self, coord: CellCoord) -> Option<&mut Cell> {
        self.rows.get_mut(&coord.row)?.cells.get_mut(&coord.col)
    }

    pub fn set_cell(&mut self, coord: CellCoord, cell: Cell) {
        self.rows
            .entry(coord.row)
            .or_default()
            .cells
            .insert(coord.col, cell);
    }

    /// Row height in pixels, falling back to the sheet default
    pub fn row_height(&self, row: u32) -> f64 {
        self.rows
            .get(&row)
            .and_then(|r| r.height)
            .unwrap_or(self.default_row_height)
    }

    /// Column width in pixels, falling back to the sheet default
    pub fn col_width(&self, col: u32) -> f64 {
        self.columns
            .get(&col)
            .and_then(|c| c.width)
            .unwrap_or(self.default_column_width)
    }

    pub fn set_row_height(&mut self, row: u32, height: f64) {
        self.rows.entry(row).or_default().height = Some(height);
    }

    pub fn set_col_width(&mut self, col: u32, width: f64) {
        self.columns.entry(col).or_default().width = Some(width);
    }

    /// Iterate over all stored cells in row-major order
    pub fn cells(&self) -> impl Iterator<Item = (CellCoord, &Cell)> + '_ {
        self.rows.iter().flat_map(|(row, data)| {
            data.cells
                .iter()
                .map(move |(col, cell)| (CellCoord::new(*row, *col), cell))
        })
    }

    /// Bounding box of all cells that carry content
    pub fn used_range(&self) -> Option<CellRange> {
        self.cells()
            .filter(|(_, cell)| cell.has_content())
            .map(|(coord, _)| CellRange::single(coord))
            .reduce(|acc, r| acc.union(&r))
    }

    pub fn is_visible(&self) -> bool {
        self.visibility == SheetVisibility::Visible
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparse_access() {
        let mut sheet = SerializedSheet::new("s1", "Data");
        sheet.set_cell(CellCoord::new(2, 3), Cell::number(1.0));
        sheet.set_cell(CellCoord::new(0, 1), Cell::text("x"));

        assert!(sheet.get_cell(CellCoord::new(2, 3)).is_some());
        assert!(sheet.get_cell(CellCoord::new(2, 2)).is_none());

        let order: Vec<_> = sheet.cells().map(|(c, _)| c.to_a1()).collect();
        assert_eq!(order, vec!["B1", "D3"]);
        assert_eq!(sheet.used_range().map(|r| r.to_a1()), Some("B1:D3".to_string()));
    }

    #[test]
    fn test_size_fallbacks() {
        let mut sheet = SerializedSheet::new("s1", "Data");
        sheet.set_row_height(4, 40.0);
        sheet.set_col_width(1, 64.0);

        assert_eq!(sheet.row_height(4), 40.0);
        assert_eq!(sheet.row_height(5), DEFAULT_ROW_HEIGHT);
        assert_eq!(sheet.col_width(1), 64.0);
        assert_eq!(sheet.col_width(0), DEFAULT_COL_WIDTH);
    }

    #[test]
    fn test_minimal_json_uses_defaults() {
        let sheet: SerializedSheet =
            serde_json::from_str(r#"{"id":"a","name":"Sheet1"}"#).unwrap();
        assert_eq!(sheet.default_row_height, DEFAULT_ROW_HEIGHT);
        assert_eq!(sheet.visibility, SheetVisibility::Visible);
        assert!(sheet.rows.is_empty());
    }
}
