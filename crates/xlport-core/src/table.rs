use serde::{Deserialize, Serialize};

use crate::range::CellRange;

fn default_true() -> bool {
    true
}

/// Visual options of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TableStyle {
    /// Built-in style name such as `TableStyleMedium2`.
    pub name: Option<String>,
    pub show_row_stripes: bool,
    pub show_column_stripes: bool,
    pub show_first_column: bool,
    pub show_last_column: bool,
}

impl Default for TableStyle {
    fn default() -> Self {
        TableStyle {
            name: Some("TableStyleMedium2".to_string()),
            show_row_stripes: true,
            show_column_stripes: false,
            show_first_column: false,
            show_last_column: false,
        }
    }
}

/// A structured table living on one sheet.
///
/// Header and totals rows are part of `range`; their cells hold the column
/// names and the per-column footers (a label or a formula).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub name: String,
    /// Id of the owning sheet.
    pub sheet: String,
    pub range: CellRange,
    #[serde(default = "default_true")]
    pub header_row: bool,
    #[serde(default)]
    pub totals_row: bool,
    #[serde(default)]
    pub style: TableStyle,
}

impl Table {
    pub fn new(name: impl Into<String>, sheet: impl Into<String>, range: CellRange) -> Self {
        Table {
            name: name.into(),
            sheet: sheet.into(),
            range,
            header_row: true,
            totals_row: false,
            style: TableStyle::default(),
        }
    }

    pub fn with_totals_row(mut self, totals: bool) -> Self {
        self.totals_row = totals;
        self
    }

    pub fn header_row_index(&self) -> Option<u32> {
        self.header_row.then_some(self.range.start.row)
    }

    pub fn totals_row_index(&self) -> Option<u32> {
        self.totals_row.then_some(self.range.end.row)
    }

    /// Range without header and totals rows.
    pub fn data_range(&self) -> Option<CellRange> {
        let mut range = self.range;
        if self.header_row {
            range.start.row += 1;
        }
        if self.totals_row {
            range.end.row = range.end.row.checked_sub(1)?;
        }
        (range.start.row <= range.end.row).then_some(range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_range_excludes_header_and_totals() {
        let table = Table::new("Sales", "s1", CellRange::from_a1("A1:C5").unwrap()).with_totals_row(true);
        assert_eq!(table.header_row_index(), Some(0));
        assert_eq!(table.totals_row_index(), Some(4));
        assert_eq!(table.data_range().map(|r| r.to_a1()), Some("A2:C4".to_string()));

        let header_only = Table::new("T", "s1", CellRange::from_a1("A1:C1").unwrap());
        assert_eq!(header_only.data_range(), None);
    }
}
