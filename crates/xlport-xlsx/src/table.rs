//! Table parts: name sanitizing, header/footer preparation and the
//! `xl/tables/tableN.xml` markup.

use std::collections::HashSet;
use xlport_core::{
    Cell, CellCoord, CellRange, CellValue, SerializedSheet, Table, TableStyle,
};

use crate::error::Result;
use crate::formula::FormulaTranslator;
use crate::warnings::Warnings;
use crate::xml::{ns, Element};

const MAX_TABLE_NAME_LEN: usize = 255;

/// Footer of one table column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TotalsCell {
    Label(String),
    /// Stored formula text, without `=`.
    Formula(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableColumn {
    pub name: String,
    pub totals: Option<TotalsCell>,
}

/// A table with its column names settled, ready to serialize.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedTable {
    pub id: u32,
    pub name: String,
    pub range: CellRange,
    pub header_row: bool,
    pub totals_row: bool,
    pub columns: Vec<TableColumn>,
    pub style: TableStyle,
}

/// Make a name usable as a table name: letters, digits, `_`, `.` and `\`,
/// starting with a letter or `_`, and not readable as a cell reference.
///
/// ```
/// use xlport_xlsx::table::sanitize_table_name;
///
/// assert_eq!(sanitize_table_name("Sales 2024"), "Sales_2024");
/// assert_eq!(sanitize_table_name("2024"), "_2024");
/// assert_eq!(sanitize_table_name("AB12"), "_AB12");
/// assert_eq!(sanitize_table_name("Orders"), "Orders");
/// ```
pub fn sanitize_table_name(name: &str) -> String {
    let mut clean: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '_' | '.' | '\\') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if clean.is_empty() {
        clean.push_str("Table");
    }
    let starts_well = clean
        .chars()
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '\\');
    if !starts_well || CellCoord::from_a1(&clean).is_some() || is_r1c1_like(&clean) {
        clean.insert(0, '_');
    }
    clean.chars().take(MAX_TABLE_NAME_LEN).collect()
}

fn is_r1c1_like(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    if upper == "R" || upper == "C" {
        return true;
    }
    let Some(rest) = upper.strip_prefix('R') else {
        return upper
            .strip_prefix('C')
            .is_some_and(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()));
    };
    let row_digits = rest.trim_start_matches(|c: char| c.is_ascii_digit());
    match row_digits.strip_prefix('C') {
        Some(col_digits) => col_digits.chars().all(|c| c.is_ascii_digit()),
        None => row_digits.is_empty(),
    }
}

/// Sanitize and deduplicate (case-insensitively) the model's table names,
/// moving the cells' table back-references along with a renamed table.
pub fn normalize_table_names(
    tables: &mut [Table],
    sheets: &mut [SerializedSheet],
    warnings: &mut Warnings,
) {
    let mut seen = HashSet::new();
    for table in tables.iter_mut() {
        let base = sanitize_table_name(&table.name);
        let mut name = base.clone();
        let mut suffix = 2;
        while !seen.insert(name.to_lowercase()) {
            name = format!("{base}_{suffix}");
            suffix += 1;
        }
        if name == table.name {
            continue;
        }

        warnings.push(format_args!("table {:?} renamed to {name:?}", table.name));
        if let Some(sheet) = sheets.iter_mut().find(|s| s.id == table.sheet) {
            let range = table.range;
            let stored = sheet
                .rows
                .range_mut(range.start.row..=range.end.row)
                .flat_map(|(_, row)| row.cells.range_mut(range.start.col..=range.end.col));
            for (_, cell) in stored {
                if cell
                    .table
                    .as_deref()
                    .is_some_and(|owner| owner.eq_ignore_ascii_case(&table.name))
                {
                    cell.table = Some(name.clone());
                }
            }
        }
        table.name = name;
    }
}

/// Blank names become `ColumnN` (N the 1-based position) and repeats get a
/// numeric suffix: `Total`, `Total2`.
///
/// ```
/// use xlport_xlsx::table::unique_column_names;
///
/// let names = unique_column_names(["Total", "", "total", "Total"].map(String::from));
/// assert_eq!(names, ["Total", "Column2", "total2", "Total3"]);
/// ```
pub fn unique_column_names(raw: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.into_iter()
        .enumerate()
        .map(|(index, name)| {
            let name = name.trim();
            let base = if name.is_empty() {
                format!("Column{}", index + 1)
            } else {
                name.to_string()
            };
            let mut candidate = base.clone();
            let mut suffix = 2;
            while !seen.insert(candidate.to_lowercase()) {
                candidate = format!("{base}{suffix}");
                suffix += 1;
            }
            candidate
        })
        .collect()
}

/// Settle column names and footers of `table`, rewriting its header and
/// footer cells on `sheet` as plain text where they are not already.
pub fn prepare_table(
    table: &Table,
    id: u32,
    sheet: &mut SerializedSheet,
    translator: &FormulaTranslator,
    warnings: &mut Warnings,
) -> PreparedTable {
    let range = table.range;
    let columns = range.start.col..=range.end.col;

    let names = match table.header_row_index() {
        Some(row) => {
            let raw = columns.clone().map(|col| {
                sheet
                    .get_cell(CellCoord::new(row, col))
                    .map(|cell| cell.value.as_text())
                    .unwrap_or_default()
            });
            let names = unique_column_names(raw.collect::<Vec<_>>());
            for (col, name) in columns.clone().zip(&names) {
                set_text(sheet, CellCoord::new(row, col), name);
            }
            names
        }
        None => unique_column_names(columns.clone().map(|_| String::new())),
    };

    let footers: Vec<Option<TotalsCell>> = match table.totals_row_index() {
        Some(row) => columns
            .map(|col| {
                let coord = CellCoord::new(row, col);
                let cell = sheet.get_cell(coord)?;
                if let Some(formula) = &cell.formula {
                    return Some(TotalsCell::Formula(translator.translate(
                        formula,
                        Some(&table.name),
                        warnings,
                    )));
                }
                if cell.value.is_empty() {
                    return None;
                }
                let label = cell.value.as_text();
                set_text(sheet, coord, &label);
                Some(TotalsCell::Label(label))
            })
            .collect(),
        None => vec![None; names.len()],
    };

    PreparedTable {
        id,
        name: table.name.clone(),
        range,
        header_row: table.header_row,
        totals_row: table.totals_row,
        columns: names
            .into_iter()
            .zip(footers)
            .map(|(name, totals)| TableColumn { name, totals })
            .collect(),
        style: table.style.clone(),
    }
}

fn set_text(sheet: &mut SerializedSheet, coord: CellCoord, text: &str) {
    let value = CellValue::Text(text.to_string());
    match sheet.get_cell_mut(coord) {
        Some(cell) => {
            if cell.value != value || cell.formula.is_some() {
                cell.value = value;
                cell.formula = None;
            }
        }
        None => sheet.set_cell(coord, Cell::new(value)),
    }
}

impl PreparedTable {
    pub fn to_xml(&self) -> Result<String> {
        let mut table = Element::new("table")
            .attr("xmlns", ns::MAIN)
            .attr("id", self.id)
            .attr("name", &self.name)
            .attr("displayName", &self.name)
            .attr("ref", self.range.to_a1_span());
        if !self.header_row {
            table = table.attr("headerRowCount", 0);
        }
        if self.totals_row {
            table = table.attr("totalsRowCount", 1);
        } else {
            table = table.attr("totalsRowShown", 0);
        }

        if self.header_row {
            let mut filter = self.range;
            if self.totals_row && filter.end.row > filter.start.row {
                filter.end.row -= 1;
            }
            table.push(Element::new("autoFilter").attr("ref", filter.to_a1_span()));
        }

        table.push(
            Element::new("tableColumns")
                .attr("count", self.columns.len())
                .children(self.columns.iter().enumerate().map(|(index, column)| {
                    let element = Element::new("tableColumn")
                        .attr("id", index + 1)
                        .attr("name", &column.name);
                    match &column.totals {
                        Some(TotalsCell::Label(label)) => element.attr("totalsRowLabel", label),
                        Some(TotalsCell::Formula(formula)) => element
                            .attr("totalsRowFunction", "custom")
                            .child(Element::new("totalsRowFormula").text(formula)),
                        None => element,
                    }
                })),
        );

        let style = &self.style;
        table.push(
            Element::new("tableStyleInfo")
                .opt_attr("name", style.name.as_deref())
                .attr("showFirstColumn", u8::from(style.show_first_column))
                .attr("showLastColumn", u8::from(style.show_last_column))
                .attr("showRowStripes", u8::from(style.show_row_stripes))
                .attr("showColumnStripes", u8::from(style.show_column_stripes)),
        );
        table.to_document()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn sales_sheet() -> SerializedSheet {
        let mut sheet = SerializedSheet::new("s1", "Data");
        sheet.set_cell(CellCoord::new(0, 0), Cell::text("Total"));
        sheet.set_cell(CellCoord::new(0, 1), Cell::text("total"));
        sheet.set_cell(CellCoord::new(0, 3), Cell::number(2024.0));
        sheet.set_cell(CellCoord::new(1, 0), Cell::number(5.0));
        sheet.set_cell(CellCoord::new(2, 0), Cell::text("Sum"));
        sheet.set_cell(
            CellCoord::new(2, 1),
            Cell::formula("=SUBTOTAL(109,[total2])", CellValue::Number(5.0)),
        );
        sheet
    }

    #[test]
    fn test_prepare_coerces_headers_and_footers() {
        let mut sheet = sales_sheet();
        let table = Table::new("Sales", "s1", CellRange::from_a1("A1:D3").unwrap()).with_totals_row(true);
        let mut warnings = Warnings::new();
        let prepared = prepare_table(&table, 1, &mut sheet, &FormulaTranslator::default(), &mut warnings);

        let names: Vec<_> = prepared.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Total", "total2", "Column3", "2024"]);
        assert_eq!(
            sheet.get_cell(CellCoord::new(0, 3)).map(|c| &c.value),
            Some(&CellValue::Text("2024".into()))
        );
        assert_eq!(
            sheet.get_cell(CellCoord::new(0, 2)).map(|c| &c.value),
            Some(&CellValue::Text("Column3".into()))
        );
        assert_eq!(prepared.columns[0].totals, Some(TotalsCell::Label("Sum".into())));
        assert_eq!(
            prepared.columns[1].totals,
            Some(TotalsCell::Formula("SUBTOTAL(109,Sales[total2])".into()))
        );
        assert_eq!(prepared.columns[2].totals, None);
    }

    #[test]
    fn test_table_xml() {
        let mut sheet = sales_sheet();
        let table = Table::new("Sales", "s1", CellRange::from_a1("A1:D3").unwrap()).with_totals_row(true);
        let mut warnings = Warnings::new();
        let xml = prepare_table(&table, 3, &mut sheet, &FormulaTranslator::default(), &mut warnings)
            .to_xml()
            .unwrap();
        assert!(xml.contains(r#"<table xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" id="3" name="Sales" displayName="Sales" ref="A1:D3" totalsRowCount="1">"#));
        assert!(xml.contains(r#"<autoFilter ref="A1:D2"/>"#));
        assert!(xml.contains(r#"<tableColumn id="1" name="Total" totalsRowLabel="Sum"/>"#));
        assert!(xml.contains(
            r#"<tableColumn id="2" name="total2" totalsRowFunction="custom"><totalsRowFormula>SUBTOTAL(109,Sales[total2])</totalsRowFormula></tableColumn>"#
        ));
        assert!(xml.contains(r#"<tableStyleInfo name="TableStyleMedium2" showFirstColumn="0" showLastColumn="0" showRowStripes="1" showColumnStripes="0"/>"#));
    }

    #[test]
    fn test_normalize_renames_and_moves_back_references() {
        let mut sheet = SerializedSheet::new("s1", "Data");
        let mut cell = Cell::number(1.0);
        cell.table = Some("my table".into());
        sheet.set_cell(CellCoord::new(5, 0), cell);
        let mut sheets = vec![sheet];
        let mut tables = vec![
            Table::new("Sales", "s1", CellRange::from_a1("A1:B3").unwrap()),
            Table::new("my table", "s1", CellRange::from_a1("A5:B7").unwrap()),
            Table::new("SALES", "s1", CellRange::from_a1("D1:E3").unwrap()),
        ];
        let mut warnings = Warnings::new();
        normalize_table_names(&mut tables, &mut sheets, &mut warnings);

        let names: Vec<_> = tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Sales", "my_table", "SALES_2"]);
        assert_eq!(warnings.len(), 2);
        assert_eq!(
            sheets[0].get_cell(CellCoord::new(5, 0)).and_then(|c| c.table.as_deref()),
            Some("my_table")
        );
    }

    #[test]
    fn test_normalize_whole_sheet_table_touches_stored_cells_only() {
        let mut sheet = SerializedSheet::new("s1", "Data");
        for a1 in ["A1", "C3", "XFD1048576"] {
            let mut cell = Cell::text("x");
            cell.table = Some("all cells".into());
            sheet.set_cell(CellCoord::from_a1(a1).unwrap(), cell);
        }
        let mut sheets = vec![sheet];
        let mut tables = vec![Table::new(
            "all cells",
            "s1",
            CellRange::from_a1("A1:XFD1048576").unwrap(),
        )];
        let mut warnings = Warnings::new();
        normalize_table_names(&mut tables, &mut sheets, &mut warnings);

        assert_eq!(tables[0].name, "all_cells");
        assert_eq!(sheets[0].cells().count(), 3);
        assert!(sheets[0]
            .cells()
            .all(|(_, cell)| cell.table.as_deref() == Some("all_cells")));
    }

    #[test]
    fn test_r1c1_names_are_escaped() {
        assert_eq!(sanitize_table_name("R1C1"), "_R1C1");
        assert_eq!(sanitize_table_name("r"), "_r");
        assert_eq!(sanitize_table_name("Revenue"), "Revenue");
    }

    proptest! {
        #[test]
        fn prop_column_names_are_unique_and_non_empty(raw in proptest::collection::vec("[aA ]{0,3}", 1..12)) {
            let names = unique_column_names(raw);
            let lowered: HashSet<_> = names.iter().map(|n| n.to_lowercase()).collect();
            prop_assert_eq!(lowered.len(), names.len());
            prop_assert!(names.iter().all(|n| !n.is_empty()));
        }
    }
}
