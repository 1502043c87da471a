//! Best-effort package reader producing a [`SerializedModel`].
//!
//! Reads the subset the exporter writes: sheets, values, formulas, styles,
//! merges, hyperlinks, frozen panes, tab colors, defined names and tables.
//! Other parts are ignored.

use roxmltree::{Document, Node};
use xlport_core::{
    Cell, CellCoord, CellError, CellRange, CellValue, Color, ColorRef, ColumnData, MacroFunction,
    NamedExpression, SerializedModel, SerializedSheet, SheetVisibility, StyleRef, Table,
};
use xlport_core::range::MAX_COL;
use xlport_formula::{Expr, NomParser, Renderer};

use crate::error::{Result, XlsxError};
use crate::formula::host_formula;
use crate::geometry::{column_width_to_pixels, points_to_pixels};
use crate::package::Package;
use crate::relationships::{rel_types, rels_path_for, resolve_target, Relationships};
use crate::shared_strings::SharedStrings;
use crate::styles::StyleCache;
use crate::theme::Theme;
use crate::xml::ns;

const DEFAULT_WORKBOOK: &str = "xl/workbook.xml";
/// Merged areas larger than this only mark their top-left cell.
const MERGE_EXPAND_LIMIT: u32 = 10_000;

/// Read a spreadsheet package into a model.
pub fn import_xlsx(bytes: &[u8]) -> Result<SerializedModel> {
    let package = Package::from_bytes(bytes)?;
    Importer::new(&package)?.run()
}

struct Importer<'p> {
    package: &'p Package,
    workbook_part: String,
    workbook_rels: Relationships,
    strings: SharedStrings,
    xf_count: usize,
}

fn elements<'a, 'i: 'a>(node: Node<'a, 'i>, name: &'a str) -> impl Iterator<Item = Node<'a, 'i>> + 'a {
    node.children()
        .filter(move |n| n.is_element() && n.tag_name().name() == name)
}

fn element<'a, 'i: 'a>(node: Node<'a, 'i>, name: &'a str) -> Option<Node<'a, 'i>> {
    elements(node, name).next()
}

fn flag(node: Node, name: &str) -> bool {
    matches!(node.attribute(name), Some("1" | "true"))
}

fn number<T: std::str::FromStr>(node: Node, name: &str) -> Option<T> {
    node.attribute(name).and_then(|v| v.trim().parse().ok())
}

fn rel_id<'a>(node: Node<'a, '_>) -> Option<&'a str> {
    node.attribute((ns::REL, "id"))
}

impl<'p> Importer<'p> {
    fn new(package: &'p Package) -> Result<Self> {
        let workbook_part = package
            .get("_rels/.rels")
            .and_then(|xml| Relationships::from_xml(xml).ok())
            .and_then(|rels| {
                rels.find_by_type(rel_types::OFFICE_DOCUMENT)
                    .next()
                    .map(|rel| resolve_target("", &rel.target))
            })
            .unwrap_or_else(|| DEFAULT_WORKBOOK.to_string());
        if !package.contains(&workbook_part) {
            return Err(XlsxError::MissingPart(workbook_part));
        }
        let workbook_rels = match package.get(&rels_path_for(&workbook_part)) {
            Some(xml) => Relationships::from_xml(xml)?,
            None => Relationships::new(),
        };
        Ok(Importer {
            package,
            workbook_part,
            workbook_rels,
            strings: SharedStrings::new(),
            xf_count: 0,
        })
    }

    fn related_part(&self, rel_type: &str) -> Option<String> {
        self.workbook_rels
            .find_by_type(rel_type)
            .next()
            .map(|rel| resolve_target(&self.workbook_part, &rel.target))
    }

    fn run(mut self) -> Result<SerializedModel> {
        let mut model = SerializedModel::default();

        if let Some(xml) = self
            .related_part(rel_types::SHARED_STRINGS)
            .and_then(|part| self.package.get(&part))
        {
            self.strings = SharedStrings::from_xml(xml)?;
        }
        let theme = match self
            .related_part(rel_types::THEME)
            .and_then(|part| self.package.get(&part))
        {
            Some(xml) => Theme::from_xml(xml)?,
            None => Theme::default(),
        };
        if let Some(xml) = self
            .related_part(rel_types::STYLES)
            .and_then(|part| self.package.get(&part))
        {
            let cache = StyleCache::from_xml(xml, theme)?;
            model.styles = cache.to_model_styles();
            self.xf_count = model.styles.len();
        }

        let xml = self
            .package
            .get(&self.workbook_part)
            .ok_or_else(|| XlsxError::malformed(&self.workbook_part, "not UTF-8"))?;
        let doc = Document::parse(xml)?;
        let root = doc.root_element();

        if let Some(sheets) = element(root, "sheets") {
            for (index, node) in elements(sheets, "sheet").enumerate() {
                let name = node.attribute("name").unwrap_or_default();
                let id = format!("sheet{}", index + 1);
                let mut sheet = SerializedSheet::new(id, name);
                sheet.visibility = match node.attribute("state") {
                    Some("hidden") => SheetVisibility::Hidden,
                    Some("veryHidden") => SheetVisibility::VeryHidden,
                    _ => SheetVisibility::Visible,
                };
                let part = rel_id(node)
                    .and_then(|id| self.workbook_rels.get(id))
                    .map(|rel| resolve_target(&self.workbook_part, &rel.target));
                match part {
                    Some(part) if self.package.contains(&part) => {
                        self.read_worksheet(&part, &mut sheet, &mut model.tables)?;
                    }
                    _ => tracing::warn!(sheet = %name, "worksheet part not found; sheet left empty"),
                }
                model.sheets.push(sheet);
            }
        }

        let active = element(root, "bookViews")
            .and_then(|views| element(views, "workbookView"))
            .and_then(|view| number::<usize>(view, "activeTab"))
            .unwrap_or(0);
        model.active_sheet = model
            .sheets
            .get(active)
            .or_else(|| model.sheets.first())
            .map(|s| s.id.clone());

        if let Some(names) = element(root, "definedNames") {
            for node in elements(names, "definedName") {
                self.read_defined_name(node, &mut model);
            }
        }
        Ok(model)
    }

    fn read_defined_name(&self, node: Node, model: &mut SerializedModel) {
        let Some(name) = node.attribute("name") else {
            return;
        };
        let value = node.text().unwrap_or_default();
        if let Some(function) = lambda_function(name, value) {
            model.macros.push(function);
            return;
        }
        let scope = number::<usize>(node, "localSheetId")
            .and_then(|index| model.sheets.get(index))
            .map(|sheet| sheet.id.clone());
        model.named.push(NamedExpression {
            name: name.to_string(),
            expression: host_formula(value),
            scope,
            hidden: flag(node, "hidden"),
        });
    }

    fn style_ref(&self, node: Node) -> Option<StyleRef> {
        number::<usize>(node, "s")
            .filter(|&xf| xf != 0 && xf < self.xf_count)
            .map(StyleRef::Index)
    }

    fn read_worksheet(&self, part: &str, sheet: &mut SerializedSheet, tables: &mut Vec<Table>) -> Result<()> {
        let xml = self
            .package
            .get(part)
            .ok_or_else(|| XlsxError::malformed(part, "not UTF-8"))?;
        let doc = Document::parse(xml)?;
        let root = doc.root_element();
        let rels = match self.package.get(&rels_path_for(part)) {
            Some(xml) => Relationships::from_xml(xml)?,
            None => Relationships::new(),
        };

        if let Some(color) = element(root, "sheetPr")
            .and_then(|pr| element(pr, "tabColor"))
            .and_then(color_ref)
        {
            sheet.tab_color = Some(color);
        }
        if let Some(pane) = element(root, "sheetViews")
            .and_then(|views| element(views, "sheetView"))
            .and_then(|view| element(view, "pane"))
            .filter(|pane| pane.attribute("state") == Some("frozen"))
        {
            sheet.frozen_columns = number::<f64>(pane, "xSplit").unwrap_or(0.0) as u32;
            sheet.frozen_rows = number::<f64>(pane, "ySplit").unwrap_or(0.0) as u32;
        }
        if let Some(format) = element(root, "sheetFormatPr") {
            if let Some(points) = number::<f64>(format, "defaultRowHeight") {
                sheet.default_row_height = points_to_pixels(points);
            }
            if let Some(width) = number::<f64>(format, "defaultColWidth") {
                sheet.default_column_width = column_width_to_pixels(width);
            }
        }
        if let Some(cols) = element(root, "cols") {
            for col in elements(cols, "col") {
                self.read_col(col, sheet);
            }
        }
        if let Some(data) = element(root, "sheetData") {
            self.read_sheet_data(data, sheet);
        }

        if let Some(merges) = element(root, "mergeCells") {
            for merge in elements(merges, "mergeCell") {
                if let Some(area) = merge.attribute("ref").and_then(CellRange::from_a1) {
                    mark_merge(sheet, area);
                }
            }
        }
        if let Some(links) = element(root, "hyperlinks") {
            for link in elements(links, "hyperlink") {
                let Some(coord) = link.attribute("ref").and_then(CellRange::from_a1) else {
                    continue;
                };
                let target = match (rel_id(link).and_then(|id| rels.get(id)), link.attribute("location")) {
                    (Some(rel), _) => rel.target.clone(),
                    (None, Some(location)) => format!("#{location}"),
                    (None, None) => continue,
                };
                cell_at(sheet, coord.start).hyperlink = Some(target);
            }
        }
        if let Some(parts) = element(root, "tableParts") {
            for table_part in elements(parts, "tablePart") {
                let Some(rel) = rel_id(table_part).and_then(|id| rels.get(id)) else {
                    continue;
                };
                let path = resolve_target(part, &rel.target);
                if let Some(table) = self.read_table(&path, sheet)? {
                    tables.push(table);
                }
            }
        }
        Ok(())
    }

    fn read_col(&self, col: Node, sheet: &mut SerializedSheet) {
        let (Some(min), Some(max)) = (number::<u32>(col, "min"), number::<u32>(col, "max")) else {
            return;
        };
        let style = self.style_ref(col);
        // A run reaching the last column carries the sheet-wide format.
        if max > MAX_COL {
            if style.is_some() && sheet.style.is_none() {
                sheet.style = style.clone();
            }
            return;
        }
        let data = ColumnData {
            width: flag(col, "customWidth")
                .then(|| number::<f64>(col, "width"))
                .flatten()
                .map(column_width_to_pixels),
            hidden: flag(col, "hidden"),
            style,
        };
        for index in min.max(1)..=max {
            sheet.columns.insert(index - 1, data.clone());
        }
    }

    fn read_sheet_data(&self, data: Node, sheet: &mut SerializedSheet) {
        let mut next_row = 0;
        for row in elements(data, "row") {
            let row_index = number::<u32>(row, "r").map_or(next_row, |r| r.saturating_sub(1));
            next_row = row_index + 1;

            let height = flag(row, "customHeight")
                .then(|| number::<f64>(row, "ht"))
                .flatten()
                .map(points_to_pixels);
            let style = flag(row, "customFormat").then(|| self.style_ref(row)).flatten();
            let hidden = flag(row, "hidden");
            if height.is_some() || style.is_some() || hidden {
                let entry = sheet.rows.entry(row_index).or_default();
                entry.height = height;
                entry.style = style;
                entry.hidden = hidden;
            }

            let mut next_col = 0;
            for c in elements(row, "c") {
                let coord = c
                    .attribute("r")
                    .and_then(CellCoord::from_a1)
                    .unwrap_or(CellCoord::new(row_index, next_col));
                next_col = coord.col + 1;
                let cell = self.read_cell(c);
                if cell.has_content() || cell.style.is_some() {
                    sheet.set_cell(coord, cell);
                }
            }
        }
    }

    fn read_cell(&self, c: Node) -> Cell {
        let raw = element(c, "v").and_then(|v| v.text()).unwrap_or_default();
        let value = match c.attribute("t").unwrap_or("n") {
            "s" => raw
                .trim()
                .parse::<usize>()
                .ok()
                .and_then(|index| self.strings.get(index))
                .map_or(CellValue::Empty, |text| CellValue::Text(text.to_string())),
            "b" => CellValue::Boolean(raw.trim() == "1" || raw.trim().eq_ignore_ascii_case("true")),
            "e" => CellValue::Error(CellError::from_code(raw).unwrap_or(CellError::InvalidValue)),
            "str" => CellValue::Text(raw.to_string()),
            "inlineStr" => CellValue::Text(
                element(c, "is")
                    .map(|is| {
                        is.descendants()
                            .filter(|n| n.is_element() && n.tag_name().name() == "t")
                            .filter_map(|t| t.text())
                            .collect()
                    })
                    .unwrap_or_default(),
            ),
            _ if raw.trim().is_empty() => CellValue::Empty,
            _ => raw
                .trim()
                .parse()
                .map_or(CellValue::Text(raw.to_string()), CellValue::Number),
        };

        let mut cell = Cell::new(value);
        cell.style = self.style_ref(c);
        if let Some(f) = element(c, "f") {
            if let Some(text) = f.text().filter(|t| !t.trim().is_empty()) {
                cell.formula = Some(host_formula(text));
            }
            if f.attribute("t") == Some("array") {
                cell.spill = f.attribute("ref").and_then(CellRange::from_a1);
            }
        }
        cell
    }

    fn read_table(&self, part: &str, sheet: &mut SerializedSheet) -> Result<Option<Table>> {
        let Some(xml) = self.package.get(part) else {
            tracing::warn!(part, "table part not found");
            return Ok(None);
        };
        let doc = Document::parse(xml)?;
        let root = doc.root_element();
        let Some(range) = root.attribute("ref").and_then(CellRange::from_a1) else {
            return Err(XlsxError::malformed(part, "table without ref"));
        };
        let name = root
            .attribute("displayName")
            .or_else(|| root.attribute("name"))
            .unwrap_or_default()
            .to_string();

        let mut table = Table::new(name, sheet.id.clone(), range);
        table.header_row = number::<u32>(root, "headerRowCount").map_or(true, |n| n > 0);
        table.totals_row = number::<u32>(root, "totalsRowCount").is_some_and(|n| n > 0);
        if let Some(info) = element(root, "tableStyleInfo") {
            table.style.name = info.attribute("name").map(str::to_string);
            table.style.show_row_stripes = flag(info, "showRowStripes");
            table.style.show_column_stripes = flag(info, "showColumnStripes");
            table.style.show_first_column = flag(info, "showFirstColumn");
            table.style.show_last_column = flag(info, "showLastColumn");
        }

        for coord in range.iter() {
            if let Some(cell) = sheet.get_cell_mut(coord) {
                cell.table = Some(table.name.clone());
            }
        }
        Ok(Some(table))
    }
}

fn cell_at(sheet: &mut SerializedSheet, coord: CellCoord) -> &mut Cell {
    sheet
        .rows
        .entry(coord.row)
        .or_default()
        .cells
        .entry(coord.col)
        .or_default()
}

fn mark_merge(sheet: &mut SerializedSheet, area: CellRange) {
    cell_at(sheet, area.start).merge = Some(area);
    if area.row_count() * area.col_count() > MERGE_EXPAND_LIMIT {
        return;
    }
    for coord in area.iter() {
        if let Some(cell) = sheet.get_cell_mut(coord) {
            cell.merge = Some(area);
        }
    }
}

fn color_ref(node: Node) -> Option<ColorRef> {
    if let Some(rgb) = node.attribute("rgb") {
        return Color::from_argb(rgb).map(ColorRef::Rgb);
    }
    let index = number::<usize>(node, "theme")?;
    let slot = Theme::slot_name(index)?;
    Some(ColorRef::theme(slot, number::<f64>(node, "tint").unwrap_or(0.0)))
}

/// `_xlfn.LAMBDA(_xlpm.a,_xlpm.b,body)` back into a macro function.
fn lambda_function(name: &str, value: &str) -> Option<MacroFunction> {
    let mut expr = NomParser::new().parse(value).ok()?;
    expr.strip_decorations();
    let Expr::FunctionCall { name: function, mut args } = expr else {
        return None;
    };
    if function != "LAMBDA" {
        return None;
    }
    let body = args.pop()?;
    let parameters = args
        .into_iter()
        .map(|arg| match arg {
            Expr::Name(parameter) => Some(parameter),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    Some(MacroFunction {
        name: name.to_string(),
        parameters,
        expression: format!("={}", Renderer::new().render(&body)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/>
</Relationships>"#;

    const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<bookViews><workbookView activeTab="0"/></bookViews>
<sheets><sheet name="Budget" sheetId="1" r:id="rId1"/></sheets>
<definedNames>
<definedName name="Total" localSheetId="0">Budget!$B$3</definedName>
<definedName name="TWICE">_xlfn.LAMBDA(_xlpm.n,_xlpm.n*2)</definedName>
</definedNames>
</workbook>"#;

    const SHEET: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheetPr><tabColor rgb="FFFF0000"/></sheetPr>
<sheetViews><sheetView workbookViewId="0"><pane ySplit="2" topLeftCell="A3" activePane="bottomLeft" state="frozen"/></sheetView></sheetViews>
<sheetFormatPr defaultRowHeight="15" defaultColWidth="9.140625"/>
<cols><col min="2" max="3" width="14.28125" customWidth="1"/></cols>
<sheetData>
<row r="1" ht="30" customHeight="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="inlineStr"><is><t>inline</t></is></c></row>
<row r="2"><c r="A2"><v>1.5</v></c><c r="B2" t="e"><v>#DIV/0!</v></c></row>
<row r="3"><c r="B3"><f>_xlfn.IFS(A2&gt;1,A2)</f><v>1.5</v></c></row>
</sheetData>
<mergeCells count="1"><mergeCell ref="A1:B1"/></mergeCells>
<hyperlinks><hyperlink ref="A2" location="Budget!B3"/></hyperlinks>
</worksheet>"#;

    const STRINGS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="1" uniqueCount="1"><si><t>Header</t></si></sst>"#;

    fn package() -> Package {
        let mut package = Package::new();
        package.set("xl/workbook.xml", WORKBOOK);
        package.set("xl/_rels/workbook.xml.rels", WORKBOOK_RELS);
        package.set("xl/worksheets/sheet1.xml", SHEET);
        package.set("xl/sharedStrings.xml", STRINGS);
        package
    }

    #[test]
    fn test_import_hand_written_package() {
        let bytes = package().to_bytes().unwrap();
        let model = import_xlsx(&bytes).unwrap();
        let sheet = &model.sheets[0];
        let at = |a1| CellCoord::from_a1(a1).unwrap();

        assert_eq!(sheet.name, "Budget");
        assert_eq!(model.active_sheet.as_deref(), Some("sheet1"));
        assert_eq!(sheet.tab_color, Some(ColorRef::Rgb(Color::RED)));
        assert_eq!(sheet.frozen_rows, 2);
        assert_eq!(sheet.default_row_height, 20.0);
        assert_eq!(sheet.default_column_width, 64.0);
        assert_eq!(sheet.col_width(1), 100.0);
        assert_eq!(sheet.row_height(0), 40.0);

        assert_eq!(sheet.get_cell(at("A1")).unwrap().value, CellValue::Text("Header".into()));
        assert_eq!(sheet.get_cell(at("B1")).unwrap().value, CellValue::Text("inline".into()));
        assert_eq!(sheet.get_cell(at("B1")).unwrap().merge, CellRange::from_a1("A1:B1"));
        assert_eq!(sheet.get_cell(at("A2")).unwrap().value, CellValue::Number(1.5));
        assert_eq!(sheet.get_cell(at("A2")).unwrap().hyperlink.as_deref(), Some("#Budget!B3"));
        assert_eq!(
            sheet.get_cell(at("B2")).unwrap().value,
            CellValue::Error(CellError::DivisionByZero)
        );
        assert_eq!(sheet.get_cell(at("B3")).unwrap().formula.as_deref(), Some("=IFS(A2>1,A2)"));

        assert_eq!(model.named[0].scope.as_deref(), Some("sheet1"));
        assert_eq!(model.named[0].expression, "=Budget!$B$3");
        assert_eq!(
            model.macros,
            vec![MacroFunction {
                name: "TWICE".into(),
                parameters: vec!["n".into()],
                expression: "=n*2".into(),
            }]
        );
    }

    #[test]
    fn test_missing_workbook_is_an_error() {
        let mut package = package();
        package.remove("xl/workbook.xml");
        let bytes = package.to_bytes().unwrap();
        assert!(matches!(import_xlsx(&bytes), Err(XlsxError::MissingPart(_))));
    }
}
