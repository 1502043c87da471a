//! Worksheet part writer.
//!
//! Styles cascade sheet → row → column → cell. A row is written when it has
//! a written cell, its own format, a custom height or is hidden; an empty
//! cell is dropped when its format equals the format its row (or, for
//! unstyled rows, its column) already implies.

use xlport_core::{
    AlertStyle, Cell, CellCoord, CellRange, CellValue, ComparisonOperator, ConditionalFormattingRule,
    ConditionalRule, DataValidationRule, ListSource, SerializedSheet, Style, StyleRef,
    TextOperator, ValidationCriteria, ValidationOperator,
};
use xlport_core::range::MAX_COL;
use xlport_core::validation::unix_to_serial_date;

use crate::error::Result;
use crate::formula::FormulaTranslator;
use crate::geometry::{pixels_to_column_width, pixels_to_points};
use crate::relationships::{rel_types, Relationships};
use crate::shared_strings::SharedStrings;
use crate::sparkline::{is_sparkline_formula, parse_sparkline, sparkline_ext, Sparkline};
use crate::styles::{Dxf, StyleCache, XlsxColor};
use crate::warnings::Warnings;
use crate::xml::{ns, Element};

/// Row height (in pixels) the sheet format assumes unless told otherwise.
const STANDARD_ROW_HEIGHT: f64 = 20.0;

/// Session state a worksheet writes into.
pub struct SheetContext<'a> {
    pub strings: &'a mut SharedStrings,
    pub styles: &'a mut StyleCache,
    /// The worksheet's own relationship file; external hyperlinks land here.
    pub relationships: &'a mut Relationships,
    pub translator: &'a FormulaTranslator,
    pub warnings: &'a mut Warnings,
}

/// Parts of the worksheet that live outside the sheet model: the selected
/// tab flag and relationship ids of already-written companion parts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetLinks {
    pub selected: bool,
    pub drawing: Option<String>,
    pub picture: Option<String>,
    pub tables: Vec<String>,
}

/// Write one worksheet part.
pub fn write_worksheet(
    sheet: &SerializedSheet,
    shared_styles: &[Style],
    links: &SheetLinks,
    cx: &mut SheetContext<'_>,
) -> Result<String> {
    let mut writer = SheetWriter::new(sheet, shared_styles, cx);
    writer.write(links)
}

struct SheetWriter<'s, 'c, 'a> {
    sheet: &'s SerializedSheet,
    shared_styles: &'s [Style],
    cx: &'c mut SheetContext<'a>,
    sheet_style: Option<&'s Style>,
    sheet_xf: usize,
    merges: Vec<CellRange>,
    hyperlinks: Vec<Element>,
    sparklines: Vec<Sparkline>,
}

impl<'s, 'c, 'a> SheetWriter<'s, 'c, 'a> {
    fn new(sheet: &'s SerializedSheet, shared_styles: &'s [Style], cx: &'c mut SheetContext<'a>) -> Self {
        let sheet_style = sheet.style.as_ref().and_then(|s| s.resolve(shared_styles));
        SheetWriter {
            sheet,
            shared_styles,
            cx,
            sheet_style,
            sheet_xf: 0,
            merges: Vec::new(),
            hyperlinks: Vec::new(),
            sparklines: Vec::new(),
        }
    }

    fn layer(&self, style: Option<&'s StyleRef>) -> Option<&'s Style> {
        style.and_then(|s| s.resolve(self.shared_styles))
    }

    fn xf_for(&mut self, layers: &[Option<&Style>]) -> usize {
        if layers.iter().all(Option::is_none) {
            return 0;
        }
        let style = Style::cascade(layers.iter().copied());
        self.cx.styles.ensure_style(&style, self.cx.warnings)
    }

    /// Format a cell in `col` gets from the sheet and column layers alone.
    fn column_xf(&mut self, col: u32) -> usize {
        let sheet = self.sheet;
        let col_style = sheet
            .columns
            .get(&col)
            .and_then(|c| self.layer(c.style.as_ref()));
        match col_style {
            Some(col_style) => self.xf_for(&[self.sheet_style, Some(col_style)]),
            None => self.sheet_xf,
        }
    }

    fn write(&mut self, links: &SheetLinks) -> Result<String> {
        if self.sheet_style.is_some() {
            self.sheet_xf = self.xf_for(&[self.sheet_style]);
        }
        let cols = self.cols();
        let sheet_data = self.sheet_data();
        let conditional_formats = self.conditional_formats();
        let validations = self.data_validations();

        let mut worksheet = Element::new("worksheet")
            .attr("xmlns", ns::MAIN)
            .attr("xmlns:r", ns::REL)
            .opt_child(self.sheet_pr())
            .child(Element::new("dimension").attr("ref", self.dimension()))
            .child(self.sheet_views(links.selected))
            .child(self.sheet_format())
            .opt_child(cols)
            .child(sheet_data);

        if !self.merges.is_empty() {
            worksheet = worksheet.child(
                Element::new("mergeCells")
                    .attr("count", self.merges.len())
                    .children(
                        self.merges
                            .iter()
                            .map(|m| Element::new("mergeCell").attr("ref", m.to_a1_span())),
                    ),
            );
        }
        worksheet = worksheet.children(conditional_formats).opt_child(validations);
        if !self.hyperlinks.is_empty() {
            worksheet = worksheet
                .child(Element::new("hyperlinks").children(std::mem::take(&mut self.hyperlinks)));
        }
        worksheet = worksheet
            .child(
                Element::new("pageMargins")
                    .attr("left", 0.7)
                    .attr("right", 0.7)
                    .attr("top", 0.75)
                    .attr("bottom", 0.75)
                    .attr("header", 0.3)
                    .attr("footer", 0.3),
            )
            .opt_child(links.drawing.as_ref().map(|id| Element::new("drawing").attr("r:id", id)))
            .opt_child(links.picture.as_ref().map(|id| Element::new("picture").attr("r:id", id)));
        if !links.tables.is_empty() {
            worksheet = worksheet.child(
                Element::new("tableParts")
                    .attr("count", links.tables.len())
                    .children(
                        links
                            .tables
                            .iter()
                            .map(|id| Element::new("tablePart").attr("r:id", id)),
                    ),
            );
        }
        worksheet = worksheet.opt_child(
            sparkline_ext(&self.sparklines).map(|ext| Element::new("extLst").child(ext)),
        );

        tracing::debug!(sheet = %self.sheet.name, "worksheet written");
        worksheet.to_document()
    }

    fn sheet_pr(&mut self) -> Option<Element> {
        let tab_color = self.sheet.tab_color.as_ref()?;
        let color: XlsxColor = self.cx.styles.resolve_color(tab_color, self.cx.warnings)?;
        Some(Element::new("sheetPr").child(color.to_element("tabColor")))
    }

    fn dimension(&self) -> String {
        self.sheet
            .used_range()
            .unwrap_or_else(|| CellRange::single(CellCoord::new(0, 0)))
            .to_a1_span()
    }

    fn sheet_views(&self, selected: bool) -> Element {
        let rows = self.sheet.frozen_rows;
        let cols = self.sheet.frozen_columns;
        let mut view = Element::new("sheetView")
            .flag("tabSelected", selected)
            .attr("workbookViewId", 0);
        if rows > 0 || cols > 0 {
            let pane = match (cols > 0, rows > 0) {
                (true, true) => "bottomRight",
                (true, false) => "topRight",
                _ => "bottomLeft",
            };
            let top_left = CellCoord::new(rows, cols).to_a1();
            view = view
                .child(
                    Element::new("pane")
                        .opt_attr("xSplit", (cols > 0).then_some(cols))
                        .opt_attr("ySplit", (rows > 0).then_some(rows))
                        .attr("topLeftCell", &top_left)
                        .attr("activePane", pane)
                        .attr("state", "frozen"),
                )
                .child(
                    Element::new("selection")
                        .attr("pane", pane)
                        .attr("activeCell", &top_left)
                        .attr("sqref", &top_left),
                );
        }
        Element::new("sheetViews").child(view)
    }

    fn sheet_format(&self) -> Element {
        let row_height = self.sheet.default_row_height;
        Element::new("sheetFormatPr")
            .attr(
                "defaultColWidth",
                pixels_to_column_width(self.sheet.default_column_width),
            )
            .attr("defaultRowHeight", pixels_to_points(row_height))
            .flag("customHeight", row_height != STANDARD_ROW_HEIGHT)
    }

    fn cols(&mut self) -> Option<Element> {
        let sheet = self.sheet;
        let mut entries = Vec::new();
        let mut next = 0;
        for (&col, data) in &sheet.columns {
            if col > MAX_COL {
                break;
            }
            let xf = self.column_xf(col);
            if data.width.is_none() && !data.hidden && xf == self.sheet_xf && self.sheet_style.is_none() {
                continue;
            }
            if self.sheet_style.is_some() && col > next {
                entries.push(self.col_element(next, col - 1, None, false, self.sheet_xf));
            }
            entries.push(self.col_element(col, col, data.width, data.hidden, xf));
            next = col + 1;
        }
        if self.sheet_style.is_some() && next <= MAX_COL {
            entries.push(self.col_element(next, MAX_COL, None, false, self.sheet_xf));
        }
        (!entries.is_empty()).then(|| Element::new("cols").children(entries))
    }

    fn col_element(&self, first: u32, last: u32, width: Option<f64>, hidden: bool, xf: usize) -> Element {
        let pixels = width.unwrap_or(self.sheet.default_column_width);
        Element::new("col")
            .attr("min", first + 1)
            .attr("max", last + 1)
            .attr("width", pixels_to_column_width(pixels))
            .opt_attr("style", (xf != 0).then_some(xf))
            .flag("hidden", hidden)
            .flag("customWidth", width.is_some())
    }

    fn sheet_data(&mut self) -> Element {
        let sheet = self.sheet;
        let mut data = Element::new("sheetData");
        for (&row, row_data) in &sheet.rows {
            let row_style = self.layer(row_data.style.as_ref());
            let row_xf = row_style.map(|style| self.xf_for(&[self.sheet_style, Some(style)]));

            let mut cells = Vec::new();
            for (&col, cell) in &row_data.cells {
                let coord = CellCoord::new(row, col);
                self.collect_cell_extras(coord, cell);
                if cell.formula.as_deref().is_some_and(is_sparkline_formula) {
                    continue;
                }

                let col_style = sheet
                    .columns
                    .get(&col)
                    .and_then(|c| self.layer(c.style.as_ref()));
                let cell_style = self.layer(cell.style.as_ref());
                let xf = self.xf_for(&[self.sheet_style, row_style, col_style, cell_style]);
                let prevailing = match row_xf {
                    Some(row_xf) => row_xf,
                    None => self.column_xf(col),
                };
                if !cell.has_content() && xf == prevailing {
                    continue;
                }
                cells.push(self.cell_element(coord, cell, xf));
            }

            let custom_format = row_xf.is_some_and(|xf| xf != self.sheet_xf);
            if cells.is_empty() && !custom_format && row_data.height.is_none() && !row_data.hidden {
                continue;
            }
            data.push(
                Element::new("row")
                    .attr("r", row + 1)
                    .opt_attr("s", row_xf.filter(|_| custom_format))
                    .flag("customFormat", custom_format)
                    .opt_attr("ht", row_data.height.map(pixels_to_points))
                    .flag("hidden", row_data.hidden)
                    .flag("customHeight", row_data.height.is_some())
                    .children(cells),
            );
        }
        data
    }

    fn collect_cell_extras(&mut self, coord: CellCoord, cell: &Cell) {
        if let Some(area) = cell.merge {
            if area.start == coord && !area.is_single_cell() && !self.merges.contains(&area) {
                self.merges.push(area);
            }
        }
        if let Some(target) = cell.hyperlink.as_deref().filter(|t| !t.trim().is_empty()) {
            let link = Element::new("hyperlink").attr("ref", coord.to_a1());
            let link = match target.strip_prefix('#') {
                Some(location) => link.attr("location", location),
                None => {
                    let id = self.cx.relationships.add_external(rel_types::HYPERLINK, target);
                    link.attr("r:id", id)
                }
            };
            self.hyperlinks.push(link);
        }
        if let Some(formula) = cell.formula.as_deref().filter(|f| is_sparkline_formula(f)) {
            if let Some(sparkline) = parse_sparkline(formula, coord, &self.sheet.name, self.cx.warnings)
            {
                self.sparklines.push(sparkline);
            }
        }
    }

    fn cell_element(&mut self, coord: CellCoord, cell: &Cell, xf: usize) -> Element {
        let element = Element::new("c")
            .attr("r", coord.to_a1())
            .opt_attr("s", (xf != 0).then_some(xf));

        if let Some(formula) = &cell.formula {
            let stored = self
                .cx
                .translator
                .translate(formula, cell.table.as_deref(), self.cx.warnings);
            let f = match cell.spill {
                Some(area) => Element::new("f")
                    .attr("t", "array")
                    .attr("ref", area.to_a1())
                    .text(stored),
                None => Element::new("f").text(stored),
            };
            let (kind, value) = cached_value(&cell.value);
            return element
                .opt_attr("t", kind)
                .child(f)
                .opt_child(value.map(|v| Element::new("v").text(v)));
        }

        match &cell.value {
            CellValue::Empty => element,
            CellValue::Text(text) => {
                let index = self.cx.strings.ensure(text);
                element
                    .attr("t", "s")
                    .child(Element::new("v").text(index.to_string()))
            }
            other => {
                let (kind, value) = cached_value(other);
                element
                    .opt_attr("t", kind)
                    .opt_child(value.map(|v| Element::new("v").text(v)))
            }
        }
    }

    fn conditional_formats(&mut self) -> Vec<Element> {
        let sheet = self.sheet;
        let mut rules: Vec<&ConditionalFormattingRule> =
            sheet.conditional_formats.iter().filter(|r| r.enabled).collect();
        // Higher model priority wins, which is the lowest number in the file.
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        rules
            .into_iter()
            .enumerate()
            .map(|(index, rule)| {
                Element::new("conditionalFormatting")
                    .attr("sqref", rule.range.to_a1())
                    .child(self.cf_rule(rule, index + 1))
            })
            .collect()
    }

    fn cf_rule(&mut self, rule: &ConditionalFormattingRule, priority: usize) -> Element {
        let dxf_id = rule
            .rule
            .format()
            .map(|format| self.cx.styles.ensure_dxf(Dxf::from(format)));
        let element = |kind: &str| {
            Element::new("cfRule")
                .attr("type", kind)
                .opt_attr("dxfId", dxf_id)
                .attr("priority", priority)
        };
        let anchor = rule.range.start.to_a1();

        match &rule.rule {
            ConditionalRule::ValueBased {
                operator,
                value1,
                value2,
                ..
            } => {
                let between = matches!(
                    operator,
                    ComparisonOperator::Between | ComparisonOperator::NotBetween
                );
                element("cellIs")
                    .attr("operator", comparison_name(*operator))
                    .child(Element::new("formula").text(value1.to_string()))
                    .opt_child(between.then(|| {
                        Element::new("formula").text(value2.unwrap_or(*value1).to_string())
                    }))
            }
            ConditionalRule::TextBased {
                operator,
                pattern,
                case_sensitive,
                ..
            } => {
                let text = pattern.as_deref().unwrap_or_default();
                let literal = format!("\"{}\"", text.replace('"', "\"\""));
                let search = if *case_sensitive { "FIND" } else { "SEARCH" };
                let (kind, op, formula) = match operator {
                    TextOperator::Contains => (
                        "containsText",
                        Some("containsText"),
                        format!("NOT(ISERROR({search}({literal},{anchor})))"),
                    ),
                    TextOperator::NotContains => (
                        "notContainsText",
                        Some("notContains"),
                        format!("ISERROR({search}({literal},{anchor}))"),
                    ),
                    TextOperator::StartsWith => (
                        "beginsWith",
                        Some("beginsWith"),
                        prefix_test("LEFT", &literal, &anchor, *case_sensitive),
                    ),
                    TextOperator::EndsWith => (
                        "endsWith",
                        Some("endsWith"),
                        prefix_test("RIGHT", &literal, &anchor, *case_sensitive),
                    ),
                    TextOperator::IsEmpty => ("containsBlanks", None, format!("LEN(TRIM({anchor}))=0")),
                    TextOperator::IsNotEmpty => {
                        ("notContainsBlanks", None, format!("LEN(TRIM({anchor}))>0"))
                    }
                };
                let with_text = op.is_some();
                element(kind)
                    .opt_attr("operator", op)
                    .opt_attr("text", with_text.then_some(text))
                    .child(Element::new("formula").text(formula))
            }
            ConditionalRule::Expression { formula, .. } => {
                let stored = self.cx.translator.translate(formula, None, self.cx.warnings);
                element("expression").child(Element::new("formula").text(stored))
            }
            ConditionalRule::ColorScale {
                min_color,
                max_color,
                mid_color,
            } => {
                let mut scale = Element::new("colorScale").child(Element::new("cfvo").attr("type", "min"));
                if mid_color.is_some() {
                    scale = scale.child(Element::new("cfvo").attr("type", "percentile").attr("val", 50));
                }
                scale = scale
                    .child(Element::new("cfvo").attr("type", "max"))
                    .child(Element::new("color").attr("rgb", min_color.to_argb()))
                    .opt_child(mid_color.map(|c| Element::new("color").attr("rgb", c.to_argb())))
                    .child(Element::new("color").attr("rgb", max_color.to_argb()));
                element("colorScale").child(scale)
            }
            ConditionalRule::DataBar { color } => element("dataBar").child(
                Element::new("dataBar")
                    .child(Element::new("cfvo").attr("type", "min"))
                    .child(Element::new("cfvo").attr("type", "max"))
                    .child(Element::new("color").attr("rgb", color.to_argb())),
            ),
        }
    }

    fn data_validations(&mut self) -> Option<Element> {
        let sheet = self.sheet;
        let rules: Vec<Element> = sheet
            .data_validations
            .iter()
            .filter(|rule| rule.enabled)
            .map(|rule| self.data_validation(rule))
            .collect();
        (!rules.is_empty()).then(|| {
            Element::new("dataValidations")
                .attr("count", rules.len())
                .children(rules)
        })
    }

    fn data_validation(&mut self, rule: &DataValidationRule) -> Element {
        let (kind, operator, formula1, formula2, hide_dropdown) = match &rule.criteria {
            ValidationCriteria::List {
                source,
                show_dropdown,
            } => {
                let formula = match source {
                    ListSource::Values { items } => {
                        format!("\"{}\"", items.join(",").replace('"', "\"\""))
                    }
                    ListSource::Range { reference } => {
                        reference.trim().trim_start_matches('=').to_string()
                    }
                };
                (Some("list"), None, Some(formula), None, !show_dropdown)
            }
            ValidationCriteria::WholeNumber {
                operator,
                value1,
                value2,
            } => (
                Some("whole"),
                Some(*operator),
                Some(value1.to_string()),
                value2.map(|v| v.to_string()),
                false,
            ),
            ValidationCriteria::Decimal {
                operator,
                value1,
                value2,
            } => (
                Some("decimal"),
                Some(*operator),
                Some(value1.to_string()),
                value2.map(|v| v.to_string()),
                false,
            ),
            ValidationCriteria::TextLength {
                operator,
                value1,
                value2,
            } => (
                Some("textLength"),
                Some(*operator),
                Some(value1.to_string()),
                value2.map(|v| v.to_string()),
                false,
            ),
            ValidationCriteria::Date {
                operator,
                value1,
                value2,
            } => (
                Some("date"),
                Some(*operator),
                Some(unix_to_serial_date(*value1).to_string()),
                value2.map(|v| unix_to_serial_date(v).to_string()),
                false,
            ),
            ValidationCriteria::Custom { formula } => {
                let stored = self.cx.translator.translate(formula, None, self.cx.warnings);
                (Some("custom"), None, Some(stored), None, false)
            }
            ValidationCriteria::Any => (None, None, None, None, false),
        };
        let formula2 = match operator {
            Some(ValidationOperator::Between | ValidationOperator::NotBetween) => {
                formula2.or_else(|| formula1.clone())
            }
            _ => None,
        };

        let input = rule.input_message.as_ref();
        let alert = &rule.error_alert;
        Element::new("dataValidation")
            .opt_attr("type", kind)
            .opt_attr(
                "errorStyle",
                match alert.style {
                    AlertStyle::Stop => None,
                    AlertStyle::Warning => Some("warning"),
                    AlertStyle::Information => Some("information"),
                },
            )
            .opt_attr("operator", operator.map(validation_operator_name))
            .flag("allowBlank", rule.allow_blank)
            .flag("showDropDown", hide_dropdown)
            .flag("showInputMessage", input.is_some())
            .attr("showErrorMessage", 1)
            .opt_attr("errorTitle", alert.title.as_deref())
            .opt_attr("error", alert.message.as_deref())
            .opt_attr("promptTitle", input.and_then(|m| m.title.as_deref()))
            .opt_attr("prompt", input.and_then(|m| m.message.as_deref()))
            .attr("sqref", rule.range.to_a1())
            .opt_child(formula1.map(|f| Element::new("formula1").text(f)))
            .opt_child(formula2.map(|f| Element::new("formula2").text(f)))
    }
}

/// `t` attribute and `<v>` text of a plain or cached value.
fn cached_value(value: &CellValue) -> (Option<&'static str>, Option<String>) {
    match value {
        CellValue::Empty => (None, None),
        CellValue::Number(n) if n.is_finite() => (None, Some(n.to_string())),
        CellValue::Number(_) => (Some("e"), Some("#NUM!".to_string())),
        CellValue::Text(text) => (Some("str"), Some(text.clone())),
        CellValue::Boolean(b) => (Some("b"), Some(if *b { "1" } else { "0" }.to_string())),
        CellValue::Error(error) => (Some("e"), Some(error.code().to_string())),
    }
}

fn prefix_test(side: &str, literal: &str, anchor: &str, case_sensitive: bool) -> String {
    if case_sensitive {
        format!("EXACT({side}({anchor},LEN({literal})),{literal})")
    } else {
        format!("{side}({anchor},LEN({literal}))={literal}")
    }
}

fn comparison_name(operator: ComparisonOperator) -> &'static str {
    match operator {
        ComparisonOperator::GreaterThan => "greaterThan",
        ComparisonOperator::GreaterThanOrEqual => "greaterThanOrEqual",
        ComparisonOperator::LessThan => "lessThan",
        ComparisonOperator::LessThanOrEqual => "lessThanOrEqual",
        ComparisonOperator::Equal => "equal",
        ComparisonOperator::NotEqual => "notEqual",
        ComparisonOperator::Between => "between",
        ComparisonOperator::NotBetween => "notBetween",
    }
}

fn validation_operator_name(operator: ValidationOperator) -> &'static str {
    match operator {
        ValidationOperator::Between => "between",
        ValidationOperator::NotBetween => "notBetween",
        ValidationOperator::Equal => "equal",
        ValidationOperator::NotEqual => "notEqual",
        ValidationOperator::GreaterThan => "greaterThan",
        ValidationOperator::GreaterThanOrEqual => "greaterThanOrEqual",
        ValidationOperator::LessThan => "lessThan",
        ValidationOperator::LessThanOrEqual => "lessThanOrEqual",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use xlport_core::{
        CellError, Color, ColumnData, ConditionalFormat, RowData, ValidationMessage,
    };

    struct Fixture {
        strings: SharedStrings,
        styles: StyleCache,
        relationships: Relationships,
        translator: FormulaTranslator,
        warnings: Warnings,
    }

    impl Fixture {
        fn new() -> Self {
            Fixture {
                strings: SharedStrings::new(),
                styles: StyleCache::default(),
                relationships: Relationships::new(),
                translator: FormulaTranslator::default(),
                warnings: Warnings::new(),
            }
        }

        fn write(&mut self, sheet: &SerializedSheet, shared: &[Style], links: &SheetLinks) -> String {
            let mut cx = SheetContext {
                strings: &mut self.strings,
                styles: &mut self.styles,
                relationships: &mut self.relationships,
                translator: &self.translator,
                warnings: &mut self.warnings,
            };
            write_worksheet(sheet, shared, links, &mut cx).unwrap()
        }
    }

    fn at(a1: &str) -> CellCoord {
        CellCoord::from_a1(a1).unwrap()
    }

    #[test]
    fn test_single_number_cell() {
        let mut sheet = SerializedSheet::new("s1", "Sheet1");
        sheet.set_cell(at("A1"), Cell::number(42.0));
        let xml = Fixture::new().write(&sheet, &[], &SheetLinks::default());

        assert!(xml.contains(r#"<dimension ref="A1:A1"/>"#));
        assert!(xml.contains(r#"<sheetData><row r="1"><c r="A1"><v>42</v></c></row></sheetData>"#));
    }

    #[test]
    fn test_empty_sheet_dimension() {
        let sheet = SerializedSheet::new("s1", "Sheet1");
        let xml = Fixture::new().write(&sheet, &[], &SheetLinks::default());
        assert!(xml.contains(r#"<dimension ref="A1:A1"/>"#));
        assert!(xml.contains("<sheetData/>"));
    }

    #[test]
    fn test_value_types() {
        let mut sheet = SerializedSheet::new("s1", "Sheet1");
        sheet.set_cell(at("A1"), Cell::text("hello"));
        sheet.set_cell(at("B1"), Cell::boolean(true));
        sheet.set_cell(at("C1"), Cell::new(CellValue::Error(CellError::CircularReference)));
        sheet.set_cell(at("D1"), Cell::number(f64::INFINITY));
        sheet.set_cell(at("E1"), Cell::text("'007"));
        sheet.set_cell(
            at("F1"),
            Cell::formula("=CONCAT(A1,\"!\")", CellValue::Text("hello!".into())),
        );
        let mut fixture = Fixture::new();
        let xml = fixture.write(&sheet, &[], &SheetLinks::default());

        assert!(xml.contains(r#"<c r="A1" t="s"><v>0</v></c>"#));
        assert!(xml.contains(r#"<c r="B1" t="b"><v>1</v></c>"#));
        assert!(xml.contains(r#"<c r="C1" t="e"><v>#REF!</v></c>"#));
        assert!(xml.contains(r#"<c r="D1" t="e"><v>#NUM!</v></c>"#));
        assert!(xml.contains(r#"<c r="E1" t="s"><v>1</v></c>"#));
        assert_eq!(fixture.strings.get(1), Some("007"));
        assert!(xml.contains(
            r#"<c r="F1" t="str"><f>_xlfn.CONCAT(A1,&quot;!&quot;)</f><v>hello!</v></c>"#
        ));
    }

    #[test]
    fn test_array_formula_and_style() {
        let mut sheet = SerializedSheet::new("s1", "Sheet1");
        let mut cell = Cell::formula("=SEQUENCE(3)", CellValue::Number(1.0))
            .with_style(Style::new().with_bold(true));
        cell.spill = CellRange::from_a1("A1:A3");
        sheet.set_cell(at("A1"), cell);
        let xml = Fixture::new().write(&sheet, &[], &SheetLinks::default());
        assert!(xml.contains(r#"<c r="A1" s="1"><f t="array" ref="A1:A3">_xlfn.SEQUENCE(3)</f><v>1</v></c>"#));
    }

    #[test]
    fn test_style_cascade_and_empty_cell_skip() {
        let shared = vec![Style::new().with_fill(Color::rgb(255, 255, 0))];
        let mut sheet = SerializedSheet::new("s1", "Sheet1");
        sheet.rows.insert(
            1,
            RowData {
                style: Some(StyleRef::Index(0)),
                ..Default::default()
            },
        );
        // Same fill as the row: nothing to write.
        sheet.set_cell(at("A2"), Cell::default().with_style(StyleRef::Index(0)));
        // Bold on top of the row fill: written with its own format.
        sheet.set_cell(at("B2"), Cell::default().with_style(Style::new().with_bold(true)));
        // Out-of-range reference counts as no style.
        sheet.set_cell(at("C3"), Cell::default().with_style(StyleRef::Index(9)));

        let xml = Fixture::new().write(&sheet, &shared, &SheetLinks::default());
        assert!(xml.contains(r#"<row r="2" s="1" customFormat="1"><c r="B2" s="2"/></row>"#));
        assert!(!xml.contains(r#"r="A2""#));
        assert!(!xml.contains(r#"<row r="3""#));
    }

    #[test]
    fn test_sheet_style_fills_column_gaps() {
        let shared = vec![Style::new().with_italic(true)];
        let mut sheet = SerializedSheet::new("s1", "Sheet1");
        sheet.style = Some(StyleRef::Index(0));
        sheet.columns.insert(
            2,
            ColumnData {
                width: Some(64.0),
                ..Default::default()
            },
        );
        let xml = Fixture::new().write(&sheet, &shared, &SheetLinks::default());
        assert!(xml.contains(r#"<col min="1" max="2" width="14.28125" style="1"/>"#));
        assert!(xml.contains(r#"<col min="3" max="3" width="9.140625" style="1" customWidth="1"/>"#));
        assert!(xml.contains(r#"<col min="4" max="16384" width="14.28125" style="1"/>"#));
    }

    #[test]
    fn test_rows_with_height_hidden_and_frozen_pane() {
        let mut sheet = SerializedSheet::new("s1", "Sheet1");
        sheet.set_row_height(4, 40.0);
        sheet.rows.entry(6).or_default().hidden = true;
        sheet.frozen_rows = 1;
        let xml = Fixture::new().write(&sheet, &[], &SheetLinks { selected: true, ..Default::default() });
        assert!(xml.contains(r#"<row r="5" ht="30" customHeight="1"/>"#));
        assert!(xml.contains(r#"<row r="7" hidden="1"/>"#));
        assert!(xml.contains(r#"<sheetView tabSelected="1" workbookViewId="0"><pane ySplit="1" topLeftCell="A2" activePane="bottomLeft" state="frozen"/>"#));
    }

    #[test]
    fn test_merges_and_hyperlinks() {
        let mut sheet = SerializedSheet::new("s1", "Sheet1");
        let area = CellRange::from_a1("A1:B2").unwrap();
        sheet.set_cell(
            at("A1"),
            Cell::text("Docs").with_merge(area).with_hyperlink("https://example.com"),
        );
        sheet.set_cell(at("B2"), Cell::default().with_merge(area));
        sheet.set_cell(at("C1"), Cell::text("Jump").with_hyperlink("#'Q 1'!A1"));

        let mut fixture = Fixture::new();
        let xml = fixture.write(&sheet, &[], &SheetLinks::default());
        assert!(xml.contains(r#"<mergeCells count="1"><mergeCell ref="A1:B2"/></mergeCells>"#));
        assert!(xml.contains(r#"<hyperlink ref="A1" r:id="rId1"/>"#));
        assert!(xml.contains(r#"<hyperlink ref="C1" location="&apos;Q 1&apos;!A1"/>"#));
        assert_eq!(fixture.relationships.len(), 1);
    }

    #[test]
    fn test_sparkline_cells_move_to_extension() {
        let mut sheet = SerializedSheet::new("s1", "Data");
        sheet.set_cell(at("A1"), Cell::number(1.0));
        sheet.set_cell(at("B1"), Cell::formula("=Sparkline.Column(A1:A1)", CellValue::Empty));
        let xml = Fixture::new().write(&sheet, &[], &SheetLinks::default());
        assert!(!xml.contains(r#"<c r="B1""#));
        assert!(xml.contains("<extLst><ext "));
        assert!(xml.contains("<xm:sqref>B1</xm:sqref>"));
    }

    #[test]
    fn test_conditional_formats() {
        let mut sheet = SerializedSheet::new("s1", "Sheet1");
        let range = CellRange::from_a1("B2:B9").unwrap();
        sheet.conditional_formats.push(ConditionalFormattingRule::new(
            "gt".into(),
            range,
            ConditionalRule::ValueBased {
                operator: ComparisonOperator::Between,
                value1: 1.0,
                value2: Some(5.5),
                format: ConditionalFormat {
                    background_color: Some(Color::RED),
                    ..Default::default()
                },
            },
        ));
        let mut contains = ConditionalFormattingRule::new(
            "txt".into(),
            range,
            ConditionalRule::TextBased {
                operator: TextOperator::Contains,
                pattern: Some("ok".into()),
                case_sensitive: false,
                format: ConditionalFormat {
                    bold: Some(true),
                    ..Default::default()
                },
            },
        );
        contains.priority = 5;
        sheet.conditional_formats.push(contains);
        sheet.conditional_formats.push(ConditionalFormattingRule::new(
            "scale".into(),
            range,
            ConditionalRule::ColorScale {
                min_color: Color::WHITE,
                max_color: Color::GREEN,
                mid_color: None,
            },
        ));

        let mut fixture = Fixture::new();
        let xml = fixture.write(&sheet, &[], &SheetLinks::default());
        assert!(xml.contains(
            r#"<cfRule type="containsText" dxfId="0" priority="1" operator="containsText" text="ok"><formula>NOT(ISERROR(SEARCH(&quot;ok&quot;,B2)))</formula></cfRule>"#
        ));
        assert!(xml.contains(
            r#"<cfRule type="cellIs" dxfId="1" priority="2" operator="between"><formula>1</formula><formula>5.5</formula></cfRule>"#
        ));
        assert!(xml.contains(
            r#"<colorScale><cfvo type="min"/><cfvo type="max"/><color rgb="FFFFFFFF"/><color rgb="FF00FF00"/></colorScale>"#
        ));
        assert_eq!(fixture.styles.dxf_count(), 2);
    }

    #[test]
    fn test_data_validations() {
        let mut sheet = SerializedSheet::new("s1", "Sheet1");
        let mut list = DataValidationRule::new(
            "list".into(),
            CellRange::from_a1("A1:A9").unwrap(),
            ValidationCriteria::List {
                source: ListSource::Values {
                    items: vec!["Yes".into(), "No".into()],
                },
                show_dropdown: true,
            },
        );
        list.input_message = Some(ValidationMessage {
            title: Some("Pick".into()),
            message: None,
        });
        sheet.data_validations.push(list);
        sheet.data_validations.push(DataValidationRule::new(
            "whole".into(),
            CellRange::from_a1("B1").unwrap(),
            ValidationCriteria::WholeNumber {
                operator: ValidationOperator::Between,
                value1: 1,
                value2: None,
            },
        ));
        let mut disabled = DataValidationRule::new(
            "off".into(),
            CellRange::from_a1("C1").unwrap(),
            ValidationCriteria::Any,
        );
        disabled.enabled = false;
        sheet.data_validations.push(disabled);

        let xml = Fixture::new().write(&sheet, &[], &SheetLinks::default());
        assert!(xml.contains(r#"<dataValidations count="2">"#));
        assert!(xml.contains(
            r#"<dataValidation type="list" allowBlank="1" showInputMessage="1" showErrorMessage="1" promptTitle="Pick" sqref="A1:A9"><formula1>&quot;Yes,No&quot;</formula1></dataValidation>"#
        ));
        assert!(xml.contains(
            r#"<dataValidation type="whole" operator="between" allowBlank="1" showErrorMessage="1" sqref="B1"><formula1>1</formula1><formula2>1</formula2></dataValidation>"#
        ));
    }

    #[test]
    fn test_companion_parts_in_schema_order() {
        let sheet = SerializedSheet::new("s1", "Sheet1");
        let links = SheetLinks {
            selected: false,
            drawing: Some("rId2".into()),
            picture: Some("rId3".into()),
            tables: vec!["rId1".into()],
        };
        let xml = Fixture::new().write(&sheet, &[], &links);
        let margins = xml.find("<pageMargins").unwrap();
        let drawing = xml.find(r#"<drawing r:id="rId2"/>"#).unwrap();
        let picture = xml.find(r#"<picture r:id="rId3"/>"#).unwrap();
        let tables = xml
            .find(r#"<tableParts count="1"><tablePart r:id="rId1"/></tableParts>"#)
            .unwrap();
        assert!(margins < drawing && drawing < picture && picture < tables);
    }
}
