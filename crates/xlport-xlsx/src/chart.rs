//! Chart formulas (`=Column.Chart(A1:A4, B1:B4, "Sales")`) and the chart
//! parts built from them.
//!
//! A chart formula is parsed with the formula parser and walked once. The
//! data argument is a range, a `Group(...)` of data arguments or a
//! `Series(name, categories, values, size)` call; every range ends up
//! absolute and sheet-qualified.

use xlport_formula::{Expr, NomParser};

use crate::error::Result;
use crate::formula::area_of;
use crate::warnings::Warnings;
use crate::xml::{ns, Element};

const CATEGORY_AXIS_ID: u32 = 500_000_001;
const VALUE_AXIS_ID: u32 = 500_000_002;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Column,
    Bar,
    Line,
    Scatter,
    Bubble,
    Donut,
}

impl ChartKind {
    /// Chart family of a function name such as `Column.Chart`.
    pub fn from_function(name: &str) -> Option<Self> {
        let family = name.to_ascii_uppercase();
        let kind = match family.strip_suffix(".CHART")? {
            "COLUMN" => ChartKind::Column,
            "BAR" => ChartKind::Bar,
            "LINE" => ChartKind::Line,
            "SCATTER" => ChartKind::Scatter,
            "BUBBLE" => ChartKind::Bubble,
            "DONUT" => ChartKind::Donut,
            _ => return None,
        };
        Some(kind)
    }

    fn has_axes(self) -> bool {
        self != ChartKind::Donut
    }

    /// Scatter and bubble charts plot against two value axes.
    fn is_xy(self) -> bool {
        matches!(self, ChartKind::Scatter | ChartKind::Bubble)
    }
}

/// Chart or series title: literal text or a cell holding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChartTitle {
    Literal(String),
    Reference(String),
}

impl ChartTitle {
    fn to_tx(&self) -> Element {
        match self {
            ChartTitle::Literal(text) => Element::new("c:tx").child(Element::new("c:v").text(text)),
            ChartTitle::Reference(reference) => Element::new("c:tx").child(str_ref(reference)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartSeries {
    pub name: Option<ChartTitle>,
    pub categories: Option<String>,
    pub values: String,
    pub sizes: Option<String>,
}

impl ChartSeries {
    fn values(values: String) -> Self {
        ChartSeries {
            name: None,
            categories: None,
            values,
            sizes: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartOptions {
    pub kind: ChartKind,
    pub series: Vec<ChartSeries>,
    pub categories: Option<String>,
    pub title: Option<ChartTitle>,
    pub smooth: bool,
}

/// Read a chart formula. Returns `None` (with a warning) when the formula is
/// not a chart call or yields no series.
pub fn parse_chart(formula: &str, sheet_name: &str, warnings: &mut Warnings) -> Option<ChartOptions> {
    let expr = match NomParser::new().parse(formula) {
        Ok(expr) => expr,
        Err(err) => {
            warnings.push(format_args!("chart formula {formula:?} skipped: {err}"));
            return None;
        }
    };
    let Expr::FunctionCall { name, args } = expr else {
        warnings.push(format_args!("chart formula {formula:?} is not a chart call"));
        return None;
    };
    let Some(kind) = ChartKind::from_function(&name) else {
        warnings.push(format_args!("unknown chart family {name}"));
        return None;
    };

    let walker = ChartWalker { sheet_name };
    let mut args = args.into_iter();
    let mut series = Vec::new();
    if let Some(data) = args.next() {
        walker.collect_series(data, &mut series, warnings);
    }
    let categories = args.next().and_then(|arg| walker.optional_area(arg, "categories", warnings));
    let title = args.next().and_then(|arg| walker.title(arg, warnings));
    let mut smooth = false;
    for flag in args {
        match flag {
            Expr::String(text) if text.eq_ignore_ascii_case("smooth") => smooth = true,
            Expr::Missing => {}
            other => warnings.push(format_args!("chart flag {} ignored", other)),
        }
    }

    if series.is_empty() {
        warnings.push(format_args!("chart formula {formula:?} has no data series"));
        return None;
    }
    Some(ChartOptions {
        kind,
        series,
        categories,
        title,
        smooth,
    })
}

struct ChartWalker<'a> {
    sheet_name: &'a str,
}

impl ChartWalker<'_> {
    fn collect_series(&self, data: Expr, series: &mut Vec<ChartSeries>, warnings: &mut Warnings) {
        match data {
            Expr::FunctionCall { name, args } if name.eq_ignore_ascii_case("GROUP") => {
                for arg in args {
                    self.collect_series(arg, series, warnings);
                }
            }
            Expr::FunctionCall { name, args } if name.eq_ignore_ascii_case("SERIES") => {
                let mut args = args.into_iter();
                let name = args.next().and_then(|arg| self.title(arg, warnings));
                let categories =
                    args.next().and_then(|arg| self.optional_area(arg, "categories", warnings));
                let Some(values) =
                    args.next().and_then(|arg| self.optional_area(arg, "values", warnings))
                else {
                    warnings.push("Series(...) without values dropped");
                    return;
                };
                let sizes = args.next().and_then(|arg| self.optional_area(arg, "sizes", warnings));
                series.push(ChartSeries {
                    name,
                    categories,
                    values,
                    sizes,
                });
            }
            Expr::Grouped(inner) => self.collect_series(*inner, series, warnings),
            other => match self.area(&other) {
                Some(values) => series.push(ChartSeries::values(values)),
                None => warnings.push(format_args!("chart data argument {other} dropped")),
            },
        }
    }

    fn optional_area(&self, arg: Expr, role: &str, warnings: &mut Warnings) -> Option<String> {
        if arg == Expr::Missing {
            return None;
        }
        let area = self.area(&arg);
        if area.is_none() {
            warnings.push(format_args!("chart {role} argument {arg} dropped"));
        }
        area
    }

    fn title(&self, arg: Expr, warnings: &mut Warnings) -> Option<ChartTitle> {
        match arg {
            Expr::Missing => None,
            Expr::String(text) => Some(ChartTitle::Literal(text)),
            other => match self.area(&other) {
                Some(reference) => Some(ChartTitle::Reference(reference)),
                None => {
                    warnings.push(format_args!("chart title {other} dropped"));
                    None
                }
            },
        }
    }

    /// Absolute, sheet-qualified text of a reference expression.
    fn area(&self, expr: &Expr) -> Option<String> {
        let area = area_of(expr)?.with_default_sheet(self.sheet_name);
        Some(area.to_string())
    }
}

fn formula_element(name: &str, reference: &str) -> Element {
    Element::new(name).child(Element::new("c:f").text(reference))
}

fn str_ref(reference: &str) -> Element {
    formula_element("c:strRef", reference)
}

fn num_ref(reference: &str) -> Element {
    formula_element("c:numRef", reference)
}

fn axis(tag: &str, id: u32, cross: u32, position: &str, gridlines: bool, cross_between: Option<&str>) -> Element {
    let mut axis = Element::new(tag)
        .child(Element::val("c:axId", id))
        .child(Element::new("c:scaling").child(Element::val("c:orientation", "minMax")))
        .child(Element::val("c:delete", 0))
        .child(Element::val("c:axPos", position));
    if gridlines {
        axis.push(Element::new("c:majorGridlines"));
    }
    axis.push(Element::val("c:majorTickMark", "out"));
    axis.push(Element::val("c:tickLblPos", "nextTo"));
    axis.push(Element::val("c:crossAx", cross));
    axis.push(Element::val("c:crosses", "autoZero"));
    if let Some(between) = cross_between {
        axis.push(Element::val("c:crossBetween", between));
    }
    axis
}

impl ChartOptions {
    fn series_element(&self, index: usize, series: &ChartSeries) -> Element {
        let mut ser = Element::new("c:ser")
            .child(Element::val("c:idx", index))
            .child(Element::val("c:order", index))
            .opt_child(series.name.as_ref().map(ChartTitle::to_tx));
        let categories = series.categories.as_deref().or(self.categories.as_deref());

        match self.kind {
            ChartKind::Column | ChartKind::Bar => {
                ser.push(Element::val("c:invertIfNegative", 0));
                if let Some(categories) = categories {
                    ser.push(Element::new("c:cat").child(str_ref(categories)));
                }
                ser.push(Element::new("c:val").child(num_ref(&series.values)));
            }
            ChartKind::Line => {
                ser.push(Element::new("c:marker").child(Element::val("c:symbol", "none")));
                if let Some(categories) = categories {
                    ser.push(Element::new("c:cat").child(str_ref(categories)));
                }
                ser.push(Element::new("c:val").child(num_ref(&series.values)));
                ser.push(Element::val("c:smooth", u8::from(self.smooth)));
            }
            ChartKind::Scatter => {
                ser.push(Element::new("c:marker").child(Element::val("c:symbol", "circle")));
                if let Some(categories) = categories {
                    ser.push(Element::new("c:xVal").child(num_ref(categories)));
                }
                ser.push(Element::new("c:yVal").child(num_ref(&series.values)));
                ser.push(Element::val("c:smooth", u8::from(self.smooth)));
            }
            ChartKind::Bubble => {
                ser.push(Element::val("c:invertIfNegative", 0));
                if let Some(categories) = categories {
                    ser.push(Element::new("c:xVal").child(num_ref(categories)));
                }
                ser.push(Element::new("c:yVal").child(num_ref(&series.values)));
                let sizes = series.sizes.as_deref().unwrap_or(&series.values);
                ser.push(Element::new("c:bubbleSize").child(num_ref(sizes)));
                ser.push(Element::val("c:bubble3D", 0));
            }
            ChartKind::Donut => {
                if let Some(categories) = categories {
                    ser.push(Element::new("c:cat").child(str_ref(categories)));
                }
                ser.push(Element::new("c:val").child(num_ref(&series.values)));
            }
        }
        ser
    }

    fn plot_element(&self) -> Element {
        let series = self
            .series
            .iter()
            .enumerate()
            .map(|(index, series)| self.series_element(index, series));
        let axis_ids = [CATEGORY_AXIS_ID, VALUE_AXIS_ID].map(|id| Element::val("c:axId", id));

        match self.kind {
            ChartKind::Column | ChartKind::Bar => {
                let direction = if self.kind == ChartKind::Bar { "bar" } else { "col" };
                Element::new("c:barChart")
                    .child(Element::val("c:barDir", direction))
                    .child(Element::val("c:grouping", "clustered"))
                    .child(Element::val("c:varyColors", 0))
                    .children(series)
                    .children(axis_ids)
            }
            ChartKind::Line => Element::new("c:lineChart")
                .child(Element::val("c:grouping", "standard"))
                .child(Element::val("c:varyColors", 0))
                .children(series)
                .child(Element::val("c:marker", 1))
                .children(axis_ids),
            ChartKind::Scatter => Element::new("c:scatterChart")
                .child(Element::val("c:scatterStyle", "lineMarker"))
                .child(Element::val("c:varyColors", 0))
                .children(series)
                .children(axis_ids),
            ChartKind::Bubble => Element::new("c:bubbleChart")
                .child(Element::val("c:varyColors", 0))
                .children(series)
                .child(Element::val("c:bubble3D", 0))
                .children(axis_ids),
            ChartKind::Donut => Element::new("c:doughnutChart")
                .child(Element::val("c:varyColors", 1))
                .children(series)
                .child(Element::val("c:firstSliceAng", 0))
                .child(Element::val("c:holeSize", 50)),
        }
    }

    fn axes(&self) -> Vec<Element> {
        match self.kind {
            ChartKind::Donut => Vec::new(),
            kind if kind.is_xy() => vec![
                axis("c:valAx", CATEGORY_AXIS_ID, VALUE_AXIS_ID, "b", false, Some("midCat")),
                axis("c:valAx", VALUE_AXIS_ID, CATEGORY_AXIS_ID, "l", true, Some("midCat")),
            ],
            ChartKind::Bar => vec![
                axis("c:catAx", CATEGORY_AXIS_ID, VALUE_AXIS_ID, "l", false, None),
                axis("c:valAx", VALUE_AXIS_ID, CATEGORY_AXIS_ID, "b", true, Some("between")),
            ],
            _ => vec![
                axis("c:catAx", CATEGORY_AXIS_ID, VALUE_AXIS_ID, "b", false, None),
                axis("c:valAx", VALUE_AXIS_ID, CATEGORY_AXIS_ID, "l", true, Some("between")),
            ],
        }
    }

    fn title_element(&self) -> Option<Element> {
        let tx = match self.title.as_ref()? {
            ChartTitle::Literal(text) => Element::new("c:tx").child(
                Element::new("c:rich")
                    .child(Element::new("a:bodyPr"))
                    .child(Element::new("a:lstStyle"))
                    .child(
                        Element::new("a:p")
                            .child(Element::new("a:pPr").child(Element::new("a:defRPr")))
                            .child(
                                Element::new("a:r")
                                    .child(Element::new("a:rPr").attr("lang", "en-US"))
                                    .child(Element::new("a:t").text(text)),
                            ),
                    ),
            ),
            ChartTitle::Reference(reference) => Element::new("c:tx").child(str_ref(reference)),
        };
        Some(
            Element::new("c:title")
                .child(tx)
                .child(Element::val("c:overlay", 0)),
        )
    }

    /// The chart part (`xl/charts/chartN.xml`).
    pub fn to_xml(&self) -> Result<String> {
        let mut plot_area = Element::new("c:plotArea")
            .child(Element::new("c:layout"))
            .child(self.plot_element());
        if self.kind.has_axes() {
            plot_area = plot_area.children(self.axes());
        }

        let chart = Element::new("c:chart")
            .opt_child(self.title_element())
            .child(Element::val("c:autoTitleDeleted", u8::from(self.title.is_none())))
            .child(plot_area)
            .child(
                Element::new("c:legend")
                    .child(Element::val("c:legendPos", "r"))
                    .child(Element::val("c:overlay", 0)),
            )
            .child(Element::val("c:plotVisOnly", 1));

        Element::new("c:chartSpace")
            .attr("xmlns:c", ns::CHART)
            .attr("xmlns:a", ns::DRAWINGML)
            .attr("xmlns:r", ns::REL)
            .child(Element::val("c:roundedCorners", 0))
            .child(chart)
            .to_document()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(formula: &str) -> (Option<ChartOptions>, Warnings) {
        let mut warnings = Warnings::new();
        let options = parse_chart(formula, "Data", &mut warnings);
        (options, warnings)
    }

    #[test]
    fn test_group_expands_to_absolute_series() {
        let (options, warnings) = parse(r#"=Column.Chart(Group(A1:A4, B1:B4), C1:C4, "Title")"#);
        let options = options.unwrap();
        assert!(warnings.is_empty());
        assert_eq!(options.kind, ChartKind::Column);
        let values: Vec<_> = options.series.iter().map(|s| s.values.as_str()).collect();
        assert_eq!(values, vec!["Data!$A$1:$A$4", "Data!$B$1:$B$4"]);
        assert_eq!(options.categories.as_deref(), Some("Data!$C$1:$C$4"));
        assert_eq!(options.title, Some(ChartTitle::Literal("Title".into())));
    }

    #[test]
    fn test_series_and_flags() {
        let (options, _) = parse(
            r#"=line.chart(Series(A1, 'Other Sheet'!B2:B9, C2:C9), , Other!D1, "smooth")"#,
        );
        let options = options.unwrap();
        assert_eq!(options.kind, ChartKind::Line);
        assert!(options.smooth);
        assert_eq!(
            options.series,
            vec![ChartSeries {
                name: Some(ChartTitle::Reference("Data!$A$1".into())),
                categories: Some("'Other Sheet'!$B$2:$B$9".into()),
                values: "Data!$C$2:$C$9".into(),
                sizes: None,
            }]
        );
        assert_eq!(options.categories, None);
        assert_eq!(options.title, Some(ChartTitle::Reference("Other!$D$1".into())));
    }

    #[test]
    fn test_unknown_shapes_are_dropped_with_warnings() {
        let (options, warnings) = parse("=Bar.Chart(Group(A1:A3, 42))");
        assert_eq!(options.unwrap().series.len(), 1);
        assert_eq!(warnings.len(), 1);

        let (options, warnings) = parse("=Pie.Chart(A1:A3)");
        assert!(options.is_none());
        assert_eq!(warnings.len(), 1);

        let (options, _) = parse("=Column.Chart(1)");
        assert!(options.is_none());
    }

    #[test]
    fn test_bar_chart_xml() {
        let (options, _) = parse(r#"=Bar.Chart(A1:A4, B1:B4, "Sales")"#);
        let xml = options.unwrap().to_xml().unwrap();
        assert!(xml.contains(r#"<c:barDir val="bar"/>"#));
        assert!(xml.contains("<c:cat><c:strRef><c:f>Data!$B$1:$B$4</c:f></c:strRef></c:cat>"));
        assert!(xml.contains("<c:val><c:numRef><c:f>Data!$A$1:$A$4</c:f></c:numRef></c:val>"));
        assert!(xml.contains("<a:t>Sales</a:t>"));
        assert!(xml.contains(r#"<c:autoTitleDeleted val="0"/>"#));
        let cat_ax = xml.find("<c:catAx>").unwrap();
        assert!(xml[cat_ax..].starts_with(
            r#"<c:catAx><c:axId val="500000001"/><c:scaling><c:orientation val="minMax"/></c:scaling><c:delete val="0"/><c:axPos val="l"/>"#
        ));
    }

    #[test]
    fn test_donut_has_no_axes_and_bubble_has_sizes() {
        let (donut, _) = parse("=Donut.Chart(A1:A3, B1:B3)");
        let xml = donut.unwrap().to_xml().unwrap();
        assert!(xml.contains(r#"<c:holeSize val="50"/>"#));
        assert!(!xml.contains("<c:valAx>"));
        assert!(xml.contains(r#"<c:autoTitleDeleted val="1"/>"#));

        let (bubble, _) = parse("=Bubble.Chart(Series(, A1:A3, B1:B3, C1:C3))");
        let xml = bubble.unwrap().to_xml().unwrap();
        assert!(xml.contains("<c:bubbleSize><c:numRef><c:f>Data!$C$1:$C$3</c:f></c:numRef></c:bubbleSize>"));
        assert_eq!(xml.matches("<c:valAx>").count(), 2);
    }
}
