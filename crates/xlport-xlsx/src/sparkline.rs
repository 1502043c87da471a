//! In-cell sparklines (`=Sparkline.Line(A1:F1)`), written to the worksheet's
//! `x14:sparklineGroups` extension instead of the cell itself.

use xlport_core::CellCoord;
use xlport_formula::{Expr, NomParser};

use crate::formula::area_of;
use crate::warnings::Warnings;
use crate::xml::{ns, Element};

const SPARKLINE_EXT_URI: &str = "{05C60535-1F16-4fd2-B633-F4F36F0B64E0}";
const SERIES_COLOR: &str = "FF376092";
const ACCENT_COLOR: &str = "FFD00000";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SparklineKind {
    Line,
    Column,
    WinLoss,
}

impl SparklineKind {
    pub fn from_function(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().strip_prefix("SPARKLINE.")? {
            "LINE" => Some(SparklineKind::Line),
            "COLUMN" => Some(SparklineKind::Column),
            "WINLOSS" => Some(SparklineKind::WinLoss),
            _ => None,
        }
    }

    /// Value of the group's `type` attribute; line is the default and omitted.
    fn type_attr(self) -> Option<&'static str> {
        match self {
            SparklineKind::Line => None,
            SparklineKind::Column => Some("column"),
            SparklineKind::WinLoss => Some("stacked"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sparkline {
    pub kind: SparklineKind,
    /// Sheet-qualified data range.
    pub data: String,
    pub location: CellCoord,
}

/// Cheap check for a sparkline formula, before any parsing.
///
/// ```
/// use xlport_xlsx::sparkline::is_sparkline_formula;
///
/// assert!(is_sparkline_formula("=Sparkline.Line(A1:F1)"));
/// assert!(!is_sparkline_formula("=SUM(A1:F1)"));
/// ```
pub fn is_sparkline_formula(formula: &str) -> bool {
    let body = formula.trim_start().trim_start_matches('=').trim_start();
    body.get(..10)
        .map_or(false, |head| head.eq_ignore_ascii_case("sparkline."))
}

/// Read a sparkline formula placed at `location`. Malformed calls are dropped
/// with a warning.
pub fn parse_sparkline(
    formula: &str,
    location: CellCoord,
    sheet_name: &str,
    warnings: &mut Warnings,
) -> Option<Sparkline> {
    let expr = match NomParser::new().parse(formula) {
        Ok(expr) => expr,
        Err(err) => {
            warnings.push(format_args!("sparkline {formula:?} skipped: {err}"));
            return None;
        }
    };
    let Expr::FunctionCall { name, args } = expr else {
        warnings.push(format_args!("sparkline {formula:?} is not a sparkline call"));
        return None;
    };
    let Some(kind) = SparklineKind::from_function(&name) else {
        warnings.push(format_args!("unknown sparkline type {name}"));
        return None;
    };
    let Some(area) = args.first().and_then(area_of) else {
        warnings.push(format_args!("sparkline {formula:?} has no data range"));
        return None;
    };
    Some(Sparkline {
        kind,
        data: area.with_default_sheet(sheet_name).to_string(),
        location,
    })
}

fn color(name: &str, rgb: &str) -> Element {
    Element::new(name).attr("rgb", rgb)
}

fn group(sparkline: &Sparkline) -> Element {
    Element::new("x14:sparklineGroup")
        .opt_attr("type", sparkline.kind.type_attr())
        .attr("displayEmptyCellsAs", "gap")
        .flag("negative", sparkline.kind == SparklineKind::WinLoss)
        .child(color("x14:colorSeries", SERIES_COLOR))
        .child(color("x14:colorNegative", ACCENT_COLOR))
        .child(color("x14:colorAxis", "FF000000"))
        .child(color("x14:colorMarkers", ACCENT_COLOR))
        .child(color("x14:colorFirst", ACCENT_COLOR))
        .child(color("x14:colorLast", ACCENT_COLOR))
        .child(color("x14:colorHigh", ACCENT_COLOR))
        .child(color("x14:colorLow", ACCENT_COLOR))
        .child(
            Element::new("x14:sparklines").child(
                Element::new("x14:sparkline")
                    .child(Element::new("xm:f").text(&sparkline.data))
                    .child(Element::new("xm:sqref").text(sparkline.location.to_a1())),
            ),
        )
}

/// The `<ext>` element carrying one group per sparkline, or `None` when the
/// sheet has none.
pub fn sparkline_ext(sparklines: &[Sparkline]) -> Option<Element> {
    if sparklines.is_empty() {
        return None;
    }
    Some(
        Element::new("ext")
            .attr("uri", SPARKLINE_EXT_URI)
            .attr("xmlns:x14", ns::X14)
            .child(
                Element::new("x14:sparklineGroups")
                    .attr("xmlns:xm", ns::XM)
                    .children(sparklines.iter().map(group)),
            ),
    )
}
