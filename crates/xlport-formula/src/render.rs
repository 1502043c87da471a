//! Rendering of formula ASTs into the grammar stored inside the file format.
//!
//! Stored formulas carry no leading `=`, always use `.` and `,`, prefix
//! functions newer than the original grammar (`_xlfn.IFS`), prefix LAMBDA and
//! LET parameters (`_xlpm.x`) and spell structured references out in full
//! (`Sales[[#This Row],[Amount]]`).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use xlport_core::range::{col_to_label, quote_sheet_name};

use crate::ast::{Expr, StructuredRef, UnaryOp};

const XLFN: &str = "_xlfn.";
const XLFN_XLWS: &str = "_xlfn._xlws.";
const XLPM: &str = "_xlpm.";

/// Prefixes the file grammar puts in front of names.
const KNOWN_PREFIXES: [&str; 4] = [XLFN, "_xlws.", XLPM, "_xludf."];

/// Functions stored with `_xlfn.` in the file grammar.
const FUTURE_FUNCTIONS: &[&str] = &[
    "ACOT",
    "AGGREGATE",
    "ARABIC",
    "BASE",
    "BITAND",
    "BITOR",
    "BITXOR",
    "BYCOL",
    "BYROW",
    "CEILING.MATH",
    "CHOOSECOLS",
    "CHOOSEROWS",
    "CONCAT",
    "COVARIANCE.P",
    "COVARIANCE.S",
    "DAYS",
    "DROP",
    "EXPAND",
    "FLOOR.MATH",
    "FORECAST.LINEAR",
    "FORMULATEXT",
    "HSTACK",
    "IFNA",
    "IFS",
    "ISFORMULA",
    "ISOWEEKNUM",
    "LAMBDA",
    "LET",
    "MAKEARRAY",
    "MAP",
    "MAXIFS",
    "MINIFS",
    "MODE.SNGL",
    "NORM.DIST",
    "NORM.INV",
    "NORM.S.DIST",
    "NUMBERVALUE",
    "PERCENTILE.EXC",
    "PERCENTILE.INC",
    "QUARTILE.INC",
    "RANDARRAY",
    "RANK.EQ",
    "REDUCE",
    "SCAN",
    "SEQUENCE",
    "SHEET",
    "SORTBY",
    "STDEV.P",
    "STDEV.S",
    "SWITCH",
    "TAKE",
    "TEXTAFTER",
    "TEXTBEFORE",
    "TEXTJOIN",
    "TEXTSPLIT",
    "TOCOL",
    "TOROW",
    "UNIQUE",
    "VAR.P",
    "VAR.S",
    "VSTACK",
    "XLOOKUP",
    "XMATCH",
    "XOR",
];

/// Functions stored with `_xlfn._xlws.`.
const WORKSHEET_FUNCTIONS: &[&str] = &["FILTER", "SORT"];

/// Function name → prefix map applied while rendering.
///
/// Keys are upper-case bare function names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct Decorations(BTreeMap<String, String>);

impl Decorations {
    pub fn new() -> Self {
        Decorations::default()
    }

    /// The prefixes spreadsheet applications expect for post-2007 functions.
    pub fn standard() -> Self {
        FUTURE_FUNCTIONS
            .iter()
            .map(|name| (*name, XLFN))
            .chain(WORKSHEET_FUNCTIONS.iter().map(|name| (*name, XLFN_XLWS)))
            .collect()
    }

    pub fn insert(&mut self, function: &str, prefix: impl Into<String>) {
        self.0.insert(function.to_ascii_uppercase(), prefix.into());
    }

    pub fn prefix_for(&self, function: &str) -> Option<&str> {
        self.0
            .get(&strip_decorations(function).to_ascii_uppercase())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decorated spelling of a function name.
    ///
    /// ```
    /// use xlport_formula::Decorations;
    ///
    /// let decorations = Decorations::standard();
    /// assert_eq!(decorations.decorate("IFS"), "_xlfn.IFS");
    /// assert_eq!(decorations.decorate("_XLFN.IFS"), "_xlfn.IFS");
    /// assert_eq!(decorations.decorate("FILTER"), "_xlfn._xlws.FILTER");
    /// assert_eq!(decorations.decorate("SUM"), "SUM");
    /// ```
    pub fn decorate(&self, function: &str) -> String {
        let bare = strip_decorations(function);
        match self.0.get(&bare.to_ascii_uppercase()) {
            Some(prefix) => format!("{prefix}{bare}"),
            None if bare.len() == function.len() => function.to_string(),
            None => normalize_prefixes(function),
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Decorations {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut decorations = Decorations::new();
        for (function, prefix) in iter {
            decorations.insert(&function.into(), prefix);
        }
        decorations
    }
}

impl From<BTreeMap<String, String>> for Decorations {
    fn from(map: BTreeMap<String, String>) -> Self {
        map.into_iter().collect()
    }
}

impl From<Decorations> for BTreeMap<String, String> {
    fn from(decorations: Decorations) -> Self {
        decorations.0
    }
}

fn leading_prefix(name: &str) -> Option<&'static str> {
    KNOWN_PREFIXES.into_iter().find(|prefix| {
        name.get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
    })
}

/// Remove every leading file-grammar prefix from a name.
///
/// ```
/// use xlport_formula::strip_decorations;
///
/// assert_eq!(strip_decorations("_xlfn._xlws.SORT"), "SORT");
/// assert_eq!(strip_decorations("_xlpm.x"), "x");
/// assert_eq!(strip_decorations("SUM"), "SUM");
/// ```
pub fn strip_decorations(name: &str) -> &str {
    let mut rest = name;
    while let Some(prefix) = leading_prefix(rest) {
        rest = &rest[prefix.len()..];
    }
    rest
}

/// Lower-case any leading prefixes, keeping the bare name as written.
fn normalize_prefixes(name: &str) -> String {
    let bare = strip_decorations(name);
    let head = &name[..name.len() - bare.len()];
    format!("{}{bare}", head.to_ascii_lowercase())
}

/// Renders an [`Expr`] into stored-formula text.
#[derive(Debug, Clone, Default)]
pub struct Renderer<'a> {
    decorations: Option<&'a Decorations>,
    table: Option<&'a str>,
    lambda_params: Vec<String>,
}

impl<'a> Renderer<'a> {
    pub fn new() -> Self {
        Renderer::default()
    }

    pub fn with_decorations(mut self, decorations: &'a Decorations) -> Self {
        self.decorations = Some(decorations);
        self
    }

    /// Table that owns the formula's cell; used for `[@Col]` references.
    pub fn with_table(mut self, table: &'a str) -> Self {
        self.table = Some(table);
        self
    }

    /// Names rendered as `_xlpm.` parameters, as inside a LAMBDA body.
    pub fn with_lambda_params<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lambda_params.extend(params.into_iter().map(Into::into));
        self
    }

    pub fn render(&self, expr: &Expr) -> String {
        let mut out = String::new();
        let mut scope = self.lambda_params.clone();
        self.write_expr(expr, &mut scope, &mut out);
        out
    }

    fn write_expr(&self, expr: &Expr, scope: &mut Vec<String>, out: &mut String) {
        match expr {
            Expr::Number(n) => out.push_str(&format_number(*n)),
            Expr::String(s) => {
                out.push('"');
                out.push_str(&s.replace('"', "\"\""));
                out.push('"');
            }
            Expr::Boolean(b) => out.push_str(if *b { "TRUE" } else { "FALSE" }),
            Expr::Error(e) => out.push_str(e.code()),
            Expr::Array(rows) => {
                out.push('{');
                for (r, row) in rows.iter().enumerate() {
                    if r > 0 {
                        out.push(';');
                    }
                    for (c, item) in row.iter().enumerate() {
                        if c > 0 {
                            out.push(',');
                        }
                        self.write_expr(item, scope, out);
                    }
                }
                out.push('}');
            }
            Expr::CellRef {
                col,
                row,
                abs_col,
                abs_row,
            } => {
                if *abs_col {
                    out.push('$');
                }
                out.push_str(&col_to_label(*col));
                if *abs_row {
                    out.push('$');
                }
                out.push_str(&(row + 1).to_string());
            }
            Expr::Range { start, end } => {
                self.write_expr(start, scope, out);
                out.push(':');
                self.write_expr(end, scope, out);
            }
            Expr::SheetRef {
                sheet_name,
                reference,
            } => {
                out.push_str(&quote_sheet_name(sheet_name));
                out.push('!');
                self.write_expr(reference, scope, out);
            }
            Expr::Name(name) => {
                let bare = strip_decorations(name);
                if scope.iter().any(|p| p.eq_ignore_ascii_case(bare)) {
                    out.push_str(XLPM);
                    out.push_str(bare);
                } else {
                    out.push_str(name);
                }
            }
            Expr::StructuredRef(reference) => self.write_structured(reference, out),
            Expr::Binary { left, op, right } => {
                self.write_expr(left, scope, out);
                out.push_str(op.symbol());
                self.write_expr(right, scope, out);
            }
            Expr::Unary { op, operand } => match op {
                UnaryOp::Neg => {
                    out.push('-');
                    self.write_expr(operand, scope, out);
                }
                UnaryOp::Pos => {
                    out.push('+');
                    self.write_expr(operand, scope, out);
                }
                UnaryOp::Percent => {
                    self.write_expr(operand, scope, out);
                    out.push('%');
                }
            },
            Expr::FunctionCall { name, args } => {
                let bound = bound_parameters(name, args);
                let depth = scope.len();
                scope.extend(bound);

                match self.decorations {
                    Some(decorations) => out.push_str(&decorations.decorate(name)),
                    None => out.push_str(name),
                }
                out.push('(');
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    self.write_expr(arg, scope, out);
                }
                out.push(')');

                scope.truncate(depth);
            }
            Expr::Missing => {}
            Expr::Grouped(inner) => {
                out.push('(');
                self.write_expr(inner, scope, out);
                out.push(')');
            }
        }
    }

    fn write_structured(&self, reference: &StructuredRef, out: &mut String) {
        if let Some(table) = reference.table.as_deref().or(self.table) {
            out.push_str(table);
        }

        let mut parts: Vec<String> = reference
            .items
            .iter()
            .map(|item| format!("[{}]", item.keyword()))
            .collect();
        let column_span = reference.first_column.as_ref().map(|first| {
            match &reference.last_column {
                Some(last) => format!("[{}]:[{}]", escape_column(first), escape_column(last)),
                None => format!("[{}]", escape_column(first)),
            }
        });
        let is_span = reference.last_column.is_some();
        parts.extend(column_span);

        match parts.as_slice() {
            [] => out.push_str("[]"),
            [single] if !is_span => out.push_str(single),
            _ => {
                out.push('[');
                out.push_str(&parts.join(","));
                out.push(']');
            }
        }
    }
}

/// Parameter names a LAMBDA or LET call binds for its body.
fn bound_parameters(name: &str, args: &[Expr]) -> Vec<String> {
    let bare = strip_decorations(name);
    let param_name = |arg: &Expr| match arg {
        Expr::Name(n) => Some(strip_decorations(n).to_string()),
        _ => None,
    };
    if bare.eq_ignore_ascii_case("LAMBDA") {
        let params = args.len().saturating_sub(1);
        args[..params].iter().filter_map(param_name).collect()
    } else if bare.eq_ignore_ascii_case("LET") {
        let bindings = args.len().saturating_sub(1);
        args[..bindings].iter().step_by(2).filter_map(param_name).collect()
    } else {
        Vec::new()
    }
}

fn escape_column(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for c in name.chars() {
        if matches!(c, '[' | ']' | '#' | '\'') {
            escaped.push('\'');
        }
        escaped.push(c);
    }
    escaped
}

/// Shortest text that reads back as the same number; integers have no `.0`.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}
