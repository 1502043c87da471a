//! Cell formula conversion between host text and stored text.

use regex::Regex;
use std::sync::OnceLock;
use xlport_core::{AreaRef, CellCoord, CellRange, MacroFunction};
use xlport_formula::{translate, Decorations, Expr, FormulaLocale, NomParser, Renderer};

use crate::warnings::Warnings;

/// Converts host formulas (`=SUM(A1;A2)` in the host locale) into stored
/// formulas (`SUM(A1,A2)`).
#[derive(Debug, Clone)]
pub struct FormulaTranslator {
    locale: FormulaLocale,
    decorations: Decorations,
}

impl FormulaTranslator {
    pub fn new(locale: FormulaLocale, decorations: Decorations) -> Self {
        FormulaTranslator {
            locale,
            decorations,
        }
    }

    pub fn decorations(&self) -> &Decorations {
        &self.decorations
    }

    /// Stored text of a cell formula. `table` is the table owning the cell,
    /// used to spell out `[@Col]` references.
    ///
    /// Text that fails to parse is stored as written, minus its `=`.
    pub fn translate(&self, formula: &str, table: Option<&str>, warnings: &mut Warnings) -> String {
        let mut renderer = Renderer::new().with_decorations(&self.decorations);
        if let Some(table) = table {
            renderer = renderer.with_table(table);
        }
        match translate(formula, &self.locale, &renderer) {
            Ok(stored) => stored,
            Err(err) => {
                warnings.push(format_args!("formula {formula:?} kept verbatim: {err}"));
                raw_text(formula).to_string()
            }
        }
    }

    /// `_xlfn.LAMBDA(_xlpm.a,_xlpm.b,body)` for a user-defined function.
    pub fn lambda_definition(&self, function: &MacroFunction, warnings: &mut Warnings) -> String {
        let mut decorations = self.decorations.clone();
        decorations.insert("LAMBDA", "_xlfn.");
        let renderer = Renderer::new()
            .with_decorations(&decorations)
            .with_lambda_params(function.parameters.iter().cloned());

        let canonical = self.locale.to_canonical(&function.expression);
        let body = match NomParser::new().parse(&canonical) {
            Ok(expr) => renderer.render(&expr),
            Err(err) => {
                warnings.push(format_args!(
                    "body of function {} kept verbatim: {err}",
                    function.name
                ));
                raw_text(&canonical).to_string()
            }
        };

        let mut definition = String::from("_xlfn.LAMBDA(");
        for parameter in &function.parameters {
            definition.push_str("_xlpm.");
            definition.push_str(parameter);
            definition.push(',');
        }
        definition.push_str(&body);
        definition.push(')');
        definition
    }
}

impl Default for FormulaTranslator {
    fn default() -> Self {
        FormulaTranslator::new(FormulaLocale::default(), Decorations::standard())
    }
}

fn raw_text(formula: &str) -> &str {
    let trimmed = formula.trim_start();
    trimmed.strip_prefix('=').unwrap_or(trimmed)
}

fn prefix_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)_xl(fn|ws|pm|udf)\.").expect("static regex"))
}

/// Host formula text (with `=`) for a stored formula, with file-format
/// prefixes removed.
///
/// ```
/// use xlport_xlsx::formula::host_formula;
///
/// assert_eq!(host_formula("_xlfn.IFS(A1>0,1,TRUE,0)"), "=IFS(A1>0,1,TRUE,0)");
/// assert_eq!(host_formula("SUM(A1:A3)"), "=SUM(A1:A3)");
/// ```
pub fn host_formula(stored: &str) -> String {
    match NomParser::new().parse(stored) {
        Ok(mut expr) => {
            expr.strip_decorations();
            format!("={}", render_plain(&expr))
        }
        Err(_) => format!("={}", prefix_pattern().replace_all(stored, "")),
    }
}

fn render_plain(expr: &Expr) -> String {
    Renderer::new().render(expr)
}

/// Area named by a reference expression (`A1`, `B2:C9`, `Sheet1!A1:A4`).
pub fn area_of(expr: &Expr) -> Option<AreaRef> {
    match expr {
        Expr::CellRef { col, row, .. } => Some(AreaRef::new(
            None,
            CellRange::single(CellCoord::new(*row, *col)),
        )),
        Expr::Range { start, end } => {
            let start = area_of(start)?;
            let end = area_of(end)?;
            Some(AreaRef::new(
                start.sheet.or(end.sheet),
                start.range.union(&end.range),
            ))
        }
        Expr::SheetRef {
            sheet_name,
            reference,
        } => {
            let area = area_of(reference)?;
            Some(AreaRef::new(Some(sheet_name.clone()), area.range))
        }
        Expr::Grouped(inner) => area_of(inner),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_translate_decorates_and_converts_locale() {
        let translator =
            FormulaTranslator::new(FormulaLocale::comma_decimal(), Decorations::standard());
        let mut warnings = Warnings::new();
        assert_eq!(
            translator.translate("=XLOOKUP(A1;B1:B9;C1:C9)*1,5", None, &mut warnings),
            "_xlfn.XLOOKUP(A1,B1:B9,C1:C9)*1.5"
        );
        assert_eq!(translator.translate("=SUM(A1;A2)", None, &mut warnings), "SUM(A1,A2)");
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_translate_expands_this_row_reference() {
        let translator = FormulaTranslator::default();
        let mut warnings = Warnings::new();
        assert_eq!(
            translator.translate("=[@Price]*2", Some("Sales"), &mut warnings),
            "Sales[[#This Row],[Price]]*2"
        );
    }

    #[test]
    fn test_unparseable_formula_is_kept_with_warning() {
        let translator = FormulaTranslator::default();
        let mut warnings = Warnings::new();
        assert_eq!(translator.translate("=SUM(A1,", None, &mut warnings), "SUM(A1,");
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_out_of_range_number_is_kept_with_warning() {
        let translator = FormulaTranslator::default();
        let mut warnings = Warnings::new();
        assert_eq!(translator.translate("=1e999", None, &mut warnings), "1e999");
        assert_eq!(warnings.len(), 1);
        assert_eq!(translator.translate("=ß.ß(1)", None, &mut warnings), "ß.ß(1)");
    }

    #[test]
    fn test_lambda_definition() {
        let translator = FormulaTranslator::new(FormulaLocale::default(), Decorations::new());
        let mut warnings = Warnings::new();
        let function = MacroFunction {
            name: "HYPOT".into(),
            parameters: vec!["a".into(), "b".into()],
            expression: "=SQRT(a^2+b^2)".into(),
        };
        assert_eq!(
            translator.lambda_definition(&function, &mut warnings),
            "_xlfn.LAMBDA(_xlpm.a,_xlpm.b,SQRT(_xlpm.a^2+_xlpm.b^2))"
        );
    }

    #[test]
    fn test_host_formula_strips_prefixes() {
        assert_eq!(
            host_formula("_xlfn._xlws.SORT(A1:A4)"),
            "=SORT(A1:A4)"
        );
        assert_eq!(
            host_formula("_xlfn.LAMBDA(_xlpm.x,_xlpm.x*2)(3"),
            "=LAMBDA(x,x*2)(3"
        );
    }
}
