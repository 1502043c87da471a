//! Formula handling for xlport: a nom parser for host formula text, locale
//! punctuation conversion and rendering into the stored file grammar.

pub mod ast;
pub mod locale;
pub mod parser_nom;
pub mod render;

pub use ast::{BinaryOp, Expr, StructuredRef, TableItem, UnaryOp};
pub use locale::FormulaLocale;
pub use parser_nom::{NomParser, ParseError};
pub use render::{format_number, strip_decorations, Decorations, Renderer};

/// Parse host formula text and render it in stored form.
///
/// ```
/// use xlport_formula::{translate, Decorations, FormulaLocale, Renderer};
///
/// let decorations = Decorations::standard();
/// let renderer = Renderer::new().with_decorations(&decorations);
/// let stored = translate("=IFS(A1>0;1;TRUE;0)", &FormulaLocale::comma_decimal(), &renderer);
/// assert_eq!(stored.unwrap(), "_xlfn.IFS(A1>0,1,TRUE,0)");
/// ```
pub fn translate(
    formula: &str,
    locale: &FormulaLocale,
    renderer: &Renderer<'_>,
) -> Result<String, ParseError> {
    let canonical = locale.to_canonical(formula);
    let expr = NomParser::new().parse(&canonical)?;
    Ok(renderer.render(&expr))
}
