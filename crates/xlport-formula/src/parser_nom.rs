//! Nom-based formula parser.
//!
//! Parses canonical formula text (`.` decimal mark, `,` argument separator)
//! directly into the AST. Function names may be dotted (`STDEV.S`,
//! `Column.Chart`) and are upper-cased.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, multispace0, one_of, satisfy},
    combinator::{map, opt, recognize, value},
    multi::{fold_many0, many0, separated_list1},
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};

use crate::ast::{BinaryOp, Expr, StructuredRef, TableItem, UnaryOp};
use xlport_core::range::{MAX_COL, MAX_ROW};
use xlport_core::CellError;

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

// =============================================================================
// Helper Combinators
// =============================================================================

/// Skip whitespace
fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn fail(input: &str) -> nom::Err<nom::error::Error<&str>> {
    nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Verify))
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '\\'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.' || c == '\\' || c == '?'
}

fn digits(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_digit())(input)
}

/// Parse a decimal number (integer or float)
fn parse_number(input: &str) -> IResult<&str, Expr> {
    let (input, num_str) = recognize(tuple((
        alt((
            recognize(pair(digits, opt(pair(char('.'), take_while(|c: char| c.is_ascii_digit()))))),
            recognize(pair(char('.'), digits)),
        )),
        opt(tuple((one_of("eE"), opt(one_of("+-")), digits))),
    )))(input)?;

    let num: f64 = num_str.parse().map_err(|_| fail(input))?;
    if !num.is_finite() {
        // Out of range for a stored number; no other branch may claim it.
        return Err(nom::Err::Failure(nom::error::Error::new(
            num_str,
            nom::error::ErrorKind::Float,
        )));
    }
    Ok((input, Expr::Number(num)))
}

/// Parse a string literal (double-quoted)
fn parse_string(input: &str) -> IResult<&str, Expr> {
    let (input, _) = char('"')(input)?;
    let mut result = String::new();
    let mut chars = input.chars().peekable();
    let mut consumed = 0;

    loop {
        match chars.next() {
            Some('"') => {
                // Check for escaped quote
                if chars.peek() == Some(&'"') {
                    result.push('"');
                    chars.next();
                    consumed += 2;
                } else {
                    consumed += 1;
                    break;
                }
            }
            Some(c) => {
                result.push(c);
                consumed += c.len_utf8();
            }
            None => {
                return Err(nom::Err::Error(nom::error::Error::new(
                    input,
                    nom::error::ErrorKind::Char,
                )));
            }
        }
    }

    Ok((&input[consumed..], Expr::String(result)))
}

/// Parse an error literal
fn parse_error_literal(input: &str) -> IResult<&str, Expr> {
    alt((
        value(Expr::Error(CellError::DivisionByZero), tag("#DIV/0!")),
        value(Expr::Error(CellError::InvalidValue), tag("#VALUE!")),
        value(Expr::Error(CellError::InvalidReference), tag("#REF!")),
        value(Expr::Error(CellError::InvalidName), tag("#NAME?")),
        value(Expr::Error(CellError::NotAvailable), tag("#N/A")),
        value(Expr::Error(CellError::NullError), tag("#NULL!")),
        value(Expr::Error(CellError::NumError), tag("#NUM!")),
        value(Expr::Error(CellError::Spill), tag("#SPILL!")),
        value(Expr::Error(CellError::Calc), tag("#CALC!")),
    ))(input)
}

/// Parse an array constant such as `{1,2;3,4}`
fn parse_array(input: &str) -> IResult<&str, Expr> {
    map(
        delimited(char('{'), separated_list1(char(';'), parse_array_row), char('}')),
        Expr::Array,
    )(input)
}

fn parse_array_row(input: &str) -> IResult<&str, Vec<Expr>> {
    separated_list1(ws(char(',')), ws(parse_unary))(input)
}

/// Convert column letters to column index (A=0, B=1, ..., Z=25, AA=26, ...)
fn col_letters_to_index(letters: &str) -> u32 {
    let mut result: u32 = 0;
    for c in letters.chars() {
        let val = (c.to_ascii_uppercase() as u32) - ('A' as u32) + 1;
        result = result * 26 + val;
    }
    result.saturating_sub(1)
}

/// Parse a cell reference (e.g., A1, $B$2, AA10).
///
/// Fails when the candidate runs on into a longer identifier, so `LOG10(`
/// and `A1B` are left for the name parser.
fn parse_cell_ref(input: &str) -> IResult<&str, Expr> {
    let start = input;
    let (input, abs_col) = opt(char('$'))(input)?;
    let (input, col_letters) = take_while1(|c: char| c.is_ascii_alphabetic())(input)?;
    let (input, abs_row) = opt(char('$'))(input)?;
    let (input, row_digits) = take_while1(|c: char| c.is_ascii_digit())(input)?;

    if col_letters.len() > 3 {
        return Err(fail(start));
    }
    if input.starts_with(|c: char| is_ident_char(c) || c == '(' || c == '[' || c == '!') {
        return Err(fail(start));
    }

    let col = col_letters_to_index(col_letters);
    let row: u32 = row_digits.parse().map_err(|_| fail(start))?;
    if row == 0 || row - 1 > MAX_ROW || col > MAX_COL {
        return Err(fail(start));
    }

    Ok((
        input,
        Expr::CellRef {
            col,
            row: row - 1,
            abs_col: abs_col.is_some(),
            abs_row: abs_row.is_some(),
        },
    ))
}

/// Parse a cell reference optionally followed by `:` and a second one
fn parse_area(input: &str) -> IResult<&str, Expr> {
    let (input, start) = parse_cell_ref(input)?;
    let (rest, _) = multispace0(input)?;
    if let Ok((rest, _)) = char::<&str, nom::error::Error<&str>>(':')(rest) {
        let (rest, _) = multispace0(rest)?;
        let (rest, end) = parse_cell_ref(rest)?;
        return Ok((rest, Expr::range(start, end)));
    }
    Ok((input, start))
}

/// Parse an identifier (function name, defined name, table name)
fn parse_identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(satisfy(is_ident_start), take_while(is_ident_char)))(input)
}

/// Parse a sheet name and its `!`
/// Examples: Sheet1!, 'Sheet Name'!, 'Sheet''s Data'!
fn parse_sheet_prefix(input: &str) -> IResult<&str, String> {
    let (input, name) = alt((
        // Quoted sheet name: 'Sheet Name' or 'Sheet''s Data'
        map(
            delimited(
                char('\''),
                recognize(many0(alt((take_while1(|c: char| c != '\''), tag("''"))))),
                char('\''),
            ),
            |s: &str| s.replace("''", "'"),
        ),
        // Unquoted sheet name
        map(
            take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '.'),
            |s: &str| s.to_string(),
        ),
    ))(input)?;
    let (input, _) = char('!')(input)?;
    Ok((input, name))
}

// =============================================================================
// Structured references
// =============================================================================

/// Text up to the closing `]`, honouring `'` escapes. Consumes the `]`.
fn bracket_text(input: &str) -> IResult<&str, String> {
    let mut text = String::new();
    let mut chars = input.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\'' => match chars.next() {
                Some((_, escaped)) => text.push(escaped),
                None => break,
            },
            ']' => return Ok((&input[i + 1..], text)),
            '[' => return Err(fail(input)),
            c => text.push(c),
        }
    }
    Err(fail(input))
}

enum BracketPart {
    Item(TableItem),
    Column(String),
}

/// One `[...]` inside a structured reference: an item or a column name
fn bracket_part(input: &str) -> IResult<&str, BracketPart> {
    let (input, _) = ws(char('['))(input)?;
    let (input, text) = bracket_text(input)?;
    if text.trim_start().starts_with('#') {
        let item = TableItem::from_keyword(&text).ok_or_else(|| fail(input))?;
        Ok((input, BracketPart::Item(item)))
    } else {
        Ok((input, BracketPart::Column(text)))
    }
}

/// Body of a structured reference, starting at its opening `[`
fn parse_structured_body(input: &str, table: Option<String>) -> IResult<&str, Expr> {
    let (input, _) = char('[')(input)?;
    let mut reference = StructuredRef {
        table,
        ..Default::default()
    };

    // Table[] and [@]
    if let Ok((rest, _)) = char::<&str, nom::error::Error<&str>>(']')(input) {
        return Ok((rest, Expr::StructuredRef(reference)));
    }

    // [@Col] or [@[Col Name]]
    if let Some(rest) = input.strip_prefix('@') {
        reference.items.push(TableItem::ThisRow);
        if rest.starts_with('[') {
            let (rest, column) = preceded(char('['), bracket_text)(rest)?;
            reference.first_column = Some(column);
            let (rest, _) = char(']')(rest)?;
            return Ok((rest, Expr::StructuredRef(reference)));
        }
        let (rest, column) = bracket_text(rest)?;
        if !column.is_empty() {
            reference.first_column = Some(column);
        }
        return Ok((rest, Expr::StructuredRef(reference)));
    }

    // [[#Headers],[A]:[B]]
    if input.trim_start().starts_with('[') {
        let mut rest = input;
        loop {
            let (next, part) = bracket_part(rest)?;
            rest = next;
            match part {
                BracketPart::Item(item) => reference.items.push(item),
                BracketPart::Column(column) => {
                    reference.first_column = Some(column);
                    let (next, _) = multispace0(rest)?;
                    if let Ok((next, _)) = char::<&str, nom::error::Error<&str>>(':')(next) {
                        let (next, last) = bracket_part(next)?;
                        match last {
                            BracketPart::Column(last) => reference.last_column = Some(last),
                            BracketPart::Item(_) => return Err(fail(next)),
                        }
                        rest = next;
                    }
                }
            }
            let (next, sep) = ws(one_of(",]"))(rest)?;
            rest = next;
            if sep == ']' {
                return Ok((rest, Expr::StructuredRef(reference)));
            }
        }
    }

    // [#All] or [Col]
    let (rest, text) = bracket_text(input)?;
    if text.trim_start().starts_with('#') {
        let item = TableItem::from_keyword(&text).ok_or_else(|| fail(input))?;
        reference.items.push(item);
    } else {
        reference.first_column = Some(text);
    }
    Ok((rest, Expr::StructuredRef(reference)))
}

// =============================================================================
// Operator Parsers
// =============================================================================

fn parse_comparison_op(input: &str) -> IResult<&str, BinaryOp> {
    alt((
        value(BinaryOp::Le, tag("<=")),
        value(BinaryOp::Ge, tag(">=")),
        value(BinaryOp::Ne, tag("<>")),
        value(BinaryOp::Lt, tag("<")),
        value(BinaryOp::Gt, tag(">")),
        value(BinaryOp::Eq, tag("=")),
    ))(input)
}

fn parse_additive_op(input: &str) -> IResult<&str, BinaryOp> {
    alt((
        value(BinaryOp::Add, char('+')),
        value(BinaryOp::Sub, char('-')),
    ))(input)
}

fn parse_multiplicative_op(input: &str) -> IResult<&str, BinaryOp> {
    alt((
        value(BinaryOp::Mul, char('*')),
        value(BinaryOp::Div, char('/')),
    ))(input)
}

fn parse_concat_op(input: &str) -> IResult<&str, BinaryOp> {
    value(BinaryOp::Concat, char('&'))(input)
}

// =============================================================================
// Expression Parsers (Precedence Climbing)
// =============================================================================

/// Parse a primary expression (literals, references, names, function calls, parentheses)
fn parse_primary(input: &str) -> IResult<&str, Expr> {
    let (input, _) = multispace0(input)?;

    alt((
        // Parenthesized expression
        map(
            delimited(char('('), parse_expression, ws(char(')'))),
            |e| Expr::Grouped(Box::new(e)),
        ),
        parse_error_literal,
        parse_string,
        parse_array,
        parse_number,
        parse_this_table_ref,
        parse_reference_or_name,
    ))(input)
}

/// Structured reference without a table name, e.g. `[@Amount]`
fn parse_this_table_ref(input: &str) -> IResult<&str, Expr> {
    parse_structured_body(input, None)
}

/// Parse a sheet reference, cell reference, range, function call,
/// structured reference, boolean or bare name
fn parse_reference_or_name(input: &str) -> IResult<&str, Expr> {
    // Sheet1!A1 or 'Sheet Name'!A1:B2
    if let Ok((remaining, sheet_name)) = parse_sheet_prefix(input) {
        let (remaining, reference) = parse_area(remaining)?;
        return Ok((
            remaining,
            Expr::SheetRef {
                sheet_name,
                reference: Box::new(reference),
            },
        ));
    }

    if let Ok((remaining, area)) = parse_area(input) {
        return Ok((remaining, area));
    }

    let (remaining, name) = parse_identifier(input)?;
    let (after_ws, _) = multispace0(remaining)?;

    if after_ws.starts_with('(') {
        let (remaining, args) = parse_arguments(after_ws)?;
        return Ok((
            remaining,
            Expr::FunctionCall {
                name: name.to_ascii_uppercase(),
                args,
            },
        ));
    }

    if remaining.starts_with('[') {
        return parse_structured_body(remaining, Some(name.to_string()));
    }

    if name.eq_ignore_ascii_case("TRUE") {
        return Ok((remaining, Expr::Boolean(true)));
    }
    if name.eq_ignore_ascii_case("FALSE") {
        return Ok((remaining, Expr::Boolean(false)));
    }

    Ok((remaining, Expr::Name(name.to_string())))
}

/// Parse a parenthesized argument list; empty slots become `Expr::Missing`
fn parse_arguments(input: &str) -> IResult<&str, Vec<Expr>> {
    let (mut input, _) = pair(char('('), multispace0)(input)?;
    let mut args = Vec::new();

    if let Ok((rest, _)) = char::<&str, nom::error::Error<&str>>(')')(input) {
        return Ok((rest, args));
    }

    loop {
        let (rest, _) = multispace0(input)?;
        let (rest, arg) = if rest.starts_with(|c: char| matches!(c, ',' | ';' | ')')) {
            (rest, Expr::Missing)
        } else {
            parse_expression(rest)?
        };
        args.push(arg);

        let (rest, separator) = ws(one_of(",;)"))(rest)?;
        input = rest;
        if separator == ')' {
            return Ok((input, args));
        }
    }
}

/// Parse a postfix expression (percent)
fn parse_postfix(input: &str) -> IResult<&str, Expr> {
    let (input, expr) = parse_primary(input)?;
    let (input, _) = multispace0(input)?;

    let (input, percents) = many0(char('%'))(input)?;

    let result = percents.into_iter().fold(expr, |acc, _| Expr::Unary {
        op: UnaryOp::Percent,
        operand: Box::new(acc),
    });

    Ok((input, result))
}

/// Parse a unary expression (prefix - or +)
fn parse_unary(input: &str) -> IResult<&str, Expr> {
    let (input, _) = multispace0(input)?;

    alt((
        map(pair(char('-'), parse_unary), |(_, e)| Expr::Unary {
            op: UnaryOp::Neg,
            operand: Box::new(e),
        }),
        map(pair(char('+'), parse_unary), |(_, e)| Expr::Unary {
            op: UnaryOp::Pos,
            operand: Box::new(e),
        }),
        parse_postfix,
    ))(input)
}

/// Parse power expressions (right-associative)
fn parse_power(input: &str) -> IResult<&str, Expr> {
    let (input, base) = parse_unary(input)?;
    let (input, _) = multispace0(input)?;

    if let Ok((input, _)) = char::<&str, nom::error::Error<&str>>('^')(input) {
        let (input, _) = multispace0(input)?;
        let (input, exp) = parse_power(input)?; // Right-associative recursion
        Ok((input, Expr::binary(base, BinaryOp::Pow, exp)))
    } else {
        Ok((input, base))
    }
}

/// Parse multiplicative expressions (*, /)
fn parse_multiplicative(input: &str) -> IResult<&str, Expr> {
    let (input, init) = parse_power(input)?;

    fold_many0(
        pair(ws(parse_multiplicative_op), parse_power),
        move || init.clone(),
        |acc, (op, val)| Expr::binary(acc, op, val),
    )(input)
}

/// Parse additive expressions (+, -)
fn parse_additive(input: &str) -> IResult<&str, Expr> {
    let (input, init) = parse_multiplicative(input)?;

    fold_many0(
        pair(ws(parse_additive_op), parse_multiplicative),
        move || init.clone(),
        |acc, (op, val)| Expr::binary(acc, op, val),
    )(input)
}

/// Parse concatenation expressions (&)
fn parse_concat(input: &str) -> IResult<&str, Expr> {
    let (input, init) = parse_additive(input)?;

    fold_many0(
        pair(ws(parse_concat_op), parse_additive),
        move || init.clone(),
        |acc, (op, val)| Expr::binary(acc, op, val),
    )(input)
}

/// Parse comparison expressions (=, <>, <, >, <=, >=)
fn parse_comparison(input: &str) -> IResult<&str, Expr> {
    let (input, init) = parse_concat(input)?;

    fold_many0(
        pair(ws(parse_comparison_op), parse_concat),
        move || init.clone(),
        |acc, (op, val)| Expr::binary(acc, op, val),
    )(input)
}

/// Parse a complete expression
pub fn parse_expression(input: &str) -> IResult<&str, Expr> {
    let (input, _) = multispace0(input)?;
    parse_comparison(input)
}

// =============================================================================
// Public API
// =============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct NomParser;

impl NomParser {
    pub fn new() -> Self {
        NomParser
    }

    /// Parse a formula string into an AST
    pub fn parse(&self, input: &str) -> Result<Expr, ParseError> {
        // Strip leading '=' if present
        let input = input.trim_start();
        let input = input.strip_prefix('=').unwrap_or(input);

        match parse_expression(input) {
            Ok((remaining, expr)) => {
                // Check that all input was consumed
                let remaining = remaining.trim();
                if remaining.is_empty() {
                    Ok(expr)
                } else {
                    Err(ParseError {
                        message: format!("Unexpected input: '{}'", remaining),
                        position: input.trim_end().len() - remaining.len(),
                    })
                }
            }
            Err(e) => Err(ParseError {
                message: format!("Parse error: {:?}", e),
                position: 0,
            }),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Result<Expr, ParseError> {
        NomParser::new().parse(input)
    }

    fn column(table: Option<&str>, items: Vec<TableItem>, col: &str) -> Expr {
        Expr::StructuredRef(StructuredRef {
            table: table.map(str::to_string),
            items,
            first_column: Some(col.to_string()),
            last_column: None,
        })
    }

    #[test]
    fn test_number() {
        assert_eq!(parse("123"), Ok(Expr::Number(123.0)));
        assert_eq!(parse("3.14"), Ok(Expr::Number(3.14)));
        assert_eq!(parse(".5"), Ok(Expr::Number(0.5)));
        assert_eq!(parse("-5"), Ok(Expr::Unary {
            op: UnaryOp::Neg,
            operand: Box::new(Expr::Number(5.0)),
        }));
        assert_eq!(parse("1e10"), Ok(Expr::Number(1e10)));
        assert_eq!(parse("1.5e-3"), Ok(Expr::Number(1.5e-3)));
    }

    #[test]
    fn test_number_out_of_range_is_rejected() {
        assert!(parse("1e999").is_err());
        assert!(parse("SUM(1,2E400)").is_err());
        assert_eq!(parse("1e308"), Ok(Expr::Number(1e308)));
    }

    #[test]
    fn test_function_names_fold_ascii_only() {
        match parse("ß.ß(1)") {
            Ok(Expr::FunctionCall { name, .. }) => assert_eq!(name, "ß.ß"),
            other => panic!("expected a call, got {other:?}"),
        }
        match parse("sum(1)") {
            Ok(Expr::FunctionCall { name, .. }) => assert_eq!(name, "SUM"),
            other => panic!("expected a call, got {other:?}"),
        }
    }

    #[test]
    fn test_string() {
        assert_eq!(parse("\"hello\""), Ok(Expr::String("hello".to_string())));
        assert_eq!(parse("\"\""), Ok(Expr::String("".to_string())));
        assert_eq!(parse("\"say \"\"hi\"\"\""), Ok(Expr::String("say \"hi\"".to_string())));
    }

    #[test]
    fn test_boolean() {
        assert_eq!(parse("TRUE"), Ok(Expr::Boolean(true)));
        assert_eq!(parse("false"), Ok(Expr::Boolean(false)));
        assert_eq!(parse("TRUEISH"), Ok(Expr::Name("TRUEISH".into())));
    }

    #[test]
    fn test_cell_reference() {
        assert_eq!(parse("A1"), Ok(Expr::CellRef { col: 0, row: 0, abs_col: false, abs_row: false }));
        assert_eq!(parse("AA10"), Ok(Expr::CellRef { col: 26, row: 9, abs_col: false, abs_row: false }));
        assert_eq!(parse("$A$1"), Ok(Expr::CellRef { col: 0, row: 0, abs_col: true, abs_row: true }));
        assert_eq!(parse("A$1"), Ok(Expr::CellRef { col: 0, row: 0, abs_col: false, abs_row: true }));
        assert_eq!(parse("$A1"), Ok(Expr::CellRef { col: 0, row: 0, abs_col: true, abs_row: false }));
    }

    #[test]
    fn test_range() {
        assert_eq!(
            parse("A1:B2"),
            Ok(Expr::range(Expr::cell_ref(0, 0), Expr::cell_ref(1, 1)))
        );
    }

    #[test]
    fn test_function_named_like_a_cell() {
        let result = parse("LOG10(100)");
        assert_eq!(result, Ok(Expr::function("LOG10", vec![Expr::Number(100.0)])));
        assert_eq!(parse("ATAN2(1, 2)").map(|e| matches!(e, Expr::FunctionCall { .. })), Ok(true));
    }

    #[test]
    fn test_dotted_function_names() {
        let result = parse("stdev.s(A1:A3)").unwrap();
        assert!(matches!(result, Expr::FunctionCall { ref name, .. } if name == "STDEV.S"));

        let result = parse("Column.Chart(A1:A4, \"T\")").unwrap();
        assert!(matches!(result, Expr::FunctionCall { ref name, ref args } if name == "COLUMN.CHART" && args.len() == 2));
    }

    #[test]
    fn test_names() {
        assert_eq!(parse("TaxRate * 2"), Ok(Expr::binary(
            Expr::Name("TaxRate".into()),
            BinaryOp::Mul,
            Expr::Number(2.0),
        )));
        assert_eq!(parse("_xlpm.x"), Ok(Expr::Name("_xlpm.x".into())));
    }

    #[test]
    fn test_missing_arguments() {
        assert_eq!(
            parse("IF(A1,,2)"),
            Ok(Expr::function("IF", vec![Expr::cell_ref(0, 0), Expr::Missing, Expr::Number(2.0)]))
        );
        assert_eq!(parse("NOW()"), Ok(Expr::function("NOW", vec![])));
    }

    #[test]
    fn test_arithmetic() {
        // 1 + 2 * 3 = 1 + (2 * 3)
        assert_eq!(
            parse("1 + 2 * 3"),
            Ok(Expr::binary(
                Expr::Number(1.0),
                BinaryOp::Add,
                Expr::binary(Expr::Number(2.0), BinaryOp::Mul, Expr::Number(3.0)),
            ))
        );
    }

    #[test]
    fn test_parentheses() {
        let result = parse("(1 + 2) * 3");
        if let Ok(Expr::Binary { left, op, right }) = result {
            assert_eq!(op, BinaryOp::Mul);
            assert!(matches!(*left, Expr::Grouped(_)));
            assert_eq!(*right, Expr::Number(3.0));
        } else {
            panic!("Expected Binary");
        }
    }

    #[test]
    fn test_nested_function() {
        let result = parse("SUM(A1, MAX(B1:B10))");
        if let Ok(Expr::FunctionCall { name, args }) = result {
            assert_eq!(name, "SUM");
            assert_eq!(args.len(), 2);
            assert!(matches!(&args[1], Expr::FunctionCall { .. }));
        } else {
            panic!("Expected FunctionCall");
        }
    }

    #[test]
    fn test_power_right_associative() {
        assert_eq!(
            parse("2^3^2"),
            Ok(Expr::binary(
                Expr::Number(2.0),
                BinaryOp::Pow,
                Expr::binary(Expr::Number(3.0), BinaryOp::Pow, Expr::Number(2.0)),
            ))
        );
    }

    #[test]
    fn test_percent_and_concat() {
        assert_eq!(parse("50%"), Ok(Expr::unary(UnaryOp::Percent, Expr::Number(50.0))));
        assert!(matches!(
            parse("\"Hello\" & \" \" & \"World\""),
            Ok(Expr::Binary { op: BinaryOp::Concat, .. })
        ));
    }

    #[test]
    fn test_array_constant() {
        assert_eq!(
            parse("{1,2;3,-4}"),
            Ok(Expr::Array(vec![
                vec![Expr::Number(1.0), Expr::Number(2.0)],
                vec![Expr::Number(3.0), Expr::unary(UnaryOp::Neg, Expr::Number(4.0))],
            ]))
        );
    }

    #[test]
    fn test_sheet_references() {
        let result = parse("Sheet2!A1:B5");
        if let Ok(Expr::SheetRef { sheet_name, reference }) = result {
            assert_eq!(sheet_name, "Sheet2");
            assert!(matches!(*reference, Expr::Range { .. }));
        } else {
            panic!("Expected SheetRef with Range");
        }

        let result = parse("'Bob''s Data'!C3");
        if let Ok(Expr::SheetRef { sheet_name, reference }) = result {
            assert_eq!(sheet_name, "Bob's Data");
            assert!(matches!(*reference, Expr::CellRef { col: 2, row: 2, .. }));
        } else {
            panic!("Expected SheetRef");
        }
    }

    #[test]
    fn test_structured_references() {
        assert_eq!(parse("Sales[Amount]"), Ok(column(Some("Sales"), vec![], "Amount")));
        assert_eq!(parse("[@Amount]"), Ok(column(None, vec![TableItem::ThisRow], "Amount")));
        assert_eq!(
            parse("[@[Unit Price]]"),
            Ok(column(None, vec![TableItem::ThisRow], "Unit Price"))
        );
        assert_eq!(
            parse("Sales[[#This Row],[Amount]]"),
            Ok(column(Some("Sales"), vec![TableItem::ThisRow], "Amount"))
        );
        assert_eq!(
            parse("Sales[#All]"),
            Ok(Expr::StructuredRef(StructuredRef {
                table: Some("Sales".into()),
                items: vec![TableItem::All],
                ..Default::default()
            }))
        );
        assert_eq!(
            parse("Sales[[#Headers],[Q1]:[Q4]]"),
            Ok(Expr::StructuredRef(StructuredRef {
                table: Some("Sales".into()),
                items: vec![TableItem::Headers],
                first_column: Some("Q1".into()),
                last_column: Some("Q4".into()),
            }))
        );
        assert_eq!(parse("T['[x']]"), Ok(column(Some("T"), vec![], "[x]")));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse("SUM(A1").is_err());
        assert!(parse("1 +").is_err());
        assert!(parse("A1 B1").is_err());
        assert!(parse("Sales[#Bogus]").is_err());
    }
}
