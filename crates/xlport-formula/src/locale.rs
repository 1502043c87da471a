//! Conversion between a host locale's formula punctuation and the canonical
//! form the parser and the file format use (`.` decimal mark, `,` argument
//! separator).

use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Formula punctuation of a host locale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FormulaLocale {
    pub decimal_mark: char,
    pub argument_separator: char,
}

impl Default for FormulaLocale {
    fn default() -> Self {
        FormulaLocale {
            decimal_mark: '.',
            argument_separator: ',',
        }
    }
}

impl FormulaLocale {
    /// Continental style: `1,5` and `SUM(A1;A2)`
    pub const fn comma_decimal() -> Self {
        FormulaLocale {
            decimal_mark: ',',
            argument_separator: ';',
        }
    }

    pub fn is_canonical(&self) -> bool {
        *self == FormulaLocale::default()
    }

    /// Rewrite locale punctuation into canonical punctuation.
    ///
    /// ```
    /// use xlport_formula::FormulaLocale;
    ///
    /// let locale = FormulaLocale::comma_decimal();
    /// assert_eq!(locale.to_canonical("=ROUND(A1;2)*1,5"), "=ROUND(A1,2)*1.5");
    /// assert_eq!(locale.to_canonical("=\"a;b\""), "=\"a;b\"");
    /// ```
    pub fn to_canonical<'a>(&self, formula: &'a str) -> Cow<'a, str> {
        if self.is_canonical() {
            return Cow::Borrowed(formula);
        }
        let (decimal, separator) = (self.decimal_mark, self.argument_separator);
        Cow::Owned(Scanner::new(formula).map_code(|c, _, _, in_brackets| {
            if c == separator {
                ','
            } else if c == decimal && !in_brackets {
                '.'
            } else {
                c
            }
        }))
    }

    /// Rewrite canonical punctuation into this locale's punctuation.
    ///
    /// Only a `.` between two digits is treated as a decimal mark, so dotted
    /// function names keep their dots.
    pub fn from_canonical<'a>(&self, formula: &'a str) -> Cow<'a, str> {
        if self.is_canonical() {
            return Cow::Borrowed(formula);
        }
        let (decimal, separator) = (self.decimal_mark, self.argument_separator);
        Cow::Owned(Scanner::new(formula).map_code(|c, prev, next, in_brackets| match c {
            ',' => separator,
            '.' if !in_brackets
                && prev.is_some_and(|p| p.is_ascii_digit())
                && next.is_some_and(|n| n.is_ascii_digit()) =>
            {
                decimal
            }
            c => c,
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    Code,
    String,
    SheetName,
    Bracket(u32),
}

/// Char cursor that knows whether it is inside a string literal, a quoted
/// sheet name or a structured-reference bracket.
struct Scanner {
    input: Vec<char>,
    position: usize,
    region: Region,
}

impl Scanner {
    fn new(input: &str) -> Self {
        Scanner {
            input: input.chars().collect(),
            position: 0,
            region: Region::Code,
        }
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek();
        self.position += 1;
        c
    }

    /// Apply `rewrite(c, previous, next, in_brackets)` to every character
    /// outside strings and quoted sheet names. Characters nested deeper than
    /// the first bracket level are column names and are copied verbatim.
    fn map_code(
        mut self,
        rewrite: impl Fn(char, Option<char>, Option<char>, bool) -> char,
    ) -> String {
        let mut out = String::with_capacity(self.input.len());
        let mut prev = None;
        while let Some(c) = self.advance() {
            let next = self.peek();
            let emitted = match self.region {
                Region::Code => match c {
                    '"' => {
                        self.region = Region::String;
                        c
                    }
                    '\'' => {
                        self.region = Region::SheetName;
                        c
                    }
                    '[' => {
                        self.region = Region::Bracket(1);
                        c
                    }
                    c => rewrite(c, prev, next, false),
                },
                Region::String | Region::SheetName => {
                    let quote = if self.region == Region::String { '"' } else { '\'' };
                    if c == quote {
                        if next == Some(quote) {
                            out.push(c);
                            self.advance();
                        } else {
                            self.region = Region::Code;
                        }
                    }
                    c
                }
                Region::Bracket(depth) => match c {
                    '\'' => {
                        // escaped character inside a column name
                        if let Some(escaped) = self.advance() {
                            out.push(c);
                            out.push(escaped);
                            prev = Some(escaped);
                            continue;
                        }
                        c
                    }
                    '[' => {
                        self.region = Region::Bracket(depth + 1);
                        c
                    }
                    ']' => {
                        self.region = if depth == 1 {
                            Region::Code
                        } else {
                            Region::Bracket(depth - 1)
                        };
                        c
                    }
                    c if depth == 1 => rewrite(c, prev, next, true),
                    c => c,
                },
            };
            out.push(emitted);
            prev = Some(c);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_canonical_locale_is_untouched() {
        let locale = FormulaLocale::default();
        assert!(matches!(locale.to_canonical("=SUM(1,2)"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_to_canonical_skips_literals() {
        let locale = FormulaLocale::comma_decimal();
        assert_eq!(
            locale.to_canonical("=IF('a;b'!A1>0,5;\"x;y\";T[[#This Row];[c]])"),
            "=IF('a;b'!A1>0.5,\"x;y\",T[[#This Row],[c]])"
        );
    }

    #[test]
    fn test_from_canonical() {
        let locale = FormulaLocale::comma_decimal();
        assert_eq!(
            locale.from_canonical("=STDEV.S(A1:A3,1.5)&\"1.5,2\""),
            "=STDEV.S(A1:A3;1,5)&\"1.5,2\""
        );
    }

    #[test]
    fn test_round_trip() {
        let locale = FormulaLocale::comma_decimal();
        let local = "=ROUND(SUM(A1;B2)*0,25;2)";
        let canonical = locale.to_canonical(local);
        assert_eq!(canonical, "=ROUND(SUM(A1,B2)*0.25,2)");
        assert_eq!(locale.from_canonical(&canonical), local);
    }
}
