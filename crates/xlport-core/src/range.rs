use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

/// Last addressable row (0-indexed) of a worksheet.
pub const MAX_ROW: u32 = 1_048_575;
/// Last addressable column (0-indexed) of a worksheet, `XFD`.
pub const MAX_COL: u32 = 16_383;

/// Cell coordinate (0-indexed internally)
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct CellCoord {
    pub row: u32,
    pub col: u32,
}

impl CellCoord {
    pub const fn new(row: u32, col: u32) -> Self {
        CellCoord { row, col }
    }

    /// Create from A1 notation (e.g., "A1" -> (0, 0), "$B$2" -> (1, 1))
    pub fn from_a1(notation: &str) -> Option<Self> {
        let notation = notation.trim().to_uppercase();
        let mut col_str = String::new();
        let mut row_str = String::new();

        for c in notation.chars() {
            if c == '$' {
                continue;
            } else if c.is_ascii_alphabetic() {
                if !row_str.is_empty() {
                    return None; // Letters after numbers
                }
                col_str.push(c);
            } else if c.is_ascii_digit() {
                row_str.push(c);
            } else {
                return None; // Invalid character
            }
        }

        if col_str.is_empty() || row_str.is_empty() || col_str.len() > 3 {
            return None;
        }

        let col = col_from_label(&col_str)?;
        let row: u32 = row_str.parse().ok()?;

        if row == 0 {
            return None; // Rows are 1-indexed in A1 notation
        }

        let coord = CellCoord {
            row: row - 1, // Convert to 0-indexed
            col,
        };
        coord.is_valid().then_some(coord)
    }

    /// Convert to A1 notation (e.g., (0, 0) -> "A1")
    pub fn to_a1(&self) -> String {
        format!("{}{}", col_to_label(self.col), self.row + 1)
    }

    /// Convert to absolute A1 notation (e.g., (0, 0) -> "$A$1")
    pub fn to_absolute_a1(&self) -> String {
        format!("${}${}", col_to_label(self.col), self.row + 1)
    }

    /// Check if this coord lies inside the worksheet grid
    pub fn is_valid(&self) -> bool {
        self.row <= MAX_ROW && self.col <= MAX_COL
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_a1())
    }
}

/// Convert column index (0-indexed) to label (A, B, ..., Z, AA, AB, ...)
pub fn col_to_label(col: u32) -> String {
    let mut label = String::new();
    let mut n = col + 1; // 1-indexed for calculation

    while n > 0 {
        n -= 1;
        label.insert(0, char::from(b'A' + (n % 26) as u8));
        n /= 26;
    }

    label
}

/// Convert column label (A, B, ..., Z, AA, AB, ...) to index (0-indexed)
pub fn col_from_label(label: &str) -> Option<u32> {
    let mut col: u32 = 0;

    for c in label.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        col = col
            .checked_mul(26)?
            .checked_add(c.to_ascii_uppercase() as u32 - 'A' as u32 + 1)?;
    }

    if col == 0 {
        None
    } else {
        Some(col - 1) // Convert to 0-indexed
    }
}

/// A range of cells (e.g., A1:B10)
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRange {
    pub start: CellCoord,
    pub end: CellCoord,
}

impl CellRange {
    pub fn new(start: CellCoord, end: CellCoord) -> Self {
        // Normalize so start is top-left and end is bottom-right
        CellRange {
            start: CellCoord::new(start.row.min(end.row), start.col.min(end.col)),
            end: CellCoord::new(start.row.max(end.row), start.col.max(end.col)),
        }
    }

    pub fn single(coord: CellCoord) -> Self {
        CellRange::new(coord, coord)
    }

    /// Create from A1:B1 notation; `$` markers are accepted and ignored
    pub fn from_a1(notation: &str) -> Option<Self> {
        let parts: Vec<&str> = notation.split(':').collect();
        match parts.len() {
            1 => {
                let coord = CellCoord::from_a1(parts[0])?;
                Some(CellRange::new(coord, coord))
            }
            2 => {
                let start = CellCoord::from_a1(parts[0])?;
                let end = CellCoord::from_a1(parts[1])?;
                Some(CellRange::new(start, end))
            }
            _ => None,
        }
    }

    /// Convert to A1:B1 notation
    pub fn to_a1(&self) -> String {
        if self.start == self.end {
            self.start.to_a1()
        } else {
            format!("{}:{}", self.start.to_a1(), self.end.to_a1())
        }
    }

    /// Always `start:end`, even for a single cell (e.g., "A1:A1")
    pub fn to_a1_span(&self) -> String {
        format!("{}:{}", self.start.to_a1(), self.end.to_a1())
    }

    /// Convert to absolute notation (e.g., "$A$1:$B$4")
    pub fn to_absolute_a1(&self) -> String {
        if self.start == self.end {
            self.start.to_absolute_a1()
        } else {
            format!("{}:{}", self.start.to_absolute_a1(), self.end.to_absolute_a1())
        }
    }

    /// Smallest range covering both ranges
    pub fn union(&self, other: &CellRange) -> CellRange {
        CellRange {
            start: CellCoord::new(
                self.start.row.min(other.start.row),
                self.start.col.min(other.start.col),
            ),
            end: CellCoord::new(self.end.row.max(other.end.row), self.end.col.max(other.end.col)),
        }
    }

    /// Check if a coordinate is within this range
    pub fn contains(&self, coord: CellCoord) -> bool {
        coord.row >= self.start.row
            && coord.row <= self.end.row
            && coord.col >= self.start.col
            && coord.col <= self.end.col
    }

    /// Get the number of rows in the range
    pub fn row_count(&self) -> u32 {
        self.end.row - self.start.row + 1
    }

    /// Get the number of columns in the range
    pub fn col_count(&self) -> u32 {
        self.end.col - self.start.col + 1
    }

    /// Get the total number of cells in the range
    pub fn cell_count(&self) -> u64 {
        u64::from(self.row_count()) * u64::from(self.col_count())
    }

    /// Iterate over all coordinates in the range (row by row)
    pub fn iter(&self) -> CellRangeIter {
        CellRangeIter {
            range: *self,
            current_row: self.start.row,
            current_col: self.start.col,
        }
    }

    /// Check if this range intersects with another range
    pub fn intersects(&self, other: &CellRange) -> bool {
        !(self.end.row < other.start.row
            || self.start.row > other.end.row
            || self.end.col < other.start.col
            || self.start.col > other.end.col)
    }

    /// Check if this range is a single cell
    pub fn is_single_cell(&self) -> bool {
        self.start == self.end
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_a1())
    }
}

impl IntoIterator for CellRange {
    type Item = CellCoord;
    type IntoIter = CellRangeIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over coordinates in a range
pub struct CellRangeIter {
    range: CellRange,
    current_row: u32,
    current_col: u32,
}

impl Iterator for CellRangeIter {
    type Item = CellCoord;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_row > self.range.end.row {
            return None;
        }

        let coord = CellCoord::new(self.current_row, self.current_col);

        self.current_col += 1;
        if self.current_col > self.range.end.col {
            self.current_col = self.range.start.col;
            self.current_row += 1;
        }

        Some(coord)
    }
}

fn plain_sheet_name() -> &'static Regex {
    static PLAIN: OnceLock<Regex> = OnceLock::new();
    PLAIN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.]*$").expect("static regex"))
}

/// Quote a sheet name for use in a reference when it needs it.
///
/// ```
/// use xlport_core::range::quote_sheet_name;
///
/// assert_eq!(quote_sheet_name("Sheet1"), "Sheet1");
/// assert_eq!(quote_sheet_name("My Sheet"), "'My Sheet'");
/// assert_eq!(quote_sheet_name("Bob's"), "'Bob''s'");
/// ```
pub fn quote_sheet_name(name: &str) -> Cow<'_, str> {
    let looks_like_ref = CellCoord::from_a1(name).is_some()
        || name.eq_ignore_ascii_case("TRUE")
        || name.eq_ignore_ascii_case("FALSE");
    if plain_sheet_name().is_match(name) && !looks_like_ref {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("'{}'", name.replace('\'', "''")))
    }
}

/// A sheet-qualified rectangular area such as `'My Sheet'!$A$1:$B$4`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaRef {
    pub sheet: Option<String>,
    pub range: CellRange,
}

impl AreaRef {
    pub fn new(sheet: Option<String>, range: CellRange) -> Self {
        AreaRef { sheet, range }
    }

    /// Parse `A1`, `A1:B2`, `Sheet1!$A$1:$B$2` or `'My ''Sheet'''!A1`
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (sheet, area) = match text.rfind('!') {
            Some(bang) => {
                let raw = &text[..bang];
                let sheet = if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
                    raw[1..raw.len() - 1].replace("''", "'")
                } else {
                    raw.to_string()
                };
                if sheet.is_empty() {
                    return None;
                }
                (Some(sheet), &text[bang + 1..])
            }
            None => (None, text),
        };
        Some(AreaRef {
            sheet,
            range: CellRange::from_a1(area)?,
        })
    }

    /// Fill in the sheet when the reference does not name one
    pub fn with_default_sheet(mut self, sheet: &str) -> Self {
        if self.sheet.is_none() {
            self.sheet = Some(sheet.to_string());
        }
        self
    }
}

impl fmt::Display for AreaRef {
    /// Renders the absolute, sheet-qualified form.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sheet) = &self.sheet {
            write!(f, "{}!", quote_sheet_name(sheet))?;
        }
        write!(f, "{}", self.range.to_absolute_a1())
    }
}
