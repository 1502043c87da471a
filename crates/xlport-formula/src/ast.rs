use xlport_core::CellError;

/// Abstract Syntax Tree for formula expressions
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    // Literals
    Number(f64),
    String(String),
    Boolean(bool),
    Error(CellError),

    // Array constant (e.g., {1,2;3,4}), row-major
    Array(Vec<Vec<Expr>>),

    // Cell reference (e.g., A1, $B$2)
    CellRef {
        col: u32,
        row: u32,
        abs_col: bool, // $A1 vs A1
        abs_row: bool, // A$1 vs A1
    },

    // Range reference (e.g., A1:B10)
    Range {
        start: Box<Expr>, // CellRef
        end: Box<Expr>,   // CellRef
    },

    // Sheet reference (e.g., Sheet1!A1)
    SheetRef {
        sheet_name: String,
        reference: Box<Expr>,
    },

    // Defined name, LAMBDA parameter or other bare identifier
    Name(String),

    // Table reference (e.g., Sales[Amount], [@Amount])
    StructuredRef(StructuredRef),

    // Binary operation
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },

    // Unary operation
    Unary { op: UnaryOp, operand: Box<Expr> },

    // Function call (e.g., SUM(A1:A10), Column.Chart(...))
    FunctionCall { name: String, args: Vec<Expr> },

    // Omitted argument (e.g., the middle of IF(A1,,2))
    Missing,

    // Parenthesized expression
    Grouped(Box<Expr>),
}

/// Special item specifier of a structured reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableItem {
    All,
    Data,
    Headers,
    Totals,
    ThisRow,
}

impl TableItem {
    pub fn keyword(&self) -> &'static str {
        match self {
            TableItem::All => "#All",
            TableItem::Data => "#Data",
            TableItem::Headers => "#Headers",
            TableItem::Totals => "#Totals",
            TableItem::ThisRow => "#This Row",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        let item = match keyword.trim().to_ascii_lowercase().as_str() {
            "#all" => TableItem::All,
            "#data" => TableItem::Data,
            "#headers" => TableItem::Headers,
            "#totals" => TableItem::Totals,
            "#this row" => TableItem::ThisRow,
            _ => return None,
        };
        Some(item)
    }
}

/// `Table[[#Items],[First]:[Last]]`. A missing table name means the table
/// containing the formula.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StructuredRef {
    pub table: Option<String>,
    pub items: Vec<TableItem>,
    pub first_column: Option<String>,
    pub last_column: Option<String>,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Pow,

    // String
    Concat,

    // Comparison
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl BinaryOp {
    /// Get the precedence of this operator (higher = binds tighter)
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge => 1,
            BinaryOp::Concat => 2,
            BinaryOp::Add | BinaryOp::Sub => 3,
            BinaryOp::Mul | BinaryOp::Div => 4,
            BinaryOp::Pow => 5,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Pow => "^",
            BinaryOp::Concat => "&",
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,     // -
    Pos,     // +
    Percent, // %
}

impl Expr {
    /// Create a number expression
    pub fn number(n: f64) -> Self {
        Expr::Number(n)
    }

    /// Create a string expression
    pub fn string(s: impl Into<String>) -> Self {
        Expr::String(s.into())
    }

    /// Create a cell reference expression
    pub fn cell_ref(col: u32, row: u32) -> Self {
        Expr::CellRef {
            col,
            row,
            abs_col: false,
            abs_row: false,
        }
    }

    /// Create a binary expression
    pub fn binary(left: Expr, op: BinaryOp, right: Expr) -> Self {
        Expr::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    /// Create a unary expression
    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    /// Create a function call expression
    pub fn function(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::FunctionCall {
            name: name.into(),
            args,
        }
    }

    /// Create a range expression
    pub fn range(start: Expr, end: Expr) -> Self {
        Expr::Range {
            start: Box::new(start),
            end: Box::new(end),
        }
    }

    /// Visit every node, children before parents.
    pub fn walk_mut(&mut self, visit: &mut dyn FnMut(&mut Expr)) {
        match self {
            Expr::Array(rows) => rows
                .iter_mut()
                .flatten()
                .for_each(|e| e.walk_mut(visit)),
            Expr::Range { start, end } => {
                start.walk_mut(visit);
                end.walk_mut(visit);
            }
            Expr::SheetRef { reference, .. } => reference.walk_mut(visit),
            Expr::Binary { left, right, .. } => {
                left.walk_mut(visit);
                right.walk_mut(visit);
            }
            Expr::Unary { operand, .. } => operand.walk_mut(visit),
            Expr::FunctionCall { args, .. } => args.iter_mut().for_each(|a| a.walk_mut(visit)),
            Expr::Grouped(inner) => inner.walk_mut(visit),
            _ => {}
        }
        visit(self);
    }

    /// Drop file-format prefixes (`_xlfn.`, `_xlws.`, `_xlpm.`) from function
    /// and parameter names.
    pub fn strip_decorations(&mut self) {
        self.walk_mut(&mut |expr| match expr {
            Expr::FunctionCall { name, .. } | Expr::Name(name) => {
                let bare = crate::render::strip_decorations(name).to_string();
                *name = bare;
            }
            _ => {}
        });
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&crate::render::Renderer::new().render(self))
    }
}

impl std::fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_item_keywords() {
        assert_eq!(TableItem::from_keyword("#this row"), Some(TableItem::ThisRow));
        assert_eq!(TableItem::from_keyword("#ALL"), Some(TableItem::All));
        assert_eq!(TableItem::from_keyword("#Nope"), None);
        assert_eq!(TableItem::Headers.keyword(), "#Headers");
    }

    #[test]
    fn test_walk_visits_children_first() {
        let mut expr = Expr::function(
            "SUM",
            vec![Expr::binary(Expr::number(1.0), BinaryOp::Add, Expr::number(2.0))],
        );
        let mut seen = Vec::new();
        expr.walk_mut(&mut |e| {
            seen.push(match e {
                Expr::Number(_) => "num",
                Expr::Binary { .. } => "bin",
                Expr::FunctionCall { .. } => "fn",
                _ => "other",
            })
        });
        assert_eq!(seen, vec!["num", "num", "bin", "fn"]);
    }

    #[test]
    fn test_strip_decorations() {
        let mut expr = Expr::function(
            "_xlfn.LAMBDA",
            vec![Expr::Name("_xlpm.x".into()), Expr::function("_XLFN._XLWS.SORT", vec![])],
        );
        expr.strip_decorations();
        assert_eq!(
            expr,
            Expr::function("LAMBDA", vec![Expr::Name("x".into()), Expr::function("SORT", vec![])])
        );
    }
}
