use std::fmt::Display;

use crate::token::{TextRange, TokenKind};

// Equality on AST nodes is structural: spans are ignored, so two parses of
// differently laid out source compare equal when they mean the same thing.

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Source {
    pub items: Vec<Item>,
}

impl Source {
    /// Whether parsing left any error placeholders in the tree.
    pub fn has_errors(&self) -> bool {
        self.items.iter().any(Item::has_errors)
    }
}

#[derive(Clone, Debug, Eq)]
pub struct Ident {
    pub name: String,
    pub range: TextRange,
}

impl Ident {
    pub fn new(name: impl Into<String>, range: TextRange) -> Self {
        Self {
            name: name.into(),
            range,
        }
    }
}

impl PartialEq for Ident {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Display for Ident {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Bang,
    Minus,
}

impl Display for UnaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Bang => "!",
            Self::Minus => "-",
        })
    }
}

impl UnaryOp {
    pub fn from_token(t: TokenKind) -> Option<Self> {
        let op = match t {
            TokenKind::BANG => Self::Bang,
            TokenKind::MINUS => Self::Minus,
            _ => return None,
        };
        Some(op)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Slash,
    Star,
    Modulo,
    Plus,
    Minus,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    BangEqual,
    EqualEqual,
}

impl Display for BinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Slash => "/",
            Self::Star => "*",
            Self::Modulo => "%",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Greater => ">",
            Self::GreaterEqual => ">=",
            Self::Less => "<",
            Self::LessEqual => "<=",
            Self::BangEqual => "!=",
            Self::EqualEqual => "==",
        })
    }
}

impl BinOp {
    pub fn from_token(t: TokenKind) -> Option<Self> {
        let op = match t {
            TokenKind::SLASH => Self::Slash,
            TokenKind::STAR => Self::Star,
            TokenKind::MODULO => Self::Modulo,
            TokenKind::PLUS => Self::Plus,
            TokenKind::MINUS => Self::Minus,
            TokenKind::GREATER => Self::Greater,
            TokenKind::GREATER_EQUAL => Self::GreaterEqual,
            TokenKind::LESS => Self::Less,
            TokenKind::LESS_EQUAL => Self::LessEqual,
            TokenKind::BANG_EQUAL => Self::BangEqual,
            TokenKind::EQUAL_EQUAL => Self::EqualEqual,
            _ => return None,
        };
        Some(op)
    }

    /// Binding strength, higher binds tighter. Logical operators sit below
    /// every binary operator.
    pub fn precedence(self) -> u8 {
        match self {
            Self::BangEqual | Self::EqualEqual => 3,
            Self::Greater | Self::GreaterEqual | Self::Less | Self::LessEqual => 4,
            Self::Plus | Self::Minus => 5,
            Self::Slash | Self::Star | Self::Modulo => 6,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

impl Display for LogicalOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::And => "and",
            Self::Or => "or",
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Number(f64),
    Str(String),
    Boolean(bool),
    Null,
}

impl Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Str(s) => f.write_str(s),
            Self::Boolean(b) => write!(f, "{b}"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Expr {
    pub kind: ExprKind,
    pub range: TextRange,
    height: usize,
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl Expr {
    pub fn new(kind: ExprKind, range: TextRange) -> Self {
        let height = kind.height();
        Self {
            kind,
            range,
            height,
        }
    }

    /// Number of nodes on the longest path from this node down to a leaf.
    pub fn height(&self) -> usize {
        self.height
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    Ident(Ident),
    List(Vec<Expr>),
    Assignment {
        name: Ident,
        value: Box<Expr>,
    },
    IndexSet {
        object: Box<Expr>,
        index: Box<Expr>,
        value: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        lhs: Box<Expr>,
        op: BinOp,
        rhs: Box<Expr>,
    },
    Logical {
        lhs: Box<Expr>,
        op: LogicalOp,
        rhs: Box<Expr>,
    },
    Group(Box<Expr>),
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
}

impl ExprKind {
    fn height(&self) -> usize {
        let tallest = |exprs: &[Expr]| exprs.iter().map(Expr::height).max().unwrap_or(0);
        let children = match self {
            Self::Literal(_) | Self::Ident(_) => 0,
            Self::List(elements) => tallest(elements),
            Self::Assignment { value, .. } => value.height,
            Self::IndexSet {
                object,
                index,
                value,
            } => object.height.max(index.height).max(value.height),
            Self::Unary { expr, .. } | Self::Group(expr) => expr.height,
            Self::Binary { lhs, rhs, .. } | Self::Logical { lhs, rhs, .. } => {
                lhs.height.max(rhs.height)
            }
            Self::Call { func, args } => func.height.max(tallest(args)),
            Self::Index { object, index } => object.height.max(index.height),
        };
        children + 1
    }
}

#[derive(Clone, Debug)]
pub struct Item {
    pub kind: ItemKind,
    pub range: TextRange,
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl Item {
    pub fn new(kind: ItemKind, range: TextRange) -> Self {
        Self { kind, range }
    }

    pub fn has_errors(&self) -> bool {
        match &self.kind {
            ItemKind::Error => true,
            ItemKind::Block(items) | ItemKind::Function { body: items, .. } => {
                items.iter().any(Self::has_errors)
            }
            ItemKind::IfStmt {
                if_item, else_item, ..
            } => if_item.has_errors() || else_item.as_ref().is_some_and(|i| i.has_errors()),
            ItemKind::WhileStmt { body, .. } => body.has_errors(),
            ItemKind::ForStmt { init, body, .. } => {
                init.as_ref().is_some_and(|i| i.has_errors()) || body.has_errors()
            }
            ItemKind::ExprStmt(_)
            | ItemKind::LetStmt { .. }
            | ItemKind::ReturnStmt(_)
            | ItemKind::Break
            | ItemKind::Continue => false,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ItemKind {
    ExprStmt(Expr),
    LetStmt {
        ident: Ident,
        init: Option<Expr>,
    },
    IfStmt {
        condition: Expr,
        if_item: Box<Item>,
        else_item: Option<Box<Item>>,
    },
    WhileStmt {
        condition: Expr,
        body: Box<Item>,
    },
    ForStmt {
        init: Option<Box<Item>>,
        condition: Option<Expr>,
        step: Option<Expr>,
        body: Box<Item>,
    },
    ReturnStmt(Option<Expr>),
    Break,
    Continue,
    Block(Vec<Item>),
    Function {
        ident: Ident,
        args: Vec<Ident>,
        body: Vec<Item>,
    },
    /// Placeholder for a statement that failed to parse
    Error,
}
