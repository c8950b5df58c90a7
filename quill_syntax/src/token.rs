use std::fmt::Display;

/// Byte offsets of a piece of source text, end exclusive.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextRange {
    pub start: usize,
    pub end: usize,
}

impl TextRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Smallest range covering both `self` and `other`.
    pub fn cover(self, other: Self) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// The enum variants are in SCREAMING_SNAKE_CASE as they technically
/// represent constants, but Rust does not allow const enum variants.
#[allow(nonstandard_style)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum TokenKind {
    // Symbols
    LPAREN,
    RPAREN,
    LBRACE,
    RBRACE,
    LBRACKET,
    RBRACKET,
    COMMA,
    SEMICOLON,
    // Arithmetic
    BANG,
    MINUS,
    PLUS,
    SLASH,
    STAR,
    MODULO,
    // Comparisons
    BANG_EQUAL,
    EQUAL_EQUAL,
    GREATER,
    GREATER_EQUAL,
    LESS,
    LESS_EQUAL,
    // Literals
    IDENT,
    STRING,
    NUMBER,
    // Keywords
    AND,
    BREAK,
    CONTINUE,
    ELSE,
    FALSE,
    FN,
    FOR,
    IF,
    LET,
    NULL,
    OR,
    RETURN,
    TRUE,
    WHILE,
    // Miscellaneous tokens
    EQUAL,
    COMMENT,
    WHITESPACE,
    EOF,
}

impl TokenKind {
    pub fn from_char(c: char) -> Option<Self> {
        let token = match c {
            '(' => Self::LPAREN,
            ')' => Self::RPAREN,
            '{' => Self::LBRACE,
            '}' => Self::RBRACE,
            '[' => Self::LBRACKET,
            ']' => Self::RBRACKET,
            ',' => Self::COMMA,
            '-' => Self::MINUS,
            '+' => Self::PLUS,
            ';' => Self::SEMICOLON,
            '*' => Self::STAR,
            '%' => Self::MODULO,
            ' ' | '\t' | '\r' | '\n' => Self::WHITESPACE,
            _ => return None,
        };
        Some(token)
    }

    pub fn from_keyword(kw: &str) -> Option<Self> {
        let token = match kw {
            "and" => Self::AND,
            "break" => Self::BREAK,
            "continue" => Self::CONTINUE,
            "else" => Self::ELSE,
            "false" => Self::FALSE,
            "fn" => Self::FN,
            "for" => Self::FOR,
            "if" => Self::IF,
            "let" => Self::LET,
            "null" => Self::NULL,
            "or" => Self::OR,
            "return" => Self::RETURN,
            "true" => Self::TRUE,
            "while" => Self::WHILE,
            _ => return None,
        };
        Some(token)
    }

    /// Tokens that begin a statement, used as resync points after a parse error.
    pub fn starts_statement(self) -> bool {
        matches!(
            self,
            Self::BREAK
                | Self::CONTINUE
                | Self::FN
                | Self::FOR
                | Self::IF
                | Self::LET
                | Self::RETURN
                | Self::WHILE
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub range: TextRange,
    /// 1-based line of the first character
    pub line: usize,
    /// 1-based column of the first character, counted in chars
    pub column: usize,
    pub lexeme: String,
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            TokenKind::EOF => f.write_str("end of input"),
            TokenKind::STRING => write!(f, "string \"{}\"", self.lexeme),
            _ => write!(f, "`{}`", self.lexeme),
        }
    }
}

impl Token {
    pub fn new(
        kind: TokenKind,
        range: TextRange,
        line: usize,
        column: usize,
        lexeme: String,
    ) -> Self {
        Self {
            kind,
            range,
            line,
            column,
            lexeme,
        }
    }
}
