use crate::{
    diagnostic::Diagnostic,
    error::{lex_error, ErrorMsg},
    token::{TextRange, Token, TokenKind},
};
use log::trace;
use std::{iter::Peekable, str::CharIndices};

#[derive(Debug)]
pub struct Lexer<'a> {
    source: &'a str,
    stream: Peekable<CharIndices<'a>>,
    errors: Vec<Diagnostic>,
    // Byte offsets of the current lexeme
    start: usize,
    current: usize,
    // Position of the next char
    line: usize,
    column: usize,
    // Position of the first char of the current lexeme
    start_line: usize,
    start_column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            stream: source.char_indices().peekable(),
            errors: Vec::default(),
            start: 0,
            current: 0,
            line: 1,
            column: 1,
            start_line: 1,
            start_column: 1,
        }
    }

    /// Lex the whole source. The token stream always ends with an EOF
    /// token, even when errors were reported along the way.
    pub fn lex_all(mut self) -> (Vec<Token>, Vec<Diagnostic>) {
        let mut tokens: Vec<Token> = Vec::default();
        loop {
            if let Some(t) = self.lex() {
                let eof = t.kind == TokenKind::EOF;
                tokens.push(t);
                if eof {
                    break;
                }
            }
        }
        trace!("Lexed {} tokens with {} errors", tokens.len(), self.errors.len());
        (tokens, self.errors)
    }

    /// Same as [`Lexer::lex_all`], without whitespace and comment tokens.
    pub fn lex_all_sanitised(self) -> (Vec<Token>, Vec<Diagnostic>) {
        let (tokens, errors) = self.lex_all();
        let tokens = tokens
            .into_iter()
            .filter(|t| !matches!(t.kind, TokenKind::WHITESPACE | TokenKind::COMMENT))
            .collect();
        (tokens, errors)
    }

    /// Produce the next token. `None` means the lexeme was rejected and an
    /// error has been recorded; lexing can simply continue.
    pub fn lex(&mut self) -> Option<Token> {
        self.start = self.current;
        self.start_line = self.line;
        self.start_column = self.column;
        let Some(c) = self.advance() else {
            return Some(self.make_token(TokenKind::EOF));
        };
        let token = match c {
            '!' => self.lookahead_for_token('=', TokenKind::BANG_EQUAL, TokenKind::BANG),
            '=' => self.lookahead_for_token('=', TokenKind::EQUAL_EQUAL, TokenKind::EQUAL),
            '>' => self.lookahead_for_token('=', TokenKind::GREATER_EQUAL, TokenKind::GREATER),
            '<' => self.lookahead_for_token('=', TokenKind::LESS_EQUAL, TokenKind::LESS),
            '"' => return self.lex_string(),
            '/' => return self.lex_slash_or_comment(),
            _ => {
                if let Some(t) = TokenKind::from_char(c) {
                    self.make_token(t)
                } else if c.is_ascii_alphabetic() || c == '_' {
                    self.lex_ident()
                } else if c.is_ascii_digit() {
                    return self.lex_number();
                } else {
                    self.error(ErrorMsg::UnexpectedChar);
                    return None;
                }
            }
        };
        Some(token)
    }

    fn lex_ident(&mut self) -> Token {
        self.advance_while(|c| c.is_ascii_alphanumeric() || c == '_');
        if let Some(t) = TokenKind::from_keyword(self.lexeme_from_range()) {
            self.make_token(t)
        } else {
            self.make_token(TokenKind::IDENT)
        }
    }

    fn lex_number(&mut self) -> Option<Token> {
        // Consume numbers
        self.advance_while(|c| c.is_ascii_digit());
        // A dot only belongs to the number if a digit follows it
        if self.peek_second().is_some_and(|c| c.is_ascii_digit())
            && self.advance_if(|c| c == '.').is_some()
        {
            self.advance_while(|c| c.is_ascii_digit());
        }
        // `12abc` is a malformed number, not a number followed by an identifier
        if self.advance_while(|c| c.is_ascii_alphanumeric() || c == '_').is_some() {
            self.error(ErrorMsg::InvalidNumber);
            return None;
        }
        match self.lexeme_from_range().parse::<f64>() {
            Ok(n) if n.is_finite() => Some(self.make_token(TokenKind::NUMBER)),
            _ => {
                self.error(ErrorMsg::InvalidNumber);
                None
            }
        }
    }

    fn lex_string(&mut self) -> Option<Token> {
        loop {
            match self.stream.peek().map(|&(_, c)| c) {
                Some('"') => break,
                // Strings cannot span lines. The newline is left for the
                // next token so that lexing resumes on the following line.
                Some('\n') | None => {
                    self.error(ErrorMsg::UnterminatedString);
                    return None;
                }
                Some('\\') => {
                    let escape_start = self.current;
                    self.advance();
                    let valid = self
                        .advance_if(|c| c != '\n')
                        .is_some_and(|c| unescape_char(c).is_some());
                    if !valid {
                        let range = TextRange::new(escape_start, self.current);
                        self.errors.push(lex_error(
                            ErrorMsg::InvalidEscape,
                            &self.source[escape_start..self.current],
                            range,
                        ));
                    }
                }
                Some(_) => {
                    self.advance();
                }
            }
        }
        // Consume the closing quote
        self.advance();
        // The lexeme holds the raw contents without the quotes
        let mut token = self.make_token(TokenKind::STRING);
        token.lexeme = self.source[self.start + 1..self.current - 1].to_string();
        Some(token)
    }

    fn lex_slash_or_comment(&mut self) -> Option<Token> {
        if self.advance_if(|c| c == '/').is_some() {
            self.advance_while(|c| c != '\n');
            return Some(self.make_token(TokenKind::COMMENT));
        }
        if self.advance_if(|c| c == '*').is_some() {
            loop {
                match self.advance() {
                    Some('*') if self.advance_if(|c| c == '/').is_some() => {
                        return Some(self.make_token(TokenKind::COMMENT));
                    }
                    Some(_) => (),
                    None => {
                        self.error(ErrorMsg::UnterminatedComment);
                        return None;
                    }
                }
            }
        }
        Some(self.make_token(TokenKind::SLASH))
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(
            kind,
            self.text_range(),
            self.start_line,
            self.start_column,
            self.lexeme_from_range().to_string(),
        )
    }

    fn lexeme_from_range(&self) -> &'a str {
        &self.source[self.start..self.current]
    }

    fn text_range(&self) -> TextRange {
        TextRange::new(self.start, self.current)
    }

    fn advance(&mut self) -> Option<char> {
        let (i, c) = self.stream.next()?;
        self.current = i + c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn peek_second(&self) -> Option<char> {
        self.source[self.current..].chars().nth(1)
    }

    fn advance_if<F>(&mut self, cond: F) -> Option<char>
    where
        F: FnOnce(char) -> bool,
    {
        if self.stream.peek().filter(|&&(_, c)| cond(c)).is_some() {
            self.advance()
        } else {
            None
        }
    }

    fn advance_while<F>(&mut self, cond: F) -> Option<usize>
    where
        F: Fn(char) -> bool,
    {
        let mut count: usize = 0;
        while self.stream.peek().filter(|&&(_, c)| cond(c)).is_some() {
            count += 1;
            self.advance();
        }
        count.ne(&0).then_some(count)
    }

    fn lookahead_for_token(
        &mut self,
        match_char: char,
        if_match: TokenKind,
        no_match: TokenKind,
    ) -> Token {
        if self.advance_if(|c| c == match_char).is_some() {
            self.make_token(if_match)
        } else {
            self.make_token(no_match)
        }
    }

    fn error(&mut self, msg: ErrorMsg) {
        // Unterminated constructs can run to the end of the input, so
        // only short lexemes are quoted in the message
        let lexeme = match msg {
            ErrorMsg::UnterminatedString | ErrorMsg::UnterminatedComment => "",
            _ => self.lexeme_from_range(),
        };
        let error = lex_error(msg, lexeme, self.text_range());
        self.errors.push(error);
    }
}

fn unescape_char(c: char) -> Option<char> {
    let unescaped = match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        '0' => '\0',
        '"' => '"',
        '\\' => '\\',
        _ => return None,
    };
    Some(unescaped)
}

/// Resolve the escape sequences of a raw string lexeme. Invalid escapes
/// have already been reported by the lexer and are kept verbatim.
pub fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(e) => match unescape_char(e) {
                Some(u) => out.push(u),
                None => {
                    out.push('\\');
                    out.push(e);
                }
            },
            None => out.push('\\'),
        }
    }
    out
}

/// Inverse of [`unescape`], used when printing string literals back out.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        let (tokens, errors) = Lexer::new(input).lex_all_sanitised();
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
        tokens.into_iter().map(|t| t.kind).collect()
    }

    fn errors(input: &str) -> Vec<String> {
        let (_, errors) = Lexer::new(input).lex_all();
        errors.into_iter().map(|e| e.message).collect()
    }

    #[test]
    fn operators_longest_match() {
        assert_eq!(
            kinds("! != = == < <= > >= + - * / %"),
            vec![
                TokenKind::BANG,
                TokenKind::BANG_EQUAL,
                TokenKind::EQUAL,
                TokenKind::EQUAL_EQUAL,
                TokenKind::LESS,
                TokenKind::LESS_EQUAL,
                TokenKind::GREATER,
                TokenKind::GREATER_EQUAL,
                TokenKind::PLUS,
                TokenKind::MINUS,
                TokenKind::STAR,
                TokenKind::SLASH,
                TokenKind::MODULO,
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn keywords_and_identifiers() {
        assert_eq!(
            kinds("let lettuce while _while fn"),
            vec![
                TokenKind::LET,
                TokenKind::IDENT,
                TokenKind::WHILE,
                TokenKind::IDENT,
                TokenKind::FN,
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn positions() {
        let (tokens, _) = Lexer::new("let x\n  = 10;").lex_all_sanitised();
        let eq = &tokens[2];
        assert_eq!(eq.kind, TokenKind::EQUAL);
        assert_eq!((eq.line, eq.column), (2, 3));
        assert_eq!(eq.range, TextRange::new(8, 9));
        let num = &tokens[3];
        assert_eq!(num.lexeme, "10");
        assert_eq!(num.range, TextRange::new(10, 12));
        assert_eq!(tokens.last().map(|t| t.kind), Some(TokenKind::EOF));
    }

    #[test]
    fn numbers() {
        let (tokens, errs) = Lexer::new("1 2.5 30").lex_all_sanitised();
        assert!(errs.is_empty());
        let lexemes: Vec<&str> = tokens.iter().map(|t| t.lexeme.as_str()).collect();
        assert_eq!(lexemes, vec!["1", "2.5", "30", ""]);
        // A trailing dot is not part of the number
        assert_eq!(errors("3."), vec!["unexpected character `.`"]);
    }

    #[test]
    fn strings_and_escapes() {
        let (tokens, errors) = Lexer::new(r#""a\n\"b\"" "x\q""#).lex_all_sanitised();
        assert_eq!(tokens[0].kind, TokenKind::STRING);
        assert_eq!(tokens[0].lexeme, r#"a\n\"b\""#);
        assert_eq!(unescape(&tokens[0].lexeme), "a\n\"b\"");
        assert_eq!(tokens[1].kind, TokenKind::STRING);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "invalid escape sequence `\\\\q`");
    }

    #[test]
    fn escape_inverts_unescape() {
        let value = "tab\tquote\"slash\\nul\0";
        assert_eq!(unescape(&escape(value)), value);
    }

    #[test]
    fn comments() {
        assert_eq!(
            kinds("1 // one\n/* two\n lines */ 2"),
            vec![TokenKind::NUMBER, TokenKind::NUMBER, TokenKind::EOF]
        );
    }

    #[test]
    fn recovers_after_errors() {
        let (tokens, errors) =
            Lexer::new("let a = \"open\nlet b = @;\n/* never").lex_all_sanitised();
        assert_eq!(
            errors.iter().map(|e| e.message.as_str()).collect::<Vec<_>>(),
            vec![
                "unterminated string",
                "unexpected character `@`",
                "unterminated block comment",
            ]
        );
        // The second line is still lexed
        assert!(tokens.iter().any(|t| t.lexeme == "b"));
        assert_eq!(tokens.last().map(|t| t.kind), Some(TokenKind::EOF));
    }

    #[test]
    fn invalid_numbers() {
        assert_eq!(errors("12abc"), vec!["invalid number literal `12abc`"]);
        let huge = "9".repeat(400);
        assert_eq!(errors(&huge).len(), 1);
    }

    #[test]
    fn non_ascii() {
        assert_eq!(errors("let é = 1;"), vec!["unexpected character `é`"]);
        let (tokens, _) = Lexer::new("\"héllo\" x").lex_all_sanitised();
        assert_eq!(tokens[0].lexeme, "héllo");
        assert_eq!(tokens[1].column, 9);
    }
}
