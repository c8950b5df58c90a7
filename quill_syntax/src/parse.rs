use log::trace;

use crate::{
    ast::{BinOp, Expr, ExprKind, Ident, Item, ItemKind, Literal, LogicalOp, Source, UnaryOp},
    diagnostic::{Diagnostic, Stage},
    error::{parse_error, ErrorMsg},
    lex::unescape,
    token::{TextRange, Token, TokenKind},
};

/// Maximum nesting of statements and expressions. Later stages walk the
/// tree recursively, so the parser is the one place that bounds its depth.
pub const MAX_DEPTH: usize = 128;

type ParseResult<T> = Result<T, Diagnostic>;

#[derive(Debug)]
pub struct Parser<'a> {
    tokens: &'a [Token],
    current: usize,
    eof: Token,
    depth: usize,
    errors: Vec<Diagnostic>,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        let end = tokens.last().map_or(0, |t| t.range.end);
        let (line, column) = tokens.last().map_or((1, 1), |t| (t.line, t.column));
        Self {
            tokens,
            current: 0,
            eof: Token::new(
                TokenKind::EOF,
                TextRange::new(end, end),
                line,
                column,
                String::default(),
            ),
            depth: 0,
            errors: Vec::default(),
        }
    }

    /// Parse every item up to the end of input. Statements that fail to
    /// parse are reported and replaced by [`ItemKind::Error`] placeholders,
    /// so the returned tree is always complete.
    pub fn parse_all(mut self) -> (Source, Vec<Diagnostic>) {
        let mut items: Vec<Item> = Vec::default();
        while !self.at_end() {
            if self.check(TokenKind::RBRACE) {
                let t = self.advance();
                self.errors
                    .push(parse_error(ErrorMsg::UnexpectedClosingBrace, &t, t.range));
                continue;
            }
            items.push(self.parse_item_or_recover());
        }
        trace!("Parsed {} items with {} errors", items.len(), self.errors.len());
        (Source { items }, self.errors)
    }

    fn parse_item_or_recover(&mut self) -> Item {
        let start = self.current;
        let start_offset = self.peek().range.start;
        match self.parse_item() {
            Ok(item) => item,
            Err(e) => {
                trace!("Recovering from {e}");
                self.errors.push(e);
                self.sync();
                // Always make progress, or the caller would loop forever
                if self.current == start {
                    self.advance();
                }
                Item::new(ItemKind::Error, self.range_from(start_offset))
            }
        }
    }

    pub fn parse_item(&mut self) -> ParseResult<Item> {
        self.nested(|p| {
            let start = p.peek().range.start;
            let kind = match p.peek().kind {
                TokenKind::LBRACE => return p.parse_block(),
                TokenKind::IF => return p.parse_if_stmt(),
                TokenKind::WHILE => return p.parse_while_stmt(),
                TokenKind::FOR => return p.parse_for_stmt(),
                TokenKind::FN => return p.parse_function(),
                TokenKind::LET => p.parse_let_stmt()?,
                TokenKind::RETURN => p.parse_return()?,
                TokenKind::BREAK => {
                    p.advance();
                    ItemKind::Break
                }
                TokenKind::CONTINUE => {
                    p.advance();
                    ItemKind::Continue
                }
                _ => ItemKind::ExprStmt(p.parse_expr()?),
            };
            p.advance_or_err(TokenKind::SEMICOLON, ErrorMsg::MissingSemicolon)?;
            Ok(Item::new(kind, p.range_from(start)))
        })
    }

    fn parse_let_stmt(&mut self) -> ParseResult<ItemKind> {
        // Consume the `let` keyword
        self.advance();
        let ident = self.parse_ident()?;
        let init = if self.advance_if(|t| t.kind == TokenKind::EQUAL).is_some() {
            Some(self.parse_expr()?)
        } else {
            None
        };

        Ok(ItemKind::LetStmt { ident, init })
    }

    fn parse_if_stmt(&mut self) -> ParseResult<Item> {
        let start = self.advance().range.start;
        self.advance_or_err(TokenKind::LPAREN, ErrorMsg::MissingOpeningParen)?;
        let condition = self.parse_expr()?;
        self.advance_or_err(TokenKind::RPAREN, ErrorMsg::MissingClosingParen)?;
        let if_item = self.parse_item()?;
        let else_item = if self.advance_if(|t| t.kind == TokenKind::ELSE).is_some() {
            Some(Box::new(self.parse_item()?))
        } else {
            None
        };

        Ok(Item::new(
            ItemKind::IfStmt {
                condition,
                if_item: Box::new(if_item),
                else_item,
            },
            self.range_from(start),
        ))
    }

    fn parse_while_stmt(&mut self) -> ParseResult<Item> {
        let start = self.advance().range.start;
        self.advance_or_err(TokenKind::LPAREN, ErrorMsg::MissingOpeningParen)?;
        let condition = self.parse_expr()?;
        self.advance_or_err(TokenKind::RPAREN, ErrorMsg::MissingClosingParen)?;
        let body = Box::new(self.parse_item()?);

        Ok(Item::new(
            ItemKind::WhileStmt { condition, body },
            self.range_from(start),
        ))
    }

    fn parse_for_stmt(&mut self) -> ParseResult<Item> {
        let start = self.advance().range.start;
        self.advance_or_err(TokenKind::LPAREN, ErrorMsg::MissingOpeningParen)?;
        let init_start = self.peek().range.start;
        let init = match self.peek().kind {
            TokenKind::SEMICOLON => None,
            TokenKind::LET => Some(self.parse_let_stmt()?),
            _ => Some(ItemKind::ExprStmt(self.parse_expr()?)),
        };
        self.advance_or_err(TokenKind::SEMICOLON, ErrorMsg::MissingSemicolon)?;
        let init = init.map(|kind| Box::new(Item::new(kind, self.range_from(init_start))));

        let condition = if self.check(TokenKind::SEMICOLON) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.advance_or_err(TokenKind::SEMICOLON, ErrorMsg::MissingSemicolon)?;

        let step = if self.check(TokenKind::RPAREN) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.advance_or_err(TokenKind::RPAREN, ErrorMsg::MissingClosingParen)?;
        let body = Box::new(self.parse_item()?);

        Ok(Item::new(
            ItemKind::ForStmt {
                init,
                condition,
                step,
                body,
            },
            self.range_from(start),
        ))
    }

    fn parse_function(&mut self) -> ParseResult<Item> {
        let start = self.advance().range.start;
        let ident = self.parse_ident()?;
        self.advance_or_err(TokenKind::LPAREN, ErrorMsg::MissingOpeningParen)?;
        let mut args = vec![];
        if !self.check(TokenKind::RPAREN) {
            loop {
                args.push(self.parse_ident()?);
                if self.advance_if(|t| t.kind == TokenKind::COMMA).is_none() {
                    break;
                }
            }
        }
        self.advance_or_err(TokenKind::RPAREN, ErrorMsg::MissingClosingParen)?;
        let ItemKind::Block(body) = self.parse_block()?.kind else {
            unreachable!("parsing a block must return a body")
        };

        Ok(Item::new(
            ItemKind::Function { ident, args, body },
            self.range_from(start),
        ))
    }

    fn parse_return(&mut self) -> ParseResult<ItemKind> {
        // Consume the `return` keyword
        self.advance();
        if self.check(TokenKind::SEMICOLON) {
            return Ok(ItemKind::ReturnStmt(None));
        }
        Ok(ItemKind::ReturnStmt(Some(self.parse_expr()?)))
    }

    fn parse_block(&mut self) -> ParseResult<Item> {
        let start = self
            .advance_or_err(TokenKind::LBRACE, ErrorMsg::ExpectedBlock)?
            .range
            .start;
        let mut items = Vec::default();
        while !self.check(TokenKind::RBRACE) && !self.at_end() {
            items.push(self.parse_item_or_recover());
        }
        self.advance_or_err(TokenKind::RBRACE, ErrorMsg::MissingClosingBrace)?;

        Ok(Item::new(ItemKind::Block(items), self.range_from(start)))
    }

    fn parse_expr(&mut self) -> ParseResult<Expr> {
        self.nested(Self::parse_assignment)
    }

    fn parse_assignment(&mut self) -> ParseResult<Expr> {
        let lhs = self.parse_logical_or()?;
        if self.advance_if(|t| t.kind == TokenKind::EQUAL).is_none() {
            return Ok(lhs);
        }
        // Assignment is right-associative
        let rhs = self.parse_expr()?;
        let range = lhs.range.cover(rhs.range);
        let expr = match lhs.kind {
            ExprKind::Ident(name) => Expr::new(
                ExprKind::Assignment {
                    name,
                    value: Box::new(rhs),
                },
                range,
            ),
            ExprKind::Index { object, index } => Expr::new(
                ExprKind::IndexSet {
                    object,
                    index,
                    value: Box::new(rhs),
                },
                range,
            ),
            _ => {
                return Err(
                    Diagnostic::error(Stage::Parse, ErrorMsg::InvalidAssignment.to_string())
                        .with_range(lhs.range),
                )
            }
        };
        self.check_height(expr)
    }

    fn parse_logical_or(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.parse_logical_and()?;
        while self.advance_if(|t| t.kind == TokenKind::OR).is_some() {
            let rhs = self.parse_logical_and()?;
            lhs = self.check_height(Self::logical(lhs, LogicalOp::Or, rhs))?;
        }
        Ok(lhs)
    }

    fn parse_logical_and(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.parse_binary(BinOp::EqualEqual.precedence())?;
        while self.advance_if(|t| t.kind == TokenKind::AND).is_some() {
            let rhs = self.parse_binary(BinOp::EqualEqual.precedence())?;
            lhs = self.check_height(Self::logical(lhs, LogicalOp::And, rhs))?;
        }
        Ok(lhs)
    }

    /// Precedence climbing over the binary operators, all of which are
    /// left-associative.
    fn parse_binary(&mut self, min_precedence: u8) -> ParseResult<Expr> {
        let mut lhs = self.parse_unary()?;
        while let Some(op) =
            BinOp::from_token(self.peek().kind).filter(|op| op.precedence() >= min_precedence)
        {
            self.advance();
            let rhs = self.parse_binary(op.precedence() + 1)?;
            let range = lhs.range.cover(rhs.range);
            lhs = self.check_height(Expr::new(
                ExprKind::Binary {
                    lhs: Box::new(lhs),
                    op,
                    rhs: Box::new(rhs),
                },
                range,
            ))?;
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        let Some(op) = UnaryOp::from_token(self.peek().kind) else {
            return self.parse_postfix();
        };
        let start = self.advance().range.start;
        let expr = self.nested(Self::parse_unary)?;
        let range = TextRange::new(start, expr.range.end);
        Ok(Expr::new(
            ExprKind::Unary {
                op,
                expr: Box::new(expr),
            },
            range,
        ))
    }

    fn parse_postfix(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            let kind = match self.peek().kind {
                TokenKind::LPAREN => {
                    // Consume the opening parenthesis
                    self.advance();
                    let args = self.parse_list(TokenKind::RPAREN)?;
                    self.advance_or_err(TokenKind::RPAREN, ErrorMsg::MissingClosingParen)?;
                    ExprKind::Call {
                        func: Box::new(expr),
                        args,
                    }
                }
                TokenKind::LBRACKET => {
                    // Consume the opening bracket
                    self.advance();
                    let index = self.parse_expr()?;
                    self.advance_or_err(TokenKind::RBRACKET, ErrorMsg::MissingClosingBracket)?;
                    ExprKind::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    }
                }
                _ => break,
            };
            let range = TextRange::new(start_of(&kind), self.previous_end());
            expr = self.check_height(Expr::new(kind, range))?;
        }

        Ok(expr)
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let t = self.peek();
        let range = t.range;
        let kind = match t.kind {
            TokenKind::TRUE => ExprKind::Literal(Literal::Boolean(true)),
            TokenKind::FALSE => ExprKind::Literal(Literal::Boolean(false)),
            TokenKind::NULL => ExprKind::Literal(Literal::Null),
            TokenKind::NUMBER => match t.lexeme.parse() {
                Ok(n) => ExprKind::Literal(Literal::Number(n)),
                Err(_) => return Err(parse_error(ErrorMsg::ExpectedExpr, t, range)),
            },
            TokenKind::STRING => ExprKind::Literal(Literal::Str(unescape(&t.lexeme))),
            TokenKind::IDENT => ExprKind::Ident(Ident::new(t.lexeme.clone(), range)),
            TokenKind::LPAREN => return self.parse_group(),
            TokenKind::LBRACKET => {
                self.advance();
                let elements = self.parse_list(TokenKind::RBRACKET)?;
                self.advance_or_err(TokenKind::RBRACKET, ErrorMsg::MissingClosingBracket)?;
                return Ok(Expr::new(ExprKind::List(elements), self.range_from(range.start)));
            }
            _ => return Err(parse_error(ErrorMsg::ExpectedExpr, t, range)),
        };
        self.advance();
        Ok(Expr::new(kind, range))
    }

    fn parse_group(&mut self) -> ParseResult<Expr> {
        // Consume the opening parenthesis
        let start = self.advance().range.start;
        let expr = self.parse_expr()?;
        self.advance_or_err(TokenKind::RPAREN, ErrorMsg::MissingClosingParen)?;
        Ok(Expr::new(
            ExprKind::Group(Box::new(expr)),
            self.range_from(start),
        ))
    }

    /// Comma separated expressions, up to but excluding `close`.
    fn parse_list(&mut self, close: TokenKind) -> ParseResult<Vec<Expr>> {
        let mut exprs = vec![];
        if self.check(close) {
            return Ok(exprs);
        }
        loop {
            exprs.push(self.parse_expr()?);
            if self.advance_if(|t| t.kind == TokenKind::COMMA).is_none() {
                break;
            }
        }
        Ok(exprs)
    }

    fn parse_ident(&mut self) -> ParseResult<Ident> {
        let t = self.advance_or_err(TokenKind::IDENT, ErrorMsg::ExpectedIdent)?;
        Ok(Ident::new(t.lexeme, t.range))
    }

    fn logical(lhs: Expr, op: LogicalOp, rhs: Expr) -> Expr {
        let range = lhs.range.cover(rhs.range);
        Expr::new(
            ExprKind::Logical {
                lhs: Box::new(lhs),
                op,
                rhs: Box::new(rhs),
            },
            range,
        )
    }

    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        if self.depth >= MAX_DEPTH {
            return Err(self.too_deep());
        }
        self.depth += 1;
        let res = f(self);
        self.depth -= 1;
        res
    }

    /// Operator chains and parenthesised operands build nested nodes
    /// without recursing in the parser, so the height of what they build
    /// counts towards the depth limit as well.
    fn check_height(&self, expr: Expr) -> ParseResult<Expr> {
        if self.depth + expr.height() > MAX_DEPTH {
            return Err(self.too_deep());
        }
        Ok(expr)
    }

    fn too_deep(&self) -> Diagnostic {
        Diagnostic::error(Stage::Parse, ErrorMsg::TooDeep.to_string()).with_range(self.peek().range)
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.current).unwrap_or(&self.eof)
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn at_end(&self) -> bool {
        self.check(TokenKind::EOF)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if !self.at_end() {
            self.current += 1;
        }
        token
    }

    fn advance_if<F>(&mut self, cond: F) -> Option<Token>
    where
        F: FnOnce(&Token) -> bool,
    {
        if cond(self.peek()) {
            Some(self.advance())
        } else {
            None
        }
    }

    fn advance_or_err(&mut self, kind: TokenKind, msg: ErrorMsg) -> ParseResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            let t = self.peek();
            Err(parse_error(msg, t, t.range))
        }
    }

    fn previous_end(&self) -> usize {
        self.current
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map_or(0, |t| t.range.end)
    }

    fn range_from(&self, start: usize) -> TextRange {
        TextRange::new(start, self.previous_end().max(start))
    }

    /// Skip tokens until a likely statement boundary: just past a `;`, or
    /// before a statement keyword, a `}` or the end of input.
    fn sync(&mut self) {
        loop {
            let kind = self.peek().kind;
            if kind == TokenKind::SEMICOLON {
                self.advance();
                return;
            }
            if kind == TokenKind::EOF || kind == TokenKind::RBRACE || kind.starts_statement() {
                return;
            }
            self.advance();
        }
    }
}

/// Start offset of the callee or indexed object of a postfix expression.
fn start_of(kind: &ExprKind) -> usize {
    match kind {
        ExprKind::Call { func, .. } => func.range.start,
        ExprKind::Index { object, .. } => object.range.start,
        _ => 0,
    }
}
