//! Canonical pretty-printer for Quill source.
//!
//! Output uses 4-space indentation, one statement per line and single
//! spaces around binary operators. Comments are kept on their own lines in
//! front of the statement that follows them, and runs of blank lines
//! collapse into one.

use std::{iter::Peekable, vec::IntoIter};

use log::trace;

use crate::{
    ast::{Expr, ExprKind, Item, ItemKind, Literal},
    lex::{escape, Lexer},
    parse::Parser,
    token::{Token, TokenKind},
};

const INDENT: &str = "    ";

/// Reformat `source`. Input with lex or parse errors has no well-defined
/// layout and is returned unchanged.
pub fn format(source: &str) -> String {
    let (tokens, lex_errors) = Lexer::new(source).lex_all();
    if !lex_errors.is_empty() {
        trace!("Not formatting, {} lex errors", lex_errors.len());
        return source.to_string();
    }
    let (comments, code): (Vec<Token>, Vec<Token>) = tokens
        .into_iter()
        .filter(|t| t.kind != TokenKind::WHITESPACE)
        .partition(|t| t.kind == TokenKind::COMMENT);
    let (ast, errors) = Parser::new(&code).parse_all();
    if !errors.is_empty() {
        trace!("Not formatting, {} parse errors", errors.len());
        return source.to_string();
    }

    let mut formatter = Formatter {
        source,
        out: String::with_capacity(source.len()),
        comments: comments.into_iter().peekable(),
        indent: 0,
    };
    formatter.format_items(&ast.items, source.len());
    let mut out = formatter.out;
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

struct Formatter<'a> {
    source: &'a str,
    out: String,
    comments: Peekable<IntoIter<Token>>,
    indent: usize,
}

impl Formatter<'_> {
    /// Write `items` one per line, together with every comment that starts
    /// before `end`.
    fn format_items(&mut self, items: &[Item], end: usize) {
        let mut prev_end = None;
        for item in items {
            self.flush_comments(item.range.start, &mut prev_end);
            self.blank_line(prev_end, item.range.start);
            self.write_indent();
            self.format_item(item);
            self.out.push('\n');
            prev_end = Some(item.range.end);
        }
        self.flush_comments(end, &mut prev_end);
    }

    fn flush_comments(&mut self, before: usize, prev_end: &mut Option<usize>) {
        while let Some(comment) = self.comments.next_if(|c| c.range.start < before) {
            self.blank_line(*prev_end, comment.range.start);
            self.write_indent();
            self.out.push_str(comment.lexeme.trim_end());
            self.out.push('\n');
            *prev_end = Some(comment.range.end);
        }
    }

    /// Keep a single blank line where the source had at least one.
    fn blank_line(&mut self, prev_end: Option<usize>, next_start: usize) {
        let Some(prev_end) = prev_end else {
            return;
        };
        let gap = self.source.get(prev_end..next_start).unwrap_or_default();
        if gap.matches('\n').count() >= 2 {
            self.out.push('\n');
        }
    }

    fn write_indent(&mut self) {
        for _ in 0..self.indent {
            self.out.push_str(INDENT);
        }
    }

    fn has_comment_before(&mut self, end: usize) -> bool {
        self.comments.peek().is_some_and(|c| c.range.start < end)
    }

    /// Write a braced block starting at the current position, leaving the
    /// cursor right after the closing brace.
    fn format_block(&mut self, items: &[Item], end: usize) {
        if items.is_empty() && !self.has_comment_before(end) {
            self.out.push_str("{}");
            return;
        }
        self.out.push_str("{\n");
        self.indent += 1;
        self.format_items(items, end);
        self.indent -= 1;
        self.write_indent();
        self.out.push('}');
    }

    /// Write the body of an `if`, `else`, `while` or `for`.
    fn format_body(&mut self, item: &Item) {
        if let ItemKind::Block(items) = &item.kind {
            self.out.push(' ');
            self.format_block(items, item.range.end);
        } else {
            self.out.push('\n');
            self.indent += 1;
            self.write_indent();
            self.format_item(item);
            self.indent -= 1;
        }
    }

    fn format_item(&mut self, item: &Item) {
        match &item.kind {
            ItemKind::ExprStmt(expr) => {
                self.format_expr(expr);
                self.out.push(';');
            }
            ItemKind::LetStmt { .. } => {
                self.format_let(item);
                self.out.push(';');
            }
            ItemKind::IfStmt {
                condition,
                if_item,
                else_item,
            } => {
                self.out.push_str("if (");
                self.format_expr(condition);
                self.out.push(')');
                self.format_body(if_item);
                if let Some(else_item) = else_item {
                    if matches!(if_item.kind, ItemKind::Block(_)) {
                        self.out.push(' ');
                    } else {
                        self.out.push('\n');
                        self.write_indent();
                    }
                    self.out.push_str("else");
                    if matches!(else_item.kind, ItemKind::IfStmt { .. }) {
                        self.out.push(' ');
                        self.format_item(else_item);
                    } else {
                        self.format_body(else_item);
                    }
                }
            }
            ItemKind::WhileStmt { condition, body } => {
                self.out.push_str("while (");
                self.format_expr(condition);
                self.out.push(')');
                self.format_body(body);
            }
            ItemKind::ForStmt {
                init,
                condition,
                step,
                body,
            } => {
                self.out.push_str("for (");
                if let Some(init) = init {
                    match &init.kind {
                        ItemKind::ExprStmt(expr) => self.format_expr(expr),
                        _ => self.format_let(init),
                    }
                }
                self.out.push(';');
                if let Some(condition) = condition {
                    self.out.push(' ');
                    self.format_expr(condition);
                }
                self.out.push(';');
                if let Some(step) = step {
                    self.out.push(' ');
                    self.format_expr(step);
                }
                self.out.push(')');
                self.format_body(body);
            }
            ItemKind::ReturnStmt(value) => {
                self.out.push_str("return");
                if let Some(value) = value {
                    self.out.push(' ');
                    self.format_expr(value);
                }
                self.out.push(';');
            }
            ItemKind::Break => self.out.push_str("break;"),
            ItemKind::Continue => self.out.push_str("continue;"),
            ItemKind::Block(items) => self.format_block(items, item.range.end),
            ItemKind::Function { ident, args, body } => {
                self.out.push_str("fn ");
                self.out.push_str(&ident.name);
                self.out.push('(');
                let args: Vec<&str> = args.iter().map(|a| a.name.as_str()).collect();
                self.out.push_str(&args.join(", "));
                self.out.push_str(") ");
                self.format_block(body, item.range.end);
            }
            // Sources with parse errors are never formatted
            ItemKind::Error => (),
        }
    }

    fn format_let(&mut self, item: &Item) {
        if let ItemKind::LetStmt { ident, init } = &item.kind {
            self.out.push_str("let ");
            self.out.push_str(&ident.name);
            if let Some(init) = init {
                self.out.push_str(" = ");
                self.format_expr(init);
            }
        }
    }

    fn format_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Literal(Literal::Str(s)) => {
                self.out.push('"');
                self.out.push_str(&escape(s));
                self.out.push('"');
            }
            ExprKind::Literal(lit) => self.out.push_str(&lit.to_string()),
            ExprKind::Ident(ident) => self.out.push_str(&ident.name),
            ExprKind::List(elements) => {
                self.out.push('[');
                self.format_list(elements);
                self.out.push(']');
            }
            ExprKind::Assignment { name, value } => {
                self.out.push_str(&name.name);
                self.out.push_str(" = ");
                self.format_expr(value);
            }
            ExprKind::IndexSet {
                object,
                index,
                value,
            } => {
                self.format_expr(object);
                self.out.push('[');
                self.format_expr(index);
                self.out.push_str("] = ");
                self.format_expr(value);
            }
            ExprKind::Unary { op, expr } => {
                self.out.push_str(&op.to_string());
                self.format_expr(expr);
            }
            ExprKind::Binary { lhs, op, rhs } => {
                self.format_expr(lhs);
                self.out.push_str(&format!(" {op} "));
                self.format_expr(rhs);
            }
            ExprKind::Logical { lhs, op, rhs } => {
                self.format_expr(lhs);
                self.out.push_str(&format!(" {op} "));
                self.format_expr(rhs);
            }
            ExprKind::Group(inner) => {
                self.out.push('(');
                self.format_expr(inner);
                self.out.push(')');
            }
            ExprKind::Call { func, args } => {
                self.format_expr(func);
                self.out.push('(');
                self.format_list(args);
                self.out.push(')');
            }
            ExprKind::Index { object, index } => {
                self.format_expr(object);
                self.out.push('[');
                self.format_expr(index);
                self.out.push(']');
            }
        }
    }

    fn format_list(&mut self, exprs: &[Expr]) {
        for (i, expr) in exprs.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            self.format_expr(expr);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_source;

    fn format_test(input: &str, expected: &str) {
        let formatted = format(input);
        assert_eq!(formatted, expected);
        assert_eq!(format(&formatted), formatted, "formatting is not a fixed point");
        let (before, _) = parse_source(input);
        let (after, _) = parse_source(&formatted);
        assert_eq!(before, after, "formatting changed the program structure");
    }

    #[test]
    fn statements() {
        format_test(
            "let x=1;let y;x=x+2*y;print(x);",
            "let x = 1;\nlet y;\nx = x + 2 * y;\nprint(x);\n",
        );
    }

    #[test]
    fn functions_and_blocks() {
        format_test(
            "fn add(a,b){return a+b;}fn nop(){}",
            "fn add(a, b) {\n    return a + b;\n}\nfn nop() {}\n",
        );
    }

    #[test]
    fn control_flow() {
        format_test(
            "if(a and !b){print(1);}else if(c){return;}else{while(x<3)x=x+1;}",
            "if (a and !b) {\n    print(1);\n} else if (c) {\n    return;\n} else {\n    while (x < 3)\n        x = x + 1;\n}\n",
        );
        format_test(
            "for(let i=0;i<3;i=i+1){continue;}for(;;)break;",
            "for (let i = 0; i < 3; i = i + 1) {\n    continue;\n}\nfor (;;)\n    break;\n",
        );
        format_test(
            "if (x) y; else z;",
            "if (x)\n    y;\nelse\n    z;\n",
        );
    }

    #[test]
    fn expressions() {
        format_test(
            "xs[0]=[1,2.50,\"a\\tb\"];f(-(1+2))[1];",
            "xs[0] = [1, 2.5, \"a\\tb\"];\nf(-(1 + 2))[1];\n",
        );
    }

    #[test]
    fn comments_and_blank_lines() {
        format_test(
            "// header\nlet a = 1; // trailing\n\n\n\nfn f() {\n  /* inside */\n  a;\n\n  // last\n}\n",
            "// header\nlet a = 1;\n// trailing\n\nfn f() {\n    /* inside */\n    a;\n\n    // last\n}\n",
        );
        format_test("fn f() { // only a comment\n}", "fn f() {\n    // only a comment\n}\n");
    }

    #[test]
    fn invalid_input_is_unchanged() {
        for input in ["1 +", "let x = \"open", "fn (", "}"] {
            assert_eq!(format(input), input);
        }
    }

    #[test]
    fn overly_tall_input_is_unchanged() {
        let mut expr = "x".to_string();
        for _ in 0..120 {
            expr = format!("({expr}{})", " + 1".repeat(60));
        }
        let input = format!("print({expr});");
        assert_eq!(format(&input), input);

        let long_chain = format!("x{};", " + 1".repeat(100));
        format_test(&long_chain, &format!("{long_chain}\n"));
    }

    #[test]
    fn empty_input() {
        assert_eq!(format(""), "");
        assert_eq!(format("  \n\n"), "");
        assert_eq!(format("// just this"), "// just this\n");
    }
}
