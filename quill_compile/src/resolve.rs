use std::collections::HashMap;

use log::trace;
use quill_syntax::{
    ast::{BinOp, Expr, ExprKind, Ident, Item, ItemKind, Literal, Source, UnaryOp},
    diagnostic::Diagnostic,
    token::TextRange,
};

use crate::{
    error::{resolution_error, resolution_warning, ErrorMsg},
    stdlib::BUILTINS,
    symbol::{Analysis, Resolution, StaticType, Symbol, SymbolId, SymbolKind},
};

#[derive(Debug, Default)]
struct Scope {
    /// Symbol and whether its initialiser has finished
    names: HashMap<String, (SymbolId, bool)>,
    /// Declaration order, so warnings come out deterministically
    order: Vec<SymbolId>,
}

/// Static analysis pass. Links every identifier to its declaration and
/// reports what can be known to be wrong without running the program.
///
/// Scopes are opened exactly where the interpreter creates environments:
/// the prelude, the global scope, every block, every `for` header and
/// every function call, so a resolved depth indexes the runtime env chain.
#[derive(Debug, Default)]
pub struct Resolver {
    scopes: Vec<Scope>,
    analysis: Analysis,
    diagnostics: Vec<Diagnostic>,
    in_function: bool,
    loops: usize,
    recovering: bool,
}

impl Resolver {
    pub fn new() -> Self {
        let mut resolver = Self::default();
        resolver.init_scope();
        for func in BUILTINS {
            let id = resolver.analysis.symbols.push(Symbol {
                name: func.name.to_string(),
                kind: SymbolKind::Builtin {
                    arity: func.args.len(),
                },
                range: None,
                used: true,
            });
            if let Some(scope) = resolver.scopes.last_mut() {
                scope.names.insert(func.name.to_string(), (id, true));
            }
        }
        resolver
    }

    pub fn resolve(mut self, source: &Source) -> (Analysis, Vec<Diagnostic>) {
        // Names that failed to parse would show up as undefined
        self.recovering = source.has_errors();
        self.init_scope();

        // Top-level functions are visible to everything in the file
        for item in &source.items {
            if let ItemKind::Function { ident, args, .. } = &item.kind {
                self.declare(ident, SymbolKind::Function { arity: args.len() });
                self.define(&ident.name);
                if ident.name == "main" && !args.is_empty() {
                    self.diagnostics.push(resolution_error(
                        ErrorMsg::MainWithArgs,
                        format!("{} parameters", args.len()),
                        ident.range,
                    ));
                }
            }
        }
        self.resolve_items(&source.items, true);

        self.end_scope();
        trace!(
            "Resolved {} identifiers to {} symbols",
            self.analysis.resolutions.len(),
            self.analysis.symbols.len()
        );
        (self.analysis, self.diagnostics)
    }

    fn resolve_items(&mut self, items: &[Item], top_level: bool) {
        let mut terminated = false;
        let mut warned = false;
        for item in items {
            if terminated && !warned {
                self.diagnostics
                    .push(resolution_warning(ErrorMsg::Unreachable, "", item.range));
                warned = true;
            }
            match &item.kind {
                // Already declared while hoisting
                ItemKind::Function { args, body, .. } if top_level => {
                    self.resolve_function(args, body)
                }
                _ => self.resolve_item(item),
            }
            terminated |= matches!(
                item.kind,
                ItemKind::ReturnStmt(_) | ItemKind::Break | ItemKind::Continue
            );
        }
    }

    fn resolve_item(&mut self, item: &Item) {
        match &item.kind {
            ItemKind::ExprStmt(expr) => {
                self.resolve_expr(expr);
            }
            ItemKind::LetStmt { ident, init } => {
                self.declare(ident, SymbolKind::Variable);
                if let Some(init) = init {
                    self.resolve_expr(init);
                }
                self.define(&ident.name);
            }
            ItemKind::IfStmt {
                condition,
                if_item,
                else_item,
            } => {
                self.resolve_expr(condition);
                self.resolve_item(if_item);
                if let Some(else_item) = else_item {
                    self.resolve_item(else_item);
                }
            }
            ItemKind::WhileStmt { condition, body } => {
                self.resolve_expr(condition);
                self.resolve_loop_body(body);
            }
            ItemKind::ForStmt {
                init,
                condition,
                step,
                body,
            } => {
                self.init_scope();
                if let Some(init) = init {
                    self.resolve_item(init);
                }
                if let Some(condition) = condition {
                    self.resolve_expr(condition);
                }
                if let Some(step) = step {
                    self.resolve_expr(step);
                }
                self.resolve_loop_body(body);
                self.end_scope();
            }
            ItemKind::ReturnStmt(value) => {
                if !self.in_function {
                    self.diagnostics.push(resolution_error(
                        ErrorMsg::ReturnOutsideFunction,
                        "",
                        item.range,
                    ));
                }
                if let Some(value) = value {
                    self.resolve_expr(value);
                }
            }
            ItemKind::Break if self.loops == 0 => self.diagnostics.push(resolution_error(
                ErrorMsg::BreakOutsideLoop,
                "",
                item.range,
            )),
            ItemKind::Continue if self.loops == 0 => self.diagnostics.push(resolution_error(
                ErrorMsg::ContinueOutsideLoop,
                "",
                item.range,
            )),
            ItemKind::Break | ItemKind::Continue => (),
            ItemKind::Block(items) => {
                self.init_scope();
                self.resolve_items(items, false);
                self.end_scope();
            }
            ItemKind::Function { ident, args, body } => {
                self.declare(ident, SymbolKind::Function { arity: args.len() });
                self.define(&ident.name);
                self.resolve_function(args, body);
            }
            ItemKind::Error => (),
        }
    }

    fn resolve_loop_body(&mut self, body: &Item) {
        self.loops += 1;
        self.resolve_item(body);
        self.loops -= 1;
    }

    fn resolve_function(&mut self, args: &[Ident], body: &[Item]) {
        let (in_function, loops) = (self.in_function, self.loops);
        self.in_function = true;
        // Loops outside the function cannot be broken out of from inside it
        self.loops = 0;
        self.init_scope();

        for arg in args {
            let duplicate = self
                .scopes
                .last()
                .is_some_and(|s| s.names.contains_key(&arg.name));
            if duplicate {
                self.diagnostics.push(resolution_error(
                    ErrorMsg::DuplicateParam,
                    format!("`{}`", arg.name),
                    arg.range,
                ));
            } else {
                self.declare(arg, SymbolKind::Parameter);
                self.define(&arg.name);
            }
        }
        self.resolve_items(body, false);

        self.end_scope();
        self.in_function = in_function;
        self.loops = loops;
    }

    /// Resolve `expr` and return its static type, if known.
    fn resolve_expr(&mut self, expr: &Expr) -> StaticType {
        let ty = match &expr.kind {
            ExprKind::Literal(lit) => match lit {
                Literal::Number(_) => StaticType::Number,
                Literal::Str(_) => StaticType::Str,
                Literal::Boolean(_) => StaticType::Boolean,
                Literal::Null => StaticType::Null,
            },
            ExprKind::Ident(ident) => self.resolve_ident(ident),
            ExprKind::List(elements) => {
                for element in elements {
                    self.resolve_expr(element);
                }
                StaticType::List
            }
            ExprKind::Assignment { name, value } => {
                let ty = self.resolve_expr(value);
                self.resolve_assignment(name);
                ty
            }
            ExprKind::IndexSet {
                object,
                index,
                value,
            } => {
                let object_ty = self.resolve_expr(object);
                self.expect(object_ty, &[StaticType::List], ErrorMsg::ExpectedList, object.range);
                let index_ty = self.resolve_expr(index);
                self.expect(index_ty, &[StaticType::Number], ErrorMsg::ExpectedIndex, index.range);
                self.resolve_expr(value)
            }
            ExprKind::Unary { op, expr: inner } => {
                let ty = self.resolve_expr(inner);
                match op {
                    UnaryOp::Minus => {
                        self.expect(ty, &[StaticType::Number], ErrorMsg::ExpectedNumber, inner.range);
                        StaticType::Number
                    }
                    UnaryOp::Bang => StaticType::Boolean,
                }
            }
            ExprKind::Binary { lhs, op, rhs } => {
                let lhs_ty = self.resolve_expr(lhs);
                let rhs_ty = self.resolve_expr(rhs);
                self.resolve_binary(expr.range, (lhs_ty, lhs.range), *op, (rhs_ty, rhs.range))
            }
            ExprKind::Logical { lhs, rhs, .. } => {
                let lhs_ty = self.resolve_expr(lhs);
                let rhs_ty = self.resolve_expr(rhs);
                if lhs_ty == rhs_ty {
                    lhs_ty
                } else {
                    StaticType::Unknown
                }
            }
            ExprKind::Group(inner) => self.resolve_expr(inner),
            ExprKind::Call { func, args } => {
                let func_ty = self.resolve_expr(func);
                for arg in args {
                    self.resolve_expr(arg);
                }
                if !func_ty.may_be(&[StaticType::Function]) {
                    self.diagnostics.push(resolution_error(
                        ErrorMsg::InvalidCallExpr,
                        format!("a value of type {func_ty}"),
                        func.range,
                    ));
                } else if let ExprKind::Ident(ident) = &func.kind {
                    self.check_arity(ident, args.len(), expr.range);
                }
                StaticType::Unknown
            }
            ExprKind::Index { object, index } => {
                let object_ty = self.resolve_expr(object);
                self.expect(
                    object_ty,
                    &[StaticType::List, StaticType::Str],
                    ErrorMsg::ExpectedListOrStr,
                    object.range,
                );
                let index_ty = self.resolve_expr(index);
                self.expect(index_ty, &[StaticType::Number], ErrorMsg::ExpectedIndex, index.range);
                if object_ty == StaticType::Str {
                    StaticType::Str
                } else {
                    StaticType::Unknown
                }
            }
        };
        if ty.is_known() {
            self.analysis.types.insert(expr.range, ty);
        }
        ty
    }

    fn resolve_binary(
        &mut self,
        range: TextRange,
        (lhs, lhs_range): (StaticType, TextRange),
        op: BinOp,
        (rhs, rhs_range): (StaticType, TextRange),
    ) -> StaticType {
        use StaticType::{Number, Str, Unknown};
        match op {
            BinOp::Plus => match (lhs, rhs) {
                (Number, Number) => Number,
                (Str, Str) => Str,
                (Unknown, Unknown) => Unknown,
                (Unknown, ty) | (ty, Unknown) => {
                    let at = if lhs == Unknown { rhs_range } else { lhs_range };
                    self.expect(ty, &[Number, Str], ErrorMsg::ExpectedNumOrStr, at);
                    Unknown
                }
                _ => {
                    self.diagnostics.push(resolution_error(
                        ErrorMsg::ExpectedNumOrStr,
                        format!("{lhs} and {rhs}"),
                        range,
                    ));
                    Unknown
                }
            },
            BinOp::Minus | BinOp::Star | BinOp::Slash | BinOp::Modulo => {
                self.expect(lhs, &[Number], ErrorMsg::ExpectedNumber, lhs_range);
                self.expect(rhs, &[Number], ErrorMsg::ExpectedNumber, rhs_range);
                Number
            }
            BinOp::Greater | BinOp::GreaterEqual | BinOp::Less | BinOp::LessEqual => {
                self.expect(lhs, &[Number], ErrorMsg::ExpectedNumber, lhs_range);
                self.expect(rhs, &[Number], ErrorMsg::ExpectedNumber, rhs_range);
                StaticType::Boolean
            }
            BinOp::EqualEqual | BinOp::BangEqual => StaticType::Boolean,
        }
    }

    fn expect(&mut self, ty: StaticType, expected: &[StaticType], msg: ErrorMsg, range: TextRange) {
        if !ty.may_be(expected) {
            self.diagnostics.push(resolution_error(msg, ty, range));
        }
    }

    fn check_arity(&mut self, ident: &Ident, found: usize, range: TextRange) {
        let Some(arity) = self
            .analysis
            .symbol_at(ident.range)
            .and_then(|s| s.kind.arity())
        else {
            return;
        };
        let msg = match found.cmp(&arity) {
            std::cmp::Ordering::Less => ErrorMsg::TooFewArgs,
            std::cmp::Ordering::Greater => ErrorMsg::TooManyArgs,
            std::cmp::Ordering::Equal => return,
        };
        self.diagnostics.push(resolution_error(
            msg,
            format!("`{}` expects {arity}, found {found}", ident.name),
            range,
        ));
    }

    fn resolve_ident(&mut self, ident: &Ident) -> StaticType {
        let uninitialised = self
            .scopes
            .last()
            .and_then(|s| s.names.get(&ident.name))
            .is_some_and(|&(_, defined)| !defined);
        if uninitialised {
            self.diagnostics.push(resolution_error(
                ErrorMsg::SelfInitialiser,
                format!("`{}`", ident.name),
                ident.range,
            ));
            return StaticType::Unknown;
        }

        match self.resolve_variable(ident, true) {
            Some(id) => match self.analysis.symbols.get(id).kind {
                SymbolKind::Function { .. } | SymbolKind::Builtin { .. } => StaticType::Function,
                SymbolKind::Variable | SymbolKind::Parameter => StaticType::Unknown,
            },
            None => StaticType::Unknown,
        }
    }

    fn resolve_assignment(&mut self, ident: &Ident) {
        let Some(id) = self.resolve_variable(ident, false) else {
            return;
        };
        if self.analysis.symbols.get(id).kind.arity().is_some() {
            self.diagnostics.push(resolution_error(
                ErrorMsg::AssignToFunction,
                format!("`{}`", ident.name),
                ident.range,
            ));
        }
    }

    fn resolve_variable(&mut self, ident: &Ident, used: bool) -> Option<SymbolId> {
        let found = self
            .scopes
            .iter()
            .rev()
            .enumerate()
            .find_map(|(depth, s)| s.names.get(&ident.name).map(|&(id, _)| (id, depth)));
        match found {
            Some((symbol, depth)) => {
                self.analysis
                    .resolutions
                    .insert(ident.range, Resolution { symbol, depth });
                if used {
                    self.analysis.symbols.get_mut(symbol).used = true;
                }
                Some(symbol)
            }
            None => {
                if !self.recovering {
                    self.diagnostics.push(resolution_error(
                        ErrorMsg::UndefinedVar,
                        format!("`{}`", ident.name),
                        ident.range,
                    ));
                }
                None
            }
        }
    }

    fn init_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    fn end_scope(&mut self) {
        // The prelude and global scopes never warn about unused names
        let is_local = self.scopes.len() > 2;
        let Some(scope) = self.scopes.pop() else {
            return;
        };
        if !is_local {
            return;
        }
        for id in scope.order {
            let symbol = self.analysis.symbols.get(id);
            if symbol.kind == SymbolKind::Variable && !symbol.used && !symbol.name.starts_with('_')
            {
                if let Some(range) = symbol.range {
                    self.diagnostics.push(resolution_warning(
                        ErrorMsg::UnusedVar,
                        format!("`{}`", symbol.name),
                        range,
                    ));
                }
            }
        }
    }

    fn declare(&mut self, ident: &Ident, kind: SymbolKind) {
        let id = self.analysis.symbols.push(Symbol {
            name: ident.name.clone(),
            kind,
            range: Some(ident.range),
            used: false,
        });
        let Some(scope) = self.scopes.last_mut() else {
            return;
        };
        if scope.names.contains_key(&ident.name) {
            self.diagnostics.push(resolution_error(
                ErrorMsg::DuplicateDecl,
                format!("`{}`", ident.name),
                ident.range,
            ));
            return;
        }
        scope.names.insert(ident.name.clone(), (id, false));
        scope.order.push(id);
    }

    fn define(&mut self, name: &str) {
        if let Some((_, defined)) = self.scopes.last_mut().and_then(|s| s.names.get_mut(name)) {
            *defined = true;
        }
    }
}
