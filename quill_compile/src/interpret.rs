use std::{cell::RefCell, cmp::Ordering, mem, rc::Rc};

use log::{debug, trace};
use quill_syntax::ast::{
    BinOp, Expr, ExprKind, Ident, Item, ItemKind, Literal, LogicalOp, Source, UnaryOp,
};

use crate::{
    environment::Env,
    error::{at, runtime_error, ErrorMsg, Exception, Fault, RuntimeError},
    limits::Limits,
    stdlib,
    symbol::Analysis,
    types::{Callable, Func, List, Value},
};

// Copying this many bytes costs one step
const BYTES_PER_STEP: usize = 64;

/// Tree-walking interpreter for a resolved program.
#[derive(Debug)]
pub struct Interpreter {
    env: Rc<RefCell<Env>>,
    globals: Rc<RefCell<Env>>,
    analysis: Analysis,
    limits: Limits,
    steps: u64,
    call_depth: usize,
    nesting: usize,
    stdout: String,
}

impl Interpreter {
    pub fn new(analysis: Analysis, limits: Limits) -> Self {
        let globals = Env::with_parent(Env::prelude());
        Self {
            env: Rc::clone(&globals),
            globals,
            analysis,
            limits,
            steps: 0,
            call_depth: 0,
            nesting: 0,
            stdout: String::new(),
        }
    }

    /// Run the top-level statements, then `main` if the program declares
    /// one. Returns the exit code the program asked for.
    pub fn run(&mut self, source: &Source) -> Result<i32, RuntimeError> {
        match self.run_items(source) {
            Ok(code) | Err(Exception::Exit(code)) => {
                debug!("Program exited with code {code} after {} steps", self.steps);
                Ok(code)
            }
            Err(Exception::Error(e)) => {
                debug!("Program failed after {} steps: {e}", self.steps);
                Err(e)
            }
            Err(other) => Err(RuntimeError {
                fault: Fault::Internal,
                message: format!("`{other}` escaped to the top level"),
                range: None,
            }),
        }
    }

    fn run_items(&mut self, source: &Source) -> Result<i32, Exception> {
        let mut main_range = None;
        for item in &source.items {
            if let ItemKind::Function { ident, args, body } = &item.kind {
                self.define_function(ident, args, body);
                if ident.name == "main" {
                    main_range = Some(ident.range);
                }
            }
        }
        for item in &source.items {
            if !matches!(item.kind, ItemKind::Function { .. }) {
                self.interpret_item(item)?;
            }
        }
        let Some(range) = main_range else {
            return Ok(0);
        };
        let main = self.globals.borrow().get_local("main");
        match main {
            Some(Value::Func(main)) => {
                trace!("Calling main");
                self.tick()?;
                let value = self.call_func(main, vec![])?;
                stdlib::exit_code(&value).map_err(|e| at(e, range))
            }
            _ => Ok(0),
        }
    }

    pub fn take_stdout(&mut self) -> String {
        mem::take(&mut self.stdout)
    }

    /// Append `value` and a newline to the captured output.
    pub(crate) fn write_stdout(&mut self, value: &Value) -> Result<(), Exception> {
        let room = self.limits.max_output_len.saturating_sub(self.stdout.len());
        let text = match value.render(room) {
            Some(text) if text.len() < room => text,
            _ => {
                return Err(runtime_error(
                    ErrorMsg::OutputTooLarge,
                    format!("{} bytes", self.limits.max_output_len),
                ))
            }
        };
        self.charge(text.len())?;
        self.stdout.push_str(&text);
        self.stdout.push('\n');
        Ok(())
    }

    /// Render `value` as a string value, as `str` and `panic` do.
    pub(crate) fn render(&mut self, value: &Value) -> Result<String, Exception> {
        let text = value
            .render(self.limits.max_value_len)
            .ok_or_else(|| self.too_large())?;
        self.charge(text.len())?;
        Ok(text)
    }

    pub(crate) fn check_len(&self, len: usize) -> Result<(), Exception> {
        if len > self.limits.max_value_len {
            return Err(self.too_large());
        }
        Ok(())
    }

    fn too_large(&self) -> Exception {
        runtime_error(
            ErrorMsg::ValueTooLarge,
            format!("{} elements", self.limits.max_value_len),
        )
    }

    /// Count one unit of work against the step budget.
    fn tick(&mut self) -> Result<(), Exception> {
        self.spend(1)
    }

    /// Count work proportional to `bytes` copied or scanned.
    pub(crate) fn charge(&mut self, bytes: usize) -> Result<(), Exception> {
        self.spend((bytes / BYTES_PER_STEP) as u64)
    }

    fn spend(&mut self, steps: u64) -> Result<(), Exception> {
        self.steps = self.steps.saturating_add(steps);
        if self.steps > self.limits.max_steps {
            return Err(runtime_error(
                ErrorMsg::StepLimit,
                format!("{} steps", self.limits.max_steps),
            ));
        }
        Ok(())
    }

    /// Track evaluation depth so deep recursion ends in a fault instead of
    /// overflowing the host stack.
    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, Exception>,
    ) -> Result<T, Exception> {
        if self.nesting >= self.limits.max_nesting {
            return Err(runtime_error(
                ErrorMsg::NestingTooDeep,
                format!("{} levels", self.limits.max_nesting),
            ));
        }
        self.nesting += 1;
        let result = f(self);
        self.nesting -= 1;
        result
    }

    /// Run `f` with `env` as the active env, restoring the old one after.
    fn with_env<T>(
        &mut self,
        env: Rc<RefCell<Env>>,
        f: impl FnOnce(&mut Self) -> Result<T, Exception>,
    ) -> Result<T, Exception> {
        let old = mem::replace(&mut self.env, env);
        let result = f(self);
        self.env = old;
        result
    }

    fn interpret_all(&mut self, items: &[Item]) -> Result<(), Exception> {
        for item in items {
            self.interpret_item(item)?;
        }
        Ok(())
    }

    fn interpret_item(&mut self, item: &Item) -> Result<(), Exception> {
        self.nested(|this| this.interpret_stmt(item))
            .map_err(|e| at(e, item.range))
    }

    fn interpret_stmt(&mut self, item: &Item) -> Result<(), Exception> {
        match &item.kind {
            ItemKind::ExprStmt(expr) => {
                self.interpret_expr(expr)?;
                Ok(())
            }
            ItemKind::LetStmt { ident, init } => {
                let value = match init {
                    Some(expr) => self.interpret_expr(expr)?,
                    None => Value::Null,
                };
                self.env.borrow_mut().set(&ident.name, value);
                Ok(())
            }
            ItemKind::IfStmt {
                condition,
                if_item,
                else_item,
            } => {
                if self.interpret_expr(condition)?.is_truthy() {
                    self.interpret_item(if_item)
                } else if let Some(else_item) = else_item {
                    self.interpret_item(else_item)
                } else {
                    Ok(())
                }
            }
            ItemKind::WhileStmt { condition, body } => {
                loop {
                    self.tick()?;
                    if !self.interpret_expr(condition)?.is_truthy() {
                        break;
                    }
                    match self.interpret_item(body) {
                        Ok(()) | Err(Exception::Continue) => (),
                        Err(Exception::Break) => break,
                        Err(e) => return Err(e),
                    }
                }
                Ok(())
            }
            ItemKind::ForStmt {
                init,
                condition,
                step,
                body,
            } => {
                let env = Env::with_parent(Rc::clone(&self.env));
                self.with_env(env, |this| {
                    this.interpret_for_stmt(init.as_deref(), condition.as_ref(), step.as_ref(), body)
                })
            }
            ItemKind::ReturnStmt(value) => {
                let value = match value {
                    Some(expr) => self.interpret_expr(expr)?,
                    None => Value::Null,
                };
                Err(Exception::Return(value))
            }
            ItemKind::Break => Err(Exception::Break),
            ItemKind::Continue => Err(Exception::Continue),
            ItemKind::Block(items) => {
                let env = Env::with_parent(Rc::clone(&self.env));
                self.with_env(env, |this| this.interpret_all(items))
            }
            ItemKind::Function { ident, args, body } => {
                self.define_function(ident, args, body);
                Ok(())
            }
            ItemKind::Error => Err(runtime_error(ErrorMsg::InvalidItem, "")),
        }
    }

    fn interpret_for_stmt(
        &mut self,
        init: Option<&Item>,
        condition: Option<&Expr>,
        step: Option<&Expr>,
        body: &Item,
    ) -> Result<(), Exception> {
        if let Some(init) = init {
            self.interpret_item(init)?;
        }
        loop {
            self.tick()?;
            if let Some(condition) = condition {
                if !self.interpret_expr(condition)?.is_truthy() {
                    break;
                }
            }
            match self.interpret_item(body) {
                Ok(()) | Err(Exception::Continue) => (),
                Err(Exception::Break) => break,
                Err(e) => return Err(e),
            }
            if let Some(step) = step {
                self.interpret_expr(step)?;
            }
        }
        Ok(())
    }

    fn define_function(&mut self, ident: &Ident, args: &[Ident], body: &[Item]) {
        let func = Func {
            name: ident.name.clone(),
            args: args.iter().map(|a| a.name.clone()).collect(),
            body: Rc::new(body.to_vec()),
            env: Rc::clone(&self.env),
        };
        self.env
            .borrow_mut()
            .set(&ident.name, Value::Func(Rc::new(func)));
    }

    fn interpret_expr(&mut self, expr: &Expr) -> Result<Value, Exception> {
        self.nested(|this| {
            this.tick()?;
            this.eval_expr(expr)
        })
        .map_err(|e| at(e, expr.range))
    }

    fn eval_expr(&mut self, expr: &Expr) -> Result<Value, Exception> {
        match &expr.kind {
            ExprKind::Literal(lit) => self.interpret_literal(lit),
            ExprKind::Ident(ident) => self.lookup(ident),
            ExprKind::List(elements) => {
                self.check_len(elements.len())?;
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(self.interpret_expr(element)?);
                }
                Ok(Value::List(List::new(values)))
            }
            ExprKind::Assignment { name, value } => {
                let value = self.interpret_expr(value)?;
                let depth = self.depth(name)?;
                self.env
                    .borrow_mut()
                    .assign_at_depth(&name.name, value.clone(), depth)?;
                Ok(value)
            }
            ExprKind::IndexSet {
                object,
                index,
                value,
            } => {
                let object = self.interpret_expr(object)?;
                let index = self.interpret_expr(index)?;
                let value = self.interpret_expr(value)?;
                let Value::List(list) = object else {
                    return Err(runtime_error(ErrorMsg::ExpectedList, object.describe()));
                };
                let i = self.to_index(&index, list.len())?;
                list.set(i, value.clone());
                Ok(value)
            }
            ExprKind::Unary { op, expr } => {
                let value = self.interpret_expr(expr)?;
                match op {
                    UnaryOp::Minus => match value {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        _ => Err(runtime_error(ErrorMsg::ExpectedNumber, value.describe())),
                    },
                    UnaryOp::Bang => Ok(Value::Boolean(!value.is_truthy())),
                }
            }
            ExprKind::Binary { lhs, op, rhs } => self.interpret_binary(lhs, *op, rhs),
            ExprKind::Logical { lhs, op, rhs } => {
                let left = self.interpret_expr(lhs)?;
                match (op, left.is_truthy()) {
                    (LogicalOp::Or, true) | (LogicalOp::And, false) => Ok(left),
                    _ => self.interpret_expr(rhs),
                }
            }
            ExprKind::Group(inner) => self.interpret_expr(inner),
            ExprKind::Call { func, args } => self.interpret_func_call(func, args),
            ExprKind::Index { object, index } => {
                let object = self.interpret_expr(object)?;
                let index = self.interpret_expr(index)?;
                match &object {
                    Value::List(list) => {
                        let i = self.to_index(&index, list.len())?;
                        list.get(i)
                            .ok_or_else(|| runtime_error(ErrorMsg::IndexOutOfRange, i))
                    }
                    Value::Str(s) => {
                        self.charge(s.len())?;
                        let i = self.to_index(&index, s.chars().count())?;
                        Ok(Value::Str(s.chars().skip(i).take(1).collect::<String>().into()))
                    }
                    _ => Err(runtime_error(ErrorMsg::ExpectedListOrStr, object.describe())),
                }
            }
        }
    }

    fn interpret_literal(&mut self, lit: &Literal) -> Result<Value, Exception> {
        Ok(match lit {
            Literal::Number(n) => Value::Number(*n),
            Literal::Str(s) => {
                self.check_len(s.len())?;
                self.charge(s.len())?;
                Value::Str(s.as_str().into())
            }
            Literal::Boolean(b) => Value::Boolean(*b),
            Literal::Null => Value::Null,
        })
    }

    fn depth(&self, ident: &Ident) -> Result<usize, Exception> {
        self.analysis
            .depth(ident.range)
            .ok_or_else(|| runtime_error(ErrorMsg::MisresolvedVar, &ident.name))
    }

    fn lookup(&self, ident: &Ident) -> Result<Value, Exception> {
        let depth = self.depth(ident)?;
        self.env.borrow().get_at_depth(&ident.name, depth)
    }

    fn to_index(&self, index: &Value, len: usize) -> Result<usize, Exception> {
        let Value::Number(n) = index else {
            return Err(runtime_error(ErrorMsg::ExpectedIndex, index.describe()));
        };
        if n.fract() != 0.0 {
            return Err(runtime_error(ErrorMsg::ExpectedIndex, index.describe()));
        }
        if *n < 0.0 || *n >= len as f64 {
            return Err(runtime_error(
                ErrorMsg::IndexOutOfRange,
                format!("index {n} for length {len}"),
            ));
        }
        Ok(*n as usize)
    }

    fn interpret_binary(&mut self, lhs: &Expr, op: BinOp, rhs: &Expr) -> Result<Value, Exception> {
        let left = self.interpret_expr(lhs)?;
        let right = self.interpret_expr(rhs)?;
        if let (Value::Str(m), Value::Str(n)) = (&left, &right) {
            self.charge(m.len() + n.len())?;
        }

        match op {
            BinOp::EqualEqual => return Ok(Value::Boolean(left.is_eq(&right))),
            BinOp::BangEqual => return Ok(Value::Boolean(!left.is_eq(&right))),
            BinOp::Plus => {
                return match (left, right) {
                    (Value::Number(m), Value::Number(n)) => Ok(Value::Number(m + n)),
                    (Value::Str(m), Value::Str(n)) => {
                        self.check_len(m.len() + n.len())?;
                        let mut joined = String::with_capacity(m.len() + n.len());
                        joined.push_str(&m);
                        joined.push_str(&n);
                        Ok(Value::Str(joined.into()))
                    }
                    (left, right) => Err(runtime_error(
                        ErrorMsg::ExpectedNumOrStr,
                        format!("{} and {}", left.type_name(), right.type_name()),
                    )),
                }
            }
            _ => (),
        }

        // Everything else works on numbers only
        let Value::Number(m) = left else {
            return Err(runtime_error(ErrorMsg::ExpectedNumber, left.describe()));
        };
        let Value::Number(n) = right else {
            return Err(runtime_error(ErrorMsg::ExpectedNumber, right.describe()));
        };
        Ok(match op {
            BinOp::Minus => Value::Number(m - n),
            BinOp::Star => Value::Number(m * n),
            BinOp::Slash | BinOp::Modulo if n == 0.0 => {
                return Err(runtime_error(ErrorMsg::DivisionByZero, ""))
            }
            BinOp::Slash => Value::Number(m / n),
            BinOp::Modulo => Value::Number(m % n),
            BinOp::Greater => Value::Boolean(m > n),
            BinOp::GreaterEqual => Value::Boolean(m >= n),
            BinOp::Less => Value::Boolean(m < n),
            BinOp::LessEqual => Value::Boolean(m <= n),
            BinOp::Plus | BinOp::EqualEqual | BinOp::BangEqual => {
                unreachable!("handled before the numeric operators")
            }
        })
    }

    fn interpret_func_call(&mut self, func: &Expr, arg_exprs: &[Expr]) -> Result<Value, Exception> {
        let callee = self.interpret_expr(func)?;
        let func: &dyn Callable = match &callee {
            Value::Func(f) => f,
            Value::NativeFunc(f) => f,
            _ => {
                return Err(runtime_error(
                    ErrorMsg::InvalidCallExpr,
                    format!("a value of type {}", callee.type_name()),
                ))
            }
        };
        // Ensure the number of arguments matches the function definition
        let msg = match arg_exprs.len().cmp(&func.arity()) {
            Ordering::Less => Some(ErrorMsg::TooFewArgs),
            Ordering::Greater => Some(ErrorMsg::TooManyArgs),
            Ordering::Equal => None,
        };
        if let Some(msg) = msg {
            return Err(runtime_error(
                msg,
                format!(
                    "`{}` expects {}, found {}",
                    func.name(),
                    func.arity(),
                    arg_exprs.len()
                ),
            ));
        }
        let mut args = Vec::with_capacity(arg_exprs.len());
        for arg in arg_exprs {
            args.push(self.interpret_expr(arg)?);
        }

        self.tick()?;
        func.call(self, args)
    }

    pub(crate) fn call_func(&mut self, func: Rc<Func>, args: Vec<Value>) -> Result<Value, Exception> {
        if self.call_depth >= self.limits.max_call_depth {
            return Err(runtime_error(
                ErrorMsg::StackOverflow,
                format!("{} calls", self.limits.max_call_depth),
            ));
        }
        debug!("Call {func}");
        // Parameters and body locals share one env, whose parent is the env
        // the function was declared in
        let env = Env::with_parent(Rc::clone(&func.env));
        for (name, value) in func.args.iter().zip(args) {
            env.borrow_mut().set(name, value);
        }

        self.call_depth += 1;
        let body = Rc::clone(&func.body);
        let result = self.with_env(env, |this| this.interpret_all(&body));
        self.call_depth -= 1;

        match result {
            Ok(()) => Ok(Value::Null),
            Err(Exception::Return(value)) => Ok(value),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::Resolver;
    use quill_syntax::parse_source;

    fn run_with(src: &str, limits: Limits) -> (Result<i32, RuntimeError>, String) {
        let (source, errors) = parse_source(src);
        assert!(errors.is_empty(), "{errors:?}");
        let (analysis, diagnostics) = Resolver::new().resolve(&source);
        assert!(
            diagnostics.iter().all(|d| !d.is_error()),
            "{diagnostics:?}"
        );
        let mut interpreter = Interpreter::new(analysis, limits);
        let result = interpreter.run(&source);
        (result, interpreter.take_stdout())
    }

    fn run_test(src: &str, expected: &str) {
        let (result, stdout) = run_with(src, Limits::default());
        assert_eq!(result, Ok(0));
        assert_eq!(stdout, expected);
    }

    fn fault_test(src: &str, fault: Fault, message: &str) {
        let (result, _) = run_with(src, Limits::default());
        let e = result.unwrap_err();
        assert_eq!(e.fault, fault);
        assert_eq!(e.message, message);
        assert!(e.range.is_some());
    }

    #[test]
    fn arithmetic() {
        run_test(
            "print(1 + 2 * 3); print(\"a\" + \"b\"); print(7 % 3); print(10 / 4); print(-(2));",
            "7\nab\n1\n2.5\n-2\n",
        );
        run_test("print(1 < 2); print(2 <= 1); print(!null);", "true\nfalse\ntrue\n");
    }

    #[test]
    fn let_stmt_and_scopes() {
        run_test(
            "let x = 1; { let x = 2; print(x); } print(x); x = 3; print(x); let y; print(y);",
            "2\n1\n3\nnull\n",
        );
    }

    #[test]
    fn if_stmt() {
        run_test(
            "if (0) print(\"zero is true\"); if (null) print(1); else if (false) print(2); else print(3);",
            "zero is true\n3\n",
        );
    }

    #[test]
    fn loops() {
        run_test(
            "let i = 0; while (true) { i = i + 1; if (i == 2) continue; if (i > 4) break; print(i); }",
            "1\n3\n4\n",
        );
        run_test(
            "let s = 0; for (let i = 0; i < 5; i = i + 1) s = s + i; print(s);",
            "10\n",
        );
        run_test(
            "for (let i = 0; i < 4; i = i + 1) { if (i == 1) continue; print(i); }",
            "0\n2\n3\n",
        );
        run_test("let n = 0; for (;;) { n = n + 1; if (n == 3) break; } print(n);", "3\n");
    }

    #[test]
    fn functions() {
        run_test(
            "fn fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); } print(fib(10));",
            "55\n",
        );
        run_test("fn nothing() {} print(nothing());", "null\n");
        run_test("print(later()); fn later() { return \"hoisted\"; }", "hoisted\n");
        run_test("fn f() { for (;;) { return 1; } } print(f());", "1\n");
    }

    #[test]
    fn closures() {
        run_test(
            "fn make() { let n = 0; fn inc() { n = n + 1; return n; } return inc; } \
             let c = make(); c(); print(c()); let d = make(); print(d());",
            "2\n1\n",
        );
    }

    #[test]
    fn builtins_can_be_shadowed() {
        run_test("fn print(x) { return x; } print(1);", "");
        run_test("{ let len = 3; print(len); }", "3\n");
    }

    #[test]
    fn lists_and_strings() {
        run_test(
            "let xs = [1, 2]; push(xs, 3); xs[0] = 10; print(xs); print(len(xs)); print(xs[2]);",
            "[10, 2, 3]\n3\n3\n",
        );
        run_test(
            "print(\"abc\"[1]); print(len(\"héllo\")); print([\"a\", [true]]); print(str(1.5) + \"!\");",
            "b\n5\n[\"a\", [true]]\n1.5!\n",
        );
        // Lists are shared, not copied
        run_test("let a = [1]; let b = a; push(b, 2); print(a);", "[1, 2]\n");
    }

    #[test]
    fn logical_and_equality() {
        run_test(
            "print(null or \"x\"); print(1 and 2); print(false and panic(\"no\"));",
            "x\n2\nfalse\n",
        );
        run_test(
            "print(1 == 1); print(\"a\" != \"a\"); print(null == false); print([1] == [1]);",
            "true\nfalse\nfalse\nfalse\n",
        );
    }

    #[test]
    fn exit_codes() {
        let (result, stdout) = run_with(
            "print(1); fn main() { print(\"hi\"); return 3; }",
            Limits::default(),
        );
        assert_eq!(result, Ok(3));
        assert_eq!(stdout, "1\nhi\n");

        let (result, stdout) = run_with("print(1); exit(4); print(2);", Limits::default());
        assert_eq!(result, Ok(4));
        assert_eq!(stdout, "1\n");

        let (result, _) = run_with("fn main() { exit(0); }", Limits::default());
        assert_eq!(result, Ok(0));

        fault_test(
            "fn main() { return \"done\"; }",
            Fault::Type,
            "exit code must be an integer, found string \"done\"",
        );
    }

    #[test]
    fn runtime_faults() {
        fault_test(
            "let x = \"a\"; print(x - 1);",
            Fault::Type,
            "expected number operand, found string \"a\"",
        );
        fault_test("let z = 0; print(1 / z);", Fault::DivisionByZero, "division by zero");
        fault_test("let z = 0; print(1 % z);", Fault::DivisionByZero, "division by zero");
        fault_test(
            "let xs = [1]; xs[1];",
            Fault::IndexOutOfRange,
            "index out of range: index 1 for length 1",
        );
        fault_test(
            "let i = 0.5; [1][i];",
            Fault::Type,
            "expected a non-negative integer index, found number 0.5",
        );
        fault_test("panic(\"boom\");", Fault::Panic, "program panicked: boom");
        fault_test(
            "fn f(a) {} let g = f; g();",
            Fault::Type,
            "too few arguments in function call: `f` expects 1, found 0",
        );
        fault_test("let x = 1; x();", Fault::Type, "cannot call a value of type number");
        fault_test(
            "let x = 1; x = x + \"s\";",
            Fault::Type,
            "expected both operands to be numbers or strings, found number and string",
        );
    }

    #[test]
    fn output_is_kept_on_fault() {
        let (result, stdout) = run_with("print(1); panic(\"x\"); print(2);", Limits::default());
        assert!(result.is_err());
        assert_eq!(stdout, "1\n");
    }

    #[test]
    fn step_limit() {
        let limits = Limits {
            max_steps: 100,
            ..Default::default()
        };
        let (result, _) = run_with("while (true) {}", limits.clone());
        let e = result.unwrap_err();
        assert_eq!(e.fault, Fault::Resource);
        assert_eq!(e.message, "step budget exhausted after 100 steps");

        // Fewer steps than the call depth limit
        let limits = Limits {
            max_steps: 10,
            ..Default::default()
        };
        let (result, _) = run_with("fn f() { return f(); } f();", limits);
        assert_eq!(result.unwrap_err().fault, Fault::Resource);
    }

    #[test]
    fn deep_recursion_is_a_fault() {
        let (result, _) = run_with(
            "fn f(n) { return f(n + 1); } f(0);",
            Limits::default(),
        );
        assert_eq!(result.unwrap_err().fault, Fault::StackOverflow);

        let limits = Limits {
            max_nesting: 10,
            ..Default::default()
        };
        let (result, _) = run_with("print(((((((((((1)))))))))));", limits);
        let e = result.unwrap_err();
        assert_eq!(e.fault, Fault::StackOverflow);
        assert_eq!(e.message, "maximum evaluation depth exceeded: 10 levels");
    }

    #[test]
    fn value_and_output_limits() {
        let limits = Limits {
            max_value_len: 4,
            ..Default::default()
        };
        let (result, _) = run_with("let xs = []; while (true) push(xs, 1);", limits.clone());
        assert_eq!(result.unwrap_err().fault, Fault::Resource);
        let (result, _) = run_with("let s = \"ab\"; s = s + s + s;", limits);
        assert_eq!(result.unwrap_err().fault, Fault::Resource);

        let limits = Limits {
            max_output_len: 10,
            ..Default::default()
        };
        let (result, stdout) = run_with("while (true) print(\"hello\");", limits);
        assert_eq!(result.unwrap_err().fault, Fault::Resource);
        assert_eq!(stdout, "hello\n");
    }

    #[test]
    fn deeply_nested_lists() {
        run_test(
            "let xs = []; for (let i = 0; i < 50000; i = i + 1) xs = [xs]; print(len(xs));",
            "1\n",
        );
    }

    #[test]
    fn shared_lists_are_rendered_within_limits() {
        let (result, stdout) = run_with(
            "let a = []; push(a, a); push(a, a); print(\"start\"); print(a);",
            Limits::default(),
        );
        let e = result.unwrap_err();
        assert_eq!(e.fault, Fault::Resource);
        assert!(e.message.starts_with("output exceeds"), "{}", e.message);
        assert_eq!(stdout, "start\n");

        for src in [
            "let a = []; push(a, a); push(a, a); str(a);",
            "let a = []; push(a, a); push(a, a); panic(a);",
        ] {
            let (result, _) = run_with(src, Limits::default());
            let e = result.unwrap_err();
            assert_eq!(e.fault, Fault::Resource, "{src}");
            assert!(e.message.starts_with("value exceeds"), "{}", e.message);
        }
    }

    #[test]
    fn expressions_cost_steps() {
        let limits = Limits {
            max_steps: 5,
            ..Default::default()
        };
        let (result, _) = run_with("print(1 + 2 + 3 + 4);", limits);
        assert_eq!(result.unwrap_err().fault, Fault::Resource);
    }

    #[test]
    fn copying_strings_costs_steps() {
        let (result, _) = run_with(
            "let h = \"a\"; for (let i = 0; i < 19; i = i + 1) h = h + h; \
             for (let i = 0; i < 2000; i = i + 1) { let _t = h + h; }",
            Limits::default(),
        );
        let e = result.unwrap_err();
        assert_eq!(e.fault, Fault::Resource);
        assert!(e.message.starts_with("step budget exhausted"), "{}", e.message);
    }
}
