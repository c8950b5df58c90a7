use std::{
    cell::RefCell,
    fmt::{self, Debug, Display, Write as _},
    rc::Rc,
};

use quill_syntax::ast::Item;

use crate::{environment::Env, error::Exception, interpret::Interpreter};

// Nested lists deeper than this are elided when printed
const MAX_DISPLAY_DEPTH: usize = 32;

#[derive(Clone)]
pub enum Value {
    Boolean(bool),
    Number(f64),
    Str(Rc<str>),
    List(Rc<List>),
    Func(Rc<Func>),
    NativeFunc(NativeFunc),
    Null,
}

impl Value {
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Boolean(b) => *b,
            _ => true,
        }
    }

    /// Equality as seen by `==`. Values of different types are never equal,
    /// and lists and functions compare by identity.
    pub fn is_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Boolean(m), Self::Boolean(n)) => m == n,
            (Self::Number(m), Self::Number(n)) => m == n,
            (Self::Str(m), Self::Str(n)) => m == n,
            (Self::List(m), Self::List(n)) => Rc::ptr_eq(m, n),
            (Self::Func(m), Self::Func(n)) => Rc::ptr_eq(m, n),
            (Self::NativeFunc(m), Self::NativeFunc(n)) => m.name == n.name,
            (Self::Null, Self::Null) => true,
            _ => false,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "boolean",
            Self::Number(_) => "number",
            Self::Str(_) => "string",
            Self::List(_) => "list",
            Self::Func(_) | Self::NativeFunc(_) => "function",
            Self::Null => "null",
        }
    }

    /// Short description used in error messages, e.g. `string "a"`.
    pub fn describe(&self) -> String {
        match self {
            Self::Str(s) => format!("string {s:?}"),
            Self::List(_) | Self::Func(_) | Self::NativeFunc(_) | Self::Null => {
                self.type_name().to_string()
            }
            _ => format!("{} {self}", self.type_name()),
        }
    }

    /// The text `print` shows for this value, or `None` if it would be
    /// longer than `limit` bytes. Lists that share or contain themselves
    /// expand every path, so rendering stops as soon as it passes `limit`.
    pub fn render(&self, limit: usize) -> Option<String> {
        let mut out = Bounded {
            text: String::new(),
            limit,
        };
        write!(out, "{self}").ok()?;
        Some(out.text)
    }

    fn write(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        match self {
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Str(s) => f.write_str(s),
            Self::List(list) => list.write(f, depth),
            Self::Func(func) => write!(f, "{func}"),
            Self::NativeFunc(func) => write!(f, "{func}"),
            Self::Null => f.write_str("null"),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write(f, 0)
    }
}

// Lists may contain themselves, so never recurse through them unbounded
impl Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "Str({s:?})"),
            Self::List(list) => write!(f, "List(len={})", list.len()),
            _ => write!(f, "{}({self})", self.type_name()),
        }
    }
}

struct Bounded {
    text: String,
    limit: usize,
}

impl fmt::Write for Bounded {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if self.text.len() + s.len() > self.limit {
            return Err(fmt::Error);
        }
        self.text.push_str(s);
        Ok(())
    }
}

/// Shared, mutable list storage.
#[derive(Default)]
pub struct List {
    items: RefCell<Vec<Value>>,
}

impl List {
    pub fn new(items: Vec<Value>) -> Rc<Self> {
        Rc::new(Self {
            items: RefCell::new(items),
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.items.borrow().get(index).cloned()
    }

    /// Returns false if `index` is out of range.
    pub fn set(&self, index: usize, value: Value) -> bool {
        match self.items.borrow_mut().get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn push(&self, value: Value) {
        self.items.borrow_mut().push(value);
    }

    fn write(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        if depth >= MAX_DISPLAY_DEPTH {
            return f.write_str("[...]");
        }
        f.write_str("[")?;
        for (i, item) in self.items.borrow().iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match item {
                Value::Str(s) => write!(f, "{s:?}")?,
                _ => item.write(f, depth + 1)?,
            }
        }
        f.write_str("]")
    }
}

// Dropping a deeply nested list must not recurse once per level
impl Drop for List {
    fn drop(&mut self) {
        let mut pending = std::mem::take(self.items.get_mut());
        while let Some(value) = pending.pop() {
            if let Value::List(list) = value {
                if let Ok(mut list) = Rc::try_unwrap(list) {
                    pending.append(list.items.get_mut());
                }
            }
        }
    }
}

pub trait Callable {
    fn name(&self) -> &str;
    fn arity(&self) -> usize;
    fn call(&self, interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, Exception>;
}

pub struct Func {
    pub name: String,
    pub args: Vec<String>,
    pub body: Rc<Vec<Item>>,
    pub env: Rc<RefCell<Env>>,
}

impl Display for Func {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn {}({})", self.name, self.args.join(", "))
    }
}

impl Debug for Func {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Func")
            .field("name", &self.name)
            .field("args", &self.args)
            .finish()
    }
}

impl Callable for Rc<Func> {
    fn name(&self) -> &str {
        &self.name
    }
    fn arity(&self) -> usize {
        self.args.len()
    }
    fn call(&self, interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, Exception> {
        interpreter.call_func(Rc::clone(self), args)
    }
}

#[derive(Clone)]
pub struct NativeFunc {
    pub name: &'static str,
    pub args: &'static [&'static str],
    pub body: fn(&mut Interpreter, Vec<Value>) -> Result<Value, Exception>,
}

impl Debug for NativeFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunc")
            .field("name", &self.name)
            .field("args", &self.args)
            .finish()
    }
}

impl Display for NativeFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "native fn {}({})", self.name, self.args.join(", "))
    }
}

impl Callable for NativeFunc {
    fn name(&self) -> &str {
        self.name
    }
    fn arity(&self) -> usize {
        self.args.len()
    }
    fn call(&self, interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, Exception> {
        (self.body)(interpreter, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(Value::Number(3.0).to_string(), "3");
        assert_eq!(Value::Number(-0.5).to_string(), "-0.5");
        assert_eq!(Value::Str("a b".into()).to_string(), "a b");
        assert_eq!(Value::Null.to_string(), "null");
        let list = Value::List(List::new(vec![
            Value::Number(1.0),
            Value::Str("x".into()),
            Value::List(List::new(vec![])),
            Value::Boolean(false),
        ]));
        assert_eq!(list.to_string(), "[1, \"x\", [], false]");
    }

    #[test]
    fn self_containing_list_display_terminates() {
        let list = List::new(vec![]);
        list.push(Value::List(Rc::clone(&list)));
        let shown = Value::List(Rc::clone(&list)).to_string();
        assert!(shown.ends_with("[...]]]"));
        // Break the cycle so the test does not leak
        list.set(0, Value::Null);
    }

    #[test]
    fn render_stops_at_the_limit() {
        let list = List::new(vec![Value::Number(1.0), Value::Str("x".into())]);
        let value = Value::List(Rc::clone(&list));
        assert_eq!(value.render(8).as_deref(), Some("[1, \"x\"]"));
        assert_eq!(value.render(7), None);

        // Two references to itself double the text at every level
        list.push(value.clone());
        list.push(value.clone());
        assert_eq!(value.render(1 << 20), None);
        list.set(2, Value::Null);
        list.set(3, Value::Null);
    }

    #[test]
    fn deep_list_drops_without_overflow() {
        let mut value = Value::List(List::new(vec![]));
        for _ in 0..200_000 {
            value = Value::List(List::new(vec![value]));
        }
        drop(value);
    }

    #[test]
    fn equality() {
        let xs = List::new(vec![Value::Number(1.0)]);
        let ys = List::new(vec![Value::Number(1.0)]);
        assert!(Value::List(Rc::clone(&xs)).is_eq(&Value::List(Rc::clone(&xs))));
        assert!(!Value::List(xs).is_eq(&Value::List(ys)));
        assert!(Value::Number(1.0).is_eq(&Value::Number(1.0)));
        assert!(!Value::Number(1.0).is_eq(&Value::Boolean(true)));
        assert!(!Value::Str("1".into()).is_eq(&Value::Number(1.0)));
        assert!(Value::Null.is_eq(&Value::Null));
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Boolean(false).is_truthy());
        assert!(Value::Number(0.0).is_truthy());
        assert!(Value::Str("".into()).is_truthy());
    }

    #[test]
    fn describe() {
        assert_eq!(Value::Str("a".into()).describe(), "string \"a\"");
        assert_eq!(Value::Number(2.0).describe(), "number 2");
        assert_eq!(Value::Boolean(true).describe(), "boolean true");
        assert_eq!(Value::Null.describe(), "null");
    }
}
