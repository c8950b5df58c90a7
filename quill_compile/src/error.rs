use std::fmt::Display;

use quill_syntax::{
    diagnostic::{Diagnostic, Stage},
    token::TextRange,
};

use crate::{report::exit_code, types::Value};

/// Non-local control flow out of the interpreter. Only `Error` is a real
/// failure; the other variants unwind to the construct that handles them.
#[derive(Debug)]
pub enum Exception {
    Error(RuntimeError),
    Return(Value),
    Break,
    Continue,
    Exit(i32),
}

impl Display for Exception {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error(e) => e.fmt(f),
            Self::Return(val) => write!(f, "return {}", val.describe()),
            Self::Break => f.write_str("break"),
            Self::Continue => f.write_str("continue"),
            Self::Exit(code) => write!(f, "exit {code}"),
        }
    }
}

/// Category of a runtime failure, each with its own exit code.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Fault {
    Type,
    DivisionByZero,
    IndexOutOfRange,
    StackOverflow,
    Panic,
    Resource,
    Internal,
}

impl Fault {
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Type => exit_code::TYPE_ERROR,
            Self::DivisionByZero => exit_code::DIVISION_BY_ZERO,
            Self::IndexOutOfRange => exit_code::INDEX_OUT_OF_RANGE,
            Self::StackOverflow => exit_code::STACK_OVERFLOW,
            Self::Panic => exit_code::PANIC,
            Self::Resource => exit_code::RESOURCE_EXHAUSTED,
            Self::Internal => exit_code::INTERNAL_ERROR,
        }
    }

    pub fn stage(self) -> Stage {
        match self {
            Self::Resource => Stage::Resource,
            Self::Internal => Stage::Internal,
            _ => Stage::Runtime,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RuntimeError {
    pub fault: Fault,
    pub message: String,
    pub range: Option<TextRange>,
}

impl RuntimeError {
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diagnostic = Diagnostic::error(self.fault.stage(), self.message.clone());
        match self.range {
            Some(range) => diagnostic.with_range(range),
            None => diagnostic,
        }
    }
}

impl Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Debug)]
pub enum ErrorMsg {
    // Resolution errors
    UndefinedVar,
    DuplicateDecl,
    DuplicateParam,
    SelfInitialiser,
    ReturnOutsideFunction,
    BreakOutsideLoop,
    ContinueOutsideLoop,
    AssignToFunction,
    MainWithArgs,
    // Resolution warnings
    UnusedVar,
    Unreachable,
    // Type errors, raised statically when possible
    ExpectedNumber,
    ExpectedNumOrStr,
    ExpectedList,
    ExpectedListOrStr,
    ExpectedIndex,
    InvalidCallExpr,
    TooManyArgs,
    TooFewArgs,
    InvalidExitCode,
    // Runtime errors
    DivisionByZero,
    IndexOutOfRange,
    StackOverflow,
    NestingTooDeep,
    Panic,
    // Resource errors
    StepLimit,
    ValueTooLarge,
    OutputTooLarge,
    // Engine errors
    MisresolvedVar,
    InvalidItem,
}

impl Display for ErrorMsg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::UndefinedVar => "undefined name",
            Self::DuplicateDecl => "duplicate declaration of",
            Self::DuplicateParam => "duplicate parameter",
            Self::SelfInitialiser => "cannot read a local variable in its own initialiser:",
            Self::ReturnOutsideFunction => "`return` outside of a function",
            Self::BreakOutsideLoop => "`break` outside of a loop",
            Self::ContinueOutsideLoop => "`continue` outside of a loop",
            Self::AssignToFunction => "cannot assign to function",
            Self::MainWithArgs => "`main` cannot take parameters, found",
            Self::UnusedVar => "unused variable",
            Self::Unreachable => "unreachable statement",
            Self::ExpectedNumber => "expected number operand, found",
            Self::ExpectedNumOrStr => "expected both operands to be numbers or strings, found",
            Self::ExpectedList => "expected a list, found",
            Self::ExpectedListOrStr => "expected a list or string, found",
            Self::ExpectedIndex => "expected a non-negative integer index, found",
            Self::InvalidCallExpr => "cannot call",
            Self::TooManyArgs => "too many arguments in function call:",
            Self::TooFewArgs => "too few arguments in function call:",
            Self::InvalidExitCode => "exit code must be an integer, found",
            Self::DivisionByZero => "division by zero",
            Self::IndexOutOfRange => "index out of range:",
            Self::StackOverflow => "maximum call depth exceeded:",
            Self::NestingTooDeep => "maximum evaluation depth exceeded:",
            Self::Panic => "program panicked:",
            Self::StepLimit => "step budget exhausted after",
            Self::ValueTooLarge => "value exceeds the maximum length of",
            Self::OutputTooLarge => "output exceeds the maximum length of",
            Self::MisresolvedVar => "variable was not resolved correctly:",
            Self::InvalidItem => "cannot execute a statement that failed to parse",
        })
    }
}

impl ErrorMsg {
    pub fn fault(&self) -> Fault {
        match self {
            Self::DivisionByZero => Fault::DivisionByZero,
            Self::IndexOutOfRange => Fault::IndexOutOfRange,
            Self::StackOverflow | Self::NestingTooDeep => Fault::StackOverflow,
            Self::Panic => Fault::Panic,
            Self::StepLimit | Self::ValueTooLarge | Self::OutputTooLarge => Fault::Resource,
            Self::MisresolvedVar | Self::InvalidItem => Fault::Internal,
            _ => Fault::Type,
        }
    }
}

fn message(msg: ErrorMsg, ctx: impl Display) -> String {
    let ctx = ctx.to_string();
    if ctx.is_empty() {
        msg.to_string()
    } else {
        format!("{msg} {ctx}")
    }
}

pub fn resolution_error(msg: ErrorMsg, ctx: impl Display, range: TextRange) -> Diagnostic {
    Diagnostic::error(Stage::Semantic, message(msg, ctx)).with_range(range)
}

pub fn resolution_warning(msg: ErrorMsg, ctx: impl Display, range: TextRange) -> Diagnostic {
    Diagnostic::warning(Stage::Semantic, message(msg, ctx)).with_range(range)
}

pub fn runtime_error(msg: ErrorMsg, ctx: impl Display) -> Exception {
    Exception::Error(RuntimeError {
        fault: msg.fault(),
        message: message(msg, ctx),
        range: None,
    })
}

/// Attach a source range to a runtime error that does not have one yet,
/// so the innermost location wins.
pub fn at(exception: Exception, range: TextRange) -> Exception {
    match exception {
        Exception::Error(mut e) => {
            e.range.get_or_insert(range);
            Exception::Error(e)
        }
        other => other,
    }
}
