use crate::{
    environment::Env,
    error::{runtime_error, ErrorMsg, Exception},
    interpret::Interpreter,
    types::{NativeFunc, Value},
};

/// Builtins live in the prelude, outside the global scope, so programs may
/// shadow them with their own declarations.
pub const BUILTINS: &[NativeFunc] = &[
    NativeFunc {
        name: "print",
        args: &["value"],
        body: print,
    },
    NativeFunc {
        name: "len",
        args: &["value"],
        body: len,
    },
    NativeFunc {
        name: "push",
        args: &["list", "value"],
        body: push,
    },
    NativeFunc {
        name: "str",
        args: &["value"],
        body: str,
    },
    NativeFunc {
        name: "exit",
        args: &["code"],
        body: exit,
    },
    NativeFunc {
        name: "panic",
        args: &["message"],
        body: panic,
    },
];

pub fn init(env: &mut Env) {
    for func in BUILTINS {
        env.set(func.name, Value::NativeFunc(func.clone()));
    }
}

fn print(interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, Exception> {
    interpreter.write_stdout(&args[0])?;
    Ok(Value::Null)
}

fn len(interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, Exception> {
    match &args[0] {
        Value::List(list) => Ok(Value::Number(list.len() as f64)),
        Value::Str(s) => {
            interpreter.charge(s.len())?;
            Ok(Value::Number(s.chars().count() as f64))
        }
        value => Err(runtime_error(ErrorMsg::ExpectedListOrStr, value.describe())),
    }
}

fn push(interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, Exception> {
    let mut args = args.into_iter();
    let (Some(list), Some(value)) = (args.next(), args.next()) else {
        return Err(runtime_error(ErrorMsg::TooFewArgs, "push"));
    };
    let Value::List(list) = list else {
        return Err(runtime_error(ErrorMsg::ExpectedList, list.describe()));
    };
    interpreter.check_len(list.len() + 1)?;
    list.push(value);
    Ok(Value::Null)
}

fn str(interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, Exception> {
    let text = interpreter.render(&args[0])?;
    Ok(Value::Str(text.into()))
}

fn exit(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, Exception> {
    Err(Exception::Exit(exit_code(&args[0])?))
}

fn panic(interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, Exception> {
    let message = interpreter.render(&args[0])?;
    Err(runtime_error(ErrorMsg::Panic, message))
}

/// Convert the argument of `exit` or the return value of `main` into a
/// process exit code.
pub fn exit_code(value: &Value) -> Result<i32, Exception> {
    match value {
        Value::Null => Ok(0),
        Value::Number(n)
            if n.fract() == 0.0 && *n >= i32::MIN as f64 && *n <= i32::MAX as f64 =>
        {
            Ok(*n as i32)
        }
        value => Err(runtime_error(ErrorMsg::InvalidExitCode, value.describe())),
    }
}
