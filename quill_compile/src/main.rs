use quill_compile::{check, limits::Limits, report::Report, run};
use quill_syntax::format::format;
use std::{
    env, fs,
    io::{self, Write},
    process,
};

const USAGE: &str = "usage: quill [--check | --fmt] [file]";

fn main() {
    pretty_env_logger::init();
    let args: Vec<String> = env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    let code = match args.as_slice() {
        [] => run_repl(),
        ["--check", path] => check_file(path),
        ["--fmt", path] => format_file(path),
        [path] if !path.starts_with("--") => run_file(path),
        _ => {
            eprintln!("{USAGE}");
            2
        }
    };
    process::exit(code);
}

fn read(path: &str) -> Result<String, i32> {
    fs::read_to_string(path).map_err(|e| {
        eprintln!("Failed to read {path}: {e}");
        66
    })
}

fn run_repl() -> i32 {
    let (stdin, mut stdout) = (io::stdin(), io::stdout());
    let limits = Limits::from_env();
    loop {
        let mut line = String::default();
        print!(">>> ");
        if stdout.flush().is_err() {
            return 74;
        }
        // If zero bytes are read, then exit (usually triggered by Ctrl-D)
        match stdin.read_line(&mut line) {
            Ok(0) => return 0,
            Ok(_) => (),
            Err(e) => {
                eprintln!("Failed to read line: {e}");
                return 74;
            }
        }
        // Every line is a program of its own
        emit(&run(&line, &limits));
    }
}

fn run_file(path: &str) -> i32 {
    match read(path) {
        Ok(source) => {
            let report = run(&source, &Limits::from_env());
            emit(&report);
            report.exit_code
        }
        Err(code) => code,
    }
}

fn check_file(path: &str) -> i32 {
    match read(path) {
        Ok(source) => {
            let diagnostics = check(&source);
            eprint!("{}", diagnostics.render(&source));
            i32::from(diagnostics.has_errors())
        }
        Err(code) => code,
    }
}

fn format_file(path: &str) -> i32 {
    match read(path) {
        Ok(source) => {
            print!("{}", format(&source));
            0
        }
        Err(code) => code,
    }
}

fn emit(report: &Report) {
    print!("{}", report.stdout);
    eprint!("{}", report.stderr);
}
