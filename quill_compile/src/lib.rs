pub mod environment;
pub mod error;
pub mod interpret;
pub mod limits;
pub mod report;
pub mod resolve;
pub mod stdlib;
pub mod symbol;
pub mod types;

use interpret::Interpreter;
use limits::Limits;
use log::trace;
use quill_syntax::{diagnostic::Diagnostics, parse_source};
use report::Report;
use resolve::Resolver;

/// Lex, parse and analyse `source` without running it.
pub fn check(source: &str) -> Diagnostics {
    let mut diagnostics = Diagnostics::default();
    let (root, errors) = parse_source(source);
    diagnostics.extend(errors);
    trace!("Resolving {} items", root.items.len());
    let (_, semantic) = Resolver::new().resolve(&root);
    diagnostics.extend(semantic);
    diagnostics
}

/// Compile and run `source` under `limits`. Nothing runs if any stage
/// before execution reported an error.
pub fn run(source: &str, limits: &Limits) -> Report {
    let mut diagnostics = Diagnostics::default();
    let (root, errors) = parse_source(source);
    diagnostics.extend(errors);
    trace!("Resolving {} items", root.items.len());
    let (analysis, semantic) = Resolver::new().resolve(&root);
    diagnostics.extend(semantic);
    if diagnostics.has_compile_errors() {
        trace!("Not running, compilation failed");
        return Report::compile_failure(source, diagnostics);
    }

    trace!("Interpreting {} items", root.items.len());
    let mut interpreter = Interpreter::new(analysis, limits.clone());
    let result = interpreter.run(&root);
    let stdout = interpreter.take_stdout();
    match result {
        Ok(code) => Report::new(source, diagnostics, code, stdout),
        Err(e) => {
            diagnostics.push(e.to_diagnostic());
            Report::new(source, diagnostics, e.fault.exit_code(), stdout)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use report::exit_code;

    fn run_test(source: &str) -> Report {
        run(source, &Limits::default())
    }

    #[test]
    fn hello_world() {
        assert_eq!(
            run_test("print(\"hello\");"),
            Report {
                success: true,
                exit_code: 0,
                stdout: "hello\n".to_string(),
                stderr: String::new(),
            }
        );
    }

    #[test]
    fn compile_errors_stop_the_run() {
        let report = run_test("print(1);\nlet x = ;\nprint(y);");
        assert!(!report.success);
        assert_eq!(report.exit_code, exit_code::COMPILE_FAILURE);
        assert_eq!(report.stdout, "");
        assert_eq!(
            report.stderr,
            "Parse error at line 2, column 9: expected expression, found `;`\n"
        );

        let report = run_test("print(y);");
        assert_eq!(report.exit_code, exit_code::COMPILE_FAILURE);
        assert_eq!(
            report.stderr,
            "Semantic error at line 1, column 7: undefined name `y`\n"
        );
    }

    #[test]
    fn missing_operand() {
        let report = run_test("1 +");
        assert!(!report.success);
        assert!(report.stderr.contains("end of input"));
        assert!(check("1 +").has_errors());
    }

    #[test]
    fn runtime_fault() {
        let report = run_test("print(\"before\");\nlet z = 0;\nprint(1 / z);");
        assert!(!report.success);
        assert_eq!(report.exit_code, exit_code::DIVISION_BY_ZERO);
        assert_eq!(report.stdout, "before\n");
        assert_eq!(
            report.stderr,
            "Runtime error at line 3, column 7: division by zero\n"
        );
    }

    #[test]
    fn resource_exhaustion() {
        let report = run_test("while (true) {}");
        assert!(!report.success);
        assert_eq!(report.exit_code, exit_code::RESOURCE_EXHAUSTED);
        assert!(report.stderr.starts_with("Resource error"));
        assert!(report.stderr.contains("step budget exhausted"));
    }

    #[test]
    fn warnings_keep_success() {
        let report = run_test("fn f() { let unused = 1; }\nf();");
        assert!(report.success);
        assert_eq!(
            report.stderr,
            "Semantic warning at line 1, column 14: unused variable `unused`\n"
        );
    }

    #[test]
    fn exit_code_from_main() {
        let report = run_test("fn main() { return 7; }");
        assert!(!report.success);
        assert_eq!(report.exit_code, 7);
        assert_eq!(report.stderr, "Runtime error: program exited with code 7\n");

        let report = run_test("fn main() { print(\"ok\"); }");
        assert!(report.success);
        assert_eq!(report.stdout, "ok\n");
    }

    #[test]
    fn overly_tall_programs_are_rejected_before_analysis() {
        let mut expr = "x".to_string();
        for _ in 0..120 {
            expr = format!("({expr}{})", " + 1".repeat(60));
        }
        let source = format!("let x = 1;\nprint({expr});");
        assert!(check(&source).has_errors());
        let report = run_test(&source);
        assert_eq!(report.exit_code, exit_code::COMPILE_FAILURE);
        assert_eq!(report.stdout, "");
        assert!(report.stderr.contains("nesting too deep"), "{}", report.stderr);
    }

    #[test]
    fn check_agrees_with_run() {
        for source in ["print(1);", "1 +", "let a = 1; a();", "break;", "\"a\" - 1;"] {
            let compiled = run_test(source).exit_code != exit_code::COMPILE_FAILURE;
            assert_eq!(!check(source).has_errors(), compiled, "{source}");
        }
    }
}
