use quill_playground::{check_syntax, compile_and_run, format_code, get_version, init};

#[test]
fn hello_world() {
    init();
    let result = compile_and_run("print(\"hello\");");
    assert!(result.success());
    assert_eq!(result.exit_code(), 0);
    assert_eq!(result.stdout(), "hello\n");
    assert_eq!(result.stderr(), "");
}

#[test]
fn incomplete_expression() {
    assert!(!check_syntax("1 +"));
    let result = compile_and_run("1 +");
    assert!(!result.success());
    assert_eq!(result.exit_code(), 65);
    assert_eq!(result.stdout(), "");
    assert!(result.stderr().contains("end of input"), "{}", result.stderr());
}

#[test]
fn infinite_loop_hits_the_budget() {
    let result = compile_and_run("while (true) {}");
    assert!(!result.success());
    assert_eq!(result.exit_code(), 124);
    assert!(result.stderr().contains("Resource error"), "{}", result.stderr());
}

#[test]
fn runaway_recursion_is_contained() {
    let result = compile_and_run("fn f(n) { return f(n + 1) + 1; }\nf(0);");
    assert!(!result.success());
    assert_eq!(result.exit_code(), 73);
}

#[test]
fn program_with_main() {
    let source = "
        fn fib(n) {
            if (n < 2) return n;
            return fib(n - 1) + fib(n - 2);
        }

        fn main() {
            let xs = [];
            for (let i = 0; i < 10; i = i + 1) push(xs, fib(i));
            print(xs);
        }
    ";
    assert!(check_syntax(source));
    let result = compile_and_run(source);
    assert!(result.success(), "{}", result.stderr());
    assert_eq!(result.stdout(), "[0, 1, 1, 2, 3, 5, 8, 13, 21, 34]\n");
}

#[test]
fn exit_code_is_passed_through() {
    let result = compile_and_run("print(\"bye\");\nexit(3);");
    assert!(!result.success());
    assert_eq!(result.exit_code(), 3);
    assert_eq!(result.stdout(), "bye\n");
    assert_eq!(result.stderr(), "Runtime error: program exited with code 3\n");
}

#[test]
fn several_errors_in_one_pass() {
    let result = compile_and_run("let = 1;\nprint(1 +);\nlet ok = 2;\n}");
    assert!(!result.success());
    assert_eq!(result.stderr().lines().count(), 3, "{}", result.stderr());
    assert!(result.stderr().lines().all(|l| l.starts_with("Parse error at line")));
}

#[test]
fn semantic_errors_are_reported() {
    assert!(!check_syntax("print(missing);"));
    assert!(!check_syntax("fn f(a) {} f(1, 2);"));
    assert!(!check_syntax("let s = \"a\" * 2;"));
    // Warnings alone do not fail the check
    assert!(check_syntax("fn f() { let unused; }"));
}

#[test]
fn formatting() {
    assert_eq!(
        format_code("fn add(a,b){return a+b;}print(add(1,2));"),
        "fn add(a, b) {\n    return a + b;\n}\nprint(add(1, 2));\n"
    );
    assert_eq!(format_code("let x = ;"), "let x = ;");
}

#[test]
fn version() {
    assert!(get_version().starts_with("Quill v"));
}

#[test]
fn no_state_between_runs() {
    let first = compile_and_run("let x = 1; print(x);");
    let second = compile_and_run("let x = 1; print(x);");
    assert_eq!(first, second);
    // A name from the previous run does not leak into this one
    assert!(!compile_and_run("print(x);").success());
}
