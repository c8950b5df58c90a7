use quill_syntax::diagnostic::{Diagnostic, Diagnostics, Stage};

pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const COMPILE_FAILURE: i32 = 65;
    pub const TYPE_ERROR: i32 = 70;
    pub const DIVISION_BY_ZERO: i32 = 71;
    pub const INDEX_OUT_OF_RANGE: i32 = 72;
    pub const STACK_OVERFLOW: i32 = 73;
    pub const PANIC: i32 = 74;
    pub const RESOURCE_EXHAUSTED: i32 = 124;
    pub const INTERNAL_ERROR: i32 = 125;
}

/// Everything a caller learns about one run of a program.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Report {
    pub success: bool,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl Report {
    /// Build the report for a run that ended with `exit_code`. A failing
    /// exit code always leaves an error in the diagnostics, so a failed
    /// run never has an empty stderr.
    pub fn new(source: &str, mut diagnostics: Diagnostics, exit_code: i32, stdout: String) -> Self {
        if exit_code != exit_code::SUCCESS && !diagnostics.has_errors() {
            diagnostics.push(Diagnostic::error(
                Stage::Runtime,
                format!("program exited with code {exit_code}"),
            ));
        }
        Self {
            success: !diagnostics.has_errors(),
            exit_code,
            stdout,
            stderr: diagnostics.render(source),
        }
    }

    pub fn compile_failure(source: &str, diagnostics: Diagnostics) -> Self {
        Self::new(
            source,
            diagnostics,
            exit_code::COMPILE_FAILURE,
            String::new(),
        )
    }

    /// Report for a fault that escaped the engine itself.
    pub fn internal_error(message: &str) -> Self {
        let mut diagnostics = Diagnostics::default();
        diagnostics.push(Diagnostic::error(Stage::Internal, message));
        Self::new("", diagnostics, exit_code::INTERNAL_ERROR, String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success() {
        let report = Report::new("", Diagnostics::default(), 0, "hi\n".to_string());
        assert!(report.success);
        assert_eq!(report.stderr, "");
        assert_eq!(report.stdout, "hi\n");
    }

    #[test]
    fn non_zero_exit_code_is_a_failure() {
        let report = Report::new("", Diagnostics::default(), 3, String::new());
        assert!(!report.success);
        assert_eq!(report.exit_code, 3);
        assert_eq!(report.stderr, "Runtime error: program exited with code 3\n");
    }

    #[test]
    fn warnings_do_not_fail() {
        let mut diagnostics = Diagnostics::default();
        diagnostics.push(Diagnostic::warning(Stage::Semantic, "unused variable `a`"));
        let report = Report::new("", diagnostics, 0, String::new());
        assert!(report.success);
        assert_eq!(report.stderr, "Semantic warning: unused variable `a`\n");
    }

    #[test]
    fn internal_error() {
        let report = Report::internal_error("boom");
        assert!(!report.success);
        assert_eq!(report.exit_code, exit_code::INTERNAL_ERROR);
        assert_eq!(report.stderr, "Internal error: boom\n");
    }
}
