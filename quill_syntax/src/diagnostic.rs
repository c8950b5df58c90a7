use std::fmt::Display;

use crate::token::TextRange;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Error => "error",
            Self::Warning => "warning",
        })
    }
}

/// The pipeline stage a diagnostic originates from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Stage {
    Lex,
    Parse,
    Semantic,
    Runtime,
    Resource,
    Internal,
}

impl Stage {
    /// Lex, parse and semantic diagnostics stop the program from running.
    pub fn is_compile(self) -> bool {
        matches!(self, Self::Lex | Self::Parse | Self::Semantic)
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Lex => "Lex",
            Self::Parse => "Parse",
            Self::Semantic => "Semantic",
            Self::Runtime => "Runtime",
            Self::Resource => "Resource",
            Self::Internal => "Internal",
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub stage: Stage,
    pub message: String,
    pub range: Option<TextRange>,
}

impl Diagnostic {
    pub fn error(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            stage,
            message: message.into(),
            range: None,
        }
    }

    pub fn warning(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(stage, message)
        }
    }

    pub fn with_range(mut self, range: TextRange) -> Self {
        self.range = Some(range);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Render as a single line, resolving the span against `lines`.
    pub fn render(&self, lines: &LineIndex) -> String {
        match self.range {
            Some(range) => {
                let (line, column) = lines.position(range.start);
                format!(
                    "{} {} at line {}, column {}: {}",
                    self.stage, self.severity, line, column, self.message
                )
            }
            None => format!("{} {}: {}", self.stage, self.severity, self.message),
        }
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}: {}", self.stage, self.severity, self.message)
    }
}

/// Maps byte offsets back to 1-based line and column numbers.
#[derive(Debug)]
pub struct LineIndex<'a> {
    source: &'a str,
    starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub fn new(source: &'a str) -> Self {
        let starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { source, starts }
    }

    pub fn position(&self, offset: usize) -> (usize, usize) {
        let offset = offset.min(self.source.len());
        let line = match self.starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let start = self.starts[line];
        // Offsets always come from char boundaries, but stay safe on bad input
        let column = self
            .source
            .get(start..offset)
            .map_or(offset - start, |s| s.chars().count());
        (line + 1, column + 1)
    }
}

/// Ordered collection of every diagnostic raised while handling one source.
#[derive(Clone, Debug, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.items.extend(diagnostics);
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(Diagnostic::is_error)
    }

    pub fn has_compile_errors(&self) -> bool {
        self.items
            .iter()
            .any(|d| d.is_error() && d.stage.is_compile())
    }

    /// One line per diagnostic, each terminated by a newline.
    pub fn render(&self, source: &str) -> String {
        let lines = LineIndex::new(source);
        self.items
            .iter()
            .fold(String::default(), |a, d| a + &d.render(&lines) + "\n")
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_index() {
        let lines = LineIndex::new("ab\ncd\n\nΩx");
        assert_eq!(lines.position(0), (1, 1));
        assert_eq!(lines.position(1), (1, 2));
        assert_eq!(lines.position(3), (2, 1));
        assert_eq!(lines.position(6), (3, 1));
        // `Ω` is two bytes wide but a single column
        assert_eq!(lines.position(9), (4, 2));
        assert_eq!(lines.position(100), (4, 3));
    }

    #[test]
    fn render() {
        let mut diagnostics = Diagnostics::default();
        diagnostics.push(
            Diagnostic::error(Stage::Parse, "expected expression, found end of input")
                .with_range(TextRange::new(3, 3)),
        );
        diagnostics.push(Diagnostic::warning(Stage::Semantic, "unused variable `x`"));
        assert_eq!(
            diagnostics.render("1 +"),
            "Parse error at line 1, column 4: expected expression, found end of input\n\
             Semantic warning: unused variable `x`\n"
        );
        assert!(diagnostics.has_errors());
        assert!(diagnostics.has_compile_errors());
    }

    #[test]
    fn warnings_are_not_errors() {
        let mut diagnostics = Diagnostics::default();
        diagnostics.push(Diagnostic::warning(Stage::Semantic, "unreachable statement"));
        assert!(!diagnostics.has_errors());
        diagnostics.push(Diagnostic::error(Stage::Runtime, "division by zero"));
        assert!(diagnostics.has_errors());
        assert!(!diagnostics.has_compile_errors());
    }
}
