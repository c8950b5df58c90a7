use std::env;

use log::{debug, warn};

/// Resource budget for a single run. Exceeding any of these ends the run
/// with a resource or stack fault instead of hanging or exhausting memory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Limits {
    /// Expressions evaluated, loop iterations and calls, plus one step for
    /// every 64 bytes of string data copied or scanned
    pub max_steps: u64,
    pub max_call_depth: usize,
    /// Expressions and statements being evaluated at once, across calls
    pub max_nesting: usize,
    /// Longest string in bytes or list in elements
    pub max_value_len: usize,
    /// Total bytes written by `print`
    pub max_output_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_steps: 1_000_000,
            max_call_depth: 64,
            max_nesting: 320,
            max_value_len: 1 << 20,
            max_output_len: 1 << 20,
        }
    }
}

impl Limits {
    /// Defaults, overridden by `QUILL_MAX_STEPS` and `QUILL_MAX_CALL_DEPTH`
    /// when they are set to valid numbers.
    pub fn from_env() -> Self {
        let mut limits = Self::default();
        if let Some(steps) = read_var("QUILL_MAX_STEPS") {
            limits.max_steps = steps;
        }
        if let Some(depth) = read_var("QUILL_MAX_CALL_DEPTH") {
            limits = limits.with_call_depth(depth);
        }
        debug!("Using {limits:?}");
        limits
    }

    /// Allow `depth` nested calls, raising the nesting limit to match.
    pub fn with_call_depth(mut self, depth: u64) -> Self {
        self.max_call_depth = usize::try_from(depth).unwrap_or(usize::MAX);
        // Every call takes a few levels of evaluation
        self.max_nesting = self
            .max_nesting
            .max(self.max_call_depth.saturating_mul(5));
        self
    }
}

fn read_var(name: &str) -> Option<u64> {
    let value = env::var(name).ok()?;
    match value.trim().parse() {
        Ok(n) => Some(n),
        Err(e) => {
            warn!("Ignoring {name}={value}: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_depth_raises_nesting() {
        let limits = Limits::default().with_call_depth(100);
        assert_eq!(limits.max_call_depth, 100);
        assert_eq!(limits.max_nesting, 500);

        let limits = Limits::default().with_call_depth(2);
        assert_eq!(limits.max_nesting, Limits::default().max_nesting);

        let limits = Limits::default().with_call_depth(u64::MAX);
        assert_eq!(limits.max_nesting, usize::MAX);
    }
}
