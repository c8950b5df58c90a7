use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::Once,
};

use log::{debug, error};
use quill_compile::{limits::Limits, report::Report};
use wasm_bindgen::prelude::*;

#[cfg(all(feature = "wee_alloc", target_arch = "wasm32"))]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

static INIT: Once = Once::new();

/// Set up the engine. Safe to call any number of times; every other
/// entry point calls it too.
#[wasm_bindgen]
pub fn init() {
    INIT.call_once(|| {
        #[cfg(feature = "console_error_panic_hook")]
        console_error_panic_hook::set_once();
        debug!("Initialised {}", get_version());
    });
}

#[wasm_bindgen]
pub fn get_version() -> String {
    format!("Quill v{}", env!("CARGO_PKG_VERSION"))
}

/// Outcome of `compile_and_run`.
#[wasm_bindgen]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionResult {
    success: bool,
    exit_code: i32,
    stdout: String,
    stderr: String,
}

#[wasm_bindgen]
impl ExecutionResult {
    #[wasm_bindgen(getter)]
    pub fn success(&self) -> bool {
        self.success
    }

    #[wasm_bindgen(getter)]
    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    #[wasm_bindgen(getter)]
    pub fn stdout(&self) -> String {
        self.stdout.clone()
    }

    #[wasm_bindgen(getter)]
    pub fn stderr(&self) -> String {
        self.stderr.clone()
    }
}

impl From<Report> for ExecutionResult {
    fn from(report: Report) -> Self {
        Self {
            success: report.success,
            exit_code: report.exit_code,
            stdout: report.stdout,
            stderr: report.stderr,
        }
    }
}

/// Whether `source` lexes, parses and passes analysis without errors.
#[wasm_bindgen]
pub fn check_syntax(source_code: &str) -> bool {
    init();
    guarded(|| !quill_compile::check(source_code).has_errors()).unwrap_or(false)
}

#[wasm_bindgen]
pub fn compile_and_run(source_code: &str) -> ExecutionResult {
    init();
    guarded(|| quill_compile::run(source_code, &Limits::default()))
        .unwrap_or_else(|message| Report::internal_error(&message))
        .into()
}

/// Canonical layout of `source`, or `source` itself if it does not parse.
#[wasm_bindgen]
pub fn format_code(source_code: &str) -> String {
    init();
    guarded(|| quill_syntax::format::format(source_code))
        .unwrap_or_else(|_| source_code.to_string())
}

/// Run `f`, turning a panic inside the engine into an error message.
///
/// Only native targets unwind. On `wasm32-unknown-unknown` a panic aborts
/// the module, so there the engine relies on its own limits (parse depth,
/// step budget and bounded rendering) never to panic in the first place.
pub(crate) fn guarded<T>(f: impl FnOnce() -> T) -> Result<T, String> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let message = panic_message(payload.as_ref());
        error!("Engine panicked: {message}");
        format!("engine fault: {message}")
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
