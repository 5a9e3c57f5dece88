//! Embedded interpreters
//!
//! The isolation strength is whatever the interpreter provides. For
//! [`RhaiInterpreter`] that means: no filesystem, network or process
//! access (none are registered), no `eval`/`import`, and hard limits on
//! operations, nesting, container sizes and captured output.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use rhai::{Dynamic, Engine, Scope};

use crate::config::SandboxLimits;

/// Raw outcome of evaluating one submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Evaluation {
    /// Everything the code printed, stdout first then diagnostics
    pub output: String,
    /// Error text, `None` on success
    pub error: Option<String>,
}

/// An interpreter living on the sandbox worker thread.
///
/// Each call must be logically independent of the previous ones.
pub trait Interpreter {
    /// Evaluate `code` and capture its output.
    fn evaluate(&mut self, code: &str) -> Evaluation;
}

/// Print and debug text of one run, bounded by `limit` bytes in total.
#[derive(Debug, Default)]
struct Capture {
    stdout: String,
    stderr: String,
    limit: usize,
}

impl Capture {
    /// Append a line, or refuse once the budget would be exceeded.
    fn push(&mut self, diagnostic: bool, line: &str) -> bool {
        if self.stdout.len() + self.stderr.len() + line.len() + 1 > self.limit {
            return false;
        }
        let buffer = if diagnostic {
            &mut self.stderr
        } else {
            &mut self.stdout
        };
        buffer.push_str(line);
        buffer.push('\n');
        true
    }

    fn take(&mut self) -> (String, String) {
        (
            std::mem::take(&mut self.stdout),
            std::mem::take(&mut self.stderr),
        )
    }
}

#[derive(Debug, Default)]
struct Shared {
    capture: Mutex<Capture>,
    overflowed: AtomicBool,
}

impl Shared {
    fn push(&self, diagnostic: bool, line: &str) {
        if self.overflowed.load(Ordering::Relaxed) {
            return;
        }
        let accepted = self
            .capture
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(diagnostic, line);
        if !accepted {
            self.overflowed.store(true, Ordering::Relaxed);
        }
    }

    fn take(&self) -> (String, String) {
        self.capture
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

/// Rhai-backed interpreter
pub struct RhaiInterpreter {
    engine: Engine,
    shared: Arc<Shared>,
    max_output_size: usize,
}

impl RhaiInterpreter {
    /// Create an interpreter with the given limits
    #[must_use]
    pub fn new(limits: &SandboxLimits) -> Self {
        let shared = Arc::new(Shared {
            capture: Mutex::new(Capture {
                limit: limits.max_output_size,
                ..Capture::default()
            }),
            overflowed: AtomicBool::new(false),
        });

        let mut engine = Engine::new();
        engine
            .set_max_operations(limits.max_operations)
            .set_max_call_levels(limits.max_call_levels)
            .set_max_expr_depths(limits.max_expr_depth, limits.max_expr_depth)
            .set_max_string_size(limits.max_string_size)
            .set_max_array_size(limits.max_array_size)
            .set_max_map_size(limits.max_map_size);

        engine.disable_symbol("eval");
        engine.disable_symbol("import");

        let out = Arc::clone(&shared);
        engine.on_print(move |text| out.push(false, text));

        let err = Arc::clone(&shared);
        engine.on_debug(move |text, _source, pos| {
            if pos.is_none() {
                err.push(true, text);
            } else {
                err.push(true, &format!("{pos} | {text}"));
            }
        });

        // Stop the script at the next operation once output overflowed
        let progress = Arc::clone(&shared);
        engine.on_progress(move |_| {
            progress
                .overflowed
                .load(Ordering::Relaxed)
                .then(|| Dynamic::from("output limit exceeded".to_string()))
        });

        Self {
            engine,
            shared,
            max_output_size: limits.max_output_size,
        }
    }
}

impl Default for RhaiInterpreter {
    fn default() -> Self {
        Self::new(&SandboxLimits::default())
    }
}

impl Interpreter for RhaiInterpreter {
    fn evaluate(&mut self, code: &str) -> Evaluation {
        // Leftovers from a previous run must not leak into this one
        self.shared.take();
        self.shared.overflowed.store(false, Ordering::Relaxed);

        let outcome = self
            .engine
            .compile(code)
            .map_err(|e| format!("Compilation error: {e}"))
            .and_then(|ast| {
                let mut scope = Scope::new();
                self.engine
                    .run_ast_with_scope(&mut scope, &ast)
                    .map_err(|e| e.to_string())
            });

        let outcome = if self.shared.overflowed.load(Ordering::Relaxed) {
            Err(format!(
                "Output limit exceeded: more than {} bytes printed",
                self.max_output_size
            ))
        } else {
            outcome
        };

        let (mut output, diagnostics) = self.shared.take();
        if !diagnostics.is_empty() {
            if !output.is_empty() {
                output.push('\n');
            }
            output.push_str(&diagnostics);
        }

        Evaluation {
            output,
            error: outcome.err(),
        }
    }
}
