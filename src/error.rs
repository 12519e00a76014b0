//! Failure types and their translation across the runtime boundary.
//!
//! Every bridge entry point returns [`BridgeResult`]. At the crossing point the
//! error is turned into the caller's native signal:
//!
//! - Lua caller: [`lua_error_text`] is raised as the string `oct_error: <message>`.
//! - Numeric caller: `NumericFault::from(err)` raises an execution fault.
//!
//! Foreign faults coming the other way ([`NumericFault`], `mlua::Error`) are
//! reduced to a message first and never cross unmodified.

use thiserror::Error;
use tracing::debug;

/// Failure raised at a bridge entry point.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    /// Wrong type or shape; position-tagged when it came from an argument list.
    #[error("{op}: {message}")]
    InvalidArgument { op: &'static str, message: String },

    /// The runtime gate is failed, or not yet ready.
    #[error("{op}: numeric runtime not initialized")]
    RuntimeNotReady { op: &'static str },

    /// A fault (or exit request) raised while executing code in either runtime.
    #[error("{op}: {message}")]
    ExecutionFailed { op: &'static str, message: String },

    /// A produced value falls outside the convertible domain.
    #[error("{op}: {message}")]
    UnconvertibleResult { op: &'static str, message: String },

    /// The named callable does not exist or cannot be called.
    #[error("{op}: function '{name}' {reason}")]
    CallTargetMissing {
        op: &'static str,
        name: String,
        reason: String,
    },
}

pub type BridgeResult<T> = Result<T, BridgeError>;

/// Why a value could not be converted between the two value models.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodecError {
    #[error("undefined value")]
    Undefined,
    #[error("{0}-dimensional arrays are not supported")]
    TooManyDimensions(usize),
    #[error("complex values are not supported")]
    Complex,
    #[error("{0} values are not supported")]
    NotReal(&'static str),
    #[error("expected number or table, got {0}")]
    NotNumeric(&'static str),
    #[error("table entry #{position} is a {found}, expected {expected}")]
    MixedEntries {
        position: usize,
        expected: &'static str,
        found: &'static str,
    },
    #[error("table row #{row} has {found} entries, expected {expected}")]
    RaggedRows {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("table row #{row} entry #{col} is a {found}, expected number")]
    NonNumericLeaf {
        row: usize,
        col: usize,
        found: &'static str,
    },
}

// ==================== Native Fault Signals ====================

/// The numeric runtime's native failure signal.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NumericFault {
    /// Execution error with its message.
    #[error("{0}")]
    Execution(String),
    /// Explicit exit request carrying the exit status.
    #[error("interpreter exited with status {0}")]
    Exit(i32),
}

impl From<BridgeError> for NumericFault {
    fn from(err: BridgeError) -> Self {
        NumericFault::Execution(err.to_string())
    }
}

/// The scripting runtime's failure, as seen by a reverse call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptFault {
    #[error("is not defined")]
    Missing,
    #[error("{0}")]
    Raised(String),
}

// ==================== Lua Translation ====================

/// The error value raised in Lua for a bridge error, prefixed with the
/// configured error tag.
pub fn lua_error_text(err: &BridgeError, prefix: &str) -> String {
    format!("{prefix}: {err}")
}

/// Reduce an `mlua::Error` to the message the Lua code raised.
///
/// Callback wrappers are peeled off; their tracebacks only go to the log.
pub fn lua_error_message(err: &mlua::Error) -> String {
    match err {
        mlua::Error::CallbackError { traceback, cause } => {
            debug!(%traceback, "lua callback failed");
            lua_error_message(cause)
        }
        mlua::Error::RuntimeError(msg) => match msg.split_once("\nstack traceback:") {
            Some((head, traceback)) => {
                debug!(%traceback, "lua error");
                head.to_string()
            }
            None => msg.clone(),
        },
        other => other.to_string(),
    }
}
