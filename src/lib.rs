//! octlua: Lua ↔ numeric matrix runtime bridge.
//!
//! Two single-threaded interpreters share one process: Lua, and a numeric
//! runtime built around real scalars and 2-D matrices. This crate converts
//! values between them and lets each call into the other:
//!
//! - Lua → numeric: `octave.eval`, `octave.feval`, `octave.get`, `octave.set`
//! - numeric → Lua: the `lua_call` builtin
//! - Value conversion (numbers, flat tables, tables of rows ↔ matrices)
//! - One-shot, sticky initialization of the numeric runtime
//! - Fault translation in both directions
//!
//! The numeric runtime itself is supplied by the host through
//! [`NumericRuntime`]; [`lua::register`] wires it into a Lua state.

pub mod config;
pub mod convert;
pub mod error;
pub mod forward;
pub mod gate;
pub mod lua;
pub mod reverse;
pub mod runtime;
pub mod value;

pub use config::{BridgeConfig, ConfigError};
pub use convert::{numeric_to_script, script_to_numeric};
pub use error::{BridgeError, BridgeResult, CodecError, NumericFault, ScriptFault};
pub use forward::{ForwardBridge, DEFAULT_MAX_RESULTS};
pub use gate::{BootFailure, GateState, RuntimeGate};
pub use reverse::ReverseBridge;
pub use runtime::{Builtin, NumericRuntime, ScriptRuntime};
pub use value::{Matrix, NumericValue, ScriptValue};
