//! Numeric → Lua entry point, installed in the numeric runtime as the
//! `lua_call` builtin:
//!
//! ```text
//!   RES = lua_call(NAME, ARG, ...)
//!   [RES, ...] = lua_call(NAME, ARG, ...)
//! ```
//!
//! NAME must denote a callable value in Lua's global environment. The function may
//! return any number of results; all of them are converted and returned.
//! Example: `lua_call('select', -2, 1, 2, 3)` => `2 3`.

use std::rc::Rc;

use tracing::debug;

use crate::convert::{numeric_to_script, script_to_numeric};
use crate::error::{BridgeError, BridgeResult, NumericFault, ScriptFault};
use crate::gate::RuntimeGate;
use crate::runtime::{Builtin, ScriptRuntime};
use crate::value::NumericValue;

const OP: &str = "lua";

pub struct ReverseBridge<S> {
    script: S,
    gate: Rc<RuntimeGate>,
    builtin_name: String,
}

impl<S: ScriptRuntime> ReverseBridge<S> {
    pub fn new(script: S, gate: Rc<RuntimeGate>, builtin_name: impl Into<String>) -> Self {
        Self {
            script,
            gate,
            builtin_name: builtin_name.into(),
        }
    }

    /// Call the Lua global `name` with converted `args`.
    ///
    /// Failures come back as numeric faults, ready to be raised in the
    /// numeric runtime.
    pub fn call_scripting(&self, name: &str, args: &[NumericValue]) -> Result<Vec<NumericValue>, NumericFault> {
        self.call(name, args).map_err(NumericFault::from)
    }

    /// Builtin entry: `args[0]` is the function name, the rest its arguments.
    pub fn invoke(&self, args: &[NumericValue], nargout: usize) -> Result<Vec<NumericValue>, NumericFault> {
        let Some((NumericValue::Text(rows), rest)) = args.split_first() else {
            return Err(self.usage());
        };
        let [name] = rows.as_slice() else {
            return Err(self.usage());
        };
        debug!(name = %name, args = rest.len(), nargout, "reverse call");
        self.call_scripting(name, rest)
    }

    fn call(&self, name: &str, args: &[NumericValue]) -> BridgeResult<Vec<NumericValue>> {
        self.gate.require_ready(OP)?;

        let inputs = args
            .iter()
            .enumerate()
            .map(|(i, arg)| {
                numeric_to_script(arg).map_err(|err| BridgeError::InvalidArgument {
                    op: OP,
                    message: format!("invalid argument #{} in call to function '{name}' ({err})", i + 1),
                })
            })
            .collect::<BridgeResult<Vec<_>>>()?;

        let results = self.script.call_global(name, inputs).map_err(|fault| match fault {
            ScriptFault::Raised(msg) => BridgeError::ExecutionFailed {
                op: OP,
                message: format!("exception in call to function '{name}'\n{msg}"),
            },
            missing => BridgeError::CallTargetMissing {
                op: OP,
                name: name.to_string(),
                reason: missing.to_string(),
            },
        })?;

        let single = results.len() == 1;
        results
            .iter()
            .enumerate()
            .map(|(i, value)| {
                script_to_numeric(value).map_err(|err| {
                    let message = if single {
                        format!("invalid return value in call to function '{name}'\n{err}")
                    } else {
                        format!("invalid return value #{} in call to function '{name}'\n{err}", i + 1)
                    };
                    BridgeError::UnconvertibleResult { op: OP, message }
                })
            })
            .collect()
    }

    fn usage(&self) -> NumericFault {
        NumericFault::Execution(format!("Invalid call to {}", self.builtin_name))
    }
}

/// Wrap a reverse bridge as a numeric-runtime builtin.
pub fn builtin<S: ScriptRuntime + 'static>(bridge: Rc<ReverseBridge<S>>) -> Builtin {
    Rc::new(move |args: &[NumericValue], nargout: usize| bridge.invoke(args, nargout))
}
