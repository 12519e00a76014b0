//! Lua side of the bridge.
//!
//! [`register`] installs the module table (`octave` by default) whose
//! functions are the forward entry points:
//!
//! ```lua
//! octave.eval(code [, max_results])             --> v1, v2, ...
//! octave.feval(name [, max_results], a1, ...)   --> v1, v2, ...
//! octave.get(name)                              --> v
//! octave.set(name, value)                       --> true
//! ```
//!
//! Every module function follows this contract:
//!
//! 1. Check its Lua arguments (`luaL_check*` style)
//! 2. Run the forward bridge
//! 3. On error: raise the string `oct_error: <op>: <message>` in Lua
//! 4. On success: push the converted results
//!
//! The error value is a plain string, as `error(msg, 0)` would raise, so
//! `pcall` callers can match on it. The same state also serves reverse calls
//! through [`LuaRuntime`].

use std::rc::Rc;

use mlua::{Function, Lua, MultiValue, Table, Value, WeakLua};
use tracing::debug;

use crate::config::BridgeConfig;
use crate::error::{lua_error_message, lua_error_text, BridgeError, BridgeResult, ScriptFault};
use crate::forward::ForwardBridge;
use crate::gate::RuntimeGate;
use crate::reverse::{self, ReverseBridge};
use crate::runtime::{NumericRuntime, ScriptRuntime};
use crate::value::ScriptValue;

/// Tables nested deeper than rows of a matrix are never converted, so they
/// are not walked either. This also keeps self-referencing tables finite.
const MAX_TABLE_DEPTH: usize = 2;

/// Calls any value the way Lua's call operator does, `__call` included.
const CALL_VALUE: &str = "local f = ... return f(select(2, ...))";

/// Wraps a module function returning `true, ...` or `false, msg` so that
/// failures are raised with the message string as the error value.
const RAISE_ON_FAILURE: &str = r#"
local impl = ...
local function finish(ok, ...)
  if not ok then error((...), 0) end
  return ...
end
return function(...) return finish(impl(...)) end
"#;

// ==================== Value Marshalling ====================

/// Read a Lua value into the bridge's scripting model.
///
/// Strings Lua would coerce to numbers (`"3"`, `"0x10"`) become numbers.
/// Only the sequence part `1..#t` of a table is read.
pub fn from_lua(lua: &Lua, value: &Value) -> ScriptValue {
    read_value(lua, value, 0)
}

fn read_value(lua: &Lua, value: &Value, depth: usize) -> ScriptValue {
    match value {
        Value::Nil => ScriptValue::Nil,
        Value::Boolean(b) => ScriptValue::Boolean(*b),
        Value::Integer(i) => ScriptValue::Number(*i as f64),
        Value::Number(x) => ScriptValue::Number(*x),
        Value::String(s) => match lua.coerce_number(value.clone()) {
            Ok(Some(x)) => ScriptValue::Number(x),
            _ => ScriptValue::Text(s.to_string_lossy().to_string()),
        },
        Value::Table(t) if depth < MAX_TABLE_DEPTH => ScriptValue::Table(
            (1..=t.raw_len())
                .map(|i| match t.raw_get::<Value>(i) {
                    Ok(entry) => read_value(lua, &entry, depth + 1),
                    Err(_) => ScriptValue::Nil,
                })
                .collect(),
        ),
        other => ScriptValue::Opaque(other.type_name()),
    }
}

/// Build a Lua value from the scripting model.
///
/// `Opaque` values cannot be rebuilt and become `nil`.
pub fn to_lua(lua: &Lua, value: &ScriptValue) -> mlua::Result<Value> {
    Ok(match value {
        ScriptValue::Nil | ScriptValue::Opaque(_) => Value::Nil,
        ScriptValue::Boolean(b) => Value::Boolean(*b),
        ScriptValue::Number(x) => Value::Number(*x),
        ScriptValue::Text(s) => Value::String(lua.create_string(s)?),
        ScriptValue::Table(entries) => {
            let items = entries
                .iter()
                .map(|entry| to_lua(lua, entry))
                .collect::<mlua::Result<Vec<_>>>()?;
            Value::Table(lua.create_sequence_from(items)?)
        }
    })
}

fn to_lua_values(lua: &Lua, values: &[ScriptValue]) -> mlua::Result<Vec<Value>> {
    values.iter().map(|v| to_lua(lua, v)).collect()
}

// ==================== Reverse Calls ====================

/// Lua state as the target of reverse calls.
///
/// The state is held weakly: the module table that owns this runtime lives
/// inside that same state.
pub struct LuaRuntime {
    lua: WeakLua,
}

impl LuaRuntime {
    pub fn new(lua: &Lua) -> Self {
        Self { lua: lua.weak() }
    }
}

impl ScriptRuntime for LuaRuntime {
    fn call_global(&self, name: &str, args: Vec<ScriptValue>) -> Result<Vec<ScriptValue>, ScriptFault> {
        let Some(lua) = self.lua.try_upgrade() else {
            return Err(ScriptFault::Raised("lua state is closed".into()));
        };
        let raised = |err: mlua::Error| ScriptFault::Raised(lua_error_message(&err));

        let target: Value = lua.globals().get(name).map_err(raised)?;
        let args = to_lua_values(&lua, &args).map_err(raised)?;
        let results = match target {
            Value::Nil => return Err(ScriptFault::Missing),
            Value::Function(f) => f.call::<MultiValue>(MultiValue::from_vec(args)),
            // Tables and userdata may be callable through `__call`; for
            // anything else Lua raises "attempt to call".
            other => {
                let mut call_args = Vec::with_capacity(args.len() + 1);
                call_args.push(other);
                call_args.extend(args);
                lua.load(CALL_VALUE)
                    .set_name("=lua_call")
                    .call::<MultiValue>(MultiValue::from_vec(call_args))
            }
        }
        .map_err(raised)?;
        debug!(name, results = results.len(), "lua function returned");
        Ok(results.iter().map(|v| from_lua(&lua, v)).collect())
    }
}

// ==================== Module Table ====================

struct Module<N> {
    forward: ForwardBridge<N>,
    config: BridgeConfig,
}

impl<N: NumericRuntime> Module<N> {
    /// `true, results...` on success, `false, message` on failure.
    fn reply(&self, lua: &Lua, outcome: BridgeResult<Vec<ScriptValue>>) -> mlua::Result<MultiValue> {
        let mut values = Vec::new();
        match outcome {
            Ok(results) => {
                values.push(Value::Boolean(true));
                values.extend(to_lua_values(lua, &results)?);
            }
            Err(err) => {
                let message = lua_error_text(&err, &self.config.error_prefix);
                values.push(Value::Boolean(false));
                values.push(Value::String(lua.create_string(message)?));
            }
        }
        Ok(MultiValue::from_vec(values))
    }

    fn eval(&self, lua: &Lua, args: &MultiValue) -> BridgeResult<Vec<ScriptValue>> {
        const OP: &str = "eval";
        let code = check_string(lua, OP, args, 1)?;
        let max = opt_count(lua, OP, args, 2, self.config.default_max_results)?;
        self.forward.eval(&code, max)
    }

    fn feval(&self, lua: &Lua, args: &MultiValue) -> BridgeResult<Vec<ScriptValue>> {
        const OP: &str = "feval";
        let name = check_string(lua, OP, args, 1)?;
        let max = opt_count(lua, OP, args, 2, self.config.default_max_results)?;
        let inputs: Vec<ScriptValue> = args.iter().skip(2).map(|v| from_lua(lua, v)).collect();
        self.forward.call_named(&name, &inputs, max)
    }

    fn get(&self, lua: &Lua, args: &MultiValue) -> BridgeResult<Vec<ScriptValue>> {
        let name = check_string(lua, "get", args, 1)?;
        Ok(vec![self.forward.get_global(&name)?])
    }

    fn set(&self, lua: &Lua, args: &MultiValue) -> BridgeResult<Vec<ScriptValue>> {
        const OP: &str = "set";
        let name = check_string(lua, OP, args, 1)?;
        let value = args.get(1).ok_or_else(|| BridgeError::InvalidArgument {
            op: OP,
            message: "bad argument #2 (value expected)".into(),
        })?;
        let done = self.forward.set_global(&name, &from_lua(lua, value))?;
        Ok(vec![ScriptValue::Boolean(done)])
    }
}

/// Expose one module operation as a Lua function raising string errors.
fn entry<N, F>(lua: &Lua, wrap: &Function, module: &Rc<Module<N>>, op: F) -> mlua::Result<Function>
where
    N: NumericRuntime + 'static,
    F: Fn(&Module<N>, &Lua, &MultiValue) -> BridgeResult<Vec<ScriptValue>> + 'static,
{
    let module = Rc::clone(module);
    let raw = lua.create_function(move |lua, args: MultiValue| {
        let outcome = op(&*module, lua, &args);
        module.reply(lua, outcome)
    })?;
    wrap.call(raw)
}

/// Create the module table without registering it anywhere.
///
/// The numeric runtime is booted lazily by the first module call.
pub fn open<N>(lua: &Lua, numeric: N, config: BridgeConfig) -> mlua::Result<Table>
where
    N: NumericRuntime + 'static,
{
    open_with_gate(lua, numeric, Rc::new(RuntimeGate::new()), config)
}

/// Like [`open`], with a caller-supplied runtime gate.
pub fn open_with_gate<N>(lua: &Lua, numeric: N, gate: Rc<RuntimeGate>, config: BridgeConfig) -> mlua::Result<Table>
where
    N: NumericRuntime + 'static,
{
    config.validate().map_err(mlua::Error::external)?;

    let reverse_bridge = Rc::new(ReverseBridge::new(
        LuaRuntime::new(lua),
        Rc::clone(&gate),
        config.reverse_builtin.clone(),
    ));
    let forward = ForwardBridge::new(numeric, gate)
        .with_reverse_builtin(config.reverse_builtin.clone(), reverse::builtin(reverse_bridge));
    let module = Rc::new(Module { forward, config });

    let wrap = lua.load(RAISE_ON_FAILURE).set_name("=octlua").into_function()?;
    let table = lua.create_table()?;
    table.set("eval", entry(lua, &wrap, &module, Module::eval)?)?;
    table.set("feval", entry(lua, &wrap, &module, Module::feval)?)?;
    table.set("get", entry(lua, &wrap, &module, Module::get)?)?;
    table.set("set", entry(lua, &wrap, &module, Module::set)?)?;
    Ok(table)
}

/// Create the module table and expose it as a global and in
/// `package.loaded`, so both `octave.eval(...)` and `require("octave")` work.
pub fn register<N>(lua: &Lua, numeric: N, config: BridgeConfig) -> mlua::Result<Table>
where
    N: NumericRuntime + 'static,
{
    let name = config.module_name.clone();
    let table = open(lua, numeric, config)?;
    lua.globals().set(name.as_str(), table.clone())?;
    let package: Table = lua.globals().get("package")?;
    let loaded: Table = package.get("loaded")?;
    loaded.set(name.as_str(), table.clone())?;
    Ok(table)
}

// ==================== Argument Checks ====================

/// `luaL_checkstring`: strings and numbers are accepted, numbers formatted
/// as Lua formats them (`2.0` stays `"2.0"`).
fn check_string(lua: &Lua, op: &'static str, args: &MultiValue, pos: usize) -> BridgeResult<String> {
    let arg = args.get(pos - 1);
    let text = match arg {
        Some(v @ (Value::String(_) | Value::Integer(_) | Value::Number(_))) => {
            lua.coerce_string(v.clone()).ok().flatten()
        }
        _ => None,
    };
    match text {
        Some(s) => Ok(s.to_string_lossy().to_string()),
        None => Err(BridgeError::InvalidArgument {
            op,
            message: format!(
                "bad argument #{pos} (string expected, got {})",
                arg.map_or("no value", Value::type_name)
            ),
        }),
    }
}

/// Optional non-negative integer argument (`luaL_optinteger`); absent or
/// `nil` gives `default`. Numeric strings are coerced.
fn opt_count(lua: &Lua, op: &'static str, args: &MultiValue, pos: usize, default: usize) -> BridgeResult<usize> {
    let bad = |what: &str| BridgeError::InvalidArgument {
        op,
        message: format!("bad argument #{pos} ({what})"),
    };
    let n = match args.get(pos - 1) {
        None | Some(Value::Nil) => return Ok(default),
        Some(v) => match lua.coerce_integer(v.clone()) {
            Ok(Some(i)) => i,
            _ if matches!(lua.coerce_number(v.clone()), Ok(Some(_))) => {
                return Err(bad("number has no integer representation"))
            }
            _ => return Err(bad(&format!("number expected, got {}", v.type_name()))),
        },
    };
    usize::try_from(n).map_err(|_| bad("non-negative integer expected"))
}
