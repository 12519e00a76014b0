//! Interfaces of the two embedded runtimes, as seen by the bridge.
//!
//! Both runtimes are single-threaded. Methods take `&self` so a call can
//! re-enter the same runtime through the other one (forward → reverse →
//! forward); implementations keep their state behind `Cell`/`RefCell` and
//! must not hold a borrow across a call into user code.

use std::rc::Rc;

use crate::error::{NumericFault, ScriptFault};
use crate::value::{NumericValue, ScriptValue};

/// Native function installed into the numeric runtime's function namespace.
///
/// Receives the call's arguments and the number of requested outputs.
pub type Builtin = Rc<dyn Fn(&[NumericValue], usize) -> Result<Vec<NumericValue>, NumericFault>>;

/// The numeric (matrix) runtime.
pub trait NumericRuntime {
    /// Finish interpreter startup (startup files, path setup).
    fn start(&self) -> Result<(), NumericFault>;

    /// Evaluate `code`, returning up to `nargout` produced values in order.
    fn eval(&self, code: &str, nargout: usize) -> Result<Vec<NumericValue>, NumericFault>;

    /// Call the function `name`, requesting up to `nargout` outputs.
    fn feval(
        &self,
        name: &str,
        args: &[NumericValue],
        nargout: usize,
    ) -> Result<Vec<NumericValue>, NumericFault>;

    /// Value of a global variable, `NumericValue::Undefined` when unbound.
    fn global_value(&self, name: &str) -> NumericValue;

    /// Bind a global variable, overwriting any prior binding.
    fn global_assign(&self, name: &str, value: NumericValue);

    fn install_builtin(&self, name: &str, builtin: Builtin);

    /// Hand an execution fault to the runtime's own diagnostic channel.
    fn report(&self, fault: &NumericFault);
}

/// The scripting (Lua) runtime, as needed by reverse calls.
pub trait ScriptRuntime {
    /// Call the global function `name`, returning every value it produced.
    fn call_global(&self, name: &str, args: Vec<ScriptValue>) -> Result<Vec<ScriptValue>, ScriptFault>;
}

impl<T: NumericRuntime + ?Sized> NumericRuntime for Rc<T> {
    fn start(&self) -> Result<(), NumericFault> {
        (**self).start()
    }

    fn eval(&self, code: &str, nargout: usize) -> Result<Vec<NumericValue>, NumericFault> {
        (**self).eval(code, nargout)
    }

    fn feval(
        &self,
        name: &str,
        args: &[NumericValue],
        nargout: usize,
    ) -> Result<Vec<NumericValue>, NumericFault> {
        (**self).feval(name, args, nargout)
    }

    fn global_value(&self, name: &str) -> NumericValue {
        (**self).global_value(name)
    }

    fn global_assign(&self, name: &str, value: NumericValue) {
        (**self).global_assign(name, value)
    }

    fn install_builtin(&self, name: &str, builtin: Builtin) {
        (**self).install_builtin(name, builtin)
    }

    fn report(&self, fault: &NumericFault) {
        (**self).report(fault)
    }
}
