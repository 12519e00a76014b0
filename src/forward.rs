//! Lua → numeric entry points: `eval`, `feval`, `get`, `set`.
//!
//! Every entry follows the same contract:
//!
//! 1. Ensure the runtime gate is ready (booting the numeric runtime once)
//! 2. Convert arguments; the first bad one aborts before any invocation
//! 3. Run the operation in the numeric runtime
//! 4. Convert every result; the first bad one fails the whole call
//!
//! No partial results are returned once anything fails. Side effects the
//! numeric runtime already performed are not rolled back.

use std::rc::Rc;

use tracing::{debug, warn};

use crate::convert::{numeric_to_script, script_to_numeric};
use crate::error::{BridgeError, BridgeResult, NumericFault};
use crate::gate::{BootFailure, RuntimeGate, STATUS_EXIT, STATUS_FAULT};
use crate::runtime::{Builtin, NumericRuntime};
use crate::value::{NumericValue, ScriptValue};

/// Results captured per call unless the caller asks otherwise.
pub const DEFAULT_MAX_RESULTS: usize = 256;

pub struct ForwardBridge<N> {
    numeric: N,
    gate: Rc<RuntimeGate>,
    /// Reverse-call primitive installed during boot.
    reverse: Option<(String, Builtin)>,
}

impl<N: NumericRuntime> ForwardBridge<N> {
    pub fn new(numeric: N, gate: Rc<RuntimeGate>) -> Self {
        Self {
            numeric,
            gate,
            reverse: None,
        }
    }

    /// Install `builtin` under `name` when the numeric runtime boots.
    pub fn with_reverse_builtin(mut self, name: impl Into<String>, builtin: Builtin) -> Self {
        self.reverse = Some((name.into(), builtin));
        self
    }

    pub fn gate(&self) -> &RuntimeGate {
        &self.gate
    }

    pub fn numeric(&self) -> &N {
        &self.numeric
    }

    // ==================== Entry Points ====================

    /// Evaluate `code`, returning up to `max_results` converted values.
    pub fn eval(&self, code: &str, max_results: usize) -> BridgeResult<Vec<ScriptValue>> {
        const OP: &str = "eval";
        self.ready(OP)?;
        if code.is_empty() {
            return Ok(Vec::new());
        }
        debug!(op = OP, max_results, "forward call");

        let produced = self
            .numeric
            .eval(code, max_results)
            .map_err(|fault| self.execution_failed(OP, fault))?;
        export(OP, produced, max_results)
    }

    /// Call the numeric function `name` with converted `args`.
    pub fn call_named(
        &self,
        name: &str,
        args: &[ScriptValue],
        max_results: usize,
    ) -> BridgeResult<Vec<ScriptValue>> {
        const OP: &str = "feval";
        self.ready(OP)?;
        if name.is_empty() {
            return Err(BridgeError::InvalidArgument {
                op: OP,
                message: "expected function name".into(),
            });
        }

        let inputs = args
            .iter()
            .enumerate()
            .map(|(i, arg)| {
                script_to_numeric(arg).map_err(|err| BridgeError::InvalidArgument {
                    op: OP,
                    message: format!("invalid argument #{} in call to function '{name}' ({err})", i + 1),
                })
            })
            .collect::<BridgeResult<Vec<NumericValue>>>()?;
        debug!(op = OP, name, args = inputs.len(), max_results, "forward call");

        let produced = self
            .numeric
            .feval(name, &inputs, max_results)
            .map_err(|fault| self.execution_failed(OP, fault))?;
        export(OP, produced, max_results)
    }

    /// Read the numeric global `name`.
    pub fn get_global(&self, name: &str) -> BridgeResult<ScriptValue> {
        const OP: &str = "get";
        self.ready(OP)?;
        let value = self.numeric.global_value(name);
        numeric_to_script(&value).map_err(|err| BridgeError::UnconvertibleResult {
            op: OP,
            message: format!("unknown numeric value '{name}' ({err})"),
        })
    }

    /// Bind the numeric global `name`. Returns the success marker.
    pub fn set_global(&self, name: &str, value: &ScriptValue) -> BridgeResult<bool> {
        const OP: &str = "set";
        self.ready(OP)?;
        let value = script_to_numeric(value).map_err(|err| BridgeError::InvalidArgument {
            op: OP,
            message: format!("cannot assign '{name}' ({err})"),
        })?;
        self.numeric.global_assign(name, value);
        Ok(true)
    }

    // ==================== Internal Helpers ====================

    fn ready(&self, op: &'static str) -> BridgeResult<()> {
        self.gate.ensure_ready(op, || self.boot())
    }

    fn boot(&self) -> Result<(), BootFailure> {
        if let Some((name, builtin)) = &self.reverse {
            self.numeric.install_builtin(name, Rc::clone(builtin));
        }
        match self.numeric.start() {
            Ok(()) => Ok(()),
            Err(NumericFault::Exit(status)) => {
                warn!(status, "numeric interpreter exited during startup");
                Err(BootFailure { status: STATUS_EXIT })
            }
            Err(fault) => {
                self.numeric.report(&fault);
                Err(BootFailure { status: STATUS_FAULT })
            }
        }
    }

    fn execution_failed(&self, op: &'static str, fault: NumericFault) -> BridgeError {
        let message = match &fault {
            NumericFault::Exit(status) => {
                warn!(op, status, "numeric interpreter exited");
                format!("numeric interpreter exited with status {status}")
            }
            NumericFault::Execution(msg) => {
                self.numeric.report(&fault);
                format!("numeric runtime error: {msg}")
            }
        };
        BridgeError::ExecutionFailed { op, message }
    }
}

fn export(op: &'static str, produced: Vec<NumericValue>, max_results: usize) -> BridgeResult<Vec<ScriptValue>> {
    produced
        .iter()
        .take(max_results)
        .enumerate()
        .map(|(i, value)| {
            numeric_to_script(value).map_err(|err| BridgeError::UnconvertibleResult {
                op,
                message: format!("unknown numeric value in result #{} ({err})", i + 1),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::GateState;
    use crate::value::Matrix;
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;

    /// Numeric runtime whose only function is `sum`; `eval` returns the
    /// globals named in `code`, separated by commas.
    #[derive(Default)]
    struct Numeric {
        globals: RefCell<HashMap<String, NumericValue>>,
        starts: Cell<usize>,
        calls: Cell<usize>,
        reported: RefCell<Vec<NumericFault>>,
        start_fault: Option<NumericFault>,
    }

    impl NumericRuntime for Numeric {
        fn start(&self) -> Result<(), NumericFault> {
            self.starts.set(self.starts.get() + 1);
            self.start_fault.clone().map_or(Ok(()), Err)
        }

        fn eval(&self, code: &str, nargout: usize) -> Result<Vec<NumericValue>, NumericFault> {
            if code == "exit" {
                return Err(NumericFault::Exit(3));
            }
            code.split(',')
                .take(nargout)
                .map(|name| match self.global_value(name.trim()) {
                    NumericValue::Undefined => {
                        Err(NumericFault::Execution(format!("'{}' undefined", name.trim())))
                    }
                    value => Ok(value),
                })
                .collect()
        }

        fn feval(&self, name: &str, args: &[NumericValue], _: usize) -> Result<Vec<NumericValue>, NumericFault> {
            self.calls.set(self.calls.get() + 1);
            if name != "sum" {
                return Err(NumericFault::Execution(format!("'{name}' undefined")));
            }
            let total: f64 = args
                .iter()
                .filter_map(NumericValue::as_matrix)
                .flat_map(|m| m.row_major().collect::<Vec<_>>())
                .sum();
            Ok(vec![NumericValue::scalar(total)])
        }

        fn global_value(&self, name: &str) -> NumericValue {
            self.globals
                .borrow()
                .get(name)
                .cloned()
                .unwrap_or(NumericValue::Undefined)
        }

        fn global_assign(&self, name: &str, value: NumericValue) {
            self.globals.borrow_mut().insert(name.to_string(), value);
        }

        fn install_builtin(&self, _: &str, _: Builtin) {}

        fn report(&self, fault: &NumericFault) {
            self.reported.borrow_mut().push(fault.clone());
        }
    }

    fn bridge(numeric: Numeric) -> ForwardBridge<Rc<Numeric>> {
        ForwardBridge::new(Rc::new(numeric), Rc::new(RuntimeGate::new()))
    }

    #[test]
    fn empty_code_returns_nothing() {
        let fwd = bridge(Numeric::default());
        assert_eq!(fwd.eval("", DEFAULT_MAX_RESULTS).unwrap(), vec![]);
        assert_eq!(fwd.gate().state(), GateState::Ready);
    }

    #[test]
    fn eval_converts_each_result() {
        let fwd = bridge(Numeric::default());
        fwd.set_global("a", &ScriptValue::Number(2.0)).unwrap();
        fwd.set_global("b", &ScriptValue::list(&[1.0, 2.0])).unwrap();
        assert_eq!(
            fwd.eval("a, b", DEFAULT_MAX_RESULTS).unwrap(),
            vec![ScriptValue::Number(2.0), ScriptValue::list(&[1.0, 2.0])]
        );
        assert_eq!(fwd.eval("a, b", 1).unwrap(), vec![ScriptValue::Number(2.0)]);
    }

    #[test]
    fn eval_fault_is_reported_and_fails() {
        let fwd = bridge(Numeric::default());
        let err = fwd.eval("missing", DEFAULT_MAX_RESULTS).unwrap_err();
        assert!(matches!(err, BridgeError::ExecutionFailed { op: "eval", .. }));
        assert_eq!(fwd.numeric().reported.borrow().len(), 1);
    }

    #[test]
    fn exit_request_fails_without_report() {
        let fwd = bridge(Numeric::default());
        let err = fwd.eval("exit", DEFAULT_MAX_RESULTS).unwrap_err();
        assert_eq!(
            err,
            BridgeError::ExecutionFailed {
                op: "eval",
                message: "numeric interpreter exited with status 3".into(),
            }
        );
        assert!(fwd.numeric().reported.borrow().is_empty());
    }

    #[test]
    fn unconvertible_result_discards_everything() {
        let fwd = bridge(Numeric::default());
        fwd.set_global("a", &ScriptValue::Number(1.0)).unwrap();
        fwd.numeric()
            .global_assign("z", NumericValue::Complex { rows: 1, cols: 1 });
        let err = fwd.eval("a, z", DEFAULT_MAX_RESULTS).unwrap_err();
        assert_eq!(
            err.to_string(),
            "eval: unknown numeric value in result #2 (complex values are not supported)"
        );
    }

    #[test]
    fn call_named_converts_arguments() {
        let fwd = bridge(Numeric::default());
        let args = [ScriptValue::Number(1.0), ScriptValue::rows(&[[1.0, 2.0], [3.0, 4.0]])];
        assert_eq!(
            fwd.call_named("sum", &args, DEFAULT_MAX_RESULTS).unwrap(),
            vec![ScriptValue::Number(11.0)]
        );
    }

    #[test]
    fn bad_argument_aborts_before_invocation() {
        let fwd = bridge(Numeric::default());
        let args = [
            ScriptValue::Number(1.0),
            ScriptValue::Table(vec![ScriptValue::Number(1.0), ScriptValue::list(&[2.0, 3.0])]),
        ];
        let err = fwd.call_named("sum", &args, DEFAULT_MAX_RESULTS).unwrap_err();
        match err {
            BridgeError::InvalidArgument { op, message } => {
                assert_eq!(op, "feval");
                assert!(message.starts_with("invalid argument #2 in call to function 'sum'"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(fwd.numeric().calls.get(), 0);
    }

    #[test]
    fn empty_name_rejected() {
        let fwd = bridge(Numeric::default());
        assert!(matches!(
            fwd.call_named("", &[], DEFAULT_MAX_RESULTS),
            Err(BridgeError::InvalidArgument { op: "feval", .. })
        ));
    }

    #[test]
    fn get_and_set_globals() {
        let fwd = bridge(Numeric::default());
        assert_eq!(fwd.set_global("m", &ScriptValue::rows(&[[1.0, 2.0], [3.0, 4.0]])), Ok(true));
        assert_eq!(
            fwd.numeric().global_value("m"),
            NumericValue::Matrix(Matrix::from_rows(&[[1.0, 2.0], [3.0, 4.0]]).unwrap())
        );
        assert_eq!(fwd.get_global("m").unwrap(), ScriptValue::rows(&[[1.0, 2.0], [3.0, 4.0]]));

        fwd.set_global("m", &ScriptValue::Number(7.0)).unwrap();
        assert_eq!(fwd.get_global("m").unwrap(), ScriptValue::Number(7.0));
    }

    #[test]
    fn get_unbound_global_fails() {
        let fwd = bridge(Numeric::default());
        assert!(matches!(
            fwd.get_global("nope"),
            Err(BridgeError::UnconvertibleResult { op: "get", .. })
        ));
    }

    #[test]
    fn set_rejects_unconvertible_value() {
        let fwd = bridge(Numeric::default());
        assert!(matches!(
            fwd.set_global("s", &ScriptValue::Text("abc".into())),
            Err(BridgeError::InvalidArgument { op: "set", .. })
        ));
        assert_eq!(fwd.numeric().global_value("s"), NumericValue::Undefined);
    }

    #[test]
    fn failed_boot_is_never_retried() {
        let fwd = bridge(Numeric {
            start_fault: Some(NumericFault::Execution("startup file broken".into())),
            ..Default::default()
        });
        for _ in 0..3 {
            assert_eq!(
                fwd.eval("", DEFAULT_MAX_RESULTS),
                Err(BridgeError::RuntimeNotReady { op: "eval" })
            );
        }
        assert!(fwd.get_global("x").is_err());
        assert_eq!(fwd.numeric().starts.get(), 1);
        assert_eq!(fwd.gate().state(), GateState::Failed(STATUS_FAULT));
        assert_eq!(fwd.numeric().reported.borrow().len(), 1);
    }

    #[test]
    fn exit_during_boot_records_exit_status() {
        let fwd = bridge(Numeric {
            start_fault: Some(NumericFault::Exit(0)),
            ..Default::default()
        });
        assert!(fwd.eval("a", DEFAULT_MAX_RESULTS).is_err());
        assert_eq!(fwd.gate().state(), GateState::Failed(STATUS_EXIT));
    }

    #[test]
    fn injected_failed_gate_blocks_without_boot() {
        let numeric = Rc::new(Numeric::default());
        let gate = Rc::new(RuntimeGate::with_state(GateState::Failed(STATUS_FAULT)));
        let fwd = ForwardBridge::new(Rc::clone(&numeric), gate);
        assert!(fwd.call_named("sum", &[], DEFAULT_MAX_RESULTS).is_err());
        assert_eq!(numeric.starts.get(), 0);
        assert_eq!(numeric.calls.get(), 0);
    }
}
