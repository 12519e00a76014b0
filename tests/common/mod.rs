//! In-memory numeric runtime used by the integration tests.
//!
//! `eval` understands a tiny comma-separated language, one item per produced
//! value:
//!
//! - `name`      the global `name`, or the outputs of function `name()`
//! - `name = x`  assign the number `x`, produces nothing
//! - `exit`      exit request with status 1
//!
//! Functions are Rust closures; user functions get the runtime itself so
//! they can call back into Lua through `lua_call`.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use octlua::{Builtin, Matrix, NumericFault, NumericRuntime, NumericValue};

pub type UserFn = Rc<dyn Fn(&FakeNumeric, &[NumericValue], usize) -> Result<Vec<NumericValue>, NumericFault>>;

#[derive(Clone)]
enum Callable {
    Builtin(Builtin),
    User(UserFn),
}

#[derive(Default)]
pub struct FakeNumeric {
    functions: RefCell<HashMap<String, Callable>>,
    globals: RefCell<HashMap<String, NumericValue>>,
    start_fault: RefCell<Option<NumericFault>>,
    pub starts: Cell<usize>,
    /// Every function called through `feval`, in order.
    pub invocations: RefCell<Vec<String>>,
    pub reported: RefCell<Vec<NumericFault>>,
}

impl FakeNumeric {
    pub fn new() -> Rc<Self> {
        let rt = Rc::new(Self::default());
        rt.define("plus", |_, args, _| {
            let [a, b] = args else {
                return Err(NumericFault::Execution("Invalid call to plus".into()));
            };
            elementwise(a, b, |x, y| x + y)
        });
        rt.define("times", |_, args, _| {
            let [a, b] = args else {
                return Err(NumericFault::Execution("Invalid call to times".into()));
            };
            elementwise(a, b, |x, y| x * y)
        });
        rt.define("triple", |_, _, nargout| {
            Ok([1.0, 2.0, 3.0].into_iter().take(nargout).map(NumericValue::scalar).collect())
        });
        rt
    }

    /// A runtime whose startup fails with `fault`.
    pub fn failing(fault: NumericFault) -> Rc<Self> {
        let rt = Self::new();
        *rt.start_fault.borrow_mut() = Some(fault);
        rt
    }

    pub fn define<F>(&self, name: &str, f: F)
    where
        F: Fn(&FakeNumeric, &[NumericValue], usize) -> Result<Vec<NumericValue>, NumericFault> + 'static,
    {
        self.functions
            .borrow_mut()
            .insert(name.to_string(), Callable::User(Rc::new(f)));
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.borrow().contains_key(name)
    }

    pub fn invoked(&self, name: &str) -> usize {
        self.invocations.borrow().iter().filter(|n| *n == name).count()
    }

    fn eval_item(&self, item: &str, nargout: usize) -> Result<Vec<NumericValue>, NumericFault> {
        if item == "exit" {
            return Err(NumericFault::Exit(1));
        }
        if let Some((name, rhs)) = item.split_once('=') {
            let x: f64 = rhs
                .trim()
                .parse()
                .map_err(|_| NumericFault::Execution(format!("parse error near '{rhs}'")))?;
            self.global_assign(name.trim(), NumericValue::scalar(x));
            return Ok(Vec::new());
        }
        match self.global_value(item) {
            NumericValue::Undefined if self.has_function(item) => self.feval(item, &[], nargout),
            NumericValue::Undefined => Err(NumericFault::Execution(format!("'{item}' undefined"))),
            value => Ok(vec![value]),
        }
    }
}

impl NumericRuntime for FakeNumeric {
    fn start(&self) -> Result<(), NumericFault> {
        self.starts.set(self.starts.get() + 1);
        match self.start_fault.borrow().clone() {
            Some(fault) => Err(fault),
            None => Ok(()),
        }
    }

    fn eval(&self, code: &str, nargout: usize) -> Result<Vec<NumericValue>, NumericFault> {
        let mut out = Vec::new();
        for item in code.split(',').map(str::trim) {
            out.extend(self.eval_item(item, nargout)?);
        }
        out.truncate(nargout);
        Ok(out)
    }

    fn feval(&self, name: &str, args: &[NumericValue], nargout: usize) -> Result<Vec<NumericValue>, NumericFault> {
        self.invocations.borrow_mut().push(name.to_string());
        let callable = self.functions.borrow().get(name).cloned();
        match callable {
            Some(Callable::Builtin(f)) => f(args, nargout),
            Some(Callable::User(f)) => f(self, args, nargout),
            None => Err(NumericFault::Execution(format!("'{name}' undefined"))),
        }
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

    fn install_builtin(&self, name: &str, builtin: Builtin) {
        self.functions
            .borrow_mut()
            .insert(name.to_string(), Callable::Builtin(builtin));
    }

    fn report(&self, fault: &NumericFault) {
        self.reported.borrow_mut().push(fault.clone());
    }
}

/// Elementwise binary operation with scalar broadcasting.
fn elementwise(a: &NumericValue, b: &NumericValue, op: impl Fn(f64, f64) -> f64) -> Result<Vec<NumericValue>, NumericFault> {
    let (Some(a), Some(b)) = (a.as_matrix(), b.as_matrix()) else {
        return Err(NumericFault::Execution("binary operator: invalid operands".into()));
    };
    let (shape, scalar_a, scalar_b) = match (a.rows() * a.cols(), b.rows() * b.cols()) {
        (1, _) => (b, true, false),
        (_, 1) => (a, false, true),
        _ if a.rows() == b.rows() && a.cols() == b.cols() => (a, false, false),
        _ => return Err(NumericFault::Execution("nonconformant arguments".into())),
    };
    let mut out = Matrix::zeros(shape.rows(), shape.cols());
    for i in 0..shape.rows() {
        for j in 0..shape.cols() {
            let x = if scalar_a { a.get(0, 0) } else { a.get(i, j) };
            let y = if scalar_b { b.get(0, 0) } else { b.get(i, j) };
            out.set(i, j, op(x, y));
        }
    }
    Ok(vec![NumericValue::Matrix(out)])
}

/// Route test logs through the test harness when `RUST_LOG` is set.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
