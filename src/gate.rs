//! One-shot initialization guard for the numeric runtime.
//!
//! The first forward crossing boots the numeric runtime; the outcome is
//! cached for the rest of the process. A failed boot is never retried:
//! re-initializing an interpreter mid-process is unsafe, so every later
//! crossing fails with "runtime not initialized".

use std::cell::Cell;

use tracing::{debug, warn};

use crate::error::{BridgeError, BridgeResult};

/// Status code recorded when the runtime requested exit during boot.
pub const STATUS_EXIT: i32 = -1;
/// Status code recorded when boot raised an execution fault.
pub const STATUS_FAULT: i32 = -2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Uninitialized,
    /// Boot routine is running; crossings arriving now are refused.
    Booting,
    Ready,
    /// Boot failed with this status code.
    Failed(i32),
}

/// Boot failure reported by the boot routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootFailure {
    pub status: i32,
}

#[derive(Debug)]
pub struct RuntimeGate {
    state: Cell<GateState>,
}

impl Default for RuntimeGate {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeGate {
    pub fn new() -> Self {
        Self {
            state: Cell::new(GateState::Uninitialized),
        }
    }

    /// A gate that has already settled in `state`. Used to simulate hosts
    /// whose numeric runtime was booted (or failed) elsewhere.
    pub fn with_state(state: GateState) -> Self {
        Self {
            state: Cell::new(state),
        }
    }

    pub fn state(&self) -> GateState {
        self.state.get()
    }

    /// Run `boot` on the first call; afterwards return the cached outcome.
    pub fn ensure_ready<F>(&self, op: &'static str, boot: F) -> BridgeResult<()>
    where
        F: FnOnce() -> Result<(), BootFailure>,
    {
        if self.state.get() == GateState::Uninitialized {
            self.state.set(GateState::Booting);
            debug!(op, "booting numeric runtime");
            let next = match boot() {
                Ok(()) => GateState::Ready,
                Err(BootFailure { status }) => {
                    warn!(op, status, "numeric runtime failed to initialize");
                    GateState::Failed(status)
                }
            };
            self.state.set(next);
        }
        self.require_ready(op)
    }

    /// Succeed only if the gate has already reached `Ready`. Never boots.
    pub fn require_ready(&self, op: &'static str) -> BridgeResult<()> {
        match self.state.get() {
            GateState::Ready => Ok(()),
            _ => Err(BridgeError::RuntimeNotReady { op }),
        }
    }
}
