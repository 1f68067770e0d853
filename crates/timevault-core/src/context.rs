//! Ambient transaction context.

use crate::types::{Address, Timestamp};
use serde::{Deserialize, Serialize};

/// Who is calling and when.
///
/// Passed explicitly into every state-mutating vault operation so the vault
/// never reads a global clock or caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// Identity that invoked the current operation
    pub caller: Address,
    /// Current logical time
    pub now: Timestamp,
}

impl ExecutionContext {
    pub fn new(caller: Address, now: Timestamp) -> Self {
        Self { caller, now }
    }
}
