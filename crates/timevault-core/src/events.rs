//! Observable vault events

use crate::types::{Amount, Timestamp};
use serde::{Deserialize, Serialize};

/// Events emitted by a vault
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum VaultEvent {
    /// The full balance was released to the owner
    Withdrawal {
        /// Amount transferred
        amount: Amount,
        /// Logical time of the withdrawal
        when: Timestamp,
    },
}

impl VaultEvent {
    pub fn amount(&self) -> Amount {
        match self {
            VaultEvent::Withdrawal { amount, .. } => *amount,
        }
    }

    pub fn when(&self) -> Timestamp {
        match self {
            VaultEvent::Withdrawal { when, .. } => *when,
        }
    }
}

/// Append-only event log, queryable by external monitors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventLog(Vec<VaultEvent>);

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, event: VaultEvent) {
        self.0.push(event);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VaultEvent> {
        self.0.iter()
    }

    pub fn latest(&self) -> Option<&VaultEvent> {
        self.0.last()
    }

    /// Events after `cursor`. A monitor keeps `cursor = log.len()` between reads.
    pub fn since(&self, cursor: usize) -> &[VaultEvent] {
        self.0.get(cursor..).unwrap_or(&[])
    }
}
