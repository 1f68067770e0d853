//! Lock status evaluation.
//!
//! Pure logic: takes a vault and a time, returns where the vault stands.
//!
//! ```text
//! |------------- Locked -------------|------ Unlockable ------|
//! created_at                    unlock_time              withdraw -> Drained
//! ```

use crate::types::{Address, Amount, Timestamp};
use crate::vault::Vault;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro-state of a vault at a given time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockStatus {
    /// Funds held, unlock time not reached
    Locked { remaining_secs: u64 },
    /// Funds held, owner may withdraw
    Unlockable,
    /// Balance is zero
    Drained,
}

impl LockStatus {
    pub fn evaluate(vault: &Vault, now: Timestamp) -> Self {
        if vault.is_drained() {
            LockStatus::Drained
        } else if now < vault.unlock_time() {
            LockStatus::Locked {
                remaining_secs: now.secs_until(vault.unlock_time()),
            }
        } else {
            LockStatus::Unlockable
        }
    }

    /// True while locked with at most `window_secs` left.
    pub fn warning_due(&self, window_secs: u64) -> bool {
        matches!(self, LockStatus::Locked { remaining_secs } if *remaining_secs <= window_secs)
    }
}

impl fmt::Display for LockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockStatus::Locked { remaining_secs } => {
                write!(f, "locked ({} remaining)", format_duration(*remaining_secs))
            }
            LockStatus::Unlockable => write!(f, "unlockable"),
            LockStatus::Drained => write!(f, "drained"),
        }
    }
}

impl Vault {
    pub fn status(&self, now: Timestamp) -> LockStatus {
        LockStatus::evaluate(self, now)
    }
}

/// Snapshot of a vault for display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub vault: Address,
    pub owner: Address,
    pub balance: Amount,
    pub unlock_time: Timestamp,
    pub now: Timestamp,
    pub status: LockStatus,
    pub withdrawals: usize,
}

impl StatusReport {
    pub fn new(vault: &Vault, now: Timestamp) -> Self {
        Self {
            vault: vault.address(),
            owner: vault.owner(),
            balance: vault.balance(),
            unlock_time: vault.unlock_time(),
            now,
            status: vault.status(now),
            withdrawals: vault.events().len(),
        }
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  Vault:        {}", self.vault)?;
        writeln!(f, "  Owner:        {}", self.owner)?;
        writeln!(f, "  Balance:      {}", self.balance)?;
        writeln!(f, "  Unlock time:  {} ({})", self.unlock_time, self.unlock_time.as_secs())?;
        writeln!(f, "  Now:          {} ({})", self.now, self.now.as_secs())?;
        writeln!(f, "  Status:       {}", self.status)?;
        write!(f, "  Withdrawals:  {}", self.withdrawals)
    }
}

/// `3725` -> `"1h 2m 5s"`, `90061` -> `"1d 1h 1m 1s"`
pub fn format_duration(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    if days > 0 {
        format!("{}d {}h {}m {}s", days, hours, minutes, seconds)
    } else if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
