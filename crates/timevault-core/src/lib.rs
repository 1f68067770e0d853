//! TimeVault Core
//!
//! A single-owner vault that holds native value until an unlock time.
//!
//! # Concepts
//!
//! - **Owner**: the creator; the only identity that can extend or withdraw
//! - **Unlock time**: withdrawal is permitted at or after this timestamp
//! - **Extend**: the owner pushes the unlock time later, never earlier
//! - **Withdraw**: the whole balance goes to the owner, exactly once
//!
//! Clock and caller are never read from ambient state. Every mutating
//! operation takes an [`ExecutionContext`], and value leaves the vault through
//! the host's [`ValueTransfer`].
//!
//! # Example
//!
//! ```
//! use timevault_core::{Address, Amount, Ledger, Timestamp};
//!
//! let owner = Address::from_bytes([1; 20]);
//! let mut ledger = Ledger::new(Timestamp::from_secs(1_700_000_000));
//! ledger.credit(owner, Amount::from_ether(1)).unwrap();
//!
//! let unlock = Timestamp::from_secs(1_700_003_600);
//! let mut vault = ledger.deploy(owner, unlock, Amount::from_gwei(1)).unwrap();
//! assert!(ledger.withdraw(&mut vault, owner).is_err());
//!
//! ledger.set_time(unlock).unwrap();
//! let event = ledger.withdraw(&mut vault, owner).unwrap();
//! assert_eq!(event.amount(), Amount::from_gwei(1));
//! ```

pub mod context;
pub mod events;
pub mod ledger;
pub mod state;
pub mod status;
pub mod transfer;
pub mod types;
pub mod vault;

pub use context::ExecutionContext;
pub use events::{EventLog, VaultEvent};
pub use ledger::{Ledger, LedgerError};
pub use state::{Deployment, StateError};
pub use status::{format_duration, LockStatus, StatusReport};
pub use transfer::{TransferError, ValueTransfer};
pub use types::{Address, Amount, ParseError, Timestamp};
pub use vault::{Vault, VaultError};
