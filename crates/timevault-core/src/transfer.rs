//! The external value-transfer seam.
//!
//! Moving value out of a vault hands control to the host, and through it to
//! the recipient. A recipient may run arbitrary logic before control returns,
//! including calling back into the same vault, so the transfer receives the
//! vault it is paying out of.

use crate::context::ExecutionContext;
use crate::types::{Address, Amount};
use crate::vault::Vault;
use thiserror::Error;

/// Errors from the host's value transfer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("Transfer rejected by recipient: {0}")]
    Rejected(String),

    #[error("Recipient balance overflow")]
    Overflow,
}

/// Host mechanism that credits value to an external account.
pub trait ValueTransfer {
    /// Move `amount` out of `vault` to `to`.
    ///
    /// By the time this is called the vault has already committed its
    /// post-transfer state. Returning an error aborts the calling operation.
    fn transfer(
        &mut self,
        vault: &mut Vault,
        ctx: &ExecutionContext,
        to: Address,
        amount: Amount,
    ) -> Result<(), TransferError>;
}
