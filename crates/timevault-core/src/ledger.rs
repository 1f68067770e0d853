//! In-memory hosting environment.
//!
//! The ledger supplies everything the vault treats as external: a monotonic
//! logical clock, caller identities, external account balances and the value
//! transfer. Each method is one serialized transaction.

use crate::context::ExecutionContext;
use crate::events::VaultEvent;
use crate::transfer::{TransferError, ValueTransfer};
use crate::types::{Address, Amount, Timestamp};
use crate::vault::{Vault, VaultError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors from ledger transactions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: Amount, available: Amount },

    #[error("Clock cannot go backwards (now {now}, requested {requested})")]
    ClockWentBackwards { now: Timestamp, requested: Timestamp },

    #[error("Arithmetic overflow")]
    Overflow,

    #[error(transparent)]
    Vault(#[from] VaultError),
}

/// External accounts plus the logical clock
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    clock: Timestamp,
    #[serde(default)]
    accounts: BTreeMap<Address, Amount>,
    /// Vault deployments per creator, for address derivation
    #[serde(default)]
    nonces: BTreeMap<Address, u64>,
}

impl Ledger {
    /// Create an empty ledger starting at `start`
    pub fn new(start: Timestamp) -> Self {
        Self {
            clock: start,
            ..Self::default()
        }
    }

    pub fn now(&self) -> Timestamp {
        self.clock
    }

    /// Move the clock to `t`. The clock never goes backwards.
    pub fn set_time(&mut self, t: Timestamp) -> Result<(), LedgerError> {
        if t < self.clock {
            return Err(LedgerError::ClockWentBackwards {
                now: self.clock,
                requested: t,
            });
        }
        self.clock = t;
        Ok(())
    }

    /// Advance the clock by `secs` and return the new time.
    pub fn advance(&mut self, secs: u64) -> Result<Timestamp, LedgerError> {
        self.clock = self
            .clock
            .checked_add_secs(secs)
            .ok_or(LedgerError::Overflow)?;
        Ok(self.clock)
    }

    /// Build the context for a call by `caller` at the current time.
    pub fn context(&self, caller: Address) -> ExecutionContext {
        ExecutionContext::new(caller, self.clock)
    }

    pub fn balance_of(&self, address: &Address) -> Amount {
        self.accounts.get(address).copied().unwrap_or_default()
    }

    /// All accounts with a recorded balance
    pub fn accounts(&self) -> impl Iterator<Item = (&Address, &Amount)> {
        self.accounts.iter()
    }

    /// Credit an external account. Returns the new balance.
    pub fn credit(&mut self, address: Address, amount: Amount) -> Result<Amount, LedgerError> {
        let balance = self
            .balance_of(&address)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        self.accounts.insert(address, balance);
        Ok(balance)
    }

    /// Deploy a vault funded from `creator`'s account.
    ///
    /// Funds leave the creator only if construction succeeds.
    pub fn deploy(
        &mut self,
        creator: Address,
        unlock_time: Timestamp,
        funds: Amount,
    ) -> Result<Vault, LedgerError> {
        let available = self.balance_of(&creator);
        let remaining = available
            .checked_sub(funds)
            .ok_or(LedgerError::InsufficientFunds {
                needed: funds,
                available,
            })?;

        let nonce = self.nonces.get(&creator).copied().unwrap_or(0);
        let next_nonce = nonce.checked_add(1).ok_or(LedgerError::Overflow)?;
        let address = Address::derive_vault(&creator, nonce);

        let vault = Vault::create(&self.context(creator), address, unlock_time, funds)?;

        self.accounts.insert(creator, remaining);
        self.nonces.insert(creator, next_nonce);
        Ok(vault)
    }

    /// Extend `vault`'s lock as `caller`.
    pub fn extend(
        &self,
        vault: &mut Vault,
        caller: Address,
        new_unlock_time: Timestamp,
    ) -> Result<(), LedgerError> {
        vault.extend(&self.context(caller), new_unlock_time)?;
        Ok(())
    }

    /// Withdraw from `vault` as `caller`, crediting the owner's account.
    pub fn withdraw(&mut self, vault: &mut Vault, caller: Address) -> Result<VaultEvent, LedgerError> {
        let ctx = self.context(caller);
        Ok(vault.withdraw(&ctx, self)?)
    }
}

impl ValueTransfer for Ledger {
    fn transfer(
        &mut self,
        _vault: &mut Vault,
        _ctx: &ExecutionContext,
        to: Address,
        amount: Amount,
    ) -> Result<(), TransferError> {
        self.credit(to, amount).map_err(|_| TransferError::Overflow)?;
        Ok(())
    }
}
