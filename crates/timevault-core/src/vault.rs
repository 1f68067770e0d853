//! The timed vault state machine.
//!
//! A vault holds a native balance for a single owner until an unlock time.
//! The owner may push the unlock time later while funds remain, and may
//! withdraw the whole balance once the unlock time is reached.
//!
//! ```text
//!          extend                  time passes               withdraw
//! Locked <-------- Unlockable <--------------- Locked ... ------------> Drained
//! ```
//!
//! Withdrawal follows checks-effects-interactions: the balance is zeroed
//! before the host transfer runs, so a re-entrant call sees a drained vault.

use crate::context::ExecutionContext;
use crate::events::{EventLog, VaultEvent};
use crate::transfer::{TransferError, ValueTransfer};
use crate::types::{Address, Amount, Timestamp};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from vault operations. A failed operation never changes state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VaultError {
    #[error("Unlock time {unlock_time} is not after the current time {now}")]
    InvalidConstructionTime { unlock_time: Timestamp, now: Timestamp },

    #[error("Caller {caller} is not the vault owner")]
    Unauthorized { caller: Address },

    #[error("New unlock time {requested} must be after the current unlock time {current}")]
    InvalidTimeOrdering { current: Timestamp, requested: Timestamp },

    #[error("Vault is locked until {unlock_time} (now {now})")]
    NotYetUnlocked { unlock_time: Timestamp, now: Timestamp },

    #[error("Vault balance is zero, nothing to withdraw")]
    NothingToWithdraw,

    #[error("Vault has been drained")]
    Drained,

    #[error("Transfer failed: {0}")]
    TransferFailed(#[from] TransferError),
}

/// A single-owner, time-locked vault
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vault {
    address: Address,
    owner: Address,
    unlock_time: Timestamp,
    balance: Amount,
    created_at: Timestamp,
    #[serde(default)]
    events: EventLog,
}

impl Vault {
    /// Construct a vault funded with `funds`, owned by the caller.
    ///
    /// The host is responsible for moving `funds` out of the caller's account
    /// in the same transaction (see [`crate::Ledger::deploy`]).
    pub fn create(
        ctx: &ExecutionContext,
        address: Address,
        unlock_time: Timestamp,
        funds: Amount,
    ) -> Result<Self, VaultError> {
        if unlock_time <= ctx.now {
            return Err(VaultError::InvalidConstructionTime {
                unlock_time,
                now: ctx.now,
            });
        }

        log::info!(
            "Vault {} created by {}: {} locked until {}",
            address,
            ctx.caller,
            funds,
            unlock_time
        );

        Ok(Self {
            address,
            owner: ctx.caller,
            unlock_time,
            balance: funds,
            created_at: ctx.now,
            events: EventLog::new(),
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn unlock_time(&self) -> Timestamp {
        self.unlock_time
    }

    pub fn balance(&self) -> Amount {
        self.balance
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn is_drained(&self) -> bool {
        self.balance.is_zero()
    }

    /// Push the unlock time later. Owner only; strictly increasing.
    pub fn extend(
        &mut self,
        ctx: &ExecutionContext,
        new_unlock_time: Timestamp,
    ) -> Result<(), VaultError> {
        self.ensure_owner(ctx)?;

        if self.is_drained() {
            return Err(VaultError::Drained);
        }

        if new_unlock_time <= self.unlock_time {
            return Err(VaultError::InvalidTimeOrdering {
                current: self.unlock_time,
                requested: new_unlock_time,
            });
        }

        log::info!(
            "Vault {} unlock time extended: {} -> {}",
            self.address,
            self.unlock_time,
            new_unlock_time
        );
        self.unlock_time = new_unlock_time;
        Ok(())
    }

    /// Release the whole balance to the owner.
    ///
    /// Permitted when `ctx.now >= unlock_time`. If the transfer fails, the
    /// vault is restored to its state before the call.
    pub fn withdraw(
        &mut self,
        ctx: &ExecutionContext,
        transfer: &mut dyn ValueTransfer,
    ) -> Result<VaultEvent, VaultError> {
        // Checks
        self.ensure_owner(ctx)?;

        if ctx.now < self.unlock_time {
            return Err(VaultError::NotYetUnlocked {
                unlock_time: self.unlock_time,
                now: ctx.now,
            });
        }

        if self.is_drained() {
            return Err(VaultError::NothingToWithdraw);
        }

        // Effects
        let snapshot = self.clone();
        let amount = std::mem::take(&mut self.balance);

        // Interactions
        let owner = self.owner;
        if let Err(e) = transfer.transfer(self, ctx, owner, amount) {
            log::warn!(
                "Vault {} withdrawal of {} rolled back: {}",
                self.address,
                amount,
                e
            );
            *self = snapshot;
            return Err(VaultError::TransferFailed(e));
        }

        let event = VaultEvent::Withdrawal {
            amount,
            when: ctx.now,
        };
        self.events.push(event);

        log::info!(
            "Vault {} withdrawn: {} to {} at {}",
            self.address,
            amount,
            owner,
            ctx.now
        );
        Ok(event)
    }

    fn ensure_owner(&self, ctx: &ExecutionContext) -> Result<(), VaultError> {
        if ctx.caller != self.owner {
            log::warn!(
                "Vault {}: rejected call from non-owner {}",
                self.address,
                ctx.caller
            );
            return Err(VaultError::Unauthorized { caller: ctx.caller });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: u64 = 1_700_000_000;

    fn owner() -> Address {
        Address::from_bytes([1; 20])
    }

    fn stranger() -> Address {
        Address::from_bytes([2; 20])
    }

    fn vault_address() -> Address {
        Address::from_bytes([9; 20])
    }

    fn ctx(caller: Address, now: u64) -> ExecutionContext {
        ExecutionContext::new(caller, Timestamp::from_secs(now))
    }

    fn make_vault(lock_secs: u64, funds: Amount) -> Vault {
        Vault::create(
            &ctx(owner(), NOW),
            vault_address(),
            Timestamp::from_secs(NOW + lock_secs),
            funds,
        )
        .unwrap()
    }

    /// Records every transfer it is asked to make.
    #[derive(Default)]
    struct RecordingTransfer {
        sent: Vec<(Address, Amount)>,
    }

    impl ValueTransfer for RecordingTransfer {
        fn transfer(
            &mut self,
            _vault: &mut Vault,
            _ctx: &ExecutionContext,
            to: Address,
            amount: Amount,
        ) -> Result<(), TransferError> {
            self.sent.push((to, amount));
            Ok(())
        }
    }

    /// Recipient that calls back into the vault before accepting the funds.
    #[derive(Default)]
    struct ReentrantTransfer {
        observed_balance: Option<Amount>,
        reentry: Option<Result<VaultEvent, VaultError>>,
    }

    impl ValueTransfer for ReentrantTransfer {
        fn transfer(
            &mut self,
            vault: &mut Vault,
            ctx: &ExecutionContext,
            _to: Address,
            _amount: Amount,
        ) -> Result<(), TransferError> {
            self.observed_balance = Some(vault.balance());
            let mut inner = RecordingTransfer::default();
            self.reentry = Some(vault.withdraw(ctx, &mut inner));
            assert!(inner.sent.is_empty());
            Ok(())
        }
    }

    struct FailingTransfer;

    impl ValueTransfer for FailingTransfer {
        fn transfer(
            &mut self,
            _vault: &mut Vault,
            _ctx: &ExecutionContext,
            _to: Address,
            _amount: Amount,
        ) -> Result<(), TransferError> {
            Err(TransferError::Rejected("recipient refuses".into()))
        }
    }

    #[test]
    fn test_create_sets_state() {
        let vault = make_vault(3600, Amount::from_gwei(1));
        assert_eq!(vault.owner(), owner());
        assert_eq!(vault.address(), vault_address());
        assert_eq!(vault.unlock_time(), Timestamp::from_secs(NOW + 3600));
        assert_eq!(vault.balance(), Amount::from_gwei(1));
        assert_eq!(vault.created_at(), Timestamp::from_secs(NOW));
        assert!(vault.events().is_empty());
    }

    #[test]
    fn test_create_rejects_past_and_present_unlock() {
        for unlock in [NOW - 1, NOW] {
            let result = Vault::create(
                &ctx(owner(), NOW),
                vault_address(),
                Timestamp::from_secs(unlock),
                Amount::from_gwei(1),
            );
            assert!(matches!(
                result,
                Err(VaultError::InvalidConstructionTime { .. })
            ));
        }
    }

    #[test]
    fn test_extend_strictly_increasing() {
        let mut vault = make_vault(3600, Amount::from_gwei(1));

        vault
            .extend(&ctx(owner(), NOW), Timestamp::from_secs(NOW + 7200))
            .unwrap();
        vault
            .extend(&ctx(owner(), NOW + 10), Timestamp::from_secs(NOW + 9000))
            .unwrap();
        assert_eq!(vault.unlock_time(), Timestamp::from_secs(NOW + 9000));

        // Equal and earlier targets are rejected
        for target in [NOW + 9000, NOW + 100] {
            let err = vault
                .extend(&ctx(owner(), NOW + 20), Timestamp::from_secs(target))
                .unwrap_err();
            assert_eq!(
                err,
                VaultError::InvalidTimeOrdering {
                    current: Timestamp::from_secs(NOW + 9000),
                    requested: Timestamp::from_secs(target),
                }
            );
        }
        assert_eq!(vault.unlock_time(), Timestamp::from_secs(NOW + 9000));
    }

    #[test]
    fn test_extend_after_unlock_relocks() {
        let mut vault = make_vault(60, Amount::from_gwei(1));
        vault
            .extend(&ctx(owner(), NOW + 120), Timestamp::from_secs(NOW + 600))
            .unwrap();

        let mut transfer = RecordingTransfer::default();
        let err = vault
            .withdraw(&ctx(owner(), NOW + 120), &mut transfer)
            .unwrap_err();
        assert!(matches!(err, VaultError::NotYetUnlocked { .. }));
    }

    #[test]
    fn test_non_owner_rejected() {
        let mut vault = make_vault(3600, Amount::from_gwei(1));
        let before = vault.clone();

        let err = vault
            .extend(&ctx(stranger(), NOW), Timestamp::from_secs(NOW + 7200))
            .unwrap_err();
        assert_eq!(err, VaultError::Unauthorized { caller: stranger() });

        let mut transfer = RecordingTransfer::default();
        let err = vault
            .withdraw(&ctx(stranger(), NOW + 10_000), &mut transfer)
            .unwrap_err();
        assert_eq!(err, VaultError::Unauthorized { caller: stranger() });

        assert_eq!(vault, before);
        assert!(transfer.sent.is_empty());
    }

    #[test]
    fn test_withdraw_before_unlock() {
        let mut vault = make_vault(3600, Amount::from_gwei(1));
        let mut transfer = RecordingTransfer::default();

        let err = vault
            .withdraw(&ctx(owner(), NOW + 3599), &mut transfer)
            .unwrap_err();
        assert!(matches!(err, VaultError::NotYetUnlocked { .. }));
        assert_eq!(vault.balance(), Amount::from_gwei(1));
        assert!(transfer.sent.is_empty());
    }

    #[test]
    fn test_withdraw_at_exact_unlock_time() {
        let mut vault = make_vault(3600, Amount::from_gwei(1));
        let mut transfer = RecordingTransfer::default();

        let event = vault
            .withdraw(&ctx(owner(), NOW + 3600), &mut transfer)
            .unwrap();
        assert_eq!(
            event,
            VaultEvent::Withdrawal {
                amount: Amount::from_gwei(1),
                when: Timestamp::from_secs(NOW + 3600),
            }
        );
        assert_eq!(transfer.sent, vec![(owner(), Amount::from_gwei(1))]);
        assert!(vault.is_drained());
        assert_eq!(vault.events().latest(), Some(&event));
    }

    #[test]
    fn test_second_withdraw_fails() {
        let mut vault = make_vault(3600, Amount::from_gwei(1));
        let mut transfer = RecordingTransfer::default();
        vault
            .withdraw(&ctx(owner(), NOW + 4000), &mut transfer)
            .unwrap();

        for later in [NOW + 4000, NOW + 100_000] {
            let err = vault
                .withdraw(&ctx(owner(), later), &mut transfer)
                .unwrap_err();
            assert_eq!(err, VaultError::NothingToWithdraw);
        }
        assert_eq!(transfer.sent.len(), 1);
        assert_eq!(vault.events().len(), 1);
    }

    #[test]
    fn test_reentrant_withdraw_sees_drained_vault() {
        let mut vault = make_vault(3600, Amount::from_gwei(5));
        let mut transfer = ReentrantTransfer::default();

        let event = vault
            .withdraw(&ctx(owner(), NOW + 3600), &mut transfer)
            .unwrap();

        assert_eq!(event.amount(), Amount::from_gwei(5));
        assert_eq!(transfer.observed_balance, Some(Amount::ZERO));
        assert_eq!(transfer.reentry, Some(Err(VaultError::NothingToWithdraw)));
        assert_eq!(vault.events().len(), 1);
    }

    #[test]
    fn test_failed_transfer_rolls_back() {
        let mut vault = make_vault(3600, Amount::from_gwei(1));
        let before = vault.clone();

        let err = vault
            .withdraw(&ctx(owner(), NOW + 3600), &mut FailingTransfer)
            .unwrap_err();
        assert!(matches!(err, VaultError::TransferFailed(_)));
        assert_eq!(vault, before);

        // Still withdrawable afterwards
        let mut transfer = RecordingTransfer::default();
        assert!(vault
            .withdraw(&ctx(owner(), NOW + 3600), &mut transfer)
            .is_ok());
    }

    #[test]
    fn test_drained_vault_rejects_extend() {
        let mut vault = make_vault(3600, Amount::from_gwei(1));
        let mut transfer = RecordingTransfer::default();
        vault
            .withdraw(&ctx(owner(), NOW + 3600), &mut transfer)
            .unwrap();

        let err = vault
            .extend(&ctx(owner(), NOW + 3600), Timestamp::from_secs(NOW + 7200))
            .unwrap_err();
        assert_eq!(err, VaultError::Drained);
        assert_eq!(vault.unlock_time(), Timestamp::from_secs(NOW + 3600));
    }

    #[test]
    fn test_zero_funded_vault() {
        let mut vault = make_vault(60, Amount::ZERO);
        let mut transfer = RecordingTransfer::default();
        let err = vault
            .withdraw(&ctx(owner(), NOW + 60), &mut transfer)
            .unwrap_err();
        assert_eq!(err, VaultError::NothingToWithdraw);
        assert!(transfer.sent.is_empty());
    }

    #[test]
    fn test_vault_serde_roundtrip() {
        let mut vault = make_vault(3600, Amount::from_ether(1));
        let mut transfer = RecordingTransfer::default();
        vault
            .withdraw(&ctx(owner(), NOW + 3600), &mut transfer)
            .unwrap();

        let json = serde_json::to_string(&vault).unwrap();
        let restored: Vault = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, vault);
    }
}
