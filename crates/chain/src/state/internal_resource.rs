//! Resource economy: freeze / delegate / unfreeze dan stake / unstake.
//!
//! Dipakai oleh beberapa actuator (FreezeBalance, UnfreezeBalance, Stake,
//! Unstake, WitnessCreate, WitnessResign). Precondition user-facing sudah dicek
//! di `validate()`; di sini hanya aritmatika yang dicek ulang.
//!
//! ## Freeze
//!
//! ```text
//! tanpa receiver : balance → frozen_for_X {amount, expire}
//! dengan receiver: balance → owner.delegated_X.delegated_balance
//!                          → receiver.delegated_X.acquired_delegated_balance
//!                          → DelegatedResource(owner, receiver) + index
//! total_X_weight += amount
//! ```
//!
//! Receiver yang acquired balance-nya lebih kecil dari yang akan di-unfreeze
//! adalah bug di eksekusi sebelumnya → `ExecutionError::Invariant` (fatal).

use dpos_common::DAY_MS;
use tracing::error;

use super::{ChainState, DelegatedResource, ResourceCode, Stake};
use crate::error::ExecutionError;
use crate::types::Address;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreezeOutcome {
    pub expire_time: u64,
    pub total_weight: u128,
}

fn invariant(msg: String) -> ExecutionError {
    error!(reason = %msg, "resource invariant violated");
    ExecutionError::Invariant(msg)
}

impl<'a> ChainState<'a> {
    fn adjust_weight(&mut self, resource: ResourceCode, add: Option<u128>, sub: Option<u128>) -> Result<u128, ExecutionError> {
        let mut props = self.properties()?;
        let weight = match resource {
            ResourceCode::Bandwidth => &mut props.total_bandwidth_weight,
            ResourceCode::Energy => &mut props.total_energy_weight,
        };
        if let Some(a) = add {
            *weight = weight.checked_add(a).ok_or(ExecutionError::Overflow("total resource weight"))?;
        }
        if let Some(s) = sub {
            *weight = weight
                .checked_sub(s)
                .ok_or_else(|| invariant(format!("total {} weight below {}", resource.as_str(), s)))?;
        }
        let out = *weight;
        self.put_properties(&props)?;
        Ok(out)
    }

    pub fn freeze_balance(
        &mut self,
        owner: &Address,
        amount: u128,
        duration_days: u64,
        resource: ResourceCode,
        receiver: Option<&Address>,
        now: u64,
    ) -> Result<FreezeOutcome, ExecutionError> {
        let expire_time = duration_days
            .checked_mul(DAY_MS)
            .and_then(|d| d.checked_add(now))
            .ok_or(ExecutionError::Overflow("freeze expire time"))?;

        let mut acct = self.require_account(owner)?;
        acct.balance = acct.balance.checked_sub(amount).ok_or(ExecutionError::BalanceInsufficient {
            required: amount,
            available: acct.balance,
        })?;

        match receiver {
            Some(to) => {
                let d = acct.delegated_mut(resource);
                d.delegated_balance = d
                    .delegated_balance
                    .checked_add(amount)
                    .ok_or(ExecutionError::Overflow("delegated balance"))?;
                self.put_account(&acct)?;

                let mut record = self
                    .delegated_resource(owner, to)?
                    .unwrap_or_else(|| DelegatedResource::new(*owner, *to));
                let new_balance = record
                    .balance(resource)
                    .checked_add(amount)
                    .ok_or(ExecutionError::Overflow("delegated resource"))?;
                record.set(resource, new_balance, expire_time);
                self.put_delegated_resource(&record)?;
                self.link_delegation(owner, to)?;

                let mut recv = self.require_account(to)?;
                let rd = recv.delegated_mut(resource);
                rd.acquired_delegated_balance = rd
                    .acquired_delegated_balance
                    .checked_add(amount)
                    .ok_or(ExecutionError::Overflow("acquired delegated balance"))?;
                self.put_account(&recv)?;
            }
            None => {
                let f = acct.frozen_mut(resource);
                f.amount = f.amount.checked_add(amount).ok_or(ExecutionError::Overflow("frozen balance"))?;
                f.expire_time = expire_time;
                self.put_account(&acct)?;
            }
        }

        let total_weight = self.adjust_weight(resource, Some(amount), None)?;
        Ok(FreezeOutcome { expire_time, total_weight })
    }

    /// Returns the amount restored to spendable balance.
    pub fn unfreeze_balance(
        &mut self,
        owner: &Address,
        resource: ResourceCode,
        receiver: Option<&Address>,
        now: u64,
    ) -> Result<u128, ExecutionError> {
        let mut acct = self.require_account(owner)?;

        let amount = match receiver {
            Some(to) => {
                let mut record = self
                    .delegated_resource(owner, to)?
                    .ok_or_else(|| ExecutionError::Failed("delegated resource missing".into()))?;
                let amount = record.balance(resource);
                if amount == 0 {
                    return Err(ExecutionError::Failed(format!("no delegated {}", resource.as_str())));
                }
                if now < record.expire_time(resource) {
                    return Err(ExecutionError::Failed("delegation not yet expired".into()));
                }

                let mut recv = self.require_account(to)?;
                let rd = recv.delegated_mut(resource);
                rd.acquired_delegated_balance = rd.acquired_delegated_balance.checked_sub(amount).ok_or_else(|| {
                    invariant(format!(
                        "receiver {} acquired {} {} < delegated {}",
                        to,
                        rd.acquired_delegated_balance,
                        resource.as_str(),
                        amount
                    ))
                })?;
                self.put_account(&recv)?;

                let d = acct.delegated_mut(resource);
                d.delegated_balance = d.delegated_balance.checked_sub(amount).ok_or_else(|| {
                    invariant(format!("owner {} delegated {} < {}", owner, d.delegated_balance, amount))
                })?;

                record.set(resource, 0, 0);
                if record.is_empty() {
                    self.remove_delegated_resource(owner, to)?;
                } else {
                    self.put_delegated_resource(&record)?;
                }
                amount
            }
            None => {
                let f = *acct.frozen(resource);
                if f.amount == 0 {
                    return Err(ExecutionError::Failed(format!("no frozen {}", resource.as_str())));
                }
                if now < f.expire_time {
                    return Err(ExecutionError::Failed("frozen balance not yet expired".into()));
                }
                *acct.frozen_mut(resource) = Default::default();
                f.amount
            }
        };

        acct.balance = acct.balance.checked_add(amount).ok_or(ExecutionError::Overflow("balance credit"))?;
        self.put_account(&acct)?;
        self.adjust_weight(resource, None, Some(amount))?;
        Ok(amount)
    }

    pub fn stake_balance(&mut self, owner: &Address, amount: u128, now: u64) -> Result<Stake, ExecutionError> {
        let lock = self.properties()?.stake_lock_duration_ms;
        let mut acct = self.require_account(owner)?;
        let old_total = acct.total_stake();
        acct.balance = acct.balance.checked_sub(amount).ok_or(ExecutionError::BalanceInsufficient {
            required: amount,
            available: acct.balance,
        })?;
        acct.stake.amount = acct.stake.amount.checked_add(amount).ok_or(ExecutionError::Overflow("stake"))?;
        acct.stake.expiration_time = now.checked_add(lock).ok_or(ExecutionError::Overflow("stake expiration"))?;
        let new_total = acct.total_stake();
        let stake = acct.stake;
        self.put_account(&acct)?;
        self.record_stake_change(owner, old_total, new_total)?;
        Ok(stake)
    }

    /// Return normal stake to balance and clear the account's vote.
    pub fn unstake_balance(&mut self, owner: &Address, now: u64) -> Result<u128, ExecutionError> {
        let mut acct = self.require_account(owner)?;
        let amount = acct.stake.amount;
        if amount == 0 {
            return Err(ExecutionError::Failed("nothing staked".into()));
        }
        if now < acct.stake.expiration_time {
            return Err(ExecutionError::Failed("stake not yet expired".into()));
        }
        let old_total = acct.total_stake();
        acct.balance = acct.balance.checked_add(amount).ok_or(ExecutionError::Overflow("balance credit"))?;
        acct.stake = Stake::default();
        if let Some(current) = acct.vote.take() {
            self.record_vote_change(owner, Some(current), None)?;
        }
        let new_total = acct.total_stake();
        self.put_account(&acct)?;
        self.record_stake_change(owner, old_total, new_total)?;
        Ok(amount)
    }

    /// Move `amount` of normal stake into non-expiring witness stake.
    pub fn lock_witness_stake(&mut self, owner: &Address, amount: u128) -> Result<(), ExecutionError> {
        let mut acct = self.require_account(owner)?;
        acct.stake.amount = acct.stake.amount.checked_sub(amount).ok_or(ExecutionError::BalanceInsufficient {
            required: amount,
            available: acct.stake.amount,
        })?;
        acct.witness_stake.amount = acct
            .witness_stake
            .amount
            .checked_add(amount)
            .ok_or(ExecutionError::Overflow("witness stake"))?;
        self.put_account(&acct)?;
        Ok(())
    }

    /// Convert all witness stake back to normal stake locked for `cooldown`.
    pub fn release_witness_stake(&mut self, owner: &Address, now: u64, cooldown: u64) -> Result<u128, ExecutionError> {
        let mut acct = self.require_account(owner)?;
        let amount = acct.witness_stake.amount;
        acct.stake.amount = acct.stake.amount.checked_add(amount).ok_or(ExecutionError::Overflow("stake"))?;
        let until = now.checked_add(cooldown).ok_or(ExecutionError::Overflow("stake expiration"))?;
        acct.stake.expiration_time = acct.stake.expiration_time.max(until);
        acct.witness_stake.amount = 0;
        self.put_account(&acct)?;
        Ok(amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{DynamicProperties, Vote};
    use crate::store::MemoryStore;
    use dpos_common::ChainConfig;

    const OWNER: Address = Address([1; 20]);
    const RECV: Address = Address([2; 20]);

    fn setup(store: &mut MemoryStore) -> ChainState<'_> {
        let mut state = ChainState::new(store);
        let props = DynamicProperties::from_config(&ChainConfig::default()).unwrap();
        state.put_properties(&props).unwrap();
        state.ensure_account(&OWNER, 0).unwrap();
        state.ensure_account(&RECV, 0).unwrap();
        state.credit(&OWNER, 1_000).unwrap();
        state
    }

    #[test]
    fn test_freeze_then_unfreeze_restores_balance_and_weight() {
        let mut store = MemoryStore::new();
        let mut state = setup(&mut store);
        let out = state.freeze_balance(&OWNER, 400, 3, ResourceCode::Energy, None, 10).unwrap();
        assert_eq!(out.expire_time, 10 + 3 * DAY_MS);
        assert_eq!(out.total_weight, 400);
        assert_eq!(state.balance_of(&OWNER).unwrap(), 600);

        // too early
        assert!(state.unfreeze_balance(&OWNER, ResourceCode::Energy, None, 11).is_err());

        let back = state.unfreeze_balance(&OWNER, ResourceCode::Energy, None, out.expire_time).unwrap();
        assert_eq!(back, 400);
        assert_eq!(state.balance_of(&OWNER).unwrap(), 1_000);
        assert_eq!(state.properties().unwrap().total_energy_weight, 0);
    }

    #[test]
    fn test_delegated_unfreeze_with_short_receiver_is_fatal() {
        let mut store = MemoryStore::new();
        let mut state = setup(&mut store);
        state
            .freeze_balance(&OWNER, 300, 3, ResourceCode::Bandwidth, Some(&RECV), 0)
            .unwrap();
        // corrupt the receiver's acquired balance
        let mut recv = state.account(&RECV).unwrap().unwrap();
        recv.delegated_frozen_for_bandwidth.acquired_delegated_balance = 100;
        state.put_account(&recv).unwrap();

        let err = state
            .unfreeze_balance(&OWNER, ResourceCode::Bandwidth, Some(&RECV), 3 * DAY_MS)
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_unstake_clears_vote_and_records_delta() {
        let mut store = MemoryStore::new();
        let mut state = setup(&mut store);
        state.stake_balance(&OWNER, 500, 0).unwrap();
        let mut acct = state.account(&OWNER).unwrap().unwrap();
        let vote = Vote { candidate: RECV, count: 1 };
        acct.vote = Some(vote);
        state.put_account(&acct).unwrap();

        let lock = state.properties().unwrap().stake_lock_duration_ms;
        assert_eq!(state.unstake_balance(&OWNER, lock).unwrap(), 500);
        let acct = state.account(&OWNER).unwrap().unwrap();
        assert!(acct.vote.is_none());
        assert_eq!(acct.balance, 1_000);
        let change = state.vote_change(&OWNER).unwrap().unwrap();
        assert_eq!(change.old_vote, Some(vote));
        assert_eq!(change.new_vote, None);
    }

    #[test]
    fn test_witness_stake_lock_and_release() {
        let mut store = MemoryStore::new();
        let mut state = setup(&mut store);
        state.stake_balance(&OWNER, 800, 0).unwrap();
        state.lock_witness_stake(&OWNER, 500).unwrap();
        let acct = state.account(&OWNER).unwrap().unwrap();
        assert_eq!((acct.stake.amount, acct.witness_stake.amount), (300, 500));
        assert_eq!(acct.total_stake(), 800);

        state.release_witness_stake(&OWNER, 1_000, 7).unwrap();
        let acct = state.account(&OWNER).unwrap().unwrap();
        assert_eq!((acct.stake.amount, acct.witness_stake.amount), (800, 0));
        assert!(acct.stake.expiration_time >= 1_007);
    }
}
