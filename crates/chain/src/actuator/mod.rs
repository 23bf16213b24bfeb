//! # Actuator Framework
//!
//! Satu handler per tipe contract. `Contract` adalah closed tagged union, jadi
//! dispatch di bawah dicek exhaustive oleh compiler.
//!
//! | Operasi | Sifat |
//! |---------|-------|
//! | `validate()` | pure, hanya `&ChainState`, boleh dipanggil berulang |
//! | `execute()` | burn fee dulu, lalu mutasi di deposit anak |
//! | `calc_fee()` | deterministik: parameter chain + payload |
//! | `owner_address()` | siapa yang harus meng-authorize transaksi |
//!
//! ## Urutan execute (CONSENSUS-CRITICAL)
//!
//! ```text
//! 1. result.fee = calc_fee()
//! 2. burn fee: owner → blackhole   (gagal → FAILED, tidak ada perubahan lain)
//! 3. with_child(body)              (gagal → child dibuang, fee tetap terbakar;
//!                                   energy dari OutOfEnergy dibakar di parent)
//! 4. result.status = SUCCESS
//! ```

mod account;
mod asset;
mod contract;
mod permission;
mod proposal;
mod resource;
mod stake;
mod transfer;
mod vote;
mod witness;

pub use contract::simulate_constant_call;
pub use permission::{MAX_ACTIVE_PERMISSIONS, MAX_PERMISSION_KEYS};

use tracing::debug;

use crate::error::{ExecutionError, StoreResult, ValidationError};
use crate::state::{as_amount, Account, ChainState};
use crate::tx::{Contract, Transaction, TransactionResult, TxStatus};
use crate::types::{Address, Hash};
use crate::vm::VmExecutor;

/// Per-transaction environment.
#[derive(Clone, Copy)]
pub struct ActuatorContext<'v> {
    /// Block timestamp (ms).
    pub now: u64,
    pub block_num: u64,
    pub tx_id: Hash,
    pub vm: Option<&'v dyn VmExecutor>,
}

impl<'v> ActuatorContext<'v> {
    pub fn new(now: u64, block_num: u64, tx_id: Hash) -> Self {
        Self { now, block_num, tx_id, vm: None }
    }

    pub fn with_vm(mut self, vm: &'v dyn VmExecutor) -> Self {
        self.vm = Some(vm);
        self
    }
}

pub struct Actuator {
    contract: Contract,
    signature_count: usize,
}

impl Actuator {
    pub fn new(contract: Contract) -> Self {
        Self { contract, signature_count: 1 }
    }

    /// Decode the transaction's payload slot into a typed actuator.
    pub fn from_transaction(tx: &Transaction) -> Result<Self, ValidationError> {
        Ok(Self {
            contract: tx.contract()?,
            signature_count: tx.signatures.len(),
        })
    }

    pub fn contract(&self) -> &Contract {
        &self.contract
    }

    pub fn owner_address(&self) -> Address {
        match &self.contract {
            Contract::AccountCreate(c) => c.owner,
            Contract::Transfer(c) => c.owner,
            Contract::TransferAsset(c) => c.owner,
            Contract::VoteWitness(c) => c.owner,
            Contract::WitnessCreate(c) => c.owner,
            Contract::AssetIssue(c) => c.owner,
            Contract::WitnessUpdate(c) => c.owner,
            Contract::ParticipateAssetIssue(c) => c.owner,
            Contract::AccountUpdate(c) => c.owner,
            Contract::FreezeBalance(c) => c.owner,
            Contract::UnfreezeBalance(c) => c.owner,
            Contract::WithdrawBalance(c) => c.owner,
            Contract::UpdateAsset(c) => c.owner,
            Contract::ProposalCreate(c) => c.owner,
            Contract::ProposalApprove(c) => c.owner,
            Contract::ProposalDelete(c) => c.owner,
            Contract::SetAccountId(c) => c.owner,
            Contract::CreateSmartContract(c) => c.owner,
            Contract::TriggerSmartContract(c) => c.owner,
            Contract::AccountPermissionUpdate(c) => c.owner,
            Contract::Stake(c) => c.owner,
            Contract::Unstake(c) => c.owner,
            Contract::WitnessResign(c) => c.owner,
        }
    }

    /// Flat `transaction_fee` plus the type-specific surcharge.
    pub fn calc_fee(&self, state: &ChainState<'_>) -> StoreResult<u128> {
        let props = state.properties()?;
        let new_account_fee = as_amount(props.create_new_account_fee_in_system_contract);
        let surcharge = match &self.contract {
            Contract::AccountCreate(_) => new_account_fee,
            Contract::Transfer(c) if !state.account_exists(&c.to)? => new_account_fee,
            Contract::TransferAsset(c) if !state.account_exists(&c.to)? => new_account_fee,
            Contract::WitnessCreate(_) => as_amount(props.account_upgrade_cost),
            Contract::AssetIssue(_) => as_amount(props.asset_issue_fee),
            Contract::AccountPermissionUpdate(_) => as_amount(props.update_account_permission_fee),
            _ => 0,
        };
        let multi_sign = if self.signature_count > 1 { as_amount(props.multi_sign_fee) } else { 0 };
        Ok(as_amount(props.transaction_fee)
            .saturating_add(surcharge)
            .saturating_add(multi_sign))
    }

    pub fn validate(&self, state: &ChainState<'_>, ctx: &ActuatorContext<'_>) -> Result<(), ValidationError> {
        let owner = self.owner_address();
        let fee = self.calc_fee(state)?;
        let acct = require_account(state, &owner)?;
        require_balance(&acct, fee)?;

        match &self.contract {
            Contract::AccountCreate(c) => account::validate_create(c, state),
            Contract::AccountUpdate(c) => account::validate_update(c, state),
            Contract::SetAccountId(c) => account::validate_set_id(c, state),
            Contract::Transfer(c) => transfer::validate_transfer(c, state, fee),
            Contract::FreezeBalance(c) => resource::validate_freeze(c, state, fee),
            Contract::UnfreezeBalance(c) => resource::validate_unfreeze(c, state, ctx),
            Contract::Stake(c) => stake::validate_stake(c, state, fee),
            Contract::Unstake(c) => stake::validate_unstake(c, state, ctx),
            Contract::WitnessCreate(c) => witness::validate_create(c, state),
            Contract::WitnessUpdate(c) => witness::validate_update(c, state),
            Contract::WitnessResign(c) => witness::validate_resign(c, state),
            Contract::WithdrawBalance(c) => witness::validate_withdraw(c, state, ctx),
            Contract::VoteWitness(c) => vote::validate_vote(c, state),
            Contract::ProposalCreate(c) => proposal::validate_create(c, state),
            Contract::ProposalApprove(c) => proposal::validate_approve(c, state, ctx),
            Contract::ProposalDelete(c) => proposal::validate_delete(c, state, ctx),
            Contract::AssetIssue(c) => asset::validate_issue(c, state, ctx),
            Contract::TransferAsset(c) => asset::validate_transfer(c, state),
            Contract::ParticipateAssetIssue(c) => asset::validate_participate(c, state, ctx, fee),
            Contract::UpdateAsset(c) => asset::validate_update(c, state),
            Contract::AccountPermissionUpdate(c) => permission::validate_update(c, state),
            Contract::CreateSmartContract(c) => contract::validate_create(c, state, ctx, fee),
            Contract::TriggerSmartContract(c) => contract::validate_trigger(c, state, ctx, fee),
        }
    }

    /// Burn the fee, then run the mutation in a child deposit. The fee stays
    /// burned when the body fails; `result` always carries fee and status.
    pub fn execute(
        &self,
        state: &mut ChainState<'_>,
        ctx: &ActuatorContext<'_>,
        result: &mut TransactionResult,
    ) -> Result<(), ExecutionError> {
        let owner = self.owner_address();
        let fee = self.calc_fee(state)?;
        result.fee = fee;
        result.status = TxStatus::Failed;

        if let Err(e) = state.burn(&owner, fee) {
            result.message = e.to_string();
            return Err(e);
        }

        let mut body = TransactionResult::default();
        let outcome = state.with_child(|child| self.execute_body(child, ctx, &mut body));
        match outcome {
            Ok(()) => {
                // body.fee carries the energy fee of contract calls
                body.fee = body.fee.saturating_add(fee);
                body.status = TxStatus::Success;
                *result = body;
                debug!(
                    owner = %owner,
                    contract = ?self.contract.contract_type(),
                    fee,
                    "tx executed"
                );
                Ok(())
            }
            Err(e) => {
                // body.fee on failure is energy billed for an exhausted limit
                let energy_fee = body.fee.min(state.balance_of(&owner)?);
                if energy_fee > 0 {
                    state.burn(&owner, energy_fee)?;
                }
                result.fee = fee.saturating_add(energy_fee);
                result.message = e.to_string();
                result.energy_used = body.energy_used;
                Err(e)
            }
        }
    }

    fn execute_body(
        &self,
        state: &mut ChainState<'_>,
        ctx: &ActuatorContext<'_>,
        result: &mut TransactionResult,
    ) -> Result<(), ExecutionError> {
        match &self.contract {
            Contract::AccountCreate(c) => account::execute_create(c, state, ctx),
            Contract::AccountUpdate(c) => account::execute_update(c, state),
            Contract::SetAccountId(c) => account::execute_set_id(c, state),
            Contract::Transfer(c) => transfer::execute_transfer(c, state, ctx),
            Contract::FreezeBalance(c) => resource::execute_freeze(c, state, ctx),
            Contract::UnfreezeBalance(c) => resource::execute_unfreeze(c, state, ctx, result),
            Contract::Stake(c) => stake::execute_stake(c, state, ctx),
            Contract::Unstake(c) => stake::execute_unstake(c, state, ctx, result),
            Contract::WitnessCreate(c) => witness::execute_create(c, state),
            Contract::WitnessUpdate(c) => witness::execute_update(c, state),
            Contract::WitnessResign(c) => witness::execute_resign(c, state, ctx),
            Contract::WithdrawBalance(c) => witness::execute_withdraw(c, state, ctx, result),
            Contract::VoteWitness(c) => vote::execute_vote(c, state),
            Contract::ProposalCreate(c) => proposal::execute_create(c, state, ctx),
            Contract::ProposalApprove(c) => proposal::execute_approve(c, state),
            Contract::ProposalDelete(c) => proposal::execute_delete(c, state),
            Contract::AssetIssue(c) => asset::execute_issue(c, state, result),
            Contract::TransferAsset(c) => asset::execute_transfer(c, state, ctx),
            Contract::ParticipateAssetIssue(c) => asset::execute_participate(c, state),
            Contract::UpdateAsset(c) => asset::execute_update(c, state),
            Contract::AccountPermissionUpdate(c) => permission::execute_update(c, state),
            Contract::CreateSmartContract(c) => contract::execute_create(c, state, ctx, result),
            Contract::TriggerSmartContract(c) => contract::execute_trigger(c, state, ctx, result),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// SHARED VALIDATION HELPERS
// ════════════════════════════════════════════════════════════════════════════

pub(crate) fn require_valid(addr: &Address, what: &str) -> Result<(), ValidationError> {
    if !addr.is_valid() {
        return Err(ValidationError::InvalidAddress(format!("{} address {}", what, addr)));
    }
    Ok(())
}

pub(crate) fn require_account(state: &ChainState<'_>, addr: &Address) -> Result<Account, ValidationError> {
    require_valid(addr, "owner")?;
    state.account(addr)?.ok_or(ValidationError::AccountNotFound(*addr))
}

pub(crate) fn require_balance(acct: &Account, required: u128) -> Result<(), ValidationError> {
    if acct.balance < required {
        return Err(ValidationError::InsufficientBalance {
            required,
            available: acct.balance,
        });
    }
    Ok(())
}

/// `a + b` or a validation failure when it would overflow.
pub(crate) fn checked_total(a: u128, b: u128) -> Result<u128, ValidationError> {
    a.checked_add(b)
        .ok_or_else(|| ValidationError::Rejected("amount plus fee overflows".into()))
}

pub(crate) fn reject(msg: impl Into<String>) -> ValidationError {
    ValidationError::Rejected(msg.into())
}
