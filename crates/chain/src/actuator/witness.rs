//! Witness lifecycle: register, update url, resign, withdraw allowance.

use tracing::{debug, info};

use super::{reject, ActuatorContext};
use crate::error::{ExecutionError, ValidationError};
use crate::state::{ChainState, Permission, PermissionType, Vote, Witness, WitnessStatus};
use crate::tx::{
    TransactionResult, WithdrawBalanceContract, WitnessCreateContract, WitnessResignContract,
    WitnessUpdateContract,
};

pub const MAX_URL_LEN: usize = 256;

fn validate_url(url: &str) -> Result<(), ValidationError> {
    if url.is_empty() || url.len() > MAX_URL_LEN {
        return Err(reject("invalid url length"));
    }
    Ok(())
}

fn require_live_witness(state: &ChainState<'_>, owner: &crate::types::Address) -> Result<Witness, ValidationError> {
    let w = state.witness(owner)?.ok_or(ValidationError::WitnessNotFound(*owner))?;
    if w.status == WitnessStatus::Resigned {
        return Err(reject("witness has resigned"));
    }
    Ok(w)
}

pub(super) fn validate_create(c: &WitnessCreateContract, state: &ChainState<'_>) -> Result<(), ValidationError> {
    validate_url(&c.url)?;
    let owner = state.account(&c.owner)?.ok_or(ValidationError::AccountNotFound(c.owner))?;
    if state.witness_exists(&c.owner)? {
        return Err(reject(format!("witness {} already exists", c.owner)));
    }
    if state.contract(&c.owner)?.is_some() {
        return Err(reject("contract accounts cannot become witnesses"));
    }
    let required = state.properties()?.witness_stake_amount;
    if owner.stake.amount < required {
        return Err(reject(format!(
            "witness registration requires {} staked, have {}",
            required, owner.stake.amount
        )));
    }
    Ok(())
}

pub(super) fn execute_create(c: &WitnessCreateContract, state: &mut ChainState<'_>) -> Result<(), ExecutionError> {
    let props = state.properties()?;
    state.lock_witness_stake(&c.owner, props.witness_stake_amount)?;
    state.put_witness(&Witness::new(c.owner, c.url.clone()))?;

    let mut acct = state.require_account(&c.owner)?;
    acct.is_witness = true;
    acct.witness_permission = Some(Permission::single_key(PermissionType::Witness, 1, "witness", c.owner));

    // vote resets to self with full power
    let power = props.voting_power(acct.total_stake());
    let self_vote = (power > 0).then_some(Vote { candidate: c.owner, count: power });
    state.record_vote_change(&c.owner, acct.vote, self_vote)?;
    acct.vote = self_vote;
    state.put_account(&acct)?;

    info!(witness = %c.owner, url = %c.url, "witness registered");
    Ok(())
}

pub(super) fn validate_update(c: &WitnessUpdateContract, state: &ChainState<'_>) -> Result<(), ValidationError> {
    validate_url(&c.url)?;
    require_live_witness(state, &c.owner)?;
    Ok(())
}

pub(super) fn execute_update(c: &WitnessUpdateContract, state: &mut ChainState<'_>) -> Result<(), ExecutionError> {
    let mut w = state
        .witness(&c.owner)?
        .ok_or_else(|| ExecutionError::Failed("witness missing".into()))?;
    w.url = c.url.clone();
    state.put_witness(&w)?;
    Ok(())
}

pub(super) fn validate_resign(c: &WitnessResignContract, state: &ChainState<'_>) -> Result<(), ValidationError> {
    require_live_witness(state, &c.owner)?;
    Ok(())
}

pub(super) fn execute_resign(
    c: &WitnessResignContract,
    state: &mut ChainState<'_>,
    ctx: &ActuatorContext<'_>,
) -> Result<(), ExecutionError> {
    let mut w = state
        .witness(&c.owner)?
        .ok_or_else(|| ExecutionError::Failed("witness missing".into()))?;
    if w.is_jobs {
        let active: Vec<_> = state
            .active_witnesses()?
            .into_iter()
            .filter(|a| *a != c.owner)
            .collect();
        state.set_active_witnesses(&active)?;
    }
    if w.status == WitnessStatus::Slashed {
        state.remove_banned_witness(&c.owner)?;
    }
    w.status = WitnessStatus::Resigned;
    w.is_jobs = false;
    state.put_witness(&w)?;

    let cooldown = state.properties()?.witness_resign_cooldown_ms;
    let released = state.release_witness_stake(&c.owner, ctx.now, cooldown)?;

    let mut acct = state.require_account(&c.owner)?;
    acct.is_witness = false;
    acct.is_committee = false;
    acct.witness_permission = None;
    state.put_account(&acct)?;

    info!(witness = %c.owner, released, "witness resigned");
    Ok(())
}

pub(super) fn validate_withdraw(
    c: &WithdrawBalanceContract,
    state: &ChainState<'_>,
    ctx: &ActuatorContext<'_>,
) -> Result<(), ValidationError> {
    let acct = state.account(&c.owner)?.ok_or(ValidationError::AccountNotFound(c.owner))?;
    let w = state.witness(&c.owner)?.ok_or(ValidationError::WitnessNotFound(c.owner))?;
    if w.is_genesis {
        return Err(ValidationError::PermissionDenied("genesis witnesses cannot withdraw".into()));
    }
    let cooldown = state.properties()?.witness_withdraw_cooldown_ms;
    if acct.latest_withdraw_time > 0 && ctx.now < acct.latest_withdraw_time.saturating_add(cooldown) {
        return Err(ValidationError::Timing(format!(
            "next withdrawal allowed at {}",
            acct.latest_withdraw_time.saturating_add(cooldown)
        )));
    }
    if acct.allowance == 0 {
        return Err(reject("no allowance to withdraw"));
    }
    if acct.balance.checked_add(acct.allowance).is_none() {
        return Err(reject("balance would overflow"));
    }
    Ok(())
}

pub(super) fn execute_withdraw(
    c: &WithdrawBalanceContract,
    state: &mut ChainState<'_>,
    ctx: &ActuatorContext<'_>,
    result: &mut TransactionResult,
) -> Result<(), ExecutionError> {
    let mut acct = state.require_account(&c.owner)?;
    let amount = acct.allowance;
    acct.balance = acct
        .balance
        .checked_add(amount)
        .ok_or(ExecutionError::Overflow("allowance withdraw"))?;
    acct.allowance = 0;
    acct.latest_withdraw_time = ctx.now;
    state.put_account(&acct)?;
    result.withdraw_amount = amount;
    debug!(witness = %c.owner, amount, "allowance withdrawn");
    Ok(())
}
