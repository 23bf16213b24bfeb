//! Stake / Unstake: balance ↔ normal stake (voting power via tier table).

use super::{checked_total, reject, require_balance, ActuatorContext};
use crate::error::{ExecutionError, ValidationError};
use crate::state::ChainState;
use crate::tx::{StakeContract, TransactionResult, UnstakeContract};

pub(super) fn validate_stake(c: &StakeContract, state: &ChainState<'_>, fee: u128) -> Result<(), ValidationError> {
    if c.amount == 0 {
        return Err(reject("stake amount must be positive"));
    }
    let owner = state.account(&c.owner)?.ok_or(ValidationError::AccountNotFound(c.owner))?;
    require_balance(&owner, checked_total(c.amount, fee)?)?;
    if owner.stake.amount.checked_add(c.amount).is_none() {
        return Err(reject("stake would overflow"));
    }
    Ok(())
}

pub(super) fn execute_stake(c: &StakeContract, state: &mut ChainState<'_>, ctx: &ActuatorContext<'_>) -> Result<(), ExecutionError> {
    state.stake_balance(&c.owner, c.amount, ctx.now)?;
    Ok(())
}

pub(super) fn validate_unstake(c: &UnstakeContract, state: &ChainState<'_>, ctx: &ActuatorContext<'_>) -> Result<(), ValidationError> {
    let owner = state.account(&c.owner)?.ok_or(ValidationError::AccountNotFound(c.owner))?;
    if owner.stake.amount == 0 {
        return Err(reject("nothing staked"));
    }
    if ctx.now < owner.stake.expiration_time {
        return Err(ValidationError::Timing(format!(
            "stake locked until {}",
            owner.stake.expiration_time
        )));
    }
    Ok(())
}

pub(super) fn execute_unstake(
    c: &UnstakeContract,
    state: &mut ChainState<'_>,
    ctx: &ActuatorContext<'_>,
    result: &mut TransactionResult,
) -> Result<(), ExecutionError> {
    result.unfreeze_amount = state.unstake_balance(&c.owner, ctx.now)?;
    Ok(())
}
