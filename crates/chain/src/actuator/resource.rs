//! FreezeBalance / UnfreezeBalance (with optional delegation).

use tracing::debug;

use super::{checked_total, reject, require_balance, require_valid, ActuatorContext};
use crate::error::{ExecutionError, ValidationError};
use crate::state::ChainState;
use crate::tx::{FreezeBalanceContract, TransactionResult, UnfreezeBalanceContract};

pub(super) fn validate_freeze(c: &FreezeBalanceContract, state: &ChainState<'_>, fee: u128) -> Result<(), ValidationError> {
    let props = state.properties()?;
    if c.amount == 0 || c.amount < props.min_frozen_amount {
        return Err(reject(format!("frozen amount must be at least {}", props.min_frozen_amount.max(1))));
    }
    if !props.frozen_duration_ok(c.duration_days) {
        return Err(reject(format!(
            "frozen duration must be in [{}, {}] days",
            props.min_frozen_days, props.max_frozen_days
        )));
    }
    let owner = state.account(&c.owner)?.ok_or(ValidationError::AccountNotFound(c.owner))?;
    require_balance(&owner, checked_total(c.amount, fee)?)?;

    if let Some(receiver) = &c.receiver {
        if props.allow_delegate_resource != 1 {
            return Err(reject("resource delegation is not enabled"));
        }
        require_valid(receiver, "receiver")?;
        if *receiver == c.owner {
            return Err(reject("receiver must differ from owner"));
        }
        if !state.account_exists(receiver)? {
            return Err(ValidationError::AccountNotFound(*receiver));
        }
        if state.contract(receiver)?.is_some() {
            return Err(reject("cannot delegate to a contract account"));
        }
    }
    Ok(())
}

pub(super) fn execute_freeze(
    c: &FreezeBalanceContract,
    state: &mut ChainState<'_>,
    ctx: &ActuatorContext<'_>,
) -> Result<(), ExecutionError> {
    let out = state.freeze_balance(&c.owner, c.amount, c.duration_days, c.resource, c.receiver.as_ref(), ctx.now)?;
    debug!(
        owner = %c.owner,
        amount = c.amount,
        resource = c.resource.as_str(),
        delegated = c.receiver.is_some(),
        expire = out.expire_time,
        "balance frozen"
    );
    Ok(())
}

pub(super) fn validate_unfreeze(
    c: &UnfreezeBalanceContract,
    state: &ChainState<'_>,
    ctx: &ActuatorContext<'_>,
) -> Result<(), ValidationError> {
    let owner = state.account(&c.owner)?.ok_or(ValidationError::AccountNotFound(c.owner))?;
    match &c.receiver {
        Some(receiver) => {
            require_valid(receiver, "receiver")?;
            let record = state
                .delegated_resource(&c.owner, receiver)?
                .ok_or_else(|| reject("no delegated resource for this receiver"))?;
            if record.balance(c.resource) == 0 {
                return Err(reject(format!("no delegated {} for this receiver", c.resource.as_str())));
            }
            if ctx.now < record.expire_time(c.resource) {
                return Err(ValidationError::Timing("delegated resource has not expired".into()));
            }
        }
        None => {
            let frozen = owner.frozen(c.resource);
            if frozen.amount == 0 {
                return Err(reject(format!("no frozen {}", c.resource.as_str())));
            }
            if ctx.now < frozen.expire_time {
                return Err(ValidationError::Timing("frozen balance has not expired".into()));
            }
        }
    }
    Ok(())
}

pub(super) fn execute_unfreeze(
    c: &UnfreezeBalanceContract,
    state: &mut ChainState<'_>,
    ctx: &ActuatorContext<'_>,
    result: &mut TransactionResult,
) -> Result<(), ExecutionError> {
    let amount = state.unfreeze_balance(&c.owner, c.resource, c.receiver.as_ref(), ctx.now)?;
    result.unfreeze_amount = amount;
    debug!(owner = %c.owner, amount, resource = c.resource.as_str(), "balance unfrozen");
    Ok(())
}
