//! Native balance transfer.

use super::{checked_total, reject, require_balance, require_valid, ActuatorContext};
use crate::error::{ExecutionError, ValidationError};
use crate::state::ChainState;
use crate::tx::TransferContract;

pub(super) fn validate_transfer(c: &TransferContract, state: &ChainState<'_>, fee: u128) -> Result<(), ValidationError> {
    require_valid(&c.to, "destination")?;
    if c.owner == c.to {
        return Err(reject("cannot transfer to self"));
    }
    if c.amount == 0 {
        return Err(reject("amount must be positive"));
    }
    let owner = state.account(&c.owner)?.ok_or(ValidationError::AccountNotFound(c.owner))?;
    // fee already includes the account-creation surcharge for a missing destination
    require_balance(&owner, checked_total(c.amount, fee)?)?;

    if let Some(dest) = state.account(&c.to)? {
        if dest.balance.checked_add(c.amount).is_none() {
            return Err(reject("destination balance would overflow"));
        }
    }
    Ok(())
}

pub(super) fn execute_transfer(
    c: &TransferContract,
    state: &mut ChainState<'_>,
    ctx: &ActuatorContext<'_>,
) -> Result<(), ExecutionError> {
    state.ensure_account(&c.to, ctx.now)?;
    state.transfer_balance(&c.owner, &c.to, c.amount)
}
