//! Account creation, account name update and one-time account id.

use super::{reject, require_valid, ActuatorContext};
use crate::error::{ExecutionError, ValidationError};
use crate::state::ChainState;
use crate::tx::{AccountCreateContract, AccountUpdateContract, SetAccountIdContract};

pub const MAX_ACCOUNT_NAME_LEN: usize = 200;
pub const MIN_ACCOUNT_ID_LEN: usize = 8;
pub const MAX_ACCOUNT_ID_LEN: usize = 32;

fn readable(bytes: &[u8]) -> bool {
    bytes.iter().all(|b| (0x21..=0x7e).contains(b))
}

pub(super) fn validate_create(c: &AccountCreateContract, state: &ChainState<'_>) -> Result<(), ValidationError> {
    require_valid(&c.account_address, "new account")?;
    if state.account_exists(&c.account_address)? {
        return Err(reject(format!("account {} already exists", c.account_address)));
    }
    Ok(())
}

pub(super) fn execute_create(
    c: &AccountCreateContract,
    state: &mut ChainState<'_>,
    ctx: &ActuatorContext<'_>,
) -> Result<(), ExecutionError> {
    if !state.ensure_account(&c.account_address, ctx.now)? {
        return Err(ExecutionError::Failed("account already exists".into()));
    }
    Ok(())
}

pub(super) fn validate_update(c: &AccountUpdateContract, state: &ChainState<'_>) -> Result<(), ValidationError> {
    if c.account_name.is_empty() || c.account_name.len() > MAX_ACCOUNT_NAME_LEN {
        return Err(reject("invalid account name length"));
    }
    let owner = state.account(&c.owner)?.ok_or(ValidationError::AccountNotFound(c.owner))?;
    let updatable = state.properties()?.allow_update_account_name == 1;
    if !updatable {
        if !owner.account_name.is_empty() {
            return Err(reject("account name already set"));
        }
        if state.account_by_name(&c.account_name)?.is_some() {
            return Err(reject("account name already taken"));
        }
    }
    Ok(())
}

pub(super) fn execute_update(c: &AccountUpdateContract, state: &mut ChainState<'_>) -> Result<(), ExecutionError> {
    let mut acct = state.require_account(&c.owner)?;
    acct.account_name = c.account_name.clone();
    state.put_account(&acct)?;
    state.index_account_name(&c.account_name, &c.owner)?;
    Ok(())
}

pub(super) fn validate_set_id(c: &SetAccountIdContract, state: &ChainState<'_>) -> Result<(), ValidationError> {
    let len = c.account_id.len();
    if !(MIN_ACCOUNT_ID_LEN..=MAX_ACCOUNT_ID_LEN).contains(&len) || !readable(&c.account_id) {
        return Err(reject("account id must be 8..=32 printable characters"));
    }
    let owner = state.account(&c.owner)?.ok_or(ValidationError::AccountNotFound(c.owner))?;
    if !owner.account_id.is_empty() {
        return Err(reject("account id can only be set once"));
    }
    if state.account_by_id(&c.account_id)?.is_some() {
        return Err(reject("account id already taken"));
    }
    Ok(())
}

pub(super) fn execute_set_id(c: &SetAccountIdContract, state: &mut ChainState<'_>) -> Result<(), ExecutionError> {
    let mut acct = state.require_account(&c.owner)?;
    acct.account_id = c.account_id.clone();
    state.put_account(&acct)?;
    state.index_account_id(&c.account_id, &c.owner)?;
    Ok(())
}
