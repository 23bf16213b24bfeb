//! Token actuators: AssetIssue, TransferAsset, ParticipateAssetIssue, UpdateAsset.
//!
//! | Aturan | Nilai |
//! |--------|-------|
//! | token per issuer | 1 |
//! | token id | sequential dari `latest_asset_id` |
//! | sale window | `[start_time, end_time)` |
//! | kurs | `amount * num / trx_num` |

use tracing::{debug, info};

use super::{checked_total, reject, require_balance, require_valid, ActuatorContext};
use crate::error::{ExecutionError, ValidationError};
use crate::state::{AssetIssue, ChainState};
use crate::tx::{
    AssetIssueContract, ParticipateAssetIssueContract, TransactionResult, TransferAssetContract,
    UpdateAssetContract,
};
use crate::types::Address;

pub const MAX_ASSET_NAME_LEN: usize = 32;
pub const MAX_ASSET_ABBR_LEN: usize = 5;
pub const MAX_ASSET_DESCRIPTION_LEN: usize = 200;
pub const MAX_ASSET_URL_LEN: usize = 256;
pub const MAX_ASSET_PRECISION: u32 = 6;

fn readable(bytes: &[u8]) -> bool {
    bytes.iter().all(|b| (0x21..=0x7e).contains(b))
}

fn validate_description_url(description: &[u8], url: &[u8]) -> Result<(), ValidationError> {
    if description.len() > MAX_ASSET_DESCRIPTION_LEN {
        return Err(reject("asset description too long"));
    }
    if url.is_empty() || url.len() > MAX_ASSET_URL_LEN {
        return Err(reject("invalid asset url length"));
    }
    Ok(())
}

/// Native amount → token amount at the asset's fixed rate.
fn exchange_amount(asset: &AssetIssue, amount: u128) -> Option<u128> {
    if asset.trx_num == 0 {
        return None;
    }
    amount
        .checked_mul(asset.num as u128)?
        .checked_div(asset.trx_num as u128)
}

/// Move tokens between two existing accounts, checking both sides first.
fn move_asset(
    state: &mut ChainState<'_>,
    from: &Address,
    to: &Address,
    id: u64,
    amount: u128,
) -> Result<(), ExecutionError> {
    let mut src = state.require_account(from)?;
    let mut dst = state.require_account(to)?;
    let have = src.asset_balance(id);
    let left = have.checked_sub(amount).ok_or(ExecutionError::BalanceInsufficient {
        required: amount,
        available: have,
    })?;
    let credited = dst
        .asset_balance(id)
        .checked_add(amount)
        .ok_or(ExecutionError::Overflow("asset credit"))?;
    if left == 0 {
        src.assets.remove(&id);
    } else {
        src.assets.insert(id, left);
    }
    dst.assets.insert(id, credited);
    state.put_account(&src)?;
    state.put_account(&dst)?;
    Ok(())
}

// ════════════════════════════════════════════════════════════════════════════
// ISSUE
// ════════════════════════════════════════════════════════════════════════════

pub(super) fn validate_issue(
    c: &AssetIssueContract,
    state: &ChainState<'_>,
    ctx: &ActuatorContext<'_>,
) -> Result<(), ValidationError> {
    if c.name.is_empty() || c.name.len() > MAX_ASSET_NAME_LEN || !readable(&c.name) {
        return Err(reject("invalid asset name"));
    }
    if c.abbr.len() > MAX_ASSET_ABBR_LEN || !readable(&c.abbr) {
        return Err(reject("invalid asset abbreviation"));
    }
    validate_description_url(&c.description, &c.url)?;
    if c.total_supply == 0 {
        return Err(reject("total supply must be positive"));
    }
    if c.trx_num == 0 || c.num == 0 {
        return Err(reject("exchange rate terms must be positive"));
    }
    if c.precision > MAX_ASSET_PRECISION {
        return Err(reject(format!("precision must be at most {}", MAX_ASSET_PRECISION)));
    }
    if c.start_time <= ctx.now {
        return Err(ValidationError::Timing("sale must start in the future".into()));
    }
    if c.end_time <= c.start_time {
        return Err(ValidationError::Timing("sale must end after it starts".into()));
    }

    let owner = state.account(&c.owner)?.ok_or(ValidationError::AccountNotFound(c.owner))?;
    if owner.asset_issued_id.is_some() {
        return Err(reject("account has already issued a token"));
    }
    if state.properties()?.allow_same_token_name == 0 && state.asset_name_taken(&c.name)? {
        return Err(reject("token name already exists"));
    }
    Ok(())
}

pub(super) fn execute_issue(
    c: &AssetIssueContract,
    state: &mut ChainState<'_>,
    result: &mut TransactionResult,
) -> Result<(), ExecutionError> {
    let id = state.next_asset_id()?;
    let asset = AssetIssue {
        id,
        owner: c.owner,
        name: c.name.clone(),
        abbr: c.abbr.clone(),
        total_supply: c.total_supply,
        precision: c.precision,
        trx_num: c.trx_num,
        num: c.num,
        start_time: c.start_time,
        end_time: c.end_time,
        description: c.description.clone(),
        url: c.url.clone(),
    };
    state.put_asset(&asset)?;

    let mut acct = state.require_account(&c.owner)?;
    acct.assets.insert(id, c.total_supply);
    acct.asset_issued_id = Some(id);
    state.put_account(&acct)?;

    result.asset_issue_id = Some(id);
    info!(id, owner = %c.owner, supply = c.total_supply, "token issued");
    Ok(())
}

// ════════════════════════════════════════════════════════════════════════════
// TRANSFER
// ════════════════════════════════════════════════════════════════════════════

pub(super) fn validate_transfer(c: &TransferAssetContract, state: &ChainState<'_>) -> Result<(), ValidationError> {
    require_valid(&c.to, "destination")?;
    if c.to == c.owner {
        return Err(reject("cannot transfer asset to self"));
    }
    if c.amount == 0 {
        return Err(reject("amount must be positive"));
    }
    if state.asset(c.asset_id)?.is_none() {
        return Err(reject(format!("token {} does not exist", c.asset_id)));
    }
    let owner = state.account(&c.owner)?.ok_or(ValidationError::AccountNotFound(c.owner))?;
    let have = owner.asset_balance(c.asset_id);
    if have < c.amount {
        return Err(reject(format!("asset balance {} below {}", have, c.amount)));
    }
    if let Some(dst) = state.account(&c.to)? {
        if dst.asset_balance(c.asset_id).checked_add(c.amount).is_none() {
            return Err(reject("destination asset balance would overflow"));
        }
    }
    Ok(())
}

pub(super) fn execute_transfer(
    c: &TransferAssetContract,
    state: &mut ChainState<'_>,
    ctx: &ActuatorContext<'_>,
) -> Result<(), ExecutionError> {
    state.ensure_account(&c.to, ctx.now)?;
    move_asset(state, &c.owner, &c.to, c.asset_id, c.amount)?;
    debug!(from = %c.owner, to = %c.to, token = c.asset_id, amount = c.amount, "asset transferred");
    Ok(())
}

// ════════════════════════════════════════════════════════════════════════════
// PARTICIPATE
// ════════════════════════════════════════════════════════════════════════════

pub(super) fn validate_participate(
    c: &ParticipateAssetIssueContract,
    state: &ChainState<'_>,
    ctx: &ActuatorContext<'_>,
    fee: u128,
) -> Result<(), ValidationError> {
    require_valid(&c.to, "issuer")?;
    if c.to == c.owner {
        return Err(reject("cannot participate in own token"));
    }
    if c.amount == 0 {
        return Err(reject("amount must be positive"));
    }
    let asset = state
        .asset(c.asset_id)?
        .ok_or_else(|| reject(format!("token {} does not exist", c.asset_id)))?;
    if asset.owner != c.to {
        return Err(reject("token is not issued by this account"));
    }
    if ctx.now < asset.start_time || ctx.now >= asset.end_time {
        return Err(ValidationError::Timing("token sale is not open".into()));
    }
    let owner = state.account(&c.owner)?.ok_or(ValidationError::AccountNotFound(c.owner))?;
    require_balance(&owner, checked_total(c.amount, fee)?)?;

    let tokens = exchange_amount(&asset, c.amount).ok_or_else(|| reject("exchange amount overflows"))?;
    if tokens == 0 {
        return Err(reject("amount too small to buy any token"));
    }
    let issuer = state.account(&c.to)?.ok_or(ValidationError::AccountNotFound(c.to))?;
    if issuer.asset_balance(c.asset_id) < tokens {
        return Err(reject("issuer has insufficient token balance"));
    }
    if issuer.balance.checked_add(c.amount).is_none() {
        return Err(reject("issuer balance would overflow"));
    }
    Ok(())
}

pub(super) fn execute_participate(
    c: &ParticipateAssetIssueContract,
    state: &mut ChainState<'_>,
) -> Result<(), ExecutionError> {
    let asset = state
        .asset(c.asset_id)?
        .ok_or_else(|| ExecutionError::Failed(format!("token {} missing", c.asset_id)))?;
    let tokens = exchange_amount(&asset, c.amount).ok_or(ExecutionError::Overflow("exchange amount"))?;
    state.transfer_balance(&c.owner, &c.to, c.amount)?;
    move_asset(state, &c.to, &c.owner, c.asset_id, tokens)?;
    debug!(buyer = %c.owner, token = c.asset_id, paid = c.amount, tokens, "token sale");
    Ok(())
}

// ════════════════════════════════════════════════════════════════════════════
// UPDATE
// ════════════════════════════════════════════════════════════════════════════

pub(super) fn validate_update(c: &UpdateAssetContract, state: &ChainState<'_>) -> Result<(), ValidationError> {
    validate_description_url(&c.description, &c.url)?;
    let owner = state.account(&c.owner)?.ok_or(ValidationError::AccountNotFound(c.owner))?;
    let id = owner
        .asset_issued_id
        .ok_or_else(|| reject("account has not issued a token"))?;
    if state.asset(id)?.is_none() {
        return Err(reject(format!("token {} does not exist", id)));
    }
    Ok(())
}

pub(super) fn execute_update(c: &UpdateAssetContract, state: &mut ChainState<'_>) -> Result<(), ExecutionError> {
    let acct = state.require_account(&c.owner)?;
    let id = acct
        .asset_issued_id
        .ok_or_else(|| ExecutionError::Failed("no issued token".into()))?;
    let mut asset = state
        .asset(id)?
        .ok_or_else(|| ExecutionError::Failed(format!("token {} missing", id)))?;
    asset.description = c.description.clone();
    asset.url = c.url.clone();
    state.put_asset(&asset)?;
    Ok(())
}
