//! CreateSmartContract / TriggerSmartContract dan constant call.
//!
//! VM dipanggil lewat trait object [`VmExecutor`] dari `ActuatorContext`.
//! Seluruh body actuator sudah berjalan di deposit anak, jadi write VM ikut
//! dibuang bersama body kalau VM gagal. Energy fee dibakar kalau sukses atau
//! kalau VM kehabisan energy (seluruh limit ditagih ke caller); revert lain
//! hanya membayar fee transaksi. Selalu dibatasi `fee_limit`.
//!
//! ```text
//! energy_limit = min(fee_limit, spendable) / energy_fee
//! energy_cost  = min(energy_used * energy_fee, fee_limit)
//! caller share = energy_cost * consume_user_resource_percent / 100
//! origin share = sisanya, dibatasi origin_energy_limit dan balance origin
//! ```

use tracing::debug;

use super::{checked_total, reject, require_balance, ActuatorContext};
use crate::crypto::contract_address;
use crate::error::{ExecutionError, ValidationError};
use crate::state::{as_amount, ChainState, DynamicProperties, SmartContract};
use crate::store::{Deposit, StateStore};
use crate::tx::{CreateSmartContract, TransactionResult, TriggerSmartContract};
use crate::types::Address;
use crate::vm::{VmContext, VmError, VmExecutor, VmOutcome};

pub const MAX_CONTRACT_NAME_LEN: usize = 32;
pub const MAX_USER_RESOURCE_PERCENT: u64 = 100;

fn require_vm<'v>(ctx: &ActuatorContext<'v>) -> Result<&'v dyn VmExecutor, ValidationError> {
    ctx.vm.ok_or_else(|| reject("no vm executor configured"))
}

fn vm_error(e: VmError) -> ExecutionError {
    match e {
        VmError::Revert(msg) => ExecutionError::VmRevert(msg),
        other => ExecutionError::VmRevert(other.to_string()),
    }
}

fn energy_limit(props: &DynamicProperties, spendable: u128, fee_limit: u64) -> u64 {
    let price = as_amount(props.energy_fee).max(1);
    let budget = spendable.min(fee_limit as u128) / price;
    u64::try_from(budget).unwrap_or(u64::MAX)
}

fn energy_cost(props: &DynamicProperties, energy_used: u64, fee_limit: u64) -> u128 {
    (energy_used as u128)
        .saturating_mul(as_amount(props.energy_fee))
        .min(fee_limit as u128)
}

/// OutOfEnergy still bills the whole `limit`. The charge is left in
/// `result.fee` and burned by `Actuator::execute` outside the dropped child.
fn bill_exhausted_energy(e: &VmError, props: &DynamicProperties, limit: u64, fee_limit: u64, result: &mut TransactionResult) {
    if let VmError::OutOfEnergy(_) = e {
        result.energy_used = limit;
        result.fee = energy_cost(props, limit, fee_limit);
    }
}

fn vm_context(props: &DynamicProperties, ctx: &ActuatorContext<'_>, caller: Address, contract: Address, call_value: u128, energy_limit: u64) -> VmContext {
    VmContext {
        caller,
        contract,
        call_value,
        energy_limit,
        max_cpu_time_ms: props.max_cpu_time_of_one_tx,
        block_num: ctx.block_num,
        timestamp: ctx.now,
        is_constant: false,
        allow_trc10_transfer: props.allow_tvm_transfer_trc10 == 1,
    }
}

// ════════════════════════════════════════════════════════════════════════════
// CREATE
// ════════════════════════════════════════════════════════════════════════════

pub(super) fn validate_create(
    c: &CreateSmartContract,
    state: &ChainState<'_>,
    ctx: &ActuatorContext<'_>,
    fee: u128,
) -> Result<(), ValidationError> {
    require_vm(ctx)?;
    if state.properties()?.allow_creation_of_contracts != 1 {
        return Err(reject("contract creation is not enabled"));
    }
    if c.name.len() > MAX_CONTRACT_NAME_LEN {
        return Err(reject("contract name too long"));
    }
    if c.bytecode.is_empty() {
        return Err(reject("contract bytecode is empty"));
    }
    if c.consume_user_resource_percent > MAX_USER_RESOURCE_PERCENT {
        return Err(reject("consume_user_resource_percent must be in [0, 100]"));
    }
    if c.origin_energy_limit == 0 {
        return Err(reject("origin_energy_limit must be positive"));
    }
    let owner = state.account(&c.owner)?.ok_or(ValidationError::AccountNotFound(c.owner))?;
    require_balance(&owner, checked_total(c.call_value, fee)?)?;

    let addr = contract_address(&ctx.tx_id, &c.owner);
    if state.account_exists(&addr)? || state.contract(&addr)?.is_some() {
        return Err(reject(format!("contract address {} already in use", addr)));
    }
    Ok(())
}

pub(super) fn execute_create(
    c: &CreateSmartContract,
    state: &mut ChainState<'_>,
    ctx: &ActuatorContext<'_>,
    result: &mut TransactionResult,
) -> Result<(), ExecutionError> {
    let vm = ctx.vm.ok_or(ExecutionError::VmUnavailable)?;
    let props = state.properties()?;
    let addr = contract_address(&ctx.tx_id, &c.owner);

    state.ensure_account(&addr, ctx.now)?;
    if c.call_value > 0 {
        state.transfer_balance(&c.owner, &addr, c.call_value)?;
    }

    let spendable = state.balance_of(&c.owner)?;
    let limit = energy_limit(&props, spendable, c.fee_limit);
    let vm_ctx = vm_context(&props, ctx, c.owner, addr, c.call_value, limit);
    let outcome = match vm.deploy(state, &vm_ctx, &c.bytecode) {
        Ok(o) => o,
        Err(e) => {
            bill_exhausted_energy(&e, &props, limit, c.fee_limit, result);
            return Err(vm_error(e));
        }
    };

    let runtime = if outcome.output.is_empty() { c.bytecode.clone() } else { outcome.output.clone() };
    state.put_contract(&SmartContract {
        address: addr,
        origin: c.owner,
        name: c.name.clone(),
        bytecode: runtime,
        abi: c.abi.clone(),
        consume_user_resource_percent: c.consume_user_resource_percent,
        origin_energy_limit: c.origin_energy_limit,
    })?;

    let cost = energy_cost(&props, outcome.energy_used, c.fee_limit);
    state.burn(&c.owner, cost)?;

    result.fee = cost;
    result.energy_used = outcome.energy_used;
    result.contract_address = Some(addr);
    debug!(owner = %c.owner, contract = %addr, energy = outcome.energy_used, "contract deployed");
    Ok(())
}

// ════════════════════════════════════════════════════════════════════════════
// TRIGGER
// ════════════════════════════════════════════════════════════════════════════

pub(super) fn validate_trigger(
    c: &TriggerSmartContract,
    state: &ChainState<'_>,
    ctx: &ActuatorContext<'_>,
    fee: u128,
) -> Result<(), ValidationError> {
    require_vm(ctx)?;
    if state.contract(&c.contract_address)?.is_none() {
        return Err(reject(format!("no contract at {}", c.contract_address)));
    }
    let owner = state.account(&c.owner)?.ok_or(ValidationError::AccountNotFound(c.owner))?;
    require_balance(&owner, checked_total(c.call_value, fee)?)?;
    if c.call_value > 0 {
        let target = state.balance_of(&c.contract_address)?;
        if target.checked_add(c.call_value).is_none() {
            return Err(reject("contract balance would overflow"));
        }
    }
    Ok(())
}

/// Split `cost` between caller and contract origin. The origin pays at most
/// `origin_energy_limit` worth and never more than it holds.
fn charge_energy(
    state: &mut ChainState<'_>,
    props: &DynamicProperties,
    caller: &Address,
    contract: &SmartContract,
    cost: u128,
) -> Result<(), ExecutionError> {
    let user_share = cost
        .checked_mul(contract.consume_user_resource_percent as u128)
        .ok_or(ExecutionError::Overflow("energy share"))?
        / MAX_USER_RESOURCE_PERCENT as u128;
    let origin_cap = (contract.origin_energy_limit as u128).saturating_mul(as_amount(props.energy_fee));
    let origin_share = (cost - user_share)
        .min(origin_cap)
        .min(state.balance_of(&contract.origin)?);
    if origin_share > 0 && contract.origin != *caller {
        state.burn(&contract.origin, origin_share)?;
        state.burn(caller, cost - origin_share)?;
    } else {
        state.burn(caller, cost)?;
    }
    Ok(())
}

pub(super) fn execute_trigger(
    c: &TriggerSmartContract,
    state: &mut ChainState<'_>,
    ctx: &ActuatorContext<'_>,
    result: &mut TransactionResult,
) -> Result<(), ExecutionError> {
    let vm = ctx.vm.ok_or(ExecutionError::VmUnavailable)?;
    let props = state.properties()?;
    let contract = state
        .contract(&c.contract_address)?
        .ok_or_else(|| ExecutionError::Failed(format!("no contract at {}", c.contract_address)))?;

    if c.call_value > 0 {
        state.transfer_balance(&c.owner, &c.contract_address, c.call_value)?;
    }

    let spendable = state.balance_of(&c.owner)?;
    let limit = energy_limit(&props, spendable, c.fee_limit);
    let vm_ctx = vm_context(&props, ctx, c.owner, c.contract_address, c.call_value, limit);
    let outcome = match vm.call(state, &vm_ctx, &contract.bytecode, &c.data) {
        Ok(o) => o,
        Err(e) => {
            bill_exhausted_energy(&e, &props, limit, c.fee_limit, result);
            return Err(vm_error(e));
        }
    };

    let cost = energy_cost(&props, outcome.energy_used, c.fee_limit);
    charge_energy(state, &props, &c.owner, &contract, cost)?;

    result.fee = cost;
    result.energy_used = outcome.energy_used;
    result.vm_output = outcome.output;
    debug!(caller = %c.owner, contract = %c.contract_address, energy = result.energy_used, "contract triggered");
    Ok(())
}

// ════════════════════════════════════════════════════════════════════════════
// CONSTANT CALL
// ════════════════════════════════════════════════════════════════════════════

/// Run a read-only call against `store`. Every write the VM makes goes to a
/// throwaway deposit, so `store` is never modified.
pub fn simulate_constant_call(
    store: &dyn StateStore,
    vm: &dyn VmExecutor,
    caller: &Address,
    contract: &Address,
    data: &[u8],
) -> Result<VmOutcome, ExecutionError> {
    let mut scratch = Deposit::new(store);
    let outcome = {
        let mut state = ChainState::new(&mut scratch);
        let props = state.properties()?;
        let code = state
            .contract(contract)?
            .ok_or_else(|| ExecutionError::Failed(format!("no contract at {}", contract)))?;
        let ctx = VmContext {
            caller: *caller,
            contract: *contract,
            call_value: 0,
            energy_limit: u64::try_from(as_amount(props.total_energy_limit)).unwrap_or(u64::MAX),
            max_cpu_time_ms: props.max_cpu_time_of_one_tx,
            block_num: props.latest_block_num,
            timestamp: props.latest_block_timestamp,
            is_constant: true,
            allow_trc10_transfer: props.allow_tvm_transfer_trc10 == 1,
        };
        vm.call(&mut state, &ctx, &code.bytecode, data).map_err(vm_error)?
    };
    scratch.discard();
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dpos_common::ChainConfig;

    fn props(energy_fee: i64) -> DynamicProperties {
        let mut p = DynamicProperties::from_config(&ChainConfig::default()).unwrap();
        p.energy_fee = energy_fee;
        p
    }

    #[test]
    fn test_energy_limit_bounded_by_fee_limit_and_balance() {
        let p = props(10);
        assert_eq!(energy_limit(&p, 1_000, 500), 50);
        assert_eq!(energy_limit(&p, 200, 500), 20);
        // zero price treated as 1
        assert_eq!(energy_limit(&props(0), 200, 500), 200);
    }

    #[test]
    fn test_energy_cost_capped_by_fee_limit() {
        let p = props(10);
        assert_eq!(energy_cost(&p, 7, 1_000), 70);
        assert_eq!(energy_cost(&p, 700, 1_000), 1_000);
        assert_eq!(energy_cost(&props(0), 700, 1_000), 0);
    }
}
