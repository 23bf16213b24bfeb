//! Smart-contract actuators against a scripted VM.
//! Run with: cargo test --test contract_tests

use std::sync::Arc;

use dpos_chain::actuator::{simulate_constant_call, Actuator, ActuatorContext};
use dpos_chain::crypto::contract_address;
use dpos_chain::tx::*;
use dpos_chain::*;
use dpos_common::config::{GenesisAccount, GenesisWitness};
use dpos_common::ONE_UNIT;

// ============================================================
// MOCK VM
// ============================================================

const SLOT: &[u8] = b"value";

/// Tiny scripted VM. Deploy echoes the bytecode as runtime code.
/// Call data: `set:<v>` stores v, `get` reads it back, `fail` writes then
/// reverts, `spin` runs out of energy.
struct MockVm;

fn internal(e: StoreError) -> VmError {
    VmError::Internal(e.to_string())
}

impl VmExecutor for MockVm {
    fn deploy(&self, _state: &mut ChainState<'_>, _ctx: &VmContext, bytecode: &[u8]) -> Result<VmOutcome, VmError> {
        if bytecode == b"revert" {
            return Err(VmError::Revert("constructor".into()));
        }
        Ok(VmOutcome { output: bytecode.to_vec(), energy_used: 100 })
    }

    fn call(&self, state: &mut ChainState<'_>, ctx: &VmContext, _code: &[u8], data: &[u8]) -> Result<VmOutcome, VmError> {
        if let Some(v) = data.strip_prefix(b"set:") {
            state.put_storage_slot(&ctx.contract, SLOT, v).map_err(internal)?;
            return Ok(VmOutcome { output: Vec::new(), energy_used: 50 });
        }
        match data {
            b"get" => {
                let v = state.storage_slot(&ctx.contract, SLOT).map_err(internal)?;
                Ok(VmOutcome { output: v.unwrap_or_default(), energy_used: 10 })
            }
            b"fail" => {
                state.put_storage_slot(&ctx.contract, SLOT, b"dirty").map_err(internal)?;
                Err(VmError::Revert("fail".into()))
            }
            b"spin" => Err(VmError::OutOfEnergy(ctx.energy_limit)),
            _ => Err(VmError::Revert("unknown selector".into())),
        }
    }
}

// ============================================================
// HELPERS
// ============================================================

const ALICE: Address = Address([0xa1; 20]);
const BOB: Address = Address([0xb0; 20]);
const W: Address = Address([0x77; 20]);

const TX_FEE: u128 = 1_000;
const ENERGY_FEE: u128 = 100;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn config() -> ChainConfig {
    let mut cfg = ChainConfig::default();
    cfg.features.allow_creation_of_contracts = 1;
    cfg.genesis.accounts = vec![
        GenesisAccount { address: ALICE.to_hex(), balance: 100 * ONE_UNIT },
        GenesisAccount { address: BOB.to_hex(), balance: 10 * ONE_UNIT },
    ];
    cfg.genesis.witnesses = vec![GenesisWitness {
        address: W.to_hex(),
        url: "https://w.example".into(),
        vote_count: 1,
    }];
    cfg
}

fn tx_id(n: u8) -> Hash {
    Hash::from_bytes([n; 32])
}

fn run(vm: &MockVm, state: &mut ChainState<'_>, contract: Contract, id: Hash) -> Result<TransactionResult, ValidationError> {
    let actuator = Actuator::new(contract);
    let ctx = ActuatorContext::new(1_000, 1, id).with_vm(vm);
    actuator.validate(state, &ctx)?;
    let mut result = TransactionResult::default();
    let _ = actuator.execute(state, &ctx, &mut result);
    Ok(result)
}

fn create(owner: Address, bytecode: &[u8], percent: u64) -> Contract {
    Contract::CreateSmartContract(CreateSmartContract {
        owner,
        name: "counter".into(),
        bytecode: bytecode.to_vec(),
        abi: Vec::new(),
        call_value: 0,
        consume_user_resource_percent: percent,
        origin_energy_limit: 1_000_000,
        fee_limit: ONE_UNIT as u64,
    })
}

fn trigger(owner: Address, contract_address: Address, data: &[u8]) -> Contract {
    Contract::TriggerSmartContract(TriggerSmartContract {
        owner,
        contract_address,
        data: data.to_vec(),
        call_value: 0,
        fee_limit: ONE_UNIT as u64,
    })
}

fn deploy(vm: &MockVm, state: &mut ChainState<'_>, percent: u64) -> Address {
    let r = run(vm, state, create(ALICE, b"counter-code", percent), tx_id(1)).unwrap();
    assert!(r.is_success(), "{}", r.message);
    r.contract_address.unwrap()
}

// ============================================================
// TESTS
// ============================================================

#[test]
fn test_create_charges_energy_and_derives_address() {
    init_tracing();
    let vm = MockVm;
    let mut store = MemoryStore::new();
    let mut state = ChainState::new(&mut store);
    state.init_genesis(&config()).unwrap();

    let before = state.balance_of(&ALICE).unwrap();
    let r = run(&vm, &mut state, create(ALICE, b"counter-code", 100), tx_id(1)).unwrap();
    assert!(r.is_success(), "{}", r.message);
    assert_eq!(r.energy_used, 100);
    assert_eq!(r.fee, TX_FEE + 100 * ENERGY_FEE);
    assert_eq!(state.balance_of(&ALICE).unwrap(), before - r.fee);

    let addr = contract_address(&tx_id(1), &ALICE);
    assert_eq!(r.contract_address, Some(addr));
    let stored = state.contract(&addr).unwrap().unwrap();
    assert_eq!(stored.origin, ALICE);
    assert_eq!(stored.bytecode, b"counter-code".to_vec());

    // same tx id, same owner: address already taken
    assert!(run(&vm, &mut state, create(ALICE, b"counter-code", 100), tx_id(1)).is_err());
}

#[test]
fn test_create_rules() {
    let vm = MockVm;
    let mut cfg = config();
    cfg.features.allow_creation_of_contracts = 0;
    let mut store = MemoryStore::new();
    let mut state = ChainState::new(&mut store);
    state.init_genesis(&cfg).unwrap();
    assert!(run(&vm, &mut state, create(ALICE, b"code", 100), tx_id(1)).is_err());

    let mut store = MemoryStore::new();
    let mut state = ChainState::new(&mut store);
    state.init_genesis(&config()).unwrap();
    assert!(run(&vm, &mut state, create(ALICE, b"", 100), tx_id(1)).is_err());
    assert!(run(&vm, &mut state, create(ALICE, b"code", 101), tx_id(1)).is_err());

    // no VM wired in: rejected before any fee
    let actuator = Actuator::new(create(ALICE, b"code", 100));
    let ctx = ActuatorContext::new(1_000, 1, tx_id(2));
    assert!(actuator.validate(&state, &ctx).is_err());
}

#[test]
fn test_constructor_revert_keeps_only_the_fee() {
    let vm = MockVm;
    let mut store = MemoryStore::new();
    let mut state = ChainState::new(&mut store);
    state.init_genesis(&config()).unwrap();

    let before = state.balance_of(&ALICE).unwrap();
    let r = run(&vm, &mut state, create(ALICE, b"revert", 100), tx_id(3)).unwrap();
    assert_eq!(r.status, TxStatus::Failed);
    assert_eq!(r.fee, TX_FEE);
    assert_eq!(state.balance_of(&ALICE).unwrap(), before - TX_FEE);
    let addr = contract_address(&tx_id(3), &ALICE);
    assert!(state.contract(&addr).unwrap().is_none());
    assert!(!state.account_exists(&addr).unwrap());
}

#[test]
fn test_trigger_writes_storage_and_reverts_roll_back() {
    init_tracing();
    let vm = MockVm;
    let mut store = MemoryStore::new();
    let mut state = ChainState::new(&mut store);
    state.init_genesis(&config()).unwrap();
    let addr = deploy(&vm, &mut state, 100);

    let r = run(&vm, &mut state, trigger(BOB, addr, b"set:7"), tx_id(10)).unwrap();
    assert!(r.is_success(), "{}", r.message);
    assert_eq!(r.fee, TX_FEE + 50 * ENERGY_FEE);
    assert_eq!(state.storage_slot(&addr, SLOT).unwrap(), Some(b"7".to_vec()));

    let bob = state.balance_of(&BOB).unwrap();
    let r = run(&vm, &mut state, trigger(BOB, addr, b"fail"), tx_id(11)).unwrap();
    assert_eq!(r.status, TxStatus::Failed);
    assert_eq!(r.fee, TX_FEE);
    assert_eq!(state.balance_of(&BOB).unwrap(), bob - TX_FEE);
    assert_eq!(state.storage_slot(&addr, SLOT).unwrap(), Some(b"7".to_vec()));

    // out of energy: whole limit billed, writes still dropped
    let bob = state.balance_of(&BOB).unwrap();
    let r = run(&vm, &mut state, trigger(BOB, addr, b"spin"), tx_id(12)).unwrap();
    assert_eq!(r.status, TxStatus::Failed);
    let limit = ONE_UNIT as u64 / ENERGY_FEE as u64;
    assert_eq!(r.energy_used, limit);
    assert_eq!(r.fee, TX_FEE + limit as u128 * ENERGY_FEE);
    assert!(r.fee > TX_FEE + 50 * ENERGY_FEE);
    assert_eq!(state.balance_of(&BOB).unwrap(), bob - r.fee);
    assert_eq!(state.storage_slot(&addr, SLOT).unwrap(), Some(b"7".to_vec()));

    assert!(run(&vm, &mut state, trigger(BOB, Address([0xee; 20]), b"get"), tx_id(13)).is_err());
}

#[test]
fn test_deploy_out_of_energy_is_billed_to_owner() {
    let vm = MockVm;
    let mut store = MemoryStore::new();
    let mut state = ChainState::new(&mut store);
    state.init_genesis(&config()).unwrap();

    let mut c = create(ALICE, b"counter-code", 100);
    if let Contract::CreateSmartContract(inner) = &mut c {
        inner.fee_limit = 20_000;
    }
    // fee_limit 20_000 at energy_fee 100 gives 200 energy, deploy needs 100
    let before = state.balance_of(&ALICE).unwrap();
    let r = run(&vm, &mut state, c, tx_id(4)).unwrap();
    assert!(r.is_success());
    assert_eq!(state.balance_of(&ALICE).unwrap(), before - TX_FEE - 100 * ENERGY_FEE);

    let addr = r.contract_address.unwrap();
    let spin = Contract::TriggerSmartContract(TriggerSmartContract {
        owner: ALICE,
        contract_address: addr,
        data: b"spin".to_vec(),
        call_value: 0,
        fee_limit: 20_000,
    });
    let before = state.balance_of(&ALICE).unwrap();
    let r = run(&vm, &mut state, spin, tx_id(5)).unwrap();
    assert_eq!(r.status, TxStatus::Failed);
    assert_eq!((r.energy_used, r.fee), (200, TX_FEE + 20_000));
    assert_eq!(state.balance_of(&ALICE).unwrap(), before - TX_FEE - 20_000);
}

#[test]
fn test_origin_pays_energy_when_user_percent_is_zero() {
    let vm = MockVm;
    let mut store = MemoryStore::new();
    let mut state = ChainState::new(&mut store);
    state.init_genesis(&config()).unwrap();
    let addr = deploy(&vm, &mut state, 0);

    let alice = state.balance_of(&ALICE).unwrap();
    let bob = state.balance_of(&BOB).unwrap();
    let r = run(&vm, &mut state, trigger(BOB, addr, b"set:1"), tx_id(20)).unwrap();
    assert!(r.is_success(), "{}", r.message);
    assert_eq!(state.balance_of(&BOB).unwrap(), bob - TX_FEE);
    assert_eq!(state.balance_of(&ALICE).unwrap(), alice - 50 * ENERGY_FEE);
}

#[test]
fn test_constant_call_discards_writes() {
    let vm = MockVm;
    let mut store = MemoryStore::new();
    let mut state = ChainState::new(&mut store);
    state.init_genesis(&config()).unwrap();
    let addr = deploy(&vm, &mut state, 100);
    assert!(run(&vm, &mut state, trigger(ALICE, addr, b"set:42"), tx_id(30)).unwrap().is_success());

    let out = simulate_constant_call(state.store(), &vm, &BOB, &addr, b"get").unwrap();
    assert_eq!(out.output, b"42".to_vec());
    simulate_constant_call(state.store(), &vm, &BOB, &addr, b"set:0").unwrap();
    assert_eq!(state.storage_slot(&addr, SLOT).unwrap(), Some(b"42".to_vec()));
}

#[test]
fn test_chain_with_vm_end_to_end() {
    init_tracing();
    let chain = Chain::in_memory(&config()).unwrap().with_vm(Arc::new(MockVm));
    let deploy_tx = Transaction::new(&create(ALICE, b"counter-code", 100), 1, 60_000);
    let addr = contract_address(&deploy_tx.tx_id(), &ALICE);
    let set_tx = Transaction::new(&trigger(BOB, addr, b"set:9"), 2, 60_000);

    let (_, parent, _) = chain.head().unwrap();
    let producer = chain.next_producer(3_000).unwrap().unwrap();
    let block = Block::new(1, parent, 3_000, producer, vec![deploy_tx, set_tx]);
    let receipt = chain.apply_block(&block).unwrap();
    assert_eq!(receipt.results[0].contract_address, Some(addr));
    assert!(receipt.results[1].is_success(), "{}", receipt.results[1].message);

    assert_eq!(chain.constant_call(&BOB, &addr, b"get").unwrap().output, b"9".to_vec());
    chain.constant_call(&BOB, &addr, b"set:0").unwrap();
    assert_eq!(chain.constant_call(&BOB, &addr, b"get").unwrap().output, b"9".to_vec());
}
