//! Block production, maintenance and governance scenarios.
//! Run with: cargo test --test consensus_scenarios

use std::collections::BTreeMap;

use dpos_chain::actuator::{Actuator, ActuatorContext};
use dpos_chain::scheduler::scheduled_witness;
use dpos_chain::state::ProposalState;
use dpos_chain::tx::*;
use dpos_chain::*;
use dpos_common::config::{GenesisAccount, GenesisWitness};
use dpos_common::ONE_UNIT;

// ============================================================
// HELPERS
// ============================================================

const A: Address = Address([0x0a; 20]);
const B: Address = Address([0x0b; 20]);
const C: Address = Address([0x0c; 20]);
const USER: Address = Address([0x55; 20]);

const INTERVAL: u64 = 3_000;
const EPOCH: u64 = 9_000;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn genesis_witness(addr: Address, votes: u64) -> GenesisWitness {
    GenesisWitness {
        address: addr.to_hex(),
        url: format!("https://{}.example", addr.to_hex()),
        vote_count: votes,
    }
}

/// Three witnesses A > B > C by votes, 3s blocks, 9s epochs.
fn small_net() -> ChainConfig {
    let mut cfg = ChainConfig::default();
    cfg.chain.block_interval_ms = INTERVAL;
    cfg.chain.maintenance_interval_ms = EPOCH;
    cfg.genesis.accounts = vec![GenesisAccount { address: USER.to_hex(), balance: 100 * ONE_UNIT }];
    cfg.genesis.witnesses = vec![genesis_witness(A, 300), genesis_witness(B, 200), genesis_witness(C, 100)];
    cfg
}

/// 27 genesis witnesses, each funded for proposal fees.
fn full_committee() -> (ChainConfig, Vec<Address>) {
    let witnesses: Vec<Address> = (1u8..=27).map(|b| Address([b; 20])).collect();
    let mut cfg = ChainConfig::default();
    cfg.genesis.accounts = witnesses
        .iter()
        .map(|a| GenesisAccount { address: a.to_hex(), balance: ONE_UNIT })
        .collect();
    cfg.genesis.witnesses = witnesses
        .iter()
        .enumerate()
        .map(|(i, a)| genesis_witness(*a, 1_000 - i as u64))
        .collect();
    (cfg, witnesses)
}

fn run(state: &mut ChainState<'_>, contract: Contract, now: u64) -> Result<TransactionResult, ValidationError> {
    let actuator = Actuator::new(contract);
    let ctx = ActuatorContext::new(now, 1, Hash::default());
    actuator.validate(state, &ctx)?;
    let mut result = TransactionResult::default();
    let _ = actuator.execute(state, &ctx, &mut result);
    Ok(result)
}

fn next_block(state: &ChainState<'_>, ts: u64, txs: Vec<Transaction>) -> Block {
    let props = state.properties().unwrap();
    let slot = state.slot_at_time(ts).unwrap();
    let producer = state.scheduled_witness_at(slot).unwrap().unwrap();
    Block::new(props.latest_block_num + 1, props.latest_block_hash, ts, producer, txs)
}

fn produce(state: &mut ChainState<'_>, ts: u64) -> BlockReceipt {
    let block = next_block(state, ts, Vec::new());
    BlockProcessor::new().apply_block(state, &block).unwrap()
}

fn propose(state: &mut ChainState<'_>, owner: Address, id: u64, value: i64) -> u64 {
    let mut parameters = BTreeMap::new();
    parameters.insert(id, value);
    let r = run(state, Contract::ProposalCreate(ProposalCreateContract { owner, parameters }), 1_000).unwrap();
    assert!(r.is_success(), "{}", r.message);
    state.properties().unwrap().latest_proposal_num
}

fn approve(state: &mut ChainState<'_>, owner: Address, proposal_id: u64) {
    let c = Contract::ProposalApprove(ProposalApproveContract { owner, proposal_id, is_add_approval: true });
    assert!(run(state, c, 2_000).unwrap().is_success());
}

// ============================================================
// SCHEDULE
// ============================================================

#[test]
fn test_schedule_is_deterministic() {
    let active: Vec<Address> = (1u8..=5).map(|b| Address([b; 20])).collect();
    for head in [0u64, 7, 1_000_003] {
        for slot in 1..20 {
            let first = scheduled_witness(&active, head, slot, 2);
            let second = scheduled_witness(&active.clone(), head, slot, 2);
            assert_eq!(first, second);
        }
    }
    // single_repeat keeps a witness for consecutive slots
    assert_eq!(scheduled_witness(&active, 0, 2, 2), scheduled_witness(&active, 0, 3, 2));
    assert_eq!(scheduled_witness(&[], 0, 1, 1), None);

    // two chains from the same genesis agree on every producer
    let one = Chain::in_memory(&small_net()).unwrap();
    let two = Chain::in_memory(&small_net()).unwrap();
    for ts in (INTERVAL..10 * INTERVAL).step_by(INTERVAL as usize) {
        assert_eq!(one.next_producer(ts).unwrap(), two.next_producer(ts).unwrap());
    }
}

#[test]
fn test_first_block_schedule_and_rejections() {
    init_tracing();
    let mut store = MemoryStore::new();
    let mut state = ChainState::new(&mut store);
    state.init_genesis(&small_net()).unwrap();
    assert_eq!(state.active_witnesses().unwrap(), vec![A, B, C]);

    // slot 1 after genesis belongs to active[1]
    let block = next_block(&state, INTERVAL, Vec::new());
    assert_eq!(block.header.witness, B);

    let mut wrong = block.clone();
    wrong.header.witness = A;
    assert!(matches!(
        BlockProcessor::new().apply_block(&mut state, &wrong),
        Err(BlockError::NotScheduled { slot: 1, .. })
    ));

    let mut orphan = block.clone();
    orphan.header.parent_hash = Hash::from_bytes([9; 32]);
    assert_eq!(BlockProcessor::new().apply_block(&mut state, &orphan), Err(BlockError::WrongParent));

    let receipt = BlockProcessor::new().apply_block(&mut state, &block).unwrap();
    assert_eq!((receipt.number, receipt.slot, receipt.missed_slots), (1, 1, 0));

    let stale = Block::new(2, receipt.hash, INTERVAL, A, Vec::new());
    assert!(matches!(
        BlockProcessor::new().apply_block(&mut state, &stale),
        Err(BlockError::StaleTimestamp { .. })
    ));

    let w = state.witness(&B).unwrap().unwrap();
    assert_eq!((w.epoch_produced, w.total_produced, w.latest_block_num), (1, 1, 1));
    let pay = state.properties().unwrap().witness_pay_per_block as u128;
    assert_eq!(state.account(&B).unwrap().unwrap().allowance, pay);
}

#[test]
fn test_transactions_must_match_header_tx_root() {
    let mut store = MemoryStore::new();
    let mut state = ChainState::new(&mut store);
    state.init_genesis(&small_net()).unwrap();
    let to = Address([0x66; 20]);
    let pay = Transaction::new(&Contract::Transfer(TransferContract { owner: USER, to, amount: ONE_UNIT }), 0, 10_000);

    // header committed to an empty block, body swapped afterwards
    let honest = next_block(&state, INTERVAL, Vec::new());
    let mut swapped = honest.clone();
    swapped.transactions = vec![pay.clone()];
    assert_eq!(swapped.hash(), honest.hash());
    assert!(matches!(
        BlockProcessor::new().apply_block(&mut state, &swapped),
        Err(BlockError::TxRootMismatch { .. })
    ));
    assert!(state.account(&to).unwrap().is_none());
    assert_eq!(state.properties().unwrap().latest_block_num, 0);

    let block = next_block(&state, INTERVAL, vec![pay]);
    let receipt = BlockProcessor::new().apply_block(&mut state, &block).unwrap();
    assert!(receipt.results[0].is_success());
    assert_eq!(state.balance_of(&to).unwrap(), ONE_UNIT);
}

#[test]
fn test_transactions_outside_expiration_window_fail_without_fee() {
    let mut store = MemoryStore::new();
    let mut state = ChainState::new(&mut store);
    state.init_genesis(&small_net()).unwrap();
    let to = Address([0x66; 20]);
    let transfer = |ts: u64, expiration: u64| {
        Transaction::new(&Contract::Transfer(TransferContract { owner: USER, to, amount: ONE_UNIT }), ts, expiration)
    };
    let expired = transfer(0, INTERVAL);
    let far = transfer(1, INTERVAL + block::MAX_TX_EXPIRATION_MS + 1);
    let edge = transfer(2, INTERVAL + block::MAX_TX_EXPIRATION_MS);

    let before = state.balance_of(&USER).unwrap();
    let block = next_block(&state, INTERVAL, vec![expired, far]);
    let receipt = BlockProcessor::new().apply_block(&mut state, &block).unwrap();
    for r in &receipt.results {
        assert_eq!(r.status, TxStatus::Failed);
        assert_eq!(r.fee, 0);
    }
    assert_eq!(state.balance_of(&USER).unwrap(), before);
    assert!(state.account(&to).unwrap().is_none());

    let block = next_block(&state, 2 * INTERVAL, vec![edge]);
    let receipt = BlockProcessor::new().apply_block(&mut state, &block).unwrap();
    // window is measured from this block's time, so the edge is now inside
    assert!(receipt.results[0].is_success(), "{}", receipt.results[0].message);
    assert_eq!(state.balance_of(&to).unwrap(), ONE_UNIT);
}

// ============================================================
// PENALTY
// ============================================================

#[test]
fn test_missing_supernode_is_slashed_and_later_unbanned() {
    init_tracing();
    let mut store = MemoryStore::new();
    let mut state = ChainState::new(&mut store);
    state.init_genesis(&small_net()).unwrap();

    produce(&mut state, INTERVAL);
    // skip slot at 6s: it belonged to C
    let receipt = produce(&mut state, 3 * INTERVAL);
    assert_eq!(receipt.missed_slots, 1);

    let report = receipt.maintenance.expect("epoch boundary reached");
    assert_eq!(report.epoch, 1);
    assert_eq!(report.election.slashed, vec![C]);
    assert_eq!(report.election.left, vec![C]);
    assert_eq!(report.election.active, vec![A, B]);
    assert_eq!(report.next_maintenance_time, 2 * EPOCH);

    let props = state.properties().unwrap();
    let c = state.witness(&C).unwrap().unwrap();
    assert_eq!(c.status, WitnessStatus::Slashed);
    assert!(!c.is_jobs);
    assert_eq!(c.total_missed, 1);
    let ban = state.banned_witness(&C).unwrap().unwrap();
    assert_eq!(ban.expiration_time, 3 * INTERVAL + props.minor_penalty_epochs * EPOCH);
    assert!(!state.account(&C).unwrap().unwrap().is_committee);
    assert_eq!(state.active_witnesses().unwrap(), vec![A, B]);

    // epoch 2: every slot filled, C sits out
    produce(&mut state, 4 * INTERVAL);
    produce(&mut state, 5 * INTERVAL);
    let report = produce(&mut state, 6 * INTERVAL).maintenance.unwrap();
    assert_eq!(report.election.unbanned, vec![C]);
    assert_eq!(report.election.entered, vec![C]);
    assert_eq!(report.election.active, vec![A, B, C]);
    assert_eq!(state.witness(&C).unwrap().unwrap().status, WitnessStatus::Supernode);
    assert!(state.banned_witness(&C).unwrap().is_none());
}

// ============================================================
// GOVERNANCE
// ============================================================

#[test]
fn test_supermajority_eighteen_of_twenty_seven() {
    init_tracing();
    let (cfg, witnesses) = full_committee();
    let mut store = MemoryStore::new();
    let mut state = ChainState::new(&mut store);
    state.init_genesis(&cfg).unwrap();
    assert_eq!(state.active_witnesses().unwrap().len(), 27);
    let before = state.properties().unwrap();

    let passing = propose(&mut state, witnesses[0], 3, 2_000);
    let failing = propose(&mut state, witnesses[1], 6, 1);
    for w in &witnesses[..18] {
        approve(&mut state, *w, passing);
    }
    for w in &witnesses[..17] {
        approve(&mut state, *w, failing);
    }

    let expiration = state.proposal(passing).unwrap().unwrap().expiration_time;
    assert!(expiration > 1_000 + before.proposal_expire_time_ms);
    assert_eq!((expiration - before.next_maintenance_time) % before.maintenance_interval(), 0);

    // not expired yet: nothing happens
    let outcome = state.process_proposals(expiration - 1).unwrap();
    assert!(outcome.approved.is_empty() && outcome.disapproved.is_empty());

    let outcome = state.process_proposals(expiration).unwrap();
    assert_eq!(outcome.approved, vec![passing]);
    assert_eq!(outcome.disapproved, vec![failing]);

    let after = state.properties().unwrap();
    assert_eq!(after.transaction_fee, 2_000);
    assert_eq!(after.witness_standby_allowance, before.witness_standby_allowance);
    assert_eq!(state.proposal(passing).unwrap().unwrap().state, ProposalState::Approved);
    assert_eq!(state.proposal(failing).unwrap().unwrap().state, ProposalState::Disapproved);

    // already processed: the scan stops immediately
    let again = state.process_proposals(expiration + 1).unwrap();
    assert!(again.approved.is_empty() && again.disapproved.is_empty());
}

#[test]
fn test_approval_toggle_and_delete() {
    let (cfg, witnesses) = full_committee();
    let mut store = MemoryStore::new();
    let mut state = ChainState::new(&mut store);
    state.init_genesis(&cfg).unwrap();
    let id = propose(&mut state, witnesses[0], 3, 5_000);

    approve(&mut state, witnesses[2], id);
    let twice = Contract::ProposalApprove(ProposalApproveContract { owner: witnesses[2], proposal_id: id, is_add_approval: true });
    assert!(run(&mut state, twice, 2_000).is_err());
    let withdraw = Contract::ProposalApprove(ProposalApproveContract { owner: witnesses[2], proposal_id: id, is_add_approval: false });
    assert!(run(&mut state, withdraw.clone(), 2_000).unwrap().is_success());
    assert!(run(&mut state, withdraw, 2_000).is_err());

    let not_proposer = Contract::ProposalDelete(ProposalDeleteContract { owner: witnesses[1], proposal_id: id });
    assert!(matches!(run(&mut state, not_proposer, 2_000), Err(ValidationError::PermissionDenied(_))));
    let delete = Contract::ProposalDelete(ProposalDeleteContract { owner: witnesses[0], proposal_id: id });
    assert!(run(&mut state, delete, 2_000).unwrap().is_success());
    assert_eq!(state.proposal(id).unwrap().unwrap().state, ProposalState::Canceled);

    // canceled proposals are skipped, never applied
    let outcome = state.process_proposals(u64::MAX).unwrap();
    assert!(outcome.approved.is_empty() && outcome.disapproved.is_empty());
    assert_eq!(state.properties().unwrap().transaction_fee, 1_000);
}

#[test]
fn test_remove_genesis_power_is_one_shot() {
    let (cfg, witnesses) = full_committee();
    let mut store = MemoryStore::new();
    let mut state = ChainState::new(&mut store);
    state.init_genesis(&cfg).unwrap();

    let id = propose(&mut state, witnesses[0], 10, 1);
    for w in &witnesses[..18] {
        approve(&mut state, *w, id);
    }
    let expiration = state.proposal(id).unwrap().unwrap().expiration_time;
    let report = state.run_maintenance(expiration).unwrap();
    assert_eq!(report.proposals.approved, vec![id]);

    assert_eq!(state.properties().unwrap().remove_the_power_of_the_gr, -1);
    for w in &witnesses {
        assert_eq!(state.witness(w).unwrap().unwrap().vote_count, 0);
    }

    let mut parameters = BTreeMap::new();
    parameters.insert(10, 1);
    let again = Contract::ProposalCreate(ProposalCreateContract { owner: witnesses[0], parameters });
    assert!(matches!(
        run(&mut state, again, expiration + 1),
        Err(ValidationError::ParameterOutOfRange { id: 10, .. })
    ));
}

// ============================================================
// CHAIN FACADE
// ============================================================

#[test]
fn test_chain_commits_blocks_to_lmdb() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let cfg = small_net();
    let to = Address([0x66; 20]);
    let pay = Transaction::new(&Contract::Transfer(TransferContract { owner: USER, to, amount: 5 * ONE_UNIT }), 0, 10_000);
    let overdraw = Transaction::new(&Contract::Transfer(TransferContract { owner: USER, to, amount: 1_000 * ONE_UNIT }), 1, 10_000);

    let hash = {
        let chain = Chain::open(dir.path(), &cfg).unwrap();
        let preview = chain.dry_run(&pay, INTERVAL).unwrap();
        assert!(preview.is_success());
        // dry run leaves no trace
        assert!(chain.account(&to).unwrap().is_none());

        let producer = chain.next_producer(INTERVAL).unwrap().unwrap();
        let (_, parent, _) = chain.head().unwrap();
        let block = Block::new(1, parent, INTERVAL, producer, vec![pay.clone(), overdraw]);
        let receipt = chain.apply_block(&block).unwrap();
        assert!(receipt.results[0].is_success());
        assert_eq!(receipt.results[1].status, TxStatus::Failed);
        assert_eq!(receipt.results[1].fee, 0);
        receipt.hash
    };

    let chain = Chain::open(dir.path(), &cfg).unwrap();
    assert_eq!(chain.head().unwrap(), (1, hash, INTERVAL));
    assert_eq!(chain.balance(&to).unwrap(), 5 * ONE_UNIT);
    assert_eq!(chain.block(1).unwrap().unwrap().hash(), hash);

    // replaying block 1 is rejected and changes nothing
    let replay = chain.block(1).unwrap().unwrap();
    assert!(matches!(chain.apply_block(&replay), Err(BlockError::WrongHeight { expected: 2, got: 1 })));
    assert_eq!(chain.balance(&to).unwrap(), 5 * ONE_UNIT);
}

#[test]
fn test_queries_share_the_chain_across_threads() {
    let chain = Chain::in_memory(&small_net()).unwrap();
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let c = chain.clone();
            std::thread::spawn(move || c.active_witnesses().unwrap())
        })
        .collect();
    for h in handles {
        assert_eq!(h.join().unwrap(), vec![A, B, C]);
    }
}
