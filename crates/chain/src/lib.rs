//! # DPoS Chain Core Library
//!
//! State-transition core untuk chain delegated-proof-of-stake: actuator per
//! tipe kontrak, resource economy (freeze / delegate / stake), scheduling
//! witness, maintenance epoch, dan governance lewat proposal.
//!
//! ## Module Overview
//!
//! | Module | Fungsi |
//! |--------|--------|
//! | `types` | Address, Hash, konstanta denominasi |
//! | `crypto` | sha3-256, contract address, tie-break hash election |
//! | `store` | `StateStore` trait, MemoryStore, LmdbStore, Deposit overlay |
//! | `state` | `ChainState`: record typed di atas store (akun, witness, proposal, ...) |
//! | `params` | tabel parameter governance (id, range, apply) |
//! | `tx` | Contract payload, Transaction, TransactionResult |
//! | `actuator` | validate + execute per tipe kontrak, fee model |
//! | `vm` | boundary ke smart-contract VM eksternal |
//! | `scheduler` | round-robin slot → witness |
//! | `slashing` | penalty miss-rate, ban / unban |
//! | `governance` | resolusi proposal saat maintenance |
//! | `epoch` | maintenance engine: tally, election, standby allowance |
//! | `block` | Block, BlockProcessor, missed-slot accounting |
//! | `genesis` | seed properties, akun, witness awal |
//! | `error` | StoreError, ValidationError, ExecutionError, BlockError, GenesisError |
//!
//! ## Alur block
//!
//! ```text
//! Chain::apply_block
//!   └─ write lock → Deposit(base store)
//!        └─ BlockProcessor::apply_block
//!             ├─ header + schedule check
//!             ├─ tx: validate → burn fee → execute (deposit anak)
//!             ├─ producer bookkeeping
//!             └─ run_maintenance (jika timestamp ≥ next_maintenance_time)
//!   └─ commit: base.write_batch(deposit.into_batch())
//! ```
//!
//! Block yang gagal tidak meninggalkan write apa pun di base store.

pub mod actuator;
pub mod block;
pub mod crypto;
pub mod epoch;
pub mod error;
pub mod genesis;
pub mod governance;
pub mod params;
pub mod scheduler;
pub mod slashing;
pub mod state;
pub mod store;
pub mod tx;
pub mod types;
pub mod vm;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use parking_lot::RwLock;
use tracing::info;

pub use dpos_common::ChainConfig;

pub use block::{Block, BlockHeader, BlockProcessor, BlockReceipt};
pub use epoch::{Election, MaintenanceReport};
pub use error::{BlockError, ExecutionError, GenesisError, StoreError, StoreResult, ValidationError};
pub use governance::ProposalOutcome;
pub use state::{Account, ChainState, DynamicProperties, Proposal, Witness, WitnessStatus};
pub use store::{Deposit, LmdbStore, MemoryStore, StateStore, Table};
pub use tx::{Contract, Transaction, TransactionResult, TxStatus};
pub use types::{Address, Hash};
pub use vm::{VmContext, VmError, VmExecutor, VmOutcome};

type SharedStore = Box<dyn StateStore + Send + Sync>;

/// Thread-safe handle over one ledger store.
///
/// Block application takes the write lock and commits through a single
/// `write_batch`; queries take the read lock and see only committed state.
#[derive(Clone)]
pub struct Chain {
    store: Arc<RwLock<SharedStore>>,
    vm: Option<Arc<dyn VmExecutor>>,
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain").field("vm", &self.vm.is_some()).finish()
    }
}

impl Chain {
    pub fn from_store(store: SharedStore) -> Self {
        Self {
            store: Arc::new(RwLock::new(store)),
            vm: None,
        }
    }

    pub fn with_vm(mut self, vm: Arc<dyn VmExecutor>) -> Self {
        self.vm = Some(vm);
        self
    }

    /// Open (or create) an LMDB ledger at `path` and seed genesis if empty.
    pub fn open<P: AsRef<Path>>(path: P, cfg: &ChainConfig) -> anyhow::Result<Self> {
        let store = LmdbStore::open(path.as_ref())?;
        let chain = Self::from_store(Box::new(store));
        let created = chain.init_genesis(cfg)?;
        info!(path = %path.as_ref().display(), created, "chain opened");
        Ok(chain)
    }

    /// Like [`Chain::open`], with the genesis config read from a TOML file.
    pub fn open_with_config_file<P: AsRef<Path>, C: AsRef<Path>>(path: P, config_path: C) -> anyhow::Result<Self> {
        let config_path = config_path.as_ref();
        let cfg = dpos_common::config::load_from_file(config_path)
            .with_context(|| format!("loading chain config {}", config_path.display()))?;
        Self::open(path, &cfg)
    }

    /// Ephemeral chain over a `MemoryStore`, genesis applied.
    pub fn in_memory(cfg: &ChainConfig) -> anyhow::Result<Self> {
        let chain = Self::from_store(Box::new(MemoryStore::new()));
        chain.init_genesis(cfg)?;
        Ok(chain)
    }

    pub fn init_genesis(&self, cfg: &ChainConfig) -> Result<bool, GenesisError> {
        self.commit(|state| state.init_genesis(cfg))
    }

    fn processor(&self) -> BlockProcessor<'_> {
        match &self.vm {
            Some(vm) => BlockProcessor::with_vm(vm.as_ref()),
            None => BlockProcessor::new(),
        }
    }

    /// Apply `block` atomically. On error nothing is written.
    pub fn apply_block(&self, block: &Block) -> Result<BlockReceipt, BlockError> {
        let processor = self.processor();
        let receipt = self.commit(|state| processor.apply_block(state, block))?;
        info!(
            number = receipt.number,
            hash = %receipt.hash,
            txs = receipt.results.len(),
            epoch = receipt.maintenance.as_ref().map(|m| m.epoch),
            "block committed"
        );
        Ok(receipt)
    }

    /// Run `tx` against the committed head without persisting anything.
    pub fn dry_run(&self, tx: &Transaction, now: u64) -> Result<TransactionResult, ExecutionError> {
        let guard = self.store.read();
        let mut scratch = Deposit::new(&**guard);
        let mut state = ChainState::new(&mut scratch);
        let next = state.properties()?.latest_block_num.saturating_add(1);
        self.processor().apply_transaction(&mut state, tx, next, now)
    }

    /// Read-only contract call; VM writes are discarded.
    pub fn constant_call(&self, caller: &Address, contract: &Address, data: &[u8]) -> Result<VmOutcome, ExecutionError> {
        let vm = self.vm.as_ref().ok_or(ExecutionError::VmUnavailable)?;
        let guard = self.store.read();
        actuator::simulate_constant_call(&**guard, vm.as_ref(), caller, contract, data)
    }

    // ============================================================
    // QUERIES
    // ============================================================

    pub fn properties(&self) -> StoreResult<DynamicProperties> {
        self.view(|s| s.properties())
    }

    pub fn account(&self, addr: &Address) -> StoreResult<Option<Account>> {
        self.view(|s| s.account(addr))
    }

    pub fn balance(&self, addr: &Address) -> StoreResult<u128> {
        self.view(|s| s.balance_of(addr))
    }

    pub fn witness(&self, addr: &Address) -> StoreResult<Option<Witness>> {
        self.view(|s| s.witness(addr))
    }

    pub fn witnesses(&self) -> StoreResult<Vec<Witness>> {
        self.view(|s| s.all_witnesses())
    }

    pub fn active_witnesses(&self) -> StoreResult<Vec<Address>> {
        self.view(|s| s.active_witnesses())
    }

    pub fn proposal(&self, id: u64) -> StoreResult<Option<Proposal>> {
        self.view(|s| s.proposal(id))
    }

    pub fn proposals(&self) -> StoreResult<Vec<Proposal>> {
        self.view(|s| s.all_proposals())
    }

    pub fn block(&self, number: u64) -> StoreResult<Option<Block>> {
        self.view(|s| s.block(number))
    }

    /// (number, hash, timestamp) of the head block.
    pub fn head(&self) -> StoreResult<(u64, Hash, u64)> {
        let p = self.properties()?;
        Ok((p.latest_block_num, p.latest_block_hash, p.latest_block_timestamp))
    }

    /// Witness allowed to produce a block at `timestamp`, if any.
    pub fn next_producer(&self, timestamp: u64) -> StoreResult<Option<Address>> {
        self.view(|s| {
            let slot = s.slot_at_time(timestamp)?;
            if slot == 0 {
                return Ok(None);
            }
            s.scheduled_witness_at(slot)
        })
    }

    // ============================================================
    // INTERNAL
    // ============================================================

    fn view<T, E>(&self, f: impl FnOnce(&ChainState<'_>) -> Result<T, E>) -> Result<T, E> {
        let guard = self.store.read();
        let mut scratch = Deposit::new(&**guard);
        let state = ChainState::new(&mut scratch);
        f(&state)
    }

    /// Run `f` on an overlay of the base store and commit its writes in one
    /// batch if it returns Ok.
    fn commit<T, E>(&self, f: impl FnOnce(&mut ChainState<'_>) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let mut guard = self.store.write();
        let (value, batch) = {
            let mut deposit = Deposit::new(&**guard);
            let value = {
                let mut state = ChainState::new(&mut deposit);
                f(&mut state)?
            };
            (value, deposit.into_batch())
        };
        if !batch.is_empty() {
            guard.write_batch(batch)?;
        }
        Ok(value)
    }
}
