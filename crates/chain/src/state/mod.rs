//! # Chain State Management Module
//!
//! Module ini adalah **FACADE** untuk seluruh akses ledger state. `ChainState`
//! membungkus satu handle `&mut dyn StateStore` (biasanya sebuah `Deposit`) dan
//! menyediakan accessor bertipe di atas tabel byte-level.
//!
//! ## Arsitektur
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         mod.rs (FACADE)                         │
//! │  - ChainState struct + bincode read/write/scan                  │
//! │  - with_child(): nested copy-on-write deposit                   │
//! └─────────────────────────────────────────────────────────────────┘
//!                                    │
//!          ┌─────────────────────────┼─────────────────────────┐
//!          ▼                         ▼                         ▼
//!  ┌──────────────┐         ┌──────────────┐         ┌──────────────┐
//!  │   Account    │         │   Witness    │         │  Governance  │
//!  │  + balances  │         │  + outbox    │         │  (proposals) │
//!  └──────────────┘         └──────────────┘         └──────────────┘
//!          │                         │
//!          ▼                         ▼
//!  ┌──────────────┐         ┌──────────────┐
//!  │  Resource    │────────►│ Delegation   │
//!  │  Economy     │         │   Index      │
//!  └──────────────┘         └──────────────┘
//! ```
//!
//! ## Module Structure
//!
//! | Module | Fungsi |
//! |--------|--------|
//! | `internal_model` | Record types: Account, Witness, Proposal, VoteChange, ... |
//! | `internal_properties` | DynamicProperties + active witness list |
//! | `internal_account` | Account CRUD, checked balance ops, fee burn |
//! | `internal_witness` | Witness CRUD, banned list, VoteChange/StakeChange outbox |
//! | `internal_delegation` | DelegatedResource + bidirectional index |
//! | `internal_resource` | Freeze / unfreeze / stake / unstake shared logic |
//! | `internal_governance` | Proposal CRUD |
//! | `internal_asset` | Token + smart contract records |
//!
//! ## Aturan
//!
//! - Semua aritmatika balance memakai `checked_*`; overflow → `ExecutionError::Overflow`.
//! - Read method memakai `&self`, sehingga `validate()` yang hanya menerima
//!   `&ChainState` tidak bisa memutasi state.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{StoreError, StoreResult};
use crate::store::{Deposit, StateStore, Table};

mod internal_account;
mod internal_asset;
mod internal_delegation;
mod internal_governance;
mod internal_model;
mod internal_properties;
mod internal_resource;
mod internal_witness;

pub use internal_model::*;
pub use internal_properties::{
    as_amount, DynamicProperties, StakeTier, ACTIVE_WITNESSES_KEY, GENESIS_VOTES_KEY,
    PROPERTIES_KEY,
};
pub use internal_resource::FreezeOutcome;

pub struct ChainState<'a> {
    store: &'a mut dyn StateStore,
}

impl<'a> ChainState<'a> {
    pub fn new(store: &'a mut dyn StateStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &dyn StateStore {
        &*self.store
    }

    pub fn store_mut(&mut self) -> &mut dyn StateStore {
        &mut *self.store
    }

    // ────────────────────────────────────────────────────────
    // codec helpers
    // ────────────────────────────────────────────────────────

    pub(crate) fn read<T: DeserializeOwned>(&self, table: Table, key: &[u8]) -> StoreResult<Option<T>> {
        match self.store.get(table, key)? {
            Some(bytes) => bincode::deserialize(&bytes)
                .map(Some)
                .map_err(|e| StoreError::Corrupted {
                    table: table.name(),
                    reason: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    pub(crate) fn write<T: Serialize>(&mut self, table: Table, key: &[u8], value: &T) -> StoreResult<()> {
        let bytes = bincode::serialize(value)?;
        self.store.put(table, key, bytes)
    }

    pub(crate) fn remove(&mut self, table: Table, key: &[u8]) -> StoreResult<()> {
        self.store.delete(table, key)
    }

    /// Decode every record of a table, in key order.
    pub(crate) fn scan<T: DeserializeOwned>(&self, table: Table) -> StoreResult<Vec<(Vec<u8>, T)>> {
        let mut out = Vec::new();
        for (key, bytes) in self.store.iter(table)? {
            let value = bincode::deserialize(&bytes).map_err(|e| StoreError::Corrupted {
                table: table.name(),
                reason: e.to_string(),
            })?;
            out.push((key, value));
        }
        Ok(out)
    }

    // ────────────────────────────────────────────────────────
    // nested deposit
    // ────────────────────────────────────────────────────────

    /// Run `f` against a child deposit. On `Ok` the child's writes are pushed
    /// to this state as one batch; on `Err` they are dropped.
    pub fn with_child<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        E: From<StoreError>,
        F: FnOnce(&mut ChainState<'_>) -> Result<T, E>,
    {
        let (out, batch) = {
            let mut child = Deposit::new(&*self.store);
            let res = {
                let mut inner = ChainState::new(&mut child);
                f(&mut inner)
            };
            match res {
                Ok(v) => (v, child.into_batch()),
                Err(e) => {
                    child.discard();
                    return Err(e);
                }
            }
        };
        self.store.write_batch(batch)?;
        Ok(out)
    }
}

/// Big-endian key for numeric ids.
pub fn id_key(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}
