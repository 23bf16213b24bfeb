//! Ledger State Store abstraction.
//!
//! Core hanya bergantung pada trait [`StateStore`]: tabel byte-key → byte-value
//! yang terurut, dengan operasi get/put/has/delete/iter. Record di-encode dengan
//! bincode oleh `ChainState`; store sendiri tidak tahu isi value.
//!
//! ## Backends
//!
//! | Backend | Kegunaan |
//! |---------|----------|
//! | [`MemoryStore`] | test, simulasi, node ephemeral |
//! | [`LmdbStore`] | persistence, satu named DB per tabel |
//! | [`Deposit`] | overlay copy-on-write di atas store lain (bisa nested) |
//!
//! ## Key format (CONSENSUS-CRITICAL)
//!
//! ```text
//! address        : 20 raw bytes
//! proposal id    : u64 big-endian
//! asset id       : u64 big-endian
//! block height   : u64 big-endian
//! delegation     : owner(20) ‖ receiver(20)
//! ```

mod deposit;
mod lmdb_store;
mod memory;

pub use deposit::Deposit;
pub use lmdb_store::LmdbStore;
pub use memory::MemoryStore;

use crate::error::StoreResult;

// ════════════════════════════════════════════════════════════════════════════
// TABLES
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Table {
    Accounts,
    /// account name → address
    AccountNameIndex,
    /// account id → address
    AccountIdIndex,
    Witnesses,
    BannedWitnesses,
    VoteChanges,
    StakeChanges,
    DelegatedResources,
    /// owner → receivers
    DelegatedIndexFrom,
    /// receiver → owners
    DelegatedIndexTo,
    Proposals,
    Assets,
    Contracts,
    /// contract storage slots, owned by the VM
    ContractStorage,
    /// single-key records: dynamic properties, active set, head
    Properties,
    /// block headers by height
    Blocks,
}

impl Table {
    pub const ALL: [Table; 16] = [
        Table::Accounts,
        Table::AccountNameIndex,
        Table::AccountIdIndex,
        Table::Witnesses,
        Table::BannedWitnesses,
        Table::VoteChanges,
        Table::StakeChanges,
        Table::DelegatedResources,
        Table::DelegatedIndexFrom,
        Table::DelegatedIndexTo,
        Table::Proposals,
        Table::Assets,
        Table::Contracts,
        Table::ContractStorage,
        Table::Properties,
        Table::Blocks,
    ];

    /// Stable bucket name (LMDB named database).
    pub fn name(&self) -> &'static str {
        match self {
            Table::Accounts => "accounts",
            Table::AccountNameIndex => "account_name_index",
            Table::AccountIdIndex => "account_id_index",
            Table::Witnesses => "witnesses",
            Table::BannedWitnesses => "banned_witnesses",
            Table::VoteChanges => "vote_changes",
            Table::StakeChanges => "stake_changes",
            Table::DelegatedResources => "delegated_resources",
            Table::DelegatedIndexFrom => "delegated_index_from",
            Table::DelegatedIndexTo => "delegated_index_to",
            Table::Proposals => "proposals",
            Table::Assets => "assets",
            Table::Contracts => "contracts",
            Table::ContractStorage => "contract_storage",
            Table::Properties => "properties",
            Table::Blocks => "blocks",
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// STORE TRAIT
// ════════════════════════════════════════════════════════════════════════════

/// Lazy `(key, value)` sequence in ascending key order.
pub type KvIter<'a> = Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + 'a>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteOp {
    Put { table: Table, key: Vec<u8>, value: Vec<u8> },
    Delete { table: Table, key: Vec<u8> },
}

pub trait StateStore {
    fn get(&self, table: Table, key: &[u8]) -> StoreResult<Option<Vec<u8>>>;

    fn put(&mut self, table: Table, key: &[u8], value: Vec<u8>) -> StoreResult<()>;

    fn delete(&mut self, table: Table, key: &[u8]) -> StoreResult<()>;

    /// Finite, restartable iteration over one table.
    fn iter(&self, table: Table) -> StoreResult<KvIter<'_>>;

    fn has(&self, table: Table, key: &[u8]) -> StoreResult<bool> {
        Ok(self.get(table, key)?.is_some())
    }

    /// Apply a batch of writes. Backends with transactions override this so the
    /// batch lands atomically.
    fn write_batch(&mut self, ops: Vec<WriteOp>) -> StoreResult<()> {
        for op in ops {
            match op {
                WriteOp::Put { table, key, value } => self.put(table, &key, value)?,
                WriteOp::Delete { table, key } => self.delete(table, &key)?,
            }
        }
        Ok(())
    }
}
