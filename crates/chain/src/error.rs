//! Error types untuk chain core.
//!
//! | Error | Dipakai oleh | Efek |
//! |-------|--------------|------|
//! | `StoreError` | store backends, Deposit | propagate |
//! | `ValidationError` | `Actuator::validate` | tx ditolak, state tidak berubah |
//! | `ExecutionError` | `Actuator::execute` | fee tetap di-burn, tx FAILED |
//! | `BlockError` | `BlockProcessor` | block ditolak, tidak ada commit |
//! | `GenesisError` | `init_genesis` | node tidak bisa start |
//!
//! `ExecutionError::Invariant` adalah satu-satunya error yang fatal untuk node:
//! menandakan bug di eksekusi transaksi sebelumnya, bukan kesalahan user.

use thiserror::Error;

use dpos_common::ConfigError;

use crate::types::{Address, Hash};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("lmdb error: {0}")]
    Lmdb(String),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("corrupted record in table {table}: {reason}")]
    Corrupted { table: &'static str, reason: String },
}

impl From<lmdb::Error> for StoreError {
    fn from(e: lmdb::Error) -> Self {
        StoreError::Lmdb(e.to_string())
    }
}

impl From<bincode::Error> for StoreError {
    fn from(e: bincode::Error) -> Self {
        StoreError::Codec(e.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("contract type {0} is not supported")]
    UnsupportedContract(u32),

    #[error("payload does not decode as {expected}: {reason}")]
    PayloadMismatch { expected: &'static str, reason: String },

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("account {0} does not exist")]
    AccountNotFound(Address),

    #[error("witness {0} does not exist")]
    WitnessNotFound(Address),

    #[error("proposal {0} does not exist")]
    ProposalNotFound(u64),

    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: u128, available: u128 },

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("parameter {id} value {value} rejected: {reason}")]
    ParameterOutOfRange { id: u64, value: i64, reason: String },

    #[error("timing precondition failed: {0}")]
    Timing(String),

    #[error("{0}")]
    Rejected(String),

    #[error("store error during validation: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("balance insufficient: required {required}, available {available}")]
    BalanceInsufficient { required: u128, available: u128 },

    #[error("arithmetic overflow in {0}")]
    Overflow(&'static str),

    #[error("vm reverted: {0}")]
    VmRevert(String),

    #[error("no vm executor configured")]
    VmUnavailable,

    #[error("{0}")]
    Failed(String),

    #[error("store error during execution: {0}")]
    Store(#[from] StoreError),

    #[error("state invariant violated: {0}")]
    Invariant(String),
}

impl ExecutionError {
    /// Hanya invariant violation yang fatal untuk node.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ExecutionError::Invariant(_))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BlockError {
    #[error("parent hash mismatch")]
    WrongParent,

    #[error("unexpected height: expected {expected}, got {got}")]
    WrongHeight { expected: u64, got: u64 },

    #[error("block timestamp {got} not after head timestamp {head}")]
    StaleTimestamp { head: u64, got: u64 },

    #[error("tx root mismatch: header {header}, computed {computed}")]
    TxRootMismatch { header: Hash, computed: Hash },

    #[error("witness {producer} is not scheduled for slot {slot}")]
    NotScheduled { producer: Address, slot: u64 },

    #[error("no active witnesses")]
    NoActiveWitnesses,

    #[error("fatal execution error in tx {index}: {source}")]
    Fatal { index: usize, source: ExecutionError },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl From<ExecutionError> for BlockError {
    /// Maintenance failures outside a transaction index.
    fn from(e: ExecutionError) -> Self {
        match e {
            ExecutionError::Store(s) => BlockError::Store(s),
            other => BlockError::Fatal { index: usize::MAX, source: other },
        }
    }
}

#[derive(Debug, Error)]
pub enum GenesisError {
    #[error("invalid genesis config: {0}")]
    Config(#[from] ConfigError),

    #[error("duplicate genesis entry {0}")]
    Duplicate(Address),

    #[error("genesis execution failed: {0}")]
    Execution(#[from] ExecutionError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
