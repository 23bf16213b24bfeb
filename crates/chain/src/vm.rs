//! Smart-contract VM boundary.
//!
//! VM adalah kolaborator eksternal yang opaque: core hanya memanggil
//! [`VmExecutor`] dengan sebuah `ChainState` yang dibungkus deposit anak. Semua
//! write VM (storage slot, balance) masuk ke deposit itu dan hanya di-commit jika
//! eksekusi sukses; revert atau constant call membuang semuanya.

use thiserror::Error;

use crate::state::ChainState;
use crate::types::Address;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error("execution reverted: {0}")]
    Revert(String),

    #[error("out of energy (limit {0})")]
    OutOfEnergy(u64),

    #[error("cpu time limit exceeded")]
    Timeout,

    #[error("vm internal error: {0}")]
    Internal(String),
}

/// Call environment handed to the VM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmContext {
    pub caller: Address,
    pub contract: Address,
    pub call_value: u128,
    pub energy_limit: u64,
    /// Governed `max_cpu_time_of_one_tx` (ms).
    pub max_cpu_time_ms: i64,
    pub block_num: u64,
    pub timestamp: u64,
    /// Read-only simulation; writes are always discarded.
    pub is_constant: bool,
    /// Native token transfers from inside the VM allowed.
    pub allow_trc10_transfer: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VmOutcome {
    pub output: Vec<u8>,
    pub energy_used: u64,
}

pub trait VmExecutor: Send + Sync {
    /// Run constructor `bytecode`; returns the runtime code in `output`.
    fn deploy(&self, state: &mut ChainState<'_>, ctx: &VmContext, bytecode: &[u8]) -> Result<VmOutcome, VmError>;

    /// Execute `code` with call `data`.
    fn call(&self, state: &mut ChainState<'_>, ctx: &VmContext, code: &[u8], data: &[u8]) -> Result<VmOutcome, VmError>;
}
