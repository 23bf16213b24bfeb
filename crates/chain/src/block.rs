//! Block structure dan block processor.
//!
//! ## Alur `apply_block` (CONSENSUS-CRITICAL)
//!
//! ```text
//! 1. header check: height = head + 1, parent = head hash, timestamp > head,
//!    tx_root = sha3(tx ids)
//! 2. validate_witness_schedule(producer, timestamp) → slot relatif
//! 3. slot 1..slot-1 yang terlewat → epoch_missed / total_missed witness terjadwal
//! 4. transaksi dieksekusi berurutan (expiration window → validate → execute)
//! 5. producer: epoch_produced, total_produced, latest_*, allowance += pay_per_block
//! 6. head properties diperbarui
//! 7. timestamp ≥ next_maintenance_time → run_maintenance
//! ```
//!
//! Semua langkah berjalan di satu deposit anak. Error apa pun (termasuk
//! invariant violation fatal dari sebuah transaksi) membuang seluruh block.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use dpos_common::DAY_MS;

use crate::actuator::{Actuator, ActuatorContext};
use crate::crypto::sha3_256;
use crate::epoch::MaintenanceReport;
use crate::error::{BlockError, ExecutionError, StoreResult};
use crate::state::{as_amount, id_key, ChainState};
use crate::store::Table;
use crate::tx::{Transaction, TransactionResult, TxStatus};
use crate::types::{Address, Hash};
use crate::vm::VmExecutor;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockHeader {
    pub number: u64,
    pub parent_hash: Hash,
    /// Block time (ms since epoch).
    pub timestamp: u64,
    pub witness: Address,
    pub tx_root: Hash,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(number: u64, parent_hash: Hash, timestamp: u64, witness: Address, transactions: Vec<Transaction>) -> Self {
        let tx_root = Self::compute_tx_root(&transactions);
        Block {
            header: BlockHeader {
                number,
                parent_hash,
                timestamp,
                witness,
                tx_root,
            },
            transactions,
        }
    }

    /// sha3-256 over the concatenated transaction ids.
    pub fn compute_tx_root(txs: &[Transaction]) -> Hash {
        let mut accum = Vec::with_capacity(txs.len() * 32);
        for tx in txs {
            accum.extend_from_slice(tx.tx_id().as_bytes());
        }
        sha3_256(&accum)
    }

    pub fn hash(&self) -> Hash {
        let h = &self.header;
        let mut buf = Vec::with_capacity(8 + 32 + 8 + 20 + 32);
        buf.extend_from_slice(&h.number.to_be_bytes());
        buf.extend_from_slice(h.parent_hash.as_bytes());
        buf.extend_from_slice(&h.timestamp.to_be_bytes());
        buf.extend_from_slice(h.witness.as_bytes());
        buf.extend_from_slice(h.tx_root.as_bytes());
        sha3_256(&buf)
    }
}

/// Furthest a transaction's expiration may lie past the block time.
pub const MAX_TX_EXPIRATION_MS: u64 = DAY_MS;

/// Outcome of one applied block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockReceipt {
    pub number: u64,
    pub hash: Hash,
    pub slot: u64,
    pub missed_slots: u64,
    pub results: Vec<TransactionResult>,
    pub maintenance: Option<MaintenanceReport>,
}

impl<'a> ChainState<'a> {
    pub fn block(&self, number: u64) -> StoreResult<Option<Block>> {
        self.read(Table::Blocks, &id_key(number))
    }

    pub fn put_block(&mut self, block: &Block) -> StoreResult<()> {
        self.write(Table::Blocks, &id_key(block.header.number), block)
    }

    /// Charge one miss to each witness scheduled in relative slots
    /// `1..slot`. Whole rounds are counted arithmetically.
    fn record_missed_slots(&mut self, slot: u64) -> Result<u64, ExecutionError> {
        let missed = slot.saturating_sub(1);
        if missed == 0 {
            return Ok(0);
        }
        let props = self.properties()?;
        let active = self.active_witnesses()?;
        if active.is_empty() {
            return Ok(missed);
        }
        let repeat = props.single_repeat.max(1);
        let round = (active.len() as u64).saturating_mul(repeat);
        let full_rounds = missed / round;

        let mut counts = vec![full_rounds.saturating_mul(repeat); active.len()];
        let head = props.head_slot();
        for s in 1..=(missed % round) {
            let index = (head.wrapping_add(s) % round) / repeat;
            if let Some(c) = counts.get_mut(index as usize) {
                *c += 1;
            }
        }

        for (addr, count) in active.iter().zip(counts) {
            if count == 0 {
                continue;
            }
            if let Some(mut w) = self.witness(addr)? {
                w.epoch_missed = w.epoch_missed.saturating_add(count);
                w.total_missed = w.total_missed.saturating_add(count);
                self.put_witness(&w)?;
                debug!(witness = %addr, count, "missed slots");
            }
        }
        Ok(missed)
    }

    fn record_produced(&mut self, producer: &Address, number: u64, timestamp: u64) -> Result<(), ExecutionError> {
        let props = self.properties()?;
        let mut w = self
            .witness(producer)?
            .ok_or_else(|| ExecutionError::Invariant(format!("producer {} is not a witness", producer)))?;
        w.epoch_produced = w.epoch_produced.saturating_add(1);
        w.total_produced = w.total_produced.saturating_add(1);
        w.latest_block_num = number;
        w.latest_slot_num = props.absolute_slot(timestamp);
        self.put_witness(&w)?;

        let pay = as_amount(props.witness_pay_per_block);
        if pay > 0 {
            let mut acct = self.require_account(producer)?;
            acct.allowance = acct
                .allowance
                .checked_add(pay)
                .ok_or(ExecutionError::Overflow("allowance"))?;
            self.put_account(&acct)?;
        }
        Ok(())
    }
}

/// Applies blocks to a `ChainState`. Holds the optional VM used by the
/// contract actuators.
#[derive(Clone, Copy, Default)]
pub struct BlockProcessor<'v> {
    vm: Option<&'v dyn VmExecutor>,
}

impl<'v> BlockProcessor<'v> {
    pub fn new() -> Self {
        Self { vm: None }
    }

    pub fn with_vm(vm: &'v dyn VmExecutor) -> Self {
        Self { vm: Some(vm) }
    }

    /// Run one transaction. Validation failures (including an expiration
    /// outside `(now, now + MAX_TX_EXPIRATION_MS]`) produce a FAILED result
    /// with no fee and no state change; only fatal execution errors escape.
    pub fn apply_transaction(
        &self,
        state: &mut ChainState<'_>,
        tx: &Transaction,
        block_num: u64,
        now: u64,
    ) -> Result<TransactionResult, ExecutionError> {
        let mut result = TransactionResult::default();
        let mut ctx = ActuatorContext::new(now, block_num, tx.tx_id());
        if let Some(vm) = self.vm {
            ctx = ctx.with_vm(vm);
        }

        if tx.expiration <= now {
            result.fail(format!("transaction expired at {}, block time {}", tx.expiration, now));
            return Ok(result);
        }
        if tx.expiration > now.saturating_add(MAX_TX_EXPIRATION_MS) {
            result.fail(format!("transaction expiration {} too far past block time {}", tx.expiration, now));
            return Ok(result);
        }

        let actuator = match Actuator::from_transaction(tx) {
            Ok(a) => a,
            Err(e) => {
                result.fail(e.to_string());
                return Ok(result);
            }
        };
        if let Err(e) = actuator.validate(state, &ctx) {
            debug!(error = %e, "transaction rejected");
            result.fail(e.to_string());
            return Ok(result);
        }
        match actuator.execute(state, &ctx, &mut result) {
            Ok(()) => Ok(result),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                debug!(error = %e, fee = result.fee, "transaction failed");
                result.status = TxStatus::Failed;
                Ok(result)
            }
        }
    }

    pub fn apply_block(&self, state: &mut ChainState<'_>, block: &Block) -> Result<BlockReceipt, BlockError> {
        state.with_child(|s| self.apply_block_inner(s, block))
    }

    fn apply_block_inner(&self, state: &mut ChainState<'_>, block: &Block) -> Result<BlockReceipt, BlockError> {
        let h = &block.header;
        let head = state.properties()?;
        let expected = head.latest_block_num.saturating_add(1);
        if h.number != expected {
            return Err(BlockError::WrongHeight { expected, got: h.number });
        }
        if h.parent_hash != head.latest_block_hash {
            return Err(BlockError::WrongParent);
        }
        if h.timestamp <= head.latest_block_timestamp {
            return Err(BlockError::StaleTimestamp {
                head: head.latest_block_timestamp,
                got: h.timestamp,
            });
        }

        let computed = Block::compute_tx_root(&block.transactions);
        if computed != h.tx_root {
            return Err(BlockError::TxRootMismatch { header: h.tx_root, computed });
        }

        let slot = state.validate_witness_schedule(&h.witness, h.timestamp)?;
        let missed_slots = state.record_missed_slots(slot)?;

        let mut results = Vec::with_capacity(block.transactions.len());
        for (index, tx) in block.transactions.iter().enumerate() {
            let r = self
                .apply_transaction(state, tx, h.number, h.timestamp)
                .map_err(|source| BlockError::Fatal { index, source })?;
            results.push(r);
        }

        state.record_produced(&h.witness, h.number, h.timestamp)?;

        let hash = block.hash();
        let props = state.update_properties(|p| {
            p.latest_block_num = h.number;
            p.latest_block_hash = hash;
            p.latest_block_timestamp = h.timestamp;
        })?;
        state.put_block(block)?;

        let maintenance = if h.timestamp >= props.next_maintenance_time {
            Some(state.run_maintenance(h.timestamp)?)
        } else {
            None
        };

        if missed_slots > 0 {
            warn!(number = h.number, missed_slots, "slots skipped before block");
        }
        debug!(
            number = h.number,
            witness = %h.witness,
            txs = results.len(),
            maintenance = maintenance.is_some(),
            "block applied"
        );
        Ok(BlockReceipt {
            number: h.number,
            hash,
            slot,
            missed_slots,
            results,
            maintenance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_covers_header_fields() {
        let a = Block::new(1, Hash::default(), 3_000, Address([1; 20]), Vec::new());
        let mut b = a.clone();
        assert_eq!(a.hash(), b.hash());
        b.header.timestamp += 1;
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn test_tx_root_changes_with_transactions() {
        use crate::tx::{Contract, TransferContract};
        let tx = Transaction::new(
            &Contract::Transfer(TransferContract {
                owner: Address([1; 20]),
                to: Address([2; 20]),
                amount: 5,
            }),
            1,
            2,
        );
        assert_ne!(Block::compute_tx_root(&[]), Block::compute_tx_root(&[tx]));
    }
}
