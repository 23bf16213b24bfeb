//! Witness slot scheduler.
//!
//! Round-robin deterministik atas active witness list. Slot dihitung dari
//! genesis timestamp dan block interval; `single_repeat` membuat satu witness
//! memegang beberapa slot berturut-turut.
//!
//! ```text
//! slot        = absolute_slot(ts) - head_slot          (relatif terhadap head)
//! index       = (head_slot + slot) % (N * SINGLE_REPEAT) / SINGLE_REPEAT
//! ```

use crate::error::{BlockError, StoreResult};
use crate::state::ChainState;
use crate::types::Address;

/// Witness owning relative `slot` after `head_slot`. Pure function of its
/// arguments; `None` only when `active` is empty.
pub fn scheduled_witness(active: &[Address], head_slot: u64, slot: u64, single_repeat: u64) -> Option<Address> {
    if active.is_empty() {
        return None;
    }
    let repeat = single_repeat.max(1);
    let round = (active.len() as u64).saturating_mul(repeat);
    let current = head_slot.wrapping_add(slot);
    let index = (current % round) / repeat;
    active.get(index as usize).copied()
}

impl<'a> ChainState<'a> {
    /// Slot number of `timestamp` relative to the head block; 0 means the
    /// timestamp is not after the head.
    pub fn slot_at_time(&self, timestamp: u64) -> StoreResult<u64> {
        let props = self.properties()?;
        if timestamp <= props.latest_block_timestamp {
            return Ok(0);
        }
        Ok(props.absolute_slot(timestamp).saturating_sub(props.head_slot()))
    }

    pub fn scheduled_witness_at(&self, slot: u64) -> StoreResult<Option<Address>> {
        let props = self.properties()?;
        let active = self.active_witnesses()?;
        Ok(scheduled_witness(&active, props.head_slot(), slot, props.single_repeat))
    }

    /// Check that `producer` owns the slot of `timestamp`. Returns the
    /// relative slot on success.
    pub fn validate_witness_schedule(&self, producer: &Address, timestamp: u64) -> Result<u64, BlockError> {
        let props = self.properties()?;
        let slot = self.slot_at_time(timestamp)?;
        if slot == 0 {
            return Err(BlockError::StaleTimestamp {
                head: props.latest_block_timestamp,
                got: timestamp,
            });
        }
        let expected = self.scheduled_witness_at(slot)?.ok_or(BlockError::NoActiveWitnesses)?;
        if expected != *producer {
            return Err(BlockError::NotScheduled { producer: *producer, slot });
        }
        Ok(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addrs(n: u8) -> Vec<Address> {
        (1..=n).map(|b| Address([b; 20])).collect()
    }

    #[test]
    fn test_round_robin_single_repeat_one() {
        let active = addrs(3);
        let picks: Vec<_> = (0..6)
            .map(|s| scheduled_witness(&active, 0, s, 1).unwrap())
            .collect();
        assert_eq!(picks, vec![active[0], active[1], active[2], active[0], active[1], active[2]]);
    }

    #[test]
    fn test_single_repeat_holds_consecutive_slots() {
        let active = addrs(2);
        let picks: Vec<_> = (0..6)
            .map(|s| scheduled_witness(&active, 0, s, 2).unwrap())
            .collect();
        assert_eq!(picks, vec![active[0], active[0], active[1], active[1], active[0], active[0]]);
    }

    #[test]
    fn test_head_slot_offsets_the_rotation() {
        let active = addrs(3);
        assert_eq!(
            scheduled_witness(&active, 4, 1, 1),
            scheduled_witness(&active, 0, 5, 1)
        );
    }

    #[test]
    fn test_empty_active_set() {
        assert_eq!(scheduled_witness(&[], 10, 1, 1), None);
    }
}
