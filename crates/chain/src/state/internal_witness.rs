//! Witness registry, banned list dan outbox VoteChange / StakeChange.
//!
//! Outbox dikonsumsi tepat sekali oleh maintenance (`crate::epoch`). Delta dibuat
//! lazily pada aksi pertama yang mengubah vote/stake sejak tally terakhir, lalu
//! di-merge untuk aksi berikutnya dalam epoch yang sama.

use super::{BannedWitness, ChainState, StakeChange, Vote, VoteChange, Witness};
use crate::error::StoreResult;
use crate::store::Table;
use crate::types::Address;

impl<'a> ChainState<'a> {
    // ============================================================
    // WITNESS
    // ============================================================

    pub fn witness(&self, addr: &Address) -> StoreResult<Option<Witness>> {
        self.read(Table::Witnesses, addr.as_bytes())
    }

    pub fn witness_exists(&self, addr: &Address) -> StoreResult<bool> {
        self.store().has(Table::Witnesses, addr.as_bytes())
    }

    pub fn put_witness(&mut self, witness: &Witness) -> StoreResult<()> {
        self.write(Table::Witnesses, witness.address.as_bytes(), witness)
    }

    /// All witnesses in address order.
    pub fn all_witnesses(&self) -> StoreResult<Vec<Witness>> {
        Ok(self
            .scan::<Witness>(Table::Witnesses)?
            .into_iter()
            .map(|(_, w)| w)
            .collect())
    }

    // ============================================================
    // BANNED
    // ============================================================

    pub fn banned_witness(&self, addr: &Address) -> StoreResult<Option<BannedWitness>> {
        self.read(Table::BannedWitnesses, addr.as_bytes())
    }

    pub fn put_banned_witness(&mut self, banned: &BannedWitness) -> StoreResult<()> {
        self.write(Table::BannedWitnesses, banned.address.as_bytes(), banned)
    }

    pub fn remove_banned_witness(&mut self, addr: &Address) -> StoreResult<()> {
        self.remove(Table::BannedWitnesses, addr.as_bytes())
    }

    // ============================================================
    // VOTE CHANGE OUTBOX
    // ============================================================

    pub fn vote_change(&self, addr: &Address) -> StoreResult<Option<VoteChange>> {
        self.read(Table::VoteChanges, addr.as_bytes())
    }

    /// Record that `addr`'s vote moves from `current` to `new_vote`. If a delta
    /// is already pending this epoch only its `new_vote` is replaced, so the
    /// tally still subtracts the vote that was counted last epoch.
    pub fn record_vote_change(
        &mut self,
        addr: &Address,
        current: Option<Vote>,
        new_vote: Option<Vote>,
    ) -> StoreResult<()> {
        let change = match self.vote_change(addr)? {
            Some(mut pending) => {
                pending.new_vote = new_vote;
                pending
            }
            None => VoteChange {
                address: *addr,
                old_vote: current,
                new_vote,
            },
        };
        self.write(Table::VoteChanges, addr.as_bytes(), &change)
    }

    pub fn pending_vote_changes(&self) -> StoreResult<Vec<VoteChange>> {
        Ok(self
            .scan::<VoteChange>(Table::VoteChanges)?
            .into_iter()
            .map(|(_, v)| v)
            .collect())
    }

    pub fn remove_vote_change(&mut self, addr: &Address) -> StoreResult<()> {
        self.remove(Table::VoteChanges, addr.as_bytes())
    }

    // ============================================================
    // STAKE CHANGE OUTBOX
    // ============================================================

    pub fn record_stake_change(&mut self, addr: &Address, old_stake: u128, new_stake: u128) -> StoreResult<()> {
        let change = match self.read::<StakeChange>(Table::StakeChanges, addr.as_bytes())? {
            Some(mut pending) => {
                pending.new_stake = new_stake;
                pending
            }
            None => StakeChange {
                address: *addr,
                old_stake,
                new_stake,
            },
        };
        self.write(Table::StakeChanges, addr.as_bytes(), &change)
    }

    pub fn pending_stake_changes(&self) -> StoreResult<Vec<StakeChange>> {
        Ok(self
            .scan::<StakeChange>(Table::StakeChanges)?
            .into_iter()
            .map(|(_, v)| v)
            .collect())
    }

    pub fn remove_stake_change(&mut self, addr: &Address) -> StoreResult<()> {
        self.remove(Table::StakeChanges, addr.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_vote_change_merges_keeping_first_old_vote() {
        let mut store = MemoryStore::new();
        let mut state = ChainState::new(&mut store);
        let voter = Address([1; 20]);
        let w1 = Address([0xa1; 20]);
        let w2 = Address([0xa2; 20]);
        let w3 = Address([0xa3; 20]);

        let counted = Some(Vote { candidate: w1, count: 5 });
        state
            .record_vote_change(&voter, counted, Some(Vote { candidate: w2, count: 7 }))
            .unwrap();
        // second vote in the same epoch: current vote is now w2, but the
        // pending delta must still remember w1 as the counted one
        state
            .record_vote_change(
                &voter,
                Some(Vote { candidate: w2, count: 7 }),
                Some(Vote { candidate: w3, count: 9 }),
            )
            .unwrap();

        let pending = state.pending_vote_changes().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].old_vote, counted);
        assert_eq!(pending[0].new_vote, Some(Vote { candidate: w3, count: 9 }));
    }

    #[test]
    fn test_stake_change_merge() {
        let mut store = MemoryStore::new();
        let mut state = ChainState::new(&mut store);
        let a = Address([1; 20]);
        state.record_stake_change(&a, 0, 100).unwrap();
        state.record_stake_change(&a, 100, 40).unwrap();
        let pending = state.pending_stake_changes().unwrap();
        assert_eq!(pending, vec![StakeChange { address: a, old_stake: 0, new_stake: 40 }]);
        state.remove_stake_change(&a).unwrap();
        assert!(state.pending_stake_changes().unwrap().is_empty());
    }
}
