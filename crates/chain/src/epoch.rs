//! # Maintenance (Epoch) Engine
//!
//! Dijalankan oleh block processor ketika timestamp block ≥
//! `next_maintenance_time`. Semua write terjadi di deposit block, jadi tally
//! dan penghapusan delta sampai ke base store dalam satu batch atomik.
//!
//! ## Urutan (CONSENSUS-CRITICAL)
//!
//! | Step | Operasi |
//! |------|---------|
//! | 1 | `process_proposals` terhadap active set lama |
//! | 2 | tally StakeChange → `total_network_stake` |
//! | 3 | `update_witness`: tally VoteChange, genesis power removal, slashing, election, diff |
//! | 4 | standby allowance dibagi ke active set baru sesuai vote count |
//! | 5 | `next_maintenance_time` maju ke boundary berikutnya, `epoch += 1` |
//!
//! ## Election
//!
//! ```text
//! eligible = status ∈ {ACTIVE, SUPERNODE} ∪ {SLASHED dengan ban yang sudah lewat}
//! slashing = miss rate > threshold → SLASHED + BannedWitness, keluar dari eligible
//! sort     = vote_count desc, lalu sha3(address) desc
//! active   = sort[..max_active_witnesses]
//! ```

use std::collections::{BTreeMap, BTreeSet};

use tracing::{error, info};

use crate::crypto::address_tiebreak_hash;
use crate::error::ExecutionError;
use crate::governance::ProposalOutcome;
use crate::slashing::penalty_for;
use crate::state::{as_amount, ChainState, Witness, WitnessStatus};
use crate::types::Address;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Election {
    /// New active set, in schedule order.
    pub active: Vec<Address>,
    pub entered: Vec<Address>,
    pub left: Vec<Address>,
    pub slashed: Vec<Address>,
    pub unbanned: Vec<Address>,
    pub vote_changes: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    /// Epoch number after this run.
    pub epoch: u64,
    pub proposals: ProposalOutcome,
    pub stake_changes: usize,
    pub election: Election,
    pub standby_paid: u128,
    pub next_maintenance_time: u64,
}

fn invariant(msg: String) -> ExecutionError {
    error!(reason = %msg, "maintenance invariant violated");
    ExecutionError::Invariant(msg)
}

/// First boundary strictly after `now`, stepping from `current` by `interval`.
pub fn next_maintenance_after(current: u64, interval: u64, now: u64) -> u64 {
    if current > now {
        return current;
    }
    let interval = interval.max(1);
    let rounds = (now - current) / interval;
    rounds
        .saturating_add(1)
        .saturating_mul(interval)
        .saturating_add(current)
}

/// Ordering used for election: vote count desc, tie-break hash desc.
pub fn election_order(a: &Witness, b: &Witness) -> std::cmp::Ordering {
    b.vote_count
        .cmp(&a.vote_count)
        .then_with(|| address_tiebreak_hash(&b.address).cmp(&address_tiebreak_hash(&a.address)))
}

impl<'a> ChainState<'a> {
    pub fn run_maintenance(&mut self, now: u64) -> Result<MaintenanceReport, ExecutionError> {
        let proposals = self.process_proposals(now)?;
        let stake_changes = self.tally_stake_changes()?;
        let election = self.update_witness(now)?;
        let standby_paid = self.pay_standby_allowance(&election.active)?;

        let props = self.update_properties(|p| {
            p.next_maintenance_time = next_maintenance_after(p.next_maintenance_time, p.maintenance_interval(), now);
            p.epoch += 1;
        })?;

        info!(
            epoch = props.epoch,
            approved = proposals.approved.len(),
            disapproved = proposals.disapproved.len(),
            vote_changes = election.vote_changes,
            stake_changes,
            active = election.active.len(),
            entered = election.entered.len(),
            left = election.left.len(),
            slashed = election.slashed.len(),
            standby_paid,
            next_maintenance_time = props.next_maintenance_time,
            "maintenance complete"
        );

        Ok(MaintenanceReport {
            epoch: props.epoch,
            proposals,
            stake_changes,
            election,
            standby_paid,
            next_maintenance_time: props.next_maintenance_time,
        })
    }

    /// Apply every pending StakeChange to `total_network_stake`, then delete them.
    pub fn tally_stake_changes(&mut self) -> Result<usize, ExecutionError> {
        let changes = self.pending_stake_changes()?;
        if changes.is_empty() {
            return Ok(0);
        }
        let mut props = self.properties()?;
        let mut total = props.total_network_stake;
        for c in &changes {
            total = total
                .checked_sub(c.old_stake)
                .ok_or_else(|| invariant(format!("network stake below stake of {}", c.address)))?
                .checked_add(c.new_stake)
                .ok_or(ExecutionError::Overflow("total network stake"))?;
        }
        props.total_network_stake = total;
        self.put_properties(&props)?;
        for c in &changes {
            self.remove_stake_change(&c.address)?;
        }
        Ok(changes.len())
    }

    /// Fold every pending VoteChange into witness vote counts, then delete
    /// the deltas. Deltas are netted per candidate first, so the order of the
    /// outbox does not matter.
    pub fn tally_vote_changes(&mut self) -> Result<usize, ExecutionError> {
        let changes = self.pending_vote_changes()?;
        let mut net: BTreeMap<Address, i128> = BTreeMap::new();
        for c in &changes {
            if let Some(v) = c.old_vote {
                *net.entry(v.candidate).or_default() -= v.count as i128;
            }
            if let Some(v) = c.new_vote {
                *net.entry(v.candidate).or_default() += v.count as i128;
            }
        }
        for (candidate, delta) in net {
            if delta == 0 {
                continue;
            }
            let mut w = self
                .witness(&candidate)?
                .ok_or_else(|| invariant(format!("vote for unknown witness {}", candidate)))?;
            let updated = w.vote_count as i128 + delta;
            w.vote_count = u64::try_from(updated)
                .map_err(|_| invariant(format!("vote count of {} out of range: {}", candidate, updated)))?;
            self.put_witness(&w)?;
        }
        for c in &changes {
            self.remove_vote_change(&c.address)?;
        }
        Ok(changes.len())
    }

    /// Subtract the genesis vote counts once `remove_the_power_of_the_gr` has
    /// been approved, then mark the flag spent.
    fn remove_genesis_power(&mut self) -> Result<bool, ExecutionError> {
        if self.properties()?.remove_the_power_of_the_gr != 1 {
            return Ok(false);
        }
        for (addr, votes) in self.genesis_votes()? {
            if let Some(mut w) = self.witness(&addr)? {
                w.vote_count = w.vote_count.saturating_sub(votes);
                self.put_witness(&w)?;
            }
        }
        self.update_properties(|p| p.remove_the_power_of_the_gr = -1)?;
        info!("genesis witness votes removed");
        Ok(true)
    }

    fn set_committee(&mut self, addr: &Address, on: bool) -> Result<(), ExecutionError> {
        if let Some(mut acct) = self.account(addr)? {
            if acct.is_committee != on {
                acct.is_committee = on;
                self.put_account(&acct)?;
            }
        }
        Ok(())
    }

    pub fn update_witness(&mut self, now: u64) -> Result<Election, ExecutionError> {
        let mut election = Election {
            vote_changes: self.tally_vote_changes()?,
            ..Election::default()
        };
        self.remove_genesis_power()?;
        let props = self.properties()?;

        let mut eligible: Vec<Witness> = Vec::new();
        for mut w in self.all_witnesses()? {
            match w.status {
                WitnessStatus::Resigned => continue,
                WitnessStatus::Slashed => {
                    if !self.try_unban(&mut w, now)? {
                        continue;
                    }
                    election.unbanned.push(w.address);
                }
                WitnessStatus::Active | WitnessStatus::Supernode => {}
            }
            match penalty_for(&w, &props) {
                Some(penalty) => {
                    self.slash_witness(&mut w, penalty, now)?;
                    election.slashed.push(w.address);
                }
                None => {
                    w.epoch_missed = 0;
                    w.epoch_produced = 0;
                    eligible.push(w.clone());
                }
            }
            self.put_witness(&w)?;
        }

        eligible.sort_by(election_order);
        eligible.truncate(props.max_active_witnesses);
        election.active = eligible.iter().map(|w| w.address).collect();

        let previous = self.active_witnesses()?;
        let incoming: BTreeSet<Address> = election.active.iter().copied().collect();
        let outgoing: BTreeSet<Address> = previous.iter().copied().collect();

        for addr in previous.iter().filter(|a| !incoming.contains(a)) {
            if let Some(mut w) = self.witness(addr)? {
                w.is_jobs = false;
                if w.status == WitnessStatus::Supernode {
                    w.status = WitnessStatus::Active;
                }
                self.put_witness(&w)?;
            }
            self.set_committee(addr, false)?;
            election.left.push(*addr);
        }
        for addr in &election.active {
            let mut w = self
                .witness(addr)?
                .ok_or_else(|| invariant(format!("elected witness {} missing", addr)))?;
            w.is_jobs = true;
            w.status = WitnessStatus::Supernode;
            self.put_witness(&w)?;
            self.set_committee(addr, true)?;
            if !outgoing.contains(addr) {
                election.entered.push(*addr);
            }
        }
        self.set_active_witnesses(&election.active)?;
        Ok(election)
    }

    /// Split `witness_standby_allowance` over `active` by vote count.
    pub fn pay_standby_allowance(&mut self, active: &[Address]) -> Result<u128, ExecutionError> {
        let total = as_amount(self.properties()?.witness_standby_allowance);
        if total == 0 || active.is_empty() {
            return Ok(0);
        }
        let mut witnesses = Vec::with_capacity(active.len());
        for addr in active {
            if let Some(w) = self.witness(addr)? {
                witnesses.push(w);
            }
        }
        let vote_sum: u128 = witnesses.iter().map(|w| w.vote_count as u128).sum();
        if vote_sum == 0 {
            return Ok(0);
        }

        let mut paid: u128 = 0;
        for w in &witnesses {
            let share = total
                .checked_mul(w.vote_count as u128)
                .ok_or(ExecutionError::Overflow("standby allowance"))?
                / vote_sum;
            if share == 0 {
                continue;
            }
            let mut acct = self.require_account(&w.address)?;
            acct.allowance = acct
                .allowance
                .checked_add(share)
                .ok_or(ExecutionError::Overflow("allowance"))?;
            self.put_account(&acct)?;
            paid = paid.saturating_add(share);
        }
        Ok(paid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{DynamicProperties, Vote};
    use crate::store::MemoryStore;
    use dpos_common::ChainConfig;

    fn setup(store: &mut MemoryStore) -> ChainState<'_> {
        let mut state = ChainState::new(store);
        let props = DynamicProperties::from_config(&ChainConfig::default()).unwrap();
        state.put_properties(&props).unwrap();
        state
    }

    fn add_witness(state: &mut ChainState<'_>, b: u8, votes: u64) -> Address {
        let addr = Address([b; 20]);
        state.ensure_account(&addr, 0).unwrap();
        let mut w = Witness::new(addr, format!("w{}", b));
        w.vote_count = votes;
        state.put_witness(&w).unwrap();
        addr
    }

    #[test]
    fn test_next_maintenance_after() {
        assert_eq!(next_maintenance_after(100, 50, 10), 100);
        assert_eq!(next_maintenance_after(100, 50, 100), 150);
        assert_eq!(next_maintenance_after(100, 50, 249), 250);
        assert_eq!(next_maintenance_after(100, 50, 250), 300);
    }

    #[test]
    fn test_tally_nets_deltas_and_clears_outbox() {
        let mut store = MemoryStore::new();
        let mut state = setup(&mut store);
        let a = add_witness(&mut state, 1, 10);
        let b = add_witness(&mut state, 2, 0);
        let voter = Address([9; 20]);
        // counted last epoch: 10 for a; now moved to b
        state
            .record_vote_change(&voter, Some(Vote { candidate: a, count: 10 }), Some(Vote { candidate: b, count: 4 }))
            .unwrap();
        assert_eq!(state.tally_vote_changes().unwrap(), 1);
        assert_eq!(state.witness(&a).unwrap().unwrap().vote_count, 0);
        assert_eq!(state.witness(&b).unwrap().unwrap().vote_count, 4);
        assert!(state.pending_vote_changes().unwrap().is_empty());
    }

    #[test]
    fn test_tally_underflow_is_fatal() {
        let mut store = MemoryStore::new();
        let mut state = setup(&mut store);
        let a = add_witness(&mut state, 1, 3);
        state
            .record_vote_change(&Address([9; 20]), Some(Vote { candidate: a, count: 5 }), None)
            .unwrap();
        let err = state.tally_vote_changes().unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_election_orders_by_votes_and_truncates() {
        let mut store = MemoryStore::new();
        let mut state = setup(&mut store);
        state.update_properties(|p| p.max_active_witnesses = 2).unwrap();
        let low = add_witness(&mut state, 1, 5);
        let high = add_witness(&mut state, 2, 50);
        let mid = add_witness(&mut state, 3, 20);

        let election = state.update_witness(0).unwrap();
        assert_eq!(election.active, vec![high, mid]);
        assert!(state.account(&high).unwrap().unwrap().is_committee);
        assert!(!state.account(&low).unwrap().unwrap().is_committee);
        assert_eq!(state.witness(&mid).unwrap().unwrap().status, WitnessStatus::Supernode);

        // low overtakes mid next epoch
        let mut w = state.witness(&low).unwrap().unwrap();
        w.vote_count = 30;
        state.put_witness(&w).unwrap();
        let election = state.update_witness(0).unwrap();
        assert_eq!(election.active, vec![high, low]);
        assert_eq!(election.left, vec![mid]);
        assert_eq!(election.entered, vec![low]);
        let demoted = state.witness(&mid).unwrap().unwrap();
        assert_eq!(demoted.status, WitnessStatus::Active);
        assert!(!demoted.is_jobs);
        assert!(!state.account(&mid).unwrap().unwrap().is_committee);
    }

    #[test]
    fn test_tie_break_is_deterministic() {
        let a = Witness::new(Address([1; 20]), "a".into());
        let b = Witness::new(Address([2; 20]), "b".into());
        let mut one = vec![a.clone(), b.clone()];
        let mut two = vec![b, a];
        one.sort_by(election_order);
        two.sort_by(election_order);
        assert_eq!(one, two);
    }

    #[test]
    fn test_standby_allowance_proportional_to_votes() {
        let mut store = MemoryStore::new();
        let mut state = setup(&mut store);
        state.update_properties(|p| p.witness_standby_allowance = 1_000).unwrap();
        let a = add_witness(&mut state, 1, 3);
        let b = add_witness(&mut state, 2, 1);
        assert_eq!(state.pay_standby_allowance(&[a, b]).unwrap(), 1_000);
        assert_eq!(state.account(&a).unwrap().unwrap().allowance, 750);
        assert_eq!(state.account(&b).unwrap().unwrap().allowance, 250);
    }

    #[test]
    fn test_stake_tally_updates_network_total() {
        let mut store = MemoryStore::new();
        let mut state = setup(&mut store);
        state.record_stake_change(&Address([1; 20]), 0, 500).unwrap();
        state.record_stake_change(&Address([2; 20]), 0, 300).unwrap();
        assert_eq!(state.tally_stake_changes().unwrap(), 2);
        assert_eq!(state.properties().unwrap().total_network_stake, 800);
        assert!(state.pending_stake_changes().unwrap().is_empty());
    }
}
