//! # Governance Engine
//!
//! Resolusi proposal yang sudah expired, dijalankan sekali per maintenance
//! (sebelum re-election, jadi dihitung terhadap active set yang lama).
//!
//! ## Scan order
//!
//! ```text
//! id = latest_proposal_num → 1
//!   APPROVED / DISAPPROVED → stop (yang lebih tua pasti sudah diproses)
//!   CANCELED               → skip
//!   belum expired          → skip
//!   approvals ∩ active ≥ threshold → terapkan semua parameter, APPROVED
//!   selain itu                     → DISAPPROVED, tidak ada perubahan
//! ```
//!
//! `threshold = active_count × proposal_approval_percent / 100`. Active set
//! kosong tidak pernah meloloskan proposal.

use tracing::{info, warn};

use crate::error::ExecutionError;
use crate::params::ChainParameter;
use crate::state::{ChainState, DynamicProperties, Proposal, ProposalState};
use crate::types::Address;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProposalOutcome {
    pub approved: Vec<u64>,
    pub disapproved: Vec<u64>,
}

/// Approvals needed out of `active_count`.
pub fn approval_threshold(active_count: usize, percent: u64) -> u64 {
    (active_count as u64).saturating_mul(percent) / 100
}

/// True if `proposal` has enough approvals from the current active set.
pub fn is_approved(proposal: &Proposal, active: &[Address], percent: u64) -> bool {
    if active.is_empty() {
        return false;
    }
    let count = active.iter().filter(|a| proposal.approvals.contains(a)).count() as u64;
    count > 0 && count >= approval_threshold(active.len(), percent)
}

fn apply_parameters(proposal: &Proposal, props: &mut DynamicProperties) {
    for (&id, &value) in &proposal.parameters {
        match ChainParameter::from_id(id) {
            Some(param) => param.apply(value, props),
            None => warn!(proposal = proposal.id, id, "unknown parameter id skipped"),
        }
    }
}

impl<'a> ChainState<'a> {
    pub fn process_proposals(&mut self, now: u64) -> Result<ProposalOutcome, ExecutionError> {
        let mut props = self.properties()?;
        let active = self.active_witnesses()?;
        let percent = props.proposal_approval_percent;
        let mut outcome = ProposalOutcome::default();

        for id in (1..=props.latest_proposal_num).rev() {
            let Some(mut proposal) = self.proposal(id)? else { continue };
            if proposal.state.is_processed() {
                break;
            }
            if proposal.state == ProposalState::Canceled || !proposal.has_expired(now) {
                continue;
            }
            if is_approved(&proposal, &active, percent) {
                apply_parameters(&proposal, &mut props);
                proposal.state = ProposalState::Approved;
                outcome.approved.push(id);
                info!(id, approvals = proposal.approvals.len(), "proposal approved");
            } else {
                proposal.state = ProposalState::Disapproved;
                outcome.disapproved.push(id);
                info!(id, approvals = proposal.approvals.len(), "proposal disapproved");
            }
            self.put_proposal(&proposal)?;
        }

        self.put_properties(&props)?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};

    fn addrs(n: u8) -> Vec<Address> {
        (1..=n).map(|b| Address([b; 20])).collect()
    }

    fn proposal_with(approvals: &[Address]) -> Proposal {
        Proposal {
            id: 1,
            proposer: Address([1; 20]),
            parameters: BTreeMap::new(),
            approvals: approvals.iter().copied().collect::<BTreeSet<_>>(),
            create_time: 0,
            expiration_time: 10,
            state: ProposalState::Pending,
        }
    }

    #[test]
    fn test_threshold_integer_division() {
        assert_eq!(approval_threshold(27, 70), 18);
        assert_eq!(approval_threshold(3, 70), 2);
        assert_eq!(approval_threshold(0, 70), 0);
    }

    #[test]
    fn test_only_active_approvals_count() {
        let active = addrs(3);
        let outsider = Address([99; 20]);
        assert!(!is_approved(&proposal_with(&[active[0], outsider]), &active, 70));
        assert!(is_approved(&proposal_with(&[active[0], active[1]]), &active, 70));
    }

    #[test]
    fn test_empty_active_set_approves_nothing() {
        assert!(!is_approved(&proposal_with(&[]), &[], 70));
        assert!(!is_approved(&proposal_with(&[Address([1; 20])]), &[], 0));
    }
}
