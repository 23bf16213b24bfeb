//! ProposalCreate / ProposalApprove / ProposalDelete.
//!
//! Semua operasi proposal hanya untuk akun committee (witness yang sedang
//! terpilih). Parameter divalidasi per id saat create; penerapan ke
//! `DynamicProperties` terjadi di `governance::process_proposals`.

use std::collections::BTreeSet;

use tracing::{debug, info};

use super::{reject, ActuatorContext};
use crate::error::{ExecutionError, ValidationError};
use crate::params::ChainParameter;
use crate::state::{ChainState, DynamicProperties, Proposal, ProposalState};
use crate::tx::{ProposalApproveContract, ProposalCreateContract, ProposalDeleteContract};
use crate::types::Address;

fn require_committee(state: &ChainState<'_>, owner: &Address) -> Result<(), ValidationError> {
    let acct = state.account(owner)?.ok_or(ValidationError::AccountNotFound(*owner))?;
    if !acct.is_committee {
        return Err(ValidationError::PermissionDenied(format!("{} is not a committee member", owner)));
    }
    Ok(())
}

fn require_open(proposal: &Proposal, now: u64) -> Result<(), ValidationError> {
    if proposal.state != ProposalState::Pending {
        return Err(reject(format!("proposal {} is {:?}", proposal.id, proposal.state)));
    }
    if proposal.has_expired(now) {
        return Err(ValidationError::Timing(format!("proposal {} has expired", proposal.id)));
    }
    Ok(())
}

/// First maintenance boundary strictly after `now + proposal lifetime`.
pub fn proposal_expiration(props: &DynamicProperties, now: u64) -> Option<u64> {
    let interval = props.maintenance_interval();
    let target = now.checked_add(props.proposal_expire_time_ms)?;
    let rounds = target.saturating_sub(props.next_maintenance_time) / interval;
    rounds
        .checked_add(1)?
        .checked_mul(interval)?
        .checked_add(props.next_maintenance_time)
}

pub(super) fn validate_create(c: &ProposalCreateContract, state: &ChainState<'_>) -> Result<(), ValidationError> {
    require_committee(state, &c.owner)?;
    if c.parameters.is_empty() {
        return Err(reject("proposal has no parameters"));
    }
    let props = state.properties()?;
    for (&id, &value) in &c.parameters {
        let param = ChainParameter::from_id(id).ok_or_else(|| ValidationError::ParameterOutOfRange {
            id,
            value,
            reason: "unknown parameter id".into(),
        })?;
        param.validate(value, &props)?;
    }
    Ok(())
}

pub(super) fn execute_create(
    c: &ProposalCreateContract,
    state: &mut ChainState<'_>,
    ctx: &ActuatorContext<'_>,
) -> Result<(), ExecutionError> {
    let expiration_time = proposal_expiration(&state.properties()?, ctx.now)
        .ok_or(ExecutionError::Overflow("proposal expiration"))?;
    let id = state.next_proposal_id()?;
    let proposal = Proposal {
        id,
        proposer: c.owner,
        parameters: c.parameters.clone(),
        approvals: BTreeSet::new(),
        create_time: ctx.now,
        expiration_time,
        state: ProposalState::Pending,
    };
    state.put_proposal(&proposal)?;
    info!(id, proposer = %c.owner, params = c.parameters.len(), expiration_time, "proposal created");
    Ok(())
}

pub(super) fn validate_approve(
    c: &ProposalApproveContract,
    state: &ChainState<'_>,
    ctx: &ActuatorContext<'_>,
) -> Result<(), ValidationError> {
    require_committee(state, &c.owner)?;
    let proposal = state
        .proposal(c.proposal_id)?
        .ok_or(ValidationError::ProposalNotFound(c.proposal_id))?;
    require_open(&proposal, ctx.now)?;
    let approved = proposal.approvals.contains(&c.owner);
    if c.is_add_approval && approved {
        return Err(reject("proposal already approved by this witness"));
    }
    if !c.is_add_approval && !approved {
        return Err(reject("no approval to withdraw"));
    }
    Ok(())
}

pub(super) fn execute_approve(c: &ProposalApproveContract, state: &mut ChainState<'_>) -> Result<(), ExecutionError> {
    let mut proposal = state
        .proposal(c.proposal_id)?
        .ok_or_else(|| ExecutionError::Failed(format!("proposal {} missing", c.proposal_id)))?;
    if c.is_add_approval {
        proposal.approvals.insert(c.owner);
    } else {
        proposal.approvals.remove(&c.owner);
    }
    state.put_proposal(&proposal)?;
    debug!(
        id = c.proposal_id,
        witness = %c.owner,
        add = c.is_add_approval,
        approvals = proposal.approvals.len(),
        "proposal approval toggled"
    );
    Ok(())
}

pub(super) fn validate_delete(
    c: &ProposalDeleteContract,
    state: &ChainState<'_>,
    ctx: &ActuatorContext<'_>,
) -> Result<(), ValidationError> {
    require_committee(state, &c.owner)?;
    let proposal = state
        .proposal(c.proposal_id)?
        .ok_or(ValidationError::ProposalNotFound(c.proposal_id))?;
    if proposal.proposer != c.owner {
        return Err(ValidationError::PermissionDenied("only the proposer may delete".into()));
    }
    require_open(&proposal, ctx.now)?;
    Ok(())
}

pub(super) fn execute_delete(c: &ProposalDeleteContract, state: &mut ChainState<'_>) -> Result<(), ExecutionError> {
    let mut proposal = state
        .proposal(c.proposal_id)?
        .ok_or_else(|| ExecutionError::Failed(format!("proposal {} missing", c.proposal_id)))?;
    proposal.state = ProposalState::Canceled;
    state.put_proposal(&proposal)?;
    info!(id = c.proposal_id, "proposal canceled");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dpos_common::ChainConfig;

    #[test]
    fn test_expiration_rounds_to_boundary_after_lifetime() {
        let mut props = DynamicProperties::from_config(&ChainConfig::default()).unwrap();
        props.maintenance_time_interval = 100;
        props.proposal_expire_time_ms = 250;
        props.next_maintenance_time = 1_000;
        // target 1_200 → boundaries 1_000, 1_100, 1_200, 1_300
        assert_eq!(proposal_expiration(&props, 950), Some(1_300));
        // target before the next boundary still lands one interval past it
        assert_eq!(proposal_expiration(&props, 500), Some(1_100));
        assert_eq!(proposal_expiration(&props, u64::MAX), None);
    }
}
