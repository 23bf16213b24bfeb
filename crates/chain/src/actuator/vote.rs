//! VoteWitness: replace the owner's single vote.
//!
//! Witness `vote_count` tidak disentuh di sini. Perubahan dicatat ke outbox
//! VoteChange dan baru dihitung saat maintenance.

use tracing::debug;

use super::{reject, require_valid};
use crate::error::{ExecutionError, ValidationError};
use crate::state::{ChainState, Vote, WitnessStatus};
use crate::tx::VoteWitnessContract;

pub(super) fn validate_vote(c: &VoteWitnessContract, state: &ChainState<'_>) -> Result<(), ValidationError> {
    require_valid(&c.candidate, "candidate")?;
    if c.count == 0 {
        return Err(reject("vote count must be positive"));
    }
    if !state.account_exists(&c.candidate)? {
        return Err(ValidationError::AccountNotFound(c.candidate));
    }
    let candidate = state
        .witness(&c.candidate)?
        .ok_or(ValidationError::WitnessNotFound(c.candidate))?;
    if candidate.status == WitnessStatus::Resigned {
        return Err(reject(format!("witness {} has resigned", c.candidate)));
    }
    let owner = state.account(&c.owner)?.ok_or(ValidationError::AccountNotFound(c.owner))?;
    let power = state.voting_power_of(&owner)?;
    if c.count > power {
        return Err(reject(format!("vote count {} exceeds voting power {}", c.count, power)));
    }
    Ok(())
}

pub(super) fn execute_vote(c: &VoteWitnessContract, state: &mut ChainState<'_>) -> Result<(), ExecutionError> {
    let mut acct = state.require_account(&c.owner)?;
    let new_vote = Vote { candidate: c.candidate, count: c.count };
    state.record_vote_change(&c.owner, acct.vote, Some(new_vote))?;
    acct.vote = Some(new_vote);
    state.put_account(&acct)?;
    debug!(owner = %c.owner, candidate = %c.candidate, count = c.count, "vote replaced");
    Ok(())
}
