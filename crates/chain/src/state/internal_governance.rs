//! Proposal storage (governance data layer).
//! Key: proposal_id (u64 big-endian). Id dialokasikan berurutan dari
//! `DynamicProperties::latest_proposal_num`.

use super::{id_key, ChainState, Proposal};
use crate::error::StoreResult;
use crate::store::Table;

impl<'a> ChainState<'a> {
    pub fn proposal(&self, id: u64) -> StoreResult<Option<Proposal>> {
        self.read(Table::Proposals, &id_key(id))
    }

    pub fn put_proposal(&mut self, proposal: &Proposal) -> StoreResult<()> {
        self.write(Table::Proposals, &id_key(proposal.id), proposal)
    }

    /// Allocate the next sequential proposal id.
    pub fn next_proposal_id(&mut self) -> StoreResult<u64> {
        let props = self.update_properties(|p| p.latest_proposal_num += 1)?;
        Ok(props.latest_proposal_num)
    }

    /// All proposals in ascending id order.
    pub fn all_proposals(&self) -> StoreResult<Vec<Proposal>> {
        Ok(self
            .scan::<Proposal>(Table::Proposals)?
            .into_iter()
            .map(|(_, p)| p)
            .collect())
    }
}
