//! DelegatedResource records + bidirectional account index.
//!
//! ```text
//! delegated_resources    key: from(20) ‖ to(20)   value: DelegatedResource
//! delegated_index_from   key: from(20)            value: Vec<Address> (receivers)
//! delegated_index_to     key: to(20)              value: Vec<Address> (owners)
//! ```
//!
//! Kedua sisi index selalu di-update bersama; satu sisi tidak pernah diturunkan
//! dari sisi lain.

use super::{ChainState, DelegatedResource};
use crate::error::StoreResult;
use crate::store::Table;
use crate::types::{Address, ADDRESS_LEN};

pub fn delegation_key(from: &Address, to: &Address) -> [u8; ADDRESS_LEN * 2] {
    let mut key = [0u8; ADDRESS_LEN * 2];
    key[..ADDRESS_LEN].copy_from_slice(from.as_bytes());
    key[ADDRESS_LEN..].copy_from_slice(to.as_bytes());
    key
}

impl<'a> ChainState<'a> {
    pub fn delegated_resource(&self, from: &Address, to: &Address) -> StoreResult<Option<DelegatedResource>> {
        self.read(Table::DelegatedResources, &delegation_key(from, to))
    }

    pub fn put_delegated_resource(&mut self, record: &DelegatedResource) -> StoreResult<()> {
        self.write(Table::DelegatedResources, &delegation_key(&record.from, &record.to), record)
    }

    /// Delete the record and both halves of the index.
    pub fn remove_delegated_resource(&mut self, from: &Address, to: &Address) -> StoreResult<()> {
        self.remove(Table::DelegatedResources, &delegation_key(from, to))?;
        self.unlink(Table::DelegatedIndexFrom, from, to)?;
        self.unlink(Table::DelegatedIndexTo, to, from)?;
        Ok(())
    }

    /// Add `from → to` to both sides of the index (idempotent).
    pub fn link_delegation(&mut self, from: &Address, to: &Address) -> StoreResult<()> {
        self.link(Table::DelegatedIndexFrom, from, to)?;
        self.link(Table::DelegatedIndexTo, to, from)?;
        Ok(())
    }

    /// Receivers that `owner` has delegated to.
    pub fn delegation_receivers(&self, owner: &Address) -> StoreResult<Vec<Address>> {
        Ok(self.read(Table::DelegatedIndexFrom, owner.as_bytes())?.unwrap_or_default())
    }

    /// Owners that delegated to `receiver`.
    pub fn delegation_owners(&self, receiver: &Address) -> StoreResult<Vec<Address>> {
        Ok(self.read(Table::DelegatedIndexTo, receiver.as_bytes())?.unwrap_or_default())
    }

    fn link(&mut self, table: Table, key: &Address, member: &Address) -> StoreResult<()> {
        let mut list: Vec<Address> = self.read(table, key.as_bytes())?.unwrap_or_default();
        if let Err(pos) = list.binary_search(member) {
            list.insert(pos, *member);
            self.write(table, key.as_bytes(), &list)?;
        }
        Ok(())
    }

    fn unlink(&mut self, table: Table, key: &Address, member: &Address) -> StoreResult<()> {
        let mut list: Vec<Address> = self.read(table, key.as_bytes())?.unwrap_or_default();
        if let Ok(pos) = list.binary_search(member) {
            list.remove(pos);
            if list.is_empty() {
                self.remove(table, key.as_bytes())?;
            } else {
                self.write(table, key.as_bytes(), &list)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StateStore};

    #[test]
    fn test_index_both_sides_and_cleanup() {
        let mut store = MemoryStore::new();
        let owner = Address([1; 20]);
        let r1 = Address([2; 20]);
        let r2 = Address([3; 20]);
        {
            let mut state = ChainState::new(&mut store);
            state.put_delegated_resource(&DelegatedResource::new(owner, r1)).unwrap();
            state.link_delegation(&owner, &r1).unwrap();
            state.link_delegation(&owner, &r2).unwrap();
            state.link_delegation(&owner, &r2).unwrap();
            assert_eq!(state.delegation_receivers(&owner).unwrap(), vec![r1, r2]);
            assert_eq!(state.delegation_owners(&r1).unwrap(), vec![owner]);

            state.remove_delegated_resource(&owner, &r1).unwrap();
            assert_eq!(state.delegation_receivers(&owner).unwrap(), vec![r2]);
            assert!(state.delegation_owners(&r1).unwrap().is_empty());
            assert!(state.delegated_resource(&owner, &r1).unwrap().is_none());
        }
        // empty index lists are deleted, not stored empty
        assert!(!store.has(Table::DelegatedIndexTo, r1.as_bytes()).unwrap());
    }
}
