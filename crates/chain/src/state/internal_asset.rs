//! Token (asset issue) dan smart contract records.

use super::{id_key, AssetIssue, ChainState, SmartContract};
use crate::error::StoreResult;
use crate::store::Table;
use crate::types::Address;

impl<'a> ChainState<'a> {
    pub fn asset(&self, id: u64) -> StoreResult<Option<AssetIssue>> {
        self.read(Table::Assets, &id_key(id))
    }

    pub fn put_asset(&mut self, asset: &AssetIssue) -> StoreResult<()> {
        self.write(Table::Assets, &id_key(asset.id), asset)
    }

    pub fn next_asset_id(&mut self) -> StoreResult<u64> {
        let props = self.update_properties(|p| p.latest_asset_id += 1)?;
        Ok(props.latest_asset_id)
    }

    /// Linear scan; token issuance is rare.
    pub fn asset_name_taken(&self, name: &[u8]) -> StoreResult<bool> {
        Ok(self
            .scan::<AssetIssue>(Table::Assets)?
            .iter()
            .any(|(_, a)| a.name == name))
    }

    pub fn contract(&self, addr: &Address) -> StoreResult<Option<SmartContract>> {
        self.read(Table::Contracts, addr.as_bytes())
    }

    pub fn put_contract(&mut self, contract: &SmartContract) -> StoreResult<()> {
        self.write(Table::Contracts, contract.address.as_bytes(), contract)
    }

    // contract storage: key = contract(20) ‖ slot, dipakai oleh VM

    pub fn storage_slot(&self, contract: &Address, slot: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        self.read(Table::ContractStorage, &storage_key(contract, slot))
    }

    pub fn put_storage_slot(&mut self, contract: &Address, slot: &[u8], value: &[u8]) -> StoreResult<()> {
        self.write(Table::ContractStorage, &storage_key(contract, slot), &value.to_vec())
    }
}

fn storage_key(contract: &Address, slot: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(contract.as_bytes().len() + slot.len());
    key.extend_from_slice(contract.as_bytes());
    key.extend_from_slice(slot);
    key
}
