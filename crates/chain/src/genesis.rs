//! Genesis: seed DynamicProperties, akun awal, witness awal dan active set.
//!
//! Idempotent: kalau `DynamicProperties` sudah ada, tidak ada yang ditulis.

use std::collections::BTreeSet;

use tracing::info;

use dpos_common::config::parse_address;
use dpos_common::ChainConfig;

use crate::epoch::election_order;
use crate::error::GenesisError;
use crate::state::{ChainState, DynamicProperties, Permission, PermissionType, Witness, WitnessStatus};
use crate::types::Address;

impl<'a> ChainState<'a> {
    /// Returns false if the store already holds a chain.
    pub fn init_genesis(&mut self, cfg: &ChainConfig) -> Result<bool, GenesisError> {
        if self.has_properties()? {
            return Ok(false);
        }
        let props = DynamicProperties::from_config(cfg)?;
        let ts = props.genesis_timestamp;
        self.put_properties(&props)?;
        self.ensure_account(&props.blackhole, ts)?;

        let mut seen = BTreeSet::new();
        for entry in &cfg.genesis.accounts {
            let addr = Address(parse_address(&entry.address)?);
            if !seen.insert(addr) {
                return Err(GenesisError::Duplicate(addr));
            }
            self.ensure_account(&addr, ts)?;
            self.credit(&addr, entry.balance)?;
        }

        let mut witnesses = Vec::with_capacity(cfg.genesis.witnesses.len());
        let mut genesis_votes = Vec::with_capacity(cfg.genesis.witnesses.len());
        let mut seen = BTreeSet::new();
        for entry in &cfg.genesis.witnesses {
            let addr = Address(parse_address(&entry.address)?);
            if !seen.insert(addr) {
                return Err(GenesisError::Duplicate(addr));
            }
            self.ensure_account(&addr, ts)?;
            let mut acct = self.require_account(&addr)?;
            acct.is_witness = true;
            acct.witness_permission = Some(Permission::single_key(PermissionType::Witness, 1, "witness", addr));
            self.put_account(&acct)?;

            let mut w = Witness::new(addr, entry.url.clone());
            w.vote_count = entry.vote_count;
            w.is_genesis = true;
            witnesses.push(w);
            genesis_votes.push((addr, entry.vote_count));
        }

        witnesses.sort_by(election_order);
        let mut active = Vec::new();
        for (i, w) in witnesses.iter_mut().enumerate() {
            if i < props.max_active_witnesses {
                w.is_jobs = true;
                w.status = WitnessStatus::Supernode;
                let mut acct = self.require_account(&w.address)?;
                acct.is_committee = true;
                self.put_account(&acct)?;
                active.push(w.address);
            }
            self.put_witness(w)?;
        }
        self.set_active_witnesses(&active)?;
        self.set_genesis_votes(&genesis_votes)?;

        info!(
            accounts = cfg.genesis.accounts.len(),
            witnesses = witnesses.len(),
            active = active.len(),
            genesis_timestamp = ts,
            "genesis applied"
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use dpos_common::config::{GenesisAccount, GenesisWitness};

    fn cfg() -> ChainConfig {
        let mut cfg = ChainConfig::default();
        cfg.chain.max_active_witnesses = 2;
        cfg.genesis.accounts = vec![GenesisAccount {
            address: "0x0101010101010101010101010101010101010101".into(),
            balance: 1_000,
        }];
        cfg.genesis.witnesses = (2u8..=4)
            .map(|b| GenesisWitness {
                address: format!("0x{}", hex::encode([b; 20])),
                url: format!("https://w{}.example", b),
                vote_count: b as u64 * 10,
            })
            .collect();
        cfg
    }

    #[test]
    fn test_genesis_seeds_and_elects() {
        let mut store = MemoryStore::new();
        let mut state = ChainState::new(&mut store);
        assert!(state.init_genesis(&cfg()).unwrap());

        assert_eq!(state.balance_of(&Address([1; 20])).unwrap(), 1_000);
        assert_eq!(state.active_witnesses().unwrap(), vec![Address([4; 20]), Address([3; 20])]);
        let standby = state.witness(&Address([2; 20])).unwrap().unwrap();
        assert_eq!(standby.status, WitnessStatus::Active);
        assert!(standby.is_genesis);
        assert!(state.account(&Address([4; 20])).unwrap().unwrap().is_committee);
        assert!(!state.account(&Address([2; 20])).unwrap().unwrap().is_committee);
    }

    #[test]
    fn test_genesis_is_idempotent() {
        let mut store = MemoryStore::new();
        let mut state = ChainState::new(&mut store);
        assert!(state.init_genesis(&cfg()).unwrap());
        state.credit(&Address([1; 20]), 5).unwrap();
        assert!(!state.init_genesis(&cfg()).unwrap());
        assert_eq!(state.balance_of(&Address([1; 20])).unwrap(), 1_005);
    }

    #[test]
    fn test_duplicate_account_rejected() {
        let mut c = cfg();
        c.genesis.accounts.push(c.genesis.accounts[0].clone());
        let mut store = MemoryStore::new();
        let mut state = ChainState::new(&mut store);
        assert!(matches!(state.init_genesis(&c), Err(GenesisError::Duplicate(_))));
    }
}
