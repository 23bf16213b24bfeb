//! Internal models for state module
//! Semua record yang disimpan di ledger store (bincode).

use crate::types::Address;
use serde::{Serialize, Deserialize};
use std::collections::{BTreeMap, BTreeSet};

// ============================================================
// RESOURCES
// ============================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceCode {
    Bandwidth,
    Energy,
}

impl ResourceCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceCode::Bandwidth => "bandwidth",
            ResourceCode::Energy => "energy",
        }
    }
}

/// Balance frozen by the account itself.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Frozen {
    pub amount: u128,
    pub expire_time: u64,
}

/// Delegation bookkeeping for one resource.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DelegatedFrozen {
    /// Amount this account froze on behalf of others.
    pub delegated_balance: u128,
    /// Amount others froze on behalf of this account.
    pub acquired_delegated_balance: u128,
}

/// Normal stake, withdrawable after `expiration_time`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Stake {
    pub amount: u128,
    pub expiration_time: u64,
}

/// Non-expiring stake held while registered as witness.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WitnessStake {
    pub amount: u128,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Vote {
    pub candidate: Address,
    pub count: u64,
}

// ============================================================
// PERMISSIONS
// ============================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PermissionType {
    Owner,
    Witness,
    Active,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PermissionKey {
    pub address: Address,
    pub weight: u64,
}

/// Threshold multisig descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Permission {
    pub kind: PermissionType,
    pub id: u32,
    pub name: String,
    pub threshold: u64,
    pub keys: Vec<PermissionKey>,
    /// 32-byte bitmap of allowed contract types (active permissions only)
    pub operations: Vec<u8>,
}

/// Bitmap length for active permission operations.
pub const OPERATIONS_LEN: usize = 32;

impl Permission {
    pub fn single_key(kind: PermissionType, id: u32, name: &str, address: Address) -> Self {
        Self {
            kind,
            id,
            name: name.to_string(),
            threshold: 1,
            keys: vec![PermissionKey { address, weight: 1 }],
            operations: Vec::new(),
        }
    }

    /// Default active permission: every contract type allowed.
    pub fn default_active(address: Address) -> Self {
        let mut p = Self::single_key(PermissionType::Active, 2, "active", address);
        p.operations = vec![0xff; OPERATIONS_LEN];
        p
    }

    pub fn allows(&self, contract_type: u32) -> bool {
        let byte = (contract_type / 8) as usize;
        let bit = contract_type % 8;
        self.operations
            .get(byte)
            .map(|b| b & (1u8 << bit) != 0)
            .unwrap_or(false)
    }
}

// ============================================================
// ACCOUNT
// ============================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub address: Address,
    pub account_name: Vec<u8>,
    /// Set once, globally unique.
    pub account_id: Vec<u8>,
    pub balance: u128,
    /// token id → amount
    pub assets: BTreeMap<u64, u128>,
    pub frozen_for_bandwidth: Frozen,
    pub frozen_for_energy: Frozen,
    pub delegated_frozen_for_bandwidth: DelegatedFrozen,
    pub delegated_frozen_for_energy: DelegatedFrozen,
    pub stake: Stake,
    pub witness_stake: WitnessStake,
    /// At most one active vote, replaced wholesale.
    pub vote: Option<Vote>,
    pub is_witness: bool,
    pub is_committee: bool,
    pub owner_permission: Permission,
    pub witness_permission: Option<Permission>,
    pub active_permissions: Vec<Permission>,
    /// Accrued witness reward not yet withdrawn.
    pub allowance: u128,
    pub latest_withdraw_time: u64,
    pub create_time: u64,
    /// Token issued by this account, if any.
    pub asset_issued_id: Option<u64>,
}

impl Account {
    pub fn new(address: Address, create_time: u64) -> Self {
        Self {
            address,
            account_name: Vec::new(),
            account_id: Vec::new(),
            balance: 0,
            assets: BTreeMap::new(),
            frozen_for_bandwidth: Frozen::default(),
            frozen_for_energy: Frozen::default(),
            delegated_frozen_for_bandwidth: DelegatedFrozen::default(),
            delegated_frozen_for_energy: DelegatedFrozen::default(),
            stake: Stake::default(),
            witness_stake: WitnessStake::default(),
            vote: None,
            is_witness: false,
            is_committee: false,
            owner_permission: Permission::single_key(PermissionType::Owner, 0, "owner", address),
            witness_permission: None,
            active_permissions: vec![Permission::default_active(address)],
            allowance: 0,
            latest_withdraw_time: 0,
            create_time,
            asset_issued_id: None,
        }
    }

    pub fn frozen(&self, resource: ResourceCode) -> &Frozen {
        match resource {
            ResourceCode::Bandwidth => &self.frozen_for_bandwidth,
            ResourceCode::Energy => &self.frozen_for_energy,
        }
    }

    pub fn frozen_mut(&mut self, resource: ResourceCode) -> &mut Frozen {
        match resource {
            ResourceCode::Bandwidth => &mut self.frozen_for_bandwidth,
            ResourceCode::Energy => &mut self.frozen_for_energy,
        }
    }

    pub fn delegated(&self, resource: ResourceCode) -> &DelegatedFrozen {
        match resource {
            ResourceCode::Bandwidth => &self.delegated_frozen_for_bandwidth,
            ResourceCode::Energy => &self.delegated_frozen_for_energy,
        }
    }

    pub fn delegated_mut(&mut self, resource: ResourceCode) -> &mut DelegatedFrozen {
        match resource {
            ResourceCode::Bandwidth => &mut self.delegated_frozen_for_bandwidth,
            ResourceCode::Energy => &mut self.delegated_frozen_for_energy,
        }
    }

    /// normal stake + witness stake
    pub fn total_stake(&self) -> u128 {
        self.stake.amount.saturating_add(self.witness_stake.amount)
    }

    pub fn asset_balance(&self, id: u64) -> u128 {
        self.assets.get(&id).copied().unwrap_or(0)
    }
}

// ============================================================
// WITNESS
// ============================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum WitnessStatus {
    Active,
    Supernode,
    Slashed,
    Resigned,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Witness {
    pub address: Address,
    pub owner_address: Address,
    pub vote_count: u64,
    pub url: String,
    pub status: WitnessStatus,
    /// Currently in the scheduled active set.
    pub is_jobs: bool,
    pub epoch_produced: u64,
    pub epoch_missed: u64,
    pub total_produced: u64,
    pub total_missed: u64,
    pub latest_block_num: u64,
    pub latest_slot_num: u64,
    /// Seeded at genesis; barred from withdrawing allowance.
    pub is_genesis: bool,
}

impl Witness {
    pub fn new(address: Address, url: String) -> Self {
        Self {
            address,
            owner_address: address,
            vote_count: 0,
            url,
            status: WitnessStatus::Active,
            is_jobs: false,
            epoch_produced: 0,
            epoch_missed: 0,
            total_produced: 0,
            total_missed: 0,
            latest_block_num: 0,
            latest_slot_num: 0,
            is_genesis: false,
        }
    }

    /// epochMissed / (epochMissed + epochProduced) in basis points.
    pub fn miss_rate_bps(&self) -> u64 {
        let total = self.epoch_missed.saturating_add(self.epoch_produced);
        if total == 0 {
            return 0;
        }
        ((self.epoch_missed as u128 * 10_000) / total as u128) as u64
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BannedWitness {
    pub address: Address,
    pub expiration_time: u64,
}

// ============================================================
// PENDING DELTAS (outbox, consumed at maintenance)
// ============================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteChange {
    pub address: Address,
    /// Vote as of the last tally.
    pub old_vote: Option<Vote>,
    pub new_vote: Option<Vote>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StakeChange {
    pub address: Address,
    pub old_stake: u128,
    pub new_stake: u128,
}

// ============================================================
// DELEGATION
// ============================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DelegatedResource {
    pub from: Address,
    pub to: Address,
    pub frozen_balance_for_bandwidth: u128,
    pub expire_time_for_bandwidth: u64,
    pub frozen_balance_for_energy: u128,
    pub expire_time_for_energy: u64,
}

impl DelegatedResource {
    pub fn new(from: Address, to: Address) -> Self {
        Self {
            from,
            to,
            frozen_balance_for_bandwidth: 0,
            expire_time_for_bandwidth: 0,
            frozen_balance_for_energy: 0,
            expire_time_for_energy: 0,
        }
    }

    pub fn balance(&self, resource: ResourceCode) -> u128 {
        match resource {
            ResourceCode::Bandwidth => self.frozen_balance_for_bandwidth,
            ResourceCode::Energy => self.frozen_balance_for_energy,
        }
    }

    pub fn expire_time(&self, resource: ResourceCode) -> u64 {
        match resource {
            ResourceCode::Bandwidth => self.expire_time_for_bandwidth,
            ResourceCode::Energy => self.expire_time_for_energy,
        }
    }

    pub fn set(&mut self, resource: ResourceCode, balance: u128, expire_time: u64) {
        match resource {
            ResourceCode::Bandwidth => {
                self.frozen_balance_for_bandwidth = balance;
                self.expire_time_for_bandwidth = expire_time;
            }
            ResourceCode::Energy => {
                self.frozen_balance_for_energy = balance;
                self.expire_time_for_energy = expire_time;
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.frozen_balance_for_bandwidth == 0 && self.frozen_balance_for_energy == 0
    }
}

// ============================================================
// GOVERNANCE
// ============================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProposalState {
    Pending,
    Approved,
    Disapproved,
    Canceled,
}

impl ProposalState {
    /// Resolved by a maintenance run.
    pub fn is_processed(&self) -> bool {
        matches!(self, ProposalState::Approved | ProposalState::Disapproved)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Proposal {
    pub id: u64,
    pub proposer: Address,
    /// parameter id → value
    pub parameters: BTreeMap<u64, i64>,
    pub approvals: BTreeSet<Address>,
    pub create_time: u64,
    pub expiration_time: u64,
    pub state: ProposalState,
}

impl Proposal {
    pub fn has_expired(&self, now: u64) -> bool {
        now >= self.expiration_time
    }
}

// ============================================================
// ASSETS & CONTRACTS
// ============================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssetIssue {
    pub id: u64,
    pub owner: Address,
    pub name: Vec<u8>,
    pub abbr: Vec<u8>,
    pub total_supply: u128,
    pub precision: u32,
    /// Tokens received per `trx_num` units of native balance: `num / trx_num`.
    pub trx_num: u64,
    pub num: u64,
    pub start_time: u64,
    pub end_time: u64,
    pub description: Vec<u8>,
    pub url: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SmartContract {
    pub address: Address,
    pub origin: Address,
    pub name: String,
    pub bytecode: Vec<u8>,
    pub abi: Vec<u8>,
    /// Share (0..=100) of call energy charged to the caller.
    pub consume_user_resource_percent: u64,
    pub origin_energy_limit: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_miss_rate_bps() {
        let mut w = Witness::new(Address([1; 20]), "u".into());
        assert_eq!(w.miss_rate_bps(), 0);
        w.epoch_missed = 3;
        w.epoch_produced = 1;
        assert_eq!(w.miss_rate_bps(), 7_500);
    }

    #[test]
    fn test_permission_operations_bitmap() {
        let p = Permission::default_active(Address([1; 20]));
        assert!(p.allows(1));
        assert!(p.allows(52));
        let mut q = p.clone();
        q.operations = vec![0b0000_0010];
        assert!(q.allows(1));
        assert!(!q.allows(0));
        assert!(!q.allows(31));
    }

    #[test]
    fn test_delegated_resource_empty() {
        let mut d = DelegatedResource::new(Address([1; 20]), Address([2; 20]));
        assert!(d.is_empty());
        d.set(ResourceCode::Energy, 5, 10);
        assert!(!d.is_empty());
        assert_eq!(d.balance(ResourceCode::Energy), 5);
        assert_eq!(d.expire_time(ResourceCode::Energy), 10);
    }
}
