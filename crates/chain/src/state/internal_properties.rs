//! DynamicProperties: konfigurasi chain yang hidup di ledger store.
//!
//! Diisi dari `ChainConfig` saat genesis. Setelah itu hanya governance
//! (parameter proposal) dan maintenance yang boleh mengubahnya. Semua komponen
//! membaca nilai dari sini, bukan dari file config.

use serde::{Deserialize, Serialize};

use dpos_common::config::{parse_address, ChainConfig, ConfigError};

use super::ChainState;
use crate::error::{StoreError, StoreResult};
use crate::store::Table;
use crate::types::{Address, Hash};

/// Key of the DynamicProperties record in `Table::Properties`.
pub const PROPERTIES_KEY: &[u8] = b"dynamic";
/// Key of the ordered active witness list in `Table::Properties`.
pub const ACTIVE_WITNESSES_KEY: &[u8] = b"active_witnesses";
/// Genesis witness vote counts, kept for `remove_the_power_of_the_gr`.
pub const GENESIS_VOTES_KEY: &[u8] = b"genesis_votes";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StakeTier {
    pub amount: u128,
    pub power: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DynamicProperties {
    // ── fixed at genesis ────────────────────────────────────
    pub genesis_timestamp: u64,
    pub block_interval_ms: u64,
    pub max_active_witnesses: usize,
    pub single_repeat: u64,
    pub proposal_expire_time_ms: u64,
    pub proposal_approval_percent: u64,
    pub blackhole: Address,
    pub witness_stake_amount: u128,
    pub stake_lock_duration_ms: u64,
    pub witness_resign_cooldown_ms: u64,
    pub witness_withdraw_cooldown_ms: u64,
    pub min_frozen_days: u64,
    pub max_frozen_days: u64,
    pub min_frozen_amount: u128,
    pub stake_tiers: Vec<StakeTier>,
    pub miss_rate_threshold_bps: u64,
    pub minor_penalty_epochs: u64,
    pub major_penalty_epochs: u64,

    // ── governed (parameter ids 0..=23) ─────────────────────
    pub maintenance_time_interval: i64,
    pub account_upgrade_cost: i64,
    pub create_account_fee: i64,
    pub transaction_fee: i64,
    pub asset_issue_fee: i64,
    pub witness_pay_per_block: i64,
    pub witness_standby_allowance: i64,
    pub create_new_account_fee_in_system_contract: i64,
    pub create_new_account_bandwidth_rate: i64,
    pub allow_creation_of_contracts: i64,
    /// 0 = not requested, 1 = approved and pending, -1 = spent
    pub remove_the_power_of_the_gr: i64,
    pub energy_fee: i64,
    pub exchange_create_fee: i64,
    pub max_cpu_time_of_one_tx: i64,
    pub allow_update_account_name: i64,
    pub allow_same_token_name: i64,
    pub allow_delegate_resource: i64,
    pub total_energy_limit: i64,
    pub allow_tvm_transfer_trc10: i64,
    pub total_current_energy_limit: i64,
    pub allow_multi_sign: i64,
    pub allow_adaptive_energy: i64,
    pub update_account_permission_fee: i64,
    pub multi_sign_fee: i64,

    // ── running counters ────────────────────────────────────
    pub latest_block_num: u64,
    pub latest_block_hash: Hash,
    pub latest_block_timestamp: u64,
    pub next_maintenance_time: u64,
    pub latest_proposal_num: u64,
    pub latest_asset_id: u64,
    pub total_bandwidth_weight: u128,
    pub total_energy_weight: u128,
    pub total_network_stake: u128,
    pub epoch: u64,
}

/// Governed values are validated non-negative; clamp for fee arithmetic.
pub fn as_amount(v: i64) -> u128 {
    if v < 0 { 0 } else { v as u128 }
}

impl DynamicProperties {
    pub fn from_config(cfg: &ChainConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let c = &cfg.chain;
        let e = &cfg.economy;
        let p = &cfg.penalty;
        let f = &cfg.fees;
        let ft = &cfg.features;
        Ok(Self {
            genesis_timestamp: c.genesis_timestamp,
            block_interval_ms: c.block_interval_ms,
            max_active_witnesses: c.max_active_witnesses,
            single_repeat: c.single_repeat,
            proposal_expire_time_ms: c.proposal_expire_time_ms,
            proposal_approval_percent: c.proposal_approval_percent,
            blackhole: Address(parse_address(&c.blackhole_address)?),
            witness_stake_amount: e.witness_stake_amount,
            stake_lock_duration_ms: e.stake_lock_duration_ms,
            witness_resign_cooldown_ms: e.witness_resign_cooldown_ms,
            witness_withdraw_cooldown_ms: e.witness_withdraw_cooldown_ms,
            min_frozen_days: e.min_frozen_days,
            max_frozen_days: e.max_frozen_days,
            min_frozen_amount: e.min_frozen_amount,
            stake_tiers: e
                .stake_tiers
                .iter()
                .map(|t| StakeTier { amount: t.amount, power: t.power })
                .collect(),
            miss_rate_threshold_bps: p.miss_rate_threshold_bps,
            minor_penalty_epochs: p.minor_penalty_epochs,
            major_penalty_epochs: p.major_penalty_epochs,

            maintenance_time_interval: c.maintenance_interval_ms as i64,
            account_upgrade_cost: f.account_upgrade_cost,
            create_account_fee: f.create_account_fee,
            transaction_fee: f.transaction_fee,
            asset_issue_fee: f.asset_issue_fee,
            witness_pay_per_block: f.witness_pay_per_block,
            witness_standby_allowance: f.witness_standby_allowance,
            create_new_account_fee_in_system_contract: f.create_new_account_fee_in_system_contract,
            create_new_account_bandwidth_rate: 1,
            allow_creation_of_contracts: ft.allow_creation_of_contracts,
            remove_the_power_of_the_gr: 0,
            energy_fee: f.energy_fee,
            exchange_create_fee: f.exchange_create_fee,
            max_cpu_time_of_one_tx: ft.max_cpu_time_of_one_tx,
            allow_update_account_name: ft.allow_update_account_name,
            allow_same_token_name: ft.allow_same_token_name,
            allow_delegate_resource: ft.allow_delegate_resource,
            total_energy_limit: ft.total_energy_limit,
            allow_tvm_transfer_trc10: ft.allow_tvm_transfer_trc10,
            total_current_energy_limit: ft.total_energy_limit,
            allow_multi_sign: ft.allow_multi_sign,
            allow_adaptive_energy: ft.allow_adaptive_energy,
            update_account_permission_fee: f.update_account_permission_fee,
            multi_sign_fee: f.multi_sign_fee,

            latest_block_num: 0,
            latest_block_hash: Hash::default(),
            latest_block_timestamp: c.genesis_timestamp,
            next_maintenance_time: c.genesis_timestamp.saturating_add(c.maintenance_interval_ms),
            latest_proposal_num: 0,
            latest_asset_id: 0,
            total_bandwidth_weight: 0,
            total_energy_weight: 0,
            total_network_stake: 0,
            epoch: 0,
        })
    }

    pub fn maintenance_interval(&self) -> u64 {
        self.maintenance_time_interval.max(1) as u64
    }

    /// Power of the highest tier `total_stake` qualifies for, else 0.
    pub fn voting_power(&self, total_stake: u128) -> u64 {
        self.stake_tiers
            .iter()
            .take_while(|t| t.amount <= total_stake)
            .last()
            .map(|t| t.power)
            .unwrap_or(0)
    }

    /// Absolute slot index of `timestamp` since genesis.
    pub fn absolute_slot(&self, timestamp: u64) -> u64 {
        timestamp.saturating_sub(self.genesis_timestamp) / self.block_interval_ms.max(1)
    }

    pub fn head_slot(&self) -> u64 {
        self.absolute_slot(self.latest_block_timestamp)
    }

    pub fn frozen_duration_ok(&self, days: u64) -> bool {
        days >= self.min_frozen_days && days <= self.max_frozen_days
    }
}

// ════════════════════════════════════════════════════════════════════════════
// CHAINSTATE ACCESSORS
// ════════════════════════════════════════════════════════════════════════════

impl<'a> ChainState<'a> {
    pub fn properties(&self) -> StoreResult<DynamicProperties> {
        self.read(Table::Properties, PROPERTIES_KEY)?
            .ok_or_else(|| StoreError::Corrupted {
                table: Table::Properties.name(),
                reason: "dynamic properties missing (genesis not applied?)".to_string(),
            })
    }

    pub fn has_properties(&self) -> StoreResult<bool> {
        self.store().has(Table::Properties, PROPERTIES_KEY)
    }

    pub fn put_properties(&mut self, props: &DynamicProperties) -> StoreResult<()> {
        self.write(Table::Properties, PROPERTIES_KEY, props)
    }

    /// Read, mutate, write back.
    pub fn update_properties<F>(&mut self, f: F) -> StoreResult<DynamicProperties>
    where
        F: FnOnce(&mut DynamicProperties),
    {
        let mut props = self.properties()?;
        f(&mut props);
        self.put_properties(&props)?;
        Ok(props)
    }

    /// Ordered active witness list used by the scheduler.
    pub fn active_witnesses(&self) -> StoreResult<Vec<Address>> {
        Ok(self.read(Table::Properties, ACTIVE_WITNESSES_KEY)?.unwrap_or_default())
    }

    pub fn set_active_witnesses(&mut self, list: &[Address]) -> StoreResult<()> {
        self.write(Table::Properties, ACTIVE_WITNESSES_KEY, &list.to_vec())
    }

    pub fn genesis_votes(&self) -> StoreResult<Vec<(Address, u64)>> {
        Ok(self.read(Table::Properties, GENESIS_VOTES_KEY)?.unwrap_or_default())
    }

    pub fn set_genesis_votes(&mut self, votes: &[(Address, u64)]) -> StoreResult<()> {
        self.write(Table::Properties, GENESIS_VOTES_KEY, &votes.to_vec())
    }
}
