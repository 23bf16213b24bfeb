//! Chain configuration loader using TOML and serde.
//!
//! Semua nilai di sini hanya dipakai saat genesis. Nilai yang boleh diubah oleh
//! governance disalin ke record `DynamicProperties` di ledger store, sehingga
//! setelah genesis sumber kebenaran adalah store, bukan file config.
//!
//! ```text
//! [chain]      interval, slot, proposal lifetime, blackhole
//! [economy]    witness stake, lock durations, stake tiers
//! [penalty]    miss-rate threshold, ban lengths
//! [fees]       initial governed fee values
//! [features]   initial governed feature switches
//! [genesis]    accounts + witnesses
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::crypto::decode_hex;

/// One unit of the native token in its smallest denomination (6 decimals).
pub const ONE_UNIT: u128 = 1_000_000;

/// Milliseconds in one day, used by freeze / lock durations.
pub const DAY_MS: u64 = 86_400_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChainSection {
    /// Timestamp (ms) of slot 0.
    pub genesis_timestamp: u64,
    /// Block interval (ms).
    pub block_interval_ms: u64,
    /// Epoch length (ms); governed by parameter 0 after genesis.
    pub maintenance_interval_ms: u64,
    pub max_active_witnesses: usize,
    /// Consecutive slots given to one witness before the schedule advances.
    pub single_repeat: u64,
    /// Lifetime of a proposal before it is resolved (ms).
    pub proposal_expire_time_ms: u64,
    /// Percentage of the active set whose approval passes a proposal.
    pub proposal_approval_percent: u64,
    /// Burn address (hex, 20 bytes).
    pub blackhole_address: String,
}

impl Default for ChainSection {
    fn default() -> Self {
        Self {
            genesis_timestamp: 0,
            block_interval_ms: 3_000,
            maintenance_interval_ms: 6 * 3_600 * 1_000,
            max_active_witnesses: 27,
            single_repeat: 1,
            proposal_expire_time_ms: 3 * DAY_MS,
            proposal_approval_percent: 70,
            blackhole_address: "0x000000000000000000000000000000000000dead".to_string(),
        }
    }
}

/// One row of the stake → voting-power tier table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StakeTierConfig {
    pub amount: u128,
    pub power: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EconomySection {
    /// Normal stake converted into witness stake on registration.
    pub witness_stake_amount: u128,
    /// Lock applied to normal stake before it can be unstaked (ms).
    pub stake_lock_duration_ms: u64,
    /// Lock applied to witness stake returned on resignation (ms).
    pub witness_resign_cooldown_ms: u64,
    /// Minimum gap between two allowance withdrawals (ms).
    pub witness_withdraw_cooldown_ms: u64,
    pub min_frozen_days: u64,
    pub max_frozen_days: u64,
    /// Minimum amount accepted by a freeze.
    pub min_frozen_amount: u128,
    pub stake_tiers: Vec<StakeTierConfig>,
}

impl Default for EconomySection {
    fn default() -> Self {
        Self {
            witness_stake_amount: 10_000 * ONE_UNIT,
            stake_lock_duration_ms: 3 * DAY_MS,
            witness_resign_cooldown_ms: 7 * DAY_MS,
            witness_withdraw_cooldown_ms: DAY_MS,
            min_frozen_days: 3,
            max_frozen_days: 3,
            min_frozen_amount: ONE_UNIT,
            stake_tiers: vec![
                StakeTierConfig { amount: 1_000 * ONE_UNIT, power: 1_000 },
                StakeTierConfig { amount: 10_000 * ONE_UNIT, power: 11_000 },
                StakeTierConfig { amount: 100_000 * ONE_UNIT, power: 120_000 },
                StakeTierConfig { amount: 1_000_000 * ONE_UNIT, power: 1_300_000 },
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PenaltySection {
    /// Miss-rate threshold in basis points (10_000 = 100%).
    pub miss_rate_threshold_bps: u64,
    /// Ban length in epochs for witnesses elected at the time of slashing.
    pub minor_penalty_epochs: u64,
    /// Ban length in epochs for everyone else.
    pub major_penalty_epochs: u64,
}

impl Default for PenaltySection {
    fn default() -> Self {
        Self {
            miss_rate_threshold_bps: 5_000,
            minor_penalty_epochs: 1,
            major_penalty_epochs: 4,
        }
    }
}

/// Initial values of the governed fee parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FeeSection {
    pub transaction_fee: i64,
    pub account_upgrade_cost: i64,
    pub create_account_fee: i64,
    pub create_new_account_fee_in_system_contract: i64,
    pub asset_issue_fee: i64,
    pub witness_pay_per_block: i64,
    pub witness_standby_allowance: i64,
    pub update_account_permission_fee: i64,
    pub multi_sign_fee: i64,
    pub energy_fee: i64,
    pub exchange_create_fee: i64,
}

impl Default for FeeSection {
    fn default() -> Self {
        Self {
            transaction_fee: 1_000,
            account_upgrade_cost: 9_999_000_000,
            create_account_fee: 100_000,
            create_new_account_fee_in_system_contract: 1_000_000,
            asset_issue_fee: 1_024_000_000,
            witness_pay_per_block: 32_000_000,
            witness_standby_allowance: 115_200_000_000,
            update_account_permission_fee: 100_000_000,
            multi_sign_fee: 1_000_000,
            energy_fee: 100,
            exchange_create_fee: 1_024_000_000,
        }
    }
}

/// Initial values of the governed feature switches (0 = off, 1 = on).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FeatureSection {
    pub allow_creation_of_contracts: i64,
    pub allow_update_account_name: i64,
    pub allow_same_token_name: i64,
    pub allow_delegate_resource: i64,
    pub allow_tvm_transfer_trc10: i64,
    pub allow_multi_sign: i64,
    pub allow_adaptive_energy: i64,
    pub max_cpu_time_of_one_tx: i64,
    pub total_energy_limit: i64,
}

impl Default for FeatureSection {
    fn default() -> Self {
        Self {
            allow_creation_of_contracts: 0,
            allow_update_account_name: 0,
            allow_same_token_name: 0,
            allow_delegate_resource: 0,
            allow_tvm_transfer_trc10: 0,
            allow_multi_sign: 0,
            allow_adaptive_energy: 0,
            max_cpu_time_of_one_tx: 50,
            total_energy_limit: 50_000_000_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenesisAccount {
    pub address: String,
    pub balance: u128,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenesisWitness {
    pub address: String,
    pub url: String,
    pub vote_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct GenesisSection {
    pub accounts: Vec<GenesisAccount>,
    pub witnesses: Vec<GenesisWitness>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct ChainConfig {
    pub chain: ChainSection,
    pub economy: EconomySection,
    pub penalty: PenaltySection,
    pub fees: FeeSection,
    pub features: FeatureSection,
    pub genesis: GenesisSection,
}

impl ChainConfig {
    /// Check cross-field invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.chain;
        if c.block_interval_ms == 0 {
            return Err(invalid("chain.block_interval_ms", "must be positive"));
        }
        if c.maintenance_interval_ms < c.block_interval_ms {
            return Err(invalid(
                "chain.maintenance_interval_ms",
                "must not be shorter than one block interval",
            ));
        }
        if c.max_active_witnesses == 0 {
            return Err(invalid("chain.max_active_witnesses", "must be positive"));
        }
        if c.single_repeat == 0 {
            return Err(invalid("chain.single_repeat", "must be positive"));
        }
        if c.proposal_approval_percent == 0 || c.proposal_approval_percent > 100 {
            return Err(invalid("chain.proposal_approval_percent", "must be in 1..=100"));
        }
        parse_address(&c.blackhole_address)
            .map_err(|e| invalid("chain.blackhole_address", e.to_string()))?;

        let e = &self.economy;
        if e.min_frozen_days == 0 || e.min_frozen_days > e.max_frozen_days {
            return Err(invalid(
                "economy.min_frozen_days",
                "must be positive and not above max_frozen_days",
            ));
        }
        for pair in e.stake_tiers.windows(2) {
            if pair[1].amount <= pair[0].amount || pair[1].power <= pair[0].power {
                return Err(invalid(
                    "economy.stake_tiers",
                    "amounts and powers must be strictly increasing",
                ));
            }
        }

        let fees = &self.fees;
        for (field, v) in [
            ("fees.transaction_fee", fees.transaction_fee),
            ("fees.account_upgrade_cost", fees.account_upgrade_cost),
            ("fees.create_account_fee", fees.create_account_fee),
            ("fees.create_new_account_fee_in_system_contract", fees.create_new_account_fee_in_system_contract),
            ("fees.asset_issue_fee", fees.asset_issue_fee),
            ("fees.witness_pay_per_block", fees.witness_pay_per_block),
            ("fees.witness_standby_allowance", fees.witness_standby_allowance),
            ("fees.update_account_permission_fee", fees.update_account_permission_fee),
            ("fees.multi_sign_fee", fees.multi_sign_fee),
            ("fees.energy_fee", fees.energy_fee),
            ("fees.exchange_create_fee", fees.exchange_create_fee),
        ] {
            if v < 0 {
                return Err(invalid(field, "must not be negative"));
            }
        }

        let f = &self.features;
        for (field, v) in [
            ("features.allow_creation_of_contracts", f.allow_creation_of_contracts),
            ("features.allow_update_account_name", f.allow_update_account_name),
            ("features.allow_same_token_name", f.allow_same_token_name),
            ("features.allow_delegate_resource", f.allow_delegate_resource),
            ("features.allow_tvm_transfer_trc10", f.allow_tvm_transfer_trc10),
            ("features.allow_multi_sign", f.allow_multi_sign),
            ("features.allow_adaptive_energy", f.allow_adaptive_energy),
        ] {
            if v != 0 && v != 1 {
                return Err(invalid(field, "must be 0 or 1"));
            }
        }

        if self.penalty.miss_rate_threshold_bps > 10_000 {
            return Err(invalid("penalty.miss_rate_threshold_bps", "must be <= 10000"));
        }
        if self.penalty.minor_penalty_epochs > self.penalty.major_penalty_epochs {
            return Err(invalid(
                "penalty.minor_penalty_epochs",
                "must not exceed penalty.major_penalty_epochs",
            ));
        }

        for acct in &self.genesis.accounts {
            parse_address(&acct.address)
                .map_err(|e| invalid("genesis.accounts.address", e.to_string()))?;
        }
        for w in &self.genesis.witnesses {
            parse_address(&w.address)
                .map_err(|e| invalid("genesis.witnesses.address", e.to_string()))?;
        }
        Ok(())
    }
}

/// Parse a 20-byte hex address (optional `0x` prefix).
pub fn parse_address(s: &str) -> Result<[u8; 20], ConfigError> {
    let bytes = decode_hex(s).map_err(|e| invalid("address", e.to_string()))?;
    if bytes.len() != 20 {
        return Err(invalid("address", format!("invalid address length: {}", bytes.len())));
    }
    let mut arr = [0u8; 20];
    arr.copy_from_slice(&bytes);
    Ok(arr)
}

/// Load config from a TOML file path and validate it.
pub fn load_from_file(path: impl AsRef<Path>) -> Result<ChainConfig, ConfigError> {
    let s = fs::read_to_string(path.as_ref())?;
    load_from_str(&s)
}

/// Parse config from a TOML string and validate it.
pub fn load_from_str(s: &str) -> Result<ChainConfig, ConfigError> {
    let cfg: ChainConfig = toml::from_str(s)?;
    cfg.validate()?;
    Ok(cfg)
}
