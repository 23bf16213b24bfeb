//! # Chain Parameters (governance table)
//!
//! Tabel tetap parameter yang boleh diubah lewat proposal. Setiap id stabil
//! memetakan ke tepat satu field `DynamicProperties` dan punya predikat nilai
//! sendiri. Id yang tidak dikenal ditolak.
//!
//! | id | parameter | nilai legal |
//! |----|-----------|-------------|
//! | 0 | maintenance_time_interval | 3·27·1000 ..= 24·3600·1000 ms |
//! | 1–8, 11, 12, 17, 19, 22, 23 | fee / limit | ≥ 0 |
//! | 9, 14, 15, 16, 20, 21 | feature switch | 1 (one-way) |
//! | 10 | remove_the_power_of_the_gr | 1, hanya jika belum pernah dipakai |
//! | 13 | max_cpu_time_of_one_tx | 10 ..= 100 |
//! | 18 | allow_tvm_transfer_trc10 | 1, butuh id 15 aktif |
//!
//! Feature switch bersifat **one-way**: apply hanya men-set flag jika belum
//! aktif, sehingga tidak bisa dimatikan lagi.

use crate::error::ValidationError;
use crate::state::DynamicProperties;

pub const MIN_MAINTENANCE_INTERVAL_MS: i64 = 3 * 27 * 1000;
pub const MAX_MAINTENANCE_INTERVAL_MS: i64 = 24 * 3600 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainParameter {
    MaintenanceTimeInterval,
    AccountUpgradeCost,
    CreateAccountFee,
    TransactionFee,
    AssetIssueFee,
    WitnessPayPerBlock,
    WitnessStandbyAllowance,
    CreateNewAccountFeeInSystemContract,
    CreateNewAccountBandwidthRate,
    AllowCreationOfContracts,
    RemoveThePowerOfTheGr,
    EnergyFee,
    ExchangeCreateFee,
    MaxCpuTimeOfOneTx,
    AllowUpdateAccountName,
    AllowSameTokenName,
    AllowDelegateResource,
    TotalEnergyLimit,
    AllowTvmTransferTrc10,
    TotalCurrentEnergyLimit,
    AllowMultiSign,
    AllowAdaptiveEnergy,
    UpdateAccountPermissionFee,
    MultiSignFee,
}

impl ChainParameter {
    pub const ALL: [ChainParameter; 24] = [
        ChainParameter::MaintenanceTimeInterval,
        ChainParameter::AccountUpgradeCost,
        ChainParameter::CreateAccountFee,
        ChainParameter::TransactionFee,
        ChainParameter::AssetIssueFee,
        ChainParameter::WitnessPayPerBlock,
        ChainParameter::WitnessStandbyAllowance,
        ChainParameter::CreateNewAccountFeeInSystemContract,
        ChainParameter::CreateNewAccountBandwidthRate,
        ChainParameter::AllowCreationOfContracts,
        ChainParameter::RemoveThePowerOfTheGr,
        ChainParameter::EnergyFee,
        ChainParameter::ExchangeCreateFee,
        ChainParameter::MaxCpuTimeOfOneTx,
        ChainParameter::AllowUpdateAccountName,
        ChainParameter::AllowSameTokenName,
        ChainParameter::AllowDelegateResource,
        ChainParameter::TotalEnergyLimit,
        ChainParameter::AllowTvmTransferTrc10,
        ChainParameter::TotalCurrentEnergyLimit,
        ChainParameter::AllowMultiSign,
        ChainParameter::AllowAdaptiveEnergy,
        ChainParameter::UpdateAccountPermissionFee,
        ChainParameter::MultiSignFee,
    ];

    pub fn from_id(id: u64) -> Option<Self> {
        Self::ALL.get(usize::try_from(id).ok()?).copied()
    }

    pub fn id(&self) -> u64 {
        *self as u64
    }

    pub fn name(&self) -> &'static str {
        match self {
            ChainParameter::MaintenanceTimeInterval => "maintenance_time_interval",
            ChainParameter::AccountUpgradeCost => "account_upgrade_cost",
            ChainParameter::CreateAccountFee => "create_account_fee",
            ChainParameter::TransactionFee => "transaction_fee",
            ChainParameter::AssetIssueFee => "asset_issue_fee",
            ChainParameter::WitnessPayPerBlock => "witness_pay_per_block",
            ChainParameter::WitnessStandbyAllowance => "witness_standby_allowance",
            ChainParameter::CreateNewAccountFeeInSystemContract => "create_new_account_fee_in_system_contract",
            ChainParameter::CreateNewAccountBandwidthRate => "create_new_account_bandwidth_rate",
            ChainParameter::AllowCreationOfContracts => "allow_creation_of_contracts",
            ChainParameter::RemoveThePowerOfTheGr => "remove_the_power_of_the_gr",
            ChainParameter::EnergyFee => "energy_fee",
            ChainParameter::ExchangeCreateFee => "exchange_create_fee",
            ChainParameter::MaxCpuTimeOfOneTx => "max_cpu_time_of_one_tx",
            ChainParameter::AllowUpdateAccountName => "allow_update_account_name",
            ChainParameter::AllowSameTokenName => "allow_same_token_name",
            ChainParameter::AllowDelegateResource => "allow_delegate_resource",
            ChainParameter::TotalEnergyLimit => "total_energy_limit",
            ChainParameter::AllowTvmTransferTrc10 => "allow_tvm_transfer_trc10",
            ChainParameter::TotalCurrentEnergyLimit => "total_current_energy_limit",
            ChainParameter::AllowMultiSign => "allow_multi_sign",
            ChainParameter::AllowAdaptiveEnergy => "allow_adaptive_energy",
            ChainParameter::UpdateAccountPermissionFee => "update_account_permission_fee",
            ChainParameter::MultiSignFee => "multi_sign_fee",
        }
    }

    fn is_one_way_flag(&self) -> bool {
        matches!(
            self,
            ChainParameter::AllowCreationOfContracts
                | ChainParameter::AllowUpdateAccountName
                | ChainParameter::AllowSameTokenName
                | ChainParameter::AllowDelegateResource
                | ChainParameter::AllowTvmTransferTrc10
                | ChainParameter::AllowMultiSign
                | ChainParameter::AllowAdaptiveEnergy
        )
    }

    fn slot<'p>(&self, props: &'p mut DynamicProperties) -> &'p mut i64 {
        match self {
            ChainParameter::MaintenanceTimeInterval => &mut props.maintenance_time_interval,
            ChainParameter::AccountUpgradeCost => &mut props.account_upgrade_cost,
            ChainParameter::CreateAccountFee => &mut props.create_account_fee,
            ChainParameter::TransactionFee => &mut props.transaction_fee,
            ChainParameter::AssetIssueFee => &mut props.asset_issue_fee,
            ChainParameter::WitnessPayPerBlock => &mut props.witness_pay_per_block,
            ChainParameter::WitnessStandbyAllowance => &mut props.witness_standby_allowance,
            ChainParameter::CreateNewAccountFeeInSystemContract => {
                &mut props.create_new_account_fee_in_system_contract
            }
            ChainParameter::CreateNewAccountBandwidthRate => &mut props.create_new_account_bandwidth_rate,
            ChainParameter::AllowCreationOfContracts => &mut props.allow_creation_of_contracts,
            ChainParameter::RemoveThePowerOfTheGr => &mut props.remove_the_power_of_the_gr,
            ChainParameter::EnergyFee => &mut props.energy_fee,
            ChainParameter::ExchangeCreateFee => &mut props.exchange_create_fee,
            ChainParameter::MaxCpuTimeOfOneTx => &mut props.max_cpu_time_of_one_tx,
            ChainParameter::AllowUpdateAccountName => &mut props.allow_update_account_name,
            ChainParameter::AllowSameTokenName => &mut props.allow_same_token_name,
            ChainParameter::AllowDelegateResource => &mut props.allow_delegate_resource,
            ChainParameter::TotalEnergyLimit => &mut props.total_energy_limit,
            ChainParameter::AllowTvmTransferTrc10 => &mut props.allow_tvm_transfer_trc10,
            ChainParameter::TotalCurrentEnergyLimit => &mut props.total_current_energy_limit,
            ChainParameter::AllowMultiSign => &mut props.allow_multi_sign,
            ChainParameter::AllowAdaptiveEnergy => &mut props.allow_adaptive_energy,
            ChainParameter::UpdateAccountPermissionFee => &mut props.update_account_permission_fee,
            ChainParameter::MultiSignFee => &mut props.multi_sign_fee,
        }
    }

    /// Legal-value predicate, evaluated at proposal creation.
    pub fn validate(&self, value: i64, props: &DynamicProperties) -> Result<(), ValidationError> {
        let reject = |reason: &str| ValidationError::ParameterOutOfRange {
            id: self.id(),
            value,
            reason: reason.to_string(),
        };
        match self {
            ChainParameter::MaintenanceTimeInterval => {
                if !(MIN_MAINTENANCE_INTERVAL_MS..=MAX_MAINTENANCE_INTERVAL_MS).contains(&value) {
                    return Err(reject("must be in [81000, 86400000] ms"));
                }
            }
            ChainParameter::MaxCpuTimeOfOneTx => {
                if !(10..=100).contains(&value) {
                    return Err(reject("must be in [10, 100]"));
                }
            }
            ChainParameter::RemoveThePowerOfTheGr => {
                if props.remove_the_power_of_the_gr == -1 {
                    return Err(reject("already executed"));
                }
                if value != 1 {
                    return Err(reject("only 1 is allowed"));
                }
            }
            ChainParameter::AllowTvmTransferTrc10 => {
                if value != 1 {
                    return Err(reject("only 1 is allowed"));
                }
                if props.allow_same_token_name == 0 {
                    return Err(reject("requires allow_same_token_name"));
                }
            }
            p if p.is_one_way_flag() => {
                if value != 1 {
                    return Err(reject("only 1 is allowed"));
                }
            }
            _ => {
                if value < 0 {
                    return Err(reject("must not be negative"));
                }
            }
        }
        Ok(())
    }

    /// Write `value` into `props`. One-way flags only flip from 0 to 1, and
    /// `remove_the_power_of_the_gr` never leaves the spent state.
    pub fn apply(&self, value: i64, props: &mut DynamicProperties) {
        let one_way = self.is_one_way_flag();
        let is_gr = *self == ChainParameter::RemoveThePowerOfTheGr;
        let slot = self.slot(props);
        if one_way {
            if *slot == 0 {
                *slot = value;
            }
        } else if is_gr {
            if *slot == 0 {
                *slot = 1;
            }
        } else {
            *slot = value;
        }
    }

    pub fn current(&self, props: &DynamicProperties) -> i64 {
        let mut copy = props.clone();
        *self.slot(&mut copy)
    }
}
