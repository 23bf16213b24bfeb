//! transaction envelope, typed contract payloads and id helpers
//!
//! Setiap transaksi membawa tepat satu contract payload generik
//! (`ContractPayload { contract_type, version, data }`). `Contract::decode`
//! mengubahnya menjadi record bertipe; type id yang tidak dikenal, versi yang
//! tidak didukung, atau bytes yang tidak cocok dengan tipe yang dideklarasikan
//! adalah `ValidationError`, bukan crash.

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::crypto::sha3_256_bytes;
use crate::error::ValidationError;
use crate::state::{Permission, ResourceCode};
use crate::types::{Address, Hash};

/// Only payload version currently understood.
pub const CONTRACT_VERSION: u8 = 1;

// ════════════════════════════════════════════════════════════════════════════
// CONTRACT TYPE IDS (stable)
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContractType {
    AccountCreate,
    Transfer,
    TransferAsset,
    VoteWitness,
    WitnessCreate,
    AssetIssue,
    WitnessUpdate,
    ParticipateAssetIssue,
    AccountUpdate,
    FreezeBalance,
    UnfreezeBalance,
    WithdrawBalance,
    UpdateAsset,
    ProposalCreate,
    ProposalApprove,
    ProposalDelete,
    SetAccountId,
    CreateSmartContract,
    TriggerSmartContract,
    ExchangeCreate,
    ExchangeInject,
    ExchangeWithdraw,
    ExchangeTransaction,
    AccountPermissionUpdate,
    Stake,
    Unstake,
    WitnessResign,
}

impl ContractType {
    pub fn id(&self) -> u32 {
        match self {
            ContractType::AccountCreate => 0,
            ContractType::Transfer => 1,
            ContractType::TransferAsset => 2,
            ContractType::VoteWitness => 4,
            ContractType::WitnessCreate => 5,
            ContractType::AssetIssue => 6,
            ContractType::WitnessUpdate => 8,
            ContractType::ParticipateAssetIssue => 9,
            ContractType::AccountUpdate => 10,
            ContractType::FreezeBalance => 11,
            ContractType::UnfreezeBalance => 12,
            ContractType::WithdrawBalance => 13,
            ContractType::UpdateAsset => 15,
            ContractType::ProposalCreate => 16,
            ContractType::ProposalApprove => 17,
            ContractType::ProposalDelete => 18,
            ContractType::SetAccountId => 19,
            ContractType::CreateSmartContract => 30,
            ContractType::TriggerSmartContract => 31,
            ContractType::ExchangeCreate => 41,
            ContractType::ExchangeInject => 42,
            ContractType::ExchangeWithdraw => 43,
            ContractType::ExchangeTransaction => 44,
            ContractType::AccountPermissionUpdate => 46,
            ContractType::Stake => 50,
            ContractType::Unstake => 51,
            ContractType::WitnessResign => 52,
        }
    }

    pub fn from_id(id: u32) -> Option<Self> {
        let t = match id {
            0 => ContractType::AccountCreate,
            1 => ContractType::Transfer,
            2 => ContractType::TransferAsset,
            4 => ContractType::VoteWitness,
            5 => ContractType::WitnessCreate,
            6 => ContractType::AssetIssue,
            8 => ContractType::WitnessUpdate,
            9 => ContractType::ParticipateAssetIssue,
            10 => ContractType::AccountUpdate,
            11 => ContractType::FreezeBalance,
            12 => ContractType::UnfreezeBalance,
            13 => ContractType::WithdrawBalance,
            15 => ContractType::UpdateAsset,
            16 => ContractType::ProposalCreate,
            17 => ContractType::ProposalApprove,
            18 => ContractType::ProposalDelete,
            19 => ContractType::SetAccountId,
            30 => ContractType::CreateSmartContract,
            31 => ContractType::TriggerSmartContract,
            41 => ContractType::ExchangeCreate,
            42 => ContractType::ExchangeInject,
            43 => ContractType::ExchangeWithdraw,
            44 => ContractType::ExchangeTransaction,
            46 => ContractType::AccountPermissionUpdate,
            50 => ContractType::Stake,
            51 => ContractType::Unstake,
            52 => ContractType::WitnessResign,
            _ => return None,
        };
        Some(t)
    }

    /// Constant-product exchange family; recognised but not executed here.
    pub fn is_exchange(&self) -> bool {
        matches!(
            self,
            ContractType::ExchangeCreate
                | ContractType::ExchangeInject
                | ContractType::ExchangeWithdraw
                | ContractType::ExchangeTransaction
        )
    }
}

// ════════════════════════════════════════════════════════════════════════════
// PAYLOAD RECORDS
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountCreateContract {
    pub owner: Address,
    pub account_address: Address,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransferContract {
    pub owner: Address,
    pub to: Address,
    pub amount: u128,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransferAssetContract {
    pub owner: Address,
    pub to: Address,
    pub asset_id: u64,
    pub amount: u128,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteWitnessContract {
    pub owner: Address,
    pub candidate: Address,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WitnessCreateContract {
    pub owner: Address,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WitnessUpdateContract {
    pub owner: Address,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WitnessResignContract {
    pub owner: Address,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssetIssueContract {
    pub owner: Address,
    pub name: Vec<u8>,
    pub abbr: Vec<u8>,
    pub total_supply: u128,
    pub precision: u32,
    pub trx_num: u64,
    pub num: u64,
    pub start_time: u64,
    pub end_time: u64,
    pub description: Vec<u8>,
    pub url: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParticipateAssetIssueContract {
    pub owner: Address,
    /// Issuer of the token.
    pub to: Address,
    pub asset_id: u64,
    /// Native amount paid.
    pub amount: u128,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateAssetContract {
    pub owner: Address,
    pub description: Vec<u8>,
    pub url: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountUpdateContract {
    pub owner: Address,
    pub account_name: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SetAccountIdContract {
    pub owner: Address,
    pub account_id: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FreezeBalanceContract {
    pub owner: Address,
    pub amount: u128,
    pub duration_days: u64,
    pub resource: ResourceCode,
    pub receiver: Option<Address>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnfreezeBalanceContract {
    pub owner: Address,
    pub resource: ResourceCode,
    pub receiver: Option<Address>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WithdrawBalanceContract {
    pub owner: Address,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StakeContract {
    pub owner: Address,
    pub amount: u128,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnstakeContract {
    pub owner: Address,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProposalCreateContract {
    pub owner: Address,
    pub parameters: BTreeMap<u64, i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProposalApproveContract {
    pub owner: Address,
    pub proposal_id: u64,
    /// true = add approval, false = withdraw it
    pub is_add_approval: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProposalDeleteContract {
    pub owner: Address,
    pub proposal_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountPermissionUpdateContract {
    pub owner: Address,
    pub owner_permission: Permission,
    pub witness_permission: Option<Permission>,
    pub actives: Vec<Permission>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateSmartContract {
    pub owner: Address,
    pub name: String,
    pub bytecode: Vec<u8>,
    pub abi: Vec<u8>,
    pub call_value: u128,
    pub consume_user_resource_percent: u64,
    pub origin_energy_limit: u64,
    pub fee_limit: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TriggerSmartContract {
    pub owner: Address,
    pub contract_address: Address,
    pub data: Vec<u8>,
    pub call_value: u128,
    pub fee_limit: u64,
}

// ════════════════════════════════════════════════════════════════════════════
// CONTRACT (closed tagged union)
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Contract {
    AccountCreate(AccountCreateContract),
    Transfer(TransferContract),
    TransferAsset(TransferAssetContract),
    VoteWitness(VoteWitnessContract),
    WitnessCreate(WitnessCreateContract),
    AssetIssue(AssetIssueContract),
    WitnessUpdate(WitnessUpdateContract),
    ParticipateAssetIssue(ParticipateAssetIssueContract),
    AccountUpdate(AccountUpdateContract),
    FreezeBalance(FreezeBalanceContract),
    UnfreezeBalance(UnfreezeBalanceContract),
    WithdrawBalance(WithdrawBalanceContract),
    UpdateAsset(UpdateAssetContract),
    ProposalCreate(ProposalCreateContract),
    ProposalApprove(ProposalApproveContract),
    ProposalDelete(ProposalDeleteContract),
    SetAccountId(SetAccountIdContract),
    CreateSmartContract(CreateSmartContract),
    TriggerSmartContract(TriggerSmartContract),
    AccountPermissionUpdate(AccountPermissionUpdateContract),
    Stake(StakeContract),
    Unstake(UnstakeContract),
    WitnessResign(WitnessResignContract),
}

/// Same fixint layout as `bincode::serialize`, but trailing bytes are an
/// error so one payload has exactly one encoding.
fn decode_as<T: DeserializeOwned>(data: &[u8], expected: &'static str) -> Result<T, ValidationError> {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
        .deserialize(data)
        .map_err(|e| ValidationError::PayloadMismatch {
        expected,
        reason: e.to_string(),
    })
}

impl Contract {
    pub fn decode(payload: &ContractPayload) -> Result<Contract, ValidationError> {
        let ty = ContractType::from_id(payload.contract_type)
            .ok_or(ValidationError::UnsupportedContract(payload.contract_type))?;
        if ty.is_exchange() {
            return Err(ValidationError::UnsupportedContract(payload.contract_type));
        }
        if payload.version != CONTRACT_VERSION {
            return Err(ValidationError::Rejected(format!(
                "unsupported contract version {}",
                payload.version
            )));
        }
        let d = &payload.data;
        let c = match ty {
            ContractType::AccountCreate => Contract::AccountCreate(decode_as(d, "AccountCreateContract")?),
            ContractType::Transfer => Contract::Transfer(decode_as(d, "TransferContract")?),
            ContractType::TransferAsset => Contract::TransferAsset(decode_as(d, "TransferAssetContract")?),
            ContractType::VoteWitness => Contract::VoteWitness(decode_as(d, "VoteWitnessContract")?),
            ContractType::WitnessCreate => Contract::WitnessCreate(decode_as(d, "WitnessCreateContract")?),
            ContractType::AssetIssue => Contract::AssetIssue(decode_as(d, "AssetIssueContract")?),
            ContractType::WitnessUpdate => Contract::WitnessUpdate(decode_as(d, "WitnessUpdateContract")?),
            ContractType::ParticipateAssetIssue => {
                Contract::ParticipateAssetIssue(decode_as(d, "ParticipateAssetIssueContract")?)
            }
            ContractType::AccountUpdate => Contract::AccountUpdate(decode_as(d, "AccountUpdateContract")?),
            ContractType::FreezeBalance => Contract::FreezeBalance(decode_as(d, "FreezeBalanceContract")?),
            ContractType::UnfreezeBalance => Contract::UnfreezeBalance(decode_as(d, "UnfreezeBalanceContract")?),
            ContractType::WithdrawBalance => Contract::WithdrawBalance(decode_as(d, "WithdrawBalanceContract")?),
            ContractType::UpdateAsset => Contract::UpdateAsset(decode_as(d, "UpdateAssetContract")?),
            ContractType::ProposalCreate => Contract::ProposalCreate(decode_as(d, "ProposalCreateContract")?),
            ContractType::ProposalApprove => Contract::ProposalApprove(decode_as(d, "ProposalApproveContract")?),
            ContractType::ProposalDelete => Contract::ProposalDelete(decode_as(d, "ProposalDeleteContract")?),
            ContractType::SetAccountId => Contract::SetAccountId(decode_as(d, "SetAccountIdContract")?),
            ContractType::CreateSmartContract => Contract::CreateSmartContract(decode_as(d, "CreateSmartContract")?),
            ContractType::TriggerSmartContract => {
                Contract::TriggerSmartContract(decode_as(d, "TriggerSmartContract")?)
            }
            ContractType::AccountPermissionUpdate => {
                Contract::AccountPermissionUpdate(decode_as(d, "AccountPermissionUpdateContract")?)
            }
            ContractType::Stake => Contract::Stake(decode_as(d, "StakeContract")?),
            ContractType::Unstake => Contract::Unstake(decode_as(d, "UnstakeContract")?),
            ContractType::WitnessResign => Contract::WitnessResign(decode_as(d, "WitnessResignContract")?),
            ContractType::ExchangeCreate
            | ContractType::ExchangeInject
            | ContractType::ExchangeWithdraw
            | ContractType::ExchangeTransaction => {
                return Err(ValidationError::UnsupportedContract(payload.contract_type))
            }
        };
        Ok(c)
    }

    pub fn contract_type(&self) -> ContractType {
        match self {
            Contract::AccountCreate(_) => ContractType::AccountCreate,
            Contract::Transfer(_) => ContractType::Transfer,
            Contract::TransferAsset(_) => ContractType::TransferAsset,
            Contract::VoteWitness(_) => ContractType::VoteWitness,
            Contract::WitnessCreate(_) => ContractType::WitnessCreate,
            Contract::AssetIssue(_) => ContractType::AssetIssue,
            Contract::WitnessUpdate(_) => ContractType::WitnessUpdate,
            Contract::ParticipateAssetIssue(_) => ContractType::ParticipateAssetIssue,
            Contract::AccountUpdate(_) => ContractType::AccountUpdate,
            Contract::FreezeBalance(_) => ContractType::FreezeBalance,
            Contract::UnfreezeBalance(_) => ContractType::UnfreezeBalance,
            Contract::WithdrawBalance(_) => ContractType::WithdrawBalance,
            Contract::UpdateAsset(_) => ContractType::UpdateAsset,
            Contract::ProposalCreate(_) => ContractType::ProposalCreate,
            Contract::ProposalApprove(_) => ContractType::ProposalApprove,
            Contract::ProposalDelete(_) => ContractType::ProposalDelete,
            Contract::SetAccountId(_) => ContractType::SetAccountId,
            Contract::CreateSmartContract(_) => ContractType::CreateSmartContract,
            Contract::TriggerSmartContract(_) => ContractType::TriggerSmartContract,
            Contract::AccountPermissionUpdate(_) => ContractType::AccountPermissionUpdate,
            Contract::Stake(_) => ContractType::Stake,
            Contract::Unstake(_) => ContractType::Unstake,
            Contract::WitnessResign(_) => ContractType::WitnessResign,
        }
    }

    /// Encode into the generic payload slot.
    pub fn encode(&self) -> ContractPayload {
        let data = match self {
            Contract::AccountCreate(c) => bincode::serialize(c),
            Contract::Transfer(c) => bincode::serialize(c),
            Contract::TransferAsset(c) => bincode::serialize(c),
            Contract::VoteWitness(c) => bincode::serialize(c),
            Contract::WitnessCreate(c) => bincode::serialize(c),
            Contract::AssetIssue(c) => bincode::serialize(c),
            Contract::WitnessUpdate(c) => bincode::serialize(c),
            Contract::ParticipateAssetIssue(c) => bincode::serialize(c),
            Contract::AccountUpdate(c) => bincode::serialize(c),
            Contract::FreezeBalance(c) => bincode::serialize(c),
            Contract::UnfreezeBalance(c) => bincode::serialize(c),
            Contract::WithdrawBalance(c) => bincode::serialize(c),
            Contract::UpdateAsset(c) => bincode::serialize(c),
            Contract::ProposalCreate(c) => bincode::serialize(c),
            Contract::ProposalApprove(c) => bincode::serialize(c),
            Contract::ProposalDelete(c) => bincode::serialize(c),
            Contract::SetAccountId(c) => bincode::serialize(c),
            Contract::CreateSmartContract(c) => bincode::serialize(c),
            Contract::TriggerSmartContract(c) => bincode::serialize(c),
            Contract::AccountPermissionUpdate(c) => bincode::serialize(c),
            Contract::Stake(c) => bincode::serialize(c),
            Contract::Unstake(c) => bincode::serialize(c),
            Contract::WitnessResign(c) => bincode::serialize(c),
        };
        ContractPayload {
            contract_type: self.contract_type().id(),
            version: CONTRACT_VERSION,
            // plain structs of owned fields; serialization cannot fail
            data: data.unwrap_or_default(),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// TRANSACTION
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContractPayload {
    pub contract_type: u32,
    pub version: u8,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    pub payload: ContractPayload,
    pub timestamp: u64,
    pub expiration: u64,
    /// Verified upstream; carried for permission accounting only.
    pub signatures: Vec<Vec<u8>>,
}

impl Transaction {
    pub fn new(contract: &Contract, timestamp: u64, expiration: u64) -> Self {
        Self {
            payload: contract.encode(),
            timestamp,
            expiration,
            signatures: Vec::new(),
        }
    }

    /// sha3-256 over (payload, timestamp, expiration); signatures excluded.
    pub fn tx_id(&self) -> Hash {
        let mut buf = Vec::with_capacity(self.payload.data.len() + 32);
        buf.extend_from_slice(&self.payload.contract_type.to_be_bytes());
        buf.push(self.payload.version);
        buf.extend_from_slice(&(self.payload.data.len() as u64).to_be_bytes());
        buf.extend_from_slice(&self.payload.data);
        buf.extend_from_slice(&self.timestamp.to_be_bytes());
        buf.extend_from_slice(&self.expiration.to_be_bytes());
        Hash::from_bytes(sha3_256_bytes(&buf))
    }

    pub fn contract(&self) -> Result<Contract, ValidationError> {
        Contract::decode(&self.payload)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// RESULT
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum TxStatus {
    #[default]
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TransactionResult {
    pub fee: u128,
    pub status: TxStatus,
    pub message: String,
    pub withdraw_amount: u128,
    pub unfreeze_amount: u128,
    pub asset_issue_id: Option<u64>,
    pub contract_address: Option<Address>,
    pub vm_output: Vec<u8>,
    pub energy_used: u64,
}

impl TransactionResult {
    pub fn is_success(&self) -> bool {
        self.status == TxStatus::Success
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = TxStatus::Failed;
        self.message = message.into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_type_ids_roundtrip() {
        for id in 0..64u32 {
            if let Some(t) = ContractType::from_id(id) {
                assert_eq!(t.id(), id);
            }
        }
        assert_eq!(ContractType::from_id(3), None);
        assert_eq!(ContractType::from_id(52), Some(ContractType::WitnessResign));
    }

    #[test]
    fn test_decode_rejects_unknown_exchange_and_mismatch() {
        let unknown = ContractPayload { contract_type: 99, version: 1, data: vec![] };
        assert_eq!(Contract::decode(&unknown), Err(ValidationError::UnsupportedContract(99)));

        let exchange = ContractPayload { contract_type: 41, version: 1, data: vec![] };
        assert_eq!(Contract::decode(&exchange), Err(ValidationError::UnsupportedContract(41)));

        // Transfer bytes declared as a ProposalCreate
        let transfer = Contract::Transfer(TransferContract {
            owner: Address([1; 20]),
            to: Address([2; 20]),
            amount: 5,
        })
        .encode();
        let lying = ContractPayload { contract_type: 16, ..transfer };
        assert!(matches!(
            Contract::decode(&lying),
            Err(ValidationError::PayloadMismatch { expected: "ProposalCreateContract", .. })
        ));
    }

    #[test]
    fn test_decode_rejects_trailing_bytes() {
        let c = Contract::Transfer(TransferContract {
            owner: Address([1; 20]),
            to: Address([2; 20]),
            amount: 5,
        });
        let mut payload = c.encode();
        assert_eq!(Contract::decode(&payload), Ok(c.clone()));

        payload.data.push(0);
        assert!(matches!(
            Contract::decode(&payload),
            Err(ValidationError::PayloadMismatch { expected: "TransferContract", .. })
        ));
    }

    #[test]
    fn test_tx_id_ignores_signatures() {
        let c = Contract::Unstake(UnstakeContract { owner: Address([1; 20]) });
        let mut tx = Transaction::new(&c, 10, 20);
        let id = tx.tx_id();
        tx.signatures.push(vec![1, 2, 3]);
        assert_eq!(tx.tx_id(), id);
        tx.timestamp = 11;
        assert_ne!(tx.tx_id(), id);
    }
}
