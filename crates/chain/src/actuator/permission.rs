//! AccountPermissionUpdate: ganti descriptor multisig owner / witness / active.
//!
//! Id permission dinormalisasi saat execute: owner = 0, witness = 1,
//! active = 2.. sesuai urutan di payload.

use std::collections::BTreeSet;

use tracing::debug;

use super::{reject, require_valid};
use crate::error::{ExecutionError, ValidationError};
use crate::state::{ChainState, Permission, PermissionType, OPERATIONS_LEN};
use crate::tx::AccountPermissionUpdateContract;

pub const MAX_ACTIVE_PERMISSIONS: usize = 8;
pub const MAX_PERMISSION_KEYS: usize = 5;

fn validate_permission(p: &Permission, expected: PermissionType) -> Result<(), ValidationError> {
    if p.kind != expected {
        return Err(reject(format!("expected {:?} permission, got {:?}", expected, p.kind)));
    }
    if p.keys.is_empty() || p.keys.len() > MAX_PERMISSION_KEYS {
        return Err(reject(format!("permission needs 1..={} keys", MAX_PERMISSION_KEYS)));
    }
    if p.threshold == 0 {
        return Err(reject("permission threshold must be positive"));
    }
    let mut seen = BTreeSet::new();
    let mut weight_sum: u64 = 0;
    for key in &p.keys {
        require_valid(&key.address, "permission key")?;
        if !seen.insert(key.address) {
            return Err(reject(format!("duplicate key {} in permission", key.address)));
        }
        if key.weight == 0 {
            return Err(reject("key weight must be positive"));
        }
        weight_sum = weight_sum
            .checked_add(key.weight)
            .ok_or_else(|| reject("key weights overflow"))?;
    }
    if weight_sum < p.threshold {
        return Err(reject(format!(
            "sum of key weights {} is below threshold {}",
            weight_sum, p.threshold
        )));
    }
    match expected {
        PermissionType::Active => {
            if p.operations.len() != OPERATIONS_LEN {
                return Err(reject(format!("active operations must be {} bytes", OPERATIONS_LEN)));
            }
        }
        _ => {
            if !p.operations.is_empty() {
                return Err(reject("only active permissions carry operations"));
            }
        }
    }
    Ok(())
}

pub(super) fn validate_update(
    c: &AccountPermissionUpdateContract,
    state: &ChainState<'_>,
) -> Result<(), ValidationError> {
    if state.properties()?.allow_multi_sign != 1 {
        return Err(reject("multi-sign is not enabled"));
    }
    let owner = state.account(&c.owner)?.ok_or(ValidationError::AccountNotFound(c.owner))?;

    validate_permission(&c.owner_permission, PermissionType::Owner)?;

    match (&c.witness_permission, owner.is_witness) {
        (Some(w), true) => {
            validate_permission(w, PermissionType::Witness)?;
            if w.keys.len() != 1 {
                return Err(reject("witness permission must have exactly one key"));
            }
        }
        (None, false) => {}
        (Some(_), false) => return Err(reject("account is not a witness")),
        (None, true) => return Err(reject("witness permission is required for witnesses")),
    }

    if c.actives.is_empty() || c.actives.len() > MAX_ACTIVE_PERMISSIONS {
        return Err(reject(format!("active permissions must number 1..={}", MAX_ACTIVE_PERMISSIONS)));
    }
    for active in &c.actives {
        validate_permission(active, PermissionType::Active)?;
    }
    Ok(())
}

pub(super) fn execute_update(
    c: &AccountPermissionUpdateContract,
    state: &mut ChainState<'_>,
) -> Result<(), ExecutionError> {
    let mut acct = state.require_account(&c.owner)?;

    let mut owner_permission = c.owner_permission.clone();
    owner_permission.id = 0;
    acct.owner_permission = owner_permission;

    acct.witness_permission = c.witness_permission.clone().map(|mut w| {
        w.id = 1;
        w
    });

    acct.active_permissions = c
        .actives
        .iter()
        .cloned()
        .zip(2u32..)
        .map(|(mut p, id)| {
            p.id = id;
            p
        })
        .collect();

    state.put_account(&acct)?;
    debug!(owner = %c.owner, actives = c.actives.len(), "permissions updated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::PermissionKey;
    use crate::types::Address;

    fn owner_perm(keys: &[(u8, u64)], threshold: u64) -> Permission {
        Permission {
            kind: PermissionType::Owner,
            id: 0,
            name: "owner".into(),
            threshold,
            keys: keys
                .iter()
                .map(|(b, w)| PermissionKey { address: Address([*b; 20]), weight: *w })
                .collect(),
            operations: Vec::new(),
        }
    }

    #[test]
    fn test_weight_sum_must_reach_threshold() {
        assert!(validate_permission(&owner_perm(&[(1, 1), (2, 1)], 2), PermissionType::Owner).is_ok());
        assert!(validate_permission(&owner_perm(&[(1, 1), (2, 1)], 3), PermissionType::Owner).is_err());
    }

    #[test]
    fn test_rejects_duplicate_and_zero_weight_keys() {
        assert!(validate_permission(&owner_perm(&[(1, 1), (1, 1)], 1), PermissionType::Owner).is_err());
        assert!(validate_permission(&owner_perm(&[(1, 0)], 1), PermissionType::Owner).is_err());
        assert!(validate_permission(&owner_perm(&[(0, 1)], 1), PermissionType::Owner).is_err());
    }

    #[test]
    fn test_key_count_limit() {
        let six: Vec<(u8, u64)> = (1..=6).map(|b| (b, 1)).collect();
        assert!(validate_permission(&owner_perm(&six, 1), PermissionType::Owner).is_err());
        assert!(validate_permission(&owner_perm(&six[..5], 1), PermissionType::Owner).is_ok());
    }

    #[test]
    fn test_active_requires_operations_bitmap() {
        let mut p = Permission::default_active(Address([1; 20]));
        assert!(validate_permission(&p, PermissionType::Active).is_ok());
        p.operations.truncate(4);
        assert!(validate_permission(&p, PermissionType::Active).is_err());
    }
}
