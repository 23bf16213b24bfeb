//! Witness penalty (slashing) untuk block yang terlewat.
//!
//! Dievaluasi sekali per maintenance untuk setiap witness yang eligible:
//!
//! | Kondisi | Penalty | Ban |
//! |---------|---------|-----|
//! | miss rate > threshold, status SUPERNODE | Minor | `minor_penalty_epochs × interval` |
//! | miss rate > threshold, status lain | Major | `major_penalty_epochs × interval` |
//! | miss rate ≤ threshold | tidak ada | - |
//!
//! Miss rate = `epoch_missed / (epoch_missed + epoch_produced)` dalam basis
//! point. Witness yang kena penalty berstatus SLASHED, mendapat record
//! `BannedWitness`, dan tidak masuk active set sampai ban-nya lewat.

use tracing::warn;

use crate::error::{ExecutionError, StoreResult};
use crate::state::{BannedWitness, ChainState, DynamicProperties, Witness, WitnessStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Penalty {
    /// Currently elected witness.
    Minor,
    Major,
}

impl Penalty {
    pub fn epochs(&self, props: &DynamicProperties) -> u64 {
        match self {
            Penalty::Minor => props.minor_penalty_epochs,
            Penalty::Major => props.major_penalty_epochs,
        }
    }
}

/// Penalty earned by `w` this epoch, if any.
pub fn penalty_for(w: &Witness, props: &DynamicProperties) -> Option<Penalty> {
    if w.miss_rate_bps() <= props.miss_rate_threshold_bps {
        return None;
    }
    Some(if w.status == WitnessStatus::Supernode { Penalty::Minor } else { Penalty::Major })
}

/// `now + epochs × maintenance_interval`.
pub fn ban_expiration(penalty: Penalty, props: &DynamicProperties, now: u64) -> Option<u64> {
    penalty
        .epochs(props)
        .checked_mul(props.maintenance_interval())?
        .checked_add(now)
}

impl<'a> ChainState<'a> {
    /// Mark `w` SLASHED, reset its epoch counters and write the ban record.
    /// Does not persist `w`; the caller owns the witness write.
    pub fn slash_witness(
        &mut self,
        w: &mut Witness,
        penalty: Penalty,
        now: u64,
    ) -> Result<BannedWitness, ExecutionError> {
        let props = self.properties()?;
        let expiration_time = ban_expiration(penalty, &props, now).ok_or(ExecutionError::Overflow("ban expiration"))?;
        warn!(
            witness = %w.address,
            missed = w.epoch_missed,
            produced = w.epoch_produced,
            miss_rate_bps = w.miss_rate_bps(),
            ?penalty,
            expiration_time,
            "witness slashed"
        );
        w.status = WitnessStatus::Slashed;
        w.is_jobs = false;
        w.epoch_missed = 0;
        w.epoch_produced = 0;
        let banned = BannedWitness { address: w.address, expiration_time };
        self.put_banned_witness(&banned)?;
        Ok(banned)
    }

    /// Lift an expired ban: status back to ACTIVE, ban record removed.
    /// Returns false while the ban is still running.
    pub fn try_unban(&mut self, w: &mut Witness, now: u64) -> StoreResult<bool> {
        match self.banned_witness(&w.address)? {
            Some(b) if now < b.expiration_time => Ok(false),
            _ => {
                self.remove_banned_witness(&w.address)?;
                w.status = WitnessStatus::Active;
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::Address;
    use dpos_common::ChainConfig;

    fn props() -> DynamicProperties {
        let mut p = DynamicProperties::from_config(&ChainConfig::default()).unwrap();
        p.miss_rate_threshold_bps = 5_000;
        p.minor_penalty_epochs = 1;
        p.major_penalty_epochs = 4;
        p.maintenance_time_interval = 1_000;
        p
    }

    fn witness(missed: u64, produced: u64, status: WitnessStatus) -> Witness {
        let mut w = Witness::new(Address([7; 20]), "w".into());
        w.epoch_missed = missed;
        w.epoch_produced = produced;
        w.status = status;
        w
    }

    #[test]
    fn test_penalty_depends_on_status() {
        let p = props();
        assert_eq!(penalty_for(&witness(6, 4, WitnessStatus::Supernode), &p), Some(Penalty::Minor));
        assert_eq!(penalty_for(&witness(6, 4, WitnessStatus::Active), &p), Some(Penalty::Major));
        // exactly at threshold is not a penalty
        assert_eq!(penalty_for(&witness(5, 5, WitnessStatus::Supernode), &p), None);
        assert_eq!(penalty_for(&witness(0, 0, WitnessStatus::Supernode), &p), None);
    }

    #[test]
    fn test_slash_and_unban() {
        let mut store = MemoryStore::new();
        let mut state = ChainState::new(&mut store);
        state.put_properties(&props()).unwrap();

        let mut w = witness(9, 1, WitnessStatus::Supernode);
        let banned = state.slash_witness(&mut w, Penalty::Minor, 5_000).unwrap();
        assert_eq!(banned.expiration_time, 6_000);
        assert_eq!(w.status, WitnessStatus::Slashed);
        assert_eq!((w.epoch_missed, w.epoch_produced), (0, 0));

        assert!(!state.try_unban(&mut w, 5_999).unwrap());
        assert!(state.try_unban(&mut w, 6_000).unwrap());
        assert_eq!(w.status, WitnessStatus::Active);
        assert!(state.banned_witness(&w.address).unwrap().is_none());
    }
}
