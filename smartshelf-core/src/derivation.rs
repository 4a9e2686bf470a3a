//! Taken-quantity derivation
//!
//! Pure computation from a live-weight snapshot and the verified baseline:
//!
//! ```text
//! taken[i] = max(0, verified[i] - live[i])   when live[i] < 200
//! taken[i] unchanged                          when live[i] is a sentinel
//! ```
//!
//! While the shelf is in ADDING mode the taken vector is frozen at its prior
//! value and tracking is off; staff are moving stock, not customers.

use smartshelf_common::slots::{ShelfMode, SlotReading, SlotVector, SLOT_COUNT};

/// Result of one derivation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Derivation {
    pub taken: SlotVector,
    /// Slots reporting 200/222
    pub placement_warnings: Vec<usize>,
    /// Slots reporting 255
    pub sensor_errors: Vec<usize>,
    /// Customer activity: retail mode and something taken
    pub is_tracking: bool,
}

/// Recompute taken quantities from the current snapshots
///
/// Idempotent: feeding the output `taken` back in as `prior_taken` with the
/// same live/verified vectors yields the same result.
pub fn derive(
    live: &SlotVector,
    verified: &SlotVector,
    prior_taken: &SlotVector,
    mode: ShelfMode,
) -> Derivation {
    let mut taken = *prior_taken;
    let mut placement_warnings = Vec::new();
    let mut sensor_errors = Vec::new();

    for slot in 0..SLOT_COUNT {
        match SlotReading::classify(live[slot]) {
            SlotReading::Quantity(weight) => {
                if mode == ShelfMode::Added {
                    taken[slot] = verified[slot].saturating_sub(weight);
                }
            }
            SlotReading::PlacementWarning(_) => placement_warnings.push(slot),
            SlotReading::SensorError => sensor_errors.push(slot),
            SlotReading::Reserved(_) => {}
        }
    }

    let is_tracking = mode == ShelfMode::Added && taken.iter().any(|&q| q > 0);

    Derivation {
        taken,
        placement_warnings,
        sensor_errors,
        is_tracking,
    }
}

/// New baseline from live weights; sentinel slots keep their prior value
pub fn commit_baseline(live: &SlotVector, prior_verified: &SlotVector) -> SlotVector {
    let mut verified = *prior_verified;
    for slot in 0..SLOT_COUNT {
        if let Some(quantity) = SlotReading::classify(live[slot]).quantity() {
            verified[slot] = quantity;
        }
    }
    verified
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(values: &[(usize, u32)]) -> SlotVector {
        let mut v = [0; SLOT_COUNT];
        for &(slot, value) in values {
            v[slot] = value;
        }
        v
    }

    #[test]
    fn test_taken_is_baseline_minus_live() {
        let verified = vector(&[(0, 5)]);
        let live = vector(&[(0, 3)]);
        let out = derive(&live, &verified, &[0; SLOT_COUNT], ShelfMode::Added);

        assert_eq!(out.taken[0], 2);
        assert!(out.is_tracking);
    }

    #[test]
    fn test_taken_clamped_at_zero() {
        let verified = vector(&[(1, 2)]);
        let live = vector(&[(1, 7)]);
        let out = derive(&live, &verified, &[0; SLOT_COUNT], ShelfMode::Added);

        assert_eq!(out.taken[1], 0);
        assert!(!out.is_tracking);
    }

    #[test]
    fn test_sentinels_leave_taken_unchanged() {
        let verified = vector(&[(3, 6), (4, 6), (5, 6)]);
        let live = vector(&[(3, 222), (4, 200), (5, 255)]);
        let prior = vector(&[(3, 1), (4, 2), (5, 3)]);
        let out = derive(&live, &verified, &prior, ShelfMode::Added);

        assert_eq!(out.taken[3], 1);
        assert_eq!(out.taken[4], 2);
        assert_eq!(out.taken[5], 3);
        assert_eq!(out.placement_warnings, vec![3, 4]);
        assert_eq!(out.sensor_errors, vec![5]);
    }

    #[test]
    fn test_adding_mode_freezes_taken() {
        let verified = vector(&[(0, 5)]);
        let live = vector(&[(0, 1)]);
        let prior = vector(&[(0, 2)]);
        let out = derive(&live, &verified, &prior, ShelfMode::Adding);

        assert_eq!(out.taken[0], 2);
        assert!(!out.is_tracking);
    }

    #[test]
    fn test_derivation_is_idempotent() {
        let verified = vector(&[(0, 5), (2, 4), (9, 3)]);
        let live = vector(&[(0, 3), (2, 222), (9, 0)]);
        let first = derive(&live, &verified, &[0; SLOT_COUNT], ShelfMode::Added);
        let second = derive(&live, &verified, &first.taken, ShelfMode::Added);

        assert_eq!(first, second);
    }

    #[test]
    fn test_commit_baseline_skips_sentinels() {
        let prior = vector(&[(0, 5), (1, 4), (2, 3)]);
        let live = vector(&[(0, 2), (1, 255), (2, 200)]);
        let verified = commit_baseline(&live, &prior);

        assert_eq!(verified[0], 2);
        assert_eq!(verified[1], 4);
        assert_eq!(verified[2], 3);
    }
}
