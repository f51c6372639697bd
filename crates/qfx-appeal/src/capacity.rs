use std::collections::HashSet;

use qfx_core::types::Address;
use qfx_core::validator::{Validator, ValidatorSnapshot};

use crate::selection::draw_random;

/// Validator counts for one validator appeal, keyed by how many prior
/// validator-appeal failures the transaction carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ValidatorDraw {
    pub reused: u32,
    pub newly_drawn: u32,
    pub total: u32,
}

/// Validator draw for a validator appeal at `appeal_failed` prior
/// failures, given `n = num_of_initial_validators`. Mirrors the table for
/// 0/1/2 prior failures exactly; failure counts beyond that follow the
/// general formula the table states for `k >= 1`.
pub fn validator_draw(appeal_failed: u32, n: u32) -> ValidatorDraw {
    match appeal_failed {
        0 => ValidatorDraw { reused: 0, newly_drawn: n + 2, total: 2 * n + 2 },
        1 => ValidatorDraw { reused: n + 2, newly_drawn: n + 1, total: 3 * n + 3 },
        2 => ValidatorDraw { reused: 2 * n + 3, newly_drawn: 2 * n, total: 5 * n + 3 },
        k => {
            let reused = (2 * k - 1) * n + 3;
            ValidatorDraw { reused, newly_drawn: 2 * n, total: (2 * k + 1) * n + 3 }
        }
    }
}

/// Appeal capacity check: an appeal is only admissible if the validators
/// it would involve, plus every address ever used as leader, stay within
/// the total validator population. `false` means the appeal must be
/// silently rejected (flag cleared, status unchanged).
pub fn has_capacity(involved: u32, used_leaders: u32, total_validators: u32) -> bool {
    involved + used_leaders < total_validators
}

/// Draw `draw.newly_drawn` fresh validators for a validator appeal,
/// excluding everyone already involved in the transaction.
pub fn draw_extra_validators(
    snapshot: &ValidatorSnapshot,
    draw: ValidatorDraw,
    already_involved: &[Address],
) -> Vec<Validator> {
    let exclude: HashSet<Address> = already_involved.iter().cloned().collect();
    draw_random(snapshot, draw.newly_drawn as usize, &exclude)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_table_matches_zero_failures() {
        let d = validator_draw(0, 5);
        assert_eq!(d, ValidatorDraw { reused: 0, newly_drawn: 7, total: 12 });
    }

    #[test]
    fn draw_table_matches_one_failure() {
        let d = validator_draw(1, 5);
        assert_eq!(d, ValidatorDraw { reused: 7, newly_drawn: 6, total: 18 });
    }

    #[test]
    fn draw_table_matches_two_failures() {
        let d = validator_draw(2, 5);
        assert_eq!(d, ValidatorDraw { reused: 13, newly_drawn: 10, total: 28 });
    }

    #[test]
    fn capacity_check_rejects_when_exhausted() {
        assert!(!has_capacity(10, 3, 13));
        assert!(has_capacity(9, 3, 13));
    }
}
