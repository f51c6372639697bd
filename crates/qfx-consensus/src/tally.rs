use std::collections::HashMap;

use qfx_core::transaction::Vote;
use qfx_core::types::Address;

/// Deterministic consensus-from-votes result. Exact-50% is never a
/// majority; `NoMajority` covers both the tie and the plurality-without-
/// majority case.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TallyResult {
    MajorityAgree,
    MajorityDisagree,
    Timeout,
    NoMajority,
}

/// Tally a vote map per the strict-majority rule: `IDLE` counts as
/// `DISAGREE`. Pure function of the multiset of votes.
pub fn tally_votes(votes: &HashMap<Address, Vote>) -> TallyResult {
    let (mut agree, mut disagree, mut timeout) = (0u32, 0u32, 0u32);
    for vote in votes.values() {
        match vote {
            Vote::Agree => agree += 1,
            Vote::Disagree | Vote::Idle => disagree += 1,
            Vote::Timeout => timeout += 1,
        }
    }
    tally_counts(agree, disagree, timeout)
}

fn tally_counts(agree: u32, disagree: u32, timeout: u32) -> TallyResult {
    if timeout > agree && timeout > disagree {
        TallyResult::Timeout
    } else if agree > disagree && agree > timeout {
        TallyResult::MajorityAgree
    } else if disagree > agree && disagree > timeout {
        TallyResult::MajorityDisagree
    } else {
        TallyResult::NoMajority
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn votes(pairs: &[(&str, Vote)]) -> HashMap<Address, Vote> {
        pairs.iter().map(|(a, v)| (Address::new(*a), *v)).collect()
    }

    #[test]
    fn unanimous_agree_is_majority_agree() {
        let v = votes(&[("a", Vote::Agree), ("b", Vote::Agree), ("c", Vote::Agree)]);
        assert_eq!(tally_votes(&v), TallyResult::MajorityAgree);
    }

    #[test]
    fn idle_counts_as_disagree() {
        let v = votes(&[("a", Vote::Agree), ("b", Vote::Idle), ("c", Vote::Disagree)]);
        assert_eq!(tally_votes(&v), TallyResult::MajorityDisagree);
    }

    #[test]
    fn exact_tie_is_no_majority() {
        let v = votes(&[("a", Vote::Agree), ("b", Vote::Disagree)]);
        assert_eq!(tally_votes(&v), TallyResult::NoMajority);
    }

    #[test]
    fn single_vote_trivially_matches() {
        let v = votes(&[("a", Vote::Agree)]);
        assert_eq!(tally_votes(&v), TallyResult::MajorityAgree);
    }

    #[test]
    fn timeout_majority_wins() {
        let v = votes(&[("a", Vote::Timeout), ("b", Vote::Timeout), ("c", Vote::Agree)]);
        assert_eq!(tally_votes(&v), TallyResult::Timeout);
    }
}
