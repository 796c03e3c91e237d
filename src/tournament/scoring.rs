//! Pure scoring for Swiss rounds: no I/O, no clocks, no randomness.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::gateway::Verdict;

use super::ComparisonRecord;

/// Result of one pairing, as fed to the scoreboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOutcome {
    WinA,
    WinB,
    Tie,
    /// The judge could not produce a verdict. Scored as a tie and counted
    /// against both participants.
    Failure,
}

impl From<Verdict> for MatchOutcome {
    fn from(v: Verdict) -> Self {
        match v {
            Verdict::A => MatchOutcome::WinA,
            Verdict::B => MatchOutcome::WinB,
            Verdict::Tie => MatchOutcome::Tie,
        }
    }
}

impl MatchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchOutcome::WinA => "win_a",
            MatchOutcome::WinB => "win_b",
            MatchOutcome::Tie => "tie",
            MatchOutcome::Failure => "failure",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Standing {
    /// Score in half points, so ties and byes stay exact.
    half_points: u32,
    /// Judged games, byes excluded.
    played: u32,
    failures: u32,
    had_bye: bool,
}

/// Running totals for a pool of `n` seeds.
#[derive(Debug, Clone)]
pub struct Scoreboard {
    standings: Vec<Standing>,
    met: HashSet<(usize, usize)>,
}

impl Scoreboard {
    pub fn new(n: usize) -> Self {
        Self {
            standings: vec![Standing::default(); n],
            met: HashSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.standings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.standings.is_empty()
    }

    pub fn apply(&mut self, a: usize, b: usize, outcome: MatchOutcome) {
        let (da, db) = match outcome {
            MatchOutcome::WinA => (2, 0),
            MatchOutcome::WinB => (0, 2),
            MatchOutcome::Tie | MatchOutcome::Failure => (1, 1),
        };
        self.standings[a].half_points += da;
        self.standings[b].half_points += db;
        self.standings[a].played += 1;
        self.standings[b].played += 1;
        if outcome == MatchOutcome::Failure {
            self.standings[a].failures += 1;
            self.standings[b].failures += 1;
        }
        self.met.insert(pair_key(a, b));
    }

    /// Sit-out credit: half a point, same as a tie.
    pub fn award_bye(&mut self, seed: usize) {
        self.standings[seed].half_points += 1;
        self.standings[seed].had_bye = true;
    }

    pub fn have_met(&self, a: usize, b: usize) -> bool {
        self.met.contains(&pair_key(a, b))
    }

    pub fn had_bye(&self, seed: usize) -> bool {
        self.standings[seed].had_bye
    }

    pub fn score(&self, seed: usize) -> f64 {
        f64::from(self.standings[seed].half_points) / 2.0
    }

    pub fn failures(&self, seed: usize) -> u32 {
        self.standings[seed].failures
    }

    pub fn played(&self, seed: usize) -> u32 {
        self.standings[seed].played
    }

    fn cmp_seeds(&self, a: usize, b: usize) -> Ordering {
        let (sa, sb) = (&self.standings[a], &self.standings[b]);
        sb.half_points
            .cmp(&sa.half_points)
            .then(cmp_failure_rate(sa, sb))
            .then(a.cmp(&b))
    }

    /// Seeds best-first: score desc, failure rate asc, seed asc.
    ///
    /// The rate is failures over judged games, so sitting out never looks
    /// like a clean game. A seed that has not played counts as rate 0.
    pub fn order(&self) -> Vec<usize> {
        let mut seeds: Vec<usize> = (0..self.len()).collect();
        seeds.sort_by(|&a, &b| self.cmp_seeds(a, b));
        seeds
    }
}

/// `fa / pa` vs `fb / pb` without floats; an unplayed seed divides by 1.
fn cmp_failure_rate(sa: &Standing, sb: &Standing) -> Ordering {
    let lhs = u64::from(sa.failures) * u64::from(sb.played.max(1));
    let rhs = u64::from(sb.failures) * u64::from(sa.played.max(1));
    lhs.cmp(&rhs)
}

fn pair_key(a: usize, b: usize) -> (usize, usize) {
    (a.min(b), a.max(b))
}

/// Replay a comparison log (and byes) from scratch and return seeds in final order.
pub fn rank_from_log(n: usize, log: &[ComparisonRecord], byes: &[usize]) -> Vec<usize> {
    let mut board = Scoreboard::new(n);
    for record in log {
        board.apply(record.seed_a, record.seed_b, record.outcome);
    }
    for &seed in byes {
        board.award_bye(seed);
    }
    board.order()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn win_tie_and_failure_scoring() {
        let mut board = Scoreboard::new(4);
        board.apply(0, 1, MatchOutcome::WinA);
        board.apply(2, 3, MatchOutcome::Tie);
        assert_eq!(board.score(0), 1.0);
        assert_eq!(board.score(1), 0.0);
        assert_eq!(board.score(2), 0.5);
        assert_eq!(board.score(3), 0.5);

        board.apply(1, 3, MatchOutcome::Failure);
        assert_eq!(board.score(1), 0.5);
        assert_eq!(board.score(3), 1.0);
        assert_eq!(board.failures(1), 1);
        assert_eq!(board.failures(3), 1);
        assert!(board.have_met(3, 1));
        assert!(!board.have_met(0, 3));
    }

    #[test]
    fn order_breaks_ties_by_failures_then_seed() {
        let mut board = Scoreboard::new(4);
        board.apply(0, 1, MatchOutcome::Failure);
        board.apply(2, 3, MatchOutcome::Tie);
        // Everyone has 0.5; seeds 2 and 3 have no failures.
        assert_eq!(board.order(), vec![2, 3, 0, 1]);
    }

    #[test]
    fn byes_do_not_dilute_failures() {
        let mut board = Scoreboard::new(5);
        board.apply(0, 1, MatchOutcome::Failure);
        board.apply(2, 3, MatchOutcome::Failure);
        board.award_bye(4);
        board.apply(4, 0, MatchOutcome::Failure);
        board.apply(1, 2, MatchOutcome::Failure);
        board.award_bye(3);
        // Everyone ends on one point and failed every game they played.
        assert_eq!(board.order(), vec![0, 1, 2, 3, 4]);
        assert_eq!(board.played(3), 1);
        assert_eq!(board.played(0), 2);
    }

    #[test]
    fn failure_rate_breaks_score_ties() {
        let mut board = Scoreboard::new(4);
        board.apply(0, 1, MatchOutcome::Failure);
        board.apply(2, 3, MatchOutcome::Tie);
        board.apply(0, 2, MatchOutcome::Tie);
        board.apply(1, 3, MatchOutcome::Failure);
        // All on one point; seed 0 and 3 failed one of two, seed 1 both.
        assert_eq!(board.order(), vec![2, 0, 3, 1]);
    }

    #[test]
    fn bye_is_half_point() {
        let mut board = Scoreboard::new(3);
        board.award_bye(2);
        assert_eq!(board.score(2), 0.5);
        assert!(board.had_bye(2));
        assert_eq!(board.order(), vec![2, 0, 1]);
    }
}
