//! Swiss pairing.

use super::scoring::Scoreboard;

/// One round's pairings. `(a, b)` is presented to the judge in that order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pairing {
    pub pairs: Vec<(usize, usize)>,
    pub bye: Option<usize>,
}

/// Pair seeds for `round` (1-based).
///
/// Round 1 pairs adjacent seeds. Later rounds walk the standings best-first
/// and give each unpaired seed the nearest unpaired opponent it has not met,
/// falling back to the nearest unpaired opponent when everyone left is a
/// rematch. With an odd pool, the lowest-standing seed without a bye sits out.
pub fn swiss_pairs(round: u32, board: &Scoreboard) -> Pairing {
    let mut order: Vec<usize> = if round <= 1 {
        (0..board.len()).collect()
    } else {
        board.order()
    };

    let bye = if order.len() % 2 == 1 {
        let pick = order
            .iter()
            .rposition(|&s| !board.had_bye(s))
            .unwrap_or(order.len() - 1);
        Some(order.remove(pick))
    } else {
        None
    };

    let mut paired = vec![false; order.len()];
    let mut pairs = Vec::with_capacity(order.len() / 2);
    for i in 0..order.len() {
        if paired[i] {
            continue;
        }
        let a = order[i];
        let opponent = if round <= 1 {
            next_open(&paired, i + 1, |_| true)
        } else {
            next_open(&paired, i + 1, |j| !board.have_met(a, order[j]))
                .or_else(|| next_open(&paired, i + 1, |_| true))
        };
        if let Some(j) = opponent {
            paired[i] = true;
            paired[j] = true;
            pairs.push((a, order[j]));
        }
    }

    Pairing { pairs, bye }
}

fn next_open(paired: &[bool], from: usize, accept: impl Fn(usize) -> bool) -> Option<usize> {
    (from..paired.len()).find(|&j| !paired[j] && accept(j))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tournament::scoring::MatchOutcome;

    #[test]
    fn first_round_pairs_adjacent_seeds() {
        let board = Scoreboard::new(6);
        let p = swiss_pairs(1, &board);
        assert_eq!(p.pairs, vec![(0, 1), (2, 3), (4, 5)]);
        assert_eq!(p.bye, None);
    }

    #[test]
    fn odd_pool_gives_last_seed_the_first_bye() {
        let board = Scoreboard::new(5);
        let p = swiss_pairs(1, &board);
        assert_eq!(p.bye, Some(4));
        assert_eq!(p.pairs, vec![(0, 1), (2, 3)]);
    }

    #[test]
    fn later_rounds_pair_by_standing_and_avoid_rematches() {
        let mut board = Scoreboard::new(4);
        board.apply(0, 1, MatchOutcome::WinB);
        board.apply(2, 3, MatchOutcome::WinA);
        // Standings: 1, 2 (one point each), then 0, 3.
        let p = swiss_pairs(2, &board);
        assert_eq!(p.pairs, vec![(1, 2), (0, 3)]);
    }

    #[test]
    fn rematch_only_when_no_fresh_opponent() {
        let mut board = Scoreboard::new(2);
        board.apply(0, 1, MatchOutcome::WinA);
        let p = swiss_pairs(2, &board);
        assert_eq!(p.pairs, vec![(0, 1)]);
    }

    #[test]
    fn bye_rotates_to_seeds_without_one() {
        let mut board = Scoreboard::new(3);
        board.award_bye(2);
        board.apply(0, 1, MatchOutcome::WinA);
        // Standings: 0 (1.0), 2 (0.5), 1 (0.0); 1 is lowest without a bye.
        let p = swiss_pairs(2, &board);
        assert_eq!(p.bye, Some(1));
        assert_eq!(p.pairs, vec![(0, 2)]);
    }

    #[test]
    fn every_seed_plays_or_sits_out_exactly_once() {
        let board = Scoreboard::new(15);
        let p = swiss_pairs(3, &board);
        let mut seen: Vec<usize> = p.pairs.iter().flat_map(|&(a, b)| [a, b]).collect();
        seen.extend(p.bye);
        seen.sort_unstable();
        assert_eq!(seen, (0..15).collect::<Vec<_>>());
    }
}
