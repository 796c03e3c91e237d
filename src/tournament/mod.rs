//! Swiss tournament over one story's candidate pool.
//!
//! Each round is paired from the current standings, judged concurrently,
//! and applied to the scoreboard in pair order once every comparison in the
//! round has resolved. Judge failures are scored, never fatal.

pub mod pairing;
pub mod scoring;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, warn};

use crate::gateway::{Attribution, CompareRequest, ModelRoute, TextGateway, Verdict};
use crate::hooks::{notify, ComparisonEvent, PipelineObserver};
use crate::prompts;
use crate::retry::{with_retries, RetryPolicy};
use crate::types::{Candidate, HeadlineId, RankedCandidate};

pub use pairing::{swiss_pairs, Pairing};
pub use scoring::{rank_from_log, MatchOutcome, Scoreboard};

pub const DEFAULT_TOP_K: usize = 4;

#[derive(Debug, Clone)]
pub struct TournamentConfig {
    /// Fixed round count; `None` uses `ceil(log2 N) + 2`.
    pub rounds: Option<u32>,
    pub top_k: usize,
    /// Comparisons in flight per round.
    pub concurrency: usize,
    /// Also judge every pair in reverse order and count disagreements.
    /// Never affects scores.
    pub symmetry_probe: bool,
    pub retry: RetryPolicy,
}

impl Default for TournamentConfig {
    fn default() -> Self {
        Self {
            rounds: None,
            top_k: DEFAULT_TOP_K,
            concurrency: 4,
            symmetry_probe: false,
            retry: RetryPolicy::default(),
        }
    }
}

/// `ceil(log2 n) + 2`, or 0 when there is nothing to compare.
pub fn default_rounds(n: usize) -> u32 {
    if n <= 1 {
        return 0;
    }
    let ceil_log2 = usize::BITS - (n - 1).leading_zeros();
    ceil_log2 + 2
}

/// One judged pairing.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonRecord {
    pub round: u32,
    pub seed_a: usize,
    pub seed_b: usize,
    pub headline_a: HeadlineId,
    pub headline_b: HeadlineId,
    pub outcome: MatchOutcome,
    pub judge: ModelRoute,
    pub attempts: u32,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TournamentStats {
    pub rounds: u32,
    pub comparisons: usize,
    pub failures: usize,
    /// Extra attempts spent on transient judge failures.
    pub retries: u32,
    pub byes: usize,
    pub symmetry_checks: usize,
    pub symmetry_disagreements: usize,
}

#[derive(Debug, Clone)]
pub struct TournamentOutcome {
    /// Every candidate, ascending by rank (1..=N).
    pub ranked: Vec<RankedCandidate>,
    pub log: Vec<ComparisonRecord>,
    /// Seeds that sat out, in round order.
    pub byes: Vec<usize>,
    pub stats: TournamentStats,
    top_k: usize,
}

impl TournamentOutcome {
    pub fn winner(&self) -> Option<&RankedCandidate> {
        self.ranked.first()
    }

    /// The best `top_k` candidates.
    pub fn top(&self) -> &[RankedCandidate] {
        &self.ranked[..self.top_k.min(self.ranked.len())]
    }

    /// Everything below the top `top_k`.
    pub fn rest(&self) -> &[RankedCandidate] {
        &self.ranked[self.top_k.min(self.ranked.len())..]
    }
}

struct Judged {
    outcome: MatchOutcome,
    attempts: u32,
    error: Option<String>,
    /// `Some(agreed)` when the reverse-order probe produced a verdict.
    symmetric: Option<bool>,
}

/// Rank `candidates` with Swiss rounds judged by `judge`.
///
/// Seeds are positions in `candidates`. The same pool and the same verdicts
/// always produce the same ranking.
pub async fn run_tournament(
    gateway: &dyn TextGateway,
    judge: &ModelRoute,
    original: &str,
    mut candidates: Vec<Candidate>,
    config: &TournamentConfig,
    attribution: Attribution,
    observer: Option<&dyn PipelineObserver>,
) -> TournamentOutcome {
    for (seed, c) in candidates.iter_mut().enumerate() {
        c.seed = seed;
    }
    let n = candidates.len();
    let rounds = if n <= 1 {
        0
    } else {
        config.rounds.unwrap_or_else(|| default_rounds(n))
    };

    let entries: Vec<String> = candidates
        .iter()
        .map(|c| prompts::judge_entry(&c.text, original, &c.angle))
        .collect();

    let mut board = Scoreboard::new(n);
    let mut log = Vec::new();
    let mut byes = Vec::new();
    let mut stats = TournamentStats {
        rounds,
        ..TournamentStats::default()
    };

    for round in 1..=rounds {
        let Pairing { pairs, bye } = swiss_pairs(round, &board);

        let results: Vec<Judged> = stream::iter(pairs.clone())
            .map(|(a, b)| {
                judge_pair(
                    gateway,
                    judge,
                    &entries[a],
                    &entries[b],
                    config,
                    attribution.clone(),
                )
            })
            .buffered(config.concurrency.max(1))
            .collect()
            .await;

        let mut round_failures = 0;
        for (&(a, b), judged) in pairs.iter().zip(results) {
            board.apply(a, b, judged.outcome);
            stats.comparisons += 1;
            stats.retries += judged.attempts.saturating_sub(1);
            if judged.outcome == MatchOutcome::Failure {
                stats.failures += 1;
                round_failures += 1;
            }
            if let Some(agreed) = judged.symmetric {
                stats.symmetry_checks += 1;
                if !agreed {
                    stats.symmetry_disagreements += 1;
                }
            }

            let record = ComparisonRecord {
                round,
                seed_a: a,
                seed_b: b,
                headline_a: candidates[a].headline_id,
                headline_b: candidates[b].headline_id,
                outcome: judged.outcome,
                judge: judge.clone(),
                attempts: judged.attempts,
                error: judged.error,
            };
            if let Some(observer) = observer {
                notify(
                    observer
                        .on_comparison(ComparisonEvent::from_record(attribution.run_id, &record)),
                )
                .await;
            }
            log.push(record);
        }

        if let Some(seed) = bye {
            board.award_bye(seed);
            byes.push(seed);
            stats.byes += 1;
        }

        if round_failures > 0 && round_failures == pairs.len() {
            warn!(round, "every comparison in round failed");
        }
        debug!(round, pairs = pairs.len(), failures = round_failures, "round complete");
    }

    let ranked = board
        .order()
        .into_iter()
        .enumerate()
        .map(|(i, seed)| RankedCandidate {
            candidate: candidates[seed].clone(),
            rank: i + 1,
            score: board.score(seed),
            failures: board.failures(seed),
        })
        .collect();

    TournamentOutcome {
        ranked,
        log,
        byes,
        stats,
        top_k: config.top_k,
    }
}

async fn judge_pair(
    gateway: &dyn TextGateway,
    judge: &ModelRoute,
    entry_a: &str,
    entry_b: &str,
    config: &TournamentConfig,
    attribution: Attribution,
) -> Judged {
    let ask = |first: &str, second: &str| CompareRequest {
        route: judge.clone(),
        prompt_a: first.to_string(),
        prompt_b: second.to_string(),
        attribution: attribution.clone(),
    };

    let forward = with_retries(&config.retry, "tournament::compare", || {
        gateway.compare(ask(entry_a, entry_b))
    })
    .await;

    let verdict = match forward.result {
        Ok(v) => v,
        Err(err) => {
            debug!(error = %err, attempts = forward.attempts, "comparison failed");
            return Judged {
                outcome: MatchOutcome::Failure,
                attempts: forward.attempts,
                error: Some(err.to_string()),
                symmetric: None,
            };
        }
    };

    let symmetric = if config.symmetry_probe {
        probe_reverse(gateway, config, ask(entry_b, entry_a), verdict).await
    } else {
        None
    };

    Judged {
        outcome: verdict.into(),
        attempts: forward.attempts,
        error: None,
        symmetric,
    }
}

async fn probe_reverse(
    gateway: &dyn TextGateway,
    config: &TournamentConfig,
    reversed: CompareRequest,
    forward: Verdict,
) -> Option<bool> {
    let probe = with_retries(&config.retry, "tournament::symmetry_probe", || {
        gateway.compare(reversed.clone())
    })
    .await;
    probe.result.ok().map(|v| v.swapped() == forward)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::gateway::{GenerateRequest, ProviderError, ProviderId};
    use crate::types::Angle;

    /// Prefers the headline with the lower number in its text; can be told
    /// to fail specific call indices.
    struct NumberJudge {
        calls: Mutex<usize>,
        fail_every: Option<usize>,
        transient: bool,
    }

    impl NumberJudge {
        fn new() -> Self {
            Self {
                calls: Mutex::new(0),
                fail_every: None,
                transient: true,
            }
        }

        fn number(entry: &str) -> u32 {
            entry
                .lines()
                .next()
                .and_then(|l| l.rsplit(' ').next())
                .and_then(|n| n.parse().ok())
                .unwrap_or(u32::MAX)
        }
    }

    #[async_trait]
    impl TextGateway for NumberJudge {
        async fn generate(&self, _req: GenerateRequest) -> Result<String, ProviderError> {
            Err(ProviderError::invalid_request("judge only"))
        }

        async fn compare(&self, req: CompareRequest) -> Result<Verdict, ProviderError> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                *calls += 1;
                *calls
            };
            if let Some(k) = self.fail_every {
                if call % k == 0 {
                    return Err(if self.transient {
                        ProviderError::Timeout(Duration::from_secs(1), None)
                    } else {
                        ProviderError::parse("unclear", "maybe")
                    });
                }
            }
            let (a, b) = (Self::number(&req.prompt_a), Self::number(&req.prompt_b));
            Ok(if a < b {
                Verdict::A
            } else if b < a {
                Verdict::B
            } else {
                Verdict::Tie
            })
        }
    }

    fn pool(numbers: &[u32]) -> Vec<Candidate> {
        let angle = Arc::new(Angle::new("test", ""));
        numbers
            .iter()
            .map(|n| Candidate {
                headline_id: HeadlineId::new(),
                text: format!("Headline {n}"),
                angle: angle.clone(),
                generated_by: ModelRoute::new(ProviderId::Anthropic, "gen"),
                seed: 0,
            })
            .collect()
    }

    fn judge() -> ModelRoute {
        ModelRoute::new(ProviderId::OpenRouter, "google/gemini-2.5-flash-lite")
    }

    fn no_retry() -> TournamentConfig {
        TournamentConfig {
            retry: RetryPolicy::none(),
            ..TournamentConfig::default()
        }
    }

    fn ranks(outcome: &TournamentOutcome) -> Vec<usize> {
        outcome.ranked.iter().map(|r| r.rank).collect()
    }

    #[test]
    fn round_count_formula() {
        assert_eq!(default_rounds(0), 0);
        assert_eq!(default_rounds(1), 0);
        assert_eq!(default_rounds(2), 3);
        assert_eq!(default_rounds(4), 4);
        assert_eq!(default_rounds(5), 5);
        assert_eq!(default_rounds(15), 6);
        assert_eq!(default_rounds(16), 6);
    }

    #[tokio::test]
    async fn single_candidate_needs_no_judge() {
        let gw = NumberJudge::new();
        let out = run_tournament(&gw, &judge(), "orig", pool(&[7]), &no_retry(), Attribution::default(), None).await;
        assert_eq!(ranks(&out), vec![1]);
        assert!(out.log.is_empty());
        assert_eq!(*gw.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn empty_pool_ranks_nothing() {
        let gw = NumberJudge::new();
        let out = run_tournament(&gw, &judge(), "orig", Vec::new(), &no_retry(), Attribution::default(), None).await;
        assert!(out.ranked.is_empty());
        assert!(out.winner().is_none());
    }

    #[tokio::test]
    async fn strongest_candidate_wins() {
        let gw = NumberJudge::new();
        let out = run_tournament(
            &gw,
            &judge(),
            "orig",
            pool(&[5, 3, 8, 1, 6, 2, 7, 4]),
            &no_retry(),
            Attribution::default(),
            None,
        )
        .await;
        assert_eq!(out.winner().unwrap().candidate.text, "Headline 1");
        assert_eq!(ranks(&out), (1..=8).collect::<Vec<_>>());
        assert_eq!(out.top().len(), 4);
        assert_eq!(out.rest().len(), 4);
        assert_eq!(out.stats.comparisons, 4 * default_rounds(8) as usize);
    }

    #[tokio::test]
    async fn all_failures_keep_seed_order() {
        let gw = NumberJudge {
            fail_every: Some(1),
            transient: false,
            ..NumberJudge::new()
        };
        let out = run_tournament(
            &gw,
            &judge(),
            "orig",
            pool(&[9, 8, 7, 6]),
            &no_retry(),
            Attribution::default(),
            None,
        )
        .await;
        let seeds: Vec<usize> = out.ranked.iter().map(|r| r.candidate.seed).collect();
        assert_eq!(seeds, vec![0, 1, 2, 3]);
        assert_eq!(out.stats.failures, out.stats.comparisons);
        assert!(out.ranked.iter().all(|r| r.failures == 4));
    }

    #[tokio::test]
    async fn all_failures_keep_seed_order_in_odd_pools() {
        for n in [3u32, 5, 15] {
            let gw = NumberJudge {
                fail_every: Some(1),
                transient: false,
                ..NumberJudge::new()
            };
            let numbers: Vec<u32> = (0..n).rev().collect();
            let out = run_tournament(
                &gw,
                &judge(),
                "orig",
                pool(&numbers),
                &no_retry(),
                Attribution::default(),
                None,
            )
            .await;
            let seeds: Vec<usize> = out.ranked.iter().map(|r| r.candidate.seed).collect();
            assert_eq!(seeds, (0..n as usize).collect::<Vec<_>>(), "n = {n}, byes = {:?}", out.byes);
            assert_eq!(out.stats.byes, default_rounds(n as usize) as usize);
            assert_eq!(out.stats.failures, out.stats.comparisons);
        }
    }

    #[tokio::test]
    async fn scored_failures_still_give_a_full_ranking() {
        let gw = NumberJudge {
            fail_every: Some(3),
            transient: false,
            ..NumberJudge::new()
        };
        let config = TournamentConfig {
            concurrency: 1,
            ..no_retry()
        };
        let numbers: Vec<u32> = (1..=15).rev().collect();
        let out = run_tournament(&gw, &judge(), "orig", pool(&numbers), &config, Attribution::default(), None).await;

        assert_eq!(ranks(&out), (1..=15).collect::<Vec<_>>());
        let mut seeds: Vec<usize> = out.ranked.iter().map(|r| r.candidate.seed).collect();
        seeds.sort_unstable();
        assert_eq!(seeds, (0..15).collect::<Vec<_>>());

        assert_eq!(out.stats.comparisons, 7 * default_rounds(15) as usize);
        assert_eq!(out.stats.failures, out.stats.comparisons / 3);
        assert_eq!(out.stats.retries, 0);
        let per_seed: u32 = out.ranked.iter().map(|r| r.failures).sum();
        assert_eq!(per_seed as usize, 2 * out.stats.failures);

        let replayed = rank_from_log(15, &out.log, &out.byes);
        let ranked: Vec<usize> = out.ranked.iter().map(|r| r.candidate.seed).collect();
        assert_eq!(replayed, ranked);
    }

    #[tokio::test]
    async fn odd_pool_gets_byes_without_judge_calls() {
        let gw = NumberJudge::new();
        let config = TournamentConfig {
            rounds: Some(3),
            ..no_retry()
        };
        let out = run_tournament(&gw, &judge(), "orig", pool(&[3, 2, 1]), &config, Attribution::default(), None).await;
        assert_eq!(out.byes.len(), 3);
        assert_eq!(out.stats.comparisons, 3);
        assert_eq!(*gw.calls.lock().unwrap(), 3);
        let mut bye_seeds = out.byes.clone();
        bye_seeds.sort_unstable();
        assert_eq!(bye_seeds, vec![0, 1, 2]);
        assert_eq!(ranks(&out), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let gw = NumberJudge {
            fail_every: Some(3),
            ..NumberJudge::new()
        };
        let config = TournamentConfig {
            retry: RetryPolicy {
                max_retries: 2,
                base_delay: Duration::from_millis(1),
            },
            concurrency: 1,
            ..TournamentConfig::default()
        };
        let out = run_tournament(&gw, &judge(), "orig", pool(&[4, 3, 2, 1]), &config, Attribution::default(), None).await;
        assert_eq!(out.stats.failures, 0);
        assert!(out.stats.retries > 0);
        assert_eq!(out.winner().unwrap().candidate.text, "Headline 1");
    }

    #[tokio::test]
    async fn replaying_the_log_reproduces_the_ranking() {
        let gw = NumberJudge::new();
        let out = run_tournament(
            &gw,
            &judge(),
            "orig",
            pool(&[4, 9, 2, 7, 1]),
            &no_retry(),
            Attribution::default(),
            None,
        )
        .await;
        let replayed = rank_from_log(5, &out.log, &out.byes);
        let seeds: Vec<usize> = out.ranked.iter().map(|r| r.candidate.seed).collect();
        assert_eq!(replayed, seeds);
    }

    #[tokio::test]
    async fn symmetry_probe_counts_without_scoring() {
        struct FirstAlwaysWins;

        #[async_trait]
        impl TextGateway for FirstAlwaysWins {
            async fn generate(&self, _req: GenerateRequest) -> Result<String, ProviderError> {
                Ok(String::new())
            }
            async fn compare(&self, _req: CompareRequest) -> Result<Verdict, ProviderError> {
                Ok(Verdict::A)
            }
        }

        let config = TournamentConfig {
            rounds: Some(1),
            symmetry_probe: true,
            ..no_retry()
        };
        let out = run_tournament(
            &FirstAlwaysWins,
            &judge(),
            "orig",
            pool(&[1, 2, 3, 4]),
            &config,
            Attribution::default(),
            None,
        )
        .await;
        assert_eq!(out.stats.symmetry_checks, 2);
        assert_eq!(out.stats.symmetry_disagreements, 2);
        let scores: HashMap<usize, f64> =
            out.ranked.iter().map(|r| (r.candidate.seed, r.score)).collect();
        assert_eq!(scores[&0], 1.0);
        assert_eq!(scores[&1], 0.0);
    }
}
