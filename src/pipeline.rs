//! Per-story orchestration: brainstorm → generate → tournament.
//!
//! Each story runs as its own state machine
//! (`Pending → Brainstorming → Generating → Ranking → Complete`, or `Aborted`)
//! under a wall-clock budget. Stage failures that leave partial output are
//! logged and skipped; a stage with no usable output aborts only that story.
//!
//! Usage:
//! ```bash
//! newsroom run --input stories.json --out edition.json
//! ```

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use crate::brainstorm::{brainstorm_angles, clamp_angle_count};
use crate::gateway::{Attribution, ModelRoute, ProviderId, TextGateway};
use crate::generate::generate_headlines;
use crate::hooks::{notify, PipelineObserver, TransitionEvent};
use crate::leaderboard::{spawn_aggregator, LeaderboardEntry};
use crate::retry::{with_retries, RetryPolicy};
use crate::tournament::{run_tournament, TournamentConfig, TournamentStats, DEFAULT_TOP_K};
use crate::types::{Angle, Candidate, HeadlineId, Story, StoryInput};
use crate::words::{sample_inspiration, WordBank};

// =============================================================================
// Configuration
// =============================================================================

/// Provider/model per stage, fixed for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRoutes {
    pub brainstorm: ModelRoute,
    pub generate: ModelRoute,
    pub tournament: ModelRoute,
}

impl Default for StageRoutes {
    fn default() -> Self {
        Self {
            brainstorm: ModelRoute::new(ProviderId::Anthropic, "claude-sonnet-4-5"),
            generate: ModelRoute::new(ProviderId::Anthropic, "claude-sonnet-4-5"),
            tournament: ModelRoute::new(ProviderId::OpenRouter, "google/gemini-2.5-flash-lite"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub routes: StageRoutes,
    pub retry: RetryPolicy,
    /// Wall-clock budget for one story, all stages included.
    pub story_timeout: Duration,
    /// Angles to ask for (clamped to 4-5).
    pub angle_count: usize,
    /// Inspiration words handed to the brainstormer (3-6).
    pub inspiration_words: usize,
    pub top_k: usize,
    /// Fixed Swiss round count; `None` uses `ceil(log2 N) + 2`.
    pub tournament_rounds: Option<u32>,
    pub comparison_concurrency: usize,
    pub symmetry_probe: bool,
    /// Reject configs where the judge shares a vendor with a writing stage.
    pub require_independent_judge: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            routes: StageRoutes::default(),
            retry: RetryPolicy::default(),
            story_timeout: Duration::from_secs(300),
            angle_count: 5,
            inspiration_words: 4,
            top_k: DEFAULT_TOP_K,
            tournament_rounds: None,
            comparison_concurrency: 4,
            symmetry_probe: false,
            require_independent_judge: false,
        }
    }
}

/// Which writing stages the judge is not independent of.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JudgeIndependence {
    /// Stages routed to exactly the judge's provider and model.
    pub same_model_as: Vec<&'static str>,
    /// Stages whose model comes from the judge's vendor.
    pub same_vendor_as: Vec<&'static str>,
}

impl JudgeIndependence {
    pub fn is_independent(&self) -> bool {
        self.same_model_as.is_empty() && self.same_vendor_as.is_empty()
    }
}

impl PipelineConfig {
    pub fn judge_independence(&self) -> JudgeIndependence {
        let judge = &self.routes.tournament;
        let mut report = JudgeIndependence::default();
        for (stage, route) in [
            ("brainstorm", &self.routes.brainstorm),
            ("generate", &self.routes.generate),
        ] {
            if route == judge {
                report.same_model_as.push(stage);
            }
            if route.vendor().eq_ignore_ascii_case(judge.vendor()) {
                report.same_vendor_as.push(stage);
            }
        }
        report
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.top_k == 0 {
            return Err(PipelineError::InvalidConfig("top_k must be at least 1".into()));
        }
        if self.story_timeout.is_zero() {
            return Err(PipelineError::InvalidConfig(
                "story_timeout must be non-zero".into(),
            ));
        }
        if !(3..=6).contains(&self.inspiration_words) {
            return Err(PipelineError::InvalidConfig(format!(
                "inspiration_words must be 3-6, got {}",
                self.inspiration_words
            )));
        }
        if self.comparison_concurrency == 0 {
            return Err(PipelineError::InvalidConfig(
                "comparison_concurrency must be at least 1".into(),
            ));
        }
        if self.tournament_rounds == Some(0) {
            return Err(PipelineError::InvalidConfig(
                "tournament_rounds must be at least 1".into(),
            ));
        }

        let independence = self.judge_independence();
        if !independence.is_independent() {
            if self.require_independent_judge {
                return Err(PipelineError::InvalidConfig(format!(
                    "judge {} is not independent of: {}",
                    self.routes.tournament,
                    independence.same_vendor_as.join(", ")
                )));
            }
            warn!(
                judge = %self.routes.tournament,
                same_vendor_as = ?independence.same_vendor_as,
                "judge shares a vendor with a writing stage; self-preference bias likely"
            );
        }
        Ok(())
    }

    fn tournament_config(&self) -> TournamentConfig {
        TournamentConfig {
            rounds: self.tournament_rounds,
            top_k: self.top_k,
            concurrency: self.comparison_concurrency,
            symmetry_probe: self.symmetry_probe,
            retry: self.retry.clone(),
        }
    }
}

// =============================================================================
// State and errors
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoryState {
    Pending,
    Brainstorming,
    Generating,
    Ranking,
    Complete,
    Aborted,
}

impl StoryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoryState::Pending => "pending",
            StoryState::Brainstorming => "brainstorming",
            StoryState::Generating => "generating",
            StoryState::Ranking => "ranking",
            StoryState::Complete => "complete",
            StoryState::Aborted => "aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StoryState::Complete | StoryState::Aborted)
    }
}

impl fmt::Display for StoryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("brainstorm produced no usable angles: {reason}")]
    BrainstormExhausted { reason: String },
    #[error("generation produced no candidates across {angles} angles")]
    GenerationExhausted { angles: usize },
    #[error("story budget of {budget:?} exceeded during {stage}")]
    BudgetExceeded { stage: StoryState, budget: Duration },
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

// =============================================================================
// Runs
// =============================================================================

/// A completed story plus what it took to get there.
#[derive(Debug, Clone)]
pub struct StoryRun {
    pub run_id: Uuid,
    pub story: Story,
    pub angles: usize,
    pub candidates: usize,
    pub tournament: TournamentStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct AbortedStory {
    pub source: String,
    pub reason: String,
}

/// Result of a batch run.
#[derive(Debug, Clone, Serialize)]
pub struct Edition {
    /// Completed stories, in input order.
    pub stories: Vec<Story>,
    pub aborted: Vec<AbortedStory>,
    pub leaderboard: Vec<LeaderboardEntry>,
}

struct RunContext {
    run_id: Uuid,
    source: String,
    state: Mutex<StoryState>,
}

impl RunContext {
    fn state(&self) -> StoryState {
        match self.state.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn swap(&self, to: StoryState) -> StoryState {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::replace(&mut *guard, to)
    }
}

#[derive(Clone)]
pub struct Pipeline {
    gateway: Arc<dyn TextGateway>,
    words: Arc<dyn WordBank>,
    config: PipelineConfig,
    observer: Option<Arc<dyn PipelineObserver>>,
}

impl Pipeline {
    pub fn new(
        gateway: Arc<dyn TextGateway>,
        words: Arc<dyn WordBank>,
        config: PipelineConfig,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            gateway,
            words,
            config,
            observer: None,
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run one story to `Complete` (one `Story`) or `Aborted` (an error).
    pub async fn run_story(&self, input: &StoryInput) -> Result<StoryRun, PipelineError> {
        let ctx = RunContext {
            run_id: Uuid::new_v4(),
            source: input.headline.text.clone(),
            state: Mutex::new(StoryState::Pending),
        };
        let span = tracing::info_span!("story", source = %ctx.source, run_id = %ctx.run_id);

        async {
            let budget = self.config.story_timeout;
            let result = match tokio::time::timeout(budget, self.run_stages(&ctx, input)).await {
                Ok(result) => result,
                Err(_) => Err(PipelineError::BudgetExceeded {
                    stage: ctx.state(),
                    budget,
                }),
            };

            match result {
                Ok(run) => {
                    self.transition(&ctx, StoryState::Complete, None).await;
                    info!(headline = %run.story.headline, candidates = run.candidates, "story complete");
                    Ok(run)
                }
                Err(err) => {
                    warn!(error = %err, "story aborted");
                    self.transition(&ctx, StoryState::Aborted, Some(err.to_string()))
                        .await;
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run_stages(
        &self,
        ctx: &RunContext,
        input: &StoryInput,
    ) -> Result<StoryRun, PipelineError> {
        let headline = input.headline.text.as_str();
        let routes = &self.config.routes;

        // --- Brainstorm ---
        self.transition(ctx, StoryState::Brainstorming, None).await;
        let words = sample_inspiration(self.words.as_ref(), self.config.inspiration_words);
        let requested = clamp_angle_count(self.config.angle_count);
        let attempted = with_retries(&self.config.retry, "pipeline::brainstorm", || {
            brainstorm_angles(
                self.gateway.as_ref(),
                &routes.brainstorm,
                headline,
                &words,
                requested,
                self.attribution(ctx, "pipeline::brainstorm"),
            )
        })
        .await;

        let angles = match attempted.result {
            Ok(angles) if angles.is_empty() => {
                return Err(PipelineError::BrainstormExhausted {
                    reason: "reply held no angles".into(),
                })
            }
            Ok(angles) => angles,
            Err(err) => {
                return Err(PipelineError::BrainstormExhausted {
                    reason: err.to_string(),
                })
            }
        };
        if angles.len() < requested {
            warn!(requested, got = angles.len(), "brainstorm returned fewer angles");
        }

        // --- Generate ---
        self.transition(ctx, StoryState::Generating, None).await;
        let angles: Vec<Arc<Angle>> = angles.into_iter().map(Arc::new).collect();
        let per_angle: Vec<_> = stream::iter(angles.clone())
            .map(|angle| async move {
                let attempted = with_retries(&self.config.retry, "pipeline::generate", || {
                    generate_headlines(
                        self.gateway.as_ref(),
                        &routes.generate,
                        headline,
                        &angle,
                        self.attribution(ctx, "pipeline::generate"),
                    )
                })
                .await;
                (angle, attempted.result)
            })
            .buffered(angles.len().max(1))
            .collect()
            .await;

        let mut pool = Vec::new();
        for (angle, result) in per_angle {
            match result {
                Ok(texts) if texts.is_empty() => {
                    warn!(angle = %angle.name, "angle produced no headlines")
                }
                Ok(texts) => {
                    for text in texts {
                        let seed = pool.len();
                        pool.push(Candidate {
                            headline_id: HeadlineId::new(),
                            text,
                            angle: angle.clone(),
                            generated_by: routes.generate.clone(),
                            seed,
                        });
                    }
                }
                Err(err) => warn!(angle = %angle.name, error = %err, "angle generation failed"),
            }
        }
        if pool.is_empty() {
            return Err(PipelineError::GenerationExhausted {
                angles: angles.len(),
            });
        }
        let candidates = pool.len();

        // --- Rank ---
        self.transition(ctx, StoryState::Ranking, None).await;
        let outcome = run_tournament(
            self.gateway.as_ref(),
            &routes.tournament,
            headline,
            pool,
            &self.config.tournament_config(),
            self.attribution(ctx, "tournament::compare"),
            self.observer.as_deref(),
        )
        .await;

        let story = Story::assemble(input, &outcome.ranked, Utc::now()).ok_or(
            PipelineError::GenerationExhausted {
                angles: angles.len(),
            },
        )?;

        Ok(StoryRun {
            run_id: ctx.run_id,
            story,
            angles: angles.len(),
            candidates,
            tournament: outcome.stats,
        })
    }

    fn attribution(&self, ctx: &RunContext, caller: &'static str) -> Attribution {
        Attribution::new(caller).with_run(ctx.run_id)
    }

    async fn transition(&self, ctx: &RunContext, to: StoryState, detail: Option<String>) {
        let from = ctx.swap(to);
        tracing::debug!(%from, %to, "story transition");
        if let Some(observer) = &self.observer {
            notify(observer.on_transition(TransitionEvent {
                run_id: ctx.run_id,
                source: ctx.source.clone(),
                from,
                to,
                detail,
            }))
            .await;
        }
    }

    /// Run every story as its own task and feed finished stories to a
    /// leaderboard aggregator. One story's failure never touches another.
    pub async fn run_edition(&self, inputs: Vec<StoryInput>, leaderboard_capacity: usize) -> Edition {
        let (tx, rx) = mpsc::channel::<Story>(inputs.len().max(1));
        let aggregator = spawn_aggregator(rx, leaderboard_capacity);

        let mut tasks = JoinSet::new();
        for (index, input) in inputs.into_iter().enumerate() {
            let pipeline = self.clone();
            let tx = tx.clone();
            tasks.spawn(async move {
                let result = pipeline.run_story(&input).await;
                if let Ok(run) = &result {
                    if tx.send(run.story.clone()).await.is_err() {
                        warn!("leaderboard aggregator gone; story not ranked globally");
                    }
                }
                (index, input.headline.text, result.map(|run| run.story))
            });
        }
        drop(tx);

        let mut finished = Vec::new();
        let mut aborted = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, _, Ok(story))) => finished.push((index, story)),
                Ok((_, source, Err(err))) => aborted.push(AbortedStory {
                    source,
                    reason: err.to_string(),
                }),
                Err(err) => aborted.push(AbortedStory {
                    source: String::new(),
                    reason: format!("story task failed: {err}"),
                }),
            }
        }
        finished.sort_by_key(|(index, _)| *index);

        let leaderboard = match aggregator.await {
            Ok(board) => board.snapshot(),
            Err(err) => {
                warn!(error = %err, "leaderboard aggregator failed");
                Vec::new()
            }
        };

        Edition {
            stories: finished.into_iter().map(|(_, story)| story).collect(),
            aborted,
            leaderboard,
        }
    }
}
