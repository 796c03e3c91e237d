#![forbid(unsafe_code)]

//! # headline-tournament
//!
//! Turns real-world news headlines into satirical city-newspaper stories.
//!
//! Each source headline goes through three stages: an LLM brainstorms a
//! handful of comedic angles, a writer model drafts headlines per angle, and
//! a Swiss-system tournament of pairwise LLM judgments ranks the pool. The
//! winner becomes the story; the runners-up ride along as siblings and feed a
//! global leaderboard.
//!
//! Ranking is done by direct A-vs-B comparisons instead of asking a model to
//! score headlines, since pairwise verdicts are far more consistent than
//! absolute ratings.

pub mod brainstorm;
pub mod config;
pub mod gateway;
pub mod generate;
pub mod hooks;
pub mod leaderboard;
pub mod pipeline;
pub mod prompts;
mod reply;
pub mod retry;
pub mod tournament;
pub mod trace;
pub mod types;
pub mod words;

pub use config::{AppConfig, ConfigError};
pub use gateway::{
    AnthropicAdapter, Attribution, ChatProvider, CompareRequest, GenerateRequest, ModelRoute,
    OpenRouterAdapter, ProviderError, ProviderGateway, ProviderId, TextGateway, UsageSink,
    Verdict,
};
pub use hooks::{ComparisonEvent, ObserverError, PipelineObserver, TransitionEvent};
pub use leaderboard::{Leaderboard, LeaderboardEntry};
pub use pipeline::{
    AbortedStory, Edition, Pipeline, PipelineConfig, PipelineError, StageRoutes, StoryRun,
    StoryState,
};
pub use retry::RetryPolicy;
pub use tournament::{run_tournament, TournamentConfig, TournamentOutcome};
pub use trace::{ComparisonTrace, JsonlTraceSink, TraceError, TraceSink, TraceWorker};
pub use types::{Angle, Candidate, HeadlineId, RankedCandidate, Story, StoryInput};
pub use words::{StaticWordBank, WordBank};
