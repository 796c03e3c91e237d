//! Domain types shared by every pipeline stage.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::gateway::ModelRoute;

// =============================================================================
// INPUTS
// =============================================================================

/// A real news headline, as ingested. Read-only to the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceHeadline {
    pub text: String,
    pub published_at: DateTime<Utc>,
    pub source_name: String,
}

/// Article fields carried through to the finished story untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArticleDetails {
    pub description: String,
    pub content: String,
    pub url: String,
    pub image_url: String,
}

/// One unit of work for an edition run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryInput {
    pub headline: SourceHeadline,
    #[serde(default)]
    pub article: ArticleDetails,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WordCategory {
    Noun,
    Adjective,
    Place,
    Person,
    Number,
    Other,
}

impl WordCategory {
    pub const ALL: [WordCategory; 6] = [
        WordCategory::Noun,
        WordCategory::Adjective,
        WordCategory::Place,
        WordCategory::Person,
        WordCategory::Number,
        WordCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WordCategory::Noun => "noun",
            WordCategory::Adjective => "adjective",
            WordCategory::Place => "place",
            WordCategory::Person => "person",
            WordCategory::Number => "number",
            WordCategory::Other => "other",
        }
    }
}

impl fmt::Display for WordCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspirationWord {
    pub text: String,
    pub category: WordCategory,
}

impl InspirationWord {
    pub fn new(text: impl Into<String>, category: WordCategory) -> Self {
        Self {
            text: text.into(),
            category,
        }
    }
}

// =============================================================================
// CANDIDATES
// =============================================================================

/// A comedic strategy for rewriting one headline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Angle {
    pub name: String,
    #[serde(default)]
    pub setup: String,
}

impl Angle {
    pub fn new(name: impl Into<String>, setup: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            setup: setup.into(),
        }
    }
}

/// Globally unique headline identifier, minted once at candidate creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeadlineId(pub Uuid);

impl HeadlineId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for HeadlineId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HeadlineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One generated headline in a story's pool.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub headline_id: HeadlineId,
    pub text: String,
    pub angle: Arc<Angle>,
    /// Provider and model that wrote it.
    pub generated_by: ModelRoute,
    /// Position in the pool; only used for pairing and tie-breaks.
    pub seed: usize,
}

/// A candidate after the tournament. `rank` 1 is the winner.
#[derive(Debug, Clone)]
pub struct RankedCandidate {
    pub candidate: Candidate,
    pub rank: usize,
    pub score: f64,
    pub failures: u32,
}

// =============================================================================
// OUTPUTS
// =============================================================================

/// A ranked headline as listed under a story or on the leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadlineSummary {
    pub headline_id: HeadlineId,
    pub headline: String,
    pub angle: String,
    pub rank: usize,
    pub year_month_day: String,
}

impl HeadlineSummary {
    pub fn from_ranked(ranked: &RankedCandidate, year_month_day: &str) -> Self {
        Self {
            headline_id: ranked.candidate.headline_id,
            headline: ranked.candidate.text.clone(),
            angle: ranked.candidate.angle.name.clone(),
            rank: ranked.rank,
            year_month_day: year_month_day.to_string(),
        }
    }
}

/// The finished product for one source headline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
    /// `YYYYMMDD` of the source's publication date.
    pub year_month_day: String,
    /// Rank-1 headline text.
    pub headline: String,
    pub headline_id: HeadlineId,
    pub angle: String,
    pub angle_setup: String,
    /// Every other candidate, ascending by rank.
    pub sibling_headlines: Vec<HeadlineSummary>,
    pub original_headline: String,
    pub source: String,
    pub description: String,
    pub content: String,
    pub url: String,
    pub image_url: String,
    pub published_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl Story {
    /// Assemble a story from a ranking. `ranked` must be sorted by rank and non-empty.
    pub(crate) fn assemble(
        input: &StoryInput,
        ranked: &[RankedCandidate],
        completed_at: DateTime<Utc>,
    ) -> Option<Self> {
        let (winner, siblings) = ranked.split_first()?;
        let year_month_day = input.headline.published_at.format("%Y%m%d").to_string();
        let sibling_headlines = siblings
            .iter()
            .map(|r| HeadlineSummary::from_ranked(r, &year_month_day))
            .collect();

        Some(Self {
            headline: winner.candidate.text.clone(),
            headline_id: winner.candidate.headline_id,
            angle: winner.candidate.angle.name.clone(),
            angle_setup: winner.candidate.angle.setup.clone(),
            sibling_headlines,
            original_headline: input.headline.text.clone(),
            source: input.headline.source_name.clone(),
            description: input.article.description.clone(),
            content: input.article.content.clone(),
            url: input.article.url.clone(),
            image_url: input.article.image_url.clone(),
            published_at: input.headline.published_at,
            completed_at,
            year_month_day,
        })
    }

    /// The winner as a leaderboard row.
    pub fn winner_summary(&self) -> HeadlineSummary {
        HeadlineSummary {
            headline_id: self.headline_id,
            headline: self.headline.clone(),
            angle: self.angle.clone(),
            rank: 1,
            year_month_day: self.year_month_day.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::ProviderId;
    use chrono::TimeZone;

    fn ranked(text: &str, rank: usize, angle: &Arc<Angle>) -> RankedCandidate {
        RankedCandidate {
            candidate: Candidate {
                headline_id: HeadlineId::new(),
                text: text.to_string(),
                angle: angle.clone(),
                generated_by: ModelRoute::new(ProviderId::Anthropic, "claude"),
                seed: rank - 1,
            },
            rank,
            score: 0.0,
            failures: 0,
        }
    }

    #[test]
    fn story_takes_rank_one_as_headline() {
        let angle = Arc::new(Angle::new("pun", "park puns"));
        let input = StoryInput {
            headline: SourceHeadline {
                text: "Mayor Opens New Park".into(),
                published_at: Utc.with_ymd_and_hms(2024, 3, 7, 12, 0, 0).unwrap(),
                source_name: "Gazette".into(),
            },
            article: ArticleDetails {
                image_url: "https://img".into(),
                ..Default::default()
            },
        };
        let pool = vec![ranked("Winner", 1, &angle), ranked("Runner Up", 2, &angle)];

        let story = Story::assemble(&input, &pool, Utc::now()).unwrap();
        assert_eq!(story.headline, "Winner");
        assert_eq!(story.year_month_day, "20240307");
        assert_eq!(story.angle_setup, "park puns");
        assert_eq!(story.sibling_headlines.len(), 1);
        assert_eq!(story.sibling_headlines[0].rank, 2);
        assert_eq!(story.image_url, "https://img");
        assert_eq!(story.original_headline, "Mayor Opens New Park");
    }

    #[test]
    fn empty_ranking_yields_no_story() {
        let input = StoryInput {
            headline: SourceHeadline {
                text: "x".into(),
                published_at: Utc::now(),
                source_name: "y".into(),
            },
            article: ArticleDetails::default(),
        };
        assert!(Story::assemble(&input, &[], Utc::now()).is_none());
    }

    #[test]
    fn headline_ids_are_unique() {
        assert_ne!(HeadlineId::new(), HeadlineId::new());
    }
}
