//! Global leaderboard over finished stories.
//!
//! Fed by message passing from completed runs; never writes back into the
//! pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::types::{HeadlineId, Story};

pub const DEFAULT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub headline_id: HeadlineId,
    pub headline: String,
    pub angle: String,
    pub rank: usize,
    pub year_month_day: String,
    pub completed_at: DateTime<Utc>,
}

/// Best `capacity` headlines by (rank asc, recency desc, headline id).
#[derive(Debug, Clone)]
pub struct Leaderboard {
    capacity: usize,
    entries: Vec<LeaderboardEntry>,
}

impl Default for Leaderboard {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Leaderboard {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Vec::new(),
        }
    }

    /// Add every ranked headline of a finished story.
    pub fn insert_story(&mut self, story: &Story) {
        let winner = story.winner_summary();
        let rows = std::iter::once(&winner).chain(story.sibling_headlines.iter());
        self.entries.extend(rows.map(|h| LeaderboardEntry {
            headline_id: h.headline_id,
            headline: h.headline.clone(),
            angle: h.angle.clone(),
            rank: h.rank,
            year_month_day: h.year_month_day.clone(),
            completed_at: story.completed_at,
        }));

        self.entries.sort_by(|a, b| {
            a.rank
                .cmp(&b.rank)
                .then(b.completed_at.cmp(&a.completed_at))
                .then(a.headline_id.cmp(&b.headline_id))
        });
        self.entries.truncate(self.capacity);
    }

    pub fn snapshot(&self) -> Vec<LeaderboardEntry> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Consume finished stories until every sender is dropped, then hand back
/// the board.
pub fn spawn_aggregator(mut rx: mpsc::Receiver<Story>, capacity: usize) -> JoinHandle<Leaderboard> {
    tokio::spawn(async move {
        let mut board = Leaderboard::new(capacity);
        while let Some(story) = rx.recv().await {
            board.insert_story(&story);
            tracing::debug!(entries = board.len(), headline = %story.headline, "leaderboard updated");
        }
        board
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HeadlineSummary;
    use chrono::Duration;

    fn story(winner: &str, siblings: usize, completed_at: DateTime<Utc>) -> Story {
        let sibling_headlines = (0..siblings)
            .map(|i| HeadlineSummary {
                headline_id: HeadlineId::new(),
                headline: format!("{winner} sibling {i}"),
                angle: "pun".into(),
                rank: i + 2,
                year_month_day: "20240307".into(),
            })
            .collect();
        Story {
            year_month_day: "20240307".into(),
            headline: winner.into(),
            headline_id: HeadlineId::new(),
            angle: "pun".into(),
            angle_setup: String::new(),
            sibling_headlines,
            original_headline: "orig".into(),
            source: "src".into(),
            description: String::new(),
            content: String::new(),
            url: String::new(),
            image_url: String::new(),
            published_at: completed_at,
            completed_at,
        }
    }

    #[test]
    fn orders_by_rank_then_recency() {
        let now = Utc::now();
        let mut board = Leaderboard::new(64);
        board.insert_story(&story("older", 1, now - Duration::hours(1)));
        board.insert_story(&story("newer", 1, now));

        let heads: Vec<_> = board.snapshot().into_iter().map(|e| e.headline).collect();
        assert_eq!(
            heads,
            ["newer", "older", "newer sibling 0", "older sibling 0"]
        );
    }

    #[test]
    fn capacity_is_enforced() {
        let now = Utc::now();
        let mut board = Leaderboard::new(3);
        for i in 0..5 {
            board.insert_story(&story(&format!("s{i}"), 2, now + Duration::seconds(i)));
        }
        let snap = board.snapshot();
        assert_eq!(snap.len(), 3);
        assert!(snap.iter().all(|e| e.rank == 1));
        assert_eq!(snap[0].headline, "s4");
    }

    #[tokio::test]
    async fn aggregator_drains_channel() {
        let (tx, rx) = mpsc::channel(4);
        let handle = spawn_aggregator(rx, DEFAULT_CAPACITY);
        tx.send(story("a", 0, Utc::now())).await.unwrap();
        tx.send(story("b", 0, Utc::now())).await.unwrap();
        drop(tx);
        let board = handle.await.unwrap();
        assert_eq!(board.len(), 2);
    }
}
