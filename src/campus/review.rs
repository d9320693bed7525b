use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::event::CampusEvent;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub event_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

/// Like/dislike counts and comments for one event, as the server reports them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventReview {
    #[serde(default)]
    pub event_id: String,
    #[serde(default)]
    pub likes: u32,
    #[serde(default)]
    pub dislikes: u32,
    #[serde(default)]
    pub liked_by: Vec<String>,
    #[serde(default)]
    pub disliked_by: Vec<String>,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

impl EventReview {
    pub fn empty(event_id: &str) -> Self {
        Self {
            event_id: event_id.to_string(),
            ..Default::default()
        }
    }

    pub fn liked_by(&self, user_id: &str) -> bool {
        self.liked_by.iter().any(|id| id == user_id)
    }

    pub fn disliked_by(&self, user_id: &str) -> bool {
        self.disliked_by.iter().any(|id| id == user_id)
    }

    pub fn has_activity(&self) -> bool {
        self.likes > 0 || self.dislikes > 0 || !self.comments.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionRequest<'a> {
    pub user_id: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewComment<'a> {
    pub comment: &'a str,
}

/// An event paired with its review, if one exists.
#[derive(Debug, Clone)]
pub struct ReviewedEvent {
    pub event: CampusEvent,
    pub review: Option<EventReview>,
}

impl ReviewedEvent {
    fn has_activity(&self) -> bool {
        self.review.as_ref().is_some_and(EventReview::has_activity)
    }
}

/// Pairs events with their reviews. Events with any likes, dislikes or comments
/// come first, the rest follow, both ordered by title.
pub fn rank_by_activity(events: Vec<CampusEvent>, reviews: &[EventReview]) -> Vec<ReviewedEvent> {
    let mut ranked: Vec<ReviewedEvent> = events
        .into_iter()
        .map(|event| {
            let review = reviews.iter().find(|r| r.event_id == event.id).cloned();
            ReviewedEvent { event, review }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.has_activity()
            .cmp(&a.has_activity())
            .then_with(|| a.event.title.cmp(&b.event.title))
    });
    ranked
}
