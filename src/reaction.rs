//! Likes, dislikes and comments on one event, as seen by one user.
//!
//! The server owns the aggregate. Each command sends an intent, waits for the
//! server's answer and only then touches the local view; counts are always
//! copied from the answer, never computed here. A failed command returns the
//! error and leaves the view as it was.

use tracing::warn;

use crate::campus::{Bearer, CampusApi, Comment, EventReview};
use crate::error::Result;
use crate::form::ValidationError;

/// A user's reaction to one event. Liking and disliking are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reaction {
    #[default]
    Neutral,
    Liked,
    Disliked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Like,
    Unlike,
    Dislike,
    Undislike,
}

impl Reaction {
    pub fn of(review: &EventReview, user_id: &str) -> Self {
        if review.liked_by(user_id) {
            Reaction::Liked
        } else if review.disliked_by(user_id) {
            Reaction::Disliked
        } else {
            Reaction::Neutral
        }
    }

    /// State once the server has accepted `intent`.
    pub fn after(self, intent: Intent) -> Self {
        match (self, intent) {
            (_, Intent::Like) => Reaction::Liked,
            (_, Intent::Dislike) => Reaction::Disliked,
            (Reaction::Liked, Intent::Unlike) | (Reaction::Disliked, Intent::Undislike) => {
                Reaction::Neutral
            }
            (state, _) => state,
        }
    }

    /// What pressing "like" means from this state.
    pub fn like_intent(self) -> Intent {
        match self {
            Reaction::Liked => Intent::Unlike,
            _ => Intent::Like,
        }
    }

    pub fn dislike_intent(self) -> Intent {
        match self {
            Reaction::Disliked => Intent::Undislike,
            _ => Intent::Dislike,
        }
    }
}

/// Local mirror of an event's review for the signed-in user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewView {
    pub event_id: String,
    pub likes: u32,
    pub dislikes: u32,
    pub reaction: Reaction,
    pub comments: Vec<Comment>,
}

impl ReviewView {
    pub fn from_review(review: &EventReview, user_id: &str) -> Self {
        Self {
            event_id: review.event_id.clone(),
            likes: review.likes,
            dislikes: review.dislikes,
            reaction: Reaction::of(review, user_id),
            comments: review.comments.clone(),
        }
    }

    /// Fetches the review. Any failure degrades to an empty view.
    pub async fn load<A>(api: &A, auth: &Bearer, event_id: &str, user_id: &str) -> Self
    where
        A: CampusApi + ?Sized,
    {
        match api.review(auth, event_id).await {
            Ok(review) => {
                let mut view = Self::from_review(&review, user_id);
                view.event_id = event_id.to_string();
                view
            }
            Err(e) => {
                warn!("Failed to load review for {event_id}: {e}");
                Self {
                    event_id: event_id.to_string(),
                    ..Self::default()
                }
            }
        }
    }

    fn reconcile(&mut self, review: &EventReview, intent: Intent) {
        self.likes = review.likes;
        self.dislikes = review.dislikes;
        self.reaction = self.reaction.after(intent);
    }

    pub async fn apply<A>(&mut self, api: &A, auth: &Bearer, user_id: &str, intent: Intent) -> Result<()>
    where
        A: CampusApi + ?Sized,
    {
        let event_id = self.event_id.as_str();
        let review = match intent {
            Intent::Like => api.like(auth, event_id, user_id).await?,
            Intent::Unlike => api.unlike(auth, event_id, user_id).await?,
            Intent::Dislike => api.dislike(auth, event_id, user_id).await?,
            Intent::Undislike => api.undislike(auth, event_id, user_id).await?,
        };
        self.reconcile(&review, intent);
        Ok(())
    }

    pub async fn toggle_like<A>(&mut self, api: &A, auth: &Bearer, user_id: &str) -> Result<()>
    where
        A: CampusApi + ?Sized,
    {
        let intent = self.reaction.like_intent();
        self.apply(api, auth, user_id, intent).await
    }

    pub async fn toggle_dislike<A>(&mut self, api: &A, auth: &Bearer, user_id: &str) -> Result<()>
    where
        A: CampusApi + ?Sized,
    {
        let intent = self.reaction.dislike_intent();
        self.apply(api, auth, user_id, intent).await
    }

    /// Replaces the comment list only. Counts and reaction are left alone.
    pub async fn refresh_comments<A>(&mut self, api: &A, auth: &Bearer) -> Result<()>
    where
        A: CampusApi + ?Sized,
    {
        self.comments = api.comments(auth, &self.event_id).await?;
        Ok(())
    }

    /// Posts a comment, then re-reads the review so counts and ordering come
    /// from the server. If that re-read fails the new comment is shown first.
    pub async fn submit_comment<A>(
        &mut self,
        api: &A,
        auth: &Bearer,
        user_id: &str,
        author_name: &str,
        text: &str,
    ) -> Result<Comment>
    where
        A: CampusApi + ?Sized,
    {
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError::EmptyComment.into());
        }
        let author = if author_name.is_empty() { "Anonymous" } else { author_name };

        let comment = api.add_comment(auth, &self.event_id, author, text).await?;
        match api.review(auth, &self.event_id).await {
            Ok(review) => {
                let event_id = std::mem::take(&mut self.event_id);
                *self = Self::from_review(&review, user_id);
                self.event_id = event_id;
            }
            Err(e) => {
                warn!("Failed to refresh review after comment: {e}");
                self.comments.insert(0, comment.clone());
            }
        }
        Ok(comment)
    }
}
