use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::AUTHORIZATION, Client, Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, error};

use super::event::{CampusEvent, EventDraft, EventRecord, EventStatus};
use super::review::{Comment, EventReview, NewComment, ReactionRequest};
use super::user::{
    Introspection, LoginRequest, LoginResponse, PasswordChange, Profile, Registered, Registration,
};
use crate::config::Config;
use crate::error::{Error, Result};

/// Access token sent as `Authorization: Bearer <token>`.
#[derive(Clone, PartialEq, Eq)]
pub struct Bearer(String);

impl Bearer {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn token(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Bearer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Bearer(..)")
    }
}

/// Every remote operation the client performs. The server owns all state;
/// implementations only move requests and responses.
#[async_trait]
pub trait CampusApi: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse>;
    async fn register(&self, registration: &Registration) -> Result<Registered>;
    async fn introspect(&self, auth: &Bearer) -> Result<Introspection>;
    async fn change_password(&self, auth: &Bearer, change: &PasswordChange) -> Result<()>;

    async fn events(&self, auth: &Bearer) -> Result<Vec<CampusEvent>>;
    async fn event(&self, auth: &Bearer, event_id: &str) -> Result<CampusEvent>;
    async fn create_event(&self, auth: &Bearer, draft: &EventDraft) -> Result<CampusEvent>;
    async fn update_event(&self, auth: &Bearer, event_id: &str, draft: &EventDraft) -> Result<()>;
    async fn delete_event(&self, auth: &Bearer, event_id: &str) -> Result<()>;
    async fn set_event_status(&self, auth: &Bearer, event_id: &str, status: EventStatus)
        -> Result<()>;

    /// A missing review is reported as an empty one.
    async fn review(&self, auth: &Bearer, event_id: &str) -> Result<EventReview>;
    async fn reviews(&self, auth: &Bearer) -> Result<Vec<EventReview>>;
    async fn like(&self, auth: &Bearer, event_id: &str, user_id: &str) -> Result<EventReview>;
    async fn unlike(&self, auth: &Bearer, event_id: &str, user_id: &str) -> Result<EventReview>;
    async fn dislike(&self, auth: &Bearer, event_id: &str, user_id: &str) -> Result<EventReview>;
    async fn undislike(&self, auth: &Bearer, event_id: &str, user_id: &str)
        -> Result<EventReview>;
    async fn comments(&self, auth: &Bearer, event_id: &str) -> Result<Vec<Comment>>;
    async fn add_comment(
        &self,
        auth: &Bearer,
        event_id: &str,
        author_name: &str,
        text: &str,
    ) -> Result<Comment>;

    async fn profile(&self, auth: &Bearer, user_id: &str) -> Result<Profile>;
    async fn update_profile_picture(
        &self,
        auth: &Bearer,
        user_id: &str,
        picture: Option<&str>,
    ) -> Result<()>;
}

/// [`CampusApi`] over HTTP.
pub struct HttpStore {
    client: Client,
    base_url: String,
}

impl HttpStore {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("campus-events/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str, auth: Option<&Bearer>) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!("{method} {url}");
        let builder = self.client.request(method, url);
        match auth {
            Some(bearer) => builder.header(AUTHORIZATION, format!("Bearer {}", bearer.token())),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder, failure: &str) -> Result<Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| self.transport_error(e, failure))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(Error::NotFound);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body).unwrap_or_else(|| failure.to_string());
        error!("{failure}: {} {message}", status.as_u16());
        Err(Error::Api {
            status: status.as_u16(),
            message,
        })
    }

    /// A connection that never completes, including one that stalls mid-body,
    /// counts as the server being unreachable.
    fn transport_error(&self, e: reqwest::Error, failure: &str) -> Error {
        if e.is_connect() || e.is_timeout() {
            error!("{failure}: {e}");
            Error::Unreachable(self.base_url.clone())
        } else {
            Error::Http(e)
        }
    }

    async fn json<T: DeserializeOwned>(&self, builder: RequestBuilder, failure: &str) -> Result<T> {
        let response = self.send(builder, failure).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(e, failure))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, auth: &Bearer, failure: &str) -> Result<T> {
        self.json(self.request(Method::GET, path, Some(auth)), failure)
            .await
    }

    async fn with_body<B, T>(
        &self,
        method: Method,
        path: &str,
        auth: Option<&Bearer>,
        body: &B,
        failure: &str,
    ) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        self.json(self.request(method, path, auth).json(body), failure)
            .await
    }
}

/// `message`, then `error`, from a JSON error body.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["message", "error"]
        .iter()
        .find_map(|key| value.get(key).and_then(Value::as_str))
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl CampusApi for HttpStore {
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse> {
        let body = LoginRequest { email, password };
        self.with_body(Method::POST, "/auth/login", None, &body, "Invalid credentials")
            .await
    }

    async fn register(&self, registration: &Registration) -> Result<Registered> {
        self.with_body(
            Method::POST,
            "/auth/register",
            None,
            registration,
            "Registration failed",
        )
        .await
    }

    async fn introspect(&self, auth: &Bearer) -> Result<Introspection> {
        let builder = self.request(Method::POST, "/auth/introspect", Some(auth));
        self.json(builder, "Token verification failed").await
    }

    async fn change_password(&self, auth: &Bearer, change: &PasswordChange) -> Result<()> {
        let builder = self
            .request(Method::POST, "/auth/change-password", Some(auth))
            .json(change);
        self.send(builder, "Failed to change password").await?;
        Ok(())
    }

    async fn events(&self, auth: &Bearer) -> Result<Vec<CampusEvent>> {
        let records: Vec<EventRecord> = self.get("/events", auth, "Failed to load events").await?;
        Ok(records.into_iter().map(CampusEvent::from).collect())
    }

    async fn event(&self, auth: &Bearer, event_id: &str) -> Result<CampusEvent> {
        let record: EventRecord = self
            .get(&format!("/events/{event_id}"), auth, "Failed to load event")
            .await?;
        Ok(record.into())
    }

    async fn create_event(&self, auth: &Bearer, draft: &EventDraft) -> Result<CampusEvent> {
        let record: EventRecord = self
            .with_body(Method::POST, "/events", Some(auth), draft, "Failed to create event")
            .await?;
        Ok(record.into())
    }

    async fn update_event(&self, auth: &Bearer, event_id: &str, draft: &EventDraft) -> Result<()> {
        let builder = self
            .request(Method::PUT, &format!("/events/{event_id}"), Some(auth))
            .json(draft);
        self.send(builder, "Failed to update event").await?;
        Ok(())
    }

    async fn delete_event(&self, auth: &Bearer, event_id: &str) -> Result<()> {
        let builder = self.request(Method::DELETE, &format!("/events/{event_id}"), Some(auth));
        self.send(builder, "Failed to delete event").await?;
        Ok(())
    }

    async fn set_event_status(
        &self,
        auth: &Bearer,
        event_id: &str,
        status: EventStatus,
    ) -> Result<()> {
        let builder = self
            .request(Method::PATCH, &format!("/events/{event_id}/status"), Some(auth))
            .json(&serde_json::json!({ "status": status }));
        self.send(builder, "Failed to update event status").await?;
        Ok(())
    }

    async fn review(&self, auth: &Bearer, event_id: &str) -> Result<EventReview> {
        match self
            .get(&format!("/events/{event_id}/reviews"), auth, "Failed to load review")
            .await
        {
            Err(Error::NotFound) => Ok(EventReview::empty(event_id)),
            other => other,
        }
    }

    async fn reviews(&self, auth: &Bearer) -> Result<Vec<EventReview>> {
        self.get("/reviews", auth, "Failed to load reviews").await
    }

    async fn like(&self, auth: &Bearer, event_id: &str, user_id: &str) -> Result<EventReview> {
        self.with_body(
            Method::POST,
            &format!("/events/{event_id}/likes"),
            Some(auth),
            &ReactionRequest { user_id },
            "Failed to update like",
        )
        .await
    }

    async fn unlike(&self, auth: &Bearer, event_id: &str, user_id: &str) -> Result<EventReview> {
        let path = format!("/events/{event_id}/likes/{user_id}");
        self.json(
            self.request(Method::DELETE, &path, Some(auth)),
            "Failed to update like",
        )
        .await
    }

    async fn dislike(&self, auth: &Bearer, event_id: &str, user_id: &str) -> Result<EventReview> {
        self.with_body(
            Method::POST,
            &format!("/events/{event_id}/dislikes"),
            Some(auth),
            &ReactionRequest { user_id },
            "Failed to update dislike",
        )
        .await
    }

    async fn undislike(
        &self,
        auth: &Bearer,
        event_id: &str,
        user_id: &str,
    ) -> Result<EventReview> {
        let path = format!("/events/{event_id}/dislikes/{user_id}");
        self.json(
            self.request(Method::DELETE, &path, Some(auth)),
            "Failed to update dislike",
        )
        .await
    }

    async fn comments(&self, auth: &Bearer, event_id: &str) -> Result<Vec<Comment>> {
        self.get(
            &format!("/events/{event_id}/comments"),
            auth,
            "Failed to load comments",
        )
        .await
    }

    async fn add_comment(
        &self,
        auth: &Bearer,
        event_id: &str,
        author_name: &str,
        text: &str,
    ) -> Result<Comment> {
        let builder = self
            .request(Method::POST, &format!("/events/{event_id}/comments"), Some(auth))
            .header("X-User-Name", author_name)
            .json(&NewComment { comment: text });
        self.json(builder, "Failed to submit comment").await
    }

    async fn profile(&self, auth: &Bearer, user_id: &str) -> Result<Profile> {
        self.get(&format!("/users/{user_id}"), auth, "Failed to load profile")
            .await
    }

    async fn update_profile_picture(
        &self,
        auth: &Bearer,
        user_id: &str,
        picture: Option<&str>,
    ) -> Result<()> {
        let builder = self
            .request(Method::PATCH, &format!("/users/{user_id}/profile"), Some(auth))
            .json(&serde_json::json!({ "profilePicture": picture }));
        self.send(builder, "Failed to update profile picture").await?;
        Ok(())
    }
}
