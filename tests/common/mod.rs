#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use campus_events::campus::event::EventDraft;
use campus_events::campus::user::{
    Claims, Introspection, LoginResponse, PasswordChange, Profile, Registered, Registration,
};
use campus_events::campus::{
    Bearer, CampusApi, CampusEvent, Comment, EventReview, EventStatus, Role, Schedule, User,
};
use campus_events::{Error, Result, Session, SessionStore};
use chrono::{DateTime, Duration, Utc};
use tempfile::TempDir;

/// In-memory server. Tokens are `token-<user id>`.
#[derive(Default)]
pub struct FakeApi {
    state: Mutex<State>,
}

#[derive(Default)]
pub struct State {
    /// Every call fails as if the server were down.
    pub offline: bool,
    /// Writes are answered with a 500.
    pub fail_writes: bool,
    /// Review reads are answered with a 500.
    pub fail_review_reads: bool,
    /// Login responses carry the user's claims.
    pub embed_user: bool,
    pub accounts: HashMap<String, (String, User)>,
    pub revoked: Vec<String>,
    pub events: Vec<CampusEvent>,
    pub reviews: HashMap<String, EventReview>,
    pub pictures: HashMap<String, String>,
    pub registrations: Vec<Registration>,
    pub calls: Vec<String>,
    next_id: u32,
}

pub fn token_for(user: &User) -> String {
    format!("token-{}", user.id)
}

fn claims(user: &User) -> Claims {
    Claims {
        sub: Some(user.id.clone()),
        id: None,
        email: Some(user.email.clone()),
        role: Some(match user.role {
            Role::Admin => "admin".into(),
            Role::Student => "student".into(),
        }),
        name: Some(user.name.clone()),
        institute: user.institute.clone(),
        phone_number: user.phone_number.clone(),
    }
}

fn server_error() -> Error {
    Error::Api {
        status: 500,
        message: "Internal Server Error".into(),
    }
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn with_account(self, user: &User, password: &str) -> Self {
        self.state()
            .accounts
            .insert(user.email.clone(), (password.into(), user.clone()));
        self
    }

    pub fn with_events(self, events: Vec<CampusEvent>) -> Self {
        self.state().events = events;
        self
    }

    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    fn authorize(&self, auth: &Bearer) -> Result<User> {
        let state = self.state();
        if state.offline {
            return Err(Error::Unreachable("fake".into()));
        }
        if state.revoked.iter().any(|t| t == auth.token()) {
            return Err(Error::Api {
                status: 401,
                message: "Invalid token".into(),
            });
        }
        state
            .accounts
            .values()
            .map(|(_, user)| user)
            .find(|user| token_for(user) == auth.token())
            .cloned()
            .ok_or(Error::Api {
                status: 401,
                message: "Invalid token".into(),
            })
    }

    fn write(&self, auth: &Bearer, call: String) -> Result<MutexGuard<'_, State>> {
        self.authorize(auth)?;
        let mut state = self.state();
        state.calls.push(call);
        if state.fail_writes {
            return Err(server_error());
        }
        Ok(state)
    }

    fn react(
        &self,
        auth: &Bearer,
        event_id: &str,
        user_id: &str,
        verb: &str,
    ) -> Result<EventReview> {
        let mut state = self.write(auth, format!("{verb} {event_id}"))?;
        let review = state
            .reviews
            .entry(event_id.to_string())
            .or_insert_with(|| EventReview::empty(event_id));

        match verb {
            "like" => {
                review.liked_by.retain(|id| id != user_id);
                review.disliked_by.retain(|id| id != user_id);
                review.liked_by.push(user_id.to_string());
            }
            "dislike" => {
                review.liked_by.retain(|id| id != user_id);
                review.disliked_by.retain(|id| id != user_id);
                review.disliked_by.push(user_id.to_string());
            }
            "unlike" => review.liked_by.retain(|id| id != user_id),
            _ => review.disliked_by.retain(|id| id != user_id),
        }
        review.likes = review.liked_by.len() as u32;
        review.dislikes = review.disliked_by.len() as u32;
        Ok(review.clone())
    }
}

#[async_trait]
impl CampusApi for FakeApi {
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse> {
        let state = self.state();
        if state.offline {
            return Err(Error::Unreachable("fake".into()));
        }
        match state.accounts.get(email) {
            Some((expected, user)) if expected == password => Ok(LoginResponse {
                access_token: token_for(user),
                refresh_token: Some(format!("refresh-{}", user.id)),
                user: state.embed_user.then(|| claims(user)),
            }),
            _ => Err(Error::Api {
                status: 401,
                message: "Invalid credentials".into(),
            }),
        }
    }

    async fn register(&self, registration: &Registration) -> Result<Registered> {
        let mut state = self.state();
        state.registrations.push(registration.clone());
        Ok(Registered {
            id: format!("u{}", state.registrations.len()),
            email: registration.email.clone(),
        })
    }

    async fn introspect(&self, auth: &Bearer) -> Result<Introspection> {
        match self.authorize(auth) {
            Ok(user) => Ok(Introspection {
                active: true,
                payload: Some(claims(&user)),
            }),
            Err(Error::Api { .. }) => Ok(Introspection::default()),
            Err(e) => Err(e),
        }
    }

    async fn change_password(&self, auth: &Bearer, change: &PasswordChange) -> Result<()> {
        let user = self.authorize(auth)?;
        let mut state = self.write(auth, "change-password".into())?;
        let account = state.accounts.get_mut(&user.email).ok_or(Error::NotFound)?;
        if account.0 != change.current_password {
            return Err(Error::Api {
                status: 400,
                message: "Current password is incorrect".into(),
            });
        }
        account.0 = change.new_password.clone();
        Ok(())
    }

    async fn events(&self, auth: &Bearer) -> Result<Vec<CampusEvent>> {
        self.authorize(auth)?;
        Ok(self.state().events.clone())
    }

    async fn event(&self, auth: &Bearer, event_id: &str) -> Result<CampusEvent> {
        self.authorize(auth)?;
        self.state()
            .events
            .iter()
            .find(|e| e.id == event_id)
            .cloned()
            .ok_or(Error::NotFound)
    }

    async fn create_event(&self, auth: &Bearer, draft: &EventDraft) -> Result<CampusEvent> {
        let mut state = self.write(auth, format!("create {}", draft.title))?;
        state.next_id += 1;
        let event = CampusEvent {
            id: format!("new-{}", state.next_id),
            title: draft.title.clone(),
            description: draft.description.clone().unwrap_or_default(),
            department: draft.department_id.clone(),
            category: draft.category.clone(),
            location: draft.location.clone(),
            status: EventStatus::Draft,
            tags: draft.tags.clone(),
            capacity: 0,
            reserved: 0,
            schedules: draft.schedules.clone(),
            background_image: draft.background_image.clone(),
        };
        state.events.push(event.clone());
        Ok(event)
    }

    async fn update_event(&self, auth: &Bearer, event_id: &str, draft: &EventDraft) -> Result<()> {
        let mut state = self.write(auth, format!("update {event_id}"))?;
        let event = state
            .events
            .iter_mut()
            .find(|e| e.id == event_id)
            .ok_or(Error::NotFound)?;
        event.title = draft.title.clone();
        event.department = draft.department_id.clone();
        event.schedules = draft.schedules.clone();
        Ok(())
    }

    async fn delete_event(&self, auth: &Bearer, event_id: &str) -> Result<()> {
        let mut state = self.write(auth, format!("delete {event_id}"))?;
        state.events.retain(|e| e.id != event_id);
        Ok(())
    }

    async fn set_event_status(
        &self,
        auth: &Bearer,
        event_id: &str,
        status: EventStatus,
    ) -> Result<()> {
        let mut state = self.write(auth, format!("status {event_id} {status}"))?;
        let event = state
            .events
            .iter_mut()
            .find(|e| e.id == event_id)
            .ok_or(Error::NotFound)?;
        event.status = status;
        Ok(())
    }

    async fn review(&self, auth: &Bearer, event_id: &str) -> Result<EventReview> {
        self.authorize(auth)?;
        let state = self.state();
        if state.fail_review_reads {
            return Err(server_error());
        }
        Ok(state
            .reviews
            .get(event_id)
            .cloned()
            .unwrap_or_else(|| EventReview::empty(event_id)))
    }

    async fn reviews(&self, auth: &Bearer) -> Result<Vec<EventReview>> {
        self.authorize(auth)?;
        let state = self.state();
        if state.fail_review_reads {
            return Err(server_error());
        }
        Ok(state.reviews.values().cloned().collect())
    }

    async fn like(&self, auth: &Bearer, event_id: &str, user_id: &str) -> Result<EventReview> {
        self.react(auth, event_id, user_id, "like")
    }

    async fn unlike(&self, auth: &Bearer, event_id: &str, user_id: &str) -> Result<EventReview> {
        self.react(auth, event_id, user_id, "unlike")
    }

    async fn dislike(&self, auth: &Bearer, event_id: &str, user_id: &str) -> Result<EventReview> {
        self.react(auth, event_id, user_id, "dislike")
    }

    async fn undislike(
        &self,
        auth: &Bearer,
        event_id: &str,
        user_id: &str,
    ) -> Result<EventReview> {
        self.react(auth, event_id, user_id, "undislike")
    }

    async fn comments(&self, auth: &Bearer, event_id: &str) -> Result<Vec<Comment>> {
        Ok(self.review(auth, event_id).await?.comments)
    }

    async fn add_comment(
        &self,
        auth: &Bearer,
        event_id: &str,
        author_name: &str,
        text: &str,
    ) -> Result<Comment> {
        let user = self.authorize(auth)?;
        let mut state = self.write(auth, format!("comment {event_id}"))?;
        state.next_id += 1;
        let comment = Comment {
            id: format!("c{}", state.next_id),
            event_id: event_id.to_string(),
            user_id: user.id,
            user_name: author_name.to_string(),
            comment: text.to_string(),
            created_at: Utc::now(),
        };
        state
            .reviews
            .entry(event_id.to_string())
            .or_insert_with(|| EventReview::empty(event_id))
            .comments
            .insert(0, comment.clone());
        Ok(comment)
    }

    async fn profile(&self, auth: &Bearer, user_id: &str) -> Result<Profile> {
        self.authorize(auth)?;
        let state = self.state();
        let (_, user) = state
            .accounts
            .values()
            .find(|(_, user)| user.id == user_id)
            .ok_or(Error::NotFound)?;
        Ok(Profile {
            id: user.id.clone(),
            email: Some(user.email.clone()),
            name: Some(user.name.clone()),
            profile_picture: state.pictures.get(user_id).cloned(),
        })
    }

    async fn update_profile_picture(
        &self,
        auth: &Bearer,
        user_id: &str,
        picture: Option<&str>,
    ) -> Result<()> {
        let mut state = self.write(auth, format!("picture {user_id}"))?;
        match picture {
            Some(p) => state.pictures.insert(user_id.to_string(), p.to_string()),
            None => state.pictures.remove(user_id),
        };
        Ok(())
    }
}

pub fn student(id: &str, institute: &str) -> User {
    User {
        id: id.into(),
        email: format!("{id}@campus.edu"),
        role: Role::Student,
        name: format!("Student {id}"),
        institute: Some(institute.into()),
        phone_number: None,
    }
}

pub fn admin(id: &str) -> User {
    User {
        id: id.into(),
        email: format!("{id}@campus.edu"),
        role: Role::Admin,
        name: format!("Admin {id}"),
        institute: None,
        phone_number: None,
    }
}

pub fn event(id: &str, department: &str, status: EventStatus, start: DateTime<Utc>) -> CampusEvent {
    CampusEvent {
        id: id.into(),
        title: format!("Event {id}"),
        description: String::new(),
        department: department.into(),
        category: "General".into(),
        location: "Gym".into(),
        status,
        tags: vec![],
        capacity: 100,
        reserved: 0,
        schedules: vec![Schedule {
            start,
            end: start + Duration::hours(2),
            timezone: "UTC".into(),
        }],
        background_image: None,
    }
}

pub fn at(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

/// A session persisted under a fresh temporary directory.
pub fn temp_session() -> (TempDir, Session) {
    let dir = tempfile::tempdir().unwrap();
    let session = Session::load(SessionStore::at(dir.path().join("session.toml"))).unwrap();
    (dir, session)
}

pub fn reload(dir: &TempDir) -> Session {
    Session::load(SessionStore::at(dir.path().join("session.toml"))).unwrap()
}
