//! The signed-in user and their token, with an explicit lifecycle:
//! [`Session::load`] from disk, [`Session::login`] or [`Session::refresh`]
//! against the server, [`Session::clear`] on logout.
//!
//! A token is trusted only after the server vouches for it. When the server
//! cannot be reached, the user last verified for the stored token is reused;
//! when it answers and rejects the token, the session is cleared.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::campus::user::{Claims, Registered};
use crate::campus::{Bearer, CampusApi, User};
use crate::error::{Error, Result};
use crate::form::{PasswordChangeForm, RegistrationForm};

/// What survives between runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    /// Last user the server confirmed for `access_token`.
    pub user: Option<User>,
    /// Profile picture per user id.
    #[serde(default)]
    pub profile_pictures: BTreeMap<String, String>,
}

/// Where [`StoredSession`] lives. Without a path nothing is persisted.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    path: Option<PathBuf>,
}

impl SessionStore {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn in_memory() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn read(&self) -> Result<StoredSession> {
        let Some(path) = &self.path else {
            return Ok(StoredSession::default());
        };
        if !path.exists() {
            return Ok(StoredSession::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content).unwrap_or_else(|e| {
            warn!("Discarding unreadable session file {}: {e}", path.display());
            StoredSession::default()
        }))
    }

    pub fn write(&self, session: &StoredSession) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string(session).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

pub struct Session {
    store: SessionStore,
    stored: StoredSession,
    user: Option<User>,
}

impl Session {
    /// Reads the stored token. Nobody is signed in until [`Session::refresh`].
    pub fn load(store: SessionStore) -> Result<Self> {
        let stored = store.read()?;
        Ok(Self {
            store,
            stored,
            user: None,
        })
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn bearer(&self) -> Option<Bearer> {
        self.stored.access_token.as_deref().map(Bearer::new)
    }

    pub fn has_token(&self) -> bool {
        self.stored.access_token.is_some()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some() && self.has_token()
    }

    /// The token and user for an authenticated call.
    pub fn require(&self) -> Result<(Bearer, &User)> {
        match (self.bearer(), self.user.as_ref()) {
            (Some(bearer), Some(user)) => Ok((bearer, user)),
            _ => Err(Error::Unauthenticated),
        }
    }

    /// Re-checks the stored token with the server.
    pub async fn refresh<A>(&mut self, api: &A) -> Result<Option<&User>>
    where
        A: CampusApi + ?Sized,
    {
        let Some(bearer) = self.bearer() else {
            return Ok(None);
        };

        match api.introspect(&bearer).await {
            Ok(introspection) => match introspection.into_user() {
                Some(user) => {
                    info!("Session verified for {}", user.email);
                    self.stored.user = Some(user.clone());
                    self.user = Some(user);
                    self.store.write(&self.stored)?;
                }
                None => {
                    warn!("Token inactive or missing subject, signing out");
                    self.clear()?;
                }
            },
            Err(e) if e.is_unreachable() => {
                warn!("Cannot verify session ({e}), using last verified user");
                self.user = self.stored.user.clone();
            }
            Err(e) => {
                warn!("Token rejected ({e}), signing out");
                self.clear()?;
            }
        }
        Ok(self.user.as_ref())
    }

    /// Signs in. The user comes from the login response, or failing that from
    /// introspecting the new token.
    pub async fn login<A>(&mut self, api: &A, email: &str, password: &str) -> Result<&User>
    where
        A: CampusApi + ?Sized,
    {
        let response = api.login(email, password).await?;
        let bearer = Bearer::new(response.access_token.clone());

        let user = match response.user.and_then(Claims::into_user) {
            Some(user) => user,
            None => api
                .introspect(&bearer)
                .await?
                .into_user()
                .ok_or(Error::Unauthenticated)?,
        };

        info!("Signed in as {} ({:?})", user.email, user.role);
        self.stored.access_token = Some(response.access_token);
        self.stored.refresh_token = response.refresh_token;
        self.stored.user = Some(user.clone());
        self.store.write(&self.stored)?;
        Ok(self.user.insert(user))
    }

    /// Forgets the tokens and user. Cached profile pictures are kept.
    pub fn clear(&mut self) -> Result<()> {
        self.stored.access_token = None;
        self.stored.refresh_token = None;
        self.stored.user = None;
        self.user = None;
        self.store.write(&self.stored)
    }

    pub fn cached_profile_picture(&self) -> Option<&str> {
        let user = self.user.as_ref()?;
        self.stored.profile_pictures.get(&user.id).map(String::as_str)
    }

    /// The server's picture when it has one (refreshing the cache), the cached
    /// one otherwise.
    pub async fn profile_picture<A>(&mut self, api: &A) -> Option<String>
    where
        A: CampusApi + ?Sized,
    {
        let (bearer, user) = self.require().ok()?;
        let user_id = user.id.clone();

        match api.profile(&bearer, &user_id).await {
            Ok(profile) => {
                if let Some(picture) = profile.profile_picture.filter(|p| !p.is_empty()) {
                    self.stored
                        .profile_pictures
                        .insert(user_id, picture.clone());
                    if let Err(e) = self.store.write(&self.stored) {
                        warn!("Failed to cache profile picture: {e}");
                    }
                    return Some(picture);
                }
            }
            Err(e) => warn!("Profile picture not available, using cache: {e}"),
        }
        self.cached_profile_picture().map(str::to_string)
    }

    /// Uploads (or with `None`, removes) the picture, then updates the cache.
    pub async fn set_profile_picture<A>(&mut self, api: &A, picture: Option<String>) -> Result<()>
    where
        A: CampusApi + ?Sized,
    {
        let (bearer, user) = self.require()?;
        let user_id = user.id.clone();

        api.update_profile_picture(&bearer, &user_id, picture.as_deref())
            .await?;
        match picture {
            Some(p) => self.stored.profile_pictures.insert(user_id, p),
            None => self.stored.profile_pictures.remove(&user_id),
        };
        self.store.write(&self.stored)
    }

    pub async fn change_password<A>(&self, api: &A, form: &PasswordChangeForm) -> Result<()>
    where
        A: CampusApi + ?Sized,
    {
        let change = form.validate()?;
        let (bearer, _) = self.require()?;
        api.change_password(&bearer, &change).await
    }

    /// Creates a student account. Does not sign in.
    pub async fn register<A>(api: &A, form: &RegistrationForm) -> Result<Registered>
    where
        A: CampusApi + ?Sized,
    {
        let registration = form.validate()?;
        api.register(&registration).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campus::Role;

    fn user() -> User {
        User {
            id: "u1".into(),
            email: "ana@campus.edu".into(),
            role: Role::Student,
            name: "Ana".into(),
            institute: Some("FCDSET".into()),
            phone_number: None,
        }
    }

    #[test]
    fn store_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::at(dir.path().join("nested").join("session.toml"));

        let mut stored = StoredSession {
            access_token: Some("tok".into()),
            refresh_token: None,
            user: Some(user()),
            profile_pictures: BTreeMap::new(),
        };
        stored
            .profile_pictures
            .insert("u1".into(), "data:image/png;base64,AAAA".into());
        store.write(&stored).unwrap();

        assert_eq!(store.read().unwrap(), stored);
    }

    #[test]
    fn missing_or_corrupt_files_read_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.toml");
        let store = SessionStore::at(&path);
        assert_eq!(store.read().unwrap(), StoredSession::default());

        std::fs::write(&path, "access_token = [").unwrap();
        assert_eq!(store.read().unwrap(), StoredSession::default());
    }

    #[test]
    fn loaded_session_is_not_authenticated_until_refreshed() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::at(dir.path().join("session.toml"));
        store
            .write(&StoredSession {
                access_token: Some("tok".into()),
                user: Some(user()),
                ..Default::default()
            })
            .unwrap();

        let session = Session::load(store).unwrap();
        assert!(session.has_token());
        assert!(!session.is_authenticated());
        assert!(matches!(session.require(), Err(Error::Unauthenticated)));
    }

    #[test]
    fn in_memory_store_never_touches_disk() {
        let store = SessionStore::in_memory();
        store.write(&StoredSession::default()).unwrap();
        assert!(store.path().is_none());
    }
}
