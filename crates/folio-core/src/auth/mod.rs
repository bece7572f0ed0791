//! Authentication state
//!
//! The backend owns sessions; `AuthContext` is the single local mirror of the
//! current one. It is created explicitly, initialised once (restoring a
//! persisted session, refreshing it when expired), and shut down when its
//! owner goes away. Observers follow changes through `subscribe()`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::local_store::KeyValueStore;

/// Local state key holding the serialized session
pub const SESSION_KEY: &str = "auth.session";

/// Authenticated user as reported by the backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Map<String, Value>,
}

impl User {
    /// Display name stored in the user's metadata
    pub fn display_name(&self) -> Option<&str> {
        self.user_metadata
            .get("display_name")
            .and_then(Value::as_str)
    }

    /// Display name, falling back to the email address
    pub fn label(&self) -> &str {
        self.display_name()
            .or(self.email.as_deref())
            .unwrap_or(self.id.as_str())
    }
}

/// Backend session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Snapshot observed by subscribers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthState {
    pub session: Option<Session>,
    /// True until the first session lookup has settled
    pub loading: bool,
}

impl AuthState {
    pub fn user(&self) -> Option<&User> {
        self.session.as_ref().map(|s| &s.user)
    }
}

/// Session service shared by everything that needs the signed-in user
pub struct AuthContext {
    backend: Arc<dyn Backend>,
    store: Arc<dyn KeyValueStore>,
    state: watch::Sender<AuthState>,
}

impl AuthContext {
    pub fn new(backend: Arc<dyn Backend>, store: Arc<dyn KeyValueStore>) -> Self {
        let (state, _) = watch::channel(AuthState {
            session: None,
            loading: true,
        });
        Self {
            backend,
            store,
            state,
        }
    }

    /// Restore the persisted session, refreshing it if it has expired
    pub async fn init(&self) -> Result<Option<User>> {
        let restored = match self.store.get(SESSION_KEY)? {
            Some(raw) => match serde_json::from_str::<Session>(&raw) {
                Ok(session) => Some(session),
                Err(e) => {
                    warn!(error = %e, "Discarding unreadable persisted session");
                    self.store.remove(SESSION_KEY)?;
                    None
                }
            },
            None => None,
        };

        let session = match restored {
            Some(session) if session.is_expired_at(Utc::now()) => {
                match self.backend.refresh_session(&session.refresh_token).await {
                    Ok(fresh) => {
                        self.persist(&fresh)?;
                        Some(fresh)
                    }
                    Err(e) => {
                        warn!(error = %e, "Session refresh failed, signing out locally");
                        self.store.remove(SESSION_KEY)?;
                        None
                    }
                }
            }
            other => other,
        };

        self.publish(session);
        Ok(self.current_user())
    }

    /// Follow session changes
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn session(&self) -> Option<Session> {
        self.state.borrow().session.clone()
    }

    pub fn current_user(&self) -> Option<User> {
        self.state.borrow().user().cloned()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    /// The signed-in user, or `NotAuthenticated`
    pub fn require_user(&self) -> Result<User> {
        self.current_user().ok_or(Error::NotAuthenticated)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<User> {
        if email.trim().is_empty() {
            return Err(Error::MissingField("email".to_string()));
        }
        if password.is_empty() {
            return Err(Error::MissingField("password".to_string()));
        }

        let session = self.backend.sign_in_with_password(email, password).await?;
        self.persist(&session)?;
        let user = session.user.clone();
        self.publish(Some(session));
        info!(user = %user.label(), "Signed in");
        Ok(user)
    }

    /// Sign out remotely and locally; local state is cleared even if the
    /// remote call fails
    pub async fn logout(&self) -> Result<()> {
        let remote = match self.session() {
            Some(session) => self.backend.sign_out(&session.access_token).await,
            None => Ok(()),
        };
        self.store.remove(SESSION_KEY)?;
        self.publish(None);
        info!("Signed out");
        remote
    }

    /// Merge `metadata` into the signed-in user's metadata
    pub async fn update_profile(&self, metadata: Value) -> Result<User> {
        let mut session = self.session().ok_or(Error::NotAuthenticated)?;
        let user = self
            .backend
            .update_user(&session.access_token, metadata)
            .await?;
        session.user = user.clone();
        self.persist(&session)?;
        self.publish(Some(session));
        Ok(user)
    }

    /// Set the `display_name` shown in the admin panel
    pub async fn set_display_name(&self, name: &str) -> Result<User> {
        if name.trim().is_empty() {
            return Err(Error::MissingField("display_name".to_string()));
        }
        self.update_profile(serde_json::json!({ "display_name": name.trim() }))
            .await
    }

    /// Tear down; subscribers observe the channel closing
    pub fn shutdown(self) {
        self.backend.set_access_token(None);
    }

    fn persist(&self, session: &Session) -> Result<()> {
        self.store
            .set(SESSION_KEY, &serde_json::to_string(session)?)
    }

    fn publish(&self, session: Option<Session>) {
        self.backend
            .set_access_token(session.as_ref().map(|s| s.access_token.clone()));
        self.state.send_replace(AuthState {
            session,
            loading: false,
        });
    }
}
