mod auth;
pub mod models;
pub mod token;

pub use auth::{AuthService, HttpAuthService, InMemoryAuthService};
pub use models::{AuthResponse, Session, SessionState, User};
pub use token::{FileTokenStore, MemoryTokenStore, RedisTokenStore, TokenStore};

use crate::error::CalResult;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{error, info, warn};

/// Owner of the single live session.
///
/// Cloning yields another handle to the same session. State changes are
/// published on a watch channel so the UI can react to forced logouts.
#[derive(Clone)]
pub struct SessionStore {
    tokens: Arc<dyn TokenStore>,
    auth: Arc<dyn AuthService>,
    state: Arc<watch::Sender<SessionState>>,
    // Serializes writes to the token store
    persist: Arc<Mutex<()>>,
}

impl SessionStore {
    /// Create a store in the loading state. Call `hydrate` once at startup.
    pub fn new(tokens: Arc<dyn TokenStore>, auth: Arc<dyn AuthService>) -> Self {
        let (state, _) = watch::channel(SessionState {
            session: None,
            loading: true,
        });
        Self {
            tokens,
            auth,
            state: Arc::new(state),
            persist: Arc::new(Mutex::new(())),
        }
    }

    /// Restore the session persisted by an earlier run.
    ///
    /// A token that no longer verifies (or cannot be verified) is removed,
    /// unless a login replaced it in the meantime. The loading flag is
    /// cleared whatever the outcome.
    pub async fn hydrate(&self) -> Option<User> {
        let restored = match self.tokens.load().await {
            Ok(Some(token)) => match self.auth.verify_token(&token).await {
                Ok(user) => {
                    info!("Restored session for {}", user.email);
                    Some(Session { token, user })
                }
                Err(e) => {
                    warn!("Persisted session is no longer valid: {}", e);
                    self.forget_token(&token).await;
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Could not read persisted session token: {}", e);
                None
            }
        };

        let mut user = None;
        self.state.send_modify(|state| {
            // A login that finished while we were verifying wins
            if state.session.is_none() {
                state.session = restored;
            }
            state.loading = false;
            user = state.user().cloned();
        });
        user
    }

    /// Log in with existing credentials
    pub async fn login(&self, email: &str, password: &str) -> CalResult<User> {
        let response = self.auth.login(email, password).await?;
        Ok(self.establish(response).await)
    }

    /// Create an account and log in to it
    pub async fn signup(&self, email: &str, password: &str) -> CalResult<User> {
        let response = self.auth.signup(email, password).await?;
        Ok(self.establish(response).await)
    }

    /// End the session. Safe to call when nobody is logged in.
    ///
    /// The in-memory session is gone before this first yields, so nothing
    /// observes it while the persisted token is being removed.
    pub async fn logout(&self) -> CalResult<()> {
        let had_session = self.clear_session();
        if had_session {
            info!("Logged out");
        }
        let _guard = self.persist.lock().await;
        self.tokens.clear().await
    }

    /// Drop the session because the remote store rejected `token`.
    ///
    /// Nothing happens if the live session already moved on to another token.
    pub async fn invalidate(&self, token: &str, reason: &str) {
        let mut dropped = false;
        self.state.send_if_modified(|state| {
            if state.session.as_ref().is_some_and(|s| s.token == token) {
                state.session = None;
                dropped = true;
            }
            dropped
        });
        if dropped {
            warn!("Session invalidated: {}", reason);
        }
        self.forget_token(token).await;
    }

    /// Token of the live session
    pub fn token(&self) -> Option<String> {
        self.state.borrow().session.as_ref().map(|s| s.token.clone())
    }

    /// User of the live session
    pub fn user(&self) -> Option<User> {
        self.state.borrow().user().cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().session.is_some()
    }

    /// True until `hydrate` has resolved
    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    /// Current state snapshot
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every session change
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    async fn establish(&self, response: AuthResponse) -> User {
        let AuthResponse { user, token } = response;

        let _guard = self.persist.lock().await;
        // The session still works for this run if persisting fails
        if let Err(e) = self.tokens.save(&token).await {
            error!("Failed to persist session token: {}", e);
        }

        info!("Logged in as {}", user.email);
        self.state.send_modify(|state| {
            state.session = Some(Session {
                token,
                user: user.clone(),
            });
            state.loading = false;
        });
        user
    }

    /// Clear the in-memory session, returning whether there was one
    fn clear_session(&self) -> bool {
        let mut had_session = false;
        self.state.send_if_modified(|state| {
            had_session = state.session.take().is_some();
            had_session
        });
        had_session
    }

    /// Remove the persisted token if it is still `token`
    async fn forget_token(&self, token: &str) {
        let _guard = self.persist.lock().await;
        let result = match self.tokens.load().await {
            Ok(Some(stored)) if stored == token => self.tokens.clear().await,
            Ok(_) => Ok(()),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            error!("Failed to remove persisted session token: {}", e);
        }
    }
}
