//! Auth session context
//!
//! Tracks who is signed in. The state starts as `Unknown` until
//! [`AuthSession::initialize`] has checked the stored tokens, and observers
//! (route guards, prompts) follow it through a `watch` channel.

use crate::cached_client::ApiCache;
use crate::client::EventApi;
use crate::error::ApiError;
use crate::token_store::TokenStore;
use crate::transport::TransportEvent;
use crate::types::{LoginRequest, RegisterRequest, TokenPair, User};
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

/// Who is signed in
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    /// Stored tokens have not been checked yet
    #[default]
    Unknown,
    Authenticated(User),
    Anonymous,
}

impl SessionState {
    pub fn user(&self) -> Option<&User> {
        match self {
            SessionState::Authenticated(user) => Some(user),
            _ => None,
        }
    }
}

/// Session lifecycle over an [`EventApi`]
pub struct AuthSession {
    api: Arc<dyn EventApi>,
    tokens: Arc<dyn TokenStore>,
    cache: Arc<ApiCache>,
    state: watch::Sender<SessionState>,
}

impl AuthSession {
    pub fn new(
        api: Arc<dyn EventApi>,
        tokens: Arc<dyn TokenStore>,
        cache: Arc<ApiCache>,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Unknown);
        Self {
            api,
            tokens,
            cache,
            state,
        }
    }

    /// Resolve the session from stored tokens
    ///
    /// With an access token, asks the server who it belongs to; a failure
    /// clears the tokens. Without one the session is anonymous.
    pub async fn initialize(&self) -> SessionState {
        if self.tokens.access_token().is_none() {
            debug!("No stored access token");
            self.set(SessionState::Anonymous);
            return self.state();
        }

        match self.api.me().await {
            Ok(user) => {
                info!("Restored session for {}", user.email);
                self.set(SessionState::Authenticated(user));
            }
            Err(e) => {
                warn!("Stored session is not valid: {}", e);
                self.tokens.clear();
                self.set(SessionState::Anonymous);
            }
        }
        self.state()
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<User, ApiError> {
        let response = self.api.login(request).await?;
        Ok(self.sign_in(response.tokens(), response.user))
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<User, ApiError> {
        let response = self.api.register(request).await?;
        Ok(self.sign_in(response.tokens(), response.user))
    }

    fn sign_in(&self, tokens: TokenPair, user: User) -> User {
        self.tokens.store(&tokens);
        // Never serve one user's cached data to another
        self.cache.clear();
        info!("Signed in as {}", user.email);
        self.set(SessionState::Authenticated(user.clone()));
        user
    }

    /// End the session
    ///
    /// The server is told on a best-effort basis; tokens and cached data are
    /// dropped whatever it answers.
    pub async fn logout(&self) {
        if let Err(e) = self.api.logout().await {
            warn!("Logout request failed, signing out locally: {}", e);
        }
        self.tokens.clear();
        self.cache.clear();
        info!("Signed out");
        self.set(SessionState::Anonymous);
    }

    /// Transport gave up on the session (refresh failed)
    pub fn expire(&self) {
        self.tokens.clear();
        self.cache.clear();
        if self.is_authenticated() {
            info!("Session expired");
        }
        self.set(SessionState::Anonymous);
    }

    /// Follow transport events, expiring the session when asked to
    pub fn watch_transport(
        self: &Arc<Self>,
        mut events: broadcast::Receiver<TransportEvent>,
    ) -> JoinHandle<()> {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(TransportEvent::SessionExpired) => session.expire(),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("Missed {} transport events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(*self.state.borrow(), SessionState::Authenticated(_))
    }

    /// Whether the initial token check is still outstanding
    pub fn is_loading(&self) -> bool {
        matches!(*self.state.borrow(), SessionState::Unknown)
    }

    pub fn user(&self) -> Option<User> {
        self.state.borrow().user().cloned()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    fn set(&self, state: SessionState) {
        self.state.send_replace(state);
    }
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
