//! Authenticated API transport
//!
//! [`ApiTransport`] is the only component that talks to the [`HttpBackend`].
//! It attaches the bearer token and the active locale, unwraps envelopes,
//! normalizes failures into [`ApiError`] and performs the single
//! refresh-then-retry on a 401.

use crate::envelope::{parse_success, ApiResponse};
use crate::error::ApiError;
use crate::http::{HttpBackend, HttpMethod, HttpRequest, HttpResponse, ReqwestBackend};
use crate::token_store::TokenStore;
use crate::types::TokenPair;
use evreg_config::AppConfig;
use log::{debug, info, warn};
use serde_json::{json, Value};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub const LOGIN_PATH: &str = "/auth/login";
pub const REGISTER_PATH: &str = "/auth/register";
pub const REFRESH_PATH: &str = "/auth/refresh";

/// A 401 on these paths is a credential failure, not an expired session
const NO_REFRESH_PATHS: [&str; 3] = [LOGIN_PATH, REGISTER_PATH, REFRESH_PATH];

/// Signals emitted by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
    /// The session could not be refreshed and the tokens were cleared
    SessionExpired,
}

/// HTTP client wrapper shared by all accessors
pub struct ApiTransport {
    base_url: String,
    backend: Arc<dyn HttpBackend>,
    tokens: Arc<dyn TokenStore>,
    timeout: Duration,
    locale: RwLock<String>,
    /// Serializes refresh attempts so concurrent 401s refresh once
    refresh_lock: Mutex<()>,
    events: broadcast::Sender<TransportEvent>,
}

impl ApiTransport {
    pub fn new(
        base_url: impl Into<String>,
        backend: Arc<dyn HttpBackend>,
        tokens: Arc<dyn TokenStore>,
    ) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            backend,
            tokens,
            timeout: DEFAULT_TIMEOUT,
            locale: RwLock::new(String::from("en")),
            refresh_lock: Mutex::new(()),
            events,
        }
    }

    /// Transport over `reqwest` using the configured base URL, timeout and locale
    pub fn from_config(config: &AppConfig, tokens: Arc<dyn TokenStore>) -> Self {
        Self::new(
            config.api_base_url.clone(),
            Arc::new(ReqwestBackend::new()),
            tokens,
        )
        .with_timeout(config.request_timeout())
        .with_locale(&config.locale)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_locale(self, locale: &str) -> Self {
        self.set_locale(locale);
        self
    }

    /// Change the `Accept-Language` sent with subsequent requests
    pub fn set_locale(&self, locale: &str) {
        *self.locale.write().unwrap_or_else(PoisonError::into_inner) = locale.to_string();
    }

    pub fn locale(&self) -> String {
        self.locale
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn tokens(&self) -> &Arc<dyn TokenStore> {
        &self.tokens
    }

    /// Receive [`TransportEvent`]s emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.events.subscribe()
    }

    pub async fn get(&self, path: &str, query: &[(String, String)]) -> Result<ApiResponse, ApiError> {
        self.send(HttpMethod::Get, path, None, query).await
    }

    pub async fn post(&self, path: &str, body: Value) -> Result<ApiResponse, ApiError> {
        self.send(HttpMethod::Post, path, Some(body), &[]).await
    }

    pub async fn put(&self, path: &str, body: Value) -> Result<ApiResponse, ApiError> {
        self.send(HttpMethod::Put, path, Some(body), &[]).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.send(HttpMethod::Delete, path, None, &[]).await
    }

    /// Send a request and unwrap its success envelope
    ///
    /// A 401 outside the auth endpoints triggers one token refresh and, if
    /// that succeeds, one retry. A failed refresh clears the tokens, emits
    /// [`TransportEvent::SessionExpired`] and fails with an `Auth` error.
    pub async fn send(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<Value>,
        query: &[(String, String)],
    ) -> Result<ApiResponse, ApiError> {
        let sent_token = self.tokens.access_token();
        let response = self
            .execute(method, path, body.as_ref(), query, sent_token.as_deref())
            .await?;

        if response.status == 401 && !NO_REFRESH_PATHS.contains(&path) {
            debug!("{} {} answered 401, refreshing session", method, path);
            let token = self.refresh_after(sent_token.as_deref()).await?;
            let retried = self
                .execute(method, path, body.as_ref(), query, Some(&token))
                .await?;
            return finish(retried);
        }

        finish(response)
    }

    /// Obtain a usable access token after `stale` was rejected
    async fn refresh_after(&self, stale: Option<&str>) -> Result<String, ApiError> {
        let _guard = self.refresh_lock.lock().await;

        // Another request may have rotated the tokens while we waited
        if let Some(current) = self.tokens.access_token() {
            if Some(current.as_str()) != stale {
                debug!("Access token already refreshed, retrying with it");
                return Ok(current);
            }
        }

        let Some(pair) = self.tokens.load() else {
            return Err(self.expire());
        };

        let body = json!({ "refreshToken": pair.refresh_token });
        let response = match self
            .execute(HttpMethod::Post, REFRESH_PATH, Some(&body), &[], None)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("Token refresh failed: {}", e);
                return Err(self.expire());
            }
        };

        match finish(response).and_then(|r| r.into_data::<TokenPair>()) {
            Ok(fresh) => {
                self.tokens.store(&fresh);
                info!("Session refreshed");
                Ok(fresh.access_token)
            }
            Err(e) => {
                warn!("Token refresh rejected: {}", e);
                Err(self.expire())
            }
        }
    }

    fn expire(&self) -> ApiError {
        self.tokens.clear();
        info!("Session expired, tokens cleared");
        // No subscribers is fine
        let _ = self.events.send(TransportEvent::SessionExpired);
        ApiError::unauthorized()
    }

    async fn execute(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&Value>,
        query: &[(String, String)],
        token: Option<&str>,
    ) -> Result<HttpResponse, ApiError> {
        let mut headers = vec![
            ("Accept".to_string(), "application/json".to_string()),
            ("Accept-Language".to_string(), self.locale()),
        ];
        if let Some(token) = token {
            headers.push(("Authorization".to_string(), format!("Bearer {}", token)));
        }

        let request = HttpRequest {
            method,
            url: format!("{}{}", self.base_url, path),
            query: query.to_vec(),
            headers,
            body: body.cloned(),
        };

        debug!("{} {}", method, request.url);
        match tokio::time::timeout(self.timeout, self.backend.execute(request)).await {
            Ok(Ok(response)) => {
                debug!("{} {} -> {}", method, path, response.status);
                Ok(response)
            }
            Ok(Err(e)) => {
                warn!("{} {} failed: {}", method, path, e);
                Err(ApiError::network())
            }
            Err(_) => {
                warn!("{} {} timed out after {:?}", method, path, self.timeout);
                Err(ApiError::network())
            }
        }
    }
}

impl std::fmt::Debug for ApiTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiTransport")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("locale", &self.locale())
            .finish_non_exhaustive()
    }
}

fn finish(response: HttpResponse) -> Result<ApiResponse, ApiError> {
    if response.is_success() {
        parse_success(response.status, &response.body)
    } else {
        Err(ApiError::from_response(response.status, &response.body))
    }
}
