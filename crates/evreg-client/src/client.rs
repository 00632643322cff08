//! Event API trait and cache mode definitions
//!
//! This module defines the `EventApi` trait that all client implementations
//! satisfy, as well as the `CacheMode` enum controlling how the caching
//! decorator uses the query cache.

use crate::error::ApiError;
use crate::types::{
    AuthResponse, CreateEventInput, CreateRegistrationInput, Event, EventListParams, LoginRequest,
    Paginated, PromoCodeRequest, PromoCodeValidation, RegisterRequest, Registration,
    RegistrationListParams, UpdateEventInput, User,
};
use async_trait::async_trait;

/// Cache behavior mode for API clients
///
/// Controls how queries interact with the cache layer.
/// This is set at client construction time, not per-request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CacheMode {
    /// No caching - neither read nor write
    None,

    /// Write-only - skip cache reads, but write responses to cache
    /// Use for "force refresh" to get fresh data while populating cache
    WriteOnly,

    /// Read-only - serve cached values (stale included), only load on a miss
    /// and don't store the result
    ReadOnly,

    /// Full caching - read from cache, write to cache
    #[default]
    ReadWrite,
}

impl CacheMode {
    /// Should we attempt to read from cache before making an API call?
    pub fn should_read(&self) -> bool {
        matches!(self, CacheMode::ReadOnly | CacheMode::ReadWrite)
    }

    /// Should we write API responses to cache?
    pub fn should_write(&self) -> bool {
        matches!(self, CacheMode::WriteOnly | CacheMode::ReadWrite)
    }
}

/// Event registration API
///
/// Implementations can be direct ([`HttpApiClient`](crate::HttpApiClient))
/// or decorated with caching and optimistic updates
/// ([`CachedApiClient`](crate::CachedApiClient)).
///
/// Errors are returned unchanged from the layer that produced them.
#[async_trait]
pub trait EventApi: Send + Sync {
    // === Auth ===

    /// Exchange credentials for a user and token pair
    ///
    /// Does not store the tokens; the session does.
    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ApiError>;

    /// Create an account, returning the new user and its token pair
    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ApiError>;

    /// Tell the server the session ends
    async fn logout(&self) -> Result<(), ApiError>;

    /// The user the current access token belongs to
    async fn me(&self) -> Result<User, ApiError>;

    // === Events ===

    async fn list_events(&self, params: &EventListParams) -> Result<Paginated<Event>, ApiError>;

    async fn get_event(&self, id: &str) -> Result<Event, ApiError>;

    /// Events organized by the signed-in user
    async fn my_events(&self, params: &EventListParams) -> Result<Paginated<Event>, ApiError>;

    async fn create_event(&self, input: &CreateEventInput) -> Result<Event, ApiError>;

    /// Apply a partial update, returning the event as stored by the server
    async fn update_event(&self, id: &str, patch: &UpdateEventInput) -> Result<Event, ApiError>;

    async fn delete_event(&self, id: &str) -> Result<(), ApiError>;

    // === Registrations ===

    async fn list_registrations(
        &self,
        params: &RegistrationListParams,
    ) -> Result<Paginated<Registration>, ApiError>;

    /// Registrations of the signed-in user
    async fn my_registrations(
        &self,
        params: &RegistrationListParams,
    ) -> Result<Paginated<Registration>, ApiError>;

    /// Registrations for one event (organizer view)
    async fn event_registrations(
        &self,
        event_id: &str,
        params: &RegistrationListParams,
    ) -> Result<Paginated<Registration>, ApiError>;

    async fn create_registration(
        &self,
        input: &CreateRegistrationInput,
    ) -> Result<Registration, ApiError>;

    /// Cancel a registration
    ///
    /// `event_id` names the event the registration belongs to; it is not
    /// sent to the server but lets caching layers adjust that event.
    async fn cancel_registration(
        &self,
        registration_id: &str,
        event_id: &str,
    ) -> Result<(), ApiError>;

    /// Whether the signed-in user is registered for `event_id`
    async fn fetch_registration_check(&self, event_id: &str) -> Result<bool, ApiError>;

    /// [`fetch_registration_check`](Self::fetch_registration_check), with any
    /// error read as "not registered"
    async fn check_registration(&self, event_id: &str) -> bool {
        match self.fetch_registration_check(event_id).await {
            Ok(registered) => registered,
            Err(e) => {
                log::debug!("Registration check for {} failed: {}", event_id, e);
                false
            }
        }
    }

    // === Promo codes ===

    async fn validate_promo_code(
        &self,
        request: &PromoCodeRequest,
    ) -> Result<PromoCodeValidation, ApiError>;
}
