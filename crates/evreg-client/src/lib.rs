//! Event registration API client with caching and optimistic updates
//!
//! This crate provides a trait-based client for the event registration REST
//! API. Caching follows the decorator pattern: the direct HTTP client and the
//! cached client implement the same trait, so callers never know which one
//! they hold.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                EventApi trait                   │
//! │  - list_events() / get_event()                  │
//! │  - create_event() / update_event() / delete..() │
//! │  - create_registration() / cancel_registration()│
//! └─────────────────────────────────────────────────┘
//!                        │
//!        ┌───────────────┴───────────────┐
//!        ▼                               ▼
//! ┌─────────────────┐         ┌─────────────────────┐
//! │ HttpApiClient   │         │ CachedApiClient     │
//! │ (direct API)    │◄────────│ (decorator)         │
//! └─────────────────┘         └─────────────────────┘
//!        │                               │
//!        ▼                               ▼
//! ┌─────────────────┐         ┌─────────────────────┐
//! │ ApiTransport    │         │ QueryCache +        │
//! │ (tokens, 401)   │         │ OptimisticMutation  │
//! └─────────────────┘         └─────────────────────┘
//! ```
//!
//! [`AuthSession`] sits on top and owns the signed-in state.
//!
//! # Example
//!
//! ```rust,no_run
//! use evreg_client::{
//!     ApiCache, ApiTransport, CacheMode, CachedApiClient, EventApi, EventListParams,
//!     HttpApiClient, MemoryTokenStore,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), evreg_client::ApiError> {
//! let config = evreg_config::AppConfig::default();
//! let transport = Arc::new(ApiTransport::from_config(
//!     &config,
//!     Arc::new(MemoryTokenStore::new()),
//! ));
//!
//! let client = CachedApiClient::new(
//!     HttpApiClient::new(transport),
//!     Arc::new(ApiCache::new()),
//!     CacheMode::ReadWrite,
//! );
//!
//! let page = client.list_events(&EventListParams::default()).await?;
//! println!("{} events", page.items.len());
//! # Ok(())
//! # }
//! ```

pub mod cached_client;
pub mod client;
pub mod envelope;
pub mod error;
pub mod format;
pub mod http;
pub mod http_client;
pub mod optimistic;
pub mod query_keys;
pub mod session;
pub mod token_store;
pub mod transport;
pub mod types;
pub mod validation;

pub use cached_client::{ApiCache, CachedApiClient, EVENT_FULL_MESSAGE};
pub use client::{CacheMode, EventApi};
pub use envelope::ApiResponse;
pub use error::{ApiError, ErrorKind, FieldErrors};
pub use format::format_event_range;
pub use http::{HttpBackend, HttpMethod, HttpRequest, HttpResponse, ReqwestBackend, TransportError};
pub use http_client::HttpApiClient;
pub use optimistic::{MutationState, OptimisticMutation};
pub use session::{AuthSession, SessionState};
pub use token_store::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use transport::{ApiTransport, TransportEvent};
pub use types::{
    AuthResponse, CreateEventInput, CreateRegistrationInput, Event, EventListParams, EventStatus,
    LoginRequest, Paginated, Pagination, PromoCodeRequest, PromoCodeValidation, RegisterRequest,
    Registration, RegistrationCheck, RegistrationListParams, RegistrationStatus, TokenPair,
    UpdateEventInput, User,
};
pub use validation::Validate;

// Re-export cache types for convenience
pub use evreg_query_cache::{CacheStats, QueryKey};
