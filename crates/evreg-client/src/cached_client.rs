//! Cached event API client (decorator pattern)
//!
//! Wraps any `EventApi` implementation with the query cache. Queries read
//! through the cache according to the `CacheMode`. Mutations validate their
//! input, apply optimistic updates, and on success reconcile the entity's
//! detail entry and invalidate the lists that may contain it.

use crate::client::{CacheMode, EventApi};
use crate::error::ApiError;
use crate::optimistic::OptimisticMutation;
use crate::query_keys::{
    events, registrations, CHECK_STALE_TIME, DETAIL_STALE_TIME, LIST_STALE_TIME,
};
use crate::types::{
    AuthResponse, CreateEventInput, CreateRegistrationInput, Event, EventListParams, LoginRequest,
    Paginated, PromoCodeRequest, PromoCodeValidation, RegisterRequest, Registration,
    RegistrationListParams, UpdateEventInput, User,
};
use crate::validation::Validate;
use async_trait::async_trait;
use evreg_query_cache::{CacheStats, QueryCache, QueryKey};
use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Message of the local capacity rejection
pub const EVENT_FULL_MESSAGE: &str = "This event is full";

/// Query cache holding API payloads
pub type ApiCache = QueryCache<ApiError>;

/// Cached event API client using the decorator pattern
///
/// # Cache Modes
///
/// - `CacheMode::None` - Pass queries through to the inner client
/// - `CacheMode::WriteOnly` - Always load, store the result (force refresh)
/// - `CacheMode::ReadOnly` - Serve any cached value, never store
/// - `CacheMode::ReadWrite` - Serve fresh values, load and store otherwise
///
/// Mutations keep the cache coherent in every mode.
///
/// # Example
///
/// ```rust,ignore
/// use evreg_client::{ApiCache, ApiTransport, CacheMode, CachedApiClient, HttpApiClient};
/// use std::sync::Arc;
///
/// let inner = HttpApiClient::new(Arc::new(transport));
/// let cache = Arc::new(ApiCache::new());
///
/// let client = CachedApiClient::new(inner, cache, CacheMode::ReadWrite);
/// ```
#[derive(Debug, Clone)]
pub struct CachedApiClient<C: EventApi> {
    inner: C,
    cache: Arc<ApiCache>,
    mode: CacheMode,
}

impl<C: EventApi> CachedApiClient<C> {
    pub fn new(inner: C, cache: Arc<ApiCache>, mode: CacheMode) -> Self {
        Self { inner, cache, mode }
    }

    pub fn cache_mode(&self) -> CacheMode {
        self.mode
    }

    /// Create a new client with a different cache mode sharing the same cache
    pub fn with_mode(&self, mode: CacheMode) -> CachedApiClient<C>
    where
        C: Clone,
    {
        CachedApiClient {
            inner: self.inner.clone(),
            cache: Arc::clone(&self.cache),
            mode,
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn cache(&self) -> &Arc<ApiCache> {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Forget every cached payload (on logout or user switch)
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Cached value at `key`, stale or not, without loading
    pub fn cached<T: DeserializeOwned>(&self, key: &QueryKey) -> Option<T> {
        let value = self.cache.get(key)?;
        serde_json::from_value(value).ok()
    }

    fn store<T: Serialize>(&self, key: &QueryKey, value: &T) {
        match serde_json::to_value(value) {
            Ok(value) => self.cache.write(key, value),
            Err(e) => debug!("Failed to encode {} for cache: {}", key, e),
        }
    }

    async fn query<T, Fut>(
        &self,
        key: QueryKey,
        stale_time: Duration,
        load: Fut,
    ) -> Result<T, ApiError>
    where
        T: Serialize + DeserializeOwned,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let value = match (self.mode.should_read(), self.mode.should_write()) {
            (false, false) => return load.await,
            (true, false) => match self.cache.get(&key) {
                Some(value) => {
                    debug!("Cache READ for {} (read-only)", key);
                    value
                }
                None => return load.await,
            },
            (false, true) => {
                self.cache
                    .refetch(&key, stale_time, || encode_load(load))
                    .await?
            }
            (true, true) => {
                self.cache
                    .fetch(&key, stale_time, || encode_load(load))
                    .await?
            }
        };
        decode(value)
    }

    fn invalidate_event_lists(&self) {
        self.cache.invalidate(&events::lists());
        self.cache.invalidate(&events::my_all());
    }

    /// Everything that lists or counts registrations of `event_id`
    fn invalidate_registrations_of(&self, event_id: &str) {
        self.cache.invalidate(&registrations::my_all());
        self.cache.invalidate(&registrations::lists());
        self.cache.invalidate(&registrations::for_event(event_id));
        self.cache.invalidate(&registrations::check(event_id));
    }
}

async fn encode_load<T: Serialize>(
    load: impl Future<Output = Result<T, ApiError>>,
) -> Result<Value, ApiError> {
    let value = load.await?;
    serde_json::to_value(&value).map_err(|e| ApiError::unexpected_payload(200, &e))
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|e| ApiError::unexpected_payload(200, &e))
}

#[async_trait]
impl<C: EventApi> EventApi for CachedApiClient<C> {
    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ApiError> {
        request.validate()?;
        self.inner.login(request).await
    }

    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ApiError> {
        request.validate()?;
        self.inner.register(request).await
    }

    async fn logout(&self) -> Result<(), ApiError> {
        self.inner.logout().await
    }

    async fn me(&self) -> Result<User, ApiError> {
        self.inner.me().await
    }

    async fn list_events(&self, params: &EventListParams) -> Result<Paginated<Event>, ApiError> {
        self.query(
            events::list(params),
            LIST_STALE_TIME,
            self.inner.list_events(params),
        )
        .await
    }

    async fn get_event(&self, id: &str) -> Result<Event, ApiError> {
        self.query(events::detail(id), DETAIL_STALE_TIME, self.inner.get_event(id))
            .await
    }

    async fn my_events(&self, params: &EventListParams) -> Result<Paginated<Event>, ApiError> {
        self.query(events::my(params), LIST_STALE_TIME, self.inner.my_events(params))
            .await
    }

    async fn create_event(&self, input: &CreateEventInput) -> Result<Event, ApiError> {
        input.validate()?;

        // Nothing cached to predict; the mutation only gives the same settle path
        let mut mutation = OptimisticMutation::new(&self.cache, "create event");
        let event = mutation.settle(self.inner.create_event(input)).await?;

        self.store(&events::detail(&event.id), &event);
        self.invalidate_event_lists();
        Ok(event)
    }

    async fn update_event(&self, id: &str, patch: &UpdateEventInput) -> Result<Event, ApiError> {
        patch.validate()?;

        let mut mutation = OptimisticMutation::new(&self.cache, "update event");
        mutation.update::<Event, _>(&events::detail(id), |event| event.apply_patch(patch));
        let event = mutation.settle(self.inner.update_event(id, patch)).await?;

        self.store(&events::detail(&event.id), &event);
        self.invalidate_event_lists();
        Ok(event)
    }

    async fn delete_event(&self, id: &str) -> Result<(), ApiError> {
        let detail = events::detail(id);

        let mut mutation = OptimisticMutation::new(&self.cache, "delete event");
        mutation.remove(&detail);
        mutation.settle(self.inner.delete_event(id)).await?;

        self.cache.remove(&detail);
        self.invalidate_event_lists();
        self.invalidate_registrations_of(id);
        Ok(())
    }

    async fn list_registrations(
        &self,
        params: &RegistrationListParams,
    ) -> Result<Paginated<Registration>, ApiError> {
        self.query(
            registrations::list(params),
            LIST_STALE_TIME,
            self.inner.list_registrations(params),
        )
        .await
    }

    async fn my_registrations(
        &self,
        params: &RegistrationListParams,
    ) -> Result<Paginated<Registration>, ApiError> {
        self.query(
            registrations::my(params),
            LIST_STALE_TIME,
            self.inner.my_registrations(params),
        )
        .await
    }

    async fn event_registrations(
        &self,
        event_id: &str,
        params: &RegistrationListParams,
    ) -> Result<Paginated<Registration>, ApiError> {
        self.query(
            registrations::event(event_id, params),
            LIST_STALE_TIME,
            self.inner.event_registrations(event_id, params),
        )
        .await
    }

    async fn create_registration(
        &self,
        input: &CreateRegistrationInput,
    ) -> Result<Registration, ApiError> {
        input.validate()?;
        let detail = events::detail(&input.event_id);

        // Best effort: the server has the final word on capacity
        if let Some(event) = self.cached::<Event>(&detail) {
            if event.is_full() {
                debug!(
                    "Rejecting registration for full event {} ({}/{})",
                    event.id, event.registered_count, event.capacity
                );
                return Err(ApiError::conflict(EVENT_FULL_MESSAGE));
            }
        }

        let mut mutation = OptimisticMutation::new(&self.cache, "create registration");
        mutation.update::<Event, _>(&detail, |event| {
            event.registered_count = event.registered_count.saturating_add(1)
        });
        let registration = mutation.settle(self.inner.create_registration(input)).await?;

        self.store(&registrations::detail(&registration.id), &registration);
        match &registration.event {
            Some(event) => self.store(&detail, event),
            None => {
                self.cache.invalidate(&detail);
            }
        }
        self.invalidate_registrations_of(&input.event_id);
        self.invalidate_event_lists();
        Ok(registration)
    }

    async fn cancel_registration(
        &self,
        registration_id: &str,
        event_id: &str,
    ) -> Result<(), ApiError> {
        let detail = events::detail(event_id);

        let mut mutation = OptimisticMutation::new(&self.cache, "cancel registration");
        mutation.update::<Event, _>(&detail, |event| {
            event.registered_count = event.registered_count.saturating_sub(1)
        });
        mutation
            .settle(self.inner.cancel_registration(registration_id, event_id))
            .await?;

        self.cache.remove(&registrations::detail(registration_id));
        self.invalidate_registrations_of(event_id);
        self.invalidate_event_lists();
        self.cache.invalidate(&detail);
        Ok(())
    }

    async fn fetch_registration_check(&self, event_id: &str) -> Result<bool, ApiError> {
        self.query(
            registrations::check(event_id),
            CHECK_STALE_TIME,
            self.inner.fetch_registration_check(event_id),
        )
        .await
    }

    async fn validate_promo_code(
        &self,
        request: &PromoCodeRequest,
    ) -> Result<PromoCodeValidation, ApiError> {
        request.validate()?;
        self.inner.validate_promo_code(request).await
    }
}
