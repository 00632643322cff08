//! Direct API client
//!
//! [`HttpApiClient`] maps each [`EventApi`] call to one transport request.
//! No caching and no error handling beyond decoding.

use crate::client::EventApi;
use crate::envelope::ApiResponse;
use crate::error::ApiError;
use crate::transport::{ApiTransport, LOGIN_PATH, REGISTER_PATH};
use crate::types::{
    AuthResponse, CreateEventInput, CreateRegistrationInput, Event, EventListParams, LoginRequest,
    Paginated, PromoCodeRequest, PromoCodeValidation, RegisterRequest, Registration,
    RegistrationCheck, RegistrationListParams, UpdateEventInput, User,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// API client hitting the server for every call
#[derive(Debug, Clone)]
pub struct HttpApiClient {
    transport: Arc<ApiTransport>,
}

impl HttpApiClient {
    pub fn new(transport: Arc<ApiTransport>) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &Arc<ApiTransport> {
        &self.transport
    }
}

fn body<T: Serialize>(value: &T) -> Result<Value, ApiError> {
    serde_json::to_value(value)
        .map_err(|e| ApiError::new(400, format!("Invalid request body: {}", e)))
}

fn page<T: DeserializeOwned>(response: ApiResponse) -> Result<Paginated<T>, ApiError> {
    let pagination = response.pagination;
    let items = response.into_data()?;
    Ok(Paginated { items, pagination })
}

#[async_trait]
impl EventApi for HttpApiClient {
    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ApiError> {
        self.transport
            .post(LOGIN_PATH, body(request)?)
            .await?
            .into_data()
    }

    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ApiError> {
        self.transport
            .post(REGISTER_PATH, body(request)?)
            .await?
            .into_data()
    }

    async fn logout(&self) -> Result<(), ApiError> {
        let refresh_token = self.transport.tokens().load().map(|p| p.refresh_token);
        self.transport
            .post("/auth/logout", json!({ "refreshToken": refresh_token }))
            .await?;
        Ok(())
    }

    async fn me(&self) -> Result<User, ApiError> {
        self.transport.get("/auth/me", &[]).await?.into_data()
    }

    async fn list_events(&self, params: &EventListParams) -> Result<Paginated<Event>, ApiError> {
        page(self.transport.get("/events", &params.query_pairs()).await?)
    }

    async fn get_event(&self, id: &str) -> Result<Event, ApiError> {
        self.transport
            .get(&format!("/events/{}", id), &[])
            .await?
            .into_data()
    }

    async fn my_events(&self, params: &EventListParams) -> Result<Paginated<Event>, ApiError> {
        page(self.transport.get("/events/my", &params.query_pairs()).await?)
    }

    async fn create_event(&self, input: &CreateEventInput) -> Result<Event, ApiError> {
        self.transport
            .post("/events", body(input)?)
            .await?
            .into_data()
    }

    async fn update_event(&self, id: &str, patch: &UpdateEventInput) -> Result<Event, ApiError> {
        self.transport
            .put(&format!("/events/{}", id), body(patch)?)
            .await?
            .into_data()
    }

    async fn delete_event(&self, id: &str) -> Result<(), ApiError> {
        self.transport.delete(&format!("/events/{}", id)).await?;
        Ok(())
    }

    async fn list_registrations(
        &self,
        params: &RegistrationListParams,
    ) -> Result<Paginated<Registration>, ApiError> {
        page(
            self.transport
                .get("/registrations", &params.query_pairs())
                .await?,
        )
    }

    async fn my_registrations(
        &self,
        params: &RegistrationListParams,
    ) -> Result<Paginated<Registration>, ApiError> {
        page(
            self.transport
                .get("/registrations/my", &params.query_pairs())
                .await?,
        )
    }

    async fn event_registrations(
        &self,
        event_id: &str,
        params: &RegistrationListParams,
    ) -> Result<Paginated<Registration>, ApiError> {
        page(
            self.transport
                .get(
                    &format!("/events/{}/registrations", event_id),
                    &params.query_pairs(),
                )
                .await?,
        )
    }

    async fn create_registration(
        &self,
        input: &CreateRegistrationInput,
    ) -> Result<Registration, ApiError> {
        self.transport
            .post("/registrations", body(input)?)
            .await?
            .into_data()
    }

    async fn cancel_registration(
        &self,
        registration_id: &str,
        _event_id: &str,
    ) -> Result<(), ApiError> {
        self.transport
            .delete(&format!("/registrations/{}", registration_id))
            .await?;
        Ok(())
    }

    async fn fetch_registration_check(&self, event_id: &str) -> Result<bool, ApiError> {
        let check: RegistrationCheck = self
            .transport
            .get(&format!("/events/{}/check-registration", event_id), &[])
            .await?
            .into_data()?;
        Ok(check.is_registered)
    }

    async fn validate_promo_code(
        &self,
        request: &PromoCodeRequest,
    ) -> Result<PromoCodeValidation, ApiError> {
        self.transport
            .post("/promo-codes/validate", body(request)?)
            .await?
            .into_data()
    }
}
