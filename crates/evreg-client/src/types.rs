//! API data transfer objects
//!
//! Wire names are camelCase. Server-owned records are advisory copies: counts
//! such as `registered_count` may briefly disagree with the server.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,

    pub title: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub location: Option<String>,

    #[serde(default)]
    pub category: Option<String>,

    pub start_date: DateTime<Utc>,

    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,

    /// Maximum number of confirmed registrations
    pub capacity: u32,

    /// Confirmed registrations so far
    #[serde(default)]
    pub registered_count: u32,

    /// Ticket price; `None` or `0` means free
    #[serde(default)]
    pub price: Option<f64>,

    #[serde(default)]
    pub status: EventStatus,

    #[serde(default)]
    pub organizer_id: Option<String>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Event {
    /// Whether every seat is taken
    pub fn is_full(&self) -> bool {
        self.registered_count >= self.capacity
    }

    pub fn spots_left(&self) -> u32 {
        self.capacity.saturating_sub(self.registered_count)
    }

    /// Merge the fields present in `patch` into this event
    pub fn apply_patch(&mut self, patch: &UpdateEventInput) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(description) = &patch.description {
            self.description = Some(description.clone());
        }
        if let Some(location) = &patch.location {
            self.location = Some(location.clone());
        }
        if let Some(category) = &patch.category {
            self.category = Some(category.clone());
        }
        if let Some(start_date) = patch.start_date {
            self.start_date = start_date;
        }
        if let Some(end_date) = patch.end_date {
            self.end_date = Some(end_date);
        }
        if let Some(capacity) = patch.capacity {
            self.capacity = capacity;
        }
        if let Some(price) = patch.price {
            self.price = Some(price);
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
    }
}

/// Publication state of an event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Draft,
    #[default]
    Published,
    Cancelled,
    Completed,
    /// A state this client does not know about
    #[serde(other)]
    Unknown,
}

/// A registration of an attendee for an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub id: String,

    pub event_id: String,

    #[serde(default)]
    pub user_id: Option<String>,

    pub attendee_name: String,

    pub attendee_email: String,

    #[serde(default)]
    pub status: RegistrationStatus,

    #[serde(default)]
    pub promo_code: Option<String>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    /// The event as the server saw it after this registration, when embedded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<Event>,
}

/// State of a registration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    #[default]
    Confirmed,
    Pending,
    Cancelled,
    #[serde(other)]
    Unknown,
}

/// The signed-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
}

/// Access and refresh token, always replaced together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Payload of a successful login or registration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
}

impl AuthResponse {
    pub fn tokens(&self) -> TokenPair {
        TokenPair {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Fields for a new event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventInput {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub start_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    pub capacity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

/// Partial update of an event; absent fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEventInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<EventStatus>,
}

/// Fields for a new registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRegistrationInput {
    pub event_id: String,
    pub attendee_name: String,
    pub attendee_email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promo_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoCodeRequest {
    pub code: String,
    pub event_id: String,
}

/// Result of a promo code check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoCodeValidation {
    pub valid: bool,
    #[serde(default)]
    pub discount_percent: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Payload of the registration existence check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationCheck {
    pub is_registered: bool,
}

/// Page metadata of list responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u32,
}

impl Pagination {
    pub fn has_next_page(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn has_previous_page(&self) -> bool {
        self.page > 1
    }
}

/// One page of a list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub pagination: Option<Pagination>,
}

const DEFAULT_PAGE: u32 = 1;
const DEFAULT_LIMIT: u32 = 10;

/// Filters for event lists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventListParams {
    pub page: u32,
    pub limit: u32,
    pub search: Option<String>,
    pub category: Option<String>,
    pub status: Option<EventStatus>,
    pub upcoming_only: bool,
}

impl Default for EventListParams {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
            search: None,
            category: None,
            status: None,
            upcoming_only: false,
        }
    }
}

impl EventListParams {
    /// Query string pairs, in a fixed order
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("page".to_string(), self.page.to_string()),
            ("limit".to_string(), self.limit.to_string()),
        ];
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            pairs.push(("search".to_string(), search.to_string()));
        }
        if let Some(category) = self.category.as_deref().filter(|s| !s.is_empty()) {
            pairs.push(("category".to_string(), category.to_string()));
        }
        if let Some(status) = self.status {
            pairs.push(("status".to_string(), status_param(status).to_string()));
        }
        if self.upcoming_only {
            pairs.push(("upcoming".to_string(), "true".to_string()));
        }
        pairs
    }
}

fn status_param(status: EventStatus) -> &'static str {
    match status {
        EventStatus::Draft => "draft",
        EventStatus::Published => "published",
        EventStatus::Cancelled => "cancelled",
        EventStatus::Completed => "completed",
        EventStatus::Unknown => "unknown",
    }
}

/// Filters for registration lists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationListParams {
    pub page: u32,
    pub limit: u32,
    pub status: Option<RegistrationStatus>,
}

impl Default for RegistrationListParams {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
            status: None,
        }
    }
}

impl RegistrationListParams {
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("page".to_string(), self.page.to_string()),
            ("limit".to_string(), self.limit.to_string()),
        ];
        if let Some(status) = self.status {
            let value = match status {
                RegistrationStatus::Confirmed => "confirmed",
                RegistrationStatus::Pending => "pending",
                RegistrationStatus::Cancelled => "cancelled",
                RegistrationStatus::Unknown => "unknown",
            };
            pairs.push(("status".to_string(), value.to_string()));
        }
        pairs
    }
}
