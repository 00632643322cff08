//! Input checks run before any cache or network activity

use crate::error::{ApiError, FieldErrors};
use crate::types::{
    CreateEventInput, CreateRegistrationInput, LoginRequest, PromoCodeRequest, RegisterRequest,
    UpdateEventInput,
};

const MAX_TITLE_LEN: usize = 200;
const MIN_PASSWORD_LEN: usize = 8;

/// Schema check for request inputs
pub trait Validate {
    /// `Err` with a `Validation` error listing every failing field
    fn validate(&self) -> Result<(), ApiError>;
}

#[derive(Default)]
struct Checks(FieldErrors);

impl Checks {
    fn fail(&mut self, field: &str, message: &str) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.to_string());
    }

    fn finish(self) -> Result<(), ApiError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ApiError::validation(self.0))
        }
    }

    fn title(&mut self, title: &str) {
        if title.trim().is_empty() {
            self.fail("title", "Title is required");
        } else if title.chars().count() > MAX_TITLE_LEN {
            self.fail("title", "Title must be at most 200 characters");
        }
    }

    fn email(&mut self, field: &str, email: &str) {
        if !is_email(email) {
            self.fail(field, "Enter a valid email address");
        }
    }
}

fn is_email(value: &str) -> bool {
    let value = value.trim();
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .map(|(host, tld)| !host.is_empty() && !tld.is_empty())
                    .unwrap_or(false)
        }
        None => false,
    }
}

impl Validate for CreateEventInput {
    fn validate(&self) -> Result<(), ApiError> {
        let mut checks = Checks::default();
        checks.title(&self.title);
        if self.capacity == 0 {
            checks.fail("capacity", "Capacity must be at least 1");
        }
        if let Some(end) = self.end_date {
            if end < self.start_date {
                checks.fail("endDate", "End date must be after the start date");
            }
        }
        if self.price.is_some_and(|p| p < 0.0 || !p.is_finite()) {
            checks.fail("price", "Price cannot be negative");
        }
        checks.finish()
    }
}

impl Validate for UpdateEventInput {
    fn validate(&self) -> Result<(), ApiError> {
        let mut checks = Checks::default();
        if let Some(title) = &self.title {
            checks.title(title);
        }
        if self.capacity == Some(0) {
            checks.fail("capacity", "Capacity must be at least 1");
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end < start {
                checks.fail("endDate", "End date must be after the start date");
            }
        }
        if self.price.is_some_and(|p| p < 0.0 || !p.is_finite()) {
            checks.fail("price", "Price cannot be negative");
        }
        checks.finish()
    }
}

impl Validate for CreateRegistrationInput {
    fn validate(&self) -> Result<(), ApiError> {
        let mut checks = Checks::default();
        if self.event_id.trim().is_empty() {
            checks.fail("eventId", "Event is required");
        }
        if self.attendee_name.trim().is_empty() {
            checks.fail("attendeeName", "Name is required");
        }
        checks.email("attendeeEmail", &self.attendee_email);
        checks.finish()
    }
}

impl Validate for LoginRequest {
    fn validate(&self) -> Result<(), ApiError> {
        let mut checks = Checks::default();
        checks.email("email", &self.email);
        if self.password.is_empty() {
            checks.fail("password", "Password is required");
        }
        checks.finish()
    }
}

impl Validate for RegisterRequest {
    fn validate(&self) -> Result<(), ApiError> {
        let mut checks = Checks::default();
        if self.name.trim().is_empty() {
            checks.fail("name", "Name is required");
        }
        checks.email("email", &self.email);
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            checks.fail("password", "Password must be at least 8 characters");
        }
        checks.finish()
    }
}

impl Validate for PromoCodeRequest {
    fn validate(&self) -> Result<(), ApiError> {
        let mut checks = Checks::default();
        if self.code.trim().is_empty() {
            checks.fail("code", "Promo code is required");
        }
        if self.event_id.trim().is_empty() {
            checks.fail("eventId", "Event is required");
        }
        checks.finish()
    }
}
