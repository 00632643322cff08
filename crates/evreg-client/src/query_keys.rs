//! Cache key layout
//!
//! ```text
//! events/list/<params>            events/detail/<id>        events/my/<params>
//! registrations/list/<params>     registrations/my/<params>
//! registrations/event/<id>/<params>
//! registrations/check/<event id>  registrations/detail/<id>
//! ```
//!
//! List params render as `name=value` segments in a fixed order, so equal
//! filters always produce equal keys.

use crate::types::{EventListParams, RegistrationListParams};
use evreg_query_cache::QueryKey;
use std::time::Duration;

/// Freshness window of list queries
pub const LIST_STALE_TIME: Duration = Duration::from_secs(5 * 60);
/// Freshness window of single-entity queries
pub const DETAIL_STALE_TIME: Duration = Duration::from_secs(5 * 60);
/// Freshness window of the registration existence check
pub const CHECK_STALE_TIME: Duration = Duration::from_secs(2 * 60);

fn with_params(key: QueryKey, pairs: Vec<(String, String)>) -> QueryKey {
    pairs
        .into_iter()
        .fold(key, |key, (name, value)| key.with(format!("{}={}", name, value)))
}

pub mod events {
    use super::*;

    pub fn all() -> QueryKey {
        QueryKey::new(["events"])
    }

    pub fn lists() -> QueryKey {
        all().with("list")
    }

    pub fn list(params: &EventListParams) -> QueryKey {
        with_params(lists(), params.query_pairs())
    }

    pub fn detail(id: &str) -> QueryKey {
        all().with("detail").with(id)
    }

    pub fn my_all() -> QueryKey {
        all().with("my")
    }

    pub fn my(params: &EventListParams) -> QueryKey {
        with_params(my_all(), params.query_pairs())
    }
}

pub mod registrations {
    use super::*;

    pub fn all() -> QueryKey {
        QueryKey::new(["registrations"])
    }

    pub fn lists() -> QueryKey {
        all().with("list")
    }

    pub fn list(params: &RegistrationListParams) -> QueryKey {
        with_params(lists(), params.query_pairs())
    }

    pub fn my_all() -> QueryKey {
        all().with("my")
    }

    pub fn my(params: &RegistrationListParams) -> QueryKey {
        with_params(my_all(), params.query_pairs())
    }

    /// Every registration list of one event
    pub fn for_event(event_id: &str) -> QueryKey {
        all().with("event").with(event_id)
    }

    pub fn event(event_id: &str, params: &RegistrationListParams) -> QueryKey {
        with_params(for_event(event_id), params.query_pairs())
    }

    pub fn check(event_id: &str) -> QueryKey {
        all().with("check").with(event_id)
    }

    pub fn detail(id: &str) -> QueryKey {
        all().with("detail").with(id)
    }
}
