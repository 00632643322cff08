//! Plain-text rendering of API records

use chrono::Local;
use evreg_client::{
    format_event_range, Event, EventStatus, Pagination, PromoCodeValidation, Registration,
    RegistrationStatus, User,
};

fn event_status(status: EventStatus) -> &'static str {
    match status {
        EventStatus::Draft => "draft",
        EventStatus::Published => "published",
        EventStatus::Cancelled => "cancelled",
        EventStatus::Completed => "completed",
        EventStatus::Unknown => "unknown",
    }
}

fn registration_status(status: RegistrationStatus) -> &'static str {
    match status {
        RegistrationStatus::Confirmed => "confirmed",
        RegistrationStatus::Pending => "pending",
        RegistrationStatus::Cancelled => "cancelled",
        RegistrationStatus::Unknown => "unknown",
    }
}

/// "Free" for no or zero price, otherwise two decimals
pub fn price(event: &Event) -> String {
    match event.price {
        Some(p) if p > 0.0 => format!("{:.2}", p),
        _ => "Free".to_string(),
    }
}

/// Seats summary, e.g. `49/50` or `50/50 (full)`
pub fn seats(event: &Event) -> String {
    if event.is_full() {
        format!("{}/{} (full)", event.registered_count, event.capacity)
    } else {
        format!("{}/{}", event.registered_count, event.capacity)
    }
}

fn when(event: &Event, locale: &str) -> String {
    let start = event.start_date.with_timezone(&Local);
    let end = event.end_date.map(|end| end.with_timezone(&Local));
    format_event_range(&start, end.as_ref(), locale)
}

/// One line per event in lists
pub fn event_line(event: &Event, locale: &str) -> String {
    format!(
        "{}  {}  {}  {}",
        event.id,
        event.title,
        when(event, locale),
        seats(event)
    )
}

pub fn event_details(event: &Event, locale: &str) -> Vec<String> {
    let mut lines = vec![
        event.title.clone(),
        format!("  id:       {}", event.id),
        format!("  when:     {}", when(event, locale)),
    ];
    if let Some(location) = &event.location {
        lines.push(format!("  where:    {}", location));
    }
    if let Some(category) = &event.category {
        lines.push(format!("  category: {}", category));
    }
    lines.push(format!("  seats:    {}", seats(event)));
    lines.push(format!("  price:    {}", price(event)));
    lines.push(format!("  status:   {}", event_status(event.status)));
    if let Some(description) = &event.description {
        lines.push(String::new());
        lines.extend(description.lines().map(|l| format!("  {}", l)));
    }
    lines
}

pub fn registration_line(registration: &Registration) -> String {
    let mut line = format!(
        "{}  event {}  {} <{}>  {}",
        registration.id,
        registration.event_id,
        registration.attendee_name,
        registration.attendee_email,
        registration_status(registration.status)
    );
    if let Some(code) = &registration.promo_code {
        line.push_str(&format!("  promo {}", code));
    }
    line
}

pub fn user_line(user: &User) -> String {
    match &user.role {
        Some(role) => format!("{} <{}> ({})", user.name, user.email, role),
        None => format!("{} <{}>", user.name, user.email),
    }
}

pub fn promo_line(code: &str, validation: &PromoCodeValidation) -> String {
    if !validation.valid {
        let reason = validation.message.as_deref().unwrap_or("not valid");
        return format!("{}: {}", code, reason);
    }
    match validation.discount_percent {
        Some(discount) => format!("{}: valid, {}% off", code, discount),
        None => format!("{}: valid", code),
    }
}

/// Footer for paged lists; `None` when the server sent no page info
pub fn page_footer(pagination: Option<&Pagination>) -> Option<String> {
    let p = pagination?;
    let mut footer = format!("Page {} of {} ({} total)", p.page, p.total_pages.max(1), p.total);
    if p.has_next_page() {
        footer.push_str(&format!(", next: --page {}", p.page + 1));
    }
    Some(footer)
}
