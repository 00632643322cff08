//! Command handlers

use crate::app::App;
use crate::output;
use crate::{Commands, EventsCommand, PageArgs, PromoCommand, RegistrationsCommand};
use anyhow::{anyhow, Result};
use evreg_client::{
    CreateEventInput, CreateRegistrationInput, EventApi, EventListParams, LoginRequest,
    Paginated, PromoCodeRequest, RegisterRequest, Registration, RegistrationListParams,
    TokenStore, UpdateEventInput,
};

/// Pages reachable through `evreg open`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Page {
    EventList,
    EventDetail(String),
    EventRegistrations(String),
    MyEvents,
    MyRegistrations,
}

impl Page {
    /// Match a route (without locale prefix) to a page
    pub fn from_route(route: &str) -> Option<Self> {
        let segments: Vec<&str> = route.split('/').filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            [] | ["events"] => Some(Page::EventList),
            ["events", id] => Some(Page::EventDetail(id.to_string())),
            ["events", id, "registrations"] => Some(Page::EventRegistrations(id.to_string())),
            ["my-events"] => Some(Page::MyEvents),
            ["my-registrations"] => Some(Page::MyRegistrations),
            _ => None,
        }
    }
}

pub async fn dispatch(app: &App, command: Commands) -> Result<()> {
    match command {
        Commands::Login { email, password } => {
            let user = app.session.login(&LoginRequest { email, password }).await?;
            println!("Signed in as {}", output::user_line(&user));
        }
        Commands::Register {
            name,
            email,
            password,
        } => {
            let user = app
                .session
                .register(&RegisterRequest {
                    name,
                    email,
                    password,
                })
                .await?;
            println!("Welcome, {}", output::user_line(&user));
        }
        Commands::Logout => {
            app.session.logout().await;
            println!("Signed out");
        }
        Commands::Me => {
            let user = app.require_user().await?;
            println!("{}", output::user_line(&user));
        }
        Commands::Events { command } => events(app, command).await?,
        Commands::RegisterFor {
            event_id,
            name,
            email,
            promo,
        } => {
            let input = CreateRegistrationInput {
                event_id,
                attendee_name: name,
                attendee_email: email,
                promo_code: promo,
            };
            let registration = app.api.create_registration(&input).await?;
            println!("Registered: {}", output::registration_line(&registration));
        }
        Commands::Cancel {
            registration_id,
            event,
        } => {
            app.api.cancel_registration(&registration_id, &event).await?;
            println!("Cancelled registration {}", registration_id);
        }
        Commands::Registrations { command } => match command {
            RegistrationsCommand::Mine { page } => {
                let params = registration_params(app, page);
                print_registrations(&app.api.my_registrations(&params).await?);
            }
            RegistrationsCommand::ForEvent { event_id, page } => {
                let params = registration_params(app, page);
                print_registrations(&app.api.event_registrations(&event_id, &params).await?);
            }
        },
        Commands::Promo { command } => match command {
            PromoCommand::Validate { code, event } => {
                let request = PromoCodeRequest {
                    code: code.clone(),
                    event_id: event,
                };
                let validation = app.api.validate_promo_code(&request).await?;
                println!("{}", output::promo_line(&code, &validation));
            }
        },
        Commands::Open { path } => open(app, &path).await?,
    }
    Ok(())
}

async fn events(app: &App, command: EventsCommand) -> Result<()> {
    let locale = app.locale();
    match command {
        EventsCommand::List {
            page,
            search,
            category,
            upcoming,
        } => {
            let params = EventListParams {
                page: page.page,
                limit: app.page_size(page.limit),
                search,
                category,
                upcoming_only: upcoming,
                ..Default::default()
            };
            print_events(&app.api.list_events(&params).await?, &locale);
        }
        EventsCommand::Show { id } => show_event(app, &id).await?,
        EventsCommand::Create {
            title,
            start,
            end,
            capacity,
            location,
            description,
            category,
            price,
        } => {
            let input = CreateEventInput {
                title,
                description,
                location,
                category,
                start_date: start,
                end_date: end,
                capacity,
                price,
            };
            let event = app.api.create_event(&input).await?;
            println!("Created {}", output::event_line(&event, &locale));
        }
        EventsCommand::Update {
            id,
            title,
            start,
            end,
            capacity,
            location,
            description,
            price,
            status,
        } => {
            let patch = UpdateEventInput {
                title,
                description,
                location,
                start_date: start,
                end_date: end,
                capacity,
                price,
                status: status.map(Into::into),
                ..Default::default()
            };
            if patch == UpdateEventInput::default() {
                return Err(anyhow!("Nothing to update"));
            }
            let event = app.api.update_event(&id, &patch).await?;
            println!("Updated {}", output::event_line(&event, &locale));
        }
        EventsCommand::Delete { id } => {
            app.api.delete_event(&id).await?;
            println!("Deleted event {}", id);
        }
        EventsCommand::Mine { page } => {
            let params = EventListParams {
                page: page.page,
                limit: app.page_size(page.limit),
                ..Default::default()
            };
            print_events(&app.api.my_events(&params).await?, &locale);
        }
    }
    Ok(())
}

async fn show_event(app: &App, id: &str) -> Result<()> {
    let event = app.api.get_event(id).await?;
    for line in output::event_details(&event, &app.locale()) {
        println!("{}", line);
    }
    if app.transport.tokens().access_token().is_some() && app.api.check_registration(id).await {
        println!();
        println!("You are registered for this event.");
    }
    Ok(())
}

/// Resolve a locale-prefixed path and show the page it names
async fn open(app: &App, path: &str) -> Result<()> {
    let resolved = app.router.resolve(path)?;
    log::debug!(
        "Resolved {} to route {} in locale {}",
        path,
        resolved.route,
        resolved.locale
    );
    app.transport.set_locale(&resolved.locale);

    let page = Page::from_route(&resolved.route)
        .ok_or_else(|| anyhow!("Page not found: {}", resolved.route))?;
    let first_page = PageArgs {
        page: 1,
        limit: None,
    };
    match page {
        Page::EventList => {
            events(
                app,
                EventsCommand::List {
                    page: first_page,
                    search: None,
                    category: None,
                    upcoming: false,
                },
            )
            .await
        }
        Page::EventDetail(id) => show_event(app, &id).await,
        Page::EventRegistrations(id) => {
            let params = registration_params(app, first_page);
            print_registrations(&app.api.event_registrations(&id, &params).await?);
            Ok(())
        }
        Page::MyEvents => events(app, EventsCommand::Mine { page: first_page }).await,
        Page::MyRegistrations => {
            let params = registration_params(app, first_page);
            print_registrations(&app.api.my_registrations(&params).await?);
            Ok(())
        }
    }
}

fn registration_params(app: &App, page: PageArgs) -> RegistrationListParams {
    RegistrationListParams {
        page: page.page,
        limit: app.page_size(page.limit),
        ..Default::default()
    }
}

fn print_events(page: &Paginated<evreg_client::Event>, locale: &str) {
    if page.items.is_empty() {
        println!("No events found");
    }
    for event in &page.items {
        println!("{}", output::event_line(event, locale));
    }
    if let Some(footer) = output::page_footer(page.pagination.as_ref()) {
        println!("{}", footer);
    }
}

fn print_registrations(page: &Paginated<Registration>) {
    if page.items.is_empty() {
        println!("No registrations found");
    }
    for registration in &page.items {
        println!("{}", output::registration_line(registration));
    }
    if let Some(footer) = output::page_footer(page.pagination.as_ref()) {
        println!("{}", footer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Cli;
    use clap::Parser;

    #[test]
    fn test_page_from_route() {
        assert_eq!(Page::from_route("/"), Some(Page::EventList));
        assert_eq!(Page::from_route("/events"), Some(Page::EventList));
        assert_eq!(
            Page::from_route("/events/42"),
            Some(Page::EventDetail("42".to_string()))
        );
        assert_eq!(
            Page::from_route("/events/42/registrations"),
            Some(Page::EventRegistrations("42".to_string()))
        );
        assert_eq!(Page::from_route("/my-registrations"), Some(Page::MyRegistrations));
        assert_eq!(Page::from_route("/admin"), None);
    }

    #[test]
    fn test_parse_event_create() {
        let cli = Cli::try_parse_from([
            "evreg",
            "--locale",
            "ko",
            "events",
            "create",
            "--title",
            "Rust Meetup",
            "--start",
            "2026-11-05T18:00:00Z",
            "--capacity",
            "50",
        ])
        .unwrap();
        assert_eq!(cli.locale.as_deref(), Some("ko"));
        match cli.command {
            Commands::Events {
                command:
                    EventsCommand::Create {
                        title,
                        capacity,
                        end,
                        ..
                    },
            } => {
                assert_eq!(title, "Rust Meetup");
                assert_eq!(capacity, 50);
                assert!(end.is_none());
            }
            _ => panic!("expected events create"),
        }
    }

    #[test]
    fn test_parse_rejects_bad_start_date() {
        let result = Cli::try_parse_from([
            "evreg",
            "events",
            "create",
            "--title",
            "x",
            "--start",
            "tomorrow",
            "--capacity",
            "5",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_cancel_requires_event() {
        assert!(Cli::try_parse_from(["evreg", "cancel", "reg-1"]).is_err());
        let cli = Cli::try_parse_from(["evreg", "cancel", "reg-1", "--event", "evt-1"]).unwrap();
        assert!(matches!(cli.command, Commands::Cancel { .. }));
    }

    #[test]
    fn test_parse_page_args_default() {
        let cli = Cli::try_parse_from(["evreg", "registrations", "mine"]).unwrap();
        match cli.command {
            Commands::Registrations {
                command: RegistrationsCommand::Mine { page },
            } => {
                assert_eq!(page.page, 1);
                assert!(page.limit.is_none());
            }
            _ => panic!("expected registrations mine"),
        }
    }
}
