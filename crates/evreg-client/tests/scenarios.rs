//! End-to-end flows through transport, cache and session against a fake server

use async_trait::async_trait;
use evreg_client::query_keys::{events, registrations};
use evreg_client::{
    ApiCache, ApiTransport, AuthSession, CacheMode, CachedApiClient, CreateEventInput,
    CreateRegistrationInput, ErrorKind, Event, EventApi, EventListParams, HttpApiClient,
    HttpBackend, HttpMethod, HttpRequest, HttpResponse, LoginRequest, MemoryTokenStore, QueryKey,
    SessionState, TokenPair, TokenStore, TransportError, EVENT_FULL_MESSAGE,
};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const BASE_URL: &str = "http://api.test";

/// In-memory API server
///
/// Each route answers from a queue; the last response repeats. Requests
/// outside `/auth/login|register|refresh` are rejected with 401 unless they
/// carry the currently valid access token.
#[derive(Default)]
struct FakeServer {
    routes: Mutex<HashMap<(HttpMethod, String), VecDeque<HttpResponse>>>,
    requests: Mutex<Vec<HttpRequest>>,
    valid_token: Mutex<Option<String>>,
    watched: Mutex<Option<(Arc<ApiCache>, QueryKey)>>,
    observed: Mutex<Vec<Option<Value>>>,
}

impl FakeServer {
    fn route(&self, method: HttpMethod, path: &str, response: HttpResponse) {
        self.routes
            .lock()
            .unwrap()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(response);
    }

    fn accept_token(&self, token: Option<&str>) {
        *self.valid_token.lock().unwrap() = token.map(str::to_string);
    }

    /// Record the cached value at `key` on every request
    fn watch(&self, cache: &Arc<ApiCache>, key: QueryKey) {
        *self.watched.lock().unwrap() = Some((Arc::clone(cache), key));
    }

    fn observed(&self) -> Vec<Option<Value>> {
        self.observed.lock().unwrap().clone()
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn requests_to(&self, method: HttpMethod, path: &str) -> usize {
        let url = format!("{}{}", BASE_URL, path);
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.url == url)
            .count()
    }

    fn answer(&self, request: &HttpRequest) -> HttpResponse {
        let path = request
            .url
            .strip_prefix(BASE_URL)
            .unwrap_or(&request.url)
            .to_string();

        let open = matches!(
            path.as_str(),
            "/auth/login" | "/auth/register" | "/auth/refresh"
        );
        if let Some(token) = self.valid_token.lock().unwrap().as_deref() {
            let expected = format!("Bearer {}", token);
            if !open && request.header("Authorization") != Some(expected.as_str()) {
                return fail(401, "Token expired");
            }
        }

        let mut routes = self.routes.lock().unwrap();
        match routes.get_mut(&(request.method, path)) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().cloned().unwrap(),
            None => fail(404, "No such route"),
        }
    }
}

#[async_trait]
impl HttpBackend for FakeServer {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        // Let concurrent requests interleave
        tokio::task::yield_now().await;

        if let Some((cache, key)) = self.watched.lock().unwrap().as_ref() {
            self.observed.lock().unwrap().push(cache.get(key));
        }
        let response = self.answer(&request);
        self.requests.lock().unwrap().push(request);
        Ok(response)
    }
}

fn ok(data: Value) -> HttpResponse {
    HttpResponse::new(
        200,
        json!({ "success": true, "code": "OK", "data": data }).to_string(),
    )
}

fn ok_page(items: Value, total: u64) -> HttpResponse {
    HttpResponse::new(
        200,
        json!({
            "success": true,
            "code": "OK",
            "data": items,
            "pagination": { "page": 1, "limit": 10, "total": total, "totalPages": 1 }
        })
        .to_string(),
    )
}

fn fail(status: u16, message: &str) -> HttpResponse {
    HttpResponse::new(
        status,
        json!({ "success": false, "code": "ERROR", "message": message, "statusCode": status })
            .to_string(),
    )
}

fn event_json(id: &str, registered_count: u32, capacity: u32) -> Value {
    json!({
        "id": id,
        "title": format!("Event {}", id),
        "location": "Seoul",
        "startDate": "2026-11-05T18:00:00Z",
        "capacity": capacity,
        "registeredCount": registered_count,
        "status": "published"
    })
}

fn user_json() -> Value {
    json!({ "id": "usr-1", "email": "kim@example.com", "name": "Kim" })
}

fn tokens(n: u32) -> TokenPair {
    TokenPair {
        access_token: format!("access-{}", n),
        refresh_token: format!("refresh-{}", n),
    }
}

struct Stack {
    server: Arc<FakeServer>,
    tokens: Arc<MemoryTokenStore>,
    transport: Arc<ApiTransport>,
    cache: Arc<ApiCache>,
    client: Arc<CachedApiClient<HttpApiClient>>,
}

impl Stack {
    fn new(stored: Option<TokenPair>) -> Self {
        let server = Arc::new(FakeServer::default());
        let tokens = Arc::new(match stored {
            Some(pair) => MemoryTokenStore::with_tokens(pair),
            None => MemoryTokenStore::new(),
        });
        let transport = Arc::new(ApiTransport::new(
            BASE_URL,
            server.clone(),
            tokens.clone(),
        ));
        let cache = Arc::new(ApiCache::new());
        let client = Arc::new(CachedApiClient::new(
            HttpApiClient::new(transport.clone()),
            cache.clone(),
            CacheMode::ReadWrite,
        ));
        Self {
            server,
            tokens,
            transport,
            cache,
            client,
        }
    }

    fn session(&self) -> Arc<AuthSession> {
        Arc::new(AuthSession::new(
            self.client.clone(),
            self.tokens.clone(),
            self.cache.clone(),
        ))
    }
}

fn registration_input(event_id: &str) -> CreateRegistrationInput {
    CreateRegistrationInput {
        event_id: event_id.to_string(),
        attendee_name: "Kim".to_string(),
        attendee_email: "kim@example.com".to_string(),
        promo_code: None,
    }
}

#[tokio::test]
async fn test_create_event_invalidates_lists_and_fills_detail() {
    let stack = Stack::new(Some(tokens(1)));
    let server = &stack.server;
    server.route(
        HttpMethod::Get,
        "/events",
        ok_page(json!([event_json("evt-1", 0, 10)]), 1),
    );
    server.route(
        HttpMethod::Get,
        "/events",
        ok_page(
            json!([event_json("evt-1", 0, 10), event_json("evt-42", 0, 50)]),
            2,
        ),
    );
    server.route(HttpMethod::Post, "/events", ok(event_json("evt-42", 0, 50)));

    let params = EventListParams::default();
    let first = stack.client.list_events(&params).await.unwrap();
    assert_eq!(first.items.len(), 1);
    assert_eq!(first.pagination.unwrap().total, 1);

    let created = stack
        .client
        .create_event(&CreateEventInput {
            title: "Event evt-42".to_string(),
            description: None,
            location: Some("Seoul".to_string()),
            category: None,
            start_date: "2026-11-05T18:00:00Z".parse().unwrap(),
            end_date: None,
            capacity: 50,
            price: None,
        })
        .await
        .unwrap();
    assert_eq!(created.id, "evt-42");

    // List is stale, the new detail is served without a request
    assert_eq!(stack.cache.is_stale(&events::list(&params)), Some(true));
    let before = server.request_count();
    let detail = stack.client.get_event("evt-42").await.unwrap();
    assert_eq!(detail, created);
    assert_eq!(server.request_count(), before);

    let second = stack.client.list_events(&params).await.unwrap();
    assert_eq!(second.items.len(), 2);
    assert_eq!(server.requests_to(HttpMethod::Get, "/events"), 2);
}

#[tokio::test]
async fn test_registration_fills_event_then_rejects_locally() {
    let stack = Stack::new(Some(tokens(1)));
    let server = &stack.server;
    server.route(
        HttpMethod::Get,
        "/events/evt-1",
        ok(event_json("evt-1", 49, 50)),
    );
    server.route(
        HttpMethod::Post,
        "/registrations",
        ok(json!({
            "id": "reg-1",
            "eventId": "evt-1",
            "attendeeName": "Kim",
            "attendeeEmail": "kim@example.com",
            "status": "confirmed",
            "event": event_json("evt-1", 50, 50)
        })),
    );

    stack.client.get_event("evt-1").await.unwrap();
    server.watch(&stack.cache, events::detail("evt-1"));

    let registration = stack
        .client
        .create_registration(&registration_input("evt-1"))
        .await
        .unwrap();
    assert_eq!(registration.id, "reg-1");

    // Speculative count was in the cache while the request was in flight
    assert_eq!(server.observed()[0].as_ref().unwrap()["registeredCount"], 50);
    let cached: Event = stack.client.cached(&events::detail("evt-1")).unwrap();
    assert_eq!(cached.registered_count, 50);
    assert_eq!(
        stack.cache.is_stale(&registrations::check("evt-1")),
        None,
        "the check was never fetched, so nothing to invalidate"
    );

    let requests = server.request_count();
    let err = stack
        .client
        .create_registration(&registration_input("evt-1"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);
    assert_eq!(err.message, EVENT_FULL_MESSAGE);
    assert_eq!(server.request_count(), requests);
}

#[tokio::test]
async fn test_failed_cancel_rolls_back_exactly() {
    let stack = Stack::new(Some(tokens(1)));
    let server = &stack.server;
    server.route(
        HttpMethod::Get,
        "/events/evt-1",
        ok(event_json("evt-1", 10, 20)),
    );
    server.route(
        HttpMethod::Delete,
        "/registrations/reg-1",
        fail(404, "Registration already cancelled"),
    );

    stack.client.get_event("evt-1").await.unwrap();
    let before = stack.cache.snapshot(&events::detail("evt-1"));
    server.watch(&stack.cache, events::detail("evt-1"));

    let err = stack
        .client
        .cancel_registration("reg-1", "evt-1")
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::NotFound);
    assert_eq!(err.message, "Registration already cancelled");
    assert_eq!(server.observed()[0].as_ref().unwrap()["registeredCount"], 9);
    assert_eq!(stack.cache.snapshot(&events::detail("evt-1")), before);
    let cached: Event = stack.client.cached(&events::detail("evt-1")).unwrap();
    assert_eq!(cached.registered_count, 10);
}

#[tokio::test]
async fn test_concurrent_401s_share_one_refresh() {
    let stack = Stack::new(Some(tokens(1)));
    let server = &stack.server;
    server.accept_token(Some("access-2"));
    server.route(
        HttpMethod::Post,
        "/auth/refresh",
        ok(json!({ "accessToken": "access-2", "refreshToken": "refresh-2" })),
    );
    server.route(HttpMethod::Get, "/events/my", ok_page(json!([]), 0));
    server.route(
        HttpMethod::Get,
        "/events/evt-1",
        ok(event_json("evt-1", 0, 10)),
    );

    let params = EventListParams::default();
    let (mine, event) = tokio::join!(
        stack.client.my_events(&params),
        stack.client.get_event("evt-1"),
    );

    assert!(mine.unwrap().items.is_empty());
    assert_eq!(event.unwrap().id, "evt-1");
    assert_eq!(server.requests_to(HttpMethod::Post, "/auth/refresh"), 1);
    assert_eq!(server.requests_to(HttpMethod::Get, "/events/my"), 2);
    assert_eq!(server.requests_to(HttpMethod::Get, "/events/evt-1"), 2);
    assert_eq!(stack.tokens.load(), Some(tokens(2)));
}

#[tokio::test]
async fn test_failed_refresh_signs_the_session_out() {
    let stack = Stack::new(Some(tokens(1)));
    let server = &stack.server;
    server.accept_token(Some("access-1"));
    server.route(HttpMethod::Get, "/auth/me", ok(user_json()));
    server.route(
        HttpMethod::Post,
        "/auth/refresh",
        fail(401, "Refresh token revoked"),
    );

    let session = stack.session();
    let watcher = session.watch_transport(stack.transport.subscribe());
    assert!(matches!(
        session.initialize().await,
        SessionState::Authenticated(_)
    ));

    server.accept_token(Some("access-other"));
    let err = stack
        .client
        .my_registrations(&Default::default())
        .await
        .unwrap_err();
    assert!(err.is_auth());
    assert!(stack.tokens.load().is_none());

    let mut state = session.subscribe();
    tokio::time::timeout(
        Duration::from_secs(1),
        state.wait_for(|s| *s == SessionState::Anonymous),
    )
    .await
    .unwrap()
    .unwrap();
    assert!(!session.is_authenticated());

    // Only the original request and one refresh attempt
    assert_eq!(server.requests_to(HttpMethod::Post, "/auth/refresh"), 1);
    assert_eq!(server.requests_to(HttpMethod::Get, "/registrations/my"), 1);
    watcher.abort();
}

#[tokio::test]
async fn test_logout_clears_everything_even_on_server_error() {
    let stack = Stack::new(None);
    let server = &stack.server;
    server.route(
        HttpMethod::Post,
        "/auth/login",
        ok(json!({
            "user": user_json(),
            "accessToken": "access-1",
            "refreshToken": "refresh-1"
        })),
    );
    server.route(
        HttpMethod::Get,
        "/events/evt-1",
        ok(event_json("evt-1", 0, 10)),
    );
    server.route(HttpMethod::Post, "/auth/logout", fail(500, "Database down"));

    let session = stack.session();
    let user = session
        .login(&LoginRequest {
            email: "kim@example.com".to_string(),
            password: "correct horse".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(user.name, "Kim");
    assert_eq!(stack.tokens.load(), Some(tokens(1)));

    stack.client.get_event("evt-1").await.unwrap();
    assert_eq!(stack.cache.stats().entries, 1);

    session.logout().await;

    assert_eq!(server.requests_to(HttpMethod::Post, "/auth/logout"), 1);
    assert!(stack.tokens.load().is_none());
    assert_eq!(stack.cache.stats().entries, 0);
    assert_eq!(session.state(), SessionState::Anonymous);
}

#[tokio::test]
async fn test_initialize_without_token_makes_no_request() {
    let stack = Stack::new(None);
    let session = stack.session();
    assert!(session.is_loading());

    assert_eq!(session.initialize().await, SessionState::Anonymous);
    assert!(!session.is_loading());
    assert_eq!(stack.server.request_count(), 0);
}

#[tokio::test]
async fn test_initialize_with_rejected_token_clears_it() {
    let stack = Stack::new(Some(tokens(1)));
    stack.server.accept_token(Some("access-9"));
    stack.server.route(
        HttpMethod::Post,
        "/auth/refresh",
        fail(401, "Refresh token revoked"),
    );

    let session = stack.session();
    assert_eq!(session.initialize().await, SessionState::Anonymous);
    assert!(stack.tokens.load().is_none());
    assert!(session.user().is_none());
}

#[tokio::test]
async fn test_failed_login_stays_anonymous() {
    let stack = Stack::new(None);
    stack.server.route(
        HttpMethod::Post,
        "/auth/login",
        fail(401, "Invalid email or password"),
    );
    let session = stack.session();
    session.initialize().await;

    let err = session
        .login(&LoginRequest {
            email: "kim@example.com".to_string(),
            password: "wrong".to_string(),
        })
        .await
        .unwrap_err();

    assert_eq!(err.message, "Invalid email or password");
    assert_eq!(session.state(), SessionState::Anonymous);
    assert!(stack.tokens.load().is_none());
    // A login 401 is not a session expiry
    assert_eq!(stack.server.requests_to(HttpMethod::Post, "/auth/refresh"), 0);
}

#[tokio::test]
async fn test_concurrent_queries_share_one_request() {
    let stack = Stack::new(Some(tokens(1)));
    stack.server.route(
        HttpMethod::Get,
        "/events/evt-1",
        ok(event_json("evt-1", 3, 10)),
    );

    let (a, b, c) = tokio::join!(
        stack.client.get_event("evt-1"),
        stack.client.get_event("evt-1"),
        stack.client.get_event("evt-1"),
    );

    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(c.unwrap().registered_count, 3);
    assert_eq!(stack.server.requests_to(HttpMethod::Get, "/events/evt-1"), 1);
    assert_eq!(stack.cache.stats().shared_loads, 2);
}

#[tokio::test(start_paused = true)]
async fn test_stale_detail_is_reloaded() {
    let stack = Stack::new(Some(tokens(1)));
    stack.server.route(
        HttpMethod::Get,
        "/events/evt-1",
        ok(event_json("evt-1", 3, 10)),
    );
    stack.server.route(
        HttpMethod::Get,
        "/events/evt-1",
        ok(event_json("evt-1", 4, 10)),
    );

    assert_eq!(
        stack.client.get_event("evt-1").await.unwrap().registered_count,
        3
    );
    tokio::time::advance(Duration::from_secs(4 * 60)).await;
    assert_eq!(
        stack.client.get_event("evt-1").await.unwrap().registered_count,
        3
    );
    tokio::time::advance(Duration::from_secs(2 * 60)).await;
    assert_eq!(
        stack.client.get_event("evt-1").await.unwrap().registered_count,
        4
    );
    assert_eq!(stack.server.requests_to(HttpMethod::Get, "/events/evt-1"), 2);
}
