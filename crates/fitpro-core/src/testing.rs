//! Test helpers: a scripted HTTP transport and JWT builders.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::api::transport::{HttpRequest, HttpResponse, HttpTransport, TransportError};
use crate::api::ApiContext;
use crate::auth::TokenStore;
use crate::pending::PendingCourses;
use crate::storage::MemoryStore;

type Handler = dyn Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync;
type Delay = dyn Fn(&HttpRequest) -> Duration + Send + Sync;

/// Transport that answers every request through a closure and records what
/// it was sent
pub struct MockTransport {
    handler: Box<Handler>,
    delay: Option<Box<Delay>>,
    requests: Mutex<Vec<HttpRequest>>,
    calls: AtomicUsize,
}

impl MockTransport {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            delay: None,
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Answer every request with `200` and the given JSON body
    pub fn ok_json(body: &str) -> Self {
        let body = body.to_string();
        Self::new(move |_| Ok(json(200, &body)))
    }

    /// Sleep before answering, to keep requests in flight
    pub fn with_delay(self, delay: Duration) -> Self {
        self.with_delay_by(move |_| delay)
    }

    /// Sleep for a per-request duration before answering
    pub fn with_delay_by<F>(mut self, delay: F) -> Self
    where
        F: Fn(&HttpRequest) -> Duration + Send + Sync + 'static,
    {
        self.delay = Some(Box::new(delay));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Option<HttpRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        let delay = self.delay.as_ref().map(|delay| delay(&request));
        if let Some(delay) = delay.filter(|d| !d.is_zero()) {
            tokio::time::sleep(delay).await;
        }
        (self.handler)(&request)
    }
}

pub fn json(status: u16, body: &str) -> HttpResponse {
    HttpResponse {
        status,
        content_type: Some("application/json; charset=utf-8".to_string()),
        body: body.to_string(),
    }
}

pub fn text(status: u16, body: &str) -> HttpResponse {
    HttpResponse {
        status,
        content_type: Some("text/plain".to_string()),
        body: body.to_string(),
    }
}

/// Unsigned JWT for `a@b.com`, optionally carrying an `exp` claim
pub fn make_token(exp: Option<i64>) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = match exp {
        Some(exp) => format!(r#"{{"email":"a@b.com","exp":{}}}"#, exp),
        None => r#"{"email":"a@b.com"}"#.to_string(),
    };
    format!("{}.{}.signature", header, URL_SAFE_NO_PAD.encode(payload))
}

/// Token that stays valid for an hour
pub fn fresh_token() -> String {
    make_token(Some(chrono::Utc::now().timestamp() + 3600))
}

/// Context, token store and pending set wired to a mock transport
pub fn harness(transport: MockTransport) -> (Arc<MockTransport>, ApiContext, TokenStore, PendingCourses) {
    let transport = Arc::new(transport);
    let ctx = ApiContext::new(transport.clone(), "http://api.test/fitness");
    let tokens = TokenStore::new(Arc::new(MemoryStore::new()));
    let pending = PendingCourses::new(Arc::new(MemoryStore::new()));
    (transport, ctx, tokens, pending)
}
