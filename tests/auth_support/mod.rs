#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use device_grant::auth::{
    AuthError, DeviceAuthorizationFlow, DeviceAuthorizationObserver, DeviceCodeSession,
    FlowOptions, Token, TokenStore,
};
use device_grant::config::ClientConfig;
use device_grant::http::{HttpRequest, HttpResponse, HttpTransport, TransportError};
use device_grant::oauth2::OAuth2Client;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde_json::{json, Value};
use tokio::time::Instant;
use url::Url;

pub const CLIENT_ID: &str = "client-1";
pub const ISSUER: &str = "https://example.com/oauth2/default";

#[derive(Default)]
pub struct InMemoryTokenStore {
    tokens: Mutex<HashMap<(String, String), Token>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, client_id: &str, profile: &str) -> Option<Token> {
        self.tokens
            .lock()
            .expect("store lock poisoned")
            .get(&(client_id.to_string(), profile.to_string()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.tokens.lock().expect("store lock poisoned").len()
    }
}

impl TokenStore for InMemoryTokenStore {
    fn load(&self, client_id: &str, profile: &str) -> Result<Option<Token>, AuthError> {
        Ok(self.get(client_id, profile))
    }

    fn save(&self, client_id: &str, profile: &str, token: &Token) -> Result<(), AuthError> {
        self.tokens
            .lock()
            .expect("store lock poisoned")
            .insert((client_id.to_string(), profile.to_string()), token.clone());
        Ok(())
    }

    fn clear(&self, client_id: &str, profile: &str) -> Result<(), AuthError> {
        self.tokens
            .lock()
            .expect("store lock poisoned")
            .remove(&(client_id.to_string(), profile.to_string()));
        Ok(())
    }
}

/// Store whose writes always fail.
pub struct BrokenTokenStore;

impl TokenStore for BrokenTokenStore {
    fn load(&self, _: &str, _: &str) -> Result<Option<Token>, AuthError> {
        Ok(None)
    }

    fn save(&self, _: &str, _: &str, _: &Token) -> Result<(), AuthError> {
        Err(AuthError::Io("disk full".to_string()))
    }

    fn clear(&self, _: &str, _: &str) -> Result<(), AuthError> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Scripted {
    pub status: u16,
    pub body: String,
    pub headers: HeaderMap,
    pub delay: Option<Duration>,
}

impl Scripted {
    pub fn json(status: u16, body: Value) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Self {
            status,
            body: body.to_string(),
            headers,
            delay: None,
        }
    }

    pub fn raw(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            headers: HeaderMap::new(),
            delay: None,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_header(mut self, name: &'static str, value: &'static str) -> Self {
        self.headers.insert(name, HeaderValue::from_static(value));
        self
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub body: String,
    pub at: Instant,
}

#[derive(Default)]
struct Script {
    start: VecDeque<Scripted>,
    token: VecDeque<Scripted>,
    requests: Vec<RecordedRequest>,
}

/// Transport answering from per-endpoint queues. The last entry of a queue
/// keeps being served once the others are used up.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_start(&self, response: Scripted) -> &Self {
        self.script.lock().unwrap().start.push_back(response);
        self
    }

    pub fn push_token(&self, response: Scripted) -> &Self {
        self.script.lock().unwrap().token.push_back(response);
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.script.lock().unwrap().requests.clone()
    }

    pub fn token_requests(&self) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path.ends_with("/v1/token"))
            .collect()
    }

    pub fn start_requests(&self) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path.ends_with("/v1/device/authorize"))
            .collect()
    }
}

fn next(queue: &mut VecDeque<Scripted>) -> Option<Scripted> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let path = request.url.path().to_string();
        let scripted = {
            let mut script = self.script.lock().unwrap();
            script.requests.push(RecordedRequest {
                path: path.clone(),
                body: String::from_utf8(request.body.clone().unwrap_or_default())
                    .unwrap_or_default(),
                at: Instant::now(),
            });
            if path.ends_with("/v1/device/authorize") {
                next(&mut script.start)
            } else if path.ends_with("/v1/token") {
                next(&mut script.token)
            } else {
                None
            }
        };
        let scripted = scripted
            .ok_or_else(|| TransportError::Other(format!("no scripted response for {path}")))?;
        if let Some(delay) = scripted.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(HttpResponse {
            status: scripted.status,
            headers: scripted.headers,
            body: scripted.body.into_bytes(),
        })
    }
}

/// Observer that records every notification as a short string.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl DeviceAuthorizationObserver for RecordingObserver {
    fn authentication_started(&self) {
        self.push("started".to_string());
    }

    fn authentication_finished(&self) {
        self.push("finished".to_string());
    }

    fn context_received(&self, context: &DeviceCodeSession) {
        self.push(format!("context:{}", context.user_code));
    }

    fn token_received(&self, token: &Token) {
        self.push(format!("token:{}", token.access_token));
    }

    fn error_received(&self, error: &AuthError) {
        let kind = error
            .kind()
            .map(|kind| kind.to_string())
            .unwrap_or_else(|| format!("{error:?}"));
        self.push(format!("error:{kind}"));
    }
}

pub fn config() -> ClientConfig {
    ClientConfig::builder()
        .issuer(Url::parse(ISSUER).unwrap())
        .client_id(CLIENT_ID)
        .scopes("openid profile offline_access")
        .build()
}

pub fn options() -> FlowOptions {
    FlowOptions::from_config(&config())
}

pub fn flow(
    transport: &ScriptedTransport,
    options: FlowOptions,
) -> (DeviceAuthorizationFlow, Arc<RecordingObserver>) {
    let client = OAuth2Client::with_transport(&config(), Arc::new(transport.clone())).unwrap();
    let flow = DeviceAuthorizationFlow::new(client, options);
    let observer = Arc::new(RecordingObserver::default());
    flow.add_observer(observer.clone());
    (flow, observer)
}

pub fn session_json(expires_in: u64, interval: Option<u64>) -> Value {
    let mut body = json!({
        "device_code": "d1",
        "user_code": "U1",
        "verification_uri": "https://x/activate",
        "verification_uri_complete": "https://x/activate?u=U1",
        "expires_in": expires_in,
    });
    if let Some(interval) = interval {
        body["interval"] = json!(interval);
    }
    body
}

pub fn session(expires_in: u64, interval: u64) -> DeviceCodeSession {
    serde_json::from_value(session_json(expires_in, Some(interval))).unwrap()
}

pub fn token_json() -> Value {
    json!({"access_token": "tok", "token_type": "Bearer", "expires_in": 3600})
}

pub fn oauth_error(code: &str) -> Scripted {
    Scripted::json(
        400,
        json!({"error": code, "error_description": format!("{code} description")}),
    )
}

pub fn token_ok() -> Scripted {
    Scripted::json(200, token_json()).with_header("date", "Tue, 15 Nov 1994 08:12:31 GMT")
}
