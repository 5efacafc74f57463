//! Device Authorization Grant state machine.
//!
//! [`DeviceAuthorizationFlow`] drives one authorization attempt at a time:
//! [`start`](DeviceAuthorizationFlow::start) opens a session with the
//! server, [`poll`](DeviceAuthorizationFlow::poll) exchanges the device code
//! on the server-dictated interval until the user acts. Both have async
//! adapters ([`resume`](DeviceAuthorizationFlow::resume),
//! [`resume_with`](DeviceAuthorizationFlow::resume_with)) that share the same
//! cancellation semantics.
//!
//! All mutable state sits behind one lock that is never held across an
//! await. Each spawned task carries the generation it was started under;
//! outcomes from an older generation are discarded.

use std::fmt;
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bon::Builder;
use strum::{AsRefStr, Display};
use tokio::sync::{oneshot, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use super::observer::{DeviceAuthorizationObserver, ObserverRegistry};
use super::store::{TokenStore, DEFAULT_PROFILE};
use super::{AuthError, DeviceCodeSession, PollOutcome, Token};
use crate::api::ApiResponse;
use crate::config::{ClientConfig, DEFAULT_SLOW_DOWN_INCREMENT};
use crate::error::ApiClientError;
use crate::oauth2::{poll_outcome, OAuth2Client};

/// Lower bound applied to server-provided polling intervals.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Callback receiving the result of [`DeviceAuthorizationFlow::start`] or
/// [`DeviceAuthorizationFlow::poll`].
pub type Completion<T> = Box<dyn FnOnce(Result<T, AuthError>) + Send + 'static>;

/// Where the flow currently is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum FlowState {
    #[default]
    Idle,
    /// Start-authorization request in flight.
    Authenticating,
    /// Session open; waiting for the user.
    Polling,
    /// Interval just lengthened by `slow_down`; the next `authorization_pending`
    /// returns to `Polling`.
    BackoffAdjusted,
    Completed,
    Failed,
    Cancelled,
}

impl FlowState {
    /// `Completed`, `Failed` or `Cancelled`. A new `start` is accepted from any
    /// of these.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn is_active(self) -> bool {
        matches!(
            self,
            Self::Authenticating | Self::Polling | Self::BackoffAdjusted
        )
    }
}

/// Per-flow settings.
#[derive(Clone, Builder)]
pub struct FlowOptions {
    #[builder(into)]
    pub client_id: String,
    /// Space-separated scopes.
    #[builder(into)]
    pub scopes: String,
    #[builder(default = DEFAULT_SLOW_DOWN_INCREMENT)]
    pub slow_down_increment: Duration,
    /// Fail with [`AuthError::SessionExpired`] once `expires_in` has elapsed
    /// since polling began, instead of waiting for `expired_token`.
    #[builder(default)]
    pub enforce_expiry: bool,
    /// Receives the token on success.
    pub token_store: Option<Arc<dyn TokenStore>>,
    #[builder(into, default = DEFAULT_PROFILE.to_string())]
    pub profile: String,
}

impl fmt::Debug for FlowOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowOptions")
            .field("client_id", &self.client_id)
            .field("scopes", &self.scopes)
            .field("slow_down_increment", &self.slow_down_increment)
            .field("enforce_expiry", &self.enforce_expiry)
            .field("token_store", &self.token_store.as_ref().map(|_| ".."))
            .field("profile", &self.profile)
            .finish()
    }
}

impl FlowOptions {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::builder()
            .client_id(config.client_id.clone())
            .scopes(config.scopes.clone())
            .slow_down_increment(config.slow_down_increment)
            .enforce_expiry(config.enforce_expiry)
            .build()
    }
}

/// Inputs to [`FlowInner::transition`].
#[derive(Debug)]
enum Event {
    /// A new start or poll displaces whatever was running.
    Begin {
        state: FlowState,
        context: Option<DeviceCodeSession>,
        token: CancellationToken,
    },
    SessionOpened(DeviceCodeSession),
    PollPending,
    BackoffAdjusted,
    /// `Completed` or `Failed`.
    Finished(FlowState),
    /// `Cancelled` (cancel) or `Idle` (reset).
    Stopped(FlowState),
}

/// Side effects to run once the lock is released.
#[derive(Debug, Default)]
struct Effects {
    started: bool,
    finished: bool,
    displaced: Option<CancellationToken>,
}

#[derive(Debug, Default)]
struct FlowInner {
    state: FlowState,
    context: Option<DeviceCodeSession>,
    is_authenticating: bool,
    generation: u64,
    active: Option<CancellationToken>,
}

impl FlowInner {
    fn transition(&mut self, event: Event) -> Effects {
        let mut effects = Effects::default();
        match event {
            Event::Begin {
                state,
                context,
                token,
            } => {
                effects.displaced = self.active.replace(token);
                self.generation += 1;
                effects.started = !mem::replace(&mut self.is_authenticating, true);
                self.state = state;
                self.context = context;
            }
            Event::SessionOpened(context) => {
                self.active = None;
                self.state = FlowState::Polling;
                self.context = Some(context);
            }
            Event::PollPending => {
                if self.state == FlowState::BackoffAdjusted {
                    self.state = FlowState::Polling;
                }
            }
            Event::BackoffAdjusted => self.state = FlowState::BackoffAdjusted,
            Event::Finished(state) => {
                self.active = None;
                self.context = None;
                self.state = state;
                effects.finished = mem::replace(&mut self.is_authenticating, false);
            }
            Event::Stopped(state) => {
                effects.displaced = self.active.take();
                self.generation += 1;
                let had_session = self.is_authenticating
                    || self.context.is_some()
                    || effects.displaced.is_some();
                effects.finished = mem::replace(&mut self.is_authenticating, false);
                self.context = None;
                if state == FlowState::Idle || had_session {
                    self.state = state;
                }
            }
        }
        effects
    }
}

struct Shared {
    client: OAuth2Client,
    options: FlowOptions,
    inner: Mutex<FlowInner>,
    observers: ObserverRegistry,
    state_tx: watch::Sender<FlowState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, FlowInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply(&self, inner: &mut FlowInner, event: Event) -> Effects {
        let effects = inner.transition(event);
        self.state_tx.send_replace(inner.state);
        effects
    }

    /// Apply `event` only if `generation` is still current.
    fn apply_current(&self, generation: u64, event: Event) -> Option<Effects> {
        let mut inner = self.lock();
        if inner.generation != generation {
            return None;
        }
        Some(self.apply(&mut inner, event))
    }

    fn begin(
        &self,
        state: FlowState,
        context: Option<DeviceCodeSession>,
        token: CancellationToken,
    ) -> u64 {
        let (generation, effects) = {
            let mut inner = self.lock();
            let effects = self.apply(
                &mut inner,
                Event::Begin {
                    state,
                    context,
                    token,
                },
            );
            (inner.generation, effects)
        };
        self.run_effects(effects);
        generation
    }

    fn stop(&self, state: FlowState) {
        let effects = {
            let mut inner = self.lock();
            self.apply(&mut inner, Event::Stopped(state))
        };
        self.run_effects(effects);
    }

    fn run_effects(&self, effects: Effects) {
        if let Some(token) = effects.displaced {
            token.cancel();
        }
        if effects.started {
            self.observers.notify(|o| o.authentication_started());
        }
        if effects.finished {
            self.observers.notify(|o| o.authentication_finished());
        }
    }

    fn finish_start(
        &self,
        generation: u64,
        result: Result<ApiResponse<DeviceCodeSession>, ApiClientError>,
        completion: Completion<DeviceCodeSession>,
    ) {
        match result {
            Ok(response) => {
                let context = response.result;
                if self
                    .apply_current(generation, Event::SessionOpened(context.clone()))
                    .is_none()
                {
                    tracing::debug!("Discarding superseded start response");
                    return completion(Err(AuthError::Cancelled));
                }
                tracing::info!(
                    user_code = %context.user_code,
                    verification_uri = %context.verification_uri,
                    expires_in_secs = context.expires_in.as_secs(),
                    request_id = response.request_id.as_deref().unwrap_or("-"),
                    "Device authorization session opened"
                );
                self.observers.notify(|o| o.context_received(&context));
                completion(Ok(context));
            }
            Err(error) => {
                let Some(effects) = self.apply_current(generation, Event::Finished(FlowState::Failed))
                else {
                    return completion(Err(AuthError::Cancelled));
                };
                let error = AuthError::Api(error);
                tracing::warn!(error = %error, "Device authorization request failed");
                if effects.finished {
                    self.observers.notify(|o| o.authentication_finished());
                }
                self.observers.notify(|o| o.error_received(&error));
                completion(Err(error));
            }
        }
    }

    async fn poll_until_done(
        &self,
        generation: u64,
        context: &DeviceCodeSession,
    ) -> Result<Token, AuthError> {
        let began = Instant::now();
        let mut interval = context.interval.max(MIN_POLL_INTERVAL);
        let mut ticker = poll_timer(interval);
        let mut attempt: u32 = 0;
        loop {
            ticker.tick().await;
            if self.options.enforce_expiry && began.elapsed() >= context.expires_in {
                return Err(AuthError::SessionExpired);
            }
            attempt += 1;
            let result = self
                .client
                .poll_for_token(&self.options.client_id, &context.device_code)
                .await;
            match poll_outcome(result) {
                PollOutcome::Pending => {
                    tracing::debug!(attempt, "Authorization pending");
                    if self
                        .apply_current(generation, Event::PollPending)
                        .is_none()
                    {
                        return Err(AuthError::Cancelled);
                    }
                }
                PollOutcome::SlowDown => {
                    interval += self.options.slow_down_increment;
                    tracing::debug!(
                        attempt,
                        interval_secs = interval.as_secs_f64(),
                        "Server asked to slow down"
                    );
                    if self
                        .apply_current(generation, Event::BackoffAdjusted)
                        .is_none()
                    {
                        return Err(AuthError::Cancelled);
                    }
                    ticker = poll_timer(interval);
                }
                PollOutcome::Token(token) => return Ok(token),
                PollOutcome::Terminal(error) => return Err(error),
            }
        }
    }

    fn finish_poll(
        &self,
        generation: u64,
        result: Result<Token, AuthError>,
        completion: Completion<Token>,
    ) {
        let state = if result.is_ok() {
            FlowState::Completed
        } else {
            FlowState::Failed
        };
        let Some(effects) = self.apply_current(generation, Event::Finished(state)) else {
            tracing::debug!("Discarding superseded poll outcome");
            return completion(Err(AuthError::Cancelled));
        };

        match result {
            Ok(token) => {
                tracing::info!(
                    token_type = %token.token_type,
                    expires_in = token.expires_in,
                    "Device authorization completed"
                );
                self.observers.notify(|o| o.token_received(&token));
                if effects.finished {
                    self.observers.notify(|o| o.authentication_finished());
                }
                if let Some(store) = &self.options.token_store {
                    if let Err(error) =
                        store.save(&self.options.client_id, &self.options.profile, &token)
                    {
                        tracing::warn!(error = %error, "Failed to save token");
                    }
                }
                completion(Ok(token));
            }
            Err(error) => {
                tracing::warn!(error = %error, "Device authorization failed");
                self.observers.notify(|o| o.error_received(&error));
                if effects.finished {
                    self.observers.notify(|o| o.authentication_finished());
                }
                completion(Err(error));
            }
        }
    }
}

/// Recurring timer whose first tick is one `period` from now.
fn poll_timer(period: Duration) -> Interval {
    let mut timer = tokio::time::interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    timer
}

/// Runs the Device Authorization Grant against one client.
///
/// Cheap to clone; clones share state. `start` and `poll` spawn onto the
/// current tokio runtime.
///
/// # Example
/// ```no_run
/// use device_grant::auth::DeviceAuthorizationFlow;
/// use device_grant::config::ClientConfig;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ClientConfig::from_env()?;
/// let flow = DeviceAuthorizationFlow::from_config(&config)?;
/// let session = flow.resume().await?;
/// println!("Visit {} and enter {}", session.verification_uri, session.user_code);
/// let token = flow.resume_with(session).await?;
/// println!("{}", token.access_token);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct DeviceAuthorizationFlow {
    shared: Arc<Shared>,
}

impl fmt::Debug for DeviceAuthorizationFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.shared.lock();
        f.debug_struct("DeviceAuthorizationFlow")
            .field("state", &inner.state)
            .field("is_authenticating", &inner.is_authenticating)
            .field("options", &self.shared.options)
            .finish()
    }
}

impl DeviceAuthorizationFlow {
    pub fn new(client: OAuth2Client, options: FlowOptions) -> Self {
        let (state_tx, _) = watch::channel(FlowState::Idle);
        Self {
            shared: Arc::new(Shared {
                client,
                options,
                inner: Mutex::new(FlowInner::default()),
                observers: ObserverRegistry::default(),
                state_tx,
            }),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiClientError> {
        Ok(Self::new(
            OAuth2Client::from_config(config)?,
            FlowOptions::from_config(config),
        ))
    }

    pub fn options(&self) -> &FlowOptions {
        &self.shared.options
    }

    pub fn state(&self) -> FlowState {
        self.shared.lock().state
    }

    /// Subscribe to state changes.
    pub fn watch_state(&self) -> watch::Receiver<FlowState> {
        self.shared.state_tx.subscribe()
    }

    /// The open session, if any.
    pub fn context(&self) -> Option<DeviceCodeSession> {
        self.shared.lock().context.clone()
    }

    pub fn is_authenticating(&self) -> bool {
        self.shared.lock().is_authenticating
    }

    pub fn add_observer(&self, observer: Arc<dyn DeviceAuthorizationObserver>) {
        self.shared.observers.add(observer);
    }

    pub fn remove_observer(&self, observer: &Arc<dyn DeviceAuthorizationObserver>) -> bool {
        self.shared.observers.remove(observer)
    }

    /// Open a new session, cancelling any active one.
    ///
    /// `completion` receives the session context, the request error, or
    /// [`AuthError::Cancelled`] if the session is superseded first.
    pub fn start<F>(&self, completion: F)
    where
        F: FnOnce(Result<DeviceCodeSession, AuthError>) + Send + 'static,
    {
        let completion: Completion<DeviceCodeSession> = Box::new(completion);
        let token = CancellationToken::new();
        let generation = self
            .shared
            .begin(FlowState::Authenticating, None, token.clone());
        let shared = Arc::clone(&self.shared);
        let span = tracing::info_span!("device_authorization", session = %Uuid::new_v4());

        tokio::spawn(
            async move {
                tracing::debug!("Requesting device authorization");
                let request = shared
                    .client
                    .start_authorization(&shared.options.client_id, &shared.options.scopes);
                tokio::select! {
                    _ = token.cancelled() => completion(Err(AuthError::Cancelled)),
                    result = request => shared.finish_start(generation, result, completion),
                }
            }
            .instrument(span),
        );
    }

    /// Async form of [`start`](Self::start).
    pub async fn resume(&self) -> Result<DeviceCodeSession, AuthError> {
        let (tx, rx) = oneshot::channel();
        self.start(move |result| {
            let _ = tx.send(result);
        });
        rx.await.unwrap_or(Err(AuthError::Cancelled))
    }

    /// Poll the token endpoint for `context` until the user acts.
    ///
    /// The first request goes out one interval after this call. Replaces any
    /// outstanding poll.
    pub fn poll<F>(&self, context: DeviceCodeSession, completion: F)
    where
        F: FnOnce(Result<Token, AuthError>) + Send + 'static,
    {
        let completion: Completion<Token> = Box::new(completion);
        let token = CancellationToken::new();
        let generation =
            self.shared
                .begin(FlowState::Polling, Some(context.clone()), token.clone());
        let shared = Arc::clone(&self.shared);
        let span = tracing::info_span!(
            "device_authorization_poll",
            session = %Uuid::new_v4(),
            user_code = %context.user_code
        );

        tokio::spawn(
            async move {
                tracing::debug!(
                    interval_secs = context.interval.as_secs_f64(),
                    "Polling for token"
                );
                tokio::select! {
                    _ = token.cancelled() => completion(Err(AuthError::Cancelled)),
                    result = shared.poll_until_done(generation, &context) => {
                        shared.finish_poll(generation, result, completion)
                    }
                }
            }
            .instrument(span),
        );
    }

    /// Async form of [`poll`](Self::poll).
    pub async fn resume_with(&self, context: DeviceCodeSession) -> Result<Token, AuthError> {
        let (tx, rx) = oneshot::channel();
        self.poll(context, move |result| {
            let _ = tx.send(result);
        });
        rx.await.unwrap_or(Err(AuthError::Cancelled))
    }

    /// Stop any active session. The state becomes `Cancelled` if one was
    /// active; otherwise nothing changes.
    pub fn cancel(&self) {
        tracing::debug!("Cancelling device authorization");
        self.shared.stop(FlowState::Cancelled);
    }

    /// Stop any active session and return to `Idle`.
    pub fn reset(&self) {
        self.shared.stop(FlowState::Idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn session() -> DeviceCodeSession {
        DeviceCodeSession {
            device_code: "d1".to_string(),
            user_code: "U1".to_string(),
            verification_uri: Url::parse("https://x/activate").unwrap(),
            verification_uri_complete: Url::parse("https://x/activate?u=U1").unwrap(),
            expires_in: Duration::from_secs(600),
            interval: Duration::from_secs(5),
        }
    }

    fn begin(inner: &mut FlowInner, state: FlowState) -> Effects {
        inner.transition(Event::Begin {
            state,
            context: None,
            token: CancellationToken::new(),
        })
    }

    #[test]
    fn started_fires_only_on_rising_edge() {
        let mut inner = FlowInner::default();
        assert!(begin(&mut inner, FlowState::Authenticating).started);
        let again = begin(&mut inner, FlowState::Authenticating);
        assert!(!again.started);
        assert!(again.displaced.is_some());
        assert_eq!(inner.generation, 2);
    }

    #[test]
    fn finishing_clears_context_and_flags() {
        let mut inner = FlowInner::default();
        begin(&mut inner, FlowState::Authenticating);
        inner.transition(Event::SessionOpened(session()));
        assert_eq!(inner.state, FlowState::Polling);
        assert!(inner.context.is_some());

        let effects = inner.transition(Event::Finished(FlowState::Completed));
        assert!(effects.finished);
        assert_eq!(inner.state, FlowState::Completed);
        assert!(inner.context.is_none());
        assert!(!inner.is_authenticating);
    }

    #[test]
    fn cancel_only_marks_active_sessions() {
        let mut inner = FlowInner::default();
        let effects = inner.transition(Event::Stopped(FlowState::Cancelled));
        assert!(!effects.finished);
        assert_eq!(inner.state, FlowState::Idle);

        begin(&mut inner, FlowState::Authenticating);
        let effects = inner.transition(Event::Stopped(FlowState::Cancelled));
        assert!(effects.finished);
        assert!(effects.displaced.is_some());
        assert_eq!(inner.state, FlowState::Cancelled);

        let effects = inner.transition(Event::Stopped(FlowState::Cancelled));
        assert!(!effects.finished);
        assert_eq!(inner.state, FlowState::Cancelled);
    }

    #[test]
    fn pending_after_backoff_returns_to_polling() {
        let mut inner = FlowInner::default();
        begin(&mut inner, FlowState::Polling);
        inner.transition(Event::PollPending);
        assert_eq!(inner.state, FlowState::Polling);

        inner.transition(Event::BackoffAdjusted);
        assert_eq!(inner.state, FlowState::BackoffAdjusted);
        let effects = inner.transition(Event::PollPending);
        assert!(!effects.finished);
        assert_eq!(inner.state, FlowState::Polling);
        assert!(inner.is_authenticating);
    }

    #[test]
    fn reset_always_returns_to_idle() {
        let mut inner = FlowInner::default();
        begin(&mut inner, FlowState::Authenticating);
        inner.transition(Event::Finished(FlowState::Failed));
        inner.transition(Event::Stopped(FlowState::Idle));
        assert_eq!(inner.state, FlowState::Idle);
        assert!(inner.context.is_none());
    }

    #[test]
    fn stop_invalidates_current_generation() {
        let mut inner = FlowInner::default();
        begin(&mut inner, FlowState::Polling);
        let generation = inner.generation;
        inner.transition(Event::Stopped(FlowState::Cancelled));
        assert_ne!(inner.generation, generation);
    }

    #[test]
    fn terminal_states() {
        assert!(FlowState::Completed.is_terminal());
        assert!(FlowState::Cancelled.is_terminal());
        assert!(!FlowState::BackoffAdjusted.is_terminal());
        assert!(FlowState::BackoffAdjusted.is_active());
        assert_eq!(FlowState::BackoffAdjusted.to_string(), "backoff_adjusted");
    }
}
