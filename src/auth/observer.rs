//! Observers notified of device-flow lifecycle events.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use super::{AuthError, DeviceCodeSession, Token};

/// Receives lifecycle notifications from a
/// [`DeviceAuthorizationFlow`](super::DeviceAuthorizationFlow).
///
/// Every method has a no-op default, so implementors only override what
/// they care about. Calls happen synchronously on the task that caused the
/// transition, never while the flow's state lock is held.
pub trait DeviceAuthorizationObserver: Send + Sync {
    /// `is_authenticating` went from false to true.
    fn authentication_started(&self) {}
    /// `is_authenticating` went from true to false.
    fn authentication_finished(&self) {}
    /// A session was opened; show `user_code` and `verification_uri`.
    fn context_received(&self, _context: &DeviceCodeSession) {}
    fn token_received(&self, _token: &Token) {}
    fn error_received(&self, _error: &AuthError) {}
}

/// Ordered set of observers.
#[derive(Default)]
pub struct ObserverRegistry {
    observers: RwLock<Vec<Arc<dyn DeviceAuthorizationObserver>>>,
}

impl fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("len", &self.len())
            .finish()
    }
}

impl ObserverRegistry {
    pub fn add(&self, observer: Arc<dyn DeviceAuthorizationObserver>) {
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    /// Remove a previously added observer (compared by identity).
    pub fn remove(&self, observer: &Arc<dyn DeviceAuthorizationObserver>) -> bool {
        let mut observers = self
            .observers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = observers.len();
        observers.retain(|existing| !Arc::ptr_eq(existing, observer));
        observers.len() != before
    }

    pub fn len(&self) -> usize {
        self.observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke `f` on each observer in registration order.
    ///
    /// Works on a snapshot, so observers may add or remove observers from
    /// inside a callback.
    pub fn notify(&self, f: impl Fn(&dyn DeviceAuthorizationObserver)) {
        let snapshot = self
            .observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for observer in &snapshot {
            f(observer.as_ref());
        }
    }
}
