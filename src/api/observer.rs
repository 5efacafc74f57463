//! Hooks run around every exchange made by an [`ApiClient`](super::ApiClient).

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::ApiClientError;
use crate::http::{HttpRequest, HttpResponse};

/// Sees, and may amend, each request an [`ApiClient`](super::ApiClient)
/// sends.
///
/// All methods default to no-ops. `will_send` runs after the client has
/// stamped its common headers, so observers can override them.
pub trait ApiClientObserver: Send + Sync {
    fn will_send(&self, _request: &mut HttpRequest) {}
    /// The response passed validation.
    fn did_send_response(&self, _request: &HttpRequest, _response: &HttpResponse) {}
    /// Transport, status or decoding failure.
    fn did_send_error(&self, _request: &HttpRequest, _error: &ApiClientError) {}
}

/// Ordered set of [`ApiClientObserver`]s.
#[derive(Default)]
pub struct ApiObserverRegistry {
    observers: RwLock<Vec<Arc<dyn ApiClientObserver>>>,
}

impl fmt::Debug for ApiObserverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiObserverRegistry")
            .field("len", &self.len())
            .finish()
    }
}

impl ApiObserverRegistry {
    pub fn add(&self, observer: Arc<dyn ApiClientObserver>) {
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    /// Remove by identity.
    pub fn remove(&self, observer: &Arc<dyn ApiClientObserver>) -> bool {
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

    /// Invoke `f` on a snapshot of the observers, in registration order.
    pub fn notify(&self, mut f: impl FnMut(&dyn ApiClientObserver)) {
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
