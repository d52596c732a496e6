use std::{
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::ServiceError;

/// Lifecycle of one remote request as seen by the dashboard.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "lowercase")]
pub enum RequestState<T> {
    #[default]
    Idle,
    Loading,
    Succeeded(T),
    Failed(String),
}

impl<T> RequestState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, RequestState::Loading)
    }

    pub fn result(&self) -> Option<&T> {
        match self {
            RequestState::Succeeded(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            RequestState::Failed(message) => Some(message.as_str()),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RequestState::Idle => "idle",
            RequestState::Loading => "loading",
            RequestState::Succeeded(_) => "succeeded",
            RequestState::Failed(_) => "failed",
        }
    }
}

/// One operation of the remote computation service.
pub trait Endpoint: Send + Sync + 'static {
    type Params: Send + 'static;
    type Output: Send + 'static;

    const NAME: &'static str;

    /// Shown when the service gives no error text of its own.
    const FAILURE: &'static str;

    fn call(
        &self,
        params: Self::Params,
    ) -> impl Future<Output = Result<Self::Output, ServiceError>> + Send;
}

#[derive(Debug)]
struct Slot<T> {
    generation: u64,
    revision: u64,
    state: RequestState<T>,
}

/// Owns the state of one endpoint's requests. Only the latest trigger may
/// publish a result; older responses are dropped when they arrive.
pub struct RequestController<E: Endpoint> {
    endpoint: Arc<E>,
    slot: Arc<Mutex<Slot<E::Output>>>,
}

impl<E: Endpoint> Clone for RequestController<E> {
    fn clone(&self) -> Self {
        Self {
            endpoint: Arc::clone(&self.endpoint),
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<E: Endpoint> RequestController<E> {
    pub fn new(endpoint: E) -> Self {
        Self {
            endpoint: Arc::new(endpoint),
            slot: Arc::new(Mutex::new(Slot {
                generation: 0,
                revision: 0,
                state: RequestState::Idle,
            })),
        }
    }

    /// Moves to `Loading` right away and returns the call itself. The state
    /// stays `Loading` until the returned future is driven to completion.
    pub fn trigger(&self, params: E::Params) -> impl Future<Output = ()> + Send + 'static {
        let generation = {
            let mut slot = lock(&self.slot);
            slot.generation += 1;
            slot.revision += 1;
            slot.state = RequestState::Loading;
            slot.generation
        };
        debug!("{} request triggered, generation {generation}", E::NAME);

        let endpoint = Arc::clone(&self.endpoint);
        let slot = Arc::clone(&self.slot);
        async move {
            let outcome = endpoint.call(params).await;

            let mut slot = lock(&slot);
            if slot.generation != generation {
                debug!(
                    "discarding stale {} response for generation {generation}, current is {}",
                    E::NAME,
                    slot.generation
                );
                return;
            }

            slot.state = match outcome {
                Ok(value) => RequestState::Succeeded(value),
                Err(err) => {
                    warn!("{} request failed: {err}", E::NAME);
                    RequestState::Failed(err.service_message().unwrap_or(E::FAILURE).to_string())
                }
            };
            slot.revision += 1;
        }
    }

    pub fn read<R>(&self, f: impl FnOnce(&RequestState<E::Output>) -> R) -> R {
        f(&lock(&self.slot).state)
    }

    /// Bumped on every state change; lets callers cache views of the state.
    pub fn revision(&self) -> u64 {
        lock(&self.slot).revision
    }

    pub fn is_loading(&self) -> bool {
        self.read(|state| state.is_loading())
    }

    pub fn state(&self) -> RequestState<E::Output>
    where
        E::Output: Clone,
    {
        self.read(|state| state.clone())
    }
}

fn lock<T>(slot: &Mutex<T>) -> MutexGuard<'_, T> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}
