use std::sync::{Arc, Mutex};

use futures::future::{self, BoxFuture, FutureExt};

use crate::error::InterceptorPhase;
use crate::util::lock_unpoisoned;
use crate::{ApiError, Result};

/// Success-path handler: receives the current value, returns the value fed
/// to the next registration (or a rejection).
pub type FulfilledHandler<T> = Arc<dyn Fn(T) -> BoxFuture<'static, Result<T>> + Send + Sync>;

/// Rejection handler paired with a registration. Invoked when that same
/// registration's fulfilled handler rejects; may recover by returning `Ok`.
pub type RejectedHandler<T> = Arc<dyn Fn(ApiError) -> BoxFuture<'static, Result<T>> + Send + Sync>;

/// Stable handle to one interceptor registration.
///
/// Identifiers are allocated from a monotonically increasing counter, never
/// from positions, so ejecting one registration leaves every other handle
/// valid.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct InterceptorId(u64);

struct Registration<T> {
    id: u64,
    on_fulfilled: Option<FulfilledHandler<T>>,
    on_rejected: Option<RejectedHandler<T>>,
}

impl<T> Clone for Registration<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            on_fulfilled: self.on_fulfilled.clone(),
            on_rejected: self.on_rejected.clone(),
        }
    }
}

struct ChainState<T> {
    next_id: u64,
    entries: Vec<Registration<T>>,
}

/// Insertion-ordered pipeline of value-transforming handlers.
///
/// A client carries two chains: one over request descriptors and one over
/// responses. Handlers run strictly sequentially; each handler's output
/// feeds the next. An unrecovered rejection skips every later handler in
/// the phase.
pub struct InterceptorChain<T> {
    phase: InterceptorPhase,
    state: Mutex<ChainState<T>>,
}

impl<T: Send + 'static> InterceptorChain<T> {
    pub(crate) fn new(phase: InterceptorPhase) -> Self {
        Self {
            phase,
            state: Mutex::new(ChainState {
                next_id: 0,
                entries: Vec::new(),
            }),
        }
    }

    /// Appends a registration and returns its stable handle.
    pub fn add(
        &self,
        on_fulfilled: Option<FulfilledHandler<T>>,
        on_rejected: Option<RejectedHandler<T>>,
    ) -> InterceptorId {
        let mut state = lock_unpoisoned(&self.state);
        let id = state.next_id;
        state.next_id += 1;
        state.entries.push(Registration {
            id,
            on_fulfilled,
            on_rejected,
        });
        InterceptorId(id)
    }

    /// Appends a synchronous transform as a fulfilled handler.
    pub fn add_fn<F>(&self, transform: F) -> InterceptorId
    where
        F: Fn(T) -> Result<T> + Send + Sync + 'static,
    {
        self.add(
            Some(Arc::new(move |value| future::ready(transform(value)).boxed())),
            None,
        )
    }

    /// Removes exactly the registration behind `id`. Returns whether it was
    /// still present. Handles of other registrations are unaffected.
    pub fn eject(&self, id: InterceptorId) -> bool {
        let mut state = lock_unpoisoned(&self.state);
        let before = state.entries.len();
        state.entries.retain(|entry| entry.id != id.0);
        state.entries.len() != before
    }

    /// Builds a rejection error attributed to this chain's phase.
    pub fn rejection(&self, message: impl Into<String>) -> ApiError {
        ApiError::Interceptor {
            phase: self.phase,
            message: message.into(),
        }
    }

    /// Runs the chain over `value` in registration order.
    ///
    /// A rejection from a handler routes to that same registration's
    /// rejected handler when present; recovery (`Ok`) continues the chain,
    /// re-rejection propagates and skips all later handlers.
    pub(crate) async fn run(&self, value: T) -> Result<T> {
        // Snapshot under the lock; handlers must run without holding it.
        let entries: Vec<Registration<T>> = lock_unpoisoned(&self.state).entries.clone();

        let mut current = value;
        for entry in entries {
            let step = match &entry.on_fulfilled {
                Some(handler) => handler(current).await,
                None => Ok(current),
            };
            current = match step {
                Ok(next) => next,
                Err(err) => match &entry.on_rejected {
                    Some(recover) => recover(err).await?,
                    None => return Err(err),
                },
            };
        }
        Ok(current)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        lock_unpoisoned(&self.state).entries.len()
    }
}
