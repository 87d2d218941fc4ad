use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::client::FetchClient;
use crate::request::RequestDescriptor;
use crate::util::lock_unpoisoned;
use crate::{ApiError, Result};

/// Lifecycle phase of a binding's most recent execution.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BindingStatus {
    Idle,
    Loading,
    Success,
    Error,
}

/// Observable state surfaced by a [`Binding`].
#[derive(Clone, Debug)]
pub struct BindingState<T> {
    pub status: BindingStatus,
    /// Last successful value; kept across reloads and failures.
    pub data: Option<T>,
    /// Last surfaced failure.
    pub error: Option<ApiError>,
}

impl<T> Default for BindingState<T> {
    fn default() -> Self {
        Self {
            status: BindingStatus::Idle,
            data: None,
            error: None,
        }
    }
}

struct ActiveCall {
    generation: u64,
    token: CancellationToken,
}

/// Binds one request descriptor (static, or computed from call-time
/// arguments) to observable `{status, data, error}` state.
///
/// `execute` is single-flight per binding: starting a new call cancels the
/// previous pending one, independently of the executor's de-duplication.
/// Observers subscribe through a `watch` channel.
pub struct Binding<T, A = ()> {
    client: FetchClient,
    descriptor_fn: Arc<dyn Fn(A) -> RequestDescriptor + Send + Sync>,
    state: watch::Sender<BindingState<T>>,
    active: Mutex<Option<ActiveCall>>,
    next_generation: AtomicU64,
}

impl<T> Binding<T, ()> {
    /// Binds a fixed descriptor.
    pub fn new(client: FetchClient, descriptor: RequestDescriptor) -> Self {
        Self::with_args(client, move |()| descriptor.clone())
    }
}

impl<T, A> Binding<T, A> {
    /// Binds a descriptor computed from `execute`'s arguments.
    pub fn with_args(
        client: FetchClient,
        descriptor_fn: impl Fn(A) -> RequestDescriptor + Send + Sync + 'static,
    ) -> Self {
        Self {
            client,
            descriptor_fn: Arc::new(descriptor_fn),
            state: watch::Sender::new(BindingState::default()),
            active: Mutex::new(None),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Watches state transitions.
    pub fn subscribe(&self) -> watch::Receiver<BindingState<T>> {
        self.state.subscribe()
    }

    /// Aborts the active call, if any. Accumulated data and error stay
    /// intact; the aborted `execute` resolves with a cancellation error.
    pub fn cancel(&self) {
        let active = lock_unpoisoned(&self.active);
        if let Some(call) = active.as_ref() {
            call.token.cancel();
        }
    }

    /// Cancels any pending call and clears all observable fields.
    pub fn reset(&self) {
        {
            let mut active = lock_unpoisoned(&self.active);
            if let Some(call) = active.take() {
                call.token.cancel();
            }
        }
        self.state.send_replace(BindingState::default());
    }
}

impl<T, A> Binding<T, A>
where
    T: DeserializeOwned + Clone,
{
    /// Current state snapshot.
    pub fn state(&self) -> BindingState<T> {
        self.state.borrow().clone()
    }

    /// Executes the bound descriptor, transitioning
    /// `Idle|Success|Error → Loading → Success|Error`.
    ///
    /// A call superseded by a newer `execute` (or cleared by `reset`) never
    /// writes state on completion; only the current call does.
    pub async fn execute(&self, args: A) -> Result<T> {
        let descriptor = (self.descriptor_fn)(args);
        // Compose with a factory-supplied token rather than replacing it:
        // cancelling either that token or this binding aborts the call.
        let token = match &descriptor.cancel {
            Some(external) => external.child_token(),
            None => CancellationToken::new(),
        };
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut active = lock_unpoisoned(&self.active);
            if let Some(previous) = active.replace(ActiveCall {
                generation,
                token: token.clone(),
            }) {
                previous.token.cancel();
            }
        }

        self.state.send_modify(|state| {
            state.status = BindingStatus::Loading;
        });

        let descriptor = descriptor.cancel_token(token.clone());
        let result = match self.client.execute(descriptor).await {
            Ok(response) => response.json::<T>(),
            Err(err) => Err(err),
        };

        let is_current = {
            let mut active = lock_unpoisoned(&self.active);
            match active.as_ref() {
                Some(call) if call.generation == generation => {
                    *active = None;
                    true
                }
                _ => false,
            }
        };

        match result {
            Ok(value) => {
                if is_current {
                    let data = value.clone();
                    self.state.send_modify(|state| {
                        state.status = BindingStatus::Success;
                        state.data = Some(data);
                        state.error = None;
                    });
                }
                Ok(value)
            }
            Err(err) => {
                if is_current {
                    let surfaced = err.clone();
                    self.state.send_modify(|state| {
                        state.status = BindingStatus::Error;
                        state.error = Some(surfaced);
                    });
                }
                Err(err)
            }
        }
    }
}

/// Trailing-edge debounce decorator over [`Binding::execute`].
///
/// A call sleeps for the configured delay; if a newer call arrives in the
/// meantime, the older one yields `None` without executing.
pub struct Debounced<T, A = ()> {
    binding: Arc<Binding<T, A>>,
    delay: Duration,
    generation: AtomicU64,
}

impl<T, A> Debounced<T, A>
where
    T: DeserializeOwned + Clone,
{
    pub fn new(binding: Arc<Binding<T, A>>, delay: Duration) -> Self {
        Self {
            binding,
            delay,
            generation: AtomicU64::new(0),
        }
    }

    pub async fn execute(&self, args: A) -> Option<Result<T>> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.delay).await;
        if self.generation.load(Ordering::SeqCst) != generation {
            return None;
        }
        Some(self.binding.execute(args).await)
    }
}

/// Leading-edge throttle decorator over [`Binding::execute`].
///
/// The first call in a window executes; calls landing inside the window
/// yield `None`.
pub struct Throttled<T, A = ()> {
    binding: Arc<Binding<T, A>>,
    window: Duration,
    last_fire: Mutex<Option<Instant>>,
}

impl<T, A> Throttled<T, A>
where
    T: DeserializeOwned + Clone,
{
    pub fn new(binding: Arc<Binding<T, A>>, window: Duration) -> Self {
        Self {
            binding,
            window,
            last_fire: Mutex::new(None),
        }
    }

    pub async fn execute(&self, args: A) -> Option<Result<T>> {
        {
            let mut last_fire = lock_unpoisoned(&self.last_fire);
            if let Some(last) = *last_fire {
                if last.elapsed() < self.window {
                    return None;
                }
            }
            *last_fire = Some(Instant::now());
        }
        Some(self.binding.execute(args).await)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::{Binding, BindingStatus};
    use crate::client::FetchClient;
    use crate::config::ClientConfig;
    use crate::request::RequestDescriptor;

    fn binding() -> Binding<Value> {
        Binding::new(
            FetchClient::new(ClientConfig::default()),
            RequestDescriptor::get("http://127.0.0.1:9/unreachable"),
        )
    }

    #[test]
    fn starts_idle_with_no_data_or_error() {
        let binding = binding();
        let state = binding.state();
        assert_eq!(state.status, BindingStatus::Idle);
        assert!(state.data.is_none());
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn reset_returns_to_idle_and_notifies_subscribers() {
        let binding = binding();
        let mut receiver = binding.subscribe();

        let _ = binding.execute(()).await;
        assert_eq!(binding.state().status, BindingStatus::Error);

        binding.reset();
        receiver
            .changed()
            .await
            .expect("sender must still be alive");
        assert_eq!(binding.state().status, BindingStatus::Idle);
        assert!(binding.state().error.is_none());
    }

    #[tokio::test]
    async fn failure_keeps_previous_data() {
        let binding = binding();
        // Seed data as if a previous call succeeded.
        binding.state.send_modify(|state| {
            state.status = BindingStatus::Success;
            state.data = Some(Value::from(1));
        });

        let err = binding.execute(()).await.expect_err("must fail to connect");
        assert!(!err.is_cancelled());
        let state = binding.state();
        assert_eq!(state.status, BindingStatus::Error);
        assert_eq!(state.data, Some(Value::from(1)));
        assert!(state.error.is_some());
    }
}
