use std::collections::HashMap;

use futures::future::{BoxFuture, Shared};

use crate::response::ApiResponse;
use crate::Result;

/// Clonable handle to one pending transport operation. Every concurrent
/// caller of the same key awaits a clone of the owner's handle and receives
/// the same eventual outcome.
pub(crate) type SharedOperation = Shared<BoxFuture<'static, Result<ApiResponse>>>;

/// Maps cache keys to pending operations while they are in flight.
///
/// Entries exist only between dispatch start and completion; the owning
/// caller releases the key unconditionally once the operation settles.
/// Only consulted when the instance's `deduplicate` flag is on, and never
/// shared across client instances.
#[derive(Default)]
pub(crate) struct InFlightTracker {
    ops: HashMap<String, SharedOperation>,
}

impl InFlightTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Pending operation already registered under `key`, if any.
    pub(crate) fn get(&self, key: &str) -> Option<SharedOperation> {
        self.ops.get(key).cloned()
    }

    /// Registers the owning operation for `key`.
    pub(crate) fn register(&mut self, key: String, op: SharedOperation) {
        self.ops.insert(key, op);
    }

    /// Releases `key` after its operation settles, success or failure.
    pub(crate) fn release(&mut self, key: &str) {
        self.ops.remove(key);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.ops.len()
    }
}
