//! The explicit ambient-context slot for a logical request flow.

use opentelemetry::{Context, ContextGuard};

/// Per-flow slot holding the ambient "current span" context.
///
/// Host runtimes propagate an implicit current context across the
/// asynchronous stages of a request. This type models that slot as an
/// explicit value at the framework boundary: the adapter owns exactly one
/// instance per logical request flow and hands it `&mut` to the listener
/// with each notification, so concurrent requests never observe each
/// other's slot and no locking is needed.
///
/// The framework itself may overwrite the slot while the request is in
/// flight (for example when an async continuation resumes on a different
/// logical context); the listener reconciles that at stop time.
#[derive(Debug, Default)]
pub struct AmbientContext {
    current: Context,
}

impl AmbientContext {
    /// Creates a slot holding an empty context.
    pub fn new() -> Self {
        AmbientContext::default()
    }

    /// The context currently held by the slot.
    pub fn context(&self) -> &Context {
        &self.current
    }

    /// Replaces the slot's context, returning the previous value.
    pub fn swap(&mut self, cx: Context) -> Context {
        std::mem::replace(&mut self.current, cx)
    }

    /// Bridges the slot into the thread-local current context for the
    /// duration of a synchronous section, so nested code inspecting
    /// [`Context::current`] observes the slot's value.
    #[must_use = "dropping the guard detaches the context"]
    pub fn attach(&self) -> ContextGuard {
        self.current.clone().attach()
    }
}
