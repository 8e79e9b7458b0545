//! Context configuration and per-emit options.

use std::fmt;
use std::sync::Arc;

use tokio::runtime::Handle;

use super::hooks::ContextHooks;

/// Configuration for a [`Context`](super::Context).
///
/// Defaults: no hooks, and async handlers run on whichever Tokio runtime is
/// current on the thread that delivers the request. Set an explicit runtime
/// when events are injected from threads that are not runtime workers (for
/// example the `event-emitter-rs` transport, which delivers on its own threads).
#[derive(Clone, Default)]
pub struct ContextConfig {
    pub(crate) hooks: Option<Arc<dyn ContextHooks>>,
    pub(crate) runtime: Option<Handle>,
}

impl ContextConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install adapter hooks.
    pub fn with_hooks(mut self, hooks: Arc<dyn ContextHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Run invoke and stream handlers on this runtime.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn runtime(&self) -> Option<&Handle> {
        self.runtime.as_ref()
    }

    pub fn has_hooks(&self) -> bool {
        self.hooks.is_some()
    }
}

impl fmt::Debug for ContextConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextConfig")
            .field("hooks", &self.hooks.is_some())
            .field("runtime", &self.runtime.is_some())
            .finish()
    }
}

/// Opaque per-emit bag passed untouched to listeners and hooks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmitOptions {
    metadata: Vec<(String, String)>,
}

impl EmitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.metadata
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn metadata(&self) -> &[(String, String)] {
        &self.metadata
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }
}
