use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use super::input::InputEvent;
use super::reply::ReplySender;

/// Business logic for one input type.
///
/// `notify` runs on its own coroutine, once per matching request, and must
/// eventually send exactly one reply through `reply`. Returning an error
/// without replying resolves the request as an internal error.
pub trait Handler: Send + Sync + 'static {
    fn input_type_id(&self) -> &str;
    fn notify(&self, input: Box<dyn InputEvent>, reply: ReplySender) -> Result<(), HandlerError>;
}

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("handler for {expected} received a different input type")]
    UnexpectedInput { expected: String },
    #[error("{0}")]
    Failed(String),
}

/// Immutable type id → handler table shared by all in-flight requests.
///
/// Built once at startup through [`HandlerRegistry::builder`]; clones share
/// the same table and lookups take no lock.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: Arc<HashMap<String, Arc<dyn Handler>>>,
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("type_ids", &self.type_ids())
            .finish()
    }
}

impl HandlerRegistry {
    #[must_use]
    pub fn builder() -> HandlerRegistryBuilder {
        HandlerRegistryBuilder::default()
    }

    #[must_use]
    pub fn get(&self, type_id: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(type_id).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    #[must_use]
    pub fn type_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

#[derive(Default)]
pub struct HandlerRegistryBuilder {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl HandlerRegistryBuilder {
    /// Add `handler` under its own type id. The last registration for an id wins.
    #[must_use]
    pub fn register<H: Handler>(self, handler: H) -> Self {
        self.register_arc(Arc::new(handler))
    }

    #[must_use]
    pub fn register_arc(mut self, handler: Arc<dyn Handler>) -> Self {
        let type_id = handler.input_type_id().to_owned();
        if self.handlers.insert(type_id.clone(), handler).is_some() {
            warn!(type_id = %type_id, "Replaced existing handler");
        }
        info!(
            type_id = %type_id,
            total_handlers = self.handlers.len(),
            "Handler registered"
        );
        self
    }

    #[must_use]
    pub fn build(self) -> HandlerRegistry {
        HandlerRegistry {
            handlers: Arc::new(self.handlers),
        }
    }
}
