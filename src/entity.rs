//! Identity contract for values a handler replies with.
//!
//! The dispatcher only needs to know that a reply can render itself as the
//! JSON response body. Any `Serialize` type that names its id and type id gets
//! the contract through the blanket impl over [`Entity`].

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A handler reply the dispatcher can write as a response body.
pub trait Identifier: Send + 'static {
    fn id(&self) -> &str;
    fn entity_type_id(&self) -> &str;
    fn to_json(&self) -> serde_json::Result<Vec<u8>>;
}

/// Convenience adaptor: implement this on a serde type to get [`Identifier`].
pub trait Entity: Serialize + Send + 'static {
    const TYPE_ID: &'static str;

    fn entity_id(&self) -> &str;
}

impl<E: Entity> Identifier for E {
    fn id(&self) -> &str {
        self.entity_id()
    }

    fn entity_type_id(&self) -> &str {
        E::TYPE_ID
    }

    fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// New random identifier: a v4 UUID as 32 lowercase hex characters.
#[must_use]
pub fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[must_use]
pub fn now() -> DateTime<Utc> {
    Utc::now()
}
