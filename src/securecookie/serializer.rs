use std::fmt;

use serde::{de::DeserializeOwned, Serialize};

use super::CookieError;

/// Turns cookie payloads into bytes and back.
///
/// The codec is generic over its serializer so the choice is made once at
/// construction and costs nothing per call. The same type parameter flows
/// through the dispatcher, so session cookies use whatever the codec uses.
pub trait Serializer: fmt::Debug + Clone + Send + Sync + 'static {
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CookieError>;
    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CookieError>;
}

/// MessagePack with named fields. Default for [`SecureCookie`](super::SecureCookie).
///
/// `to_vec_named` keeps struct fields as map keys, so adding an optional
/// field to a session type does not invalidate cookies already issued.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgPackSerializer;

impl Serializer for MsgPackSerializer {
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CookieError> {
        rmp_serde::to_vec_named(value).map_err(|e| CookieError::Serialization(e.to_string()))
    }

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CookieError> {
        rmp_serde::from_slice(bytes).map_err(|e| CookieError::Deserialization(e.to_string()))
    }
}

/// JSON serializer, handy when cookie payloads must be inspectable.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CookieError> {
        serde_json::to_vec(value).map_err(|e| CookieError::Serialization(e.to_string()))
    }

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CookieError> {
        serde_json::from_slice(bytes).map_err(|e| CookieError::Deserialization(e.to_string()))
    }
}
