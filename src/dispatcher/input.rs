use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use http::Method;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::securecookie::{MsgPackSerializer, SecureCookie, Serializer};
use crate::server::{parse_cookies, read_body, HttpRequest, HttpResponse};
use crate::session::{self, RefreshPolicy, Session, SessionError};

/// Decoded, session-bound form of one HTTP request.
///
/// Handlers receive it boxed and recover their concrete type with
/// [`into_any`](Self::into_any) and `downcast`.
pub trait InputEvent: Send + 'static {
    /// Selects the handler
    fn input_type_id(&self) -> &str;
    fn session_id(&self) -> &str;
    fn request(&self) -> &crate::server::RequestHead;
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

/// Why a request could not become an input event. Always answered with 400.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },
    #[error("invalid json body: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("{0}")]
    Invalid(String),
}

/// Shared, read-only state every converter needs.
///
/// Generic over the session cookie's payload serializer; MessagePack unless
/// the codec was built with another one.
#[derive(Debug, Clone)]
pub struct InputContext<S = MsgPackSerializer> {
    pub codec: Arc<SecureCookie<S>>,
    pub cookie_name: String,
    pub refresh: RefreshPolicy,
    pub max_body_bytes: usize,
}

impl<S: Serializer> InputContext<S> {
    #[must_use]
    pub fn new(codec: SecureCookie<S>, cookie_name: impl Into<String>) -> Self {
        Self {
            codec: Arc::new(codec),
            cookie_name: cookie_name.into(),
            refresh: RefreshPolicy::default(),
            max_body_bytes: 1024,
        }
    }

    #[must_use]
    pub fn with_refresh(mut self, refresh: RefreshPolicy) -> Self {
        self.refresh = refresh;
        self
    }

    #[must_use]
    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}

/// Turns a request into an input event. May write headers (cookies) on `res`.
pub type Converter<S = MsgPackSerializer> = Arc<
    dyn Fn(&HttpRequest, &mut HttpResponse, &InputContext<S>) -> Result<Box<dyn InputEvent>, ConvertError>
        + Send
        + Sync,
>;

/// Per-route table of method → converter.
pub struct ConverterMap<S = MsgPackSerializer> {
    by_method: HashMap<Method, Converter<S>>,
}

impl<S> Clone for ConverterMap<S> {
    fn clone(&self) -> Self {
        Self {
            by_method: self.by_method.clone(),
        }
    }
}

impl<S> Default for ConverterMap<S> {
    fn default() -> Self {
        Self {
            by_method: HashMap::new(),
        }
    }
}

impl<S> fmt::Debug for ConverterMap<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterMap")
            .field("methods", &self.methods())
            .finish()
    }
}

impl<S> ConverterMap<S> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `convert` for `method`, replacing any earlier one.
    #[must_use]
    pub fn on<F>(mut self, method: Method, convert: F) -> Self
    where
        F: Fn(&HttpRequest, &mut HttpResponse, &InputContext<S>) -> Result<Box<dyn InputEvent>, ConvertError>
            + Send
            + Sync
            + 'static,
    {
        self.by_method.insert(method, Arc::new(convert));
        self
    }

    #[must_use]
    pub fn get(&self, method: &Method) -> Option<&Converter<S>> {
        self.by_method.get(method)
    }

    /// Registered methods, sorted for stable logs.
    #[must_use]
    pub fn methods(&self) -> Vec<String> {
        let mut methods: Vec<String> = self.by_method.keys().map(ToString::to_string).collect();
        methods.sort();
        methods
    }
}

/// Shared converter body: establish the session, then decode a JSON body.
///
/// An empty body yields `T::default()`. The session cookie is set on `res`
/// before the body is looked at, so a client sending a bad body still gets
/// its session.
///
/// # Errors
///
/// [`ConvertError::Session`] if the cookie cannot be re-issued,
/// [`ConvertError::BodyTooLarge`] or [`ConvertError::Json`] for the body.
pub fn parse_input<T, S>(
    req: &HttpRequest,
    res: &mut HttpResponse,
    ctx: &InputContext<S>,
) -> Result<(T, Session), ConvertError>
where
    T: DeserializeOwned + Default,
    S: Serializer,
{
    let cookies = parse_cookies(req.headers());
    let session = session::establish(
        &cookies,
        &ctx.cookie_name,
        Some(res),
        ctx.codec.as_ref(),
        ctx.refresh,
    )?;

    let body = read_body(req, ctx.max_body_bytes)?;
    if body.is_empty() {
        return Ok((T::default(), session));
    }
    Ok((serde_json::from_slice(body)?, session))
}
