use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::time::{Duration, Instant};

use http::header::{HeaderValue, CONTENT_TYPE, X_FRAME_OPTIONS};
use http::{Method, StatusCode};
use may::coroutine;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::input::{ConvertError, ConverterMap, InputContext, InputEvent};
use super::registry::{Handler, HandlerRegistry};
use super::reply::{reply_channel, Reply, ReplySender};
use crate::ids::RequestId;
use crate::runtime_config::RuntimeConfig;
use crate::securecookie::{MsgPackSerializer, Serializer};
use crate::server::{HttpRequest, HttpResponse, ResponseWriter};

/// Dispatch timing and coroutine sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchPolicy {
    /// How long a request waits for its handler's reply
    pub reply_timeout: Duration,
    /// Stack size of each handler coroutine in bytes
    pub stack_size: usize,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            reply_timeout: Duration::from_secs(5),
            stack_size: 0x10000,
        }
    }
}

impl From<&RuntimeConfig> for DispatchPolicy {
    fn from(rc: &RuntimeConfig) -> Self {
        Self {
            stack_size: rc.stack_size,
            ..Self::default()
        }
    }
}

/// Server-side reasons for a 500.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InternalError {
    #[error("no handler registered for input type {0}")]
    HandlerNotRegistered(String),
    #[error("handler did not reply within {0:?}")]
    Timeout(Duration),
    #[error("handler finished without replying")]
    NoReply,
    #[error("failed to spawn handler coroutine")]
    Spawn,
    #[error("failed to serialize reply")]
    Serialization,
}

/// Terminal failure of one dispatch. Only [`status`](Self::status) reaches the client.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("method {0} not allowed")]
    MethodNotAllowed(Method),
    #[error("bad request: {0}")]
    BadRequest(#[source] ConvertError),
    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl DispatchError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Runs one handler per request and waits, bounded, for its single reply.
///
/// Per request: pick the converter for the method, convert (this also
/// establishes the session), look up the handler by the input's type id,
/// run `notify` on a fresh coroutine, then wait for the reply or the
/// deadline, whichever comes first.
#[derive(Debug, Clone)]
pub struct Dispatcher<S = MsgPackSerializer> {
    registry: HandlerRegistry,
    context: Arc<InputContext<S>>,
    policy: DispatchPolicy,
}

impl<S: Serializer> Dispatcher<S> {
    #[must_use]
    pub fn new(registry: HandlerRegistry, context: InputContext<S>, policy: DispatchPolicy) -> Self {
        Self {
            registry,
            context: Arc::new(context),
            policy,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    #[must_use]
    pub fn context(&self) -> &InputContext<S> {
        &self.context
    }

    #[must_use]
    pub fn policy(&self) -> DispatchPolicy {
        self.policy
    }

    /// Resolve `req` against a route's converters, writing the success
    /// outcome into `res`.
    ///
    /// On `Ok`, `res` holds the final 200 response. On `Err`, the caller
    /// writes the status; `res` may already carry a `Set-Cookie` and, for
    /// [`InternalError::Serialization`], the success headers.
    ///
    /// # Errors
    ///
    /// See [`DispatchError`].
    pub fn dispatch(
        &self,
        converters: &ConverterMap<S>,
        req: &HttpRequest,
        res: &mut HttpResponse,
    ) -> Result<(), DispatchError> {
        let request_id = RequestId::from_headers(req.headers());
        let method = req.method();
        let path = req.uri().path();

        // Parsing
        let Some(convert) = converters.get(method) else {
            warn!(
                request_id = %request_id,
                method = %method,
                path = %path,
                allowed = ?converters.methods(),
                "Method not allowed"
            );
            return Err(DispatchError::MethodNotAllowed(method.clone()));
        };

        let input = convert(req, res, self.context.as_ref()).map_err(|e| {
            warn!(
                request_id = %request_id,
                method = %method,
                path = %path,
                error = %e,
                "Input conversion failed"
            );
            DispatchError::BadRequest(e)
        })?;

        // Routing
        let type_id = input.input_type_id().to_owned();
        let Some(handler) = self.registry.get(&type_id) else {
            error!(
                request_id = %request_id,
                type_id = %type_id,
                available = ?self.registry.type_ids(),
                "Handler not registered - CRITICAL"
            );
            return Err(InternalError::HandlerNotRegistered(type_id).into());
        };

        // Awaiting
        info!(
            request_id = %request_id,
            type_id = %type_id,
            session_id = %input.session_id(),
            method = %method,
            path = %path,
            "Request dispatched to handler"
        );
        let start = Instant::now();
        let (reply_tx, reply_rx) = reply_channel();
        self.spawn_notify(request_id, handler, input, reply_tx)?;

        let reply = match reply_rx.recv_timeout(self.policy.reply_timeout) {
            Ok(reply) => reply,
            Err(RecvTimeoutError::Timeout) => {
                error!(
                    request_id = %request_id,
                    type_id = %type_id,
                    timeout_ms = self.policy.reply_timeout.as_millis() as u64,
                    "Handler reply timed out"
                );
                return Err(InternalError::Timeout(self.policy.reply_timeout).into());
            }
            Err(RecvTimeoutError::Disconnected) => {
                error!(
                    request_id = %request_id,
                    type_id = %type_id,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Handler dropped its reply channel without replying"
                );
                return Err(InternalError::NoReply.into());
            }
        };

        // Resolved
        let has_body = reply.is_some();
        write_reply(reply, res).inspect_err(|e| {
            error!(request_id = %request_id, type_id = %type_id, error = %e, "Reply serialization failed");
        })?;
        info!(
            request_id = %request_id,
            type_id = %type_id,
            status = res.status.as_u16(),
            has_body = has_body,
            latency_ms = start.elapsed().as_millis() as u64,
            "Handler reply received"
        );
        Ok(())
    }

    #[allow(unsafe_code)]
    fn spawn_notify(
        &self,
        request_id: RequestId,
        handler: Arc<dyn Handler>,
        input: Box<dyn InputEvent>,
        reply: ReplySender,
    ) -> Result<(), InternalError> {
        let stack_size = self.policy.stack_size;
        // SAFETY: may marks spawn unsafe because a coroutine must not touch
        // thread-local storage across yields. The closure owns all it uses
        // (an Arc'd handler, the boxed input and the reply sender) and keeps
        // no thread-local state of its own.
        let spawned = unsafe {
            coroutine::Builder::new()
                .stack_size(stack_size)
                .spawn(move || {
                    let type_id = handler.input_type_id().to_owned();
                    debug!(request_id = %request_id, type_id = %type_id, "Handler notify start");
                    match catch_unwind(AssertUnwindSafe(|| handler.notify(input, reply))) {
                        Ok(Ok(())) => {
                            debug!(request_id = %request_id, type_id = %type_id, "Handler notify complete");
                        }
                        Ok(Err(e)) => {
                            error!(request_id = %request_id, type_id = %type_id, error = %e, "Handler returned an error");
                        }
                        Err(panic) => {
                            error!(
                                request_id = %request_id,
                                type_id = %type_id,
                                panic_message = %panic_message(panic.as_ref()),
                                "Handler panicked - CRITICAL"
                            );
                        }
                    }
                })
        };

        spawned.map(drop).map_err(|e| {
            error!(
                request_id = %request_id,
                error = %e,
                stack_size = stack_size,
                "Failed to spawn handler coroutine - CRITICAL"
            );
            InternalError::Spawn
        })
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// `None` leaves the 200 untouched: no hardening header, no body.
fn write_reply(reply: Reply, res: &mut HttpResponse) -> Result<(), InternalError> {
    let Some(entity) = reply else {
        return Ok(());
    };
    res.headers_mut()
        .insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    res.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    let mut body = entity.to_json().map_err(|_| InternalError::Serialization)?;
    body.push(b'\n');
    res.set_status(StatusCode::OK);
    res.write_body(body);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Identifier;

    struct Broken;

    impl Identifier for Broken {
        fn id(&self) -> &str {
            "broken"
        }

        fn entity_type_id(&self) -> &str {
            "broken"
        }

        fn to_json(&self) -> serde_json::Result<Vec<u8>> {
            Err(serde::ser::Error::custom("nope"))
        }
    }

    #[test]
    fn empty_reply_writes_nothing() {
        let mut res = HttpResponse::default();
        write_reply(None, &mut res).unwrap();
        assert_eq!(res.status, StatusCode::OK);
        assert!(res.headers.is_empty());
        assert!(res.body.is_empty());
    }

    #[test]
    fn failed_serialization_leaves_headers_behind() {
        let mut res = HttpResponse::default();
        let err = write_reply(Some(Box::new(Broken)), &mut res).unwrap_err();
        assert_eq!(err, InternalError::Serialization);
        assert_eq!(res.headers.get(X_FRAME_OPTIONS).unwrap(), "DENY");
        assert!(res.body.is_empty());
    }

    #[test]
    fn error_status_mapping() {
        assert_eq!(
            DispatchError::MethodNotAllowed(Method::PUT).status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            DispatchError::BadRequest(ConvertError::Invalid("x".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            DispatchError::from(InternalError::NoReply).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn default_policy_matches_documented_limits() {
        let p = DispatchPolicy::default();
        assert_eq!(p.reply_timeout, Duration::from_secs(5));
        assert_eq!(p.stack_size, 0x10000);
    }
}
