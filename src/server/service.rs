use std::collections::HashMap;
use std::io::{self, Read};
use std::sync::Arc;
use std::time::Instant;

use http::StatusCode;
use may_minihttp::{HttpService, Request, Response};
use tracing::{debug, info, warn};

use super::request::HttpRequest;
use super::response::HttpResponse;
use crate::dispatcher::{ConverterMap, Dispatcher};
use crate::securecookie::{MsgPackSerializer, Serializer};

/// Route table in front of the [`Dispatcher`].
///
/// Each path owns a [`ConverterMap`] of method → converter. Routes are
/// registered during startup; `handle` only reads. Clones share the
/// dispatcher, so the listener hands one copy to each connection.
pub struct AppService<S = MsgPackSerializer> {
    routes: HashMap<String, ConverterMap<S>>,
    dispatcher: Arc<Dispatcher<S>>,
}

impl<S> Clone for AppService<S> {
    fn clone(&self) -> Self {
        Self {
            routes: self.routes.clone(),
            dispatcher: Arc::clone(&self.dispatcher),
        }
    }
}

impl<S: Serializer> AppService<S> {
    #[must_use]
    pub fn new(dispatcher: Dispatcher<S>) -> Self {
        Self {
            routes: HashMap::new(),
            dispatcher: Arc::new(dispatcher),
        }
    }

    /// Bind `path` to a converter table. A later registration for the same
    /// path replaces the earlier one.
    pub fn register_http_route(&mut self, path: impl Into<String>, converters: ConverterMap<S>) {
        let path = path.into();
        let methods = converters.methods();
        if self.routes.insert(path.clone(), converters).is_some() {
            warn!(path = %path, "Replaced existing route");
        }
        info!(path = %path, methods = ?methods, total_routes = self.routes.len(), "Route registered");
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher<S> {
        &self.dispatcher
    }

    /// Serve one request. Exactly one status is written per call.
    #[must_use]
    pub fn handle(&self, req: &HttpRequest) -> http::Response<Vec<u8>> {
        let start = Instant::now();
        let mut res = HttpResponse::default();

        match self.routes.get(req.uri().path()) {
            None => {
                warn!(method = %req.method(), path = %req.uri().path(), "No route for path");
                res.write_status_text(StatusCode::NOT_FOUND);
            }
            Some(converters) => {
                if let Err(e) = self.dispatcher.dispatch(converters, req, &mut res) {
                    res.write_status_text(e.status());
                }
            }
        }

        info!(
            method = %req.method(),
            path = %req.uri().path(),
            status = res.status.as_u16(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Request complete"
        );
        res.into_http()
    }
}

impl<S: Serializer> HttpService for AppService<S> {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        let limit = self.dispatcher.context().max_body_bytes;
        let response = match buffer_request(req, limit) {
            Ok(req) => self.handle(&req),
            Err(e) => {
                warn!(error = %e, "Rejected unparseable request");
                let mut bad = HttpResponse::default();
                bad.write_status_text(StatusCode::BAD_REQUEST);
                bad.into_http()
            }
        };
        write_response(response, res);
        Ok(())
    }
}

/// Copy a wire request into an [`HttpRequest`].
///
/// At most `limit + 1` body bytes are kept, which is enough for the converter
/// to see the cap was exceeded. The rest is read and discarded so the
/// connection stays framed for the next request.
pub(crate) fn buffer_request(req: Request, limit: usize) -> Result<HttpRequest, http::Error> {
    let mut builder = http::Request::builder()
        .method(req.method())
        .uri(req.path());
    for h in req.headers() {
        builder = builder.header(h.name, h.value);
    }

    let mut body = Vec::new();
    let mut reader = req.body();
    let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
    if let Err(e) = (&mut reader).take(cap).read_to_end(&mut body) {
        debug!(error = %e, "Short request body");
    }
    if let Err(e) = io::copy(&mut reader, &mut io::sink()) {
        debug!(error = %e, "Could not drain request body");
    }
    builder.body(body)
}

/// Write an `http::Response` through may_minihttp.
///
/// Header lines must be `&'static str`. Common lines are literals; anything
/// else (session cookies) is leaked, one allocation per header written.
// TODO: drop the leak once the may_minihttp fork accepts owned header lines.
pub(crate) fn write_response(response: http::Response<Vec<u8>>, res: &mut Response) {
    let (parts, body) = response.into_parts();
    res.status_code(
        usize::from(parts.status.as_u16()),
        parts.status.canonical_reason().unwrap_or("Unknown"),
    );
    for (name, value) in &parts.headers {
        res.header(header_line(name.as_str(), value.to_str().unwrap_or_default()));
    }
    res.body_vec(body);
}

fn header_line(name: &str, value: &str) -> &'static str {
    match (name, value) {
        ("content-type", "application/json") => "Content-Type: application/json",
        ("content-type", "text/plain; charset=utf-8") => "Content-Type: text/plain; charset=utf-8",
        ("x-frame-options", "DENY") => "X-Frame-Options: DENY",
        _ => Box::leak(format!("{name}: {value}").into_boxed_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_header_lines_are_static() {
        assert_eq!(
            header_line("content-type", "application/json"),
            "Content-Type: application/json"
        );
        assert_eq!(header_line("x-frame-options", "DENY"), "X-Frame-Options: DENY");
    }

    #[test]
    fn test_other_header_lines_keep_name_and_value() {
        assert_eq!(header_line("set-cookie", "v=abc; Path=/"), "set-cookie: v=abc; Path=/");
    }
}
