//! # Server Module
//!
//! The seam between the network and the dispatcher. [`HttpServer`] runs a
//! may_minihttp listener; each connection buffers its request into an
//! [`HttpRequest`], calls [`AppService::handle`], and writes back the
//! `http::Response` it gets. Tests and the `dispatch` command call `handle`
//! directly.
//!
//! TLS is left to a terminating proxy. [`RedirectService`] covers the plain
//! port-80 listener that points browsers at the https origin.

pub mod http_server;
pub mod request;
pub mod response;
pub mod service;

pub use http_server::{redirect_location, HttpServer, RedirectService, ServerHandle};
pub use request::{parse_cookies, read_body, HttpRequest, RequestHead};
pub use response::{HttpResponse, ResponseWriter};
pub use service::AppService;
