//! # valet
//!
//! **valet** is the session and request-dispatch layer of a small web backend.
//! It turns raw HTTP requests into authenticated, session-bound input events,
//! hands each one to exactly one registered handler running on a `may`
//! coroutine, and waits, with a bound, for that handler's single reply.
//!
//! ## Architecture
//!
//! - **[`securecookie`]** - Authenticated encryption of cookie values (AES-CTR + HMAC-SHA256)
//! - **[`session`]** - Session derivation from cookies, minting and re-issue policy
//! - **[`dispatcher`]** - Converters, handler registry, reply channel and the dispatch state machine
//! - **[`server`]** - may_minihttp listener, buffered requests, responses and the route table
//! - **[`entity`]** - Identity contract for handler replies
//! - **[`inputs`]** - Input converters (the `sample` reference input)
//! - **[`config`]** - YAML configuration with environment overrides
//! - **[`logging`]** / **[`runtime_config`]** - Ambient setup from the environment
//!
//! ### Request Handling Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant T as HttpServer
//!     participant S as AppService
//!     participant D as Dispatcher
//!     participant C as Converter
//!     participant M as session
//!     participant H as Handler coroutine
//!
//!     T->>S: handle(HttpRequest)
//!     S->>S: route table lookup (miss → 404)
//!     S->>D: dispatch(converters, req, res)
//!     D->>D: converter for method (miss → 405)
//!     D->>C: convert(req, res, ctx)
//!     C->>M: establish(cookies)
//!     M-->>C: Session (+ Set-Cookie when issued)
//!     C-->>D: Box<dyn InputEvent> (failure → 400)
//!     D->>D: registry lookup by type id (miss → 500)
//!     D->>H: spawn notify(input, ReplySender)
//!     H-->>D: one reply, or deadline (→ 500)
//!     D-->>S: 200 [+ JSON body, X-Frame-Options: DENY]
//!     S-->>T: http::Response
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use http::Method;
//! use valet::config::AppConfig;
//! use valet::dispatcher::{ConverterMap, Dispatcher, HandlerRegistry};
//! use valet::inputs::sample;
//! use valet::runtime_config::RuntimeConfig;
//! use valet::server::{AppService, HttpServer};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = AppConfig::load(None)?;
//! let registry = HandlerRegistry::builder()
//!     .register(sample::EchoHandler)
//!     .build();
//! let dispatcher = Dispatcher::new(
//!     registry,
//!     config.input_context()?,
//!     config.dispatch_policy(&RuntimeConfig::from_env()),
//! );
//!
//! let mut service = AppService::new(dispatcher);
//! service.register_http_route(
//!     "/sample",
//!     ConverterMap::new().on(Method::POST, sample::from_http_request),
//! );
//! let server = HttpServer(service).start(config.server_address.as_str())?;
//! server.wait_ready()?;
//! server.stop();
//! # Ok(())
//! # }
//! ```
//!
//! ## Runtime Considerations
//!
//! Handlers run on `may` coroutines, not tokio tasks. Stack size comes from
//! `VALET_STACK_SIZE`. A handler that misses its deadline keeps running to
//! completion; its late reply is dropped without blocking it.

pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod entity;
pub mod ids;
pub mod inputs;
pub mod logging;
pub mod runtime_config;
pub mod securecookie;
pub mod server;
pub mod session;

pub use config::AppConfig;
pub use dispatcher::{Dispatcher, Handler, HandlerRegistry, InputEvent, ReplySender};
pub use securecookie::{CookieOptions, SecureCookie};
pub use server::AppService;
pub use session::Session;
