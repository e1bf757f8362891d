//! # Dispatcher Module
//!
//! Bridges one synchronous HTTP transaction to one handler running on its own
//! `may` coroutine, with a hard deadline on the handler's reply.
//!
//! ## Request Flow
//!
//! 1. **Parsing**: the route's [`ConverterMap`] picks a converter by method
//!    (none → 405). The converter establishes the session and decodes the
//!    body (failure → 400).
//! 2. **Routing**: the input's type id selects a [`Handler`] from the
//!    immutable [`HandlerRegistry`] (miss → 500, a server misconfiguration).
//! 3. **Awaiting**: `notify` runs on a fresh coroutine with a [`ReplySender`];
//!    the request waits for one reply or the deadline (timeout → 500).
//! 4. **Resolved**: an empty reply is a bare 200; an entity is written as a
//!    JSON body with `X-Frame-Options: DENY`.
//!
//! ## Handler Contract
//!
//! ```rust,ignore
//! impl Handler for Greeter {
//!     fn input_type_id(&self) -> &str { GREETING_TYPE_ID }
//!
//!     fn notify(&self, input: Box<dyn InputEvent>, reply: ReplySender) -> Result<(), HandlerError> {
//!         let greeting = input.into_any().downcast::<Greeting>().map_err(|_| ...)?;
//!         reply.send_entity(greeting.answer());
//!         Ok(())
//!     }
//! }
//! ```
//!
//! The reply channel never blocks the handler. A handler that outlives the
//! deadline still completes; its late reply is discarded. There is no
//! cancellation signal.

mod core;
mod input;
mod registry;
mod reply;

pub use core::{DispatchError, DispatchPolicy, Dispatcher, InternalError};
pub use input::{parse_input, ConvertError, Converter, ConverterMap, InputContext, InputEvent};
pub use registry::{Handler, HandlerError, HandlerRegistry, HandlerRegistryBuilder};
pub use reply::{Reply, ReplySender};
