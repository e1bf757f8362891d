//! # CLI Module
//!
//! Operator tooling for the `valet` binary.
//!
//! ## Commands
//!
//! ### `keygen`
//!
//! Print an example config with fresh random keys:
//!
//! ```bash
//! valet keygen > /etc/valet/config.yaml
//! ```
//!
//! ### `check-config`
//!
//! Load and validate the config, printing the effective cookie settings
//! (never the keys):
//!
//! ```bash
//! valet check-config --config ./config.yaml
//! ```
//!
//! ### `seal` / `open`
//!
//! Seal a JSON value into a cookie string, or open one and print it:
//!
//! ```bash
//! valet seal --name v --json '{"id":"abc"}'
//! valet open --name v 'MTcwMDAwMDAwMHxx...'
//! ```
//!
//! `open` reports only the failure kind (`invalid_mac`, `timestamp_expired`, ...).
//!
//! ### `serve`
//!
//! Listen on `server_address` with the sample route and echo handler. With
//! `secure` and `insecure_redirect` set, a second listener on
//! `redirect_address` answers every request with a 303 to the https origin.
//! TLS itself is expected to terminate in front of valet.
//!
//! ```bash
//! valet serve --config ./config.yaml
//! ```
//!
//! ### `dispatch`
//!
//! Push one request through the full session and dispatch stack using the
//! sample converter and echo handler:
//!
//! ```bash
//! valet dispatch --method POST --path /sample --body '{"Name":"ana","Number":3}'
//! ```

mod commands;

#[cfg(test)]
mod tests;

pub use commands::{
    run_cli, sample_service, start_listeners, Cli, Commands, Listeners, SAMPLE_ROUTE,
};
