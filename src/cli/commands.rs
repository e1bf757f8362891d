use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use http::header::COOKIE;
use http::Method;

use tracing::{info, warn};

use crate::config::AppConfig;
use crate::dispatcher::{ConverterMap, Dispatcher, HandlerRegistry};
use crate::inputs::sample;
use crate::runtime_config::RuntimeConfig;
use crate::server::{AppService, HttpServer, RedirectService, ServerHandle};

/// Route the `dispatch` command serves the sample input on.
pub const SAMPLE_ROUTE: &str = "/sample";

/// Command-line interface for valet
#[derive(Parser, Debug)]
#[command(name = "valet")]
#[command(about = "Session cookies and request dispatch", long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print an example config with freshly generated keys
    Keygen,
    /// Load and validate a config, then print the effective cookie settings
    CheckConfig {
        /// Config file; searched for in the default locations when omitted
        #[arg(short, long, env = "VALET_CONFIG")]
        config: Option<PathBuf>,
    },
    /// Seal a JSON value into a cookie string
    Seal {
        /// Cookie name the value is bound to
        #[arg(short, long, default_value = "v")]
        name: String,

        /// JSON value to seal
        #[arg(long)]
        json: String,

        #[arg(short, long, env = "VALET_CONFIG")]
        config: Option<PathBuf>,
    },
    /// Open a sealed cookie and print its contents as JSON
    Open {
        /// Cookie name the value was sealed under
        #[arg(short, long, default_value = "v")]
        name: String,

        /// Sealed cookie value
        cookie: String,

        #[arg(short, long, env = "VALET_CONFIG")]
        config: Option<PathBuf>,
    },
    /// Serve the sample route over HTTP until the process is stopped
    Serve {
        #[arg(short, long, env = "VALET_CONFIG")]
        config: Option<PathBuf>,
    },
    /// Run one in-process request through the sample route
    Dispatch {
        #[arg(short, long, default_value = "POST")]
        method: String,

        #[arg(short, long, default_value = SAMPLE_ROUTE)]
        path: String,

        /// JSON request body
        #[arg(short, long)]
        body: Option<String>,

        /// Raw `Cookie` header value
        #[arg(long)]
        cookie: Option<String>,

        #[arg(short, long, env = "VALET_CONFIG")]
        config: Option<PathBuf>,
    },
}

/// Execute the CLI command, writing its output to `out`.
///
/// # Errors
///
/// Returns an error if:
/// - The config cannot be found, parsed or validated
/// - A value cannot be sealed, or a cookie does not open
/// - The dispatch request cannot be built
/// - The listener cannot bind, or stops with a panic
pub fn run_cli(cli: Cli, out: &mut dyn Write) -> Result<()> {
    match cli.command {
        Commands::Keygen => {
            let example = AppConfig::example()?;
            write!(out, "{}", example.to_yaml()?)?;
        }
        Commands::CheckConfig { config } => {
            let config = load(config.as_deref())?;
            let codec = config.cookie_codec()?;
            writeln!(out, "server_address: {}", config.server_address)?;
            writeln!(out, "cookie.name: {}", config.cookie.name)?;
            writeln!(out, "cookie.domain: {}", codec.domain())?;
            writeln!(out, "cookie.path: {}", codec.path())?;
            writeln!(out, "cookie.min_age: {}", codec.min_age())?;
            writeln!(out, "cookie.max_age: {}", codec.max_age())?;
            writeln!(out, "cookie.max_length: {}", codec.max_length())?;
            writeln!(out, "cookie.secure: {}", codec.secure())?;
            writeln!(out, "cookie.http_only: {}", codec.http_only())?;
            writeln!(out, "dispatch.reply_timeout_ms: {}", config.dispatch.reply_timeout_ms)?;
            writeln!(out, "dispatch.max_body_bytes: {}", config.dispatch.max_body_bytes)?;
        }
        Commands::Seal { name, json, config } => {
            let codec = load(config.as_deref())?.cookie_codec()?;
            let value: serde_json::Value =
                serde_json::from_str(&json).context("--json is not valid JSON")?;
            let sealed = codec
                .encode(&name, &value)
                .map_err(|e| anyhow!("failed to seal value: {e}"))?;
            writeln!(out, "{sealed}")?;
        }
        Commands::Open { name, cookie, config } => {
            let codec = load(config.as_deref())?.cookie_codec()?;
            let value: serde_json::Value = codec
                .decode(&name, cookie.trim())
                .map_err(|e| anyhow!("cookie rejected: {}", e.kind()))?;
            writeln!(out, "{}", serde_json::to_string_pretty(&value)?)?;
        }
        Commands::Serve { config } => {
            let config = load(config.as_deref())?;
            let listeners = start_listeners(&config, &RuntimeConfig::from_env())?;
            writeln!(out, "listening on {}", listeners.app.addr())?;
            out.flush()?;
            listeners.join()?;
        }
        Commands::Dispatch {
            method,
            path,
            body,
            cookie,
            config,
        } => {
            let config = load(config.as_deref())?;
            let service = sample_service(&config, &RuntimeConfig::from_env())?;

            let method: Method = method
                .to_ascii_uppercase()
                .parse()
                .with_context(|| format!("invalid method {method}"))?;
            let mut builder = http::Request::builder().method(method).uri(path.as_str());
            if let Some(cookie) = cookie {
                builder = builder.header(COOKIE, cookie);
            }
            let req = builder
                .body(body.unwrap_or_default().into_bytes())
                .context("failed to build request")?;

            let res = service.handle(&req);
            writeln!(out, "status: {}", res.status())?;
            for (name, value) in res.headers() {
                writeln!(out, "{}: {}", name, value.to_str().unwrap_or("<binary>"))?;
            }
            writeln!(out)?;
            out.write_all(res.body())?;
        }
    }
    Ok(())
}

/// Service with the sample converter on [`SAMPLE_ROUTE`] for GET and POST
/// and the echo handler behind it.
///
/// # Errors
///
/// If the config's keys cannot build a cookie codec.
pub fn sample_service(config: &AppConfig, runtime: &RuntimeConfig) -> Result<AppService> {
    let registry = HandlerRegistry::builder()
        .register(sample::EchoHandler)
        .build();
    let dispatcher = Dispatcher::new(
        registry,
        config.input_context()?,
        config.dispatch_policy(runtime),
    );
    let mut service = AppService::new(dispatcher);
    service.register_http_route(
        SAMPLE_ROUTE,
        ConverterMap::new()
            .on(Method::GET, sample::from_http_request)
            .on(Method::POST, sample::from_http_request),
    );
    Ok(service)
}

/// Running listeners of the `serve` command.
pub struct Listeners {
    pub app: ServerHandle,
    /// Plain-HTTP redirector, when the config asks for one and it could bind
    pub redirect: Option<ServerHandle>,
}

impl Listeners {
    pub fn stop(self) {
        if let Some(redirect) = self.redirect {
            redirect.stop();
        }
        self.app.stop();
    }

    /// Block until the app listener exits.
    ///
    /// # Errors
    ///
    /// If the app listener panicked.
    pub fn join(self) -> Result<()> {
        self.app
            .join()
            .map_err(|_| anyhow!("server coroutine panicked"))?;
        if let Some(redirect) = self.redirect {
            redirect.stop();
        }
        Ok(())
    }
}

/// Start the sample service on `server_address`, plus the redirector on
/// `redirect_address` when `secure` and `insecure_redirect` are both set.
///
/// A redirector that fails to bind is logged and skipped.
///
/// # Errors
///
/// If the service cannot be built or the app listener cannot bind.
pub fn start_listeners(config: &AppConfig, runtime: &RuntimeConfig) -> Result<Listeners> {
    info!(
        secure = config.secure,
        insecure_redirect = config.insecure_redirect,
        address = %config.server_address,
        "Starting server"
    );
    let service = sample_service(config, runtime)?;
    let app = HttpServer(service)
        .start(config.server_address.as_str())
        .with_context(|| format!("failed to listen on {}", config.server_address))?;

    let redirect = if config.redirects() {
        match HttpServer(RedirectService::new(app.addr().port()))
            .start(config.redirect_address.as_str())
        {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(address = %config.redirect_address, error = %e, "Redirect listener not started");
                None
            }
        }
    } else {
        None
    };
    Ok(Listeners { app, redirect })
}

fn load(path: Option<&Path>) -> Result<AppConfig> {
    AppConfig::load(path).context("failed to load config")
}
