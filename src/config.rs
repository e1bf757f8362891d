//! # Application Configuration
//!
//! YAML configuration with environment overrides.
//!
//! ## Lookup
//!
//! [`AppConfig::load`] uses an explicit path when given. Otherwise it tries,
//! in order, and keeps the first file that parses and validates:
//!
//! 1. `./config.yaml`
//! 2. `$HOME/.config/valet/config.yaml`
//! 3. `/usr/local/etc/valet/config.yaml`
//! 4. `/etc/valet/config.yaml`
//!
//! ## Environment Overrides
//!
//! Applied after the file is read, before validation:
//! `VALET_HASH_KEY`, `VALET_BLOCK_KEY`, `VALET_SERVER_ADDRESS`, `VALET_SECURE`,
//! `VALET_REPLY_TIMEOUT_MS`, `VALET_MAX_BODY_BYTES`. Numeric overrides that do
//! not parse are ignored with a warning.
//!
//! ## Example
//!
//! ```yaml
//! server_address: localhost:8080
//! hash_key: 3q2+7w...        # base64, any length
//! block_key: yv66vg...       # base64, 16/24/32 bytes decoded
//! secure: true
//! insecure_redirect: true   # 303 plain-HTTP requests on redirect_address to https
//! redirect_address: 0.0.0.0:80
//! cookie:
//!   name: v
//!   path: /
//!   max_age: 315360000
//! dispatch:
//!   reply_timeout_ms: 5000
//!   max_body_bytes: 1024
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::dispatcher::{DispatchPolicy, InputContext};
use crate::runtime_config::RuntimeConfig;
use crate::securecookie::{generate_random_key, CookieError, CookieOptions, SecureCookie};

/// Ten years, in seconds.
pub const DEFAULT_MAX_AGE: i64 = 315_360_000;
pub const DEFAULT_REPLY_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024;
pub const DEFAULT_REDIRECT_ADDRESS: &str = "0.0.0.0:80";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("no usable config file found (searched {searched:?})")]
    NotFound { searched: Vec<PathBuf> },
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("{which} is not valid base64")]
    KeyEncoding {
        which: &'static str,
        #[source]
        source: base64::DecodeError,
    },
    #[error(transparent)]
    Cookie(#[from] CookieError),
    #[error("failed to render config: {0}")]
    Render(#[source] serde_yaml::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieSettings {
    pub name: String,
    pub domain: String,
    pub path: String,
    pub min_age: i64,
    pub max_age: i64,
    pub max_length: usize,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            name: "v".to_string(),
            domain: String::new(),
            path: "/".to_string(),
            min_age: 0,
            max_age: DEFAULT_MAX_AGE,
            max_length: crate::securecookie::DEFAULT_MAX_LENGTH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchSettings {
    pub reply_timeout_ms: u64,
    pub max_body_bytes: usize,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            reply_timeout_ms: DEFAULT_REPLY_TIMEOUT_MS,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server_address: String,
    /// Base64 (standard alphabet) HMAC key
    pub hash_key: String,
    /// Base64 (standard alphabet) AES key
    pub block_key: String,
    /// Secure transport: also marks cookies `Secure` and `HttpOnly`
    pub secure: bool,
    /// With `secure`, also listen on `redirect_address` and send plain-HTTP
    /// clients to the https origin
    pub insecure_redirect: bool,
    pub redirect_address: String,
    pub cookie: CookieSettings,
    pub dispatch: DispatchSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_address: String::new(),
            hash_key: String::new(),
            block_key: String::new(),
            secure: true,
            insecure_redirect: false,
            redirect_address: DEFAULT_REDIRECT_ADDRESS.to_string(),
            cookie: CookieSettings::default(),
            dispatch: DispatchSettings::default(),
        }
    }
}

impl AppConfig {
    /// Default search locations, most specific first.
    #[must_use]
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.yaml")];
        if let Some(home) = std::env::var_os("HOME") {
            paths.push(PathBuf::from(home).join(".config/valet/config.yaml"));
        }
        paths.push(PathBuf::from("/usr/local/etc/valet/config.yaml"));
        paths.push(PathBuf::from("/etc/valet/config.yaml"));
        paths
    }

    /// Load from `explicit`, or from the first usable file on the search path.
    ///
    /// # Errors
    ///
    /// For an explicit path, the read, parse or validation error. Otherwise
    /// [`ConfigError::NotFound`] when no candidate was usable.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load_file(path);
        }

        let searched = Self::search_paths();
        for path in &searched {
            if !path.is_file() {
                continue;
            }
            match Self::load_file(path) {
                Ok(config) => return Ok(config),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping config file"),
            }
        }
        Err(ConfigError::NotFound { searched })
    }

    /// Read, apply env overrides and validate one file.
    ///
    /// # Errors
    ///
    /// See [`ConfigError`].
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_yaml(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.apply_env();
        config.validate()?;
        info!(path = %path.display(), server_address = %config.server_address, "Config loaded");
        Ok(config)
    }

    /// # Errors
    ///
    /// Malformed YAML or mistyped fields.
    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(raw)
    }

    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply `VALET_*` overrides through an arbitrary variable lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("VALET_HASH_KEY") {
            debug!("hash key overridden from environment");
            self.hash_key = v;
        }
        if let Some(v) = lookup("VALET_BLOCK_KEY") {
            debug!("block key overridden from environment");
            self.block_key = v;
        }
        if let Some(v) = lookup("VALET_SERVER_ADDRESS") {
            self.server_address = v;
        }
        if let Some(v) = lookup("VALET_SECURE") {
            match v.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => self.secure = true,
                "0" | "false" | "no" => self.secure = false,
                other => warn!(value = %other, "Ignoring unrecognised VALET_SECURE"),
            }
        }
        if let Some(v) = lookup("VALET_REPLY_TIMEOUT_MS") {
            match v.trim().parse() {
                Ok(ms) => self.dispatch.reply_timeout_ms = ms,
                Err(_) => warn!(value = %v, "Ignoring unparseable VALET_REPLY_TIMEOUT_MS"),
            }
        }
        if let Some(v) = lookup("VALET_MAX_BODY_BYTES") {
            match v.trim().parse() {
                Ok(bytes) => self.dispatch.max_body_bytes = bytes,
                Err(_) => warn!(value = %v, "Ignoring unparseable VALET_MAX_BODY_BYTES"),
            }
        }
    }

    /// # Errors
    ///
    /// [`ConfigError::Invalid`] for a missing address, missing keys or a
    /// block key of the wrong size; [`ConfigError::KeyEncoding`] for keys
    /// that are not base64.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server_address.trim().is_empty() {
            return Err(ConfigError::Invalid("unspecified server address".into()));
        }
        if self.cookie.name.is_empty() {
            return Err(ConfigError::Invalid("unspecified cookie name".into()));
        }
        let hash_key = self.hash_key_bytes()?;
        if hash_key.is_empty() {
            return Err(ConfigError::Invalid("unspecified hash key".into()));
        }
        let block_key = self.block_key_bytes()?;
        if block_key.is_empty() {
            return Err(ConfigError::Invalid("unspecified block key".into()));
        }
        if !matches!(block_key.len(), 16 | 24 | 32) {
            return Err(ConfigError::Invalid(format!(
                "block key must decode to 16, 24 or 32 bytes, got {}",
                block_key.len()
            )));
        }
        if self.redirects() && self.redirect_address.trim().is_empty() {
            return Err(ConfigError::Invalid("unspecified redirect address".into()));
        }
        Ok(())
    }

    /// Whether `serve` should run the plain-HTTP redirect listener.
    #[must_use]
    pub fn redirects(&self) -> bool {
        self.secure && self.insecure_redirect
    }

    /// # Errors
    ///
    /// [`ConfigError::KeyEncoding`] if the key is not base64.
    pub fn hash_key_bytes(&self) -> Result<Vec<u8>, ConfigError> {
        decode_key("hash_key", &self.hash_key)
    }

    /// # Errors
    ///
    /// [`ConfigError::KeyEncoding`] if the key is not base64.
    pub fn block_key_bytes(&self) -> Result<Vec<u8>, ConfigError> {
        decode_key("block_key", &self.block_key)
    }

    #[must_use]
    pub fn cookie_options(&self) -> CookieOptions {
        CookieOptions {
            domain: self.cookie.domain.clone(),
            path: self.cookie.path.clone(),
            min_age: self.cookie.min_age,
            max_age: self.cookie.max_age,
            secure: self.secure,
            http_only: self.secure,
        }
    }

    /// Build the cookie codec from the configured keys and cookie settings.
    ///
    /// # Errors
    ///
    /// Key decoding errors or [`ConfigError::Cookie`] for unusable keys.
    pub fn cookie_codec(&self) -> Result<SecureCookie, ConfigError> {
        let codec = SecureCookie::new(
            self.hash_key_bytes()?,
            self.block_key_bytes()?,
            self.cookie_options(),
        )?;
        Ok(codec.with_max_length(self.cookie.max_length))
    }

    /// Converter context for the dispatcher.
    ///
    /// # Errors
    ///
    /// See [`cookie_codec`](Self::cookie_codec).
    pub fn input_context(&self) -> Result<InputContext, ConfigError> {
        Ok(InputContext::new(self.cookie_codec()?, self.cookie.name.clone())
            .with_max_body_bytes(self.dispatch.max_body_bytes))
    }

    /// Dispatch policy: reply deadline from this file, coroutine stack from `runtime`.
    #[must_use]
    pub fn dispatch_policy(&self, runtime: &RuntimeConfig) -> DispatchPolicy {
        DispatchPolicy {
            reply_timeout: Duration::from_millis(self.dispatch.reply_timeout_ms),
            ..DispatchPolicy::from(runtime)
        }
    }

    /// A complete example config with freshly generated keys.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] if the OS random source is unavailable.
    pub fn example() -> Result<Self, ConfigError> {
        let key = || {
            generate_random_key(16)
                .map(|k| STANDARD.encode(k))
                .ok_or_else(|| ConfigError::Invalid("os random source unavailable".into()))
        };
        Ok(Self {
            server_address: "localhost:8080".to_string(),
            hash_key: key()?,
            block_key: key()?,
            secure: true,
            insecure_redirect: true,
            ..Self::default()
        })
    }

    /// # Errors
    ///
    /// [`ConfigError::Render`] if serialization fails.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(ConfigError::Render)
    }
}

fn decode_key(which: &'static str, encoded: &str) -> Result<Vec<u8>, ConfigError> {
    STANDARD
        .decode(encoded.trim())
        .map_err(|source| ConfigError::KeyEncoding { which, source })
}
