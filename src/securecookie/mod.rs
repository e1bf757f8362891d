//! # Secure Cookie Module
//!
//! Seals values into cookie strings that the client can store but neither
//! read nor forge.
//!
//! Each value is serialized, encrypted with AES-CTR under a fresh random IV,
//! and authenticated with HMAC-SHA256 over the cookie name, issue timestamp
//! and ciphertext. Decoding verifies the tag in constant time before looking
//! at anything else, then enforces the configured age window.
//!
//! ## Usage
//!
//! ```rust
//! use valet::securecookie::{generate_random_key, CookieOptions, SecureCookie};
//!
//! let hash_key = generate_random_key(32).unwrap();
//! let block_key = generate_random_key(16).unwrap();
//! let codec = SecureCookie::new(hash_key, block_key, CookieOptions::default()).unwrap();
//!
//! let sealed = codec.encode("v", &("ana", 3u32)).unwrap();
//! let (name, n): (String, u32) = codec.decode("v", &sealed).unwrap();
//! assert_eq!((name.as_str(), n), ("ana", 3));
//! ```

mod codec;
mod envelope;
mod error;
mod serializer;

pub use codec::{generate_random_key, CookieOptions, SecureCookie, BLOCK_SIZE, DEFAULT_MAX_LENGTH};
pub use error::CookieError;
pub use serializer::{JsonSerializer, MsgPackSerializer, Serializer};
