use std::fmt;

use aes::{Aes128, Aes192, Aes256};
use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use ctr::cipher::{KeyIvInit, StreamCipher};
use ctr::Ctr128BE;
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::TryRngCore;
use serde::{de::DeserializeOwned, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::debug;

use super::envelope::Envelope;
use super::serializer::{MsgPackSerializer, Serializer};
use super::CookieError;

type HmacSha256 = Hmac<Sha256>;

/// AES block size; also the length of the CTR IV prefixed to every ciphertext.
pub const BLOCK_SIZE: usize = 16;

/// Default upper bound on the sealed cookie length (browsers cap at ~4 KiB).
pub const DEFAULT_MAX_LENGTH: usize = 4096;

/// Cookie scoping and age bounds.
///
/// `domain`, `path`, `secure` and `http_only` are not used by the codec itself;
/// they ride along so the session layer can build `Set-Cookie` attributes from
/// one place. Ages are in seconds and `0` disables the bound.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieOptions {
    pub domain: String,
    pub path: String,
    pub min_age: i64,
    pub max_age: i64,
    pub secure: bool,
    pub http_only: bool,
}

/// Seals arbitrary values into authenticated, encrypted cookie strings.
///
/// Holds only immutable configuration after construction, so a single
/// instance is shared by every in-flight request without locking.
#[derive(Clone)]
pub struct SecureCookie<S = MsgPackSerializer> {
    hash_key: Vec<u8>,
    block_key: Vec<u8>,
    options: CookieOptions,
    max_length: usize,
    serializer: S,
}

impl<S: fmt::Debug> fmt::Debug for SecureCookie<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureCookie")
            .field("hash_key", &"<redacted>")
            .field("block_key", &"<redacted>")
            .field("options", &self.options)
            .field("max_length", &self.max_length)
            .field("serializer", &self.serializer)
            .finish()
    }
}

impl SecureCookie<MsgPackSerializer> {
    /// Build a codec with the default MessagePack serializer.
    ///
    /// # Errors
    ///
    /// - [`CookieError::HashKeyNotSet`] / [`CookieError::BlockKeyNotSet`] for empty keys
    /// - [`CookieError::InvalidBlockKeyLength`] unless the block key is 16, 24 or 32 bytes
    pub fn new(
        hash_key: impl Into<Vec<u8>>,
        block_key: impl Into<Vec<u8>>,
        options: CookieOptions,
    ) -> Result<Self, CookieError> {
        let hash_key = hash_key.into();
        let block_key = block_key.into();
        if hash_key.is_empty() {
            return Err(CookieError::HashKeyNotSet);
        }
        if block_key.is_empty() {
            return Err(CookieError::BlockKeyNotSet);
        }
        if !matches!(block_key.len(), 16 | 24 | 32) {
            return Err(CookieError::InvalidBlockKeyLength(block_key.len()));
        }
        Ok(Self {
            hash_key,
            block_key,
            options,
            max_length: DEFAULT_MAX_LENGTH,
            serializer: MsgPackSerializer,
        })
    }
}

impl<S: Serializer> SecureCookie<S> {
    /// Swap the payload serializer, keeping keys and options.
    #[must_use]
    pub fn with_serializer<T: Serializer>(self, serializer: T) -> SecureCookie<T> {
        SecureCookie {
            hash_key: self.hash_key,
            block_key: self.block_key,
            options: self.options,
            max_length: self.max_length,
            serializer,
        }
    }

    /// Set the maximum sealed length; `0` disables the check.
    #[must_use]
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    #[must_use]
    pub fn options(&self) -> &CookieOptions {
        &self.options
    }

    #[must_use]
    pub fn domain(&self) -> &str {
        &self.options.domain
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.options.path
    }

    /// Minimum age clamped to the `i32` range; negative ages report `-1`.
    #[must_use]
    pub fn min_age(&self) -> i32 {
        clamp_age(self.options.min_age)
    }

    /// Maximum age clamped to the `i32` range; negative ages report `-1`.
    #[must_use]
    pub fn max_age(&self) -> i32 {
        clamp_age(self.options.max_age)
    }

    #[must_use]
    pub fn secure(&self) -> bool {
        self.options.secure
    }

    #[must_use]
    pub fn http_only(&self) -> bool {
        self.options.http_only
    }

    #[must_use]
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Serialize, encrypt, sign and encode `value` for the cookie `name`.
    ///
    /// # Errors
    ///
    /// [`CookieError::Serialization`], [`CookieError::Encryption`] or
    /// [`CookieError::EncodedTooLong`]. Oversized output is never truncated.
    pub fn encode<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<String, CookieError> {
        self.encode_at(name, value, unix_now())
    }

    /// [`encode`](Self::encode) with an explicit timestamp (Unix seconds).
    pub fn encode_at<T: Serialize + ?Sized>(
        &self,
        name: &str,
        value: &T,
        timestamp: i64,
    ) -> Result<String, CookieError> {
        let plaintext = self.serializer.serialize(value)?;
        let sealed = URL_SAFE.encode(self.encrypt(&plaintext)?);
        let timestamp = timestamp.to_string();

        let mac = self.sign(&Envelope::mac_input(name, &timestamp, &sealed))?;
        let wire = Envelope {
            timestamp,
            sealed,
            mac,
        }
        .to_wire();

        if self.max_length != 0 && wire.len() > self.max_length {
            return Err(CookieError::EncodedTooLong);
        }
        Ok(wire)
    }

    /// Verify, decrypt and deserialize a value produced by [`encode`](Self::encode)
    /// under the same `name`.
    ///
    /// Returns the value only when every check passes; nothing is produced on
    /// failure.
    ///
    /// # Errors
    ///
    /// Any of the decode-side [`CookieError`] variants.
    pub fn decode<T: DeserializeOwned>(&self, name: &str, value: &str) -> Result<T, CookieError> {
        self.decode_at(name, value, unix_now())
    }

    /// [`decode`](Self::decode) into an existing slot, which is only
    /// overwritten on success.
    pub fn decode_into<T: DeserializeOwned>(
        &self,
        name: &str,
        value: &str,
        dst: &mut T,
    ) -> Result<(), CookieError> {
        *dst = self.decode(name, value)?;
        Ok(())
    }

    /// [`decode`](Self::decode) evaluated against an explicit "now" (Unix seconds).
    pub fn decode_at<T: DeserializeOwned>(
        &self,
        name: &str,
        value: &str,
        now: i64,
    ) -> Result<T, CookieError> {
        if self.max_length != 0 && value.len() > self.max_length {
            return Err(CookieError::DecodeTooLong);
        }

        let envelope = Envelope::from_wire(value)?;
        self.verify(
            &Envelope::mac_input(name, &envelope.timestamp, &envelope.sealed),
            &envelope.mac,
        )?;

        let issued: i64 = envelope
            .timestamp
            .parse()
            .map_err(|_| CookieError::MalformedEnvelope)?;
        let age = now.saturating_sub(issued);
        if self.options.min_age != 0 && age < self.options.min_age {
            return Err(CookieError::TimestampTooNew);
        }
        if self.options.max_age != 0 && age > self.options.max_age {
            return Err(CookieError::TimestampExpired);
        }

        let sealed = URL_SAFE
            .decode(envelope.sealed.as_bytes())
            .map_err(|_| CookieError::Decryption)?;
        let plaintext = self.decrypt(&sealed)?;
        self.serializer.deserialize(&plaintext)
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CookieError> {
        let mut out = vec![0u8; BLOCK_SIZE + plaintext.len()];
        let (iv, body) = out.split_at_mut(BLOCK_SIZE);
        // Fresh IV per call: CTR keystream reuse leaks plaintext XORs.
        OsRng.try_fill_bytes(iv).map_err(|e| {
            debug!(error = %e, "os rng unavailable for cookie iv");
            CookieError::Encryption
        })?;
        body.copy_from_slice(plaintext);
        apply_keystream(&self.block_key, iv, body).map_err(|_| CookieError::Encryption)?;
        Ok(out)
    }

    fn decrypt(&self, sealed: &[u8]) -> Result<Vec<u8>, CookieError> {
        if sealed.len() < BLOCK_SIZE {
            return Err(CookieError::Decryption);
        }
        let (iv, body) = sealed.split_at(BLOCK_SIZE);
        let mut plaintext = body.to_vec();
        apply_keystream(&self.block_key, iv, &mut plaintext)
            .map_err(|_| CookieError::Decryption)?;
        Ok(plaintext)
    }

    fn sign(&self, input: &[u8]) -> Result<Vec<u8>, CookieError> {
        let mut mac =
            HmacSha256::new_from_slice(&self.hash_key).map_err(|_| CookieError::HashKeyNotSet)?;
        mac.update(input);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    fn verify(&self, input: &[u8], supplied: &[u8]) -> Result<(), CookieError> {
        let expected = self.sign(input)?;
        // Slice ct_eq folds a length mismatch into the same Choice as a byte
        // mismatch; callers only ever see InvalidMac.
        if bool::from(expected.as_slice().ct_eq(supplied)) {
            Ok(())
        } else {
            Err(CookieError::InvalidMac)
        }
    }
}

/// Draw `len` bytes from the OS CSPRNG. `None` if the OS source fails.
#[must_use]
pub fn generate_random_key(len: usize) -> Option<Vec<u8>> {
    let mut key = vec![0u8; len];
    OsRng.try_fill_bytes(&mut key).ok()?;
    Some(key)
}

fn apply_keystream(key: &[u8], iv: &[u8], buf: &mut [u8]) -> Result<(), ctr::cipher::InvalidLength> {
    match key.len() {
        16 => Ctr128BE::<Aes128>::new_from_slices(key, iv)?.apply_keystream(buf),
        24 => Ctr128BE::<Aes192>::new_from_slices(key, iv)?.apply_keystream(buf),
        32 => Ctr128BE::<Aes256>::new_from_slices(key, iv)?.apply_keystream(buf),
        _ => return Err(ctr::cipher::InvalidLength),
    }
    Ok(())
}

fn clamp_age(age: i64) -> i32 {
    if age < 0 {
        -1
    } else {
        i32::try_from(age).unwrap_or(i32::MAX)
    }
}

fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}
