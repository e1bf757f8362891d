use thiserror::Error;

/// Errors produced while constructing a [`SecureCookie`](super::SecureCookie)
/// or sealing/unsealing a cookie value.
///
/// Every decode-side variant means "untrusted input". Callers facing a client
/// must collapse them into a single generic failure; the variants exist so the
/// server can log *why* a cookie was dropped without telling the client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CookieError {
    /// The HMAC key is empty
    #[error("hash key not set")]
    HashKeyNotSet,
    /// The encryption key is empty
    #[error("block key not set")]
    BlockKeyNotSet,
    /// The encryption key is not an AES-128/192/256 key
    #[error("invalid block key length {0}: expected 16, 24 or 32 bytes")]
    InvalidBlockKeyLength(usize),
    /// The value could not be serialized
    #[error("failed to serialize cookie value: {0}")]
    Serialization(String),
    /// No IV could be drawn or the cipher rejected its input
    #[error("failed to encrypt cookie value")]
    Encryption,
    /// The sealed value is longer than the configured maximum
    #[error("encoded length is too long")]
    EncodedTooLong,
    /// The incoming value is longer than the configured maximum
    #[error("decode value is too long")]
    DecodeTooLong,
    /// The envelope is not valid base64 or does not have three fields
    #[error("malformed cookie envelope")]
    MalformedEnvelope,
    /// The authentication tag does not match
    #[error("mac is invalid")]
    InvalidMac,
    /// The cookie is younger than `min_age`
    #[error("timestamp is too new")]
    TimestampTooNew,
    /// The cookie is older than `max_age`
    #[error("timestamp is expired")]
    TimestampExpired,
    /// The ciphertext field is undecodable or shorter than one IV
    #[error("length of encrypted value is too short")]
    Decryption,
    /// The plaintext could not be deserialized into the requested type
    #[error("failed to deserialize cookie value: {0}")]
    Deserialization(String),
}

impl CookieError {
    /// True for errors raised while building the codec (fatal at startup).
    #[must_use]
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::HashKeyNotSet | Self::BlockKeyNotSet | Self::InvalidBlockKeyLength(_)
        )
    }

    /// Short, stable label suitable for structured log fields.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::HashKeyNotSet => "hash_key_not_set",
            Self::BlockKeyNotSet => "block_key_not_set",
            Self::InvalidBlockKeyLength(_) => "invalid_block_key_length",
            Self::Serialization(_) => "serialization",
            Self::Encryption => "encryption",
            Self::EncodedTooLong => "encoded_too_long",
            Self::DecodeTooLong => "decode_too_long",
            Self::MalformedEnvelope => "malformed_envelope",
            Self::InvalidMac => "invalid_mac",
            Self::TimestampTooNew => "timestamp_too_new",
            Self::TimestampExpired => "timestamp_expired",
            Self::Decryption => "decryption",
            Self::Deserialization(_) => "deserialization",
        }
    }
}
