//! Wire layout of a sealed cookie.
//!
//! ```text
//! mac input : name "|" timestamp "|" base64url(iv ‖ ciphertext) "|"
//! payload   : timestamp "|" base64url(iv ‖ ciphertext) "|" mac
//! wire      : base64url(payload)
//! ```
//!
//! The MAC is raw HMAC-SHA256 output and may itself contain `|` bytes, so
//! parsing splits at most twice and treats the remainder as the tag.

use base64::{engine::general_purpose::URL_SAFE, Engine as _};

use super::CookieError;

const SEPARATOR: u8 = b'|';

/// A cookie value split into its three authenticated fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Envelope {
    /// Decimal Unix seconds, kept as the exact bytes that were authenticated
    pub timestamp: String,
    /// URL-safe base64 of `iv ‖ ciphertext`
    pub sealed: String,
    /// Raw authentication tag
    pub mac: Vec<u8>,
}

impl Envelope {
    /// Bytes covered by the MAC for a cookie called `name`.
    pub fn mac_input(name: &str, timestamp: &str, sealed: &str) -> Vec<u8> {
        let mut buf = Vec::with_capacity(name.len() + timestamp.len() + sealed.len() + 3);
        buf.extend_from_slice(name.as_bytes());
        buf.push(SEPARATOR);
        buf.extend_from_slice(timestamp.as_bytes());
        buf.push(SEPARATOR);
        buf.extend_from_slice(sealed.as_bytes());
        buf.push(SEPARATOR);
        buf
    }

    /// Outer encoding. The cookie name is mixed into the MAC only.
    pub fn to_wire(&self) -> String {
        let mut payload =
            Vec::with_capacity(self.timestamp.len() + self.sealed.len() + self.mac.len() + 2);
        payload.extend_from_slice(self.timestamp.as_bytes());
        payload.push(SEPARATOR);
        payload.extend_from_slice(self.sealed.as_bytes());
        payload.push(SEPARATOR);
        payload.extend_from_slice(&self.mac);
        URL_SAFE.encode(payload)
    }

    pub fn from_wire(value: &str) -> Result<Self, CookieError> {
        let payload = URL_SAFE
            .decode(value.as_bytes())
            .map_err(|_| CookieError::MalformedEnvelope)?;

        let mut parts = payload.splitn(3, |b| *b == SEPARATOR);
        let (Some(timestamp), Some(sealed), Some(mac)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(CookieError::MalformedEnvelope);
        };

        // Both leading fields are ASCII by construction; anything else was
        // not produced by us.
        let timestamp =
            std::str::from_utf8(timestamp).map_err(|_| CookieError::MalformedEnvelope)?;
        let sealed = std::str::from_utf8(sealed).map_err(|_| CookieError::MalformedEnvelope)?;

        Ok(Self {
            timestamp: timestamp.to_owned(),
            sealed: sealed.to_owned(),
            mac: mac.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_input_keeps_trailing_separator() {
        let input = Envelope::mac_input("v", "1700000000", "abc=");
        assert_eq!(input, b"v|1700000000|abc=|".to_vec());
    }

    #[test]
    fn wire_round_trip_with_separator_inside_mac() {
        let env = Envelope {
            timestamp: "1700000000".into(),
            sealed: "c2VhbGVk".into(),
            mac: vec![0x7c, 0x01, 0x7c, 0xff],
        };
        let parsed = Envelope::from_wire(&env.to_wire()).unwrap();
        assert_eq!(parsed, env);
    }

    #[test]
    fn rejects_missing_fields() {
        let wire = URL_SAFE.encode(b"1700000000|only-two");
        assert_eq!(
            Envelope::from_wire(&wire),
            Err(CookieError::MalformedEnvelope)
        );
    }

    #[test]
    fn rejects_non_base64() {
        assert_eq!(
            Envelope::from_wire("!!not base64!!"),
            Err(CookieError::MalformedEnvelope)
        );
    }
}
