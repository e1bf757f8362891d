//! # Session Module
//!
//! Derives a [`Session`] for every request from its cookies, or mints a new
//! one, and writes the session cookie back when the refresh policy asks for it.
//!
//! Client data is never trusted until it passes the cookie codec. Any failure
//! to decode a matching cookie (tampering, expiry, wrong key, garbage) drops
//! silently to a brand new anonymous session. The failure kind is logged at
//! `debug` and nothing about it reaches the client.

mod refresh;

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use cookie::Cookie;
use http::header::{HeaderValue, SET_COOKIE};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::entity;
use crate::securecookie::{CookieError, SecureCookie, Serializer};
use crate::server::ResponseWriter;

pub use refresh::RefreshPolicy;

/// Server-issued identity bound to one browser through the session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque random identifier, stable for the cookie's lifetime
    pub id: String,
    /// Anti-forgery token, drawn independently of `id`
    pub token: String,
    /// Creation or last refresh time
    pub timestamp: DateTime<Utc>,
}

/// Where a request's session came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSource {
    /// Decoded from a valid cookie
    Cookie,
    /// No usable cookie; freshly minted
    Minted,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to encode session cookie: {0}")]
    Encode(#[from] CookieError),
    #[error("session cookie is not a valid header value")]
    InvalidHeader,
}

impl Session {
    /// Mint a session with a fresh id and token stamped now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: entity::new_id(),
            token: STANDARD_NO_PAD.encode(entity::new_id()),
            timestamp: entity::now(),
        }
    }

    /// Restamp the session. The caller re-issues the cookie afterwards.
    pub fn refresh(&mut self, now: DateTime<Utc>) {
        self.timestamp = now;
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// First cookie named `name` that decodes, else a new session.
#[must_use]
pub fn from_cookies<S: Serializer>(
    cookies: &[Cookie<'_>],
    name: &str,
    codec: &SecureCookie<S>,
) -> Session {
    lookup(cookies, name, codec).0
}

/// Like [`from_cookies`], also reporting whether the session was minted.
#[must_use]
pub fn lookup<S: Serializer>(
    cookies: &[Cookie<'_>],
    name: &str,
    codec: &SecureCookie<S>,
) -> (Session, SessionSource) {
    for cookie in cookies.iter().filter(|c| c.name() == name) {
        match codec.decode::<Session>(name, cookie.value()) {
            Ok(session) => return (session, SessionSource::Cookie),
            Err(e) => debug!(cookie = name, reason = e.kind(), "discarding session cookie"),
        }
    }
    (Session::new(), SessionSource::Minted)
}

/// Seal `session` and attach it as a `Set-Cookie` header.
///
/// Domain, path, max-age, secure and http-only come from the codec's
/// options. A zero max-age leaves the attribute off (a browser-session
/// cookie); a negative one is sent as `Max-Age=0`. Succeeds without doing
/// anything when `writer` is `None`.
///
/// # Errors
///
/// [`SessionError::Encode`] if sealing fails, [`SessionError::InvalidHeader`]
/// if the rendered cookie cannot be a header value.
pub fn set_cookie<S, W>(
    session: &Session,
    name: &str,
    writer: Option<&mut W>,
    codec: &SecureCookie<S>,
) -> Result<(), SessionError>
where
    S: Serializer,
    W: ResponseWriter + ?Sized,
{
    let Some(writer) = writer else {
        return Ok(());
    };

    let value = codec.encode(name, session)?;
    let mut builder = Cookie::build((name.to_owned(), value))
        .secure(codec.secure())
        .http_only(codec.http_only());
    if !codec.path().is_empty() {
        builder = builder.path(codec.path().to_owned());
    }
    if !codec.domain().is_empty() {
        builder = builder.domain(codec.domain().to_owned());
    }
    match codec.max_age() {
        0 => {}
        // Negative ages ask the browser to drop the cookie now.
        age if age < 0 => builder = builder.max_age(cookie::time::Duration::ZERO),
        age => builder = builder.max_age(cookie::time::Duration::seconds(i64::from(age))),
    }

    let header =
        HeaderValue::from_str(&builder.build().to_string()).map_err(|_| SessionError::InvalidHeader)?;
    writer.headers_mut().append(SET_COOKIE, header);
    Ok(())
}

/// Derive the request's session and re-issue the cookie if `policy` says so.
///
/// `now` is sampled before the session is derived, so a freshly minted
/// session is never older than it.
///
/// # Errors
///
/// Only when re-issuing the cookie fails; see [`set_cookie`].
pub fn establish<S, W>(
    cookies: &[Cookie<'_>],
    name: &str,
    writer: Option<&mut W>,
    codec: &SecureCookie<S>,
    policy: RefreshPolicy,
) -> Result<Session, SessionError>
where
    S: Serializer,
    W: ResponseWriter + ?Sized,
{
    let now = entity::now();
    let (mut session, source) = lookup(cookies, name, codec);
    if policy.should_refresh(&session, source, now) {
        if source == SessionSource::Cookie {
            session.refresh(entity::now());
        }
        set_cookie(&session, name, writer, codec)?;
    }
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::securecookie::CookieOptions;
    use crate::server::HttpResponse;

    fn codec() -> SecureCookie {
        SecureCookie::new(
            vec![3u8; 32],
            vec![4u8; 32],
            CookieOptions {
                domain: "example.test".into(),
                path: "/".into(),
                max_age: 3600,
                secure: true,
                http_only: true,
                ..CookieOptions::default()
            },
        )
        .unwrap()
    }

    fn cookie_for(session: &Session, name: &str, codec: &SecureCookie) -> Cookie<'static> {
        Cookie::new(name.to_owned(), codec.encode(name, session).unwrap())
    }

    #[test]
    fn new_sessions_have_independent_id_and_token() {
        let s = Session::new();
        assert_eq!(s.id.len(), 32);
        assert!(s.id.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(!s.token.is_empty());
        assert_ne!(s.token, s.id);
        assert_ne!(STANDARD_NO_PAD.decode(&s.token).unwrap(), s.id.as_bytes());
    }

    #[test]
    fn empty_cookie_list_mints() {
        let (s, source) = lookup(&[], "v", &codec());
        assert_eq!(source, SessionSource::Minted);
        assert!(!s.id.is_empty());
    }

    #[test]
    fn first_decodable_matching_cookie_wins() {
        let c = codec();
        let a = Session::new();
        let b = Session::new();
        let cookies = vec![
            Cookie::new("other", c.encode("other", &b).unwrap()),
            Cookie::new("v", "garbage"),
            cookie_for(&a, "v", &c),
            cookie_for(&b, "v", &c),
        ];
        let (s, source) = lookup(&cookies, "v", &c);
        assert_eq!(source, SessionSource::Cookie);
        assert_eq!(s, a);
    }

    #[test]
    fn cookie_sealed_under_other_name_is_ignored() {
        let c = codec();
        let a = Session::new();
        let cookies = vec![Cookie::new("v", c.encode("w", &a).unwrap())];
        let s = from_cookies(&cookies, "v", &c);
        assert_ne!(s.id, a.id);
    }

    #[test]
    fn set_cookie_without_writer_is_noop() {
        let res: Option<&mut HttpResponse> = None;
        assert!(set_cookie(&Session::new(), "v", res, &codec()).is_ok());
    }

    #[test]
    fn set_cookie_carries_codec_attributes() {
        let c = codec();
        let mut res = HttpResponse::default();
        set_cookie(&Session::new(), "v", Some(&mut res), &c).unwrap();

        let raw = res.headers.get(SET_COOKIE).unwrap().to_str().unwrap();
        let parsed = Cookie::parse(raw.to_owned()).unwrap();
        assert_eq!(parsed.name(), "v");
        assert_eq!(parsed.domain(), Some("example.test"));
        assert_eq!(parsed.path(), Some("/"));
        assert_eq!(parsed.secure(), Some(true));
        assert_eq!(parsed.http_only(), Some(true));
        assert_eq!(
            parsed.max_age(),
            Some(cookie::time::Duration::seconds(3600))
        );
        assert!(c.decode::<Session>("v", parsed.value()).is_ok());
    }

    #[test]
    fn establish_issues_cookie_for_minted_session_only_under_default_policy() {
        let c = codec();
        let mut res = HttpResponse::default();
        let minted = establish(&[], "v", Some(&mut res), &c, RefreshPolicy::default()).unwrap();
        assert!(res.headers.contains_key(SET_COOKIE));

        let mut res = HttpResponse::default();
        let cookies = vec![cookie_for(&minted, "v", &c)];
        let again = establish(&cookies, "v", Some(&mut res), &c, RefreshPolicy::default()).unwrap();
        assert_eq!(again, minted);
        assert!(!res.headers.contains_key(SET_COOKIE));
    }

    #[test]
    fn establish_refreshes_stale_session_when_asked() {
        let c = codec();
        let mut old = Session::new();
        old.timestamp -= chrono::Duration::hours(2);
        let cookies = vec![cookie_for(&old, "v", &c)];

        let mut res = HttpResponse::default();
        let s = establish(
            &cookies,
            "v",
            Some(&mut res),
            &c,
            RefreshPolicy::OlderThan(chrono::Duration::hours(1)),
        )
        .unwrap();
        assert_eq!(s.id, old.id);
        assert!(s.timestamp > old.timestamp);
        assert!(res.headers.contains_key(SET_COOKIE));
    }
}
