//! Tests for session derivation and cookie issue
//!
//! # Test Coverage
//!
//! - Minting when no usable cookie is present (absent, forged, expired, wrong name)
//! - Decoding a valid cookie back into the same session
//! - Duplicate cookie names: the first one that decodes wins
//! - `Set-Cookie` attributes driven by the codec options, including expiry
//! - Refresh policies end to end through `establish`

use chrono::{Duration as ChronoDuration, Utc};
use cookie::Cookie;
use http::header::SET_COOKIE;
use http::HeaderMap;
use valet::securecookie::CookieOptions;
use valet::server::{parse_cookies, HttpResponse};
use valet::session::{self, RefreshPolicy, Session, SessionSource};

mod common;
use common::fixtures::{codec, codec_with};

fn set_cookies(res: &HttpResponse) -> Vec<String> {
    res.headers
        .get_all(SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_owned())
        .collect()
}

#[test]
fn test_no_cookie_mints_fresh_session() {
    let (s, source) = session::lookup(&[], "v", &codec());
    assert_eq!(source, SessionSource::Minted);
    assert!(!s.id.is_empty());
    assert!(!s.token.is_empty());
    assert_ne!(s.id, s.token);

    let other = session::from_cookies(&[], "v", &codec());
    assert_ne!(s.id, other.id);
}

#[test]
fn test_valid_cookie_restores_session() {
    let c = codec();
    let original = Session::new();
    let cookies = vec![Cookie::new("v", c.encode("v", &original).unwrap())];

    let (restored, source) = session::lookup(&cookies, "v", &c);
    assert_eq!(source, SessionSource::Cookie);
    assert_eq!(restored, original);
}

#[test]
fn test_forged_or_foreign_cookie_falls_back_to_new_session() {
    let c = codec();
    let original = Session::new();
    let sealed = c.encode("v", &original).unwrap();

    let cases = vec![
        Cookie::new("v", "definitely-not-a-cookie"),
        Cookie::new("v", format!("{sealed}x")),
        Cookie::new("v", c.encode("other", &original).unwrap()),
        Cookie::new("w", sealed),
    ];
    for cookie in cases {
        let (s, source) = session::lookup(std::slice::from_ref(&cookie), "v", &c);
        assert_eq!(source, SessionSource::Minted, "accepted {cookie}");
        assert_ne!(s.id, original.id);
    }
}

#[test]
fn test_expired_cookie_falls_back_to_new_session() {
    let c = codec_with(CookieOptions {
        max_age: 60,
        ..CookieOptions::default()
    });
    let original = Session::new();
    let stale = c
        .encode_at("v", &original, Utc::now().timestamp() - 120)
        .unwrap();

    let (s, source) = session::lookup(&[Cookie::new("v", stale)], "v", &c);
    assert_eq!(source, SessionSource::Minted);
    assert_ne!(s.id, original.id);
}

#[test]
fn test_first_decodable_duplicate_wins() {
    let c = codec();
    let first = Session::new();
    let second = Session::new();

    let mut headers = HeaderMap::new();
    headers.append(
        http::header::COOKIE,
        format!(
            "v=garbage; v={}; v={}",
            c.encode("v", &first).unwrap(),
            c.encode("v", &second).unwrap()
        )
        .parse()
        .unwrap(),
    );
    let cookies = parse_cookies(&headers);
    assert_eq!(cookies.len(), 3);
    assert_eq!(session::from_cookies(&cookies, "v", &c).id, first.id);
}

#[test]
fn test_set_cookie_carries_codec_attributes() {
    let c = codec_with(CookieOptions {
        domain: "example.test".into(),
        path: "/app".into(),
        max_age: 600,
        secure: true,
        http_only: true,
        ..CookieOptions::default()
    });
    let s = Session::new();
    let mut res = HttpResponse::default();
    session::set_cookie(&s, "v", Some(&mut res), &c).unwrap();

    let headers = set_cookies(&res);
    assert_eq!(headers.len(), 1);
    let parsed = Cookie::parse(headers[0].clone()).unwrap();
    assert_eq!(parsed.name(), "v");
    assert_eq!(parsed.domain(), Some("example.test"));
    assert_eq!(parsed.path(), Some("/app"));
    assert_eq!(parsed.max_age(), Some(cookie::time::Duration::seconds(600)));
    assert_eq!(parsed.secure(), Some(true));
    assert_eq!(parsed.http_only(), Some(true));

    assert_eq!(c.decode::<Session>("v", parsed.value()).unwrap(), s);
}

#[test]
fn test_set_cookie_omits_unset_attributes() {
    let c = codec_with(CookieOptions::default());
    let mut res = HttpResponse::default();
    session::set_cookie(&Session::new(), "v", Some(&mut res), &c).unwrap();

    let raw = &set_cookies(&res)[0];
    let parsed = Cookie::parse(raw.clone()).unwrap();
    assert_eq!(parsed.domain(), None);
    assert_eq!(parsed.path(), None);
    assert_eq!(parsed.max_age(), None);
    assert!(!raw.contains("Secure"));
    assert!(!raw.contains("HttpOnly"));
}

#[test]
fn test_negative_max_age_expires_the_cookie() {
    let c = codec_with(CookieOptions {
        max_age: -1,
        ..CookieOptions::default()
    });
    let mut res = HttpResponse::default();
    session::set_cookie(&Session::new(), "v", Some(&mut res), &c).unwrap();

    let raw = &set_cookies(&res)[0];
    assert!(raw.contains("Max-Age=0"), "got {raw}");
    let parsed = Cookie::parse(raw.clone()).unwrap();
    assert_eq!(parsed.max_age(), Some(cookie::time::Duration::ZERO));
}

#[test]
fn test_set_cookie_without_writer_is_a_no_op() {
    let writer: Option<&mut HttpResponse> = None;
    session::set_cookie(&Session::new(), "v", writer, &codec()).unwrap();
}

#[test]
fn test_establish_issues_cookie_only_for_new_sessions_by_default() {
    let c = codec();
    let mut res = HttpResponse::default();
    let minted =
        session::establish(&[], "v", Some(&mut res), &c, RefreshPolicy::default()).unwrap();
    assert_eq!(set_cookies(&res).len(), 1);

    let cookies = vec![Cookie::new("v", c.encode("v", &minted).unwrap())];
    let mut res = HttpResponse::default();
    let again =
        session::establish(&cookies, "v", Some(&mut res), &c, RefreshPolicy::default()).unwrap();
    assert_eq!(again.id, minted.id);
    assert!(set_cookies(&res).is_empty());
}

#[test]
fn test_establish_restamps_stale_sessions_under_older_than() {
    let c = codec();
    let stale = Session {
        timestamp: Utc::now() - ChronoDuration::hours(2),
        ..Session::new()
    };
    let cookies = vec![Cookie::new("v", c.encode("v", &stale).unwrap())];
    let mut res = HttpResponse::default();
    let policy = RefreshPolicy::OlderThan(ChronoDuration::minutes(30));

    let refreshed = session::establish(&cookies, "v", Some(&mut res), &c, policy).unwrap();
    assert_eq!(refreshed.id, stale.id);
    assert_eq!(refreshed.token, stale.token);
    assert!(refreshed.timestamp > stale.timestamp);

    let issued = Cookie::parse(set_cookies(&res)[0].clone()).unwrap();
    let decoded: Session = c.decode("v", issued.value()).unwrap();
    assert_eq!(decoded, refreshed);
}
