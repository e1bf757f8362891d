use chrono::{DateTime, Duration, Utc};

use super::{Session, SessionSource};

/// When a request re-issues its session cookie.
///
/// Freshly minted sessions are always issued under every policy; otherwise
/// the browser would never receive one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshPolicy {
    /// Re-issue only when the stored timestamp lies after `now`.
    ///
    /// Cookie-backed sessions are stamped in the past, so in practice this
    /// issues cookies for new sessions and leaves existing ones alone.
    #[default]
    FutureStamped,
    /// Re-issue when the stored timestamp is older than the given age.
    OlderThan(Duration),
}

impl RefreshPolicy {
    #[must_use]
    pub fn should_refresh(&self, session: &Session, source: SessionSource, now: DateTime<Utc>) -> bool {
        if source == SessionSource::Minted {
            return true;
        }
        match self {
            Self::FutureStamped => session.timestamp > now,
            Self::OlderThan(max) => now.signed_duration_since(session.timestamp) > *max,
        }
    }
}
