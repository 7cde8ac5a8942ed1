use chrono::{DateTime, Duration, Utc};

/// Subtracted from every lease to absorb clock skew and in-flight latency.
pub const EXPIRY_SAFETY_MARGIN_SECS: i64 = 5;

/// Point after which a cached token must not be handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    At(DateTime<Utc>),
    /// Lease duration 0: the store issued a token without expiry.
    Never,
}

impl Expiry {
    /// `now + lease_duration - safety margin`.
    pub fn from_lease(now: DateTime<Utc>, lease_duration: u64) -> Self {
        if lease_duration == 0 {
            return Self::Never;
        }
        let expires_at = i64::try_from(lease_duration)
            .ok()
            .and_then(Duration::try_seconds)
            .map(|lease| lease - Duration::seconds(EXPIRY_SAFETY_MARGIN_SECS))
            .and_then(|lease| now.checked_add_signed(lease));
        match expires_at {
            Some(at) => Self::At(at),
            None => Self::Never,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self {
            Self::At(at) => *at <= now,
            Self::Never => false,
        }
    }
}

/// Token held by the credential manager together with its expiry.
#[derive(Debug, Clone)]
pub struct CachedToken {
    pub token: String,
    pub expires_at: Expiry,
}

impl CachedToken {
    pub fn new(token: String, expires_at: Expiry) -> Self {
        Self { token, expires_at }
    }
}

/// Check a cache slot; the error names why it can't be used.
pub(crate) fn validate(cached: Option<&CachedToken>, now: DateTime<Utc>) -> Result<(), &'static str> {
    let Some(cached) = cached else {
        return Err("no token set");
    };
    if cached.token.is_empty() {
        return Err("no token set");
    }
    if cached.expires_at.is_expired(now) {
        return Err("token has expired");
    }
    Ok(())
}
