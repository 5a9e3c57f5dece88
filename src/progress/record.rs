//! Concept Record - proof that a concept was learned, with its retention window

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Milliseconds in one retention day
pub const DAY_MS: i64 = 86_400_000;

/// Concept Record marks a concept as learned.
///
/// Records are immutable: a new solve replaces the record wholesale and
/// expiry is always recomputed from the stored fields.
///
/// Serialized as `{"learnedAt": <ms since epoch>, "expiryDays": n, "assisted": b}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConceptRecord {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    learned_at: DateTime<Utc>,
    expiry_days: u32,
    assisted: bool,
}

impl ConceptRecord {
    /// Create a record for a concept learned at `learned_at`.
    ///
    /// # Arguments
    ///
    /// * `learned_at` - Moment of the successful attempt
    /// * `expiry_days` - Retention window, already validated and positive
    /// * `assisted` - Whether help was used before the solve
    #[must_use]
    pub const fn new(learned_at: DateTime<Utc>, expiry_days: u32, assisted: bool) -> Self {
        Self {
            learned_at,
            expiry_days,
            assisted,
        }
    }

    /// When the concept was learned.
    #[must_use]
    pub const fn learned_at(&self) -> DateTime<Utc> {
        self.learned_at
    }

    /// Retention window in days.
    #[must_use]
    pub const fn expiry_days(&self) -> u32 {
        self.expiry_days
    }

    /// Whether help was used before the solve.
    #[must_use]
    pub const fn assisted(&self) -> bool {
        self.assisted
    }

    /// `learned_at + expiry_days * 86_400_000 ms`
    ///
    /// Saturates at [`DateTime::<Utc>::MAX_UTC`] when a stored record
    /// lies past the representable range, so such a record never expires.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.learned_at
            .checked_add_signed(Duration::milliseconds(
                i64::from(self.expiry_days) * DAY_MS,
            ))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Expired iff `now >= expires_at`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }

    /// Time left before expiry, computed against `now`.
    #[must_use]
    pub fn time_remaining(&self, now: DateTime<Utc>) -> TimeRemaining {
        let remaining = self.expires_at() - now;
        if remaining <= Duration::zero() {
            TimeRemaining::Expired
        } else {
            TimeRemaining::Remaining(remaining)
        }
    }
}

/// Human-scale countdown until a record expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRemaining {
    /// Still learned, with this much time left
    Remaining(Duration),
    /// Retention window has elapsed
    Expired,
}

impl TimeRemaining {
    /// Whole days left (0 once expired)
    #[must_use]
    pub fn days(&self) -> i64 {
        match self {
            Self::Remaining(d) => d.num_milliseconds() / DAY_MS,
            Self::Expired => 0,
        }
    }

    /// Whole hours left after the whole days (0 once expired)
    #[must_use]
    pub fn hours(&self) -> i64 {
        match self {
            Self::Remaining(d) => (d.num_milliseconds() % DAY_MS) / 3_600_000,
            Self::Expired => 0,
        }
    }

    /// Check for the expired sentinel
    #[must_use]
    pub const fn is_expired(&self) -> bool {
        matches!(self, Self::Expired)
    }
}

impl fmt::Display for TimeRemaining {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remaining(_) => write!(f, "Expires: {}d {}h", self.days(), self.hours()),
            Self::Expired => write!(f, "Expired"),
        }
    }
}
