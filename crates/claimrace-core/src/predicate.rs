//! Time-lock predicate resolution.
//!
//! Only two predicate shapes have a well-defined unlock instant:
//! `NOT(BEFORE_ABSOLUTE(t))`, claimable from `t`, and `UNCONDITIONAL`,
//! claimable from the Unix epoch. Every other shape is reported as
//! unsupported instead of being approximated.

use chrono::{DateTime, Utc};

use crate::error::{CoreError, Result};
use crate::resource::{ClaimableResource, RawPredicate};
use crate::types::Address;

/// Resolved unlock condition of a claimant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeLockPredicate {
    /// Claimable at any time.
    Unconditional,
    /// Claimable at or after the instant.
    NotBefore(DateTime<Utc>),
    /// Shape without a single unlock instant.
    Unsupported,
}

impl TimeLockPredicate {
    /// Decode a raw ledger predicate.
    pub fn from_raw(raw: &RawPredicate) -> Self {
        if raw.unconditional == Some(true) && is_leaf(raw, |r| r.unconditional.is_some()) {
            return Self::Unconditional;
        }

        let Some(inner) = raw.not.as_deref() else {
            return Self::Unsupported;
        };
        if !is_leaf(raw, |r| r.not.is_some()) {
            return Self::Unsupported;
        }

        match absolute_before(inner) {
            Some(instant) => Self::NotBefore(instant),
            None => Self::Unsupported,
        }
    }

    /// `(instant, true)` when resolvable, `(epoch, false)` otherwise.
    pub fn resolve(&self) -> (DateTime<Utc>, bool) {
        match self {
            Self::Unconditional => (DateTime::<Utc>::UNIX_EPOCH, true),
            Self::NotBefore(t) => (*t, true),
            Self::Unsupported => (DateTime::<Utc>::UNIX_EPOCH, false),
        }
    }

    /// Unlock instant, if resolvable.
    pub fn unlock_at(&self) -> Option<DateTime<Utc>> {
        match self.resolve() {
            (t, true) => Some(t),
            _ => None,
        }
    }
}

/// Resolve the unlock instant for `address`.
///
/// When the address is listed more than once, the first record with a
/// resolvable predicate is used.
pub fn resolve_unlock_for(resource: &ClaimableResource, address: &Address) -> Result<DateTime<Utc>> {
    let mut claimants = resource.claimants_for(address).peekable();
    if claimants.peek().is_none() {
        return Err(CoreError::ClaimantNotFound(address.to_string()));
    }

    claimants
        .find_map(|c| TimeLockPredicate::from_raw(&c.predicate).unlock_at())
        .ok_or_else(|| CoreError::UnsupportedPredicate(address.to_string()))
}

/// True when `present` is the only populated field of `raw`.
fn is_leaf(raw: &RawPredicate, present: impl Fn(&RawPredicate) -> bool) -> bool {
    let populated = [
        raw.unconditional.is_some(),
        raw.not.is_some(),
        raw.and.is_some(),
        raw.or.is_some(),
        raw.abs_before.is_some() || raw.abs_before_epoch.is_some(),
        raw.rel_before.is_some(),
    ]
    .iter()
    .filter(|p| **p)
    .count();
    populated == 1 && present(raw)
}

fn absolute_before(raw: &RawPredicate) -> Option<DateTime<Utc>> {
    if !is_leaf(raw, |r| r.abs_before.is_some() || r.abs_before_epoch.is_some()) {
        return None;
    }
    if let Some(epoch) = raw.abs_before_epoch.as_deref() {
        let secs: i64 = epoch.trim().parse().ok()?;
        return DateTime::from_timestamp(secs, 0);
    }
    let text = raw.abs_before.as_deref()?;
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}
