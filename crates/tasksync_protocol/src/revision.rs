//! Server revision token.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Server-assigned revision of the whole list.
///
/// The server increments the revision on every accepted mutation. Clients echo
/// the last revision they saw on mutating requests so the server can reject
/// writes based on a stale view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(u64);

impl Revision {
    /// The sentinel revision held before any server response was seen.
    pub const INITIAL: Revision = Revision(0);

    /// Creates a revision from its numeric value.
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the numeric value.
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Returns the revision that follows this one, saturating at `u64::MAX`.
    pub const fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Returns the revision that follows this one, or `None` at `u64::MAX`.
    pub const fn checked_next(&self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(value) => Some(Self(value)),
            None => None,
        }
    }

    /// Returns true if this is the initial sentinel.
    pub const fn is_initial(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Revision {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

impl From<u64> for Revision {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_revision_is_zero() {
        assert_eq!(Revision::INITIAL.to_string(), "0");
        assert!(Revision::default().is_initial());
        assert!(!Revision::new(3).is_initial());
    }

    #[test]
    fn next_at_the_top_does_not_overflow() {
        let top = Revision::new(u64::MAX);
        assert_eq!(top.next(), top);
        assert_eq!(top.checked_next(), None);
        assert_eq!(Revision::new(7).checked_next(), Some(Revision::new(8)));
    }

    #[test]
    fn parse_from_header_value() {
        assert_eq!(" 42 ".parse::<Revision>().unwrap(), Revision::new(42));
        assert!("abc".parse::<Revision>().is_err());
    }

    #[test]
    fn serializes_as_plain_number() {
        let json = serde_json::to_string(&Revision::new(7)).unwrap();
        assert_eq!(json, "7");
        assert_eq!(Revision::new(7).next(), Revision::new(8));
    }
}
