//! Cluster lifecycle status, its state machine and the symbolic status codec.
//!
//! Status has two encodings that must stay separate:
//! - at rest (document store) it is the integer ordinal
//! - at the API boundary it is the quoted symbolic name, e.g. `"Running"`
//!
//! Reordering the variants is a backward-incompatible data-format change.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum::{EnumCount, EnumIter, FromRepr, IntoEnumIterator, IntoStaticStr};

use crate::{Error, Result};

/// Lifecycle state of a deployed cluster
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    EnumIter,
    EnumCount,
    FromRepr,
    IntoStaticStr,
)]
#[repr(u8)]
pub enum ClusterStatus {
    /// Install in progress
    #[default]
    Creating = 0,
    /// Teardown in progress
    Deleting = 1,
    /// In-place upgrade in progress
    Updating = 2,
    /// Steady-state healthy
    Running = 3,
    /// Degraded or unreachable
    Unavailable = 4,
    /// Tombstoned
    Deleted = 5,
}

impl ClusterStatus {
    /// Ordinal persisted in the document store
    #[must_use]
    pub const fn ordinal(self) -> u8 {
        self as u8
    }

    /// Decode a stored ordinal.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidStatus` for ordinals outside `0..=5`.
    pub fn from_ordinal(ordinal: i64) -> Result<Self> {
        u8::try_from(ordinal)
            .ok()
            .and_then(Self::from_repr)
            .ok_or_else(|| Error::invalid_status(format!("unknown status ordinal {ordinal}")))
    }

    /// Symbolic name used on the external API
    #[must_use]
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Statuses reachable from this one in a single step
    #[must_use]
    pub const fn allowed_transitions(self) -> &'static [Self] {
        match self {
            Self::Creating => &[Self::Running, Self::Unavailable, Self::Deleted],
            Self::Running => &[Self::Updating, Self::Unavailable, Self::Deleting],
            Self::Updating => &[Self::Running, Self::Unavailable, Self::Deleting],
            Self::Unavailable => &[Self::Running, Self::Deleting],
            Self::Deleting => &[Self::Deleted, Self::Unavailable],
            Self::Deleted => &[],
        }
    }

    /// Check whether a single-step transition to `next` is permitted
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_transitions().contains(&next)
    }

    /// Deleted is the only terminal state
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Deleted)
    }

    /// Active records take part in name lookups and uniqueness
    #[must_use]
    pub const fn is_active(self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for ClusterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ClusterStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::iter()
            .find(|status| status.name() == s)
            .ok_or_else(|| Error::invalid_status(s))
    }
}

impl Serialize for ClusterStatus {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for ClusterStatus {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Validate a status transition
///
/// Enforces the cluster lifecycle:
/// - Creating -> Running, Unavailable, Deleted
/// - Running -> Updating, Unavailable, Deleting
/// - Updating -> Running, Unavailable, Deleting
/// - Unavailable -> Running, Deleting
/// - Deleting -> Deleted, Unavailable
/// - Deleted is terminal
///
/// # Errors
///
/// Returns `Error::InvalidTransition` for any other pair.
pub fn validate_transition(from: ClusterStatus, to: ClusterStatus) -> Result<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(Error::InvalidTransition { from, to })
    }
}

/// Number of defined statuses
pub const STATUS_COUNT: usize = ClusterStatus::COUNT;

/// Render a status in its external form: the symbolic name in double quotes.
#[must_use]
pub fn encode_status(status: ClusterStatus) -> Vec<u8> {
    let name = status.name().as_bytes();
    let mut buffer = Vec::with_capacity(name.len() + 2);
    buffer.push(b'"');
    buffer.extend_from_slice(name);
    buffer.push(b'"');
    buffer
}

/// Parse the external form produced by [`encode_status`].
///
/// Matching is exact: no whitespace, no unquoted names, case-sensitive.
///
/// # Errors
///
/// Returns `Error::InvalidStatus` for anything but one of the six quoted names.
pub fn decode_status(data: &[u8]) -> Result<ClusterStatus> {
    data.strip_prefix(b"\"")
        .and_then(|rest| rest.strip_suffix(b"\""))
        .and_then(|inner| std::str::from_utf8(inner).ok())
        .and_then(|name| ClusterStatus::from_str(name).ok())
        .ok_or_else(|| Error::invalid_status(String::from_utf8_lossy(data).into_owned()))
}

/// Decode into an existing status slot.
///
/// # Errors
///
/// Returns `Error::NilTarget` when `target` is `None`, otherwise the errors of
/// [`decode_status`]. The target is left untouched on failure.
pub fn decode_status_into(target: Option<&mut ClusterStatus>, data: &[u8]) -> Result<()> {
    let slot = target.ok_or(Error::NilTarget)?;
    *slot = decode_status(data)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ClusterStatus::{Creating, Deleted, Deleting, Running, Unavailable, Updating};

    #[test]
    fn test_ordinals_are_fixed() {
        let ordinals: Vec<(u8, &str)> = ClusterStatus::iter()
            .map(|s| (s.ordinal(), s.name()))
            .collect();
        assert_eq!(
            ordinals,
            vec![
                (0, "Creating"),
                (1, "Deleting"),
                (2, "Updating"),
                (3, "Running"),
                (4, "Unavailable"),
                (5, "Deleted"),
            ]
        );
        assert_eq!(STATUS_COUNT, 6);
    }

    #[test]
    fn test_from_ordinal_rejects_out_of_range() {
        assert!(matches!(
            ClusterStatus::from_ordinal(6),
            Err(Error::InvalidStatus(_))
        ));
        assert!(matches!(
            ClusterStatus::from_ordinal(-1),
            Err(Error::InvalidStatus(_))
        ));
        assert!(matches!(ClusterStatus::from_ordinal(4), Ok(Unavailable)));
    }

    #[test]
    fn test_encode_running_is_nine_quoted_bytes() {
        let encoded = encode_status(Running);
        assert_eq!(encoded, b"\"Running\"".to_vec());
        assert_eq!(encoded.len(), 9);
    }

    #[test]
    fn test_decode_unavailable_to_ordinal_four() -> Result<()> {
        let status = decode_status(b"\"Unavailable\"")?;
        assert_eq!(status, Unavailable);
        assert_eq!(status.ordinal(), 4);
        Ok(())
    }

    #[test]
    fn test_decode_unknown_name_fails() {
        assert!(matches!(
            decode_status(b"\"Pending\""),
            Err(Error::InvalidStatus(_))
        ));
    }

    #[test]
    fn test_decode_is_strict_about_quoting() {
        for raw in [
            &b"Running"[..],
            b"\"running\"",
            b" \"Running\"",
            b"\"Running",
            b"\"\"",
            b"",
        ] {
            assert!(decode_status(raw).is_err(), "accepted {raw:?}");
        }
    }

    #[test]
    fn test_decode_into_nil_target() {
        assert!(matches!(
            decode_status_into(None, b"\"Running\""),
            Err(Error::NilTarget)
        ));
    }

    #[test]
    fn test_decode_into_leaves_target_on_error() -> Result<()> {
        let mut status = Creating;
        assert!(decode_status_into(Some(&mut status), b"\"Bogus\"").is_err());
        assert_eq!(status, Creating);

        decode_status_into(Some(&mut status), b"\"Deleting\"")?;
        assert_eq!(status, Deleting);
        Ok(())
    }

    #[test]
    fn test_transition_table() {
        let expected: &[(ClusterStatus, &[ClusterStatus])] = &[
            (Creating, &[Running, Unavailable, Deleted]),
            (Running, &[Updating, Unavailable, Deleting]),
            (Updating, &[Running, Unavailable, Deleting]),
            (Unavailable, &[Running, Deleting]),
            (Deleting, &[Deleted, Unavailable]),
            (Deleted, &[]),
        ];

        for (from, targets) in expected {
            for to in ClusterStatus::iter() {
                assert_eq!(
                    from.can_transition_to(to),
                    targets.contains(&to),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn test_no_self_transitions() {
        for status in ClusterStatus::iter() {
            assert!(validate_transition(status, status).is_err(), "{status}");
        }
    }

    #[test]
    fn test_deleted_is_terminal() {
        assert!(Deleted.is_terminal());
        assert!(!Deleted.is_active());
        assert!(ClusterStatus::iter()
            .filter(|s| *s != Deleted)
            .all(ClusterStatus::is_active));
    }

    #[test]
    fn test_serde_uses_symbolic_name() -> std::result::Result<(), serde_json::Error> {
        assert_eq!(serde_json::to_string(&Updating)?, "\"Updating\"");
        let parsed: ClusterStatus = serde_json::from_str("\"Deleted\"")?;
        assert_eq!(parsed, Deleted);
        assert!(serde_json::from_str::<ClusterStatus>("3").is_err());
        Ok(())
    }
}
