//! Poll and question identifier generation
//!
//! Poll ids are short codes displayed in octal format so a teacher can
//! read them out loud to a classroom without ambiguity. Question ids
//! are opaque UUIDs, unique within their poll by construction.

use std::{fmt::Display, num::ParseIntError, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use uuid::Uuid;

/// Minimum value for generated poll ids (in octal: 10000)
const MIN_VALUE: u16 = 0o10_000;
/// Maximum value for generated poll ids (in octal: 100000)
const MAX_VALUE: u16 = 0o100_000;

/// A unique identifier for a poll
///
/// Poll ids are generated randomly within a range that always displays
/// as a 5-digit octal number for easy verbal communication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PollId(u16);

impl PollId {
    /// Creates a new random poll id
    pub fn new() -> Self {
        Self(fastrand::u16(MIN_VALUE..MAX_VALUE))
    }
}

impl Default for PollId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for PollId {
    /// Formats the poll id as a 5-digit octal number
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:05o}", self.0)
    }
}

impl Serialize for PollId {
    /// Serializes the poll id as an octal string
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PollId {
    /// Deserializes a poll id from an octal string
    fn deserialize<D>(deserializer: D) -> Result<PollId, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        PollId::from_str(&s).map_err(|e| serde::de::Error::custom(e.to_string()))
    }
}

impl FromStr for PollId {
    type Err = ParseIntError;

    /// Parses a poll id from its octal string representation
    ///
    /// # Errors
    ///
    /// Returns a `ParseIntError` if the string is not a valid octal
    /// number.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(u16::from_str_radix(s, 8)?))
    }
}

/// A unique identifier for a question within a poll
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct QuestionId(Uuid);

impl QuestionId {
    /// Creates a new random question id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for QuestionId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for QuestionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for QuestionId {
    type Err = uuid::Error;

    /// Parses a question id from a UUID string
    ///
    /// # Errors
    ///
    /// Returns a `uuid::Error` if the string is not a valid UUID.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_id_new_in_range() {
        for _ in 0..100 {
            let id = PollId::new();
            assert!(id.0 >= MIN_VALUE);
            assert!(id.0 < MAX_VALUE);
        }
    }

    #[test]
    fn test_poll_id_display_format() {
        assert_eq!(PollId(MIN_VALUE).to_string(), "10000");
        assert_eq!(PollId(MAX_VALUE - 1).to_string(), "77777");
    }

    #[test]
    fn test_poll_id_from_str() {
        assert_eq!(PollId::from_str("12345").unwrap(), PollId(0o12345));
        assert!(PollId::from_str("888").is_err()); // invalid octal digit
        assert!(PollId::from_str("").is_err());
    }

    #[test]
    fn test_poll_id_serialization_round_trip() {
        let id = PollId(0o12345);
        let serialized = serde_json::to_string(&id).unwrap();
        assert_eq!(serialized, "\"12345\"");

        let deserialized: PollId = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, id);
    }

    #[test]
    fn test_poll_id_deserialization_rejects_numbers() {
        let result: Result<PollId, _> = serde_json::from_str("123");
        assert!(result.is_err());
    }

    #[test]
    fn test_question_id_uniqueness() {
        let a = QuestionId::new();
        let b = QuestionId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_question_id_serialization_round_trip() {
        let id = QuestionId::new();
        let serialized = serde_json::to_string(&id).unwrap();
        let deserialized: QuestionId = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, id);
    }
}
