//! Tag payload validation.
//!
//! A student tag carries the literal prefix `SID` followed by the student
//! number. The check runs on the payload with surrounding whitespace trimmed;
//! the prefix is case-sensitive and the number must be non-empty ASCII digits.

use std::fmt;

use serde::Serialize;

/// Literal prefix of every student tag.
pub const STUDENT_TAG_PREFIX: &str = "SID";

/// Why a payload was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum TagFormatError {
    /// The payload does not start with `SID`.
    #[error("payload does not start with \"SID\"")]
    MissingPrefix,

    /// Nothing follows the prefix.
    #[error("payload has no student number after \"SID\"")]
    EmptyStudentId,

    /// The student number contains a non-digit character.
    #[error("student number contains a non-digit character")]
    NonDigitStudentId,
}

/// A student number taken from a valid tag payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct StudentId(String);

impl StudentId {
    /// Validates `payload` and extracts the student number.
    ///
    /// # Errors
    ///
    /// Returns the first [`TagFormatError`] the trimmed payload violates.
    pub fn from_payload(payload: &str) -> Result<Self, TagFormatError> {
        let digits = payload
            .trim()
            .strip_prefix(STUDENT_TAG_PREFIX)
            .ok_or(TagFormatError::MissingPrefix)?;

        if digits.is_empty() {
            return Err(TagFormatError::EmptyStudentId);
        }
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TagFormatError::NonDigitStudentId);
        }

        Ok(Self(digits.to_string()))
    }

    /// The student number as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Returns `true` if `payload` is a well-formed student tag.
#[must_use]
pub fn is_valid_payload(payload: &str) -> bool {
    StudentId::from_payload(payload).is_ok()
}
