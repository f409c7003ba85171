//! Username value object.
//!
//! A username is what a session binds to on LOGIN and what the roster lists in
//! WHOISIN payloads. Because WHOISIN joins names with `,`, a name must never
//! contain one.

use std::fmt;

use thiserror::Error;

/// Maximum number of characters in a username
pub const MAX_USERNAME_LENGTH: usize = 32;

/// Character separating usernames in a WHOISIN payload
pub const ROSTER_SEPARATOR: char = ',';

/// Username validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsernameError {
    /// Username is empty after trimming
    #[error("username must not be empty")]
    Empty,

    /// Username exceeds the maximum length
    #[error("username is too long ({actual} chars, max {max})")]
    TooLong { max: usize, actual: usize },

    /// Username contains a character that cannot travel in a roster payload
    #[error("username contains invalid character {0:?}")]
    InvalidCharacter(char),
}

/// Validated chat username
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Username(String);

impl Username {
    /// Create a new username, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns `UsernameError` when the trimmed value is empty, longer than
    /// [`MAX_USERNAME_LENGTH`] characters, or contains `,` or a control character.
    pub fn new(value: impl Into<String>) -> Result<Self, UsernameError> {
        let value = value.into();
        let trimmed = value.trim();

        if trimmed.is_empty() {
            return Err(UsernameError::Empty);
        }

        let length = trimmed.chars().count();
        if length > MAX_USERNAME_LENGTH {
            return Err(UsernameError::TooLong {
                max: MAX_USERNAME_LENGTH,
                actual: length,
            });
        }

        if let Some(c) = trimmed
            .chars()
            .find(|c| *c == ROSTER_SEPARATOR || c.is_control())
        {
            return Err(UsernameError::InvalidCharacter(c));
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Username {
    type Error = UsernameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Username {
    type Error = UsernameError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl PartialEq<str> for Username {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Username {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}
