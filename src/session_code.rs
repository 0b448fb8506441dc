//! Session code generation and parsing
//!
//! Session codes are short strings of uppercase letters and digits that
//! students type (or scan) to join a quiz. Parsing is case-insensitive so
//! a code typed in lowercase still finds its session.

use std::{fmt::Display, str::FromStr};

use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;

use crate::constants::session::CODE_LENGTH;

/// Characters a session code is drawn from
const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// A unique identifier for a quiz session
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, SerializeDisplay, DeserializeFromStr,
)]
pub struct SessionCode([u8; CODE_LENGTH]);

impl SessionCode {
    /// Creates a new random session code
    pub fn new() -> Self {
        let mut code = [0; CODE_LENGTH];
        for byte in &mut code {
            *byte = ALPHABET[fastrand::usize(..ALPHABET.len())];
        }
        Self(code)
    }

    /// Returns the code as a string slice
    pub fn as_str(&self) -> &str {
        // only ASCII bytes from ALPHABET are ever stored
        std::str::from_utf8(&self.0).unwrap_or_default()
    }
}

impl Default for SessionCode {
    /// Creates a new random session code (same as `new()`)
    fn default() -> Self {
        Self::new()
    }
}

impl Display for SessionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur when parsing a session code
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// The code does not have exactly `CODE_LENGTH` characters
    #[error("session code must be {CODE_LENGTH} characters long")]
    Length,
    /// The code contains something other than letters and digits
    #[error("session code may only contain letters and digits")]
    Character,
}

impl FromStr for SessionCode {
    type Err = ParseError;

    /// Parses a session code, accepting lowercase letters
    ///
    /// # Errors
    ///
    /// Returns a `ParseError` if the string has the wrong length or contains
    /// characters outside of `[A-Za-z0-9]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != CODE_LENGTH {
            return Err(ParseError::Length);
        }

        let mut code = [0; CODE_LENGTH];
        for (slot, byte) in code.iter_mut().zip(s.bytes()) {
            if !byte.is_ascii_alphanumeric() {
                return Err(ParseError::Character);
            }
            *slot = byte.to_ascii_uppercase();
        }

        Ok(Self(code))
    }
}
