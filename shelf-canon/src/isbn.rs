//! ISBN normalization and format validation

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Rejected ISBN input (raw value as supplied)
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid ISBN format: {0:?}")]
pub struct InvalidIsbn(pub String);

/// A format-validated ISBN-10 or ISBN-13
///
/// Construction strips every non-alphanumeric character, then requires either
/// nine digits followed by a digit or `X`, or thirteen digits. Check digits are
/// not verified.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Isbn(String);

impl Isbn {
    pub fn parse(raw: &str) -> Result<Self, InvalidIsbn> {
        let stripped: String = raw.chars().filter(|c| c.is_ascii_alphanumeric()).collect();

        let valid = match stripped.len() {
            10 => {
                let (body, last) = stripped.split_at(9);
                body.chars().all(|c| c.is_ascii_digit())
                    && (matches!(last, "X" | "x") || last.chars().all(|c| c.is_ascii_digit()))
            }
            13 => stripped.chars().all(|c| c.is_ascii_digit()),
            _ => false,
        };

        if valid {
            Ok(Self(stripped.to_ascii_uppercase()))
        } else {
            Err(InvalidIsbn(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Isbn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Isbn {
    type Error = InvalidIsbn;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Isbn::parse(&value)
    }
}

impl From<Isbn> for String {
    fn from(isbn: Isbn) -> Self {
        isbn.0
    }
}
