//! Transit card numbers.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// Exactly sixteen ASCII digits. `\d` would also admit other Unicode digits.
static CARD_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{16}$").expect("card pattern is valid"));

/// A validated 16-digit card number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CardNumber(String);

/// Input that is not a 16-digit card number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidCard;

impl fmt::Display for InvalidCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "card number must be exactly 16 digits")
    }
}

impl std::error::Error for InvalidCard {}

impl CardNumber {
    /// Trims surrounding whitespace, then checks for exactly 16 digits.
    pub fn parse(input: &str) -> Result<Self, InvalidCard> {
        let trimmed = input.trim();
        if CARD_PATTERN.is_match(trimmed) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(InvalidCard)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last four digits, for log lines.
    pub fn masked(&self) -> String {
        format!("****{}", &self.0[12..])
    }
}

impl fmt::Display for CardNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
