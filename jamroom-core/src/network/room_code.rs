//! Room Code Generation and Parsing
//!
//! Generates short, human-friendly codes that identify a room on the relay.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Characters used when generating room codes (unambiguous, uppercase)
/// Excludes: 0/O, 1/I/L, 5/S, 2/Z to avoid confusion
const ALPHABET: &[u8] = b"346789ABCDEFGHJKMNPQRTUVWXY";

/// Room code length (6 chars = ~387 million combinations with 27-char alphabet)
pub const CODE_LENGTH: usize = 6;

/// A room code that can be shared to join a room
///
/// Codes are compared case-insensitively: every constructor stores the
/// uppercase form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Generate a random room code using cryptographically secure RNG
    pub fn random() -> Self {
        use rand::Rng;
        let mut rng = rand::thread_rng();

        let mut code = String::with_capacity(CODE_LENGTH);
        for _ in 0..CODE_LENGTH {
            let idx = rng.gen_range(0..ALPHABET.len());
            code.push(ALPHABET[idx] as char);
        }
        RoomCode(code)
    }

    /// Get the room code as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse a room code from user input or a request path
    ///
    /// Strips separators, normalizes to uppercase and validates the length.
    /// Any ASCII alphanumeric is accepted so codes issued by older relays
    /// (hex based) still parse.
    pub fn parse(input: &str) -> Option<Self> {
        let normalized: String = input
            .chars()
            .filter(|c| !matches!(c, '-' | ' ' | '_'))
            .map(|c| c.to_ascii_uppercase())
            .collect();

        if normalized.len() != CODE_LENGTH {
            return None;
        }

        if normalized.bytes().all(|b| b.is_ascii_alphanumeric()) {
            Some(RoomCode(normalized))
        } else {
            None
        }
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RoomCode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        RoomCode::parse(&value).ok_or_else(|| format!("invalid room code: {value:?}"))
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_code_parse() {
        let code = RoomCode::parse("ABC-123").unwrap();
        assert_eq!(code.as_str(), "ABC123");

        let code = RoomCode::parse("abc 123").unwrap();
        assert_eq!(code.as_str(), "ABC123");

        assert!(RoomCode::parse("BOGUS").is_none()); // Too short
        assert!(RoomCode::parse("ABCDEFG").is_none()); // Too long (7 chars)
        assert!(RoomCode::parse("ABC!23").is_none());
    }

    #[test]
    fn test_room_code_case_insensitive() {
        assert_eq!(RoomCode::parse("xk7mq9"), RoomCode::parse("XK7MQ9"));
    }

    #[test]
    fn test_random_code() {
        let code1 = RoomCode::random();
        let code2 = RoomCode::random();
        // Very unlikely to be equal
        assert_ne!(code1, code2);
        assert_eq!(code1.as_str().len(), CODE_LENGTH);
        assert_eq!(RoomCode::parse(code1.as_str()), Some(code1));
    }

    #[test]
    fn test_serde_roundtrip_normalizes() {
        let code: RoomCode = serde_json::from_str("\"ab-c123\"").unwrap();
        assert_eq!(code.as_str(), "ABC123");
        assert_eq!(serde_json::to_string(&code).unwrap(), "\"ABC123\"");
        assert!(serde_json::from_str::<RoomCode>("\"nope\"").is_err());
    }
}
