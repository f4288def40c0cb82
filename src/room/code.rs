use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Alphabet room codes are drawn from. Codes are case-normalized to
/// uppercase, so `ab12cd` and `AB12CD` name the same room.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Fixed length of every room code.
pub const CODE_LEN: usize = 6;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidRoomCode {
    #[error("room code must be {CODE_LEN} characters, got {0}")]
    WrongLength(usize),

    #[error("room code contains invalid character {0:?}")]
    BadCharacter(char),
}

/// A validated room identifier.
///
/// The inner string is always exactly [`CODE_LEN`] uppercase alphanumeric
/// characters, so two codes compare equal regardless of how they were typed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Validates and normalizes a user-supplied code.
    pub fn parse(input: &str) -> Result<Self, InvalidRoomCode> {
        let trimmed = input.trim();
        if trimmed.chars().count() != CODE_LEN {
            return Err(InvalidRoomCode::WrongLength(trimmed.chars().count()));
        }
        for ch in trimmed.chars() {
            if !ch.is_ascii_alphanumeric() {
                return Err(InvalidRoomCode::BadCharacter(ch));
            }
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// Generates a random code. Uniqueness is the registry's concern, not
    /// ours; callers must check for collisions before committing a code.
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let code: String = (0..CODE_LEN)
            .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RoomCode {
    type Error = InvalidRoomCode;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
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
    use rstest::rstest;

    #[rstest]
    #[case("AB12CD")]
    #[case("ZZZZZZ")]
    #[case("000000")]
    #[case("abcdef")]
    #[case("  AB12CD  ")]
    fn test_parse_accepts_valid_codes(#[case] input: &str) {
        let code = RoomCode::parse(input).unwrap();
        assert_eq!(code.as_str().len(), CODE_LEN);
        assert_eq!(code.as_str(), code.as_str().to_ascii_uppercase());
    }

    #[rstest]
    #[case("")]
    #[case("AB12C")]
    #[case("AB12CDE")]
    #[case("AB 2CD")]
    #[case("AB12C!")]
    #[case("ÀB12CD")]
    fn test_parse_rejects_invalid_codes(#[case] input: &str) {
        assert!(RoomCode::parse(input).is_err());
    }

    #[test]
    fn test_parse_normalizes_case() {
        let lower = RoomCode::parse("ab12cd").unwrap();
        let upper = RoomCode::parse("AB12CD").unwrap();
        assert_eq!(lower, upper);
        assert_eq!(lower.as_str(), "AB12CD");
    }

    #[test]
    fn test_generated_codes_round_trip_through_parse() {
        for _ in 0..100 {
            let code = RoomCode::generate();
            let reparsed = RoomCode::parse(code.as_str()).unwrap();
            assert_eq!(code, reparsed);
        }
    }

    #[test]
    fn test_serde_round_trip() {
        let code = RoomCode::parse("AB12CD").unwrap();
        let json = serde_json::to_string(&code).unwrap();
        assert_eq!(json, "\"AB12CD\"");
        let back: RoomCode = serde_json::from_str(&json).unwrap();
        assert_eq!(code, back);
    }

    #[test]
    fn test_deserialize_rejects_malformed() {
        assert!(serde_json::from_str::<RoomCode>("\"nope\"").is_err());
    }
}
