use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Surrogate document ID.
///
/// 24 lowercase hex characters: 4 bytes of seconds since the Unix epoch
/// followed by 8 random bytes. IDs generated later sort after earlier ones
/// at second resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn generate() -> Self {
        let secs = Utc::now().timestamp().clamp(0, u32::MAX as i64) as u32;
        let tail: [u8; 8] = rand::random();
        let mut hex = format!("{secs:08x}");
        for byte in tail {
            hex.push_str(&format!("{byte:02x}"));
        }
        Self(hex)
    }

    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_24_hex_chars() {
        let id = DocumentId::generate();
        assert_eq!(id.as_str().len(), 24);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generated_ids_differ() {
        let a = DocumentId::generate();
        let b = DocumentId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = DocumentId::from_hex("65a0000000000000000000ff");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"65a0000000000000000000ff\"");
    }
}
