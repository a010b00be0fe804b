use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, TrylensError};

/// Correlation identifier for one trace-capture session: a 128-bit value
/// rendered as 32 lowercase hex characters. Minted once per sampled unit of
/// work and read-only everywhere else.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TryId(String);

impl TryId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn parse(input: &str) -> Result<Self> {
        if input.len() != 32 || !input.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TrylensError::InvalidArgument(format!(
                "invalid try id: {input}"
            )));
        }
        Ok(Self(input.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_lowercases() {
        let id = TryId::parse("4BF92F3577B34DA6A3CE929D0E0E4736").unwrap();
        assert_eq!(id.as_str(), "4bf92f3577b34da6a3ce929d0e0e4736");
    }

    #[test]
    fn rejects_bad_ids() {
        assert!(TryId::parse("abc").is_err());
        assert!(TryId::parse("zzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzz").is_err());
        assert!(TryId::parse("").is_err());
    }

    #[test]
    fn generated_ids_are_valid_and_unique() {
        let a = TryId::generate();
        let b = TryId::generate();
        assert_ne!(a, b);
        assert!(TryId::parse(a.as_str()).is_ok());
    }
}
