//! Type-safe identifiers for contact records.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// The application's opaque per-contact token.
///
/// Generated by corral when a contact is first created and handed back to
/// callers as the stable public handle for the record. Stored on the vendor
/// side as an alternate identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContactToken(Uuid);

impl ContactToken {
    /// Generate a fresh random token.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a token from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID value.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Parse from a string representation.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl fmt::Display for ContactToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContactToken {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// The vendor-assigned primary identifier of a contact record.
///
/// Assigned by the contact-management vendor on creation; corral never
/// generates these, so the value is kept opaque rather than parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmailId(String);

impl EmailId {
    /// Wrap a vendor-assigned identifier.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Get the identifier value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmailId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EmailId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EmailId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_roundtrip() {
        let token = ContactToken::generate();
        let parsed = ContactToken::parse(&token.to_string()).unwrap();
        assert_eq!(token, parsed);
    }

    #[test]
    fn test_token_parse_rejects_garbage() {
        assert!(ContactToken::parse("not-a-uuid").is_err());
    }

    #[test]
    fn test_email_id_is_opaque() {
        let id = EmailId::new("332de237-cab7-4461-bcc3-48e68f42bd5c");
        assert_eq!(id.as_str(), "332de237-cab7-4461-bcc3-48e68f42bd5c");
        assert_eq!(id.to_string(), id.as_str());
    }

    #[test]
    fn test_token_serde_transparent() {
        let token = ContactToken::generate();
        let json = serde_json::to_string(&token).unwrap();
        assert_eq!(json, format!("\"{token}\""));
    }
}
