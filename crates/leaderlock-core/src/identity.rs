//! Lock holder identity
//!
//! An identity is a random 128-bit token minted once per locker. Its text
//! form (lowercase hyphenated UUID, 36 characters) is what gets stored as
//! the lock value, so it must round-trip exactly.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique token a locker uses to claim and verify lock ownership
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(Uuid);

impl Identity {
    /// Mint a new random (v4) identity
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// The all-zero identity. Never equal to a generated one.
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Parse a raw stored lock value
    pub fn from_value(value: &[u8]) -> Result<Self, uuid::Error> {
        Uuid::try_parse_ascii(value).map(Self)
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self::generate()
    }
}

impl From<Uuid> for Identity {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl Display for Identity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for Identity {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}
