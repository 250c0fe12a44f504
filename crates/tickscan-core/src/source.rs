use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Canonical provider identifiers used in metadata and envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    /// Korea Exchange open API (local exchange).
    Krx,
    /// Global market-data provider.
    Yahoo,
    /// External fear/greed composite.
    AlternativeMe,
}

impl ProviderId {
    pub const ALL: [Self; 3] = [Self::Krx, Self::Yahoo, Self::AlternativeMe];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Krx => "krx",
            Self::Yahoo => "yahoo",
            Self::AlternativeMe => "alternative_me",
        }
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "krx" => Ok(Self::Krx),
            "yahoo" => Ok(Self::Yahoo),
            "alternative_me" | "alternative.me" => Ok(Self::AlternativeMe),
            other => Err(ValidationError::InvalidSource {
                value: other.to_owned(),
            }),
        }
    }
}
