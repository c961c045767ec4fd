use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Mnemonics indexed by [`RobotsMode::as_index`]
pub const ROBOTS_MODE_STRINGS: [&str; RobotsMode::COUNT] = ["ignore", "obey", "seed"];

/// How robots.txt exclusions influence expansion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RobotsMode {
    /// Expand everything regardless of robots.txt
    #[default]
    Ignore,
    /// Suppress tasks under disallowed prefixes
    Obey,
    /// Use disallowed prefixes as additional candidates
    Seed,
}

impl RobotsMode {
    pub const COUNT: usize = 3;

    pub const ALL: [RobotsMode; RobotsMode::COUNT] =
        [RobotsMode::Ignore, RobotsMode::Obey, RobotsMode::Seed];

    pub fn as_index(self) -> usize {
        match self {
            RobotsMode::Ignore => 0,
            RobotsMode::Obey => 1,
            RobotsMode::Seed => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn as_str(self) -> &'static str {
        ROBOTS_MODE_STRINGS[self.as_index()]
    }

    /// Exact mnemonic lookup; unknown text maps to no mode
    pub fn from_mnemonic(text: &str) -> Option<Self> {
        ROBOTS_MODE_STRINGS
            .iter()
            .position(|m| *m == text)
            .and_then(Self::from_index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown robots mode '{0}' (expected one of: ignore, obey, seed)")]
pub struct UnknownRobotsMode(pub String);

impl FromStr for RobotsMode {
    type Err = UnknownRobotsMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_mnemonic(s.trim()).ok_or_else(|| UnknownRobotsMode(s.to_string()))
    }
}

impl fmt::Display for RobotsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for RobotsMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RobotsMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
