use crate::errors::ParsingError;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// CGGTTS file revision
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Eq, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Version {
    /// GGTTS V1 (1994), GPS only
    Version1,
    /// CGGTTS V2 (2001)
    Version2,
    /// CGGTTS V2E (2014), multi constellation
    #[default]
    Version2E,
}

impl Version {
    /// Returns true if tracks carry an explicit satellite system
    pub fn has_satellite_system(&self) -> bool {
        *self == Self::Version2E
    }
}

impl std::str::FromStr for Version {
    type Err = ParsingError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" | "01" => Ok(Self::Version1),
            "02" => Ok(Self::Version2),
            "2E" | "2e" => Ok(Self::Version2E),
            other => Err(ParsingError::NonSupportedRevision(other.to_string())),
        }
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Version1 => write!(f, "01"),
            Self::Version2 => write!(f, "02"),
            Self::Version2E => write!(f, "2E"),
        }
    }
}
