use crate::prelude::TimeScale;
use scan_fmt::scan_fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Reference Time System, against which REFSYS is measured
#[derive(Clone, PartialEq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ReferenceTime {
    /// TAI: Temps Atomic International
    TAI,
    /// UTC: Universal Coordinate Time
    #[default]
    UTC,
    /// UTC(k) laboratory local copy
    UTCk(String),
    /// Custom Reference time system
    Custom(String),
}

impl ReferenceTime {
    /// [TimeScale] in which track dates (MJD, STTIME) are expressed.
    /// Local UTC copies and custom references are treated as UTC.
    pub fn timescale(&self) -> TimeScale {
        match self {
            Self::TAI => TimeScale::TAI,
            _ => TimeScale::UTC,
        }
    }
}

impl std::str::FromStr for ReferenceTime {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let lower = s.to_lowercase();
        if lower.eq("tai") {
            Ok(Self::TAI)
        } else if lower.eq("utc") {
            Ok(Self::UTC)
        } else if let Some(lab) = scan_fmt!(s, "UTC({})", String) {
            Ok(Self::UTCk(lab.trim().to_string()))
        } else {
            Ok(Self::Custom(s.to_string()))
        }
    }
}

impl std::fmt::Display for ReferenceTime {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::TAI => fmt.write_str("TAI"),
            Self::UTC => fmt.write_str("UTC"),
            Self::UTCk(lab) => write!(fmt, "UTC({})", lab),
            Self::Custom(s) => fmt.write_str(s),
        }
    }
}
