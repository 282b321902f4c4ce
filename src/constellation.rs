//! Satellite systems supported by both parsers,
//! and their PRN ranges.
use crate::{
    errors::ParsingError,
    prelude::{Constellation, SV},
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Constellations we know how to parse and match
pub const SUPPORTED_CONSTELLATIONS: [Constellation; 4] = [
    Constellation::GPS,
    Constellation::Glonass,
    Constellation::Galileo,
    Constellation::BeiDou,
];

/// Decodes a one letter satellite system marker.
pub(crate) fn from_marker(marker: char) -> Result<Constellation, ParsingError> {
    match marker.to_ascii_uppercase() {
        'G' => Ok(Constellation::GPS),
        'R' => Ok(Constellation::Glonass),
        'E' => Ok(Constellation::Galileo),
        'C' => Ok(Constellation::BeiDou),
        _ => Err(ParsingError::UnknownConstellation(marker.to_string())),
    }
}

/// One letter marker of a supported [Constellation]
pub(crate) fn marker(constellation: Constellation) -> char {
    match constellation {
        Constellation::Glonass => 'R',
        Constellation::Galileo => 'E',
        Constellation::BeiDou => 'C',
        _ => 'G',
    }
}

/// Frequency band digits (second character of an observation code)
/// that are valid for this [Constellation] in RINEX V2 files,
/// where observation types are not declared per system.
pub(crate) fn rinex2_bands(constellation: Constellation) -> &'static [char] {
    match constellation {
        Constellation::Glonass => &['1', 'A', '2', 'D'],
        Constellation::Galileo => &['1', '5', '6', '7', '8'],
        Constellation::BeiDou => &['1', '2', '6', '7'],
        _ => &['1', 'A', 'B', '2', 'C', '5'],
    }
}

/// [PrnRanges] defines the highest PRN number we accept,
/// for each [Constellation]. It also sizes the satellite
/// axis of the observation cubes.
///
/// BeiDou is defined up to PRN 64 by default (BDS-3 vehicles),
/// restrict it to 32 for legacy setups:
/// ```
/// use cvmatch::prelude::{Constellation, PrnRanges};
///
/// let ranges = PrnRanges::default()
///     .with_max_prn(Constellation::BeiDou, 32);
///
/// assert_eq!(ranges.max_prn(Constellation::BeiDou), 32);
/// assert_eq!(ranges.max_prn(Constellation::GPS), 32);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PrnRanges {
    gps: u8,
    glonass: u8,
    galileo: u8,
    beidou: u8,
}

impl Default for PrnRanges {
    fn default() -> Self {
        Self {
            gps: 32,
            glonass: 32,
            galileo: 32,
            beidou: 64,
        }
    }
}

impl PrnRanges {
    /// Returns highest PRN accepted for this [Constellation]
    pub fn max_prn(&self, constellation: Constellation) -> u8 {
        match constellation {
            Constellation::GPS => self.gps,
            Constellation::Glonass => self.glonass,
            Constellation::Galileo => self.galileo,
            Constellation::BeiDou => self.beidou,
            _ => 0,
        }
    }

    /// Returns new [PrnRanges] with desired highest PRN for this [Constellation].
    pub fn with_max_prn(&self, constellation: Constellation, max_prn: u8) -> Self {
        let mut s = *self;
        match constellation {
            Constellation::GPS => s.gps = max_prn,
            Constellation::Glonass => s.glonass = max_prn,
            Constellation::Galileo => s.galileo = max_prn,
            Constellation::BeiDou => s.beidou = max_prn,
            _ => {},
        }
        s
    }

    /// Returns true if this [SV] fits within its constellation range
    pub fn contains(&self, sv: SV) -> bool {
        sv.prn > 0 && sv.prn <= self.max_prn(sv.constellation)
    }

    /// Index of this [SV] on the satellite axis, if it is in range.
    pub(crate) fn slot(&self, sv: SV) -> Option<usize> {
        if self.contains(sv) {
            Some((sv.prn - 1) as usize)
        } else {
            None
        }
    }
}
