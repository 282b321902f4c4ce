//! Parsing and matching errors
use thiserror::Error;

use crate::{
    cggtts::{track::Error as TrackError, Column},
    prelude::Constellation,
};

/// Errors strictly related to file parsing.
/// All of them are fatal: the dataset being loaded is not returned.
#[derive(Debug, Error)]
pub enum ParsingError {
    #[error("file i/o error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("failed to parse integer number")]
    ParseIntError(#[from] std::num::ParseIntError),
    #[error("failed to parse float number")]
    ParseFloatError(#[from] std::num::ParseFloatError),
    #[error("invalid version")]
    VersionFormat,
    #[error("non supported file revision \"{0}\"")]
    NonSupportedRevision(String),
    #[error("RINEX V{0} can't be parsed by this parser")]
    RinexVersionMismatch(u8),
    #[error("not an observation RINEX")]
    NotObservationRinex,
    #[error("unknown satellite system \"{0}\"")]
    UnknownConstellation(String),
    #[error("missing \"{0}\" in RINEX header")]
    MissingHeaderField(&'static str),
    #[error("header section is not terminated")]
    MissingHeaderSection,
    #[error("no observation types declared for {0}")]
    MissingObservationTypes(Constellation),
    #[error("epoch record is missing its \">\" marker: \"{0}\"")]
    MissingEpochMarker(String),
    #[error("invalid epoch description: \"{0}\"")]
    InvalidEpoch(String),
    #[error("invalid sampling interval: \"{0}\"")]
    InvalidInterval(String),
    #[error("observations cannot be allocated before their types are known")]
    UndefinedObservationTypes,
    #[error("invalid calibration id")]
    InvalidCalibrationId,
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("file layout differs from previously loaded files")]
    LayoutMismatch,
    #[error("track parsing error")]
    TrackParsing(#[from] TrackError),
    #[error("\"{path}\": {source}")]
    File {
        path: String,
        #[source]
        source: Box<ParsingError>,
    },
}

impl ParsingError {
    /// Attaches the offending file path to this error.
    pub(crate) fn within(self, path: &str) -> Self {
        Self::File {
            path: path.to_string(),
            source: Box::new(self),
        }
    }
}

/// Errors related to dataset matching and post processing.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MatchingError {
    #[error("missing {code} observation for {constellation}")]
    MissingObservation {
        constellation: Constellation,
        code: String,
    },
    #[error("no {0} observations")]
    MissingConstellation(Constellation),
    #[error("{0} column is not available in this layout")]
    MissingColumn(Column),
}
