//! CGGTTS track line decoding
use crate::{
    cggtts::{
        layout::{Column, ColumnLayout, Field},
        CommonViewClass,
    },
    constellation::{from_marker, marker},
    prelude::{Constellation, SV},
};

use std::str::FromStr;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// DSG value of a track that could not be fitted
pub const DSG_SENTINEL: f64 = 9999.0;

/// MSIO value of a track without ionospheric measurement
pub const MSIO_SENTINEL: f64 = 9999.0;

/// SMSI value of a track without ionospheric measurement
pub const SMSI_SENTINEL: f64 = 999.0;

/// ISG value of a track without ionospheric measurement
pub const ISG_SENTINEL: f64 = 999.0;

#[derive(Error, Debug, PartialEq)]
pub enum Error {
    #[error("invalid track format")]
    InvalidFormat,
    #[error("invalid sttime field format")]
    InvalidTrkTimeFormat,
    #[error("unknown common view class")]
    UnknownClass,
    #[error("failed to parse \"{0}\" field")]
    FieldParsing(String),
    #[error("missing \"{0}\" field")]
    MissingField(String),
    #[error("unknown satellite system \"{0}\"")]
    UnknownSystem(String),
}

/// A [Track] is one CGGTTS measurement: one satellite,
/// observed during one tracking interval.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Track {
    /// Tracked satellite
    pub sv: SV,
    /// Common View Class
    pub class: CommonViewClass,
    /// Carrier frequency code (V2E only)
    pub frc: Option<String>,
    /// Numerical columns, stored as described by the [ColumnLayout]
    values: Vec<f64>,
}

/// Converts a "hhmmss" field to seconds of day
pub(crate) fn sttime_seconds(sttime: &str) -> Result<u32, Error> {
    let digits = sttime.as_bytes();
    if digits.len() != 6 || !digits.iter().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidTrkTimeFormat);
    }
    let d = |i: usize| (digits[i] - b'0') as u32;
    Ok((d(0) * 10 + d(1)) * 3600 + (d(2) * 10 + d(3)) * 60 + d(4) * 10 + d(5))
}

impl Track {
    /// Decodes one track line, as described by this [ColumnLayout].
    pub(crate) fn parse(line: &str, layout: &ColumnLayout) -> Result<Self, Error> {
        let items = line.split_ascii_whitespace().collect::<Vec<_>>();
        let fields = layout.fields();

        if items.len() > fields.len() {
            return Err(Error::InvalidFormat);
        }
        if let Some(missing) = fields.get(items.len()) {
            return Err(Error::MissingField(field_name(missing, layout)));
        }

        let mut sv = SV::default();
        let mut class = CommonViewClass::default();
        let mut frc = None;
        let mut values = Vec::with_capacity(layout.columns().len());

        for (field, item) in fields.iter().zip(items.iter()) {
            match field {
                Field::Satellite => sv = parse_sv(item, layout)?,
                Field::Class => class = CommonViewClass::from_str(item)?,
                Field::Value(Column::StTime) => values.push(sttime_seconds(item)? as f64),
                Field::Value(column) => {
                    let value = f64::from_str(item)
                        .map_err(|_| Error::FieldParsing(column.to_string()))?;
                    values.push(value);
                },
                Field::Frc => frc = Some(item.to_string()),
                Field::Checksum => {
                    // checksum is not verified
                    u8::from_str_radix(item, 16)
                        .map_err(|_| Error::FieldParsing("CK".to_string()))?;
                },
            }
        }

        Ok(Self {
            sv,
            class,
            frc,
            values,
        })
    }

    /// Reads this column through the [ColumnLayout] this [Track] was decoded with.
    pub fn value(&self, layout: &ColumnLayout, column: Column) -> Option<f64> {
        layout
            .index(column)
            .and_then(|index| self.values.get(index))
            .copied()
    }

    /// Numerical columns, in [ColumnLayout] storage order
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// (MJD, STTIME in seconds of day) of this [Track]
    pub(crate) fn epoch_key(&self, layout: &ColumnLayout) -> (u32, u32) {
        let mjd = self.value(layout, Column::Mjd).unwrap_or_default();
        let sttime = self.value(layout, Column::StTime).unwrap_or_default();
        (mjd as u32, sttime as u32)
    }

    /// Ordering key within one epoch: PRN first
    pub(crate) fn sv_key(&self) -> (u8, char) {
        (self.sv.prn, marker(self.sv.constellation))
    }

    /// Full ordering key: (MJD, STTIME, PRN, system)
    pub(crate) fn key(&self, layout: &ColumnLayout) -> (u32, u32, u8, char) {
        let (mjd, sttime) = self.epoch_key(layout);
        let (prn, system) = self.sv_key();
        (mjd, sttime, prn, system)
    }

    /// Returns true if this [Track] carries one of the invalid
    /// measurement markers: DSG, or any of the ionospheric
    /// columns when the layout has them.
    pub fn is_bad(&self, layout: &ColumnLayout) -> bool {
        let is = |column: Column, sentinel: f64| self.value(layout, column) == Some(sentinel);
        is(Column::Dsg, DSG_SENTINEL)
            || is(Column::Msio, MSIO_SENTINEL)
            || is(Column::Smsi, SMSI_SENTINEL)
            || is(Column::Isg, ISG_SENTINEL)
    }
}

fn field_name(field: &Field, layout: &ColumnLayout) -> String {
    match field {
        Field::Satellite => {
            if layout.version().has_satellite_system() {
                "SAT".to_string()
            } else {
                "PRN".to_string()
            }
        },
        Field::Class => "CL".to_string(),
        Field::Value(column) => column.to_string(),
        Field::Frc => "FRC".to_string(),
        Field::Checksum => "CK".to_string(),
    }
}

/// V2E identifies satellites as "G05", older revisions are GPS only.
fn parse_sv(item: &str, layout: &ColumnLayout) -> Result<SV, Error> {
    if !layout.version().has_satellite_system() {
        let prn = u8::from_str(item).map_err(|_| Error::FieldParsing("PRN".to_string()))?;
        return Ok(SV::new(Constellation::GPS, prn));
    }
    let mut chars = item.chars();
    let constellation = chars
        .next()
        .and_then(|c| from_marker(c).ok())
        .ok_or_else(|| Error::UnknownSystem(item.to_string()))?;
    let prn = u8::from_str(chars.as_str().trim())
        .map_err(|_| Error::FieldParsing("SAT".to_string()))?;
    Ok(SV::new(constellation, prn))
}
