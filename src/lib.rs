#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

extern crate gnss_rs as gnss;

pub mod cggtts;
pub mod constellation;
pub mod errors;
pub mod rinex;
pub mod series;


pub mod prelude {
    pub use crate::{
        cggtts::{
            CalibrationID, Cggtts, CggttsOptions, Column, ColumnLayout, CommonViewClass,
            Coordinates, Delay, FrequencyMode, Hardware, Header as CggttsHeader, MatchMode,
            MatchOptions, NamingConvention, ReferenceTime, SystemDelay, Track,
            Version as CggttsVersion,
        },
        constellation::{PrnRanges, SUPPORTED_CONSTELLATIONS},
        errors::{MatchingError, ParsingError},
        rinex::{
            Header as RinexHeader, MatchedEpoch, MatchedObservations, Rinex, RinexOptions,
            SystemObservations, Version as RinexVersion, MISSING,
        },
        series::Series,
    };

    pub use gnss::prelude::{Constellation, SV};
    pub use hifitime::prelude::{Duration, Epoch, TimeScale};
}
