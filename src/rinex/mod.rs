//! Observation RINEX (V2 and V3)
mod header;
mod matching;
mod observation;
mod parsing;

pub use header::{Header, Version, DEFAULT_INTERVAL_SECONDS};
pub use matching::{MatchedEpoch, MatchedObservations};
pub use observation::{SystemObservations, MISSING};

use crate::{
    constellation::{PrnRanges, SUPPORTED_CONSTELLATIONS},
    errors::ParsingError,
    prelude::{Constellation, Duration, Epoch},
};

use parsing::Record;

use std::{
    collections::HashMap,
    fs::File,
    io::{BufRead, BufReader, Read},
    path::Path,
};

#[cfg(feature = "flate2")]
use flate2::read::GzDecoder;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// [Rinex] parsing options
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RinexOptions {
    /// Emit a notice every 1000 parsed epochs
    pub show_progress: bool,
    /// Highest PRN accepted per [Constellation]
    pub prn_ranges: PrnRanges,
    /// Skip QZSS, SBAS and IRNSS declarations instead of failing.
    /// Their record lines are then ignored.
    pub skip_unsupported_systems: bool,
}

impl RinexOptions {
    /// Returns new [RinexOptions] with progress notices enabled or not
    pub fn with_progress(&self, show_progress: bool) -> Self {
        let mut s = *self;
        s.show_progress = show_progress;
        s
    }

    /// Returns new [RinexOptions] with desired [PrnRanges]
    pub fn with_prn_ranges(&self, prn_ranges: PrnRanges) -> Self {
        let mut s = *self;
        s.prn_ranges = prn_ranges;
        s
    }

    /// Returns new [RinexOptions] that skip (or not) the
    /// satellite systems we do not support.
    pub fn with_unsupported_systems_skipped(&self, skip: bool) -> Self {
        let mut s = *self;
        s.skip_unsupported_systems = skip;
        s
    }
}

/// [Rinex] is a parsed Observation RINEX: general information
/// and one [SystemObservations] cube per [Constellation].
/// Epochs are expressed in seconds since the day of first observation,
/// and share their index with the first axis of every cube.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Rinex {
    /// [Header] section
    pub header: Header,
    epochs: Vec<f64>,
    observations: HashMap<Constellation, SystemObservations>,
    prn_ranges: PrnRanges,
}

impl Rinex {
    #[cfg(test)]
    pub(crate) fn from_parts(
        header: Header,
        epochs: Vec<f64>,
        observations: HashMap<Constellation, SystemObservations>,
        prn_ranges: PrnRanges,
    ) -> Self {
        Self {
            header,
            epochs,
            observations,
            prn_ranges,
        }
    }

    /// Parses [Rinex] from a local file.
    /// ```
    /// use cvmatch::prelude::{Constellation, Rinex, RinexOptions};
    ///
    /// let rinex = Rinex::from_file("data/rinex/BRUX00BEL.rnx", &RinexOptions::default())
    ///     .unwrap();
    ///
    /// assert_eq!(rinex.header.version.major, 3);
    /// assert!(rinex.has_observation(Constellation::GPS, "C1C"));
    /// assert!(rinex.has_observation(Constellation::Galileo, "C1C"));
    ///
    /// assert!(Rinex::from_file("data/rinex/NOPE00XXX.rnx", &RinexOptions::default()).is_err());
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P, opts: &RinexOptions) -> Result<Self, ParsingError> {
        let name = path.as_ref().to_string_lossy().to_string();
        let fd = File::open(path).map_err(|e| ParsingError::from(e).within(&name))?;
        let mut reader = BufReader::new(fd);
        Self::parse(&mut reader, opts).map_err(|e| e.within(&name))
    }

    /// Parses [Rinex] from a gzip compressed local file.
    #[cfg(feature = "flate2")]
    #[cfg_attr(docsrs, doc(cfg(feature = "flate2")))]
    pub fn from_gzip_file<P: AsRef<Path>>(
        path: P,
        opts: &RinexOptions,
    ) -> Result<Self, ParsingError> {
        let name = path.as_ref().to_string_lossy().to_string();
        let fd = File::open(path).map_err(|e| ParsingError::from(e).within(&name))?;
        let mut reader = BufReader::new(GzDecoder::new(fd));
        Self::parse(&mut reader, opts).map_err(|e| e.within(&name))
    }

    /// Parses [Rinex] from any [Read]able interface.
    /// This fails on any structural error: no partial dataset is returned.
    pub fn parse<R: Read>(
        reader: &mut BufReader<R>,
        opts: &RinexOptions,
    ) -> Result<Self, ParsingError> {
        let mut lines = reader.lines();
        let header = Header::parse(&mut lines, opts)?;

        let mut record = Record::new(&header, opts.prn_ranges)?;
        record.parse(&header, &mut lines, opts.show_progress)?;
        record.purge();

        Ok(Self {
            header,
            epochs: record.epochs,
            observations: record.observations,
            prn_ranges: opts.prn_ranges,
        })
    }

    /// Epochs, in seconds since the day of first observation,
    /// sorted and without duplicates.
    pub fn epochs(&self) -> &[f64] {
        &self.epochs
    }

    /// Converts epoch at this index to [Epoch]. Requires the
    /// time of first observation to be declared.
    pub fn epoch(&self, index: usize) -> Option<Epoch> {
        let seconds = self.epochs.get(index)?;
        let day = self.header.first_obs_day?;
        Some(day + Duration::from_seconds(*seconds))
    }

    /// Returns [PrnRanges] used when parsing
    pub fn prn_ranges(&self) -> PrnRanges {
        self.prn_ranges
    }

    /// Constellations present in this file
    pub fn constellations(&self) -> Vec<Constellation> {
        SUPPORTED_CONSTELLATIONS
            .iter()
            .filter(|c| self.observations.contains_key(*c))
            .copied()
            .collect()
    }

    /// Observation cube of this [Constellation]
    pub fn observations(&self, constellation: Constellation) -> Option<&SystemObservations> {
        self.observations.get(&constellation)
    }

    /// Returns true if this observation code was declared
    /// for this [Constellation].
    pub fn has_observation(&self, constellation: Constellation, code: &str) -> bool {
        self.observations
            .get(&constellation)
            .map(|obs| obs.has_observation(code))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn content() -> String {
        let mut content = String::new();
        for (descriptor, label) in [
            (
                "     3.04           OBSERVATION DATA    G",
                "RINEX VERSION / TYPE",
            ),
            ("G    2 C1C L1C", "SYS / # / OBS TYPES"),
            ("    30.000", "INTERVAL"),
            (
                "  2021    12    21     0     0    0.0000000     GPS",
                "TIME OF FIRST OBS",
            ),
            ("", "END OF HEADER"),
        ]
        .iter()
        {
            content.push_str(&format!("{:<60}{}\n", descriptor, label));
        }
        for line in [
            "> 2021 12 21 00 00  0.0000000  0  2",
            "G01  20000000.000   105000000.125",
            "G02  21000000.000",
            "> 2021 12 21 00 00 30.0000000  0  1",
            "G01  20000001.000",
            "> 2021 12 21 00 01  0.0000000  0  1",
            "G03",
        ]
        .iter()
        {
            content.push_str(line);
            content.push('\n');
        }
        content
    }

    #[test]
    fn parse_v3() {
        let content = content();
        let mut reader = BufReader::new(content.as_bytes());
        let rinex = Rinex::parse(&mut reader, &RinexOptions::default()).unwrap();

        assert_eq!(rinex.header.version.major, 3);
        assert_eq!(rinex.header.interval, Some(30.0));
        assert_eq!(rinex.constellations(), vec![Constellation::GPS]);
        assert!(rinex.has_observation(Constellation::GPS, "C1C"));
        assert!(rinex.has_observation(Constellation::GPS, "L1C"));
        assert!(!rinex.has_observation(Constellation::GPS, "C2W"));
        assert!(!rinex.has_observation(Constellation::Galileo, "C1C"));

        // last epoch is empty and purged
        assert_eq!(rinex.epochs(), &[0.0, 30.0]);

        let gps = rinex.observations(Constellation::GPS).unwrap();
        assert_eq!(gps.nb_epochs(), 2);
        assert_eq!(gps.nb_satellites(), 32);
        assert_eq!(gps.value(0, 0, 0), 20000000.0);
        assert_eq!(gps.value(0, 0, 1), 105000000.125);
        assert_eq!(gps.value(0, 1, 0), 21000000.0);
        assert_eq!(gps.value(0, 1, 1), MISSING);
        assert_eq!(gps.value(1, 0, 0), 20000001.0);

        let t0 = Epoch::from_gregorian_at_midnight(2021, 12, 21, crate::prelude::TimeScale::GPST);
        assert_eq!(rinex.epoch(1), Some(t0 + Duration::from_seconds(30.0)));
        assert_eq!(rinex.epoch(2), None);
    }

    #[test]
    fn options() {
        let opts = RinexOptions::default()
            .with_progress(true)
            .with_prn_ranges(PrnRanges::default().with_max_prn(Constellation::GPS, 12));
        assert!(opts.show_progress);

        let content = content();
        let mut reader = BufReader::new(content.as_bytes());
        let rinex = Rinex::parse(&mut reader, &opts).unwrap();
        let gps = rinex.observations(Constellation::GPS).unwrap();
        assert_eq!(gps.nb_satellites(), 12);
    }

    #[test]
    fn invalid_header_fields() {
        let opts = RinexOptions::default();
        let content = content().replace("    30.000", "     0.000");
        let mut reader = BufReader::new(content.as_bytes());
        assert!(matches!(
            Rinex::parse(&mut reader, &opts),
            Err(ParsingError::InvalidInterval(_))
        ));

        let content = self::content().replace("  2021    12    21", "  2021    13    21");
        let mut reader = BufReader::new(content.as_bytes());
        assert!(matches!(
            Rinex::parse(&mut reader, &opts),
            Err(ParsingError::InvalidEpoch(_))
        ));
    }

    #[test]
    fn unsupported_systems() {
        let content = content().replace(
            &format!("{:<60}{}\n", "G    2 C1C L1C", "SYS / # / OBS TYPES"),
            &format!(
                "{:<60}{}\n{:<60}{}\n",
                "G    2 C1C L1C", "SYS / # / OBS TYPES", "J    1 C1C", "SYS / # / OBS TYPES"
            ),
        );
        let content = content.replace("G02  21000000.000", "J02  21000000.000");

        let mut reader = BufReader::new(content.as_bytes());
        assert!(matches!(
            Rinex::parse(&mut reader, &RinexOptions::default()),
            Err(ParsingError::UnknownConstellation(_))
        ));

        let opts = RinexOptions::default().with_unsupported_systems_skipped(true);
        assert!(opts.skip_unsupported_systems);
        let mut reader = BufReader::new(content.as_bytes());
        let rinex = Rinex::parse(&mut reader, &opts).unwrap();
        assert_eq!(rinex.constellations(), vec![Constellation::GPS]);
        assert_eq!(rinex.epochs(), &[0.0, 30.0]);
        let gps = rinex.observations(Constellation::GPS).unwrap();
        assert_eq!(gps.value(0, 0, 0), 20000000.0);
        assert_eq!(gps.value(0, 1, 0), MISSING);
    }

    #[test]
    fn missing_file() {
        let opts = RinexOptions::default();
        match Rinex::from_file("/this/does/not/exist.rnx", &opts) {
            Err(ParsingError::File { path, source }) => {
                assert_eq!(path, "/this/does/not/exist.rnx");
                assert!(matches!(*source, ParsingError::IoError(_)));
            },
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
