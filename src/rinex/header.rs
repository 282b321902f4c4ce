//! Observation RINEX header
use crate::{
    constellation::{from_marker, rinex2_bands, SUPPORTED_CONSTELLATIONS},
    errors::ParsingError,
    prelude::{Constellation, Epoch, TimeScale},
    rinex::{observation::SystemObservations, RinexOptions},
};

use log::{debug, info, warn};
use std::{collections::HashMap, str::FromStr};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Sampling interval assumed when the header does not declare one
pub const DEFAULT_INTERVAL_SECONDS: f64 = 30.0;

/// RINEX revision
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Version {
    pub major: u8,
    pub minor: u8,
}

impl FromStr for Version {
    type Err = ParsingError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.split_once('.') {
            Some((major, minor)) => Ok(Self {
                major: major.trim().parse::<u8>()?,
                minor: minor.trim().parse::<u8>().unwrap_or(0),
            }),
            None => Ok(Self {
                major: s.parse::<u8>()?,
                minor: 0,
            }),
        }
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}", self.major, self.minor)
    }
}

/// Record framing, resolved once from the header [Version].
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Framing {
    /// V2: satellites are listed within the epoch line (with continuations),
    /// observations follow in the header declaration order.
    Inline { codes: Vec<String> },
    /// V3: epochs start with a '>' marker and each satellite gets its own line.
    Marker,
}

/// Observation RINEX [Header]
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Header {
    /// RINEX [Version]
    pub version: Version,
    /// Declared satellite system, None for mixed files
    pub constellation: Option<Constellation>,
    /// Possible number of leap seconds
    pub leap_seconds: Option<i32>,
    /// Declared sampling interval in seconds
    pub interval: Option<f64>,
    /// Time of first observation
    pub time_of_first_obs: Option<Epoch>,
    /// Time system of the observations
    pub timescale: TimeScale,
    /// Midnight of the first observation day
    pub(crate) first_obs_day: Option<Epoch>,
    /// Declared observation types, per system (not allocated yet)
    pub(crate) observations: Vec<SystemObservations>,
    /// V2 observation codes, in declaration order
    pub(crate) v2_codes: Vec<String>,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            version: Version::default(),
            constellation: Some(Constellation::GPS),
            leap_seconds: None,
            interval: None,
            time_of_first_obs: None,
            timescale: TimeScale::GPST,
            first_obs_day: None,
            observations: Vec::new(),
            v2_codes: Vec::new(),
        }
    }
}

fn timescale(s: &str) -> TimeScale {
    match s.trim() {
        "GAL" => TimeScale::GST,
        "BDT" => TimeScale::BDT,
        "GLO" => TimeScale::UTC,
        _ => TimeScale::GPST,
    }
}

/// Returns the content of a fixed width field, possibly truncated.
pub(crate) fn field(line: &str, start: usize, end: usize) -> &str {
    let end = end.min(line.len());
    if start >= end {
        ""
    } else {
        line.get(start..end).unwrap_or("")
    }
}

impl Header {
    /// Sampling interval in seconds, [DEFAULT_INTERVAL_SECONDS] if not declared.
    pub fn sampling_interval(&self) -> f64 {
        self.interval.unwrap_or(DEFAULT_INTERVAL_SECONDS)
    }

    pub(crate) fn framing(&self) -> Framing {
        if self.version.major < 3 {
            Framing::Inline {
                codes: self.v2_codes.clone(),
            }
        } else {
            Framing::Marker
        }
    }

    /// Parses the [Header] section, consuming all lines up to "END OF HEADER".
    /// Declaring a system we do not support is fatal, unless
    /// [RinexOptions::skip_unsupported_systems] is set.
    pub fn parse<I: Iterator<Item = std::io::Result<String>>>(
        lines: &mut I,
        opts: &RinexOptions,
    ) -> Result<Self, ParsingError> {
        let mut header = Self::default();

        let mut terminated = false;
        let mut version_found = false;

        // V2: total number of codes and their content
        let mut v2_nb_codes = 0_usize;
        let mut v2_content = String::new();

        // V3: per system declarations, possibly wrapped
        let mut v3_current = Option::<char>::None;
        let mut v3_content = Vec::<(char, usize, String)>::new();

        for line in lines.by_ref() {
            let line = line?;
            let label = field(&line, 60, line.len()).trim();
            let content = field(&line, 0, 60);

            match label {
                "RINEX VERSION / TYPE" => {
                    header.version = Version::from_str(field(content, 0, 9))?;
                    if !field(content, 20, 21).eq("O") {
                        return Err(ParsingError::NotObservationRinex);
                    }
                    header.constellation = match field(content, 40, 41).chars().next() {
                        None | Some(' ') => Some(Constellation::GPS),
                        Some('M') | Some('m') => None,
                        Some(c) => Some(from_marker(c)?),
                    };
                    version_found = true;
                },
                "# / TYPES OF OBS" => {
                    let nb = field(content, 0, 6).trim();
                    if !nb.is_empty() {
                        v2_nb_codes = nb.parse::<usize>()?;
                    }
                    v2_content.push_str(field(content, 6, 60));
                    v2_content.push(' ');
                },
                "SYS / # / OBS TYPES" => {
                    let sys = field(content, 0, 1).chars().next().unwrap_or(' ');
                    if sys != ' ' {
                        let nb = field(content, 3, 6).trim().parse::<usize>()?;
                        v3_content.push((sys, nb, String::new()));
                        v3_current = Some(sys);
                    }
                    if v3_current.is_some() {
                        if let Some((_, _, codes)) = v3_content.last_mut() {
                            codes.push_str(field(content, 7, 60));
                            codes.push(' ');
                        }
                    }
                },
                "INTERVAL" => {
                    let interval = field(content, 0, 10).trim();
                    let seconds = f64::from_str(interval)?;
                    if !seconds.is_finite() || seconds <= 0.0 {
                        return Err(ParsingError::InvalidInterval(interval.to_string()));
                    }
                    header.interval = Some(seconds);
                },
                "LEAP SECONDS" => {
                    header.leap_seconds = Some(i32::from_str(field(content, 0, 6).trim())?);
                },
                "TIME OF FIRST OBS" => {
                    header.timescale = timescale(field(content, 48, 51));
                    let (first, day) = parse_first_obs(content, header.timescale)?;
                    header.time_of_first_obs = Some(first);
                    header.first_obs_day = Some(day);
                },
                "END OF HEADER" => {
                    terminated = true;
                    break;
                },
                _ => {},
            }
        }

        if !terminated {
            return Err(ParsingError::MissingHeaderSection);
        }
        if !version_found {
            return Err(ParsingError::MissingHeaderField("RINEX VERSION / TYPE"));
        }
        if header.interval.is_none() {
            info!(
                "no sampling interval declared: assuming {} s",
                DEFAULT_INTERVAL_SECONDS
            );
        }

        if header.version.major < 3 {
            header.declare_v2_codes(&v2_content, v2_nb_codes);
        } else {
            header.declare_v3_codes(&v3_content, opts.skip_unsupported_systems)?;
        }

        if header.observations.is_empty() {
            return Err(ParsingError::MissingObservationTypes(
                header.constellation.unwrap_or(Constellation::Mixed),
            ));
        }
        Ok(header)
    }

    /// V2 codes are not declared per system: a code belongs to a system
    /// when its frequency band digit is valid for that system.
    fn declare_v2_codes(&mut self, content: &str, nb_codes: usize) {
        let codes = content
            .split_ascii_whitespace()
            .take(nb_codes)
            .map(|c| c.to_string())
            .collect::<Vec<_>>();

        let candidates = match self.constellation {
            Some(constellation) => vec![constellation],
            None => SUPPORTED_CONSTELLATIONS.to_vec(),
        };

        let mut map = HashMap::<Constellation, SystemObservations>::new();

        for code in codes.iter() {
            let band = code.chars().nth(1);
            let mut used = false;
            for constellation in candidates.iter() {
                if let Some(band) = band {
                    if rinex2_bands(*constellation).contains(&band) {
                        map.entry(*constellation)
                            .or_insert_with(|| SystemObservations::new(*constellation))
                            .push_code(code);
                        used = true;
                    }
                }
            }
            if !used {
                info!("ignoring unrecognized observation code \"{}\"", code);
            }
        }

        self.v2_codes = codes;
        for constellation in candidates {
            if let Some(obs) = map.remove(&constellation) {
                self.observations.push(obs);
            }
        }
    }

    fn declare_v3_codes(
        &mut self,
        content: &[(char, usize, String)],
        skip_unsupported: bool,
    ) -> Result<(), ParsingError> {
        for (sys, nb, codes) in content.iter() {
            let constellation = match from_marker(*sys) {
                Ok(c) => c,
                Err(e) => {
                    if skip_unsupported && "JSI".contains(*sys) {
                        warn!("{} observations are not supported: skipped", sys);
                        continue;
                    }
                    return Err(e);
                },
            };
            let mut obs = SystemObservations::new(constellation);
            for code in codes.split_ascii_whitespace().take(*nb) {
                obs.push_code(code);
            }
            if obs.codes().len() != *nb {
                debug!(
                    "{}: {} observation codes declared, {} found",
                    constellation,
                    nb,
                    obs.codes().len()
                );
            }
            self.observations.push(obs);
        }
        Ok(())
    }
}

/// Returns time of first observation and midnight of that day
fn parse_first_obs(content: &str, ts: TimeScale) -> Result<(Epoch, Epoch), ParsingError> {
    let y = i32::from_str(field(content, 0, 6).trim())?;
    let m = u8::from_str(field(content, 6, 12).trim())?;
    let d = u8::from_str(field(content, 12, 18).trim())?;
    let hh = u8::from_str(field(content, 18, 24).trim())?;
    let mm = u8::from_str(field(content, 24, 30).trim())?;
    let secs = f64::from_str(field(content, 30, 43).trim())?;
    let ns = ((secs - secs.floor()) * 1.0E9).round() as u32;
    let invalid = |_| ParsingError::InvalidEpoch(content.trim().to_string());
    let first = Epoch::maybe_from_gregorian(y, m, d, hh, mm, secs.floor() as u8, ns, ts)
        .map_err(invalid)?;
    let day = Epoch::maybe_from_gregorian(y, m, d, 0, 0, 0, 0, ts).map_err(invalid)?;
    Ok((first, day))
}

#[cfg(test)]
mod test {
    use super::*;

    fn lines(content: &str) -> impl Iterator<Item = std::io::Result<String>> + '_ {
        content.lines().map(|l| Ok(l.to_string()))
    }

    #[test]
    fn version() {
        let v = Version::from_str("     2.11").unwrap();
        assert_eq!(v, Version { major: 2, minor: 11 });
        assert_eq!(v.to_string(), "2.11");
        let v = Version::from_str("3.04").unwrap();
        assert_eq!(v.major, 3);
        assert!(Version::from_str("abc").is_err());
    }

    #[test]
    fn v2_mixed_header() {
        let content = format!(
            "{:<60}{}\n{:<60}{}\n{:<60}{}\n{:<60}{}\n{:<60}{}\n",
            "     2.11           OBSERVATION DATA    M (MIXED)",
            "RINEX VERSION / TYPE",
            "     5    C1    L1    P2    L2    C7",
            "# / TYPES OF OBS",
            "    18",
            "LEAP SECONDS",
            "  2021     1     1     0     0    0.0000000     GPS",
            "TIME OF FIRST OBS",
            "",
            "END OF HEADER"
        );
        let header = Header::parse(&mut lines(&content), &RinexOptions::default()).unwrap();
        assert_eq!(header.version.major, 2);
        assert_eq!(header.constellation, None);
        assert_eq!(header.leap_seconds, Some(18));
        assert_eq!(
            header.time_of_first_obs,
            Some(Epoch::from_gregorian_at_midnight(2021, 1, 1, TimeScale::GPST))
        );
        assert_eq!(header.interval, None);
        assert_eq!(header.sampling_interval(), 30.0);
        assert_eq!(header.v2_codes.len(), 5);
        assert_eq!(
            header.framing(),
            Framing::Inline {
                codes: header.v2_codes.clone()
            }
        );

        let gps = header
            .observations
            .iter()
            .find(|obs| obs.constellation == Constellation::GPS)
            .unwrap();
        assert_eq!(gps.codes(), &["C1", "L1", "P2", "L2"]);

        let gal = header
            .observations
            .iter()
            .find(|obs| obs.constellation == Constellation::Galileo)
            .unwrap();
        assert_eq!(gal.codes(), &["C1", "L1", "C7"]);

        let bds = header
            .observations
            .iter()
            .find(|obs| obs.constellation == Constellation::BeiDou)
            .unwrap();
        assert_eq!(bds.codes(), &["C1", "L1", "P2", "L2", "C7"]);
    }

    #[test]
    fn v3_wrapped_declarations() {
        let content = format!(
            "{:<60}{}\n{:<60}{}\n{:<60}{}\n{:<60}{}\n{:<60}{}\n{:<60}{}\n",
            "     3.04           OBSERVATION DATA    M",
            "RINEX VERSION / TYPE",
            "G   16 C1C L1C D1C S1C C1W S1W C2W L2W D2W S2W C2L L2L D2L",
            "SYS / # / OBS TYPES",
            "       S2L C5Q L5Q",
            "SYS / # / OBS TYPES",
            "E    4 C1C L1C C5Q L5Q",
            "SYS / # / OBS TYPES",
            "    30.000",
            "INTERVAL",
            "",
            "END OF HEADER"
        );
        let header = Header::parse(&mut lines(&content), &RinexOptions::default()).unwrap();
        assert_eq!(header.framing(), Framing::Marker);
        assert_eq!(header.sampling_interval(), 30.0);
        assert_eq!(header.observations.len(), 2);
        let gps = &header.observations[0];
        assert_eq!(gps.codes().len(), 16);
        assert_eq!(gps.column_of("L5Q"), Some(15));
        let gal = &header.observations[1];
        assert_eq!(gal.column_of("C5Q"), Some(2));
    }

    #[test]
    fn unknown_system() {
        let content = format!(
            "{:<60}{}\n{:<60}{}\n",
            "     3.04           OBSERVATION DATA    X",
            "RINEX VERSION / TYPE",
            "",
            "END OF HEADER"
        );
        assert!(matches!(
            Header::parse(&mut lines(&content), &RinexOptions::default()),
            Err(ParsingError::UnknownConstellation(_))
        ));
    }

    #[test]
    fn unterminated_header() {
        let content = format!(
            "{:<60}{}\n",
            "     3.04           OBSERVATION DATA    G", "RINEX VERSION / TYPE",
        );
        assert!(matches!(
            Header::parse(&mut lines(&content), &RinexOptions::default()),
            Err(ParsingError::MissingHeaderSection)
        ));
    }

    fn v3_header(descriptors: &[(&str, &str)]) -> String {
        let mut content = format!(
            "{:<60}{}\n",
            "     3.04           OBSERVATION DATA    M", "RINEX VERSION / TYPE"
        );
        for (descriptor, label) in descriptors.iter() {
            content.push_str(&format!("{:<60}{}\n", descriptor, label));
        }
        content.push_str(&format!("{:<60}{}\n", "", "END OF HEADER"));
        content
    }

    #[test]
    fn invalid_interval() {
        for interval in ["     0.000", "    -1.000", "       inf", "       NaN"] {
            let content = v3_header(&[
                ("G    1 C1C", "SYS / # / OBS TYPES"),
                (interval, "INTERVAL"),
            ]);
            match Header::parse(&mut lines(&content), &RinexOptions::default()) {
                Err(ParsingError::InvalidInterval(value)) => assert_eq!(value, interval.trim()),
                other => panic!("unexpected result for \"{}\": {:?}", interval, other),
            };
        }
        let content = v3_header(&[
            ("G    1 C1C", "SYS / # / OBS TYPES"),
            ("     0.050", "INTERVAL"),
        ]);
        let header = Header::parse(&mut lines(&content), &RinexOptions::default()).unwrap();
        assert_eq!(header.sampling_interval(), 0.05);
    }

    #[test]
    fn invalid_time_of_first_obs() {
        let content = v3_header(&[
            ("G    1 C1C", "SYS / # / OBS TYPES"),
            (
                "  2021    13    21     0     0    0.0000000     GPS",
                "TIME OF FIRST OBS",
            ),
        ]);
        assert!(matches!(
            Header::parse(&mut lines(&content), &RinexOptions::default()),
            Err(ParsingError::InvalidEpoch(_))
        ));
        let content = v3_header(&[
            ("G    1 C1C", "SYS / # / OBS TYPES"),
            (
                "  2021     2    30     0     0    0.0000000     GPS",
                "TIME OF FIRST OBS",
            ),
        ]);
        assert!(matches!(
            Header::parse(&mut lines(&content), &RinexOptions::default()),
            Err(ParsingError::InvalidEpoch(_))
        ));
    }

    #[test]
    fn unsupported_systems() {
        for sys in ["J", "S", "I"] {
            let declaration = format!("{}    1 C1C", sys);
            let content = v3_header(&[
                ("G    1 C1C", "SYS / # / OBS TYPES"),
                (declaration.as_str(), "SYS / # / OBS TYPES"),
            ]);
            match Header::parse(&mut lines(&content), &RinexOptions::default()) {
                Err(ParsingError::UnknownConstellation(marker)) => assert_eq!(marker, sys),
                other => panic!("unexpected result for {}: {:?}", sys, other),
            }

            let opts = RinexOptions::default().with_unsupported_systems_skipped(true);
            let header = Header::parse(&mut lines(&content), &opts).unwrap();
            assert_eq!(header.observations.len(), 1);
            assert_eq!(header.observations[0].constellation, Constellation::GPS);
        }

        // tolerance does not extend to unknown markers
        let content = v3_header(&[
            ("G    1 C1C", "SYS / # / OBS TYPES"),
            ("X    1 C1C", "SYS / # / OBS TYPES"),
        ]);
        let opts = RinexOptions::default().with_unsupported_systems_skipped(true);
        assert!(matches!(
            Header::parse(&mut lines(&content), &opts),
            Err(ParsingError::UnknownConstellation(_))
        ));
    }
}
