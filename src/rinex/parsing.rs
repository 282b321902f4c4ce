//! Observation RINEX record parsing
use crate::{
    constellation::{from_marker, PrnRanges},
    errors::ParsingError,
    prelude::{Constellation, Epoch, SV},
    rinex::{
        header::{field, Framing, Header},
        observation::{SystemObservations, MISSING},
    },
};

use log::{debug, info, warn};
use std::{collections::HashMap, str::FromStr};

/// Width of one observation field
const OBSERVATION_WIDTH: usize = 16;

/// Width of the numerical part of one observation field
const VALUE_WIDTH: usize = 14;

/// Maximal number of satellites described per V2 epoch line
const V2_SATELLITES_PER_LINE: usize = 12;

/// Maximal number of observations per V2 line
const V2_OBSERVATIONS_PER_LINE: usize = 5;

/// Initial capacity, as a fraction of one day
const CAPACITY_DAY_RATIO: f64 = 1.01;

/// Upper bound of the initial capacity (one day at 10 s).
/// Cubes grow beyond it on demand.
const MAX_INITIAL_EPOCHS: usize = 8640;

/// Epoch description, prior to satellite content
struct EpochLine {
    /// Seconds since the reference day start
    seconds: f64,
    /// Event flag
    flag: u8,
    /// Number of satellites (or special records)
    nb_sat: usize,
}

/// Record being built, epoch after epoch.
pub(crate) struct Record {
    /// Epochs, in seconds, aligned with the first axis of every cube
    pub epochs: Vec<f64>,
    /// Observation cubes
    pub observations: HashMap<Constellation, SystemObservations>,
    prn_ranges: PrnRanges,
    /// File system, used when V2 satellite identifier is blank
    default_constellation: Constellation,
    /// Reference day start for V3 multi day accumulation
    reference_day: Option<Epoch>,
}

impl Record {
    /// Allocates all cubes declared in the [Header].
    pub fn new(header: &Header, prn_ranges: PrnRanges) -> Result<Self, ParsingError> {
        let capacity = (86400.0 * CAPACITY_DAY_RATIO / header.sampling_interval()).ceil();
        let capacity = if capacity.is_finite() && capacity > 0.0 {
            (capacity as usize).min(MAX_INITIAL_EPOCHS)
        } else {
            MAX_INITIAL_EPOCHS
        };
        let mut observations = HashMap::new();
        for obs in header.observations.iter() {
            let mut obs = obs.clone();
            let nb_sat = prn_ranges.max_prn(obs.constellation) as usize;
            obs.allocate(capacity, nb_sat)?;
            observations.insert(obs.constellation, obs);
        }
        Ok(Self {
            epochs: Vec::with_capacity(capacity),
            observations,
            prn_ranges,
            default_constellation: header.constellation.unwrap_or(Constellation::GPS),
            reference_day: header.first_obs_day,
        })
    }

    /// Index of this epoch on the first axis. Repeated epochs share their index.
    /// Epochs are stored in file order: matching expects them to increase.
    fn epoch_index(&mut self, seconds: f64) -> usize {
        if let Some(last) = self.epochs.last() {
            if *last == seconds {
                return self.epochs.len() - 1;
            }
            if seconds < *last {
                warn!(
                    "epoch {} s goes backwards (previous: {} s): matching will skip it",
                    seconds, last
                );
            }
        }
        self.epochs.push(seconds);
        self.epochs.len() - 1
    }

    /// Identifies a satellite, returns its cube and satellite slot
    /// when we are interested in it.
    fn locate(&self, sv: &str) -> Result<Option<(Constellation, usize)>, ParsingError> {
        let mut chars = sv.chars();
        let constellation = match chars.next() {
            Some(' ') | None => self.default_constellation,
            Some(c) => match from_marker(c) {
                Ok(c) => c,
                Err(_) => {
                    if c.is_ascii_alphabetic() {
                        debug!("{}: satellite system not tracked, skipped", sv.trim());
                        return Ok(None);
                    }
                    return Err(ParsingError::UnknownConstellation(sv.to_string()));
                },
            },
        };
        let prn = u8::from_str(chars.as_str().trim())?;
        if !self.observations.contains_key(&constellation) {
            return Ok(None);
        }
        match self.prn_ranges.slot(SV::new(constellation, prn)) {
            Some(slot) => Ok(Some((constellation, slot))),
            None => {
                warn!("{}{:02}: PRN out of range", constellation, prn);
                Ok(None)
            },
        }
    }

    /// Stores one observation field.
    fn store(
        &mut self,
        epoch: usize,
        constellation: Constellation,
        slot: usize,
        column: usize,
        content: &str,
    ) -> Result<(), ParsingError> {
        let value = content.trim();
        if value.is_empty() {
            return Ok(());
        }
        let value = f64::from_str(value)?;
        if let Some(obs) = self.observations.get_mut(&constellation) {
            obs.insert(epoch, slot, column, value);
        }
        Ok(())
    }

    /// Removes epochs for which no satellite reported anything,
    /// on the time axis and every cube alike.
    pub fn purge(&mut self) {
        let mask = (0..self.epochs.len())
            .map(|i| self.observations.values().any(|obs| !obs.is_epoch_empty(i)))
            .collect::<Vec<_>>();

        let purged = mask.iter().filter(|keep| !**keep).count();
        if purged > 0 {
            debug!("purging {} empty epochs", purged);
        }

        let mut index = 0;
        self.epochs.retain(|_| {
            let keep = mask[index];
            index += 1;
            keep
        });
        for obs in self.observations.values_mut() {
            obs.retain_epochs(&mask);
        }
    }

    /// Consumes all epochs.
    pub fn parse<I: Iterator<Item = std::io::Result<String>>>(
        &mut self,
        header: &Header,
        lines: &mut I,
        show_progress: bool,
    ) -> Result<(), ParsingError> {
        match header.framing() {
            Framing::Inline { codes } => self.parse_v2(header, &codes, lines, show_progress),
            Framing::Marker => self.parse_v3(header, lines, show_progress),
        }
    }

    fn progress(&self, show_progress: bool) {
        if show_progress && self.epochs.len() % 1000 == 0 && !self.epochs.is_empty() {
            info!("{} epochs parsed", self.epochs.len());
        }
    }

    pub(crate) fn parse_v2<I: Iterator<Item = std::io::Result<String>>>(
        &mut self,
        header: &Header,
        codes: &[String],
        lines: &mut I,
        show_progress: bool,
    ) -> Result<(), ParsingError> {
        if header.version.major >= 3 {
            return Err(ParsingError::RinexVersionMismatch(header.version.major));
        }

        // observation code position => (system, column)
        let columns = self
            .observations
            .values()
            .map(|obs| {
                let map = codes
                    .iter()
                    .map(|code| obs.column_of(code))
                    .collect::<Vec<_>>();
                (obs.constellation, map)
            })
            .collect::<HashMap<_, _>>();

        let lines_per_sat = codes.len().div_euclid(V2_OBSERVATIONS_PER_LINE)
            + usize::from(codes.len() % V2_OBSERVATIONS_PER_LINE != 0);

        while let Some(line) = lines.next() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let epoch = parse_v2_epoch(&line)?;

            if (2..=5).contains(&epoch.flag) {
                // special records
                for _ in 0..epoch.nb_sat {
                    lines.next();
                }
                continue;
            }

            // satellites list, with continuations
            let mut satellites = Vec::with_capacity(epoch.nb_sat);
            let mut content = field(&line, 32, 68).to_string();
            loop {
                for i in 0..V2_SATELLITES_PER_LINE {
                    if satellites.len() == epoch.nb_sat {
                        break;
                    }
                    let sv = field(&content, i * 3, i * 3 + 3);
                    satellites.push(sv.to_string());
                }
                if satellites.len() == epoch.nb_sat {
                    break;
                }
                match lines.next() {
                    Some(line) => content = field(&line?, 32, 68).to_string(),
                    None => return Err(ParsingError::InvalidEpoch(line.to_string())),
                }
            }

            // flag 6: cycle slips, same layout but not stored
            let store = epoch.flag <= 1;
            let index = if store {
                Some(self.epoch_index(epoch.seconds))
            } else {
                None
            };

            for sv in satellites.iter() {
                let located = self.locate(sv)?;
                for nth_line in 0..lines_per_sat {
                    let content = match lines.next() {
                        Some(content) => content?,
                        None => return Err(ParsingError::InvalidEpoch(line.to_string())),
                    };
                    let (index, (constellation, slot)) = match (index, located) {
                        (Some(index), Some(located)) => (index, located),
                        _ => continue,
                    };
                    for i in 0..V2_OBSERVATIONS_PER_LINE {
                        let position = nth_line * V2_OBSERVATIONS_PER_LINE + i;
                        let column = match columns
                            .get(&constellation)
                            .and_then(|map| map.get(position))
                        {
                            Some(Some(column)) => *column,
                            _ => continue,
                        };
                        let start = i * OBSERVATION_WIDTH;
                        let value = field(&content, start, start + VALUE_WIDTH);
                        self.store(index, constellation, slot, column, value)?;
                    }
                }
            }
            if store {
                self.progress(show_progress);
            }
        }
        Ok(())
    }

    pub(crate) fn parse_v3<I: Iterator<Item = std::io::Result<String>>>(
        &mut self,
        header: &Header,
        lines: &mut I,
        show_progress: bool,
    ) -> Result<(), ParsingError> {
        if header.version.major < 3 {
            return Err(ParsingError::RinexVersionMismatch(header.version.major));
        }

        while let Some(line) = lines.next() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            if !line.starts_with('>') {
                return Err(ParsingError::MissingEpochMarker(line));
            }

            let epoch = self.parse_v3_epoch(&line, header)?;

            if (2..=5).contains(&epoch.flag) {
                for _ in 0..epoch.nb_sat {
                    lines.next();
                }
                continue;
            }

            let index = if epoch.flag <= 1 {
                Some(self.epoch_index(epoch.seconds))
            } else {
                None
            };

            for _ in 0..epoch.nb_sat {
                let content = match lines.next() {
                    Some(content) => content?,
                    None => return Err(ParsingError::InvalidEpoch(line.to_string())),
                };
                let index = match index {
                    Some(index) => index,
                    None => continue,
                };
                let (constellation, slot) = match self.locate(field(&content, 0, 3))? {
                    Some(located) => located,
                    None => continue,
                };
                let nb_codes = self
                    .observations
                    .get(&constellation)
                    .map(|obs| obs.codes().len())
                    .unwrap_or(0);

                // trailing blank fields are usually trimmed. Rounded up, unlike
                // the usual floor((len - 3) / 16), which would drop a last value
                // written without its LLI and SSI flags.
                let nb_fields = content.len().saturating_sub(3);
                let nb_fields = (nb_fields + OBSERVATION_WIDTH - 1) / OBSERVATION_WIDTH;

                for column in 0..nb_fields.min(nb_codes) {
                    let start = 3 + column * OBSERVATION_WIDTH;
                    let value = field(&content, start, start + VALUE_WIDTH);
                    self.store(index, constellation, slot, column, value)?;
                }
            }

            if index.is_some() {
                self.progress(show_progress);
            }
        }
        Ok(())
    }

    /// Parses a V3 epoch line. Epochs are expressed with respect to
    /// the day of first observation, so several days may accumulate.
    fn parse_v3_epoch(&mut self, line: &str, header: &Header) -> Result<EpochLine, ParsingError> {
        let invalid = || ParsingError::InvalidEpoch(line.to_string());

        let y = i32::from_str(field(line, 1, 6).trim()).map_err(|_| invalid())?;
        let m = u8::from_str(field(line, 6, 9).trim()).map_err(|_| invalid())?;
        let d = u8::from_str(field(line, 9, 12).trim()).map_err(|_| invalid())?;
        let hh = u8::from_str(field(line, 12, 15).trim()).map_err(|_| invalid())?;
        let mm = u8::from_str(field(line, 15, 18).trim()).map_err(|_| invalid())?;
        let ss = f64::from_str(field(line, 18, 29).trim()).map_err(|_| invalid())?;
        let flag = u8::from_str(field(line, 29, 32).trim()).map_err(|_| invalid())?;
        let nb_sat = usize::from_str(field(line, 32, 35).trim()).map_err(|_| invalid())?;

        let day = Epoch::maybe_from_gregorian(y, m, d, 0, 0, 0, 0, header.timescale)
            .map_err(|_| invalid())?;
        let reference = *self.reference_day.get_or_insert(day);
        let day_offset = (day - reference).to_seconds().round();

        Ok(EpochLine {
            seconds: day_offset + (hh as f64) * 3600.0 + (mm as f64) * 60.0 + ss,
            flag,
            nb_sat,
        })
    }
}

/// Parses a V2 epoch line. Epochs are expressed as seconds of day,
/// day rollover is not supported.
fn parse_v2_epoch(line: &str) -> Result<EpochLine, ParsingError> {
    let invalid = || ParsingError::InvalidEpoch(line.to_string());

    let hh = u8::from_str(field(line, 10, 12).trim()).map_err(|_| invalid())?;
    let mm = u8::from_str(field(line, 13, 15).trim()).map_err(|_| invalid())?;
    let ss = f64::from_str(field(line, 15, 26).trim()).map_err(|_| invalid())?;
    let flag = u8::from_str(field(line, 26, 29).trim()).map_err(|_| invalid())?;
    let nb_sat = usize::from_str(field(line, 29, 32).trim()).map_err(|_| invalid())?;

    Ok(EpochLine {
        seconds: (hh as f64) * 3600.0 + (mm as f64) * 60.0 + ss,
        flag,
        nb_sat,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::rinex::header::Version;

    fn lines(content: &str) -> impl Iterator<Item = std::io::Result<String>> + '_ {
        content.lines().map(|l| Ok(l.to_string()))
    }

    fn gps_header(major: u8, codes: &[&str]) -> Header {
        let mut obs = SystemObservations::new(Constellation::GPS);
        for code in codes {
            obs.push_code(code);
        }
        Header {
            version: Version { major, minor: 0 },
            observations: vec![obs],
            v2_codes: codes.iter().map(|c| c.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn v2_epoch_line() {
        let epoch = parse_v2_epoch(" 21  1  1  1  2 30.0000000  0  3G05G12G30").unwrap();
        assert_eq!(epoch.seconds, 3750.0);
        assert_eq!(epoch.flag, 0);
        assert_eq!(epoch.nb_sat, 3);
        assert!(parse_v2_epoch(" 21  1  1").is_err());
    }

    #[test]
    fn v3_epoch_line() {
        let header = gps_header(3, &["C1C"]);
        let mut record = Record::new(&header, PrnRanges::default()).unwrap();
        let epoch = record
            .parse_v3_epoch("> 2021 01 01 00 00 30.0000000  0  2", &header)
            .unwrap();
        assert_eq!(epoch.seconds, 30.0);
        assert_eq!(epoch.nb_sat, 2);
        // next day accumulates
        let epoch = record
            .parse_v3_epoch("> 2021 01 02 00 00 30.0000000  0  2", &header)
            .unwrap();
        assert_eq!(epoch.seconds, 86430.0);
    }

    #[test]
    fn framing_mismatch() {
        let header = gps_header(3, &["C1C"]);
        let mut record = Record::new(&header, PrnRanges::default()).unwrap();
        assert!(matches!(
            record.parse_v2(&header, &["C1C".to_string()], &mut lines(""), false),
            Err(ParsingError::RinexVersionMismatch(3))
        ));

        let header = gps_header(2, &["C1"]);
        let mut record = Record::new(&header, PrnRanges::default()).unwrap();
        assert!(matches!(
            record.parse_v3(&header, &mut lines(""), false),
            Err(ParsingError::RinexVersionMismatch(2))
        ));
    }

    #[test]
    fn v3_missing_marker() {
        let header = gps_header(3, &["C1C"]);
        let mut record = Record::new(&header, PrnRanges::default()).unwrap();
        let content = "  2021 01 01 00 00 30.0000000  0  1\nG05  20000000.000\n";
        assert!(matches!(
            record.parse(&header, &mut lines(content), false),
            Err(ParsingError::MissingEpochMarker(_))
        ));
    }

    /// Formats observation fields, blank when missing
    fn fields(values: &[Option<f64>]) -> String {
        values
            .iter()
            .map(|v| match v {
                Some(v) => format!("{:14.3}  ", v),
                None => " ".repeat(OBSERVATION_WIDTH),
            })
            .collect::<String>()
    }

    #[test]
    fn v3_trimmed_lines() {
        let header = gps_header(3, &["C1C", "L1C", "S1C"]);
        let mut record = Record::new(&header, PrnRanges::default()).unwrap();
        let content = [
            "> 2021 01 01 00 00 30.0000000  0  2".to_string(),
            format!("G05{}", fields(&[Some(20000000.0), Some(105000000.125)]))
                .trim_end()
                .to_string(),
            format!("G07{}", fields(&[Some(21000000.0)])).trim_end().to_string(),
            "> 2021 01 01 00 01  0.0000000  0  1".to_string(),
            format!("G07{}", fields(&[None, Some(105000000.125), Some(45.0)]))
                .trim_end()
                .to_string(),
        ]
        .join("\n");

        record.parse(&header, &mut lines(&content), false).unwrap();
        record.purge();

        assert_eq!(record.epochs, vec![30.0, 60.0]);
        let gps = record.observations.get(&Constellation::GPS).unwrap();
        assert_eq!(gps.nb_epochs(), 2);
        assert_eq!(gps.value(0, 4, 0), 20000000.0);
        assert_eq!(gps.value(0, 4, 1), 105000000.125);
        assert_eq!(gps.value(0, 4, 2), MISSING);
        assert_eq!(gps.value(0, 6, 0), 21000000.0);
        assert_eq!(gps.value(1, 6, 0), MISSING);
        assert_eq!(gps.value(1, 6, 1), 105000000.125);
        assert_eq!(gps.value(1, 6, 2), 45.0);
    }

    #[test]
    fn v2_continuations() {
        let codes = ["C1", "L1", "P2", "L2", "S1", "S2"];
        let header = gps_header(2, &codes);
        let mut record = Record::new(&header, PrnRanges::default()).unwrap();

        let mut content = vec![
            " 21  1  1  0  0  0.0000000  0 13G01G02G03G04G05G06G07G08G09G10G11G12".to_string(),
            format!("{:32}G13", ""),
        ];
        for prn in 1..=13 {
            let c1 = 20000000.0 + prn as f64;
            if prn == 1 {
                content.push(fields(&[
                    Some(c1),
                    Some(105000001.0),
                    Some(c1 + 0.5),
                    Some(105000001.5),
                    Some(40.0),
                ]));
                content.push(fields(&[Some(41.0)]));
            } else if prn == 13 {
                content.push(fields(&[Some(c1), None, None, None, Some(45.0)]));
                content.push(fields(&[Some(46.0)]));
            } else {
                content.push(fields(&[Some(c1)]));
                content.push(String::new());
            }
        }
        let content = content.join("\n");

        record.parse(&header, &mut lines(&content), false).unwrap();
        record.purge();
        assert_eq!(record.epochs, vec![0.0]);
        let gps = record.observations.get(&Constellation::GPS).unwrap();
        assert_eq!(gps.value(0, 0, 0), 20000001.0);
        assert_eq!(gps.value(0, 0, 2), 20000001.5);
        assert_eq!(gps.value(0, 0, 4), 40.0);
        assert_eq!(gps.value(0, 0, 5), 41.0);
        assert_eq!(gps.value(0, 1, 0), 20000002.0);
        assert_eq!(gps.value(0, 1, 1), MISSING);
        assert_eq!(gps.value(0, 12, 0), 20000013.0);
        assert_eq!(gps.value(0, 12, 4), 45.0);
        assert_eq!(gps.value(0, 12, 5), 46.0);
    }

    #[test]
    fn v2_event_records_are_skipped() {
        let header = gps_header(2, &["C1"]);
        let mut record = Record::new(&header, PrnRanges::default()).unwrap();
        let content = " 21  1  1  0  0  0.0000000  4  2
SOME COMMENT                                                COMMENT
OTHER COMMENT                                               COMMENT
 21  1  1  0  0 30.0000000  0  1G05
  20000000.000";
        record.parse(&header, &mut lines(content), false).unwrap();
        record.purge();
        assert_eq!(record.epochs, vec![30.0]);
    }

    #[test]
    fn initial_capacity_is_bounded() {
        let mut header = gps_header(3, &["C1C"]);
        header.interval = Some(1.0E-6);
        let mut record = Record::new(&header, PrnRanges::default()).unwrap();
        let gps = record.observations.get(&Constellation::GPS).unwrap();
        assert_eq!(gps.nb_epochs(), MAX_INITIAL_EPOCHS);

        // cubes still grow on demand
        let index = MAX_INITIAL_EPOCHS + 10;
        record.store(index, Constellation::GPS, 0, 0, "20000000.000").unwrap();
        let gps = record.observations.get(&Constellation::GPS).unwrap();
        assert_eq!(gps.nb_epochs(), index + 1);
        assert_eq!(gps.value(index, 0, 0), 20000000.0);

        header.interval = Some(30.0);
        let record = Record::new(&header, PrnRanges::default()).unwrap();
        let gps = record.observations.get(&Constellation::GPS).unwrap();
        assert_eq!(gps.nb_epochs(), 2909);
    }

    #[test]
    fn v3_invalid_calendar_date() {
        let header = gps_header(3, &["C1C"]);
        let mut record = Record::new(&header, PrnRanges::default()).unwrap();
        let content = "> 2021 13 21 00 00  0.0000000  0  1\nG05  20000000.000\n";
        match record.parse(&header, &mut lines(content), false) {
            Err(ParsingError::InvalidEpoch(line)) => {
                assert_eq!(line, "> 2021 13 21 00 00  0.0000000  0  1")
            },
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(matches!(
            record.parse_v3_epoch("> 2021 02 29 00 00  0.0000000  0  1", &header),
            Err(ParsingError::InvalidEpoch(_))
        ));
    }

    #[test]
    fn v3_untracked_systems() {
        let header = gps_header(3, &["C1C"]);
        let mut record = Record::new(&header, PrnRanges::default()).unwrap();
        let content = "> 2021 01 01 00 00 30.0000000  0  3
G05  20000000.000
J01  21000000.000
S20  22000000.000";
        record.parse(&header, &mut lines(content), false).unwrap();
        record.purge();
        assert_eq!(record.epochs, vec![30.0]);
        assert_eq!(record.observations.len(), 1);
        let gps = record.observations.get(&Constellation::GPS).unwrap();
        assert_eq!(gps.value(0, 4, 0), 20000000.0);

        // not a satellite system at all
        let mut record = Record::new(&header, PrnRanges::default()).unwrap();
        let content = "> 2021 01 01 00 00 30.0000000  0  1\n#01  21000000.000";
        assert!(matches!(
            record.parse(&header, &mut lines(content), false),
            Err(ParsingError::UnknownConstellation(_))
        ));
    }

    #[test]
    fn v2_epochs_going_backwards() {
        let header = gps_header(2, &["C1"]);
        let mut record = Record::new(&header, PrnRanges::default()).unwrap();
        let content = " 21  1  1 23 59 30.0000000  0  1G05
  20000000.000
 21  1  2  0  0  0.0000000  0  1G05
  20000030.000";
        record.parse(&header, &mut lines(content), false).unwrap();
        record.purge();
        // stored in file order, a warning is emitted
        assert_eq!(record.epochs, vec![86370.0, 0.0]);
        let gps = record.observations.get(&Constellation::GPS).unwrap();
        assert_eq!(gps.value(0, 4, 0), 20000000.0);
        assert_eq!(gps.value(1, 4, 0), 20000030.0);
    }
}
