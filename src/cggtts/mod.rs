//! CGGTTS track files (V1, V2 and V2E)
mod class;
mod delay;
mod header;
mod layout;
mod matching;
mod naming;
mod reference_time;
mod version;

pub mod track;

pub use class::CommonViewClass;
pub use delay::{CalibrationID, Delay, SystemDelay};
pub use header::{Coordinates, Hardware, Header};
pub use layout::{Column, ColumnLayout, FrequencyMode};
pub use matching::{MatchMode, MatchOptions};
pub use naming::NamingConvention;
pub use reference_time::ReferenceTime;
pub use track::Track;
pub use version::Version;

use crate::{
    constellation::{marker, PrnRanges},
    errors::{MatchingError, ParsingError},
    prelude::{Duration, Epoch, TimeScale, SV},
};

use itertools::Itertools;
use log::{debug, info, warn};

use std::{
    fs::File,
    io::{BufRead, BufReader, Read},
    ops::Range,
    path::Path,
};

#[cfg(feature = "flate2")]
use flate2::read::GzDecoder;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// [Cggtts] loading options
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CggttsOptions {
    /// Daily file naming, for [Cggtts::load_range]
    pub naming: NamingConvention,
    /// Bad tracks are counted but preserved
    pub keep_bad_tracks: bool,
    /// Highest PRN accepted per constellation
    pub prn_ranges: PrnRanges,
}

impl CggttsOptions {
    /// Returns new [CggttsOptions] with desired [NamingConvention]
    pub fn with_naming(&self, naming: NamingConvention) -> Self {
        let mut s = *self;
        s.naming = naming;
        s
    }

    /// Returns new [CggttsOptions] that preserve bad tracks or not
    pub fn with_bad_tracks(&self, keep_bad_tracks: bool) -> Self {
        let mut s = *self;
        s.keep_bad_tracks = keep_bad_tracks;
        s
    }

    /// Returns new [CggttsOptions] with desired [PrnRanges]
    pub fn with_prn_ranges(&self, prn_ranges: PrnRanges) -> Self {
        let mut s = *self;
        s.prn_ranges = prn_ranges;
        s
    }
}

/// Fractional MJD of a track start time
pub(crate) fn fractional_mjd(mjd: u32, sttime: u32) -> f64 {
    mjd as f64 + sttime as f64 / 86400.0
}

/// [Cggtts] is a table of [Track]s, sorted by (MJD, STTIME) as found
/// in the files, then by PRN within each epoch. Numerical columns are read
/// through the [ColumnLayout] resolved when parsing the [Header].
///
/// Every transformation (filtering, matching) returns a new [Cggtts].
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Cggtts {
    /// [Header] of the (first) file
    pub header: Header,
    layout: ColumnLayout,
    tracks: Vec<Track>,
    bad_tracks: usize,
    missing_tracks: usize,
}

impl Cggtts {
    /// Parses [Cggtts] from a local file.
    /// ```
    /// use cvmatch::prelude::{Cggtts, CggttsOptions, Column, Constellation};
    ///
    /// let cggtts = Cggtts::from_file("data/cggtts/GZLI2P59.569", &CggttsOptions::default())
    ///     .unwrap();
    ///
    /// assert_eq!(cggtts.header.lab, "LI");
    /// assert_eq!(cggtts.len(), 9);
    /// assert_eq!(cggtts.bad_tracks(), 1);
    /// assert!(cggtts.layout().has(Column::Refsys));
    /// assert!(!cggtts.layout().has_ionospheric_data());
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P, opts: &CggttsOptions) -> Result<Self, ParsingError> {
        let name = path.as_ref().to_string_lossy().to_string();
        let fd = File::open(path).map_err(|e| ParsingError::from(e).within(&name))?;
        let mut reader = BufReader::new(fd);
        Self::parse(&mut reader, opts).map_err(|e| e.within(&name))
    }

    /// Parses [Cggtts] from a gzip compressed local file.
    #[cfg(feature = "flate2")]
    #[cfg_attr(docsrs, doc(cfg(feature = "flate2")))]
    pub fn from_gzip_file<P: AsRef<Path>>(
        path: P,
        opts: &CggttsOptions,
    ) -> Result<Self, ParsingError> {
        let name = path.as_ref().to_string_lossy().to_string();
        let fd = File::open(path).map_err(|e| ParsingError::from(e).within(&name))?;
        let mut reader = BufReader::new(GzDecoder::new(fd));
        Self::parse(&mut reader, opts).map_err(|e| e.within(&name))
    }

    /// Parses [Cggtts] from any [Read]able interface.
    /// Only the header is structural: malformed track lines are reported
    /// and skipped, lines with missing data ('*') are counted and skipped.
    pub fn parse<R: Read>(
        reader: &mut BufReader<R>,
        opts: &CggttsOptions,
    ) -> Result<Self, ParsingError> {
        let cggtts = Self::parse_tracks(reader, opts)?;
        Ok(cggtts.finalize(opts))
    }

    /// Parses all tracks, without any post processing
    fn parse_tracks<R: Read>(
        reader: &mut BufReader<R>,
        opts: &CggttsOptions,
    ) -> Result<Self, ParsingError> {
        let mut lines = reader.lines();
        let header = Header::parse(&mut lines)?;
        let layout = ColumnLayout::new(header.version, header.frequency);

        let mut tracks = Vec::with_capacity(128);
        let mut missing_tracks = 0;

        for line in lines {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            if line.contains('*') {
                missing_tracks += 1;
                continue;
            }
            match Track::parse(&line, &layout) {
                Ok(track) => {
                    if opts.prn_ranges.contains(track.sv) {
                        tracks.push(track);
                    } else {
                        warn!("{}: PRN out of range", track.sv);
                    }
                },
                Err(e) => warn!("\"{}\": {}", line.trim(), e),
            }
        }

        if missing_tracks > 0 {
            info!("{} tracks with missing data", missing_tracks);
        }

        Ok(Self {
            header,
            layout,
            tracks,
            bad_tracks: 0,
            missing_tracks,
        })
    }

    /// Applies the bad track policy, then sorts each epoch by PRN.
    fn finalize(self, opts: &CggttsOptions) -> Self {
        let mut s = if opts.keep_bad_tracks {
            let mut s = self;
            s.bad_tracks = s.tracks.iter().filter(|t| t.is_bad(&s.layout)).count();
            s
        } else {
            self.filter_bad_tracks()
        };
        if s.bad_tracks > 0 {
            warn!("{} bad tracks", s.bad_tracks);
        }
        s.sort_epochs();
        s
    }

    /// Loads one file per MJD within [start_mjd, stop_mjd], named as
    /// described by [CggttsOptions::naming], and concatenates them.
    /// Missing files are reported and skipped. All files must share
    /// the same [ColumnLayout]. The bad track policy applies once, after
    /// all files are loaded.
    /// ```
    /// use cvmatch::prelude::{Cggtts, CggttsOptions, NamingConvention};
    ///
    /// let opts = CggttsOptions::default()
    ///     .with_naming(NamingConvention::Lab);
    ///
    /// // 59571 is missing
    /// let cggtts = Cggtts::load_range(59569, 59571, "data/cggtts", "GZLI2P", &opts)
    ///     .unwrap();
    ///
    /// assert_eq!(cggtts.len(), 9 + 10);
    /// assert_eq!(cggtts.bad_tracks(), 1);
    /// ```
    pub fn load_range<P: AsRef<Path>>(
        start_mjd: u32,
        stop_mjd: u32,
        directory: P,
        stub: &str,
        opts: &CggttsOptions,
    ) -> Result<Self, ParsingError> {
        let mut loaded = Option::<Self>::None;

        for mjd in start_mjd..=stop_mjd {
            let path = directory.as_ref().join(opts.naming.file_name(mjd, stub));
            let name = path.to_string_lossy().to_string();

            if !path.exists() {
                warn!("{}: missing file", name);
                continue;
            }

            let fd = File::open(&path).map_err(|e| ParsingError::from(e).within(&name))?;
            let mut reader = BufReader::new(fd);
            let day = Self::parse_tracks(&mut reader, opts).map_err(|e| e.within(&name))?;
            debug!("{}: {} tracks", name, day.tracks.len());

            if let Some(cggtts) = loaded.as_mut() {
                if cggtts.layout != day.layout {
                    return Err(ParsingError::LayoutMismatch.within(&name));
                }
                cggtts.tracks.extend(day.tracks);
                cggtts.missing_tracks += day.missing_tracks;
            } else {
                loaded = Some(day);
            }
        }

        match loaded {
            Some(cggtts) => Ok(cggtts.finalize(opts)),
            None => {
                warn!("no file found in MJD range {}-{}", start_mjd, stop_mjd);
                Ok(Self::default())
            },
        }
    }

    /// [ColumnLayout] of this table
    pub fn layout(&self) -> &ColumnLayout {
        &self.layout
    }

    /// [Track]s, in table order
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Number of tracks (rows)
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Number of bad tracks found by the last bad track pass
    pub fn bad_tracks(&self) -> usize {
        self.bad_tracks
    }

    /// Number of track lines skipped because of missing data
    pub fn missing_tracks(&self) -> usize {
        self.missing_tracks
    }

    /// Reads one column of one row, through the [ColumnLayout] of this table.
    /// None when the row does not exist, or this layout has no such column.
    pub fn value(&self, row: usize, column: Column) -> Option<f64> {
        self.tracks.get(row)?.value(&self.layout, column)
    }

    /// Start [Epoch] of this row, in the [TimeScale] of the reference time.
    pub fn epoch(&self, row: usize) -> Option<Epoch> {
        let (mjd, sttime) = self.tracks.get(row)?.epoch_key(&self.layout);
        let day = match self.header.reference_time.timescale() {
            TimeScale::TAI => Epoch::from_mjd_tai(mjd as f64),
            _ => Epoch::from_mjd_utc(mjd as f64),
        };
        Some(day + Duration::from_seconds(sttime as f64))
    }

    /// Start time of this row, expressed as fractional MJD
    pub fn fractional_mjd(&self, row: usize) -> Option<f64> {
        let (mjd, sttime) = self.tracks.get(row)?.epoch_key(&self.layout);
        Some(fractional_mjd(mjd, sttime))
    }

    /// Satellites present in this table
    pub fn satellites(&self) -> Vec<SV> {
        self.tracks
            .iter()
            .map(|t| t.sv)
            .unique()
            .sorted_by_key(|sv| (marker(sv.constellation), sv.prn))
            .collect()
    }

    /// Returns true when tracks carry measured ionospheric data
    pub fn has_ionospheric_data(&self) -> bool {
        self.layout.has_ionospheric_data()
    }

    /// Copies this table, with other tracks
    fn with_tracks(&self, tracks: Vec<Track>) -> Self {
        Self {
            header: self.header.clone(),
            layout: self.layout.clone(),
            tracks,
            bad_tracks: self.bad_tracks,
            missing_tracks: self.missing_tracks,
        }
    }

    /// Returns a new [Cggtts] without bad tracks: [Track::is_bad].
    /// [Cggtts::bad_tracks] is the number of tracks removed by this pass.
    pub fn filter_bad_tracks(&self) -> Self {
        let (bad, good): (Vec<_>, Vec<_>) = self
            .tracks
            .iter()
            .cloned()
            .partition(|t| t.is_bad(&self.layout));
        let mut s = self.with_tracks(good);
        s.bad_tracks = bad.len();
        s
    }

    /// Returns a new [Cggtts] with only the tracks whose column
    /// value lies within [min, max].
    pub fn filter(&self, column: Column, min: f64, max: f64) -> Result<Self, MatchingError> {
        let index = self
            .layout
            .index(column)
            .ok_or(MatchingError::MissingColumn(column))?;
        let tracks = self
            .tracks
            .iter()
            .filter(|t| {
                let value = t.values()[index];
                value >= min && value <= max
            })
            .cloned()
            .collect();
        Ok(self.with_tracks(tracks))
    }

    /// Contiguous rows sharing (MJD, STTIME)
    pub(crate) fn blocks(&self) -> Vec<((u32, u32), Range<usize>)> {
        let mut blocks = Vec::new();
        let mut start = 0;
        let chunks = self.tracks.iter().chunk_by(|t| t.epoch_key(&self.layout));
        for (key, chunk) in chunks.into_iter() {
            let end = start + chunk.count();
            blocks.push((key, start..end));
            start = end;
        }
        blocks
    }

    /// Stable sort by PRN, within each epoch
    fn sort_epochs(&mut self) {
        for (_, range) in self.blocks() {
            self.tracks[range].sort_by_key(|t| t.sv_key());
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::prelude::Constellation;
    use crate::tests::toolkit::{cggtts, v2e_track};

    #[test]
    fn epochs_are_sorted_by_prn() {
        let table = cggtts(
            &[
                v2e_track("G09", 59569, "001000", 10, 20, 30),
                v2e_track("G02", 59569, "001000", 10, 20, 30),
                v2e_track("G05", 59569, "001000", 10, 20, 30),
                v2e_track("G07", 59569, "002600", 10, 20, 30),
                v2e_track("G01", 59569, "002600", 10, 20, 30),
            ],
            &CggttsOptions::default(),
        );
        let prns = table.tracks().iter().map(|t| t.sv.prn).collect::<Vec<_>>();
        assert_eq!(prns, vec![2, 5, 9, 1, 7]);
        assert_eq!(table.blocks().len(), 2);
        assert_eq!(table.blocks()[1], ((59569, 1560), 3..5));
        assert_eq!(table.value(3, Column::StTime), Some(1560.0));
        assert_eq!(table.fractional_mjd(0), Some(59569.0 + 600.0 / 86400.0));
        assert_eq!(
            table.satellites(),
            [1, 2, 5, 7, 9]
                .iter()
                .map(|prn| SV::new(Constellation::GPS, *prn))
                .collect::<Vec<_>>()
        );
        assert_eq!(
            table.epoch(0),
            Some(Epoch::from_mjd_utc(59569.0) + Duration::from_seconds(600.0))
        );
        assert_eq!(table.epoch(5), None);
    }

    #[test]
    fn missing_data_and_malformed_lines() {
        let table = cggtts(
            &[
                v2e_track("G02", 59569, "001000", 10, 20, 30),
                v2e_track("G05", 59569, "001000", 10, 20, 30).replace(" +13 ", " *** "),
                "G01 FF 59569".to_string(),
                v2e_track("G33", 59569, "001000", 10, 20, 30),
            ],
            &CggttsOptions::default(),
        );
        assert_eq!(table.len(), 1);
        assert_eq!(table.missing_tracks(), 1);

        let ranges = PrnRanges::default().with_max_prn(Constellation::GPS, 40);
        let table = cggtts(
            &[v2e_track("G33", 59569, "001000", 10, 20, 30)],
            &CggttsOptions::default().with_prn_ranges(ranges),
        );
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn column_filter() {
        let table = cggtts(
            &[
                v2e_track("G02", 59569, "001000", -10, 20, 30),
                v2e_track("G05", 59569, "001000", 10, 20, 30),
                v2e_track("G09", 59569, "001000", 100, 20, 30),
            ],
            &CggttsOptions::default(),
        );
        let filtered = table.filter(Column::Refsys, -10.0, 10.0).unwrap();
        assert_eq!(filtered.len(), 2);
        assert_eq!(table.len(), 3);
        assert_eq!(
            table.filter(Column::Msio, 0.0, 1.0),
            Err(MatchingError::MissingColumn(Column::Msio))
        );
    }

    #[test]
    fn bad_tracks_policy() {
        let tracks = [
            v2e_track("G02", 59569, "001000", 10, 9999, 30),
            v2e_track("G05", 59569, "001000", 10, 20, 30),
        ];
        let dropped = cggtts(&tracks, &CggttsOptions::default());
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped.bad_tracks(), 1);

        let kept = cggtts(&tracks, &CggttsOptions::default().with_bad_tracks(true));
        assert_eq!(kept.len(), 2);
        assert_eq!(kept.bad_tracks(), 1);

        let filtered = kept.filter_bad_tracks();
        assert_eq!(filtered.tracks(), dropped.tracks());
        assert_eq!(filtered.bad_tracks(), 1);
    }

    #[test]
    fn one_bad_track_out_of_ten() {
        let tracks = (1..=10)
            .map(|prn| {
                let dsg = if prn == 4 { 9999 } else { 20 };
                v2e_track(&format!("G{:02}", prn), 59569, "001000", 10, dsg, 30)
            })
            .collect::<Vec<_>>();
        let table = cggtts(&tracks, &CggttsOptions::default());
        assert_eq!(table.len(), 9);
        assert_eq!(table.bad_tracks(), 1);
        assert!(table.tracks().iter().all(|t| t.sv.prn != 4));
    }

    #[test]
    fn bad_track_filter_is_idempotent() {
        let tracks = [
            v2e_track("G02", 59569, "001000", 10, 9999, 30),
            v2e_track("G05", 59569, "001000", 10, 20, 30),
            v2e_track("G07", 59569, "002600", 10, 9999, 30),
            v2e_track("G09", 59569, "002600", 10, 20, 30),
        ];
        let table = cggtts(&tracks, &CggttsOptions::default().with_bad_tracks(true));
        let once = table.filter_bad_tracks();
        assert_eq!(once.bad_tracks(), 2);
        let twice = once.filter_bad_tracks();
        assert_eq!(twice.tracks(), once.tracks());
        assert_eq!(twice.bad_tracks(), 0);
    }

    #[test]
    fn columns_read_through_own_layout() {
        let single = cggtts(
            &[v2e_track("G02", 59569, "001000", 10, 42, 30)],
            &CggttsOptions::default(),
        );
        let content = format!(
            "{}\n{}\n",
            crate::tests::toolkit::V2E_HEADER
                .replace("MDIO SMDI FR", "MDIO SMDI MSIO SMSI ISG FR")
                .trim_end(),
            "G02 FF 59569 001000 0780 452 1373   +1234567   +9999        +10    +13   42  30  144   +0   25  +39   56   +7    5 00 00 L3P EF"
        );
        let mut reader = BufReader::new(content.as_bytes());
        let dual = Cggtts::parse(&mut reader, &CggttsOptions::default()).unwrap();

        assert_ne!(single.layout(), dual.layout());
        assert_eq!(single.value(0, Column::Dsg), Some(42.0));
        assert_eq!(dual.value(0, Column::Dsg), Some(42.0));
        assert_eq!(single.value(0, Column::Fr), Some(0.0));
        assert_eq!(dual.value(0, Column::Isg), Some(5.0));
        assert_ne!(
            single.layout().index(Column::Hc),
            dual.layout().index(Column::Hc)
        );
    }
}
