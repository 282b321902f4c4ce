//! Common view track matching
use crate::{
    cggtts::{fractional_mjd, Cggtts, Column, Track},
    errors::MatchingError,
    prelude::Constellation,
    series::{mean, Series},
};

use itertools::Itertools;
use log::debug;
use strum_macros::{Display, EnumString};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How tracks of two sites are paired
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, EnumString, Display)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[strum(ascii_case_insensitive)]
pub enum MatchMode {
    /// Same epoch and same satellite: strict common view
    #[default]
    #[strum(to_string = "tracks")]
    Tracks,
    /// Same epoch only, whatever the satellites.
    /// Differences are formed between per epoch averages.
    #[strum(to_string = "tracktime")]
    TrackTime,
}

/// Matching options
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MatchOptions {
    /// Paired tracks must also share the same IOE (broadcast ephemeris)
    pub match_ephemeris: bool,
    pub mode: MatchMode,
}

impl MatchOptions {
    /// Returns new [MatchOptions] with ephemeris matching enabled or not
    pub fn with_ephemeris(&self, match_ephemeris: bool) -> Self {
        let mut s = *self;
        s.match_ephemeris = match_ephemeris;
        s
    }

    /// Returns new [MatchOptions] with desired [MatchMode]
    pub fn with_mode(&self, mode: MatchMode) -> Self {
        let mut s = *self;
        s.mode = mode;
        s
    }
}

impl Cggtts {
    /// Pairs rows of both tables sharing (MJD, STTIME, SV).
    /// Both tables are sorted by that key: the cursor on the other table
    /// only moves forward, and a row of the other table is paired at most once.
    fn track_pairs(&self, other: &Self, match_ephemeris: bool) -> Vec<(usize, usize)> {
        let ioe = |cggtts: &Self, track: &Track| track.value(&cggtts.layout, Column::Ioe);

        let mut pairs = Vec::new();
        let mut cursor = 0;

        for (i, track) in self.tracks.iter().enumerate() {
            let key = track.key(&self.layout);
            while cursor < other.tracks.len() && other.tracks[cursor].key(&other.layout) < key {
                cursor += 1;
            }

            let mut j = cursor;
            while j < other.tracks.len() && other.tracks[j].key(&other.layout) == key {
                if !match_ephemeris || ioe(self, track) == ioe(other, &other.tracks[j]) {
                    pairs.push((i, j));
                    cursor = j + 1;
                    break;
                }
                j += 1;
            }
        }

        debug!("{} common view tracks", pairs.len());
        pairs
    }

    /// Pairs epochs (contiguous blocks) present in both tables
    fn block_pairs(&self, other: &Self) -> Vec<((u32, u32), (usize, usize))> {
        let (lhs, rhs) = (self.blocks(), other.blocks());
        let mut pairs = Vec::new();
        let (mut i, mut j) = (0, 0);

        while i < lhs.len() && j < rhs.len() {
            if lhs[i].0 == rhs[j].0 {
                pairs.push((lhs[i].0, (i, j)));
                i += 1;
                j += 1;
            } else if lhs[i].0 < rhs[j].0 {
                i += 1;
            } else {
                j += 1;
            }
        }

        debug!("{} common epochs", pairs.len());
        pairs
    }

    /// Returns copies of both tables, reduced to their common rows.
    /// In [MatchMode::Tracks], row k of both results describes the same
    /// satellite at the same epoch. In [MatchMode::TrackTime], both results
    /// keep all the tracks of their common epochs.
    /// An empty common view is a valid result.
    pub fn match_tracks(&self, other: &Self, opts: &MatchOptions) -> (Self, Self) {
        match opts.mode {
            MatchMode::Tracks => {
                let (lhs, rhs): (Vec<_>, Vec<_>) = self
                    .track_pairs(other, opts.match_ephemeris)
                    .into_iter()
                    .map(|(i, j)| (self.tracks[i].clone(), other.tracks[j].clone()))
                    .unzip();
                (self.with_tracks(lhs), other.with_tracks(rhs))
            },
            MatchMode::TrackTime => {
                let (lhs_blocks, rhs_blocks) = (self.blocks(), other.blocks());
                let mut lhs = Vec::new();
                let mut rhs = Vec::new();
                for (_, (i, j)) in self.block_pairs(other) {
                    lhs.extend_from_slice(&self.tracks[lhs_blocks[i].1.clone()]);
                    rhs.extend_from_slice(&other.tracks[rhs_blocks[j].1.clone()]);
                }
                (self.with_tracks(lhs), other.with_tracks(rhs))
            },
        }
    }

    /// Averages this column over all tracks of each epoch,
    /// optionally restricted to one [Constellation].
    /// When `with_iono` is set, the measured ionospheric delay (MSIO)
    /// is added to each value: this requires dual frequency tracks.
    /// Epochs are expressed as fractional MJD.
    pub fn averaged(
        &self,
        column: Column,
        constellation: Option<Constellation>,
        with_iono: bool,
    ) -> Result<Series, MatchingError> {
        if !self.layout.has(column) {
            return Err(MatchingError::MissingColumn(column));
        }
        if with_iono && !self.layout.has(Column::Msio) {
            return Err(MatchingError::MissingColumn(Column::Msio));
        }

        let layout = &self.layout;
        let value = |track: &Track| -> Option<f64> {
            let value = track.value(layout, column)?;
            if with_iono {
                Some(value + track.value(layout, Column::Msio)?)
            } else {
                Some(value)
            }
        };

        let chunks = self
            .tracks
            .iter()
            .filter(|t| constellation.map_or(true, |c| t.sv.constellation == c))
            .chunk_by(|t| t.epoch_key(layout));

        let series = chunks
            .into_iter()
            .filter_map(|((mjd, sttime), tracks)| {
                let average = mean(tracks.filter_map(|t| value(t)))?;
                Some((fractional_mjd(mjd, sttime), average))
            })
            .collect();

        Ok(series)
    }

    /// Differences this column between this table and the other one, per epoch.
    /// In [MatchMode::Tracks], tracks are paired first (see [Cggtts::match_tracks])
    /// and the pairwise differences are averaged.
    /// In [MatchMode::TrackTime], each epoch is averaged on both sides first.
    /// Epochs are expressed as fractional MJD.
    /// ```
    /// use cvmatch::prelude::{Cggtts, CggttsOptions, Column, MatchOptions};
    ///
    /// let opts = CggttsOptions::default();
    /// let lhs = Cggtts::from_file("data/cggtts/GZLI2P59.569", &opts).unwrap();
    /// let rhs = Cggtts::from_file("data/cggtts/GZOP0159.569", &opts).unwrap();
    ///
    /// let series = lhs
    ///     .averaged_difference(&rhs, Column::Refsys, &MatchOptions::default())
    ///     .unwrap();
    ///
    /// assert!(!series.is_empty());
    /// ```
    pub fn averaged_difference(
        &self,
        other: &Self,
        column: Column,
        opts: &MatchOptions,
    ) -> Result<Series, MatchingError> {
        let lhs = self
            .layout
            .index(column)
            .ok_or(MatchingError::MissingColumn(column))?;
        let rhs = other
            .layout
            .index(column)
            .ok_or(MatchingError::MissingColumn(column))?;

        match opts.mode {
            MatchMode::Tracks => {
                let pairs = self.track_pairs(other, opts.match_ephemeris);
                let chunks = pairs
                    .iter()
                    .chunk_by(|(i, _)| self.tracks[*i].epoch_key(&self.layout));
                let series = chunks
                    .into_iter()
                    .filter_map(|((mjd, sttime), pairs)| {
                        let average = mean(pairs.map(|(i, j)| {
                            self.tracks[*i].values()[lhs] - other.tracks[*j].values()[rhs]
                        }))?;
                        Some((fractional_mjd(mjd, sttime), average))
                    })
                    .collect();
                Ok(series)
            },
            MatchMode::TrackTime => {
                let (lhs_blocks, rhs_blocks) = (self.blocks(), other.blocks());
                let series = self
                    .block_pairs(other)
                    .into_iter()
                    .filter_map(|((mjd, sttime), (i, j))| {
                        let a = mean(
                            self.tracks[lhs_blocks[i].1.clone()]
                                .iter()
                                .map(|t| t.values()[lhs]),
                        )?;
                        let b = mean(
                            other.tracks[rhs_blocks[j].1.clone()]
                                .iter()
                                .map(|t| t.values()[rhs]),
                        )?;
                        Some((fractional_mjd(mjd, sttime), a - b))
                    })
                    .collect();
                Ok(series)
            },
        }
    }
}
