//! Cube matching: time alignment of two [Rinex] observation sets
use crate::{
    errors::MatchingError,
    prelude::{Constellation, Rinex, SV},
    rinex::observation::{SystemObservations, MISSING},
    series::{mean, Series},
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One epoch that both datasets share
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MatchedEpoch {
    /// Epoch, in seconds
    pub epoch: f64,
    /// (self, other) values, for every satellite slot of the
    /// constellation (PRN = slot + 1), whether observed or not.
    /// Unobserved values are [MISSING].
    pub values: Vec<(f64, f64)>,
}

/// Result of [Rinex::match_observations]
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MatchedObservations {
    /// [Constellation] that was matched
    pub constellation: Constellation,
    /// Observation code that was matched
    pub code: String,
    /// Common epochs, in chronological order
    pub epochs: Vec<MatchedEpoch>,
}

impl MatchedObservations {
    /// Number of common epochs
    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    /// Returns true if the two datasets do not share a single epoch
    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    /// Iterates (epoch, [SV], self value, other value), skipping nothing.
    pub fn iter(&self) -> impl Iterator<Item = (f64, SV, f64, f64)> + '_ {
        let constellation = self.constellation;
        self.epochs.iter().flat_map(move |matched| {
            matched
                .values
                .iter()
                .enumerate()
                .map(move |(slot, (lhs, rhs))| {
                    let sv = SV::new(constellation, (slot + 1) as u8);
                    (matched.epoch, sv, *lhs, *rhs)
                })
        })
    }

    /// For each common epoch, averages self - other over satellites
    /// observed on both sides. Epochs without such satellite are dropped.
    pub fn averaged_difference(&self) -> Series {
        self.epochs
            .iter()
            .filter_map(|matched| {
                let diffs = matched
                    .values
                    .iter()
                    .filter(|(lhs, rhs)| *lhs != MISSING && *rhs != MISSING)
                    .map(|(lhs, rhs)| lhs - rhs);
                mean(diffs).map(|diff| (matched.epoch, diff))
            })
            .collect()
    }
}

impl Rinex {
    fn cube_column(
        &self,
        constellation: Constellation,
        code: &str,
    ) -> Result<(&SystemObservations, usize), MatchingError> {
        let obs = self
            .observations(constellation)
            .ok_or(MatchingError::MissingConstellation(constellation))?;
        let column = obs
            .column_of(code)
            .ok_or_else(|| MatchingError::MissingObservation {
                constellation,
                code: code.to_string(),
            })?;
        Ok((obs, column))
    }

    /// Aligns this observation with the same observation in another [Rinex].
    /// Both epoch vectors are walked once, in a single forward pass.
    /// Each common epoch gives one [MatchedEpoch] spanning the whole
    /// PRN range, observed or not.
    ///
    /// Fails before anything is scanned when either side
    /// does not declare this observation.
    pub fn match_observations(
        &self,
        other: &Self,
        constellation: Constellation,
        code: &str,
    ) -> Result<MatchedObservations, MatchingError> {
        let (lhs, lhs_col) = self.cube_column(constellation, code)?;
        let (rhs, rhs_col) = other.cube_column(constellation, code)?;

        let nb_sat = lhs.nb_satellites().max(rhs.nb_satellites());
        let (t_lhs, t_rhs) = (self.epochs(), other.epochs());

        let mut epochs = Vec::new();
        let (mut i, mut j) = (0, 0);

        while i < t_lhs.len() && j < t_rhs.len() {
            if t_rhs[j] == t_lhs[i] {
                let values = (0..nb_sat)
                    .map(|sat| (lhs.value(i, sat, lhs_col), rhs.value(j, sat, rhs_col)))
                    .collect();
                epochs.push(MatchedEpoch {
                    epoch: t_lhs[i],
                    values,
                });
                i += 1;
                j += 1;
            } else if t_rhs[j] < t_lhs[i] {
                j += 1;
            } else {
                i += 1;
            }
        }

        Ok(MatchedObservations {
            constellation,
            code: code.to_string(),
            epochs,
        })
    }

    /// Matches this observation against another [Rinex], then averages
    /// the differences of each common epoch, see
    /// [MatchedObservations::averaged_difference].
    pub fn averaged_difference(
        &self,
        other: &Self,
        constellation: Constellation,
        code: &str,
    ) -> Result<Series, MatchingError> {
        let matched = self.match_observations(other, constellation, code)?;
        Ok(matched.averaged_difference())
    }
}
