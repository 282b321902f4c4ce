//! Observation Record Model: one [Constellation] observation cube
use crate::{errors::ParsingError, prelude::Constellation};

use log::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Value standing for "no observation" in the cube.
/// A zero is never a measured value.
pub const MISSING: f64 = 0.0;

/// [SystemObservations] stores all observations of a single [Constellation],
/// indexed by [epoch][satellite][observation type].
/// The observation type axis follows the order in which codes
/// were declared in the file header: always look them up by code.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SystemObservations {
    /// [Constellation] these observations describe
    pub constellation: Constellation,
    /// Observation codes, column identity
    codes: Vec<String>,
    /// Satellite axis size
    nb_satellites: usize,
    /// Observation cube
    data: Vec<Vec<Vec<f64>>>,
}

impl SystemObservations {
    /// Creates an empty [SystemObservations], without any declared code.
    pub fn new(constellation: Constellation) -> Self {
        Self {
            constellation,
            codes: Vec::new(),
            nb_satellites: 0,
            data: Vec::new(),
        }
    }

    /// Declares a new observation type. Declaring the same
    /// code twice has no effect.
    pub(crate) fn push_code(&mut self, code: &str) {
        if !self.has_observation(code) {
            self.codes.push(code.to_string());
        }
    }

    /// Observation codes, in column order
    pub fn codes(&self) -> &[String] {
        &self.codes
    }

    /// Returns true if this code was declared
    pub fn has_observation(&self, code: &str) -> bool {
        self.column_of(code).is_some()
    }

    /// Returns column index of this code, if declared
    pub fn column_of(&self, code: &str) -> Option<usize> {
        self.codes.iter().position(|c| c == code)
    }

    /// Pre-sizes the cube, filled with [MISSING].
    /// Observation types must be declared beforehand.
    pub fn allocate(
        &mut self,
        max_epochs: usize,
        max_satellites: usize,
    ) -> Result<(), ParsingError> {
        if self.codes.is_empty() {
            return Err(ParsingError::UndefinedObservationTypes);
        }
        self.nb_satellites = max_satellites;
        self.data = vec![vec![vec![MISSING; self.codes.len()]; max_satellites]; max_epochs];
        Ok(())
    }

    /// Number of epochs (first axis)
    pub fn nb_epochs(&self) -> usize {
        self.data.len()
    }

    /// Satellite axis size
    pub fn nb_satellites(&self) -> usize {
        self.nb_satellites
    }

    /// Stores a value. The epoch axis grows when the initial capacity
    /// estimate is exceeded. Out of range satellite or column are ignored.
    pub(crate) fn insert(&mut self, epoch: usize, satellite: usize, column: usize, value: f64) {
        if satellite >= self.nb_satellites || column >= self.codes.len() {
            return;
        }
        if epoch >= self.data.len() {
            debug!(
                "{} observations: growing beyond {} epochs",
                self.constellation,
                self.data.len()
            );
            let row = vec![vec![MISSING; self.codes.len()]; self.nb_satellites];
            self.data.resize(epoch + 1, row);
        }
        self.data[epoch][satellite][column] = value;
    }

    /// Returns the value stored at given location, [MISSING] when
    /// nothing was observed or when out of range.
    pub fn value(&self, epoch: usize, satellite: usize, column: usize) -> f64 {
        self.data
            .get(epoch)
            .and_then(|sats| sats.get(satellite))
            .and_then(|obs| obs.get(column))
            .copied()
            .unwrap_or(MISSING)
    }

    /// Returns true if no satellite reported anything at this epoch
    pub(crate) fn is_epoch_empty(&self, epoch: usize) -> bool {
        match self.data.get(epoch) {
            Some(sats) => sats.iter().flatten().all(|v| *v == MISSING),
            None => true,
        }
    }

    /// Keeps the epochs marked in the mask, and only those.
    /// The epoch axis is first resized to the mask length.
    pub(crate) fn retain_epochs(&mut self, mask: &[bool]) {
        let mut index = 0;
        let row = vec![vec![MISSING; self.codes.len()]; self.nb_satellites];
        self.data.resize(mask.len(), row);
        self.data.retain(|_| {
            let keep = mask[index];
            index += 1;
            keep
        });
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn allocation() {
        let mut obs = SystemObservations::new(Constellation::GPS);
        assert!(obs.allocate(10, 32).is_err());

        obs.push_code("C1");
        obs.push_code("L1");
        obs.push_code("C1");
        assert_eq!(obs.codes(), &["C1".to_string(), "L1".to_string()]);

        assert!(obs.allocate(10, 32).is_ok());
        assert_eq!(obs.nb_epochs(), 10);
        assert_eq!(obs.nb_satellites(), 32);
        assert_eq!(obs.value(9, 31, 1), MISSING);
        assert!(obs.is_epoch_empty(0));
    }

    #[test]
    fn column_lookup() {
        let mut obs = SystemObservations::new(Constellation::Galileo);
        obs.push_code("C1C");
        obs.push_code("L5Q");
        assert_eq!(obs.column_of("L5Q"), Some(1));
        assert_eq!(obs.column_of("C1C"), Some(0));
        assert_eq!(obs.column_of("C1"), None);
        assert!(obs.has_observation("C1C"));
        assert!(!obs.has_observation("D1C"));
    }

    #[test]
    fn insertion_and_growth() {
        let mut obs = SystemObservations::new(Constellation::GPS);
        obs.push_code("C1");
        obs.allocate(2, 32).unwrap();

        obs.insert(0, 4, 0, 10.0);
        obs.insert(5, 4, 0, 20.0);
        assert_eq!(obs.nb_epochs(), 6);
        assert_eq!(obs.value(0, 4, 0), 10.0);
        assert_eq!(obs.value(5, 4, 0), 20.0);

        // ignored
        obs.insert(0, 40, 0, 1.0);
        obs.insert(0, 1, 3, 1.0);
        assert!(!obs.is_epoch_empty(0));
        assert!(obs.is_epoch_empty(1));

        obs.retain_epochs(&[true, false, false, false, false, true]);
        assert_eq!(obs.nb_epochs(), 2);
        assert_eq!(obs.value(1, 4, 0), 20.0);
    }
}
