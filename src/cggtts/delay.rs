use crate::errors::ParsingError;

use log::{debug, warn};
use regex::Regex;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[cfg(doc)]
use crate::prelude::Cggtts;

/// Code attached to delays that do not name one (single frequency V1 files)
pub const DEFAULT_DELAY_CODE: &str = "C1";

/// Indication about precise system delay calibration process,
/// as found in [Cggtts].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CalibrationID {
    /// ID # of this calibration process
    pub process_id: u16,
    /// Year of calibration
    pub year: u16,
}

impl std::str::FromStr for CalibrationID {
    type Err = ParsingError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut items = s.trim().split('-');
        let process_id = items.next().and_then(|item| item.parse::<u16>().ok());
        let year = items.next().and_then(|item| item.parse::<u16>().ok());
        match (process_id, year, items.next()) {
            (Some(process_id), Some(year), None) => Ok(Self { process_id, year }),
            _ => Err(ParsingError::InvalidCalibrationId),
        }
    }
}

/// [Delay] describes all supported types of propagation delay.
/// NB: the specified value is always in nanoseconds.
#[derive(Debug, PartialEq, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Delay {
    /// Delay defined as internal in nanoseconds
    Internal(f64),
    /// Systemic delay, in nanoseconds
    System(f64),
    /// Total delay (system + cables), in nanoseconds
    Total(f64),
}

impl Default for Delay {
    fn default() -> Delay {
        Delay::System(0.0_f64)
    }
}

impl Delay {
    /// Returns delay in nanoseconds, whatever its kind.
    pub fn nanoseconds(&self) -> f64 {
        match self {
            Delay::Internal(d) | Delay::System(d) | Delay::Total(d) => *d,
        }
    }

    /// Returns delay in seconds, whatever its kind.
    pub fn seconds(&self) -> f64 {
        self.nanoseconds() * 1.0E-9
    }
}

/// [SystemDelay] describes total measurement systems delay,
/// as declared in the header of a [Cggtts].
///
/// ```
/// use cvmatch::prelude::SystemDelay;
///
/// let system_specs = SystemDelay::default()
///     .with_antenna_cable_delay(10.0)
///     .with_ref_delay(20.0);
///
/// assert_eq!(system_specs.total_cable_delay_nanos(), 30.0);
/// ```
#[derive(Clone, Default, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SystemDelay {
    /// Delay induced by GNSS antenna cable length.
    pub antenna_cable_delay: f64,
    /// Delay induced by cable between measurement system
    /// and local clock.
    pub local_ref_delay: f64,
    /// Carrier frequency dependent delays, per code
    pub freq_dependent_delays: Vec<(String, Delay)>,
    /// Possible calibration ID
    pub calibration_id: Option<CalibrationID>,
}

impl SystemDelay {
    /// Define new [SystemDelay] with desired RF cable delay in nanoseconds
    pub fn with_antenna_cable_delay(&self, nanos: f64) -> Self {
        let mut s = self.clone();
        s.antenna_cable_delay = nanos;
        s
    }

    /// Define new [SystemDelay] with REF delay in nanoseconds,
    /// ie., the delay induced by cable between the measurement
    /// system and the local clock.
    pub fn with_ref_delay(&self, nanos: f64) -> Self {
        let mut s = self.clone();
        s.local_ref_delay = nanos;
        s
    }

    /// Returns total cable delay in nanoseconds, that will affect all measurements.
    pub fn total_cable_delay_nanos(&self) -> f64 {
        self.antenna_cable_delay + self.local_ref_delay
    }

    /// Returns total delay in nanoseconds for this code, if we have
    /// specifications for it. [Delay::Total] already includes cables.
    pub fn total_frequency_dependent_delay_nanos(&self, code: &str) -> Option<f64> {
        self.freq_dependent_delays
            .iter()
            .find(|(c, _)| c == code)
            .map(|(_, delay)| match delay {
                Delay::Total(d) => *d,
                delay => delay.nanoseconds() + self.total_cable_delay_nanos(),
            })
    }
}

/// Extracts delay values out of "XXX DLY = " header lines, ie.,
/// "INT DLY =   34.6 ns (GPS C1),   0.0 ns (GPS P2)     CAL_ID = 1015-2024".
pub(crate) struct DelayParser {
    value: Regex,
    calibration: Regex,
}

impl DelayParser {
    pub fn new() -> Result<Self, ParsingError> {
        Ok(Self {
            value: Regex::new(
                r"(?P<value>[-+]?\d+(?:\.\d+)?)\s*ns(?:\s*\(\s*(?P<system>\w+)\s+(?P<code>\w+)\s*\))?",
            )?,
            calibration: Regex::new(r"CAL_ID\s*=\s*(?P<id>\S+)")?,
        })
    }

    /// Parses the content (right hand side) of a delay line.
    /// Malformed content is reported and leaves [SystemDelay] untouched.
    pub fn parse(&self, key: &str, content: &str, delay: &mut SystemDelay) {
        let (values, calibration) = match content.find("CAL_ID") {
            Some(offset) => content.split_at(offset),
            None => (content, ""),
        };

        if let Some(id) = self.calibration.captures(calibration).and_then(|c| c.name("id")) {
            match id.as_str().parse::<CalibrationID>() {
                Ok(id) => delay.calibration_id = Some(id),
                Err(_) => debug!("unspecified calibration id \"{}\"", id.as_str()),
            }
        }

        let mut found = false;
        for capture in self.value.captures_iter(values) {
            let value = match capture.name("value").map(|v| v.as_str().parse::<f64>()) {
                Some(Ok(value)) => value,
                _ => continue,
            };
            let code = capture
                .name("code")
                .map(|c| c.as_str())
                .unwrap_or(DEFAULT_DELAY_CODE)
                .to_string();
            found = true;
            match key {
                "CAB DLY" => delay.antenna_cable_delay = value,
                "REF DLY" => delay.local_ref_delay = value,
                "INT DLY" => delay.freq_dependent_delays.push((code, Delay::Internal(value))),
                "SYS DLY" => delay.freq_dependent_delays.push((code, Delay::System(value))),
                "TOT DLY" => delay.freq_dependent_delays.push((code, Delay::Total(value))),
                _ => {
                    found = false;
                    break;
                },
            }
        }

        if !found {
            warn!("\"{} = {}\": invalid delay, using 0.0 ns", key, content.trim());
        }
    }
}
