//! CGGTTS header section
use crate::{
    cggtts::{
        delay::{DelayParser, SystemDelay},
        layout::{ColumnLayout, FrequencyMode},
        ReferenceTime, Version,
    },
    errors::ParsingError,
    prelude::Epoch,
};

use log::{debug, warn};
use scan_fmt::scan_fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Antenna phase center coordinates, in meters
#[derive(PartialEq, Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Coordinates {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// [Hardware] is used to describe a piece of equipment.
/// Usually the GNSS receiver.
#[derive(Clone, PartialEq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Hardware {
    /// Manufacturer
    pub manufacturer: String,
    /// Model type.
    pub model: String,
    /// Readable serial number.
    pub serial_number: String,
    /// Year of production or release
    pub year: u16,
    /// Software or firmware version
    pub release: String,
}

impl FromStr for Hardware {
    type Err = ParsingError;
    /// Parses "MANUFACTURER MODEL SERIAL YEAR RELEASE"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match scan_fmt!(s, "{} {} {} {d} {}", String, String, String, u16, String) {
            (Some(manufacturer), Some(model), Some(serial_number), Some(year), Some(release)) => {
                Ok(Self {
                    manufacturer,
                    model,
                    serial_number,
                    year,
                    release,
                })
            },
            _ => Err(ParsingError::MissingHeaderField("hardware description")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Header {
    /// File revision
    pub version: Version,
    /// Revision date, as declared
    pub revision_date: Option<Epoch>,
    /// Laboratory (data producer)
    pub lab: String,
    /// Possible information about GNSS receiver
    pub receiver: Option<Hardware>,
    /// # of channels this GNSS receiver possesses
    pub nb_channels: u16,
    /// Possible Ionospheric Measurement System (IMS) information.
    pub ims_hardware: Option<Hardware>,
    /// [ReferenceTime] tracks are solved against
    pub reference_time: ReferenceTime,
    /// Name of the ECEF frame APC coordinates are expressed in
    pub reference_frame: Option<String>,
    /// Antenna Phase Center (APC) coordinates in meters
    pub apc_coordinates: Coordinates,
    /// Short readable comments (if any)
    pub comments: Option<String>,
    /// Measurement [SystemDelay]
    pub delay: SystemDelay,
    /// Dual frequency files carry ionospheric measurements
    pub frequency: FrequencyMode,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            version: Version::default(),
            revision_date: None,
            lab: String::from("LAB"),
            receiver: None,
            nb_channels: 0,
            ims_hardware: None,
            reference_time: ReferenceTime::default(),
            reference_frame: None,
            apc_coordinates: Coordinates::default(),
            comments: None,
            delay: SystemDelay::default(),
            frequency: FrequencyMode::default(),
        }
    }
}

/// Assigns one "KEY = value" header line
type Setter = fn(&mut Header, &str, &DelayParser);

/// Header line classifier: key (left hand side of "=") and its setter.
/// Lines that do not appear here are ignored.
const SETTERS: [(&str, Setter); 17] = [
    ("REV DATE", set_revision_date),
    ("RCVR", set_receiver),
    ("CH", set_channels),
    ("IMS", set_ims),
    ("LAB", set_lab),
    ("X", set_x),
    ("Y", set_y),
    ("Z", set_z),
    ("FRAME", set_frame),
    ("COMMENTS", set_comments),
    ("INT DLY", set_internal_delay),
    ("SYS DLY", set_system_delay),
    ("TOT DLY", set_total_delay),
    ("CAB DLY", set_cable_delay),
    ("REF DLY", set_ref_delay),
    ("REF", set_reference_time),
    ("CKSUM", set_checksum),
];

fn set_revision_date(header: &mut Header, content: &str, _: &DelayParser) {
    let date = match scan_fmt!(content, "{d}-{d}-{d}", i32, u8, u8) {
        (Some(y), Some(m), Some(d)) => Epoch::maybe_from_gregorian_utc(y, m, d, 0, 0, 0, 0).ok(),
        _ => None,
    };
    match date {
        Some(date) => header.revision_date = Some(date),
        None => warn!("invalid revision date \"{}\"", content),
    }
}

fn set_receiver(header: &mut Header, content: &str, _: &DelayParser) {
    match Hardware::from_str(content) {
        Ok(hw) => header.receiver = Some(hw),
        Err(_) => debug!("unusual receiver description \"{}\"", content),
    }
}

fn set_ims(header: &mut Header, content: &str, _: &DelayParser) {
    if let Ok(hw) = Hardware::from_str(content) {
        header.ims_hardware = Some(hw);
    }
}

fn set_channels(header: &mut Header, content: &str, _: &DelayParser) {
    match scan_fmt!(content, "{d}", u16) {
        Some(n) => header.nb_channels = n,
        None => warn!("invalid channel count \"{}\"", content),
    }
}

fn set_lab(header: &mut Header, content: &str, _: &DelayParser) {
    header.lab = content.to_string();
}

fn coordinate(content: &str) -> Option<f64> {
    let value = scan_fmt!(content, "{f}", f64);
    if value.is_none() {
        warn!("invalid coordinate \"{}\"", content);
    }
    value
}

fn set_x(header: &mut Header, content: &str, _: &DelayParser) {
    if let Some(x) = coordinate(content) {
        header.apc_coordinates.x = x;
    }
}

fn set_y(header: &mut Header, content: &str, _: &DelayParser) {
    if let Some(y) = coordinate(content) {
        header.apc_coordinates.y = y;
    }
}

fn set_z(header: &mut Header, content: &str, _: &DelayParser) {
    if let Some(z) = coordinate(content) {
        header.apc_coordinates.z = z;
    }
}

fn set_frame(header: &mut Header, content: &str, _: &DelayParser) {
    if !content.is_empty() && content != "?" {
        header.reference_frame = Some(content.to_string());
    }
}

fn set_comments(header: &mut Header, content: &str, _: &DelayParser) {
    if !content.is_empty() && content != "NO COMMENTS" {
        header.comments = Some(content.to_string());
    }
}

fn set_reference_time(header: &mut Header, content: &str, _: &DelayParser) {
    if let Ok(reference) = ReferenceTime::from_str(content) {
        header.reference_time = reference;
    }
}

fn set_internal_delay(header: &mut Header, content: &str, delays: &DelayParser) {
    delays.parse("INT DLY", content, &mut header.delay);
}

fn set_system_delay(header: &mut Header, content: &str, delays: &DelayParser) {
    delays.parse("SYS DLY", content, &mut header.delay);
}

fn set_total_delay(header: &mut Header, content: &str, delays: &DelayParser) {
    delays.parse("TOT DLY", content, &mut header.delay);
}

fn set_cable_delay(header: &mut Header, content: &str, delays: &DelayParser) {
    delays.parse("CAB DLY", content, &mut header.delay);
}

fn set_ref_delay(header: &mut Header, content: &str, delays: &DelayParser) {
    delays.parse("REF DLY", content, &mut header.delay);
}

fn set_checksum(_: &mut Header, content: &str, _: &DelayParser) {
    debug!("header checksum {} is not verified", content);
}

impl Header {
    /// Runs the classifier over one "KEY = value" line.
    fn classify(&mut self, line: &str, delays: &DelayParser) {
        let (key, content) = match line.find('=') {
            Some(offset) => (line[..offset].trim(), line[offset + 1..].trim()),
            None => {
                debug!("unexpected header line \"{}\"", line);
                return;
            },
        };
        match SETTERS.iter().find(|(k, _)| *k == key) {
            Some((_, setter)) => setter(self, content, delays),
            None => debug!("unknown header field \"{}\"", key),
        }
    }

    /// Parses the header section, up to and including the field units line.
    /// The first line must declare the file revision.
    pub fn parse<I: Iterator<Item = std::io::Result<String>>>(
        lines: &mut I,
    ) -> Result<Self, ParsingError> {
        let first = lines.next().ok_or(ParsingError::VersionFormat)??;
        if !first.contains("DATA FORMAT VERSION") {
            return Err(ParsingError::VersionFormat);
        }
        let version = match first.find('=') {
            Some(offset) => Version::from_str(&first[offset + 1..])?,
            None => return Err(ParsingError::VersionFormat),
        };

        let delays = DelayParser::new()?;
        let mut header = Self {
            version,
            ..Default::default()
        };

        let mut labels = false;
        for line in lines {
            let line = line?;
            if labels {
                // units line concludes this section
                return Ok(header);
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match trimmed.split_ascii_whitespace().next() {
                Some("SAT") | Some("PRN") => {
                    labels = true;
                    if trimmed.contains("MSIO") {
                        header.frequency = FrequencyMode::Dual;
                    }
                    let layout = ColumnLayout::new(header.version, header.frequency);
                    if !layout.matches_labels(trimmed) {
                        warn!("unexpected track labels \"{}\"", trimmed);
                    }
                },
                _ => header.classify(trimmed, &delays),
            }
        }
        Err(ParsingError::MissingHeaderSection)
    }
}
