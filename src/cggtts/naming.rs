use strum_macros::{Display, EnumString};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Daily CGGTTS file naming conventions, used by multi day loads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, EnumString, Display)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[strum(ascii_case_insensitive)]
pub enum NamingConvention {
    /// "{MJD}{stub}", ie., "59569.cctf"
    #[default]
    #[strum(to_string = "simple")]
    Simple,
    /// Fixed width "{stub}{MJD / 1000}.{MJD % 1000}", ie., "GZLI2P59.569"
    #[strum(to_string = "lab")]
    Lab,
}

impl NamingConvention {
    /// File name for this MJD
    /// ```
    /// use cvmatch::prelude::NamingConvention;
    /// assert_eq!(NamingConvention::Simple.file_name(59569, ".cctf"), "59569.cctf");
    /// assert_eq!(NamingConvention::Lab.file_name(59569, "GZLI2P"), "GZLI2P59.569");
    /// assert_eq!(NamingConvention::Lab.file_name(60004, "GZLI2P"), "GZLI2P60.004");
    /// ```
    pub fn file_name(&self, mjd: u32, stub: &str) -> String {
        match self {
            Self::Simple => format!("{}{}", mjd, stub),
            Self::Lab => format!("{}{:02}.{:03}", stub, mjd / 1000, mjd % 1000),
        }
    }
}
