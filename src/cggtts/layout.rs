//! Track table layout, resolved once per file
use crate::cggtts::Version;

use strum_macros::{Display, EnumString};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Numerical track columns. Values are stored in file units
/// (for example REFSYS in 0.1 ns), STTIME is converted to seconds of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[strum(ascii_case_insensitive)]
pub enum Column {
    #[strum(to_string = "MJD")]
    Mjd,
    #[strum(to_string = "STTIME")]
    StTime,
    #[strum(to_string = "TRKL")]
    Trkl,
    #[strum(to_string = "ELV")]
    Elv,
    #[strum(to_string = "AZTH")]
    Azth,
    #[strum(to_string = "REFSV")]
    Refsv,
    #[strum(to_string = "SRSV")]
    Srsv,
    /// Named REFGPS in V1 files
    #[strum(to_string = "REFSYS", serialize = "REFGPS")]
    Refsys,
    /// Named SRGPS in V1 files
    #[strum(to_string = "SRSYS", serialize = "SRGPS")]
    Srsys,
    #[strum(to_string = "DSG")]
    Dsg,
    #[strum(to_string = "IOE")]
    Ioe,
    #[strum(to_string = "MDTR")]
    Mdtr,
    #[strum(to_string = "SMDT")]
    Smdt,
    #[strum(to_string = "MDIO")]
    Mdio,
    #[strum(to_string = "SMDI")]
    Smdi,
    #[strum(to_string = "MSIO")]
    Msio,
    #[strum(to_string = "SMSI")]
    Smsi,
    #[strum(to_string = "ISG")]
    Isg,
    #[strum(to_string = "FR")]
    Fr,
    #[strum(to_string = "HC")]
    Hc,
}

/// Single or dual frequency tracks: dual frequency
/// tracks carry measured ionospheric data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FrequencyMode {
    #[default]
    Single,
    Dual,
}

/// One whitespace separated field of a track line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Field {
    /// "G05" (V2E) or PRN only (V1, V2)
    Satellite,
    /// Common view class
    Class,
    Value(Column),
    /// Frequency code (V2E)
    Frc,
    /// Line checksum
    Checksum,
}

const COMMON: [Column; 15] = [
    Column::Mjd,
    Column::StTime,
    Column::Trkl,
    Column::Elv,
    Column::Azth,
    Column::Refsv,
    Column::Srsv,
    Column::Refsys,
    Column::Srsys,
    Column::Dsg,
    Column::Ioe,
    Column::Mdtr,
    Column::Smdt,
    Column::Mdio,
    Column::Smdi,
];

const IONOSPHERIC: [Column; 3] = [Column::Msio, Column::Smsi, Column::Isg];

const HARDWARE: [Column; 2] = [Column::Fr, Column::Hc];

/// [ColumnLayout] describes where each field lives, for one
/// [Version] and [FrequencyMode] combination. Numerical columns
/// always read through [ColumnLayout::index]: their position differs
/// from one layout to another.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ColumnLayout {
    version: Version,
    frequency: FrequencyMode,
    /// Track line fields, in file order
    fields: Vec<Field>,
    /// Numerical columns, in storage order
    columns: Vec<Column>,
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self::new(Version::default(), FrequencyMode::default())
    }
}

impl ColumnLayout {
    /// Builds the [ColumnLayout] of this file revision and frequency mode.
    pub fn new(version: Version, frequency: FrequencyMode) -> Self {
        let mut columns = COMMON.to_vec();
        if frequency == FrequencyMode::Dual {
            columns.extend_from_slice(&IONOSPHERIC);
        }
        if version != Version::Version1 {
            columns.extend_from_slice(&HARDWARE);
        }

        let mut fields = vec![Field::Satellite, Field::Class];
        fields.extend(columns.iter().map(|c| Field::Value(*c)));
        if version == Version::Version2E {
            fields.push(Field::Frc);
        }
        fields.push(Field::Checksum);

        Self {
            version,
            frequency,
            fields,
            columns,
        }
    }

    /// File revision
    pub fn version(&self) -> Version {
        self.version
    }

    /// Frequency mode
    pub fn frequency(&self) -> FrequencyMode {
        self.frequency
    }

    /// Returns true when tracks carry measured ionospheric data
    pub fn has_ionospheric_data(&self) -> bool {
        self.frequency == FrequencyMode::Dual
    }

    /// Numerical columns, in storage order
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Storage index of this column, if this layout has it
    pub fn index(&self, column: Column) -> Option<usize> {
        self.columns.iter().position(|c| *c == column)
    }

    /// Returns true if this layout has this column
    pub fn has(&self, column: Column) -> bool {
        self.index(column).is_some()
    }

    /// Track line fields, in file order
    pub(crate) fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Labels we expect on the header line that introduces tracks
    pub fn labels(&self) -> Vec<String> {
        self.fields
            .iter()
            .map(|field| match field {
                Field::Satellite => {
                    if self.version.has_satellite_system() {
                        "SAT".to_string()
                    } else {
                        "PRN".to_string()
                    }
                },
                Field::Class => "CL".to_string(),
                Field::Value(Column::Refsys) if self.version == Version::Version1 => {
                    "REFGPS".to_string()
                },
                Field::Value(Column::Srsys) if self.version == Version::Version1 => {
                    "SRGPS".to_string()
                },
                Field::Value(column) => column.to_string(),
                Field::Frc => "FRC".to_string(),
                Field::Checksum => "CK".to_string(),
            })
            .collect()
    }

    /// Returns true if this header line introduces tracks of this layout
    pub fn matches_labels(&self, line: &str) -> bool {
        let labels = self.labels();
        line.split_ascii_whitespace()
            .map(|label| match label {
                "PRN" | "SAT" => labels.first().map(|s| s.as_str()).unwrap_or(label),
                label => label,
            })
            .eq(labels.iter().map(|s| s.as_str()))
    }
}
