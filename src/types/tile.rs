//! Defines [`TileAddress`], the value describing one downloadable EGMS archive, together
//! with the enumerated fields it is built from (processing level, swath, polarization,
//! displacement component and year range).
//!
//! The archive's file name prefix is derived purely from these fields. The same prefix is
//! embedded in the download URL and in the names of the CSV entries inside the returned
//! zip archive, so it must be rendered byte-for-byte the way the archive service names its
//! files.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Largest relative orbit that still renders as a 3-digit, zero-padded field.
pub const MAX_RELATIVE_ORBIT: u16 = 999;
/// Largest burst cycle that still renders as a 4-digit, zero-padded field.
pub const MAX_BURST_CYCLE: u16 = 9999;

/// Errors raised when a tile field cannot be parsed or does not fit its fixed-width slot.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TileError {
    #[error("Unknown processing level '{0}' (expected L2A, L2B or L3)")]
    UnknownLevel(String),

    #[error("'{0}' is not an L2 processing level (expected L2A or L2B)")]
    NotAnL2Level(String),

    #[error("Unknown swath '{0}' (expected IW1, IW2 or IW3)")]
    UnknownSwath(String),

    #[error("Unknown polarization '{0}' (expected VV, VH, HH or HV)")]
    UnknownPolarization(String),

    #[error("Unknown displacement component '{0}' (expected E or U)")]
    UnknownDisplacement(String),

    #[error("Unknown year range '{0}' (expected 2018_2022, 2019_2023 or 2020_2024)")]
    UnknownYearRange(String),

    #[error("Relative orbit {0} does not fit in 3 digits")]
    RelativeOrbitOutOfRange(u16),

    #[error("Burst cycle {0} does not fit in 4 digits")]
    BurstCycleOutOfRange(u16),
}

/// Processing level of the ground-motion product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Level {
    /// Basic level in SAR geometry.
    L2A,
    /// Calibrated level in SAR geometry.
    L2B,
    /// Ortho product resampled to the 100 km geographic grid.
    L3,
}

impl Level {
    /// The spelling used by the archive in URLs and entry names (`L2a`, `L2b`, `L3`).
    pub fn archive_code(&self) -> &'static str {
        match self {
            Level::L2A => "L2a",
            Level::L2B => "L2b",
            Level::L3 => "L3",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Level::L2A => "L2A",
            Level::L2B => "L2B",
            Level::L3 => "L3",
        };
        f.write_str(label)
    }
}

impl FromStr for Level {
    type Err = TileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "L2A" => Ok(Level::L2A),
            "L2B" => Ok(Level::L2B),
            "L3" => Ok(Level::L3),
            _ => Err(TileError::UnknownLevel(s.to_string())),
        }
    }
}

/// The subset of [`Level`] addressed by orbit, burst cycle, swath and polarization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum L2Level {
    L2A,
    L2B,
}

impl From<L2Level> for Level {
    fn from(level: L2Level) -> Self {
        match level {
            L2Level::L2A => Level::L2A,
            L2Level::L2B => Level::L2B,
        }
    }
}

impl fmt::Display for L2Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Level::from(*self).fmt(f)
    }
}

impl FromStr for L2Level {
    type Err = TileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<Level>()? {
            Level::L2A => Ok(L2Level::L2A),
            Level::L2B => Ok(L2Level::L2B),
            Level::L3 => Err(TileError::NotAnL2Level(s.to_string())),
        }
    }
}

/// Interferometric Wide swath of a Sentinel-1 burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Swath {
    IW1,
    IW2,
    IW3,
}

impl Swath {
    pub const ALL: [Swath; 3] = [Swath::IW1, Swath::IW2, Swath::IW3];

    pub fn code(&self) -> &'static str {
        match self {
            Swath::IW1 => "IW1",
            Swath::IW2 => "IW2",
            Swath::IW3 => "IW3",
        }
    }
}

impl fmt::Display for Swath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Swath {
    type Err = TileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IW1" => Ok(Swath::IW1),
            "IW2" => Ok(Swath::IW2),
            "IW3" => Ok(Swath::IW3),
            _ => Err(TileError::UnknownSwath(s.to_string())),
        }
    }
}

/// Radar polarization (transmit/receive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Polarization {
    VV,
    VH,
    HH,
    HV,
}

impl Polarization {
    pub fn code(&self) -> &'static str {
        match self {
            Polarization::VV => "VV",
            Polarization::VH => "VH",
            Polarization::HH => "HH",
            Polarization::HV => "HV",
        }
    }
}

impl fmt::Display for Polarization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Polarization {
    type Err = TileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "VV" => Ok(Polarization::VV),
            "VH" => Ok(Polarization::VH),
            "HH" => Ok(Polarization::HH),
            "HV" => Ok(Polarization::HV),
            _ => Err(TileError::UnknownPolarization(s.to_string())),
        }
    }
}

/// Displacement component of an L3 ortho product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Displacement {
    /// East-west motion (`E`).
    East,
    /// Vertical motion (`U`).
    Up,
}

impl Displacement {
    pub fn code(&self) -> &'static str {
        match self {
            Displacement::East => "E",
            Displacement::Up => "U",
        }
    }
}

impl fmt::Display for Displacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Displacement {
    type Err = TileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "E" => Ok(Displacement::East),
            "U" => Ok(Displacement::Up),
            _ => Err(TileError::UnknownDisplacement(s.to_string())),
        }
    }
}

/// The five-year processing windows published by the archive.
///
/// # Examples
///
/// ```
/// use egms::YearRange;
///
/// let range: YearRange = "2019_2023".parse().unwrap();
/// assert_eq!(range, YearRange::Y2019_2023);
/// assert_eq!(range.to_string(), "2019_2023");
/// ```
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum YearRange {
    #[default]
    #[serde(rename = "2018_2022")]
    Y2018_2022,
    #[serde(rename = "2019_2023")]
    Y2019_2023,
    #[serde(rename = "2020_2024")]
    Y2020_2024,
}

impl YearRange {
    pub const ALL: [YearRange; 3] = [
        YearRange::Y2018_2022,
        YearRange::Y2019_2023,
        YearRange::Y2020_2024,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            YearRange::Y2018_2022 => "2018_2022",
            YearRange::Y2019_2023 => "2019_2023",
            YearRange::Y2020_2024 => "2020_2024",
        }
    }
}

impl fmt::Display for YearRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for YearRange {
    type Err = TileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace('-', "_");
        YearRange::ALL
            .into_iter()
            .find(|range| range.code() == normalized)
            .ok_or_else(|| TileError::UnknownYearRange(s.to_string()))
    }
}

/// Level-specific coordinates of a tile. Each variant carries exactly the fields its
/// level requires, so an L3 tile can never be missing its grid cell and an L2 tile can
/// never be missing its swath.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileCoords {
    L2 {
        level: L2Level,
        relative_orbit: u16,
        burst_cycle: u16,
        swath: Swath,
        polarization: Polarization,
    },
    L3 {
        /// 100 km grid column.
        east: u16,
        /// 100 km grid row.
        north: u16,
        displacement: Displacement,
    },
}

/// One download target in the ground-motion archive.
///
/// Build one with [`TileAddress::l2`] or [`TileAddress::l3`]. Two addresses with equal
/// fields always render identical prefixes and URLs.
///
/// # Examples
///
/// ```
/// use egms::{L2Level, Polarization, Swath, TileAddress, YearRange};
///
/// let tile = TileAddress::l2(
///     L2Level::L2A, 52, 716, Swath::IW2, Polarization::VV,
///     YearRange::Y2018_2022, "token",
/// ).unwrap();
/// assert_eq!(tile.filename_prefix(), "EGMS_L2a_052_0716_IW2_VV_2018_2022_1");
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TileAddress {
    pub coords: TileCoords,
    pub year_range: YearRange,
    pub access_token: String,
}

impl TileAddress {
    /// Creates an L2 address, validating that the orbit and burst cycle fit their
    /// zero-padded widths.
    pub fn l2(
        level: L2Level,
        relative_orbit: u16,
        burst_cycle: u16,
        swath: Swath,
        polarization: Polarization,
        year_range: YearRange,
        access_token: impl Into<String>,
    ) -> Result<Self, TileError> {
        if relative_orbit > MAX_RELATIVE_ORBIT {
            return Err(TileError::RelativeOrbitOutOfRange(relative_orbit));
        }
        if burst_cycle > MAX_BURST_CYCLE {
            return Err(TileError::BurstCycleOutOfRange(burst_cycle));
        }
        Ok(Self {
            coords: TileCoords::L2 {
                level,
                relative_orbit,
                burst_cycle,
                swath,
                polarization,
            },
            year_range,
            access_token: access_token.into(),
        })
    }

    /// Creates an L3 address for one 100 km grid cell.
    pub fn l3(
        east: u16,
        north: u16,
        displacement: Displacement,
        year_range: YearRange,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            coords: TileCoords::L3 {
                east,
                north,
                displacement,
            },
            year_range,
            access_token: access_token.into(),
        }
    }

    pub fn level(&self) -> Level {
        match self.coords {
            TileCoords::L2 { level, .. } => level.into(),
            TileCoords::L3 { .. } => Level::L3,
        }
    }

    /// The archive base name, e.g. `EGMS_L3_E32N31_100km_U_2019_2023_1`.
    ///
    /// Used verbatim both in the URL and as the substring filter for zip entries.
    pub fn filename_prefix(&self) -> String {
        format!("EGMS_{}_{}_1", self.body(), self.year_range)
    }

    /// The full download URL under `archive_url`. The access token travels as the `id`
    /// query parameter.
    pub fn url(&self, archive_url: &str) -> String {
        format!(
            "{}/{}.zip?id={}",
            archive_url.trim_end_matches('/'),
            self.filename_prefix(),
            self.access_token
        )
    }

    /// A short label for progress lines, without year range or token.
    pub fn label(&self) -> String {
        match self.coords {
            TileCoords::L2 { .. } => self.body(),
            TileCoords::L3 {
                east,
                north,
                displacement,
            } => format!("E{east}N{north} {displacement}"),
        }
    }

    fn body(&self) -> String {
        match self.coords {
            TileCoords::L2 {
                level,
                relative_orbit,
                burst_cycle,
                swath,
                polarization,
            } => format!(
                "{}_{:03}_{:04}_{}_{}",
                Level::from(level).archive_code(),
                relative_orbit,
                burst_cycle,
                swath,
                polarization
            ),
            TileCoords::L3 {
                east,
                north,
                displacement,
            } => format!("L3_E{east}N{north}_100km_{displacement}"),
        }
    }
}

// Hand-written so the access token never ends up in log lines.
impl fmt::Debug for TileAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileAddress")
            .field("coords", &self.coords)
            .field("year_range", &self.year_range)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

impl fmt::Display for TileAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.filename_prefix())
    }
}
