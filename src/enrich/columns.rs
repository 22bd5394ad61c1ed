//! Finds the two coordinate columns in a CSV header.

use crate::enrich::error::EnrichError;
use csv::StringRecord;
use std::fmt;

/// Accepted names for the first coordinate column, compared case-insensitively.
/// Projected names come first, geographic ones last.
pub const EASTING_SYNONYMS: [&str; 4] = ["easting", "x", "longitude", "lon"];
/// Accepted names for the second coordinate column.
pub const NORTHING_SYNONYMS: [&str; 4] = ["northing", "y", "latitude", "lat"];

const GEOGRAPHIC_EASTING: [&str; 2] = ["longitude", "lon"];
const GEOGRAPHIC_NORTHING: [&str; 2] = ["latitude", "lat"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateAxis {
    Easting,
    Northing,
}

impl fmt::Display for CoordinateAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordinateAxis::Easting => f.write_str("easting"),
            CoordinateAxis::Northing => f.write_str("northing"),
        }
    }
}

/// Whether the located columns still need reprojection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateKind {
    Projected,
    /// Both columns are longitude/latitude already.
    Geographic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinateColumns {
    pub easting: usize,
    pub northing: usize,
    pub kind: CoordinateKind,
}

impl CoordinateColumns {
    /// Picks, for each axis, the column whose name comes earliest in its synonym list.
    ///
    /// Tile CSVs carry both `latitude,longitude` and `easting,northing`; the projected
    /// pair wins regardless of column order.
    pub fn locate(header: &StringRecord) -> Result<Self, EnrichError> {
        let names: Vec<String> = header
            .iter()
            .map(|name| name.trim().to_lowercase())
            .collect();
        let find = |synonyms: &[&str]| {
            synonyms
                .iter()
                .find_map(|synonym| names.iter().position(|n| n == synonym))
        };

        let missing = |axis| EnrichError::ColumnNotFound {
            axis,
            available: header.iter().map(str::to_string).collect(),
        };
        let easting = find(&EASTING_SYNONYMS).ok_or_else(|| missing(CoordinateAxis::Easting))?;
        let northing = find(&NORTHING_SYNONYMS).ok_or_else(|| missing(CoordinateAxis::Northing))?;

        let geographic = GEOGRAPHIC_EASTING.contains(&names[easting].as_str())
            && GEOGRAPHIC_NORTHING.contains(&names[northing].as_str());
        Ok(Self {
            easting,
            northing,
            kind: if geographic {
                CoordinateKind::Geographic
            } else {
                CoordinateKind::Projected
            },
        })
    }

    /// Where the `location` column goes: right after the northing column.
    pub fn location_index(&self) -> usize {
        self.northing + 1
    }
}
