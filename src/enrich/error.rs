use crate::enrich::columns::CoordinateAxis;
use std::path::PathBuf;
use thiserror::Error;

/// File-level failures. Row-level problems never surface here; they end up as
/// placeholder text in the `location` column.
#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("Input file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Required {axis} column not found. Available columns: {available:?}")]
    ColumnNotFound {
        axis: CoordinateAxis,
        available: Vec<String>,
    },

    #[error("Failed to process CSV '{path}'")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to create output directory '{0}'")]
    OutputDirCreation(PathBuf, #[source] std::io::Error),

    #[error("Failed to save output file '{0}'")]
    OutputPersist(PathBuf, #[source] std::io::Error),

    #[error("I/O error while enriching '{path}'")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to set up the geocoder")]
    GeocoderSetup(#[source] GeocodeError),

    #[error("Enrichment of '{0}' was cancelled")]
    Cancelled(PathBuf),
}

#[derive(Debug, Error)]
pub enum ReprojectError {
    #[error("Invalid {which} projection '{definition}': {message}")]
    InvalidProjection {
        which: &'static str,
        definition: String,
        message: String,
    },

    #[error("Coordinate ({x}, {y}) is not a number")]
    NonFinite { x: f64, y: f64 },

    #[error("Failed to transform ({x}, {y}): {message}")]
    Transform { x: f64, y: f64, message: String },
}

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("Failed to build geocoding client")]
    ClientBuild(#[source] reqwest::Error),

    #[error("Reverse geocoding request failed")]
    Request(#[source] reqwest::Error),

    #[error("Geocoding service answered with status {0}")]
    Status(u16),

    #[error("Failed to parse geocoding response")]
    Parse(#[source] serde_json::Error),
}
