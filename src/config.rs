//! Runtime configuration shared by the downloader and the location enricher.
//!
//! Every field has a default, so a config file only needs the values it changes:
//!
//! ```json
//! { "access_token": "7ce0...", "year_range": "2019_2023", "delay_seconds": 3.0 }
//! ```

use crate::types::tile::YearRange;
use crate::utils::default_config_path;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_ARCHIVE_URL: &str = "https://egms.land.copernicus.eu/insar-api/archive/download";
pub const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org";

/// ETRS89-extended / LAEA Europe (EPSG:3035), the grid the archive's CSVs are projected in.
pub const ETRS89_LAEA_EUROPE: &str = "+proj=laea +lat_0=52 +lon_0=10 +x_0=4321000 +y_0=3210000 +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +units=m +no_defs";
/// WGS 84 longitude/latitude (EPSG:4326).
pub const WGS84_GEOGRAPHIC: &str = "+proj=longlat +datum=WGS84 +no_defs";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{0}'")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse config file '{0}'")]
    Parse(PathBuf, #[source] serde_json::Error),

    #[error("No access token configured; pass --token, set EGMS_TOKEN or add access_token to the config file")]
    MissingAccessToken,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EgmsConfig {
    /// Where extracted tile CSVs are written.
    pub download_dir: PathBuf,
    /// Where enriched CSVs are written.
    pub output_dir: PathBuf,
    /// Pause between consecutive tiles of a sweep.
    pub delay_seconds: f64,
    /// Pause after an HTTP failure during a batch sweep.
    pub failure_cooldown_seconds: f64,
    /// Pause after an HTTP failure during a single-file request.
    pub single_failure_cooldown_seconds: f64,
    /// Pause after every reverse-geocoding request.
    pub geocode_delay_seconds: f64,
    pub request_timeout_seconds: u64,
    pub access_token: Option<String>,
    pub year_range: YearRange,
    pub archive_url: String,
    pub geocoder_url: String,
    pub user_agent: String,
    /// proj string of the CSV coordinates.
    pub source_crs: String,
    /// proj string of the coordinates sent to the geocoder.
    pub target_crs: String,
}

impl Default for EgmsConfig {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("Point_downloads"),
            output_dir: PathBuf::from("Point_locations"),
            delay_seconds: 5.0,
            failure_cooldown_seconds: 10.0,
            single_failure_cooldown_seconds: 0.0,
            geocode_delay_seconds: 0.5,
            request_timeout_seconds: 600,
            access_token: None,
            year_range: YearRange::default(),
            archive_url: DEFAULT_ARCHIVE_URL.to_string(),
            geocoder_url: DEFAULT_GEOCODER_URL.to_string(),
            user_agent: "egms-cli".to_string(),
            source_crs: ETRS89_LAEA_EUROPE.to_string(),
            target_crs: WGS84_GEOGRAPHIC.to_string(),
        }
    }
}

impl EgmsConfig {
    /// Reads a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        let config =
            serde_json::from_str(&text).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Loads `explicit` if given, otherwise the per-user config file if one exists,
    /// otherwise the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match default_config_path() {
            Some(path) if path.is_file() => Self::from_file(&path),
            _ => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn access_token(&self) -> Result<&str, ConfigError> {
        self.access_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(ConfigError::MissingAccessToken)
    }

    pub fn delay(&self) -> Duration {
        seconds(self.delay_seconds)
    }

    pub fn failure_cooldown(&self, batch: bool) -> Duration {
        if batch {
            seconds(self.failure_cooldown_seconds)
        } else {
            seconds(self.single_failure_cooldown_seconds)
        }
    }

    pub fn geocode_delay(&self) -> Duration {
        seconds(self.geocode_delay_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

// Negative or NaN values from a hand-edited file mean "no pause".
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}
