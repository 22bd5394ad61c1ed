mod config;
mod download;
mod egms;
mod enrich;
mod error;
mod types;
mod utils;

pub use config::*;
pub use egms::*;
pub use error::EgmsError;

pub use types::lat_lon::LatLon;
pub use types::outcome::*;
pub use types::sweep::*;
pub use types::tile::*;

pub use download::bundle::{write_bundle, write_bundle_owned};
pub use download::error::DownloadError;
pub use download::events::*;
pub use download::extractor::ZipCsvExtractor;
pub use download::fetcher::*;
pub use download::orchestrator::*;

pub use enrich::columns::*;
pub use enrich::enricher::*;
pub use enrich::error::{EnrichError, GeocodeError, ReprojectError};
pub use enrich::geocoder::*;
pub use enrich::reprojector::CoordinateReprojector;

pub use utils::default_config_path;
