use crate::config::ConfigError;
use crate::download::error::DownloadError;
use crate::enrich::error::{EnrichError, GeocodeError, ReprojectError};
use crate::types::tile::TileError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EgmsError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Tile(#[from] TileError),

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Enrich(#[from] EnrichError),

    #[error(transparent)]
    Reproject(#[from] ReprojectError),

    #[error(transparent)]
    Geocode(#[from] GeocodeError),
}
