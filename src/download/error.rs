use crate::config::ConfigError;
use crate::types::outcome::DownloadOutcome;
use crate::types::tile::TileError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Downloader is not configured")]
    Config(#[from] ConfigError),

    #[error("Invalid tile in sweep")]
    InvalidTile(#[from] TileError),

    #[error("Failed to build HTTP client")]
    ClientBuild(#[source] reqwest::Error),

    #[error("Network request failed for {url}")]
    Transport {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("No CSV entry containing '{prefix}' in the downloaded archive")]
    NoMatchingEntry { prefix: String },

    #[error("Failed to read zip archive for '{prefix}'")]
    Archive {
        prefix: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Archive entry '{0}' would extract outside the download directory")]
    UnsafeEntryName(String),

    #[error("Failed to write extracted file '{path}'")]
    ExtractIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write zip bundle '{path}'")]
    Bundle {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("I/O error while bundling '{path}'")]
    BundleIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create download directory '{0}'")]
    DownloadDirCreation(PathBuf, #[source] std::io::Error),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl DownloadError {
    /// Folds a failed tile attempt into the outcome recorded for that tile.
    pub fn to_outcome(&self) -> DownloadOutcome {
        match self {
            DownloadError::HttpStatus { status, .. } => DownloadOutcome::HttpFailure(*status),
            DownloadError::NoMatchingEntry { .. } => DownloadOutcome::NoMatchingEntry,
            DownloadError::Transport { source, .. } => {
                DownloadOutcome::TransportError(source.to_string())
            }
            other => DownloadOutcome::ArchiveError(error_chain(other)),
        }
    }
}

fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_mapping() {
        let http = DownloadError::HttpStatus {
            url: "https://example.invalid/a.zip".into(),
            status: 404,
        };
        assert_eq!(http.to_outcome(), DownloadOutcome::HttpFailure(404));

        let missing = DownloadError::NoMatchingEntry {
            prefix: "EGMS_L3".into(),
        };
        assert_eq!(missing.to_outcome(), DownloadOutcome::NoMatchingEntry);

        let transport = DownloadError::Transport {
            url: "u".into(),
            source: "connection reset".into(),
        };
        assert_eq!(
            transport.to_outcome(),
            DownloadOutcome::TransportError("connection reset".into())
        );

        let io = DownloadError::ExtractIo {
            path: PathBuf::from("out/a.csv"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        };
        match io.to_outcome() {
            DownloadOutcome::ArchiveError(message) => {
                assert!(message.contains("out/a.csv"));
                assert!(message.ends_with("disk full"));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }
}
