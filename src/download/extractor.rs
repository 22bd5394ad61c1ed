use crate::download::error::DownloadError;
use crate::utils::ensure_dir_exists;
use log::{debug, info};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::task;
use zip::ZipArchive;

/// Pulls the tile's CSV out of a downloaded zip archive.
///
/// Entries are scanned in archive order and the first one whose name ends in `.csv` and
/// contains the tile's file name prefix is written under the destination directory,
/// keeping any directories recorded in the entry name. Later matches are ignored.
#[derive(Debug, Clone)]
pub struct ZipCsvExtractor {
    dest_dir: PathBuf,
}

impl ZipCsvExtractor {
    pub fn new(dest_dir: impl Into<PathBuf>) -> Self {
        Self {
            dest_dir: dest_dir.into(),
        }
    }

    pub fn dest_dir(&self) -> &Path {
        &self.dest_dir
    }

    /// Extracts the first matching entry and returns where it was written.
    ///
    /// Returns [`DownloadError::NoMatchingEntry`] without touching the filesystem when no
    /// entry matches.
    pub fn extract(&self, zip_bytes: &[u8], filename_prefix: &str) -> Result<PathBuf, DownloadError> {
        let mut archive =
            ZipArchive::new(Cursor::new(zip_bytes)).map_err(|e| DownloadError::Archive {
                prefix: filename_prefix.to_string(),
                source: e,
            })?;

        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .map_err(|e| DownloadError::Archive {
                    prefix: filename_prefix.to_string(),
                    source: e,
                })?;
            let name = entry.name().to_string();
            if entry.is_dir() || !name.ends_with(".csv") || !name.contains(filename_prefix) {
                debug!("Skipping archive entry {}", name);
                continue;
            }

            let relative = entry
                .enclosed_name()
                .ok_or_else(|| DownloadError::UnsafeEntryName(name.clone()))?;
            let target = self.dest_dir.join(relative);
            let parent = target.parent().unwrap_or(&self.dest_dir).to_path_buf();
            ensure_dir_exists(&parent)
                .map_err(|e| DownloadError::DownloadDirCreation(parent.clone(), e))?;

            // Written beside the target and renamed, so a failed copy leaves nothing behind.
            let mut staged = NamedTempFile::new_in(&parent).map_err(|e| DownloadError::ExtractIo {
                path: target.clone(),
                source: e,
            })?;
            std::io::copy(&mut entry, &mut staged).map_err(|e| DownloadError::ExtractIo {
                path: target.clone(),
                source: e,
            })?;
            staged.persist(&target).map_err(|e| DownloadError::ExtractIo {
                path: target.clone(),
                source: e.error,
            })?;

            info!("Extracted {}", name);
            return Ok(target);
        }

        Err(DownloadError::NoMatchingEntry {
            prefix: filename_prefix.to_string(),
        })
    }

    /// [`ZipCsvExtractor::extract`] on the blocking thread pool.
    pub async fn extract_owned(
        &self,
        zip_bytes: Vec<u8>,
        filename_prefix: String,
    ) -> Result<PathBuf, DownloadError> {
        let extractor = self.clone();
        task::spawn_blocking(move || extractor.extract(&zip_bytes, &filename_prefix)).await?
    }
}
