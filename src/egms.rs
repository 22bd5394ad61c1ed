//! The main entry point: downloading archive tiles and enriching point CSVs with place
//! names, both driven by one [`EgmsConfig`].

use crate::config::EgmsConfig;
use crate::download::bundle::write_bundle_owned;
use crate::download::events::DownloadEvent;
use crate::download::orchestrator::{DownloadOrchestrator, SweepHandle};
use crate::enrich::enricher::{find_tile_csvs, EnrichReport, LocationEnricher};
use crate::error::EgmsError;
use crate::types::outcome::DownloadSummary;
use crate::types::sweep::SweepSpec;
use bon::bon;
use log::warn;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

/// Client for the ground-motion archive.
///
/// Holds the configuration and builds a fresh downloader or enricher for each call, so
/// a single `Egms` can serve several independent runs.
///
/// # Examples
///
/// ```rust,no_run
/// # use egms::{DisplacementChoice, Egms, EgmsConfig, EgmsError, SweepSpec};
/// # #[tokio::main]
/// # async fn main() -> Result<(), EgmsError> {
/// let config = EgmsConfig {
///     access_token: Some("my-token".to_string()),
///     ..EgmsConfig::default()
/// };
/// let egms = Egms::new(config);
///
/// let summary = egms
///     .download()
///     .sweep(SweepSpec::SingleL3 {
///         east: 32,
///         north: 31,
///         displacement: DisplacementChoice::Both,
///     })
///     .call()
///     .await?;
///
/// for path in summary.saved_paths() {
///     let report = egms.enrich().input(path).call().await?;
///     println!("{} rows -> {}", report.rows, report.output.display());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Egms {
    config: EgmsConfig,
}

#[bon]
impl Egms {
    pub fn new(config: EgmsConfig) -> Self {
        Self { config }
    }

    /// Loads the configuration from `path`, or from the per-user config file when `None`.
    ///
    /// # Errors
    ///
    /// Returns [`EgmsError::Config`] if the file exists but cannot be read or parsed.
    pub fn from_config_file(path: Option<&Path>) -> Result<Self, EgmsError> {
        Ok(Self::new(EgmsConfig::load(path)?))
    }

    pub fn config(&self) -> &EgmsConfig {
        &self.config
    }

    /// A downloader over HTTP using the current configuration.
    ///
    /// # Errors
    ///
    /// Fails when no access token is configured or the HTTP client cannot be built.
    pub fn orchestrator(&self) -> Result<DownloadOrchestrator, EgmsError> {
        Ok(DownloadOrchestrator::from_config(&self.config)?)
    }

    /// An enricher writing into the configured output directory.
    pub fn enricher(&self) -> Result<LocationEnricher, EgmsError> {
        Ok(LocationEnricher::from_config(&self.config)?)
    }

    /// Downloads every tile of a sweep.
    ///
    /// This method uses a builder pattern.
    ///
    /// # Arguments
    ///
    /// * `.sweep(SweepSpec)`: **Required.** The tiles to fetch.
    /// * `.events(UnboundedSender<DownloadEvent>)`: Optional. Receives progress events.
    /// * `.cancel(CancellationToken)`: Optional. Stops the sweep before the next tile.
    ///
    /// Individual tile failures are part of the returned [`DownloadSummary`]; only
    /// configuration problems and an unusable download directory are errors.
    #[builder]
    pub async fn download(
        &self,
        sweep: SweepSpec,
        events: Option<UnboundedSender<DownloadEvent>>,
        cancel: Option<CancellationToken>,
    ) -> Result<DownloadSummary, EgmsError> {
        let orchestrator = self.orchestrator()?;
        Ok(orchestrator.run_with_events(&sweep, events, cancel).await?)
    }

    /// Zips the CSVs a batch sweep saved into `<download_dir>/<bundle name>`.
    ///
    /// Returns `Ok(None)` for single-tile sweeps and for sweeps that saved nothing.
    pub async fn bundle(
        &self,
        sweep: &SweepSpec,
        summary: &DownloadSummary,
    ) -> Result<Option<PathBuf>, EgmsError> {
        let Some(name) = sweep.bundle_name(self.config.year_range) else {
            return Ok(None);
        };
        let files: Vec<PathBuf> = summary.saved_paths().cloned().collect();
        if files.is_empty() {
            warn!("Nothing downloaded, skipping bundle {}", name);
            return Ok(None);
        }
        let target = self.config.download_dir.join(name);
        Ok(Some(write_bundle_owned(files, target).await?))
    }

    /// Lists the downloaded tile CSVs waiting in the configured download directory.
    pub fn downloaded_csvs(&self) -> Result<Vec<PathBuf>, EgmsError> {
        Ok(find_tile_csvs(&self.config.download_dir)?)
    }

    /// Starts a sweep on a background task. See [`DownloadOrchestrator::spawn`].
    pub fn spawn_download(&self, sweep: SweepSpec) -> Result<SweepHandle, EgmsError> {
        Ok(self.orchestrator()?.spawn(sweep))
    }

    /// Writes `<output_dir>/<input stem>_locations.csv` with a `location` column added
    /// after the northing column.
    ///
    /// This method uses a builder pattern.
    ///
    /// # Arguments
    ///
    /// * `.input(&Path)`: **Required.** The point CSV to enrich.
    /// * `.output_dir(PathBuf)`: Optional. Overrides the configured output directory.
    /// * `.cancel(CancellationToken)`: Optional. Abandons the file before the next row.
    ///
    /// # Errors
    ///
    /// Returns [`EgmsError::Enrich`] when the input is missing, lacks coordinate columns,
    /// or the output cannot be written. Geocoding failures are recorded per row instead.
    #[builder]
    pub async fn enrich(
        &self,
        input: &Path,
        output_dir: Option<PathBuf>,
        cancel: Option<CancellationToken>,
    ) -> Result<EnrichReport, EgmsError> {
        let enricher = match output_dir {
            Some(output_dir) => LocationEnricher::from_config(&EgmsConfig {
                output_dir,
                ..self.config.clone()
            })?,
            None => self.enricher()?,
        };
        Ok(enricher.enrich_with_cancel(input, cancel.as_ref()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::enrich::error::EnrichError;

    #[tokio::test]
    async fn test_download_without_token_fails_before_any_request() {
        let egms = Egms::default();
        let err = egms
            .download()
            .sweep(SweepSpec::SingleL3 {
                east: 32,
                north: 31,
                displacement: Default::default(),
            })
            .call()
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EgmsError::Download(crate::download::error::DownloadError::Config(
                ConfigError::MissingAccessToken
            ))
        ));
    }

    #[tokio::test]
    async fn test_bundle_batch_downloads() {
        use crate::types::outcome::{DownloadOutcome, DownloadResult};
        use crate::types::tile::{TileAddress, YearRange};

        let dir = tempfile::tempdir().unwrap();
        let egms = Egms::new(EgmsConfig {
            download_dir: dir.path().to_path_buf(),
            year_range: YearRange::Y2019_2023,
            ..EgmsConfig::default()
        });
        let sweep = SweepSpec::BatchL3 {
            east: 32..=33,
            north: 31..=31,
            displacement: Default::default(),
        };
        let mut summary = DownloadSummary::new(2);
        for tile in sweep.tiles(YearRange::Y2019_2023, "t").unwrap() {
            let path = dir.path().join(format!("{}.csv", tile.filename_prefix()));
            std::fs::write(&path, "pid,easting,northing\n").unwrap();
            summary.record(DownloadResult {
                tile,
                outcome: DownloadOutcome::Success(path),
            });
        }

        let bundle = egms.bundle(&sweep, &summary).await.unwrap().unwrap();
        assert_eq!(
            bundle,
            dir.path().join("EGMS_L3_E32-33_N31-31_2019_2023_batch.zip")
        );
        assert!(bundle.is_file());
        assert_eq!(egms.downloaded_csvs().unwrap().len(), 2);

        let single = SweepSpec::SingleL3 {
            east: 32,
            north: 31,
            displacement: Default::default(),
        };
        assert_eq!(egms.bundle(&single, &summary).await.unwrap(), None);
        let empty = DownloadSummary::new(0);
        assert_eq!(egms.bundle(&sweep, &empty).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_enrich_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let egms = Egms::new(EgmsConfig {
            output_dir: dir.path().join("out"),
            ..EgmsConfig::default()
        });
        let err = egms
            .enrich()
            .input(&dir.path().join("missing.csv"))
            .call()
            .await
            .unwrap_err();
        assert!(matches!(err, EgmsError::Enrich(EnrichError::FileNotFound(_))));
    }
}
