//! Runs a [`SweepSpec`] tile by tile: build URL, fetch, extract, record, pause.

use crate::config::EgmsConfig;
use crate::download::error::DownloadError;
use crate::download::events::{DownloadEvent, WaitReason};
use crate::download::extractor::ZipCsvExtractor;
use crate::download::fetcher::{ArchiveFetcher, HttpArchiveFetcher};
use crate::types::outcome::{DownloadOutcome, DownloadResult, DownloadSummary};
use crate::types::sweep::SweepSpec;
use crate::types::tile::{TileAddress, YearRange};
use crate::utils::{ensure_dir_exists, redact_url};
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Sequential tile downloader.
///
/// Tiles are processed strictly one after another. After each tile except the last the
/// orchestrator waits `delay`; in batch sweeps an HTTP failure adds a further cooldown
/// before that delay. A failed tile never stops the sweep.
pub struct DownloadOrchestrator<F = HttpArchiveFetcher> {
    fetcher: Arc<F>,
    extractor: ZipCsvExtractor,
    archive_url: String,
    year_range: YearRange,
    access_token: String,
    delay: Duration,
    batch_cooldown: Duration,
    single_cooldown: Duration,
    timeout: Duration,
}

/// A sweep running on a background task.
pub struct SweepHandle {
    pub events: UnboundedReceiver<DownloadEvent>,
    pub cancel: CancellationToken,
    pub join: JoinHandle<Result<DownloadSummary, DownloadError>>,
}

impl DownloadOrchestrator<HttpArchiveFetcher> {
    /// Orchestrator talking to the configured archive over HTTP.
    pub fn from_config(config: &EgmsConfig) -> Result<Self, DownloadError> {
        let fetcher = HttpArchiveFetcher::new(&config.user_agent)?;
        Self::with_fetcher(fetcher, config)
    }
}

impl<F: ArchiveFetcher> DownloadOrchestrator<F> {
    /// Fails with [`crate::config::ConfigError::MissingAccessToken`] when no token is set.
    pub fn with_fetcher(fetcher: F, config: &EgmsConfig) -> Result<Self, DownloadError> {
        let access_token = config.access_token()?.to_string();
        Ok(Self {
            fetcher: Arc::new(fetcher),
            extractor: ZipCsvExtractor::new(&config.download_dir),
            archive_url: config.archive_url.clone(),
            year_range: config.year_range,
            access_token,
            delay: config.delay(),
            batch_cooldown: config.failure_cooldown(true),
            single_cooldown: config.failure_cooldown(false),
            timeout: config.request_timeout(),
        })
    }

    /// Rough wall-clock time of a sweep, dominated by the courtesy delays.
    pub fn estimated_duration(&self, sweep: &SweepSpec) -> Duration {
        self.delay
            .saturating_mul(u32::try_from(sweep.tile_count()).unwrap_or(u32::MAX))
    }

    /// Downloads every tile of `sweep` and returns the summary.
    pub async fn run(&self, sweep: &SweepSpec) -> Result<DownloadSummary, DownloadError> {
        self.run_with_events(sweep, None, None).await
    }

    /// Like [`DownloadOrchestrator::run`], reporting progress on `events` and stopping
    /// before the next tile once `cancel` fires.
    ///
    /// A closed event channel is ignored. Errors are only returned for problems that
    /// affect the whole sweep: an invalid tile or an unusable download directory.
    pub async fn run_with_events(
        &self,
        sweep: &SweepSpec,
        events: Option<UnboundedSender<DownloadEvent>>,
        cancel: Option<CancellationToken>,
    ) -> Result<DownloadSummary, DownloadError> {
        let cancel = cancel.unwrap_or_else(CancellationToken::new);
        let emit = |event: DownloadEvent| {
            if let Some(tx) = &events {
                let _ = tx.send(event);
            }
        };

        let tiles = sweep.tiles(self.year_range, &self.access_token)?;
        let total = sweep.tile_count();
        let cooldown = if sweep.is_batch() {
            self.batch_cooldown
        } else {
            self.single_cooldown
        };

        let dest = self.extractor.dest_dir().to_path_buf();
        ensure_dir_exists(&dest).map_err(|e| DownloadError::DownloadDirCreation(dest, e))?;

        let estimated = self.estimated_duration(sweep);
        info!(
            "Starting download of {} file(s), estimated time {}s",
            total,
            estimated.as_secs()
        );
        emit(DownloadEvent::SweepStarted { total, estimated });

        let mut summary = DownloadSummary::new(total);
        let mut cancelled = false;
        for (position, tile) in tiles.enumerate() {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let index = position + 1;
            let label = tile.label();
            info!("[{}/{}] Processing {}", index, total, label);
            emit(DownloadEvent::TileStarted {
                index,
                total,
                label: label.clone(),
            });

            let outcome = self.download_tile(&tile).await;
            match &outcome {
                DownloadOutcome::Success(path) => info!("Saved {}", path.display()),
                failure => warn!("Failed {}: {}", label, failure),
            }
            let rejected = matches!(outcome, DownloadOutcome::HttpFailure(_));
            let result = DownloadResult { tile, outcome };
            summary.record(result.clone());
            emit(DownloadEvent::TileFinished {
                index,
                total,
                result,
            });

            if index == total {
                break;
            }
            if rejected && !cooldown.is_zero() {
                emit(DownloadEvent::Waiting {
                    duration: cooldown,
                    reason: WaitReason::FailureCooldown,
                });
                if !pause(cooldown, &cancel).await {
                    cancelled = true;
                    break;
                }
            }
            if !self.delay.is_zero() {
                emit(DownloadEvent::Waiting {
                    duration: self.delay,
                    reason: WaitReason::BetweenTiles,
                });
                if !pause(self.delay, &cancel).await {
                    cancelled = true;
                    break;
                }
            }
        }
        summary.finish(cancelled);

        if cancelled {
            warn!(
                "Download cancelled after {} of {} file(s)",
                summary.attempted, total
            );
        }
        info!("=== Download Summary ===");
        info!("Total files attempted: {}", summary.attempted);
        info!("Successful downloads: {}", summary.succeeded);
        info!("Failed downloads: {}", summary.failed);
        info!("Success rate: {:.1}%", summary.success_rate());
        emit(DownloadEvent::SweepFinished(summary.clone()));

        Ok(summary)
    }

    /// Fetches and extracts one tile. Every failure is folded into the outcome.
    pub async fn download_tile(&self, tile: &TileAddress) -> DownloadOutcome {
        match self.try_download_tile(tile).await {
            Ok(path) => DownloadOutcome::Success(path),
            Err(e) => e.to_outcome(),
        }
    }

    async fn try_download_tile(&self, tile: &TileAddress) -> Result<std::path::PathBuf, DownloadError> {
        let url = tile.url(&self.archive_url);
        let archive = self.fetcher.fetch(&url, self.timeout).await?;
        if !archive.is_ok() {
            return Err(DownloadError::HttpStatus {
                url: redact_url(&url).to_string(),
                status: archive.status,
            });
        }
        self.extractor
            .extract_owned(archive.body, tile.filename_prefix())
            .await
    }
}

impl<F: ArchiveFetcher + 'static> DownloadOrchestrator<F> {
    /// Moves the orchestrator onto a tokio task and runs `sweep` there.
    pub fn spawn(self, sweep: SweepSpec) -> SweepHandle {
        let (tx, events) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let join = tokio::spawn(async move {
            self.run_with_events(&sweep, Some(tx), Some(task_cancel))
                .await
        });
        SweepHandle {
            events,
            cancel,
            join,
        }
    }
}

/// Sleeps for `duration`; returns `false` if cancelled first.
async fn pause(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = cancel.cancelled() => false,
    }
}
