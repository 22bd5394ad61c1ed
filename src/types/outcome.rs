//! Per-tile download outcomes and the aggregate summary of a sweep.

use crate::types::tile::TileAddress;
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::PathBuf;

/// What happened to a single tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The matching CSV was written to this path.
    Success(PathBuf),
    /// The archive answered with a status other than 200.
    HttpFailure(u16),
    /// The archive was downloaded but held no CSV whose name contains the prefix.
    NoMatchingEntry,
    /// The request never produced a response (connection, timeout, truncated body).
    TransportError(String),
    /// The payload was not a readable zip, or the CSV could not be written out.
    ArchiveError(String),
}

impl DownloadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DownloadOutcome::Success(_))
    }
}

impl fmt::Display for DownloadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DownloadOutcome::Success(path) => write!(f, "saved {}", path.display()),
            DownloadOutcome::HttpFailure(status) => write!(f, "HTTP status {status}"),
            DownloadOutcome::NoMatchingEntry => f.write_str("no matching CSV in archive"),
            DownloadOutcome::TransportError(cause) => write!(f, "transport error: {cause}"),
            DownloadOutcome::ArchiveError(cause) => write!(f, "archive error: {cause}"),
        }
    }
}

/// A tile paired with its outcome. Produced once per attempted tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadResult {
    pub tile: TileAddress,
    pub outcome: DownloadOutcome,
}

/// Totals for one sweep.
#[derive(Debug, Clone)]
pub struct DownloadSummary {
    /// Tiles the sweep expanded to.
    pub planned: usize,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Set when the sweep stopped early on a cancellation request.
    pub cancelled: bool,
    /// Results in the order the tiles were attempted.
    pub results: Vec<DownloadResult>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl DownloadSummary {
    pub(crate) fn new(planned: usize) -> Self {
        let now = Utc::now();
        Self {
            planned,
            attempted: 0,
            succeeded: 0,
            failed: 0,
            cancelled: false,
            results: Vec::new(),
            started_at: now,
            finished_at: now,
        }
    }

    pub(crate) fn record(&mut self, result: DownloadResult) {
        self.attempted += 1;
        if result.outcome.is_success() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.results.push(result);
    }

    pub(crate) fn finish(&mut self, cancelled: bool) {
        self.cancelled = cancelled;
        self.finished_at = Utc::now();
    }

    /// Percentage of attempted tiles that succeeded; `0.0` for an empty sweep.
    pub fn success_rate(&self) -> f64 {
        if self.attempted == 0 {
            return 0.0;
        }
        self.succeeded as f64 / self.attempted as f64 * 100.0
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    /// Paths of every CSV written during the sweep.
    pub fn saved_paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.results.iter().filter_map(|r| match &r.outcome {
            DownloadOutcome::Success(path) => Some(path),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::tile::{Displacement, YearRange};

    fn result(outcome: DownloadOutcome) -> DownloadResult {
        DownloadResult {
            tile: TileAddress::l3(1, 1, Displacement::East, YearRange::Y2018_2022, "t"),
            outcome,
        }
    }

    #[test]
    fn test_empty_summary_has_zero_rate() {
        let mut summary = DownloadSummary::new(0);
        summary.finish(false);
        assert_eq!(summary.attempted, 0);
        assert_eq!(summary.success_rate(), 0.0);
    }

    #[test]
    fn test_record_counts_and_rate() {
        let mut summary = DownloadSummary::new(4);
        summary.record(result(DownloadOutcome::Success(PathBuf::from("a.csv"))));
        summary.record(result(DownloadOutcome::HttpFailure(404)));
        summary.record(result(DownloadOutcome::NoMatchingEntry));
        summary.record(result(DownloadOutcome::Success(PathBuf::from("b.csv"))));
        summary.finish(false);

        assert_eq!(summary.attempted, 4);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.success_rate(), 50.0);
        let saved: Vec<_> = summary.saved_paths().collect();
        assert_eq!(saved, vec![&PathBuf::from("a.csv"), &PathBuf::from("b.csv")]);
        assert!(summary.elapsed() >= chrono::Duration::zero());
    }
}
