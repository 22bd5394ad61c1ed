//! Progress messages a running sweep sends to whoever is watching it.

use crate::types::outcome::{DownloadResult, DownloadSummary};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitReason {
    /// Courtesy delay between consecutive tiles.
    BetweenTiles,
    /// Extra pause after the archive rejected a request.
    FailureCooldown,
}

#[derive(Debug, Clone)]
pub enum DownloadEvent {
    SweepStarted {
        total: usize,
        estimated: Duration,
    },
    TileStarted {
        /// 1-based position in the sweep.
        index: usize,
        total: usize,
        label: String,
    },
    TileFinished {
        index: usize,
        total: usize,
        result: DownloadResult,
    },
    Waiting {
        duration: Duration,
        reason: WaitReason,
    },
    SweepFinished(DownloadSummary),
}

impl DownloadEvent {
    /// Completion percentage implied by this event, if it carries one.
    pub fn progress_percent(&self) -> Option<f64> {
        match self {
            DownloadEvent::SweepStarted { .. } => Some(0.0),
            DownloadEvent::TileFinished { index, total, .. } if *total > 0 => {
                Some(*index as f64 / *total as f64 * 100.0)
            }
            DownloadEvent::SweepFinished(_) => Some(100.0),
            _ => None,
        }
    }
}
