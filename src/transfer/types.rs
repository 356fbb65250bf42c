//! Transfer outcome records and the summary returned after draining

use log::error;
use serde::Serialize;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum TransferKind {
    #[serde(rename = "upload")]
    Upload,
    #[serde(rename = "download")]
    Download,
}

impl std::fmt::Display for TransferKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferKind::Upload => write!(f, "upload"),
            TransferKind::Download => write!(f, "download"),
        }
    }
}

/// A transfer job that ended in an error
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TransferFailure {
    pub kind: TransferKind,
    pub target: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct TransferSummary {
    pub uploaded: usize,
    pub downloaded: usize,
    pub failures: Vec<TransferFailure>,
}

impl TransferSummary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn completed(&self) -> usize {
        self.uploaded + self.downloaded
    }
}

/// Outcomes recorded by jobs as they finish, on any thread
#[derive(Debug, Default)]
pub(crate) struct OutcomeLog {
    summary: Mutex<TransferSummary>,
}

impl OutcomeLog {
    pub(crate) fn record(
        &self,
        kind: TransferKind,
        target: &str,
        result: Result<(), crate::error::TransferError>,
    ) {
        let mut summary = self.summary.lock().unwrap_or_else(PoisonError::into_inner);
        match result {
            Ok(()) => match kind {
                TransferKind::Upload => summary.uploaded += 1,
                TransferKind::Download => summary.downloaded += 1,
            },
            Err(e) => {
                error!("{} failed: {} error={}", kind, target, e);
                summary.failures.push(TransferFailure {
                    kind,
                    target: target.to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    pub(crate) fn snapshot(&self) -> TransferSummary {
        self.summary
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransferError;

    #[test]
    fn transfer_kind_display_matches_expected_strings() {
        assert_eq!(TransferKind::Upload.to_string(), "upload");
        assert_eq!(TransferKind::Download.to_string(), "download");
    }

    #[test]
    fn outcome_log_counts_successes_and_keeps_failures() {
        let log = OutcomeLog::default();
        log.record(TransferKind::Upload, "/a", Ok(()));
        log.record(TransferKind::Upload, "/b", Ok(()));
        log.record(TransferKind::Download, "/c", Ok(()));
        log.record(
            TransferKind::Download,
            "/d",
            Err(TransferError::InvalidHash("xyz".to_string())),
        );

        let summary = log.snapshot();
        assert_eq!(summary.uploaded, 2);
        assert_eq!(summary.downloaded, 1);
        assert_eq!(summary.completed(), 3);
        assert!(!summary.is_success());
        assert_eq!(summary.failures[0].kind, TransferKind::Download);
        assert_eq!(summary.failures[0].target, "/d");
    }
}
