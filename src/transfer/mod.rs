//! Concurrent transfer subsystem
//!
//! - `pipeline`: single-pass hash + gzip/gunzip of files
//! - `registry`: path deduplication for upload expansion
//! - `orchestrator`: queues uploads/downloads onto the worker pool
//! - `types`: per-job outcomes and the drain summary

mod orchestrator;
mod paths;
mod pipeline;
mod registry;
mod types;

pub use orchestrator::TransferOrchestrator;
pub use paths::{absolute_path, safe_file_name, safe_relative_path};
pub use types::{TransferFailure, TransferKind, TransferSummary};
