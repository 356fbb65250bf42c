//! Client for moving crash dumps and their artifacts to and from a dumpling service.
//!
//! - `transfer`: content pipeline, dedup registry and the transfer orchestrator
//! - `service`: the artifact service seam and its HTTP implementation
//! - `commands` / `cli`: the command line front end
//! - `config`, `error`, `logging`: ambient setup

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod service;
pub mod transfer;

pub use config::{ClientConfig, MissingPathPolicy};
pub use error::{ConfigError, Result, ServiceError, ServiceResult, TransferError};
pub use service::{ArtifactService, HttpArtifactService};
pub use transfer::{TransferOrchestrator, TransferSummary};
