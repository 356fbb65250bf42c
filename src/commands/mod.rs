//! Command line commands
//!
//! - `upload`: dump + references, or loose files
//! - `download`: single artifact or a whole dump
//! - `update`: properties and extra files for an existing dump
//! - `properties`: property parsing and client triage data

mod download;
pub mod properties;
mod update;
mod upload;

pub use download::download;
pub use update::update;
pub use upload::upload;

use crate::cli::Command;
use crate::config::ClientConfig;
use crate::service::ArtifactService;
use crate::transfer::TransferSummary;
use std::sync::Arc;

pub fn execute(
    command: &Command,
    service: Arc<dyn ArtifactService>,
    config: &ClientConfig,
) -> anyhow::Result<TransferSummary> {
    match command {
        Command::Upload(args) => upload(args, service, config),
        Command::Download(args) => download(args, service, config),
        Command::Update(args) => update(args, service, config),
    }
}
