use super::properties::collect_properties;
use crate::cli::UpdateArgs;
use crate::config::ClientConfig;
use crate::service::ArtifactService;
use crate::transfer::{TransferOrchestrator, TransferSummary};
use anyhow::{Context, Result};
use std::sync::Arc;

/// Post properties to an existing dump and attach additional files to it.
pub fn update(
    args: &UpdateArgs,
    service: Arc<dyn ArtifactService>,
    config: &ClientConfig,
) -> Result<TransferSummary> {
    let properties = collect_properties(args.propfile.as_deref(), &args.properties)?;
    if !properties.is_empty() {
        service
            .update_dump_properties(&args.dumpid, &properties)
            .with_context(|| format!("failed to update properties of dumpling {}", args.dumpid))?;
    }

    let mut orchestrator = TransferOrchestrator::new(Arc::clone(&service), config);
    if !args.incpaths.is_empty() {
        orchestrator.upload_files(Some(&args.dumpid), &args.incpaths)?;
    }
    Ok(orchestrator.wait_for_pending_transfers())
}
