use super::properties::{
    add_client_triage_properties, collect_properties, current_user, default_display_name,
    ClientInfo,
};
use crate::cli::UploadArgs;
use crate::config::ClientConfig;
use crate::service::ArtifactService;
use crate::transfer::{TransferOrchestrator, TransferSummary};
use anyhow::{bail, Context, Result};
use chrono::Utc;
use log::{debug, info};
use std::sync::Arc;

/// Upload a dump with its references, or only the included paths when no dump
/// is given.
pub fn upload(
    args: &UploadArgs,
    service: Arc<dyn ArtifactService>,
    config: &ClientConfig,
) -> Result<TransferSummary> {
    if args.dumppath.is_none() && args.incpaths.is_empty() {
        bail!("no artifacts or dumps were specified to upload, either --dumppath or --incpaths is required");
    }

    let mut orchestrator = TransferOrchestrator::new(Arc::clone(&service), config);

    match &args.dumppath {
        Some(dump_path) => {
            let display_name = args
                .displayname
                .clone()
                .unwrap_or_else(|| default_display_name(&current_user(), Utc::now()));
            let origin = args.user.clone().unwrap_or_else(current_user);

            let dumpling_id = orchestrator
                .upload_dump_and_references(dump_path, &args.incpaths, &origin, &display_name)
                .with_context(|| format!("failed to upload dump {}", dump_path.display()))?;

            let mut properties = collect_properties(args.propfile.as_deref(), &args.properties)?;
            if !args.suppresstriage {
                add_client_triage_properties(&mut properties, &ClientInfo::detect());
            }
            if !properties.is_empty() {
                service
                    .update_dump_properties(&dumpling_id, &properties)
                    .with_context(|| format!("failed to update properties of dumpling {}", dumpling_id))?;
            }
        }
        None => {
            let queued = orchestrator.upload_files(None, &args.incpaths)?;
            debug!("queued {} files", queued);
        }
    }

    let summary = orchestrator.wait_for_pending_transfers();
    info!("uploaded {} files", summary.uploaded);
    Ok(summary)
}
