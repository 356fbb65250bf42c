use crate::cli::DownloadArgs;
use crate::config::ClientConfig;
use crate::service::ArtifactService;
use crate::transfer::{
    absolute_path, safe_file_name, safe_relative_path, TransferOrchestrator, TransferSummary,
};
use anyhow::{bail, Context, Result};
use log::{info, warn};
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;

/// Download one artifact, or every artifact listed in a dump manifest.
///
/// `--downpath` names the target file and wins over `--downdir`. A dump is laid
/// out as `<dir>/<display name>/<relative path>`; manifest entries whose
/// relative path would leave that directory are skipped.
pub fn download(
    args: &DownloadArgs,
    service: Arc<dyn ArtifactService>,
    config: &ClientConfig,
) -> Result<TransferSummary> {
    if let Some(index) = &args.symindex {
        bail!("downloading artifacts from symbol index {} is not yet supported", index);
    }

    let requested = match (&args.downpath, &args.downdir) {
        (Some(path), _) | (None, Some(path)) => path.clone(),
        (None, None) => PathBuf::from("."),
    };
    let path = absolute_path(&requested)?;
    let dir = match (&args.downpath, path.parent()) {
        (Some(_), Some(parent)) => parent.to_path_buf(),
        _ => path.clone(),
    };
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create download directory {}", dir.display()))?;

    let orchestrator = TransferOrchestrator::new(Arc::clone(&service), config);

    if let Some(hash) = &args.hash {
        orchestrator.queue_download(hash, &path)?;
    } else if let Some(dump_id) = &args.dumpid {
        let manifest = service
            .get_manifest(dump_id)
            .with_context(|| format!("failed to retrieve manifest of dumpling {}", dump_id))?;

        let dump_dir = dir.join(safe_file_name(&manifest.display_name).unwrap_or(OsStr::new(dump_id)));
        std::fs::create_dir_all(&dump_dir)
            .with_context(|| format!("failed to create dump directory {}", dump_dir.display()))?;

        for (hash, relative_path) in manifest.downloadable() {
            match safe_relative_path(relative_path) {
                Some(relative) => orchestrator.queue_download(hash, &dump_dir.join(relative))?,
                None => warn!(
                    "skipping artifact {}: relative path {:?} leaves {}",
                    hash,
                    relative_path,
                    dump_dir.display()
                ),
            }
        }
    }

    let summary = orchestrator.wait_for_pending_transfers();
    info!("downloaded {} files", summary.downloaded);
    Ok(summary)
}
