//! Upload/download scheduling on top of the worker pool
//!
//! Requests are expanded to files, deduplicated by path, and wrapped in jobs
//! that run the content pipeline against the artifact service. With a single
//! thread every job runs inline on the caller; otherwise jobs go to the pool.

use super::paths::{absolute_path, safe_file_name};
use super::pipeline::{is_valid_digest, ContentPipeline};
use super::registry::DedupRegistry;
use super::types::{OutcomeLog, TransferKind, TransferSummary};
use crate::config::{ClientConfig, MissingPathPolicy};
use crate::error::{Result, TransferError};
use crate::service::ArtifactService;
use log::{debug, info, warn};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempPath;
use walkdir::WalkDir;
use work_pool::{PoolStats, WorkerPool};

const POOL_THREAD_NAME: &str = "dumpling-transfer";

pub struct TransferOrchestrator {
    service: Arc<dyn ArtifactService>,
    pipeline: Arc<ContentPipeline>,
    pool: WorkerPool,
    registry: DedupRegistry,
    missing_paths: MissingPathPolicy,
    outcomes: Arc<OutcomeLog>,
}

impl TransferOrchestrator {
    pub fn new(service: Arc<dyn ArtifactService>, config: &ClientConfig) -> Self {
        Self {
            service,
            pipeline: Arc::new(ContentPipeline::from_config(config)),
            pool: WorkerPool::named(POOL_THREAD_NAME, config.max_threads),
            registry: DedupRegistry::new(),
            missing_paths: config.missing_paths,
            outcomes: Arc::new(OutcomeLog::default()),
        }
    }

    /// True when transfers run inline on the calling thread
    pub fn is_synchronous(&self) -> bool {
        self.pool.max_threads() <= 1
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Compress, hash and upload one file, optionally attached to `dump_id`.
    ///
    /// Does not consult the dedup registry; callers that expand user supplied
    /// paths go through [`TransferOrchestrator::upload_files`].
    pub fn queue_upload(&self, dump_id: Option<&str>, path: &Path) -> Result<()> {
        let service = Arc::clone(&self.service);
        let pipeline = Arc::clone(&self.pipeline);
        let dump_id = dump_id.map(str::to_string);
        let path = path.to_path_buf();
        let target = path.display().to_string();

        self.dispatch(TransferKind::Upload, target, move || {
            compress_and_upload(service.as_ref(), &pipeline, dump_id.as_deref(), &path)
        })
    }

    /// Download the artifact stored under `hash` and verify it into `dest`.
    ///
    /// When `dest` is an existing directory the file is named after the
    /// service's file name for the artifact, or the hash if it gives none.
    pub fn queue_download(&self, hash: &str, dest: &Path) -> Result<()> {
        if !is_valid_digest(hash) {
            return Err(TransferError::InvalidHash(hash.to_string()));
        }
        let service = Arc::clone(&self.service);
        let pipeline = Arc::clone(&self.pipeline);
        let hash = hash.to_string();
        let dest = absolute_path(dest)?;
        let target = format!("{} -> {}", hash, dest.display());

        self.dispatch(TransferKind::Download, target, move || {
            download_and_verify(service.as_ref(), &pipeline, &hash, &dest)
        })
    }

    /// Upload a dump, then every file it references plus `include_paths`.
    ///
    /// The dump itself is uploaded before this returns; the references are
    /// queued against the new dumpling id, which is returned.
    pub fn upload_dump_and_references(
        &mut self,
        dump_path: &Path,
        include_paths: &[PathBuf],
        origin: &str,
        display_name: &str,
    ) -> Result<String> {
        let dump_path = absolute_path(dump_path)?;
        if !dump_path.is_file() {
            return Err(TransferError::MissingPath(dump_path));
        }
        self.registry.try_admit(&dump_path);

        debug!("compressing dump {}", dump_path.display());
        let artifact = self.pipeline.compress_and_hash(&dump_path)?;
        debug!(
            "   file size: {} compressed: {}",
            artifact.size, artifact.compressed_size
        );

        let content = File::open(&artifact.path).map_err(|e| TransferError::io(&*artifact.path, e))?;
        let result = self.service.upload_dump(
            &dump_path.to_string_lossy(),
            &artifact.digest,
            origin,
            display_name,
            content,
        );
        remove_temp(artifact.path);
        let uploaded = result?;

        info!("dumpling id: {}", uploaded.dumpling_id);
        self.outcomes
            .record(TransferKind::Upload, &dump_path.display().to_string(), Ok(()));

        let mut requested: Vec<PathBuf> = uploaded.ref_paths.iter().map(PathBuf::from).collect();
        requested.extend(include_paths.iter().cloned());
        let queued = self.upload_files(Some(&uploaded.dumpling_id), &requested)?;
        debug!("queued {} referenced files", queued);

        Ok(uploaded.dumpling_id)
    }

    /// Expand `paths` and queue an upload for every file not uploaded before.
    ///
    /// Returns how many uploads were queued.
    pub fn upload_files(&mut self, dump_id: Option<&str>, paths: &[PathBuf]) -> Result<usize> {
        let files = self.expand_upload_paths(paths)?;
        for file in &files {
            self.queue_upload(dump_id, file)?;
        }
        Ok(files.len())
    }

    /// Flatten files and directories into new, absolute file paths.
    ///
    /// Directories are walked recursively without following symlinked
    /// directories. Paths already admitted are dropped.
    pub fn expand_upload_paths(&mut self, paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for requested in paths {
            let path = absolute_path(requested)?;

            if path.is_dir() {
                for entry in WalkDir::new(&path).follow_links(false) {
                    let entry = match entry {
                        Ok(entry) => entry,
                        Err(e) => {
                            warn!("skipping unreadable entry under {}: {}", path.display(), e);
                            continue;
                        }
                    };
                    let file = entry.path();
                    if file.is_file() && self.registry.try_admit(file) {
                        files.push(file.to_path_buf());
                    }
                }
            } else if path.is_file() {
                if self.registry.try_admit(&path) {
                    files.push(path);
                }
            } else {
                match self.missing_paths {
                    MissingPathPolicy::Skip => {
                        debug!("skipping {}: not a file or directory", path.display());
                    }
                    MissingPathPolicy::Error => return Err(TransferError::MissingPath(path)),
                }
            }
        }

        debug!(
            "expanded {} requested paths into {} new files ({} admitted in total)",
            paths.len(),
            files.len(),
            self.registry.len()
        );
        Ok(files)
    }

    /// Block until every queued transfer has finished and summarise outcomes.
    ///
    /// This drains the pool: later `queue_*` calls on a multi-threaded
    /// orchestrator fail with a pool error.
    pub fn wait_for_pending_transfers(&self) -> TransferSummary {
        if !self.is_synchronous() {
            self.pool.drain();
        }
        let summary = self.outcomes.snapshot();
        debug!(
            "transfers complete: uploaded={} downloaded={} failed={}",
            summary.uploaded,
            summary.downloaded,
            summary.failures.len()
        );
        summary
    }

    fn dispatch<F>(&self, kind: TransferKind, target: String, job: F) -> Result<()>
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let outcomes = Arc::clone(&self.outcomes);
        let work = move || {
            let result = job();
            outcomes.record(kind, &target, result);
        };

        if self.is_synchronous() {
            work();
        } else {
            self.pool.submit(work)?;
        }
        Ok(())
    }
}

fn compress_and_upload(
    service: &dyn ArtifactService,
    pipeline: &ContentPipeline,
    dump_id: Option<&str>,
    path: &Path,
) -> Result<()> {
    debug!("compressing file {}", path.display());
    let artifact = pipeline.compress_and_hash(path)?;
    debug!(
        "   file size: {} compressed: {}",
        artifact.size, artifact.compressed_size
    );

    let content = File::open(&artifact.path).map_err(|e| TransferError::io(&*artifact.path, e))?;
    let result = service.upload_artifact(dump_id, &path.to_string_lossy(), &artifact.digest, content);
    remove_temp(artifact.path);
    result?;
    Ok(())
}

fn download_and_verify(
    service: &dyn ArtifactService,
    pipeline: &ContentPipeline,
    hash: &str,
    dest: &Path,
) -> Result<()> {
    info!("downloading artifact {}", hash);
    let mut compressed = pipeline.temp_file()?;
    let downloaded = service.download_artifact(hash, compressed.as_file_mut())?;
    debug!("   received {} compressed bytes", downloaded.bytes);

    let target = if dest.is_dir() {
        let name = downloaded
            .file_name
            .as_deref()
            .and_then(safe_file_name)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(hash));
        dest.join(name)
    } else {
        dest.to_path_buf()
    };

    let compressed = compressed.into_temp_path();
    let result = pipeline.decompress_and_hash(&compressed, &target);
    remove_temp(compressed);

    let actual = match result {
        Ok(digest) => digest,
        Err(e) => {
            remove_partial(&target);
            return Err(e);
        }
    };

    if !actual.eq_ignore_ascii_case(hash) {
        remove_partial(&target);
        return Err(TransferError::Integrity {
            path: target,
            expected: hash.to_string(),
            actual,
        });
    }

    info!("downloaded {}", target.display());
    Ok(())
}

fn remove_temp(path: TempPath) {
    let display = path.display().to_string();
    if let Err(e) = path.close() {
        warn!("failed to delete temp file {}: {}", display, e);
    }
}

fn remove_partial(path: &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_file(path) {
            warn!("failed to remove {}: {}", path.display(), e);
        }
    }
}
