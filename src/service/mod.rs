//! Dumpling service access
//!
//! - `types`: manifest and upload response payloads
//! - `http`: reqwest-backed implementation of [`ArtifactService`]

mod http;
mod types;

pub use http::HttpArtifactService;
pub use types::{DownloadedArtifact, DumpArtifact, DumpManifest, UploadedDump};

use crate::error::ServiceResult;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;

/// Remote artifact store used by the transfer orchestrator.
///
/// Calls block the current thread; implementations are shared across transfer
/// workers and must be thread safe.
pub trait ArtifactService: Send + Sync {
    fn get_manifest(&self, dump_id: &str) -> ServiceResult<DumpManifest>;

    /// Upload gzip `content` whose uncompressed SHA-1 is `hash`, optionally
    /// attached to `dump_id`.
    fn upload_artifact(
        &self,
        dump_id: Option<&str>,
        local_path: &str,
        hash: &str,
        content: File,
    ) -> ServiceResult<()>;

    /// Stream the gzip content stored under `hash` into `sink`.
    fn download_artifact(&self, hash: &str, sink: &mut dyn Write)
        -> ServiceResult<DownloadedArtifact>;

    fn upload_dump(
        &self,
        local_path: &str,
        hash: &str,
        origin: &str,
        display_name: &str,
        content: File,
    ) -> ServiceResult<UploadedDump>;

    fn update_dump_properties(
        &self,
        dumpling_id: &str,
        properties: &BTreeMap<String, String>,
    ) -> ServiceResult<()>;
}
