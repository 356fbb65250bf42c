//! In-memory artifact service shared by the integration tests
#![allow(dead_code)]

use dumpling_lib::service::{ArtifactService, DownloadedArtifact, DumpManifest, UploadedDump};
use dumpling_lib::{ServiceError, ServiceResult};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use sha1::{Digest, Sha1};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{Read, Write};
use std::sync::Mutex;
use std::thread::ThreadId;

#[derive(Debug, Clone)]
pub struct RecordedUpload {
    pub dump_id: Option<String>,
    pub local_path: String,
    pub hash: String,
    /// Decompressed body as received
    pub content: Vec<u8>,
    pub thread: ThreadId,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Manifest(String),
    UploadArtifact(String),
    UploadDump(String),
    Download(String),
    Properties(String),
}

#[derive(Default)]
pub struct MockService {
    pub calls: Mutex<Vec<Call>>,
    pub uploads: Mutex<Vec<RecordedUpload>>,
    pub dumps: Mutex<Vec<RecordedUpload>>,
    pub properties: Mutex<Vec<(String, BTreeMap<String, String>)>>,
    /// hash -> (gzip body, announced file name)
    artifacts: Mutex<HashMap<String, (Vec<u8>, Option<String>)>>,
    manifests: Mutex<HashMap<String, DumpManifest>>,
    ref_paths: Mutex<Vec<String>>,
    fail_uploads_for: Mutex<Vec<String>>,
}

pub const DUMPLING_ID: &str = "d00d";

impl MockService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `content` under its own SHA-1 and return that hash.
    pub fn serve(&self, content: &[u8], file_name: Option<&str>) -> String {
        let hash = sha1_hex(content);
        self.serve_as(&hash, content, file_name);
        hash
    }

    /// Serve `content` under an arbitrary hash.
    pub fn serve_as(&self, hash: &str, content: &[u8], file_name: Option<&str>) {
        self.artifacts.lock().unwrap().insert(
            hash.to_string(),
            (gzip(content), file_name.map(str::to_string)),
        );
    }

    pub fn serve_raw(&self, hash: &str, body: Vec<u8>) {
        self.artifacts
            .lock()
            .unwrap()
            .insert(hash.to_string(), (body, None));
    }

    pub fn set_manifest(&self, dump_id: &str, manifest: DumpManifest) {
        self.manifests
            .lock()
            .unwrap()
            .insert(dump_id.to_string(), manifest);
    }

    pub fn set_ref_paths(&self, paths: Vec<String>) {
        *self.ref_paths.lock().unwrap() = paths;
    }

    /// Reject uploads whose local path ends with `suffix`.
    pub fn fail_uploads_ending_with(&self, suffix: &str) {
        self.fail_uploads_for.lock().unwrap().push(suffix.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn uploaded_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.uploads().into_iter().map(|u| u.local_path).collect();
        paths.sort();
        paths
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl ArtifactService for MockService {
    fn get_manifest(&self, dump_id: &str) -> ServiceResult<DumpManifest> {
        self.record(Call::Manifest(dump_id.to_string()));
        self.manifests
            .lock()
            .unwrap()
            .get(dump_id)
            .cloned()
            .ok_or_else(|| not_found(dump_id))
    }

    fn upload_artifact(
        &self,
        dump_id: Option<&str>,
        local_path: &str,
        hash: &str,
        content: File,
    ) -> ServiceResult<()> {
        self.record(Call::UploadArtifact(local_path.to_string()));
        if self
            .fail_uploads_for
            .lock()
            .unwrap()
            .iter()
            .any(|s| local_path.ends_with(s.as_str()))
        {
            return Err(ServiceError::Status {
                url: format!("mock://artifacts/{hash}"),
                status: 500,
                body: "upload rejected".to_string(),
            });
        }
        let upload = RecordedUpload {
            dump_id: dump_id.map(str::to_string),
            local_path: local_path.to_string(),
            hash: hash.to_string(),
            content: gunzip(content)?,
            thread: std::thread::current().id(),
        };
        self.uploads.lock().unwrap().push(upload);
        Ok(())
    }

    fn download_artifact(
        &self,
        hash: &str,
        sink: &mut dyn Write,
    ) -> ServiceResult<DownloadedArtifact> {
        self.record(Call::Download(hash.to_string()));
        let (body, file_name) = self
            .artifacts
            .lock()
            .unwrap()
            .get(hash)
            .cloned()
            .ok_or_else(|| not_found(hash))?;
        sink.write_all(&body)?;
        Ok(DownloadedArtifact {
            file_name,
            bytes: body.len() as u64,
        })
    }

    fn upload_dump(
        &self,
        local_path: &str,
        hash: &str,
        origin: &str,
        _display_name: &str,
        content: File,
    ) -> ServiceResult<UploadedDump> {
        self.record(Call::UploadDump(local_path.to_string()));
        self.dumps.lock().unwrap().push(RecordedUpload {
            dump_id: Some(origin.to_string()),
            local_path: local_path.to_string(),
            hash: hash.to_string(),
            content: gunzip(content)?,
            thread: std::thread::current().id(),
        });
        Ok(UploadedDump {
            dumpling_id: DUMPLING_ID.to_string(),
            ref_paths: self.ref_paths.lock().unwrap().clone(),
        })
    }

    fn update_dump_properties(
        &self,
        dumpling_id: &str,
        properties: &BTreeMap<String, String>,
    ) -> ServiceResult<()> {
        self.record(Call::Properties(dumpling_id.to_string()));
        self.properties
            .lock()
            .unwrap()
            .push((dumpling_id.to_string(), properties.clone()));
        Ok(())
    }
}

fn not_found(what: &str) -> ServiceError {
    ServiceError::Status {
        url: format!("mock://{what}"),
        status: 404,
        body: String::new(),
    }
}

pub fn gzip(content: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(content).unwrap();
    encoder.finish().unwrap()
}

fn gunzip(content: File) -> ServiceResult<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(content).read_to_end(&mut out)?;
    Ok(out)
}

pub fn sha1_hex(content: &[u8]) -> String {
    hex::encode(Sha1::digest(content))
}
