//! reqwest client for the dumpling service
//!
//! Transfer workers are OS threads, so every call drives its request to
//! completion on a small private tokio runtime with `block_on`.

use super::{ArtifactService, DownloadedArtifact, DumpManifest, UploadedDump};
use crate::error::{ServiceError, ServiceResult};
use futures_util::StreamExt;
use log::{debug, info};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use reqwest::redirect::Policy;
use reqwest::{Body, Client, Response};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tokio::runtime::Runtime;
use tokio_util::io::ReaderStream;

/// Header carrying the original file name of an artifact
const FILENAME_HEADER: &str = "dumpling-filename";

const MAX_REDIRECTS: usize = 5;

const HTTP_WORKER_THREADS: usize = 2;

/// Write buffer size for downloads (2 MB) - reduces I/O operations
const WRITE_BUFFER_SIZE: usize = 2 * 1024 * 1024;

pub struct HttpArtifactService {
    base_url: String,
    client: Client,
    runtime: Runtime,
}

impl HttpArtifactService {
    pub fn new(base_url: &str) -> ServiceResult<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(HTTP_WORKER_THREADS)
            .thread_name("dumpling-http")
            .enable_all()
            .build()
            .map_err(|e| ServiceError::Runtime(e.to_string()))?;

        // Redirects are followed by hand so headers on the first hop stay visible
        let client = Client::builder().redirect(Policy::none()).build()?;

        let base_url = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };

        Ok(Self {
            base_url,
            client,
            runtime,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str, query: &[(&str, &str)]) -> String {
        let mut url = format!("{}{}", self.base_url, path);
        if !query.is_empty() {
            let query_string = query
                .iter()
                .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
                .collect::<Vec<_>>()
                .join("&");
            url.push('?');
            url.push_str(&query_string);
        }
        url
    }

    async fn fetch_manifest(&self, url: &str) -> ServiceResult<DumpManifest> {
        let response = check_status(self.client.get(url).send().await?).await?;
        debug!("   response: {}", response.status());
        let body = response.bytes().await?;
        debug!("   content: {}", String::from_utf8_lossy(&body));
        Ok(serde_json::from_slice(&body)?)
    }

    /// POST a file as a streamed body and return the response text
    async fn post_file(&self, url: &str, content: File) -> ServiceResult<String> {
        let total_bytes = content.metadata()?.len();
        let stream = ReaderStream::new(tokio::fs::File::from_std(content));

        let response = self
            .client
            .post(url)
            .header(CONTENT_LENGTH, total_bytes)
            .body(Body::wrap_stream(stream))
            .send()
            .await?;
        let response = check_status(response).await?;
        let text = response.text().await?;
        debug!("   response: {}", text);
        Ok(text)
    }

    async fn post_json(&self, url: &str, payload: Vec<u8>) -> ServiceResult<()> {
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await?;
        let response = check_status(response).await?;
        debug!("   response: {}", response.status());
        Ok(())
    }

    async fn fetch_artifact(
        &self,
        url: String,
        sink: &mut dyn Write,
    ) -> ServiceResult<DownloadedArtifact> {
        let mut url = url;
        let mut file_name: Option<String> = None;
        let mut redirects = 0;

        let response = loop {
            debug!("   url: {}", url);
            let response = self.client.get(&url).send().await?;

            if file_name.is_none() {
                file_name = response
                    .headers()
                    .get(FILENAME_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .map(|v| v.to_string());
            }

            if !response.status().is_redirection() {
                break check_status(response).await?;
            }

            redirects += 1;
            if redirects > MAX_REDIRECTS {
                return Err(ServiceError::Redirects(url));
            }
            let location = match response.headers().get(LOCATION).and_then(|v| v.to_str().ok()) {
                Some(location) => location,
                None => {
                    return Err(ServiceError::Status {
                        url,
                        status: response.status().as_u16(),
                        body: "redirect without location".to_string(),
                    })
                }
            };
            url = response
                .url()
                .join(location)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| location.to_string());
        };
        debug!("   response: {}", response.status());

        // Stream the response body into the sink with buffered writes
        let mut stream = response.bytes_stream();
        let mut write_buffer = Vec::with_capacity(WRITE_BUFFER_SIZE);
        let mut bytes: u64 = 0;

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result?;
            bytes += chunk.len() as u64;
            write_buffer.extend_from_slice(&chunk);

            if write_buffer.len() >= WRITE_BUFFER_SIZE {
                sink.write_all(&write_buffer)?;
                write_buffer.clear();
            }
        }

        if !write_buffer.is_empty() {
            sink.write_all(&write_buffer)?;
        }
        sink.flush()?;

        Ok(DownloadedArtifact { file_name, bytes })
    }
}

async fn check_status(response: Response) -> ServiceResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    Err(ServiceError::Status {
        url,
        status: status.as_u16(),
        body,
    })
}

fn display_name(local_path: &str) -> String {
    Path::new(local_path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| local_path.to_string())
}

impl ArtifactService for HttpArtifactService {
    fn get_manifest(&self, dump_id: &str) -> ServiceResult<DumpManifest> {
        let url = self.url(
            &format!("api/dumplings/{}/manifest", urlencoding::encode(dump_id)),
            &[],
        );
        info!("retrieving dumpling {} manifest", dump_id);
        debug!("   url: {}", url);
        self.runtime.block_on(self.fetch_manifest(&url))
    }

    fn upload_artifact(
        &self,
        dump_id: Option<&str>,
        local_path: &str,
        hash: &str,
        content: File,
    ) -> ServiceResult<()> {
        let mut path = String::from("api/");
        if let Some(id) = dump_id {
            path.push_str(&format!("dumplings/{}/", urlencoding::encode(id)));
        }
        path.push_str("artifacts/uploads");
        let url = self.url(&path, &[("hash", hash), ("localpath", local_path)]);

        info!("uploading artifact {} {}", hash, display_name(local_path));
        debug!("   url: {}", url);
        self.runtime.block_on(self.post_file(&url, content))?;
        Ok(())
    }

    fn download_artifact(
        &self,
        hash: &str,
        sink: &mut dyn Write,
    ) -> ServiceResult<DownloadedArtifact> {
        let url = self.url(&format!("api/artifacts/{}", urlencoding::encode(hash)), &[]);
        self.runtime.block_on(self.fetch_artifact(url, sink))
    }

    fn upload_dump(
        &self,
        local_path: &str,
        hash: &str,
        origin: &str,
        display_name_value: &str,
        content: File,
    ) -> ServiceResult<UploadedDump> {
        let url = self.url(
            "api/dumplings/uploads",
            &[
                ("hash", hash),
                ("localpath", local_path),
                ("origin", origin),
                ("displayname", display_name_value),
            ],
        );

        info!("uploading dump {} {}", hash, display_name(local_path));
        debug!("   url: {}", url);
        let text = self.runtime.block_on(self.post_file(&url, content))?;
        Ok(serde_json::from_str(&text)?)
    }

    fn update_dump_properties(
        &self,
        dumpling_id: &str,
        properties: &BTreeMap<String, String>,
    ) -> ServiceResult<()> {
        let url = self.url(
            &format!("api/dumplings/{}/properties", urlencoding::encode(dumpling_id)),
            &[],
        );
        let payload = serde_json::to_vec(properties)?;

        info!("updating {} properties of dumpling {}", properties.len(), dumpling_id);
        debug!("   url: {}", url);
        debug!("   data: {}", String::from_utf8_lossy(&payload));
        self.runtime.block_on(self.post_json(&url, payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_trailing_slash() {
        let service = HttpArtifactService::new("http://localhost:9000").unwrap();
        assert_eq!(service.base_url(), "http://localhost:9000/");
    }

    #[test]
    fn query_values_are_percent_encoded() {
        let service = HttpArtifactService::new("http://localhost:9000/").unwrap();
        let url = service.url(
            "api/artifacts/uploads",
            &[("hash", "abc"), ("localpath", "/tmp/my dump&co")],
        );
        assert_eq!(
            url,
            "http://localhost:9000/api/artifacts/uploads?hash=abc&localpath=%2Ftmp%2Fmy%20dump%26co"
        );
    }

    #[test]
    fn display_name_uses_file_name() {
        assert_eq!(display_name("/var/crash/core.42"), "core.42");
        assert_eq!(display_name("core.42"), "core.42");
    }
}
