//! Dumpling service payloads

use serde::{Deserialize, Serialize};

/// Manifest of a dump as returned by `api/dumplings/{id}/manifest`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DumpManifest {
    pub display_name: String,
    #[serde(default)]
    pub dump_artifacts: Vec<DumpArtifact>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DumpArtifact {
    pub hash: Option<String>,
    pub relative_path: Option<String>,
}

impl DumpManifest {
    /// Artifacts that carry both a hash and a relative path
    pub fn downloadable(&self) -> impl Iterator<Item = (&str, &str)> {
        self.dump_artifacts.iter().filter_map(|a| {
            Some((a.hash.as_deref()?, a.relative_path.as_deref()?))
        })
    }
}

/// Response to a dump upload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UploadedDump {
    pub dumpling_id: String,
    /// Local paths the service wants uploaded alongside the dump
    #[serde(default)]
    pub ref_paths: Vec<String>,
}

/// Result of streaming an artifact into a sink
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownloadedArtifact {
    /// File name announced by the service, if any
    pub file_name: Option<String>,
    pub bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_parses_camel_case_and_skips_incomplete_artifacts() {
        let json = r#"{
            "dumpId": "f00d",
            "displayName": "crash.1234",
            "dumpArtifacts": [
                {"hash": "aaaa", "relativePath": "core.1234", "localPath": "/tmp/core.1234"},
                {"hash": null, "relativePath": "libcoreclr.so"},
                {"hash": "bbbb", "relativePath": "lib/libclrjit.so"}
            ]
        }"#;

        let manifest: DumpManifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.display_name, "crash.1234");

        let items: Vec<_> = manifest.downloadable().collect();
        assert_eq!(items, vec![("aaaa", "core.1234"), ("bbbb", "lib/libclrjit.so")]);
    }

    #[test]
    fn uploaded_dump_defaults_missing_ref_paths() {
        let dump: UploadedDump = serde_json::from_str(r#"{"dumplingId": "abc"}"#).unwrap();
        assert_eq!(dump.dumpling_id, "abc");
        assert!(dump.ref_paths.is_empty());
    }
}
