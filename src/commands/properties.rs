//! Dump properties: command line pairs, property files and client triage data

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::Path;

pub type Properties = BTreeMap<String, String>;

/// Parse a `key=value` argument, splitting on the first `=`.
pub fn parse_key_value(arg: &str) -> std::result::Result<(String, String), String> {
    match arg.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!(
            "the specified property key value pair is invalid: '{}' (expected key=value)",
            arg
        )),
    }
}

/// Read a JSON object of string values.
pub fn load_property_file(path: &Path) -> Result<Properties> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read property file {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("property file {} is not a JSON object of strings", path.display()))
}

/// Properties from an optional file, overridden by command line pairs.
pub fn collect_properties(propfile: Option<&Path>, pairs: &[(String, String)]) -> Result<Properties> {
    let mut properties = match propfile {
        Some(path) => load_property_file(path)?,
        None => Properties::new(),
    };
    for (key, value) in pairs {
        properties.insert(key.clone(), value.clone());
    }
    Ok(properties)
}

/// Description of the machine running the client
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientInfo {
    pub architecture: String,
    pub processor: String,
    pub name: String,
    pub os: String,
    pub release: String,
    pub version: String,
    pub distro: Option<DistroInfo>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DistroInfo {
    pub name: String,
    pub version: String,
    pub id: String,
}

impl ClientInfo {
    pub fn detect() -> Self {
        let os = match std::env::consts::OS {
            "linux" => "Linux",
            "windows" => "Windows",
            "macos" => "Darwin",
            other => other,
        }
        .to_string();

        let distro = if cfg!(target_os = "linux") {
            std::fs::read_to_string("/etc/os-release")
                .ok()
                .map(|text| parse_os_release(&text))
        } else {
            None
        };

        Self {
            architecture: std::env::consts::ARCH.to_string(),
            processor: std::env::consts::ARCH.to_string(),
            name: host_name(),
            os,
            release: read_kernel_value("osrelease"),
            version: read_kernel_value("version"),
            distro,
        }
    }
}

fn read_kernel_value(name: &str) -> String {
    std::fs::read_to_string(Path::new("/proc/sys/kernel").join(name))
        .map(|v| v.trim().to_string())
        .unwrap_or_default()
}

fn host_name() -> String {
    let from_kernel = read_kernel_value("hostname");
    if !from_kernel.is_empty() {
        return from_kernel;
    }
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_default()
}

/// Pull distribution name, version and codename out of an os-release file.
fn parse_os_release(text: &str) -> DistroInfo {
    let mut distro = DistroInfo::default();
    for line in text.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"').to_string();
        match key.trim() {
            "NAME" => distro.name = value,
            "VERSION_ID" => distro.version = value,
            "VERSION_CODENAME" => distro.id = value,
            _ => {}
        }
    }
    distro
}

/// Add `CLIENT_*` properties describing `info`, keeping any value already set.
pub fn add_client_triage_properties(properties: &mut Properties, info: &ClientInfo) {
    let mut add = |key: &str, value: &str| {
        properties
            .entry(key.to_string())
            .or_insert_with(|| value.to_string());
    };

    add("CLIENT_ARCHITECTURE", &info.architecture);
    add("CLIENT_PROCESSOR", &info.processor);
    add("CLIENT_NAME", &info.name);
    add("CLIENT_OS", &info.os);
    add("CLIENT_RELEASE", &info.release);
    add("CLIENT_VERSION", &info.version);
    if let Some(distro) = &info.distro {
        add("CLIENT_DISTRO", &distro.name);
        add("CLIENT_DISTRO_VER", &distro.version);
        add("CLIENT_DISTRO_ID", &distro.id);
    }
}

/// Login name of the current user, lower-cased.
pub fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .map(|u| u.to_lowercase())
        .unwrap_or_else(|_| "unknown".to_string())
}

/// `<user>.<unix seconds with 7 decimals>`
pub fn default_display_name(user: &str, now: DateTime<Utc>) -> String {
    format!(
        "{}.{}.{:07}",
        user,
        now.timestamp(),
        now.timestamp_subsec_nanos() / 100
    )
}
