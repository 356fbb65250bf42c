//! Command line arguments

use crate::commands::properties::parse_key_value;
use crate::config::ClientConfig;
use crate::error::ConfigError;
use clap::{ArgGroup, Args, Parser, Subcommand};
use std::path::PathBuf;

/// Upload and download crash dumps and their artifacts
#[derive(Parser, Debug, Clone)]
#[command(
    name = "dumpling",
    version,
    about = "Upload and download crash dumps and their artifacts",
    after_help = "EXAMPLES:\n    \
        dumpling upload --dumppath ./core.1234 --incpaths /usr/share/dotnet/shared\n    \
        dumpling download --dumpid 1f2e3d --downdir ./dumps\n    \
        dumpling update --dumpid 1f2e3d --properties STATUS=triaged"
)]
pub struct Cli {
    /// Print all critical, standard and diagnostic messages
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Only print critical messages
    #[arg(long, global = true)]
    pub squelch: bool,

    /// Append message output to this file
    #[arg(long, global = true, value_name = "FILE")]
    pub logpath: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Dumpling service base URL
    #[arg(long, global = true, value_name = "URL")]
    pub url: Option<String>,

    /// Maximum concurrent transfers (1 transfers inline)
    #[arg(long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Resolved configuration with command line overrides applied last.
    pub fn client_config(&self) -> Result<ClientConfig, ConfigError> {
        let mut config = ClientConfig::resolve(self.config.as_deref())?;
        if let Some(url) = &self.url {
            config.service_url = url.clone();
        }
        if let Some(threads) = self.threads {
            config.max_threads = threads;
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Upload a dump and its referenced files, or loose files
    Upload(UploadArgs),
    /// Download an artifact or every artifact of a dump
    Download(DownloadArgs),
    /// Add properties or files to an existing dump
    Update(UpdateArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct UploadArgs {
    /// Path to the dump file to upload
    #[arg(long, value_name = "PATH")]
    pub dumppath: Option<PathBuf>,

    /// Name shown in reports for the dump (ignored without --dumppath)
    #[arg(long, value_name = "NAME")]
    pub displayname: Option<String>,

    /// User name sent as the dump origin (ignored without --dumppath)
    #[arg(long, value_name = "USER")]
    pub user: Option<String>,

    /// Do not attach client triage properties to the dump
    #[arg(long)]
    pub suppresstriage: bool,

    /// Files or directories to include in the upload
    #[arg(long, num_args = 0.., value_name = "PATH")]
    pub incpaths: Vec<PathBuf>,

    /// Properties to associate with the dump
    #[arg(long, num_args = 0.., value_name = "key=value", value_parser = parse_key_value)]
    pub properties: Vec<(String, String)>,

    /// JSON file holding an object of property values
    #[arg(long, value_name = "FILE")]
    pub propfile: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
#[command(group(
    ArgGroup::new("source")
        .required(true)
        .args(["dumpid", "hash", "symindex"])
))]
pub struct DownloadArgs {
    /// Dumpling id of the dump to download
    #[arg(long, value_name = "ID")]
    pub dumpid: Option<String>,

    /// Hash of a single artifact to download
    #[arg(long, value_name = "HASH")]
    pub hash: Option<String>,

    /// Symstore index of the artifact to download
    #[arg(long, value_name = "INDEX")]
    pub symindex: Option<String>,

    /// File to download to; takes precedence over --downdir
    #[arg(long, value_name = "PATH")]
    pub downpath: Option<PathBuf>,

    /// Directory to download into (defaults to the current directory)
    #[arg(long, value_name = "DIR")]
    pub downdir: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct UpdateArgs {
    /// Dumpling id the updates apply to
    #[arg(long, value_name = "ID")]
    pub dumpid: String,

    /// Properties to associate with the dump
    #[arg(long, num_args = 0.., value_name = "key=value", value_parser = parse_key_value)]
    pub properties: Vec<(String, String)>,

    /// JSON file holding an object of property values
    #[arg(long, value_name = "FILE")]
    pub propfile: Option<PathBuf>,

    /// Files or directories to attach to the dump
    #[arg(long, num_args = 0.., value_name = "PATH")]
    pub incpaths: Vec<PathBuf>,
}
