//! Single-pass hash + gzip transform for artifacts
//!
//! The digest is always SHA-1 over the uncompressed bytes: hashed before the
//! encoder on upload, after the decoder on download. Files are streamed in
//! `BLOCK_SIZE` blocks and never buffered whole.

use crate::config::ClientConfig;
use crate::error::{Result, TransferError};
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use sha1::{Digest, Sha1};
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempPath};

/// Read block size (1 MB)
pub const BLOCK_SIZE: usize = 1024 * 1024;

/// Length of a hex-encoded SHA-1 digest
pub const DIGEST_LEN: usize = 40;

const TEMP_PREFIX: &str = "dumpling-";
const TEMP_SUFFIX: &str = ".gz";

/// A compressed copy of a source file, deleted when `path` is dropped or closed
#[derive(Debug)]
pub struct CompressedArtifact {
    pub path: TempPath,
    pub digest: String,
    pub size: u64,
    pub compressed_size: u64,
}

#[derive(Debug, Clone)]
pub struct ContentPipeline {
    compression: Compression,
    temp_dir: Option<PathBuf>,
}

impl Default for ContentPipeline {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_COMPRESSION_LEVEL, None)
    }
}

impl ContentPipeline {
    pub fn new(compression_level: u32, temp_dir: Option<PathBuf>) -> Self {
        Self {
            compression: Compression::new(compression_level),
            temp_dir,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.compression_level, config.temp_dir.clone())
    }

    /// Gzip `source` into a fresh temp file, hashing it on the way through.
    pub fn compress_and_hash(&self, source: &Path) -> Result<CompressedArtifact> {
        let mut input = File::open(source).map_err(|e| TransferError::io(source, e))?;

        let (file, path) = self.temp_file()?.into_parts();
        let mut encoder = GzEncoder::new(BufWriter::new(file), self.compression);
        let (digest, size) = hash_copy(&mut input, &mut encoder, source, &path)?;

        let writer = encoder.finish().map_err(|e| TransferError::io(&*path, e))?;
        let file = writer
            .into_inner()
            .map_err(|e| TransferError::io(&*path, e.into_error()))?;
        let compressed_size = file
            .metadata()
            .map_err(|e| TransferError::io(&*path, e))?
            .len();

        Ok(CompressedArtifact {
            path,
            digest,
            size,
            compressed_size,
        })
    }

    /// Gunzip `source` into `dest` and return the digest of the decompressed bytes.
    ///
    /// Concatenated gzip members are decoded as one stream.
    ///
    /// Creates missing parent directories of `dest`. A partially written `dest`
    /// is left behind on failure.
    pub fn decompress_and_hash(&self, source: &Path, dest: &Path) -> Result<String> {
        let input = File::open(source).map_err(|e| TransferError::io(source, e))?;
        ensure_parent_dir(dest)?;
        let output = File::create(dest).map_err(|e| TransferError::io(dest, e))?;

        let mut decoder = MultiGzDecoder::new(input);
        let mut writer = BufWriter::new(output);
        let (digest, _) = hash_copy(&mut decoder, &mut writer, source, dest)?;
        writer.flush().map_err(|e| TransferError::io(dest, e))?;

        Ok(digest)
    }

    /// Uniquely named scratch file for compressed content.
    pub fn temp_file(&self) -> Result<NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(TEMP_PREFIX).suffix(TEMP_SUFFIX);
        match &self.temp_dir {
            Some(dir) => builder
                .tempfile_in(dir)
                .map_err(|e| TransferError::io(dir, e)),
            None => builder
                .tempfile()
                .map_err(|e| TransferError::io(std::env::temp_dir(), e)),
        }
    }
}

/// Copy `reader` into `writer` block by block, hashing every byte read.
fn hash_copy<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    source: &Path,
    dest: &Path,
) -> Result<(String, u64)> {
    let mut hasher = Sha1::new();
    let mut buf = vec![0u8; BLOCK_SIZE];
    let mut total: u64 = 0;

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(TransferError::io(source, e)),
        };
        hasher.update(&buf[..n]);
        writer
            .write_all(&buf[..n])
            .map_err(|e| TransferError::io(dest, e))?;
        total += n as u64;
    }

    Ok((hex::encode(hasher.finalize()), total))
}

/// Make sure the directory that will hold `path` exists.
///
/// Losing a creation race to another worker is fine as long as the directory is
/// there afterwards.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => return Ok(()),
    };
    if parent.is_dir() {
        return Ok(());
    }
    match fs::create_dir_all(parent) {
        Ok(()) => Ok(()),
        Err(_) if parent.is_dir() => Ok(()),
        Err(e) => Err(TransferError::io(parent, e)),
    }
}

/// True for a 40 character hex string, the only digest form the service accepts.
pub fn is_valid_digest(hash: &str) -> bool {
    hash.len() == DIGEST_LEN && hash.chars().all(|c| c.is_ascii_hexdigit())
}
