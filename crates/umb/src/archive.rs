//! Named-blob container stored as a tar or gzip-compressed tar file.
//!
//! An archive is a flat mapping from member name to bytes. Only regular file
//! members are read back; directories, links and other entry kinds are
//! skipped.
//!
//! Writing follows an atomic pattern:
//! 1. Build the whole tar (and gzip) stream in memory
//! 2. Write it to a sibling temp file (`<name>.tmp`)
//! 3. fsync the temp file
//! 4. Atomic rename to the final path
//! 5. fsync the parent directory (rename persistence)
//!
//! A failure at any step leaves the destination untouched.

use crate::error::{Result, UmbError};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Archive contents: member name to member bytes, ordered by name.
pub type Members = BTreeMap<String, Vec<u8>>;

/// File mode recorded for every written member.
const MEMBER_MODE: u32 = 0o644;

/// Suffix of the temp file used during atomic writes.
const TMP_SUFFIX: &str = ".tmp";

/// Upper bound on the buffer reserved up front for one member.
const MAX_PREALLOCATION: u64 = 16 * 1024 * 1024;

/// Compression applied to the tar stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// Plain tar.
    #[default]
    None,
    /// Gzip-compressed tar.
    Gzip,
}

impl Compression {
    /// Selects the compression from the path suffix: `.gz` means gzip.
    pub fn from_path(path: &Path) -> Self {
        match path.extension() {
            Some(ext) if ext == "gz" => Self::Gzip,
            _ => Self::None,
        }
    }
}

/// Reads all regular file members of the archive at `path`.
///
/// Gzip is assumed when the path ends with `.gz`.
///
/// # Errors
///
/// Returns `UmbError::ArchiveRead` if the file is missing or is not a
/// readable (gzip-)tar stream.
pub fn read(path: &Path) -> Result<Members> {
    read_with(path, Compression::from_path(path))
}

/// Reads all regular file members of the archive at `path` with an explicit
/// compression.
///
/// # Errors
///
/// Returns `UmbError::ArchiveRead` if the file is missing or is not a
/// readable (gzip-)tar stream.
pub fn read_with(path: &Path, compression: Compression) -> Result<Members> {
    let file = File::open(path).map_err(|e| read_error(path, e))?;
    let reader = BufReader::new(file);

    let members = match compression {
        Compression::None => read_members(path, tar::Archive::new(reader))?,
        Compression::Gzip => read_members(path, tar::Archive::new(GzDecoder::new(reader)))?,
    };

    debug!(
        "Read archive {} ({} members, {} bytes)",
        path.display(),
        members.len(),
        members.values().map(Vec::len).sum::<usize>()
    );
    Ok(members)
}

fn read_members<R: Read>(path: &Path, mut archive: tar::Archive<R>) -> Result<Members> {
    let mut members = Members::new();

    for entry in archive.entries().map_err(|e| read_error(path, e))? {
        let mut entry = entry.map_err(|e| read_error(path, e))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }

        let name = entry
            .path()
            .map_err(|e| read_error(path, e))?
            .to_string_lossy()
            .trim_start_matches("./")
            .to_string();

        // The header size is untrusted; it only bounds the preallocation.
        let size = entry.size();
        let mut data = Vec::with_capacity(size.min(MAX_PREALLOCATION) as usize);
        entry
            .read_to_end(&mut data)
            .map_err(|e| read_error(path, e))?;
        if (data.len() as u64) < size {
            return Err(UmbError::ArchiveRead {
                path: path.to_path_buf(),
                reason: format!(
                    "member {name} is truncated: header declares {size} bytes, found {}",
                    data.len()
                ),
            });
        }

        if members.insert(name.clone(), data).is_some() {
            warn!(
                "Duplicate archive member {} in {}, keeping the last one",
                name,
                path.display()
            );
        }
    }

    Ok(members)
}

/// Writes `members` as an archive at `path`, replacing any existing file.
///
/// Gzip is used when the path ends with `.gz`.
///
/// # Errors
///
/// Returns `UmbError::ArchiveWrite` if any I/O operation fails.
pub fn write(path: &Path, members: &Members) -> Result<()> {
    write_with(path, members, Compression::from_path(path))
}

/// Writes `members` as an archive at `path` with an explicit compression.
///
/// # Errors
///
/// Returns `UmbError::ArchiveWrite` if any I/O operation fails.
pub fn write_with(path: &Path, members: &Members, compression: Compression) -> Result<()> {
    let bytes = build(members, compression).map_err(|e| write_error(path, e))?;

    let tmp_path = tmp_path(path)?;
    if let Err(e) = persist(path, &tmp_path, &bytes) {
        // Best effort: the temp file may not exist if creation failed.
        let _ = fs::remove_file(&tmp_path);
        return Err(write_error(path, e));
    }

    debug!(
        "Wrote archive {} ({} members, {} bytes, {:?})",
        path.display(),
        members.len(),
        bytes.len(),
        compression
    );
    Ok(())
}

/// Builds the complete archive stream in memory.
fn build(members: &Members, compression: Compression) -> std::io::Result<Vec<u8>> {
    let mut builder = tar::Builder::new(Vec::new());
    for (name, data) in members {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(data.len() as u64);
        header.set_mode(MEMBER_MODE);
        builder.append_data(&mut header, name, data.as_slice())?;
    }
    let tar_bytes = builder.into_inner()?;

    match compression {
        Compression::None => Ok(tar_bytes),
        Compression::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(&tar_bytes)?;
            encoder.finish()
        }
    }
}

fn persist(path: &Path, tmp_path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    // 1. Write and fsync the temp file
    {
        let mut file = File::create(tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }

    // 2. Atomic rename
    fs::rename(tmp_path, path)?;

    // 3. fsync directory (rename persistence)
    #[cfg(unix)]
    {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        File::open(dir)?.sync_all()?;
    }

    Ok(())
}

fn tmp_path(path: &Path) -> Result<PathBuf> {
    let file_name = path
        .file_name()
        .ok_or_else(|| write_error(path, "path has no file name"))?;
    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(TMP_SUFFIX);
    Ok(path.with_file_name(tmp_name))
}

fn read_error(path: &Path, reason: impl ToString) -> UmbError {
    UmbError::ArchiveRead {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn write_error(path: &Path, reason: impl ToString) -> UmbError {
    UmbError::ArchiveWrite {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}
