#![forbid(unsafe_code)]

//! pk3 archive assembly. Entries are collected, deduplicated, sorted, and
//! written with stored compression and a fixed timestamp so that two runs
//! over the same inputs produce byte-identical archives.

use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use zip::write::FileOptions;
use zip::CompressionMethod;

pub mod transform;

#[derive(Debug)]
pub enum PakError {
    Io(std::io::Error),
    Zip(zip::result::ZipError),
    EmptyArchive(String),
}

impl fmt::Display for PakError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PakError::Io(err) => write!(f, "io error: {}", err),
            PakError::Zip(err) => write!(f, "zip error: {}", err),
            PakError::EmptyArchive(name) => write!(f, "refusing to write empty archive: {}", name),
        }
    }
}

impl std::error::Error for PakError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PakError::Io(err) => Some(err),
            PakError::Zip(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PakError {
    fn from(err: std::io::Error) -> Self {
        PakError::Io(err)
    }
}

impl From<zip::result::ZipError> for PakError {
    fn from(err: zip::result::ZipError) -> Self {
        PakError::Zip(err)
    }
}

/// Where an entry's payload lives. Most entries stream straight from disk;
/// transformed entries carry their re-encoded bytes in memory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntrySource {
    File(PathBuf),
    Bytes(Vec<u8>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PakEntry {
    pub name: String,
    pub source: EntrySource,
    pub size: u64,
}

impl PakEntry {
    pub fn from_file(name: impl Into<String>, path: impl Into<PathBuf>, size: u64) -> Self {
        PakEntry {
            name: name.into(),
            source: EntrySource::File(path.into()),
            size,
        }
    }

    pub fn from_bytes(name: impl Into<String>, data: Vec<u8>) -> Self {
        let size = data.len() as u64;
        PakEntry {
            name: name.into(),
            source: EntrySource::Bytes(data),
            size,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PakSummary {
    pub path: PathBuf,
    pub entries: usize,
    pub content_bytes: u64,
}

/// Sort case-insensitively by archive name and drop duplicates, keeping
/// the first occurrence of each name.
pub fn normalize_entries(mut entries: Vec<PakEntry>) -> Vec<PakEntry> {
    entries.sort_by(|a, b| {
        a.name
            .to_ascii_lowercase()
            .cmp(&b.name.to_ascii_lowercase())
    });
    entries.dedup_by(|next, kept| next.name.eq_ignore_ascii_case(&kept.name));
    entries
}

fn pak_timestamp() -> zip::DateTime {
    zip::DateTime::from_date_and_time(2000, 1, 1, 0, 0, 0).unwrap_or_default()
}

/// Write a single archive. Entries must already be normalized; the writer
/// preserves the order it is given.
pub fn write_pak(path: &Path, entries: &[PakEntry]) -> Result<PakSummary, PakError> {
    if entries.is_empty() {
        return Err(PakError::EmptyArchive(path.display().to_string()));
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    let mut writer = zip::ZipWriter::new(BufWriter::new(file));
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Stored)
        .last_modified_time(pak_timestamp());

    let mut content_bytes = 0u64;
    for entry in entries {
        writer.start_file(entry.name.as_str(), options)?;
        match &entry.source {
            EntrySource::File(source) => {
                let data = fs::read(source)?;
                content_bytes += data.len() as u64;
                writer.write_all(&data)?;
            }
            EntrySource::Bytes(data) => {
                content_bytes += data.len() as u64;
                writer.write_all(data)?;
            }
        }
    }
    writer.finish()?;

    Ok(PakSummary {
        path: path.to_path_buf(),
        entries: entries.len(),
        content_bytes,
    })
}

/// Greedy size split: entries go into the current part in order, and the
/// part is closed as soon as its running content total reaches
/// `max_bytes`. A single oversized entry therefore gets a part to itself,
/// and the final part may be arbitrarily small.
pub fn plan_parts(entries: &[PakEntry], max_bytes: u64) -> Vec<Vec<PakEntry>> {
    let mut parts: Vec<Vec<PakEntry>> = Vec::new();
    let mut current: Vec<PakEntry> = Vec::new();
    let mut running = 0u64;

    for entry in entries {
        running += entry.size;
        current.push(entry.clone());
        if running >= max_bytes {
            parts.push(std::mem::take(&mut current));
            running = 0;
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

/// Write `{stem}0.pk3`, `{stem}1.pk3`, … under `dir`, splitting by size.
/// Entries must already be normalized.
pub fn write_split_pak(
    dir: &Path,
    stem: &str,
    entries: &[PakEntry],
    max_bytes: u64,
) -> Result<Vec<PakSummary>, PakError> {
    if entries.is_empty() {
        return Err(PakError::EmptyArchive(format!("{}/{}*.pk3", dir.display(), stem)));
    }
    let parts = plan_parts(entries, max_bytes);
    let mut summaries = Vec::with_capacity(parts.len());
    for (index, part) in parts.iter().enumerate() {
        let path = dir.join(format!("{}{}.pk3", stem, index));
        summaries.push(write_pak(&path, part)?);
    }
    Ok(summaries)
}
