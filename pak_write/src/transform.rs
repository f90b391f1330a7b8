use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::{EntrySource, PakEntry};

#[derive(Debug)]
pub enum TransformError {
    Io(std::io::Error),
    EncoderFailed { encoder: String, status: String },
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformError::Io(err) => write!(f, "io error: {}", err),
            TransformError::EncoderFailed { encoder, status } => {
                write!(f, "{} failed: {}", encoder, status)
            }
        }
    }
}

impl std::error::Error for TransformError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransformError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for TransformError {
    fn from(err: std::io::Error) -> Self {
        TransformError::Io(err)
    }
}

/// What to do with an entry whose transform failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransformFailure {
    KeepOriginal,
    Drop,
}

/// A content rewrite applied to matching entries before archiving. The
/// returned entry replaces the original, usually under a new name.
pub trait Transform {
    fn applies_to(&self, name: &str) -> bool;
    fn apply(&self, entry: &PakEntry) -> Result<PakEntry, TransformError>;
}

/// Re-encodes `.wav` entries to `.opus` via an external `opusenc`
/// binary. The encoder works file-to-file, so in-memory entries are
/// staged through the system temp directory.
pub struct OpusTransform {
    encoder: String,
}

impl OpusTransform {
    pub fn new(encoder: impl Into<String>) -> Self {
        OpusTransform {
            encoder: encoder.into(),
        }
    }

    fn stage_dir() -> std::io::Result<PathBuf> {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("repak_opus_{}_{}", std::process::id(), nanos));
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

impl Transform for OpusTransform {
    fn applies_to(&self, name: &str) -> bool {
        name.to_ascii_lowercase().ends_with(".wav")
    }

    fn apply(&self, entry: &PakEntry) -> Result<PakEntry, TransformError> {
        let stage = Self::stage_dir()?;
        let input = match &entry.source {
            EntrySource::File(path) => path.clone(),
            EntrySource::Bytes(data) => {
                let staged = stage.join("input.wav");
                fs::write(&staged, data)?;
                staged
            }
        };
        let output = stage.join("output.opus");

        let status = Command::new(&self.encoder)
            .arg("--quiet")
            .arg(&input)
            .arg(&output)
            .status()?;
        if !status.success() {
            fs::remove_dir_all(&stage).ok();
            return Err(TransformError::EncoderFailed {
                encoder: self.encoder.clone(),
                status: status.to_string(),
            });
        }

        let data = fs::read(&output)?;
        fs::remove_dir_all(&stage).ok();

        let mut name = entry.name.clone();
        let cut = name.len() - ".wav".len();
        name.truncate(cut);
        name.push_str(".opus");
        Ok(PakEntry::from_bytes(name, data))
    }
}

/// Run every matching transform over the entry list. Failures follow the
/// `on_failure` policy and are reported as warnings either way.
pub fn apply_transforms(
    entries: Vec<PakEntry>,
    transforms: &[Box<dyn Transform>],
    on_failure: TransformFailure,
) -> (Vec<PakEntry>, Vec<String>) {
    let mut out = Vec::with_capacity(entries.len());
    let mut warnings = Vec::new();

    'next_entry: for entry in entries {
        for transform in transforms {
            if !transform.applies_to(&entry.name) {
                continue;
            }
            match transform.apply(&entry) {
                Ok(replacement) => {
                    out.push(replacement);
                    continue 'next_entry;
                }
                Err(err) => {
                    warnings.push(format!("transform failed for {}: {}", entry.name, err));
                    match on_failure {
                        TransformFailure::KeepOriginal => break,
                        TransformFailure::Drop => continue 'next_entry,
                    }
                }
            }
        }
        out.push(entry);
    }
    (out, warnings)
}
