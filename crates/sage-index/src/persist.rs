//! On-disk snapshot format.
//!
//! A snapshot file is one JSON header line followed by the JSON payload:
//!
//! ```text
//! {"format":"sage-index","version":1,"checksum":"<blake3 hex of payload>"}
//! {"documents":[...],"term_model":{...},"matrix":{...},"is_fitted":true}
//! ```
//!
//! Writes go to a sibling temp file that is renamed over the target, so a
//! crash mid-write leaves the previous snapshot intact.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::document::Chunk;
use crate::error::IndexError;
use crate::tfidf::{SparseMatrix, TermModel};

const FORMAT_NAME: &str = "sage-index";
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    format: String,
    version: u32,
    checksum: String,
}

#[derive(Serialize)]
pub(crate) struct SnapshotRef<'a> {
    pub documents: &'a [Chunk],
    pub term_model: Option<&'a TermModel>,
    pub matrix: Option<&'a SparseMatrix>,
    pub is_fitted: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Snapshot {
    pub documents: Vec<Chunk>,
    pub term_model: Option<TermModel>,
    pub matrix: Option<SparseMatrix>,
    pub is_fitted: bool,
}

pub(crate) enum LoadOutcome {
    Missing,
    Loaded(Snapshot),
    Corrupt(String),
}

pub(crate) fn write(path: &Path, snapshot: &SnapshotRef<'_>) -> Result<(), IndexError> {
    let payload = serde_json::to_vec(snapshot)?;
    let header = Header {
        format: FORMAT_NAME.to_owned(),
        version: FORMAT_VERSION,
        checksum: blake3::hash(&payload).to_hex().to_string(),
    };

    let mut bytes = serde_json::to_vec(&header)?;
    bytes.push(b'\n');
    bytes.extend_from_slice(&payload);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = sibling(path, "tmp");
    std::fs::write(&tmp, &bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

pub(crate) fn read(path: &Path) -> LoadOutcome {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return LoadOutcome::Missing,
        Err(e) => return LoadOutcome::Corrupt(format!("read failed: {e}")),
    };
    match parse(&bytes) {
        Ok(snapshot) => LoadOutcome::Loaded(snapshot),
        Err(e) => LoadOutcome::Corrupt(e.to_string()),
    }
}

fn parse(bytes: &[u8]) -> Result<Snapshot, IndexError> {
    let split = bytes
        .iter()
        .position(|&b| b == b'\n')
        .ok_or_else(|| IndexError::Corrupt("missing header line".into()))?;
    let (header, payload) = (&bytes[..split], &bytes[split + 1..]);

    let header: Header = serde_json::from_slice(header)
        .map_err(|e| IndexError::Corrupt(format!("bad header: {e}")))?;
    if header.format != FORMAT_NAME {
        return Err(IndexError::Corrupt(format!(
            "unknown format {:?}",
            header.format
        )));
    }
    if header.version != FORMAT_VERSION {
        return Err(IndexError::Corrupt(format!(
            "unsupported version {} (expected {FORMAT_VERSION})",
            header.version
        )));
    }
    let actual = blake3::hash(payload).to_hex();
    if actual.as_str() != header.checksum {
        return Err(IndexError::Corrupt("checksum mismatch".into()));
    }

    let mut snapshot: Snapshot = serde_json::from_slice(payload)?;
    snapshot.validate()?;
    Ok(snapshot)
}

impl Snapshot {
    fn validate(&mut self) -> Result<(), IndexError> {
        match (self.is_fitted, self.term_model.as_mut(), self.matrix.as_ref()) {
            (true, Some(model), Some(matrix)) => {
                model.validate()?;
                if matrix.rows.len() != self.documents.len() {
                    return Err(IndexError::Corrupt(format!(
                        "{} documents but {} matrix rows",
                        self.documents.len(),
                        matrix.rows.len()
                    )));
                }
                if !model.matrix_fits(matrix) {
                    return Err(IndexError::Corrupt(
                        "matrix does not match vocabulary".into(),
                    ));
                }
                Ok(())
            }
            (true, _, _) => Err(IndexError::Corrupt(
                "fitted index without model or matrix".into(),
            )),
            (false, _, _) if !self.documents.is_empty() => Err(IndexError::Corrupt(
                "unfitted index with documents".into(),
            )),
            (false, _, _) => Ok(()),
        }
    }
}

/// Move an unreadable snapshot aside as `<name>.corrupt` and return the new path.
pub(crate) fn quarantine(path: &Path) -> std::io::Result<PathBuf> {
    let target = sibling(path, "corrupt");
    std::fs::rename(path, &target)?;
    Ok(target)
}

/// Remove the snapshot; a missing file is not an error.
pub(crate) fn remove(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}
