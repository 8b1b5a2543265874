//! Submitted inputs: kind detection, first-row CSV reading, stdin spooling.

use crate::error::InputError;
use crate::features::TabularRow;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

const EXECUTABLE_EXTENSIONS: &[&str] = &["exe", "dll", "sys"];
const TABULAR_EXTENSIONS: &[&str] = &["csv"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    Executable,
    Tabular,
}

impl InputKind {
    /// By extension, falling back to the `MZ` magic for anything else.
    pub fn detect(path: &Path) -> Result<Self, InputError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some(e) if EXECUTABLE_EXTENSIONS.contains(&e) => Ok(InputKind::Executable),
            Some(e) if TABULAR_EXTENSIONS.contains(&e) => Ok(InputKind::Tabular),
            _ if has_mz_magic(path) => Ok(InputKind::Executable),
            _ => Err(InputError::Unsupported(path.to_path_buf())),
        }
    }
}

/// Reads only the first two bytes.
pub fn has_mz_magic(path: &Path) -> bool {
    let Ok(mut f) = File::open(path) else {
        return false;
    };
    let mut magic = [0u8; 2];
    f.read_exact(&mut magic).is_ok() && &magic == b"MZ"
}

/// Hex SHA-256 of the file, streamed.
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut f = File::open(path)?;
    let mut h = Sha256::new();
    io::copy(&mut f, &mut h)?;
    Ok(format!("{:x}", h.finalize()))
}

/// Header and first data row of a CSV file. Later rows are ignored.
pub fn read_first_row(path: &Path) -> Result<TabularRow, InputError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;
    let columns: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    let record = match rdr.records().next() {
        Some(r) => r?,
        None => return Err(InputError::EmptyTable),
    };
    let values = record.iter().map(str::to_string).collect();
    Ok(TabularRow::new(columns, values))
}

/// All files under `paths`, directories expanded.
pub fn collect_files(paths: &[PathBuf], executables_only: bool) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_file() {
            files.push(path.clone());
        } else if path.is_dir() {
            for entry in WalkDir::new(path).follow_links(false).into_iter().flatten() {
                let p = entry.into_path();
                if p.is_file() && (!executables_only || has_mz_magic(&p)) {
                    files.push(p);
                }
            }
        } else {
            tracing::warn!(path = %path.display(), "skipping path that is neither file nor directory");
        }
    }
    files
}

/// Upload spooled to a temporary file; the file is removed when this is dropped.
pub struct SpooledUpload {
    file: NamedTempFile,
    name: String,
}

impl SpooledUpload {
    /// `name` is the client-side file name; only its final component is kept.
    pub fn from_reader(mut reader: impl Read, name: &str) -> io::Result<Self> {
        let name = Path::new(name)
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .unwrap_or("upload")
            .to_string();
        let suffix = Path::new(&name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_default();
        let mut file = tempfile::Builder::new()
            .prefix("hybrid-scan-")
            .suffix(&suffix)
            .tempfile()?;
        let written = io::copy(&mut reader, &mut file)?;
        file.flush()?;
        tracing::debug!(name = %name, bytes = written, path = %file.path().display(), "spooled upload");
        Ok(Self { file, name })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
