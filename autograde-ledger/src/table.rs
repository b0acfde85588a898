//! CSV tables with strict reads and hash-gated atomic writes.
//!
//! ## `write_table`: protocol
//!
//! 1. Serialize header + rows to an in-memory buffer (LF line endings).
//! 2. SHA-256 the buffer and the file currently on disk.
//! 3. Skip if identical.
//! 4. Write to `<path>.autograde.tmp` in the same directory.
//! 5. Rename to the final path (atomic on POSIX).
//!
//! ## `read_table`
//!
//! Reads the whole file, rejects non-UTF-8 bytes, strips a UTF-8 BOM,
//! checks the header against the expected columns, and deserializes every
//! row. Any failure aborts the read; no partial table is ever returned.

use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{io_err, LedgerError};

/// Outcome of a table write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    /// File was written (content changed or did not previously exist).
    Written { path: PathBuf },
    /// File was skipped: serialized content matches the file on disk.
    Unchanged { path: PathBuf },
}

/// Column contract of a table.
#[derive(Debug, Clone, Copy)]
pub struct Columns {
    /// Canonical header, in write order.
    pub canonical: &'static [&'static str],
    /// Accepted on read in place of a canonical column: `(alias, canonical)`.
    pub aliases: &'static [(&'static str, &'static str)],
    /// Canonical columns that may be absent from older files.
    pub optional: &'static [&'static str],
}

impl Columns {
    fn check(&self, path: &Path, found: &csv::StringRecord) -> Result<(), LedgerError> {
        let mut seen = Vec::new();
        for name in found.iter() {
            let canonical = self
                .aliases
                .iter()
                .find(|(alias, _)| *alias == name)
                .map(|(_, canonical)| *canonical)
                .unwrap_or(name);
            if !self.canonical.contains(&canonical) {
                return Err(LedgerError::Header {
                    path: path.to_path_buf(),
                    reason: format!(
                        "unknown column '{name}' (expected: {})",
                        self.canonical.join(", ")
                    ),
                });
            }
            if seen.contains(&canonical) {
                return Err(LedgerError::Header {
                    path: path.to_path_buf(),
                    reason: format!("column '{canonical}' appears twice"),
                });
            }
            seen.push(canonical);
        }
        let missing: Vec<&str> = self
            .canonical
            .iter()
            .filter(|c| !seen.contains(c) && !self.optional.contains(c))
            .copied()
            .collect();
        if !missing.is_empty() {
            return Err(LedgerError::Header {
                path: path.to_path_buf(),
                reason: format!("missing column(s): {}", missing.join(", ")),
            });
        }
        Ok(())
    }
}

/// Read the raw text of a ledger file, enforcing UTF-8.
pub fn read_utf8(path: &Path) -> Result<String, LedgerError> {
    let bytes = std::fs::read(path).map_err(|e| io_err(path, e))?;
    let mut text = String::from_utf8(bytes).map_err(|source| LedgerError::Encoding {
        path: path.to_path_buf(),
        source,
    })?;
    if text.starts_with('\u{feff}') {
        text.drain(..'\u{feff}'.len_utf8());
    }
    Ok(text)
}

/// Load every row of a CSV table at `path`.
///
/// Returns `(row, line)` pairs so callers can report rule violations with a
/// line number.
pub fn read_table<T: DeserializeOwned>(
    path: &Path,
    columns: &Columns,
) -> Result<Vec<(T, u64)>, LedgerError> {
    let text = read_utf8(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|source| LedgerError::Parse {
            path: path.to_path_buf(),
            source,
        })?
        .clone();
    if headers.is_empty() || (headers.len() == 1 && headers.get(0) == Some("")) {
        return Err(LedgerError::Header {
            path: path.to_path_buf(),
            reason: "file has no header row".to_string(),
        });
    }
    columns.check(path, &headers)?;

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|source| LedgerError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let row: T = record
            .deserialize(Some(&headers))
            .map_err(|err| LedgerError::Malformed {
                path: path.to_path_buf(),
                line,
                reason: err.to_string(),
            })?;
        rows.push((row, line));
    }
    Ok(rows)
}

/// Serialize `rows` under the canonical header.
pub fn render_table<'a, T, I>(columns: &Columns, rows: I) -> Result<String, csv::Error>
where
    T: Serialize + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(columns.canonical)?;
    for row in rows {
        writer.serialize(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    // csv only ever emits the UTF-8 it was handed.
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Serialize and atomically write a table, skipping the write when the
/// on-disk file already holds identical bytes.
pub fn write_table<'a, T, I>(
    path: &Path,
    columns: &Columns,
    rows: I,
) -> Result<WriteResult, LedgerError>
where
    T: Serialize + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let content = render_table(columns, rows).map_err(|source| LedgerError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let tmp = PathBuf::from(format!("{}.autograde.tmp", path.display()));
    atomic_write_with_tmp(path, &content, &tmp)
}

fn digest(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    hex::encode(h.finalize())
}

pub(crate) fn atomic_write_with_tmp(
    path: &Path,
    content: &str,
    tmp: &Path,
) -> Result<WriteResult, LedgerError> {
    match std::fs::read(path) {
        Ok(existing) if digest(&existing) == digest(content.as_bytes()) => {
            tracing::debug!(path = %path.display(), "unchanged");
            return Ok(WriteResult::Unchanged {
                path: path.to_path_buf(),
            });
        }
        Ok(_) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(io_err(path, err)),
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    std::fs::write(tmp, content).map_err(|e| io_err(tmp, e))?;

    if let Err(e) = std::fs::rename(tmp, path) {
        let _ = std::fs::remove_file(tmp);
        return Err(io_err(path, e));
    }

    tracing::debug!(path = %path.display(), "wrote");
    Ok(WriteResult::Written {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
