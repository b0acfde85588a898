//! Roster and candidate data: who each GitHub username is.
//!
//! Two inputs are joined on the roster `identifier` and the configured
//! candidate id column:
//!
//! * the classroom roster exported by the classroom platform
//!   (`identifier,github_username,github_id,name`), and
//! * the institution's candidate export, with arbitrary columns.
//!
//! The joined [`StudentDirectory`] supplies identity fields to the grade
//! snapshot and drives the three reconciliation reports.

use std::collections::BTreeMap;
use std::path::Path;

use autograde_core::{GithubUsername, RosterConfig};

use crate::error::LedgerError;
use crate::snapshot::Report;
use crate::table;

const ROSTER_ID_COL: &str = "identifier";
const ROSTER_USER_COL: &str = "github_username";

/// A CSV file read as a header plus column-keyed rows.
#[derive(Debug, Clone)]
struct Sheet {
    header: Vec<String>,
    rows: Vec<BTreeMap<String, String>>,
}

impl Sheet {
    fn read(path: &Path, required: &[&str]) -> Result<Self, LedgerError> {
        let text = table::read_utf8(path)?;
        let parse_err = |source: csv::Error| LedgerError::Parse {
            path: path.to_path_buf(),
            source,
        };
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(text.as_bytes());
        let header: Vec<String> = reader
            .headers()
            .map_err(parse_err)?
            .iter()
            .map(str::to_string)
            .collect();
        let missing: Vec<&str> = required
            .iter()
            .filter(|c| !header.iter().any(|h| h.as_str() == **c))
            .copied()
            .collect();
        if !missing.is_empty() {
            return Err(LedgerError::Header {
                path: path.to_path_buf(),
                reason: format!("missing column(s): {}", missing.join(", ")),
            });
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(parse_err)?;
            let row: BTreeMap<String, String> = header
                .iter()
                .cloned()
                .zip(record.iter().map(str::to_string).chain(std::iter::repeat(String::new())))
                .collect();
            rows.push(row);
        }
        Ok(Self { header, rows })
    }
}

fn cell<'a>(row: &'a BTreeMap<String, String>, col: &str) -> &'a str {
    row.get(col).map(String::as_str).unwrap_or("")
}

/// Classroom roster joined with the candidate export.
#[derive(Debug, Clone)]
pub struct StudentDirectory {
    id_col: String,
    output_cols: Vec<String>,
    roster: Sheet,
    candidates: Sheet,
    /// Candidate row index by candidate id.
    by_id: BTreeMap<String, usize>,
}

impl StudentDirectory {
    /// Read both files named by `config`, relative to `marking_root`.
    pub fn load(marking_root: &Path, config: &RosterConfig) -> Result<Self, LedgerError> {
        Self::from_files(
            &marking_root.join(&config.classroom_roster_csv),
            &marking_root.join(&config.candidate_file),
            &config.candidate_id_col,
            &config.output_cols,
        )
    }

    pub fn from_files(
        roster_csv: &Path,
        candidate_csv: &Path,
        id_col: &str,
        output_cols: &[String],
    ) -> Result<Self, LedgerError> {
        let roster = Sheet::read(roster_csv, &[ROSTER_ID_COL, ROSTER_USER_COL])?;
        let mut required: Vec<&str> = vec![id_col];
        required.extend(output_cols.iter().map(String::as_str));
        let candidates = Sheet::read(candidate_csv, &required)?;

        let mut by_id = BTreeMap::new();
        for (idx, row) in candidates.rows.iter().enumerate() {
            let id = cell(row, id_col);
            if id.is_empty() {
                continue;
            }
            if by_id.insert(id.to_string(), idx).is_some() {
                tracing::warn!(candidate = id, path = %candidate_csv.display(), "duplicate candidate id");
            }
        }

        Ok(Self {
            id_col: id_col.to_string(),
            output_cols: output_cols.to_vec(),
            roster,
            candidates,
            by_id,
        })
    }

    /// Candidate id column followed by the configured output columns.
    pub fn identity_columns(&self) -> Vec<String> {
        std::iter::once(self.id_col.clone())
            .chain(self.output_cols.iter().cloned())
            .collect()
    }

    /// Identity cells for `username`, aligned with [`identity_columns`];
    /// all empty when the username is not linked to a candidate.
    ///
    /// [`identity_columns`]: Self::identity_columns
    pub fn identity(&self, username: &GithubUsername) -> Vec<String> {
        let candidate = self
            .roster
            .rows
            .iter()
            .find(|r| cell(r, ROSTER_USER_COL) == username.0)
            .and_then(|r| self.by_id.get(cell(r, ROSTER_ID_COL)))
            .map(|&idx| &self.candidates.rows[idx]);
        match candidate {
            Some(row) => self
                .identity_columns()
                .iter()
                .map(|col| cell(row, col).to_string())
                .collect(),
            None => vec![String::new(); 1 + self.output_cols.len()],
        }
    }

    fn roster_ids(&self) -> BTreeMap<&str, &BTreeMap<String, String>> {
        self.roster
            .rows
            .iter()
            .map(|r| (cell(r, ROSTER_ID_COL), r))
            .filter(|(id, _)| !id.is_empty())
            .collect()
    }

    fn candidate_report<'a>(
        &self,
        rows: impl Iterator<Item = &'a BTreeMap<String, String>>,
    ) -> Report {
        let mut report = Report::new(self.identity_columns());
        for row in rows {
            report.rows.push(
                report
                    .header
                    .iter()
                    .map(|col| cell(row, col).to_string())
                    .collect(),
            );
        }
        report
    }

    /// Candidates with no roster entry: enrolled since the roster was last
    /// exported.
    pub fn missing_roster_ids(&self) -> Report {
        let roster_ids = self.roster_ids();
        self.candidate_report(
            self.candidates
                .rows
                .iter()
                .filter(|r| !roster_ids.contains_key(cell(r, &self.id_col))),
        )
    }

    /// Roster entries with no matching candidate: withdrawn students or
    /// mistyped identifiers.
    pub fn missing_candidates(&self) -> Report {
        let mut report = Report::new(self.roster.header.iter().cloned());
        for row in &self.roster.rows {
            if self.by_id.contains_key(cell(row, ROSTER_ID_COL)) {
                continue;
            }
            report.rows.push(
                self.roster
                    .header
                    .iter()
                    .map(|col| cell(row, col).to_string())
                    .collect(),
            );
        }
        report
    }

    /// Candidates on the roster who have not linked a GitHub account.
    pub fn unlinked_candidates(&self) -> Report {
        let roster_ids = self.roster_ids();
        self.candidate_report(self.candidates.rows.iter().filter(|r| {
            roster_ids
                .get(cell(r, &self.id_col))
                .is_some_and(|entry| cell(entry, ROSTER_USER_COL).is_empty())
        }))
    }
}
