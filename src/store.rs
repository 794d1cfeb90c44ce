//! Tabular Store: one current dataset per user.
//!
//! File content lives on disk under `<data_dir>/<owner>/csv_files/`, the
//! record of each upload lives in the `stored_files` table. The current dataset
//! of an owner is the newest record, unless that record has been detached by a
//! `clear`, in which case the owner has none until the next upload.

use crate::db::Database;
use crate::downloader;
use crate::error::{PlotError, PlotResult};
use crate::loader;
use crate::table::TableSnapshot;
use chrono::{DateTime, SecondsFormat, Utc};
use lazy_static::lazy_static;
use log::{debug, info};
use regex::Regex;
use rusqlite::{OptionalExtension, params};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

lazy_static! {
    static ref UNSAFE_NAME_CHARS: Regex = Regex::new(r"[^A-Za-z0-9._-]").unwrap();
}

/// Recognized table-file extension for uploads.
pub const CSV_EXTENSION: &str = ".csv";

/// One uploaded file record
#[derive(Debug, Clone, Serialize)]
pub struct StoredFile {
    pub id: i64,
    pub owner: String,
    pub path: String,
    pub original_name: String,
    pub uploaded_at: DateTime<Utc>,
    pub detached: bool,
}

pub struct TabularStore {
    db: Arc<Database>,
    data_dir: PathBuf,
}

impl TabularStore {
    pub fn new(db: Arc<Database>, data_dir: impl Into<PathBuf>) -> Self {
        TabularStore {
            db,
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// The record of the owner's current dataset, if any.
    pub fn current_file(&self, owner: &str) -> PlotResult<Option<StoredFile>> {
        let conn = self.db.lock()?;
        let newest = conn
            .query_row(
                "SELECT id, owner, path, original_name, uploaded_at, detached
                 FROM stored_files WHERE owner = ?1
                 ORDER BY uploaded_at DESC, id DESC LIMIT 1",
                params![owner],
                row_to_file,
            )
            .optional()?;
        Ok(newest.filter(|f| !f.detached))
    }

    /// All uploads of an owner, newest first.
    pub fn files(&self, owner: &str) -> PlotResult<Vec<StoredFile>> {
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, owner, path, original_name, uploaded_at, detached
             FROM stored_files WHERE owner = ?1
             ORDER BY uploaded_at DESC, id DESC",
        )?;
        let files = stmt
            .query_map(params![owner], row_to_file)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(files)
    }

    /// Materialize the owner's current dataset.
    ///
    /// Anonymous callers and owners without a current file get an empty
    /// snapshot, never an error.
    pub fn load_current(&self, owner: Option<&str>) -> PlotResult<TableSnapshot> {
        let Some(owner) = owner else {
            return Ok(TableSnapshot::empty());
        };
        match self.current_file(owner)? {
            Some(file) => {
                debug!("loading dataset {} for {}", file.path, owner);
                loader::from_csv(&file.path)
            }
            None => Ok(TableSnapshot::empty()),
        }
    }

    /// Overwrite the content of the owner's current file with `table`.
    ///
    /// The CSV is written next to the target and renamed over it, so a reader
    /// never sees half a file.
    ///
    /// # Errors
    /// * `FileNotFound` if the owner has no current file
    pub fn replace_current(&self, owner: &str, table: &TableSnapshot) -> PlotResult<()> {
        let file = self.current_file(owner)?.ok_or(PlotError::FileNotFound)?;
        let content = downloader::to_csv(table)?;
        let target = PathBuf::from(&file.path);
        let staging = target.with_extension("csv.tmp");
        fs::write(&staging, content)?;
        fs::rename(&staging, &target)?;
        info!(
            "replaced dataset {} for {} ({} rows)",
            file.id,
            owner,
            table.row_count()
        );
        Ok(())
    }

    /// Store a new upload and make it the owner's current dataset.
    ///
    /// # Errors
    /// * `InvalidFormat` unless `filename` ends in `.csv` and the bytes parse
    pub fn upload(&self, owner: &str, bytes: &[u8], filename: &str) -> PlotResult<StoredFile> {
        if !filename.to_lowercase().ends_with(CSV_EXTENSION) {
            return Err(PlotError::InvalidFormat("This is not a CSV file".to_string()));
        }
        loader::from_csv_bytes(bytes)?;

        let dir = self.data_dir.join(safe_name(owner)).join("csv_files");
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}_{}", Uuid::new_v4().simple(), safe_name(filename)));
        fs::write(&path, bytes)?;

        let uploaded_at = Utc::now();
        let path_text = path.to_string_lossy().to_string();
        let conn = self.db.lock()?;
        conn.execute(
            "INSERT INTO stored_files (owner, path, original_name, uploaded_at, detached)
             VALUES (?1, ?2, ?3, ?4, 0)",
            params![owner, path_text, filename, timestamp(&uploaded_at)],
        )?;
        let id = conn.last_insert_rowid();
        info!("{} uploaded {} as file {}", owner, filename, id);

        Ok(StoredFile {
            id,
            owner: owner.to_string(),
            path: path_text,
            original_name: filename.to_string(),
            uploaded_at,
            detached: false,
        })
    }

    /// Dereference the owner's current file without deleting it. Returns
    /// whether anything was detached.
    pub fn detach_current(&self, owner: &str) -> PlotResult<bool> {
        let Some(file) = self.current_file(owner)? else {
            return Ok(false);
        };
        let conn = self.db.lock()?;
        conn.execute(
            "UPDATE stored_files SET detached = 1 WHERE id = ?1",
            params![file.id],
        )?;
        info!("{} detached file {}", owner, file.id);
        Ok(true)
    }
}

/// Timestamps are stored as fixed-width RFC 3339 text so they sort as strings.
pub(crate) fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(text: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_default()
}

pub(crate) fn safe_name(name: &str) -> String {
    UNSAFE_NAME_CHARS.replace_all(name, "_").into_owned()
}

fn row_to_file(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredFile> {
    let uploaded: String = row.get(4)?;
    Ok(StoredFile {
        id: row.get(0)?,
        owner: row.get(1)?,
        path: row.get(2)?,
        original_name: row.get(3)?,
        uploaded_at: parse_timestamp(&uploaded),
        detached: row.get::<_, i64>(5)? != 0,
    })
}
