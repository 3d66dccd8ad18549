//!
//! src/snapshot.rs  Andrew Belles  Oct 17th, 2026
//!
//! Persists the local snapshot of liked tracks as a csv file.
//! The store knows nothing about reconciliation, it only loads and
//! rewrites the full table
//!

use std::{collections::HashSet, fs, io, path::{Path, PathBuf}};

use serde::Deserialize;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::errors::BackupError;
use crate::types::{Track, format_timestamp, parse_timestamp};

/// Column names, in order. The header row must match exactly.
pub const HEADER: [&str; 5] = ["track_id", "artist", "title", "added_at", "is_deleted"];

pub trait SnapshotStore {
    /// Fails with `SnapshotNotFound` when nothing exists at `location`.
    fn load(&self, location: &Path) -> Result<Vec<Track>, BackupError>;

    /// Total rewrite of `location`, rows ascending by `track_id`.
    fn save(&self, records: &[Track], location: &Path) -> Result<(), BackupError>;
}

#[derive(Debug, Deserialize)]
struct SnapshotRow {
    track_id: String,
    artist: String,
    title: String,
    added_at: String,
    is_deleted: String
}

impl SnapshotRow {
    fn into_track(self) -> Result<Track, String> {
        let added_at = parse_timestamp(&self.added_at).ok_or_else(|| {
            format!("track {}: bad added_at {:?}", self.track_id, self.added_at)
        })?;
        let is_deleted = match self.is_deleted.trim() {
            "0" => false,
            "1" => true,
            other => return Err(
                format!("track {}: bad is_deleted {other:?}", self.track_id)
            )
        };
        if self.track_id.is_empty() {
            return Err("empty track_id".to_string());
        }

        Ok(Track::new(self.track_id, self.artist, self.title, added_at, is_deleted))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CsvSnapshot;

impl CsvSnapshot {
    pub fn new() -> Self {
        Self
    }

    fn parse(content: &str) -> Result<Vec<Track>, String> {
        // an empty file carries no prior state
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(content.as_bytes());

        let headers = reader.headers().map_err(|e| e.to_string())?;
        if headers.iter().ne(HEADER.iter().copied()) {
            return Err(format!(
                "unexpected header {:?}, expected {:?}",
                headers.iter().collect::<Vec<_>>(), HEADER
            ));
        }

        let mut seen = HashSet::new();
        let mut tracks = Vec::new();
        for row in reader.deserialize::<SnapshotRow>() {
            let track = row.map_err(|e| e.to_string())?.into_track()?;
            if !seen.insert(track.track_id.clone()) {
                return Err(format!("duplicate track_id {}", track.track_id));
            }
            tracks.push(track);
        }
        Ok(tracks)
    }

    fn parent_dir(location: &Path) -> PathBuf {
        match location.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from(".")
        }
    }

    /// Temp file beside `location` carrying the mode the rewrite should end
    /// up with: the current file's mode if one exists, else 0666 under umask.
    fn temp_beside(parent: &Path, location: &Path) -> io::Result<NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(".tracks-");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            builder.permissions(fs::Permissions::from_mode(0o666));
        }

        let temp = builder.tempfile_in(parent)?;
        match fs::metadata(location) {
            Ok(meta) => temp.as_file().set_permissions(meta.permissions())?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {},
            Err(e) => return Err(e)
        }
        Ok(temp)
    }
}

impl SnapshotStore for CsvSnapshot {
    fn load(&self, location: &Path) -> Result<Vec<Track>, BackupError> {
        let content = match fs::read_to_string(location) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(BackupError::SnapshotNotFound(location.to_path_buf()));
            },
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                return Err(BackupError::SnapshotMalformed(
                    format!("{}: not utf-8", location.display())
                ));
            },
            Err(e) => return Err(e.into())
        };

        let tracks = Self::parse(&content).map_err(|e| {
            BackupError::SnapshotMalformed(format!("{}: {e}", location.display()))
        })?;

        debug!(path = %location.display(), count = tracks.len(), "snapshot.loaded");
        Ok(tracks)
    }

    fn save(&self, records: &[Track], location: &Path) -> Result<(), BackupError> {
        let parent = Self::parent_dir(location);
        fs::create_dir_all(&parent)?;

        let mut sorted: Vec<&Track> = records.iter().collect();
        sorted.sort_by(|a, b| a.track_id.cmp(&b.track_id));

        // written beside the target so the rename stays on one filesystem
        let temp = Self::temp_beside(&parent, location)?;
        {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .terminator(csv::Terminator::CRLF)
                .from_writer(temp.as_file());

            writer.write_record(HEADER).map_err(io::Error::from)?;
            for track in sorted {
                let added_at = format_timestamp(&track.added_at);
                writer.write_record([
                    track.track_id.as_str(),
                    track.artist.as_str(),
                    track.title.as_str(),
                    added_at.as_str(),
                    if track.is_deleted { "1" } else { "0" }
                ]).map_err(io::Error::from)?;
            }
            writer.flush()?;
        }
        temp.as_file().sync_all()?;

        temp.persist(location).map_err(|e| BackupError::Io(e.error))?;
        debug!(path = %location.display(), count = records.len(), "snapshot.saved");
        Ok(())
    }
}
