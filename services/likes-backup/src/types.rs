//!
//! src/types.rs  Andrew Belles  Oct 17th, 2026
//!
//! Track record exchanged between fetcher, reconciler and snapshot store,
//! plus the timestamp format shared with existing snapshot files
//!

use std::fmt;

use chrono::{Local, NaiveDate, NaiveDateTime, SubsecRound, Timelike};

// Identifier assigned by the streaming service, primary key within a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(pub String);

impl TrackId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(s: &str) -> Self { TrackId(s.to_string()) }
}

impl From<String> for TrackId {
    fn from(s: String) -> Self { TrackId(s) }
}

/// A single liked track as observed locally.
///
/// `added_at` is the time the track was first seen by this service, not the
/// time the owner liked it remotely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub track_id: TrackId,
    pub artist: String,
    pub title: String,
    pub added_at: NaiveDateTime,
    pub is_deleted: bool
}

impl Track {
    pub fn new(
        track_id: impl Into<TrackId>,
        artist: impl Into<String>,
        title: impl Into<String>,
        added_at: NaiveDateTime,
        is_deleted: bool
    ) -> Self {
        Self {
            track_id: track_id.into(),
            artist: artist.into(),
            title: title.into(),
            added_at,
            is_deleted
        }
    }

    /// "artist: title", for log lines
    pub fn label(&self) -> String {
        format!("{}: {}", self.artist, self.title)
    }
}

/// Current local wall-clock time at the precision snapshots can store.
pub fn observed_now() -> NaiveDateTime {
    Local::now().naive_local().trunc_subsecs(6)
}

/// Writes `YYYY-MM-DDTHH:MM:SS[.ffffff]`, dropping the fraction when it is zero.
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    if ts.nanosecond() / 1_000 == 0 {
        ts.format("%Y-%m-%dT%H:%M:%S").to_string()
    } else {
        ts.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
    }
}

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

/// Accepts the naive ISO-8601 forms above or a bare date. Values carrying a
/// UTC offset are refused, they could not be written back unchanged.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    for format in NAIVE_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, format) {
            return Some(ts);
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
