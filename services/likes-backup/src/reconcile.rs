//!
//! src/reconcile.rs  Andrew Belles  Oct 17th, 2026
//!
//! Merges the freshly fetched remote tracks into the previous snapshot.
//! Records are never dropped from the snapshot, a track that disappears
//! remotely is only flagged as deleted and can later be restored
//!

use std::collections::{HashMap, HashSet};

use chrono::NaiveDateTime;

use crate::types::{Track, TrackId};

/// Outcome of one reconciliation.
///
/// `added` and `deleted` are the reportable change sets. `restored` holds
/// tombstones that came back; they are not reported as additions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub snapshot: Vec<Track>,
    pub added: Vec<Track>,
    pub deleted: Vec<Track>,
    pub restored: Vec<Track>,
    pub initial_run: bool
}

impl Reconciliation {
    pub fn has_changes(&self) -> bool {
        !(self.added.is_empty() && self.deleted.is_empty())
    }
}

/// Remote tracks keyed by id. On a repeated id the last occurrence wins, the
/// first occurrence keeps its position in `order`.
struct RemoteIndex<'a> {
    by_id: HashMap<&'a TrackId, &'a Track>,
    order: Vec<&'a TrackId>
}

impl<'a> RemoteIndex<'a> {
    fn new(remote: &'a [Track]) -> Self {
        let mut by_id = HashMap::with_capacity(remote.len());
        let mut order = Vec::with_capacity(remote.len());
        for track in remote {
            if by_id.insert(&track.track_id, track).is_none() {
                order.push(&track.track_id);
            }
        }
        Self { by_id, order }
    }

    fn get(&self, id: &TrackId) -> Option<&'a Track> {
        self.by_id.get(id).copied()
    }

    fn iter(&self) -> impl Iterator<Item = &'a Track> + '_ {
        self.order.iter().map(|id| self.by_id[id])
    }
}

fn first_seen(remote: &Track, now: NaiveDateTime) -> Track {
    Track {
        added_at: now,
        ..remote.clone()
    }
}

/// Computes the next snapshot from `previous` and the `remote` collection.
///
/// Inputs are left untouched, every output record is a fresh copy. `now` is
/// stamped as `added_at` on tracks seen for the first time only.
pub fn reconcile(previous: &[Track], remote: &[Track], now: NaiveDateTime) -> Reconciliation {
    let remote = RemoteIndex::new(remote);

    if previous.is_empty() {
        let snapshot: Vec<Track> = remote.iter().map(|r| first_seen(r, now)).collect();
        return Reconciliation {
            added: snapshot.clone(),
            snapshot,
            initial_run: true,
            ..Reconciliation::default()
        };
    }

    let mut result = Reconciliation {
        snapshot: Vec::with_capacity(previous.len() + remote.order.len()),
        ..Reconciliation::default()
    };
    let mut known: HashSet<&TrackId> = HashSet::with_capacity(previous.len());

    for prev in previous {
        // duplicates in a previous snapshot collapse onto the first record
        if !known.insert(&prev.track_id) {
            continue;
        }

        let mut track = prev.clone();
        let current = remote.get(&prev.track_id);
        let available = current.is_some_and(|r| !r.is_deleted);

        if track.is_deleted && available {
            track.is_deleted = false;
            result.restored.push(track.clone());
        } else if !track.is_deleted && !available {
            track.is_deleted = true;
            result.deleted.push(track.clone());
        }

        result.snapshot.push(track);
    }

    for r in remote.iter() {
        if known.contains(&r.track_id) {
            continue;
        }
        let track = first_seen(r, now);
        result.added.push(track.clone());
        result.snapshot.push(track);
    }

    result
}
