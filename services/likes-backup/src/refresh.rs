//!
//! src/refresh.rs  Andrew Belles  Oct 17th, 2026
//!
//! One backup run: load the last snapshot, fetch the current likes,
//! reconcile the two and write the result back
//!

use std::path::Path;

use chrono::NaiveDateTime;
use tracing::{debug, info};

use crate::errors::BackupError;
use crate::fetch::TrackSource;
use crate::reconcile::{Reconciliation, reconcile};
use crate::snapshot::SnapshotStore;

/// Runs a single refresh of the snapshot at `location`.
///
/// A missing snapshot is an empty baseline. A malformed snapshot or a failed
/// fetch aborts the run before anything is written. `clock` is read once,
/// after the fetch, and stamps every first-seen track.
pub async fn refresh<T, S, C>(
    source: &T,
    store: &S,
    owner: &str,
    location: &Path,
    clock: C
) -> Result<Reconciliation, BackupError>
where
    T: TrackSource + ?Sized,
    S: SnapshotStore + ?Sized,
    C: FnOnce() -> NaiveDateTime
{
    let previous = match store.load(location) {
        Ok(tracks) => tracks,
        Err(BackupError::SnapshotNotFound(path)) => {
            info!(path = %path.display(), "snapshot.missing");
            Vec::new()
        },
        Err(e) => return Err(e)
    };
    debug!(count = previous.len(), "refresh.existing");

    let remote = source.fetch_tracks(owner).await?;
    let now = clock();
    debug!(count = remote.len(), fetched_at = %now, "refresh.actual");

    let outcome = reconcile(&previous, &remote, now);
    if outcome.initial_run {
        debug!("refresh.initial_run");
    }
    for track in &outcome.added {
        debug!(track = %track.track_id, name = %track.label(), "track.added");
    }
    for track in &outcome.deleted {
        debug!(track = %track.track_id, name = %track.label(), "track.deleted");
    }
    for track in &outcome.restored {
        debug!(track = %track.track_id, name = %track.label(), "track.restored");
    }

    store.save(&outcome.snapshot, location)?;
    info!(
        total = outcome.snapshot.len(),
        added = outcome.added.len(),
        deleted = outcome.deleted.len(),
        restored = outcome.restored.len(),
        "refresh.done"
    );

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use std::{fs, sync::atomic::{AtomicUsize, Ordering}};

    use async_trait::async_trait;

    use super::*;
    use crate::snapshot::CsvSnapshot;
    use crate::types::Track;

    struct FakeSource {
        tracks: Option<Vec<Track>>,
        calls: AtomicUsize
    }

    impl FakeSource {
        fn serving(tracks: Vec<Track>) -> Self {
            Self { tracks: Some(tracks), calls: AtomicUsize::new(0) }
        }

        fn down() -> Self {
            Self { tracks: None, calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl TrackSource for FakeSource {
        async fn fetch_tracks(&self, _owner: &str) -> Result<Vec<Track>, BackupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.tracks.clone()
                .ok_or_else(|| BackupError::RemoteFetchFailed("Failed to get likes".to_string()))
        }
    }

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").unwrap()
    }

    fn remote(id: &str, available: bool) -> Track {
        Track::new(id, format!("Artist {id}"), format!("Song {id}"), ts("2025-05-05T05:05:05"), !available)
    }

    #[tokio::test]
    async fn first_run_seeds_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracks.csv");
        let source = FakeSource::serving(vec![remote("2", true), remote("1", false)]);
        let store = CsvSnapshot::new();
        let now = ts("2025-06-01T10:00:00");

        let outcome = refresh(&source, &store, "owner", &path, || now).await.unwrap();

        assert!(outcome.initial_run);
        assert_eq!(outcome.added.len(), 2);
        assert!(outcome.deleted.is_empty());
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "track_id,artist,title,added_at,is_deleted\r\n\
             1,Artist 1,Song 1,2025-06-01T10:00:00,1\r\n\
             2,Artist 2,Song 2,2025-06-01T10:00:00,0\r\n"
        );
    }

    #[tokio::test]
    async fn later_run_reports_changes_and_keeps_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracks.csv");
        let store = CsvSnapshot::new();

        let first = FakeSource::serving(vec![remote("1", true), remote("2", true)]);
        refresh(&first, &store, "owner", &path, || ts("2025-06-01T10:00:00")).await.unwrap();

        let second = FakeSource::serving(vec![remote("2", true), remote("3", true)]);
        let outcome = refresh(&second, &store, "owner", &path, || ts("2025-06-02T10:00:00"))
            .await
            .unwrap();

        assert_eq!(outcome.added.len(), 1);
        assert_eq!(outcome.added[0].track_id.as_str(), "3");
        assert_eq!(outcome.deleted.len(), 1);
        assert_eq!(outcome.deleted[0].track_id.as_str(), "1");

        let saved = store.load(&path).unwrap();
        let flags: Vec<(&str, bool, NaiveDateTime)> = saved.iter()
            .map(|t| (t.track_id.as_str(), t.is_deleted, t.added_at))
            .collect();
        assert_eq!(flags, vec![
            ("1", true, ts("2025-06-01T10:00:00")),
            ("2", false, ts("2025-06-01T10:00:00")),
            ("3", false, ts("2025-06-02T10:00:00")),
        ]);
    }

    #[tokio::test]
    async fn rerun_without_remote_changes_is_quiet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracks.csv");
        let store = CsvSnapshot::new();
        let source = FakeSource::serving(vec![remote("1", true), remote("2", false)]);

        refresh(&source, &store, "owner", &path, || ts("2025-06-01T10:00:00")).await.unwrap();
        let before = fs::read_to_string(&path).unwrap();

        let outcome = refresh(&source, &store, "owner", &path, || ts("2025-06-09T10:00:00"))
            .await
            .unwrap();

        assert!(!outcome.has_changes());
        assert_eq!(fs::read_to_string(&path).unwrap(), before);
    }

    #[tokio::test]
    async fn failed_fetch_leaves_snapshot_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracks.csv");
        let store = CsvSnapshot::new();
        store.save(&[remote("1", true)], &path).unwrap();
        let before = fs::read_to_string(&path).unwrap();

        let err = refresh(&FakeSource::down(), &store, "owner", &path, || ts("2025-06-01T10:00:00"))
            .await
            .unwrap_err();

        assert!(matches!(err, BackupError::RemoteFetchFailed(_)));
        assert_eq!(fs::read_to_string(&path).unwrap(), before);
    }

    #[tokio::test]
    async fn failed_first_fetch_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracks.csv");

        let result = refresh(
            &FakeSource::down(), &CsvSnapshot::new(), "owner", &path, || ts("2025-06-01T10:00:00")
        ).await;

        assert!(matches!(result, Err(BackupError::RemoteFetchFailed(_))));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn malformed_snapshot_aborts_before_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracks.csv");
        let garbage = "track_id,artist,title,added_at,is_deleted\n1,A,T,whenever,0\n";
        fs::write(&path, garbage).unwrap();
        let source = FakeSource::serving(vec![remote("1", true)]);

        let err = refresh(&source, &CsvSnapshot::new(), "owner", &path, || ts("2025-06-01T10:00:00"))
            .await
            .unwrap_err();

        assert!(matches!(err, BackupError::SnapshotMalformed(_)));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        assert_eq!(fs::read_to_string(&path).unwrap(), garbage);
    }

    #[tokio::test]
    async fn first_seen_tracks_are_stamped_after_the_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracks.csv");
        let source = FakeSource::serving(vec![remote("1", true)]);

        let outcome = refresh(&source, &CsvSnapshot::new(), "owner", &path, || {
            assert_eq!(source.calls.load(Ordering::SeqCst), 1, "clock read before fetch");
            ts("2025-06-01T10:00:00")
        }).await.unwrap();

        assert_eq!(outcome.added[0].added_at, ts("2025-06-01T10:00:00"));
    }

    #[tokio::test]
    async fn clock_is_not_read_when_the_fetch_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracks.csv");

        let result = refresh(&FakeSource::down(), &CsvSnapshot::new(), "owner", &path, || {
            panic!("clock read for a failed run")
        }).await;

        assert!(matches!(result, Err(BackupError::RemoteFetchFailed(_))));
    }
}
