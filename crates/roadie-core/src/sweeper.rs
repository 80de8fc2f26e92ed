//! Snapshot staging and the background sweep that publishes it.
//!
//! Fort and gym details are staged as JSON files in two directories. A
//! background task sweeps them on a slow cadence: files old enough to be
//! complete are handed to a [`SnapshotSink`] and deleted on success. Failures
//! leave the file in place for the next pass.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::agent::game_api::{ApiFuture, FortDetails, GymDetails};

/// Files younger than this may still be mid-write and are skipped.
const DEFAULT_MIN_AGE: Duration = Duration::from_secs(60);

/// Pause between published files.
const INTER_FILE_PAUSE: Duration = Duration::from_millis(500);

/// Pause after a failed publish before moving on.
const FAILURE_PAUSE: Duration = Duration::from_millis(1_500);

/// Seconds between sweeps, checked against the running flag one second at a
/// time so shutdown stays prompt.
const SWEEP_IDLE_TICKS: u32 = 20;

/// Where the farmer stages fort/gym snapshots.
pub trait SnapshotStore: Send + Sync {
    fn prepare(&self) -> Result<()>;
    fn stage_fort(&self, details: &FortDetails) -> Result<()>;
    fn stage_gym(&self, gym: &GymDetails, details: &FortDetails) -> Result<()>;
}

/// Drops all snapshots; used when publication is disabled and in tests.
pub struct NullSnapshotStore;

impl SnapshotStore for NullSnapshotStore {
    fn prepare(&self) -> Result<()> {
        Ok(())
    }

    fn stage_fort(&self, _details: &FortDetails) -> Result<()> {
        Ok(())
    }

    fn stage_gym(&self, _gym: &GymDetails, _details: &FortDetails) -> Result<()> {
        Ok(())
    }
}

/// Staging on the local filesystem, one JSON file per fort keyed by id so a
/// re-visit overwrites rather than duplicates.
pub struct FsSnapshotStore {
    stops_dir: PathBuf,
    gyms_dir: PathBuf,
}

impl FsSnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            stops_dir: root.join("pokestops"),
            gyms_dir: root.join("gyms"),
        }
    }

    pub fn directories(&self) -> [PathBuf; 2] {
        [self.stops_dir.clone(), self.gyms_dir.clone()]
    }

    fn write(&self, dir: &Path, id: &str, payload: &serde_json::Value) -> Result<()> {
        let path = dir.join(format!("{id}.json"));
        let body = serde_json::to_string_pretty(payload)?;
        std::fs::write(&path, body)
            .with_context(|| format!("writing snapshot {}", path.display()))?;
        Ok(())
    }
}

impl SnapshotStore for FsSnapshotStore {
    /// Creates the staging directories and clears leftovers from a previous
    /// run.
    fn prepare(&self) -> Result<()> {
        for dir in [&self.stops_dir, &self.gyms_dir] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating {}", dir.display()))?;
            for entry in std::fs::read_dir(dir)
                .with_context(|| format!("listing {}", dir.display()))?
            {
                let path = entry?.path();
                if path.extension().is_some_and(|e| e == "json") {
                    if let Err(err) = std::fs::remove_file(&path) {
                        warn!(path = %path.display(), error = %err, "failed to clear stale snapshot");
                    }
                }
            }
        }
        Ok(())
    }

    fn stage_fort(&self, details: &FortDetails) -> Result<()> {
        self.write(&self.stops_dir, &details.fort_id, &serde_json::json!(details))
    }

    fn stage_gym(&self, gym: &GymDetails, details: &FortDetails) -> Result<()> {
        self.write(
            &self.gyms_dir,
            &details.fort_id,
            &serde_json::json!({ "details": details, "gym": gym }),
        )
    }
}

/// Downstream consumer of staged snapshot files.
pub trait SnapshotSink: Send + Sync {
    fn publish<'a>(&'a self, path: &'a Path) -> ApiFuture<'a, ()>;
}

/// Background task draining the staging directories.
pub struct Sweeper {
    dirs: Vec<PathBuf>,
    sink: Arc<dyn SnapshotSink>,
    running: Arc<AtomicBool>,
    min_age: Duration,
}

impl Sweeper {
    pub fn new(
        dirs: Vec<PathBuf>,
        sink: Arc<dyn SnapshotSink>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self { dirs, sink, running, min_age: DEFAULT_MIN_AGE }
    }

    pub fn with_min_age(mut self, min_age: Duration) -> Self {
        self.min_age = min_age;
        self
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Sweeps until the running flag drops.
    pub async fn run(self) {
        while self.is_running() {
            for dir in &self.dirs {
                if !self.is_running() {
                    return;
                }
                if let Err(err) = self.sweep_dir(dir).await {
                    warn!(dir = %dir.display(), error = %err, "snapshot sweep failed");
                }
            }
            for _ in 0..SWEEP_IDLE_TICKS {
                if !self.is_running() {
                    return;
                }
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }

    /// One pass over one directory.
    pub async fn sweep_dir(&self, dir: &Path) -> Result<()> {
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("listing {}", dir.display()))?;
        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|e| e == "json"))
            .collect();
        files.sort();
        for path in files {
            if !self.is_running() {
                break;
            }
            let Ok(metadata) = std::fs::metadata(&path) else {
                continue;
            };
            let age = metadata
                .modified()
                .ok()
                .and_then(|m| SystemTime::now().duration_since(m).ok())
                .unwrap_or_default();
            if age < self.min_age {
                continue;
            }
            match self.sink.publish(&path).await {
                Ok(()) => {
                    debug!(path = %path.display(), "snapshot published");
                    if let Err(err) = std::fs::remove_file(&path) {
                        warn!(path = %path.display(), error = %err, "failed to remove published snapshot");
                    }
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "snapshot publish failed");
                    tokio::time::sleep(FAILURE_PAUSE).await;
                }
            }
            tokio::time::sleep(INTER_FILE_PAUSE).await;
        }
        Ok(())
    }
}
