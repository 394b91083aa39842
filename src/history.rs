// ABOUTME: Per-workload rollout history: current and previous successful specs.
// ABOUTME: Persisted as JSON under ~/.local/state/rollwright/ between CLI runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::manifest::DeploymentSpec;
use crate::rollout::{RolloutPhase, RolloutRecord};
use crate::types::WorkloadName;

/// State directory relative to $HOME (XDG Base Directory compliant).
const STATE_DIR: &str = ".local/state/rollwright";

/// Overrides the state directory.
pub const STATE_DIR_ENV: &str = "ROLLWRIGHT_STATE_DIR";

const DEFAULT_SCOPE: &str = "default";

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("cannot locate state directory: set HOME or ROLLWRIGHT_STATE_DIR")]
    NoStateDir,

    #[error("failed to access rollout history at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid rollout history JSON at {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// What is known about one workload's rollouts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadHistory {
    pub workload: WorkloadName,
    /// The spec the workload last converged to.
    pub current: Option<DeploymentSpec>,
    /// The successful spec before `current`; the rollback target.
    pub previous: Option<DeploymentSpec>,
    /// Retained until the next rollout of the same workload.
    pub last_record: Option<RolloutRecord>,
    pub updated_at: DateTime<Utc>,
    /// Hostname of the machine that made the last change.
    pub updated_by: String,
}

impl WorkloadHistory {
    pub fn new(workload: WorkloadName) -> Self {
        Self {
            workload,
            current: None,
            previous: None,
            last_record: None,
            updated_at: Utc::now(),
            updated_by: hostname(),
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
        self.updated_by = hostname();
    }
}

fn hostname() -> String {
    gethostname::gethostname().to_string_lossy().into_owned()
}

/// History for every workload an engine has touched.
#[derive(Debug, Clone, Default)]
pub struct RolloutHistory {
    workloads: HashMap<WorkloadName, WorkloadHistory>,
}

impl RolloutHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: WorkloadHistory) {
        self.workloads.insert(entry.workload.clone(), entry);
    }

    pub fn get(&self, workload: &WorkloadName) -> Option<&WorkloadHistory> {
        self.workloads.get(workload)
    }

    pub fn current(&self, workload: &WorkloadName) -> Option<&DeploymentSpec> {
        self.get(workload).and_then(|h| h.current.as_ref())
    }

    pub fn previous(&self, workload: &WorkloadName) -> Option<&DeploymentSpec> {
        self.get(workload).and_then(|h| h.previous.as_ref())
    }

    pub fn last_record(&self, workload: &WorkloadName) -> Option<&RolloutRecord> {
        self.get(workload).and_then(|h| h.last_record.as_ref())
    }

    pub fn entries(&self) -> impl Iterator<Item = &WorkloadHistory> {
        self.workloads.values()
    }

    /// Keep `record` as the workload's latest rollout. A successful rollout
    /// of a new spec makes it current and demotes the old current spec.
    pub fn record(&mut self, record: &RolloutRecord) {
        let entry = self.entry(record.workload());
        if record.phase() == RolloutPhase::Succeeded
            && entry.current.as_ref() != Some(&record.target)
        {
            entry.previous = entry.current.take();
            entry.current = Some(record.target.clone());
        }
        entry.last_record = Some(record.clone());
        entry.touch();
    }

    /// After an operator rollback, the previous spec is current again and the
    /// spec rolled away from becomes the rollback target.
    pub fn swap(&mut self, workload: &WorkloadName) {
        let entry = self.entry(workload);
        std::mem::swap(&mut entry.current, &mut entry.previous);
        entry.touch();
    }

    fn entry(&mut self, workload: &WorkloadName) -> &mut WorkloadHistory {
        self.workloads
            .entry(workload.clone())
            .or_insert_with(|| WorkloadHistory::new(workload.clone()))
    }
}

/// Reads and writes one JSON file per workload.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    dir: PathBuf,
}

impl HistoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store under `$ROLLWRIGHT_STATE_DIR` or `~/.local/state/rollwright`,
    /// scoped by destination so staging history never feeds a production rollback.
    pub fn from_env(destination: Option<&str>) -> Result<Self, HistoryError> {
        let base = match std::env::var_os(STATE_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => {
                let home = std::env::var_os("HOME").ok_or(HistoryError::NoStateDir)?;
                PathBuf::from(home).join(STATE_DIR)
            }
        };
        Ok(Self::new(base.join(destination.unwrap_or(DEFAULT_SCOPE))))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, workload: &WorkloadName) -> PathBuf {
        self.dir.join(format!("{}.json", workload))
    }

    pub fn load(&self, workload: &WorkloadName) -> Result<Option<WorkloadHistory>, HistoryError> {
        let path = self.path_for(workload);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(HistoryError::Io { path, source }),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| HistoryError::Json { path, source })
    }

    /// Load every listed workload that has history.
    pub fn load_all<'a>(
        &self,
        workloads: impl IntoIterator<Item = &'a WorkloadName>,
    ) -> Result<RolloutHistory, HistoryError> {
        let mut history = RolloutHistory::new();
        for workload in workloads {
            if let Some(entry) = self.load(workload)? {
                history.insert(entry);
            }
        }
        Ok(history)
    }

    /// Write an entry, replacing the file atomically.
    pub fn save(&self, entry: &WorkloadHistory) -> Result<(), HistoryError> {
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| HistoryError::Io { path, source }
        };

        std::fs::create_dir_all(&self.dir).map_err(io_err(&self.dir))?;

        let path = self.path_for(&entry.workload);
        let json = serde_json::to_string_pretty(entry).map_err(|source| HistoryError::Json {
            path: path.clone(),
            source,
        })?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(io_err(&tmp))?;
        std::fs::rename(&tmp, &path).map_err(io_err(&path))?;
        Ok(())
    }

    pub fn save_all(&self, history: &RolloutHistory) -> Result<(), HistoryError> {
        history.entries().try_for_each(|entry| self.save(entry))
    }
}
