use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dataset::{self, Dataset};

const RUN_PREFIX: &str = "fine-tuned-";
const STAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

pub const STAGED_DATASET: &str = "training_pairs.json";
pub const MANIFEST: &str = "manifest.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub created_at: DateTime<Utc>,
    pub source: String,
    pub pairs: usize,
}

/// Versioned `fine-tuned-YYYYMMDD-HHMMSS` directories under one root.
/// The newest run is the greatest name.
pub struct RunRegistry {
    root: PathBuf,
}

impl RunRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        RunRegistry { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn create(&self) -> Result<PathBuf> {
        self.create_at(Utc::now())
    }

    /// Same-second collisions get a `-1`, `-2`, ... suffix.
    pub fn create_at(&self, at: DateTime<Utc>) -> Result<PathBuf> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("Failed to create runs directory {:?}", self.root))?;

        let base = format!("{}{}", RUN_PREFIX, at.format(STAMP_FORMAT));
        let mut candidate = self.root.join(&base);
        let mut n = 0u32;
        loop {
            match fs::create_dir(&candidate) {
                Ok(()) => return Ok(candidate),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    n += 1;
                    candidate = self.root.join(format!("{}-{}", base, n));
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to create {:?}", candidate))
                }
            }
        }
    }

    /// Run directories, newest first. A missing root means no runs.
    pub fn list(&self) -> Result<Vec<PathBuf>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {:?}", self.root))
            }
        };

        let mut runs: Vec<(RunKey, PathBuf)> = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            if let Some(key) = name.to_str().and_then(run_key) {
                runs.push((key, entry.path()));
            }
        }
        runs.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(runs.into_iter().map(|(_, p)| p).collect())
    }

    pub fn latest(&self) -> Result<Option<PathBuf>> {
        Ok(self.list()?.into_iter().next())
    }

    /// Remove all but the newest `keep` runs. Returns the removed paths.
    pub fn prune(&self, keep: usize) -> Result<Vec<PathBuf>> {
        let stale: Vec<PathBuf> = self.list()?.into_iter().skip(keep).collect();
        for dir in &stale {
            fs::remove_dir_all(dir).with_context(|| format!("Failed to remove {:?}", dir))?;
            info!(run = ?dir, "pruned");
        }
        Ok(stale)
    }

    /// Snapshot a validated dataset into a fresh run directory.
    pub fn stage(&self, source: &Path, dataset: &Dataset) -> Result<PathBuf> {
        let run = self.create()?;
        dataset::write_json(&run.join(STAGED_DATASET), dataset)?;
        let manifest = Manifest {
            created_at: Utc::now(),
            source: source.display().to_string(),
            pairs: dataset.data.len(),
        };
        dataset::write_json(&run.join(MANIFEST), &manifest)?;
        info!(run = ?run, pairs = manifest.pairs, "staged dataset");
        Ok(run)
    }
}

/// Sort key: (timestamp, collision suffix). `None` for foreign names.
type RunKey = (String, u32);

fn run_key(name: &str) -> Option<RunKey> {
    let rest = name.strip_prefix(RUN_PREFIX)?;
    let (stamp, suffix) = match rest.get(15..) {
        Some("") => (rest, 0),
        Some(tail) => (&rest[..15], tail.strip_prefix('-')?.parse().ok()?),
        None => return None,
    };
    let valid = stamp.len() == 15
        && stamp.char_indices().all(|(i, c)| if i == 8 { c == '-' } else { c.is_ascii_digit() });
    valid.then(|| (stamp.to_string(), suffix))
}

// ── Tests ──
