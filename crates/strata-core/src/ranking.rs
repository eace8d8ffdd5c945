use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::scoring::ProjectScore;

/// Logical identity of a project across analyses.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProjectKey {
    pub name: String,
    pub path: String,
}

/// One stored analysis of a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub project_name: String,
    #[serde(default)]
    pub project_path: String,
    pub score: ProjectScore,
    pub analyzed_at: DateTime<Utc>,
}

impl RankedEntry {
    pub fn new(name: &str, path: &str, score: ProjectScore) -> Self {
        Self {
            project_name: name.to_string(),
            project_path: path.to_string(),
            score,
            analyzed_at: Utc::now(),
        }
    }

    pub fn key(&self) -> ProjectKey {
        ProjectKey {
            name: self.project_name.clone(),
            path: self.project_path.clone(),
        }
    }

    /// True when `self` should replace `current` as the survivor for a key.
    fn beats(&self, current: &RankedEntry) -> bool {
        match self
            .score
            .composite_score
            .total_cmp(&current.score.composite_score)
        {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => self.analyzed_at > current.analyzed_at,
        }
    }
}

/// Deduplicated, sorted view over stored analyses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ranking {
    pub total_distinct: usize,
    pub top: Vec<RankedEntry>,
}

/// Keep the best entry per project key and return the `limit` highest.
///
/// Per key the highest composite score survives; an exact tie keeps the most
/// recent analysis. Survivors are ordered by score, then recency, then key.
pub fn rank(entries: &[RankedEntry], limit: usize) -> Ranking {
    let mut best: BTreeMap<ProjectKey, &RankedEntry> = BTreeMap::new();
    for entry in entries {
        let key = entry.key();
        let replace = best.get(&key).is_none_or(|current| entry.beats(current));
        if replace {
            best.insert(key, entry);
        }
    }

    let total_distinct = best.len();
    let mut survivors: Vec<(ProjectKey, &RankedEntry)> = best.into_iter().collect();
    survivors.sort_by(|(ka, a), (kb, b)| {
        b.score
            .composite_score
            .total_cmp(&a.score.composite_score)
            .then(b.analyzed_at.cmp(&a.analyzed_at))
            .then(ka.cmp(kb))
    });

    debug!(entries = entries.len(), total_distinct, limit, "ranked analyses");

    Ranking {
        total_distinct,
        top: survivors
            .into_iter()
            .take(limit)
            .map(|(_, entry)| entry.clone())
            .collect(),
    }
}

/// Append an entry to an NDJSON history file, creating it if needed.
pub fn append_entry(path: &Path, entry: &RankedEntry) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    let line = serde_json::to_string(entry).context("failed to serialize ranked entry")?;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    writeln!(file, "{line}").context("failed to write ranked entry")?;
    Ok(())
}

/// Load entries from an NDJSON history file. Malformed lines are skipped.
pub fn load_entries(path: &Path) -> Result<Vec<RankedEntry>> {
    let file =
        std::fs::File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let reader = std::io::BufReader::new(file);

    let mut entries = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line.context("failed to read line from history")?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<RankedEntry>(trimmed) {
            Ok(entry) => entries.push(entry),
            Err(e) => warn!(line = number + 1, "skipping malformed history line: {e}"),
        }
    }
    Ok(entries)
}
