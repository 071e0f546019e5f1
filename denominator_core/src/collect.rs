//! Persistence of per-actor artifacts at shutdown.
//!
//! An actor hands its histograms and key-usage guesses to a `Collector`
//! exactly once, when it receives Goodbye.

use crate::config::DenominatorConfig;
use crate::error::CoreError;
use crate::metrics::{HistogramSummary, LatencyHistogram, NET, RESP, RT, SERV};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// How often each synthetic key was requested by an actor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyGuesses {
    counts: BTreeMap<String, u64>,
}

impl KeyGuesses {
    pub fn record(&mut self, key: impl Into<String>) {
        *self.counts.entry(key.into()).or_insert(0) += 1;
    }

    pub fn count(&self, key: &str) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }
}

/// Destination for an actor's shutdown artifacts.
pub trait Collector: Send {
    /// Stores one histogram under `<node><suffix>`.
    fn save_histogram(
        &mut self,
        node: &str,
        suffix: &str,
        hist: &LatencyHistogram,
    ) -> Result<(), CoreError>;

    /// Stores the key-usage guesses of `node`.
    fn save_guesses(&mut self, node: &str, guesses: &KeyGuesses) -> Result<(), CoreError>;
}

/// Picks the collector a configuration asks for.
pub fn collector_for(config: &DenominatorConfig) -> Box<dyn Collector> {
    match &config.collect_dir {
        Some(dir) => Box::new(JsonCollector::new(dir.clone())),
        None => Box::new(MemoryCollector::new()),
    }
}

/// Histogram file contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistogramArtifact {
    pub node: String,
    pub summary: HistogramSummary,
    pub histogram: LatencyHistogram,
}

/// Writes pretty JSON files: `<dir>/<node><suffix>.json` and
/// `<dir>/<node>_guesses.json`.
#[derive(Debug, Clone)]
pub struct JsonCollector {
    dir: PathBuf,
}

impl JsonCollector {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn histogram_path(&self, node: &str, suffix: &str) -> PathBuf {
        self.dir.join(format!("{}{}.json", node, suffix))
    }

    pub fn guesses_path(&self, node: &str) -> PathBuf {
        self.dir.join(format!("{}_guesses.json", node))
    }

    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), CoreError> {
        std::fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(value)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

impl Collector for JsonCollector {
    fn save_histogram(
        &mut self,
        node: &str,
        suffix: &str,
        hist: &LatencyHistogram,
    ) -> Result<(), CoreError> {
        let artifact = HistogramArtifact {
            node: node.to_string(),
            summary: hist.summary(),
            histogram: hist.clone(),
        };
        self.write_json(&self.histogram_path(node, suffix), &artifact)
    }

    fn save_guesses(&mut self, node: &str, guesses: &KeyGuesses) -> Result<(), CoreError> {
        self.write_json(&self.guesses_path(node), guesses)
    }
}

#[derive(Debug, Default)]
struct MemoryStore {
    histograms: BTreeMap<String, LatencyHistogram>,
    guesses: BTreeMap<String, KeyGuesses>,
}

/// In-process collector; clones share the same store.
#[derive(Debug, Clone, Default)]
pub struct MemoryCollector {
    store: Arc<Mutex<MemoryStore>>,
}

impl MemoryCollector {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_store<T>(&self, f: impl FnOnce(&mut MemoryStore) -> T) -> T {
        let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut store)
    }

    /// Histogram saved under `<node><suffix>`.
    pub fn histogram(&self, node: &str, suffix: &str) -> Option<LatencyHistogram> {
        self.with_store(|s| s.histograms.get(&format!("{}{}", node, suffix)).cloned())
    }

    pub fn guesses(&self, node: &str) -> Option<KeyGuesses> {
        self.with_store(|s| s.guesses.get(node).cloned())
    }

    /// Copies everything saved for `node` into another collector.
    pub fn replay_into(&self, node: &str, target: &mut dyn Collector) -> Result<usize, CoreError> {
        let (histograms, guesses) = self.with_store(|s| {
            let histograms: Vec<(&'static str, LatencyHistogram)> = [NET, RESP, SERV, RT]
                .into_iter()
                .filter_map(|suffix| {
                    s.histograms
                        .get(&format!("{}{}", node, suffix))
                        .map(|hist| (suffix, hist.clone()))
                })
                .collect();
            (histograms, s.guesses.get(node).cloned())
        });

        for (suffix, hist) in &histograms {
            target.save_histogram(node, suffix, hist)?;
        }
        let mut replayed = histograms.len();
        if let Some(guesses) = guesses {
            target.save_guesses(node, &guesses)?;
            replayed += 1;
        }
        Ok(replayed)
    }

    /// Total number of stored artifacts (histograms + guess sets).
    pub fn artifact_count(&self) -> usize {
        self.with_store(|s| s.histograms.len() + s.guesses.len())
    }
}

impl Collector for MemoryCollector {
    fn save_histogram(
        &mut self,
        node: &str,
        suffix: &str,
        hist: &LatencyHistogram,
    ) -> Result<(), CoreError> {
        self.with_store(|s| {
            s.histograms
                .insert(format!("{}{}", node, suffix), hist.clone())
        });
        Ok(())
    }

    fn save_guesses(&mut self, node: &str, guesses: &KeyGuesses) -> Result<(), CoreError> {
        self.with_store(|s| s.guesses.insert(node.to_string(), guesses.clone()));
        Ok(())
    }
}
