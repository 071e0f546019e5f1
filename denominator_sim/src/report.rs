//! JSON run report.
//!
//! Summarises a finished simulation: what the denominator sent, what its
//! peers saw, and the latency histograms it persisted on shutdown.

use crate::error::SimError;
use denominator_core::HistogramSummary;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Requests one stub service answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceReport {
    pub name: String,
    pub zone: String,
    pub requests: u64,
}

/// Lookups one stub registry received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryReport {
    pub zone: String,
    pub lookups: u64,
}

/// Complete simulation report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Seed used
    pub seed: u64,

    /// Name the denominator was given
    pub node: String,

    /// Virtual duration in seconds
    pub duration_sec: f64,

    /// Chat rate literal sent to the node
    pub chat_rate: String,

    pub services: Vec<ServiceReport>,
    pub registries: Vec<RegistryReport>,

    /// `_net`, `_resp`, `_serv`, `_rt` in that order
    pub histograms: Vec<HistogramSummary>,

    /// Synthetic requests the node generated
    pub keys_requested: u64,

    /// Distinct synthetic keys among them
    pub distinct_keys: usize,

    /// Whether the completion notice named the node
    pub clean_shutdown: bool,
}

impl RunReport {
    /// Requests answered across all services.
    pub fn requests_served(&self) -> u64 {
        self.services.iter().map(|s| s.requests).sum()
    }

    /// Lookups received across all registries.
    pub fn lookups_received(&self) -> u64 {
        self.registries.iter().map(|r| r.lookups).sum()
    }

    /// Summary of the histogram with the given suffix.
    pub fn histogram(&self, suffix: &str) -> Option<&HistogramSummary> {
        self.histograms.iter().find(|h| h.label.ends_with(suffix))
    }

    pub fn to_json(&self) -> Result<String, SimError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), SimError> {
        let json = self.to_json()?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
