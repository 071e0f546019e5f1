//! Latency histograms recorded by every actor.
//! ===========================================
//!
//! Four histograms per actor, each persisted under `<name><suffix>`:
//! - **`_net`**: transit time of every inbound message
//! - **`_resp`**: transit time of responses that close a flow
//! - **`_serv`**: time from flow start until the responder replied
//! - **`_rt`**: full round trip of a flow started by this actor

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Suffix of the network latency histogram.
pub const NET: &str = "_net";
/// Suffix of the response time histogram.
pub const RESP: &str = "_resp";
/// Suffix of the service time histogram.
pub const SERV: &str = "_serv";
/// Suffix of the round trip histogram.
pub const RT: &str = "_rt";

/// Raw latency samples under a label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyHistogram {
    label: String,
    samples_ns: Vec<u64>,
}

impl LatencyHistogram {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            samples_ns: Vec::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn record(&mut self, sample: Duration) {
        self.samples_ns
            .push(u64::try_from(sample.as_nanos()).unwrap_or(u64::MAX));
    }

    pub fn count(&self) -> usize {
        self.samples_ns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples_ns.is_empty()
    }

    /// Summary statistics in microseconds.
    pub fn summary(&self) -> HistogramSummary {
        if self.samples_ns.is_empty() {
            return HistogramSummary {
                label: self.label.clone(),
                ..Default::default()
            };
        }

        let mut sorted = self.samples_ns.clone();
        sorted.sort_unstable();
        let to_us = |ns: u64| ns as f64 / 1_000.0;
        let percentile = |p: f64| {
            let idx = (p * sorted.len() as f64) as usize;
            to_us(sorted[idx.min(sorted.len() - 1)])
        };
        let sum: u128 = sorted.iter().map(|&ns| ns as u128).sum();

        HistogramSummary {
            label: self.label.clone(),
            count: sorted.len(),
            min_us: to_us(sorted[0]),
            max_us: to_us(sorted[sorted.len() - 1]),
            mean_us: sum as f64 / sorted.len() as f64 / 1_000.0,
            p50_us: percentile(0.50),
            p99_us: percentile(0.99),
        }
    }
}

/// Summary statistics of a histogram (microseconds).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistogramSummary {
    pub label: String,
    pub count: usize,
    pub min_us: f64,
    pub max_us: f64,
    pub mean_us: f64,
    pub p50_us: f64,
    pub p99_us: f64,
}

/// The four histograms owned by one actor.
#[derive(Debug, Clone, Default)]
pub struct LatencyHistograms {
    pub net: LatencyHistogram,
    pub resp: LatencyHistogram,
    pub serv: LatencyHistogram,
    pub rt: LatencyHistogram,
}

impl LatencyHistograms {
    /// Histograms labelled for `name` (empty name = not yet known).
    pub fn for_node(name: &str) -> Self {
        Self {
            net: LatencyHistogram::new(format!("{}{}", name, NET)),
            resp: LatencyHistogram::new(format!("{}{}", name, RESP)),
            serv: LatencyHistogram::new(format!("{}{}", name, SERV)),
            rt: LatencyHistogram::new(format!("{}{}", name, RT)),
        }
    }

    /// `(suffix, histogram)` pairs in persistence order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &LatencyHistogram)> {
        [
            (NET, &self.net),
            (RESP, &self.resp),
            (SERV, &self.serv),
            (RT, &self.rt),
        ]
        .into_iter()
    }
}
