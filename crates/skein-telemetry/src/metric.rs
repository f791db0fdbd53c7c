//! Pre-aggregation of metric values into metric envelopes.
//!
//! Recording is lock-cheap and thread-safe; a periodic drain turns each
//! (name, labels) series into one aggregated data point (sum, count, min,
//! max, stdDev) for [`crate::TelemetryClient::track_metric_batch`].

use ahash::AHashMap;
use std::sync::{Mutex, OnceLock, RwLock};

use skein_types::{DataPoint, MetricData, Properties, SCHEMA_VERSION};

use crate::validate::{require_finite, require_name, TelemetryError};

/// A label set is a sorted list of key=value pairs, used to distinguish
/// series within one metric name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Labels(Vec<(String, String)>);

impl Labels {
    pub fn new(pairs: &[(&str, &str)]) -> Self {
        let mut v: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        v.sort_by(|a, b| a.0.cmp(&b.0));
        Self(v)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Labels become custom properties on the emitted metric payload.
    fn to_properties(&self) -> Properties {
        self.0.iter().cloned().collect()
    }
}

#[derive(Debug, Clone, Copy)]
struct Aggregate {
    count: u64,
    sum: f64,
    sum_sq: f64,
    min: f64,
    max: f64,
}

impl Aggregate {
    fn seed(value: f64) -> Self {
        Self {
            count: 1,
            sum: value,
            sum_sq: value * value,
            min: value,
            max: value,
        }
    }

    fn record(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.sum_sq += value * value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    fn std_dev(&self) -> f64 {
        let n = self.count as f64;
        let mean = self.sum / n;
        (self.sum_sq / n - mean * mean).max(0.0).sqrt()
    }
}

/// Thread-safe metric pre-aggregator.
///
/// Interior mutability mirrors the usual collector shape: an `RwLock` map
/// for dynamic series registration with a read-lock fast path, per-series
/// `Mutex` for the running aggregate.
#[derive(Debug, Default)]
pub struct MetricAggregator {
    series: RwLock<AHashMap<(String, Labels), Mutex<Aggregate>>>,
}

impl MetricAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one observation into a series. Non-finite values and empty
    /// names are rejected.
    pub fn record(
        &self,
        name: &str,
        labels: &[(&str, &str)],
        value: f64,
    ) -> Result<(), TelemetryError> {
        require_name("metric name", name)?;
        require_finite(value)?;
        let key = (name.to_string(), Labels::new(labels));

        // Fast-path: read lock
        {
            let map = self.series.read().unwrap_or_else(|e| e.into_inner());
            if let Some(agg) = map.get(&key) {
                agg.lock().unwrap_or_else(|e| e.into_inner()).record(value);
                return Ok(());
            }
        }
        // Slow-path: write lock to insert
        let mut map = self.series.write().unwrap_or_else(|e| e.into_inner());
        match map.get(&key) {
            Some(agg) => agg.lock().unwrap_or_else(|e| e.into_inner()).record(value),
            None => {
                map.insert(key, Mutex::new(Aggregate::seed(value)));
            }
        }
        Ok(())
    }

    /// Current (count, sum) of a series; (0, 0.0) when unseen.
    pub fn get(&self, name: &str, labels: &[(&str, &str)]) -> (u64, f64) {
        let key = (name.to_string(), Labels::new(labels));
        let map = self.series.read().unwrap_or_else(|e| e.into_inner());
        map.get(&key)
            .map(|agg| {
                let agg = agg.lock().unwrap_or_else(|e| e.into_inner());
                (agg.count, agg.sum)
            })
            .unwrap_or((0, 0.0))
    }

    /// Drain every series into metric payloads and reset the aggregator.
    ///
    /// Each series becomes one payload whose data point carries the sum as
    /// `value` plus count/min/max/stdDev; labels become properties.
    pub fn drain(&self) -> Vec<MetricData> {
        let mut map = self.series.write().unwrap_or_else(|e| e.into_inner());
        let mut batch: Vec<MetricData> = map
            .drain()
            .map(|((name, labels), agg)| {
                let agg = agg.into_inner().unwrap_or_else(|e| e.into_inner());
                MetricData {
                    ver: SCHEMA_VERSION,
                    metrics: vec![DataPoint {
                        ns: None,
                        name,
                        value: agg.sum,
                        count: Some(agg.count),
                        min: Some(agg.min),
                        max: Some(agg.max),
                        std_dev: Some(agg.std_dev()),
                    }],
                    properties: labels.to_properties(),
                }
            })
            .collect();
        // AHashMap drain order is arbitrary; keep the batch stable.
        batch.sort_by(|a, b| a.metrics[0].name.cmp(&b.metrics[0].name));
        batch
    }
}

/// Returns a reference to the global `MetricAggregator` singleton, shared
/// across the entire process.
pub fn global_aggregator() -> &'static MetricAggregator {
    static INSTANCE: OnceLock<MetricAggregator> = OnceLock::new();
    INSTANCE.get_or_init(MetricAggregator::new)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
