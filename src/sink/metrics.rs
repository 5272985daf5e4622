//! Recent metric samples, grouped by series

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use super::Sink;
use crate::metric::{MetricInfo, MetricSample, extract_metrics};
use crate::types::LogRecord;

/// Samples kept per series unless configured otherwise.
pub const DEFAULT_HISTORY: usize = 1024;

/// Keeps the most recent samples of every `@METRIC` series seen in delivered records.
#[derive(Debug)]
pub struct MetricRegistry {
    history: usize,
    series: Mutex<BTreeMap<MetricInfo, VecDeque<MetricSample>>>,
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY)
    }
}

impl MetricRegistry {
    /// Keep at most `history` samples per series.
    pub fn new(history: usize) -> Self {
        Self { history: history.max(1), series: Mutex::default() }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<MetricInfo, VecDeque<MetricSample>>> {
        self.series.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record(&self, sample: MetricSample) {
        let mut series = self.lock();
        let samples = series.entry(sample.info.clone()).or_default();
        if samples.len() == self.history {
            samples.pop_front();
        }
        samples.push_back(sample);
    }

    /// Known series, sorted by scope, name and unit.
    pub fn series(&self) -> Vec<MetricInfo> {
        self.lock().keys().cloned().collect()
    }

    /// Retained samples of one series, oldest first.
    pub fn samples(&self, info: &MetricInfo) -> Vec<MetricSample> {
        self.lock().get(info).map(|samples| samples.iter().cloned().collect()).unwrap_or_default()
    }

    pub fn latest(&self, info: &MetricInfo) -> Option<MetricSample> {
        self.lock().get(info).and_then(|samples| samples.back().cloned())
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl Sink for MetricRegistry {
    fn deliver(&self, received_at: DateTime<Utc>, record: &LogRecord) {
        for sample in extract_metrics(received_at, record) {
            self.record(sample);
        }
    }

    fn name(&self) -> &str {
        "metrics"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(name: &str) -> MetricInfo {
        MetricInfo { scope: "power".into(), name: name.into(), unit: "V".into() }
    }

    #[test]
    fn groups_samples_by_series() {
        let registry = MetricRegistry::default();
        registry.deliver(Utc::now(), &LogRecord::plain(0, "@METRIC(power::vin[V]=12) @METRIC(power::vout[V]=5)"));
        registry.deliver(Utc::now(), &LogRecord::plain(0, "@METRIC(power::vin[V]=11.5)"));
        registry.deliver(Utc::now(), &LogRecord::plain(0, "no metrics here"));

        assert_eq!(registry.series(), vec![info("vin"), info("vout")]);
        let values: Vec<_> = registry.samples(&info("vin")).iter().map(|s| s.value).collect();
        assert_eq!(values, vec![12.0, 11.5]);
        assert_eq!(registry.latest(&info("vout")).map(|s| s.value), Some(5.0));
    }

    #[test]
    fn history_is_bounded() {
        let registry = MetricRegistry::new(3);
        for value in 0..10 {
            registry.deliver(Utc::now(), &LogRecord::plain(0, format!("@METRIC(power::vin[V]={value})")));
        }
        let values: Vec<_> = registry.samples(&info("vin")).iter().map(|s| s.value).collect();
        assert_eq!(values, vec![7.0, 8.0, 9.0]);

        registry.clear();
        assert!(registry.series().is_empty());
        assert_eq!(registry.latest(&info("vin")), None);
    }
}
