//! Metrics for physical operator

use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering::Relaxed;
use std::time::Duration;

/// Count of something, for example the number of rows
#[derive(Debug, Default)]
pub struct Count(AtomicU64);

impl Count {
    /// Create a new [`Count`]
    #[inline]
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Add `n` to the count
    #[inline]
    pub fn add(&self, n: u64) {
        self.0.fetch_add(n, Relaxed);
    }

    /// Get the count
    #[inline]
    pub fn value(&self) -> u64 {
        self.0.load(Relaxed)
    }

    /// Reset the count to zero
    #[inline]
    pub fn reset(&self) {
        self.0.store(0, Relaxed);
    }
}

/// Measure a potentially non contiguous duration of time, in nanoseconds
#[derive(Debug, Default)]
pub struct Time(AtomicU64);

impl Time {
    /// Create a new [`Time`]
    #[inline]
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Add duration to the time metric
    #[inline]
    pub fn add_duration(&self, duration: Duration) {
        self.0.fetch_add(duration.as_nanos() as _, Relaxed);
    }

    /// Get the number of nanoseconds
    #[inline]
    pub fn nanoseconds(&self) -> u64 {
        self.0.load(Relaxed)
    }

    /// Get the duration
    #[inline]
    pub fn value(&self) -> Duration {
        Duration::from_nanos(self.nanoseconds())
    }
}

/// Snapshot of a metric
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricValue {
    Count(u64),
    Time(Duration),
}

impl Display for MetricValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Count(count) => write!(f, "{}", count),
            Self::Time(time) => write!(f, "{:?}", time),
        }
    }
}

/// Snapshot of the metrics of an operator, derive the `MetricsSetBuilder` to generate
/// it from the struct of metrics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSet {
    /// Name of the struct that contains the metrics
    pub name: &'static str,
    /// Metrics keyed by their names
    pub metrics: BTreeMap<&'static str, MetricValue>,
}

impl MetricsSet {
    /// Get the value of the metric with given name
    pub fn get(&self, name: &str) -> Option<MetricValue> {
        self.metrics.get(name).copied()
    }

    /// Get the count metric with given name, returns `None` if the metric does not
    /// exist or it is not a count
    pub fn count(&self, name: &str) -> Option<u64> {
        match self.get(name)? {
            MetricValue::Count(count) => Some(count),
            MetricValue::Time(_) => None,
        }
    }
}

impl Display for MetricsSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: [", self.name)?;
        let mut iter = self.metrics.iter();
        if let Some((name, value)) = iter.next() {
            write!(f, "{}: {}", name, value)?;
            iter.try_for_each(|(name, value)| write!(f, ", {}: {}", name, value))?;
        }
        write!(f, "]")
    }
}
