//! Sample collection and report aggregation.
//!
//! Each stage of a benchmark owns one [`Collector`]; workers append a
//! [`Sample`] per completed call and the driver materializes a
//! [`StageReport`] once all workers have finished. After the last stage the
//! stepper merges the stage reports into one [`CombinedReport`].

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Latency percentiles printed and persisted with a combined report.
pub const PERCENTILES: [f64; 9] = [10.0, 25.0, 50.0, 75.0, 90.0, 95.0, 99.0, 99.9, 99.99];

/// Returns the current wall clock as whole unix seconds.
#[must_use]
#[allow(clippy::cast_possible_wrap)] // unix seconds fit i64 far past this code's lifetime
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs() as i64)
}

/// One completed operation, as observed by a worker.
#[derive(Debug, Clone)]
pub struct Sample {
    /// Wall-clock latency of the call in seconds.
    pub latency_secs: f64,
    /// Unix second at which the call completed.
    pub unix_second: i64,
    /// Classified error text, or `None` on success.
    pub error: Option<String>,
}

/// One entry of a per-second throughput series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPoint {
    /// The unix second this bucket covers.
    pub unix_second: i64,
    /// Requests completed successfully within that second.
    pub throughput: i64,
}

/// Accumulates samples for one stage.
///
/// All mutation happens under the driver's exclusive lock; the collector
/// itself is plain data. Failed calls contribute to the error histogram
/// only, matching the convention that `lats` holds successful requests.
#[derive(Debug, Default)]
pub struct Collector {
    lats: Vec<f64>,
    lat_total: f64,
    buckets: BTreeMap<i64, i64>,
    error_dist: HashMap<String, i64>,
}

impl Collector {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one completed operation.
    pub fn record(&mut self, sample: Sample) {
        match sample.error {
            Some(err) => *self.error_dist.entry(err).or_insert(0) += 1,
            None => {
                self.lats.push(sample.latency_secs);
                self.lat_total += sample.latency_secs;
                *self.buckets.entry(sample.unix_second).or_insert(0) += 1;
            }
        }
    }

    /// Number of samples recorded so far, successes and failures combined.
    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.lats.len() + self.error_dist.values().map(|v| *v as usize).sum::<usize>()
    }

    /// Materializes the stage report.
    ///
    /// `total` is the wall-clock duration of the stage as measured by the
    /// driver. Latencies stay in completion order; sorting is deferred to
    /// the combined report.
    #[must_use]
    pub fn finish(self, total: Duration) -> StageReport {
        let time_series = self
            .buckets
            .into_iter()
            .map(|(unix_second, throughput)| DataPoint {
                unix_second,
                throughput,
            })
            .collect();
        StageReport {
            total,
            avg_total: self.lat_total,
            lats: self.lats,
            time_series,
            error_dist: self.error_dist,
        }
    }
}

/// Statistics of one completed stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReport {
    /// Wall-clock duration of the stage.
    pub total: Duration,
    /// Sum of all successful latencies, in seconds.
    pub avg_total: f64,
    /// Per-request latencies in completion order (not sorted).
    pub lats: Vec<f64>,
    /// Per-second throughput buckets, ascending by unix second.
    pub time_series: Vec<DataPoint>,
    /// Error text to occurrence count.
    pub error_dist: HashMap<String, i64>,
}

/// Fatal errors raised while merging stage reports.
#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    /// `time_series` and `client_number_at_sample` diverged in length.
    #[error(
        "time series has {time_series} buckets but {client_numbers} client-number entries"
    )]
    SeriesLengthMismatch {
        /// Length of the merged throughput series.
        time_series: usize,
        /// Length of the parallel client-number series.
        client_numbers: usize,
    },

    /// The stepper produced a different number of reports than client counts.
    #[error("{reports} stage reports but {client_numbers} stage client numbers")]
    StageCountMismatch {
        /// Number of stage reports handed to the merge.
        reports: usize,
        /// Number of per-stage client counts handed to the merge.
        client_numbers: usize,
    },
}

/// The merged statistics of a whole benchmark run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinedReport {
    /// Sum of per-stage wall-clock durations.
    pub total: Duration,
    /// Arithmetic mean of `lats`, in seconds.
    pub average: f64,
    /// Population standard deviation of `lats`.
    pub stddev: f64,
    /// Minimum latency observed.
    pub fastest: f64,
    /// Maximum latency observed.
    pub slowest: f64,
    /// Successful requests per second over the whole run.
    pub rps: f64,
    /// All latencies, stage order then completion order within a stage.
    pub lats: Vec<f64>,
    /// Per-second throughput series, concatenated in stage order.
    ///
    /// Buckets at a stage boundary may repeat a unix second; they are kept
    /// distinct because each represents a different concurrency level.
    pub time_series: Vec<DataPoint>,
    /// Error text to occurrence count, summed across stages.
    pub error_dist: HashMap<String, i64>,
    /// For every `time_series` entry, the client count of the stage that
    /// produced it. Always the same length as `time_series`.
    pub client_number_at_sample: Vec<i64>,
}

impl CombinedReport {
    /// Merges the ordered stage reports of one run.
    ///
    /// `client_numbers[i]` is the client count that produced `stages[i]`.
    ///
    /// # Errors
    ///
    /// Returns [`AggregateError`] if the inputs or the merged series violate
    /// the parallel-length invariant; a mismatch is never silently corrected.
    pub fn combine(
        stages: &[StageReport],
        client_numbers: &[i64],
    ) -> Result<Self, AggregateError> {
        if stages.len() != client_numbers.len() {
            return Err(AggregateError::StageCountMismatch {
                reports: stages.len(),
                client_numbers: client_numbers.len(),
            });
        }

        let mut combined = Self {
            total: Duration::ZERO,
            average: 0.0,
            stddev: 0.0,
            fastest: 0.0,
            slowest: 0.0,
            rps: 0.0,
            lats: Vec::new(),
            time_series: Vec::new(),
            error_dist: HashMap::new(),
            client_number_at_sample: Vec::new(),
        };

        let mut lat_total = 0.0;
        for (stage, &client_number) in stages.iter().zip(client_numbers) {
            combined.total += stage.total;
            lat_total += stage.avg_total;
            combined.lats.extend_from_slice(&stage.lats);
            combined.time_series.extend_from_slice(&stage.time_series);
            combined
                .client_number_at_sample
                .extend(std::iter::repeat(client_number).take(stage.time_series.len()));
            for (err, count) in &stage.error_dist {
                *combined.error_dist.entry(err.clone()).or_insert(0) += count;
            }
        }

        combined.validate()?;

        let n = combined.lats.len();
        if n > 0 {
            #[allow(clippy::cast_precision_loss)]
            let nf = n as f64;
            combined.average = lat_total / nf;
            combined.rps = nf / combined.total.as_secs_f64();

            let mut dev_total = 0.0;
            for lat in &combined.lats {
                let dev = lat - combined.average;
                dev_total += dev * dev;
            }
            combined.stddev = (dev_total / nf).sqrt();

            let mut sorted = combined.lats.clone();
            sorted.sort_by(f64::total_cmp);
            combined.fastest = sorted[0];
            combined.slowest = sorted[n - 1];
        }

        Ok(combined)
    }

    /// Checks the parallel-length invariant between the throughput series
    /// and the client-number series.
    ///
    /// # Errors
    ///
    /// Returns [`AggregateError::SeriesLengthMismatch`] on violation.
    pub fn validate(&self) -> Result<(), AggregateError> {
        if self.time_series.len() != self.client_number_at_sample.len() {
            return Err(AggregateError::SeriesLengthMismatch {
                time_series: self.time_series.len(),
                client_numbers: self.client_number_at_sample.len(),
            });
        }
        Ok(())
    }

    /// Latency percentiles from a sorted copy of `lats`.
    ///
    /// Returns `(percentile, latency_secs)` pairs for [`PERCENTILES`];
    /// empty when no request succeeded.
    #[must_use]
    pub fn percentiles(&self) -> Vec<(f64, f64)> {
        if self.lats.is_empty() {
            return Vec::new();
        }
        let mut sorted = self.lats.clone();
        sorted.sort_by(f64::total_cmp);

        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let points = PERCENTILES
            .iter()
            .map(|&p| {
                let rank = ((p / 100.0) * sorted.len() as f64) as usize;
                (p, sorted[rank.min(sorted.len() - 1)])
            })
            .collect();
        points
    }
}
