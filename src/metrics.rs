//! Inference metrics and statistics tracking.

use crate::error::InferenceError;
use crate::models::ProbabilityAggregator;
use crate::types::prediction::{Prediction, ProbabilityVector};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector for prediction throughput, latency and outcomes
pub struct InferenceMetrics {
    /// Total rows predicted successfully
    pub predictions: AtomicU64,
    /// Total rows rejected
    pub errors: AtomicU64,
    /// Errors by kind
    errors_by_kind: RwLock<HashMap<&'static str, u64>>,
    /// Winning class counts
    winners: RwLock<HashMap<String, u64>>,
    /// Processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Ensemble agreement per prediction
    agreements: RwLock<Vec<f64>>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl InferenceMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            predictions: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            errors_by_kind: RwLock::new(HashMap::new()),
            winners: RwLock::new(HashMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            agreements: RwLock::new(Vec::with_capacity(1000)),
            start_time: Instant::now(),
        }
    }

    /// Record a successful prediction
    pub fn record_prediction(&self, prediction: &Prediction, processing_time: Duration) {
        self.predictions.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            // Keep only the most recent samples
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }

        if let Ok(mut winners) = self.winners.write() {
            *winners.entry(prediction.class_name.clone()).or_insert(0) += 1;
        }

        if prediction.model_probabilities.len() < 2 {
            return;
        }

        let members: Vec<ProbabilityVector> =
            prediction.model_probabilities.values().cloned().collect();
        if let Ok(agreement) = ProbabilityAggregator::agreement(&members) {
            if let Ok(mut agreements) = self.agreements.write() {
                agreements.push(agreement);
                if agreements.len() > 1000 {
                    agreements.drain(0..500);
                }
            }
        }
    }

    /// Record a row the engine rejected
    pub fn record_error(&self, error: &InferenceError) {
        self.record_rejected(error.kind());
    }

    /// Record a rejected row under an arbitrary kind, e.g. `parse`
    pub fn record_rejected(&self, kind: &'static str) {
        self.errors.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut by_kind) = self.errors_by_kind.write() {
            *by_kind.entry(kind).or_insert(0) += 1;
        }
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let times = match self.processing_times.read() {
            Ok(times) => times,
            Err(_) => return ProcessingStats::default(),
        };
        if times.is_empty() {
            return ProcessingStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[(count as f64 * 0.95) as usize],
            p99_us: sorted[(count as f64 * 0.99) as usize],
            max_us: *sorted.last().unwrap_or(&0),
        }
    }

    /// Average ensemble agreement (1.0 = every model picked the winner)
    pub fn get_avg_agreement(&self) -> Option<f64> {
        let agreements = self.agreements.read().ok()?;
        if agreements.is_empty() {
            return None;
        }
        Some(agreements.iter().sum::<f64>() / agreements.len() as f64)
    }

    /// Current throughput (predictions per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.predictions.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn get_winners(&self) -> HashMap<String, u64> {
        self.winners
            .read()
            .map(|w| w.clone())
            .unwrap_or_default()
    }

    pub fn get_errors_by_kind(&self) -> HashMap<&'static str, u64> {
        self.errors_by_kind
            .read()
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let predictions = self.predictions.load(Ordering::Relaxed);
        let errors = self.errors.load(Ordering::Relaxed);
        let processing = self.get_processing_stats();

        info!(
            predictions,
            errors,
            throughput = format!("{:.1} rows/s", self.get_throughput()),
            mean_us = processing.mean_us,
            p50_us = processing.p50_us,
            p95_us = processing.p95_us,
            p99_us = processing.p99_us,
            max_us = processing.max_us,
            "Inference summary"
        );

        if let Some(agreement) = self.get_avg_agreement() {
            info!("Ensemble agreement: {:.1}%", agreement * 100.0);
        }

        let mut winners: Vec<_> = self.get_winners().into_iter().collect();
        winners.sort();
        for (class_name, count) in winners {
            let pct = if predictions > 0 {
                count as f64 / predictions as f64 * 100.0
            } else {
                0.0
            };
            info!("  {:<16} {:>8} ({:>5.1}%)", class_name, count, pct);
        }

        for (kind, count) in self.get_errors_by_kind() {
            info!(kind, count, "Rejected rows");
        }
    }
}

impl Default for InferenceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}
