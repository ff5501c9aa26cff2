//! Classifier Engine - Main Entry Point
//!
//! Reads feature rows (one JSON array per line) from stdin, scores them with
//! the configured model or ensemble, and writes one JSON report per row.

use anyhow::{Context, Result};
use classifier_engine::{
    config::AppConfig,
    metrics::InferenceMetrics,
    models::{InferenceEngine, ModelLoader},
    types::PredictionReport,
};
use std::io::{self, BufRead, BufWriter, Write};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| {
        EnvFilter::try_new(format!("classifier_engine={}", config.logging.level))
    })?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);

    if config.logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }

    Ok(())
}

fn main() -> Result<()> {
    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/config.toml".to_string());
    let config = AppConfig::load_from_path(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;

    init_logging(&config)?;
    info!(path = %config_path, "Configuration loaded");

    let bundle = Arc::new(ModelLoader::new().load_from_path(&config.models.document_path)?);
    let engine = InferenceEngine::new(bundle, &config)?;
    info!(
        "Inference engine initialized with {} models: {:?}",
        engine.model_count(),
        engine.model_names()
    );

    let metrics = InferenceMetrics::new();
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    let mut batch: Vec<Vec<f64>> = Vec::with_capacity(config.pipeline.batch_size);
    let mut batch_rows: Vec<u64> = Vec::with_capacity(config.pipeline.batch_size);
    let mut row: u64 = 0;

    for line in io::stdin().lock().lines() {
        let line = line.context("Failed to read stdin")?;
        row += 1;

        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<Vec<f64>>(&line) {
            Ok(features) => {
                batch.push(features);
                batch_rows.push(row);
            }
            Err(e) => {
                metrics.record_rejected("parse");
                warn!(row, error = %e, "Skipping row that is not a JSON number array");
                continue;
            }
        }

        if batch.len() >= config.pipeline.batch_size {
            process_batch(&engine, &metrics, &batch, &batch_rows, &mut out)?;
            batch.clear();
            batch_rows.clear();
        }
    }

    if !batch.is_empty() {
        process_batch(&engine, &metrics, &batch, &batch_rows, &mut out)?;
    }

    out.flush()?;

    info!("Input exhausted, shutting down");
    metrics.print_summary();

    Ok(())
}

fn process_batch<W: Write>(
    engine: &InferenceEngine,
    metrics: &InferenceMetrics,
    batch: &[Vec<f64>],
    rows: &[u64],
    out: &mut W,
) -> Result<()> {
    let start = Instant::now();
    let results = engine.predict_batch(batch);
    let per_row = start.elapsed() / batch.len().max(1) as u32;

    for (&row, result) in rows.iter().zip(results) {
        match result {
            Ok(prediction) => {
                metrics.record_prediction(&prediction, per_row);

                let report = PredictionReport::new(row, &prediction, engine.bundle().class_names());
                serde_json::to_writer(&mut *out, &report)?;
                writeln!(out)?;

                debug!(
                    row,
                    class = %prediction.class_name,
                    processing_time_us = per_row.as_micros() as u64,
                    "Row scored"
                );
            }
            Err(e) => {
                metrics.record_error(&e);
                warn!(row, kind = e.kind(), error = %e, "Prediction failed");
            }
        }
    }

    Ok(())
}
