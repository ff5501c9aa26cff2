//! Test Feature Generator
//!
//! Emits random feature rows (one JSON array per line) drawn around the
//! scaler statistics of a model document, for piping into the engine.

use anyhow::{Context, Result};
use classifier_engine::ModelDocument;
use rand::Rng;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use tracing::info;

/// Row generator for smoke-testing the engine
struct FeatureGenerator {
    rng: rand::rngs::ThreadRng,
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl FeatureGenerator {
    fn new(document: &ModelDocument) -> Self {
        Self {
            rng: rand::thread_rng(),
            mean: document.scaler_mean.clone(),
            scale: document.scaler_scale.clone(),
        }
    }

    /// Generate a row within roughly two standard deviations of the mean
    fn generate(&mut self) -> Vec<f64> {
        self.mean
            .iter()
            .zip(&self.scale)
            .map(|(m, s)| m + s * self.rng.gen_range(-2.0..2.0))
            .collect()
    }

    /// Generate a row with one feature missing
    fn generate_truncated(&mut self) -> Vec<f64> {
        let mut row = self.generate();
        row.pop();
        row
    }
}

/// Parse the fraction of rows to truncate; must be a number in [0, 1].
fn parse_invalid_rate(arg: Option<&str>) -> Result<f64> {
    let Some(arg) = arg else {
        return Ok(0.0);
    };
    let rate: f64 = arg
        .parse()
        .with_context(|| format!("Invalid rate '{}': not a number", arg))?;
    if !(0.0..=1.0).contains(&rate) {
        anyhow::bail!("Invalid rate '{}': must be between 0 and 1", arg);
    }
    Ok(rate)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("feature_generator=info".parse()?),
        )
        .with_writer(io::stderr)
        .init();

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let document_path = args.get(1).map(|s| s.as_str()).unwrap_or("docs/models.json");
    let count: u64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(100);
    let invalid_rate = parse_invalid_rate(args.get(3).map(|s| s.as_str()))?;

    info!(
        document = %document_path,
        count = count,
        invalid_rate = invalid_rate,
        "Configuration loaded"
    );

    let file = File::open(document_path)
        .with_context(|| format!("Failed to open model document {}", document_path))?;
    let document = ModelDocument::from_reader(BufReader::new(file))?;

    let mut generator = FeatureGenerator::new(&document);
    let mut rng = rand::thread_rng();
    let mut out = BufWriter::new(io::stdout().lock());

    let mut invalid_count = 0;
    for _ in 0..count {
        let row = if rng.gen_bool(invalid_rate) {
            invalid_count += 1;
            generator.generate_truncated()
        } else {
            generator.generate()
        };

        serde_json::to_writer(&mut out, &row)?;
        writeln!(out)?;
    }
    out.flush()?;

    info!(
        "Completed! Generated {} rows ({} truncated)",
        count, invalid_count
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_invalid_rate() {
        assert_eq!(parse_invalid_rate(None).unwrap(), 0.0);
        assert_eq!(parse_invalid_rate(Some("0.25")).unwrap(), 0.25);
        assert_eq!(parse_invalid_rate(Some("1")).unwrap(), 1.0);
    }

    #[test]
    fn test_parse_invalid_rate_rejects_out_of_range() {
        for bad in ["nan", "NaN", "inf", "-0.1", "1.5", "lots"] {
            assert!(parse_invalid_rate(Some(bad)).is_err(), "{}", bad);
        }
    }
}
