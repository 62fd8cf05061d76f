//! Training metrics for monitoring SinGAN progress
//!
//! Every tick's log variables are kept so they can be summarized per stage
//! or written to CSV.

use std::collections::BTreeSet;

use super::log_vars::LogVars;
use super::step::CURR_STAGE_KEY;

/// Logs of one training tick
#[derive(Debug, Clone, PartialEq)]
pub struct TickRecord {
    /// Global iteration
    pub iter: usize,
    /// Log variables returned by the tick
    pub log_vars: LogVars,
}

/// Metrics collected during training
#[derive(Debug, Clone, Default)]
pub struct TrainingMetrics {
    /// Per-tick records in iteration order
    pub records: Vec<TickRecord>,
}

impl TrainingMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the logs of one tick
    pub fn record(&mut self, iter: usize, log_vars: LogVars) {
        self.records.push(TickRecord { iter, log_vars });
    }

    /// Get number of recorded ticks
    pub fn num_ticks(&self) -> usize {
        self.records.len()
    }

    /// Latest value logged under `key`
    pub fn latest(&self, key: &str) -> Option<f64> {
        self.records
            .iter()
            .rev()
            .find_map(|r| r.log_vars.get(key).copied())
    }

    /// Mean of the last `window` values logged under `key`
    pub fn moving_average(&self, key: &str, window: usize) -> Option<f64> {
        let values: Vec<f64> = self
            .records
            .iter()
            .filter_map(|r| r.log_vars.get(key).copied())
            .collect();
        if values.is_empty() {
            return None;
        }
        Some(moving_average(&values, window))
    }

    /// Mean of `key` over the ticks that trained `stage`
    pub fn stage_mean(&self, key: &str, stage: usize) -> Option<f64> {
        let values: Vec<f64> = self
            .records
            .iter()
            .filter(|r| r.log_vars.get(CURR_STAGE_KEY).copied() == Some(stage as f64))
            .filter_map(|r| r.log_vars.get(key).copied())
            .collect();
        if values.is_empty() {
            None
        } else {
            Some(values.iter().sum::<f64>() / values.len() as f64)
        }
    }

    /// Every key seen in any record, sorted
    pub fn keys(&self) -> Vec<String> {
        let keys: BTreeSet<&String> = self.records.iter().flat_map(|r| r.log_vars.keys()).collect();
        keys.into_iter().cloned().collect()
    }

    /// Save metrics to CSV file
    ///
    /// One row per tick; keys missing from a tick are left empty.
    pub fn save_csv(&self, path: &str) -> anyhow::Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        let keys = self.keys();

        let mut header = vec!["iter".to_string()];
        header.extend(keys.iter().cloned());
        writer.write_record(&header)?;

        for record in &self.records {
            let mut row = vec![record.iter.to_string()];
            row.extend(
                keys.iter()
                    .map(|k| record.log_vars.get(k).map(|v| v.to_string()).unwrap_or_default()),
            );
            writer.write_record(&row)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Load metrics from CSV file
    pub fn load_csv(path: &str) -> anyhow::Result<Self> {
        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?.clone();
        let mut metrics = Self::new();

        for result in reader.records() {
            let record = result?;
            let iter = record
                .get(0)
                .ok_or_else(|| anyhow::anyhow!("CSV row without iteration column"))?
                .parse()?;
            let mut log_vars = LogVars::new();
            for (key, value) in headers.iter().zip(record.iter()).skip(1) {
                if !value.is_empty() {
                    log_vars.insert(key.to_string(), value.parse()?);
                }
            }
            metrics.record(iter, log_vars);
        }

        Ok(metrics)
    }
}

/// Calculate moving average of last `window` values
fn moving_average(values: &[f64], window: usize) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let n = window.clamp(1, values.len());
    let sum: f64 = values.iter().rev().take(n).sum();
    sum / n as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logs(pairs: &[(&str, f64)]) -> LogVars {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_training_metrics() {
        let mut metrics = TrainingMetrics::new();

        metrics.record(0, logs(&[("loss_gen", 1.5), ("curr_stage", 0.0)]));
        metrics.record(1, logs(&[("loss_gen", 1.3), ("curr_stage", 0.0)]));
        metrics.record(2, logs(&[("loss_gen", 0.4), ("curr_stage", 1.0)]));

        assert_eq!(metrics.num_ticks(), 3);
        assert_eq!(metrics.latest("loss_gen"), Some(0.4));
        assert_eq!(metrics.latest("loss_gp"), None);
        assert!((metrics.stage_mean("loss_gen", 0).unwrap() - 1.4).abs() < 1e-12);
        assert!((metrics.moving_average("loss_gen", 2).unwrap() - 0.85).abs() < 1e-12);
    }

    #[test]
    fn test_csv_round_trip_keeps_sparse_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.csv");
        let path = path.to_str().unwrap();

        let mut metrics = TrainingMetrics::new();
        metrics.record(0, logs(&[("loss_disc_fake", 0.2), ("curr_stage", 0.0)]));
        metrics.record(1, logs(&[("loss_disc_fake", 0.1), ("loss_gen", 2.0), ("curr_stage", 0.0)]));
        metrics.save_csv(path).unwrap();

        let loaded = TrainingMetrics::load_csv(path).unwrap();
        assert_eq!(loaded.num_ticks(), 2);
        assert!(!loaded.records[0].log_vars.contains_key("loss_gen"));
        assert_eq!(loaded.records[1].log_vars.get("loss_gen"), Some(&2.0));
        assert_eq!(loaded.records[1].iter, 1);
    }
}
