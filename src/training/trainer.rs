//! Training loop driving a SinGAN session through every stage

use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::log_vars::TOTAL_LOSS_KEY;
use super::metrics::TrainingMetrics;
use super::optim::OptimizerSet;
use crate::error::{Result, SinGanError};
use crate::inference::TestSnapshot;
use crate::model::{MultiScaleDiscriminator, MultiScaleGenerator, SinGan};
use crate::pyramid::TrainBatch;

/// Training loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Total ticks; defaults to every stage run to completion
    pub total_iters: Option<usize>,
    /// Log a summary every N ticks
    pub log_interval: usize,
    /// Write per-tick metrics here after training
    pub metrics_path: Option<String>,
    /// Write the test snapshot here after training
    pub snapshot_path: Option<String>,
    /// Draw a progress bar
    pub show_progress: bool,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            total_iters: None,
            log_interval: 100,
            metrics_path: None,
            snapshot_path: None,
            show_progress: true,
        }
    }
}

/// SinGAN trainer
pub struct Trainer {
    config: TrainerConfig,
    metrics: TrainingMetrics,
}

impl Trainer {
    /// Create a new trainer
    pub fn new(config: TrainerConfig) -> Self {
        Self {
            config,
            metrics: TrainingMetrics::new(),
        }
    }

    /// Training configuration
    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Metrics recorded so far
    pub fn metrics(&self) -> &TrainingMetrics {
        &self.metrics
    }

    /// Ticks needed to train every scale of `batch`
    pub fn total_iters<G, D>(&self, model: &SinGan<G, D>, batch: &TrainBatch) -> usize
    where
        G: MultiScaleGenerator,
        D: MultiScaleDiscriminator,
    {
        self.config.total_iters.unwrap_or_else(|| {
            let num_scales = model
                .config()
                .num_scales
                .unwrap_or_else(|| batch.num_real_scales());
            num_scales * model.stage_controller().window()
        })
    }

    /// Train `model` on the single-image `batch`
    ///
    /// # Arguments
    ///
    /// * `model` - Session to train, untrained or resumed
    /// * `optimizers` - Per-stage optimizers of both networks
    /// * `batch` - Input sample and real pyramid
    ///
    /// # Returns
    ///
    /// Training metrics
    pub fn train<G, D>(
        &mut self,
        model: &mut SinGan<G, D>,
        optimizers: &mut OptimizerSet,
        batch: &TrainBatch,
    ) -> Result<&TrainingMetrics>
    where
        G: MultiScaleGenerator,
        D: MultiScaleDiscriminator,
    {
        let total_iters = self.total_iters(model, batch);
        if total_iters == 0 {
            return Err(SinGanError::config(-1, "total training iterations", ">= 1", 0));
        }
        let log_interval = self.config.log_interval.max(1);

        info!(
            "Starting training for {} iterations, {} per stage",
            total_iters,
            model.stage_controller().window()
        );

        let pb = if self.config.show_progress {
            ProgressBar::new(total_iters as u64)
        } else {
            ProgressBar::hidden()
        };
        if let Ok(style) =
            ProgressStyle::default_bar().template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("##-"));
        }

        for iter in 0..total_iters {
            let log_vars = model.train_step(iter, batch, optimizers)?;

            pb.set_message(format!(
                "stage {} D: {:.4}",
                model.curr_stage_index(),
                log_vars.get(TOTAL_LOSS_KEY).copied().unwrap_or_default()
            ));
            pb.inc(1);

            if (iter + 1) % log_interval == 0 {
                info!(
                    "Iter {}/{} stage {}: {}",
                    iter + 1,
                    total_iters,
                    model.curr_stage_index(),
                    format_log_vars(&log_vars)
                );
            }
            self.metrics.record(iter, log_vars);
        }

        pb.finish_with_message("done");
        info!(
            "Training finished at stage {}, noise weights {:?}",
            model.curr_stage_index(),
            model.noise_weights().as_slice()
        );

        if let Some(path) = &self.config.metrics_path {
            if let Err(e) = self.metrics.save_csv(path) {
                warn!("Failed to save metrics to {}: {}", path, e);
            } else {
                info!("Saved metrics to {}", path);
            }
        }

        if let Some(path) = &self.config.snapshot_path {
            TestSnapshot::capture(model)?.save(path)?;
            info!("Saved test snapshot to {}", path);
        }

        Ok(&self.metrics)
    }
}

fn format_log_vars(log_vars: &super::log_vars::LogVars) -> String {
    log_vars
        .iter()
        .map(|(k, v)| format!("{}={:.4}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}
