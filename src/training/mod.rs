//! Training module for SinGAN
//!
//! This module provides:
//! - Stage bookkeeping over the global iteration counter
//! - WGAN-GP losses and log aggregation
//! - Per-stage optimizers and learning-rate schedules
//! - The training tick and a driver loop with metrics

mod log_vars;
mod losses;
mod metrics;
mod optim;
mod stage;
mod step;
mod trainer;

pub use log_vars::{gather_log_vars, parse_losses, LogVars, TOTAL_LOSS_KEY};
pub use losses::{disc_loss, gen_loss, gradient_penalty, GP_LOSS_WEIGHT, RECON_LOSS_WEIGHT};
pub use metrics::{TickRecord, TrainingMetrics};
pub use optim::{LrSchedulerConfig, MultiStepLr, OptimizerConfig, OptimizerSet, Role, StageOptimizer};
pub use stage::StageController;
pub use step::CURR_STAGE_KEY;
pub use trainer::{Trainer, TrainerConfig};
