//! Configuration management
//!
//! Provides unified configuration for SinGAN training and sampling.

use serde::{Deserialize, Serialize};

use crate::model::SinGanConfig;
use crate::training::{OptimizerConfig, TrainerConfig};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// SinGAN hyperparameters
    #[serde(default)]
    pub singan: SinGanConfig,
    /// Per-stage optimizer settings
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    /// Training loop settings
    #[serde(default)]
    pub trainer: TrainerConfig,
    /// Device: "cpu" or "cuda"
    #[serde(default = "default_device")]
    pub device: String,
}

fn default_device() -> String {
    "cpu".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            singan: SinGanConfig::default(),
            optimizer: OptimizerConfig::default(),
            trainer: TrainerConfig::default(),
            device: default_device(),
        }
    }
}

impl Config {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from TOML file
    pub fn from_toml(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_toml(&self, path: &str) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from JSON file
    pub fn from_json(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to JSON file
    pub fn save_json(&self, path: &str) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get device from configuration
    pub fn get_device(&self) -> tch::Device {
        match self.device.to_lowercase().as_str() {
            "cuda" | "gpu" => {
                if tch::Cuda::is_available() {
                    tch::Device::Cuda(0)
                } else {
                    tracing::warn!("CUDA requested but not available, falling back to CPU");
                    tch::Device::Cpu
                }
            }
            _ => tch::Device::Cpu,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        self.singan.validate()?;
        if self.optimizer.gen_lr <= 0.0 || self.optimizer.disc_lr <= 0.0 {
            anyhow::bail!("Learning rates must be > 0");
        }
        if !(0.0..1.0).contains(&self.optimizer.beta1) || !(0.0..1.0).contains(&self.optimizer.beta2) {
            anyhow::bail!("Adam betas must be in [0, 1)");
        }
        if self.optimizer.gen_accumulation != 1 || self.optimizer.disc_accumulation != 1 {
            anyhow::bail!("Gradient accumulation is not supported, counts must be 1");
        }
        if let Some(ema) = &self.singan.ema {
            if ema.interval == 0 {
                anyhow::bail!("EMA interval must be > 0");
            }
            if !(0.0..=1.0).contains(&ema.momentum) {
                anyhow::bail!("EMA momentum must be in [0, 1]");
            }
        }
        if let Some(scheduler) = &self.singan.lr_scheduler {
            if scheduler.gamma <= 0.0 {
                anyhow::bail!("Learning-rate decay gamma must be > 0");
            }
        }
        if self.trainer.log_interval == 0 {
            anyhow::bail!("Log interval must be > 0");
        }
        Ok(())
    }
}
