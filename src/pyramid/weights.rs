//! Per-scale noise weights and their calibration
//!
//! The weight of scale `s + 1` is the RMSE between the upsampled scale-`s`
//! reconstruction and the scale-`s + 1` real image, times a constant.

use tch::{Kind, Tensor};

use crate::error::{Result, SinGanError};

/// Append-only sequence of noise amplitudes, seeded with `[1.0]`
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseWeights {
    weights: Vec<f64>,
}

impl Default for NoiseWeights {
    fn default() -> Self {
        Self { weights: vec![1.0] }
    }
}

impl NoiseWeights {
    /// Create the seed sequence `[1.0]`
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a sequence, e.g. from a snapshot
    pub fn from_vec(weights: Vec<f64>) -> Self {
        Self { weights }
    }

    /// Weights, coarsest first
    pub fn as_slice(&self) -> &[f64] {
        &self.weights
    }

    /// Number of weights
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Whether no weight is stored
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Weight at `scale`
    pub fn get(&self, scale: usize) -> Option<f64> {
        self.weights.get(scale).copied()
    }

    /// Fail unless a weight exists for every scale up to `stage`
    pub fn ensure_covers(&self, stage: usize) -> Result<()> {
        if self.weights.len() <= stage {
            return Err(SinGanError::state(format!(
                "noise weights cover {} scales, stage {} needs {}",
                self.weights.len(),
                stage,
                stage + 1
            )));
        }
        Ok(())
    }

    /// Append the weight calibrated at the end of `stage`
    ///
    /// The sequence must hold exactly `stage + 1` weights before the append
    /// and may never grow beyond `num_scales`.
    pub fn push_for_stage(&mut self, stage: usize, weight: f64, num_scales: usize) -> Result<()> {
        if self.weights.len() != stage + 1 {
            return Err(SinGanError::state(format!(
                "noise weights hold {} values at the end of stage {}, expected {}",
                self.weights.len(),
                stage,
                stage + 1
            )));
        }
        if stage + 2 > num_scales {
            return Err(SinGanError::state(format!(
                "stage {} is the last of {} scales, no next noise weight",
                stage, num_scales
            )));
        }
        self.weights.push(weight);
        Ok(())
    }
}

/// RMSE between `recon` resampled to the size of `next_real` and `next_real`
pub fn reconstruction_rmse(recon: &Tensor, next_real: &Tensor) -> Tensor {
    let size = next_real.size();
    let (h, w) = (size[size.len() - 2], size[size.len() - 1]);
    let upsampled = recon.upsample_nearest2d([h, w], None::<f64>, None::<f64>);
    upsampled
        .detach()
        .mse_loss(next_real, tch::Reduction::Mean)
        .sqrt()
}

/// Noise weight for the next scale: `noise_weight_init * rmse`
pub fn calibrate_noise_weight(recon: &Tensor, next_real: &Tensor, noise_weight_init: f64) -> f64 {
    let rmse = reconstruction_rmse(recon, next_real).to_kind(Kind::Double);
    noise_weight_init * rmse.double_value(&[])
}
