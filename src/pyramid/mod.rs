//! Image pyramids and per-scale noise state
//!
//! This module provides:
//! - The real-image pyramid taken from the training batch
//! - The fixed noise pyramid used for reconstruction
//! - The calibrated noise-weight sequence

mod noise;
mod reals;
mod weights;

pub use noise::FixedNoisePyramid;
pub use reals::{RealPyramid, TrainBatch, INPUT_SAMPLE_KEY, REAL_SCALE_PREFIX};
pub use weights::{calibrate_noise_weight, reconstruction_rmse, NoiseWeights};
