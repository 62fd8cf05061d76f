//! # SinGAN Staged Training
//!
//! This crate provides the training and sampling orchestration of SinGAN,
//! a GAN learned from a single image one scale at a time. The per-scale
//! networks are supplied by the caller through the traits in [`model`].
//!
//! ## Modules
//!
//! - `model`: Network contracts, EMA shadow and the SinGAN session
//! - `pyramid`: Real images, fixed noises and calibrated noise weights
//! - `training`: Stage schedule, losses, optimizers and the training loop
//! - `inference`: Sampling and the persisted test snapshot
//! - `utils`: Configuration and logging

pub mod error;
pub mod inference;
pub mod model;
pub mod pyramid;
pub mod training;
pub mod utils;

pub use error::{Result, SinGanError};
pub use inference::{GenSample, GeneratedImage, SampleModel, SampleRequest, TestSnapshot};
pub use model::{
    EmaConfig, GenerateRequest, GeneratorOutput, ModuleHandle, MultiScaleDiscriminator,
    MultiScaleGenerator, NoiseMode, SinGan, SinGanConfig, StagedModule,
};
pub use pyramid::{FixedNoisePyramid, NoiseWeights, RealPyramid, TrainBatch};
pub use training::{LogVars, OptimizerConfig, OptimizerSet, Role, Trainer, TrainerConfig, TrainingMetrics};
pub use utils::{setup_logging, Config};
