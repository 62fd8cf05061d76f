//! Inference module for SinGAN
//!
//! This module provides:
//! - Sampling from the live generator, the EMA shadow or both
//! - The persisted test snapshot and its one-shot loading

mod sampler;
mod snapshot;

pub use sampler::{GenSample, GeneratedImage, SampleModel, SampleRequest};
pub use snapshot::{NoiseArray, SnapshotState, TestSnapshot};
