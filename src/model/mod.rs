//! Model module for staged SinGAN training
//!
//! This module provides:
//! - Contracts the per-scale generator and discriminator must fulfil
//! - A wrapper-aware handle around each network
//! - The EMA shadow of the generator
//! - The SinGAN session holding networks and pyramid state

mod discriminator;
mod ema;
mod generator;
mod handle;
pub(crate) mod singan;
mod staged;

pub use discriminator::MultiScaleDiscriminator;
pub use ema::{EmaConfig, EmaShadow};
pub use generator::{GenerateRequest, GeneratorOutput, MultiScaleGenerator, NoiseMode};
pub use handle::ModuleHandle;
pub use singan::{SinGan, SinGanConfig};
pub use staged::StagedModule;
