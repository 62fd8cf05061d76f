//! SinGAN session combining the per-scale networks with the pyramid state
//!
//! Training lives in `training::step`, sampling in `inference::sampler`.
//! This file holds the state they share.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tch::{Device, Tensor};
use tracing::warn;

use super::ema::{EmaConfig, EmaShadow};
use super::generator::{GenerateRequest, MultiScaleGenerator, NoiseMode};
use super::handle::ModuleHandle;
use super::staged::StagedModule;
use crate::error::{Result, SinGanError};
use crate::inference::SnapshotState;
use crate::pyramid::{FixedNoisePyramid, NoiseWeights, RealPyramid};
use crate::training::{LrSchedulerConfig, MultiStepLr, StageController};

/// SinGAN hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinGanConfig {
    /// Generator rounds per generator update
    pub generator_steps: usize,
    /// Discriminator updates between generator updates
    pub discriminator_steps: usize,
    /// Number of pyramid scales; taken from the first batch when unset
    pub num_scales: Option<usize>,
    /// Training iterations per scale
    pub iters_per_scale: usize,
    /// Factor applied to the reconstruction RMSE to get the next noise weight
    pub noise_weight_init: f64,
    /// MultiStep schedule rebuilt at every stage; no schedule when unset
    pub lr_scheduler: Option<LrSchedulerConfig>,
    /// Snapshot with fixed noises, noise weights and stage, read before testing
    pub test_snapshot: Option<PathBuf>,
    /// Generator EMA settings; EMA disabled when unset
    pub ema: Option<EmaConfig>,
}

impl Default for SinGanConfig {
    fn default() -> Self {
        Self {
            generator_steps: 1,
            discriminator_steps: 1,
            num_scales: None,
            iters_per_scale: 2000,
            noise_weight_init: 0.1,
            lr_scheduler: None,
            test_snapshot: None,
            ema: None,
        }
    }
}

impl SinGanConfig {
    /// Check values that would make the schedule meaningless
    pub fn validate(&self) -> Result<()> {
        if self.generator_steps == 0 {
            return Err(SinGanError::config(-1, "generator_steps", ">= 1", 0));
        }
        if self.discriminator_steps == 0 {
            return Err(SinGanError::config(-1, "discriminator_steps", ">= 1", 0));
        }
        if self.iters_per_scale == 0 {
            return Err(SinGanError::config(-1, "iters_per_scale", ">= 1", 0));
        }
        if self.num_scales == Some(0) {
            return Err(SinGanError::config(-1, "num_scales", ">= 1", 0));
        }
        Ok(())
    }
}

/// Learning-rate schedules of the current stage
#[derive(Debug, Clone)]
pub(crate) struct StageSchedulers {
    pub(crate) generator: MultiStepLr,
    pub(crate) discriminator: MultiStepLr,
}

/// Single-image GAN trained one scale at a time
pub struct SinGan<G, D> {
    pub(crate) config: SinGanConfig,
    pub(crate) generator: ModuleHandle<G>,
    pub(crate) discriminator: ModuleHandle<D>,
    pub(crate) generator_ema: Option<EmaShadow<G>>,
    pub(crate) stage: StageController,
    pub(crate) reals: RealPyramid,
    pub(crate) fixed_noises: FixedNoisePyramid,
    pub(crate) noise_weights: NoiseWeights,
    pub(crate) schedulers: Option<StageSchedulers>,
    pub(crate) snapshot: SnapshotState,
    pub(crate) device: Device,
}

impl<G, D> SinGan<G, D>
where
    G: MultiScaleGenerator,
    D: StagedModule,
{
    /// Create an untrained session around directly owned networks
    pub fn new(generator: G, discriminator: D, config: SinGanConfig, device: Device) -> Result<Self> {
        Self::from_handles(
            ModuleHandle::local(generator),
            ModuleHandle::local(discriminator),
            config,
            device,
        )
    }

    /// Create an untrained session
    ///
    /// # Arguments
    ///
    /// * `generator` - Multi-scale generator, optionally behind a wrapper
    /// * `discriminator` - Multi-scale discriminator, optionally behind a wrapper
    /// * `config` - SinGAN hyperparameters
    /// * `device` - Device the fixed noises are moved to for sampling
    pub fn from_handles(
        generator: ModuleHandle<G>,
        discriminator: ModuleHandle<D>,
        config: SinGanConfig,
        device: Device,
    ) -> Result<Self> {
        config.validate()?;
        if config.ema.is_some() {
            warn!("EMA is configured; attach a shadow generator with `with_ema_shadow`");
        }
        let stage = StageController::new(
            config.iters_per_scale,
            config.discriminator_steps,
            config.num_scales,
        );
        Ok(Self {
            config,
            generator,
            discriminator,
            generator_ema: None,
            stage,
            reals: RealPyramid::new(),
            fixed_noises: FixedNoisePyramid::default(),
            noise_weights: NoiseWeights::new(),
            schedulers: None,
            snapshot: SnapshotState::Unloaded,
            device,
        })
    }

    /// Attach a freshly built generator as EMA shadow
    ///
    /// The shadow starts as an exact copy of the live generator.
    pub fn with_ema_shadow(mut self, shadow: G) -> Result<Self> {
        let ema_config = self.config.ema.clone().ok_or_else(|| {
            SinGanError::config(self.stage.current_index(), "ema config", "set", "unset")
        })?;
        let ema = EmaShadow::new(shadow, self.generator.unwrap_module(), ema_config)?;
        self.generator_ema = Some(ema);
        Ok(self)
    }

    /// Hyperparameters
    pub fn config(&self) -> &SinGanConfig {
        &self.config
    }

    /// Generator handle
    pub fn generator(&self) -> &ModuleHandle<G> {
        &self.generator
    }

    /// Discriminator handle
    pub fn discriminator(&self) -> &ModuleHandle<D> {
        &self.discriminator
    }

    /// EMA shadow, when enabled
    pub fn generator_ema(&self) -> Option<&EmaShadow<G>> {
        self.generator_ema.as_ref()
    }

    /// Whether an EMA shadow is maintained
    pub fn with_ema_gen(&self) -> bool {
        self.generator_ema.is_some()
    }

    /// Current stage, `None` before training or snapshot loading
    pub fn curr_stage(&self) -> Option<usize> {
        self.stage.current()
    }

    /// Current stage with `-1` for untrained
    pub fn curr_stage_index(&self) -> i64 {
        self.stage.current_index()
    }

    /// Stage bookkeeping
    pub fn stage_controller(&self) -> &StageController {
        &self.stage
    }

    /// Real-image pyramid
    pub fn reals(&self) -> &RealPyramid {
        &self.reals
    }

    /// Fixed noise pyramid
    pub fn fixed_noises(&self) -> &FixedNoisePyramid {
        &self.fixed_noises
    }

    /// Calibrated noise weights
    pub fn noise_weights(&self) -> &NoiseWeights {
        &self.noise_weights
    }

    /// Device used for sampling
    pub fn device(&self) -> Device {
        self.device
    }

    /// Learning rates of the current stage schedules, when configured
    pub fn scheduled_lrs(&self) -> Option<(f64, f64)> {
        self.schedulers
            .as_ref()
            .map(|s| (s.generator.current_lr(), s.discriminator.current_lr()))
    }

    pub(crate) fn generate_request<'a>(
        &'a self,
        input_sample: Option<&'a Tensor>,
        fixed_noises: &'a FixedNoisePyramid,
        rand_mode: NoiseMode,
        curr_scale: usize,
        get_prev_res: bool,
    ) -> GenerateRequest<'a> {
        GenerateRequest {
            input_sample,
            fixed_noises: fixed_noises.as_slice(),
            noise_weights: self.noise_weights.as_slice(),
            rand_mode,
            curr_scale,
            num_batches: 1,
            get_prev_res,
        }
    }
}
