//! Per-stage optimizers and learning-rate schedules
//!
//! Every stage has its own generator and discriminator optimizer. They are
//! looked up by `(Role, stage)` so a missing stage is a typed error.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tch::{nn, nn::OptimizerConfig as _, Tensor};

use crate::error::{Result, SinGanError};
use crate::model::StagedModule;

/// Which half of the GAN an optimizer updates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Generator,
    Discriminator,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Generator => write!(f, "generator"),
            Role::Discriminator => write!(f, "discriminator"),
        }
    }
}

/// Optimizer hyperparameters shared by every stage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Generator learning rate
    pub gen_lr: f64,
    /// Discriminator learning rate
    pub disc_lr: f64,
    /// Adam beta1
    pub beta1: f64,
    /// Adam beta2
    pub beta2: f64,
    /// Gradient accumulation count of the generator optimizers
    pub gen_accumulation: usize,
    /// Gradient accumulation count of the discriminator optimizers
    pub disc_accumulation: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            gen_lr: 5e-4,
            disc_lr: 5e-4,
            beta1: 0.5,
            beta2: 0.999,
            gen_accumulation: 1,
            disc_accumulation: 1,
        }
    }
}

/// MultiStep learning-rate schedule arguments
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LrSchedulerConfig {
    /// Scheduler steps at which the learning rate decays
    pub milestones: Vec<usize>,
    /// Multiplicative decay
    pub gamma: f64,
}

/// Optimizer with gradient-accumulation bookkeeping
pub struct StageOptimizer {
    optimizer: nn::Optimizer,
    base_lr: f64,
    lr: f64,
    accumulative_counts: usize,
    inner_count: usize,
    max_counts: Option<usize>,
}

impl StageOptimizer {
    /// Wrap an optimizer built with learning rate `lr`
    pub fn new(optimizer: nn::Optimizer, lr: f64, accumulative_counts: usize) -> Result<Self> {
        if accumulative_counts == 0 {
            return Err(SinGanError::config(-1, "accumulation count", ">= 1", 0));
        }
        Ok(Self {
            optimizer,
            base_lr: lr,
            lr,
            accumulative_counts,
            inner_count: 0,
            max_counts: None,
        })
    }

    /// Adam over the variables of `vs`
    pub fn adam(
        vs: &nn::VarStore,
        lr: f64,
        beta1: f64,
        beta2: f64,
        accumulative_counts: usize,
    ) -> Result<Self> {
        let optimizer = nn::adam(beta1, beta2, 0.0).build(vs, lr)?;
        Self::new(optimizer, lr, accumulative_counts)
    }

    /// Backward passes per optimizer step
    pub fn accumulative_counts(&self) -> usize {
        self.accumulative_counts
    }

    /// Learning rate the optimizer was built with
    pub fn base_lr(&self) -> f64 {
        self.base_lr
    }

    /// Current learning rate
    pub fn lr(&self) -> f64 {
        self.lr
    }

    /// Set the learning rate
    pub fn set_lr(&mut self, lr: f64) {
        self.optimizer.set_lr(lr);
        self.lr = lr;
    }

    /// Backward passes seen since the last count reset
    pub fn inner_count(&self) -> usize {
        self.inner_count
    }

    /// Reset the accumulation counter before a run of `max_counts` updates
    pub fn initialize_count_status(&mut self, init_counts: usize, max_counts: usize) {
        self.inner_count = init_counts;
        self.max_counts = Some(max_counts);
    }

    /// Backward `loss` and step once enough gradients are accumulated
    pub fn update_params(&mut self, loss: &Tensor) {
        let scaled = self.scale_loss(loss);
        scaled.backward();
        if self.should_update() {
            self.optimizer.step();
            self.optimizer.zero_grad();
        }
    }

    fn scale_loss(&mut self, loss: &Tensor) -> Tensor {
        let factor = if self.accumulative_counts == 1 {
            1
        } else {
            match self.max_counts {
                Some(max) => {
                    let remainder = max % self.accumulative_counts;
                    if remainder != 0 && self.inner_count >= max - remainder {
                        remainder
                    } else {
                        self.accumulative_counts
                    }
                }
                None => self.accumulative_counts,
            }
        };
        self.inner_count += 1;
        loss / factor as f64
    }

    fn should_update(&self) -> bool {
        self.inner_count % self.accumulative_counts == 0 || Some(self.inner_count) == self.max_counts
    }
}

/// Optimizers of every stage keyed by `(Role, stage)`
#[derive(Default)]
pub struct OptimizerSet {
    slots: HashMap<(Role, usize), StageOptimizer>,
}

impl OptimizerSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// One Adam optimizer per stage for both networks
    pub fn adam_for<G, D>(generator: &G, discriminator: &D, config: &OptimizerConfig) -> Result<Self>
    where
        G: StagedModule,
        D: StagedModule,
    {
        let mut set = Self::new();
        for stage in 0..generator.num_scales() {
            let vs = generator.stage_store(stage).ok_or(SinGanError::MissingOptimizer {
                role: Role::Generator,
                stage,
            })?;
            set.insert(
                Role::Generator,
                stage,
                StageOptimizer::adam(vs, config.gen_lr, config.beta1, config.beta2, config.gen_accumulation)?,
            );
        }
        for stage in 0..discriminator.num_scales() {
            let vs = discriminator.stage_store(stage).ok_or(SinGanError::MissingOptimizer {
                role: Role::Discriminator,
                stage,
            })?;
            set.insert(
                Role::Discriminator,
                stage,
                StageOptimizer::adam(vs, config.disc_lr, config.beta1, config.beta2, config.disc_accumulation)?,
            );
        }
        Ok(set)
    }

    /// Register the optimizer of `role` at `stage`
    pub fn insert(&mut self, role: Role, stage: usize, optimizer: StageOptimizer) {
        self.slots.insert((role, stage), optimizer);
    }

    /// Optimizer of `role` at `stage`
    pub fn get(&self, role: Role, stage: usize) -> Result<&StageOptimizer> {
        self.slots
            .get(&(role, stage))
            .ok_or(SinGanError::MissingOptimizer { role, stage })
    }

    /// Mutable optimizer of `role` at `stage`
    pub fn get_mut(&mut self, role: Role, stage: usize) -> Result<&mut StageOptimizer> {
        self.slots
            .get_mut(&(role, stage))
            .ok_or(SinGanError::MissingOptimizer { role, stage })
    }

    /// Number of registered optimizers
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no optimizer is registered
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// MultiStep learning-rate decay
///
/// After `n` calls to [`MultiStepLr::step`] the rate is
/// `base_lr * gamma^k` where `k` counts the milestones `<= n`.
#[derive(Debug, Clone)]
pub struct MultiStepLr {
    base_lr: f64,
    milestones: Vec<usize>,
    gamma: f64,
    last_epoch: usize,
}

impl MultiStepLr {
    /// Fresh schedule bound to the initial rate of `optimizer`
    pub fn new(optimizer: &StageOptimizer, config: &LrSchedulerConfig) -> Self {
        let mut milestones = config.milestones.clone();
        milestones.sort_unstable();
        Self {
            base_lr: optimizer.base_lr(),
            milestones,
            gamma: config.gamma,
            last_epoch: 0,
        }
    }

    /// Rate for the current step count
    pub fn current_lr(&self) -> f64 {
        let decays = self.milestones.iter().filter(|&&m| m <= self.last_epoch).count();
        self.base_lr * self.gamma.powi(decays as i32)
    }

    /// Steps taken so far
    pub fn last_epoch(&self) -> usize {
        self.last_epoch
    }

    /// Advance one step and apply the rate to `optimizer`
    pub fn step(&mut self, optimizer: &mut StageOptimizer) {
        self.last_epoch += 1;
        optimizer.set_lr(self.current_lr());
    }
}
