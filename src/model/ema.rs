//! Exponential moving average shadow of the generator
//!
//! The shadow is a second generator instance with identical variable names.
//! It is either synchronized by plain copy or blended towards the live
//! generator: `shadow = decay * shadow + (1 - decay) * live`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tch::{Kind, Tensor};

use super::staged::StagedModule;
use crate::error::{Result, SinGanError};

/// EMA configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmaConfig {
    /// Generator iteration after which blending replaces plain copies
    pub start_iter: usize,
    /// Weight of the live generator in each blend (`1 - decay`)
    pub momentum: f64,
    /// Blend every `interval` updates
    pub interval: usize,
    /// Average buffers too instead of copying them
    pub update_buffers: bool,
}

impl Default for EmaConfig {
    fn default() -> Self {
        Self {
            start_iter: 0,
            momentum: 0.001,
            interval: 1,
            update_buffers: false,
        }
    }
}

impl EmaConfig {
    /// Decay applied to the shadow value
    pub fn decay(&self) -> f64 {
        1.0 - self.momentum
    }
}

/// Shadow copy of a generator
#[derive(Debug)]
pub struct EmaShadow<G> {
    module: G,
    config: EmaConfig,
    steps: u64,
}

impl<G: StagedModule> EmaShadow<G> {
    /// Create a shadow from a freshly built module and copy `source` into it
    pub fn new(module: G, source: &G, config: EmaConfig) -> Result<Self> {
        if config.interval == 0 {
            return Err(SinGanError::config(-1, "ema interval", ">= 1", 0));
        }
        let mut shadow = Self {
            module,
            config,
            steps: 0,
        };
        shadow.sync_parameters(source)?;
        shadow.sync_buffers(source)?;
        Ok(shadow)
    }

    /// Shadow module used for sampling
    pub fn module(&self) -> &G {
        &self.module
    }

    /// EMA configuration
    pub fn config(&self) -> &EmaConfig {
        &self.config
    }

    /// Whether buffers are averaged along with parameters
    pub fn update_buffers(&self) -> bool {
        self.config.update_buffers
    }

    /// Number of `update_parameters` calls so far
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Blend the shadow towards `source`
    pub fn update_parameters(&mut self, source: &G) -> Result<()> {
        if self.steps % self.config.interval as u64 == 0 {
            let decay = self.config.decay();
            let mut pairs = self.match_variables(source.named_parameters())?;
            if self.config.update_buffers {
                pairs.extend(self.match_variables(source.named_buffers())?);
            }
            tch::no_grad(|| {
                for (mut dst, src) in pairs {
                    if !is_floating(&dst) {
                        continue;
                    }
                    let src = src.to_device(dst.device());
                    let blended = &dst * decay + src * (1.0 - decay);
                    dst.copy_(&blended);
                }
            });
        }
        self.steps += 1;
        Ok(())
    }

    /// Copy every parameter of `source` into the shadow
    pub fn sync_parameters(&mut self, source: &G) -> Result<()> {
        let pairs = self.match_variables(source.named_parameters())?;
        copy_pairs(pairs);
        Ok(())
    }

    /// Copy every buffer of `source` into the shadow
    pub fn sync_buffers(&mut self, source: &G) -> Result<()> {
        let pairs = self.match_variables(source.named_buffers())?;
        copy_pairs(pairs);
        Ok(())
    }

    fn match_variables(&self, source: Vec<(String, Tensor)>) -> Result<Vec<(Tensor, Tensor)>> {
        let mut shadow: HashMap<String, Tensor> = self.module.named_variables().into_iter().collect();
        source
            .into_iter()
            .map(|(name, src)| {
                let dst = shadow.remove(&name).ok_or_else(|| {
                    SinGanError::state(format!("EMA shadow has no variable named {}", name))
                })?;
                if dst.size() != src.size() {
                    return Err(SinGanError::state(format!(
                        "EMA shadow variable {} has shape {:?}, generator has {:?}",
                        name,
                        dst.size(),
                        src.size()
                    )));
                }
                Ok((dst, src))
            })
            .collect()
    }
}

fn copy_pairs(pairs: Vec<(Tensor, Tensor)>) {
    tch::no_grad(|| {
        for (mut dst, src) in pairs {
            let src = src.to_device(dst.device());
            dst.copy_(&src);
        }
    });
}

fn is_floating(t: &Tensor) -> bool {
    matches!(t.kind(), Kind::Float | Kind::Double | Kind::Half | Kind::BFloat16)
}
