//! Per-scale module capabilities shared by generator and discriminator
//!
//! SinGAN keeps one sub-network per scale. Each scale owns its own
//! `VarStore`, so optimizers can be built for exactly one stage and the
//! EMA shadow can be matched variable-by-variable.

use tch::{nn, Tensor};

use crate::error::Result;

/// A module made of one sub-network per pyramid scale
pub trait StagedModule {
    /// Number of scales this module was built for
    fn num_scales(&self) -> usize;

    /// Variables of the sub-network at `stage`
    fn stage_store(&self, stage: usize) -> Option<&nn::VarStore>;

    /// Mutable variables of the sub-network at `stage`
    fn stage_store_mut(&mut self, stage: usize) -> Option<&mut nn::VarStore>;

    /// Carry weights over from the previous stage when a new stage starts.
    fn check_and_load_prev_weight(&mut self, stage: usize) -> Result<()>;

    /// Enable or disable gradients for every stage.
    fn set_requires_grad(&mut self, requires_grad: bool) {
        for stage in 0..self.num_scales() {
            if let Some(vs) = self.stage_store_mut(stage) {
                if requires_grad {
                    vs.unfreeze();
                } else {
                    vs.freeze();
                }
            }
        }
    }

    /// All variables keyed as `stage<N>.<name>`, sorted by key
    fn named_variables(&self) -> Vec<(String, Tensor)> {
        let mut vars: Vec<(String, Tensor)> = (0..self.num_scales())
            .filter_map(|stage| self.stage_store(stage).map(|vs| (stage, vs)))
            .flat_map(|(stage, vs)| {
                vs.variables()
                    .into_iter()
                    .map(move |(name, tensor)| (format!("stage{}.{}", stage, name), tensor))
            })
            .collect();
        vars.sort_by(|a, b| a.0.cmp(&b.0));
        vars
    }

    /// Trainable variables (parameters)
    fn named_parameters(&self) -> Vec<(String, Tensor)> {
        self.named_variables()
            .into_iter()
            .filter(|(_, t)| t.requires_grad())
            .collect()
    }

    /// Non-trainable variables such as running statistics (buffers)
    fn named_buffers(&self) -> Vec<(String, Tensor)> {
        self.named_variables()
            .into_iter()
            .filter(|(_, t)| !t.requires_grad())
            .collect()
    }
}
