//! Discriminator contract for multi-scale SinGAN discriminators

use tch::Tensor;

use super::staged::StagedModule;

/// Multi-scale discriminator used by SinGAN
///
/// The gradient penalty differentiates the score with respect to the input
/// image and then back-propagates through that gradient, so implementations
/// must be twice differentiable.
pub trait MultiScaleDiscriminator: StagedModule {
    /// Score `image` with the sub-network of `curr_scale`, one value per sample
    fn score(&self, image: &Tensor, curr_scale: usize) -> Tensor;
}
