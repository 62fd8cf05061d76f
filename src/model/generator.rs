//! Generator contract for multi-scale SinGAN generators
//!
//! The network architecture lives outside this crate. The training core
//! only needs a generator that can produce an image at a given scale from
//! the fixed noise pyramid and the calibrated noise weights.

use std::fmt;
use std::str::FromStr;

use tch::Tensor;

use super::staged::StagedModule;
use crate::error::SinGanError;

/// How noise is injected at each scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoiseMode {
    /// Fresh noise scaled by the calibrated noise weight
    #[default]
    Rand,
    /// Fixed noise pyramid exactly, no randomness
    Recon,
}

impl fmt::Display for NoiseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoiseMode::Rand => write!(f, "rand"),
            NoiseMode::Recon => write!(f, "recon"),
        }
    }
}

impl FromStr for NoiseMode {
    type Err = SinGanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rand" => Ok(NoiseMode::Rand),
            "recon" => Ok(NoiseMode::Recon),
            other => Err(SinGanError::config(-1, "noise mode", "rand | recon", other)),
        }
    }
}

/// Arguments of one generator call
#[derive(Debug)]
pub struct GenerateRequest<'a> {
    /// Optional input at the coarsest scale
    pub input_sample: Option<&'a Tensor>,
    /// Fixed noise pyramid, one tensor per scale
    pub fixed_noises: &'a [Tensor],
    /// Calibrated noise amplitude per scale
    pub noise_weights: &'a [f64],
    /// Noise injection mode
    pub rand_mode: NoiseMode,
    /// Scale to generate at
    pub curr_scale: usize,
    /// Number of images to generate
    pub num_batches: i64,
    /// Also return the output of every coarser scale
    pub get_prev_res: bool,
}

/// Output of a generator call
#[derive(Debug)]
pub enum GeneratorOutput {
    /// Final image only
    Image(Tensor),
    /// Final image plus the outputs of coarser scales
    WithIntermediates {
        fake_img: Tensor,
        prev_res_list: Vec<Tensor>,
    },
}

impl GeneratorOutput {
    /// Generated image at the requested scale
    pub fn fake_img(&self) -> &Tensor {
        match self {
            GeneratorOutput::Image(img) => img,
            GeneratorOutput::WithIntermediates { fake_img, .. } => fake_img,
        }
    }

    /// Take the generated image, dropping intermediates
    pub fn into_fake_img(self) -> Tensor {
        match self {
            GeneratorOutput::Image(img) => img,
            GeneratorOutput::WithIntermediates { fake_img, .. } => fake_img,
        }
    }

    /// Outputs of the coarser scales, empty for `Image`
    pub fn prev_res_list(&self) -> &[Tensor] {
        match self {
            GeneratorOutput::Image(_) => &[],
            GeneratorOutput::WithIntermediates { prev_res_list, .. } => prev_res_list,
        }
    }
}

/// Multi-scale generator used by SinGAN
pub trait MultiScaleGenerator: StagedModule {
    /// Generate an image at `request.curr_scale`
    fn generate(&self, request: &GenerateRequest<'_>) -> GeneratorOutput;
}
