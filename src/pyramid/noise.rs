//! Fixed noise pyramid
//!
//! Only the coarsest scale gets random noise; every finer scale gets zeros,
//! so a "recon" generation is fully determined by this pyramid.

use tch::{Device, Tensor};

use super::reals::RealPyramid;

/// One persistent noise tensor per scale
#[derive(Debug, Default)]
pub struct FixedNoisePyramid {
    noises: Vec<Tensor>,
}

impl FixedNoisePyramid {
    /// Build the noise pyramid for a real pyramid
    pub fn construct(reals: &RealPyramid) -> Self {
        let noises = reals
            .iter()
            .enumerate()
            .map(|(scale, real)| {
                if scale == 0 {
                    let size = real.size();
                    let (h, w) = (size[size.len() - 2], size[size.len() - 1]);
                    Tensor::randn([1, 1, h, w], (real.kind(), real.device()))
                } else {
                    real.zeros_like()
                }
            })
            .collect();
        Self { noises }
    }

    /// Wrap already existing noise tensors, e.g. from a snapshot
    pub fn from_tensors(noises: Vec<Tensor>) -> Self {
        Self { noises }
    }

    /// Noise tensors, coarsest first
    pub fn as_slice(&self) -> &[Tensor] {
        &self.noises
    }

    /// Noise at `scale`
    pub fn get(&self, scale: usize) -> Option<&Tensor> {
        self.noises.get(scale)
    }

    /// Number of scales
    pub fn len(&self) -> usize {
        self.noises.len()
    }

    /// Whether the pyramid has not been built yet
    pub fn is_empty(&self) -> bool {
        self.noises.is_empty()
    }

    /// Copy of the pyramid on `device`
    pub fn to_device(&self, device: Device) -> Self {
        Self {
            noises: self.noises.iter().map(|n| n.to_device(device)).collect(),
        }
    }
}
