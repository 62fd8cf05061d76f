//! Training batch and real-image pyramid

use std::collections::HashMap;

use tch::Tensor;

use crate::error::{Result, SinGanError};

/// Batch key of the coarsest-scale input
pub const INPUT_SAMPLE_KEY: &str = "input_sample";

/// Batch key prefix of the real images, followed by the scale index
pub const REAL_SCALE_PREFIX: &str = "real_scale";

/// One training batch: the input sample plus one real image per scale
#[derive(Debug, Default)]
pub struct TrainBatch {
    tensors: HashMap<String, Tensor>,
}

impl TrainBatch {
    /// Create an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a batch from an input sample and the real images, coarsest first
    pub fn from_pyramid(input_sample: Tensor, reals: Vec<Tensor>) -> Self {
        let mut batch = Self::new();
        batch.insert(INPUT_SAMPLE_KEY, input_sample);
        for (scale, real) in reals.into_iter().enumerate() {
            batch.insert(format!("{}{}", REAL_SCALE_PREFIX, scale), real);
        }
        batch
    }

    /// Insert a tensor under `key`
    pub fn insert(&mut self, key: impl Into<String>, tensor: Tensor) {
        self.tensors.insert(key.into(), tensor);
    }

    /// Tensor stored under `key`
    pub fn get(&self, key: &str) -> Option<&Tensor> {
        self.tensors.get(key)
    }

    /// The coarsest-scale input, if present
    pub fn input_sample(&self) -> Option<&Tensor> {
        self.get(INPUT_SAMPLE_KEY)
    }

    /// Number of `real_scale<N>` entries
    pub fn num_real_scales(&self) -> usize {
        self.tensors
            .keys()
            .filter(|k| k.starts_with(REAL_SCALE_PREFIX))
            .count()
    }

    /// Real images ordered by scale
    ///
    /// Fails if the scale indices are not contiguous from zero or an image
    /// does not hold exactly one sample.
    pub fn real_scales(&self, stage: i64) -> Result<Vec<Tensor>> {
        let scales = self.num_real_scales();
        (0..scales)
            .map(|scale| {
                let key = format!("{}{}", REAL_SCALE_PREFIX, scale);
                let real = self.get(&key).ok_or_else(|| {
                    SinGanError::config(stage, "batch keys", format!("{} present", key), "missing")
                })?;
                let batch_size = real.size().first().copied().unwrap_or(0);
                if batch_size != 1 {
                    return Err(SinGanError::config(
                        stage,
                        format!("batch size of {}", key),
                        1,
                        batch_size,
                    ));
                }
                Ok(real.shallow_clone())
            })
            .collect()
    }
}

/// Real images, one per scale, index 0 is the coarsest
#[derive(Debug, Default)]
pub struct RealPyramid {
    images: Vec<Tensor>,
}

impl RealPyramid {
    /// Create an empty pyramid
    pub fn new() -> Self {
        Self::default()
    }

    /// Fill the pyramid; it stays unchanged for the rest of the run
    pub fn set(&mut self, images: Vec<Tensor>) -> Result<()> {
        if !self.images.is_empty() {
            return Err(SinGanError::state("real pyramid is already populated"));
        }
        if images.is_empty() {
            return Err(SinGanError::config(-1, "number of real scales", ">= 1", 0));
        }
        self.images = images;
        Ok(())
    }

    /// Real image at `stage`
    pub fn get(&self, stage: usize) -> Option<&Tensor> {
        self.images.get(stage)
    }

    /// Spatial size `(h, w)` of the image at `stage`
    pub fn spatial_size(&self, stage: usize) -> Option<(i64, i64)> {
        self.get(stage).map(|img| {
            let size = img.size();
            (size[size.len() - 2], size[size.len() - 1])
        })
    }

    /// Number of scales
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// Whether the pyramid has not been populated yet
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Iterate over the images, coarsest first
    pub fn iter(&self) -> impl Iterator<Item = &Tensor> {
        self.images.iter()
    }
}
