//! Persisted test snapshot: fixed noises, noise weights and trained stage

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tch::{Device, Kind, Tensor};

use crate::error::{Result, SinGanError};
use crate::model::{MultiScaleGenerator, SinGan, StagedModule};
use crate::pyramid::{FixedNoisePyramid, NoiseWeights};

/// Whether the test snapshot has been read into the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnapshotState {
    #[default]
    Unloaded,
    Loaded,
}

/// Flat `f32` copy of a tensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseArray {
    pub shape: Vec<i64>,
    pub data: Vec<f32>,
}

impl NoiseArray {
    /// Copy `tensor` to host memory
    pub fn from_tensor(tensor: &Tensor) -> Result<Self> {
        let flat = tensor
            .detach()
            .to_device(Device::Cpu)
            .to_kind(Kind::Float)
            .flatten(0, -1);
        Ok(Self {
            shape: tensor.size(),
            data: Vec::<f32>::try_from(&flat)?,
        })
    }

    /// Rebuild the tensor on `device`
    pub fn to_tensor(&self, device: Device) -> Result<Tensor> {
        let numel: i64 = self.shape.iter().product();
        if self.shape.iter().any(|&d| d < 0) || numel as usize != self.data.len() {
            return Err(SinGanError::state(format!(
                "noise of shape {:?} needs {} values, snapshot holds {}",
                self.shape,
                numel,
                self.data.len()
            )));
        }
        Ok(Tensor::from_slice(&self.data)
            .f_reshape(self.shape.as_slice())?
            .to_device(device))
    }
}

/// Noise state needed to sample from a trained session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSnapshot {
    pub fixed_noises: Vec<NoiseArray>,
    pub noise_weights: Vec<f64>,
    /// Trained stage, `-1` when untrained
    pub curr_stage: i64,
}

impl TestSnapshot {
    /// Capture the noise state of `model`
    pub fn capture<G, D>(model: &SinGan<G, D>) -> Result<Self>
    where
        G: MultiScaleGenerator,
        D: StagedModule,
    {
        let fixed_noises = model
            .fixed_noises()
            .as_slice()
            .iter()
            .map(NoiseArray::from_tensor)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            fixed_noises,
            noise_weights: model.noise_weights().as_slice().to_vec(),
            curr_stage: model.curr_stage_index(),
        })
    }

    /// Read a snapshot from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Write the snapshot as JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    /// Trained stage, `None` when untrained
    pub fn stage(&self) -> Option<usize> {
        usize::try_from(self.curr_stage).ok()
    }

    /// Check that noises and weights cover every trained stage
    pub fn validate(&self) -> Result<()> {
        let needed = self.stage().map_or(0, |stage| stage + 1);
        if self.fixed_noises.len() < needed {
            return Err(SinGanError::state(format!(
                "snapshot at stage {} holds {} fixed noises, needs {}",
                self.curr_stage,
                self.fixed_noises.len(),
                needed
            )));
        }
        if self.noise_weights.len() < needed {
            return Err(SinGanError::state(format!(
                "snapshot at stage {} holds {} noise weights, needs {}",
                self.curr_stage,
                self.noise_weights.len(),
                needed
            )));
        }
        Ok(())
    }

    /// Fixed noises as tensors on `device`
    pub fn noise_pyramid(&self, device: Device) -> Result<FixedNoisePyramid> {
        let noises = self
            .fixed_noises
            .iter()
            .map(|n| n.to_tensor(device))
            .collect::<Result<Vec<_>>>()?;
        Ok(FixedNoisePyramid::from_tensors(noises))
    }

    /// Noise weights
    pub fn weights(&self) -> NoiseWeights {
        NoiseWeights::from_vec(self.noise_weights.clone())
    }
}
