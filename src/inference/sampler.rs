//! Sampling from a trained SinGAN session
//!
//! Samples come from the live generator, the EMA shadow, or both. The
//! snapshot configured in `SinGanConfig::test_snapshot` is read on the
//! first `test_step` and never again.

use std::fmt;
use std::str::FromStr;

use tch::Tensor;
use tracing::{debug, info};

use super::snapshot::{SnapshotState, TestSnapshot};
use crate::error::{Result, SinGanError};
use crate::model::{GeneratorOutput, MultiScaleGenerator, NoiseMode, SinGan, StagedModule};

/// Which generator a sample is drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleModel {
    /// Live generator
    Orig,
    /// EMA shadow
    Ema,
    /// Both, tagged separately
    EmaOrig,
}

impl fmt::Display for SampleModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleModel::Orig => write!(f, "orig"),
            SampleModel::Ema => write!(f, "ema"),
            SampleModel::EmaOrig => write!(f, "ema/orig"),
        }
    }
}

impl FromStr for SampleModel {
    type Err = SinGanError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "orig" => Ok(SampleModel::Orig),
            "ema" => Ok(SampleModel::Ema),
            "ema/orig" => Ok(SampleModel::EmaOrig),
            other => Err(SinGanError::config(-1, "sample_model", "orig | ema | ema/orig", other)),
        }
    }
}

/// Arguments of a sampling call
#[derive(Debug, Default)]
pub struct SampleRequest {
    /// Images to draw; only 1 is supported
    pub num_batches: Option<i64>,
    /// Noise mode, `rand` when unset
    pub mode: Option<NoiseMode>,
    /// Scale to sample at, the trained stage when unset
    pub curr_scale: Option<usize>,
    /// Generator to sample from, EMA when available else orig
    pub sample_model: Option<SampleModel>,
    /// Optional input at the coarsest scale
    pub input_sample: Option<Tensor>,
    /// Also return the outputs of coarser scales
    pub get_prev_res: bool,
}

impl SampleRequest {
    /// Request with every field at its default
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the noise mode
    pub fn with_mode(mut self, mode: NoiseMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Sample at `curr_scale` instead of the trained stage
    pub fn with_curr_scale(mut self, curr_scale: usize) -> Self {
        self.curr_scale = Some(curr_scale);
        self
    }

    /// Pick the generator to sample from
    pub fn with_sample_model(mut self, sample_model: SampleModel) -> Self {
        self.sample_model = Some(sample_model);
        self
    }

    /// Set the number of images to draw
    pub fn with_num_batches(mut self, num_batches: i64) -> Self {
        self.num_batches = Some(num_batches);
        self
    }

    /// Also return the outputs of coarser scales
    pub fn with_prev_res(mut self) -> Self {
        self.get_prev_res = true;
        self
    }
}

/// One generated image with the outputs of coarser scales
#[derive(Debug)]
pub struct GeneratedImage {
    pub fake_img: Tensor,
    pub prev_res_list: Vec<Tensor>,
}

/// Sample for one batch index
#[derive(Debug)]
pub enum GenSample {
    /// Drawn from a single generator
    Single {
        sample_model: SampleModel,
        image: GeneratedImage,
    },
    /// Drawn from both the EMA shadow and the live generator
    Dual {
        ema: GeneratedImage,
        orig: GeneratedImage,
    },
}

impl GenSample {
    /// Generator(s) the sample was drawn from
    pub fn sample_model(&self) -> SampleModel {
        match self {
            GenSample::Single { sample_model, .. } => *sample_model,
            GenSample::Dual { .. } => SampleModel::EmaOrig,
        }
    }

    /// Output of the live generator, if it was sampled
    pub fn orig(&self) -> Option<&GeneratedImage> {
        match self {
            GenSample::Single {
                sample_model: SampleModel::Orig,
                image,
            } => Some(image),
            GenSample::Dual { orig, .. } => Some(orig),
            GenSample::Single { .. } => None,
        }
    }

    /// Output of the EMA shadow, if it was sampled
    pub fn ema(&self) -> Option<&GeneratedImage> {
        match self {
            GenSample::Single {
                sample_model: SampleModel::Ema,
                image,
            } => Some(image),
            GenSample::Dual { ema, .. } => Some(ema),
            GenSample::Single { .. } => None,
        }
    }
}

impl<G, D> SinGan<G, D>
where
    G: MultiScaleGenerator,
    D: StagedModule,
{
    /// Load the test snapshot on first use, then sample
    pub fn test_step(&mut self, request: SampleRequest) -> Result<Vec<GenSample>> {
        if self.snapshot == SnapshotState::Unloaded {
            self.load_test_snapshot()?;
        }
        self.forward(&request)
    }

    /// Whether the test snapshot has been read
    pub fn is_snapshot_loaded(&self) -> bool {
        self.snapshot == SnapshotState::Loaded
    }

    /// Replace noise state and stage with the configured snapshot, if any
    pub fn load_test_snapshot(&mut self) -> Result<()> {
        let Some(path) = self.config.test_snapshot.clone() else {
            debug!("No test snapshot configured");
            return Ok(());
        };
        let snapshot = TestSnapshot::load(&path)?;
        snapshot.validate()?;
        self.fixed_noises = snapshot.noise_pyramid(self.device)?;
        self.noise_weights = snapshot.weights();
        self.stage.restore(snapshot.stage());
        self.snapshot = SnapshotState::Loaded;
        info!(
            "Loaded test snapshot from {} at stage {}",
            path.display(),
            snapshot.curr_stage
        );
        Ok(())
    }

    /// Draw samples without touching any training state
    pub fn forward(&self, request: &SampleRequest) -> Result<Vec<GenSample>> {
        let stage_index = self.stage.current_index();
        let num_batches = request.num_batches.unwrap_or(1);
        if num_batches != 1 {
            return Err(SinGanError::config(stage_index, "num_batches", 1, num_batches));
        }

        let sample_model = self.resolve_sample_model(request.sample_model)?;
        let mode = request.mode.unwrap_or_default();
        let curr_scale = match request.curr_scale {
            Some(scale) => scale,
            None => self.stage.current().ok_or_else(|| {
                SinGanError::state("cannot sample before any stage is trained")
            })?,
        };
        self.noise_weights.ensure_covers(curr_scale)?;
        if self.fixed_noises.len() <= curr_scale {
            return Err(SinGanError::state(format!(
                "fixed noises cover {} scales, sampling at scale {} needs {}",
                self.fixed_noises.len(),
                curr_scale,
                curr_scale + 1
            )));
        }

        let fixed_noises = self.fixed_noises.to_device(self.device);
        let request = self.generate_request(
            request.input_sample.as_ref(),
            &fixed_noises,
            mode,
            curr_scale,
            request.get_prev_res,
        );

        tch::no_grad(|| -> Result<Vec<GenSample>> {
            let orig = || self.generator.unwrap_module().generate(&request);
            let ema = || {
                self.generator_ema
                    .as_ref()
                    .map(|shadow| shadow.module().generate(&request))
                    .ok_or_else(|| SinGanError::state("no EMA generator to sample from"))
            };

            let samples: Vec<GenSample> = match sample_model {
                SampleModel::Orig => split_batch(orig().into(), num_batches)
                    .into_iter()
                    .map(|image| GenSample::Single { sample_model, image })
                    .collect(),
                SampleModel::Ema => split_batch(ema()?.into(), num_batches)
                    .into_iter()
                    .map(|image| GenSample::Single { sample_model, image })
                    .collect(),
                SampleModel::EmaOrig => split_batch(ema()?.into(), num_batches)
                    .into_iter()
                    .zip(split_batch(orig().into(), num_batches))
                    .map(|(ema, orig)| GenSample::Dual { ema, orig })
                    .collect(),
            };
            Ok(samples)
        })
    }

    fn resolve_sample_model(&self, requested: Option<SampleModel>) -> Result<SampleModel> {
        match requested {
            None if self.with_ema_gen() => Ok(SampleModel::Ema),
            None | Some(SampleModel::Orig) => Ok(SampleModel::Orig),
            Some(model) if !self.with_ema_gen() => Err(SinGanError::config(
                self.stage.current_index(),
                "sample_model without EMA generator",
                SampleModel::Orig,
                model,
            )),
            Some(model) => Ok(model),
        }
    }
}

impl From<GeneratorOutput> for GeneratedImage {
    fn from(output: GeneratorOutput) -> Self {
        match output {
            GeneratorOutput::Image(fake_img) => Self {
                fake_img,
                prev_res_list: Vec::new(),
            },
            GeneratorOutput::WithIntermediates {
                fake_img,
                prev_res_list,
            } => Self {
                fake_img,
                prev_res_list,
            },
        }
    }
}

/// Index every tensor of a batched output per sample
fn split_batch(batched: GeneratedImage, num_batches: i64) -> Vec<GeneratedImage> {
    (0..num_batches)
        .map(|idx| GeneratedImage {
            fake_img: batched.fake_img.get(idx),
            prev_res_list: batched.prev_res_list.iter().map(|r| r.get(idx)).collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::{Device, Kind};

    #[test]
    fn test_sample_model_parsing() {
        assert_eq!("orig".parse::<SampleModel>().unwrap(), SampleModel::Orig);
        assert_eq!("ema/orig".parse::<SampleModel>().unwrap(), SampleModel::EmaOrig);
        assert_eq!(SampleModel::EmaOrig.to_string(), "ema/orig");

        let err = "orig/ema".parse::<SampleModel>().unwrap_err();
        assert!(matches!(err, SinGanError::Configuration { .. }));
    }

    #[test]
    fn test_split_batch_drops_batch_dim() {
        let batched = GeneratedImage {
            fake_img: Tensor::zeros([1, 3, 8, 8], (Kind::Float, Device::Cpu)),
            prev_res_list: vec![Tensor::zeros([1, 3, 4, 4], (Kind::Float, Device::Cpu))],
        };

        let samples = split_batch(batched, 1);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].fake_img.size(), vec![3, 8, 8]);
        assert_eq!(samples[0].prev_res_list[0].size(), vec![3, 4, 4]);
    }

    #[test]
    fn test_gen_sample_accessors() {
        let image = || GeneratedImage {
            fake_img: Tensor::zeros([3, 2, 2], (Kind::Float, Device::Cpu)),
            prev_res_list: Vec::new(),
        };
        let dual = GenSample::Dual {
            ema: image(),
            orig: image(),
        };
        assert!(dual.ema().is_some());
        assert!(dual.orig().is_some());

        let single = GenSample::Single {
            sample_model: SampleModel::Orig,
            image: image(),
        };
        assert!(single.orig().is_some());
        assert!(single.ema().is_none());
        assert_eq!(single.sample_model(), SampleModel::Orig);
    }
}
