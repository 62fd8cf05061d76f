//! Toy per-scale networks shared by the integration tests

#![allow(dead_code)]

use rust_singan::model::{GenerateRequest, GeneratorOutput, StagedModule};
use rust_singan::{
    MultiScaleDiscriminator, MultiScaleGenerator, NoiseMode, OptimizerConfig, OptimizerSet,
    SinGan, SinGanConfig, SinGanError, TrainBatch,
};
use std::cell::RefCell;

use tch::nn::{self, Module};
use tch::{Device, Kind, Tensor};

pub const CHANNELS: i64 = 3;

fn conv(vs: &nn::VarStore, c_in: i64, c_out: i64) -> nn::Conv2D {
    let config = nn::ConvConfig {
        padding: 1,
        ..Default::default()
    };
    nn::conv2d(vs.root() / "conv", c_in, c_out, 3, config)
}

fn copy_previous_stage(stores: &mut [nn::VarStore], stage: usize) -> rust_singan::Result<()> {
    if stage >= stores.len() {
        return Err(SinGanError::state(format!(
            "stage {} out of {} scales",
            stage,
            stores.len()
        )));
    }
    if stage == 0 {
        return Ok(());
    }
    let (prev, curr) = stores.split_at_mut(stage);
    curr[0].copy(&prev[stage - 1])?;
    Ok(())
}

/// Residual conv generator, one `VarStore` per scale
pub struct ToyGenerator {
    stores: Vec<nn::VarStore>,
    convs: Vec<nn::Conv2D>,
    shifts: Vec<Tensor>,
}

impl ToyGenerator {
    pub fn new(num_scales: usize) -> Self {
        let mut stores = Vec::new();
        let mut convs = Vec::new();
        let mut shifts = Vec::new();
        for _ in 0..num_scales {
            let vs = nn::VarStore::new(Device::Cpu);
            convs.push(conv(&vs, CHANNELS, CHANNELS));
            shifts.push(vs.root().zeros_no_train("shift", &[1, CHANNELS, 1, 1]));
            stores.push(vs);
        }
        Self {
            stores,
            convs,
            shifts,
        }
    }
}

impl StagedModule for ToyGenerator {
    fn num_scales(&self) -> usize {
        self.stores.len()
    }

    fn stage_store(&self, stage: usize) -> Option<&nn::VarStore> {
        self.stores.get(stage)
    }

    fn stage_store_mut(&mut self, stage: usize) -> Option<&mut nn::VarStore> {
        self.stores.get_mut(stage)
    }

    fn check_and_load_prev_weight(&mut self, stage: usize) -> rust_singan::Result<()> {
        copy_previous_stage(&mut self.stores, stage)
    }
}

impl MultiScaleGenerator for ToyGenerator {
    fn generate(&self, request: &GenerateRequest<'_>) -> GeneratorOutput {
        let n = request.num_batches;
        let mut prev: Option<Tensor> = None;
        let mut prev_res_list = Vec::new();

        for scale in 0..=request.curr_scale {
            let size = request.fixed_noises[scale].size();
            let (h, w) = (size[2], size[3]);

            let base = match (&prev, request.input_sample) {
                (Some(p), _) => p.upsample_nearest2d([h, w], None::<f64>, None::<f64>),
                (None, Some(input)) => input.expand([n, CHANNELS, h, w], false),
                (None, None) => Tensor::zeros([n, CHANNELS, h, w], (Kind::Float, Device::Cpu)),
            };
            let noise = match request.rand_mode {
                NoiseMode::Rand => Tensor::randn([n, CHANNELS, h, w], (Kind::Float, Device::Cpu)),
                NoiseMode::Recon => request.fixed_noises[scale].expand([n, CHANNELS, h, w], false),
            };
            let x = &base + noise * request.noise_weights[scale];
            let out = self.convs[scale].forward(&x) + &base + &self.shifts[scale];

            if let Some(p) = prev.replace(out) {
                prev_res_list.push(p);
            }
        }

        let fake_img = prev.unwrap_or_else(|| Tensor::zeros([n, CHANNELS, 1, 1], (Kind::Float, Device::Cpu)));
        if request.get_prev_res {
            GeneratorOutput::WithIntermediates {
                fake_img,
                prev_res_list,
            }
        } else {
            GeneratorOutput::Image(fake_img)
        }
    }
}

/// Patch critic, one conv per scale
pub struct ToyDiscriminator {
    stores: Vec<nn::VarStore>,
    convs: Vec<nn::Conv2D>,
    /// Per `score` call: whether the scored stage was trainable
    score_log: RefCell<Vec<bool>>,
}

impl ToyDiscriminator {
    pub fn new(num_scales: usize) -> Self {
        let mut stores = Vec::new();
        let mut convs = Vec::new();
        for _ in 0..num_scales {
            let vs = nn::VarStore::new(Device::Cpu);
            convs.push(conv(&vs, CHANNELS, 1));
            stores.push(vs);
        }
        Self {
            stores,
            convs,
            score_log: RefCell::new(Vec::new()),
        }
    }

    /// Drain the trainability recorded by `score` calls
    pub fn take_score_log(&self) -> Vec<bool> {
        self.score_log.take()
    }
}

impl StagedModule for ToyDiscriminator {
    fn num_scales(&self) -> usize {
        self.stores.len()
    }

    fn stage_store(&self, stage: usize) -> Option<&nn::VarStore> {
        self.stores.get(stage)
    }

    fn stage_store_mut(&mut self, stage: usize) -> Option<&mut nn::VarStore> {
        self.stores.get_mut(stage)
    }

    fn check_and_load_prev_weight(&mut self, stage: usize) -> rust_singan::Result<()> {
        copy_previous_stage(&mut self.stores, stage)
    }
}

impl MultiScaleDiscriminator for ToyDiscriminator {
    fn score(&self, image: &Tensor, curr_scale: usize) -> Tensor {
        let trainable = self.stores[curr_scale]
            .trainable_variables()
            .iter()
            .all(|t| t.requires_grad());
        self.score_log.borrow_mut().push(trainable);
        self.convs[curr_scale].forward(image)
    }
}

pub type ToySinGan = SinGan<ToyGenerator, ToyDiscriminator>;

/// Spatial sizes of a two-scale pyramid
pub const TWO_SCALES: [(i64, i64); 2] = [(6, 6), (8, 10)];

pub fn batch(sizes: &[(i64, i64)]) -> TrainBatch {
    let reals: Vec<Tensor> = sizes
        .iter()
        .map(|&(h, w)| Tensor::rand([1, CHANNELS, h, w], (Kind::Float, Device::Cpu)) * 2.0 - 1.0)
        .collect();
    let (h0, w0) = sizes[0];
    let input_sample = Tensor::zeros([1, CHANNELS, h0, w0], (Kind::Float, Device::Cpu));
    TrainBatch::from_pyramid(input_sample, reals)
}

pub fn config(iters_per_scale: usize, num_scales: usize) -> SinGanConfig {
    SinGanConfig {
        iters_per_scale,
        num_scales: Some(num_scales),
        ..Default::default()
    }
}

/// Untrained session, its optimizers and a batch
pub fn session(config: SinGanConfig, sizes: &[(i64, i64)]) -> (ToySinGan, OptimizerSet, TrainBatch) {
    tch::manual_seed(0);
    let num_scales = sizes.len();
    let generator = ToyGenerator::new(num_scales);
    let discriminator = ToyDiscriminator::new(num_scales);
    let optimizers =
        OptimizerSet::adam_for(&generator, &discriminator, &OptimizerConfig::default()).unwrap();

    let with_ema = config.ema.is_some();
    let mut model = SinGan::new(generator, discriminator, config, Device::Cpu).unwrap();
    if with_ema {
        model = model.with_ema_shadow(ToyGenerator::new(num_scales)).unwrap();
    }
    (model, optimizers, batch(sizes))
}

/// Run ticks `0..iters`
pub fn train(model: &mut ToySinGan, optimizers: &mut OptimizerSet, batch: &TrainBatch, iters: usize) {
    for iter in 0..iters {
        model.train_step(iter, batch, optimizers).unwrap();
    }
}

pub fn to_vec(t: &Tensor) -> Vec<f32> {
    Vec::<f32>::try_from(&t.detach().flatten(0, -1)).unwrap()
}

pub fn assert_close(a: &Tensor, b: &Tensor, tol: f32) {
    let (a, b) = (to_vec(a), to_vec(b));
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(b.iter()) {
        assert!((x - y).abs() <= tol, "{} vs {}", x, y);
    }
}
