//! One training tick of the staged SinGAN schedule

use tch::Tensor;
use tracing::{debug, info};

use super::log_vars::{gather_log_vars, LogVars, TOTAL_LOSS_KEY};
use super::losses::{disc_loss, gen_loss, gradient_penalty};
use super::optim::{MultiStepLr, OptimizerSet, Role, StageOptimizer};
use crate::error::{Result, SinGanError};
use crate::model::singan::StageSchedulers;
use crate::model::{MultiScaleDiscriminator, MultiScaleGenerator, NoiseMode, SinGan, StagedModule};
use crate::pyramid::{calibrate_noise_weight, FixedNoisePyramid, TrainBatch};

/// Log key holding the stage a tick trained
pub const CURR_STAGE_KEY: &str = "curr_stage";

impl<G, D> SinGan<G, D>
where
    G: MultiScaleGenerator,
    D: MultiScaleDiscriminator,
{
    /// Run one training tick
    ///
    /// # Arguments
    ///
    /// * `curr_iter` - Global iteration counter, starting at 0
    /// * `batch` - Input sample and real images of every scale
    /// * `optimizers` - Generator and discriminator optimizers of every stage
    ///
    /// # Returns
    ///
    /// Averaged discriminator and generator logs plus `curr_stage`
    pub fn train_step(
        &mut self,
        curr_iter: usize,
        batch: &TrainBatch,
        optimizers: &mut OptimizerSet,
    ) -> Result<LogVars> {
        if self.stage.is_transition(curr_iter) {
            self.enter_next_stage(optimizers)?;
        }
        let stage = self.stage.current().ok_or_else(|| {
            SinGanError::state(format!(
                "iteration {} is past the start of training but no stage was entered",
                curr_iter
            ))
        })?;

        if self.reals.is_empty() {
            self.setup_pyramids(stage, batch)?;
        }
        if stage >= self.reals.len() {
            return Err(SinGanError::config(
                stage as i64,
                "stage index",
                format!("< {}", self.reals.len()),
                stage,
            ));
        }

        let input_sample = batch.input_sample();
        let mut log_vars = self.train_gan(curr_iter, stage, input_sample, optimizers)?;
        log_vars.insert(CURR_STAGE_KEY.to_string(), stage as f64);

        if self.stage.is_window_end(curr_iter) && stage + 1 < self.reals.len() {
            self.calibrate_next_noise_weight(stage, input_sample)?;
        }

        if (curr_iter + 1) % self.config.discriminator_steps == 0 {
            if let Some(schedulers) = self.schedulers.as_mut() {
                schedulers
                    .discriminator
                    .step(optimizers.get_mut(Role::Discriminator, stage)?);
                schedulers
                    .generator
                    .step(optimizers.get_mut(Role::Generator, stage)?);
            }
        }

        Ok(log_vars)
    }

    fn enter_next_stage(&mut self, optimizers: &OptimizerSet) -> Result<()> {
        let stage = self.stage.advance()?;
        info!("Entering stage {}", stage);

        self.generator
            .unwrap_module_mut()
            .check_and_load_prev_weight(stage)?;
        self.discriminator
            .unwrap_module_mut()
            .check_and_load_prev_weight(stage)?;

        for role in [Role::Generator, Role::Discriminator] {
            let counts = optimizers.get(role, stage)?.accumulative_counts();
            if counts != 1 {
                return Err(SinGanError::config(
                    stage as i64,
                    format!("{} gradient accumulation count", role),
                    1,
                    counts,
                ));
            }
        }

        self.schedulers = match &self.config.lr_scheduler {
            Some(cfg) => Some(StageSchedulers {
                generator: MultiStepLr::new(optimizers.get(Role::Generator, stage)?, cfg),
                discriminator: MultiStepLr::new(optimizers.get(Role::Discriminator, stage)?, cfg),
            }),
            None => None,
        };
        Ok(())
    }

    fn setup_pyramids(&mut self, stage: usize, batch: &TrainBatch) -> Result<()> {
        let reals = batch.real_scales(stage as i64)?;
        self.stage.set_num_scales(reals.len())?;
        self.reals.set(reals)?;
        if self.fixed_noises.is_empty() {
            self.fixed_noises = FixedNoisePyramid::construct(&self.reals);
        }
        info!(
            "Real pyramid with {} scales, finest {:?}",
            self.reals.len(),
            self.reals.spatial_size(self.reals.len() - 1)
        );
        Ok(())
    }

    fn real_at(&self, stage: usize) -> Result<&Tensor> {
        self.reals
            .get(stage)
            .ok_or_else(|| SinGanError::state(format!("no real image for stage {}", stage)))
    }

    /// Discriminator and generator updates of one tick
    fn train_gan(
        &mut self,
        curr_iter: usize,
        stage: usize,
        input_sample: Option<&Tensor>,
        optimizers: &mut OptimizerSet,
    ) -> Result<LogVars> {
        let disc_accu_iters = optimizers
            .get(Role::Discriminator, stage)?
            .accumulative_counts();
        let mut log_vars = self.train_discriminator(
            stage,
            input_sample,
            optimizers.get_mut(Role::Discriminator, stage)?,
        )?;

        if (curr_iter + 1) % (self.config.discriminator_steps * disc_accu_iters) == 0 {
            let gen_optimizer = optimizers.get_mut(Role::Generator, stage)?;
            let rounds = self.config.generator_steps * gen_optimizer.accumulative_counts();

            self.discriminator.unwrap_module_mut().set_requires_grad(false);
            let result = self.run_generator_rounds(stage, input_sample, gen_optimizer, rounds);
            self.discriminator.unwrap_module_mut().set_requires_grad(true);

            let mut gen_log_vars = result?;
            gen_log_vars.remove(TOTAL_LOSS_KEY);
            self.update_ema(curr_iter, disc_accu_iters)?;
            log_vars.extend(gen_log_vars);
        }

        Ok(log_vars)
    }

    fn run_generator_rounds(
        &self,
        stage: usize,
        input_sample: Option<&Tensor>,
        optimizer: &mut StageOptimizer,
        rounds: usize,
    ) -> Result<LogVars> {
        optimizer.initialize_count_status(0, rounds);
        let mut round_logs = Vec::with_capacity(rounds);
        for _ in 0..rounds {
            round_logs.push(self.train_generator(stage, input_sample, optimizer)?);
        }
        Ok(gather_log_vars(&round_logs))
    }

    /// One WGAN-GP update of the discriminator at `stage`
    fn train_discriminator(
        &self,
        stage: usize,
        input_sample: Option<&Tensor>,
        optimizer: &mut StageOptimizer,
    ) -> Result<LogVars> {
        self.noise_weights.ensure_covers(stage)?;
        let generator = self.generator.unwrap_module();
        let discriminator = self.discriminator.unwrap_module();

        let request =
            self.generate_request(input_sample, &self.fixed_noises, NoiseMode::Rand, stage, false);
        let fake_imgs = tch::no_grad(|| generator.generate(&request).into_fake_img());
        let real_imgs = self.real_at(stage)?;

        let disc_pred_fake = discriminator.score(&fake_imgs, stage);
        let disc_pred_real = discriminator.score(real_imgs, stage);
        let gp = gradient_penalty(|x| discriminator.score(x, stage), real_imgs, &fake_imgs);

        let (loss, log_vars) = disc_loss(&disc_pred_fake, &disc_pred_real, &gp);
        optimizer.update_params(&loss);
        Ok(log_vars)
    }

    /// One adversarial plus reconstruction update of the generator at `stage`
    fn train_generator(
        &self,
        stage: usize,
        input_sample: Option<&Tensor>,
        optimizer: &mut StageOptimizer,
    ) -> Result<LogVars> {
        self.noise_weights.ensure_covers(stage)?;
        let generator = self.generator.unwrap_module();
        let discriminator = self.discriminator.unwrap_module();

        let rand_request =
            self.generate_request(input_sample, &self.fixed_noises, NoiseMode::Rand, stage, false);
        let fake_imgs = generator.generate(&rand_request).into_fake_img();
        let disc_pred_fake = discriminator.score(&fake_imgs, stage);

        let recon_request =
            self.generate_request(input_sample, &self.fixed_noises, NoiseMode::Recon, stage, false);
        let recon_imgs = generator.generate(&recon_request).into_fake_img();

        let (loss, log_vars) = gen_loss(&disc_pred_fake, &recon_imgs, self.real_at(stage)?);
        optimizer.update_params(&loss);
        Ok(log_vars)
    }

    fn update_ema(&mut self, curr_iter: usize, disc_accu_iters: usize) -> Result<()> {
        let Some(ema) = self.generator_ema.as_mut() else {
            return Ok(());
        };
        let source = self.generator.unwrap_module();
        let start = ema.config().start_iter * self.config.discriminator_steps * disc_accu_iters;

        if curr_iter + 1 >= start {
            ema.update_parameters(source)?;
            if !ema.update_buffers() {
                ema.sync_buffers(source)?;
            }
        } else {
            ema.sync_parameters(source)?;
        }
        Ok(())
    }

    fn calibrate_next_noise_weight(&mut self, stage: usize, input_sample: Option<&Tensor>) -> Result<()> {
        let recon_request =
            self.generate_request(input_sample, &self.fixed_noises, NoiseMode::Recon, stage, false);
        let recon = tch::no_grad(|| {
            self.generator
                .unwrap_module()
                .generate(&recon_request)
                .into_fake_img()
        });
        let next_real = self.real_at(stage + 1)?;
        let weight = calibrate_noise_weight(&recon, next_real, self.config.noise_weight_init);

        self.noise_weights
            .push_for_stage(stage, weight, self.reals.len())?;
        debug!("Noise weights: {:?}", self.noise_weights.as_slice());
        info!("Stage {} noise weight calibrated to {:.6}", stage + 1, weight);
        Ok(())
    }
}
