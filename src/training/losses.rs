//! Loss functions for SinGAN training
//!
//! The generator uses the WGAN adversarial term plus a weighted
//! reconstruction MSE; the discriminator uses WGAN-GP.

use tch::{Kind, Reduction, Tensor};

use super::log_vars::{parse_losses, LogVars};

/// Weight of the reconstruction MSE in the generator loss
pub const RECON_LOSS_WEIGHT: f64 = 10.0;

/// Weight of the gradient penalty in the discriminator loss
pub const GP_LOSS_WEIGHT: f64 = 0.1;

/// Generator loss: `-E[D(G(z))] + 10 * mse(G_recon, x)`
///
/// # Arguments
///
/// * `disc_pred_fake` - Discriminator scores of randomly generated images
/// * `recon_imgs` - Reconstruction generated from the fixed noise pyramid
/// * `real` - Real image at the current stage
pub fn gen_loss(disc_pred_fake: &Tensor, recon_imgs: &Tensor, real: &Tensor) -> (Tensor, LogVars) {
    let loss_gen = -disc_pred_fake.mean(Kind::Float);
    let loss_mse = recon_imgs.mse_loss(real, Reduction::Mean) * RECON_LOSS_WEIGHT;
    parse_losses(vec![("loss_gen", loss_gen), ("loss_mse", loss_mse)])
}

/// Discriminator loss from its terms: `E[D(G(z))] - E[D(x)] + 0.1 * gp`
pub fn disc_loss(
    disc_pred_fake: &Tensor,
    disc_pred_real: &Tensor,
    gradient_penalty: &Tensor,
) -> (Tensor, LogVars) {
    parse_losses(vec![
        ("loss_disc_fake", disc_pred_fake.mean(Kind::Float)),
        ("loss_disc_real", -disc_pred_real.mean(Kind::Float)),
        ("loss_gp", gradient_penalty * GP_LOSS_WEIGHT),
    ])
}

/// WGAN-GP penalty `mean((||grad D(x_hat)||_2 - 1)^2)`
///
/// `x_hat = alpha * real + (1 - alpha) * fake` with one `alpha ~ U[0, 1]`
/// per sample. The norm is taken over the channel dimension for every
/// pixel. The gradient keeps its graph so the penalty itself can be
/// back-propagated into the discriminator.
pub fn gradient_penalty<F>(score: F, real: &Tensor, fake: &Tensor) -> Tensor
where
    F: Fn(&Tensor) -> Tensor,
{
    let batch_size = real.size()[0];
    let alpha = Tensor::rand([batch_size, 1, 1, 1], (real.kind(), real.device()));

    let interpolates = (&alpha * real.detach() + (alpha.ones_like() - &alpha) * fake.detach())
        .set_requires_grad(true);
    let disc_interpolates = score(&interpolates);

    let gradients = Tensor::run_backward(
        &[disc_interpolates.sum(Kind::Float)],
        &[&interpolates],
        true,
        true,
    );
    let norms = gradients[0].norm_scalaropt_dim(2.0, [1i64].as_slice(), false);
    (norms - 1.0).square().mean(Kind::Float)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::Device;

    fn tensor(values: &[f32]) -> Tensor {
        Tensor::from_slice(values)
    }

    #[test]
    fn test_gen_loss_decomposition() {
        let d = tensor(&[0.5, -1.5]);
        let recon = tensor(&[1.0, 2.0, 3.0, 4.0]).view([1, 1, 2, 2]);
        let target = tensor(&[1.0, 1.0, 1.0, 1.0]).view([1, 1, 2, 2]);

        let (loss, logs) = gen_loss(&d, &recon, &target);

        // -mean(d) = 0.5, mse = (0 + 1 + 4 + 9) / 4 = 3.5
        let expected = 0.5 + 10.0 * 3.5;
        assert!((loss.double_value(&[]) - expected).abs() < 1e-5);
        assert!((logs["loss_gen"] - 0.5).abs() < 1e-6);
        assert!((logs["loss_mse"] - 35.0).abs() < 1e-5);
        assert!((logs["loss"] - expected).abs() < 1e-5);
    }

    #[test]
    fn test_disc_loss_decomposition() {
        let fake = tensor(&[0.2, 0.4]);
        let real = tensor(&[1.0, 3.0]);
        let gp = Tensor::from(2.0f32);

        let (loss, logs) = disc_loss(&fake, &real, &gp);

        let expected = 0.3 - 2.0 + 0.1 * 2.0;
        assert!((loss.double_value(&[]) - expected).abs() < 1e-6);
        assert!((logs["loss_disc_fake"] - 0.3).abs() < 1e-6);
        assert!((logs["loss_disc_real"] + 2.0).abs() < 1e-6);
        assert!((logs["loss_gp"] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_gradient_penalty_of_linear_critic() {
        // D(x) = sum(2 * x) has gradient 2 everywhere; with one channel the
        // pixel norm is 2 and the penalty is (2 - 1)^2 = 1.
        let real = Tensor::rand([2, 1, 3, 3], (Kind::Float, Device::Cpu));
        let fake = Tensor::rand([2, 1, 3, 3], (Kind::Float, Device::Cpu));

        let gp = gradient_penalty(|x| (x * 2.0).sum_dim_intlist([1i64, 2, 3].as_slice(), false, Kind::Float), &real, &fake);
        assert!((gp.double_value(&[]) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_gradient_penalty_backpropagates() {
        let w = Tensor::ones([1], (Kind::Float, Device::Cpu)).set_requires_grad(true);
        let real = Tensor::rand([1, 1, 2, 2], (Kind::Float, Device::Cpu));
        let fake = Tensor::rand([1, 1, 2, 2], (Kind::Float, Device::Cpu));

        // D(x) = w * sum(x^2) needs the second derivative to reach w
        let gp = gradient_penalty(
            |x| (x.square() * &w).sum_dim_intlist([1i64, 2, 3].as_slice(), false, Kind::Float),
            &real,
            &fake,
        );
        gp.backward();

        assert!(w.grad().defined());
        assert!(w.grad().abs().sum(Kind::Float).double_value(&[]) > 0.0);
    }
}
