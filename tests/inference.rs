mod common;

use common::{assert_close, config, session, train, ToyDiscriminator, ToyGenerator, TWO_SCALES};
use rust_singan::{
    EmaConfig, NoiseMode, SampleModel, SampleRequest, SinGan, SinGanError, TestSnapshot,
};
use tch::Device;

fn trained(with_ema: bool) -> common::ToySinGan {
    let mut cfg = config(2, 2);
    if with_ema {
        cfg.ema = Some(EmaConfig::default());
    }
    let (mut model, mut optimizers, batch) = session(cfg, &TWO_SCALES);
    train(&mut model, &mut optimizers, &batch, 4);
    model
}

#[test]
fn test_ema_orig_returns_both_outputs() {
    let model = trained(true);
    let request = SampleRequest::new().with_sample_model(SampleModel::EmaOrig);

    let samples = model.forward(&request).unwrap();
    assert_eq!(samples.len(), 1);

    let sample = &samples[0];
    assert_eq!(sample.sample_model(), SampleModel::EmaOrig);
    let (real_h, real_w) = model.reals().spatial_size(1).unwrap();
    for image in [sample.ema().unwrap(), sample.orig().unwrap()] {
        let size = image.fake_img.size();
        assert_eq!(&size[size.len() - 2..], &[real_h, real_w]);
    }
}

#[test]
fn test_default_sample_model() {
    let with_ema = trained(true);
    let samples = with_ema.forward(&SampleRequest::new()).unwrap();
    assert_eq!(samples[0].sample_model(), SampleModel::Ema);

    let without_ema = trained(false);
    let samples = without_ema.forward(&SampleRequest::new()).unwrap();
    assert_eq!(samples[0].sample_model(), SampleModel::Orig);
}

#[test]
fn test_ema_requested_without_shadow() {
    let model = trained(false);
    for sample_model in [SampleModel::Ema, SampleModel::EmaOrig] {
        let err = model
            .forward(&SampleRequest::new().with_sample_model(sample_model))
            .unwrap_err();
        assert!(matches!(err, SinGanError::Configuration { .. }));
    }
}

#[test]
fn test_num_batches_must_be_one() {
    let model = trained(false);
    let err = model
        .forward(&SampleRequest::new().with_num_batches(2))
        .unwrap_err();
    assert!(matches!(err, SinGanError::Configuration { stage: 1, .. }));
}

#[test]
fn test_untrained_sampling_is_state_error() {
    let (model, _, _) = session(config(2, 2), &TWO_SCALES);
    let err = model.forward(&SampleRequest::new()).unwrap_err();
    assert!(matches!(err, SinGanError::State(_)));
}

#[test]
fn test_recon_is_deterministic_at_coarser_scale() {
    let model = trained(false);
    let request = SampleRequest::new()
        .with_mode(NoiseMode::Recon)
        .with_curr_scale(0)
        .with_prev_res();

    let a = model.forward(&request).unwrap();
    let b = model.forward(&request).unwrap();
    let (a, b) = (a[0].orig().unwrap(), b[0].orig().unwrap());

    assert_eq!(a.fake_img.size(), vec![3, 6, 6]);
    assert!(a.prev_res_list.is_empty());
    assert_close(&a.fake_img, &b.fake_img, 0.0);
}

#[test]
fn test_prev_res_list_per_sample() {
    let model = trained(false);
    let samples = model
        .forward(&SampleRequest::new().with_prev_res())
        .unwrap();
    let image = samples[0].orig().unwrap();

    assert_eq!(image.prev_res_list.len(), 1);
    assert_eq!(image.prev_res_list[0].size(), vec![3, 6, 6]);
}

#[test]
fn test_snapshot_loaded_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.json");
    let source = trained(false);
    TestSnapshot::capture(&source).unwrap().save(&path).unwrap();

    let mut cfg = config(2, 2);
    cfg.test_snapshot = Some(path.clone());
    let mut model = SinGan::new(ToyGenerator::new(2), ToyDiscriminator::new(2), cfg, Device::Cpu).unwrap();
    assert!(!model.is_snapshot_loaded());

    let request = SampleRequest::new().with_mode(NoiseMode::Recon);
    model.test_step(SampleRequest::new().with_mode(NoiseMode::Recon)).unwrap();
    assert!(model.is_snapshot_loaded());
    assert_eq!(model.curr_stage(), Some(1));
    assert_eq!(model.noise_weights(), source.noise_weights());
    assert_close(
        model.fixed_noises().get(0).unwrap(),
        source.fixed_noises().get(0).unwrap(),
        0.0,
    );

    // Later calls never read the file again
    std::fs::remove_file(&path).unwrap();
    let samples = model.test_step(request).unwrap();
    assert_eq!(samples.len(), 1);
}

#[test]
fn test_test_step_without_snapshot_uses_session_state() {
    let mut model = trained(false);
    let samples = model.test_step(SampleRequest::new()).unwrap();

    assert_eq!(samples.len(), 1);
    assert!(!model.is_snapshot_loaded());
}

#[test]
fn test_malformed_snapshot_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.json");
    std::fs::write(
        &path,
        r#"{"fixed_noises":[{"shape":[1,1,4,4],"data":[0.5,-0.5]}],"noise_weights":[1.0],"curr_stage":0}"#,
    )
    .unwrap();

    let mut cfg = config(2, 2);
    cfg.test_snapshot = Some(path);
    let mut model = SinGan::new(ToyGenerator::new(2), ToyDiscriminator::new(2), cfg, Device::Cpu).unwrap();

    let err = model.test_step(SampleRequest::new()).unwrap_err();
    assert!(matches!(err, SinGanError::State(_)));
    assert!(!model.is_snapshot_loaded());
    assert_eq!(model.curr_stage(), None);
}
