use super::*;
use crate::nn::{Linear, ReLU, Sequential};
use crate::primitives::Tensor;
use crate::transfer::{BackboneKind, ConvNet};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Two well-separated 2-D blobs; label = blob.
struct Blobs {
    points: Vec<([f32; 2], usize)>,
}

impl Blobs {
    fn new(n: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let points = (0..n)
            .map(|i| {
                let label = i % 2;
                let center = if label == 0 { -2.0 } else { 2.0 };
                let p = [
                    center + rng.gen_range(-0.5..0.5),
                    center + rng.gen_range(-0.5..0.5),
                ];
                (p, label)
            })
            .collect();
        Self { points }
    }
}

impl Dataset for Blobs {
    fn len(&self) -> usize {
        self.points.len()
    }

    fn get(&self, index: usize, _rng: &mut StdRng) -> Result<(Tensor, usize)> {
        let (p, label) = self.points[index];
        Ok((Tensor::new(p.to_vec(), &[2])?, label))
    }
}

/// Constant-color images: class 0 dark, class 1 bright.
struct Shades {
    n: usize,
    side: usize,
}

impl Dataset for Shades {
    fn len(&self) -> usize {
        self.n
    }

    fn get(&self, index: usize, _rng: &mut StdRng) -> Result<(Tensor, usize)> {
        let label = index % 2;
        let value = if label == 0 { -1.0 } else { 1.0 };
        Ok((Tensor::from_fn(&[3, self.side, self.side], || value), label))
    }
}

fn mlp(seed: u64) -> Sequential {
    let mut rng = StdRng::seed_from_u64(seed);
    Sequential::new()
        .add(Linear::new(2, 8, &mut rng))
        .add(ReLU::new())
        .add(Linear::new(8, 2, &mut rng))
}

fn options(epochs: usize) -> TrainOptions {
    TrainOptions {
        epochs,
        learning_rate: 0.05,
        step_size: 2,
        gamma: 0.1,
    }
}

#[test]
fn test_training_separates_blobs() {
    let train = Blobs::new(40, 1);
    let val = Blobs::new(10, 2);
    let mut model = mlp(0);
    let mut train_loader = DataLoader::new(&train, 8).with_shuffle(true).with_seed(3);
    let mut val_loader = DataLoader::new(&val, 1);

    let history = train_model(&mut model, &mut train_loader, &mut val_loader, &options(4))
        .expect("training succeeds");
    assert_eq!(history.epochs(), 4);
    assert_eq!(history.val.len(), 4);
    assert!(history.train[3].loss < history.train[0].loss);
    assert!(history.best_val_acc >= 0.9, "best acc {}", history.best_val_acc);
}

#[test]
fn test_step_schedule_decays_learning_rate() {
    let train = Blobs::new(8, 1);
    let val = Blobs::new(4, 2);
    let mut model = mlp(0);
    let history = train_model(
        &mut model,
        &mut DataLoader::new(&train, 4),
        &mut DataLoader::new(&val, 4),
        &options(5),
    )
    .expect("training succeeds");
    let lr = &history.learning_rates;
    assert_eq!(lr.len(), 5);
    assert!((lr[0] - 0.05).abs() < 1e-7);
    assert!((lr[1] - 0.05).abs() < 1e-7);
    assert!((lr[2] - 0.005).abs() < 1e-7);
    assert!((lr[4] - 0.0005).abs() < 1e-7);
}

#[test]
fn test_best_weights_are_restored() {
    let train = Blobs::new(20, 4);
    let val = Blobs::new(6, 5);
    let mut model = mlp(9);
    let history = train_model(
        &mut model,
        &mut DataLoader::new(&train, 5),
        &mut DataLoader::new(&val, 1),
        &options(3),
    )
    .expect("training succeeds");

    let best = history
        .val
        .iter()
        .map(|m| m.accuracy)
        .fold(f32::MIN, f32::max);
    assert_eq!(history.best_val_acc, best);
    let best_epoch = history.best_epoch.expect("at least one epoch");
    assert_eq!(history.val[best_epoch].accuracy, best);

    // re-evaluating the restored weights reproduces the best accuracy
    let mut loader = DataLoader::new(&val, 1);
    let mut optimizer = Adam::new(0.1);
    let metrics = run_phase(
        &mut model,
        &mut loader,
        Phase::Validation,
        &CrossEntropyLoss::new(),
        &mut optimizer,
    )
    .expect("evaluation");
    assert_eq!(metrics.accuracy, best);
}

#[test]
fn test_zero_epochs_leaves_weights_untouched() {
    let train = Blobs::new(4, 1);
    let val = Blobs::new(2, 2);
    let mut model = mlp(2);
    let before = snapshot(&model);
    let history = train_model(
        &mut model,
        &mut DataLoader::new(&train, 2),
        &mut DataLoader::new(&val, 1),
        &options(0),
    )
    .expect("nothing to do");
    assert_eq!(history.epochs(), 0);
    assert_eq!(history.best_epoch, None);
    assert_eq!(snapshot(&model), before);
}

#[test]
fn test_invalid_inputs_are_rejected() {
    let data = Blobs::new(4, 1);
    let empty = Blobs::new(0, 1);
    let mut model = mlp(0);
    let bad_lr = TrainOptions {
        learning_rate: 0.0,
        ..options(1)
    };
    assert!(train_model(
        &mut model,
        &mut DataLoader::new(&data, 2),
        &mut DataLoader::new(&data, 2),
        &bad_lr
    )
    .is_err());
    assert!(train_model(
        &mut model,
        &mut DataLoader::new(&data, 2),
        &mut DataLoader::new(&empty, 2),
        &options(1)
    )
    .is_err());
}

#[test]
fn test_restore_rejects_foreign_snapshot() {
    let mut model = mlp(0);
    let mut state = snapshot(&mlp(1));
    state.remove("2.bias");
    assert!(restore(&mut model, &state).is_err());
}

#[test]
fn test_extract_features_rows_follow_loader_order() {
    let ds = Shades { n: 5, side: 16 };
    let mut net = ConvNet::new(BackboneKind::Tiny, 2, 6, Some(0)).expect("valid sizes");
    let (x, y) = extract_features(&mut net, &mut DataLoader::new(&ds, 2)).expect("features");
    assert_eq!(x.shape(), (5, 6));
    assert_eq!(y, vec![0, 1, 0, 1, 0]);
    // identical inputs give identical rows in inference mode
    assert_eq!(x.row(0), x.row(2));
    assert_eq!(x.row(1), x.row(3));
}

#[test]
fn test_get_features_concatenates_train_then_val() {
    let train = Shades { n: 4, side: 16 };
    let val = Shades { n: 3, side: 16 };
    let mut net = ConvNet::new(BackboneKind::Tiny, 2, 4, Some(1)).expect("valid sizes");
    let (x, y) = get_features(
        &mut net,
        &mut DataLoader::new(&train, 3),
        &mut DataLoader::new(&val, 1),
    )
    .expect("features");
    assert_eq!(x.shape(), (7, 4));
    assert_eq!(y, vec![0, 1, 0, 1, 0, 1, 0]);
    assert_eq!(x.row(4), x.row(0));
}

#[test]
fn test_extract_features_from_empty_loader_fails() {
    let ds = Shades { n: 0, side: 16 };
    let mut net = ConvNet::new(BackboneKind::Tiny, 2, 4, Some(1)).expect("valid sizes");
    assert!(extract_features(&mut net, &mut DataLoader::new(&ds, 2)).is_err());
}

#[test]
fn test_convnet_fine_tunes_end_to_end() {
    let train = Shades { n: 6, side: 16 };
    let val = Shades { n: 2, side: 16 };
    let mut net = ConvNet::new(BackboneKind::Tiny, 2, 8, Some(2)).expect("valid sizes");
    net.freeze_base();
    let frozen = snapshot(&net);
    let history = train_model(
        &mut net,
        &mut DataLoader::new(&train, 3).with_shuffle(true).with_seed(0),
        &mut DataLoader::new(&val, 1),
        &TrainOptions {
            epochs: 2,
            learning_rate: 0.01,
            step_size: 5,
            gamma: 0.1,
        },
    )
    .expect("training succeeds");
    assert_eq!(history.epochs(), 2);
    let after = snapshot(&net);
    for (name, value) in &frozen {
        if name.starts_with("features.") {
            assert_eq!(&after[name], value, "{name} changed while frozen");
        }
    }
}
