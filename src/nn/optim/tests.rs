use super::*;
use crate::primitives::Tensor;

fn param(values: &[f32]) -> Parameter {
    Parameter::new(Tensor::new(values.to_vec(), &[values.len()]).expect("1-d"))
}

/// Sets grad = d/dx(x²) = 2x.
fn square_grad(p: &mut Parameter) {
    let grad: Vec<f32> = p.value.data().iter().map(|x| 2.0 * x).collect();
    p.grad = Tensor::new(grad, p.value.shape()).expect("same shape");
}

#[test]
fn test_adam_first_step_moves_by_lr() {
    let mut p = param(&[1.0, -2.0, 3.0]);
    square_grad(&mut p);
    let mut adam = Adam::new(0.1);
    adam.step(&mut [&mut p]);

    // bias-corrected first step is lr * sign(g)
    let expected = [0.9, -1.9, 2.9];
    for (v, e) in p.value.data().iter().zip(expected) {
        assert!((v - e).abs() < 1e-4, "expected {e}, got {v}");
    }
    assert_eq!(adam.t, 1);
}

#[test]
fn test_adam_minimizes_quadratic() {
    let mut p = param(&[1.0, -2.0]);
    let mut adam = Adam::new(0.05);
    for _ in 0..500 {
        square_grad(&mut p);
        adam.step(&mut [&mut p]);
    }
    assert!(p.value.data().iter().all(|v| v.abs() < 0.1));
}

#[test]
fn test_adam_skips_frozen_parameters() {
    let mut frozen = param(&[1.0]);
    frozen.requires_grad = false;
    frozen.grad = Tensor::new(vec![5.0], &[1]).expect("1");
    let mut live = param(&[1.0]);
    square_grad(&mut live);

    let mut adam = Adam::new(0.1);
    adam.step(&mut [&mut frozen, &mut live]);
    assert_eq!(frozen.value.data(), &[1.0]);
    assert!(live.value.data()[0] < 1.0);
}

#[test]
fn test_adam_weight_decay_pulls_toward_zero() {
    let mut p = param(&[1.0]);
    let mut adam = Adam::new(0.1).weight_decay(0.5).betas(0.9, 0.999).eps(1e-8);
    adam.step(&mut [&mut p]);
    assert!(p.value.data()[0] < 1.0);
}

#[test]
fn test_set_lr() {
    let mut adam = Adam::new(1e-4);
    adam.set_lr(1e-5);
    assert!((adam.lr() - 1e-5).abs() < 1e-12);
}
