//! Finite-difference gradient checks shared by layer tests.

use super::module::Module;
use crate::primitives::Tensor;

const EPS: f32 = 1e-2;

/// Fixed, non-symmetric upstream gradient for a loss `sum(y * r)`.
fn probe(shape: &[usize]) -> Tensor {
    let mut i = 0usize;
    Tensor::from_fn(shape, || {
        i += 1;
        ((i * 37) % 11) as f32 / 11.0 - 0.5
    })
}

fn loss<M: Module>(layer: &mut M, x: &Tensor, r: &Tensor) -> f32 {
    let y = layer.forward(x).expect("forward");
    y.data().iter().zip(r.data()).map(|(a, b)| a * b).sum()
}

/// Asserts `backward` matches central differences with respect to the input.
pub(crate) fn check_input_grad<M: Module>(layer: &mut M, x: &Tensor, tol: f32) {
    let y = layer.forward(x).expect("forward");
    let r = probe(y.shape());
    let analytic = layer.backward(&r).expect("backward");
    assert_eq!(analytic.shape(), x.shape());

    for idx in 0..x.numel() {
        let mut xp = x.clone();
        xp.data_mut()[idx] += EPS;
        let mut xm = x.clone();
        xm.data_mut()[idx] -= EPS;
        let numeric = (loss(layer, &xp, &r) - loss(layer, &xm, &r)) / (2.0 * EPS);
        let got = analytic.data()[idx];
        assert!(
            (numeric - got).abs() < tol,
            "input grad {idx}: numeric {numeric} vs analytic {got}"
        );
    }
}

/// Asserts accumulated gradients of parameter `which` match central differences.
pub(crate) fn check_param_grad<M: Module>(layer: &mut M, x: &Tensor, which: usize, tol: f32) {
    layer.zero_grad();
    let y = layer.forward(x).expect("forward");
    let r = probe(y.shape());
    layer.backward(&r).expect("backward");
    let analytic = layer.parameters_mut()[which].grad.clone();

    for idx in 0..analytic.numel() {
        layer.parameters_mut()[which].value.data_mut()[idx] += EPS;
        let lp = loss(layer, x, &r);
        layer.parameters_mut()[which].value.data_mut()[idx] -= 2.0 * EPS;
        let lm = loss(layer, x, &r);
        layer.parameters_mut()[which].value.data_mut()[idx] += EPS;

        let numeric = (lp - lm) / (2.0 * EPS);
        let got = analytic.data()[idx];
        assert!(
            (numeric - got).abs() < tol,
            "param {which} grad {idx}: numeric {numeric} vs analytic {got}"
        );
    }
}
