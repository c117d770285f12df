//! Forward-mode tangents agree with reverse-mode gradients.

use approx::assert_relative_eq;
use ndtape::forward::{self, DualStore, diff};
use ndtape::{Store, Tape, Var, c64, ops};
use rand::SeedableRng;
use rand::rngs::StdRng;

/// Inner product of two stores of the same shape.
fn dot<const R: usize>(a: &[f64], b: &Store<f64, R>) -> f64 {
    a.iter().zip(b.as_slice()).map(|(x, y)| x * y).sum()
}

#[test]
fn test_repeated_squaring_matches_tape() {
    let x0 = 1.1_f64;

    let (y, dy) = diff(
        |x| {
            let mut y = x;
            for _ in 0..4 {
                y = y * y;
            }
            y
        },
        x0,
    );

    let mut tape = Tape::<f64>::new();
    let x = tape.variable(Store::scalar(x0).unwrap()).unwrap();
    let mut v: Var<f64, 0> = x.clone();
    for _ in 0..4 {
        v = ops::mul(&mut tape, &v, &v).unwrap();
    }
    tape.complete(&v).unwrap();
    let grads = tape.backward().unwrap();

    assert_relative_eq!(y, v.item(), max_relative = 1e-12);
    assert_relative_eq!(dy, grads.get(&x).unwrap().value(), max_relative = 1e-12);
    assert_relative_eq!(dy, 16.0 * x0.powi(15), max_relative = 1e-12);
}

#[test]
fn test_einsum_jvp_matches_vjp() {
    // f(b, c) = sum_ik (b c)[i,k] w[i,k]
    // along a random direction (db, dc): df = <grad_b, db> + <grad_c, dc>
    let mut rng = StdRng::seed_from_u64(11);
    let b: Store<f64, 2> = Store::random_normal_with_rng([3, 4], &mut rng).unwrap();
    let c: Store<f64, 2> = Store::random_normal_with_rng([4, 2], &mut rng).unwrap();
    let w: Store<f64, 2> = Store::random_normal_with_rng([3, 2], &mut rng).unwrap();
    let db: Store<f64, 2> = Store::random_normal_with_rng([3, 4], &mut rng).unwrap();
    let dc: Store<f64, 2> = Store::random_normal_with_rng([4, 2], &mut rng).unwrap();

    let mut tape = Tape::<f64>::new();
    let vb = tape.variable(b.clone()).unwrap();
    let vc = tape.variable(c.clone()).unwrap();
    let vw = tape.variable(w.clone()).unwrap();
    let prod = ops::einsum(&mut tape, ['i', 'k'], &vb, ['i', 'j'], &vc, ['j', 'k']).unwrap();
    let weighted = ops::mul(&mut tape, &prod, &vw).unwrap();
    let loss = ops::sum(&mut tape, &weighted).unwrap();
    tape.complete(&loss).unwrap();
    let grads = tape.backward().unwrap();
    let vjp = dot(grads.get(&vb).unwrap().as_slice(), &db)
        + dot(grads.get(&vc).unwrap().as_slice(), &dc);

    let fb = DualStore::with_tangent(b, db).unwrap();
    let fc = DualStore::with_tangent(c, dc).unwrap();
    let fw = DualStore::new(w);
    let prod = forward::ops::einsum(['i', 'k'], &fb, ['i', 'j'], &fc, ['j', 'k']).unwrap();
    let weighted = forward::ops::mul(&prod, &fw).unwrap();
    let f = forward::ops::sum(&weighted).unwrap();

    assert_relative_eq!(f.value(), loss.item(), max_relative = 1e-12);
    assert_relative_eq!(f.derivative(), vjp, max_relative = 1e-10);
}

#[test]
fn test_unit_directions_recover_gradient() {
    // Seeding one element at a time rebuilds the reverse-mode gradient.
    let x: Store<f64, 1> = Store::from_vec([3], vec![0.5, -1.0, 2.0]).unwrap();
    let a: Store<f64, 2> =
        Store::from_vec([3, 3], vec![2.0, 1.0, 0.0, 1.0, 3.0, -1.0, 0.0, -1.0, 4.0]).unwrap();

    // quadratic form x^T A x
    let mut tape = Tape::<f64>::new();
    let vx = tape.variable(x.clone()).unwrap();
    let va = tape.variable(a.clone()).unwrap();
    let ax = ops::einsum(&mut tape, ['i'], &va, ['i', 'j'], &vx, ['j']).unwrap();
    let q = ops::einsum(&mut tape, [], &vx, ['i'], &ax, ['i']).unwrap();
    tape.complete(&q).unwrap();
    let grads = tape.backward().unwrap();
    let reverse = grads.get(&vx).unwrap();

    let fa = DualStore::new(a);
    for (i, want) in reverse.as_slice().iter().enumerate() {
        let dx = Store::from_fn([3], |[j]| if i == j { 1.0 } else { 0.0 }).unwrap();
        let fx = DualStore::with_tangent(x.clone(), dx).unwrap();
        let ax = forward::ops::einsum(['i'], &fa, ['i', 'j'], &fx, ['j']).unwrap();
        let q = forward::ops::einsum([], &fx, ['i'], &ax, ['i']).unwrap();
        assert_relative_eq!(q.derivative(), *want, max_relative = 1e-12);
    }
}

#[test]
fn test_complex_forward_matches_tape() {
    // f(z) = sum_i z_i z_i, holomorphic: df/dz = 2 z
    let z = Store::from_vec([2], vec![c64::new(1.0, 1.0), c64::new(0.5, -2.0)]).unwrap();
    let dz = Store::from_vec([2], vec![c64::new(1.0, 0.0), c64::new(0.0, 1.0)]).unwrap();

    let mut tape = Tape::<c64>::new();
    let vz = tape.variable(z.clone()).unwrap();
    let f = ops::einsum(&mut tape, [], &vz, ['i'], &vz, ['i']).unwrap();
    tape.complete(&f).unwrap();
    let grads = tape.backward().unwrap();
    let g = grads.get(&vz).unwrap();
    let vjp = g.as_slice().iter().zip(dz.as_slice()).fold(c64::new(0.0, 0.0), |acc, (a, b)| {
        acc + a * b
    });

    let fz = DualStore::with_tangent(z, dz).unwrap();
    let jvp = forward::ops::einsum([], &fz, ['i'], &fz, ['i']).unwrap();
    assert_relative_eq!(jvp.derivative().re, vjp.re, epsilon = 1e-12);
    assert_relative_eq!(jvp.derivative().im, vjp.im, epsilon = 1e-12);
}
