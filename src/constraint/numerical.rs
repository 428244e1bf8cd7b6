//! Central finite differences for constraints defined by an energy.

use crate::mat::{Mat, Mat2};
use crate::vec::{Vec, Vec2};

/// Perturbation used for every difference quotient.
pub const STENCIL: f64 = 1e-6;

/// Forces `−∂E/∂xᵢ` of an energy over `N` points.
pub fn forces_from_energy<const N: usize>(
    positions: [Vec2<f64>; N],
    energy: impl Fn(&[Vec2<f64>; N]) -> f64,
) -> [Vec2<f64>; N] {
    let mut forces = [Vec2::zero(); N];
    for (i, force) in forces.iter_mut().enumerate() {
        for axis in 0..2 {
            let (plus, minus) = perturb(positions, i, axis);
            force.set(axis, -(energy(&plus) - energy(&minus)) / (2.0 * STENCIL));
        }
    }
    forces
}

/// Jacobian blocks `∂fᵢ/∂xⱼ` of a force function over `N` points.
pub fn jacobians_from_forces<const N: usize>(
    positions: [Vec2<f64>; N],
    forces: impl Fn(&[Vec2<f64>; N]) -> [Vec2<f64>; N],
) -> [[Mat2<f64>; N]; N] {
    let mut columns = [[[Vec2::zero(); 2]; N]; N];
    for j in 0..N {
        for axis in 0..2 {
            let (plus, minus) = perturb(positions, j, axis);
            let (f_plus, f_minus) = (forces(&plus), forces(&minus));
            for i in 0..N {
                columns[i][j][axis] = (f_plus[i] - f_minus[i]).scale(1.0 / (2.0 * STENCIL));
            }
        }
    }
    columns.map(|row| row.map(|c| Mat2::from_columns(&c)))
}

fn perturb<const N: usize>(
    positions: [Vec2<f64>; N],
    index: usize,
    axis: usize,
) -> ([Vec2<f64>; N], [Vec2<f64>; N]) {
    let (mut plus, mut minus) = (positions, positions);
    let value = positions[index].get(axis);
    plus[index].set(axis, value + STENCIL);
    minus[index].set(axis, value - STENCIL);
    (plus, minus)
}
