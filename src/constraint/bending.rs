//! Wire bending: resists changes of the angle at a middle node.

use super::numerical::{forces_from_energy, jacobians_from_forces};
use super::{Constraint, ConstraintInput};
use crate::block::{BlockMut, RecordId};
use crate::mat::{Mat, Mat2};
use crate::vec::{Vec, Vec2};

/// Signed angle between segments `x0 → x1` and `x1 → x2`, in `[−π, π]`.
pub fn angle(x0: Vec2<f64>, x1: Vec2<f64>, x2: Vec2<f64>) -> f64 {
    let u = x0 - x1;
    let v = x1 - x2;
    libm::atan2(u.cross(v), u.dot(v))
}

/// `½·k·(angle − rest)²`.
pub fn energy(x: &[Vec2<f64>; 3], rest_angle: f64, stiffness: f64) -> f64 {
    let delta = angle(x[0], x[1], x[2]) - rest_angle;
    0.5 * stiffness * delta * delta
}

/// Per-node bending forces.
pub fn forces(x: [Vec2<f64>; 3], rest_angle: f64, stiffness: f64) -> [Vec2<f64>; 3] {
    forces_from_energy(x, |p| energy(p, rest_angle, stiffness))
}

crate::block_record! {
    /// Bending constraint over three consecutive wire nodes.
    pub struct Bending in BendingColumns {
        pub stiffness: f64 = 1.0,
        /// Carried with the condition but not applied: forces depend on
        /// positions only and `dfdv` stays zero.
        pub damping: f64 = 0.0,
        pub rest_angle: f64 = 0.0,
        pub node_ids: [RecordId; 3] = [RecordId::NONE; 3],
        pub f: [Vec2<f64>; 3] = [Vec2::zero(); 3],
        pub dfdx: [[Mat2<f64>; 3]; 3] = [[Mat2::zero(); 3]; 3],
        pub dfdv: [[Mat2<f64>; 3]; 3] = [[Mat2::zero(); 3]; 3],
    }
}

impl Bending {
    /// A bending constraint at rest in the current configuration.
    pub fn at_rest(node_ids: [RecordId; 3], x: [Vec2<f64>; 3], stiffness: f64, damping: f64) -> Self {
        Bending {
            stiffness,
            damping,
            rest_angle: angle(x[0], x[1], x[2]),
            node_ids,
            ..Bending::default()
        }
    }
}

impl Constraint for Bending {
    const KIND: &'static str = "bending";

    fn compute_forces(block: BlockMut<'_, Self>, input: &ConstraintInput<'_>) {
        let len = block.len();
        let d = block.data;
        for i in 0..len {
            d.f[i] = match input.node_positions(&d.node_ids[i]) {
                Some(x) => forces(x, d.rest_angle[i], d.stiffness[i]),
                None => [Vec2::zero(); 3],
            };
        }
    }

    fn compute_jacobians(block: BlockMut<'_, Self>, input: &ConstraintInput<'_>) {
        let len = block.len();
        let d = block.data;
        for i in 0..len {
            let (rest, k) = (d.rest_angle[i], d.stiffness[i]);
            d.dfdx[i] = match input.node_positions(&d.node_ids[i]) {
                Some(x) => jacobians_from_forces(x, |p| forces(*p, rest, k)),
                None => [[Mat2::zero(); 3]; 3],
            };
            // Velocity independent.
            d.dfdv[i] = [[Mat2::zero(); 3]; 3];
        }
    }

    fn visit_forces(columns: &BendingColumns, slot: usize, visit: &mut dyn FnMut(RecordId, Vec2<f64>)) {
        for (id, force) in columns.node_ids[slot].iter().zip(columns.f[slot].iter()) {
            visit(*id, *force);
        }
    }
}
