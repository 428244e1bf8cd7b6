//! Spring-damper models: two-node springs and anchors to kinematics.
//!
//! The primitives are generic over [`Vec`], their Jacobians are expressed in
//! the vector's matrix type. Conventions, for a spring from `x0` to `x1`:
//! forces are the ones acting on `x0`; the force on `x1` is their negation.

use super::{Constraint, ConstraintInput};
use crate::block::{BlockMut, RecordId};
use crate::float::Float;
use crate::kinematic::ParametricPoint;
use crate::mat::{Mat, Mat2};
use crate::vec::{Vec, Vec2};

/// Separations shorter than this are degenerate.
pub const DEGENERATE_LENGTH: f64 = 1e-8;

fn is_degenerate<F: Float>(length: F) -> bool {
    length.is_near_zero(F::from_f64(DEGENERATE_LENGTH))
}

/// Unit direction from `x0` to `x1` and the separation length. The
/// direction is left unnormalized (hence near zero) when degenerate.
fn direction<V: Vec>(x0: V, x1: V) -> (V, V::Scalar) {
    let d = x1 - x0;
    let length = d.length();
    if is_degenerate(length) {
        (d, length)
    } else {
        (d.scale(V::Scalar::one() / length), length)
    }
}

/// Hooke force on `x0`: `k · (|x1 − x0| − rest)` along the separation.
pub fn stretch_force<V: Vec>(x0: V, x1: V, rest: V::Scalar, stiffness: V::Scalar) -> V {
    let (dir, length) = direction(x0, x1);
    dir.scale((length - rest) * stiffness)
}

/// Damping force on `x0`: relative velocity projected on the separation.
pub fn damping_force<V: Vec>(x0: V, x1: V, v0: V, v1: V, damping: V::Scalar) -> V {
    let (dir, _) = direction(x0, x1);
    dir.scale((v1 - v0).dot(dir) * damping)
}

/// `∂f/∂x0` of [`stretch_force`]. Degenerate separations fall back to the
/// isotropic `−k·I`.
pub fn stretch_jacobian<V: Vec>(x0: V, x1: V, rest: V::Scalar, stiffness: V::Scalar) -> V::Matrix {
    let d = x0 - x1;
    let length = d.length();
    let identity = V::Matrix::identity();
    if is_degenerate(length) {
        return identity.scale(-stiffness);
    }
    let dir = d.scale(V::Scalar::one() / length);
    let a = dir.outer(dir);
    ((identity - a).scale(V::Scalar::one() - rest / length) + a).scale(-stiffness)
}

/// `∂f/∂v0` of [`damping_force`]; zero when degenerate.
pub fn damping_jacobian<V: Vec>(x0: V, x1: V, _v0: V, _v1: V, damping: V::Scalar) -> V::Matrix {
    let d = x1 - x0;
    let length = d.length();
    if is_degenerate(length) {
        return V::Matrix::zero();
    }
    let dir = d.scale(V::Scalar::one() / length);
    dir.outer(dir).scale(-damping)
}

/// `½·k·(|x1 − x0| − rest)²`.
pub fn elastic_energy<V: Vec>(x0: V, x1: V, rest: V::Scalar, stiffness: V::Scalar) -> V::Scalar {
    let stretch = x0.distance(x1) - rest;
    V::Scalar::half() * stiffness * stretch * stretch
}

crate::block_record! {
    /// Spring between two nodes.
    pub struct Spring in SpringColumns {
        pub stiffness: f64 = 1.0,
        pub damping: f64 = 0.0,
        pub rest_length: f64 = 0.0,
        pub node_ids: [RecordId; 2] = [RecordId::NONE; 2],
        pub f: [Vec2<f64>; 2] = [Vec2::zero(); 2],
        pub dfdx: [[Mat2<f64>; 2]; 2] = [[Mat2::zero(); 2]; 2],
        pub dfdv: [[Mat2<f64>; 2]; 2] = [[Mat2::zero(); 2]; 2],
    }
}

impl Spring {
    /// A spring at rest in the current configuration.
    pub fn between(node_ids: [RecordId; 2], x0: Vec2<f64>, x1: Vec2<f64>, stiffness: f64, damping: f64) -> Self {
        Spring {
            stiffness,
            damping,
            rest_length: x0.distance(x1),
            node_ids,
            ..Spring::default()
        }
    }
}

impl Constraint for Spring {
    const KIND: &'static str = "spring";

    fn compute_forces(block: BlockMut<'_, Self>, input: &ConstraintInput<'_>) {
        let len = block.len();
        let d = block.data;
        for i in 0..len {
            let [a, b] = d.node_ids[i];
            let (Some((x0, v0)), Some((x1, v1))) = (input.node_state(a), input.node_state(b)) else {
                d.f[i] = [Vec2::zero(); 2];
                continue;
            };
            let force = stretch_force(x0, x1, d.rest_length[i], d.stiffness[i])
                + damping_force(x0, x1, v0, v1, d.damping[i]);
            d.f[i] = [force, -force];
        }
    }

    fn compute_jacobians(block: BlockMut<'_, Self>, input: &ConstraintInput<'_>) {
        let len = block.len();
        let d = block.data;
        for i in 0..len {
            let [a, b] = d.node_ids[i];
            let (Some((x0, v0)), Some((x1, v1))) = (input.node_state(a), input.node_state(b)) else {
                d.dfdx[i] = [[Mat2::zero(); 2]; 2];
                d.dfdv[i] = [[Mat2::zero(); 2]; 2];
                continue;
            };
            let dfdx = stretch_jacobian(x0, x1, d.rest_length[i], d.stiffness[i]);
            let dfdv = damping_jacobian(x0, x1, v0, v1, d.damping[i]);
            d.dfdx[i] = [[dfdx, -dfdx], [-dfdx, dfdx]];
            d.dfdv[i] = [[dfdv, -dfdv], [-dfdv, dfdv]];
        }
    }

    fn visit_forces(columns: &SpringColumns, slot: usize, visit: &mut dyn FnMut(RecordId, Vec2<f64>)) {
        for (id, force) in columns.node_ids[slot].iter().zip(columns.f[slot].iter()) {
            visit(*id, *force);
        }
    }
}

crate::block_record! {
    /// Spring between a node and a point on a kinematic's surface.
    pub struct AnchorSpring in AnchorSpringColumns {
        pub stiffness: f64 = 1.0,
        pub damping: f64 = 0.0,
        pub rest_length: f64 = 0.0,
        pub node_ids: [RecordId; 1] = [RecordId::NONE],
        pub kinematic_index: u32 = 0,
        pub kinematic_component_index: u32 = 0,
        pub kinematic_component_param: f64 = 0.0,
        pub f: Vec2<f64> = Vec2::zero(),
        pub dfdx: Mat2<f64> = Mat2::zero(),
        pub dfdv: Mat2<f64> = Mat2::zero(),
    }
}

impl AnchorSpring {
    /// An anchor from `node` (currently at `x`) to `point` on the
    /// kinematic at `kinematic_index`, whose world position is `target`.
    pub fn to_point(
        node_id: RecordId,
        x: Vec2<f64>,
        kinematic_index: u32,
        point: ParametricPoint,
        target: Vec2<f64>,
        stiffness: f64,
        damping: f64,
    ) -> Self {
        AnchorSpring {
            stiffness,
            damping,
            rest_length: target.distance(x),
            node_ids: [node_id],
            kinematic_index,
            kinematic_component_index: point.index,
            kinematic_component_param: point.t,
            ..AnchorSpring::default()
        }
    }

    fn target(d: &AnchorSpringColumns, i: usize, input: &ConstraintInput<'_>) -> Option<(Vec2<f64>, Vec2<f64>)> {
        let kinematic = input.kinematic(d.kinematic_index[i])?;
        let point = ParametricPoint {
            index: d.kinematic_component_index[i],
            t: d.kinematic_component_param[i],
        };
        Some((kinematic.position_at(point)?, kinematic.state.linear_velocity))
    }
}

impl Constraint for AnchorSpring {
    const KIND: &'static str = "anchor_spring";

    fn compute_forces(block: BlockMut<'_, Self>, input: &ConstraintInput<'_>) {
        let len = block.len();
        let d = block.data;
        for i in 0..len {
            let state = input.node_state(d.node_ids[i][0]);
            let target = Self::target(d, i, input);
            let (Some((x, v)), Some((target_x, target_v))) = (state, target) else {
                d.f[i] = Vec2::zero();
                continue;
            };
            d.f[i] = stretch_force(x, target_x, d.rest_length[i], d.stiffness[i])
                + damping_force(x, target_x, v, target_v, d.damping[i]);
        }
    }

    fn compute_jacobians(block: BlockMut<'_, Self>, input: &ConstraintInput<'_>) {
        let len = block.len();
        let d = block.data;
        for i in 0..len {
            let state = input.node_state(d.node_ids[i][0]);
            let target = Self::target(d, i, input);
            let (Some((x, v)), Some((target_x, target_v))) = (state, target) else {
                d.dfdx[i] = Mat2::zero();
                d.dfdv[i] = Mat2::zero();
                continue;
            };
            d.dfdx[i] = stretch_jacobian(x, target_x, d.rest_length[i], d.stiffness[i]);
            d.dfdv[i] = damping_jacobian(x, target_x, v, target_v, d.damping[i]);
        }
    }

    fn visit_forces(columns: &AnchorSpringColumns, slot: usize, visit: &mut dyn FnMut(RecordId, Vec2<f64>)) {
        visit(columns.node_ids[slot][0], columns.f[slot]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vec::Vec3;

    #[test]
    fn stretched_spring_pulls_together() {
        let f = stretch_force(Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), 0.5, 10.0);
        assert!((f.x - 5.0).abs() < 1e-12);
        assert!(f.y.abs() < 1e-12);
    }

    #[test]
    fn compressed_spring_pushes_apart() {
        let f = stretch_force(Vec2::new(0.0, 0.0), Vec2::new(0.25, 0.0), 0.5, 4.0);
        assert!((f.x + 1.0).abs() < 1e-12);
    }

    #[test]
    fn degenerate_spring_is_finite() {
        let x = Vec2::new(1.0, 1.0);
        let f = stretch_force(x, x, 0.5, 10.0);
        assert_eq!(f, Vec2::zero());
        let j = stretch_jacobian(x, x, 0.5, 10.0);
        assert_eq!(j, Mat2::identity().scale(-10.0));
        assert_eq!(damping_jacobian(x, x, Vec2::zero(), Vec2::zero(), 3.0), Mat2::zero());
    }

    #[test]
    fn damping_opposes_separation_speed() {
        let f = damping_force(
            Vec2::new(0.0, 0.0),
            Vec2::new(2.0, 0.0),
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 5.0),
            0.5,
        );
        assert!((f.x - 0.5).abs() < 1e-12);
        assert!(f.y.abs() < 1e-12);
    }

    #[test]
    fn jacobian_along_axis() {
        // Along x, the axial term is −k and the transverse term −k(1 − rest/len).
        let j = stretch_jacobian(Vec2::new(0.0, 0.0), Vec2::new(2.0, 0.0), 1.0, 10.0);
        assert!((j.m[0][0] + 10.0).abs() < 1e-12);
        assert!((j.m[1][1] + 5.0).abs() < 1e-12);
        assert!(j.m[0][1].abs() < 1e-12);
    }

    #[test]
    fn jacobian_matches_finite_difference() {
        let x0 = Vec2::new(0.1, -0.3);
        let x1 = Vec2::new(1.2, 0.4);
        let h = 1e-6;
        let j = stretch_jacobian(x0, x1, 0.7, 3.0);
        for axis in 0..2 {
            let mut plus = x0;
            let mut minus = x0;
            plus.set(axis, x0.get(axis) + h);
            minus.set(axis, x0.get(axis) - h);
            let column = (stretch_force(plus, x1, 0.7, 3.0) - stretch_force(minus, x1, 0.7, 3.0)).scale(0.5 / h);
            assert!((j.m[0][axis] - column.x).abs() < 1e-6);
            assert!((j.m[1][axis] - column.y).abs() < 1e-6);
        }
    }

    #[test]
    fn three_dimensional_primitives() {
        let f = stretch_force(Vec3::new(0.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 3.0), 1.0, 2.0);
        assert!((f.z - 4.0).abs() < 1e-12);
        let j = stretch_jacobian(Vec3::new(0.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 3.0), 3.0, 2.0);
        assert!((j.m[2][2] + 2.0).abs() < 1e-12);
        assert!(j.m[0][0].abs() < 1e-12);
    }

    #[test]
    fn energy_at_rest_is_zero() {
        let e = elastic_energy(Vec2::new(0.0, 0.0), Vec2::new(0.0, 2.0), 2.0, 7.0);
        assert!(e.abs() < 1e-12);
        let e = elastic_energy(Vec2::new(0.0, 0.0), Vec2::new(0.0, 3.0), 2.0, 7.0);
        assert!((e - 3.5).abs() < 1e-12);
    }
}
