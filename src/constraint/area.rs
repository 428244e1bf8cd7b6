//! Triangle area preservation.

use super::numerical::{forces_from_energy, jacobians_from_forces};
use super::{Constraint, ConstraintInput};
use crate::block::{BlockMut, RecordId};
use crate::float::Float;
use crate::mat::{Mat, Mat2};
use crate::vec::{Vec, Vec2};

/// Unsigned area of the triangle `x0 x1 x2`.
pub fn area(x0: Vec2<f64>, x1: Vec2<f64>, x2: Vec2<f64>) -> f64 {
    Float::abs((x1 - x0).cross(x2 - x0)) * 0.5
}

/// `½·k·(area − rest)²`.
pub fn energy(x: &[Vec2<f64>; 3], rest_area: f64, stiffness: f64) -> f64 {
    let delta = area(x[0], x[1], x[2]) - rest_area;
    0.5 * stiffness * delta * delta
}

/// Per-node area forces.
pub fn forces(x: [Vec2<f64>; 3], rest_area: f64, stiffness: f64) -> [Vec2<f64>; 3] {
    forces_from_energy(x, |p| energy(p, rest_area, stiffness))
}

crate::block_record! {
    /// Area constraint over a triangle of nodes.
    pub struct Area in AreaColumns {
        pub stiffness: f64 = 1.0,
        /// Carried with the condition but not applied: forces depend on
        /// positions only and `dfdv` stays zero.
        pub damping: f64 = 0.0,
        pub rest_area: f64 = 0.0,
        pub node_ids: [RecordId; 3] = [RecordId::NONE; 3],
        pub f: [Vec2<f64>; 3] = [Vec2::zero(); 3],
        pub dfdx: [[Mat2<f64>; 3]; 3] = [[Mat2::zero(); 3]; 3],
        pub dfdv: [[Mat2<f64>; 3]; 3] = [[Mat2::zero(); 3]; 3],
    }
}

impl Area {
    /// An area constraint at rest in the current configuration.
    pub fn at_rest(node_ids: [RecordId; 3], x: [Vec2<f64>; 3], stiffness: f64, damping: f64) -> Self {
        Area {
            stiffness,
            damping,
            rest_area: area(x[0], x[1], x[2]),
            node_ids,
            ..Area::default()
        }
    }
}

impl Constraint for Area {
    const KIND: &'static str = "area";

    fn compute_forces(block: BlockMut<'_, Self>, input: &ConstraintInput<'_>) {
        let len = block.len();
        let d = block.data;
        for i in 0..len {
            d.f[i] = match input.node_positions(&d.node_ids[i]) {
                Some(x) => forces(x, d.rest_area[i], d.stiffness[i]),
                None => [Vec2::zero(); 3],
            };
        }
    }

    fn compute_jacobians(block: BlockMut<'_, Self>, input: &ConstraintInput<'_>) {
        let len = block.len();
        let d = block.data;
        for i in 0..len {
            let (rest, k) = (d.rest_area[i], d.stiffness[i]);
            d.dfdx[i] = match input.node_positions(&d.node_ids[i]) {
                Some(x) => jacobians_from_forces(x, |p| forces(*p, rest, k)),
                None => [[Mat2::zero(); 3]; 3],
            };
            d.dfdv[i] = [[Mat2::zero(); 3]; 3];
        }
    }

    fn visit_forces(columns: &AreaColumns, slot: usize, visit: &mut dyn FnMut(RecordId, Vec2<f64>)) {
        for (id, force) in columns.node_ids[slot].iter().zip(columns.f[slot].iter()) {
            visit(*id, *force);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_triangle_area() {
        let a = area(Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0));
        assert!((a - 0.5).abs() < 1e-12);
    }

    #[test]
    fn squashed_triangle_expands() {
        let x = [Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(0.0, 0.5)];
        let f = forces(x, 0.5, 10.0);
        // The apex moves away from the base to restore the area.
        assert!(f[2].y > 0.0);
        assert!((f[0] + f[1] + f[2]).length() < 1e-5);
    }

    #[test]
    fn jacobian_blocks_are_symmetric() {
        let x = [Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.1), Vec2::new(0.2, 0.8)];
        let j = jacobians_from_forces(x, |p| forces(*p, 0.3, 4.0));
        for i in 0..3 {
            for k in 0..3 {
                let (a, b) = (j[i][k], j[k][i].transpose());
                for r in 0..2 {
                    for c in 0..2 {
                        assert!((a.m[r][c] - b.m[r][c]).abs() < 1e-3);
                    }
                }
            }
        }
    }

    #[test]
    fn damping_is_not_applied() {
        use crate::block::BlockStore;
        use crate::constraint::{insert, ConstraintStore};
        use crate::kernel::KernelRegistry;
        use crate::node::Node;

        let mut nodes: BlockStore<Node> = BlockStore::new(4).unwrap();
        let handles = nodes.grow(3, true);
        let x = [Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(0.0, 0.5)];
        nodes.scatter_in("x", &x, Some(&handles)).unwrap();
        nodes
            .scatter_in("v", &[Vec2::new(0.0, 0.0), Vec2::new(0.0, 4.0), Vec2::new(1.0, -2.0)], Some(&handles))
            .unwrap();
        let ids: alloc::vec::Vec<RecordId> = nodes.flatten("id", Some(&handles)).unwrap();

        let mut store: BlockStore<Area> = BlockStore::new(4).unwrap();
        let record = Area { stiffness: 2.0, damping: 3.0, rest_area: 0.5, node_ids: [ids[0], ids[1], ids[2]], ..Area::default() };
        insert(&mut store, &[record]).unwrap();
        let input = ConstraintInput::new(&nodes, &[]);
        let mut kernels = KernelRegistry::new();
        store.compute_forces(&mut kernels, &input);
        store.compute_jacobians(&mut kernels, &input);

        let record = store.get(0, 0).unwrap();
        assert_eq!(record.f, forces(x, 0.5, 2.0));
        assert_eq!(record.dfdv, [[Mat2::zero(); 3]; 3]);
    }
}
