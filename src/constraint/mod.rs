//! Constraint kinds: force/Jacobian models stored in block stores.
//!
//! Every kind computes into its own scratch fields (`f`, `dfdx`, `dfdv`)
//! through the kernel dispatcher, reading node state without writing it.
//! A later, serial pass accumulates those forces onto the nodes, so the
//! per-block kernels can run in parallel.

pub mod area;
pub mod bending;
pub mod numerical;
pub mod spring;

pub use area::Area;
pub use bending::Bending;
pub use spring::{AnchorSpring, Spring};

use crate::block::{AnyStore, BlockMut, BlockStore, Handles, Record, RecordId};
use crate::error::Result;
use crate::kernel::{KernelOptions, KernelRegistry};
use crate::kinematic::Kinematic;
use crate::node::{self, Node};
use crate::vec::{Vec, Vec2};
use core::sync::atomic::{AtomicUsize, Ordering};

/// Read-only view of the scene passed to constraint kernels.
pub struct ConstraintInput<'a> {
    pub nodes: &'a BlockStore<Node>,
    pub kinematics: &'a [Kinematic],
    dangling: AtomicUsize,
}

impl<'a> ConstraintInput<'a> {
    /// Inputs over `nodes`, with constraints indexing into `kinematics`.
    pub fn new(nodes: &'a BlockStore<Node>, kinematics: &'a [Kinematic]) -> Self {
        ConstraintInput { nodes, kinematics, dangling: AtomicUsize::new(0) }
    }

    /// Position and velocity of a live node. A missing node is counted as
    /// a dangling reference.
    pub fn node_state(&self, id: RecordId) -> Option<(Vec2<f64>, Vec2<f64>)> {
        let state = node::state(self.nodes, id);
        if state.is_none() {
            self.dangling.fetch_add(1, Ordering::Relaxed);
        }
        state
    }

    /// Positions of several live nodes; `None` if any is missing.
    pub fn node_positions<const N: usize>(&self, ids: &[RecordId; N]) -> Option<[Vec2<f64>; N]> {
        let mut positions = [Vec2::zero(); N];
        for (x, id) in positions.iter_mut().zip(ids) {
            *x = self.node_state(*id)?.0;
        }
        Some(positions)
    }

    /// The kinematic at `index`. A missing one is counted as a dangling reference.
    pub fn kinematic(&self, index: u32) -> Option<&'a Kinematic> {
        let kinematic = self.kinematics.get(index as usize);
        if kinematic.is_none() {
            self.dangling.fetch_add(1, Ordering::Relaxed);
        }
        kinematic
    }

    /// References that could not be resolved so far.
    pub fn dangling(&self) -> usize {
        self.dangling.load(Ordering::Relaxed)
    }
}

/// A constraint record type and its per-block force/Jacobian kernels.
pub trait Constraint: Record {
    /// Kind name used in logs.
    const KIND: &'static str;

    /// Write `f` for every row of the block.
    fn compute_forces(block: BlockMut<'_, Self>, input: &ConstraintInput<'_>);

    /// Write `dfdx` and `dfdv` for every row of the block.
    fn compute_jacobians(block: BlockMut<'_, Self>, input: &ConstraintInput<'_>);

    /// Visit the `(node, force)` contributions of one row.
    fn visit_forces(columns: &Self::Columns, slot: usize, visit: &mut dyn FnMut(RecordId, Vec2<f64>));

    /// Kernels only write their own rows.
    fn kernel_options() -> KernelOptions {
        KernelOptions::new().with_data_parallel(true)
    }
}

/// Object-safe view of one constraint store, so the integrator can walk
/// every kind in one list.
pub trait ConstraintStore: Send + Sync {
    fn kind(&self) -> &'static str;

    /// Number of live constraints.
    fn num_constraints(&self) -> usize;

    fn compute_forces(&mut self, kernels: &mut KernelRegistry, input: &ConstraintInput<'_>) -> usize;

    fn compute_jacobians(&mut self, kernels: &mut KernelRegistry, input: &ConstraintInput<'_>) -> usize;

    /// Add every constraint force onto its node's accumulator.
    fn accumulate_forces(&self, nodes: &mut BlockStore<Node>) -> Result<()>;

    fn as_any_store(&mut self) -> &mut dyn AnyStore;
}

impl<C: Constraint> ConstraintStore for BlockStore<C> {
    fn kind(&self) -> &'static str {
        C::KIND
    }

    fn num_constraints(&self) -> usize {
        self.iter(None).map(|blocks| blocks.map(|b| b.num_elements()).sum()).unwrap_or(0)
    }

    fn compute_forces(&mut self, kernels: &mut KernelRegistry, input: &ConstraintInput<'_>) -> usize {
        let kernel = kernels.compile::<C, _>(C::compute_forces, C::kernel_options());
        kernel.run(self, input)
    }

    fn compute_jacobians(&mut self, kernels: &mut KernelRegistry, input: &ConstraintInput<'_>) -> usize {
        let kernel = kernels.compile::<C, _>(C::compute_jacobians, C::kernel_options());
        kernel.run(self, input)
    }

    fn accumulate_forces(&self, nodes: &mut BlockStore<Node>) -> Result<()> {
        for block in self.iter(None)? {
            for slot in 0..block.num_elements() {
                C::visit_forces(block.data(), slot, &mut |id, force| {
                    node::add_force(nodes, id, force);
                });
            }
        }
        Ok(())
    }

    fn as_any_store(&mut self) -> &mut dyn AnyStore {
        self
    }
}

/// Claim slots for `records` (reusing inactive blocks) and write them.
pub fn insert<C: Record>(store: &mut BlockStore<C>, records: &[C]) -> Result<Handles> {
    let handles = store.grow(records.len(), true);
    for ((block, slot), record) in handles.slots().zip(records) {
        store.set(block, slot, record)?;
    }
    Ok(handles)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_node_counts_as_dangling() {
        let nodes: BlockStore<Node> = BlockStore::new(4).unwrap();
        let input = ConstraintInput::new(&nodes, &[]);
        assert!(input.node_state(RecordId { serial: 0, block: 0, slot: 0 }).is_none());
        assert!(input.kinematic(3).is_none());
        assert_eq!(input.dangling(), 2);
    }

    #[test]
    fn insert_writes_records_in_claim_order() {
        let mut store: BlockStore<Spring> = BlockStore::new(2).unwrap();
        let records: alloc::vec::Vec<Spring> = (0..3)
            .map(|i| Spring { rest_length: i as f64, ..Spring::default() })
            .collect();
        let handles = insert(&mut store, &records).unwrap();
        assert_eq!(handles.len(), 3);
        assert_eq!(store.flatten::<f64>("rest_length", Some(&handles)).unwrap(), [0.0, 1.0, 2.0]);
    }
}
