//! Storage owned by the solver: one block store per record kind.

use crate::block::BlockStore;
use crate::constraint::{AnchorSpring, Area, Bending, ConstraintStore, Spring};
use crate::error::SchemaError;
use crate::kernel::KernelRegistry;
use crate::node::Node;

/// Block stores for nodes and every constraint kind, plus the kernel memo
/// table used to process them.
#[derive(Debug)]
pub struct SolverDetails {
    block_size: usize,
    pub nodes: BlockStore<Node>,
    pub springs: BlockStore<Spring>,
    pub anchor_springs: BlockStore<AnchorSpring>,
    pub bendings: BlockStore<Bending>,
    pub areas: BlockStore<Area>,
    pub kernels: KernelRegistry,
}

impl SolverDetails {
    /// Stores with blocks of `block_size` records
    /// (usually [`DEFAULT_BLOCK_SIZE`](crate::block::DEFAULT_BLOCK_SIZE)).
    pub fn new(block_size: usize) -> Result<Self, SchemaError> {
        Ok(SolverDetails {
            block_size,
            nodes: BlockStore::new(block_size)?,
            springs: BlockStore::new(block_size)?,
            anchor_springs: BlockStore::new(block_size)?,
            bendings: BlockStore::new(block_size)?,
            areas: BlockStore::new(block_size)?,
            kernels: KernelRegistry::new(),
        })
    }

    /// Capacity of every block, in records.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Node store, every constraint store and the kernel registry, borrowed
    /// at once.
    pub fn split(&mut self) -> (&mut BlockStore<Node>, [&mut dyn ConstraintStore; 4], &mut KernelRegistry) {
        let constraints: [&mut dyn ConstraintStore; 4] =
            [&mut self.springs, &mut self.anchor_springs, &mut self.bendings, &mut self.areas];
        (&mut self.nodes, constraints, &mut self.kernels)
    }

    /// Live constraints over every kind.
    pub fn num_constraints(&self) -> usize {
        let stores: [&dyn ConstraintStore; 4] = [&self.springs, &self.anchor_springs, &self.bendings, &self.areas];
        stores.iter().map(|s| s.num_constraints()).sum()
    }

    /// Drop every record. Identity serials keep increasing, so ids held
    /// from before the reset never resolve again.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.springs.clear();
        self.anchor_springs.clear();
        self.bendings.clear();
        self.areas.clear();
    }
}
