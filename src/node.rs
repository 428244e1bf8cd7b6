//! Simulated point masses.

use crate::block::{BlockMut, BlockStore, RecordId};
use crate::vec::{Vec, Vec2};

crate::block_record! {
    /// A point mass. `f` accumulates forces during a step.
    pub struct Node in NodeColumns {
        pub x: Vec2<f64> = Vec2::new(0.0, 0.0),
        pub v: Vec2<f64> = Vec2::new(0.0, 0.0),
        pub f: Vec2<f64> = Vec2::new(0.0, 0.0),
        pub m: f64 = 1.0,
        pub im: f64 = 1.0,
        pub id: RecordId = RecordId::NONE,
    }
}

pub(crate) fn reset_forces(block: BlockMut<'_, Node>, _: &()) {
    let len = block.len();
    block.data.f[..len].fill(Vec2::zero());
}

/// Add a constant acceleration scaled by each node's mass.
pub(crate) fn apply_acceleration(block: BlockMut<'_, Node>, acceleration: &Vec2<f64>) {
    for i in 0..block.len() {
        block.data.f[i] = block.data.f[i] + acceleration.scale(block.data.m[i]);
    }
}

/// Position and velocity of a live node.
pub fn state(nodes: &BlockStore<Node>, id: RecordId) -> Option<(Vec2<f64>, Vec2<f64>)> {
    let (block, slot) = nodes.locate(id)?;
    let data = nodes.block(block).ok()?.data();
    Some((data.x[slot], data.v[slot]))
}

/// Accumulate `force` onto a live node. Returns false for a stale id.
pub(crate) fn add_force(nodes: &mut BlockStore<Node>, id: RecordId, force: Vec2<f64>) -> bool {
    let Some((block, slot)) = nodes.locate(id) else {
        tracing::warn!(?id, "force on a node that no longer exists");
        return false;
    };
    match nodes.block_mut(block) {
        Ok(block) => {
            let f = &mut block.data_mut().f[slot];
            *f = *f + force;
            true
        }
        Err(_) => false,
    }
}
