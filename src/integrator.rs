//! Time integrators: how accumulated forces advance node state.

use crate::block::BlockMut;
use crate::constraint::ConstraintInput;
use crate::details::SolverDetails;
use crate::error::{Error, Result};
use crate::kernel::KernelOptions;
use crate::node::{self, Node};
use crate::observer::StepObserver;
use crate::scene::Scene;
use crate::vec::Vec;

/// The three stages of one step. Node positions and velocities are only
/// written by [`solve_system`](Self::solve_system), so a failure in an
/// earlier stage leaves them untouched.
pub trait TimeIntegrator {
    /// Compute every constraint's forces and Jacobians into its own record.
    fn prepare_system<O: StepObserver>(
        &mut self,
        scene: &Scene,
        details: &mut SolverDetails,
        dt: f64,
        observer: &mut O,
    ) -> Result<()>;

    /// Gather constraint and global forces onto the node accumulators.
    fn assemble_system(&mut self, scene: &Scene, details: &mut SolverDetails, dt: f64) -> Result<()>;

    /// Advance node velocities and positions.
    fn solve_system(&mut self, scene: &Scene, details: &mut SolverDetails, dt: f64) -> Result<()>;
}

/// `v += f·im·dt; x += v·dt`.
fn integrate(block: BlockMut<'_, Node>, dt: &f64) {
    let len = block.len();
    let d = block.data;
    for i in 0..len {
        d.v[i] = d.v[i] + d.f[i].scale(d.im[i] * *dt);
        d.x[i] = d.x[i] + d.v[i].scale(*dt);
    }
}

/// Explicit, first-order symplectic integrator. Jacobians are computed
/// but not consumed.
#[derive(Copy, Clone, Debug, Default)]
pub struct SymplecticEuler;

impl TimeIntegrator for SymplecticEuler {
    #[tracing::instrument(skip_all)]
    fn prepare_system<O: StepObserver>(
        &mut self,
        scene: &Scene,
        details: &mut SolverDetails,
        _dt: f64,
        observer: &mut O,
    ) -> Result<()> {
        let (nodes, mut constraints, kernels) = details.split();
        let input = ConstraintInput::new(nodes, scene.kinematics());
        for store in constraints.iter_mut() {
            let invocations = store.compute_forces(kernels, &input);
            observer.on_forces_computed(store.kind(), invocations);
        }

        let count = input.dangling();
        if count > 0 {
            tracing::warn!(count, "constraints reference missing objects, step skipped");
            return Err(Error::DanglingReference { count });
        }

        for store in constraints.iter_mut() {
            store.compute_jacobians(kernels, &input);
        }
        Ok(())
    }

    #[tracing::instrument(skip_all)]
    fn assemble_system(&mut self, scene: &Scene, details: &mut SolverDetails, _dt: f64) -> Result<()> {
        let (nodes, constraints, kernels) = details.split();
        kernels
            .compile::<Node, _>(node::reset_forces, KernelOptions::new().with_data_parallel(true))
            .run(nodes, &());
        for store in constraints {
            store.accumulate_forces(nodes)?;
        }
        for force in scene.forces() {
            force.apply(nodes, kernels);
        }
        Ok(())
    }

    #[tracing::instrument(skip_all)]
    fn solve_system(&mut self, _scene: &Scene, details: &mut SolverDetails, dt: f64) -> Result<()> {
        details
            .kernels
            .compile::<Node, _>(integrate, KernelOptions::new().with_data_parallel(true))
            .run(&mut details.nodes, &dt);
        Ok(())
    }
}
