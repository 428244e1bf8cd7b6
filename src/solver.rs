//! Scene solver: steps a scene through time with a [`TimeIntegrator`].

use crate::config::SolverContext;
use crate::details::SolverDetails;
use crate::error::Result;
use crate::integrator::{SymplecticEuler, TimeIntegrator};
use crate::observer::StepObserver;
use crate::scene::Scene;

/// Drives the per-step pipeline: update kinematics and time-varying
/// conditions, then prepare, assemble and solve with the integrator.
#[derive(Clone, Debug, Default)]
pub struct Solver<I: TimeIntegrator = SymplecticEuler> {
    integrator: I,
    num_steps: usize,
}

impl Solver<SymplecticEuler> {
    /// A solver stepping with [`SymplecticEuler`].
    pub fn new() -> Self {
        Self::with_integrator(SymplecticEuler)
    }
}

impl<I: TimeIntegrator> Solver<I> {
    /// A solver stepping with `integrator`.
    pub fn with_integrator(integrator: I) -> Self {
        Solver { integrator, num_steps: 0 }
    }

    /// The integrator in use.
    pub fn integrator(&self) -> &I {
        &self.integrator
    }

    /// Steps completed since the last [`initialize`](Self::initialize).
    pub fn num_steps(&self) -> usize {
        self.num_steps
    }

    /// Place kinematics at the current time and create every condition's
    /// constraints.
    #[tracing::instrument(skip_all, fields(time = context.time))]
    pub fn initialize(&mut self, scene: &mut Scene, details: &mut SolverDetails, context: &SolverContext) -> Result<()> {
        scene.init_kinematics(context.time);
        scene.init_conditions(details)?;
        self.num_steps = 0;
        tracing::debug!(
            nodes = scene.num_nodes(),
            constraints = details.num_constraints(),
            "solver initialized"
        );
        Ok(())
    }

    /// One step of `context.dt()` ending at `context.time`.
    ///
    /// Returns an error without touching node positions or velocities when
    /// constraints cannot be evaluated.
    #[tracing::instrument(skip_all, fields(time = context.time))]
    pub fn solve_step<O: StepObserver>(
        &mut self,
        scene: &mut Scene,
        details: &mut SolverDetails,
        context: &SolverContext,
        observer: &mut O,
    ) -> Result<()> {
        let dt = context.dt();

        scene.update_kinematics(context.time, dt);
        scene.update_conditions(details)?;
        observer.on_pre_step(context.time);

        self.integrator.prepare_system(scene, details, dt, observer)?;
        self.integrator.assemble_system(scene, details, dt)?;
        self.integrator.solve_system(scene, details, dt)?;
        observer.on_integrate();

        self.num_steps += 1;
        observer.on_step_complete();
        Ok(())
    }

    /// Advance by one frame: `num_substep` steps, moving the clock forward
    /// before each. A failed step leaves the clock at the last completed
    /// step.
    pub fn solve_to_next_frame<O: StepObserver>(
        &mut self,
        scene: &mut Scene,
        details: &mut SolverDetails,
        context: &mut SolverContext,
        observer: &mut O,
    ) -> Result<()> {
        let dt = context.dt();
        for _ in 0..context.num_substep {
            let previous = context.time;
            context.time += dt;
            if let Err(err) = self.solve_step(scene, details, context, observer) {
                context.time = previous;
                return Err(err);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::RecordId;
    use crate::constraint::Spring;
    use crate::error::Error;
    use crate::kinematic::{Animator, Kinematic};
    use crate::observer::NoOpStepObserver;
    use crate::scene::{Condition, ConditionKind, Dynamic};
    use crate::shape::Shape;
    use crate::vec::{Vec, Vec2};
    use alloc::sync::Arc;
    use alloc::vec::Vec as AllocVec;

    #[derive(Default)]
    struct Recorder {
        events: AllocVec<&'static str>,
    }

    impl StepObserver for Recorder {
        fn on_pre_step(&mut self, _time: f64) {
            self.events.push("pre_step");
        }
        fn on_forces_computed(&mut self, kind: &'static str, _invocations: usize) {
            self.events.push(kind);
        }
        fn on_integrate(&mut self) {
            self.events.push("integrate");
        }
        fn on_step_complete(&mut self) {
            self.events.push("complete");
        }
    }

    #[test]
    fn observer_sees_every_stage() {
        let mut details = SolverDetails::new(8).unwrap();
        let mut scene = Scene::new();
        let mut solver = Solver::new();
        let mut recorder = Recorder::default();
        let context = SolverContext::new();

        solver.initialize(&mut scene, &mut details, &context).unwrap();
        solver.solve_step(&mut scene, &mut details, &context, &mut recorder).unwrap();
        assert_eq!(
            recorder.events,
            ["pre_step", "spring", "anchor_spring", "bending", "area", "integrate", "complete"]
        );
        assert_eq!(solver.num_steps(), 1);
    }

    #[test]
    fn frame_advances_clock() {
        let mut details = SolverDetails::new(8).unwrap();
        let mut scene = Scene::new();
        let mut solver = Solver::new();
        let mut context = SolverContext::new().with_frame_dt(0.1).with_num_substep(4);

        solver.initialize(&mut scene, &mut details, &context).unwrap();
        solver
            .solve_to_next_frame(&mut scene, &mut details, &mut context, &mut NoOpStepObserver)
            .unwrap();
        assert!((context.time - 0.1).abs() < 1e-12);
        assert_eq!(solver.num_steps(), 4);
    }

    #[test]
    fn failed_step_keeps_clock() {
        let mut details = SolverDetails::new(4).unwrap();
        let mut scene = Scene::new();
        let handles = details.nodes.grow(1, true);
        let live = details.nodes.flatten::<RecordId>("id", Some(&handles)).unwrap()[0];
        let gone = RecordId { serial: 99, block: 0, slot: 3 };
        crate::constraint::insert(&mut details.springs, &[Spring { node_ids: [live, gone], ..Spring::default() }])
            .unwrap();

        let mut solver = Solver::new();
        let mut context = SolverContext::new().with_start_time(0.5).with_num_substep(3);
        let err = solver
            .solve_to_next_frame(&mut scene, &mut details, &mut context, &mut NoOpStepObserver)
            .unwrap_err();
        assert_eq!(err, Error::DanglingReference { count: 1 });
        assert_eq!(context.time, 0.5);
        assert_eq!(solver.num_steps(), 0);
    }

    #[test]
    fn attached_node_follows_moving_kinematic() {
        let mut details = SolverDetails::new(8).unwrap();
        let mut scene = Scene::new();
        let mut handle = Shape::rectangle(Vec2::new(-0.5, -0.5), Vec2::new(0.5, 0.5));
        let position = handle.extract_transform();
        let animator: Arc<dyn Animator> = Arc::new(|time: f64| (Vec2::new(time, 0.0), 0.0));
        let k = scene.add_kinematic(Kinematic::new(&handle, position, 0.0).with_animator(animator));
        let point = Shape::new(alloc::vec![Vec2::new(0.5, 0.0)], alloc::vec![], alloc::vec![]).unwrap();
        let d = scene.add_dynamic(Dynamic::new(&mut details, point, 1.0).unwrap());
        scene
            .add_condition(Condition::new(
                ConditionKind::KinematicAttachment { dynamic: d, kinematic: k, distance: 0.1 },
                1000.0,
                10.0,
            ))
            .unwrap();

        let mut solver = Solver::new();
        let mut context = SolverContext::new().with_num_substep(8).with_num_frames(24);
        solver.initialize(&mut scene, &mut details, &context).unwrap();
        for _ in 0..24 {
            solver
                .solve_to_next_frame(&mut scene, &mut details, &mut context, &mut NoOpStepObserver)
                .unwrap();
        }
        let x = scene.dynamics()[d].positions(&details).unwrap()[0];
        assert!(x.x > 1.0, "node stayed behind at {x:?}");
        assert!(x.distance(Vec2::new(1.5, 0.0)) < 0.2);
    }
}
