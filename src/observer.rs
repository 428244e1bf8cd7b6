//! Step observer trait for monitoring solver progress.

/// Hooks into the phases of one solver step.
///
/// Implement this trait to monitor solver progress (e.g. for debugging,
/// visualization, or profiling). All methods have default no-op
/// implementations.
pub trait StepObserver {
    /// Called after kinematics and non-static conditions were updated,
    /// before any force is computed.
    fn on_pre_step(&mut self, _time: f64) {}

    /// Called once per constraint kind with the number of block
    /// invocations its force kernel made.
    fn on_forces_computed(&mut self, _kind: &'static str, _invocations: usize) {}

    /// Called after velocities and positions were integrated.
    fn on_integrate(&mut self) {}

    /// Called when a step is fully complete.
    fn on_step_complete(&mut self) {}
}

/// A no-op observer. Use as default when no observation is needed.
pub struct NoOpStepObserver;

impl StepObserver for NoOpStepObserver {}
