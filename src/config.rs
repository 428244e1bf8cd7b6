//! Time stepping configuration.

/// Simulation clock and frame subdivision.
///
/// # Builder Pattern
/// ```
/// use blockphys::config::SolverContext;
///
/// let context = SolverContext::new()
///     .with_frame_dt(1.0 / 30.0)
///     .with_num_substep(2)
///     .with_num_frames(60);
/// assert!((context.dt() - 1.0 / 60.0).abs() < 1e-12);
/// assert!((context.end_time() - 2.0).abs() < 1e-12);
/// ```
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SolverContext {
    /// Current simulation time. Default: 0.
    pub time: f64,
    /// Time the simulation starts at. Default: 0.
    pub start_time: f64,
    /// Duration of a frame. Default: 1/24.
    pub frame_dt: f64,
    /// Steps per frame. Default: 4.
    pub num_substep: usize,
    /// Frames to simulate. Default: 1.
    pub num_frames: usize,
}

impl SolverContext {
    /// Defaults: time 0, 24 frames per second, 4 steps per frame, one frame.
    pub fn new() -> Self {
        SolverContext {
            time: 0.0,
            start_time: 0.0,
            frame_dt: 1.0 / 24.0,
            num_substep: 4,
            num_frames: 1,
        }
    }

    /// Set both the start time and the current time.
    pub fn with_start_time(mut self, start_time: f64) -> Self {
        self.start_time = start_time;
        self.time = start_time;
        self
    }

    /// Set the current time only.
    pub fn with_time(mut self, time: f64) -> Self {
        self.time = time;
        self
    }

    /// Set the frame duration.
    pub fn with_frame_dt(mut self, frame_dt: f64) -> Self {
        self.frame_dt = frame_dt;
        self
    }

    /// Set the steps per frame (at least one).
    pub fn with_num_substep(mut self, num_substep: usize) -> Self {
        self.num_substep = num_substep.max(1);
        self
    }

    /// Set the number of frames to simulate.
    pub fn with_num_frames(mut self, num_frames: usize) -> Self {
        self.num_frames = num_frames;
        self
    }

    /// Step size: `frame_dt / num_substep`.
    pub fn dt(&self) -> f64 {
        self.frame_dt / self.num_substep.max(1) as f64
    }

    /// Time at the end of the last frame.
    pub fn end_time(&self) -> f64 {
        self.start_time + self.frame_dt * self.num_frames as f64
    }

    /// Whether the clock has reached the last frame.
    pub fn is_finished(&self) -> bool {
        // Half a step of slack absorbs accumulated rounding in `time`.
        self.time + self.dt() * 0.5 >= self.end_time()
    }
}

impl Default for SolverContext {
    fn default() -> Self {
        Self::new()
    }
}
