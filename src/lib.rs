//! Block-structured storage and kernel dispatch for constraint-based particle physics.
//!
//! `blockphys` stores simulation records (nodes, springs, bending and area
//! constraints) in fixed-capacity columnar blocks and runs per-block kernels
//! over them. On top of that substrate it provides spring/bending/area force
//! and Jacobian models, a scene graph, a symplectic Euler integrator and a
//! handle-based command layer for scripting.
//!
//! # Features
//!
//! - **Block stores**: AoSoA containers declared with [`block_record!`], with
//!   handle-based growth, inactive-block reuse and durable record identities
//! - **Kernel dispatch**: memoized per-function kernels that skip inactive
//!   blocks, optionally block-parallel with the `parallel` feature (rayon)
//! - **Constraint models**: stretch/damping forces and Jacobians, anchors to
//!   animated kinematics, wire bending and triangle area
//! - **Observable**: monitor solver stages via the `StepObserver` trait, and
//!   through `tracing` spans and events
//! - **`no_std` compatible**: disable the default `std` feature

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod float;
pub mod vec;
pub mod mat;
pub mod error;
pub mod block;
pub mod kernel;
pub mod node;
pub mod constraint;
pub mod shape;
pub mod kinematic;
pub mod scene;
pub mod details;
pub mod integrator;
pub mod solver;
pub mod observer;
pub mod config;
pub mod command;

// Re-export primary API
pub use float::Float;
pub use vec::{Vec, Vec2, Vec3};
pub use mat::{Mat, Mat2, Mat3};
pub use error::{ArgumentError, Error, Result, SchemaError};
pub use block::{BlockStore, Handles, Record, RecordId, DEFAULT_BLOCK_SIZE};
pub use kernel::{Kernel, KernelOptions, KernelRegistry};
pub use node::Node;
pub use constraint::{AnchorSpring, Area, Bending, ConstraintStore, Spring};
pub use shape::Shape;
pub use kinematic::{Animator, Kinematic, ParametricPoint, State};
pub use scene::{Condition, ConditionKind, Dynamic, Force, Gravity, Scene};
pub use details::SolverDetails;
pub use integrator::{SymplecticEuler, TimeIntegrator};
pub use solver::Solver;
pub use config::SolverContext;
pub use observer::{NoOpStepObserver, StepObserver};
pub use command::{CommandDispatcher, ObjectHandle, Value};

#[doc(hidden)]
pub mod __private {
    pub use alloc::{boxed::Box, vec, vec::Vec};
    pub use core::any::Any;
}
