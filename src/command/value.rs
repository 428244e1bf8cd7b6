//! Dynamically typed command arguments and results.

use super::arena::ObjectHandle;
use crate::config::SolverContext;
use crate::kinematic::Animator;
use crate::shape::Shape;
use crate::vec::Vec2;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec as AllocVec;
use core::fmt;

/// Object counts of a scene.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SceneSummary {
    pub num_dynamics: usize,
    pub num_kinematics: usize,
    pub num_conditions: usize,
    pub num_forces: usize,
    pub num_nodes: usize,
    pub num_constraints: usize,
}

/// A command argument or result.
#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Vector(Vec2<f64>),
    Text(String),
    Shape(Shape),
    Animator(Arc<dyn Animator>),
    Context(SolverContext),
    Handle(ObjectHandle),
    Handles(AllocVec<ObjectHandle>),
    Positions(AllocVec<Vec2<f64>>),
    Summary(SceneSummary),
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("None"),
            Value::Bool(v) => f.debug_tuple("Bool").field(v).finish(),
            Value::Int(v) => f.debug_tuple("Int").field(v).finish(),
            Value::Float(v) => f.debug_tuple("Float").field(v).finish(),
            Value::Vector(v) => f.debug_tuple("Vector").field(v).finish(),
            Value::Text(v) => f.debug_tuple("Text").field(v).finish(),
            Value::Shape(v) => f.debug_tuple("Shape").field(v).finish(),
            Value::Animator(_) => f.write_str("Animator(..)"),
            Value::Context(v) => f.debug_tuple("Context").field(v).finish(),
            Value::Handle(v) => f.debug_tuple("Handle").field(v).finish(),
            Value::Handles(v) => f.debug_tuple("Handles").field(v).finish(),
            Value::Positions(v) => f.debug_tuple("Positions").field(v).finish(),
            Value::Summary(v) => f.debug_tuple("Summary").field(v).finish(),
        }
    }
}

impl Value {
    /// The handle held by a `Handle` value.
    pub fn as_handle(&self) -> Option<ObjectHandle> {
        match self {
            Value::Handle(handle) => Some(*handle),
            _ => None,
        }
    }

    /// The handles held by a `Handles` value.
    pub fn as_handles(&self) -> Option<&[ObjectHandle]> {
        match self {
            Value::Handles(handles) => Some(handles),
            _ => None,
        }
    }

    /// The positions held by a `Positions` value.
    pub fn as_positions(&self) -> Option<&[Vec2<f64>]> {
        match self {
            Value::Positions(positions) => Some(positions),
            _ => None,
        }
    }

    /// The context held by a `Context` value.
    pub fn as_context(&self) -> Option<&SolverContext> {
        match self {
            Value::Context(context) => Some(context),
            _ => None,
        }
    }

    /// The summary held by a `Summary` value.
    pub fn as_summary(&self) -> Option<&SceneSummary> {
        match self {
            Value::Summary(summary) => Some(summary),
            _ => None,
        }
    }

    /// Floats accept integers.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// True for `Value::None`.
    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<Vec2<f64>> for Value {
    fn from(v: Vec2<f64>) -> Self {
        Value::Vector(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.into())
    }
}

impl From<Shape> for Value {
    fn from(v: Shape) -> Self {
        Value::Shape(v)
    }
}

impl From<Arc<dyn Animator>> for Value {
    fn from(v: Arc<dyn Animator>) -> Self {
        Value::Animator(v)
    }
}

impl From<SolverContext> for Value {
    fn from(v: SolverContext) -> Self {
        Value::Context(v)
    }
}

impl From<ObjectHandle> for Value {
    fn from(v: ObjectHandle) -> Self {
        Value::Handle(v)
    }
}

/// Declared type of a command parameter.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ParamKind {
    Bool,
    Int,
    Float,
    Vector,
    Text,
    Shape,
    Animator,
    Context,
    /// Handle to a dynamic.
    Dynamic,
    /// Handle to a kinematic.
    Kinematic,
}

impl ParamKind {
    /// Description used in argument errors.
    pub fn expected(&self) -> &'static str {
        match self {
            ParamKind::Bool => "a boolean",
            ParamKind::Int => "an integer",
            ParamKind::Float => "a number",
            ParamKind::Vector => "a 2D vector",
            ParamKind::Text => "a string",
            ParamKind::Shape => "a shape",
            ParamKind::Animator => "an animator",
            ParamKind::Context => "a solver context",
            ParamKind::Dynamic => "a dynamic handle",
            ParamKind::Kinematic => "a kinematic handle",
        }
    }

    /// Whether `value` has this kind. Handles are only checked for shape
    /// here; what they point to is checked on resolution.
    pub fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (ParamKind::Bool, Value::Bool(_))
                | (ParamKind::Int, Value::Int(_))
                | (ParamKind::Float, Value::Float(_) | Value::Int(_))
                | (ParamKind::Vector, Value::Vector(_))
                | (ParamKind::Text, Value::Text(_))
                | (ParamKind::Shape, Value::Shape(_))
                | (ParamKind::Animator, Value::Animator(_))
                | (ParamKind::Context, Value::Context(_))
                | (ParamKind::Dynamic | ParamKind::Kinematic, Value::Handle(_))
        )
    }
}
