//! Command indirection: named operations over a dispatcher-owned scene.
//!
//! External callers never hold scene objects. Commands that create a
//! dynamic, kinematic, condition or force hand back an [`ObjectHandle`];
//! later commands take those handles as arguments.
//!
//! ```
//! use blockphys::command::{CommandDispatcher, Value};
//! use blockphys::shape::Shape;
//! use blockphys::vec::Vec2;
//!
//! let mut dispatcher = CommandDispatcher::new().unwrap();
//! let shape = Shape::wire(Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), 4);
//! let wire = dispatcher.run("add_dynamic", [("shape", Value::from(shape))]).unwrap();
//! dispatcher
//!     .run("add_edge_constraint", [("dynamic", wire.clone()), ("stiffness", 10.0.into()), ("damping", 0.0.into())])
//!     .unwrap();
//! dispatcher.run("initialize", []).unwrap();
//! dispatcher.run("solve_to_next_frame", []).unwrap();
//! let positions = dispatcher.run("get_positions", [("dynamic", wire)]).unwrap();
//! assert_eq!(positions.as_positions().map(|p| p.len()), Some(5));
//! ```

pub mod arena;
mod builtin;
pub mod value;

pub use arena::{Arena, ObjectHandle};
pub use value::{ParamKind, SceneSummary, Value};

use crate::block::DEFAULT_BLOCK_SIZE;
use crate::config::SolverContext;
use crate::details::SolverDetails;
use crate::error::{ArgumentError, Error, Result};
use crate::kinematic::Animator;
use crate::scene::Scene;
use crate::shape::Shape;
use crate::solver::Solver;
use crate::vec::Vec2;
use alloc::collections::BTreeMap;
use alloc::string::ToString;
use alloc::sync::Arc;
use core::fmt;

/// What a handle refers to: an index into one of the scene's lists.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SceneObject {
    Dynamic(usize),
    Kinematic(usize),
    Condition(usize),
    Force(usize),
}

/// Everything a command may operate on.
#[derive(Debug)]
pub struct Session {
    pub scene: Scene,
    pub details: SolverDetails,
    pub solver: Solver,
    pub context: SolverContext,
    objects: Arena<SceneObject>,
}

impl Session {
    /// Live handles and what they refer to.
    pub fn objects(&self) -> &Arena<SceneObject> {
        &self.objects
    }
}

/// A command result: a plain value, or a new scene object the dispatcher
/// mints a handle for.
#[derive(Debug)]
pub enum Output {
    Value(Value),
    Object(SceneObject),
}

/// One declared parameter.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Param {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
}

impl Param {
    /// A parameter the caller must supply.
    pub const fn required(name: &'static str, kind: ParamKind) -> Self {
        Param { name, kind, required: true }
    }

    /// A parameter the handler may default.
    pub const fn optional(name: &'static str, kind: ParamKind) -> Self {
        Param { name, kind, required: false }
    }
}

pub type Handler = fn(&mut Session, &Args) -> Result<Output>;

/// A named handler and its fixed parameter list.
#[derive(Copy, Clone)]
pub struct Command {
    pub name: &'static str,
    pub params: &'static [Param],
    pub handler: Handler,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command").field("name", &self.name).field("params", &self.params).finish_non_exhaustive()
    }
}

/// Validated arguments of one invocation. Handle arguments are already
/// resolved to the objects they refer to.
#[derive(Debug, Default)]
pub struct Args {
    values: BTreeMap<&'static str, Value>,
    objects: BTreeMap<&'static str, SceneObject>,
}

impl Args {
    fn value(&self, name: &'static str) -> Result<&Value> {
        self.values.get(name).ok_or(ArgumentError::MissingArgument(name).into())
    }

    fn invalid(name: &'static str, expected: &'static str) -> Error {
        ArgumentError::InvalidArgument { name: name.to_string(), expected }.into()
    }

    /// Whether `name` was supplied, as a value or a handle.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name) || self.objects.contains_key(name)
    }

    /// A float argument; integers are accepted.
    pub fn float(&self, name: &'static str) -> Result<f64> {
        self.value(name)?.as_float().ok_or_else(|| Self::invalid(name, ParamKind::Float.expected()))
    }

    /// A float argument, or `default` when absent.
    pub fn float_or(&self, name: &'static str, default: f64) -> Result<f64> {
        if self.contains(name) { self.float(name) } else { Ok(default) }
    }

    /// A vector argument.
    pub fn vector(&self, name: &'static str) -> Result<Vec2<f64>> {
        match self.value(name)? {
            Value::Vector(v) => Ok(*v),
            _ => Err(Self::invalid(name, ParamKind::Vector.expected())),
        }
    }

    /// A vector argument, or `default` when absent.
    pub fn vector_or(&self, name: &'static str, default: Vec2<f64>) -> Result<Vec2<f64>> {
        if self.contains(name) { self.vector(name) } else { Ok(default) }
    }

    /// A shape argument.
    pub fn shape(&self, name: &'static str) -> Result<&Shape> {
        match self.value(name)? {
            Value::Shape(shape) => Ok(shape),
            _ => Err(Self::invalid(name, ParamKind::Shape.expected())),
        }
    }

    /// An optional animator argument.
    pub fn animator(&self, name: &'static str) -> Result<Option<Arc<dyn Animator>>> {
        match self.values.get(name) {
            None => Ok(None),
            Some(Value::Animator(animator)) => Ok(Some(animator.clone())),
            Some(_) => Err(Self::invalid(name, ParamKind::Animator.expected())),
        }
    }

    /// A solver context argument.
    pub fn context(&self, name: &'static str) -> Result<SolverContext> {
        match self.value(name)? {
            Value::Context(context) => Ok(*context),
            _ => Err(Self::invalid(name, ParamKind::Context.expected())),
        }
    }

    /// Scene index of a dynamic handle argument.
    pub fn dynamic(&self, name: &'static str) -> Result<usize> {
        match self.objects.get(name) {
            Some(SceneObject::Dynamic(index)) => Ok(*index),
            Some(_) => Err(Self::invalid(name, ParamKind::Dynamic.expected())),
            None => Err(ArgumentError::MissingArgument(name).into()),
        }
    }

    /// Scene index of a kinematic handle argument.
    pub fn kinematic(&self, name: &'static str) -> Result<usize> {
        match self.objects.get(name) {
            Some(SceneObject::Kinematic(index)) => Ok(*index),
            Some(_) => Err(Self::invalid(name, ParamKind::Kinematic.expected())),
            None => Err(ArgumentError::MissingArgument(name).into()),
        }
    }
}

/// Owns a scene, its storage, a solver and a context, and runs registered
/// commands against them.
#[derive(Debug)]
pub struct CommandDispatcher {
    session: Session,
    commands: BTreeMap<&'static str, Command>,
}

impl CommandDispatcher {
    /// A dispatcher with every built-in command registered.
    pub fn new() -> Result<Self> {
        Self::with_block_size(DEFAULT_BLOCK_SIZE)
    }

    /// A dispatcher whose stores use blocks of `block_size` records.
    pub fn with_block_size(block_size: usize) -> Result<Self> {
        let mut dispatcher = CommandDispatcher {
            session: Session {
                scene: Scene::new(),
                details: SolverDetails::new(block_size)?,
                solver: Solver::new(),
                context: SolverContext::new(),
                objects: Arena::new(),
            },
            commands: BTreeMap::new(),
        };
        for command in builtin::COMMANDS {
            dispatcher.register(*command);
        }
        Ok(dispatcher)
    }

    /// Add a command, replacing any command of the same name.
    pub fn register(&mut self, command: Command) {
        self.commands.insert(command.name, command);
    }

    /// The command registered under `name`.
    pub fn command(&self, name: &str) -> Option<&Command> {
        self.commands.get(name)
    }

    /// Registered commands, by name.
    pub fn commands(&self) -> impl Iterator<Item = &Command> + '_ {
        self.commands.values()
    }

    /// The scene, storage, solver and context commands act on.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Mutable access to the session, for callers driving the scene directly.
    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Run `name` with named arguments.
    ///
    /// Every argument must match a declared parameter and its type, and
    /// handle arguments must be live. New scene objects are returned as
    /// [`Value::Handle`].
    pub fn run<'a>(&mut self, name: &str, args: impl IntoIterator<Item = (&'a str, Value)>) -> Result<Value> {
        let command = *self.commands.get(name).ok_or_else(|| Error::UnknownCommand(name.to_string()))?;
        let args = self.bind(&command, args)?;
        tracing::debug!(command = command.name, "running command");
        match (command.handler)(&mut self.session, &args)? {
            Output::Value(value) => Ok(value),
            Output::Object(object) => Ok(Value::Handle(self.session.objects.insert(object))),
        }
    }

    fn bind<'a>(&self, command: &Command, args: impl IntoIterator<Item = (&'a str, Value)>) -> Result<Args> {
        let mut bound = Args::default();
        for (name, value) in args {
            let param = command
                .params
                .iter()
                .find(|p| p.name == name)
                .ok_or_else(|| ArgumentError::UnexpectedArgument(name.to_string()))?;
            if !param.kind.accepts(&value) {
                return Err(Args::invalid(param.name, param.kind.expected()));
            }
            match value {
                Value::Handle(handle) => {
                    let object = *self.session.objects.get(handle)?;
                    bound.objects.insert(param.name, object);
                }
                value => {
                    bound.values.insert(param.name, value);
                }
            }
        }
        if let Some(missing) = command.params.iter().find(|p| p.required && !bound.contains(p.name)) {
            return Err(ArgumentError::MissingArgument(missing.name).into());
        }
        Ok(bound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn wire() -> Value {
        Shape::wire(Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), 2).into()
    }

    #[test]
    fn unknown_command() {
        let mut dispatcher = CommandDispatcher::new().unwrap();
        let err = dispatcher.run("explode", []).unwrap_err();
        assert_eq!(err, Error::UnknownCommand("explode".into()));
    }

    #[test]
    fn argument_validation() {
        let mut dispatcher = CommandDispatcher::new().unwrap();
        assert_eq!(
            dispatcher.run("add_dynamic", []).unwrap_err(),
            ArgumentError::MissingArgument("shape").into()
        );
        assert!(matches!(
            dispatcher.run("add_dynamic", [("shape", Value::Float(1.0))]).unwrap_err(),
            Error::Argument(ArgumentError::InvalidArgument { .. })
        ));
        assert_eq!(
            dispatcher.run("add_dynamic", [("shape", wire()), ("colour", Value::from("red"))]).unwrap_err(),
            ArgumentError::UnexpectedArgument("colour".into()).into()
        );
    }

    #[test]
    fn handle_of_wrong_object_rejected() {
        let mut dispatcher = CommandDispatcher::new().unwrap();
        let gravity = dispatcher.run("add_gravity", [("gravity", Vec2::new(0.0, -1.0).into())]).unwrap();
        let err = dispatcher
            .run("get_positions", [("dynamic", gravity)])
            .unwrap_err();
        assert!(matches!(err, Error::Argument(ArgumentError::InvalidArgument { .. })));
    }

    #[test]
    fn reset_invalidates_handles() {
        let mut dispatcher = CommandDispatcher::with_block_size(4).unwrap();
        let dynamic = dispatcher.run("add_dynamic", [("shape", wire())]).unwrap();
        let handles = dispatcher.run("get_dynamic_handles", []).unwrap();
        assert_eq!(handles.as_handles(), dynamic.as_handle().map(|h| vec![h]).as_deref());

        dispatcher.run("reset_scene", []).unwrap();
        let err = dispatcher.run("get_positions", [("dynamic", dynamic)]).unwrap_err();
        assert!(matches!(err, Error::Argument(ArgumentError::StaleHandle { .. })));
        let summary = dispatcher.run("get_scene", []).unwrap();
        assert_eq!(summary.as_summary(), Some(&SceneSummary::default()));
    }

    #[test]
    fn custom_command() {
        fn node_count(session: &mut Session, _: &Args) -> Result<Output> {
            Ok(Output::Value(Value::Int(session.scene.num_nodes() as i64)))
        }
        let mut dispatcher = CommandDispatcher::new().unwrap();
        dispatcher.register(Command { name: "node_count", params: &[], handler: node_count });
        dispatcher.run("add_dynamic", [("shape", wire())]).unwrap();
        assert!(matches!(dispatcher.run("node_count", []).unwrap(), Value::Int(3)));
    }
}
