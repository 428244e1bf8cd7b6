//! Built-in commands.

use super::{Args, Command, Output, Param, ParamKind, SceneObject, SceneSummary, Session, Value};
use crate::error::Result;
use crate::kinematic::Kinematic;
use crate::observer::NoOpStepObserver;
use crate::scene::{Condition, ConditionKind, Dynamic, Gravity};
use crate::solver::Solver;
use crate::vec::{Vec, Vec2};

const CONSTRAINT: &[Param] = &[
    Param::required("dynamic", ParamKind::Dynamic),
    Param::required("stiffness", ParamKind::Float),
    Param::required("damping", ParamKind::Float),
];

pub(super) const COMMANDS: &[Command] = &[
    Command { name: "set_context", params: &[Param::required("context", ParamKind::Context)], handler: set_context },
    Command { name: "get_context", params: &[], handler: get_context },
    Command { name: "get_scene", params: &[], handler: get_scene },
    Command { name: "get_dynamic_handles", params: &[], handler: get_dynamic_handles },
    Command { name: "reset_scene", params: &[], handler: reset_scene },
    Command {
        name: "add_dynamic",
        params: &[Param::required("shape", ParamKind::Shape), Param::optional("node_mass", ParamKind::Float)],
        handler: add_dynamic,
    },
    Command {
        name: "add_kinematic",
        params: &[
            Param::required("shape", ParamKind::Shape),
            Param::optional("position", ParamKind::Vector),
            Param::optional("rotation", ParamKind::Float),
            Param::optional("animator", ParamKind::Animator),
        ],
        handler: add_kinematic,
    },
    Command { name: "add_edge_constraint", params: CONSTRAINT, handler: add_edge_constraint },
    Command { name: "add_wire_bending_constraint", params: CONSTRAINT, handler: add_wire_bending_constraint },
    Command { name: "add_face_constraint", params: CONSTRAINT, handler: add_face_constraint },
    Command {
        name: "add_kinematic_attachment",
        params: &[
            Param::required("dynamic", ParamKind::Dynamic),
            Param::required("kinematic", ParamKind::Kinematic),
            Param::required("stiffness", ParamKind::Float),
            Param::required("damping", ParamKind::Float),
            Param::required("distance", ParamKind::Float),
        ],
        handler: add_kinematic_attachment,
    },
    Command {
        name: "add_dynamic_attachment",
        params: &[
            Param::required("dynamic0", ParamKind::Dynamic),
            Param::required("dynamic1", ParamKind::Dynamic),
            Param::required("stiffness", ParamKind::Float),
            Param::required("damping", ParamKind::Float),
            Param::required("distance", ParamKind::Float),
        ],
        handler: add_dynamic_attachment,
    },
    Command {
        name: "add_kinematic_collision",
        params: &[
            Param::required("dynamic", ParamKind::Dynamic),
            Param::required("kinematic", ParamKind::Kinematic),
            Param::required("stiffness", ParamKind::Float),
            Param::required("damping", ParamKind::Float),
        ],
        handler: add_kinematic_collision,
    },
    Command { name: "add_gravity", params: &[Param::required("gravity", ParamKind::Vector)], handler: add_gravity },
    Command { name: "initialize", params: &[], handler: initialize },
    Command { name: "solve_to_next_frame", params: &[], handler: solve_to_next_frame },
    Command { name: "get_positions", params: &[Param::required("dynamic", ParamKind::Dynamic)], handler: get_positions },
];

fn set_context(session: &mut Session, args: &Args) -> Result<Output> {
    session.context = args.context("context")?;
    Ok(Output::Value(Value::None))
}

fn get_context(session: &mut Session, _: &Args) -> Result<Output> {
    Ok(Output::Value(Value::Context(session.context)))
}

fn get_scene(session: &mut Session, _: &Args) -> Result<Output> {
    let scene = &session.scene;
    Ok(Output::Value(Value::Summary(SceneSummary {
        num_dynamics: scene.dynamics().len(),
        num_kinematics: scene.kinematics().len(),
        num_conditions: scene.conditions().len(),
        num_forces: scene.forces().len(),
        num_nodes: scene.num_nodes(),
        num_constraints: session.details.num_constraints(),
    })))
}

/// Handles of every dynamic, in scene order.
fn get_dynamic_handles(session: &mut Session, _: &Args) -> Result<Output> {
    let mut handles: alloc::vec::Vec<_> = session
        .objects
        .iter()
        .filter_map(|(handle, object)| match object {
            SceneObject::Dynamic(index) => Some((*index, handle)),
            _ => None,
        })
        .collect();
    handles.sort_unstable();
    Ok(Output::Value(Value::Handles(handles.into_iter().map(|(_, handle)| handle).collect())))
}

/// Drop every object and record. Handles issued so far become stale.
fn reset_scene(session: &mut Session, _: &Args) -> Result<Output> {
    session.scene.clear();
    session.details.clear();
    session.objects.clear();
    session.solver = Solver::new();
    tracing::debug!("scene reset");
    Ok(Output::Value(Value::None))
}

fn add_dynamic(session: &mut Session, args: &Args) -> Result<Output> {
    let shape = args.shape("shape")?.clone();
    let dynamic = Dynamic::new(&mut session.details, shape, args.float_or("node_mass", 1.0)?)?;
    Ok(Output::Object(SceneObject::Dynamic(session.scene.add_dynamic(dynamic))))
}

fn add_kinematic(session: &mut Session, args: &Args) -> Result<Output> {
    let position = args.vector_or("position", Vec2::zero())?;
    let rotation = args.float_or("rotation", 0.0)?;
    let shape = args.shape("shape")?;
    shape.validate()?;
    let mut kinematic = Kinematic::new(shape, position, rotation);
    if let Some(animator) = args.animator("animator")? {
        kinematic = kinematic.with_animator(animator);
    }
    Ok(Output::Object(SceneObject::Kinematic(session.scene.add_kinematic(kinematic))))
}

fn add_condition(session: &mut Session, args: &Args, kind: ConditionKind) -> Result<Output> {
    let condition = Condition::new(kind, args.float("stiffness")?, args.float("damping")?);
    Ok(Output::Object(SceneObject::Condition(session.scene.add_condition(condition)?)))
}

fn add_edge_constraint(session: &mut Session, args: &Args) -> Result<Output> {
    add_condition(session, args, ConditionKind::Edge { dynamic: args.dynamic("dynamic")? })
}

fn add_wire_bending_constraint(session: &mut Session, args: &Args) -> Result<Output> {
    add_condition(session, args, ConditionKind::WireBending { dynamic: args.dynamic("dynamic")? })
}

fn add_face_constraint(session: &mut Session, args: &Args) -> Result<Output> {
    add_condition(session, args, ConditionKind::Face { dynamic: args.dynamic("dynamic")? })
}

fn add_kinematic_attachment(session: &mut Session, args: &Args) -> Result<Output> {
    let kind = ConditionKind::KinematicAttachment {
        dynamic: args.dynamic("dynamic")?,
        kinematic: args.kinematic("kinematic")?,
        distance: args.float("distance")?,
    };
    add_condition(session, args, kind)
}

fn add_dynamic_attachment(session: &mut Session, args: &Args) -> Result<Output> {
    let kind = ConditionKind::DynamicAttachment {
        dynamics: [args.dynamic("dynamic0")?, args.dynamic("dynamic1")?],
        distance: args.float("distance")?,
    };
    add_condition(session, args, kind)
}

fn add_kinematic_collision(session: &mut Session, args: &Args) -> Result<Output> {
    let kind = ConditionKind::KinematicCollision {
        dynamic: args.dynamic("dynamic")?,
        kinematic: args.kinematic("kinematic")?,
    };
    add_condition(session, args, kind)
}

fn add_gravity(session: &mut Session, args: &Args) -> Result<Output> {
    let index = session.scene.add_force(Gravity::new(args.vector("gravity")?));
    Ok(Output::Object(SceneObject::Force(index)))
}

fn initialize(session: &mut Session, _: &Args) -> Result<Output> {
    let Session { scene, details, solver, context, .. } = session;
    solver.initialize(scene, details, context)?;
    Ok(Output::Value(Value::None))
}

fn solve_to_next_frame(session: &mut Session, _: &Args) -> Result<Output> {
    let Session { scene, details, solver, context, .. } = session;
    solver.solve_to_next_frame(scene, details, context, &mut NoOpStepObserver)?;
    Ok(Output::Value(Value::None))
}

fn get_positions(session: &mut Session, args: &Args) -> Result<Output> {
    let index = args.dynamic("dynamic")?;
    let dynamic = session.scene.dynamic(index).ok_or_else(|| {
        crate::error::ArgumentError::InvalidArgument { name: "dynamic".into(), expected: "a live dynamic" }
    })?;
    Ok(Output::Value(Value::Positions(dynamic.positions(&session.details)?)))
}
