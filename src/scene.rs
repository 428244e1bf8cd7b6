//! Scene graph: dynamics, kinematics, conditions and global forces.
//!
//! The scene aggregates objects and owns their lifecycle; record storage
//! lives in [`SolverDetails`].

use crate::block::{BlockStore, Handles, Record, RecordId};
use crate::constraint::{self, AnchorSpring, Area, Bending, Spring};
use crate::details::SolverDetails;
use crate::error::{ArgumentError, Error, Result};
use crate::kernel::{KernelOptions, KernelRegistry};
use crate::kinematic::Kinematic;
use crate::node::{self, Node};
use crate::shape::Shape;
use crate::vec::{Vec, Vec2};
use alloc::string::ToString;
use alloc::vec::Vec as AllocVec;

/// A simulated shape: one node per vertex.
#[derive(Clone, Debug)]
pub struct Dynamic {
    /// Position in the scene's dynamic list.
    pub index: usize,
    pub node_mass: f64,
    shape: Shape,
    handles: Handles,
    node_ids: AllocVec<RecordId>,
}

impl Dynamic {
    /// Insert the shape's vertices as nodes of mass `node_mass`. A shape
    /// whose edges or faces name missing vertices is rejected before any
    /// node is created.
    pub fn new(details: &mut SolverDetails, shape: Shape, node_mass: f64) -> Result<Self> {
        shape.validate()?;
        let nodes = &mut details.nodes;
        let handles = nodes.grow(shape.num_vertices(), true);
        nodes.scatter_in("x", &shape.vertices, Some(&handles))?;
        nodes.fill("m", node_mass, Some(&handles))?;
        nodes.fill("im", if node_mass > 0.0 { 1.0 / node_mass } else { 0.0 }, Some(&handles))?;
        let node_ids = nodes.flatten::<RecordId>("id", Some(&handles))?;
        tracing::debug!(nodes = node_ids.len(), node_mass, "added dynamic");
        Ok(Dynamic { index: 0, shape, node_mass, handles, node_ids })
    }

    /// Number of nodes, one per shape vertex.
    pub fn num_nodes(&self) -> usize {
        self.node_ids.len()
    }

    /// The rest shape the nodes were created from.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Node ids, in vertex order.
    pub fn node_ids(&self) -> &[RecordId] {
        &self.node_ids
    }

    /// Handles of the node slots.
    pub fn handles(&self) -> &Handles {
        &self.handles
    }

    /// Current node positions, in vertex order.
    pub fn positions(&self, details: &SolverDetails) -> Result<AllocVec<Vec2<f64>>> {
        details.nodes.flatten("x", Some(&self.handles))
    }

    /// Current node velocities, in vertex order.
    pub fn velocities(&self, details: &SolverDetails) -> Result<AllocVec<Vec2<f64>>> {
        details.nodes.flatten("v", Some(&self.handles))
    }
}

/// What a condition creates constraints from.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ConditionKind {
    /// A spring per shape edge.
    Edge { dynamic: usize },
    /// A bending constraint per interior wire vertex.
    WireBending { dynamic: usize },
    /// An area constraint per face.
    Face { dynamic: usize },
    /// Anchor springs from nodes within `distance` of the kinematic surface.
    KinematicAttachment { dynamic: usize, kinematic: usize, distance: f64 },
    /// Springs from nodes of the first dynamic to the closest node of the
    /// second, within `distance`.
    DynamicAttachment { dynamics: [usize; 2], distance: f64 },
    /// Zero-length anchors pulling nodes inside the kinematic to its
    /// surface, re-seeded every step.
    KinematicCollision { dynamic: usize, kinematic: usize },
}

/// A group of constraints sharing stiffness and damping.
#[derive(Clone, Debug)]
pub struct Condition {
    /// Position in the scene's condition list.
    pub index: usize,
    pub kind: ConditionKind,
    pub stiffness: f64,
    pub damping: f64,
    handles: Handles,
}

impl Condition {
    /// A condition over scene objects; constraints are created by [`seed`](Self::seed).
    pub fn new(kind: ConditionKind, stiffness: f64, damping: f64) -> Self {
        Condition { index: 0, kind, stiffness, damping, handles: Handles::default() }
    }

    /// Static conditions create their constraints once; others are
    /// re-seeded before every step.
    pub fn is_static(&self) -> bool {
        !matches!(self.kind, ConditionKind::KinematicCollision { .. })
    }

    /// Constraint kind this condition produces.
    pub fn constraint_kind(&self) -> &'static str {
        match self.kind {
            ConditionKind::Edge { .. } | ConditionKind::DynamicAttachment { .. } => "spring",
            ConditionKind::WireBending { .. } => "bending",
            ConditionKind::Face { .. } => "area",
            ConditionKind::KinematicAttachment { .. } | ConditionKind::KinematicCollision { .. } => "anchor_spring",
        }
    }

    /// Slots of the constraints currently created by this condition.
    pub fn handles(&self) -> &Handles {
        &self.handles
    }

    /// Live constraints created by the last seeding.
    pub fn num_constraints(&self) -> usize {
        self.handles.len()
    }

    fn dynamics(&self) -> AllocVec<usize> {
        match self.kind {
            ConditionKind::Edge { dynamic }
            | ConditionKind::WireBending { dynamic }
            | ConditionKind::Face { dynamic }
            | ConditionKind::KinematicAttachment { dynamic, .. }
            | ConditionKind::KinematicCollision { dynamic, .. } => alloc::vec![dynamic],
            ConditionKind::DynamicAttachment { dynamics, .. } => dynamics.to_vec(),
        }
    }

    fn kinematic(&self) -> Option<usize> {
        match self.kind {
            ConditionKind::KinematicAttachment { kinematic, .. }
            | ConditionKind::KinematicCollision { kinematic, .. } => Some(kinematic),
            _ => None,
        }
    }

    /// Replace this condition's constraints with freshly created ones.
    /// Previous constraints are deactivated, their blocks reused.
    pub fn seed(&mut self, dynamics: &[Dynamic], kinematics: &[Kinematic], details: &mut SolverDetails) -> Result<()> {
        let (k, c) = (self.stiffness, self.damping);
        let nodes = &details.nodes;
        let dynamic = |index: usize| {
            dynamics.get(index).ok_or_else(|| invalid("dynamic", "an index into the scene dynamics"))
        };
        let kinematic = |index: usize| {
            kinematics.get(index).ok_or_else(|| invalid("kinematic", "an index into the scene kinematics"))
        };

        self.handles = match self.kind {
            ConditionKind::Edge { dynamic: d } => {
                let d = dynamic(d)?;
                let ids = d.node_ids();
                let x = positions(nodes, ids)?;
                let springs: AllocVec<Spring> = d
                    .shape
                    .edges
                    .iter()
                    .map(|&[a, b]| {
                        let (a, b) = (a as usize, b as usize);
                        Spring::between([ids[a], ids[b]], x[a], x[b], k, c)
                    })
                    .collect();
                replace(&mut details.springs, &self.handles, &springs)?
            }
            ConditionKind::WireBending { dynamic: d } => {
                let d = dynamic(d)?;
                let ids = d.node_ids();
                let x = positions(nodes, ids)?;
                let bendings: AllocVec<Bending> = d
                    .shape
                    .wire_triples()
                    .iter()
                    .map(|t| {
                        let [prev, mid, next] = t.map(|i| i as usize);
                        Bending::at_rest([ids[prev], ids[mid], ids[next]], [x[prev], x[mid], x[next]], k, c)
                    })
                    .collect();
                replace(&mut details.bendings, &self.handles, &bendings)?
            }
            ConditionKind::Face { dynamic: d } => {
                let d = dynamic(d)?;
                let ids = d.node_ids();
                let x = positions(nodes, ids)?;
                let areas: AllocVec<Area> = d
                    .shape
                    .faces
                    .iter()
                    .map(|f| {
                        let [i, j, l] = f.map(|i| i as usize);
                        Area::at_rest([ids[i], ids[j], ids[l]], [x[i], x[j], x[l]], k, c)
                    })
                    .collect();
                replace(&mut details.areas, &self.handles, &areas)?
            }
            ConditionKind::KinematicAttachment { dynamic: d, kinematic: ki, distance } => {
                let (d, kin) = (dynamic(d)?, kinematic(ki)?);
                let x = positions(nodes, d.node_ids())?;
                let mut anchors = AllocVec::new();
                for (id, x) in d.node_ids().iter().zip(&x) {
                    let Some(point) = kin.closest_parametric_point(*x) else { continue };
                    let Some(target) = kin.position_at(point) else { continue };
                    if target.distance(*x) <= distance {
                        anchors.push(AnchorSpring::to_point(*id, *x, ki as u32, point, target, k, c));
                    }
                }
                replace(&mut details.anchor_springs, &self.handles, &anchors)?
            }
            ConditionKind::DynamicAttachment { dynamics: [d0, d1], distance } => {
                let (d0, d1) = (dynamic(d0)?, dynamic(d1)?);
                let (x0, x1) = (positions(nodes, d0.node_ids())?, positions(nodes, d1.node_ids())?);
                let mut springs = AllocVec::new();
                for (i, p) in x0.iter().enumerate() {
                    let closest = x1
                        .iter()
                        .enumerate()
                        .map(|(j, q)| (j, p.distance(*q)))
                        .filter(|(_, dist)| *dist <= distance)
                        .min_by(|a, b| a.1.total_cmp(&b.1));
                    if let Some((j, _)) = closest {
                        springs.push(Spring::between([d0.node_ids()[i], d1.node_ids()[j]], *p, x1[j], k, c));
                    }
                }
                replace(&mut details.springs, &self.handles, &springs)?
            }
            ConditionKind::KinematicCollision { dynamic: d, kinematic: ki } => {
                let (d, kin) = (dynamic(d)?, kinematic(ki)?);
                let x = positions(nodes, d.node_ids())?;
                let mut anchors = AllocVec::new();
                for (id, x) in d.node_ids().iter().zip(&x) {
                    if !kin.is_inside(*x) {
                        continue;
                    }
                    let Some(point) = kin.closest_parametric_point(*x) else { continue };
                    let Some(target) = kin.position_at(point) else { continue };
                    let anchor = AnchorSpring::to_point(*id, *x, ki as u32, point, target, k, c);
                    anchors.push(AnchorSpring { rest_length: 0.0, ..anchor });
                }
                replace(&mut details.anchor_springs, &self.handles, &anchors)?
            }
        };

        tracing::debug!(
            condition = self.index,
            kind = self.constraint_kind(),
            constraints = self.handles.len(),
            "seeded condition"
        );
        Ok(())
    }
}

fn invalid(name: &str, expected: &'static str) -> Error {
    ArgumentError::InvalidArgument { name: name.to_string(), expected }.into()
}

fn positions(nodes: &BlockStore<Node>, ids: &[RecordId]) -> Result<AllocVec<Vec2<f64>>> {
    let positions: AllocVec<Vec2<f64>> = ids.iter().filter_map(|id| node::state(nodes, *id).map(|(x, _)| x)).collect();
    if positions.len() != ids.len() {
        return Err(Error::DanglingReference { count: ids.len() - positions.len() });
    }
    Ok(positions)
}

fn replace<C: Record>(
    store: &mut BlockStore<C>,
    previous: &Handles,
    records: &[C],
) -> Result<Handles> {
    store.set_active(false, Some(previous))?;
    constraint::insert(store, records)
}

/// Uniform acceleration applied to every node.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Gravity {
    pub acceleration: Vec2<f64>,
}

impl Gravity {
    /// Gravity with the given acceleration.
    pub fn new(acceleration: Vec2<f64>) -> Self {
        Gravity { acceleration }
    }
}

impl Default for Gravity {
    fn default() -> Self {
        Gravity::new(Vec2::new(0.0, -9.81))
    }
}

/// Global, unconditioned force contributions.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Force {
    Gravity(Gravity),
}

impl Force {
    /// Add this force to every active node. Returns the blocks visited.
    pub fn apply(&self, nodes: &mut BlockStore<Node>, kernels: &mut KernelRegistry) -> usize {
        match self {
            Force::Gravity(gravity) => kernels
                .compile::<Node, _>(node::apply_acceleration, KernelOptions::new().with_data_parallel(true))
                .run(nodes, &gravity.acceleration),
        }
    }
}

impl From<Gravity> for Force {
    fn from(gravity: Gravity) -> Self {
        Force::Gravity(gravity)
    }
}

/// Every object of a simulation.
#[derive(Clone, Debug, Default)]
pub struct Scene {
    dynamics: AllocVec<Dynamic>,
    kinematics: AllocVec<Kinematic>,
    conditions: AllocVec<Condition>,
    forces: AllocVec<Force>,
}

impl Scene {
    /// An empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every object. Storage is reset separately, see
    /// [`SolverDetails::clear`].
    pub fn clear(&mut self) {
        *self = Scene::default();
    }

    /// Add a dynamic and return its index.
    pub fn add_dynamic(&mut self, mut dynamic: Dynamic) -> usize {
        dynamic.index = self.dynamics.len();
        self.dynamics.push(dynamic);
        self.dynamics.len() - 1
    }

    /// Add a kinematic and return its index.
    pub fn add_kinematic(&mut self, mut kinematic: Kinematic) -> usize {
        kinematic.index = self.kinematics.len();
        self.kinematics.push(kinematic);
        self.kinematics.len() - 1
    }

    /// Add a condition after checking the objects it refers to exist.
    pub fn add_condition(&mut self, mut condition: Condition) -> Result<usize> {
        if let Some(&d) = condition.dynamics().iter().find(|&&d| d >= self.dynamics.len()) {
            return Err(ArgumentError::InvalidArgument {
                name: alloc::format!("dynamic {d}"),
                expected: "an index into the scene dynamics",
            }
            .into());
        }
        if let Some(k) = condition.kinematic().filter(|&k| k >= self.kinematics.len()) {
            return Err(ArgumentError::InvalidArgument {
                name: alloc::format!("kinematic {k}"),
                expected: "an index into the scene kinematics",
            }
            .into());
        }
        condition.index = self.conditions.len();
        self.conditions.push(condition);
        Ok(self.conditions.len() - 1)
    }

    /// Add a global force and return its index.
    pub fn add_force(&mut self, force: impl Into<Force>) -> usize {
        self.forces.push(force.into());
        self.forces.len() - 1
    }

    /// Dynamics, by index.
    pub fn dynamics(&self) -> &[Dynamic] {
        &self.dynamics
    }

    /// Kinematics, by index.
    pub fn kinematics(&self) -> &[Kinematic] {
        &self.kinematics
    }

    /// Conditions, by index.
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Global forces, by index.
    pub fn forces(&self) -> &[Force] {
        &self.forces
    }

    /// The dynamic at `index`.
    pub fn dynamic(&self, index: usize) -> Option<&Dynamic> {
        self.dynamics.get(index)
    }

    /// The kinematic at `index`.
    pub fn kinematic(&self, index: usize) -> Option<&Kinematic> {
        self.kinematics.get(index)
    }

    /// Nodes over every dynamic.
    pub fn num_nodes(&self) -> usize {
        self.dynamics.iter().map(Dynamic::num_nodes).sum()
    }

    /// Place every kinematic at its animated transform for `time`, with
    /// zero velocity.
    pub fn init_kinematics(&mut self, time: f64) {
        for kinematic in self.kinematics.iter_mut() {
            kinematic.init(time);
        }
    }

    /// Advance every kinematic to `time`; velocities span the last `dt`.
    pub fn update_kinematics(&mut self, time: f64, dt: f64) {
        for kinematic in self.kinematics.iter_mut() {
            kinematic.update(time, dt);
        }
    }

    /// Create the constraints of every condition.
    pub fn init_conditions(&mut self, details: &mut SolverDetails) -> Result<()> {
        for condition in self.conditions.iter_mut() {
            condition.seed(&self.dynamics, &self.kinematics, details)?;
        }
        Ok(())
    }

    /// Re-seed the conditions that change over time.
    pub fn update_conditions(&mut self, details: &mut SolverDetails) -> Result<()> {
        for condition in self.conditions.iter_mut().filter(|c| !c.is_static()) {
            condition.seed(&self.dynamics, &self.kinematics, details)?;
        }
        Ok(())
    }
}
