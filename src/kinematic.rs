//! Kinematics: animated rigid shapes that constraints attach to or collide with.

use crate::float::Float;
use crate::mat::{Mat, Mat2};
use crate::shape::Shape;
use crate::vec::{Vec, Vec2};
use alloc::sync::Arc;
use alloc::vec::Vec as AllocVec;
use core::fmt;

/// A point on a kinematic surface: surface edge `index`, parameter `t` in `[0, 1]`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ParametricPoint {
    pub index: u32,
    pub t: f64,
}

/// Rigid transform of a kinematic and its finite-difference velocities.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct State {
    pub position: Vec2<f64>,
    /// Degrees, counter-clockwise.
    pub rotation: f64,
    pub linear_velocity: Vec2<f64>,
    /// Degrees per second.
    pub angular_velocity: f64,
    pub rotation_matrix: Mat2<f64>,
    pub inverse_rotation_matrix: Mat2<f64>,
}

impl State {
    /// A state at rest at `position` and `rotation` degrees.
    pub fn new(position: Vec2<f64>, rotation: f64) -> Self {
        let mut state = State {
            position,
            rotation,
            linear_velocity: Vec2::zero(),
            angular_velocity: 0.0,
            rotation_matrix: Mat2::identity(),
            inverse_rotation_matrix: Mat2::identity(),
        };
        state.update(position, rotation, 0.0);
        state
    }

    /// Move to a new transform. With a positive `dt`, velocities are the
    /// finite differences from the previous transform, taking the shortest
    /// way around for the rotation.
    pub fn update(&mut self, position: Vec2<f64>, rotation: f64, dt: f64) {
        if dt > 0.0 {
            let inv_dt = 1.0 / dt;
            self.linear_velocity = (position - self.position).scale(inv_dt);
            let mut delta = Float::rem(rotation - self.rotation, 360.0);
            if delta > 180.0 {
                delta -= 360.0;
            } else if delta < -180.0 {
                delta += 360.0;
            }
            self.angular_velocity = delta * inv_dt;
        }
        self.position = position;
        self.rotation = rotation;
        self.rotation_matrix = Mat2::rotation(rotation);
        self.inverse_rotation_matrix = Mat2::rotation(-rotation);
    }

    /// Map a local-space point to world space.
    pub fn to_world(&self, local: Vec2<f64>) -> Vec2<f64> {
        self.rotation_matrix.mul_vec(local) + self.position
    }

    /// Map a world-space point to local space.
    pub fn to_local(&self, world: Vec2<f64>) -> Vec2<f64> {
        self.inverse_rotation_matrix.mul_vec(world - self.position)
    }
}

/// Samples a kinematic's transform `(position, rotation in degrees)` at a time.
pub trait Animator: Send + Sync {
    fn sample(&self, time: f64) -> (Vec2<f64>, f64);
}

impl<F> Animator for F
where
    F: Fn(f64) -> (Vec2<f64>, f64) + Send + Sync,
{
    fn sample(&self, time: f64) -> (Vec2<f64>, f64) {
        self(time)
    }
}

/// An animated rigid shape. Geometry is kept in local space.
#[derive(Clone)]
pub struct Kinematic {
    /// Position in the scene's kinematic list.
    pub index: usize,
    pub state: State,
    vertices: AllocVec<Vec2<f64>>,
    edges: AllocVec<[u32; 2]>,
    faces: AllocVec<[u32; 3]>,
    surface_edges: AllocVec<[u32; 2]>,
    animator: Option<Arc<dyn Animator>>,
}

impl fmt::Debug for Kinematic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kinematic")
            .field("index", &self.index)
            .field("state", &self.state)
            .field("vertices", &self.vertices.len())
            .field("animated", &self.animator.is_some())
            .finish_non_exhaustive()
    }
}

impl Kinematic {
    /// `shape` is in local space; see [`Shape::extract_transform`].
    pub fn new(shape: &Shape, position: Vec2<f64>, rotation: f64) -> Self {
        Kinematic {
            index: 0,
            state: State::new(position, rotation),
            vertices: shape.vertices.clone(),
            edges: shape.edges.clone(),
            faces: shape.faces.clone(),
            surface_edges: shape.surface_edges(),
            animator: None,
        }
    }

    /// Drive the transform from `animator`.
    pub fn with_animator(mut self, animator: Arc<dyn Animator>) -> Self {
        self.animator = Some(animator);
        self
    }

    /// Whether an animator drives this kinematic.
    pub fn is_animated(&self) -> bool {
        self.animator.is_some()
    }

    /// Sample the animator at `time`. Without an animator the kinematic
    /// stays where it is, at rest.
    pub fn update(&mut self, time: f64, dt: f64) {
        match &self.animator {
            Some(animator) => {
                let (position, rotation) = animator.sample(time);
                self.state.update(position, rotation, dt);
            }
            None => {
                let state = self.state;
                self.state.update(state.position, state.rotation, dt);
            }
        }
    }

    /// Sample the animator at `time` and come to rest there.
    pub fn init(&mut self, time: f64) {
        self.update(time, 0.0);
        self.state.linear_velocity = Vec2::zero();
        self.state.angular_velocity = 0.0;
    }

    /// The shape in world space.
    pub fn shape(&self) -> Shape {
        Shape {
            vertices: self.vertices.iter().map(|v| self.state.to_world(*v)).collect(),
            edges: self.edges.clone(),
            faces: self.faces.clone(),
        }
    }

    fn edge(&self, index: u32) -> Option<(Vec2<f64>, Vec2<f64>)> {
        let [a, b] = *self.surface_edges.get(index as usize)?;
        Some((*self.vertices.get(a as usize)?, *self.vertices.get(b as usize)?))
    }

    /// Closest point on the surface to a world-space point; `None` for a
    /// shape without edges.
    pub fn closest_parametric_point(&self, point: Vec2<f64>) -> Option<ParametricPoint> {
        let local = self.state.to_local(point);
        let mut closest: Option<(ParametricPoint, f64)> = None;
        for index in 0..self.surface_edges.len() as u32 {
            let Some((a, b)) = self.edge(index) else { continue };
            let dir = b - a;
            let length_sq = dir.length_sq();
            let t = if length_sq > 0.0 { ((local - a).dot(dir) / length_sq).clamp(0.0, 1.0) } else { 0.0 };
            let distance_sq = local.distance_sq(a.lerp(b, t));
            if closest.map_or(true, |(_, best)| distance_sq < best) {
                closest = Some((ParametricPoint { index, t }, distance_sq));
            }
        }
        closest.map(|(point, _)| point)
    }

    /// World position of a surface point.
    pub fn position_at(&self, point: ParametricPoint) -> Option<Vec2<f64>> {
        let (a, b) = self.edge(point.index)?;
        Some(self.state.to_world(a.lerp(b, point.t)))
    }

    /// Outward unit normal of the surface edge holding `point`, in world space.
    pub fn normal_at(&self, point: ParametricPoint) -> Option<Vec2<f64>> {
        let (a, b) = self.edge(point.index)?;
        let tangent = b - a;
        let outward = Vec2::new(tangent.y, -tangent.x).normalize();
        Some(self.state.rotation_matrix.mul_vec(outward))
    }

    /// Whether a world-space point lies inside the (convex) shape.
    pub fn is_inside(&self, point: Vec2<f64>) -> bool {
        if self.faces.is_empty() || self.surface_edges.is_empty() {
            return false;
        }
        let local = self.state.to_local(point);
        (0..self.surface_edges.len() as u32).all(|index| match self.edge(index) {
            Some((a, b)) => (b - a).cross(local - a) >= 0.0,
            None => false,
        })
    }
}
