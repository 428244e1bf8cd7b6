//! Polygonal shapes: vertices, edges and triangle faces.

use crate::error::{ArgumentError, Result};
use crate::vec::{Vec, Vec2};
use alloc::string::ToString;
use alloc::vec::Vec as AllocVec;

/// A 2D mesh. Faces are counter-clockwise triangles.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Shape {
    pub vertices: AllocVec<Vec2<f64>>,
    pub edges: AllocVec<[u32; 2]>,
    pub faces: AllocVec<[u32; 3]>,
}

impl Shape {
    /// Build a shape, checking that every index names a vertex.
    pub fn new(vertices: AllocVec<Vec2<f64>>, edges: AllocVec<[u32; 2]>, faces: AllocVec<[u32; 3]>) -> Result<Self> {
        let shape = Shape { vertices, edges, faces };
        shape.validate()?;
        Ok(shape)
    }

    /// Check that every edge and face index names a vertex.
    pub fn validate(&self) -> Result<()> {
        let n = self.vertices.len();
        let in_range = |index: &u32| (*index as usize) < n;
        if !self.edges.iter().flatten().all(in_range) {
            return Err(ArgumentError::InvalidArgument { name: "edges".to_string(), expected: "vertex indices" }.into());
        }
        if !self.faces.iter().flatten().all(in_range) {
            return Err(ArgumentError::InvalidArgument { name: "faces".to_string(), expected: "vertex indices" }.into());
        }
        Ok(())
    }

    /// A polyline of `segments` equal edges from `start` to `end`.
    pub fn wire(start: Vec2<f64>, end: Vec2<f64>, segments: usize) -> Self {
        let segments = segments.max(1);
        let vertices = (0..=segments)
            .map(|i| start.lerp(end, i as f64 / segments as f64))
            .collect();
        let edges = (0..segments as u32).map(|i| [i, i + 1]).collect();
        Shape { vertices, edges, faces: AllocVec::new() }
    }

    /// Axis-aligned rectangle split into two triangles along its diagonal.
    pub fn rectangle(min: Vec2<f64>, max: Vec2<f64>) -> Self {
        Shape {
            vertices: alloc::vec![min, Vec2::new(max.x, min.y), max, Vec2::new(min.x, max.y)],
            edges: alloc::vec![[0, 1], [1, 2], [2, 3], [3, 0], [0, 2]],
            faces: alloc::vec![[0, 1, 2], [0, 2, 3]],
        }
    }

    /// Regular grid of `cells_x × cells_y` cells with its lower-left corner
    /// at `position`; two triangles and one diagonal per cell.
    pub fn beam(position: Vec2<f64>, width: f64, height: f64, cells_x: usize, cells_y: usize) -> Self {
        let (cells_x, cells_y) = (cells_x.max(1), cells_y.max(1));
        let columns = cells_x + 1;
        let index = |i: usize, j: usize| (j * columns + i) as u32;

        let mut shape = Shape::default();
        for j in 0..=cells_y {
            for i in 0..=cells_x {
                shape.vertices.push(Vec2::new(
                    position.x + width * i as f64 / cells_x as f64,
                    position.y + height * j as f64 / cells_y as f64,
                ));
            }
        }
        for j in 0..=cells_y {
            for i in 0..=cells_x {
                if i < cells_x {
                    shape.edges.push([index(i, j), index(i + 1, j)]);
                }
                if j < cells_y {
                    shape.edges.push([index(i, j), index(i, j + 1)]);
                }
                if i < cells_x && j < cells_y {
                    let (a, b, c, d) = (index(i, j), index(i + 1, j), index(i + 1, j + 1), index(i, j + 1));
                    shape.edges.push([a, c]);
                    shape.faces.push([a, b, c]);
                    shape.faces.push([a, c, d]);
                }
            }
        }
        shape
    }

    /// Number of vertices.
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Boundary edges, oriented counter-clockwise: edges used by exactly
    /// one face. A shape without faces is all boundary.
    pub fn surface_edges(&self) -> AllocVec<[u32; 2]> {
        if self.faces.is_empty() {
            return self.edges.clone();
        }
        let directed: AllocVec<[u32; 2]> = self
            .faces
            .iter()
            .flat_map(|&[a, b, c]| [[a, b], [b, c], [c, a]])
            .collect();
        directed
            .iter()
            .filter(|&&[a, b]| {
                directed.iter().filter(|e| **e == [a, b] || **e == [b, a]).count() == 1
            })
            .copied()
            .collect()
    }

    /// Vertex centroid.
    pub fn centroid(&self) -> Vec2<f64> {
        if self.vertices.is_empty() {
            return Vec2::zero();
        }
        let sum = self.vertices.iter().fold(Vec2::zero(), |acc, v| acc + *v);
        sum.scale(1.0 / self.vertices.len() as f64)
    }

    /// Move the shape so its centroid sits at the origin and return the
    /// former centroid, to be used as the object's position.
    pub fn extract_transform(&mut self) -> Vec2<f64> {
        let centroid = self.centroid();
        for v in self.vertices.iter_mut() {
            *v = *v - centroid;
        }
        centroid
    }

    /// `[previous, vertex, next]` for every vertex with exactly two
    /// neighbours, as along a wire.
    pub fn wire_triples(&self) -> AllocVec<[u32; 3]> {
        let mut neighbours: AllocVec<AllocVec<u32>> = alloc::vec![AllocVec::new(); self.vertices.len()];
        for &[a, b] in &self.edges {
            neighbours[a as usize].push(b);
            neighbours[b as usize].push(a);
        }
        neighbours
            .iter()
            .enumerate()
            .filter(|(_, n)| n.len() == 2)
            .map(|(v, n)| [n[0], v as u32, n[1]])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_vertices_are_evenly_spaced() {
        let wire = Shape::wire(Vec2::new(0.0, 2.0), Vec2::new(0.0, -2.0), 4);
        assert_eq!(wire.num_vertices(), 5);
        assert_eq!(wire.edges.len(), 4);
        assert_eq!(wire.vertices[2], Vec2::new(0.0, 0.0));
        assert_eq!(wire.surface_edges(), wire.edges);
    }

    #[test]
    fn wire_triples_follow_the_chain() {
        let wire = Shape::wire(Vec2::new(0.0, 0.0), Vec2::new(3.0, 0.0), 3);
        assert_eq!(wire.wire_triples(), alloc::vec![[0, 1, 2], [1, 2, 3]]);
    }

    #[test]
    fn rectangle_surface_excludes_diagonal() {
        let rect = Shape::rectangle(Vec2::new(0.0, 0.0), Vec2::new(2.0, 1.0));
        let surface = rect.surface_edges();
        assert_eq!(surface.len(), 4);
        assert!(!surface.contains(&[0, 2]) && !surface.contains(&[2, 0]));
    }

    #[test]
    fn beam_counts() {
        let beam = Shape::beam(Vec2::new(-4.0, 0.0), 8.0, 1.0, 6, 4);
        assert_eq!(beam.num_vertices(), 7 * 5);
        assert_eq!(beam.faces.len(), 6 * 4 * 2);
        assert_eq!(beam.edges.len(), 6 * 5 + 7 * 4 + 6 * 4);
        assert_eq!(beam.surface_edges().len(), 2 * (6 + 4));
    }

    #[test]
    fn extract_transform_centers_shape() {
        let mut rect = Shape::rectangle(Vec2::new(1.0, 1.0), Vec2::new(3.0, 2.0));
        let position = rect.extract_transform();
        assert_eq!(position, Vec2::new(2.0, 1.5));
        assert_eq!(rect.centroid(), Vec2::zero());
    }

    #[test]
    fn invalid_indices_rejected() {
        let result = Shape::new(alloc::vec![Vec2::zero()], alloc::vec![[0, 1]], AllocVec::new());
        assert!(result.is_err());
    }

    #[test]
    fn hand_built_face_out_of_range() {
        let shape = Shape {
            vertices: alloc::vec![Vec2::zero(), Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)],
            edges: alloc::vec![[0, 1]],
            faces: alloc::vec![[0, 1, 3]],
        };
        assert!(shape.validate().is_err());
    }
}
