/// Triangles over shared vertices, with cached bounds and face normal
use super::math::{is_valid_triangle, Aabb};
use super::vertex::Vertex;
use crate::material::MaterialId;
use glam::Vec3;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Triangle {
    v: [Arc<Vertex>; 3],
    pub material: Option<MaterialId>,
    // Computed at construction; vertices are immutable behind the Arc.
    aabb: Aabb,
    normal: Vec3,
}

impl Triangle {
    pub fn new(
        v1: Arc<Vertex>,
        v2: Arc<Vertex>,
        v3: Arc<Vertex>,
        material: Option<MaterialId>,
    ) -> Self {
        let p = [v1.pos.truncate(), v2.pos.truncate(), v3.pos.truncate()];
        let aabb = Aabb::new(&p);
        let normal = (p[1] - p[0]).cross(p[2] - p[0]).normalize_or_zero();
        Self {
            v: [v1, v2, v3],
            material,
            aabb,
            normal,
        }
    }

    pub fn from_vertices(v1: Vertex, v2: Vertex, v3: Vertex, material: Option<MaterialId>) -> Self {
        Self::new(Arc::new(v1), Arc::new(v2), Arc::new(v3), material)
    }

    /// Triangle list from an indexed vertex buffer.
    ///
    /// Panics if `indices.len()` is not a multiple of 3 or an index is out of
    /// range.
    pub fn from_indexed(
        vertices: &[Arc<Vertex>],
        indices: &[usize],
        material: Option<MaterialId>,
    ) -> Vec<Triangle> {
        assert!(
            indices.len() % 3 == 0,
            "index buffer length {} is not a multiple of 3",
            indices.len()
        );
        indices
            .chunks_exact(3)
            .map(|idx| {
                Triangle::new(
                    Arc::clone(&vertices[idx[0]]),
                    Arc::clone(&vertices[idx[1]]),
                    Arc::clone(&vertices[idx[2]]),
                    material,
                )
            })
            .collect()
    }

    #[inline]
    pub fn vertices(&self) -> &[Arc<Vertex>; 3] {
        &self.v
    }

    /// Object-space bounds.
    #[inline]
    pub fn aabb(&self) -> &Aabb {
        &self.aabb
    }

    /// Object-space face normal, counter-clockwise winding.
    #[inline]
    pub fn normal(&self) -> Vec3 {
        self.normal
    }

    pub fn is_valid(&self) -> bool {
        is_valid_triangle(
            self.v[0].pos.truncate(),
            self.v[1].pos.truncate(),
            self.v[2].pos.truncate(),
        )
    }
}
