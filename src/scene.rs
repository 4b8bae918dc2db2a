/// Scene description consumed by the renderer
use crate::camera::Camera;
use crate::geometry::{Aabb, Triangle};
use crate::material::MaterialArena;
use glam::{Mat4, Vec3};
use std::sync::Arc;

/// Triangle list with a model transform.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub triangles: Arc<[Triangle]>,
    pub model: Mat4,
    pub cast_shadow: bool,
}

impl Mesh {
    pub fn new(triangles: Vec<Triangle>) -> Self {
        Self {
            triangles: triangles.into(),
            model: Mat4::IDENTITY,
            cast_shadow: true,
        }
    }

    pub fn with_model(mut self, model: Mat4) -> Self {
        self.model = model;
        self
    }

    /// Object-space bounds of all triangles.
    pub fn aabb(&self) -> Aabb {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for t in self.triangles.iter() {
            min = min.min(t.aabb().min);
            max = max.max(t.aabb().max);
        }
        Aabb::from_min_max(min, max)
    }
}

/// Shadow-casting light, described by the camera it renders depth from.
#[derive(Debug, Clone, Copy)]
pub struct Light {
    pub camera: Camera,
    pub cast_shadow: bool,
}

impl Light {
    pub fn new(camera: Camera) -> Self {
        Self {
            camera,
            cast_shadow: true,
        }
    }
}

pub struct Scene {
    pub camera: Camera,
    pub meshes: Vec<Mesh>,
    pub lights: Vec<Light>,
    pub materials: Arc<MaterialArena>,
}

impl Scene {
    pub fn new(camera: Camera) -> Self {
        Self {
            camera,
            meshes: Vec::new(),
            lights: Vec::new(),
            materials: Arc::new(MaterialArena::new()),
        }
    }

    pub fn add_mesh(&mut self, mesh: Mesh) {
        self.meshes.push(mesh);
    }

    pub fn add_light(&mut self, light: Light) {
        self.lights.push(light);
    }

    /// Visit meshes in order until `f` returns `false`. Returns whether the
    /// traversal ran to the end.
    pub fn visit_meshes<F>(&self, mut f: F) -> bool
    where
        F: FnMut(&Mesh) -> bool,
    {
        for mesh in &self.meshes {
            if !f(mesh) {
                return false;
            }
        }
        true
    }

    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(|m| m.triangles.len()).sum()
    }
}
