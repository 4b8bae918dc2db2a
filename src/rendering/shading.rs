/// Vertex and fragment shader programs.
/// Kept separate from the rasterizer so transform and lighting models
/// can evolve independently of the rasterization pipeline.
use crate::color::Rgba;
use crate::geometry::{Fragment, Vertex};
use glam::Mat4;

/// Per-vertex stage. Receives a copy of the vertex and returns the
/// transformed copy with `pos` in clip space.
pub trait VertexShader: Send + Sync {
    fn vertex(&self, v: Vertex) -> Vertex;
}

/// Per-pixel stage. May read any fragment field; only the returned color is
/// kept.
pub trait FragmentShader: Send + Sync {
    fn fragment(&self, frag: &Fragment) -> Rgba;
}

impl<F> VertexShader for F
where
    F: Fn(Vertex) -> Vertex + Send + Sync,
{
    #[inline]
    fn vertex(&self, v: Vertex) -> Vertex {
        self(v)
    }
}

impl<F> FragmentShader for F
where
    F: Fn(&Fragment) -> Rgba + Send + Sync,
{
    #[inline]
    fn fragment(&self, frag: &Fragment) -> Rgba {
        self(frag)
    }
}

/// Model-view-projection transform.
#[derive(Copy, Clone, Debug)]
pub struct MvpShader {
    mvp: Mat4,
    normal: Mat4,
}

impl MvpShader {
    pub fn new(model: Mat4, view: Mat4, projection: Mat4) -> Self {
        Self {
            mvp: projection * view * model,
            normal: model.inverse().transpose(),
        }
    }

    /// Transform for geometry that is already in world space.
    pub fn from_view_projection(view_projection: Mat4) -> Self {
        Self {
            mvp: view_projection,
            normal: Mat4::IDENTITY,
        }
    }
}

impl VertexShader for MvpShader {
    #[inline]
    fn vertex(&self, mut v: Vertex) -> Vertex {
        v.pos = self.mvp * v.pos;
        v.nor = self.normal * v.nor.truncate().extend(0.0);
        v.nor.w = 0.0;
        v
    }
}

/// Passes the fragment's own color through.
#[derive(Copy, Clone, Debug, Default)]
pub struct IdentityShader;

impl FragmentShader for IdentityShader {
    #[inline]
    fn fragment(&self, frag: &Fragment) -> Rgba {
        frag.col
    }
}
