/// Per-pixel rasterization output
use super::vertex::AttrMap;
use crate::color::Rgba;
use crate::material::MaterialId;
use glam::{Vec2, Vec4};

/// One rasterized sample. The zero value (`ok == false`) marks an empty pixel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    pub ok: bool,
    pub x: i32,
    pub y: i32,
    /// Normalized to `[0, 1]`; larger is nearer.
    pub depth: f32,
    pub uv: Vec2,
    /// Squared UV change for one pixel step along x.
    pub du: f32,
    /// Squared UV change for one pixel step along y.
    pub dv: f32,
    pub nor: Vec4,
    pub col: Rgba,
    pub material: Option<MaterialId>,
    pub attr_smooth: AttrMap,
    pub attr_flat: AttrMap,
}

impl Fragment {
    /// Mip level for a texture of `texture_size` texels along one side.
    #[inline]
    pub fn mip_level(&self, texture_size: f32) -> f32 {
        let rho = texture_size * self.du.max(self.dv).max(0.0).sqrt();
        rho.max(1.0).log2()
    }
}
