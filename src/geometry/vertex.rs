/// Vertex data and named custom attributes
use crate::color::Rgba;
use glam::{Vec2, Vec3, Vec4};

/// Dynamically typed attribute payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Varying {
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
}

impl Varying {
    /// Weighted sum of three values of the same kind. `None` on a kind mismatch.
    pub fn weighted_sum(values: [&Varying; 3], w: [f32; 3]) -> Option<Varying> {
        use Varying::*;
        Some(match (values[0], values[1], values[2]) {
            (Float(a), Float(b), Float(c)) => Float(a * w[0] + b * w[1] + c * w[2]),
            (Vec2(a), Vec2(b), Vec2(c)) => Vec2(*a * w[0] + *b * w[1] + *c * w[2]),
            (Vec3(a), Vec3(b), Vec3(c)) => Vec3(*a * w[0] + *b * w[1] + *c * w[2]),
            (Vec4(a), Vec4(b), Vec4(c)) => Vec4(*a * w[0] + *b * w[1] + *c * w[2]),
            _ => return None,
        })
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Varying::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vec4(&self) -> Option<Vec4> {
        match self {
            Varying::Vec4(v) => Some(*v),
            _ => None,
        }
    }
}

/// Small insertion-ordered map from attribute name to value.
///
/// Attribute sets are tiny (a handful of entries), so a linear scan beats
/// hashing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttrMap {
    entries: Vec<(&'static str, Varying)>,
}

impl AttrMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Varying> {
        self.entries.iter().find(|(k, _)| *k == name).map(|(_, v)| v)
    }

    /// Insert or replace, returning the previous value.
    pub fn insert(&mut self, name: &'static str, value: Varying) -> Option<Varying> {
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == name) {
            return Some(std::mem::replace(&mut slot.1, value));
        }
        self.entries.push((name, value));
        None
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Varying)> + '_ {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Blend the attributes present in all three maps.
    ///
    /// Keys come from `maps[0]`; a key missing from another map, or stored
    /// with a different kind, is dropped. Each weight is multiplied into the
    /// value and the sum divided by `norm`.
    pub fn blend(maps: [&AttrMap; 3], w: [f32; 3], norm: f32) -> AttrMap {
        let mut out = AttrMap {
            entries: Vec::with_capacity(maps[0].len()),
        };
        for (name, v0) in maps[0].iter() {
            let (Some(v1), Some(v2)) = (maps[1].get(name), maps[2].get(name)) else {
                continue;
            };
            let scaled = [w[0] / norm, w[1] / norm, w[2] / norm];
            if let Some(v) = Varying::weighted_sum([v0, v1, v2], scaled) {
                out.entries.push((name, v));
            }
        }
        out
    }
}

/// Mesh vertex. `pos` is homogeneous, `nor.w` is 0.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    pub pos: Vec4,
    pub nor: Vec4,
    pub col: Rgba,
    pub uv: Vec2,
    /// Perspective-interpolated custom attributes.
    pub attr_smooth: AttrMap,
    /// Taken from the provoking (first) vertex, never interpolated.
    pub attr_flat: AttrMap,
}

impl Default for Vertex {
    fn default() -> Self {
        Self {
            pos: Vec4::W,
            nor: Vec4::ZERO,
            col: Rgba::TRANSPARENT,
            uv: Vec2::ZERO,
            attr_smooth: AttrMap::new(),
            attr_flat: AttrMap::new(),
        }
    }
}

impl Vertex {
    pub fn new(pos: Vec3) -> Self {
        Self {
            pos: pos.extend(1.0),
            ..Self::default()
        }
    }

    pub fn with_normal(mut self, nor: Vec3) -> Self {
        self.nor = nor.extend(0.0);
        self
    }

    pub fn with_color(mut self, col: Rgba) -> Self {
        self.col = col;
        self
    }

    pub fn with_uv(mut self, uv: Vec2) -> Self {
        self.uv = uv;
        self
    }
}
