/// Sutherland-Hodgman clipping against the screen-space view volume
/// `[0, w] x [0, h] x [-1, 1]` (pixel x, pixel y, NDC z)
use crate::geometry::barycoord;
use glam::{Vec3, Vec4};

// A triangle clipped by six planes has at most 9 vertices.
pub const MAX_POLY_VERTS: usize = 12;

/// Fixed-capacity convex polygon.
#[derive(Debug, Clone, Copy)]
pub struct Polygon {
    verts: [Vec3; MAX_POLY_VERTS],
    len: usize,
}

impl Polygon {
    pub fn from_triangle(tri: [Vec3; 3]) -> Self {
        let mut verts = [Vec3::ZERO; MAX_POLY_VERTS];
        verts[..3].copy_from_slice(&tri);
        Self { verts, len: 3 }
    }

    fn empty() -> Self {
        Self {
            verts: [Vec3::ZERO; MAX_POLY_VERTS],
            len: 0,
        }
    }

    #[inline]
    fn push(&mut self, v: Vec3) {
        if self.len < MAX_POLY_VERTS {
            self.verts[self.len] = v;
            self.len += 1;
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn vertices(&self) -> &[Vec3] {
        &self.verts[..self.len]
    }

    /// Fan triangulation around vertex 0. Fewer than 3 vertices yield nothing.
    pub fn fan(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        let v = self.vertices();
        (1..v.len().saturating_sub(1)).map(move |i| [v[0], v[i], v[i + 1]])
    }
}

/// Clip plane through `pos`; points with `(p - pos) . nor >= 0` are kept.
#[derive(Debug, Clone, Copy)]
struct Plane {
    pos: Vec3,
    nor: Vec3,
}

impl Plane {
    #[inline]
    fn distance(&self, p: Vec3) -> f32 {
        (p - self.pos).dot(self.nor)
    }

    /// Intersection of segment `v0 -> v1` with the plane.
    #[inline]
    fn intersect(&self, v0: Vec3, v1: Vec3) -> Vec3 {
        let dir = v1 - v0;
        let s = -self.nor.dot(v0 - self.pos) / self.nor.dot(dir);
        v0 + dir * s
    }
}

fn view_planes(width: f32, height: f32) -> [Plane; 6] {
    [
        Plane { pos: Vec3::ZERO, nor: Vec3::X },
        Plane { pos: Vec3::new(width, 0.0, 0.0), nor: Vec3::NEG_X },
        Plane { pos: Vec3::ZERO, nor: Vec3::Y },
        Plane { pos: Vec3::new(0.0, height, 0.0), nor: Vec3::NEG_Y },
        Plane { pos: Vec3::new(0.0, 0.0, -1.0), nor: Vec3::Z },
        Plane { pos: Vec3::new(0.0, 0.0, 1.0), nor: Vec3::NEG_Z },
    ]
}

fn clip_against(poly: &Polygon, plane: &Plane) -> Polygon {
    let mut out = Polygon::empty();
    let v = poly.vertices();
    let Some(&last) = v.last() else {
        return out;
    };

    let mut prev = last;
    let mut prev_in = plane.distance(prev) >= 0.0;
    for &cur in v {
        let cur_in = plane.distance(cur) >= 0.0;
        if cur_in != prev_in {
            out.push(plane.intersect(prev, cur));
        }
        if cur_in {
            out.push(cur);
        }
        prev = cur;
        prev_in = cur_in;
    }
    out
}

/// Clip a screen-space triangle to the view volume.
pub fn clip_polygon(tri: [Vec3; 3], width: f32, height: f32) -> Polygon {
    let mut poly = Polygon::from_triangle(tri);
    for plane in &view_planes(width, height) {
        poly = clip_against(&poly, plane);
        if poly.is_empty() {
            break;
        }
    }
    poly
}

/// A piece of a clipped triangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClippedTriangle {
    pub pos: [Vec3; 3],
    /// Barycentric weights of each corner against the unclipped triangle.
    pub weights: [[f32; 3]; 3],
}

/// Clip and re-triangulate. Every output corner carries its barycentric
/// weights against `tri` so attributes can be rebuilt from the originals.
pub fn clip_triangle(tri: [Vec3; 3], width: f32, height: f32) -> Vec<ClippedTriangle> {
    let poly = clip_polygon(tri, width, height);
    let (a, b, c) = (tri[0].truncate(), tri[1].truncate(), tri[2].truncate());
    poly.fan()
        .map(|pos| ClippedTriangle {
            pos,
            weights: pos.map(|p| barycoord(p.truncate(), a, b, c)),
        })
        .collect()
}

const BASIS: [[f32; 3]; 3] = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// Clip a clip-space triangle against the near plane `z >= w` (NDC z <= 1)
/// before the perspective divide, which also removes everything behind the
/// eye. Returns the barycentric weights, against `clip`, of each corner of the
/// 0, 1 or 2 resulting triangles. Winding is preserved.
pub fn clip_near(clip: [Vec4; 3]) -> Vec<[[f32; 3]; 3]> {
    let dist = clip.map(|p| p.z - p.w);
    let mut poly: Vec<[f32; 3]> = Vec::with_capacity(4);
    for i in 0..3 {
        let prev = (i + 2) % 3;
        let (cur_in, prev_in) = (dist[i] >= 0.0, dist[prev] >= 0.0);
        if cur_in != prev_in {
            let t = dist[prev] / (dist[prev] - dist[i]);
            let (a, b) = (BASIS[prev], BASIS[i]);
            poly.push([0, 1, 2].map(|k| a[k] + (b[k] - a[k]) * t));
        }
        if cur_in {
            poly.push(BASIS[i]);
        }
    }
    (1..poly.len().saturating_sub(1))
        .map(|k| [poly[0], poly[k], poly[k + 1]])
        .collect()
}
