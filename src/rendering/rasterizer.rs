/// Triangle rasterizer with perspective-correct interpolation
/// Linear per-triangle pipeline: vertex shading, viewport transform,
/// back-face cull, frustum test, clip, then a bounding-box pixel walk
/// with an early depth test before any attribute work
use super::clipping::{clip_near, clip_triangle};
use super::framebuffer::FragmentBuffer;
use super::shading::VertexShader;
use crate::color::Rgba;
use crate::count_call;
use crate::geometry::{barycoord, interpolate, viewport_matrix, Aabb, AttrMap, Fragment, Triangle, Vertex};
use crate::material::MaterialId;
use crate::perf::FUNCTION_COUNTERS;
use glam::{Vec2, Vec3, Vec4};

/// Slack on the inside test so shared edges never leave seams.
const INSIDE_EPS: f32 = 1e-7;

/// Vertices at or behind the eye plane cannot be projected.
const NEAR_W_EPS: f32 = 1e-6;

/// Outcome of `draw_primitive`, mostly useful for tests and counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawResult {
    Drawn,
    BackFace,
    OutsideFrustum,
}

/// A triangle after vertex shading and the viewport transform.
#[derive(Debug, Clone)]
struct ScreenTriangle {
    /// Pixel-space x/y, NDC z.
    pos: [Vec3; 3],
    /// `-1/w` of each vertex under perspective, 1 otherwise.
    recip: [f32; 3],
    verts: [Vertex; 3],
}

impl ScreenTriangle {
    /// Corner of a clipped piece, rebuilt from the original corners with
    /// barycentric weights `w` taken in screen space.
    fn blend_vertex(&self, pos: Vec3, w: [f32; 3], perspective: bool) -> (Vertex, f32) {
        let recip = w[0] * self.recip[0] + w[1] * self.recip[1] + w[2] * self.recip[2];
        let pw = [w[0] * self.recip[0], w[1] * self.recip[1], w[2] * self.recip[2]];
        let norm = if perspective { recip } else { 1.0 };
        let v = &self.verts;

        let col = (col_vec(v[0].col) * pw[0] + col_vec(v[1].col) * pw[1] + col_vec(v[2].col) * pw[2]) / norm;
        let vertex = Vertex {
            pos: pos.extend(1.0),
            nor: (v[0].nor * pw[0] + v[1].nor * pw[1] + v[2].nor * pw[2]) / norm,
            col: vec_col(col),
            uv: (v[0].uv * pw[0] + v[1].uv * pw[1] + v[2].uv * pw[2]) / norm,
            attr_smooth: AttrMap::blend(
                [&v[0].attr_smooth, &v[1].attr_smooth, &v[2].attr_smooth],
                pw,
                norm,
            ),
            attr_flat: v[0].attr_flat.clone(),
        };
        (vertex, recip)
    }
}

#[inline]
fn col_vec(c: Rgba) -> Vec4 {
    Vec4::new(c.r as f32, c.g as f32, c.b as f32, c.a as f32)
}

#[inline]
fn vec_col(c: Vec4) -> Rgba {
    let c = c.round().clamp(Vec4::ZERO, Vec4::splat(255.0));
    Rgba::new(c.x as u8, c.y as u8, c.z as u8, c.w as u8)
}

/// Linear blend of clip-space vertices. Zero normals stay zero so the
/// rasterizer keeps skipping normal interpolation for them.
fn lerp_vertex(v: &[Vertex; 3], w: [f32; 3]) -> Vertex {
    let col = col_vec(v[0].col) * w[0] + col_vec(v[1].col) * w[1] + col_vec(v[2].col) * w[2];
    let nor = if v.iter().any(|x| x.nor == Vec4::ZERO) {
        Vec4::ZERO
    } else {
        v[0].nor * w[0] + v[1].nor * w[1] + v[2].nor * w[2]
    };
    Vertex {
        pos: v[0].pos * w[0] + v[1].pos * w[1] + v[2].pos * w[2],
        nor,
        col: vec_col(col),
        uv: v[0].uv * w[0] + v[1].uv * w[1] + v[2].uv * w[2],
        attr_smooth: AttrMap::blend([&v[0].attr_smooth, &v[1].attr_smooth, &v[2].attr_smooth], w, 1.0),
        attr_flat: v[0].attr_flat.clone(),
    }
}

/// Per-draw raster state.
#[derive(Debug, Clone, Copy)]
pub struct Rasterizer {
    /// Interpolate with `1/w` correction. Set for perspective cameras.
    pub perspective: bool,
    /// Drop clockwise (in Y-up pixel space) triangles.
    pub backface_culling: bool,
}

impl Default for Rasterizer {
    fn default() -> Self {
        Self {
            perspective: true,
            backface_culling: true,
        }
    }
}

impl Rasterizer {
    pub fn new(perspective: bool) -> Self {
        Self {
            perspective,
            ..Self::default()
        }
    }

    /// Shade, cull, clip and rasterize one triangle into `buf`.
    ///
    /// Safe to call concurrently for different triangles on the same buffer.
    pub fn draw_primitive<S>(&self, buf: &FragmentBuffer, tri: &Triangle, shader: &S) -> DrawResult
    where
        S: VertexShader + ?Sized,
    {
        count_call!(FUNCTION_COUNTERS.draw_primitive_calls);

        let [v1, v2, v3] = tri.vertices();
        let verts = [
            shader.vertex((**v1).clone()),
            shader.vertex((**v2).clone()),
            shader.vertex((**v3).clone()),
        ];

        if !self.perspective || verts.iter().all(|v| v.pos.w <= -NEAR_W_EPS) {
            return self.draw_shaded(buf, verts, tri.material);
        }

        // Some corner is at or behind the eye: cut at the near plane before
        // the divide and draw what is left.
        let pieces = clip_near(verts.each_ref().map(|v| v.pos));
        if pieces.is_empty() {
            count_call!(FUNCTION_COUNTERS.triangles_frustum_culled);
            return DrawResult::OutsideFrustum;
        }
        count_call!(FUNCTION_COUNTERS.triangles_clipped);
        pieces
            .into_iter()
            .map(|weights| {
                let sub = weights.map(|w| lerp_vertex(&verts, w));
                self.draw_shaded(buf, sub, tri.material)
            })
            .fold(DrawResult::OutsideFrustum, |acc, r| {
                if acc == DrawResult::Drawn {
                    acc
                } else {
                    r
                }
            })
    }

    /// Everything after vertex shading, for a triangle in clip space.
    fn draw_shaded(&self, buf: &FragmentBuffer, verts: [Vertex; 3], material: Option<MaterialId>) -> DrawResult {
        let mut recip = [1.0f32; 3];
        if self.perspective {
            for (r, v) in recip.iter_mut().zip(&verts) {
                if v.pos.w > -NEAR_W_EPS {
                    count_call!(FUNCTION_COUNTERS.triangles_frustum_culled);
                    return DrawResult::OutsideFrustum;
                }
                *r = -1.0 / v.pos.w;
            }
        }

        let (w, h) = (buf.width() as f32, buf.height() as f32);
        let vp = viewport_matrix(w, h);
        let pos = verts.each_ref().map(|v| {
            let p = vp * v.pos;
            (p / p.w).truncate()
        });

        let area = (pos[1] - pos[0]).cross(pos[2] - pos[0]).z;
        if self.backface_culling && area < 0.0 {
            count_call!(FUNCTION_COUNTERS.triangles_backface_culled);
            return DrawResult::BackFace;
        }

        let viewport = Aabb::from_min_max(Vec3::new(0.0, 0.0, -1.0), Vec3::new(w, h, 1.0));
        let bounds = Aabb::new(&pos);
        if !viewport.intersects(&bounds) {
            count_call!(FUNCTION_COUNTERS.triangles_frustum_culled);
            return DrawResult::OutsideFrustum;
        }

        let screen = ScreenTriangle { pos, recip, verts };
        if viewport.contains(&bounds) {
            self.rasterize(buf, &screen, material);
            return DrawResult::Drawn;
        }

        count_call!(FUNCTION_COUNTERS.triangles_clipped);
        let pieces = clip_triangle(screen.pos, w, h);
        if pieces.is_empty() {
            count_call!(FUNCTION_COUNTERS.triangles_frustum_culled);
            return DrawResult::OutsideFrustum;
        }
        for piece in pieces {
            count_call!(FUNCTION_COUNTERS.clipped_subtriangles);
            let mut recip = [0.0f32; 3];
            let verts = [0, 1, 2].map(|i| {
                let (v, r) = screen.blend_vertex(piece.pos[i], piece.weights[i], self.perspective);
                recip[i] = r;
                v
            });
            let sub = ScreenTriangle {
                pos: piece.pos,
                recip,
                verts,
            };
            self.rasterize(buf, &sub, material);
        }
        DrawResult::Drawn
    }

    fn rasterize(&self, buf: &FragmentBuffer, t: &ScreenTriangle, material: Option<MaterialId>) {
        let rect = buf.bounds();
        let (a, b, c) = (t.pos[0].truncate(), t.pos[1].truncate(), t.pos[2].truncate());
        let min = a.min(b).min(c);
        let max = a.max(b).max(c);

        let x0 = (min.x.round() as i32 - 1).max(rect.min.x);
        let y0 = (min.y.round() as i32 - 1).max(rect.min.y);
        let x1 = (max.x.round() as i32 + 1).min(rect.max.x - 1);
        let y1 = (max.y.round() as i32 + 1).min(rect.max.y - 1);

        let z = Vec3::new(t.pos[0].z, t.pos[1].z, t.pos[2].z);
        let uvs = [t.verts[0].uv, t.verts[1].uv, t.verts[2].uv];
        let nors = [t.verts[0].nor, t.verts[1].nor, t.verts[2].nor];
        let cols = [col_vec(t.verts[0].col), col_vec(t.verts[1].col), col_vec(t.verts[2].col)];
        let has_normals = nors.iter().all(|n| *n != Vec4::ZERO);
        let has_smooth = !t.verts[0].attr_smooth.is_empty();
        let persp = self.perspective;

        for y in y0..=y1 {
            for x in x0..=x1 {
                count_call!(FUNCTION_COUNTERS.pixels_tested);
                let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let bc = barycoord(p, a, b, c);
                if bc[0] < -INSIDE_EPS || bc[1] < -INSIDE_EPS || bc[2] < -INSIDE_EPS {
                    continue;
                }

                let depth = (Vec3::from(bc).dot(z) + 1.0) / 2.0;
                if !buf.depth_test(x, y, depth) {
                    count_call!(FUNCTION_COUNTERS.depth_test_failed);
                    continue;
                }
                count_call!(FUNCTION_COUNTERS.depth_test_passed);

                let uv = interpolate(uvs, t.recip, bc, persp);
                let uv_x = interpolate(uvs, t.recip, barycoord(p + Vec2::X, a, b, c), persp);
                let uv_y = interpolate(uvs, t.recip, barycoord(p + Vec2::Y, a, b, c), persp);

                let nor = if has_normals {
                    interpolate(nors, t.recip, bc, persp)
                } else {
                    Vec4::ZERO
                };

                let attr_smooth = if has_smooth {
                    let w = [bc[0] * t.recip[0], bc[1] * t.recip[1], bc[2] * t.recip[2]];
                    let norm = if persp { w[0] + w[1] + w[2] } else { 1.0 };
                    AttrMap::blend(
                        [&t.verts[0].attr_smooth, &t.verts[1].attr_smooth, &t.verts[2].attr_smooth],
                        w,
                        norm,
                    )
                } else {
                    AttrMap::new()
                };

                let frag = Fragment {
                    ok: true,
                    x,
                    y,
                    depth,
                    uv,
                    du: (uv_x - uv).length_squared(),
                    dv: (uv_y - uv).length_squared(),
                    nor,
                    col: vec_col(interpolate(cols, t.recip, bc, persp)),
                    material,
                    attr_smooth,
                    attr_flat: t.verts[0].attr_flat.clone(),
                };
                if buf.set(x, y, frag) {
                    count_call!(FUNCTION_COUNTERS.fragments_written);
                }
            }
        }
    }
}
