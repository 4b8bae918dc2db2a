/// Screen-space math shared by the rasterizer and the clipper
use glam::{Mat4, Vec2, Vec3, Vec4};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Smallest box enclosing `points`. An empty slice yields an inverted box
    /// that intersects nothing.
    pub fn new(points: &[Vec3]) -> Self {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for p in points {
            min = min.min(*p);
            max = max.max(*p);
        }
        Self { min, max }
    }

    #[inline]
    pub fn from_min_max(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Overlap test, touching faces count as intersecting.
    #[inline]
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.cmple(other.max).all() && other.min.cmple(self.max).all()
    }

    /// True if `other` lies entirely inside `self` (inclusive).
    #[inline]
    pub fn contains(&self, other: &Aabb) -> bool {
        self.min.cmple(other.min).all() && other.max.cmple(self.max).all()
    }

    #[inline]
    pub fn contains_point(&self, p: Vec3) -> bool {
        self.min.cmple(p).all() && p.cmple(self.max).all()
    }
}

/// Maps NDC `[-1,1]^2` onto pixel space `[0,w] x [0,h]`. Z and W pass through.
#[inline]
pub fn viewport_matrix(width: f32, height: f32) -> Mat4 {
    Mat4::from_cols(
        Vec4::new(width / 2.0, 0.0, 0.0, 0.0),
        Vec4::new(0.0, height / 2.0, 0.0, 0.0),
        Vec4::new(0.0, 0.0, 1.0, 0.0),
        Vec4::new(width / 2.0, height / 2.0, 0.0, 1.0),
    )
}

/// Barycentric weights of `p` against triangle `(a, b, c)`.
///
/// A zero-area triangle returns `[-1, 1, 1]`, which fails every inside test.
#[inline]
pub fn barycoord(p: Vec2, a: Vec2, b: Vec2, c: Vec2) -> [f32; 3] {
    let v0 = b - a;
    let v1 = c - a;
    let v2 = p - a;
    let den = v0.perp_dot(v1);
    if den.abs() < f32::EPSILON {
        return [-1.0, 1.0, 1.0];
    }
    let w1 = v2.perp_dot(v1) / den;
    let w2 = v0.perp_dot(v2) / den;
    [1.0 - w1 - w2, w1, w2]
}

/// False for triangles with a zero-length edge or collinear corners.
pub fn is_valid_triangle(p1: Vec3, p2: Vec3, p3: Vec3) -> bool {
    let e1 = p2 - p1;
    let e2 = p3 - p1;
    let e3 = p3 - p2;
    if e1.length_squared() == 0.0 || e2.length_squared() == 0.0 || e3.length_squared() == 0.0 {
        return false;
    }
    let cos = e1.normalize().dot(e2.normalize());
    (1.0 - cos.abs()) > 1e-6
}

/// Perspective-correct blend of three values.
///
/// `recip` holds the per-vertex `1/w` factors (all ones under orthographic
/// projection, where the normalizing divide is skipped).
#[inline]
pub fn interpolate<T>(values: [T; 3], recip: [f32; 3], bc: [f32; 3], perspective: bool) -> T
where
    T: Copy + std::ops::Mul<f32, Output = T> + std::ops::Add<Output = T> + std::ops::Div<f32, Output = T>,
{
    let w = [bc[0] * recip[0], bc[1] * recip[1], bc[2] * recip[2]];
    let sum = values[0] * w[0] + values[1] * w[1] + values[2] * w[2];
    if perspective {
        sum / (w[0] + w[1] + w[2])
    } else {
        sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: Vec2 = Vec2::new(0.0, 0.0);
    const B: Vec2 = Vec2::new(4.0, 0.0);
    const C: Vec2 = Vec2::new(0.0, 4.0);

    #[test]
    fn barycoord_of_corners_is_basis() {
        assert_eq!(barycoord(A, A, B, C), [1.0, 0.0, 0.0]);
        assert_eq!(barycoord(B, A, B, C), [0.0, 1.0, 0.0]);
        assert_eq!(barycoord(C, A, B, C), [0.0, 0.0, 1.0]);
    }

    #[test]
    fn barycoord_inside_sums_to_one() {
        let bc = barycoord(Vec2::new(1.0, 1.0), A, B, C);
        assert!(bc.iter().all(|w| (0.0..=1.0).contains(w)));
        assert!((bc.iter().sum::<f32>() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn degenerate_triangle_is_never_inside() {
        let bc = barycoord(Vec2::ONE, A, B, Vec2::new(8.0, 0.0));
        assert!(bc.iter().any(|w| *w < 0.0));
    }

    #[test]
    fn viewport_maps_ndc_corners() {
        let vp = viewport_matrix(100.0, 50.0);
        let lo = vp * Vec4::new(-1.0, -1.0, 0.5, 1.0);
        let hi = vp * Vec4::new(1.0, 1.0, -0.5, 1.0);
        assert_eq!(lo, Vec4::new(0.0, 0.0, 0.5, 1.0));
        assert_eq!(hi, Vec4::new(100.0, 50.0, -0.5, 1.0));
    }

    #[test]
    fn orthographic_interpolation_is_linear() {
        let v = [Vec3::new(1.0, 2.0, 3.0), Vec3::new(-4.0, 0.5, 9.0), Vec3::new(7.0, -1.0, 0.0)];
        let bc = [0.2, 0.3, 0.5];
        let got = interpolate(v, [1.0; 3], bc, false);
        let want = v[0] * 0.2 + v[1] * 0.3 + v[2] * 0.5;
        assert!((got - want).length() < 1e-6);
    }

    #[test]
    fn perspective_interpolation_favors_near_vertex() {
        // Vertex 0 is twice as close (recip twice as large).
        let got = interpolate([0.0f32, 1.0, 1.0], [2.0, 1.0, 1.0], [0.5, 0.25, 0.25], true);
        assert!((got - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn aabb_intersection_checks_every_axis() {
        let a = Aabb::from_min_max(Vec3::ZERO, Vec3::ONE);
        let b = Aabb::from_min_max(Vec3::new(0.5, 0.5, 2.0), Vec3::new(2.0, 2.0, 3.0));
        assert!(!a.intersects(&b));
        let c = Aabb::from_min_max(Vec3::splat(0.5), Vec3::splat(2.0));
        assert!(a.intersects(&c));
        assert!(!a.contains(&c));
        assert!(c.contains(&Aabb::from_min_max(Vec3::splat(1.0), Vec3::splat(1.5))));
    }

    #[test]
    fn valid_triangle_rejects_degenerates() {
        assert!(is_valid_triangle(Vec3::ZERO, Vec3::X, Vec3::Y));
        assert!(!is_valid_triangle(Vec3::ZERO, Vec3::ZERO, Vec3::Y));
        assert!(!is_valid_triangle(Vec3::ZERO, Vec3::X, Vec3::X * 2.0));
    }
}
