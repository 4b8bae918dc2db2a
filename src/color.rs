/// 8-bit RGBA colors, blending and transfer functions

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba::new(0, 0, 0, 0);
    pub const BLACK: Rgba = Rgba::new(0, 0, 0, 255);
    pub const WHITE: Rgba = Rgba::new(255, 255, 255, 255);

    #[inline]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Build from normalized channels, clamping each to `[0, 1]`.
    #[inline]
    pub fn from_f32(c: glam::Vec4) -> Self {
        let c = (c.clamp(glam::Vec4::ZERO, glam::Vec4::ONE) * 255.0).round();
        Self::new(c.x as u8, c.y as u8, c.z as u8, c.w as u8)
    }

    #[inline]
    pub fn to_f32(self) -> glam::Vec4 {
        glam::Vec4::new(
            self.r as f32,
            self.g as f32,
            self.b as f32,
            self.a as f32,
        ) / 255.0
    }

    /// Scale the color channels, leaving alpha untouched.
    #[inline]
    pub fn scale_rgb(self, factor: f32) -> Self {
        let s = |c: u8| (c as f32 * factor).round().clamp(0.0, 255.0) as u8;
        Self::new(s(self.r), s(self.g), s(self.b), self.a)
    }
}

/// In-memory byte order of the packed color and depth planes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
    #[default]
    Rgba,
    Bgra,
}

impl PixelFormat {
    /// Color as the four bytes stored for one pixel.
    #[inline]
    pub fn pack(self, c: Rgba) -> [u8; 4] {
        match self {
            PixelFormat::Rgba => [c.r, c.g, c.b, c.a],
            PixelFormat::Bgra => [c.b, c.g, c.r, c.a],
        }
    }

    #[inline]
    pub fn unpack(self, p: [u8; 4]) -> Rgba {
        match self {
            PixelFormat::Rgba => Rgba::new(p[0], p[1], p[2], p[3]),
            PixelFormat::Bgra => Rgba::new(p[2], p[1], p[0], p[3]),
        }
    }
}

/// Blend function: `(dst, src) -> result`.
pub type BlendFunc = fn(Rgba, Rgba) -> Rgba;

/// Premultiplied-alpha "over" compositing of `src` onto `dst`.
#[inline]
pub fn alpha_blend(dst: Rgba, src: Rgba) -> Rgba {
    let inv = 255 - src.a as u16;
    let over = |d: u8, s: u8| -> u8 {
        let v = s as u16 + (d as u16 * inv + 127) / 255;
        v.min(255) as u8
    };
    Rgba::new(
        over(dst.r, src.r),
        over(dst.g, src.g),
        over(dst.b, src.b),
        over(dst.a, src.a),
    )
}

#[inline]
pub fn linear_to_srgb(v: f32) -> f32 {
    let v = v.clamp(0.0, 1.0);
    if v <= 0.003_130_8 {
        v * 12.92
    } else {
        1.055 * v.powf(1.0 / 2.4) - 0.055
    }
}

#[inline]
pub fn srgb_to_linear(v: f32) -> f32 {
    let v = v.clamp(0.0, 1.0);
    if v <= 0.040_45 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opaque_source_replaces_destination() {
        let dst = Rgba::new(10, 20, 30, 255);
        let src = Rgba::new(200, 100, 50, 255);
        assert_eq!(alpha_blend(dst, src), src);
    }

    #[test]
    fn transparent_source_keeps_destination() {
        let dst = Rgba::new(10, 20, 30, 255);
        assert_eq!(alpha_blend(dst, Rgba::TRANSPARENT), dst);
    }

    #[test]
    fn blend_saturates_instead_of_wrapping() {
        // Not a valid premultiplied color, but must not overflow.
        let dst = Rgba::new(255, 255, 255, 255);
        let src = Rgba::new(255, 255, 255, 128);
        let out = alpha_blend(dst, src);
        assert_eq!(out, Rgba::new(255, 255, 255, 255));
    }

    #[test]
    fn bgra_swaps_red_and_blue() {
        let c = Rgba::new(1, 2, 3, 4);
        assert_eq!(PixelFormat::Bgra.pack(c), [3, 2, 1, 4]);
        assert_eq!(PixelFormat::Bgra.unpack([3, 2, 1, 4]), c);
        assert_eq!(PixelFormat::Rgba.pack(c), [1, 2, 3, 4]);
    }

    #[test]
    fn srgb_transfer_round_trips() {
        for i in 0..=10 {
            let v = i as f32 / 10.0;
            assert!((srgb_to_linear(linear_to_srgb(v)) - v).abs() < 1e-4);
        }
        assert!(linear_to_srgb(0.5) > 0.5);
    }
}
