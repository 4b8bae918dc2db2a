/// Fragment buffer: per-pixel fragments plus packed color and depth planes
///
/// Memory layout:
/// - Storage row 0 is the top of the image (logical max Y); the logical API is
///   Y-up, so rows are flipped on every access
/// - Each pixel has its own spinlock guarding its fragment, color and depth
///   cells, so concurrent triangles only contend on genuinely shared pixels
use crate::color::{PixelFormat, Rgba};
use crate::count_call;
use crate::geometry::Fragment;
use crate::perf::FUNCTION_COUNTERS;
use crate::sync::SpinLock;
use glam::IVec2;
use rayon::prelude::*;
use std::cell::UnsafeCell;

/// Buffer creation options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferOptions {
    pub format: PixelFormat,
}

/// Half-open pixel rectangle `[min, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub min: IVec2,
    pub max: IVec2,
}

impl Rect {
    pub fn new(min: IVec2, max: IVec2) -> Self {
        Self { min, max }
    }

    pub fn from_size(width: usize, height: usize) -> Self {
        Self {
            min: IVec2::ZERO,
            max: IVec2::new(width as i32, height as i32),
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        (self.max.x - self.min.x).max(0) as usize
    }

    #[inline]
    pub fn height(&self) -> usize {
        (self.max.y - self.min.y).max(0) as usize
    }
}

pub struct FragmentBuffer {
    rect: Rect,
    width: usize,
    height: usize,
    format: PixelFormat,
    locks: Box<[SpinLock]>,
    fragments: Box<[UnsafeCell<Fragment>]>,
    color: Box<[UnsafeCell<[u8; 4]>]>,
    depth: Box<[UnsafeCell<[u8; 4]>]>,
}

// SAFETY: every cell of pixel `i` is only touched while holding `locks[i]`,
// except through the `unsafe fn` accessors whose callers guarantee exclusive
// access to the pixel, and through `&mut self` clears.
unsafe impl Sync for FragmentBuffer {}

fn cells<T: Clone>(n: usize, value: T) -> Box<[UnsafeCell<T>]> {
    (0..n).map(|_| UnsafeCell::new(value.clone())).collect()
}

#[inline]
fn depth_bytes(depth: f32) -> [u8; 4] {
    let d = (depth.clamp(0.0, 1.0) * 255.0) as u8;
    [d, d, d, 255]
}

impl FragmentBuffer {
    pub fn new(rect: Rect, opts: BufferOptions) -> Self {
        let width = rect.width();
        let height = rect.height();
        let n = width * height;
        Self {
            rect,
            width,
            height,
            format: opts.format,
            locks: (0..n).map(|_| SpinLock::new()).collect(),
            fragments: cells(n, Fragment::default()),
            color: cells(n, [0u8; 4]),
            depth: cells(n, [0u8; 4]),
        }
    }

    pub fn with_size(width: usize, height: usize, opts: BufferOptions) -> Self {
        Self::new(Rect::from_size(width, height), opts)
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Number of pixels.
    #[inline]
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn bounds(&self) -> Rect {
        self.rect
    }

    #[inline]
    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= self.rect.min.x && x < self.rect.max.x && y >= self.rect.min.y && y < self.rect.max.y
    }

    /// Storage index of logical pixel `(x, y)`. Rows are flipped.
    #[inline]
    pub fn fragment_offset(&self, x: i32, y: i32) -> usize {
        let row = self.rect.max.y - 1 - y;
        row as usize * self.width + (x - self.rect.min.x) as usize
    }

    /// Byte offset of logical pixel `(x, y)` in the packed color/depth planes.
    #[inline]
    pub fn pixel_offset(&self, x: i32, y: i32) -> usize {
        self.fragment_offset(x, y) * 4
    }

    /// Fragment at `(x, y)`, or the zero fragment when out of bounds.
    pub fn get(&self, x: i32, y: i32) -> Fragment {
        if !self.in_bounds(x, y) {
            return Fragment::default();
        }
        let i = self.fragment_offset(x, y);
        let _guard = self.locks[i].lock();
        // SAFETY: pixel lock held.
        unsafe { (*self.fragments[i].get()).clone() }
    }

    /// Depth-tested write. Returns whether the fragment was stored.
    ///
    /// Rejected without mutation when the pixel already holds a valid
    /// fragment at the same or greater depth. Out-of-bounds writes are dropped.
    pub fn set(&self, x: i32, y: i32, frag: Fragment) -> bool {
        if !self.in_bounds(x, y) {
            return false;
        }
        let i = self.fragment_offset(x, y);
        let _guard = self.locks[i].lock();
        // SAFETY: pixel lock held for every cell of pixel `i`.
        unsafe {
            let stored = &mut *self.fragments[i].get();
            if stored.ok && frag.depth <= stored.depth {
                return false;
            }
            self.write_pixel(i, frag);
        }
        true
    }

    /// Non-mutating depth test usable before building a fragment.
    pub fn depth_test(&self, x: i32, y: i32, depth: f32) -> bool {
        if !self.in_bounds(x, y) {
            return false;
        }
        let i = self.fragment_offset(x, y);
        let _guard = self.locks[i].lock();
        // SAFETY: pixel lock held.
        let stored = unsafe { &*self.fragments[i].get() };
        !stored.ok || depth > stored.depth
    }

    /// Stored depth, `None` for empty or out-of-bounds pixels.
    pub fn depth_at(&self, x: i32, y: i32) -> Option<f32> {
        if !self.in_bounds(x, y) {
            return None;
        }
        let i = self.fragment_offset(x, y);
        let _guard = self.locks[i].lock();
        // SAFETY: pixel lock held.
        let stored = unsafe { &*self.fragments[i].get() };
        stored.ok.then_some(stored.depth)
    }

    /// Fragment read without bounds check or locking.
    ///
    /// # Safety
    /// `(x, y)` must be in bounds and no other thread may write this pixel for
    /// the duration of the call.
    #[inline]
    pub unsafe fn unsafe_get(&self, x: i32, y: i32) -> Fragment {
        let i = self.fragment_offset(x, y);
        (*self.fragments.get_unchecked(i).get()).clone()
    }

    /// Unconditional write without bounds check, locking or depth test.
    ///
    /// # Safety
    /// `(x, y)` must be in bounds and the caller must have exclusive access to
    /// this pixel for the duration of the call.
    #[inline]
    pub unsafe fn unsafe_set(&self, x: i32, y: i32, frag: Fragment) {
        let i = self.fragment_offset(x, y);
        self.write_pixel(i, frag);
    }

    /// # Safety
    /// Caller holds pixel `i` exclusively.
    #[inline]
    unsafe fn write_pixel(&self, i: usize, frag: Fragment) {
        *self.color[i].get() = self.format.pack(frag.col);
        *self.depth[i].get() = depth_bytes(frag.depth);
        *self.fragments[i].get() = frag;
    }

    /// Shaded color at `(x, y)`, transparent when out of bounds.
    pub fn color_at(&self, x: i32, y: i32) -> Rgba {
        if !self.in_bounds(x, y) {
            return Rgba::TRANSPARENT;
        }
        let i = self.fragment_offset(x, y);
        let _guard = self.locks[i].lock();
        // SAFETY: pixel lock held.
        self.format.unpack(unsafe { *self.color[i].get() })
    }

    /// Packed color plane, top row first, in the buffer's pixel format.
    pub fn to_color_bytes(&self) -> Vec<u8> {
        self.plane_bytes(&self.color)
    }

    /// Packed depth plane (grey levels, opaque), top row first.
    pub fn to_depth_bytes(&self) -> Vec<u8> {
        self.plane_bytes(&self.depth)
    }

    fn plane_bytes(&self, plane: &[UnsafeCell<[u8; 4]>]) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len() * 4);
        for (lock, cell) in self.locks.iter().zip(plane) {
            let _guard = lock.lock();
            // SAFETY: pixel lock held.
            out.extend_from_slice(unsafe { &*cell.get() });
        }
        out
    }

    /// Reset fragments, color and depth.
    pub fn clear(&mut self) {
        count_call!(FUNCTION_COUNTERS.buffer_clear_calls);
        self.clear_fragment();
        self.clear_color();
        self.clear_depth();
    }

    pub fn clear_fragment(&mut self) {
        self.fragments
            .par_iter_mut()
            .for_each(|f| *f.get_mut() = Fragment::default());
    }

    pub fn clear_color(&mut self) {
        self.color.par_iter_mut().for_each(|c| *c.get_mut() = [0; 4]);
    }

    pub fn clear_depth(&mut self) {
        self.depth.par_iter_mut().for_each(|d| *d.get_mut() = [0; 4]);
    }
}
