/// Full-screen fragment pass
/// Every pixel is visited by exactly one task, so shading reads and writes
/// the buffer without taking pixel locks
use super::framebuffer::FragmentBuffer;
use super::shading::FragmentShader;
use crate::color::BlendFunc;
use crate::count_add;
use crate::count_call;
use crate::perf::FUNCTION_COUNTERS;
use crate::sched::Pool;
use std::sync::Arc;

pub type ShaderChain = Arc<[Arc<dyn FragmentShader>]>;

/// Run `shaders` over every pixel of `buf` on `pool` and wait for completion.
///
/// Pixels are split into runs of `batch_size` consecutive storage indices,
/// one task per run plus one for the remainder. An image smaller than one
/// batch in both dimensions is shaded by a single task.
pub fn draw_fragments(
    pool: &Pool,
    buf: &Arc<FragmentBuffer>,
    shaders: &ShaderChain,
    blend: Option<BlendFunc>,
    batch_size: usize,
) {
    if shaders.is_empty() || buf.is_empty() {
        return;
    }
    assert!(batch_size > 0, "fragment batch size must be non-zero");

    let (w, h) = (buf.width(), buf.height());
    let n = w * h;

    if w < batch_size && h < batch_size {
        pool.add(1);
        spawn_range(pool, buf, shaders, blend, 0..n);
        pool.wait();
        return;
    }

    let full = n / batch_size;
    let rest = n % batch_size;
    pool.add((full + usize::from(rest != 0)) as u64);
    for i in 0..full {
        let start = i * batch_size;
        spawn_range(pool, buf, shaders, blend, start..start + batch_size);
    }
    if rest != 0 {
        spawn_range(pool, buf, shaders, blend, full * batch_size..n);
    }
    pool.wait();
}

fn spawn_range(
    pool: &Pool,
    buf: &Arc<FragmentBuffer>,
    shaders: &ShaderChain,
    blend: Option<BlendFunc>,
    range: std::ops::Range<usize>,
) {
    count_call!(FUNCTION_COUNTERS.fragment_batches);
    let buf = Arc::clone(buf);
    let shaders = Arc::clone(shaders);
    pool.run(move || {
        let rect = buf.bounds();
        let w = buf.width();
        count_add!(FUNCTION_COUNTERS.fragments_shaded, range.len() as u64);
        for i in range {
            let x = rect.min.x + (i % w) as i32;
            let y = rect.min.y + (i / w) as i32;
            // SAFETY: ranges handed out by `draw_fragments` are disjoint and
            // lie inside the buffer.
            unsafe { draw_fragment(&buf, x, y, &shaders, blend) };
        }
    });
}

/// Shade one pixel: thread its fragment, stamped with `(x, y)`, through
/// `shaders`, then blend the result over the previous color when `blend` is set.
///
/// # Safety
/// `(x, y)` must be inside `buf` and no other thread may access this pixel
/// during the call.
pub unsafe fn draw_fragment(
    buf: &FragmentBuffer,
    x: i32,
    y: i32,
    shaders: &[Arc<dyn FragmentShader>],
    blend: Option<BlendFunc>,
) {
    let mut frag = buf.unsafe_get(x, y);
    // Empty pixels still tell shaders where they are.
    frag.x = x;
    frag.y = y;
    let prev = frag.col;
    for shader in shaders {
        frag.col = shader.fragment(&frag);
    }
    if let Some(blend) = blend {
        frag.col = blend(prev, frag.col);
    }
    buf.unsafe_set(x, y, frag);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{alpha_blend, Rgba};
    use crate::geometry::Fragment;
    use crate::rendering::framebuffer::BufferOptions;
    use crate::rendering::shading::IdentityShader;
    use crate::sched::PoolConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn chain(shaders: Vec<Arc<dyn FragmentShader>>) -> ShaderChain {
        shaders.into()
    }

    #[test]
    fn every_pixel_is_shaded_exactly_once() {
        let pool = Pool::with_workers(4).unwrap();
        // 7 * 9 = 63 pixels, batch 8: seven full batches and a remainder.
        for (w, h, batch) in [(7, 9, 8), (3, 2, 8), (64, 1, 8), (10, 10, 1)] {
            let buf = Arc::new(FragmentBuffer::with_size(w, h, BufferOptions::default()));
            let visits = Arc::new(AtomicUsize::new(0));
            let counter = Arc::clone(&visits);
            let shaders = chain(vec![Arc::new(move |f: &Fragment| {
                counter.fetch_add(1, Ordering::Relaxed);
                Rgba::new(f.x as u8, f.y as u8, 1, 255)
            })]);

            draw_fragments(&pool, &buf, &shaders, None, batch);

            assert_eq!(visits.load(Ordering::Relaxed), w * h);
            for y in 0..h as i32 {
                for x in 0..w as i32 {
                    assert_eq!(buf.get(x, y).col, Rgba::new(x as u8, y as u8, 1, 255));
                }
            }
            assert_eq!(pool.running(), 0);
        }
    }

    #[test]
    fn small_image_is_one_task() {
        let dispatched = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&dispatched);
        let pool = Pool::new(PoolConfig {
            workers: 2,
            queue_capacity: 16,
            randomizer: Some(Arc::new(move |min, _| {
                counter.fetch_add(1, Ordering::Relaxed);
                min
            })),
        })
        .unwrap();
        let shaders = chain(vec![Arc::new(IdentityShader)]);

        // Narrower and shorter than a batch.
        let small = Arc::new(FragmentBuffer::with_size(3, 2, BufferOptions::default()));
        draw_fragments(&pool, &small, &shaders, None, 8);
        assert_eq!(dispatched.swap(0, Ordering::Relaxed), 1);
        assert_eq!(pool.running(), 0);

        // 63 pixels: seven full batches and a remainder.
        let large = Arc::new(FragmentBuffer::with_size(7, 9, BufferOptions::default()));
        draw_fragments(&pool, &large, &shaders, None, 8);
        assert_eq!(dispatched.load(Ordering::Relaxed), 8);
        assert_eq!(pool.running(), 0);
    }

    #[test]
    fn later_shaders_see_earlier_colors() {
        let pool = Pool::with_workers(2).unwrap();
        let buf = Arc::new(FragmentBuffer::with_size(4, 4, BufferOptions::default()));
        let shaders = chain(vec![
            Arc::new(|_: &Fragment| Rgba::new(10, 0, 0, 255)),
            Arc::new(|f: &Fragment| Rgba::new(f.col.r * 2, 0, 0, 255)),
        ]);
        draw_fragments(&pool, &buf, &shaders, None, 32);
        assert_eq!(buf.get(2, 3).col, Rgba::new(20, 0, 0, 255));
    }

    #[test]
    fn blend_composites_over_previous_color() {
        let pool = Pool::with_workers(2).unwrap();
        let buf = Arc::new(FragmentBuffer::with_size(2, 2, BufferOptions::default()));
        buf.set(0, 0, Fragment {
            ok: true,
            depth: 0.5,
            col: Rgba::new(0, 0, 200, 255),
            ..Fragment::default()
        });
        let shaders = chain(vec![Arc::new(|_: &Fragment| Rgba::TRANSPARENT)]);
        draw_fragments(&pool, &buf, &shaders, Some(alpha_blend), 32);
        assert_eq!(buf.get(0, 0).col, Rgba::new(0, 0, 200, 255));

        let identity = chain(vec![Arc::new(IdentityShader)]);
        draw_fragments(&pool, &buf, &identity, None, 32);
        assert_eq!(buf.get(0, 0).col, Rgba::new(0, 0, 200, 255));
        assert_eq!(buf.get(1, 1).col, Rgba::TRANSPARENT);
    }
}
