/// Fragment buffer behavior under concurrent writers
use polyraster::{BufferOptions, Fragment, FragmentBuffer, PixelFormat, Rgba};
use rand::Rng;
use std::thread;

fn frag_for(depth: f32) -> Fragment {
    // Color encodes the depth bucket so the winner can be identified.
    let tag = (depth * 250.0) as u8;
    Fragment {
        ok: true,
        depth,
        col: Rgba::new(tag, 255 - tag, 0, 255),
        ..Fragment::default()
    }
}

#[test]
fn concurrent_writes_keep_the_nearest_fragment() {
    const W: usize = 6;
    const H: usize = 5;
    let buf = FragmentBuffer::with_size(W, H, BufferOptions::default());

    let submitted: Vec<Vec<f32>> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let buf = &buf;
                s.spawn(move || {
                    let mut rng = rand::rng();
                    let mut depths = Vec::new();
                    for _ in 0..500 {
                        let x = rng.random_range(0..W as i32);
                        let y = rng.random_range(0..H as i32);
                        let d: f32 = rng.random_range(0.0..1.0);
                        if buf.depth_test(x, y, d) {
                            buf.set(x, y, Fragment { x, y, ..frag_for(d) });
                        }
                        depths.push((x, y, d));
                    }
                    depths
                })
            })
            .collect();

        let mut per_pixel = vec![Vec::new(); W * H];
        for h in handles {
            for (x, y, d) in h.join().unwrap() {
                per_pixel[y as usize * W + x as usize].push(d);
            }
        }
        per_pixel
    });

    for y in 0..H as i32 {
        for x in 0..W as i32 {
            let depths = &submitted[y as usize * W + x as usize];
            let stored = buf.get(x, y);
            match depths.iter().cloned().fold(None, |m: Option<f32>, d| Some(m.map_or(d, |m| m.max(d)))) {
                Some(max) => {
                    assert!(stored.ok);
                    assert_eq!(stored.depth, max, "pixel ({x},{y})");
                    assert_eq!(stored.col, frag_for(max).col);
                    assert_eq!((stored.x, stored.y), (x, y));
                }
                None => assert!(!stored.ok),
            }
        }
    }
}

#[test]
fn out_of_range_coordinates_never_touch_storage() {
    let buf = FragmentBuffer::with_size(3, 3, BufferOptions {
        format: PixelFormat::Bgra,
    });
    for (x, y) in [(-1, -1), (3, 0), (0, 3), (i32::MAX, 0), (0, i32::MIN)] {
        assert!(!buf.set(x, y, frag_for(0.9)));
        assert!(!buf.in_bounds(x, y));
        assert_eq!(buf.get(x, y), Fragment::default());
        assert!(buf.depth_at(x, y).is_none());
    }
    assert!(buf.to_color_bytes().iter().all(|b| *b == 0));
    assert_eq!(buf.len(), 9);
}

#[test]
fn partial_clears_reset_only_their_plane() {
    let mut buf = FragmentBuffer::with_size(2, 2, BufferOptions::default());
    buf.set(1, 1, frag_for(0.8));

    buf.clear_color();
    assert_eq!(buf.color_at(1, 1), Rgba::TRANSPARENT);
    assert!(buf.get(1, 1).ok);
    assert!(buf.to_depth_bytes().iter().any(|b| *b != 0));

    buf.clear_depth();
    assert!(buf.to_depth_bytes().iter().all(|b| *b == 0));
    assert!(buf.get(1, 1).ok);

    buf.clear_fragment();
    assert!(!buf.get(1, 1).ok);
    assert!(buf.depth_test(1, 1, 0.0));
}
