/// End-to-end raster tests: primitive pass, fragment pass and read-back
use glam::{Vec2, Vec3};
use polyraster::rendering::ShaderChain;
use polyraster::*;
use std::sync::Arc;

const SOLID: Rgba = Rgba::new(250, 60, 20, 255);

fn ortho_renderer(size: usize) -> Renderer {
    let mut r = Renderer::new(RenderConfig {
        width: size,
        height: size,
        workers: 4,
        ..RenderConfig::default()
    })
    .unwrap();
    r.rasterizer.perspective = false;
    r
}

fn solid_shader() -> Arc<dyn VertexShader> {
    Arc::new(|mut v: Vertex| {
        v.col = SOLID;
        v
    })
}

fn identity_chain() -> ShaderChain {
    vec![Arc::new(IdentityShader) as Arc<dyn FragmentShader>].into()
}

#[test]
fn solid_triangle_covers_exactly_its_pixels() {
    let mut renderer = ortho_renderer(100);
    let buf = renderer.next_buffer();

    // NDC corners landing on pixels (10,10), (20,10), (10,20).
    let tri = Triangle::from_vertices(
        Vertex::new(Vec3::new(-0.8, -0.8, 0.0)),
        Vertex::new(Vec3::new(-0.6, -0.8, 0.0)),
        Vertex::new(Vec3::new(-0.8, -0.6, 0.0)),
        None,
    );
    let tris: Arc<[Triangle]> = vec![tri].into();
    renderer.draw_primitives(&buf, &tris, solid_shader());
    renderer.draw_fragments(&buf, &identity_chain());

    let mut inside = 0;
    for y in 0..100 {
        for x in 0..100 {
            let (cx, cy) = (x as f32 + 0.5, y as f32 + 0.5);
            let col = buf.get(x, y).col;
            let clearly_in = cx >= 10.25 && cy >= 10.25 && cx + cy <= 29.6;
            let clearly_out = cx <= 9.75 || cy <= 9.75 || cx + cy >= 30.4;
            if clearly_in {
                assert_eq!(col, SOLID, "pixel ({x},{y}) should be covered");
                inside += 1;
            } else if clearly_out {
                assert_eq!(col, Rgba::TRANSPARENT, "pixel ({x},{y}) should be clear");
            }
        }
    }
    println!("covered pixels: {inside}");
    assert!(inside >= 40);
    assert_eq!(renderer.pool().running(), 0);
}

#[test]
fn shared_edge_leaves_no_gaps() {
    let mut renderer = ortho_renderer(64);
    let buf = renderer.next_buffer();

    // Two triangles splitting a quad along an off-grid diagonal.
    let corners: Vec<Arc<Vertex>> = [
        Vec3::new(-0.71, -0.63, 0.0),
        Vec3::new(0.77, -0.59, 0.0),
        Vec3::new(0.69, 0.81, 0.0),
        Vec3::new(-0.67, 0.73, 0.0),
    ]
    .into_iter()
    .map(|p| Arc::new(Vertex::new(p)))
    .collect();
    let tris: Arc<[Triangle]> = Triangle::from_indexed(&corners, &[0, 1, 2, 0, 2, 3], None).into();
    renderer.draw_primitives(&buf, &tris, solid_shader());

    // Walk the diagonal from corner 0 to corner 2 in pixel space.
    let a = Vec2::new((-0.71 + 1.0) * 32.0, (-0.63 + 1.0) * 32.0);
    let c = Vec2::new((0.69 + 1.0) * 32.0, (0.81 + 1.0) * 32.0);
    for i in 5..95 {
        let p = a.lerp(c, i as f32 / 100.0);
        let (x, y) = (p.x.floor() as i32, p.y.floor() as i32);
        assert!(buf.get(x, y).ok, "gap on shared edge at ({x},{y})");
    }
}

#[test]
fn perspective_interpolation_is_not_affine() {
    let mut renderer = Renderer::new(RenderConfig {
        width: 64,
        height: 64,
        workers: 2,
        backface_culling: false,
        ..RenderConfig::default()
    })
    .unwrap();
    renderer.rasterizer.perspective = true;
    let buf = renderer.next_buffer();

    // A floor receding from the camera: u runs 0 -> 1 from near to far edge.
    let camera = Camera::perspective(Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 0.0, -10.0), 90f32.to_radians(), 1.0, 0.1, 100.0);
    let q = |x: f32, z: f32, u: f32| Arc::new(Vertex::new(Vec3::new(x, 0.0, z)).with_uv(Vec2::new(u, 0.0)));
    let corners = [q(-4.0, -1.0, 0.0), q(4.0, -1.0, 0.0), q(4.0, -20.0, 1.0), q(-4.0, -20.0, 1.0)];
    let tris: Arc<[Triangle]> = Triangle::from_indexed(&corners, &[0, 1, 2, 0, 2, 3], None).into();
    renderer.draw_primitives(&buf, &tris, Arc::new(MvpShader::new(glam::Mat4::IDENTITY, camera.view_matrix(), camera.projection_matrix())));

    // Screen-space midway between the near and far edges is much closer to
    // the near edge in world space, so u stays well below 0.5.
    let column = 32;
    let rows: Vec<i32> = (0..64).filter(|&y| buf.get(column, y).ok).collect();
    assert!(rows.len() > 4, "floor not rasterized");
    let mid = rows[rows.len() / 2];
    let u = buf.get(column, mid).uv.x;
    println!("u at screen middle of floor: {u}");
    assert!(u > 0.0 && u < 0.4);
}

#[test]
fn near_plane_crossing_triangle_is_clipped_not_dropped() {
    let mut renderer = Renderer::new(RenderConfig {
        width: 32,
        height: 32,
        workers: 2,
        ..RenderConfig::default()
    })
    .unwrap();
    renderer.rasterizer.perspective = false;
    let buf = renderer.next_buffer();

    // One corner sits beyond the near plane (NDC z > 1).
    let tri = Triangle::from_vertices(
        Vertex::new(Vec3::new(-0.5, -0.5, 3.0)),
        Vertex::new(Vec3::new(0.5, -0.5, 0.0)),
        Vertex::new(Vec3::new(-0.5, 0.5, 0.0)),
        None,
    );
    let tris: Arc<[Triangle]> = vec![tri].into();
    renderer.draw_primitives(&buf, &tris, solid_shader());

    let covered: usize = (0..32)
        .flat_map(|y| (0..32).map(move |x| (x, y)))
        .filter(|&(x, y)| buf.get(x, y).ok)
        .count();
    assert!(covered > 0);
    // No stored depth exceeds the near plane.
    for y in 0..32 {
        for x in 0..32 {
            if let Some(d) = buf.depth_at(x, y) {
                assert!(d <= 1.0 + 1e-5);
            }
        }
    }
    // The corner at (8,8) lies in the clipped-away part.
    assert!(!buf.get(8, 8).ok);
    assert!(buf.get(14, 14).ok);
}

#[test]
fn degenerate_triangles_are_skipped() {
    let mut renderer = ortho_renderer(16);
    let buf = renderer.next_buffer();
    let tris: Arc<[Triangle]> = vec![
        Triangle::from_vertices(Vertex::new(Vec3::ZERO), Vertex::new(Vec3::ZERO), Vertex::new(Vec3::X), None),
        Triangle::from_vertices(Vertex::new(Vec3::ZERO), Vertex::new(Vec3::X * 0.5), Vertex::new(Vec3::X), None),
    ]
    .into();
    renderer.draw_primitives(&buf, &tris, solid_shader());
    assert!(buf.to_color_bytes().iter().all(|b| *b == 0));
    assert_eq!(renderer.pool().running(), 0);
}
