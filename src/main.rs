/// Headless demo: renders a lit, shadowed cube over a ground plane
/// for a few frames and reports pass timings
use anyhow::Result;
use glam::{Mat4, Vec2, Vec3};
use mimalloc::MiMalloc;
use polyraster::*;
use std::sync::Arc;
use std::time::Instant;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const FRAMES: usize = 10;

/// Unit cube centered on the origin, counter-clockwise faces seen from outside.
fn cube(material: Option<MaterialId>) -> Vec<Triangle> {
    let faces = [
        (Vec3::X, Vec3::Y),
        (Vec3::NEG_X, Vec3::Y),
        (Vec3::Y, Vec3::Z),
        (Vec3::NEG_Y, Vec3::Z),
        (Vec3::Z, Vec3::Y),
        (Vec3::NEG_Z, Vec3::Y),
    ];

    let mut tris = Vec::with_capacity(12);
    for (n, up) in faces {
        let right = up.cross(n);
        let corner = |s: f32, t: f32| {
            let p = (n + right * s + up * t) * 0.5;
            Arc::new(
                Vertex::new(p)
                    .with_normal(n)
                    .with_uv(Vec2::new((s + 1.0) / 2.0, (t + 1.0) / 2.0))
                    .with_color(Rgba::WHITE),
            )
        };
        let quad = [corner(-1.0, -1.0), corner(1.0, -1.0), corner(1.0, 1.0), corner(-1.0, 1.0)];
        tris.extend(Triangle::from_indexed(&quad, &[0, 1, 2, 0, 2, 3], material));
    }
    tris
}

fn ground(size: f32, material: Option<MaterialId>) -> Vec<Triangle> {
    let v = |x: f32, z: f32| Arc::new(Vertex::new(Vec3::new(x, 0.0, z)).with_normal(Vec3::Y));
    let quad = [v(-size, size), v(size, size), v(size, -size), v(-size, -size)];
    Triangle::from_indexed(&quad, &[0, 1, 2, 0, 2, 3], material)
}

fn build_scene(aspect: f32) -> Scene {
    let sun = Vec3::new(-0.4, -1.0, -0.3);
    let camera = Camera::perspective(
        Vec3::new(3.0, 2.5, 4.0),
        Vec3::new(0.0, 0.5, 0.0),
        45f32.to_radians(),
        aspect,
        0.1,
        50.0,
    );
    let mut scene = Scene::new(camera);

    let mut materials = MaterialArena::new();
    let box_mat = materials.insert(Arc::new(SolidMaterial::new(Rgba::new(220, 120, 60, 255)).lit(sun)));
    let floor_mat = materials.insert(Arc::new(SolidMaterial::new(Rgba::new(180, 180, 190, 255)).lit(sun)));
    scene.materials = Arc::new(materials);

    scene.add_mesh(Mesh::new(cube(Some(box_mat))).with_model(Mat4::from_translation(Vec3::new(0.0, 0.5, 0.0))));
    let mut floor = Mesh::new(ground(4.0, Some(floor_mat)));
    floor.cast_shadow = false;
    scene.add_mesh(floor);

    let light_pos = -sun.normalize() * 8.0;
    scene.add_light(Light::new(Camera::orthographic(light_pos, Vec3::ZERO, 10.0, aspect, 0.1, 30.0)));
    scene
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("=== Polyraster - Concurrent Software Rasterizer ===");
    let config = RenderConfig {
        width: 640,
        height: 400,
        msaa: 2,
        background: Rgba::new(30, 30, 40, 255),
        gamma_correction: true,
        ..RenderConfig::default()
    };
    let aspect = config.width as f32 / config.height as f32;
    let mut renderer = Renderer::new(config)?;
    let mut scene = build_scene(aspect);
    println!(
        "Scene: {} triangles, {} workers",
        scene.triangle_count(),
        renderer.pool().workers()
    );

    FUNCTION_COUNTERS.reset();
    let start = Instant::now();
    let mut covered = 0usize;
    for frame in 0..FRAMES {
        let angle = frame as f32 / FRAMES as f32 * std::f32::consts::TAU;
        scene.meshes[0].model = Mat4::from_translation(Vec3::new(0.0, 0.5, 0.0)) * Mat4::from_rotation_y(angle);

        let Some(image) = renderer.render(&scene) else {
            log::warn!("frame {frame} was stopped");
            continue;
        };
        // Top-left corner is sky in this scene.
        let bg = image.pixel(0, 0);
        covered = (0..image.height)
            .flat_map(|row| (0..image.width).map(move |x| (x, row)))
            .filter(|&(x, row)| image.pixel(x, row) != bg)
            .count();
        log::info!(
            "frame {frame}: {:.2}ms, {} covered pixels",
            renderer.stats().total_us / 1000.0,
            covered
        );
    }

    let elapsed = start.elapsed();
    println!(
        "Rendered {} frames in {:.2}ms ({:.1} fps), last frame covered {} pixels",
        FRAMES,
        elapsed.as_secs_f64() * 1000.0,
        FRAMES as f64 / elapsed.as_secs_f64(),
        covered
    );
    renderer.stats().print_summary();
    FUNCTION_COUNTERS.snapshot().print_report();
    Ok(())
}
