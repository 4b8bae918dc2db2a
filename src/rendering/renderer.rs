/// Frame orchestration
/// Sequences shadow passes, the forward raster pass, deferred shading and
/// the antialiasing resolve on top of the worker pool and fragment buffers
use super::fragment_pass::{draw_fragments, ShaderChain};
use super::framebuffer::{BufferOptions, FragmentBuffer};
use super::rasterizer::Rasterizer;
use super::shading::{FragmentShader, MvpShader, VertexShader};
use crate::camera::Camera;
use crate::color::{linear_to_srgb, BlendFunc, PixelFormat, Rgba};
use crate::geometry::{viewport_matrix, Fragment, Triangle, Varying, Vertex};
use crate::material::MaterialArena;
use crate::perf::{PassStats, PerfTimer};
use crate::scene::Scene;
use crate::sched::{Arg, Pool, PoolConfig};
use anyhow::{ensure, Context, Result};
use glam::{Mat4, Vec4};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Smooth attribute carrying the interpolated world-space position.
pub const WORLD_POS: &str = "world_pos";

/// Flat attribute set on fragments of mipmapped materials before shading.
pub const MIP_LEVEL: &str = "mip_level";

/// Renderer configuration
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Output image width in pixels
    pub width: usize,
    /// Output image height in pixels
    pub height: usize,
    /// Supersampling factor per axis; buffers are `msaa` times larger
    pub msaa: usize,
    pub workers: usize,
    /// Pixels per fragment-pass task
    pub batch_size: usize,
    pub queue_capacity: usize,
    /// Fragment buffers in the ring
    pub buffer_count: usize,
    pub format: PixelFormat,
    /// Color of pixels no triangle covered
    pub background: Rgba,
    /// Encode the resolved image with the sRGB transfer curve
    pub gamma_correction: bool,
    pub backface_culling: bool,
    /// Depth slack for the shadow comparison
    pub shadow_bias: f32,
    /// Applied after each fragment shader chain, `(previous, shaded)`
    pub blend: Option<BlendFunc>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 500,
            msaa: 1,
            workers: std::thread::available_parallelism().map_or(4, |n| n.get()),
            batch_size: 32,
            queue_capacity: crate::sched::DEFAULT_QUEUE_CAPACITY,
            buffer_count: 2,
            format: PixelFormat::Rgba,
            background: Rgba::TRANSPARENT,
            gamma_correction: false,
            backface_culling: true,
            shadow_bias: 0.03,
            blend: None,
        }
    }
}

impl RenderConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.width > 0 && self.height > 0,
            "output size must be non-zero, got {}x{}",
            self.width,
            self.height
        );
        ensure!(self.msaa > 0, "msaa factor must be at least 1");
        ensure!(self.batch_size > 0, "batch_size must be non-zero");
        ensure!(self.workers > 0, "workers must be non-zero");
        ensure!(self.queue_capacity > 0, "queue_capacity must be non-zero");
        ensure!(self.buffer_count > 0, "buffer_count must be non-zero");
        Ok(())
    }

    /// Size of the supersampled fragment buffers.
    #[inline]
    pub fn buffer_size(&self) -> (usize, usize) {
        (self.width * self.msaa, self.height * self.msaa)
    }

    fn buffer_options(&self) -> BufferOptions {
        BufferOptions {
            format: self.format,
        }
    }

    fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            workers: self.workers,
            queue_capacity: self.queue_capacity,
            randomizer: None,
        }
    }
}

/// Resolved output, top row first, packed in `format`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub width: usize,
    pub height: usize,
    pub format: PixelFormat,
    pub pixels: Vec<u8>,
}

impl Image {
    /// Pixel at column `x`, row `row` counted from the top. Transparent
    /// outside the image.
    pub fn pixel(&self, x: usize, row: usize) -> Rgba {
        if x >= self.width || row >= self.height {
            return Rgba::TRANSPARENT;
        }
        let i = (row * self.width + x) * 4;
        let Some(bytes) = self.pixels.get(i..i + 4) else {
            return Rgba::TRANSPARENT;
        };
        let mut p = [0u8; 4];
        p.copy_from_slice(bytes);
        self.format.unpack(p)
    }
}

/// Cooperative cancellation for an in-progress `render`.
///
/// Checked between passes only; a running pass always completes.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

/// Forward-pass vertex stage: MVP transform plus world position export.
struct ForwardShader {
    mvp: MvpShader,
    model: Mat4,
}

impl VertexShader for ForwardShader {
    fn vertex(&self, v: Vertex) -> Vertex {
        let world = self.model * v.pos;
        let mut v = self.mvp.vertex(v);
        v.attr_smooth.insert(WORLD_POS, Varying::Vec4(world));
        v
    }
}

/// Depth rendered from a light.
struct ShadowMap {
    view_projection: Mat4,
    perspective: bool,
    buffer: Arc<FragmentBuffer>,
}

impl ShadowMap {
    /// True if `world` is behind the nearest surface seen by the light.
    fn occludes(&self, world: Vec4, bias: f32) -> bool {
        let clip = self.view_projection * world;
        if self.perspective && clip.w > -1e-6 {
            return false;
        }
        let (w, h) = (self.buffer.width() as f32, self.buffer.height() as f32);
        let p = viewport_matrix(w, h) * clip;
        let p = p / p.w;
        let depth = (p.z + 1.0) / 2.0;
        match self.buffer.depth_at(p.x.floor() as i32, p.y.floor() as i32) {
            Some(stored) => depth < stored - bias,
            None => false,
        }
    }
}

/// Deferred stage: material shading plus shadow visibility.
struct DeferredShader {
    materials: Arc<MaterialArena>,
    shadows: Vec<ShadowMap>,
    background: Rgba,
    bias: f32,
}

impl FragmentShader for DeferredShader {
    fn fragment(&self, frag: &Fragment) -> Rgba {
        if !frag.ok {
            return self.background;
        }

        let material = self.materials.resolve(frag.material);
        let mut col = if material.use_mipmap() {
            let mut f = frag.clone();
            let level = frag.mip_level(material.texture_size());
            f.attr_flat.insert(MIP_LEVEL, Varying::Float(level));
            material.shade(&f)
        } else {
            material.shade(frag)
        };

        if material.receive_shadow() {
            if let Some(world) = frag.attr_smooth.get(WORLD_POS).and_then(Varying::as_vec4) {
                for shadow in &self.shadows {
                    if shadow.occludes(world, self.bias) {
                        col = col.scale_rgb(0.5);
                    }
                }
            }
        }
        col
    }
}

struct PrimitiveJob {
    raster: Rasterizer,
    buf: Arc<FragmentBuffer>,
    triangles: Arc<[Triangle]>,
    index: usize,
    shader: Arc<dyn VertexShader>,
}

fn run_primitive_job(arg: Arg) {
    if let Ok(job) = arg.downcast::<PrimitiveJob>() {
        job.raster
            .draw_primitive(&job.buf, &job.triangles[job.index], job.shader.as_ref());
    }
}

pub struct Renderer {
    config: RenderConfig,
    pool: Pool,
    buffers: Vec<Arc<FragmentBuffer>>,
    current: usize,
    shadow_buffers: Vec<Arc<FragmentBuffer>>,
    pub rasterizer: Rasterizer,
    stop: StopHandle,
    stats: PassStats,
}

impl Renderer {
    pub fn new(config: RenderConfig) -> Result<Self> {
        config.validate().context("invalid render configuration")?;
        let pool = Pool::new(config.pool_config()).context("failed to start worker pool")?;
        let buffers = Self::alloc_ring(&config);
        log::debug!(
            "renderer ready: {}x{} msaa {} with {} workers",
            config.width,
            config.height,
            config.msaa,
            config.workers
        );
        Ok(Self {
            rasterizer: Rasterizer {
                perspective: true,
                backface_culling: config.backface_culling,
            },
            config,
            pool,
            buffers,
            current: 0,
            shadow_buffers: Vec::new(),
            stop: StopHandle::default(),
            stats: PassStats::new(),
        })
    }

    fn alloc_ring(config: &RenderConfig) -> Vec<Arc<FragmentBuffer>> {
        let (w, h) = config.buffer_size();
        (0..config.buffer_count)
            .map(|_| Arc::new(FragmentBuffer::with_size(w, h, config.buffer_options())))
            .collect()
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Timings of the last completed frame.
    pub fn stats(&self) -> PassStats {
        self.stats
    }

    /// Mutate the configuration, then reallocate buffers and, when the
    /// worker settings changed, the pool. The old configuration is kept if
    /// the new one is invalid.
    pub fn set_options<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut RenderConfig),
    {
        let mut config = self.config.clone();
        f(&mut config);
        config.validate().context("invalid render configuration")?;

        if config.workers != self.config.workers || config.queue_capacity != self.config.queue_capacity {
            self.pool.release();
            self.pool = Pool::new(config.pool_config()).context("failed to restart worker pool")?;
        }
        self.buffers = Self::alloc_ring(&config);
        self.current = 0;
        self.shadow_buffers.clear();
        self.rasterizer.backface_culling = config.backface_culling;
        self.config = config;
        Ok(())
    }

    pub fn current_buffer(&self) -> Arc<FragmentBuffer> {
        Arc::clone(&self.buffers[self.current])
    }

    /// Advance the ring and return a cleared buffer. A buffer still shared
    /// elsewhere is replaced instead of cleared.
    pub fn next_buffer(&mut self) -> Arc<FragmentBuffer> {
        self.current = (self.current + 1) % self.buffers.len();
        let (w, h) = self.config.buffer_size();
        let opts = self.config.buffer_options();
        recycle(&mut self.buffers[self.current], w, h, opts);
        Arc::clone(&self.buffers[self.current])
    }

    /// Rasterize `triangles` into `buf`, one pool task per valid triangle.
    pub fn draw_primitives(
        &self,
        buf: &Arc<FragmentBuffer>,
        triangles: &Arc<[Triangle]>,
        shader: Arc<dyn VertexShader>,
    ) {
        let valid: Vec<usize> = triangles
            .iter()
            .enumerate()
            .filter(|(_, t)| t.is_valid())
            .map(|(i, _)| i)
            .collect();
        let skipped = triangles.len() - valid.len();
        if skipped > 0 {
            crate::count_add!(crate::perf::FUNCTION_COUNTERS.triangles_invalid, skipped as u64);
            log::trace!("skipping {skipped} degenerate triangles");
        }

        self.pool.add(valid.len() as u64);
        for index in valid {
            let job = PrimitiveJob {
                raster: self.rasterizer,
                buf: Arc::clone(buf),
                triangles: Arc::clone(triangles),
                index,
                shader: Arc::clone(&shader),
            };
            self.pool.run_with_args(run_primitive_job, Box::new(job));
        }
        self.pool.wait();
    }

    /// Run a fragment shader chain over `buf` with the configured blend.
    pub fn draw_fragments(&self, buf: &Arc<FragmentBuffer>, shaders: &ShaderChain) {
        draw_fragments(
            &self.pool,
            buf,
            shaders,
            self.config.blend,
            self.config.batch_size,
        );
    }

    /// Render one frame. Returns `None` if a stop was requested; the flag is
    /// consumed by the call that observes it.
    pub fn render(&mut self, scene: &Scene) -> Option<Image> {
        let frame_start = Instant::now();
        let mut stats = PassStats::new();
        log::debug!(
            "frame: {} meshes, {} triangles, {} lights",
            scene.meshes.len(),
            scene.triangle_count(),
            scene.lights.len()
        );

        if self.stop.take() {
            return None;
        }
        let shadows = {
            let timer = PerfTimer::new("shadow passes");
            let shadows = self.shadow_passes(scene);
            stats.shadow_us = timer.elapsed().as_secs_f64() * 1e6;
            shadows
        };

        if self.stop.take() {
            return None;
        }
        let buf = self.next_buffer();
        {
            let timer = PerfTimer::new("forward pass");
            self.forward_pass(scene, &buf);
            stats.forward_us = timer.elapsed().as_secs_f64() * 1e6;
        }

        if self.stop.take() {
            return None;
        }
        {
            let timer = PerfTimer::new("deferred pass");
            let deferred: Arc<dyn FragmentShader> = Arc::new(DeferredShader {
                materials: Arc::clone(&scene.materials),
                shadows,
                background: self.config.background,
                bias: self.config.shadow_bias,
            });
            self.draw_fragments(&buf, &ShaderChain::from(vec![deferred]));
            stats.deferred_us = timer.elapsed().as_secs_f64() * 1e6;
        }

        if self.stop.take() {
            return None;
        }
        let image = {
            let timer = PerfTimer::new("antialias resolve");
            let image = self.resolve(&buf);
            stats.resolve_us = timer.elapsed().as_secs_f64() * 1e6;
            image
        };

        stats.total_us = frame_start.elapsed().as_secs_f64() * 1e6;
        self.stats = stats;
        Some(image)
    }

    fn shadow_passes(&mut self, scene: &Scene) -> Vec<ShadowMap> {
        let casters: Vec<Camera> = scene
            .lights
            .iter()
            .filter(|l| l.cast_shadow)
            .map(|l| l.camera)
            .collect();
        if casters.is_empty() {
            return Vec::new();
        }

        let (w, h) = self.config.buffer_size();
        let opts = self.config.buffer_options();
        self.shadow_buffers
            .resize_with(casters.len(), || Arc::new(FragmentBuffer::with_size(w, h, opts)));

        let saved = self.rasterizer;
        let mut maps = Vec::with_capacity(casters.len());
        for (i, camera) in casters.iter().enumerate() {
            recycle(&mut self.shadow_buffers[i], w, h, opts);
            let buf = Arc::clone(&self.shadow_buffers[i]);
            let view_projection = camera.view_projection_matrix();
            self.rasterizer.perspective = camera.is_perspective();

            scene.visit_meshes(|mesh| {
                if mesh.cast_shadow {
                    let shader: Arc<dyn VertexShader> =
                        Arc::new(MvpShader::from_view_projection(view_projection * mesh.model));
                    self.draw_primitives(&buf, &mesh.triangles, shader);
                }
                true
            });

            maps.push(ShadowMap {
                view_projection,
                perspective: camera.is_perspective(),
                buffer: buf,
            });
        }
        self.rasterizer = saved;
        maps
    }

    fn forward_pass(&mut self, scene: &Scene, buf: &Arc<FragmentBuffer>) {
        let camera = &scene.camera;
        let view = camera.view_matrix();
        let projection = camera.projection_matrix();
        self.rasterizer.perspective = camera.is_perspective();

        scene.visit_meshes(|mesh| {
            let shader: Arc<dyn VertexShader> = Arc::new(ForwardShader {
                mvp: MvpShader::new(mesh.model, view, projection),
                model: mesh.model,
            });
            self.draw_primitives(buf, &mesh.triangles, shader);
            true
        });
    }

    /// Box-filter `msaa x msaa` blocks down to the output size.
    fn resolve(&self, buf: &FragmentBuffer) -> Image {
        let (width, height, m) = (self.config.width, self.config.height, self.config.msaa);
        let format = self.config.format;
        let gamma = self.config.gamma_correction;
        let samples = (m * m) as u32;
        let mut pixels = vec![0u8; width * height * 4];

        pixels
            .par_chunks_mut(width * 4)
            .enumerate()
            .for_each(|(row, out)| {
                let y = (height - 1 - row) * m;
                for x in 0..width {
                    let mut sum = [0u32; 4];
                    for sy in 0..m {
                        for sx in 0..m {
                            let c = buf.color_at((x * m + sx) as i32, (y + sy) as i32);
                            sum[0] += c.r as u32;
                            sum[1] += c.g as u32;
                            sum[2] += c.b as u32;
                            sum[3] += c.a as u32;
                        }
                    }
                    let avg = |s: u32| ((s + samples / 2) / samples) as u8;
                    let mut c = Rgba::new(avg(sum[0]), avg(sum[1]), avg(sum[2]), avg(sum[3]));
                    if gamma {
                        let enc = |v: u8| (linear_to_srgb(v as f32 / 255.0) * 255.0).round() as u8;
                        c = Rgba::new(enc(c.r), enc(c.g), enc(c.b), c.a);
                    }
                    out[x * 4..x * 4 + 4].copy_from_slice(&format.pack(c));
                }
            });

        Image {
            width,
            height,
            format,
            pixels,
        }
    }
}

/// Clear `buf` in place, or swap in a fresh buffer if it is still shared.
fn recycle(buf: &mut Arc<FragmentBuffer>, w: usize, h: usize, opts: BufferOptions) {
    match Arc::get_mut(buf) {
        Some(b) => b.clear(),
        None => {
            log::warn!("fragment buffer still referenced, allocating a new one");
            *buf = Arc::new(FragmentBuffer::with_size(w, h, opts));
        }
    }
}
