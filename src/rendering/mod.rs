pub mod clipping;
pub mod fragment_pass;
pub mod framebuffer;
/// Software rasterization pipeline
/// Concurrent triangle raster into a lock-striped fragment buffer,
/// followed by full-screen fragment passes
pub mod rasterizer;
pub mod renderer;
pub mod shading;

pub use clipping::{clip_near, clip_polygon, clip_triangle, ClippedTriangle, Polygon};
pub use fragment_pass::{draw_fragment, draw_fragments, ShaderChain};
pub use framebuffer::{BufferOptions, FragmentBuffer, Rect};
pub use rasterizer::{DrawResult, Rasterizer};
pub use renderer::{Image, RenderConfig, Renderer, StopHandle, MIP_LEVEL, WORLD_POS};
pub use shading::{FragmentShader, IdentityShader, MvpShader, VertexShader};
