pub mod camera;
pub mod color;
pub mod geometry;
pub mod material;
pub mod perf;
pub mod rendering;
pub mod scene;
pub mod sched;
/// Polyraster - concurrent CPU triangle rasterizer
/// Lock-striped fragment buffer driven by a fork-join worker pool
pub mod sync;

pub use camera::{Camera, Projection};
pub use color::{alpha_blend, BlendFunc, PixelFormat, Rgba};
pub use geometry::{Aabb, AttrMap, Fragment, Triangle, Varying, Vertex};
pub use material::{Material, MaterialArena, MaterialId, SolidMaterial, VertexColorMaterial};
pub use perf::{CounterSnapshot, FunctionCounters, PassStats, FUNCTION_COUNTERS};
pub use rendering::{
    BufferOptions, FragmentBuffer, FragmentShader, IdentityShader, Image, MvpShader, Rasterizer,
    RenderConfig, Renderer, StopHandle, VertexShader,
};
pub use scene::{Light, Mesh, Scene};
pub use sched::{Pool, PoolConfig};
pub use sync::SpinLock;
