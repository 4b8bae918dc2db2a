/// Geometric primitives consumed and produced by the rasterizer
pub mod fragment;
pub mod math;
pub mod triangle;
pub mod vertex;

pub use fragment::Fragment;
pub use math::{barycoord, interpolate, is_valid_triangle, viewport_matrix, Aabb};
pub use triangle::Triangle;
pub use vertex::{AttrMap, Varying, Vertex};
