/// Task scheduling for the raster and fragment passes
pub mod pool;

pub use pool::{Arg, Pool, PoolConfig, Randomizer, DEFAULT_QUEUE_CAPACITY};
