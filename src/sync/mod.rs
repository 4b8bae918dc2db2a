/// Low-level synchronization primitives
pub mod spinlock;

pub use spinlock::{SpinGuard, SpinLock};
