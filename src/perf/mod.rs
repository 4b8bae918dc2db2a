/// Performance measurement utilities
/// Each render pass is timed and logged for optimization analysis
pub mod profiling;

pub use profiling::{CounterSnapshot, FunctionCounters, FUNCTION_COUNTERS};

use std::time::{Duration, Instant};

pub struct PerfTimer {
    name: &'static str,
    start: Instant,
}

impl PerfTimer {
    #[inline]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
        }
    }

    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for PerfTimer {
    fn drop(&mut self) {
        let elapsed = self.elapsed();
        log::debug!(target: "polyraster::perf", "{}: {:.2}μs", self.name, elapsed.as_micros());
    }
}

/// Per-frame pass timings accumulated by the renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassStats {
    pub shadow_us: f64,
    pub forward_us: f64,
    pub deferred_us: f64,
    pub resolve_us: f64,
    pub total_us: f64,
}

impl PassStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn share(&self, part: f64) -> f64 {
        if self.total_us > 0.0 {
            (part / self.total_us) * 100.0
        } else {
            0.0
        }
    }

    pub fn print_summary(&self) {
        println!("\n============ FRAME SUMMARY ============");
        println!(
            "Shadow Passes:   {:8.2}μs ({:5.1}%)",
            self.shadow_us,
            self.share(self.shadow_us)
        );
        println!(
            "Forward Pass:    {:8.2}μs ({:5.1}%)",
            self.forward_us,
            self.share(self.forward_us)
        );
        println!(
            "Deferred Pass:   {:8.2}μs ({:5.1}%)",
            self.deferred_us,
            self.share(self.deferred_us)
        );
        println!(
            "AA Resolve:      {:8.2}μs ({:5.1}%)",
            self.resolve_us,
            self.share(self.resolve_us)
        );
        println!("───────────────────────────────────────");
        println!("Total:           {:8.2}μs", self.total_us);
        println!("=======================================\n");
    }
}

/// Macro for easy performance measurement
#[macro_export]
macro_rules! perf_scope {
    ($name:expr) => {
        let _timer = $crate::perf::PerfTimer::new($name);
    };
}
