/// Instrumentation for the raster and scheduling hot paths
/// Counters are only touched when the `profiling` feature is enabled
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe performance counters for function call tracking
pub struct FunctionCounters {
    // Primitive counters
    pub draw_primitive_calls: AtomicU64,
    pub triangles_invalid: AtomicU64,
    pub triangles_backface_culled: AtomicU64,
    pub triangles_frustum_culled: AtomicU64,
    pub triangles_clipped: AtomicU64,
    pub clipped_subtriangles: AtomicU64,

    // Pixel counters
    pub pixels_tested: AtomicU64,
    pub depth_test_passed: AtomicU64,
    pub depth_test_failed: AtomicU64,
    pub fragments_written: AtomicU64,

    // Fragment pass counters
    pub fragment_batches: AtomicU64,
    pub fragments_shaded: AtomicU64,

    // Buffer and scheduler counters
    pub buffer_clear_calls: AtomicU64,
    pub pool_tasks_run: AtomicU64,
}

impl FunctionCounters {
    pub const fn new() -> Self {
        Self {
            draw_primitive_calls: AtomicU64::new(0),
            triangles_invalid: AtomicU64::new(0),
            triangles_backface_culled: AtomicU64::new(0),
            triangles_frustum_culled: AtomicU64::new(0),
            triangles_clipped: AtomicU64::new(0),
            clipped_subtriangles: AtomicU64::new(0),
            pixels_tested: AtomicU64::new(0),
            depth_test_passed: AtomicU64::new(0),
            depth_test_failed: AtomicU64::new(0),
            fragments_written: AtomicU64::new(0),
            fragment_batches: AtomicU64::new(0),
            fragments_shaded: AtomicU64::new(0),
            buffer_clear_calls: AtomicU64::new(0),
            pool_tasks_run: AtomicU64::new(0),
        }
    }

    fn all(&self) -> [&AtomicU64; 14] {
        [
            &self.draw_primitive_calls,
            &self.triangles_invalid,
            &self.triangles_backface_culled,
            &self.triangles_frustum_culled,
            &self.triangles_clipped,
            &self.clipped_subtriangles,
            &self.pixels_tested,
            &self.depth_test_passed,
            &self.depth_test_failed,
            &self.fragments_written,
            &self.fragment_batches,
            &self.fragments_shaded,
            &self.buffer_clear_calls,
            &self.pool_tasks_run,
        ]
    }

    /// Reset all counters to zero
    pub fn reset(&self) {
        for counter in self.all() {
            counter.store(0, Ordering::Relaxed);
        }
    }

    /// Get snapshot of all counters
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            draw_primitive_calls: self.draw_primitive_calls.load(Ordering::Relaxed),
            triangles_invalid: self.triangles_invalid.load(Ordering::Relaxed),
            triangles_backface_culled: self.triangles_backface_culled.load(Ordering::Relaxed),
            triangles_frustum_culled: self.triangles_frustum_culled.load(Ordering::Relaxed),
            triangles_clipped: self.triangles_clipped.load(Ordering::Relaxed),
            clipped_subtriangles: self.clipped_subtriangles.load(Ordering::Relaxed),
            pixels_tested: self.pixels_tested.load(Ordering::Relaxed),
            depth_test_passed: self.depth_test_passed.load(Ordering::Relaxed),
            depth_test_failed: self.depth_test_failed.load(Ordering::Relaxed),
            fragments_written: self.fragments_written.load(Ordering::Relaxed),
            fragment_batches: self.fragment_batches.load(Ordering::Relaxed),
            fragments_shaded: self.fragments_shaded.load(Ordering::Relaxed),
            buffer_clear_calls: self.buffer_clear_calls.load(Ordering::Relaxed),
            pool_tasks_run: self.pool_tasks_run.load(Ordering::Relaxed),
        }
    }
}

impl Default for FunctionCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of counter values at a point in time
#[derive(Debug, Clone, Copy, Default)]
pub struct CounterSnapshot {
    pub draw_primitive_calls: u64,
    pub triangles_invalid: u64,
    pub triangles_backface_culled: u64,
    pub triangles_frustum_culled: u64,
    pub triangles_clipped: u64,
    pub clipped_subtriangles: u64,
    pub pixels_tested: u64,
    pub depth_test_passed: u64,
    pub depth_test_failed: u64,
    pub fragments_written: u64,
    pub fragment_batches: u64,
    pub fragments_shaded: u64,
    pub buffer_clear_calls: u64,
    pub pool_tasks_run: u64,
}

impl CounterSnapshot {
    /// Print formatted report
    pub fn print_report(&self) {
        println!("\n=== Performance Counters Report ===");
        println!("\nPrimitive Operations:");
        println!("  draw_primitive calls:       {:12}", self.draw_primitive_calls);
        println!("  invalid triangles skipped:  {:12}", self.triangles_invalid);
        println!("  back-face culled:           {:12}", self.triangles_backface_culled);
        println!("  frustum culled:             {:12}", self.triangles_frustum_culled);
        println!("  triangles clipped:          {:12}", self.triangles_clipped);
        println!("  clipped sub-triangles:      {:12}", self.clipped_subtriangles);

        println!("\nPixel Operations:");
        println!("  pixels tested:              {:12}", self.pixels_tested);
        println!("  depth test passed:          {:12}", self.depth_test_passed);
        println!("  depth test failed:          {:12}", self.depth_test_failed);
        let attempts = self.depth_test_passed + self.depth_test_failed;
        if attempts > 0 {
            let pass_rate = (self.depth_test_passed as f64 / attempts as f64) * 100.0;
            println!("  depth test pass rate:       {:11.2}%", pass_rate);
        }
        println!("  fragments written:          {:12}", self.fragments_written);

        println!("\nFragment Pass:");
        println!("  batches scheduled:          {:12}", self.fragment_batches);
        println!("  fragments shaded:           {:12}", self.fragments_shaded);

        println!("\nBuffers and Scheduling:");
        println!("  buffer clear calls:         {:12}", self.buffer_clear_calls);
        println!("  pool tasks run:             {:12}", self.pool_tasks_run);

        println!();
    }
}

/// Global function counters instance
pub static FUNCTION_COUNTERS: FunctionCounters = FunctionCounters::new();

/// Macro for incrementing a counter (only when profiling feature is enabled)
#[macro_export]
macro_rules! count_call {
    ($counter:expr) => {
        #[cfg(feature = "profiling")]
        {
            $counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }
    };
}

/// Macro for adding to a counter (only when profiling feature is enabled)
#[macro_export]
macro_rules! count_add {
    ($counter:expr, $value:expr) => {
        #[cfg(feature = "profiling")]
        {
            $counter.fetch_add($value, std::sync::atomic::Ordering::Relaxed);
        }
    };
}
