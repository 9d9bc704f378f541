use std::time::Duration;

/// Centralized tunables for the engine. Where the teacher's `DataStore`
/// scattered these across constructor arguments (`set_scroll_config`), they
/// are collected here so every subsystem reads from one place.
#[derive(Debug, Clone)]
pub struct GridConfig {
    /// Minimum time between consecutive drains of the transaction queue.
    /// `Duration::ZERO` means synchronous (drain on every enqueue).
    pub throttle_window: Duration,
    /// Row count above which sorting is dispatched to the worker pool.
    pub parallel_sort_threshold: usize,
    /// Platform scroll-height cap, in pixels, used by scroll virtualization.
    pub scroll_height_cap: f64,
    /// Default overscan row count for newly constructed viewports.
    pub default_overscan: usize,
    /// Attenuation applied to wheel-delta input while virtualization is active.
    pub wheel_dampening: f64,
    /// Number of worker threads in the sort pool.
    pub sort_worker_count: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            throttle_window: Duration::from_millis(50),
            parallel_sort_threshold: 200_000,
            scroll_height_cap: 10_000_000.0,
            default_overscan: 5,
            wheel_dampening: 1.0,
            sort_worker_count: 4,
        }
    }
}

impl GridConfig {
    pub const fn with_throttle_window(mut self, window: Duration) -> Self {
        self.throttle_window = window;
        self
    }

    pub const fn with_parallel_sort_threshold(mut self, threshold: usize) -> Self {
        self.parallel_sort_threshold = threshold;
        self
    }

    pub const fn with_scroll_height_cap(mut self, cap: f64) -> Self {
        self.scroll_height_cap = cap;
        self
    }

    pub const fn with_default_overscan(mut self, overscan: usize) -> Self {
        self.default_overscan = overscan;
        self
    }

    pub const fn with_wheel_dampening(mut self, factor: f64) -> Self {
        self.wheel_dampening = factor;
        self
    }

    pub const fn with_sort_worker_count(mut self, count: usize) -> Self {
        self.sort_worker_count = count;
        self
    }
}
