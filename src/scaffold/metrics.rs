//! Opt-in timing hooks for the scaffold pipeline.
//!
//! Timing is collected only with the `mesh_engine_metrics` feature on
//! non-wasm targets, where `std::time::Instant` is available. Otherwise every
//! call is a plain pass-through and [`ScaffoldMetrics::end`] returns `None`.
//!
//! ```ignore
//! let mut metrics = ScaffoldMetrics::default();
//! metrics.begin();
//! let path = metrics.time(TimingBucket::PathSampling, || sampler.sample(&points))?;
//! if let Some(report) = metrics.end() {
//!     println!("path sampling: {} ns", report.path_sampling_ns);
//! }
//! ```

use serde::Serialize;

/// Pipeline stages that accumulate time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimingBucket {
    PathSampling,
    /// Cross-section loop generation.
    Profile,
    Warp,
    WallOffset,
    /// Node and regular element creation.
    Assembly,
    /// Template construction and validation.
    Templates,
    Junction,
}

/// Cumulative nanoseconds per [`TimingBucket`].
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ScaffoldTimingReport {
    pub path_sampling_ns: u64,
    pub profile_ns: u64,
    pub warp_ns: u64,
    pub wall_offset_ns: u64,
    pub assembly_ns: u64,
    pub templates_ns: u64,
    pub junction_ns: u64,
}

impl ScaffoldTimingReport {
    #[must_use]
    pub fn total_ns(&self) -> u64 {
        self.path_sampling_ns
            .saturating_add(self.profile_ns)
            .saturating_add(self.warp_ns)
            .saturating_add(self.wall_offset_ns)
            .saturating_add(self.assembly_ns)
            .saturating_add(self.templates_ns)
            .saturating_add(self.junction_ns)
    }

    #[must_use]
    pub fn total_ms(&self) -> f64 {
        self.total_ns() as f64 / 1_000_000.0
    }
}

/// Accumulator for pipeline timings.
#[derive(Debug, Default)]
pub struct ScaffoldMetrics {
    #[cfg(all(feature = "mesh_engine_metrics", not(target_arch = "wasm32")))]
    report: ScaffoldTimingReport,
}

impl ScaffoldMetrics {
    /// Resets all counters.
    pub fn begin(&mut self) {
        #[cfg(all(feature = "mesh_engine_metrics", not(target_arch = "wasm32")))]
        {
            self.report = ScaffoldTimingReport::default();
        }
    }

    /// The accumulated report, or `None` when metrics are compiled out.
    #[must_use]
    pub fn end(&self) -> Option<ScaffoldTimingReport> {
        #[cfg(all(feature = "mesh_engine_metrics", not(target_arch = "wasm32")))]
        {
            Some(self.report.clone())
        }
        #[cfg(not(all(feature = "mesh_engine_metrics", not(target_arch = "wasm32"))))]
        {
            None
        }
    }

    /// Runs `f`, adding its wall time to `bucket`.
    pub fn time<R>(&mut self, bucket: TimingBucket, f: impl FnOnce() -> R) -> R {
        #[cfg(all(feature = "mesh_engine_metrics", not(target_arch = "wasm32")))]
        {
            let start = std::time::Instant::now();
            let result = f();
            let nanos = start.elapsed().as_nanos().min(u128::from(u64::MAX)) as u64;
            let slot = match bucket {
                TimingBucket::PathSampling => &mut self.report.path_sampling_ns,
                TimingBucket::Profile => &mut self.report.profile_ns,
                TimingBucket::Warp => &mut self.report.warp_ns,
                TimingBucket::WallOffset => &mut self.report.wall_offset_ns,
                TimingBucket::Assembly => &mut self.report.assembly_ns,
                TimingBucket::Templates => &mut self.report.templates_ns,
                TimingBucket::Junction => &mut self.report.junction_ns,
            };
            *slot = slot.saturating_add(nanos);
            result
        }

        #[cfg(not(all(feature = "mesh_engine_metrics", not(target_arch = "wasm32"))))]
        {
            let _ = bucket;
            f()
        }
    }
}
