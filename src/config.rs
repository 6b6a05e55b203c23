//! Scheduler configuration loading.
//!
//! The expected YAML structure is:
//! ```yaml
//! schedule:
//!   algorithm:
//!     name: Incremental
//!     mip_gap: 0.0
//!     time_limit: 100.0
//!     frames_iteration: 5
//! ```
//!
//! `mip_gap`, `time_limit` and `frames_iteration` are optional and fall back
//! to their defaults; `frames_iteration` only matters for the incremental
//! algorithm.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::info;

use crate::solver::SolveParams;

// ── Private YAML deserialization types ────────────────────────────────────────

/// Top-level wrapper that maps directly onto the YAML file layout.  Kept
/// private – callers work with [`SchedulerConfig`] instead.
#[derive(Debug, Deserialize)]
struct ConfigFile {
    schedule: ScheduleSection,
}

#[derive(Debug, Deserialize)]
struct ScheduleSection {
    algorithm: AlgorithmSection,
}

#[derive(Debug, Deserialize)]
struct AlgorithmSection {
    name: Algorithm,
    #[serde(default)]
    mip_gap: f64,
    #[serde(default = "default_time_limit")]
    time_limit: f64,
    #[serde(default = "default_frames_iteration")]
    frames_iteration: usize,
}

fn default_time_limit() -> f64 {
    100.0
}

fn default_frames_iteration() -> usize {
    1
}

// ── Public data structures ────────────────────────────────────────────────────

/// Strategy used to schedule the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Algorithm {
    OneShot,
    Incremental,
}

/// Validated scheduler parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerConfig {
    pub algorithm: Algorithm,
    /// Relative MIP gap at which the solver stops (`0.0` = optimal).
    pub mip_gap: f64,
    /// Solver time limit in seconds; per iteration for the incremental
    /// algorithm.
    pub time_limit: f64,
    /// Frames scheduled per iteration of the incremental algorithm.
    pub frames_iteration: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::OneShot,
            mip_gap: 0.0,
            time_limit: default_time_limit(),
            frames_iteration: default_frames_iteration(),
        }
    }
}

impl SchedulerConfig {
    /// Parse and validate `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened, the YAML is
    /// structurally invalid, or a parameter is out of range.
    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading scheduler configuration from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot open configuration file: {}", path.display()))?;

        let file: ConfigFile = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML file: {}", path.display()))?;

        let algo = file.schedule.algorithm;
        if algo.mip_gap < 0.0 {
            bail!("the MIP gap should be equal or larger than 0.0");
        }
        if algo.time_limit < 0.0 {
            bail!("the time limit should be equal or larger than 0.0");
        }
        if algo.frames_iteration == 0 {
            bail!("frames_iteration should be at least 1");
        }

        let config = Self {
            algorithm: algo.name,
            mip_gap: algo.mip_gap,
            time_limit: algo.time_limit,
            frames_iteration: algo.frames_iteration,
        };
        info!(
            algorithm = ?config.algorithm,
            mip_gap = config.mip_gap,
            time_limit = config.time_limit,
            frames_iteration = config.frames_iteration,
            "scheduler configuration loaded"
        );
        Ok(config)
    }

    /// Per-invocation solver parameters derived from this configuration.
    pub fn solve_params(&self) -> SolveParams {
        SolveParams {
            mip_gap: self.mip_gap,
            time_limit: self.time_limit,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
