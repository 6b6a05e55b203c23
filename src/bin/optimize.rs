/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Optimize entry point: greedy patch followed by MILP refinement of the
//! patched link.
//!
//! Follows the same failure contract as the patch entry point: on a
//! semantic failure (patch infeasible, no incumbent) only the timing
//! document is written and the process exits 0.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use shp_scheduler::config::SchedulerConfig;
use shp_scheduler::io;
use shp_scheduler::patch::PatchSession;
use shp_scheduler::scheduler::optimize::OptimizeSession;
use shp_scheduler::scheduler::ScheduleError;
use shp_scheduler::solver::cbc::CbcBackend;

#[derive(Parser)]
#[command(
    name = "optimize",
    about = "Patch one link's schedule, then refine it with the MILP solver"
)]
struct Args {
    /// Optimize document (XML)
    input: PathBuf,
    /// Output optimized-schedule document (XML)
    output: PathBuf,
    /// Output timing document (XML)
    timing: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let args = Args::parse();

    let input = io::read::read_optimize(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;

    // Fast heuristic first: a feasible starting point and an early exit
    // when the ranges cannot host the new traffic at all
    let mut patch_session = PatchSession::new(input);
    if let Err(e) = patch_session.run() {
        match e {
            ScheduleError::PatchInfeasible { .. } | ScheduleError::Invalid(_) => {
                error!("{e}");
                io::write::write_timing(&args.timing, patch_session.execution_time_ns())
                    .with_context(|| format!("writing {}", args.timing.display()))?;
                return Ok(());
            }
            other => return Err(other.into()),
        }
    }
    let mut input = patch_session.into_input();

    let mut session = OptimizeSession::new(CbcBackend::new(), SchedulerConfig::default());
    match session.run(&mut input) {
        Ok(()) => {
            io::write::write_timing(&args.timing, session.execution_time_ns())
                .with_context(|| format!("writing {}", args.timing.display()))?;
            io::write::write_link_schedule(
                &args.output,
                "OptimizedSchedule",
                input.link_id,
                &input.pending,
            )
            .with_context(|| format!("writing {}", args.output.display()))?;
            Ok(())
        }
        Err(e @ (ScheduleError::NoSchedule { .. } | ScheduleError::Invalid(_))) => {
            error!("{e}");
            io::write::write_timing(&args.timing, session.execution_time_ns())
                .with_context(|| format!("writing {}", args.timing.display()))?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
