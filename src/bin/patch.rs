/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Patch entry point: integrate new frames into one link's schedule with the
//! greedy heuristic.
//!
//! On infeasibility only the timing document is written and the process
//! still exits 0; callers detect the failure by the absence of the
//! patched-schedule document.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use shp_scheduler::io;
use shp_scheduler::patch::PatchSession;
use shp_scheduler::scheduler::ScheduleError;

#[derive(Parser)]
#[command(
    name = "patch",
    about = "Greedily integrate new frames into a patched link schedule"
)]
struct Args {
    /// Patch document (XML)
    input: PathBuf,
    /// Output patched-schedule document (XML)
    output: PathBuf,
    /// Output timing document (XML)
    timing: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let args = Args::parse();

    let input = io::read::read_patch(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let mut session = PatchSession::new(input);

    match session.run() {
        Ok(()) => {
            io::write::write_timing(&args.timing, session.execution_time_ns())
                .with_context(|| format!("writing {}", args.timing.display()))?;
            io::write::write_link_schedule(
                &args.output,
                "PatchedSchedule",
                session.input().link_id,
                &session.input().pending,
            )
            .with_context(|| format!("writing {}", args.output.display()))?;
            Ok(())
        }
        Err(e @ ScheduleError::PatchInfeasible { .. }) => {
            error!("{e}");
            io::write::write_timing(&args.timing, session.execution_time_ns())
                .with_context(|| format!("writing {}", args.timing.display()))?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
