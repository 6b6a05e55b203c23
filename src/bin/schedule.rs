/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Main scheduling entry point: network + configuration → schedule document.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use shp_scheduler::config::SchedulerConfig;
use shp_scheduler::io;
use shp_scheduler::scheduler::{self, SchedulingSession};
use shp_scheduler::solver::cbc::CbcBackend;

#[derive(Parser)]
#[command(
    name = "schedule",
    about = "Synthesize a collision-free schedule for a time-triggered network"
)]
struct Args {
    /// Network configuration document (XML)
    network: PathBuf,
    /// Scheduler configuration (YAML)
    config: PathBuf,
    /// Output schedule document (XML)
    output: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let args = Args::parse();

    let (network, traffic) = io::read::read_network(&args.network)
        .with_context(|| format!("reading {}", args.network.display()))?;
    let config = SchedulerConfig::load(&args.config)?;

    let mut prepared = scheduler::prepare(network, traffic)?;
    let mut session = SchedulingSession::new(CbcBackend::new(), config);
    session.run(&mut prepared)?;

    io::write::write_schedule(&args.output, &prepared)
        .with_context(|| format!("writing {}", args.output.display()))?;
    Ok(())
}
