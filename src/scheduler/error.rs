/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Structured error types for the scheduling, patch and optimize engines.
//!
//! [`ScheduleError`] is the top-level failure returned by every session
//! entry point.  The lower layers keep their own focused enums
//! ([`crate::timing::TimingError`], [`crate::network::TopologyError`],
//! [`crate::frame::FrameError`], [`super::verify::ScheduleInvalid`]) and are
//! wrapped transparently, so a caller can still match on the exact cause.
//!
//! | Variant | Failure class |
//! |---|---|
//! | `Input` | malformed document, unknown enumerated value |
//! | `Timing` | inconsistent timing parameters, zero timeslot |
//! | `Topology` | duplicate node, self-loop, duplicate link |
//! | `Frame` | frame-level timing/identity validation |
//! | `NoSchedule` | solver returned no incumbent within the time limit |
//! | `Invalid` | verifier rejected a returned incumbent (model/backend bug) |
//! | `PatchInfeasible` | greedy allocator ran out of room within `[min, max]` |
//! | `Backend` | solver API failure |
//!
//! **Do not** collapse these into `anyhow::Error` in library paths; the
//! structured variants are intentional and `anyhow` stays at the binary
//! boundary.

use thiserror::Error;

use crate::frame::{FrameError, FrameId};
use crate::io::InputError;
use crate::network::TopologyError;
use crate::solver::SolverError;
use crate::timing::TimingError;

use super::verify::ScheduleInvalid;

/// Top-level error of one scheduling, patch or optimize session.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// The input document could not be understood.
    #[error(transparent)]
    Input(#[from] InputError),

    /// The timing parameters do not admit a discrete time base.
    #[error(transparent)]
    Timing(#[from] TimingError),

    /// The topology violates a structural invariant.
    #[error(transparent)]
    Topology(#[from] TopologyError),

    /// A frame failed validation or its offset graph could not be built.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// The solver finished without an incumbent.  Carries the incremental
    /// iteration index when applicable.
    #[error("no schedule found{}", .iteration.map(|it| format!(" for the iteration {it}")).unwrap_or_default())]
    NoSchedule { iteration: Option<usize> },

    /// The verifier found a constraint violation in a returned incumbent.
    #[error(transparent)]
    Invalid(#[from] ScheduleInvalid),

    /// The greedy patch allocator could not place an instance within its
    /// allowed transmission range.
    #[error("frame {frame_id} instance {instance} could not be patched")]
    PatchInfeasible { frame_id: FrameId, instance: usize },

    /// The solver API itself failed.
    #[error(transparent)]
    Backend(#[from] SolverError),
}
