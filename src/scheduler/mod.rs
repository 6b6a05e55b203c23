/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Scheduling session: constraint model and solving strategies.
//!
//! [`SchedulingSession`] owns everything one scheduling run needs (the
//! solver backend, the slack-variable registries, the constraint counters
//! and the session state machine), so nothing is process-wide and two
//! sessions never share state.
//!
//! The constraint system, in timeslot units throughout:
//!
//! * **Variable domains**: `x(F, ℓ, i, r)` ranges over
//!   `[start + i·period + r·dur, deadline − dur + i·period − r·dur]`;
//!   SHP reservation variables are pinned at `i·period`.
//! * **Path dependency**: consecutive hops of a path are separated by at
//!   least `dur + switch_min_time`, slackened by the frame distance.
//! * **End-to-end**: the spread between the first and last hop is bounded
//!   by the end-to-end budget (omitted when the budget is 0, i.e.
//!   unconstrained), and the frame distance pushes the first hop away from
//!   its release and the last away from its deadline.
//! * **Contention-free**: for every pair of frames sharing a link whose
//!   instance windows overlap, a disjunction of two guarded separation rows
//!   keeps their transmissions apart, slackened by the link distance.
//! * **Objective**: maximize `0.9·ΣFrameDist + 0.1·ΣLinkDist`.
//!
//! Two strategies share the model: *one-shot* emits everything and solves
//! once; *incremental* emits and solves `frames_iteration` frames at a time,
//! pinning every solved offset with an equality row and zeroing its slack's
//! objective coefficient before the next batch (removing the variables would
//! invalidate the pins that reference them).

pub mod error;
pub mod optimize;
pub mod verify;

pub use error::ScheduleError;

use std::ops::Range;

use tracing::{debug, info};

use crate::config::{Algorithm, SchedulerConfig};
use crate::frame::{Frame, Offset, Traffic};
use crate::network::Network;
use crate::solver::{MilpBackend, Sense, SolveStatus, VarId, VarKind};
use crate::timing::{self, TimeBase};

// ── Objective weights ─────────────────────────────────────────────────────────

/// Objective weight of the frame distance slacks.
const FRAME_DISTANCE_WEIGHT: f64 = 0.9;
/// Objective weight of the link distance slacks.
const LINK_DISTANCE_WEIGHT: f64 = 0.1;

// ── Session state ─────────────────────────────────────────────────────────────

/// State machine of one scheduling session.
///
/// `Loaded` and `Prepared` are reached by document ingestion and
/// [`prepare`]; the session itself walks `Prepared → Solving → Solved →
/// Verified`, or `Failed` on any error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Prepared,
    Solving,
    Solved,
    Verified,
    Failed,
}

// ── Prepared inputs ───────────────────────────────────────────────────────────

/// Network and traffic after the time model and the offset graph builder
/// have run: all durations in timeslots, every frame's offsets materialized,
/// and the SHP reservation frame built when the protocol is active.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub network: Network,
    pub traffic: Traffic,
    pub reservation: Option<Frame>,
    pub base: TimeBase,
}

/// Run the time model and the offset graph builder over freshly ingested
/// inputs.
pub fn prepare(mut network: Network, mut traffic: Traffic) -> Result<Prepared, ScheduleError> {
    let base = timing::resolve(&mut network, &mut traffic)?;

    for frame in traffic.frames_mut() {
        frame.init_offsets(&network.topology, base.timeslot_ns, base.hyperperiod)?;
    }

    let reservation = if network.shp.is_active() {
        let max_link = network.topology.max_link_id().unwrap_or(0);
        Some(Frame::reservation(&network.shp, max_link, base.hyperperiod))
    } else {
        None
    };

    info!(
        frames = traffic.len(),
        links = network.topology.num_links(),
        shp_active = network.shp.is_active(),
        "offset graph prepared"
    );

    Ok(Prepared {
        network,
        traffic,
        reservation,
        base,
    })
}

// ── Constraint counters ───────────────────────────────────────────────────────

/// Per-family constraint and choice-variable counters.  Used both for unique
/// entity names inside the backend and for progress logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConstraintCounters {
    pub path: u64,
    pub end: u64,
    pub avoid: u64,
    pub x: u64,
    pub y: u64,
    pub z: u64,
    pub disjunction: u64,
    pub fix: u64,
}

// ── Scheduling session ────────────────────────────────────────────────────────

/// One scheduling run over a [`Prepared`] network and traffic set.
pub struct SchedulingSession<B: MilpBackend> {
    backend: B,
    config: SchedulerConfig,
    frame_weight: f64,
    link_weight: f64,
    /// FrameDist variable per frame index, created with the frame's batch.
    frame_dis: Vec<Option<VarId>>,
    /// LinkDist variable per link id; replaced every iteration, the previous
    /// copy keeps living in the model with a zeroed objective coefficient.
    link_dis: Vec<Option<VarId>>,
    counters: ConstraintCounters,
    state: SessionState,
}

fn var_of(off: &Offset, inst: usize, repl: usize) -> VarId {
    off.var(inst, repl)
        .expect("offset variable created before constraints reference it")
}

impl<B: MilpBackend> SchedulingSession<B> {
    pub fn new(backend: B, config: SchedulerConfig) -> Self {
        Self {
            backend,
            config,
            frame_weight: FRAME_DISTANCE_WEIGHT,
            link_weight: LINK_DISTANCE_WEIGHT,
            frame_dis: Vec::new(),
            link_dis: Vec::new(),
            counters: ConstraintCounters::default(),
            state: SessionState::Prepared,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn counters(&self) -> ConstraintCounters {
        self.counters
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    // ── Public entry point ────────────────────────────────────────────────────

    /// Solve the prepared instance with the configured strategy, write the
    /// offsets back into the traffic, and verify the result.
    pub fn run(&mut self, prepared: &mut Prepared) -> Result<(), ScheduleError> {
        debug_assert_eq!(self.state, SessionState::Prepared, "session is single-use");
        self.state = SessionState::Solving;

        self.frame_dis = vec![None; prepared.traffic.len()];
        let table_len = prepared
            .network
            .topology
            .max_link_id()
            .map(|m| m + 1)
            .unwrap_or(0);
        self.link_dis = vec![None; table_len];

        let solved = match self.config.algorithm {
            Algorithm::OneShot => self.one_shot(prepared),
            Algorithm::Incremental => self.incremental(prepared),
        };
        if let Err(e) = solved {
            self.state = SessionState::Failed;
            return Err(e);
        }
        self.state = SessionState::Solved;

        match verify::check_schedule(
            &prepared.traffic,
            prepared.reservation.as_ref(),
            prepared.network.switch.min_time,
        ) {
            Ok(()) => {
                self.state = SessionState::Verified;
                info!(
                    vars = self.backend.num_vars(),
                    constraints = self.backend.num_constraints(),
                    "schedule verified"
                );
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Failed;
                Err(e.into())
            }
        }
    }

    // ── Strategies ────────────────────────────────────────────────────────────

    /// Build the whole model and invoke the solver once.
    fn one_shot(&mut self, prepared: &mut Prepared) -> Result<(), ScheduleError> {
        let all = 0..prepared.traffic.len();
        info!(frames = all.len(), "one-shot scheduling");

        self.create_offset_variables(prepared, all.clone(), true);
        self.create_intermission_variables(prepared, all.clone(), 0);
        self.path_dependent(prepared, all.clone());
        self.end_to_end_delay(prepared, all.clone());
        self.contention_free(prepared, all.clone());
        self.backend.update();

        match self.backend.optimize(&self.config.solve_params())? {
            SolveStatus::NoIncumbent => Err(ScheduleError::NoSchedule { iteration: None }),
            SolveStatus::Feasible => self.save_offsets(prepared, all),
        }
    }

    /// Solve `frames_iteration` frames per solver invocation, pinning each
    /// batch before introducing the next.
    fn incremental(&mut self, prepared: &mut Prepared) -> Result<(), ScheduleError> {
        let total = prepared.traffic.len();
        let mut scheduled = 0;
        let mut it = 1;

        while scheduled < total {
            let count = self.config.frames_iteration.min(total - scheduled);
            let batch = scheduled..scheduled + count;
            info!(iteration = it, batch = count, scheduled, "incremental iteration");

            // SHP variables exist exactly once, created with the first batch
            self.create_offset_variables(prepared, batch.clone(), scheduled == 0);
            self.create_intermission_variables(prepared, batch.clone(), it);
            self.path_dependent(prepared, batch.clone());
            self.end_to_end_delay(prepared, batch.clone());
            self.contention_free(prepared, batch.clone());
            self.backend.update();

            match self.backend.optimize(&self.config.solve_params())? {
                SolveStatus::NoIncumbent => {
                    return Err(ScheduleError::NoSchedule {
                        iteration: Some(it),
                    });
                }
                SolveStatus::Feasible => self.save_offsets(prepared, batch)?,
            }

            it += 1;
            scheduled += count;
        }

        Ok(())
    }

    // ── Variable creation ─────────────────────────────────────────────────────

    /// Offset variables for the batch, bounded by release and deadline, plus
    /// the pinned SHP reservation variables when `do_protocol` is set.
    fn create_offset_variables(
        &mut self,
        prepared: &mut Prepared,
        batch: Range<usize>,
        do_protocol: bool,
    ) {
        for i in batch {
            let frame_id = prepared.traffic.id(i);
            let frame = prepared.traffic.frame_mut(i);
            let (period, starting, deadline) =
                (frame.period() as i64, frame.starting() as i64, frame.deadline() as i64);

            for ox in 0..frame.num_offsets() {
                let off = frame.offset_mut(ox);
                let time = off.time() as i64;
                for inst in 0..off.num_instances() {
                    for repl in 0..off.num_replicas() {
                        let name =
                            format!("Off_{}_{}_{}_{}", frame_id, off.link_id(), inst, repl);
                        let lb = starting + inst as i64 * period + repl as i64 * time;
                        let ub = deadline - time + inst as i64 * period - repl as i64 * time;
                        let var = self.backend.add_var(&name, VarKind::Integer, lb, ub, 0.0);
                        off.set_var(inst, repl, var);
                    }
                }
            }
        }

        if do_protocol {
            if let Some(reservation) = prepared.reservation.as_mut() {
                let period = reservation.period() as i64;
                for ox in 0..reservation.num_offsets() {
                    let off = reservation.offset_mut(ox);
                    for inst in 0..off.num_instances() {
                        let name = format!("SHP_{}_{}", off.link_id(), inst);
                        let value = inst as i64 * period;
                        let var =
                            self.backend.add_var(&name, VarKind::Integer, value, value, 0.0);
                        off.set_var(inst, 0, var);
                        off.set_transmission(inst, 0, value as u64);
                    }
                }
            }
        }
        self.backend.update();
    }

    /// Frame and link distance slacks for this iteration.  Previous
    /// iterations' link distances lose their objective coefficient; the
    /// fresh copies carry it from here on.
    fn create_intermission_variables(
        &mut self,
        prepared: &Prepared,
        batch: Range<usize>,
        it: usize,
    ) {
        let previous: Vec<VarId> = self.link_dis.iter().flatten().copied().collect();
        for var in previous {
            self.backend.set_objective_coeff(var, 0.0);
        }

        for i in batch {
            let name = format!("FrameDis_{}", prepared.traffic.id(i));
            let end_to_end = prepared.traffic.frame(i).end_to_end() as i64;
            let var =
                self.backend
                    .add_var(&name, VarKind::Integer, 0, end_to_end, self.frame_weight);
            self.frame_dis[i] = Some(var);
        }

        let hyperperiod = prepared.base.hyperperiod as i64;
        for link in 0..self.link_dis.len() {
            let name = format!("LinkDis_{}_{}", it, link);
            let var =
                self.backend
                    .add_var(&name, VarKind::Integer, 0, hyperperiod, self.link_weight);
            self.link_dis[link] = Some(var);
        }
    }

    // ── Constraints ───────────────────────────────────────────────────────────

    /// Consecutive hops of every path stay ordered with at least the
    /// transmission duration plus the switch minimum time in between.
    fn path_dependent(&mut self, prepared: &Prepared, batch: Range<usize>) {
        let before = self.counters.path;
        let switch_min = prepared.network.switch.min_time;

        for i in batch {
            let frame = prepared.traffic.frame(i);
            let fd = self.frame_dis[i].expect("intermission variables created with the batch");
            for path in frame.paths() {
                for h in 0..path.len().saturating_sub(1) {
                    let off = frame.offset(path.offset_index(h));
                    let next = frame.offset(path.offset_index(h + 1));
                    let distance = (off.time() + switch_min) as i64;
                    for inst in 0..off.num_instances() {
                        let name = format!("PathDep_{}", self.counters.path);
                        self.counters.path += 1;
                        self.backend.add_linear(
                            &name,
                            &[
                                (var_of(next, inst, 0), 1.0),
                                (var_of(off, inst, 0), -1.0),
                                (fd, -1.0),
                            ],
                            Sense::Geq,
                            distance,
                        );
                    }
                }
            }
        }
        debug!(rows = self.counters.path - before, "path dependency constraints");
    }

    /// First-to-last-hop delay bound per path, and the frame-distance slack
    /// rows that push the first hop off its release and the last hop off its
    /// deadline.
    fn end_to_end_delay(&mut self, prepared: &Prepared, batch: Range<usize>) {
        let before = self.counters.end;

        for i in batch {
            let frame = prepared.traffic.frame(i);
            let fd = self.frame_dis[i].expect("intermission variables created with the batch");
            for path in frame.paths() {
                if path.is_empty() {
                    continue;
                }
                let first = frame.offset(path.offset_index(0));
                let last = frame.offset(path.offset_index(path.len() - 1));
                for inst in 0..first.num_instances() {
                    let n = self.counters.end;
                    let first_var = var_of(first, inst, 0);
                    let last_var = var_of(last, inst, 0);

                    // LAST − FIRST ≤ end-to-end − dur(first); 0 = unconstrained
                    if frame.end_to_end() > 0 {
                        let distance = frame.end_to_end() as i64 - first.time() as i64;
                        self.backend.add_linear(
                            &format!("End_{}_1", n),
                            &[(first_var, -1.0), (last_var, 1.0)],
                            Sense::Leq,
                            distance,
                        );
                    }

                    // FIRST − FrameDist ≥ starting + period·instance
                    let distance =
                        (frame.starting() + frame.period() * inst as u64) as i64;
                    self.backend.add_linear(
                        &format!("End_{}_2", n),
                        &[(first_var, 1.0), (fd, -1.0)],
                        Sense::Geq,
                        distance,
                    );

                    // LAST + FrameDist ≤ deadline − dur(last) + period·instance
                    let distance = (frame.deadline() + frame.period() * inst as u64) as i64
                        - last.time() as i64;
                    self.backend.add_linear(
                        &format!("End_{}_3", n),
                        &[(last_var, 1.0), (fd, 1.0)],
                        Sense::Leq,
                        distance,
                    );
                    self.counters.end += 1;
                }
            }
        }
        debug!(groups = self.counters.end - before, "end-to-end constraints");
    }

    /// Pairwise disjunctive separation on every shared link, against every
    /// previously added frame and against the SHP reservation.
    fn contention_free(&mut self, prepared: &mut Prepared, batch: Range<usize>) {
        let before = self.counters.avoid;

        for fr_it in batch {
            let frame = prepared.traffic.frame(fr_it);
            for ox in 0..frame.num_offsets() {
                let off = frame.offset(ox);
                let link_id = off.link_id();
                let link_inter = self.link_dis[link_id]
                    .expect("intermission variables created with the batch");

                let predecessors = prepared
                    .reservation
                    .iter()
                    .chain(prepared.traffic.frames()[..fr_it].iter());
                let mut pending: Vec<PendingDisjunction> = Vec::new();

                for pre_frame in predecessors {
                    let Some(pre_off) = pre_frame.offset_by_link(link_id) else {
                        continue;
                    };
                    for inst in 0..off.num_instances() {
                        for pre_inst in 0..pre_off.num_instances() {
                            let min1 =
                                frame.period() * inst as u64 + frame.starting() + 1;
                            let max1 =
                                frame.period() * inst as u64 + frame.deadline() + 1;
                            let min2 = pre_frame.period() * pre_inst as u64
                                + pre_frame.starting()
                                + 1;
                            let max2 = pre_frame.period() * pre_inst as u64
                                + pre_frame.deadline()
                                + 1;
                            let windows_overlap = (min1 <= min2 && min2 < max1)
                                || (min2 <= min1 && min1 < max2);
                            if !windows_overlap {
                                continue;
                            }

                            for repl in 0..off.num_replicas() {
                                for pre_repl in 0..pre_off.num_replicas() {
                                    pending.push(PendingDisjunction {
                                        var: var_of(off, inst, repl),
                                        pre_var: var_of(pre_off, pre_inst, pre_repl),
                                        distance: off.time() as i64,
                                        pre_distance: pre_off.time() as i64,
                                    });
                                }
                            }
                        }
                    }
                }

                for d in pending {
                    emit_disjunction(
                        &mut self.backend,
                        &mut self.counters,
                        d.var,
                        d.pre_var,
                        link_inter,
                        d.distance,
                        d.pre_distance,
                    );
                }
            }
        }
        debug!(
            disjunctions = self.counters.avoid - before,
            "contention-free constraints"
        );
    }

    // ── Read-back ─────────────────────────────────────────────────────────────

    /// Store the solved transmission times in the offsets, pin each one in
    /// the model with an equality row, and drop the batch's frame distances
    /// from the objective.
    fn save_offsets(
        &mut self,
        prepared: &mut Prepared,
        batch: Range<usize>,
    ) -> Result<(), ScheduleError> {
        for i in batch {
            let frame = prepared.traffic.frame_mut(i);
            for ox in 0..frame.num_offsets() {
                let off = frame.offset_mut(ox);
                for inst in 0..off.num_instances() {
                    for repl in 0..off.num_replicas() {
                        let var = var_of(off, inst, repl);
                        let value = self.backend.value(var).ok_or_else(|| {
                            crate::solver::SolverError::Backend(
                                "incumbent value missing after solve".to_string(),
                            )
                        })?;
                        off.set_transmission(inst, repl, value as u64);

                        let name = format!("Fix_{}", self.counters.fix);
                        self.counters.fix += 1;
                        self.backend
                            .add_linear(&name, &[(var, 1.0)], Sense::Eq, value);
                    }
                }
            }
            if let Some(fd) = self.frame_dis[i] {
                self.backend.set_objective_coeff(fd, 0.0);
            }
        }
        Ok(())
    }
}

/// One contention-free pair waiting for its choice variables.
struct PendingDisjunction {
    var: VarId,
    pre_var: VarId,
    distance: i64,
    pre_distance: i64,
}

/// One contention-free disjunction: either the current transmission ends
/// (link distance included) before the earlier one starts, or the other way
/// around.  Shared by the scheduling and optimize engines.
#[allow(clippy::too_many_arguments)]
pub(crate) fn emit_disjunction<B: MilpBackend>(
    backend: &mut B,
    counters: &mut ConstraintCounters,
    var: VarId,
    pre_var: VarId,
    link_inter: VarId,
    distance: i64,
    pre_distance: i64,
) {
    let a = backend.add_var(&format!("x_{}", counters.x), VarKind::Binary, 0, 1, 0.0);
    counters.x += 1;
    let b = backend.add_var(&format!("y_{}", counters.y), VarKind::Binary, 0, 1, 0.0);
    counters.y += 1;
    // Pinned to 1: at least one side of the disjunction must hold
    let z = backend.add_var(&format!("z_{}", counters.z), VarKind::Binary, 1, 1, 0.0);
    counters.z += 1;
    backend.add_or(&format!("or_{}", counters.disjunction), z, &[a, b]);
    counters.disjunction += 1;

    // a: current + dur + LinkDist ≤ previous
    backend.add_indicator(
        &format!("Avoid_{}_1", counters.avoid),
        a,
        &[(var, -1.0), (pre_var, 1.0), (link_inter, -1.0)],
        Sense::Geq,
        distance,
    );
    // b: previous + dur + LinkDist ≤ current
    backend.add_indicator(
        &format!("Avoid_{}_2", counters.avoid),
        b,
        &[(var, 1.0), (pre_var, -1.0), (link_inter, -1.0)],
        Sense::Geq,
        pre_distance,
    );
    counters.avoid += 1;
}

// ── Tests ─────────────────────────────────────────────────────────────────────
