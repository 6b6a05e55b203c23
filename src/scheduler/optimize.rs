/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! MILP refinement of a patched link.
//!
//! Re-opens a [`LinkPatch`] as a bounded MILP: the fixed transmissions and
//! the SHP reservation instances are pinned by their bounds, the new frames
//! vary inside their per-instance `[min, max]` ranges, and the objective
//! maximizes the per-frame distance from the range edges plus one link
//! distance per iteration.  Solving reuses the K-at-a-time solve-and-pin
//! flow of the incremental strategy.

use std::time::Instant;

use tracing::{debug, info};

use crate::config::SchedulerConfig;
use crate::patch::LinkPatch;
use crate::solver::{MilpBackend, Sense, SolveParams, SolveStatus, VarId, VarKind};

use super::verify::{self, ScheduleInvalid};
use super::{
    emit_disjunction, ConstraintCounters, ScheduleError, SessionState, FRAME_DISTANCE_WEIGHT,
    LINK_DISTANCE_WEIGHT,
};

/// One optimize run over a patched link.
pub struct OptimizeSession<B: MilpBackend> {
    backend: B,
    params: SolveParams,
    frames_iteration: usize,
    frame_weight: f64,
    link_weight: f64,
    /// FrameDist variable per pending frame index.
    frame_dis: Vec<Option<VarId>>,
    /// This iteration's LinkDist; the previous copy keeps living with a
    /// zeroed objective coefficient.
    link_dis: Option<VarId>,
    /// Pinned SHP reservation variables, one per instance.
    shp_vars: Vec<VarId>,
    counters: ConstraintCounters,
    state: SessionState,
    execution_ns: u64,
}

impl<B: MilpBackend> OptimizeSession<B> {
    pub fn new(backend: B, config: SchedulerConfig) -> Self {
        Self {
            backend,
            params: config.solve_params(),
            frames_iteration: config.frames_iteration,
            frame_weight: FRAME_DISTANCE_WEIGHT,
            link_weight: LINK_DISTANCE_WEIGHT,
            frame_dis: Vec::new(),
            link_dis: None,
            shp_vars: Vec::new(),
            counters: ConstraintCounters::default(),
            state: SessionState::Prepared,
            execution_ns: 0,
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

    /// Wall-clock time of the solver portion of the last run, in
    /// nanoseconds.  Recorded on success and failure alike.
    pub fn execution_time_ns(&self) -> u64 {
        self.execution_ns
    }

    /// Refine the patched link and write the improved transmission times
    /// back into the pending frames.
    pub fn run(&mut self, input: &mut LinkPatch) -> Result<(), ScheduleError> {
        debug_assert_eq!(self.state, SessionState::Prepared, "session is single-use");
        self.state = SessionState::Solving;
        let started = Instant::now();

        let solved = self.solve(input);
        self.execution_ns = started.elapsed().as_nanos() as u64;

        if let Err(e) = solved {
            self.state = SessionState::Failed;
            return Err(e);
        }
        self.state = SessionState::Solved;

        match verify::check_link_schedule(&input.pending, &input.fixed, &input.shp, input.hyperperiod)
        {
            Ok(()) => {
                self.state = SessionState::Verified;
                info!(
                    link = input.link_id,
                    frames = input.pending.len(),
                    execution_ns = self.execution_ns,
                    "optimize complete"
                );
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Failed;
                Err(e.into())
            }
        }
    }

    fn solve(&mut self, input: &mut LinkPatch) -> Result<(), ScheduleError> {
        let total = input.pending.len();
        self.frame_dis = vec![None; total];
        self.add_fixed_traffic(input)?;

        let mut scheduled = 0;
        let mut it = 1;
        while scheduled < total {
            let count = self.frames_iteration.min(total - scheduled);
            let batch = scheduled..scheduled + count;
            info!(iteration = it, batch = count, scheduled, "optimize iteration");

            self.add_pending_traffic(input, batch.clone());
            self.create_intermission_variables(input, batch.clone(), it);
            self.avoid_collisions(input, batch.clone());
            self.backend.update();

            match self.backend.optimize(&self.params)? {
                SolveStatus::NoIncumbent => {
                    return Err(ScheduleError::NoSchedule {
                        iteration: Some(it),
                    });
                }
                SolveStatus::Feasible => self.save_offsets(input, batch)?,
            }

            it += 1;
            scheduled += count;
        }
        Ok(())
    }

    /// Pin the fixed transmissions and the SHP reservation instances by
    /// their bounds.
    fn add_fixed_traffic(&mut self, input: &mut LinkPatch) -> Result<(), ScheduleError> {
        for fr in 0..input.fixed.len() {
            let frame_id = input.fixed.id(fr);
            let off = input.fixed.frame_mut(fr).offset_mut(0);
            for inst in 0..off.num_instances() {
                let t = off
                    .transmission(inst, 0)
                    .ok_or(ScheduleInvalid::MissingOffset {
                        frame_id,
                        link: off.link_id(),
                    })? as i64;
                let name = format!("Fix_Off_{}_{}", fr, inst);
                let var = self.backend.add_var(&name, VarKind::Integer, t, t, 0.0);
                off.set_var(inst, 0, var);
            }
        }

        for k in 0..input.shp.instances(input.hyperperiod) {
            let t = (k as u64 * input.shp.period) as i64;
            let var = self
                .backend
                .add_var(&format!("SHP_{}", k), VarKind::Integer, t, t, 0.0);
            self.shp_vars.push(var);
        }

        self.backend.update();
        Ok(())
    }

    /// Offset variables for the batch, bounded by their transmission ranges.
    fn add_pending_traffic(&mut self, input: &mut LinkPatch, batch: std::ops::Range<usize>) {
        for i in batch {
            let frame_id = input.pending.id(i);
            let off = input.pending.frame_mut(i).offset_mut(0);
            for inst in 0..off.num_instances() {
                let (min, max) = off.range(inst);
                let name = format!("Off_{}_{}", frame_id, inst);
                let var =
                    self.backend
                        .add_var(&name, VarKind::Integer, min as i64, max as i64, 0.0);
                off.set_var(inst, 0, var);
            }
        }
        self.backend.update();
    }

    /// One FrameDist per new frame, bounded by the widest of its instance
    /// ranges and tied to every instance with a pair of slack rows, plus
    /// this iteration's LinkDist.
    fn create_intermission_variables(
        &mut self,
        input: &LinkPatch,
        batch: std::ops::Range<usize>,
        it: usize,
    ) {
        if let Some(previous) = self.link_dis {
            self.backend.set_objective_coeff(previous, 0.0);
        }

        for i in batch {
            let frame_id = input.pending.id(i);
            let off = input.pending.frame(i).offset(0);
            let max_distance = (0..off.num_instances())
                .map(|inst| {
                    let (min, max) = off.range(inst);
                    (max - min) as i64
                })
                .max()
                .unwrap_or(0);

            let fd = self.backend.add_var(
                &format!("FrameDis_{}", frame_id),
                VarKind::Integer,
                0,
                max_distance,
                self.frame_weight,
            );
            self.frame_dis[i] = Some(fd);

            for inst in 0..off.num_instances() {
                let (min, max) = off.range(inst);
                let var = off
                    .var(inst, 0)
                    .expect("offset variables created before the slack rows");
                self.backend.add_linear(
                    &format!("DisLo_{}_{}", frame_id, inst),
                    &[(var, 1.0), (fd, -1.0)],
                    Sense::Geq,
                    min as i64,
                );
                self.backend.add_linear(
                    &format!("DisHi_{}_{}", frame_id, inst),
                    &[(var, 1.0), (fd, 1.0)],
                    Sense::Leq,
                    max as i64,
                );
            }
        }

        self.link_dis = Some(self.backend.add_var(
            &format!("LinkDis_{}", it),
            VarKind::Integer,
            0,
            input.hyperperiod as i64,
            self.link_weight,
        ));
    }

    /// Pairwise disjunctive separation among the new frames, against the
    /// fixed traffic and against the SHP reservation.  Two transmissions
    /// contend when their allowed ranges can touch.
    fn avoid_collisions(&mut self, input: &LinkPatch, batch: std::ops::Range<usize>) {
        let before = self.counters.avoid;
        let link_inter = self.link_dis.expect("intermission variables created");

        for fr in batch {
            let off = input.pending.frame(fr).offset(0);

            let predecessors = input
                .fixed
                .frames()
                .iter()
                .chain(input.pending.frames()[..fr].iter());
            for pre_frame in predecessors {
                let pre_off = pre_frame.offset(0);
                for inst in 0..off.num_instances() {
                    for pre_inst in 0..pre_off.num_instances() {
                        let (min1, max1) = off.range(inst);
                        let (min2, max2) = pre_off.range(pre_inst);
                        let contend = (min1 <= min2 && min2 <= max1)
                            || (min2 <= min1 && min1 <= max2);
                        if !contend {
                            continue;
                        }
                        emit_disjunction(
                            &mut self.backend,
                            &mut self.counters,
                            off.var(inst, 0).expect("offset variable created"),
                            pre_off.var(pre_inst, 0).expect("offset variable created"),
                            link_inter,
                            off.time() as i64,
                            pre_off.time() as i64,
                        );
                    }
                }
            }

            for inst in 0..off.num_instances() {
                for (k, &shp_var) in self.shp_vars.iter().enumerate() {
                    let (min1, max1) = off.range(inst);
                    let min2 = k as u64 * input.shp.period;
                    let max2 = min2 + input.shp.time;
                    let contend =
                        (min1 <= min2 && min2 <= max1) || (min2 <= min1 && min1 <= max2);
                    if !contend {
                        continue;
                    }
                    emit_disjunction(
                        &mut self.backend,
                        &mut self.counters,
                        off.var(inst, 0).expect("offset variable created"),
                        shp_var,
                        link_inter,
                        off.time() as i64,
                        input.shp.time as i64,
                    );
                }
            }
        }
        debug!(
            disjunctions = self.counters.avoid - before,
            "optimize contention constraints"
        );
    }

    /// Read the solved batch back, pin every offset and drop its frame
    /// distance from the objective.
    fn save_offsets(
        &mut self,
        input: &mut LinkPatch,
        batch: std::ops::Range<usize>,
    ) -> Result<(), ScheduleError> {
        for i in batch {
            let off = input.pending.frame_mut(i).offset_mut(0);
            for inst in 0..off.num_instances() {
                let var = off.var(inst, 0).expect("offset variable created");
                let value = self.backend.value(var).ok_or_else(|| {
                    crate::solver::SolverError::Backend(
                        "incumbent value missing after solve".to_string(),
                    )
                })?;
                off.set_transmission(inst, 0, value as u64);

                let name = format!("Fix_{}", self.counters.fix);
                self.counters.fix += 1;
                self.backend
                    .add_linear(&name, &[(var, 1.0)], Sense::Eq, value);
            }
            if let Some(fd) = self.frame_dis[i] {
                self.backend.set_objective_coeff(fd, 0.0);
            }
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
