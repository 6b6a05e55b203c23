/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Greedy single-link patch engine.
//!
//! Integrates new frames into the free space of one link whose schedule is
//! already partially fixed: the occupied intervals (fixed transmissions plus
//! the SHP reservation windows) are kept in a sorted list, and each new
//! instance is placed at the earliest free slot inside its `[min, max]`
//! transmission range.  Intra-frame order is instance order, inter-frame
//! order is the input order, and there is no backtracking: the first
//! instance that does not fit fails the whole patch.
//!
//! All values are in timeslot units; intervals are half-open `[start, end)`.

use std::time::Instant;

use tracing::{debug, info};

use crate::frame::Traffic;
use crate::network::{LinkId, ShpConfig};
use crate::scheduler::error::ScheduleError;
use crate::scheduler::verify::{self, ScheduleInvalid};
use crate::scheduler::SessionState;

// ── Occupied intervals ────────────────────────────────────────────────────────

/// Sorted list of occupied half-open intervals on one link.
///
/// A sorted vector rather than a linked list; the allocation walk only ever
/// moves forward, so ordered storage is all it needs.
#[derive(Debug, Clone, Default)]
pub struct OccupiedIntervals {
    spans: Vec<(u64, u64)>,
}

impl OccupiedIntervals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a known transmission `[start, end)` at its sorted position.
    pub fn insert(&mut self, start: u64, end: u64) {
        let at = self
            .spans
            .partition_point(|&(s, _)| s <= start);
        self.spans.insert(at, (start, end));
    }

    /// Greedily place a transmission of `duration` slots starting no earlier
    /// than `min` and no later than `max`.  Walks the occupied list, skipping
    /// past every interval that overlaps the candidate; returns the start
    /// slot on success, inserting the new interval at its sorted position.
    pub fn allocate(&mut self, min: u64, max: u64, duration: u64) -> Option<u64> {
        let mut start = min;
        for &(s, e) in &self.spans {
            if start + duration <= s {
                // Fits strictly before this interval; later ones start even
                // later, so the search is over
                break;
            }
            if e <= start {
                continue;
            }
            start = e;
            if start > max {
                return None;
            }
        }
        if start > max {
            return None;
        }
        self.insert(start, start + duration);
        Some(start)
    }

    pub fn spans(&self) -> &[(u64, u64)] {
        &self.spans
    }

    /// Whether the list is sorted by start and pairwise disjoint.
    pub fn is_consistent(&self) -> bool {
        self.spans
            .windows(2)
            .all(|w| w[0].0 <= w[1].0 && w[0].1 <= w[1].0)
    }
}

// ── Patch input ───────────────────────────────────────────────────────────────

/// One link's patch problem: already-fixed transmissions plus new frames
/// carrying per-instance transmission ranges.
#[derive(Debug, Clone)]
pub struct LinkPatch {
    pub link_id: LinkId,
    pub hyperperiod: u64,
    pub shp: ShpConfig,
    /// Frames whose transmission times on the link are already decided.
    pub fixed: Traffic,
    /// Frames to integrate, in priority order.
    pub pending: Traffic,
}

// ── Patch session ─────────────────────────────────────────────────────────────

/// One run of the greedy patch heuristic over a [`LinkPatch`].
#[derive(Debug)]
pub struct PatchSession {
    input: LinkPatch,
    execution_ns: u64,
    state: SessionState,
}

impl PatchSession {
    pub fn new(input: LinkPatch) -> Self {
        Self {
            input,
            execution_ns: 0,
            state: SessionState::Prepared,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Wall-clock time of the last heuristic run, in nanoseconds.  Recorded
    /// on success and on failure alike, so the timing document can always be
    /// written.
    pub fn execution_time_ns(&self) -> u64 {
        self.execution_ns
    }

    pub fn input(&self) -> &LinkPatch {
        &self.input
    }

    /// Give the (possibly patched) problem back, e.g. to hand it to the
    /// optimize engine.
    pub fn into_input(self) -> LinkPatch {
        self.input
    }

    /// Run the heuristic and write the placements into the pending frames.
    pub fn run(&mut self) -> Result<(), ScheduleError> {
        debug_assert_eq!(self.state, SessionState::Prepared, "session is single-use");
        self.state = SessionState::Solving;
        let started = Instant::now();

        let result = Self::allocate_all(&mut self.input);
        self.execution_ns = started.elapsed().as_nanos() as u64;

        if let Err(e) = result {
            self.state = SessionState::Failed;
            return Err(e);
        }
        self.state = SessionState::Solved;

        match verify::check_link_schedule(
            &self.input.pending,
            &self.input.fixed,
            &self.input.shp,
            self.input.hyperperiod,
        ) {
            Ok(()) => {
                self.state = SessionState::Verified;
                info!(
                    link = self.input.link_id,
                    frames = self.input.pending.len(),
                    execution_ns = self.execution_ns,
                    "patch complete"
                );
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Failed;
                Err(e.into())
            }
        }
    }

    fn allocate_all(input: &mut LinkPatch) -> Result<(), ScheduleError> {
        let mut occupied = OccupiedIntervals::new();

        // Fixed transmissions
        for (id, frame) in input.fixed.iter() {
            let off = frame.offset(0);
            for inst in 0..off.num_instances() {
                let t = off
                    .transmission(inst, 0)
                    .ok_or(ScheduleInvalid::MissingOffset {
                        frame_id: id,
                        link: off.link_id(),
                    })?;
                occupied.insert(t, t + off.time());
            }
        }

        // SHP reservation windows
        for k in 0..input.shp.instances(input.hyperperiod) {
            let t = k as u64 * input.shp.period;
            occupied.insert(t, t + input.shp.time);
        }
        debug!(
            occupied = occupied.spans().len(),
            "pre-populated occupied intervals"
        );

        // New frames, input order, instance order, no backtracking
        for i in 0..input.pending.len() {
            let frame_id = input.pending.id(i);
            let frame = input.pending.frame_mut(i);
            let off = frame.offset_mut(0);
            let duration = off.time();
            for inst in 0..off.num_instances() {
                let (min, max) = off.range(inst);
                match occupied.allocate(min, max, duration) {
                    Some(t) => {
                        off.set_transmission(inst, 0, t);
                        debug!(frame = frame_id, instance = inst, slot = t, "placed");
                    }
                    None => {
                        return Err(ScheduleError::PatchInfeasible {
                            frame_id,
                            instance: inst,
                        });
                    }
                }
            }
        }

        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;

    // ── OccupiedIntervals ─────────────────────────────────────────────────────

    #[test]
    fn inserts_stay_sorted_and_disjoint() {
        let mut occ = OccupiedIntervals::new();
        occ.insert(500, 550);
        occ.insert(0, 50);
        occ.insert(100, 150);
        assert_eq!(occ.spans(), &[(0, 50), (100, 150), (500, 550)]);
        assert!(occ.is_consistent());
    }

    #[test]
    fn allocate_in_empty_list_takes_min() {
        let mut occ = OccupiedIntervals::new();
        assert_eq!(occ.allocate(7, 100, 10), Some(7));
        assert_eq!(occ.spans(), &[(7, 17)]);
    }

    #[test]
    fn allocate_skips_past_overlapping_intervals() {
        let mut occ = OccupiedIntervals::new();
        occ.insert(0, 20);
        occ.insert(100, 150);
        // First free gap of 30 slots inside [0, 200] starts at 20
        assert_eq!(occ.allocate(0, 200, 30), Some(20));
        assert!(occ.is_consistent());
    }

    #[test]
    fn allocate_fits_between_adjacent_intervals() {
        let mut occ = OccupiedIntervals::new();
        occ.insert(0, 20);
        occ.insert(25, 50);
        // A 5-slot transmission fits exactly in [20, 25)
        assert_eq!(occ.allocate(0, 100, 5), Some(20));
        // The next one does not; it lands after 50
        assert_eq!(occ.allocate(0, 100, 5), Some(50));
    }

    #[test]
    fn allocate_respects_the_maximum() {
        let mut occ = OccupiedIntervals::new();
        occ.insert(0, 90);
        assert_eq!(occ.allocate(0, 80, 10), None);
        // Failure leaves the list untouched
        assert_eq!(occ.spans(), &[(0, 90)]);
    }

    #[test]
    fn allocate_at_exactly_max_is_allowed() {
        let mut occ = OccupiedIntervals::new();
        occ.insert(0, 80);
        assert_eq!(occ.allocate(0, 80, 10), Some(80));
    }

    // ── Patch sessions ────────────────────────────────────────────────────────

    fn patch_input(pending: Vec<(u32, Frame)>) -> LinkPatch {
        // Link 3, hyperperiod 1000, SHP 500/20, one fixed frame at
        // [100, 150)
        let mut fixed = Traffic::new();
        fixed.push(0, Frame::fixed_single_link(3, 50, &[100], 1_000));
        let mut traffic = Traffic::new();
        for (id, frame) in pending {
            traffic.push(id, frame);
        }
        LinkPatch {
            link_id: 3,
            hyperperiod: 1_000,
            shp: ShpConfig::new(500, 20).unwrap(),
            fixed,
            pending: traffic,
        }
    }

    #[test]
    fn places_after_shp_and_before_fixed_frame() {
        // SHP at [0, 20), fixed at [100, 150): a 30-slot transmission with
        // range [0, 200] lands at 20
        let frame = Frame::single_link(3, 30, &[(0, 200)], 1_000);
        let mut session = PatchSession::new(patch_input(vec![(1, frame)]));
        session.run().unwrap();

        assert_eq!(session.state(), SessionState::Verified);
        let off = session.input().pending.frame(0).offset(0);
        assert_eq!(off.transmission(0, 0), Some(20));
    }

    #[test]
    fn allocates_in_input_order_without_backtracking() {
        // Both frames want [0, 200]; the first takes [20, 50), the second
        // has to settle for [50, 80)
        let a = Frame::single_link(3, 30, &[(0, 200)], 1_000);
        let b = Frame::single_link(3, 30, &[(0, 200)], 1_000);
        let mut session = PatchSession::new(patch_input(vec![(1, a), (2, b)]));
        session.run().unwrap();

        assert_eq!(
            session.input().pending.frame(0).offset(0).transmission(0, 0),
            Some(20)
        );
        assert_eq!(
            session.input().pending.frame(1).offset(0).transmission(0, 0),
            Some(50)
        );
    }

    #[test]
    fn instances_are_placed_in_order() {
        let frame = Frame::single_link(3, 30, &[(0, 200), (500, 700)], 1_000);
        let mut session = PatchSession::new(patch_input(vec![(1, frame)]));
        session.run().unwrap();

        let off = session.input().pending.frame(0).offset(0);
        assert_eq!(off.transmission(0, 0), Some(20));
        // Second instance range starts inside the SHP window [500, 520)
        assert_eq!(off.transmission(1, 0), Some(520));
    }

    #[test]
    fn infeasible_instance_fails_terminally() {
        // Range [90, 120] cannot host 30 slots: [90, 120) hits the fixed
        // frame at [100, 150) and the bump past it exceeds max
        let frame = Frame::single_link(3, 30, &[(90, 120)], 1_000);
        let mut session = PatchSession::new(patch_input(vec![(1, frame)]));
        let err = session.run().unwrap_err();

        assert!(matches!(
            err,
            ScheduleError::PatchInfeasible {
                frame_id: 1,
                instance: 0
            }
        ));
        assert_eq!(session.state(), SessionState::Failed);
        // Execution time is still recorded for the timing document
        // (monotonic clock, may legitimately be 0 on coarse timers)
        let _ = session.execution_time_ns();
    }

    #[test]
    fn inactive_shp_reserves_nothing() {
        let mut input = patch_input(vec![(
            1,
            Frame::single_link(3, 30, &[(0, 200)], 1_000),
        )]);
        input.shp = ShpConfig::inactive();
        let mut session = PatchSession::new(input);
        session.run().unwrap();
        // Nothing occupies [0, 20) anymore
        assert_eq!(
            session.input().pending.frame(0).offset(0).transmission(0, 0),
            Some(0)
        );
    }
}
