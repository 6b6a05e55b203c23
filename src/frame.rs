/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Frames, paths, offsets and the traffic container.
//!
//! An [`Offset`] is the unit of scheduling: for one (frame, link) pair it
//! aggregates the transmission times of every (instance, replica) cell.  A
//! frame stores its offsets in a small arena (`Vec<Offset>`, iteration order)
//! with a dense link-id lookup on the side; paths hold arena indices.  Two
//! paths of the same frame traversing the same link therefore share exactly
//! one offset, without any pointer aliasing.
//!
//! # Ownership model
//! [`Traffic`] exclusively owns its frames.  Each frame exclusively owns its
//! paths and its offset arena; the link lookup and the path positions are
//! plain indices into the arena.  There are no cycles.

use thiserror::Error;

use crate::network::{LinkId, NodeId, ShpConfig, Topology};
use crate::solver::VarId;
use crate::timing::transmission_duration_ns;

/// Frame identifier as it appears in the input documents.
pub type FrameId = u32;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Validation errors raised while building frames and their offset graphs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("the period of the frame should be a positive number")]
    NonPositivePeriod,

    #[error("the deadline {deadline} cannot be larger than the period {period}")]
    DeadlineAfterPeriod { deadline: u64, period: u64 },

    #[error("the size of the frame should be a positive number")]
    NonPositiveSize,

    #[error("the starting time {starting} must lie before the deadline {deadline}")]
    StartingAfterDeadline { starting: u64, deadline: u64 },

    #[error("the end-to-end delay {end_to_end} must lie before the deadline {deadline}")]
    EndToEndAfterDeadline { end_to_end: u64, deadline: u64 },

    #[error("the frame does not have node {0} as receiver")]
    UnknownReceiver(NodeId),

    #[error("the given path is empty")]
    EmptyPath,

    #[error("path references link {0} which is not in the topology")]
    UnknownLink(LinkId),

    #[error("offsets are already initialized for this frame")]
    OffsetsInitialized,
}

// ── Offset ────────────────────────────────────────────────────────────────────

/// All (instance, replica) transmission cells of one frame on one link.
///
/// Transmission times are `None` until the scheduler or the patch engine
/// assigns them; once assigned they are set exactly once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Offset {
    link_id: LinkId,
    num_instances: usize,
    num_replicas: usize,
    /// Transmission duration on this link, in timeslots.
    time: u64,
    transmission: Vec<Vec<Option<u64>>>,
    min_transmission: Vec<Vec<u64>>,
    max_transmission: Vec<Vec<u64>>,
    /// Solver variable handles, filled by the constraint model.
    var: Vec<Vec<Option<VarId>>>,
}

impl Offset {
    fn new(link_id: LinkId, num_instances: usize, num_replicas: usize) -> Self {
        Self {
            link_id,
            num_instances,
            num_replicas,
            time: 0,
            transmission: vec![vec![None; num_replicas]; num_instances],
            min_transmission: vec![vec![0; num_replicas]; num_instances],
            max_transmission: vec![vec![0; num_replicas]; num_instances],
            var: vec![vec![None; num_replicas]; num_instances],
        }
    }

    pub fn link_id(&self) -> LinkId {
        self.link_id
    }

    pub fn num_instances(&self) -> usize {
        self.num_instances
    }

    pub fn num_replicas(&self) -> usize {
        self.num_replicas
    }

    /// Transmission duration on this link in timeslots.
    pub fn time(&self) -> u64 {
        self.time
    }

    pub(crate) fn set_time(&mut self, time: u64) {
        self.time = time;
    }

    pub fn transmission(&self, instance: usize, replica: usize) -> Option<u64> {
        self.transmission[instance][replica]
    }

    pub(crate) fn set_transmission(&mut self, instance: usize, replica: usize, t: u64) {
        self.transmission[instance][replica] = Some(t);
    }

    /// Allowed `[min, max]` transmission range (replica 0), used by the patch
    /// and optimize engines.
    pub fn range(&self, instance: usize) -> (u64, u64) {
        (
            self.min_transmission[instance][0],
            self.max_transmission[instance][0],
        )
    }

    pub(crate) fn set_range(&mut self, instance: usize, min: u64, max: u64) {
        self.min_transmission[instance][0] = min;
        self.max_transmission[instance][0] = max;
    }

    pub fn var(&self, instance: usize, replica: usize) -> Option<VarId> {
        self.var[instance][replica]
    }

    pub(crate) fn set_var(&mut self, instance: usize, replica: usize, var: VarId) {
        self.var[instance][replica] = Some(var);
    }
}

// ── Path ──────────────────────────────────────────────────────────────────────

/// Ordered sequence of links from the sender to one receiver, with the arena
/// index of the offset behind every hop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    links: Vec<LinkId>,
    offsets: Vec<usize>,
}

impl Path {
    pub fn links(&self) -> &[LinkId] {
        &self.links
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Arena index of the offset at hop `pos`.  Only valid after the offset
    /// graph has been built.
    pub fn offset_index(&self, pos: usize) -> usize {
        self.offsets[pos]
    }
}

// ── Frame ─────────────────────────────────────────────────────────────────────

/// Raw frame attributes as read from the traffic description, before
/// validation.  All times in nanoseconds.
#[derive(Debug, Clone)]
pub struct FrameParams {
    pub size: u64,
    pub period: u64,
    pub deadline: u64,
    pub starting: u64,
    pub end_to_end: u64,
    pub sender: NodeId,
    pub receivers: Vec<NodeId>,
}

/// A periodic multicast flow with fixed paths.
///
/// Timing fields are in nanoseconds at construction and in timeslots after
/// [`crate::timing::resolve`] has run.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    size: u64,
    period: u64,
    deadline: u64,
    starting: u64,
    end_to_end: u64,
    sender: NodeId,
    receivers: Vec<NodeId>,
    paths: Vec<Path>,
    offsets: Vec<Offset>,
    by_link: Vec<Option<usize>>,
}

impl Frame {
    /// Validate and build a frame skeleton (no paths yet).
    ///
    /// Rules: period > 0; deadline ≤ period with 0 meaning "= period";
    /// size > 0; starting < deadline; end-to-end < deadline with 0 meaning
    /// unconstrained.
    pub fn new(params: FrameParams) -> Result<Self, FrameError> {
        if params.period == 0 {
            return Err(FrameError::NonPositivePeriod);
        }
        if params.deadline > params.period {
            return Err(FrameError::DeadlineAfterPeriod {
                deadline: params.deadline,
                period: params.period,
            });
        }
        let deadline = if params.deadline == 0 {
            params.period
        } else {
            params.deadline
        };
        if params.size == 0 {
            return Err(FrameError::NonPositiveSize);
        }
        if params.starting >= deadline {
            return Err(FrameError::StartingAfterDeadline {
                starting: params.starting,
                deadline,
            });
        }
        if params.end_to_end >= deadline {
            return Err(FrameError::EndToEndAfterDeadline {
                end_to_end: params.end_to_end,
                deadline,
            });
        }

        Ok(Self {
            size: params.size,
            period: params.period,
            deadline,
            starting: params.starting,
            end_to_end: params.end_to_end,
            sender: params.sender,
            receivers: params.receivers,
            paths: Vec::new(),
            offsets: Vec::new(),
            by_link: Vec::new(),
        })
    }

    /// Record the link path towards one declared receiver.
    pub fn set_path(&mut self, receiver: NodeId, links: Vec<LinkId>) -> Result<(), FrameError> {
        if links.is_empty() {
            return Err(FrameError::EmptyPath);
        }
        if !self.receivers.contains(&receiver) {
            return Err(FrameError::UnknownReceiver(receiver));
        }
        self.paths.push(Path {
            links,
            offsets: Vec::new(),
        });
        Ok(())
    }

    /// Build the offset graph for this frame.
    ///
    /// For every path, every link gets exactly one offset in the arena; a
    /// link shared by several paths is materialized once and referenced from
    /// each.  Must run after [`crate::timing::resolve`], so periods and the
    /// hyperperiod are already in timeslot units.
    pub fn init_offsets(
        &mut self,
        topology: &Topology,
        timeslot_ns: u64,
        hyperperiod: u64,
    ) -> Result<(), FrameError> {
        if !self.offsets.is_empty() {
            return Err(FrameError::OffsetsInitialized);
        }
        let table_len = topology.max_link_id().map(|m| m + 1).unwrap_or(0);
        self.by_link = vec![None; table_len];

        let num_instances = (hyperperiod / self.period) as usize;
        for path in &mut self.paths {
            path.offsets.clear();
            for &link_id in &path.links {
                let link = topology
                    .link(link_id)
                    .ok_or(FrameError::UnknownLink(link_id))?;
                let ix = match self.by_link[link_id] {
                    Some(ix) => ix,
                    None => {
                        let mut off = Offset::new(link_id, num_instances, 1);
                        off.set_time(transmission_duration_ns(self.size, link.speed) / timeslot_ns);
                        self.offsets.push(off);
                        let ix = self.offsets.len() - 1;
                        self.by_link[link_id] = Some(ix);
                        ix
                    }
                };
                path.offsets.push(ix);
            }
        }
        Ok(())
    }

    /// Build the synthetic reservation frame of an active Self-Healing
    /// Protocol: one offset per link id in `[0, max_link_id]`, transmission
    /// times pre-filled at `instance · period`.
    ///
    /// All inputs are in timeslot units.
    pub fn reservation(shp: &ShpConfig, max_link_id: LinkId, hyperperiod: u64) -> Self {
        let num_instances = shp.instances(hyperperiod);
        let mut offsets = Vec::with_capacity(max_link_id + 1);
        let mut by_link = vec![None; max_link_id + 1];
        for link_id in 0..=max_link_id {
            let mut off = Offset::new(link_id, num_instances, 1);
            off.set_time(shp.time);
            for inst in 0..num_instances {
                off.set_transmission(inst, 0, inst as u64 * shp.period);
            }
            by_link[link_id] = Some(offsets.len());
            offsets.push(off);
        }
        Self {
            size: 0,
            period: shp.period,
            deadline: shp.period,
            starting: 0,
            end_to_end: 0,
            sender: 0,
            receivers: Vec::new(),
            paths: Vec::new(),
            offsets,
            by_link,
        }
    }

    /// Build a degenerate single-link frame for the patch and optimize
    /// engines: one offset whose instances carry `[min, max]` transmission
    /// ranges.  All inputs are in timeslot units.
    pub fn single_link(
        link_id: LinkId,
        time_slots: u64,
        ranges: &[(u64, u64)],
        hyperperiod: u64,
    ) -> Self {
        let mut off = Offset::new(link_id, ranges.len(), 1);
        off.set_time(time_slots);
        for (inst, &(min, max)) in ranges.iter().enumerate() {
            off.set_range(inst, min, max);
        }
        let period = hyperperiod.max(1);
        let mut by_link = vec![None; link_id + 1];
        by_link[link_id] = Some(0);
        Self {
            size: 0,
            period,
            deadline: period,
            starting: 0,
            end_to_end: 0,
            sender: 0,
            receivers: Vec::new(),
            paths: vec![Path {
                links: vec![link_id],
                offsets: vec![0],
            }],
            offsets: vec![off],
            by_link,
        }
    }

    /// Build a single-link frame whose transmission times are already known
    /// (the fixed traffic of a patch or optimize document).
    pub fn fixed_single_link(
        link_id: LinkId,
        time_slots: u64,
        transmissions: &[u64],
        hyperperiod: u64,
    ) -> Self {
        let ranges: Vec<(u64, u64)> = transmissions.iter().map(|&t| (t, t)).collect();
        let mut frame = Self::single_link(link_id, time_slots, &ranges, hyperperiod);
        for (inst, &t) in transmissions.iter().enumerate() {
            frame.offsets[0].set_transmission(inst, 0, t);
        }
        frame
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn period(&self) -> u64 {
        self.period
    }

    pub fn deadline(&self) -> u64 {
        self.deadline
    }

    pub fn starting(&self) -> u64 {
        self.starting
    }

    pub fn end_to_end(&self) -> u64 {
        self.end_to_end
    }

    pub fn sender(&self) -> NodeId {
        self.sender
    }

    pub fn receivers(&self) -> &[NodeId] {
        &self.receivers
    }

    pub fn paths(&self) -> &[Path] {
        &self.paths
    }

    pub fn num_offsets(&self) -> usize {
        self.offsets.len()
    }

    pub fn offsets(&self) -> &[Offset] {
        &self.offsets
    }

    pub fn offset(&self, ix: usize) -> &Offset {
        &self.offsets[ix]
    }

    pub(crate) fn offset_mut(&mut self, ix: usize) -> &mut Offset {
        &mut self.offsets[ix]
    }

    /// O(1) lookup: the offset of this frame on `link`, if the frame uses it.
    pub fn offset_by_link(&self, link: LinkId) -> Option<&Offset> {
        self.by_link
            .get(link)
            .copied()
            .flatten()
            .map(|ix| &self.offsets[ix])
    }

    pub(crate) fn offset_by_link_mut(&mut self, link: LinkId) -> Option<&mut Offset> {
        match self.by_link.get(link).copied().flatten() {
            Some(ix) => Some(&mut self.offsets[ix]),
            None => None,
        }
    }

    /// Overlay a transmission time parsed from an emitted schedule document
    /// (replica 0).  Returns `false` when the frame has no offset on `link`
    /// or the instance is out of range.
    pub fn set_parsed_transmission(&mut self, link: LinkId, instance: usize, t: u64) -> bool {
        match self.offset_by_link_mut(link) {
            Some(off) if instance < off.num_instances() => {
                off.set_transmission(instance, 0, t);
                true
            }
            _ => false,
        }
    }

    /// Every link id referenced by any path of this frame, with repetitions.
    pub fn path_links(&self) -> impl Iterator<Item = LinkId> + '_ {
        self.paths.iter().flat_map(|p| p.links.iter().copied())
    }

    /// Rescale all time fields from nanoseconds to timeslot units.
    pub(crate) fn renormalize(&mut self, timeslot_ns: u64) {
        self.period /= timeslot_ns;
        self.deadline /= timeslot_ns;
        self.starting /= timeslot_ns;
        self.end_to_end /= timeslot_ns;
    }
}

// ── Traffic ───────────────────────────────────────────────────────────────────

/// Ordered list of frames plus their document identifiers.  The order is the
/// scheduling priority: earlier frames constrain later ones in the
/// incremental and optimize modes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Traffic {
    ids: Vec<FrameId>,
    frames: Vec<Frame>,
}

impl Traffic {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, id: FrameId, frame: Frame) {
        self.ids.push(id);
        self.frames.push(frame);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn id(&self, ix: usize) -> FrameId {
        self.ids[ix]
    }

    pub fn frame(&self, ix: usize) -> &Frame {
        &self.frames[ix]
    }

    pub fn frame_mut(&mut self, ix: usize) -> &mut Frame {
        &mut self.frames[ix]
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn frames_mut(&mut self) -> &mut [Frame] {
        &mut self.frames
    }

    pub fn index_of(&self, id: FrameId) -> Option<usize> {
        self.ids.iter().position(|&i| i == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (FrameId, &Frame)> {
        self.ids.iter().copied().zip(self.frames.iter())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
