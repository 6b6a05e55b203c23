/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! XML writers for the schedule, patched-schedule and timing documents.
//!
//! Emitted `EndingTime` values use the closed-interval display convention:
//! `EndingTime = TransmissionTime + duration − 1`.  Everything internal
//! stays half-open; the conversion happens only here.

use std::fmt::Display;
use std::fmt::Write as _;
use std::path::Path;

use crate::frame::Traffic;
use crate::network::LinkId;
use crate::scheduler::Prepared;

// ── Minimal XML writer ────────────────────────────────────────────────────────

struct XmlWriter {
    buf: String,
    depth: usize,
}

impl XmlWriter {
    fn new() -> Self {
        Self {
            buf: String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n"),
            depth: 0,
        }
    }

    fn indent(&mut self) {
        for _ in 0..self.depth {
            self.buf.push_str("  ");
        }
    }

    fn open(&mut self, tag: &str) {
        self.indent();
        let _ = writeln!(self.buf, "<{tag}>");
        self.depth += 1;
    }

    fn close(&mut self, tag: &str) {
        self.depth -= 1;
        self.indent();
        let _ = writeln!(self.buf, "</{tag}>");
    }

    fn leaf(&mut self, tag: &str, value: impl Display) {
        self.indent();
        let _ = writeln!(self.buf, "<{tag}>{value}</{tag}>");
    }

    fn leaf_with(&mut self, tag: &str, attr: (&str, &str), value: impl Display) {
        self.indent();
        let _ = writeln!(self.buf, "<{tag} {}=\"{}\">{value}</{tag}>", attr.0, attr.1);
    }

    fn finish(self) -> String {
        self.buf
    }
}

// ── Schedule document ─────────────────────────────────────────────────────────

/// Write the full schedule of a solved and verified [`Prepared`] instance.
pub fn write_schedule(path: &Path, prepared: &Prepared) -> std::io::Result<()> {
    let mut w = XmlWriter::new();
    w.open("Schedule");

    w.open("GeneralInformation");
    w.leaf_with("TimeslotSize", ("unit", "ns"), prepared.base.timeslot_ns);
    w.leaf("HyperPeriod", prepared.base.hyperperiod);
    w.leaf("NumberLinks", prepared.network.topology.num_links());
    w.leaf("NumberNodes", prepared.network.topology.num_nodes());
    w.leaf("NumberFrames", prepared.traffic.len());
    if prepared.network.shp.is_active() {
        w.open("SelfHealingProtocol");
        w.leaf("Period", prepared.network.shp.period);
        w.leaf("Time", prepared.network.shp.time);
        w.close("SelfHealingProtocol");
    }
    w.close("GeneralInformation");

    w.open("TrafficInformation");
    for (id, frame) in prepared.traffic.iter() {
        w.open("Frame");
        w.leaf("FrameID", id);
        for path in frame.paths() {
            w.open("Path");
            for pos in 0..path.len() {
                let off = frame.offset(path.offset_index(pos));
                w.open("Link");
                w.leaf("LinkID", off.link_id());
                for inst in 0..off.num_instances() {
                    w.open("Instance");
                    w.leaf("NumInstance", inst);
                    if off.num_replicas() == 1 {
                        let t = off.transmission(inst, 0).unwrap_or(0);
                        w.leaf("TransmissionTime", t);
                        w.leaf("EndingTime", t + off.time() - 1);
                    } else {
                        for repl in 0..off.num_replicas() {
                            let t = off.transmission(inst, repl).unwrap_or(0);
                            w.open("Replica");
                            w.leaf("NumReplica", repl);
                            w.leaf("TransmissionTime", t);
                            w.leaf("EndingTime", t + off.time() - 1);
                            w.close("Replica");
                        }
                    }
                    w.close("Instance");
                }
                w.close("Link");
            }
            w.close("Path");
        }
        w.close("Frame");
    }
    w.close("TrafficInformation");

    w.close("Schedule");
    std::fs::write(path, w.finish())
}

// ── Patched / optimized schedule ──────────────────────────────────────────────

/// Write a single-link schedule under the given root element
/// (`PatchedSchedule` or `OptimizedSchedule`).
pub fn write_link_schedule(
    path: &Path,
    root: &str,
    link_id: LinkId,
    pending: &Traffic,
) -> std::io::Result<()> {
    let mut w = XmlWriter::new();
    w.open(root);

    w.open("GeneralInformation");
    w.leaf("LinkID", link_id);
    w.close("GeneralInformation");

    w.open("TrafficInformation");
    for (id, frame) in pending.iter() {
        let off = frame.offset(0);
        w.open("Frame");
        w.leaf("FrameID", id);
        for inst in 0..off.num_instances() {
            let t = off.transmission(inst, 0).unwrap_or(0);
            w.open("Instance");
            w.leaf("NumInstance", inst);
            w.leaf("TransmissionTime", t);
            w.leaf("EndingTime", t + off.time() - 1);
            w.close("Instance");
        }
        w.close("Frame");
    }
    w.close("TrafficInformation");

    w.close(root);
    std::fs::write(path, w.finish())
}

// ── Timing document ───────────────────────────────────────────────────────────

/// Write the execution-time document; emitted even when the patch or
/// optimize run failed.
pub fn write_timing(path: &Path, execution_ns: u64) -> std::io::Result<()> {
    let mut w = XmlWriter::new();
    w.open("Timing");
    w.leaf_with("ExecutionTime", ("unit", "ns"), execution_ns);
    w.close("Timing");
    std::fs::write(path, w.finish())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
