/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Deterministic schedule verification.
//!
//! Runs after every scheduling strategy and re-checks the returned offsets
//! against the constraint system: variable bounds, non-overlap on every link
//! (including the SHP reservation), path monotonicity and end-to-end delay.
//! A violation here indicates a bug in the constraint model or the solver
//! backend, never bad input, and aborts the session before anything is
//! emitted.
//!
//! All interval arithmetic is half-open: a transmission at `t` with duration
//! `d` occupies `[t, t + d)`.

use thiserror::Error;

use crate::frame::{Frame, FrameId, Traffic};
use crate::network::{LinkId, ShpConfig};

/// A constraint violation found in a returned incumbent.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleInvalid {
    #[error("frame {frame_id} has no transmission time on link {link}")]
    MissingOffset { frame_id: FrameId, link: LinkId },

    #[error("the transmission time of frame {frame_id} link {link} lies outside its window")]
    OffsetOutOfBounds {
        frame_id: FrameId,
        link: LinkId,
        instance: usize,
        replica: usize,
    },

    #[error("frame {frame_id} collides with the protocol reservation in link {link}")]
    ReservationCollision { frame_id: FrameId, link: LinkId },

    #[error("frames {frame_id} and {other_id} collide in link {link}")]
    FrameCollision {
        frame_id: FrameId,
        other_id: FrameId,
        link: LinkId,
    },

    #[error("the distances of the path of frame {frame_id} are wrong")]
    PathGapViolated { frame_id: FrameId },

    #[error("the end to end delay of frame {frame_id} is wrong")]
    EndToEndViolated { frame_id: FrameId },
}

/// Half-open interval overlap.
fn overlaps(a_start: u64, a_end: u64, b_start: u64, b_end: u64) -> bool {
    a_start < b_end && b_start < a_end
}

/// Check a complete schedule produced by the one-shot or incremental
/// strategy.
///
/// `switch_min_time` is in timeslots; the reservation frame (if any) carries
/// the SHP occupancy of every link.
pub fn check_schedule(
    traffic: &Traffic,
    reservation: Option<&Frame>,
    switch_min_time: u64,
) -> Result<(), ScheduleInvalid> {
    for i in 0..traffic.len() {
        let frame_id = traffic.id(i);
        let frame = traffic.frame(i);

        for off in frame.offsets() {
            let link = off.link_id();

            // Window bounds per (instance, replica)
            for inst in 0..off.num_instances() {
                for repl in 0..off.num_replicas() {
                    let t = off.transmission(inst, repl).ok_or(
                        ScheduleInvalid::MissingOffset { frame_id, link },
                    )? as i64;
                    let lb = (frame.period() * inst as u64 + frame.starting()) as i64;
                    let ub = (frame.period() * inst as u64 + frame.deadline()) as i64
                        - off.time() as i64;
                    if t < lb || t > ub {
                        return Err(ScheduleInvalid::OffsetOutOfBounds {
                            frame_id,
                            link,
                            instance: inst,
                            replica: repl,
                        });
                    }
                }
            }

            // Collision with the SHP reservation
            if let Some(res) = reservation {
                if let Some(res_off) = res.offset_by_link(link) {
                    for inst in 0..off.num_instances() {
                        for repl in 0..off.num_replicas() {
                            let t = off.transmission(inst, repl).unwrap_or(0);
                            for res_inst in 0..res_off.num_instances() {
                                let rt = res_off.transmission(res_inst, 0).unwrap_or(0);
                                if overlaps(t, t + off.time(), rt, rt + res_off.time()) {
                                    return Err(ScheduleInvalid::ReservationCollision {
                                        frame_id,
                                        link,
                                    });
                                }
                            }
                        }
                    }
                }
            }

            // Collision with every earlier frame sharing this link
            for pre in 0..i {
                let Some(pre_off) = traffic.frame(pre).offset_by_link(link) else {
                    continue;
                };
                for inst in 0..off.num_instances() {
                    for repl in 0..off.num_replicas() {
                        let t = off.transmission(inst, repl).unwrap_or(0);
                        for pre_inst in 0..pre_off.num_instances() {
                            for pre_repl in 0..pre_off.num_replicas() {
                                let pt = pre_off.transmission(pre_inst, pre_repl).unwrap_or(0);
                                if overlaps(t, t + off.time(), pt, pt + pre_off.time()) {
                                    return Err(ScheduleInvalid::FrameCollision {
                                        frame_id,
                                        other_id: traffic.id(pre),
                                        link,
                                    });
                                }
                            }
                        }
                    }
                }
            }
        }

        // Path monotonicity and end-to-end delay, per path
        for path in frame.paths() {
            for h in 0..path.len().saturating_sub(1) {
                let off = frame.offset(path.offset_index(h));
                let next = frame.offset(path.offset_index(h + 1));
                let gap = (off.time() + switch_min_time) as i64;
                for inst in 0..off.num_instances() {
                    let t = off.transmission(inst, 0).unwrap_or(0) as i64;
                    let nt = next.transmission(inst, 0).unwrap_or(0) as i64;
                    if nt - t < gap {
                        return Err(ScheduleInvalid::PathGapViolated { frame_id });
                    }
                }
            }

            if frame.end_to_end() > 0 && !path.is_empty() {
                let first = frame.offset(path.offset_index(0));
                let last = frame.offset(path.offset_index(path.len() - 1));
                let budget = frame.end_to_end() as i64 - first.time() as i64;
                for inst in 0..first.num_instances() {
                    let t = first.transmission(inst, 0).unwrap_or(0) as i64;
                    let lt = last.transmission(inst, 0).unwrap_or(0) as i64;
                    if lt - t > budget {
                        return Err(ScheduleInvalid::EndToEndViolated { frame_id });
                    }
                }
            }
        }
    }

    Ok(())
}

/// Check a patched or optimized single-link schedule: every placed instance
/// within its `[min, max]` range, and no overlap among new frames, fixed
/// frames and the SHP reservation.
pub fn check_link_schedule(
    pending: &Traffic,
    fixed: &Traffic,
    shp: &ShpConfig,
    hyperperiod: u64,
) -> Result<(), ScheduleInvalid> {
    // (owner id, start, end) of everything already occupying the link
    let mut occupied: Vec<(FrameId, u64, u64)> = Vec::new();
    for (id, frame) in fixed.iter() {
        let off = frame.offset(0);
        for inst in 0..off.num_instances() {
            let t = off
                .transmission(inst, 0)
                .ok_or(ScheduleInvalid::MissingOffset {
                    frame_id: id,
                    link: off.link_id(),
                })?;
            occupied.push((id, t, t + off.time()));
        }
    }

    for i in 0..pending.len() {
        let frame_id = pending.id(i);
        let off = pending.frame(i).offset(0);
        let link = off.link_id();

        for inst in 0..off.num_instances() {
            let t = off
                .transmission(inst, 0)
                .ok_or(ScheduleInvalid::MissingOffset { frame_id, link })?;
            let (min, max) = off.range(inst);
            if t < min || t > max {
                return Err(ScheduleInvalid::OffsetOutOfBounds {
                    frame_id,
                    link,
                    instance: inst,
                    replica: 0,
                });
            }
            let end = t + off.time();

            for k in 0..shp.instances(hyperperiod) {
                let rt = k as u64 * shp.period;
                if overlaps(t, end, rt, rt + shp.time) {
                    return Err(ScheduleInvalid::ReservationCollision { frame_id, link });
                }
            }
            for &(other_id, os, oe) in &occupied {
                if overlaps(t, end, os, oe) {
                    return Err(ScheduleInvalid::FrameCollision {
                        frame_id,
                        other_id,
                        link,
                    });
                }
            }
            occupied.push((frame_id, t, end));
        }
    }

    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Frame, FrameParams};
    use crate::network::{Connection, Link, LinkKind, Node, NodeRole, Topology};

    /// N0 → ℓ0 → N1 → ℓ1 → N2, both links 1000 MB/s.
    fn chain_topology() -> Topology {
        let mut topo = Topology::new();
        let link = |id| Link {
            id,
            kind: LinkKind::Wired,
            speed: 1000,
        };
        topo.add_node(
            Node {
                id: 0,
                role: NodeRole::EndSystem,
            },
            vec![(Connection { peer: 1, link: 0 }, link(0))],
        )
        .unwrap();
        topo.add_node(
            Node {
                id: 1,
                role: NodeRole::Switch,
            },
            vec![(Connection { peer: 2, link: 1 }, link(1))],
        )
        .unwrap();
        topo.add_node(
            Node {
                id: 2,
                role: NodeRole::EndSystem,
            },
            vec![],
        )
        .unwrap();
        topo
    }

    /// One frame over ℓ0 and ℓ1, dur 1 slot per link, period 1000.
    fn chain_frame(end_to_end: u64) -> Frame {
        let mut frame = Frame::new(FrameParams {
            size: 125,
            period: 1_000,
            deadline: 0,
            starting: 0,
            end_to_end,
            sender: 0,
            receivers: vec![2],
        })
        .unwrap();
        frame.set_path(2, vec![0, 1]).unwrap();
        frame.init_offsets(&chain_topology(), 1, 1_000).unwrap();
        frame
    }

    fn set_chain_offsets(frame: &mut Frame, t0: u64, t1: u64) {
        frame.offset_by_link_mut(0).unwrap().set_transmission(0, 0, t0);
        frame.offset_by_link_mut(1).unwrap().set_transmission(0, 0, t1);
    }

    #[test]
    fn valid_chain_schedule_passes() {
        let mut traffic = Traffic::new();
        let mut frame = chain_frame(0);
        set_chain_offsets(&mut frame, 0, 5);
        traffic.push(0, frame);
        assert_eq!(check_schedule(&traffic, None, 0), Ok(()));
    }

    #[test]
    fn missing_transmission_is_detected() {
        let mut traffic = Traffic::new();
        traffic.push(0, chain_frame(0));
        assert_eq!(
            check_schedule(&traffic, None, 0),
            Err(ScheduleInvalid::MissingOffset {
                frame_id: 0,
                link: 0
            })
        );
    }

    #[test]
    fn offset_beyond_deadline_window_is_detected() {
        let mut traffic = Traffic::new();
        let mut frame = chain_frame(0);
        // ub = deadline − dur = 999; 1000 is out
        set_chain_offsets(&mut frame, 0, 1_000);
        traffic.push(0, frame);
        assert!(matches!(
            check_schedule(&traffic, None, 0),
            Err(ScheduleInvalid::OffsetOutOfBounds { link: 1, .. })
        ));
    }

    #[test]
    fn path_gap_violation_is_detected() {
        let mut traffic = Traffic::new();
        let mut frame = chain_frame(0);
        // Second hop must start at least dur(ℓ0) = 1 after the first
        set_chain_offsets(&mut frame, 5, 5);
        traffic.push(0, frame);
        assert_eq!(
            check_schedule(&traffic, None, 0),
            Err(ScheduleInvalid::PathGapViolated { frame_id: 0 })
        );
    }

    #[test]
    fn switch_min_time_tightens_the_path_gap() {
        let mut traffic = Traffic::new();
        let mut frame = chain_frame(0);
        set_chain_offsets(&mut frame, 0, 5);
        traffic.push(0, frame);
        // gap of 5 ≥ 1 + 4 passes, but 1 + 5 fails
        assert_eq!(check_schedule(&traffic, None, 4), Ok(()));
        assert_eq!(
            check_schedule(&traffic, None, 5),
            Err(ScheduleInvalid::PathGapViolated { frame_id: 0 })
        );
    }

    #[test]
    fn end_to_end_violation_is_detected() {
        let mut traffic = Traffic::new();
        let mut frame = chain_frame(10);
        // budget = e2e − dur(first) = 9, but last − first = 20
        set_chain_offsets(&mut frame, 0, 20);
        traffic.push(0, frame);
        assert_eq!(
            check_schedule(&traffic, None, 0),
            Err(ScheduleInvalid::EndToEndViolated { frame_id: 0 })
        );
    }

    #[test]
    fn zero_end_to_end_is_unconstrained() {
        let mut traffic = Traffic::new();
        let mut frame = chain_frame(0);
        set_chain_offsets(&mut frame, 0, 900);
        traffic.push(0, frame);
        assert_eq!(check_schedule(&traffic, None, 0), Ok(()));
    }

    #[test]
    fn frame_collision_on_shared_link_is_detected() {
        // Two single-hop frames over ℓ0, dur 8 slots each, overlapping starts
        let topo = chain_topology();
        let make = |t: u64| {
            let mut f = Frame::new(FrameParams {
                size: 1000,
                period: 1_000,
                deadline: 0,
                starting: 0,
                end_to_end: 0,
                sender: 0,
                receivers: vec![1],
            })
            .unwrap();
            f.set_path(1, vec![0]).unwrap();
            f.init_offsets(&topo, 1, 1_000).unwrap();
            f.offset_by_link_mut(0).unwrap().set_transmission(0, 0, t);
            f
        };
        let mut traffic = Traffic::new();
        traffic.push(0, make(100));
        traffic.push(1, make(104));
        assert_eq!(
            check_schedule(&traffic, None, 0),
            Err(ScheduleInvalid::FrameCollision {
                frame_id: 1,
                other_id: 0,
                link: 0
            })
        );

        // Back-to-back placement is fine (half-open intervals)
        let mut traffic = Traffic::new();
        traffic.push(0, make(100));
        traffic.push(1, make(108));
        assert_eq!(check_schedule(&traffic, None, 0), Ok(()));
    }

    #[test]
    fn reservation_collision_is_detected() {
        use crate::network::ShpConfig;
        let shp = ShpConfig::new(500, 50).unwrap();
        let reservation = Frame::reservation(&shp, 1, 1_000);

        let mut traffic = Traffic::new();
        let mut frame = chain_frame(0);
        // ℓ0 at 510 lands inside the second reservation window [500, 550)
        set_chain_offsets(&mut frame, 510, 600);
        traffic.push(0, frame);
        assert_eq!(
            check_schedule(&traffic, Some(&reservation), 0),
            Err(ScheduleInvalid::ReservationCollision {
                frame_id: 0,
                link: 0
            })
        );

        let mut traffic = Traffic::new();
        let mut frame = chain_frame(0);
        set_chain_offsets(&mut frame, 550, 600);
        traffic.push(0, frame);
        assert_eq!(check_schedule(&traffic, Some(&reservation), 0), Ok(()));
    }

    // ── Single-link (patch/optimize) checks ───────────────────────────────────

    #[test]
    fn link_schedule_checks_ranges_and_overlap() {
        let shp = ShpConfig::new(500, 20).unwrap();
        let fixed = {
            let mut t = Traffic::new();
            t.push(0, Frame::fixed_single_link(3, 50, &[100], 1_000));
            t
        };

        let mut pending = Traffic::new();
        let mut frame = Frame::single_link(3, 30, &[(0, 200)], 1_000);
        frame.offset_by_link_mut(3).unwrap().set_transmission(0, 0, 20);
        pending.push(1, frame);
        assert_eq!(check_link_schedule(&pending, &fixed, &shp, 1_000), Ok(()));

        // Starting inside the SHP window [0, 20) fails
        let mut pending = Traffic::new();
        let mut frame = Frame::single_link(3, 30, &[(0, 200)], 1_000);
        frame.offset_by_link_mut(3).unwrap().set_transmission(0, 0, 10);
        pending.push(1, frame);
        assert_eq!(
            check_link_schedule(&pending, &fixed, &shp, 1_000),
            Err(ScheduleInvalid::ReservationCollision {
                frame_id: 1,
                link: 3
            })
        );

        // Overlapping the fixed frame [100, 150) fails
        let mut pending = Traffic::new();
        let mut frame = Frame::single_link(3, 30, &[(0, 200)], 1_000);
        frame.offset_by_link_mut(3).unwrap().set_transmission(0, 0, 130);
        pending.push(1, frame);
        assert_eq!(
            check_link_schedule(&pending, &fixed, &shp, 1_000),
            Err(ScheduleInvalid::FrameCollision {
                frame_id: 1,
                other_id: 0,
                link: 3
            })
        );

        // Outside the allowed range fails
        let mut pending = Traffic::new();
        let mut frame = Frame::single_link(3, 30, &[(0, 200)], 1_000);
        frame.offset_by_link_mut(3).unwrap().set_transmission(0, 0, 300);
        pending.push(1, frame);
        assert!(matches!(
            check_link_schedule(&pending, &fixed, &shp, 1_000),
            Err(ScheduleInvalid::OffsetOutOfBounds { .. })
        ));
    }
}
