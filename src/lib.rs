/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Self-Healing Protocol schedule synthesizer.
//!
//! Computes collision-free transmission schedules for time-triggered traffic
//! over a switched (possibly wireless-augmented) network in which a
//! Self-Healing Protocol periodically reserves bandwidth on every link.
//!
//! Module layout:
//!
//! ```text
//! lib.rs
//! ├── network     – links, nodes, topology, SHP reservation parameters
//! ├── frame       – frames, paths, offsets, traffic, offset graph builder
//! ├── timing      – global timeslot, hyperperiod, renormalization
//! ├── config      – scheduler configuration (YAML)
//! ├── solver      – MILP backend capability trait + CBC implementation
//! ├── scheduler   – scheduling session, constraint model, strategies, verifier
//! ├── patch       – greedy single-link patch engine
//! └── io          – XML document readers and writers
//! ```

pub mod config;
pub mod frame;
pub mod io;
pub mod network;
pub mod patch;
pub mod scheduler;
pub mod solver;
pub mod timing;
