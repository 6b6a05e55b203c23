//! Global timeslot derivation, hyperperiod calculation and renormalization.
//!
//! The scheduler operates on integer timeslot arithmetic.  The timeslot is
//! the GCD of every transmission duration in the network (and the SHP
//! reservation time when the protocol is active); the hyperperiod is the LCM
//! of all frame periods.  [`resolve`] computes both and divides every
//! duration in the network and traffic by the timeslot, after which no
//! nanosecond value is left anywhere in the data model.

pub mod math;

use thiserror::Error;
use tracing::{debug, info};

use crate::frame::Traffic;
use crate::network::{LinkId, Network};

// ── Error type ────────────────────────────────────────────────────────────────

/// Errors raised while fixing the time base.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimingError {
    /// The traffic description contains no frames.
    #[error("no frames to schedule")]
    NoFrames,

    /// LCM calculation overflowed `u64`.  Contains the two operands that
    /// caused the overflow so the caller can log a useful message.
    #[error("hyperperiod overflow computing lcm({a}, {b})")]
    Overflow { a: u64, b: u64 },

    /// The folded GCD resolved to zero, so no common timeslot exists.
    #[error("the timeslot length resolved to zero")]
    ZeroTimeslot,

    /// A frame path references a link the topology does not declare.
    #[error("frame path references unknown link {link}")]
    UnknownLink { link: LinkId },
}

// ── Time base ─────────────────────────────────────────────────────────────────

/// The resolved discrete time base of one scheduling session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBase {
    /// Length of one timeslot in nanoseconds.
    pub timeslot_ns: u64,
    /// Scheduling horizon in timeslots.
    pub hyperperiod: u64,
}

/// Raw transmission duration of `size` bytes over a link of `speed` MB/s,
/// in nanoseconds, rounded up to at least one.
pub fn transmission_duration_ns(size: u64, speed: u64) -> u64 {
    debug_assert!(speed > 0, "link speed must be positive");
    (size * 8).div_ceil(speed)
}

/// Fix the global timeslot and hyperperiod, then renormalize every duration
/// in `network` and `traffic` to timeslot units.
///
/// The timeslot starts from the SHP reservation time (identity `0` when the
/// protocol is inactive) and folds in the transmission duration of every
/// (frame, link) pair by GCD.
///
/// # Errors
/// * [`TimingError::NoFrames`] – empty traffic description.
/// * [`TimingError::UnknownLink`] – a path references an undeclared link.
/// * [`TimingError::ZeroTimeslot`] – no duration contributed to the GCD.
/// * [`TimingError::Overflow`] – the hyperperiod exceeds `u64`.
pub fn resolve(network: &mut Network, traffic: &mut Traffic) -> Result<TimeBase, TimingError> {
    if traffic.is_empty() {
        return Err(TimingError::NoFrames);
    }

    let mut timeslot = if network.shp.is_active() {
        network.shp.time
    } else {
        0
    };

    for frame in traffic.frames() {
        for link_id in frame.path_links() {
            let link = network
                .topology
                .link(link_id)
                .ok_or(TimingError::UnknownLink { link: link_id })?;
            let duration = transmission_duration_ns(frame.size(), link.speed);
            timeslot = math::gcd(timeslot, duration);
        }
    }

    if timeslot == 0 {
        return Err(TimingError::ZeroTimeslot);
    }

    let periods: Vec<u64> = traffic.frames().iter().map(|f| f.period()).collect();
    let hyperperiod_ns = math::lcm_of_slice(&periods)?;

    for frame in traffic.frames_mut() {
        frame.renormalize(timeslot);
    }
    network.renormalize(timeslot);

    let base = TimeBase {
        timeslot_ns: timeslot,
        hyperperiod: hyperperiod_ns / timeslot,
    };

    info!(
        timeslot_ns = base.timeslot_ns,
        hyperperiod = base.hyperperiod,
        frame_count = traffic.len(),
        "time base fixed"
    );
    for p in &periods {
        debug!(period_ns = p, period_slots = p / timeslot, "  frame period");
    }

    Ok(base)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
