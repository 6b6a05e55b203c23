//! Unit canonicalization for document values.
//!
//! Canonical units are nanoseconds, Bytes and MB/s.

use super::InputError;

/// Time units accepted by the documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Ns,
    Us,
    Ms,
    S,
}

impl TimeUnit {
    pub fn parse(s: &str) -> Result<Self, InputError> {
        match s {
            "ns" => Ok(TimeUnit::Ns),
            "us" => Ok(TimeUnit::Us),
            "ms" => Ok(TimeUnit::Ms),
            "s" => Ok(TimeUnit::S),
            other => Err(InputError::UnknownUnit(other.to_string())),
        }
    }

    pub fn to_ns(self, value: u64) -> u64 {
        match self {
            TimeUnit::Ns => value,
            TimeUnit::Us => value * 1_000,
            TimeUnit::Ms => value * 1_000_000,
            TimeUnit::S => value * 1_000_000_000,
        }
    }
}

/// Size units accepted by the documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeUnit {
    Byte,
    KByte,
    MByte,
}

impl SizeUnit {
    pub fn parse(s: &str) -> Result<Self, InputError> {
        match s {
            "Byte" => Ok(SizeUnit::Byte),
            "KByte" => Ok(SizeUnit::KByte),
            "MByte" => Ok(SizeUnit::MByte),
            other => Err(InputError::UnknownUnit(other.to_string())),
        }
    }

    pub fn to_bytes(self, value: u64) -> u64 {
        match self {
            SizeUnit::Byte => value,
            SizeUnit::KByte => value * 1_000,
            SizeUnit::MByte => value * 1_000_000,
        }
    }
}

/// Speed units accepted by the documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedUnit {
    KBs,
    MBs,
    GBs,
}

impl SpeedUnit {
    pub fn parse(s: &str) -> Result<Self, InputError> {
        match s {
            "KBs" => Ok(SpeedUnit::KBs),
            "MBs" => Ok(SpeedUnit::MBs),
            "GBs" => Ok(SpeedUnit::GBs),
            other => Err(InputError::UnknownUnit(other.to_string())),
        }
    }

    /// Convert to MB/s.  Sub-MB/s speeds truncate towards zero and are
    /// rejected later as non-positive.
    pub fn to_mbs(self, value: u64) -> u64 {
        match self {
            SpeedUnit::KBs => value / 1_000,
            SpeedUnit::MBs => value,
            SpeedUnit::GBs => value * 1_000,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
