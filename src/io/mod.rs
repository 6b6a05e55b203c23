/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! XML document ingestion and emission.
//!
//! Input documents (network, patch, optimize) and output documents
//! (schedule, patched schedule, timing) are hierarchical XML.  All time
//! values carry a unit attribute and are canonicalized to nanoseconds on
//! the way in; patch and optimize documents are already in timeslot units
//! and pass through unconverted.

pub mod read;
pub mod units;
pub mod write;

use thiserror::Error;

use crate::frame::FrameId;
use crate::network::{LinkId, NodeId, ShpConfigError};

/// Errors raised while reading an input document.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("cannot read {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed XML in {path}")]
    Xml {
        path: String,
        #[source]
        source: roxmltree::Error,
    },

    #[error("the searched value {0} is not defined")]
    MissingElement(String),

    #[error("the attribute '{attribute}' of {element} is not defined")]
    MissingAttribute {
        element: String,
        attribute: String,
    },

    #[error("the value of {0} is not a valid number")]
    BadNumber(String),

    #[error("the unit '{0}' is not recognized or supported")]
    UnknownUnit(String),

    #[error("the link category '{0}' is not recognized")]
    UnknownLinkKind(String),

    #[error("the node category '{0}' is not recognized")]
    UnknownNodeRole(String),

    #[error("link speed must be a positive number")]
    NonPositiveSpeed,

    #[error(transparent)]
    Shp(#[from] ShpConfigError),

    #[error("frame {frame} declares receiver {receiver} which is not in the topology")]
    UnknownReceiver { frame: FrameId, receiver: NodeId },

    #[error("frame {frame} path references unknown link {link}")]
    UnknownPathLink { frame: FrameId, link: LinkId },

    #[error("the path of frame {frame} does not originate at its sender")]
    PathNotAtSender { frame: FrameId },

    #[error("an instance of frame {frame} ends before it starts")]
    BadInterval { frame: FrameId },
}
