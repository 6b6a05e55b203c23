/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Network data model: links, nodes, topology and the Self-Healing Protocol
//! reservation parameters.
//!
//! Everything in this module is created during ingestion and never mutated
//! afterwards, with one exception: [`Network::renormalize`] rescales the time
//! fields once the global timeslot is known (see [`crate::timing`]).

use thiserror::Error;

/// Dense, small link identifier.
pub type LinkId = usize;
/// Dense, small node identifier.
pub type NodeId = usize;

// ── Links ─────────────────────────────────────────────────────────────────────

/// Physical kind of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Wired,
    Wireless,
}

impl LinkKind {
    /// Parse the document spelling (`Wired` / `Wireless`).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Wired" => Some(LinkKind::Wired),
            "Wireless" => Some(LinkKind::Wireless),
            _ => None,
        }
    }
}

/// A unidirectional link between two nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub id: LinkId,
    pub kind: LinkKind,
    /// Link speed in MB/s.
    pub speed: u64,
}

// ── Nodes ─────────────────────────────────────────────────────────────────────

/// Role of a node in the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    EndSystem,
    Switch,
    AccessPoint,
}

impl NodeRole {
    /// Parse the document spelling (`EndSystem` / `Switch` / `AccessPoint`).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "EndSystem" => Some(NodeRole::EndSystem),
            "Switch" => Some(NodeRole::Switch),
            "AccessPoint" => Some(NodeRole::AccessPoint),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: NodeId,
    pub role: NodeRole,
}

/// One outgoing connection of a node: the peer it reaches and the link used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub peer: NodeId,
    pub link: LinkId,
}

// ── Topology ──────────────────────────────────────────────────────────────────

/// Structural errors detected while assembling the topology.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TopologyError {
    #[error("node {0} is declared more than once")]
    DuplicateNode(NodeId),

    #[error("node {0} connects to itself")]
    SelfLoop(NodeId),

    #[error("link {link} is declared more than once (node {node})")]
    DuplicateLink { node: NodeId, link: LinkId },
}

/// The switched network: nodes, their ordered outgoing connections, and the
/// set of links.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Topology {
    nodes: Vec<Node>,
    /// Outgoing connections, parallel to `nodes`.
    connections: Vec<Vec<Connection>>,
    links: Vec<Link>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node together with its outgoing connections and the links they
    /// declare.
    ///
    /// Enforces the structural invariants: no duplicate node ids, no
    /// self-loops, and no link id declared twice, neither on one node nor
    /// across nodes; every link id belongs to exactly one connection.
    pub fn add_node(
        &mut self,
        node: Node,
        connections: Vec<(Connection, Link)>,
    ) -> Result<(), TopologyError> {
        if self.nodes.iter().any(|n| n.id == node.id) {
            return Err(TopologyError::DuplicateNode(node.id));
        }

        let mut outgoing = Vec::with_capacity(connections.len());
        for (conn, link) in connections {
            if conn.peer == node.id {
                return Err(TopologyError::SelfLoop(node.id));
            }
            if outgoing.iter().any(|c: &Connection| c.link == conn.link)
                || self.links.iter().any(|l| l.id == link.id)
            {
                return Err(TopologyError::DuplicateLink {
                    node: node.id,
                    link: conn.link,
                });
            }
            self.links.push(link);
            outgoing.push(conn);
        }

        self.nodes.push(node);
        self.connections.push(outgoing);
        Ok(())
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_links(&self) -> usize {
        self.links.len()
    }

    /// Highest link id present in the topology, or `None` when it has no
    /// links.  Link ids are dense, so this bounds every link table.
    pub fn max_link_id(&self) -> Option<LinkId> {
        self.links.iter().map(|l| l.id).max()
    }

    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.iter().find(|l| l.id == id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Whether `node` has an outgoing connection over `link`.  Used to check
    /// that the first hop of a frame path originates at its sender.
    pub fn node_has_link(&self, node: NodeId, link: LinkId) -> bool {
        self.nodes
            .iter()
            .position(|n| n.id == node)
            .map(|ix| self.connections[ix].iter().any(|c| c.link == link))
            .unwrap_or(false)
    }
}

// ── Switch behaviour ──────────────────────────────────────────────────────────

/// Behaviour shared by every switch in the network.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwitchInformation {
    /// Minimum residence time of a frame inside a switch.  Nanoseconds at
    /// ingestion, timeslots after renormalization.
    pub min_time: u64,
}

// ── Self-Healing Protocol ─────────────────────────────────────────────────────

/// Self-Healing Protocol reservation parameters.  A period of `0` means the
/// protocol is inactive and no bandwidth is reserved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShpConfig {
    pub period: u64,
    pub time: u64,
}

/// Error raised for a protocol declaration with a period but no duration.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("the Self-Healing Protocol values should be natural (period {period}, time {time})")]
pub struct ShpConfigError {
    pub period: u64,
    pub time: u64,
}

impl ShpConfig {
    /// Inactive protocol (no reservation anywhere).
    pub fn inactive() -> Self {
        Self { period: 0, time: 0 }
    }

    /// Active protocol.  A zero period deactivates the protocol entirely; an
    /// active protocol must reserve a non-zero time.
    pub fn new(period: u64, time: u64) -> Result<Self, ShpConfigError> {
        if period == 0 {
            Ok(Self::inactive())
        } else if time == 0 {
            Err(ShpConfigError { period, time })
        } else {
            Ok(Self { period, time })
        }
    }

    pub fn is_active(&self) -> bool {
        self.period != 0
    }

    /// Number of reservation instances within `hyperperiod`.  Zero when the
    /// protocol is inactive.
    pub fn instances(&self, hyperperiod: u64) -> usize {
        if self.period == 0 {
            0
        } else {
            (hyperperiod / self.period) as usize
        }
    }
}

// ── Network ───────────────────────────────────────────────────────────────────

/// The full ingested network: topology plus the general information shared by
/// every schedule computed over it.
#[derive(Debug, Clone, PartialEq)]
pub struct Network {
    pub topology: Topology,
    pub switch: SwitchInformation,
    pub shp: ShpConfig,
}

impl Network {
    /// Rescale all time fields from nanoseconds to timeslot units.
    pub(crate) fn renormalize(&mut self, timeslot_ns: u64) {
        self.switch.min_time /= timeslot_ns;
        self.shp.period /= timeslot_ns;
        self.shp.time /= timeslot_ns;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
