/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! XML readers for the network, patch, optimize and schedule documents.

use std::path::Path;

use roxmltree::{Document, Node as XmlNode};
use tracing::{info, warn};

use crate::frame::{Frame, FrameId, FrameParams, Traffic};
use crate::network::{
    Connection, Link, LinkId, LinkKind, Network, Node, NodeRole, ShpConfig, SwitchInformation,
    Topology,
};
use crate::patch::LinkPatch;
use crate::scheduler::ScheduleError;

use super::units::{SizeUnit, SpeedUnit, TimeUnit};
use super::InputError;

// ── Low-level helpers ─────────────────────────────────────────────────────────

fn child<'a, 'input>(
    node: XmlNode<'a, 'input>,
    name: &str,
) -> Result<XmlNode<'a, 'input>, InputError> {
    maybe_child(node, name).ok_or_else(|| InputError::MissingElement(name.to_string()))
}

fn maybe_child<'a, 'input>(node: XmlNode<'a, 'input>, name: &str) -> Option<XmlNode<'a, 'input>> {
    node.children().find(|c| c.has_tag_name(name))
}

fn children<'a, 'input>(
    node: XmlNode<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = XmlNode<'a, 'input>> {
    node.children().filter(move |c| c.has_tag_name(name))
}

fn number<T: std::str::FromStr>(node: XmlNode, name: &str) -> Result<T, InputError> {
    node.text()
        .map(str::trim)
        .unwrap_or("")
        .parse::<T>()
        .map_err(|_| InputError::BadNumber(name.to_string()))
}

fn number_of<T: std::str::FromStr>(parent: XmlNode, name: &str) -> Result<T, InputError> {
    number(child(parent, name)?, name)
}

fn attribute<'a>(node: XmlNode<'a, '_>, name: &str) -> Result<&'a str, InputError> {
    node.attribute(name)
        .ok_or_else(|| InputError::MissingAttribute {
            element: node.tag_name().name().to_string(),
            attribute: name.to_string(),
        })
}

/// Read `<name unit="…">value</name>` under `parent`, converted to ns.
fn time_ns(parent: XmlNode, name: &str) -> Result<u64, InputError> {
    let node = child(parent, name)?;
    let value: u64 = number(node, name)?;
    let unit = TimeUnit::parse(attribute(node, "unit")?)?;
    Ok(unit.to_ns(value))
}

/// Like [`time_ns`] but absent elements yield `None`.
fn opt_time_ns(parent: XmlNode, name: &str) -> Result<Option<u64>, InputError> {
    match maybe_child(parent, name) {
        None => Ok(None),
        Some(_) => time_ns(parent, name).map(Some),
    }
}

fn parse_document(path: &Path) -> Result<String, InputError> {
    std::fs::read_to_string(path).map_err(|source| InputError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn xml_error(path: &Path, source: roxmltree::Error) -> InputError {
    InputError::Xml {
        path: path.display().to_string(),
        source,
    }
}

// ── Network document ──────────────────────────────────────────────────────────

/// Read a network configuration document: general information, topology and
/// traffic description.
pub fn read_network(path: &Path) -> Result<(Network, Traffic), ScheduleError> {
    let content = parse_document(path)?;
    let doc = Document::parse(&content).map_err(|e| xml_error(path, e))?;
    let root = doc.root_element();
    if !root.has_tag_name("NetworkConfiguration") {
        return Err(InputError::MissingElement("NetworkConfiguration".to_string()).into());
    }

    let general = child(root, "GeneralInformation")?;
    let switch_xml = child(general, "SwitchInformation")?;
    let min_time = time_ns(switch_xml, "MinimumTime")?;
    let shp = read_healing_protocol(general)?;

    let topology = read_topology(child(root, "TopologyInformation")?)?;
    let traffic = read_traffic(child(root, "TrafficDescription")?, &topology)?;

    info!(
        nodes = topology.num_nodes(),
        links = topology.num_links(),
        frames = traffic.len(),
        shp_active = shp.is_active(),
        "network document read"
    );

    Ok((
        Network {
            topology,
            switch: SwitchInformation { min_time },
            shp,
        },
        traffic,
    ))
}

/// An absent or unreadable protocol declaration deactivates the protocol; a
/// declared protocol with bad values is an error.
fn read_healing_protocol(general: XmlNode) -> Result<ShpConfig, InputError> {
    let Some(shp_xml) = maybe_child(general, "SelfHealingProtocol") else {
        return Ok(ShpConfig::inactive());
    };
    let period = match time_ns(shp_xml, "Period") {
        Ok(period) => period,
        Err(_) => {
            warn!("Self-Healing Protocol period unreadable, protocol disabled");
            return Ok(ShpConfig::inactive());
        }
    };
    let time = time_ns(shp_xml, "Time")?;
    Ok(ShpConfig::new(period, time)?)
}

fn read_topology(topology_xml: XmlNode) -> Result<Topology, ScheduleError> {
    let mut topology = Topology::new();

    for node_xml in children(topology_xml, "Node") {
        let role = NodeRole::parse(attribute(node_xml, "category")?)
            .ok_or_else(|| InputError::UnknownNodeRole(
                attribute(node_xml, "category").unwrap_or_default().to_string(),
            ))?;
        let id: usize = number_of(node_xml, "NodeID")?;

        let mut connections = Vec::new();
        for conn_xml in children(node_xml, "Connection") {
            let peer: usize = number_of(conn_xml, "NodeID")?;
            let link_xml = child(conn_xml, "Link")?;
            let kind = LinkKind::parse(attribute(link_xml, "category")?)
                .ok_or_else(|| InputError::UnknownLinkKind(
                    attribute(link_xml, "category").unwrap_or_default().to_string(),
                ))?;
            let link_id: usize = number_of(link_xml, "LinkID")?;
            let speed_xml = child(link_xml, "Speed")?;
            let raw_speed: u64 = number(speed_xml, "Speed")?;
            let speed = SpeedUnit::parse(attribute(speed_xml, "unit")?)?.to_mbs(raw_speed);
            if speed == 0 {
                return Err(InputError::NonPositiveSpeed.into());
            }

            connections.push((
                Connection {
                    peer,
                    link: link_id,
                },
                Link {
                    id: link_id,
                    kind,
                    speed,
                },
            ));
        }

        topology.add_node(Node { id, role }, connections)?;
    }

    Ok(topology)
}

fn read_traffic(traffic_xml: XmlNode, topology: &Topology) -> Result<Traffic, ScheduleError> {
    let mut traffic = Traffic::new();

    for frame_xml in children(traffic_xml, "Frame") {
        let id: FrameId = number_of(frame_xml, "FrameID")?;
        let sender: usize = number_of(frame_xml, "SenderID")?;
        let period = time_ns(frame_xml, "Period")?;
        let deadline = opt_time_ns(frame_xml, "Deadline")?.unwrap_or(0);
        let starting = opt_time_ns(frame_xml, "StartingTime")?.unwrap_or(0);
        let end_to_end = opt_time_ns(frame_xml, "EndToEnd")?.unwrap_or(0);

        let size = match maybe_child(frame_xml, "Size") {
            None => 1_000,
            Some(size_xml) => {
                let raw: u64 = number(size_xml, "Size")?;
                let bytes = SizeUnit::parse(attribute(size_xml, "unit")?)?.to_bytes(raw);
                if bytes == 0 {
                    1_000
                } else {
                    bytes
                }
            }
        };

        let mut receivers = Vec::new();
        let mut paths = Vec::new();
        for receiver_xml in children(child(frame_xml, "Paths")?, "Receiver") {
            let receiver: usize = number_of(receiver_xml, "ReceiverID")?;
            if topology.node(receiver).is_none() {
                return Err(InputError::UnknownReceiver { frame: id, receiver }.into());
            }

            let path_text = child(receiver_xml, "Path")?
                .text()
                .map(str::trim)
                .unwrap_or("");
            let links = path_text
                .split(';')
                .map(|part| {
                    part.trim()
                        .parse::<LinkId>()
                        .map_err(|_| InputError::BadNumber("Path".to_string()))
                })
                .collect::<Result<Vec<_>, _>>()?;

            for &link in &links {
                if topology.link(link).is_none() {
                    return Err(InputError::UnknownPathLink { frame: id, link }.into());
                }
            }
            match links.first() {
                Some(&first) if topology.node_has_link(sender, first) => {}
                _ => return Err(InputError::PathNotAtSender { frame: id }.into()),
            }

            receivers.push(receiver);
            paths.push((receiver, links));
        }

        let mut frame = Frame::new(FrameParams {
            size,
            period,
            deadline,
            starting,
            end_to_end,
            sender,
            receivers,
        })?;
        for (receiver, links) in paths {
            frame.set_path(receiver, links)?;
        }
        traffic.push(id, frame);
    }

    Ok(traffic)
}

// ── Patch / optimize documents ────────────────────────────────────────────────

/// Read a patch document (timeslot units throughout).
pub fn read_patch(path: &Path) -> Result<LinkPatch, ScheduleError> {
    read_link_document(path, "Patch")
}

/// Read an optimize document: the same shape as a patch document under an
/// `Optimize` root.
pub fn read_optimize(path: &Path) -> Result<LinkPatch, ScheduleError> {
    read_link_document(path, "Optimize")
}

fn read_link_document(path: &Path, root_name: &str) -> Result<LinkPatch, ScheduleError> {
    let content = parse_document(path)?;
    let doc = Document::parse(&content).map_err(|e| xml_error(path, e))?;
    let root = doc.root_element();
    if !root.has_tag_name(root_name) {
        return Err(InputError::MissingElement(root_name.to_string()).into());
    }

    let general = child(root, "GeneralInformation")?;
    let link_id: LinkId = number_of(general, "LinkID")?;
    let protocol_period: u64 = number_of(general, "ProtocolPeriod")?;
    let protocol_time: u64 = number_of(general, "ProtocolTime")?;
    let hyperperiod: u64 = number_of(general, "HyperPeriod")?;
    let shp = ShpConfig::new(protocol_period, protocol_time).map_err(InputError::from)?;

    let mut fixed = Traffic::new();
    if let Some(fixed_xml) = maybe_child(root, "FixedTraffic") {
        for frame_xml in children(fixed_xml, "Frame") {
            let id: FrameId = number_of(frame_xml, "FrameID")?;
            let offset_xml = child(frame_xml, "Offset")?;

            let mut duration = 0;
            let mut transmissions = Vec::new();
            for instance_xml in children(offset_xml, "Instance") {
                let t: u64 = number_of(instance_xml, "TransmissionTime")?;
                let ending: u64 = number_of(instance_xml, "EndingTime")?;
                if ending < t {
                    return Err(InputError::BadInterval { frame: id }.into());
                }
                duration = ending - t + 1;
                transmissions.push(t);
            }

            fixed.push(
                id,
                Frame::fixed_single_link(link_id, duration, &transmissions, hyperperiod),
            );
        }
    }

    let mut pending = Traffic::new();
    for frame_xml in children(child(root, "Traffic")?, "Frame") {
        let id: FrameId = number_of(frame_xml, "FrameID")?;
        let offset_xml = child(frame_xml, "Offset")?;
        let time_slots: u64 = number_of(offset_xml, "TimeSlots")?;

        let mut ranges = Vec::new();
        for instance_xml in children(offset_xml, "Instance") {
            let min: u64 = number_of(instance_xml, "MinTransmission")?;
            let max: u64 = number_of(instance_xml, "MaxTransmission")?;
            if max < min {
                return Err(InputError::BadInterval { frame: id }.into());
            }
            ranges.push((min, max));
        }

        pending.push(id, Frame::single_link(link_id, time_slots, &ranges, hyperperiod));
    }

    info!(
        link = link_id,
        fixed = fixed.len(),
        pending = pending.len(),
        hyperperiod,
        "{} document read",
        root_name.to_lowercase()
    );

    Ok(LinkPatch {
        link_id,
        hyperperiod,
        shp,
        fixed,
        pending,
    })
}

// ── Schedule document (round-trip) ────────────────────────────────────────────

/// Transmission times of one frame on one link, as re-read from an emitted
/// schedule document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSchedule {
    pub link: LinkId,
    /// `(instance, transmission time)` pairs.
    pub transmissions: Vec<(usize, u64)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSchedule {
    pub id: FrameId,
    pub links: Vec<LinkSchedule>,
}

/// An emitted schedule document, re-parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleDocument {
    pub timeslot_ns: u64,
    pub hyperperiod: u64,
    pub shp: ShpConfig,
    pub frames: Vec<FrameSchedule>,
}

/// Re-read a schedule document emitted by [`crate::io::write::write_schedule`].
pub fn read_schedule(path: &Path) -> Result<ScheduleDocument, ScheduleError> {
    let content = parse_document(path)?;
    let doc = Document::parse(&content).map_err(|e| xml_error(path, e))?;
    let root = doc.root_element();
    if !root.has_tag_name("Schedule") {
        return Err(InputError::MissingElement("Schedule".to_string()).into());
    }

    let general = child(root, "GeneralInformation")?;
    let timeslot_ns: u64 = number_of(general, "TimeslotSize")?;
    let hyperperiod: u64 = number_of(general, "HyperPeriod")?;
    let shp = match maybe_child(general, "SelfHealingProtocol") {
        None => ShpConfig::inactive(),
        Some(shp_xml) => {
            let period: u64 = number_of(shp_xml, "Period")?;
            let time: u64 = number_of(shp_xml, "Time")?;
            ShpConfig::new(period, time).map_err(InputError::from)?
        }
    };

    let mut frames = Vec::new();
    for frame_xml in children(child(root, "TrafficInformation")?, "Frame") {
        let id: FrameId = number_of(frame_xml, "FrameID")?;
        let mut links: Vec<LinkSchedule> = Vec::new();

        for path_xml in children(frame_xml, "Path") {
            for link_xml in children(path_xml, "Link") {
                let link: LinkId = number_of(link_xml, "LinkID")?;
                if links.iter().any(|l| l.link == link) {
                    // Shared offset already collected through another path
                    continue;
                }
                let mut transmissions = Vec::new();
                for instance_xml in children(link_xml, "Instance") {
                    let instance: usize = number_of(instance_xml, "NumInstance")?;
                    let t: u64 = number_of(instance_xml, "TransmissionTime")?;
                    transmissions.push((instance, t));
                }
                links.push(LinkSchedule {
                    link,
                    transmissions,
                });
            }
        }

        frames.push(FrameSchedule { id, links });
    }

    Ok(ScheduleDocument {
        timeslot_ns,
        hyperperiod,
        shp,
        frames,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    fn write_file(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    /// N0 → ℓ0 → N1 → ℓ1 → N2 with one frame over both links.
    fn network_xml() -> &'static str {
        r#"<?xml version="1.0" encoding="UTF-8"?>
<NetworkConfiguration>
  <GeneralInformation>
    <SwitchInformation>
      <MinimumTime unit="ns">0</MinimumTime>
    </SwitchInformation>
    <SelfHealingProtocol>
      <Period unit="ns">10000</Period>
      <Time unit="ns">50</Time>
    </SelfHealingProtocol>
  </GeneralInformation>
  <TopologyInformation>
    <Node category="EndSystem">
      <NodeID>0</NodeID>
      <Connection>
        <NodeID>1</NodeID>
        <Link category="Wired">
          <LinkID>0</LinkID>
          <Speed unit="MBs">1000</Speed>
        </Link>
      </Connection>
    </Node>
    <Node category="Switch">
      <NodeID>1</NodeID>
      <Connection>
        <NodeID>2</NodeID>
        <Link category="Wired">
          <LinkID>1</LinkID>
          <Speed unit="MBs">1000</Speed>
        </Link>
      </Connection>
    </Node>
    <Node category="EndSystem">
      <NodeID>2</NodeID>
    </Node>
  </TopologyInformation>
  <TrafficDescription>
    <Frame>
      <FrameID>0</FrameID>
      <SenderID>0</SenderID>
      <Period unit="us">10</Period>
      <Deadline unit="ns">0</Deadline>
      <Size unit="Byte">125</Size>
      <StartingTime unit="ns">0</StartingTime>
      <EndToEnd unit="ns">0</EndToEnd>
      <Paths>
        <Receiver>
          <ReceiverID>2</ReceiverID>
          <Path>0;1</Path>
        </Receiver>
      </Paths>
    </Frame>
  </TrafficDescription>
</NetworkConfiguration>
"#
    }

    #[test]
    fn network_document_is_read_and_canonicalized() {
        let f = write_file(network_xml());
        let (network, traffic) = read_network(f.path()).unwrap();

        assert_eq!(network.switch.min_time, 0);
        // 10 µs → 10000 ns
        assert_eq!(network.shp.period, 10_000);
        assert_eq!(network.shp.time, 50);
        assert_eq!(network.topology.num_nodes(), 3);
        assert_eq!(network.topology.num_links(), 2);
        assert_eq!(network.topology.link(0).unwrap().speed, 1_000);

        assert_eq!(traffic.len(), 1);
        let frame = traffic.frame(0);
        assert_eq!(frame.period(), 10_000);
        assert_eq!(frame.deadline(), 10_000);
        assert_eq!(frame.size(), 125);
        assert_eq!(frame.paths()[0].links(), &[0, 1]);
    }

    #[test]
    fn absent_protocol_is_inactive() {
        let xml = network_xml().replace(
            r#"    <SelfHealingProtocol>
      <Period unit="ns">10000</Period>
      <Time unit="ns">50</Time>
    </SelfHealingProtocol>
"#,
            "",
        );
        let f = write_file(&xml);
        let (network, _) = read_network(f.path()).unwrap();
        assert!(!network.shp.is_active());
    }

    #[test]
    fn unreadable_protocol_period_is_inactive() {
        let xml = network_xml().replace(
            r#"<Period unit="ns">10000</Period>"#,
            r#"<Period unit="ns">soon</Period>"#,
        );
        let f = write_file(&xml);
        let (network, _) = read_network(f.path()).unwrap();
        assert!(!network.shp.is_active());
    }

    #[test]
    fn missing_size_defaults_to_1000_bytes() {
        let xml = network_xml().replace("      <Size unit=\"Byte\">125</Size>\n", "");
        let f = write_file(&xml);
        let (_, traffic) = read_network(f.path()).unwrap();
        assert_eq!(traffic.frame(0).size(), 1_000);
    }

    #[test]
    fn unknown_unit_is_rejected() {
        let xml = network_xml().replace(r#"<Period unit="us">10</Period>"#, {
            r#"<Period unit="fortnights">10</Period>"#
        });
        // The SHP period becomes unreadable (→ inactive) but the frame
        // period carries the same text, which must fail
        let f = write_file(&xml);
        let err = read_network(f.path()).unwrap_err();
        assert!(matches!(
            err,
            ScheduleError::Input(InputError::UnknownUnit(_))
        ));
    }

    #[test]
    fn unknown_node_category_is_rejected() {
        let xml = network_xml().replace(r#"category="Switch""#, r#"category="Router""#);
        let f = write_file(&xml);
        let err = read_network(f.path()).unwrap_err();
        assert!(matches!(
            err,
            ScheduleError::Input(InputError::UnknownNodeRole(_))
        ));
    }

    #[test]
    fn unknown_receiver_is_rejected() {
        let xml = network_xml().replace("<ReceiverID>2</ReceiverID>", "<ReceiverID>9</ReceiverID>");
        let f = write_file(&xml);
        let err = read_network(f.path()).unwrap_err();
        assert!(matches!(
            err,
            ScheduleError::Input(InputError::UnknownReceiver {
                frame: 0,
                receiver: 9
            })
        ));
    }

    #[test]
    fn path_not_starting_at_sender_is_rejected() {
        let xml = network_xml().replace("<Path>0;1</Path>", "<Path>1;0</Path>");
        let f = write_file(&xml);
        let err = read_network(f.path()).unwrap_err();
        assert!(matches!(
            err,
            ScheduleError::Input(InputError::PathNotAtSender { frame: 0 })
        ));
    }

    #[test]
    fn unknown_path_link_is_rejected() {
        let xml = network_xml().replace("<Path>0;1</Path>", "<Path>0;7</Path>");
        let f = write_file(&xml);
        let err = read_network(f.path()).unwrap_err();
        assert!(matches!(
            err,
            ScheduleError::Input(InputError::UnknownPathLink { frame: 0, link: 7 })
        ));
    }

    #[test]
    fn missing_file_reports_io_error() {
        let err = read_network(Path::new("/nonexistent/network.xml")).unwrap_err();
        assert!(matches!(err, ScheduleError::Input(InputError::Io { .. })));
    }

    // ── Patch documents ───────────────────────────────────────────────────────

    fn patch_xml(root: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<{root}>
  <GeneralInformation>
    <LinkID>3</LinkID>
    <ProtocolPeriod>500</ProtocolPeriod>
    <ProtocolTime>20</ProtocolTime>
    <HyperPeriod>1000</HyperPeriod>
  </GeneralInformation>
  <FixedTraffic>
    <Frame>
      <FrameID>0</FrameID>
      <Offset>
        <Instance>
          <TransmissionTime>100</TransmissionTime>
          <EndingTime>149</EndingTime>
        </Instance>
      </Offset>
    </Frame>
  </FixedTraffic>
  <Traffic>
    <Frame>
      <FrameID>1</FrameID>
      <Offset>
        <TimeSlots>30</TimeSlots>
        <Instance>
          <MinTransmission>0</MinTransmission>
          <MaxTransmission>200</MaxTransmission>
        </Instance>
      </Offset>
    </Frame>
  </Traffic>
</{root}>
"#
        )
    }

    #[test]
    fn patch_document_is_read() {
        let f = write_file(&patch_xml("Patch"));
        let patch = read_patch(f.path()).unwrap();

        assert_eq!(patch.link_id, 3);
        assert_eq!(patch.hyperperiod, 1_000);
        assert_eq!(patch.shp.period, 500);
        assert_eq!(patch.shp.time, 20);

        assert_eq!(patch.fixed.len(), 1);
        let fixed_off = patch.fixed.frame(0).offset(0);
        assert_eq!(fixed_off.transmission(0, 0), Some(100));
        // Closed-interval EndingTime 149 → duration 50 slots
        assert_eq!(fixed_off.time(), 50);

        assert_eq!(patch.pending.len(), 1);
        let off = patch.pending.frame(0).offset(0);
        assert_eq!(off.time(), 30);
        assert_eq!(off.range(0), (0, 200));
    }

    #[test]
    fn optimize_document_requires_optimize_root() {
        let f = write_file(&patch_xml("Optimize"));
        assert!(read_optimize(f.path()).is_ok());

        let f = write_file(&patch_xml("Patch"));
        let err = read_optimize(f.path()).unwrap_err();
        assert!(matches!(
            err,
            ScheduleError::Input(InputError::MissingElement(_))
        ));
    }

    #[test]
    fn backwards_instance_interval_is_rejected() {
        let xml = patch_xml("Patch").replace(
            "<EndingTime>149</EndingTime>",
            "<EndingTime>99</EndingTime>",
        );
        let f = write_file(&xml);
        let err = read_patch(f.path()).unwrap_err();
        assert!(matches!(
            err,
            ScheduleError::Input(InputError::BadInterval { frame: 0 })
        ));
    }
}
