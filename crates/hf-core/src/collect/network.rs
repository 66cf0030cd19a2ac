//! Network facts: interfaces, addresses, default routes.
//!
//! # Data Sources
//! - `ip addr show` - interface/address stream
//! - `ip -4 route get 8.8.8.8` / `ip -6 route get <probe addr>` - default
//!   routes, derived from the routing table rather than interface order
//!
//! The interface listing interleaves device headers with indented link and
//! address detail lines. The parser threads an explicit current-device
//! register through a single pass: a non-indented line opens a new device,
//! and every indented line attaches to whichever header most recently
//! preceded it. Losing that register would file addresses under the wrong
//! interface, so the register is explicit state, not a loose variable.

use super::probe::{CommandProbe, ProbeOutput};
use super::selector::Collector;
use hf_common::{FactValue, Fragment};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use tracing::warn;

/// IPv4 probe target for the default-route query.
const ROUTE_PROBE_V4: &str = "8.8.8.8";

/// IPv6 probe target for the default-route query.
const ROUTE_PROBE_V6: &str = "2404:6800:400a:800::1012";

/// One IPv4 address on an interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ipv4Record {
    pub address: Ipv4Addr,
    pub prefix: u8,
    /// Marked `secondary` in the listing.
    pub secondary: bool,
}

impl Ipv4Record {
    /// Network mask derived from the prefix length.
    pub fn netmask(&self) -> Ipv4Addr {
        netmask_from_prefix(self.prefix).unwrap_or(Ipv4Addr::UNSPECIFIED)
    }

    /// Network address: address AND mask.
    pub fn network(&self) -> Ipv4Addr {
        network_address(self.address, self.prefix).unwrap_or(Ipv4Addr::UNSPECIFIED)
    }
}

/// One IPv6 address on an interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ipv6Record {
    pub address: String,
    pub prefix: u8,
    pub scope: Option<String>,
}

impl Ipv6Record {
    fn is_loopback(&self) -> bool {
        self.address == "::1"
    }

    fn is_link_local(&self) -> bool {
        let lower = self.address.to_ascii_lowercase();
        lower.starts_with("fe80:")
    }
}

/// One interface from the listing, with all of its addresses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceRecord {
    pub device: String,
    pub macaddress: Option<String>,
    pub mtu: Option<u64>,
    pub link_type: Option<String>,
    pub ipv4: Vec<Ipv4Record>,
    pub ipv6: Vec<Ipv6Record>,
}

/// Derive the 32-bit network mask for a prefix length.
///
/// Pure bitmask arithmetic; `None` for prefixes over 32.
pub fn netmask_from_prefix(prefix: u8) -> Option<Ipv4Addr> {
    if prefix > 32 {
        return None;
    }
    let mask: u32 = if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix))
    };
    Some(Ipv4Addr::from(mask))
}

/// Derive the network address: address AND mask.
pub fn network_address(address: Ipv4Addr, prefix: u8) -> Option<Ipv4Addr> {
    let mask = netmask_from_prefix(prefix)?;
    Some(Ipv4Addr::from(u32::from(address) & u32::from(mask)))
}

/// Parse the `ip addr show` stream into interface records.
///
/// Unrecognized lines are skipped; an unparsable header clears the
/// current-device register so trailing detail lines cannot attach to the
/// wrong interface.
pub fn parse_ip_addr_content(content: &str) -> Vec<InterfaceRecord> {
    let mut records: Vec<InterfaceRecord> = Vec::new();
    // The current-device register: details attach to this record until the
    // next header line replaces it.
    let mut current: Option<InterfaceRecord> = None;

    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let indented = line.starts_with(' ') || line.starts_with('\t');

        if !indented {
            if let Some(done) = current.take() {
                records.push(done);
            }
            current = parse_header_line(line);
            continue;
        }

        let Some(record) = current.as_mut() else {
            continue;
        };
        parse_detail_line(line, record);
    }

    if let Some(done) = current.take() {
        records.push(done);
    }

    records
}

/// Parse a device header: `2: eth0: <BROADCAST,...> mtu 1500 qdisc ...`.
fn parse_header_line(line: &str) -> Option<InterfaceRecord> {
    let mut tokens = line.split_whitespace();
    let index = tokens.next()?;
    if !index.ends_with(':') || !index.trim_end_matches(':').chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let device_token = tokens.next()?;
    let device = device_token
        .trim_end_matches(':')
        .split('@') // VLAN/veth names carry a parent suffix
        .next()?
        .to_string();
    if device.is_empty() {
        return None;
    }

    let mut record = InterfaceRecord {
        device,
        ..Default::default()
    };

    let rest: Vec<&str> = tokens.collect();
    for pair in rest.windows(2) {
        if pair[0] == "mtu" {
            record.mtu = pair[1].parse().ok();
            break;
        }
    }

    Some(record)
}

/// Parse an indented detail line into the current device record.
fn parse_detail_line(line: &str, record: &mut InterfaceRecord) {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let Some(&first) = tokens.first() else {
        return;
    };

    if let Some(link_type) = first.strip_prefix("link/") {
        record.link_type = Some(link_type.to_string());
        if let Some(mac) = tokens.get(1).filter(|t| t.contains(':')) {
            record.macaddress = Some(mac.to_string());
        }
        return;
    }

    match first {
        "inet" => {
            let Some((address, prefix)) = split_cidr(tokens.get(1)) else {
                return;
            };
            let Ok(address) = address.parse::<Ipv4Addr>() else {
                return;
            };
            if prefix > 32 {
                return;
            }
            record.ipv4.push(Ipv4Record {
                address,
                prefix,
                secondary: tokens.contains(&"secondary"),
            });
        }
        "inet6" => {
            let Some((address, prefix)) = split_cidr(tokens.get(1)) else {
                return;
            };
            if prefix > 128 || !address.contains(':') {
                return;
            }
            let scope = tokens
                .iter()
                .position(|&t| t == "scope")
                .and_then(|i| tokens.get(i + 1))
                .map(|s| s.to_string());
            record.ipv6.push(Ipv6Record {
                address: address.to_string(),
                prefix,
                scope,
            });
        }
        _ => {}
    }
}

/// Split an `address/prefix` token.
fn split_cidr(token: Option<&&str>) -> Option<(String, u8)> {
    let token = token?;
    let (address, prefix) = token.split_once('/')?;
    Some((address.to_string(), prefix.parse().ok()?))
}

/// A computed default route for one address family.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultRoute {
    pub interface: Option<String>,
    pub gateway: Option<String>,
    pub address: Option<String>,
}

/// Outcome of a default-route query.
///
/// "No default route" and "route query failed" are distinct observable
/// states; only the latter is an error condition worth surfacing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteProbe {
    /// The query tool is absent or could not run.
    Unavailable,
    /// The query ran cleanly and matched no route (e.g. no IPv6
    /// connectivity).
    NoRoute,
    /// A route was found.
    Route(DefaultRoute),
}

/// Parse `ip route get` output.
///
/// The first output line's target must match the query; the line then
/// carries `via <gateway>`, `dev <interface>`, and `src <address>` token
/// pairs in any order. Anything else yields `None`.
pub fn parse_route_get_content(content: &str, target: &str) -> Option<DefaultRoute> {
    let line = content.lines().find(|l| !l.trim().is_empty())?;
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.first() != Some(&target) {
        return None;
    }

    let mut route = DefaultRoute::default();
    for pair in tokens.windows(2) {
        match pair[0] {
            "via" => route.gateway = Some(pair[1].to_string()),
            "dev" => route.interface = Some(pair[1].to_string()),
            "src" => route.address = Some(pair[1].to_string()),
            _ => {}
        }
    }

    if route.interface.is_none() && route.address.is_none() {
        return None;
    }
    Some(route)
}

/// Interpret a route query probe result.
///
/// A non-zero exit with empty output is the legitimate "network
/// unreachable" answer, not a failure; the parser tolerates it.
fn interpret_route_probe(output: Option<ProbeOutput>, target: &str) -> RouteProbe {
    match output {
        None => RouteProbe::Unavailable,
        Some(out) if out.timed_out => RouteProbe::Unavailable,
        Some(out) => match parse_route_get_content(&out.stdout, target) {
            Some(route) => RouteProbe::Route(route),
            None => RouteProbe::NoRoute,
        },
    }
}

/// One published interface entry: a base device, or a synthetic suffixed
/// sibling carrying one extra IPv4 address.
struct InterfaceEntry {
    name: String,
    macaddress: Option<String>,
    mtu: Option<u64>,
    link_type: Option<String>,
    ipv4: Option<Ipv4Record>,
    ipv6: Vec<Ipv6Record>,
}

/// Flatten interface records into published entries.
///
/// An interface with multiple IPv4 addresses becomes sibling entries
/// (`eth0`, `eth0_1`, ...) so every address keeps a unique record.
fn flatten_entries(interfaces: &[InterfaceRecord]) -> Vec<InterfaceEntry> {
    let mut entries = Vec::new();

    for record in interfaces {
        let mut addresses = record.ipv4.iter();
        entries.push(InterfaceEntry {
            name: record.device.clone(),
            macaddress: record.macaddress.clone(),
            mtu: record.mtu,
            link_type: record.link_type.clone(),
            ipv4: addresses.next().cloned(),
            ipv6: record.ipv6.clone(),
        });
        for (index, extra) in addresses.enumerate() {
            entries.push(InterfaceEntry {
                name: format!("{}_{}", record.device, index + 1),
                macaddress: record.macaddress.clone(),
                mtu: record.mtu,
                link_type: record.link_type.clone(),
                ipv4: Some(extra.clone()),
                ipv6: Vec::new(),
            });
        }
    }

    entries
}

fn ipv4_map(record: &Ipv4Record) -> FactValue {
    let mut map = BTreeMap::new();
    map.insert("address".to_string(), record.address.to_string().into());
    map.insert("netmask".to_string(), record.netmask().to_string().into());
    map.insert("network".to_string(), record.network().to_string().into());
    FactValue::Map(map)
}

fn ipv6_map(record: &Ipv6Record) -> FactValue {
    let mut map = BTreeMap::new();
    map.insert("address".to_string(), record.address.clone().into());
    map.insert("prefix".to_string(), i64::from(record.prefix).into());
    if let Some(scope) = &record.scope {
        map.insert("scope".to_string(), scope.clone().into());
    }
    FactValue::Map(map)
}

fn entry_map(entry: &InterfaceEntry) -> FactValue {
    let mut map = BTreeMap::new();
    if let Some(mac) = &entry.macaddress {
        map.insert("macaddress".to_string(), mac.clone().into());
    }
    if let Some(mtu) = entry.mtu {
        map.insert("mtu".to_string(), mtu.into());
    }
    if let Some(link_type) = &entry.link_type {
        map.insert("type".to_string(), link_type.clone().into());
    }
    if let Some(ipv4) = &entry.ipv4 {
        map.insert("ipv4".to_string(), ipv4_map(ipv4));
    }
    if !entry.ipv6.is_empty() {
        map.insert(
            "ipv6".to_string(),
            FactValue::List(entry.ipv6.iter().map(ipv6_map).collect()),
        );
    }
    FactValue::Map(map)
}

/// Build the default-route map, enriched from the matching interface entry.
///
/// The route is matched back to an entry by its source address (falling
/// back to the interface name) and picks up that entry's netmask, MAC,
/// MTU, and link type.
fn default_route_map(route: &DefaultRoute, entries: &[InterfaceEntry]) -> FactValue {
    let mut map = BTreeMap::new();
    if let Some(interface) = &route.interface {
        map.insert("interface".to_string(), interface.clone().into());
    }
    if let Some(gateway) = &route.gateway {
        map.insert("gateway".to_string(), gateway.clone().into());
    }
    if let Some(address) = &route.address {
        map.insert("address".to_string(), address.clone().into());
    }

    let matched = entries
        .iter()
        .find(|e| {
            route.address.is_some()
                && e.ipv4.as_ref().map(|r| r.address.to_string()) == route.address
        })
        .or_else(|| {
            entries
                .iter()
                .find(|e| route.interface.as_deref() == Some(e.name.as_str()))
        });

    if let Some(entry) = matched {
        if let Some(ipv4) = &entry.ipv4 {
            map.insert("netmask".to_string(), ipv4.netmask().to_string().into());
            map.insert("network".to_string(), ipv4.network().to_string().into());
        }
        if let Some(mac) = &entry.macaddress {
            map.insert("macaddress".to_string(), mac.clone().into());
        }
        if let Some(mtu) = entry.mtu {
            map.insert("mtu".to_string(), mtu.into());
        }
        if let Some(link_type) = &entry.link_type {
            map.insert("type".to_string(), link_type.clone().into());
        }
    }

    FactValue::Map(map)
}

/// Assemble the network fragment from parsed interfaces and route probes.
///
/// Pure with respect to its inputs; the collector feeds it live probe
/// output and the tests feed it fixtures.
pub fn assemble_network_fragment(
    interfaces: &[InterfaceRecord],
    route_v4: RouteProbe,
    route_v6: RouteProbe,
) -> Fragment {
    let mut fragment = Fragment::new();
    if interfaces.is_empty() {
        // Interface listing unavailable: route facts alone would not be
        // enrichable, so the whole topic is omitted.
        return fragment;
    }

    let entries = flatten_entries(interfaces);

    fragment.insert(
        "interfaces".into(),
        FactValue::List(entries.iter().map(|e| e.name.clone().into()).collect()),
    );
    for entry in &entries {
        fragment.insert(entry.name.clone(), entry_map(entry));
    }

    let mut all_ipv4: Vec<FactValue> = Vec::new();
    let mut all_ipv6: Vec<FactValue> = Vec::new();
    for record in interfaces {
        for ipv4 in &record.ipv4 {
            if !ipv4.address.is_loopback() {
                all_ipv4.push(ipv4.address.to_string().into());
            }
        }
        for ipv6 in &record.ipv6 {
            if !ipv6.is_loopback() && !ipv6.is_link_local() {
                all_ipv6.push(ipv6.address.clone().into());
            }
        }
    }
    fragment.insert("all_ipv4_addresses".into(), FactValue::List(all_ipv4));
    fragment.insert("all_ipv6_addresses".into(), FactValue::List(all_ipv6));

    for (key, probe) in [("default_ipv4", route_v4), ("default_ipv6", route_v6)] {
        match probe {
            RouteProbe::Unavailable => {
                warn!(family = key, "route query failed; omitting default route");
            }
            RouteProbe::NoRoute => {
                fragment.insert(key.into(), FactValue::Map(BTreeMap::new()));
            }
            RouteProbe::Route(route) => {
                fragment.insert(key.into(), default_route_map(&route, &entries));
            }
        }
    }

    fragment
}

/// Network collector for Linux.
pub struct LinuxNetwork {
    probe: CommandProbe,
}

impl LinuxNetwork {
    pub fn new() -> Self {
        Self {
            probe: CommandProbe::new(),
        }
    }
}

impl Default for LinuxNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for LinuxNetwork {
    fn topic(&self) -> &'static str {
        "network"
    }

    fn collect(&self) -> Fragment {
        let interfaces = match self.probe.run("ip", &["addr", "show"]) {
            Some(out) if out.success() => parse_ip_addr_content(&out.stdout),
            _ => Vec::new(),
        };

        let route_v4 = interpret_route_probe(
            self.probe.run("ip", &["-4", "route", "get", ROUTE_PROBE_V4]),
            ROUTE_PROBE_V4,
        );
        let route_v6 = interpret_route_probe(
            self.probe.run("ip", &["-6", "route", "get", ROUTE_PROBE_V6]),
            ROUTE_PROBE_V6,
        );

        assemble_network_fragment(&interfaces, route_v4, route_v6)
    }
}
