//! Fact collection: probes, parsers, collectors, and the aggregator.
//!
//! This module provides the collection layer for host facts:
//! - File and command probes with uniform absence handling
//! - One parser per semi-structured text format
//! - Topic collectors (platform identity, hardware, network,
//!   virtualization, security module, SSH host keys)
//! - A static selector from kernel name to collector variants
//! - The aggregator that merges everything into one namespace
//!
//! Probes never raise on a missing source; a locked-down or unsupported
//! host yields a smaller namespace, never an error.

mod aggregator;
mod hardware;
mod network;
mod overlay;
mod platform;
pub mod probe;
mod selector;
mod selinux;
mod ssh_keys;
mod virt;

pub use aggregator::{Aggregator, CORE_PREFIX};
pub use hardware::{
    form_factor_label, parse_cpuinfo_content, parse_meminfo_content, CpuFacts, DmiFacts,
    LinuxHardware, MemoryFacts,
};
pub use network::{
    assemble_network_fragment, netmask_from_prefix, network_address, parse_ip_addr_content,
    parse_route_get_content, DefaultRoute, InterfaceRecord, Ipv4Record, Ipv6Record, LinuxNetwork,
    RouteProbe,
};
pub use overlay::{apply_overlay_output, merge_overlays, OverlaySpec, OVERLAYS};
pub use platform::{
    correct_vendor, hostname, normalize_architecture, parse_legacy_release,
    parse_lsb_release_content, parse_os_release_content, uname, Distribution, LinuxPlatform,
    UnameInfo,
};
pub use probe::{read_file, read_file_trimmed, CommandProbe, ProbeOutput};
pub use selector::{select_collectors, Collector, NoopCollector};
pub use selinux::{parse_selinux_config_content, LinuxSelinux, SelinuxMode, SelinuxSnapshot};
pub use ssh_keys::SshHostKeys;
pub use virt::{
    detect_container_from_cgroup_content, parse_modules_content, LinuxVirtualization, VirtGuess,
    VirtRole,
};
