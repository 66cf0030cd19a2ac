//! Collector selection: kernel name to platform-specific variants.
//!
//! Registration is static and compiled in. Each topic registers its
//! variants against the kernel name `uname` reports; `select_collectors`
//! returns one collector per topic in the fixed declaration order the
//! aggregator relies on for collision resolution. An unmatched platform
//! falls back to a no-op collector per topic and never errors.

use super::hardware::LinuxHardware;
use super::network::LinuxNetwork;
use super::platform::LinuxPlatform;
use super::selinux::LinuxSelinux;
use super::ssh_keys::SshHostKeys;
use super::virt::LinuxVirtualization;
use hf_common::Fragment;
use tracing::debug;

/// One topic capability: gathers facts for one area of the host.
///
/// Implementations are platform-specific; the contract is shared. A
/// collector whose upstream probes are unavailable omits those keys
/// rather than failing.
pub trait Collector {
    /// Topic name, for logs and diagnostics.
    fn topic(&self) -> &'static str;

    /// Gather this topic's fact fragment.
    fn collect(&self) -> Fragment;
}

/// Generic fallback: contributes nothing.
pub struct NoopCollector {
    topic: &'static str,
}

impl NoopCollector {
    pub fn new(topic: &'static str) -> Self {
        Self { topic }
    }
}

impl Collector for NoopCollector {
    fn topic(&self) -> &'static str {
        self.topic
    }

    fn collect(&self) -> Fragment {
        Fragment::new()
    }
}

type Factory = fn() -> Box<dyn Collector>;

struct TopicEntry {
    topic: &'static str,
    variants: &'static [(&'static str, Factory)],
}

fn linux_platform() -> Box<dyn Collector> {
    Box::new(LinuxPlatform::new())
}

fn linux_hardware() -> Box<dyn Collector> {
    Box::new(LinuxHardware::new())
}

fn linux_network() -> Box<dyn Collector> {
    Box::new(LinuxNetwork::new())
}

fn linux_virtualization() -> Box<dyn Collector> {
    Box::new(LinuxVirtualization::new())
}

fn linux_selinux() -> Box<dyn Collector> {
    Box::new(LinuxSelinux::new())
}

fn linux_ssh_keys() -> Box<dyn Collector> {
    Box::new(SshHostKeys::new())
}

/// Topic registry in collection order. Later collectors win key
/// collisions, so order here is a contract, not a convenience.
static TOPICS: &[TopicEntry] = &[
    TopicEntry {
        topic: "platform",
        variants: &[("Linux", linux_platform as Factory)],
    },
    TopicEntry {
        topic: "hardware",
        variants: &[("Linux", linux_hardware as Factory)],
    },
    TopicEntry {
        topic: "network",
        variants: &[("Linux", linux_network as Factory)],
    },
    TopicEntry {
        topic: "virtualization",
        variants: &[("Linux", linux_virtualization as Factory)],
    },
    TopicEntry {
        topic: "selinux",
        variants: &[("Linux", linux_selinux as Factory)],
    },
    TopicEntry {
        topic: "ssh_keys",
        variants: &[("Linux", linux_ssh_keys as Factory)],
    },
];

/// Select one collector per topic for the given kernel name.
///
/// Unknown kernels get no-op collectors: forward progress on unsupported
/// systems, with an empty core contribution.
pub fn select_collectors(kernel_name: &str) -> Vec<Box<dyn Collector>> {
    TOPICS
        .iter()
        .map(|entry| {
            match entry
                .variants
                .iter()
                .find(|(kernel, _)| *kernel == kernel_name)
            {
                Some((_, factory)) => factory(),
                None => {
                    debug!(kernel_name, topic = entry.topic, "no collector registered");
                    Box::new(NoopCollector::new(entry.topic)) as Box<dyn Collector>
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_linux_returns_all_topics() {
        let collectors = select_collectors("Linux");
        let topics: Vec<&str> = collectors.iter().map(|c| c.topic()).collect();
        assert_eq!(
            topics,
            vec![
                "platform",
                "hardware",
                "network",
                "virtualization",
                "selinux",
                "ssh_keys"
            ]
        );
    }

    #[test]
    fn test_unmatched_platform_is_noop_not_error() {
        let collectors = select_collectors("Plan9");
        assert_eq!(collectors.len(), 6);
        for collector in collectors {
            assert!(collector.collect().is_empty());
        }
    }

    #[test]
    fn test_selection_is_deterministic() {
        let a: Vec<&str> = select_collectors("Linux").iter().map(|c| c.topic()).collect();
        let b: Vec<&str> = select_collectors("Linux").iter().map(|c| c.topic()).collect();
        assert_eq!(a, b);
    }
}
