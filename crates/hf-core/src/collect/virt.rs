//! Virtualization detection.
//!
//! Derives {technology, role, optional container label} from a
//! priority-ordered chain of signals. The first matching signal wins and
//! later signals are not consulted:
//! 1. `/proc/vz` (OpenVZ; host when `/proc/bc` is present)
//! 2. `/proc/xen` (Xen; host when `capabilities` lists `control_d`)
//! 3. DMI product name (VMware, VirtualBox, KVM/QEMU/Bochs, RHEV, Parallels)
//! 4. DMI vendor strings (Microsoft, innotek, Xen, QEMU)
//! 5. Loaded kernel modules from `/proc/modules`

use super::probe::{path_exists, read_file, read_file_trimmed};
use super::selector::Collector;
use hf_common::Fragment;
use std::path::PathBuf;

/// Whether the machine hosts guests or is one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VirtRole {
    Host,
    Guest,
}

impl VirtRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            VirtRole::Host => "host",
            VirtRole::Guest => "guest",
        }
    }
}

/// A matched virtualization signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtGuess {
    pub technology: &'static str,
    pub role: VirtRole,
}

impl VirtGuess {
    fn guest(technology: &'static str) -> Self {
        Self {
            technology,
            role: VirtRole::Guest,
        }
    }

    fn host(technology: &'static str) -> Self {
        Self {
            technology,
            role: VirtRole::Host,
        }
    }
}

/// Match a DMI product name against known hypervisor self-identification.
pub fn guess_from_product_name(product_name: &str) -> Option<VirtGuess> {
    if product_name.starts_with("VMware") {
        Some(VirtGuess::guest("VMware"))
    } else if product_name.contains("VirtualBox") {
        Some(VirtGuess::guest("virtualbox"))
    } else if product_name.contains("KVM")
        || product_name.contains("QEMU")
        || product_name.contains("Bochs")
    {
        Some(VirtGuess::guest("kvm"))
    } else if product_name.contains("RHEV Hypervisor") {
        Some(VirtGuess::guest("RHEV"))
    } else if product_name.contains("Parallels") {
        Some(VirtGuess::guest("parallels"))
    } else {
        None
    }
}

/// Match a DMI system vendor against known hypervisor vendors.
pub fn guess_from_vendor(vendor: &str) -> Option<VirtGuess> {
    if vendor.contains("Microsoft Corporation") {
        Some(VirtGuess::guest("VirtualPC"))
    } else if vendor.contains("innotek GmbH") {
        Some(VirtGuess::guest("virtualbox"))
    } else if vendor.contains("QEMU") {
        Some(VirtGuess::guest("kvm"))
    } else if vendor.contains("Xen") {
        Some(VirtGuess::guest("xen"))
    } else {
        None
    }
}

/// Extract loaded module names from `/proc/modules` (first token per line).
pub fn parse_modules_content(content: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .map(|name| name.to_string())
        .collect()
}

/// Match loaded module names against hypervisor components.
pub fn guess_from_modules(modules: &[String]) -> Option<VirtGuess> {
    for module in modules {
        match module.as_str() {
            "kvm" => return Some(VirtGuess::host("kvm")),
            "vboxdrv" => return Some(VirtGuess::host("virtualbox")),
            "vboxguest" => return Some(VirtGuess::guest("virtualbox")),
            _ => {}
        }
    }
    None
}

/// Container detection from cgroup path patterns (`/proc/1/cgroup`).
pub fn detect_container_from_cgroup_content(content: &str) -> Option<&'static str> {
    if content.contains("/docker/") || content.contains("/docker-") {
        Some("docker")
    } else if content.contains("/kubepods") {
        Some("kubernetes")
    } else if content.contains("/libpod-") || content.contains("/podman/") {
        Some("podman")
    } else if content.contains("/lxc/") || content.contains("/lxc.payload") {
        Some("lxc")
    } else if content.contains("/containerd") {
        Some("containerd")
    } else {
        None
    }
}

/// Virtualization collector for Linux.
pub struct LinuxVirtualization {
    proc_root: PathBuf,
    sys_root: PathBuf,
}

impl LinuxVirtualization {
    pub fn new() -> Self {
        Self {
            proc_root: PathBuf::from("/proc"),
            sys_root: PathBuf::from("/sys"),
        }
    }

    /// Rooted construction for tests with fixture trees.
    pub fn with_roots(proc_root: impl Into<PathBuf>, sys_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
            sys_root: sys_root.into(),
        }
    }

    /// Walk the signal chain; the first match wins.
    fn detect(&self) -> Option<VirtGuess> {
        if path_exists(self.proc_root.join("vz")) {
            return Some(if path_exists(self.proc_root.join("bc")) {
                VirtGuess::host("openvz")
            } else {
                VirtGuess::guest("openvz")
            });
        }

        if path_exists(self.proc_root.join("xen")) {
            let is_dom0 = read_file(self.proc_root.join("xen/capabilities"))
                .map(|caps| caps.contains("control_d"))
                .unwrap_or(false);
            return Some(if is_dom0 {
                VirtGuess::host("xen")
            } else {
                VirtGuess::guest("xen")
            });
        }

        let dmi = self.sys_root.join("devices/virtual/dmi/id");
        if let Some(guess) =
            read_file_trimmed(dmi.join("product_name")).and_then(|p| guess_from_product_name(&p))
        {
            return Some(guess);
        }
        if let Some(guess) =
            read_file_trimmed(dmi.join("sys_vendor")).and_then(|v| guess_from_vendor(&v))
        {
            return Some(guess);
        }
        if let Some(guess) =
            read_file_trimmed(dmi.join("bios_vendor")).and_then(|v| guess_from_vendor(&v))
        {
            return Some(guess);
        }

        if let Some(modules) = read_file(self.proc_root.join("modules")) {
            if let Some(guess) = guess_from_modules(&parse_modules_content(&modules)) {
                return Some(guess);
            }
        }

        None
    }
}

impl Default for LinuxVirtualization {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for LinuxVirtualization {
    fn topic(&self) -> &'static str {
        "virtualization"
    }

    fn collect(&self) -> Fragment {
        let mut fragment = Fragment::new();

        if let Some(guess) = self.detect() {
            fragment.insert("virtualization_type".into(), guess.technology.into());
            fragment.insert("virtualization_role".into(), guess.role.as_str().into());
        }

        if let Some(container) = read_file(self.proc_root.join("1/cgroup"))
            .as_deref()
            .and_then(detect_container_from_cgroup_content)
        {
            fragment.insert("container".into(), container.into());
        }

        fragment
    }
}
