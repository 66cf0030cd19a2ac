//! Hardware facts: memory, CPU inventory, DMI identification.
//!
//! # Data Sources
//! - `/proc/meminfo` - memory and swap totals (reported in kB)
//! - `/proc/cpuinfo` - CPU models, logical processors, per-socket cores
//! - `/sys/devices/virtual/dmi/id/*` - vendor/firmware identification

use super::probe::{read_file, read_file_trimmed};
use super::selector::Collector;
use hf_common::{FactValue, Fragment};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Memory figures in megabytes.
///
/// The kernel reports kilobytes; the division by 1024 happens here, at the
/// parse boundary, exactly once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryFacts {
    pub memtotal_mb: Option<u64>,
    pub memfree_mb: Option<u64>,
    pub swaptotal_mb: Option<u64>,
    pub swapfree_mb: Option<u64>,
}

/// Parse meminfo content ("MemTotal:       16309804 kB" lines).
///
/// Unrecognized lines are skipped. Returns `None` when no known field was
/// found, so a garbled probe contributes nothing rather than zeros.
pub fn parse_meminfo_content(content: &str) -> Option<MemoryFacts> {
    let mut facts = MemoryFacts::default();
    let mut seen = false;

    for line in content.lines() {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        let Some(kb) = rest.split_whitespace().next().and_then(|v| v.parse::<u64>().ok()) else {
            continue;
        };
        let mb = kb / 1024;
        match key.trim() {
            "MemTotal" => facts.memtotal_mb = Some(mb),
            "MemFree" => facts.memfree_mb = Some(mb),
            "SwapTotal" => facts.swaptotal_mb = Some(mb),
            "SwapFree" => facts.swapfree_mb = Some(mb),
            _ => continue,
        }
        seen = true;
    }

    if seen {
        Some(facts)
    } else {
        None
    }
}

/// CPU inventory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuFacts {
    /// Model name per logical processor.
    pub models: Vec<String>,
    /// Physical socket count, or the logical count when the platform does
    /// not report socket ids.
    pub count: u64,
    /// Sum of per-socket declared core counts, or the logical count.
    pub cores: u64,
}

/// Parse cpuinfo content.
///
/// Physical-core accounting deduplicates by `physical id`: each distinct
/// socket contributes its declared `cpu cores` once. Platforms without
/// socket ids fall back to counting logical entries.
pub fn parse_cpuinfo_content(content: &str) -> Option<CpuFacts> {
    let mut models = Vec::new();
    let mut logical: u64 = 0;
    let mut sockets: BTreeMap<String, u64> = BTreeMap::new();
    let mut current_socket: Option<String> = None;

    for line in content.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        match key {
            "processor" => logical += 1,
            // "Processor" carries the model on some ARM kernels.
            "model name" | "Processor" => models.push(value.to_string()),
            "physical id" => current_socket = Some(value.to_string()),
            "cpu cores" => {
                if let (Some(id), Ok(cores)) = (current_socket.clone(), value.parse::<u64>()) {
                    sockets.insert(id, cores);
                }
            }
            _ => {}
        }
    }

    if logical == 0 && models.is_empty() {
        return None;
    }

    let (count, cores) = if sockets.is_empty() {
        (logical, logical)
    } else {
        (sockets.len() as u64, sockets.values().sum())
    };

    Some(CpuFacts { models, count, cores })
}

/// SMBIOS chassis type labels, indexed by type code (1-based).
const FORM_FACTORS: &[&str] = &[
    "Other",
    "Unknown",
    "Desktop",
    "Low Profile Desktop",
    "Pizza Box",
    "Mini Tower",
    "Tower",
    "Portable",
    "Laptop",
    "Notebook",
    "Hand Held",
    "Docking Station",
    "All In One",
    "Sub Notebook",
    "Space-saving",
    "Lunch Box",
    "Main Server Chassis",
    "Expansion Chassis",
    "Sub Chassis",
    "Bus Expansion Chassis",
    "Peripheral Chassis",
    "RAID Chassis",
    "Rack Mount Chassis",
    "Sealed-case PC",
    "Multi-system",
    "CompactPCI",
    "AdvancedTCA",
];

/// Map a chassis type code to its SMBIOS label.
pub fn form_factor_label(code: u64) -> String {
    let index = code as usize;
    if index >= 1 && index <= FORM_FACTORS.len() {
        FORM_FACTORS[index - 1].to_string()
    } else {
        format!("unknown ({})", code)
    }
}

/// DMI identification block from the fixed sysfs probe paths.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DmiFacts {
    pub form_factor: Option<String>,
    pub product_name: Option<String>,
    pub product_serial: Option<String>,
    pub product_uuid: Option<String>,
    pub product_version: Option<String>,
    pub system_vendor: Option<String>,
    pub bios_date: Option<String>,
    pub bios_version: Option<String>,
}

/// Hardware collector for Linux.
pub struct LinuxHardware {
    proc_root: PathBuf,
    sys_root: PathBuf,
}

impl LinuxHardware {
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

    fn read_dmi(&self) -> DmiFacts {
        let id = self.sys_root.join("devices/virtual/dmi/id");
        let attr = |name: &str| read_file_trimmed(id.join(name)).filter(|v| !v.is_empty());

        DmiFacts {
            form_factor: attr("chassis_type")
                .and_then(|v| v.parse::<u64>().ok())
                .map(form_factor_label),
            product_name: attr("product_name"),
            product_serial: attr("product_serial"),
            product_uuid: attr("product_uuid"),
            product_version: attr("product_version"),
            system_vendor: attr("sys_vendor"),
            bios_date: attr("bios_date"),
            bios_version: attr("bios_version"),
        }
    }
}

impl Default for LinuxHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for LinuxHardware {
    fn topic(&self) -> &'static str {
        "hardware"
    }

    fn collect(&self) -> Fragment {
        let mut fragment = Fragment::new();

        if let Some(memory) =
            read_file(self.proc_root.join("meminfo")).and_then(|c| parse_meminfo_content(&c))
        {
            let mut put = |key: &str, value: Option<u64>| {
                if let Some(v) = value {
                    fragment.insert(key.to_string(), v.into());
                }
            };
            put("memtotal_mb", memory.memtotal_mb);
            put("memfree_mb", memory.memfree_mb);
            put("swaptotal_mb", memory.swaptotal_mb);
            put("swapfree_mb", memory.swapfree_mb);
        }

        if let Some(cpu) =
            read_file(self.proc_root.join("cpuinfo")).and_then(|c| parse_cpuinfo_content(&c))
        {
            fragment.insert("processor".into(), cpu.models.into());
            fragment.insert("processor_count".into(), cpu.count.into());
            fragment.insert("processor_cores".into(), cpu.cores.into());
        }

        let dmi = self.read_dmi();
        let mut put = |key: &str, value: Option<String>| {
            if let Some(v) = value {
                fragment.insert(key.to_string(), FactValue::Str(v));
            }
        };
        put("form_factor", dmi.form_factor);
        put("product_name", dmi.product_name);
        put("product_serial", dmi.product_serial);
        put("product_uuid", dmi.product_uuid);
        put("product_version", dmi.product_version);
        put("system_vendor", dmi.system_vendor);
        put("bios_date", dmi.bios_date);
        put("bios_version", dmi.bios_version);

        fragment
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEMINFO: &str = "MemTotal:       16309804 kB\nMemFree:         8123456 kB\nBuffers:          512000 kB\nSwapTotal:       2097148 kB\nSwapFree:        2097148 kB\n";

    #[test]
    fn test_parse_meminfo_content() {
        let facts = parse_meminfo_content(MEMINFO).unwrap();
        assert_eq!(facts.memtotal_mb, Some(16309804 / 1024));
        assert_eq!(facts.memfree_mb, Some(8123456 / 1024));
        assert_eq!(facts.swaptotal_mb, Some(2097148 / 1024));
        assert_eq!(facts.swapfree_mb, Some(2097148 / 1024));
    }

    #[test]
    fn test_meminfo_mb_within_one_rounding_unit() {
        let facts = parse_meminfo_content(MEMINFO).unwrap();
        let mb = facts.memtotal_mb.unwrap();
        assert!(16309804 - mb * 1024 < 1024);
    }

    #[test]
    fn test_parse_meminfo_garbage_is_none() {
        assert!(parse_meminfo_content("no colons here\njust noise\n").is_none());
        assert!(parse_meminfo_content("MemTotal: not-a-number kB\n").is_none());
    }

    #[test]
    fn test_parse_cpuinfo_dedupes_physical_ids() {
        // Two sockets, four cores each, hyperthreaded to 16 logical CPUs:
        // cpuinfo repeats each socket's entry per logical processor.
        let mut content = String::new();
        for processor in 0..16 {
            let socket = processor / 8;
            content.push_str(&format!(
                "processor\t: {}\nmodel name\t: Intel(R) Xeon(R) E5-2609\nphysical id\t: {}\ncpu cores\t: 4\n\n",
                processor, socket
            ));
        }

        let cpu = parse_cpuinfo_content(&content).unwrap();
        assert_eq!(cpu.count, 2);
        assert_eq!(cpu.cores, 8);
        assert_eq!(cpu.models.len(), 16);
    }

    #[test]
    fn test_parse_cpuinfo_distinct_core_counts_sum() {
        let content = "processor: 0\nphysical id: 0\ncpu cores: 2\nprocessor: 1\nphysical id: 1\ncpu cores: 6\n";
        let cpu = parse_cpuinfo_content(content).unwrap();
        assert_eq!(cpu.count, 2);
        assert_eq!(cpu.cores, 8);
    }

    #[test]
    fn test_parse_cpuinfo_no_physical_ids_falls_back_to_logical() {
        let content =
            "processor\t: 0\nmodel name\t: ARMv7 Processor rev 4 (v7l)\nprocessor\t: 1\nmodel name\t: ARMv7 Processor rev 4 (v7l)\n";
        let cpu = parse_cpuinfo_content(content).unwrap();
        assert_eq!(cpu.count, 2);
        assert_eq!(cpu.cores, 2);
    }

    #[test]
    fn test_parse_cpuinfo_empty_is_none() {
        assert!(parse_cpuinfo_content("").is_none());
    }

    #[test]
    fn test_form_factor_label() {
        assert_eq!(form_factor_label(3), "Desktop");
        assert_eq!(form_factor_label(23), "Rack Mount Chassis");
        assert_eq!(form_factor_label(99), "unknown (99)");
        assert_eq!(form_factor_label(0), "unknown (0)");
    }

    #[test]
    fn test_collector_with_fixture_roots() {
        let dir = tempfile::tempdir().unwrap();
        let proc_root = dir.path().join("proc");
        let sys_root = dir.path().join("sys");
        std::fs::create_dir_all(&proc_root).unwrap();
        let dmi = sys_root.join("devices/virtual/dmi/id");
        std::fs::create_dir_all(&dmi).unwrap();

        std::fs::write(proc_root.join("meminfo"), MEMINFO).unwrap();
        std::fs::write(
            proc_root.join("cpuinfo"),
            "processor: 0\nmodel name: QEMU Virtual CPU\n",
        )
        .unwrap();
        std::fs::write(dmi.join("chassis_type"), "1\n").unwrap();
        std::fs::write(dmi.join("product_name"), "KVM\n").unwrap();
        std::fs::write(dmi.join("bios_version"), "1.16.2\n").unwrap();

        let fragment = LinuxHardware::with_roots(&proc_root, &sys_root).collect();
        assert_eq!(
            fragment.get("memtotal_mb").unwrap().as_int(),
            Some((16309804 / 1024) as i64)
        );
        assert_eq!(fragment.get("processor_count").unwrap().as_int(), Some(1));
        assert_eq!(fragment.get("form_factor").unwrap().as_str(), Some("Other"));
        assert_eq!(fragment.get("product_name").unwrap().as_str(), Some("KVM"));
        assert!(!fragment.contains_key("product_serial"));
    }

    #[test]
    fn test_collector_absent_probes_omit_keys() {
        let dir = tempfile::tempdir().unwrap();
        let fragment =
            LinuxHardware::with_roots(dir.path().join("proc"), dir.path().join("sys")).collect();
        assert!(fragment.is_empty());
    }
}
