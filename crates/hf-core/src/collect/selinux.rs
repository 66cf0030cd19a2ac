//! Security module (SELinux) facts.
//!
//! # Data Sources
//! - `/sys/fs/selinux/enforce` - current enforcement (1/0)
//! - `/sys/fs/selinux/policyvers` - loaded policy version
//! - `/etc/selinux/config` - configured mode and policy type
//!
//! Every field degrades independently: an unreadable enforce file does not
//! abort the rest of the snapshot. Fields are `Option` internally; the
//! "unknown" sentinel exists only at the serialization boundary, so
//! internal logic never mistakes a sentinel for real data.

use super::probe::{path_exists, read_file, read_file_trimmed};
use super::selector::Collector;
use hf_common::{FactValue, Fragment};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// SELinux enforcement mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelinuxMode {
    Enforcing,
    Permissive,
    Disabled,
}

impl SelinuxMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelinuxMode::Enforcing => "enforcing",
            SelinuxMode::Permissive => "permissive",
            SelinuxMode::Disabled => "disabled",
        }
    }

    /// Parse a config-file mode value.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "enforcing" => Some(SelinuxMode::Enforcing),
            "permissive" => Some(SelinuxMode::Permissive),
            "disabled" => Some(SelinuxMode::Disabled),
            _ => None,
        }
    }
}

/// The security-module snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelinuxSnapshot {
    /// Whether the subsystem is present at all.
    pub present: bool,
    /// Whether it is enabled in the running kernel.
    pub enabled: Option<bool>,
    /// Current enforcement mode.
    pub mode: Option<SelinuxMode>,
    /// Mode configured for next boot.
    pub config_mode: Option<SelinuxMode>,
    /// Configured policy type (e.g. "targeted").
    pub policy_type: Option<String>,
    /// Loaded policy version.
    pub policy_version: Option<u32>,
}

/// Parse `/etc/selinux/config` (`SELINUX=` and `SELINUXTYPE=` keys).
///
/// Comments and unrecognized lines are skipped.
pub fn parse_selinux_config_content(content: &str) -> (Option<SelinuxMode>, Option<String>) {
    let mut config_mode = None;
    let mut policy_type = None;

    for line in content.lines() {
        let line = line.trim();
        if line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        match key.trim() {
            "SELINUX" => config_mode = SelinuxMode::parse(value),
            "SELINUXTYPE" => {
                let value = value.trim();
                if !value.is_empty() {
                    policy_type = Some(value.to_string());
                }
            }
            _ => {}
        }
    }

    (config_mode, policy_type)
}

/// SELinux collector for Linux.
pub struct LinuxSelinux {
    etc_root: PathBuf,
    sys_root: PathBuf,
}

impl LinuxSelinux {
    pub fn new() -> Self {
        Self {
            etc_root: PathBuf::from("/etc"),
            sys_root: PathBuf::from("/sys"),
        }
    }

    /// Rooted construction for tests with fixture trees.
    pub fn with_roots(etc_root: impl Into<PathBuf>, sys_root: impl Into<PathBuf>) -> Self {
        Self {
            etc_root: etc_root.into(),
            sys_root: sys_root.into(),
        }
    }

    /// Take the snapshot. Each field falls back to absent on its own.
    pub fn snapshot(&self) -> SelinuxSnapshot {
        let selinuxfs = self.sys_root.join("fs/selinux");
        let config_path = self.etc_root.join("selinux/config");

        let fs_present = path_exists(&selinuxfs);
        let config = read_file(&config_path);
        let present = fs_present || config.is_some();
        if !present {
            return SelinuxSnapshot::default();
        }

        let (config_mode, policy_type) = config
            .as_deref()
            .map(parse_selinux_config_content)
            .unwrap_or((None, None));

        let mode = read_file_trimmed(selinuxfs.join("enforce")).and_then(|v| match v.as_str() {
            "1" => Some(SelinuxMode::Enforcing),
            "0" => Some(SelinuxMode::Permissive),
            _ => None,
        });

        SelinuxSnapshot {
            present,
            enabled: Some(fs_present),
            mode,
            config_mode,
            policy_type,
            policy_version: read_file_trimmed(selinuxfs.join("policyvers"))
                .and_then(|v| v.parse().ok()),
        }
    }
}

impl Default for LinuxSelinux {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for LinuxSelinux {
    fn topic(&self) -> &'static str {
        "selinux"
    }

    fn collect(&self) -> Fragment {
        let snapshot = self.snapshot();
        let mut fragment = Fragment::new();

        if !snapshot.present {
            // Matches the observable output of hosts without the subsystem.
            fragment.insert("selinux".into(), FactValue::Bool(false));
            return fragment;
        }

        // Serialization boundary: absent fields become the "unknown"
        // sentinel here and nowhere else.
        let unknown = || FactValue::Str("unknown".to_string());
        let mut map = BTreeMap::new();
        map.insert(
            "status".to_string(),
            snapshot
                .enabled
                .map(|e| {
                    let status = if e { "enabled" } else { "disabled" };
                    FactValue::Str(status.to_string())
                })
                .unwrap_or_else(unknown),
        );
        map.insert(
            "mode".to_string(),
            snapshot
                .mode
                .map(|m| m.as_str().into())
                .unwrap_or_else(unknown),
        );
        map.insert(
            "config_mode".to_string(),
            snapshot
                .config_mode
                .map(|m| m.as_str().into())
                .unwrap_or_else(unknown),
        );
        map.insert(
            "type".to_string(),
            snapshot
                .policy_type
                .map(FactValue::Str)
                .unwrap_or_else(unknown),
        );
        map.insert(
            "policy_version".to_string(),
            snapshot
                .policy_version
                .map(|v| FactValue::Int(i64::from(v)))
                .unwrap_or_else(unknown),
        );

        fragment.insert("selinux".into(), FactValue::Map(map));
        fragment
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = "\
# This file controls the state of SELinux on the system.
SELINUX=enforcing
SELINUXTYPE=targeted
";

    #[test]
    fn test_parse_selinux_config_content() {
        let (mode, policy_type) = parse_selinux_config_content(CONFIG);
        assert_eq!(mode, Some(SelinuxMode::Enforcing));
        assert_eq!(policy_type.as_deref(), Some("targeted"));
    }

    #[test]
    fn test_parse_selinux_config_garbage() {
        let (mode, policy_type) = parse_selinux_config_content("# nothing here\nnoise\n");
        assert_eq!(mode, None);
        assert_eq!(policy_type, None);
    }

    #[test]
    fn test_absent_subsystem_reports_false() {
        let dir = tempfile::tempdir().unwrap();
        let collector = LinuxSelinux::with_roots(dir.path().join("etc"), dir.path().join("sys"));
        let fragment = collector.collect();
        assert_eq!(fragment.get("selinux"), Some(&FactValue::Bool(false)));
    }

    #[test]
    fn test_full_snapshot_from_fixture() {
        let dir = tempfile::tempdir().unwrap();
        let etc = dir.path().join("etc");
        let sys = dir.path().join("sys");
        std::fs::create_dir_all(etc.join("selinux")).unwrap();
        std::fs::create_dir_all(sys.join("fs/selinux")).unwrap();
        std::fs::write(etc.join("selinux/config"), CONFIG).unwrap();
        std::fs::write(sys.join("fs/selinux/enforce"), "1\n").unwrap();
        std::fs::write(sys.join("fs/selinux/policyvers"), "33\n").unwrap();

        let snapshot = LinuxSelinux::with_roots(&etc, &sys).snapshot();
        assert!(snapshot.present);
        assert_eq!(snapshot.enabled, Some(true));
        assert_eq!(snapshot.mode, Some(SelinuxMode::Enforcing));
        assert_eq!(snapshot.config_mode, Some(SelinuxMode::Enforcing));
        assert_eq!(snapshot.policy_type.as_deref(), Some("targeted"));
        assert_eq!(snapshot.policy_version, Some(33));
    }

    #[test]
    fn test_field_failure_degrades_to_unknown_at_boundary() {
        // selinuxfs present but unreadable fields: the snapshot keeps
        // Options, the fragment carries sentinels.
        let dir = tempfile::tempdir().unwrap();
        let etc = dir.path().join("etc");
        let sys = dir.path().join("sys");
        std::fs::create_dir_all(sys.join("fs/selinux")).unwrap();

        let collector = LinuxSelinux::with_roots(&etc, &sys);
        let snapshot = collector.snapshot();
        assert!(snapshot.present);
        assert_eq!(snapshot.mode, None);

        let fragment = collector.collect();
        let map = fragment.get("selinux").unwrap().as_map().unwrap();
        assert_eq!(map.get("status").unwrap().as_str(), Some("enabled"));
        assert_eq!(map.get("mode").unwrap().as_str(), Some("unknown"));
        assert_eq!(map.get("type").unwrap().as_str(), Some("unknown"));
    }
}
