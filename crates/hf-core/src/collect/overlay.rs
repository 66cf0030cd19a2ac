//! Overlay sources: third-party inventory tools merged on top.
//!
//! After core aggregation, up to two external tools contribute facts under
//! their own key prefix. `ohai` admits all top-level keys; `facter` admits
//! only string-typed top-level values and discards nested structures (a
//! bounded feature, not a defect). An absent tool, a non-zero exit, or
//! malformed JSON silently omits that overlay; it never interrupts the
//! collection.

use super::probe::CommandProbe;
use hf_common::{FactNamespace, FactValue};
use std::time::Duration;
use tracing::debug;

/// Inventory tools take noticeably longer than single-source probes.
const OVERLAY_TIMEOUT_SECS: u64 = 30;

/// One overlay tool registration.
#[derive(Debug, Clone)]
pub struct OverlaySpec {
    /// Tool name, for logs.
    pub name: &'static str,
    /// Key prefix for the merged facts.
    pub prefix: &'static str,
    /// Command to invoke.
    pub command: &'static str,
    /// Arguments to pass.
    pub args: &'static [&'static str],
    /// Admit only string-typed top-level values.
    pub strings_only: bool,
}

/// The supported overlay tools, in merge order.
pub const OVERLAYS: &[OverlaySpec] = &[
    OverlaySpec {
        name: "facter",
        prefix: "facter",
        command: "facter",
        args: &["--json"],
        strings_only: true,
    },
    OverlaySpec {
        name: "ohai",
        prefix: "ohai",
        command: "ohai",
        args: &[],
        strings_only: false,
    },
];

/// Merge one overlay tool's captured output into the namespace.
///
/// Returns whether anything was merged. Malformed or non-object JSON
/// leaves the namespace untouched.
pub fn apply_overlay_output(
    namespace: &mut FactNamespace,
    spec: &OverlaySpec,
    stdout: &str,
) -> bool {
    let document: serde_json::Value = match serde_json::from_str(stdout) {
        Ok(value) => value,
        Err(e) => {
            debug!(tool = spec.name, error = %e, "overlay output is not valid JSON; skipping");
            return false;
        }
    };

    let serde_json::Value::Object(entries) = document else {
        debug!(tool = spec.name, "overlay output is not a JSON object; skipping");
        return false;
    };

    let mut merged = false;
    for (key, value) in entries {
        if spec.strings_only && !value.is_string() {
            continue;
        }
        if let Some(fact) = FactValue::from_json(value) {
            namespace.insert(format!("{}_{}", spec.prefix, key), fact);
            merged = true;
        }
    }
    merged
}

/// Run every registered overlay tool and merge whatever succeeds.
pub fn merge_overlays(namespace: &mut FactNamespace) {
    let probe = CommandProbe::with_timeout(Duration::from_secs(OVERLAY_TIMEOUT_SECS));

    for spec in OVERLAYS {
        let Some(output) = probe.run(spec.command, spec.args) else {
            debug!(tool = spec.name, "overlay tool absent");
            continue;
        };
        if !output.success() {
            debug!(
                tool = spec.name,
                exit_code = ?output.exit_code,
                "overlay tool failed; treating as absent"
            );
            continue;
        }
        apply_overlay_output(namespace, spec, &output.stdout);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facter_spec() -> &'static OverlaySpec {
        &OVERLAYS[0]
    }

    fn ohai_spec() -> &'static OverlaySpec {
        &OVERLAYS[1]
    }

    #[test]
    fn test_facter_admits_only_strings() {
        let mut ns = FactNamespace::new();
        let stdout = r#"{"operatingsystem": "Ubuntu", "processorcount": 4, "interfaces": {"eth0": {}}}"#;

        assert!(apply_overlay_output(&mut ns, facter_spec(), stdout));
        assert_eq!(
            ns.get("facter_operatingsystem").unwrap().as_str(),
            Some("Ubuntu")
        );
        assert!(ns.get("facter_processorcount").is_none());
        assert!(ns.get("facter_interfaces").is_none());
    }

    #[test]
    fn test_ohai_admits_all_top_level_keys() {
        let mut ns = FactNamespace::new();
        let stdout = r#"{"platform": "ubuntu", "cpu": {"total": 4}, "uptime_seconds": 12345}"#;

        assert!(apply_overlay_output(&mut ns, ohai_spec(), stdout));
        assert_eq!(ns.get("ohai_platform").unwrap().as_str(), Some("ubuntu"));
        assert_eq!(ns.get("ohai_uptime_seconds").unwrap().as_int(), Some(12345));
        assert!(matches!(ns.get("ohai_cpu"), Some(FactValue::Map(_))));
    }

    #[test]
    fn test_malformed_json_leaves_namespace_unchanged() {
        let mut ns = FactNamespace::new();
        ns.insert("host_kernel", "Linux".into());
        let before = ns.clone();

        assert!(!apply_overlay_output(&mut ns, facter_spec(), "not json {{{"));
        assert!(!apply_overlay_output(&mut ns, ohai_spec(), r#"["an", "array"]"#));
        assert_eq!(ns, before);
    }

    #[test]
    fn test_overlay_never_touches_core_prefix() {
        let mut ns = FactNamespace::new();
        ns.insert("host_hostname", "db01".into());

        let stdout = r#"{"hostname": "other-name"}"#;
        apply_overlay_output(&mut ns, facter_spec(), stdout);

        assert_eq!(ns.get("host_hostname").unwrap().as_str(), Some("db01"));
        assert_eq!(
            ns.get("facter_hostname").unwrap().as_str(),
            Some("other-name")
        );
    }
}
