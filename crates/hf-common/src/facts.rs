//! Fact values and the fact namespace.
//!
//! A fact is one named, typed piece of information describing the host.
//! Collectors produce unprefixed [`Fragment`]s; the aggregator merges them
//! into one flat [`FactNamespace`] under a source prefix. Merge order is
//! deterministic: within a layer the last writer wins, and overlay layers
//! can shadow core facts only through their own distinct prefix.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single typed fact value.
///
/// Serializes as the plain JSON value (no tagging), so the final fact
/// document is an ordinary flat JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FactValue {
    /// Boolean flag (e.g. SELinux absent entirely).
    Bool(bool),
    /// Integer quantity (memory megabytes, MTU, counts).
    Int(i64),
    /// Plain string.
    Str(String),
    /// List of values. Core facts put only strings here, except the
    /// per-interface IPv6 records which are a list of address maps.
    List(Vec<FactValue>),
    /// Nested mapping (interface records, default routes, SELinux block).
    Map(BTreeMap<String, FactValue>),
}

impl FactValue {
    /// View the value as a string, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FactValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// View the value as an integer, if it is one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            FactValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// View the value as a nested map, if it is one.
    pub fn as_map(&self) -> Option<&BTreeMap<String, FactValue>> {
        match self {
            FactValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Convert a parsed JSON value into a fact value.
    ///
    /// Returns `None` for JSON null (a fact is never null; the key is
    /// omitted instead). Numbers that do not fit an `i64` are kept as
    /// their decimal string form rather than losing precision.
    pub fn from_json(value: serde_json::Value) -> Option<FactValue> {
        match value {
            serde_json::Value::Null => None,
            serde_json::Value::Bool(b) => Some(FactValue::Bool(b)),
            serde_json::Value::Number(n) => Some(match n.as_i64() {
                Some(i) => FactValue::Int(i),
                None => FactValue::Str(n.to_string()),
            }),
            serde_json::Value::String(s) => Some(FactValue::Str(s)),
            serde_json::Value::Array(items) => Some(FactValue::List(
                items.into_iter().filter_map(FactValue::from_json).collect(),
            )),
            serde_json::Value::Object(map) => Some(FactValue::Map(
                map.into_iter()
                    .filter_map(|(k, v)| FactValue::from_json(v).map(|fv| (k, fv)))
                    .collect(),
            )),
        }
    }
}

impl From<&str> for FactValue {
    fn from(s: &str) -> Self {
        FactValue::Str(s.to_string())
    }
}

impl From<String> for FactValue {
    fn from(s: String) -> Self {
        FactValue::Str(s)
    }
}

impl From<i64> for FactValue {
    fn from(i: i64) -> Self {
        FactValue::Int(i)
    }
}

impl From<u64> for FactValue {
    fn from(i: u64) -> Self {
        // Fact quantities (megabytes, MTUs, counts) are far below i64::MAX.
        FactValue::Int(i as i64)
    }
}

impl From<bool> for FactValue {
    fn from(b: bool) -> Self {
        FactValue::Bool(b)
    }
}

impl From<Vec<String>> for FactValue {
    fn from(items: Vec<String>) -> Self {
        FactValue::List(items.into_iter().map(FactValue::Str).collect())
    }
}

impl From<BTreeMap<String, FactValue>> for FactValue {
    fn from(map: BTreeMap<String, FactValue>) -> Self {
        FactValue::Map(map)
    }
}

/// One collector's contribution: unprefixed keys to fact values.
pub type Fragment = BTreeMap<String, FactValue>;

/// The flat fact namespace handed to the reporting collaborator.
///
/// Field order is irrelevant; keys sort for deterministic output. The
/// namespace is built fresh on every collection run and is immutable once
/// handed off.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FactNamespace {
    facts: BTreeMap<String, FactValue>,
}

impl FactNamespace {
    /// Create an empty namespace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one fact. Within a layer the last writer wins.
    pub fn insert(&mut self, key: impl Into<String>, value: FactValue) {
        self.facts.insert(key.into(), value);
    }

    /// Merge a collector fragment under a source prefix.
    ///
    /// Every fragment key `k` lands as `<prefix>_<k>`. Collisions resolve
    /// last-writer-wins in merge order, which the aggregator fixes to
    /// collector-declaration order.
    pub fn merge_fragment(&mut self, prefix: &str, fragment: Fragment) {
        for (key, value) in fragment {
            self.facts.insert(format!("{}_{}", prefix, key), value);
        }
    }

    /// Look up a fact by its full (prefixed) key.
    pub fn get(&self, key: &str) -> Option<&FactValue> {
        self.facts.get(key)
    }

    /// Whether a fact with this full key exists.
    pub fn contains_key(&self, key: &str) -> bool {
        self.facts.contains_key(key)
    }

    /// Number of facts in the namespace.
    pub fn len(&self) -> usize {
        self.facts.len()
    }

    /// Whether the namespace is empty.
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Iterate facts in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &FactValue)> {
        self.facts.iter()
    }

    /// Keys matching a prefix, in order. Used by tests and diagnostics.
    pub fn keys_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a String> {
        self.facts.keys().filter(move |k| k.starts_with(prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fact_value_serializes_untagged() {
        assert_eq!(
            serde_json::to_string(&FactValue::Str("x86_64".into())).unwrap(),
            r#""x86_64""#
        );
        assert_eq!(serde_json::to_string(&FactValue::Int(1500)).unwrap(), "1500");
        assert_eq!(serde_json::to_string(&FactValue::Bool(false)).unwrap(), "false");

        let list = FactValue::from(vec!["10.0.0.1".to_string(), "10.0.0.2".to_string()]);
        assert_eq!(
            serde_json::to_string(&list).unwrap(),
            r#"["10.0.0.1","10.0.0.2"]"#
        );
    }

    #[test]
    fn test_from_json_scalars() {
        assert_eq!(
            FactValue::from_json(serde_json::json!("jammy")),
            Some(FactValue::Str("jammy".into()))
        );
        assert_eq!(
            FactValue::from_json(serde_json::json!(4)),
            Some(FactValue::Int(4))
        );
        assert_eq!(
            FactValue::from_json(serde_json::json!(true)),
            Some(FactValue::Bool(true))
        );
        assert_eq!(FactValue::from_json(serde_json::Value::Null), None);
    }

    #[test]
    fn test_from_json_nested() {
        let value = serde_json::json!({"kernel": {"release": "6.1.0"}, "cpus": [1, 2]});
        let fv = FactValue::from_json(value).unwrap();
        let map = fv.as_map().unwrap();
        assert!(matches!(map.get("kernel"), Some(FactValue::Map(_))));
        assert!(matches!(map.get("cpus"), Some(FactValue::List(_))));
    }

    #[test]
    fn test_merge_fragment_prefixes_keys() {
        let mut ns = FactNamespace::new();
        let mut fragment = Fragment::new();
        fragment.insert("kernel".into(), "Linux".into());
        fragment.insert("memtotal_mb".into(), FactValue::Int(15927));

        ns.merge_fragment("host", fragment);

        assert_eq!(ns.get("host_kernel").unwrap().as_str(), Some("Linux"));
        assert_eq!(ns.get("host_memtotal_mb").unwrap().as_int(), Some(15927));
        assert!(ns.get("kernel").is_none());
    }

    #[test]
    fn test_merge_last_writer_wins() {
        let mut ns = FactNamespace::new();

        let mut first = Fragment::new();
        first.insert("architecture".into(), "i686".into());
        ns.merge_fragment("host", first);

        let mut second = Fragment::new();
        second.insert("architecture".into(), "i386".into());
        ns.merge_fragment("host", second);

        assert_eq!(ns.get("host_architecture").unwrap().as_str(), Some("i386"));
        assert_eq!(ns.len(), 1);
    }

    #[test]
    fn test_overlay_prefix_never_shadows_core_key_in_place() {
        let mut ns = FactNamespace::new();
        let mut core = Fragment::new();
        core.insert("hostname".into(), "db01".into());
        ns.merge_fragment("host", core);

        // An overlay reporting the same bare key lands under its own prefix.
        ns.insert("facter_hostname", "db01.example.com".into());

        assert_eq!(ns.get("host_hostname").unwrap().as_str(), Some("db01"));
        assert_eq!(
            ns.get("facter_hostname").unwrap().as_str(),
            Some("db01.example.com")
        );
    }

    #[test]
    fn test_namespace_round_trips_as_flat_json() {
        let mut ns = FactNamespace::new();
        ns.insert("host_kernel", "Linux".into());
        ns.insert("host_processor_count", FactValue::Int(2));

        let json = serde_json::to_string(&ns).unwrap();
        assert_eq!(json, r#"{"host_kernel":"Linux","host_processor_count":2}"#);

        let back: FactNamespace = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ns);
    }
}
