//! The aggregator: one collection pass over all selected collectors.
//!
//! Collectors run in declaration order and their fragments merge into one
//! namespace under the core prefix; name collisions resolve
//! last-writer-wins in that order. Probe-level absence never raises. The
//! only hard failure is a malformed fragment, which indicates a defect in
//! the collection logic itself rather than an unusual environment.

use super::overlay;
use super::platform;
use super::selector::{select_collectors, Collector};
use hf_common::{Error, FactNamespace, Fragment, Result};
use tracing::{debug, info};

/// Key prefix for core facts.
pub const CORE_PREFIX: &str = "host";

/// Runs one collection pass and owns the merge result until hand-off.
pub struct Aggregator {
    kernel: String,
    collectors: Vec<Box<dyn Collector>>,
    overlays: bool,
}

impl Aggregator {
    /// Build for the running platform, as reported by `uname`.
    pub fn for_current_platform() -> Self {
        let kernel = platform::uname()
            .map(|info| info.sysname)
            .unwrap_or_default();
        Self::for_platform(&kernel)
    }

    /// Build for an explicitly named platform. This is the testable seam:
    /// selection by identifier, no hidden dispatch at construction time.
    pub fn for_platform(kernel: &str) -> Self {
        Self {
            kernel: kernel.to_string(),
            collectors: select_collectors(kernel),
            overlays: true,
        }
    }

    /// Skip the overlay tools for this run.
    pub fn without_overlays(mut self) -> Self {
        self.overlays = false;
        self
    }

    /// Run the collection pass.
    ///
    /// Always returns a best-effort namespace on probe-level absence;
    /// errors only on a malformed fragment (a collection-logic defect).
    pub fn collect(&self) -> Result<FactNamespace> {
        let mut namespace = FactNamespace::new();

        for collector in &self.collectors {
            let fragment = collector.collect();
            validate_fragment(collector.topic(), &fragment)?;
            debug!(
                topic = collector.topic(),
                keys = fragment.len(),
                "collector finished"
            );
            namespace.merge_fragment(CORE_PREFIX, fragment);
        }

        if self.overlays {
            overlay::merge_overlays(&mut namespace);
        }

        info!(
            kernel = %self.kernel,
            facts = namespace.len(),
            "collection pass complete"
        );
        Ok(namespace)
    }
}

/// Reject fragments that would corrupt the namespace.
///
/// A key that is empty or carries whitespace can only come from a parser
/// bug, never from a degraded environment, so it halts the run.
fn validate_fragment(topic: &str, fragment: &Fragment) -> Result<()> {
    for key in fragment.keys() {
        if key.is_empty() || key.chars().any(|c| c.is_whitespace()) {
            return Err(Error::MalformedFragment {
                source_name: topic.to_string(),
                reason: format!("invalid key {:?}", key),
            });
        }
    }
    Ok(())
}
