//! hostfacts collection engine.
//!
//! This library assembles a flat key-value description of the running host:
//! - Probes read single OS data sources (files, pseudo-filesystems, tools)
//! - Parsers turn each probe's raw text into typed fact fragments
//! - Collectors group probe/parser pairs by topic, one variant per platform
//! - The selector picks collector variants for the running kernel
//! - The aggregator merges fragments into one namespace and applies
//!   third-party overlay facts
//!
//! The binary entry point is in `main.rs`.

pub mod collect;
pub mod logging;
