//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates (`core-service`, `core-runtime`, `bridge-desktop`). Host
//! applications can depend on `narration-workspace` and enable `desktop-shims`
//! or `audio-output` without needing to wire each crate individually.

#[cfg(feature = "desktop-shims")]
pub use core_service;
