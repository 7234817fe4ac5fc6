// LogTailer - core/mod.rs
//
// Core business logic layer: data model, line classification, severity
// schemes and the scheme registry, display filtering.
// Must NOT depend on: app, platform, or any I/O crate directly.

pub mod classify;
pub mod filter;
pub mod model;
pub mod registry;
pub mod scheme;
