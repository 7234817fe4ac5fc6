// LogTailer - platform/mod.rs
//
// Platform abstraction layer: configuration files, shared file access and
// SSH sessions.
// Dependencies: standard library, directories, ssh2, core (scheme types).
// Must NOT depend on: app.

pub mod config;
pub mod fs;
pub mod ssh;
