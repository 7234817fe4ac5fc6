// LogTailer - app/mod.rs
//
// Application layer: tail sources, their worker threads, the shared sink and
// the consumer facade.
// Dependencies: core, platform, util.

pub mod local;
pub mod remote;
pub mod sink;
pub mod source;
pub mod state;
pub mod tailer;

