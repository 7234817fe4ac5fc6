// LogTailer - lib.rs
//
// Library entry point. The tail engine lives here so it can be embedded by
// any consumer; `main.rs` is a thin command-line consumer on top of it.

pub mod app;
pub mod core;
pub mod platform;
pub mod util;
