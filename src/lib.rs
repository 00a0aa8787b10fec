// logtally - lib.rs
//
// Library entry point. The CLI in `main.rs` is a thin wrapper; everything
// it drives is exposed here for integration testing and embedding.

pub mod app;
pub mod core;
pub mod platform;
pub mod util;
