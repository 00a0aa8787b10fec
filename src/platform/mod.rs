// logtally - platform/mod.rs
//
// Platform abstraction layer: byte-stream sources and sinks, platform
// directories and configuration.
// Dependencies: standard library, directories, toml, core value types.
// Must NOT depend on: app.

pub mod config;
pub mod fs;
