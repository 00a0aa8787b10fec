// logtally - core/mod.rs
//
// Core analysis logic: record model, parsing, filtering, aggregation,
// rendering and export.
// Dependencies: chrono, regex, serde, csv.
// Must NOT depend on: app, platform, or the filesystem.

pub mod aggregate;
pub mod export;
pub mod filter;
pub mod model;
pub mod parser;
pub mod report;
pub mod timestamp;
