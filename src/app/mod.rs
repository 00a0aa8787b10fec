// logtally - app/mod.rs
//
// Application layer: the analysis orchestrator and the concurrent
// processing stage.
// Dependencies: core, platform.

pub mod pipeline;
pub mod process;
