//! Exactly-once people counting on top of per-frame tracker output.
//!
//! Boxes and identifiers come from an external detector/tracker. The `counter` module
//! turns them into deduplicated, directional count events; `sink` delivers those
//! events asynchronously and replays undelivered ones to the accounting endpoint.
pub mod config;
pub mod counter;
pub mod sink;
pub mod utils;
