//! The `odin` command line.
//!
//! Wires configuration, logging, and content fetching around the
//! conversation engine:
//!
//! - `odin run <FILE> [KEY=VALUE]...` replays a conversation document
//! - `odin ask [PROMPT] [KEY=VALUE]...` sends a single prompt

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod fetch;
pub mod logging;
