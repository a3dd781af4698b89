//! Times logistics-support tasks from a terminal and files every finished task as its own
//! Arrow file in a date partitioned store, usually on a shared drive.
//!
//! The `tasklog` binary hosts the interactive tracker, `tasklog-launcher` updates the
//! installation and then starts it.

pub mod cli;
pub mod config;
pub mod fs;
pub mod identity;
pub mod launcher;
pub mod session;
pub mod storage;
pub mod update;
pub mod utils;
