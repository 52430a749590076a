//! Library entrypoint for mlb-presence.
//!
//! Exposes all modules so integration tests can import them.

pub mod api;
pub mod cli;
pub mod config;
pub mod data;
pub mod poller;
pub mod presence;
