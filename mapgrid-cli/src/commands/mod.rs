//! CLI subcommands.

pub mod common;
pub mod config;
pub mod describe;
pub mod features;
pub mod grid;
pub mod render;
