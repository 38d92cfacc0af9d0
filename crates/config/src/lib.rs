//! Configuration module for mbify
//!
//! Handles loading the encoder configuration from TOML files.

pub mod config;

pub use config::*;
