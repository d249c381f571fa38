//! # heihost-server: Image Hosting Service
//!
//! Captures a screenshot on a fixed cadence and serves the latest one to
//! e-paper display clients over the heihost binary protocol.
//!
//! - **config**: TOML configuration with CLI overrides.
//! - **capture**: file-backed capture task feeding the screenshot slot.

pub mod capture;
pub mod config;
