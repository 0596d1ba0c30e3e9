//! # Printer Module
//!
//! This module provides printer-specific configuration.
//!
//! ## Modules
//!
//! - [`config`]: Print width, pacing, feeds, energy and discovery settings

pub mod config;

pub use config::PrinterConfig;
