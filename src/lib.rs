//! Greenhouse controller firmware library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod error;
pub mod pins;
pub mod power;
pub mod remote;
pub mod settings;
pub mod shell;

// Host builds get the simulation stubs behind the same names, so these
// compile everywhere; the real implementations are cfg-gated inside.
pub mod adapters;
pub mod drivers;
pub mod sensors;
