//! Core types for Frostwatch.
//!
//! This crate holds everything the other crates share:
//!
//! - **Resource model**: [`Monitor`], [`ResourceKey`], finalizer
//!   handling and the lifecycle phase state machine.
//! - **State codec**: [`FridgeState`] and its compact wire form
//!   (`{"T":4,"D":4,"O":false}`).
//! - **Configuration**: TOML-backed [`Config`] for the operator binary.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod config;
pub mod error;
pub mod resource;
pub mod state;

pub use config::{Config, MonitorDecl, MqttConfig, SupervisorSettings, TlsPaths};
pub use error::{Error, Result};
pub use resource::{Monitor, MonitorPhase, MonitorSpec, ResourceKey};
pub use state::{decode, encode, Degrees, FridgeState};
