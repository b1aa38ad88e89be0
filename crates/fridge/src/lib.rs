//! Simulated fridge.
//!
//! A whole-degree thermal model driven by a fixed tick: the fridge
//! cools toward its desired temperature while the door is closed and
//! warms toward ambient while it is open. The `fridge-sim` binary
//! publishes the model's state on every tick and plays back a scripted
//! door schedule in place of the interactive input a real device would
//! have.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod model;
pub mod script;

pub use model::{FridgeModel, AMBIENT_TEMPERATURE};
pub use script::{DoorEvent, DoorScript};
