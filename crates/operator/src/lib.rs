//! Declarative monitor supervisor for Frostwatch.
//!
//! The supervisor watches declared [`Monitor`](frostwatch_core::Monitor)
//! resources and keeps exactly one monitor task running per resource:
//!
//! - **Store contract** ([`store`]): fetch/update plus a watch stream
//!   that replays existing resources on startup.
//! - **Supervisor** ([`supervisor`]): the reconcile loop, per-identity
//!   serialization, transient-failure requeueing, and the two-phase
//!   finalizer deletion protocol.
//! - **Monitor tasks** ([`task`]): per-resource select loop bridging
//!   the transport to the safety predicate.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod error;
pub mod store;
pub mod supervisor;
pub mod task;

pub use error::{Error, Result};
pub use store::{InMemoryStore, MonitorStore, WatchEvent};
pub use supervisor::{Supervisor, SupervisorConfig, FINALIZER};
pub use task::{MonitorTask, TaskHandle};
