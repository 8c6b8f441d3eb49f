//! Long running tasks of the engine
//!
//! ## Architecture Overview
//!
//! ```text
//!             ┌──────────────────┐
//!             │  Engine (main)   │
//!             └───────┬──────────┘
//!          spawns     │      spawns one per started server
//!        ┌────────────┴─────────────┐
//!        │                          │
//! ┌──────▼─────────┐        ┌───────▼───────┐
//! │ConnectionProber│        │  StatsPoller  │ ──► RemoteExecutor
//! └──────┬─────────┘        └───────┬───────┘
//!        │ status, alerts           │ stats, token checks
//!        ▼                          ▼
//!   ServerDirectory       StatsCache, MonitoringRegistry
//! ```
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: the prober has an mpsc command channel for control messages
//! 2. **Request/Response**: oneshot channels carry sweep reports back
//! 3. **Shared store**: polling loops are controlled through the registry
//!    only, never through channels, so any process sharing the store can
//!    stop them

pub mod messages;
pub mod poller;
pub mod prober;

pub use messages::{LoopExit, ProbeOutcome, ProberCommand, SweepReport};
pub use poller::StatsPoller;
pub use prober::{ConnectionProber, ProberHandle};
