//! Hearth Deterministic Simulation Testing (DST) Harness
//!
//! This crate provides a controlled environment in which Hearth
//! home-automation apps run deterministically, driven by a test.
//!
//! # Core Principle: Nothing Moves Unless the Driver Moves It
//!
//! All sources of non-determinism are intercepted and controlled:
//! - **Time**: a virtual clock that only advances through `advance_to`
//! - **Timers**: fired in instant order, registration order on ties
//! - **State**: an in-memory entity store; writes notify listeners synchronously
//! - **Handles**: minted from a single 64-bit seed
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         SimWorld                            │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │ SimContext (impl HassContext)                         │   │
//! │  │   VirtualClock + Scheduler   StateStore + Notifier   │   │
//! │  │   HandleMint                 CallLog                  │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │       ▲                        ▲                            │
//! │  ┌────┴────┐              ┌────┴────┐                       │
//! │  │   App   │              │   App   │     ...               │
//! │  └─────────┘              └─────────┘                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use hearth_sim::{SimWorld, SimConfig};
//!
//! let mut world = SimWorld::new(SimConfig::default());
//! world.spawn(my_app)?;
//! {
//!     let _setup = world.setup();
//!     world.set_state("binary_sensor.motion", "off")?;
//! }
//! world.set_state("binary_sensor.motion", "on")?;
//! world.advance_by(chrono::Duration::minutes(5))?;
//! ```

mod calls;
mod clock;
mod context;
mod exporter;
mod handles;
mod notifier;
mod runner;
mod scheduler;
mod store;
mod world;
pub mod scenarios;

pub use calls::{CallLog, CallRecord};
pub use clock::{parse_instant, VirtualClock};
pub use context::{SetOptions, SetupGuard, SimContext};
pub use exporter::{RunReport, RunSummary};
pub use handles::HandleMint;
pub use notifier::{EventListener, Notification, Notifier, ObserverRecord};
pub use runner::{ScenarioResult, ScenarioRunner};
pub use scheduler::{DueFire, ScheduleRecord, Scheduler};
pub use store::{Attributes, StateDelta, StateStore};
pub use world::{SimConfig, SimWorld};
