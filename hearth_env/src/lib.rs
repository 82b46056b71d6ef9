//! Hearth Environment Abstraction Layer
//!
//! This crate provides the capability interface that lets Hearth
//! home-automation apps run against either a live host or the
//! deterministic simulation in `hearth_sim`.
//!
//! # Core Concept: Dependency Injection
//!
//! Apps never touch a global framework object. Everything with a side
//! effect goes through [`HassContext`]:
//! - Time (`datetime()`, `run_at()`, `run_every()`, `cancel_timer()`)
//! - State (`get_state()`, `set_state()`, `listen_state()`)
//! - Host calls (`call_service()`, `notify()`, `log()`)
//!
//! In simulation the clock only moves when the test driver advances it,
//! so any timing bug is reproducible.
//!
//! # Example
//!
//! ```ignore
//! use hearth_env::{state_callback, HassContext, ListenOptions};
//!
//! fn initialize(ctx: &dyn HassContext) -> hearth_env::EnvResult<()> {
//!     let on_motion = state_callback(|ctx, change| {
//!         if change.new == "on" {
//!             ctx.turn_on("light.hall", Default::default())?;
//!         }
//!         Ok(())
//!     });
//!     ctx.listen_state(on_motion, "binary_sensor.hall", ListenOptions::new())?;
//!     Ok(())
//! }
//! ```

mod context;
mod error;
mod state;
mod types;

pub use context::{
    event_callback, state_callback, timer_callback, EventCallback, HassContext, StateCallback,
    TimerCallback,
};
pub use error::{EnvError, EnvResult};
pub use state::{
    is_truthy, AttributeFilter, ListenOptions, StateChange, StateReading, ALL_ATTRIBUTES,
    STATE_ATTRIBUTE,
};
pub use types::{EntityId, Kwargs, ListenHandle, Scope, ScheduleHandle};
