//! Hearth Core - home-automation apps written against `HassContext`
//!
//! Apps in this crate never touch a host directly. They receive the
//! capability interface at `initialize` and register timers and listeners
//! through it, so the same code runs live or inside `hearth_sim`.
//!
//! Included apps:
//! 1. **LivingRoomMotion**: lights on when motion starts
//! 2. **Heartbeat**: logs on a fixed cadence
//! 3. **MotionTimeout**: light follows motion, off after a quiet period

pub mod automation;
pub mod heartbeat;
pub mod living_room;
pub mod motion_timeout;

// Re-export key types for convenience
pub use automation::{AppArgs, Automation};
pub use heartbeat::{Heartbeat, HeartbeatArgs};
pub use living_room::{LivingRoomArgs, LivingRoomMotion};
pub use motion_timeout::{MotionTimeout, MotionTimeoutArgs};
