//! Periodic heartbeat logger.

use crate::automation::{AppArgs, Automation};
use chrono::Duration;
use hearth_env::{timer_callback, EnvError, EnvResult, HassContext, Kwargs, ScheduleHandle};
use serde::Deserialize;
use std::sync::{Arc, Mutex, PoisonError};

fn default_delay_secs() -> i64 {
    600
}

fn default_interval_secs() -> i64 {
    300
}

/// Arguments of [`Heartbeat`].
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct HeartbeatArgs {
    /// Delay between initialize and the first beat (default: 10 minutes)
    #[serde(default = "default_delay_secs")]
    pub delay_secs: i64,

    /// Spacing between beats (default: 5 minutes)
    #[serde(default = "default_interval_secs")]
    pub interval_secs: i64,
}

impl Default for HeartbeatArgs {
    fn default() -> Self {
        Self {
            delay_secs: default_delay_secs(),
            interval_secs: default_interval_secs(),
        }
    }
}

/// Logs a line on a fixed cadence.
#[derive(Debug, Default)]
pub struct Heartbeat {
    args: HeartbeatArgs,
    handle: Mutex<Option<ScheduleHandle>>,
}

impl Heartbeat {
    /// Creates the app from typed arguments.
    pub fn new(args: HeartbeatArgs) -> Self {
        Self {
            args,
            handle: Mutex::new(None),
        }
    }

    /// Creates the app from raw arguments.
    pub fn from_args(args: &AppArgs) -> EnvResult<Self> {
        args.parse().map(Self::new)
    }

    /// Handle of the repeating timer, once initialized.
    pub fn handle(&self) -> Option<ScheduleHandle> {
        *self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn beat(&self, ctx: &dyn HassContext) {
        ctx.log(&format!("heartbeat at {}", ctx.datetime()));
    }
}

impl Automation for Heartbeat {
    fn name(&self) -> &str {
        "heartbeat"
    }

    fn initialize(self: Arc<Self>, ctx: &dyn HassContext) -> EnvResult<()> {
        let start = ctx
            .datetime()
            .checked_add_signed(Duration::seconds(self.args.delay_secs))
            .ok_or_else(|| EnvError::invalid("heartbeat start out of range"))?;
        let interval = Duration::seconds(self.args.interval_secs);

        let app = Arc::clone(&self);
        let handle = ctx.run_every(
            timer_callback(move |ctx, _| {
                app.beat(ctx);
                Ok(())
            }),
            start,
            interval,
            Kwargs::new(),
        )?;
        *self.handle.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        Ok(())
    }
}
