//! Light that follows a motion sensor and switches off after a quiet period.

use crate::automation::{AppArgs, Automation};
use chrono::Duration;
use hearth_env::{
    state_callback, timer_callback, EnvResult, HassContext, Kwargs, ListenOptions, ScheduleHandle,
};
use serde::Deserialize;
use std::sync::{Arc, Mutex, PoisonError};

fn default_timeout_secs() -> i64 {
    300
}

/// Arguments of [`MotionTimeout`].
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MotionTimeoutArgs {
    /// Motion sensor to watch
    pub motion_entity: String,

    /// Light to control
    pub light_entity: String,

    /// Quiet period before the light goes off (default: 5 minutes)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: i64,
}

/// Turns a light on with motion and off once motion has stopped re-arming it.
///
/// Every `on` reading cancels the pending off-timer and starts a new one.
#[derive(Debug)]
pub struct MotionTimeout {
    args: MotionTimeoutArgs,
    pending: Mutex<Option<ScheduleHandle>>,
}

impl MotionTimeout {
    /// Creates the app from typed arguments.
    pub fn new(args: MotionTimeoutArgs) -> Self {
        Self {
            args,
            pending: Mutex::new(None),
        }
    }

    /// Creates the app from raw arguments.
    pub fn from_args(args: &AppArgs) -> EnvResult<Self> {
        args.parse().map(Self::new)
    }

    /// Returns the app's arguments.
    pub fn args(&self) -> &MotionTimeoutArgs {
        &self.args
    }

    /// Handle of the off-timer currently armed, if any.
    pub fn pending(&self) -> Option<ScheduleHandle> {
        *self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take_pending(&self) -> Option<ScheduleHandle> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    fn on_motion(self: &Arc<Self>, ctx: &dyn HassContext) -> EnvResult<()> {
        ctx.turn_on(&self.args.light_entity, Kwargs::new())?;

        if let Some(previous) = self.take_pending() {
            ctx.cancel_timer(previous)?;
        }

        let app = Arc::clone(self);
        let handle = ctx.run_in(
            timer_callback(move |ctx, _| app.on_timeout(ctx)),
            Duration::seconds(self.args.timeout_secs),
            Kwargs::new(),
        )?;
        *self.pending.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        Ok(())
    }

    fn on_timeout(&self, ctx: &dyn HassContext) -> EnvResult<()> {
        self.take_pending();
        ctx.turn_off(&self.args.light_entity, Kwargs::new())
    }
}

impl Automation for MotionTimeout {
    fn name(&self) -> &str {
        "motion_timeout"
    }

    fn initialize(self: Arc<Self>, ctx: &dyn HassContext) -> EnvResult<()> {
        let app = Arc::clone(&self);
        ctx.listen_state(
            state_callback(move |ctx, _| app.on_motion(ctx)),
            &self.args.motion_entity,
            ListenOptions::new().new_value("on"),
        )?;
        Ok(())
    }
}
