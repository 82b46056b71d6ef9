//! Motion-activated living room lights.

use crate::automation::{AppArgs, Automation};
use hearth_env::{state_callback, EnvResult, HassContext, Kwargs, ListenOptions, StateChange};
use serde::Deserialize;
use std::sync::Arc;

/// Arguments of [`LivingRoomMotion`].
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LivingRoomArgs {
    /// Motion sensor to watch
    pub motion_entity: String,

    /// Lights turned on when motion starts
    pub light_entities: Vec<String>,
}

/// Turns on every configured light when the motion sensor goes `off` -> `on`.
#[derive(Debug)]
pub struct LivingRoomMotion {
    args: LivingRoomArgs,
}

impl LivingRoomMotion {
    /// Creates the app from typed arguments.
    pub fn new(args: LivingRoomArgs) -> Self {
        Self { args }
    }

    /// Creates the app from raw arguments.
    pub fn from_args(args: &AppArgs) -> EnvResult<Self> {
        args.parse().map(Self::new)
    }

    /// Returns the app's arguments.
    pub fn args(&self) -> &LivingRoomArgs {
        &self.args
    }

    fn on_motion_detected(&self, ctx: &dyn HassContext, change: &StateChange) -> EnvResult<()> {
        if change.old == "off" && change.new == "on" {
            for light in &self.args.light_entities {
                ctx.turn_on(light, Kwargs::new())?;
            }
        }
        Ok(())
    }
}

impl Automation for LivingRoomMotion {
    fn name(&self) -> &str {
        "living_room_motion"
    }

    fn initialize(self: Arc<Self>, ctx: &dyn HassContext) -> EnvResult<()> {
        let motion = self.args.motion_entity.clone();
        let app = Arc::clone(&self);
        ctx.listen_state(
            state_callback(move |ctx, change| app.on_motion_detected(ctx, change)),
            &motion,
            ListenOptions::new(),
        )?;
        Ok(())
    }
}
