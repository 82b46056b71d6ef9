//! SimWorld - The simulation harness container.

use crate::calls::CallRecord;
use crate::clock::parse_instant;
use crate::context::{SetOptions, SetupGuard, SimContext};

use chrono::{Duration, NaiveDateTime};
use hearth_core::Automation;
use hearth_env::{EnvResult, ScheduleHandle};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// Configuration for a simulation run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,

    /// Initial simulated instant
    pub base_time: NaiveDateTime,

    /// When false, app side effects are recorded but not applied
    pub update_states: bool,
}

impl SimConfig {
    /// Default starting instant, 2024-01-01 00:00:00.
    pub fn default_base_time() -> NaiveDateTime {
        parse_instant("2024-01-01").unwrap_or_default()
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            base_time: Self::default_base_time(),
            update_states: true,
        }
    }
}

/// The SimWorld - a context plus the apps installed into it.
pub struct SimWorld {
    /// Configuration
    pub config: SimConfig,

    /// Shared simulation context
    pub context: SimContext,

    /// Installed apps, in installation order
    apps: Vec<Arc<dyn Automation>>,
}

impl SimWorld {
    /// Creates a new SimWorld with the given configuration.
    pub fn new(config: SimConfig) -> Self {
        let context = SimContext::new(config.seed, config.base_time)
            .with_update_states(config.update_states);
        Self {
            config,
            context,
            apps: Vec::new(),
        }
    }

    /// Installs an app: runs its `initialize` against this world's context.
    pub fn spawn<A: Automation>(&mut self, app: A) -> EnvResult<Arc<A>> {
        let app = Arc::new(app);
        info!(app = app.name(), at = %self.context.now(), "initializing app");
        Arc::clone(&app).initialize(&self.context)?;
        self.apps.push(app.clone());
        Ok(app)
    }

    /// Names of installed apps.
    pub fn app_names(&self) -> Vec<String> {
        self.apps.iter().map(|a| a.name().to_string()).collect()
    }

    /// Returns the current simulated instant.
    pub fn now(&self) -> NaiveDateTime {
        self.context.now()
    }

    /// Advances to `target`, firing due timers.
    pub fn advance_to(&self, target: NaiveDateTime) -> EnvResult<()> {
        self.context.advance_to(target)
    }

    /// Advances by `delta`, firing due timers.
    pub fn advance_by(&self, delta: Duration) -> EnvResult<()> {
        self.context.advance_by(delta)
    }

    /// Writes an entity's `state` and notifies listeners.
    pub fn set_state(&self, entity: &str, value: impl Into<Value>) -> EnvResult<()> {
        self.context.set(entity, value, SetOptions::new())
    }

    /// Writes an entity attribute with explicit options.
    pub fn set(&self, entity: &str, value: impl Into<Value>, options: SetOptions) -> EnvResult<()> {
        self.context.set(entity, value, options)
    }

    /// Reads an entity's `state`.
    pub fn state(&self, entity: &str) -> EnvResult<Value> {
        self.context.state(entity)
    }

    /// Enters a setup phase; state written while the guard lives is silent.
    pub fn setup(&self) -> SetupGuard<'_> {
        self.context.setup()
    }

    /// Recorded calls to `method`.
    pub fn calls(&self, method: &str) -> Vec<CallRecord> {
        self.context.calls(method)
    }

    /// How often a timer has fired.
    pub fn fire_count(&self, handle: ScheduleHandle) -> EnvResult<u64> {
        self.context.fire_count(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_core::{
        AppArgs, Heartbeat, HeartbeatArgs, LivingRoomMotion, MotionTimeout, MotionTimeoutArgs,
    };
    use serde_json::json;

    fn world() -> SimWorld {
        SimWorld::new(SimConfig::default())
    }

    fn living_room() -> LivingRoomMotion {
        let args = AppArgs::new()
            .with("motion_entity", "binary_sensor.motion_detected")
            .with("light_entities", json!(["light.1", "light.2", "light.3"]));
        LivingRoomMotion::from_args(&args).unwrap()
    }

    fn motion_timeout() -> MotionTimeout {
        MotionTimeout::new(MotionTimeoutArgs {
            motion_entity: "binary_sensor.hall".into(),
            light_entity: "light.hall".into(),
            timeout_secs: 120,
        })
    }

    #[test]
    fn test_default_config() {
        let config = SimConfig::default();
        assert_eq!(config.seed, 42);
        assert!(config.update_states);
        assert_eq!(config.base_time.to_string(), "2024-01-01 00:00:00");
    }

    #[test]
    fn test_spawn_registers_listener() {
        let mut world = world();
        world.spawn(living_room()).unwrap();

        let listens = world.calls("listen_state");
        assert_eq!(listens.len(), 1);
        assert_eq!(listens[0].args["entity_id"], json!("binary_sensor.motion_detected"));
        assert_eq!(world.app_names(), vec!["living_room_motion"]);
    }

    #[test]
    fn test_lights_turn_on_when_motion_detected() {
        let mut world = world();
        world.spawn(living_room()).unwrap();

        {
            let _setup = world.setup();
            world.set_state("binary_sensor.motion_detected", "off").unwrap();
        }
        world.set_state("binary_sensor.motion_detected", "on").unwrap();

        let lights: Vec<_> = world
            .calls("turn_on")
            .into_iter()
            .map(|c| c.args["entity_id"].clone())
            .collect();
        assert_eq!(lights, vec![json!("light.1"), json!("light.2"), json!("light.3")]);
        assert_eq!(world.state("light.2").unwrap(), json!("on"));
    }

    #[test]
    fn test_motion_from_unknown_does_not_turn_on() {
        let mut world = world();
        world.spawn(living_room()).unwrap();

        world.set_state("binary_sensor.motion_detected", "on").unwrap();
        assert!(world.calls("turn_on").is_empty());
    }

    #[test]
    fn test_heartbeat_cadence() {
        let mut world = world();
        let app = world.spawn(Heartbeat::new(HeartbeatArgs::default())).unwrap();
        let handle = app.handle().unwrap();

        world.advance_by(Duration::minutes(9)).unwrap();
        assert_eq!(world.fire_count(handle).unwrap(), 0);

        world.advance_by(Duration::minutes(1)).unwrap();
        assert_eq!(world.fire_count(handle).unwrap(), 1);

        world.advance_by(Duration::minutes(20)).unwrap();
        assert_eq!(world.fire_count(handle).unwrap(), 5);
        assert_eq!(world.calls("log").len(), 5);
    }

    #[test]
    fn test_motion_timeout_rearms_and_expires() {
        let mut world = world();
        let app = world.spawn(motion_timeout()).unwrap();

        world.set_state("binary_sensor.hall", "on").unwrap();
        assert_eq!(world.state("light.hall").unwrap(), json!("on"));
        let first = app.pending().unwrap();

        world.advance_by(Duration::seconds(90)).unwrap();
        world.set_state("binary_sensor.hall", "off").unwrap();
        world.set_state("binary_sensor.hall", "on").unwrap();
        let second = app.pending().unwrap();
        assert_ne!(first, second);

        // first timer would have expired here
        world.advance_by(Duration::seconds(60)).unwrap();
        assert_eq!(world.state("light.hall").unwrap(), json!("on"));
        assert_eq!(world.fire_count(first).unwrap(), 0);

        world.advance_by(Duration::seconds(60)).unwrap();
        assert_eq!(world.state("light.hall").unwrap(), json!("off"));
        assert!(app.pending().is_none());
        assert_eq!(world.calls("cancel_timer").len(), 1);
    }

    #[test]
    fn test_update_states_disabled_keeps_world_frozen() {
        let mut world = SimWorld::new(SimConfig {
            update_states: false,
            ..Default::default()
        });
        world.spawn(motion_timeout()).unwrap();

        world.set_state("binary_sensor.hall", "on").unwrap();
        world.advance_by(Duration::minutes(10)).unwrap();

        assert_eq!(world.calls("turn_on").len(), 1);
        assert_eq!(world.calls("run_in").len(), 1);
        assert!(world.calls("turn_off").is_empty());
        assert_eq!(world.state("light.hall").unwrap(), Value::Null);
    }

    #[test]
    fn test_same_seed_same_handles() {
        let mut a = world();
        let mut b = world();
        let ha = a.spawn(Heartbeat::default()).unwrap().handle();
        let hb = b.spawn(Heartbeat::default()).unwrap().handle();
        assert_eq!(ha, hb);
    }
}
