//! Scenario runner - executes the built-in simulation scenarios.

use crate::calls::CallRecord;
use crate::scenarios::ScenarioId;
use crate::world::{SimConfig, SimWorld};

use chrono::{Duration, NaiveDateTime};
use hearth_core::{
    Heartbeat, HeartbeatArgs, LivingRoomArgs, LivingRoomMotion, MotionTimeout, MotionTimeoutArgs,
};
use hearth_env::{timer_callback, EnvError, HassContext, Kwargs};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Results from running a scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Simulated instant at the end of the run
    pub final_time: NaiveDateTime,

    /// Timer callbacks invoked during the run
    pub timer_fires: u64,

    /// Every call the apps made, in order
    pub calls: Vec<CallRecord>,

    /// Failure message if any
    pub failure_reason: Option<String>,
}

/// Why a scenario did not pass.
#[derive(Debug, Error)]
enum ScenarioFailure {
    /// The harness or an app returned an error
    #[error("simulation error: {0}")]
    Env(#[from] EnvError),

    /// A scenario expectation did not hold
    #[error("{0}")]
    Check(String),
}

fn check(condition: bool, message: impl FnOnce() -> String) -> Result<(), ScenarioFailure> {
    if condition {
        Ok(())
    } else {
        Err(ScenarioFailure::Check(message()))
    }
}

/// Runs built-in scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Initial simulated instant
    start: NaiveDateTime,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            start: SimConfig::default_base_time(),
        }
    }

    /// Sets the initial simulated instant.
    pub fn with_start(mut self, start: NaiveDateTime) -> Self {
        self.start = start;
        self
    }

    fn world(&self) -> SimWorld {
        SimWorld::new(SimConfig {
            seed: self.seed,
            base_time: self.start,
            ..Default::default()
        })
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);

        let mut world = self.world();
        let outcome = match scenario {
            ScenarioId::LivingRoomMotion => self.run_living_room_motion(&mut world),
            ScenarioId::Heartbeat => self.run_heartbeat(&mut world),
            ScenarioId::MotionTimeout => self.run_motion_timeout(&mut world),
            ScenarioId::DualCadence => self.run_dual_cadence(&mut world),
        };

        let failure_reason = match outcome {
            Ok(()) => {
                info!("✓ {} passed at {}", scenario.name(), world.now());
                None
            }
            Err(failure) => {
                warn!("✗ {} failed: {}", scenario.name(), failure);
                Some(failure.to_string())
            }
        };

        ScenarioResult {
            scenario,
            seed: self.seed,
            passed: failure_reason.is_none(),
            final_time: world.now(),
            timer_fires: world.context.total_fires(),
            calls: world.context.call_log().all().to_vec(),
            failure_reason,
        }
    }

    /// Runs every scenario in [`ScenarioId::all`] order.
    pub fn run_all(&self) -> Vec<ScenarioResult> {
        ScenarioId::all().into_iter().map(|id| self.run(id)).collect()
    }

    /// HS-001: LivingRoomMotion.
    ///
    /// Motion is primed to `off` silently, then switches `on` for real.
    /// **Assertion**: one listener registered, three lights turned on in order.
    fn run_living_room_motion(&self, world: &mut SimWorld) -> Result<(), ScenarioFailure> {
        let lights = ["light.1", "light.2", "light.3"];
        world.spawn(LivingRoomMotion::new(LivingRoomArgs {
            motion_entity: "binary_sensor.motion_detected".into(),
            light_entities: lights.iter().map(|l| l.to_string()).collect(),
        }))?;

        let listens = world.calls("listen_state").len();
        check(listens == 1, || format!("expected 1 listen_state call, saw {}", listens))?;

        {
            let _setup = world.setup();
            world.set_state("binary_sensor.motion_detected", "off")?;
        }
        check(world.calls("turn_on").is_empty(), || {
            "setup write notified the app".to_string()
        })?;

        world.set_state("binary_sensor.motion_detected", "on")?;

        let turned_on: Vec<_> = world
            .calls("turn_on")
            .into_iter()
            .map(|c| c.args["entity_id"].clone())
            .collect();
        let expected: Vec<_> = lights.iter().map(|l| json!(l)).collect();
        check(turned_on == expected, || {
            format!("expected turn_on for {:?}, saw {:?}", expected, turned_on)
        })?;
        Ok(())
    }

    /// HS-002: Heartbeat.
    ///
    /// Advances an hour in uneven steps.
    /// **Assertion**: fires at +10min and every 5 minutes after, 11 in total.
    fn run_heartbeat(&self, world: &mut SimWorld) -> Result<(), ScenarioFailure> {
        let app = world.spawn(Heartbeat::new(HeartbeatArgs::default()))?;
        let handle = app
            .handle()
            .ok_or_else(|| ScenarioFailure::Check("heartbeat did not schedule".into()))?;

        let end = self.start + Duration::hours(1);
        let step = Duration::minutes(7);
        while world.now() + step < end {
            world.advance_by(step)?;
            debug!("  t={} | beats={}", world.now(), world.fire_count(handle)?);
        }
        world.advance_to(end)?;

        let fires = world.fire_count(handle)?;
        check(fires == 11, || format!("expected 11 beats, saw {}", fires))?;
        let logs = world.calls("log").len();
        check(logs == 11, || format!("expected 11 log lines, saw {}", logs))?;
        Ok(())
    }

    /// HS-003: MotionTimeout.
    ///
    /// Motion re-triggers three times, two minutes apart, then stops.
    /// **Assertion**: two pending timers cancelled, light switched off exactly once.
    fn run_motion_timeout(&self, world: &mut SimWorld) -> Result<(), ScenarioFailure> {
        let app = world.spawn(MotionTimeout::new(MotionTimeoutArgs {
            motion_entity: "binary_sensor.hall".into(),
            light_entity: "light.hall".into(),
            timeout_secs: 300,
        }))?;

        for _ in 0..3 {
            world.set_state("binary_sensor.hall", "on")?;
            world.advance_by(Duration::minutes(1))?;
            world.set_state("binary_sensor.hall", "off")?;
            world.advance_by(Duration::minutes(1))?;
        }
        let light = world.state("light.hall")?;
        check(light == "on", || format!("light should still be on, was {}", light))?;

        world.advance_by(Duration::minutes(10))?;

        let cancels = world.calls("cancel_timer").len();
        check(cancels == 2, || format!("expected 2 cancellations, saw {}", cancels))?;
        let offs = world.calls("turn_off").len();
        check(offs == 1, || format!("expected 1 turn_off, saw {}", offs))?;
        let light = world.state("light.hall")?;
        check(light == "off", || format!("light should be off, was {}", light))?;
        check(app.pending().is_none(), || "off-timer still armed".to_string())?;
        Ok(())
    }

    /// HS-004: DualCadence.
    ///
    /// Two `run_every` timers share an anchor T0 (start + 10min) and a 300s
    /// period. **Assertion**: cumulative fires 0, 0, 2, 2, 4 at
    /// T0-8m, T0-5m, T0, T0+3m, T0+5m.
    fn run_dual_cadence(&self, world: &mut SimWorld) -> Result<(), ScenarioFailure> {
        let ctx = &world.context;
        let fires = Arc::new(AtomicU64::new(0));
        let anchor = self.start + Duration::minutes(10);

        for _ in 0..2 {
            let counter = Arc::clone(&fires);
            ctx.run_every(
                timer_callback(move |_, _| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
                anchor,
                Duration::seconds(300),
                Kwargs::new(),
            )?;
        }

        let checkpoints = [(-8, 0), (-5, 0), (0, 2), (3, 2), (5, 4)];
        for (offset, expected) in checkpoints {
            let at = anchor + Duration::minutes(offset);
            ctx.advance_to(at)?;
            let seen = fires.load(Ordering::SeqCst);
            check(seen == expected, || {
                format!("at T0{:+}m expected {} fires, saw {}", offset, expected, seen)
            })?;
        }
        Ok(())
    }
}
