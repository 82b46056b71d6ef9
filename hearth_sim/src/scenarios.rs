//! Built-in simulation scenarios.

use serde::{Deserialize, Serialize};

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioId {
    /// HS-001: motion turns on every living room light
    LivingRoomMotion,

    /// HS-002: heartbeat fires on its five-minute cadence
    Heartbeat,

    /// HS-003: motion light re-arms and expires after a quiet period
    MotionTimeout,

    /// HS-004: two timers sharing a cadence, advanced piecewise
    DualCadence,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::LivingRoomMotion,
            ScenarioId::Heartbeat,
            ScenarioId::MotionTimeout,
            ScenarioId::DualCadence,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::LivingRoomMotion => "living_room_motion",
            ScenarioId::Heartbeat => "heartbeat",
            ScenarioId::MotionTimeout => "motion_timeout",
            ScenarioId::DualCadence => "dual_cadence",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::LivingRoomMotion => {
                "Motion off -> on after a silent setup turns on three lights"
            }
            ScenarioId::Heartbeat => "run_every from now+10min every 300s, checked over an hour",
            ScenarioId::MotionTimeout => "Repeated motion re-arms the off-timer; light goes off once",
            ScenarioId::DualCadence => "Two 300s timers with one anchor, advanced in uneven steps",
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "living_room_motion" | "livingroommotion" | "hs-001" => Ok(ScenarioId::LivingRoomMotion),
            "heartbeat" | "hs-002" => Ok(ScenarioId::Heartbeat),
            "motion_timeout" | "motiontimeout" | "hs-003" => Ok(ScenarioId::MotionTimeout),
            "dual_cadence" | "dualcadence" | "hs-004" => Ok(ScenarioId::DualCadence),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
