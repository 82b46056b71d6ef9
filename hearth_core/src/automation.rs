//! Automation lifecycle and argument handling.
//!
//! An automation is installed once: `initialize` receives the capability
//! interface and registers whatever timers and listeners the app needs.
//! From then on the app only runs inside those callbacks.

use hearth_env::{EnvError, EnvResult, HassContext, Kwargs};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

/// A home-automation app.
///
/// `initialize` takes `Arc<Self>` so callbacks can hold on to the app
/// without borrowing from the caller.
pub trait Automation: Send + Sync + 'static {
    /// Short name used in logs and reports.
    fn name(&self) -> &str;

    /// Registers the app's timers and listeners.
    fn initialize(self: Arc<Self>, ctx: &dyn HassContext) -> EnvResult<()>;
}

/// Raw app arguments, as found in an apps configuration file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppArgs(Kwargs);

impl AppArgs {
    /// Creates an empty argument map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an argument.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Returns a single argument, if present.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Deserializes the arguments into an app's typed configuration.
    pub fn parse<T: DeserializeOwned>(&self) -> EnvResult<T> {
        serde_json::from_value(Value::Object(self.0.clone()))
            .map_err(|e| EnvError::invalid(format!("bad app arguments: {}", e)))
    }
}

impl From<Kwargs> for AppArgs {
    fn from(kwargs: Kwargs) -> Self {
        Self(kwargs)
    }
}

impl TryFrom<Value> for AppArgs {
    type Error = EnvError;

    fn try_from(value: Value) -> EnvResult<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(EnvError::invalid(format!(
                "app arguments must be an object, got {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        sensor: String,
        #[serde(default)]
        lights: Vec<String>,
    }

    #[test]
    fn test_parse_typed_args() {
        let args = AppArgs::new()
            .with("sensor", "binary_sensor.hall")
            .with("lights", json!(["light.a", "light.b"]));

        let parsed: Sample = args.parse().unwrap();
        assert_eq!(parsed.sensor, "binary_sensor.hall");
        assert_eq!(parsed.lights, vec!["light.a", "light.b"]);
    }

    #[test]
    fn test_missing_required_arg_is_invalid() {
        let err = AppArgs::new().parse::<Sample>().unwrap_err();
        assert!(matches!(err, EnvError::InvalidArgument(_)));
    }

    #[test]
    fn test_args_from_json_object_only() {
        let args = AppArgs::try_from(json!({"sensor": "binary_sensor.x"})).unwrap();
        assert_eq!(args.get("sensor"), Some(&json!("binary_sensor.x")));
        assert!(AppArgs::try_from(json!([1, 2])).is_err());
    }
}
