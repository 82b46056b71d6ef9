//! Entity state values exchanged between apps and the environment.

use crate::types::{EntityId, Kwargs};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Attribute name that selects the whole attribute map.
pub const ALL_ATTRIBUTES: &str = "all";

/// Attribute every entity carries.
pub const STATE_ATTRIBUTE: &str = "state";

/// Which attribute a listener or query is interested in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeFilter {
    /// A single named attribute
    Named(String),

    /// Every attribute; listeners receive full before/after snapshots
    All,
}

impl AttributeFilter {
    /// Returns true if a change to `attribute` passes this filter.
    pub fn matches(&self, attribute: &str) -> bool {
        match self {
            AttributeFilter::Named(name) => name == attribute,
            AttributeFilter::All => true,
        }
    }

    /// Returns true for the wildcard filter.
    pub fn is_all(&self) -> bool {
        matches!(self, AttributeFilter::All)
    }
}

impl Default for AttributeFilter {
    fn default() -> Self {
        AttributeFilter::Named(STATE_ATTRIBUTE.to_string())
    }
}

impl From<&str> for AttributeFilter {
    fn from(name: &str) -> Self {
        if name == ALL_ATTRIBUTES {
            AttributeFilter::All
        } else {
            AttributeFilter::Named(name.to_string())
        }
    }
}

/// Registration options for `listen_state`.
#[derive(Debug, Clone, Default)]
pub struct ListenOptions {
    /// Attribute to watch (default: `state`)
    pub attribute: AttributeFilter,

    /// Only fire when the new value equals this
    pub new: Option<Value>,

    /// Only fire when the old value equals this
    pub old: Option<Value>,

    /// Extra kwargs passed to every invocation
    pub kwargs: Kwargs,
}

impl ListenOptions {
    /// Options watching the `state` attribute with no value filters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the watched attribute (`"all"` selects the wildcard).
    pub fn attribute(mut self, attribute: impl Into<AttributeFilter>) -> Self {
        self.attribute = attribute.into();
        self
    }

    /// Filters on the new value.
    pub fn new_value(mut self, value: impl Into<Value>) -> Self {
        self.new = Some(value.into());
        self
    }

    /// Filters on the old value.
    pub fn old_value(mut self, value: impl Into<Value>) -> Self {
        self.old = Some(value.into());
        self
    }

    /// Adds a kwarg delivered with each invocation.
    pub fn kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }
}

/// A state change as delivered to a listener.
///
/// For wildcard listeners `attribute` is `None` and `old`/`new` hold the
/// complete attribute maps before and after the change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChange {
    /// Entity that changed
    pub entity_id: EntityId,

    /// Changed attribute, absent for wildcard listeners
    pub attribute: Option<String>,

    /// Previous value (or snapshot)
    pub old: Value,

    /// New value (or snapshot)
    pub new: Value,

    /// Listener kwargs merged with kwargs supplied by the writer
    pub kwargs: Kwargs,
}

/// Result of a `get_state` query.
#[derive(Debug, Clone, PartialEq)]
pub enum StateReading {
    /// Query named a single entity
    Entity(Value),

    /// Query named a domain: entity id -> value
    Domain(BTreeMap<String, Value>),
}

impl StateReading {
    /// Returns the single-entity value, if this was an entity query.
    pub fn as_entity(&self) -> Option<&Value> {
        match self {
            StateReading::Entity(value) => Some(value),
            StateReading::Domain(_) => None,
        }
    }

    /// Returns the per-entity map, if this was a domain query.
    pub fn as_domain(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            StateReading::Entity(_) => None,
            StateReading::Domain(map) => Some(map),
        }
    }

    /// Flattens the reading into one JSON value.
    pub fn into_value(self) -> Value {
        match self {
            StateReading::Entity(value) => value,
            StateReading::Domain(map) => Value::Object(map.into_iter().collect()),
        }
    }
}

/// Truthiness as home-automation configs use it: null, false, zero and
/// empty strings/collections are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attribute_filter_from_str() {
        assert_eq!(AttributeFilter::from("all"), AttributeFilter::All);
        assert_eq!(
            AttributeFilter::from("brightness"),
            AttributeFilter::Named("brightness".into())
        );
        assert_eq!(AttributeFilter::default(), AttributeFilter::Named("state".into()));
    }

    #[test]
    fn test_attribute_filter_matches() {
        assert!(AttributeFilter::All.matches("anything"));
        assert!(AttributeFilter::default().matches("state"));
        assert!(!AttributeFilter::default().matches("brightness"));
    }

    #[test]
    fn test_listen_options_builder() {
        let opts = ListenOptions::new()
            .attribute("brightness")
            .new_value(255)
            .old_value(0)
            .kwarg("room", "kitchen");

        assert_eq!(opts.attribute, AttributeFilter::Named("brightness".into()));
        assert_eq!(opts.new, Some(json!(255)));
        assert_eq!(opts.old, Some(json!(0)));
        assert_eq!(opts.kwargs.get("room"), Some(&json!("kitchen")));
    }

    #[test]
    fn test_truthiness() {
        for falsy in [json!(null), json!(false), json!(0), json!(0.0), json!(""), json!([]), json!({})] {
            assert!(!is_truthy(&falsy), "{falsy} should be falsy");
        }
        for truthy in [json!(true), json!(1), json!("off"), json!([0]), json!({"a": null})] {
            assert!(is_truthy(&truthy), "{truthy} should be truthy");
        }
    }

    #[test]
    fn test_state_reading_accessors() {
        let single = StateReading::Entity(json!("on"));
        assert_eq!(single.as_entity(), Some(&json!("on")));
        assert!(single.as_domain().is_none());

        let mut map = BTreeMap::new();
        map.insert("light.a".to_string(), json!("on"));
        let domain = StateReading::Domain(map);
        assert_eq!(domain.clone().into_value(), json!({"light.a": "on"}));
        assert!(domain.as_entity().is_none());
    }
}
