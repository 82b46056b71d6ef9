//! Entity state store.

use hearth_env::{
    is_truthy, EntityId, EnvResult, Scope, StateReading, ALL_ATTRIBUTES, STATE_ATTRIBUTE,
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Attribute name -> value for one entity.
pub type Attributes = Map<String, Value>;

/// A mutation that was applied, with everything observers need to see.
#[derive(Debug, Clone, PartialEq)]
pub struct StateDelta {
    /// Entity that changed
    pub entity_id: EntityId,

    /// Attribute that changed
    pub attribute: String,

    /// Value compared against (stored or forced previous)
    pub old_value: Value,

    /// Value written
    pub new_value: Value,

    /// Attribute map before the write
    pub before: Attributes,

    /// Attribute map after the write
    pub after: Attributes,
}

/// Current attribute values of every known entity.
#[derive(Debug, Default, Clone)]
pub struct StateStore {
    entities: BTreeMap<EntityId, Attributes>,
}

impl StateStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the attribute map for `id`, creating `{"state": null}` on first touch.
    fn entry(&mut self, id: &EntityId) -> &mut Attributes {
        self.entities.entry(id.clone()).or_insert_with(|| {
            let mut attributes = Attributes::new();
            attributes.insert(STATE_ATTRIBUTE.to_string(), Value::Null);
            attributes
        })
    }

    /// Reads an attribute of an entity or of every entity in a domain.
    ///
    /// Entity queries materialise the entity if it did not exist yet.
    pub fn read(&mut self, query: &str, attribute: &str, default: Option<&Value>) -> EnvResult<StateReading> {
        let pick = |attributes: &Attributes| -> Value {
            let value = if attribute == ALL_ATTRIBUTES {
                Value::Object(attributes.clone())
            } else {
                attributes.get(attribute).cloned().unwrap_or(Value::Null)
            };
            match default {
                Some(fallback) if !is_truthy(&value) => fallback.clone(),
                _ => value,
            }
        };

        match Scope::parse(query)? {
            Scope::Entity(id) => Ok(StateReading::Entity(pick(self.entry(&id)))),
            Scope::Domain(domain) => Ok(StateReading::Domain(
                self.entities
                    .iter()
                    .filter(|(id, _)| id.domain() == domain)
                    .map(|(id, attributes)| (id.to_string(), pick(attributes)))
                    .collect(),
            )),
        }
    }

    /// Writes `new_value` to `attribute` of `id`.
    ///
    /// Returns `None` without touching anything when the value compared
    /// against (`forced_previous` if given, else the stored value) already
    /// equals `new_value`.
    pub fn write(
        &mut self,
        id: &EntityId,
        attribute: &str,
        new_value: Value,
        forced_previous: Option<Value>,
    ) -> Option<StateDelta> {
        let attributes = self.entry(id);
        let before = attributes.clone();
        let old_value = forced_previous
            .unwrap_or_else(|| before.get(attribute).cloned().unwrap_or(Value::Null));

        if old_value == new_value {
            return None;
        }

        attributes.insert(attribute.to_string(), new_value.clone());
        Some(StateDelta {
            entity_id: id.clone(),
            attribute: attribute.to_string(),
            old_value,
            new_value,
            before,
            after: attributes.clone(),
        })
    }

    /// Returns an entity's attributes, if it exists.
    pub fn attributes(&self, id: &EntityId) -> Option<&Attributes> {
        self.entities.get(id)
    }

    /// Number of entities known to the store.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if no entity has been touched.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
