//! Common types for the Hearth environment abstraction.

use crate::error::{EnvError, EnvResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Keyword arguments attached to callbacks, listeners and service calls.
pub type Kwargs = serde_json::Map<String, serde_json::Value>;

/// Fully-qualified entity identifier, `<domain>.<object_id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId {
    domain: String,
    object_id: String,
}

impl EntityId {
    /// Parses an entity id, rejecting anything without exactly one separator.
    pub fn parse(raw: &str) -> EnvResult<Self> {
        let (domain, object_id) = raw
            .split_once('.')
            .ok_or_else(|| EnvError::malformed(raw))?;
        if domain.is_empty() || object_id.is_empty() || object_id.contains('.') {
            return Err(EnvError::malformed(raw));
        }
        Ok(Self {
            domain: domain.to_string(),
            object_id: object_id.to_string(),
        })
    }

    /// Returns the domain prefix (e.g. `light`).
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Returns the part after the separator.
    pub fn object_id(&self) -> &str {
        &self.object_id
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.domain, self.object_id)
    }
}

impl FromStr for EntityId {
    type Err = EnvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for EntityId {
    type Error = EnvError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.to_string()
    }
}

/// What a state query or listener is keyed on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// A single entity
    Entity(EntityId),

    /// Every entity whose id starts with `<domain>.`
    Domain(String),
}

impl Scope {
    /// Interprets `raw` as an entity id if it contains a separator, else a domain.
    pub fn parse(raw: &str) -> EnvResult<Self> {
        if raw.contains('.') {
            EntityId::parse(raw).map(Scope::Entity)
        } else if raw.is_empty() {
            Err(EnvError::malformed(raw))
        } else {
            Ok(Scope::Domain(raw.to_string()))
        }
    }

    /// Returns the key this scope is stored under.
    pub fn key(&self) -> String {
        match self {
            Scope::Entity(id) => id.to_string(),
            Scope::Domain(domain) => domain.clone(),
        }
    }
}

macro_rules! uuid_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Creates a new random handle.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates a handle from a UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_handle!(
    /// Opaque handle to a registered timer.
    ScheduleHandle
);

uuid_handle!(
    /// Opaque handle to a registered state or event listener.
    ListenHandle
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_parse() {
        let id = EntityId::parse("binary_sensor.motion").unwrap();
        assert_eq!(id.domain(), "binary_sensor");
        assert_eq!(id.object_id(), "motion");
        assert_eq!(id.to_string(), "binary_sensor.motion");
    }

    #[test]
    fn test_entity_id_rejects_missing_separator() {
        for raw in ["light", "", ".kitchen", "light.", "light.a.b"] {
            assert!(
                matches!(EntityId::parse(raw), Err(EnvError::MalformedEntityId(_))),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_scope_parse() {
        assert_eq!(Scope::parse("light").unwrap(), Scope::Domain("light".into()));
        assert!(matches!(Scope::parse("light.porch").unwrap(), Scope::Entity(_)));
        assert!(Scope::parse("").is_err());
        assert_eq!(Scope::parse("light.porch").unwrap().key(), "light.porch");
    }

    #[test]
    fn test_entity_id_serde_roundtrip_is_plain_string() {
        let id = EntityId::parse("switch.fan").unwrap();
        let json = serde_json::to_value(&id).unwrap();
        assert_eq!(json, serde_json::json!("switch.fan"));

        let bad: Result<EntityId, _> = serde_json::from_value(serde_json::json!("fan"));
        assert!(bad.is_err());
    }

    #[test]
    fn test_handles_are_distinct() {
        assert_ne!(ScheduleHandle::new(), ScheduleHandle::new());
        let uuid = Uuid::new_v4();
        assert_eq!(ListenHandle::from_uuid(uuid).as_uuid(), uuid);
    }
}
