//! Listener registry and change matching.
//!
//! The notifier only decides *who* must be told about a change. Invocation
//! happens in `SimContext`, after every lock has been released, so listeners
//! can mutate the world they are being told about.

use crate::store::StateDelta;
use hearth_env::{
    AttributeFilter, EventCallback, Kwargs, ListenHandle, ListenOptions, Scope, StateCallback,
    StateChange,
};
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// One registered state listener.
pub struct ObserverRecord {
    /// Handle returned to the caller
    pub handle: ListenHandle,

    /// Callback to invoke
    pub callback: StateCallback,

    /// Attribute filter (named or wildcard)
    pub attribute: AttributeFilter,

    /// Required new value, if any
    pub new: Option<Value>,

    /// Required old value, if any
    pub old: Option<Value>,

    /// Kwargs stored at registration
    pub kwargs: Kwargs,
}

impl ObserverRecord {
    /// Returns true if all three filters accept the delta.
    pub fn accepts(&self, delta: &StateDelta) -> bool {
        let attribute_ok = self.attribute.matches(&delta.attribute);
        let new_ok = self.new.as_ref().map_or(true, |v| *v == delta.new_value);
        let old_ok = self.old.as_ref().map_or(true, |v| *v == delta.old_value);
        attribute_ok && new_ok && old_ok
    }

    /// Builds what this listener is shown for `delta`.
    fn change_for(&self, delta: &StateDelta, extra: &Kwargs) -> StateChange {
        let mut kwargs = self.kwargs.clone();
        kwargs.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));

        if self.attribute.is_all() {
            StateChange {
                entity_id: delta.entity_id.clone(),
                attribute: None,
                old: Value::Object(delta.before.clone()),
                new: Value::Object(delta.after.clone()),
                kwargs,
            }
        } else {
            StateChange {
                entity_id: delta.entity_id.clone(),
                attribute: Some(delta.attribute.clone()),
                old: delta.old_value.clone(),
                new: delta.new_value.clone(),
                kwargs,
            }
        }
    }
}

/// One registered event listener.
pub struct EventListener {
    /// Handle returned to the caller
    pub handle: ListenHandle,

    /// Event name listened for
    pub event: String,

    /// Callback to invoke
    pub callback: EventCallback,

    /// Kwargs stored at registration
    pub kwargs: Kwargs,
}

/// A listener invocation decided by the notifier.
pub struct Notification {
    /// Listener that matched
    pub handle: ListenHandle,

    /// Callback to invoke
    pub callback: StateCallback,

    /// What the callback receives
    pub change: StateChange,
}

/// Scope key -> listeners, plus event listeners.
#[derive(Default)]
pub struct Notifier {
    observers: HashMap<String, Vec<ObserverRecord>>,
    events: Vec<EventListener>,
}

impl Notifier {
    /// Creates an empty notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a state listener under `scope`.
    pub fn register(
        &mut self,
        handle: ListenHandle,
        scope: &Scope,
        callback: StateCallback,
        options: ListenOptions,
    ) -> ListenHandle {
        let key = scope.key();
        debug!(%handle, scope = %key, attribute = ?options.attribute, "state listener registered");

        self.observers.entry(key).or_default().push(ObserverRecord {
            handle,
            callback,
            attribute: options.attribute,
            new: options.new,
            old: options.old,
            kwargs: options.kwargs,
        });
        handle
    }

    /// Appends an event listener.
    pub fn register_event(
        &mut self,
        handle: ListenHandle,
        event: &str,
        callback: EventCallback,
        kwargs: Kwargs,
    ) -> ListenHandle {
        debug!(%handle, event, "event listener registered");
        self.events.push(EventListener {
            handle,
            event: event.to_string(),
            callback,
            kwargs,
        });
        handle
    }

    /// Returns the listeners `delta` must be delivered to.
    ///
    /// Domain listeners come first, then listeners on the exact entity, each
    /// group in registration order.
    pub fn matching(&self, delta: &StateDelta, extra: &Kwargs) -> Vec<Notification> {
        let domain = self.observers.get(delta.entity_id.domain());
        let entity = self.observers.get(&delta.entity_id.to_string());

        domain
            .into_iter()
            .chain(entity)
            .flatten()
            .filter(|record| record.accepts(delta))
            .map(|record| Notification {
                handle: record.handle,
                callback: record.callback.clone(),
                change: record.change_for(delta, extra),
            })
            .collect()
    }

    /// Returns `(callback, merged kwargs)` for every listener of `event`.
    pub fn event_targets(&self, event: &str, data: &Kwargs) -> Vec<(EventCallback, Kwargs)> {
        self.events
            .iter()
            .filter(|listener| listener.event == event)
            .map(|listener| {
                let mut kwargs = listener.kwargs.clone();
                kwargs.extend(data.iter().map(|(k, v)| (k.clone(), v.clone())));
                (listener.callback.clone(), kwargs)
            })
            .collect()
    }

    /// Number of state listeners registered.
    pub fn listener_count(&self) -> usize {
        self.observers.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StateStore;
    use hearth_env::{event_callback, state_callback, EntityId};
    use serde_json::json;

    fn noop() -> StateCallback {
        state_callback(|_, _| Ok(()))
    }

    fn delta(entity: &str, attribute: &str, new: Value) -> StateDelta {
        let mut store = StateStore::new();
        let id = EntityId::parse(entity).unwrap();
        store.write(&id, "state", json!("off"), None);
        store.write(&id, attribute, new, None).unwrap()
    }

    fn listen(n: &mut Notifier, scope: &str, options: ListenOptions) -> ListenHandle {
        n.register(ListenHandle::new(), &Scope::parse(scope).unwrap(), noop(), options)
    }

    #[test]
    fn test_domain_listeners_precede_entity_listeners() {
        let mut n = Notifier::new();
        let entity = listen(&mut n, "light.porch", ListenOptions::new());
        let domain = listen(&mut n, "light", ListenOptions::new());
        let _other = listen(&mut n, "switch", ListenOptions::new());

        let hits = n.matching(&delta("light.porch", "state", json!("on")), &Kwargs::new());
        let order: Vec<_> = hits.iter().map(|h| h.handle).collect();
        assert_eq!(order, vec![domain, entity]);
    }

    #[test]
    fn test_entity_listener_ignores_siblings() {
        let mut n = Notifier::new();
        listen(&mut n, "light.porch", ListenOptions::new());

        let hits = n.matching(&delta("light.hall", "state", json!("on")), &Kwargs::new());
        assert!(hits.is_empty());
    }

    #[test]
    fn test_value_filters() {
        let mut n = Notifier::new();
        let on_from_off = listen(
            &mut n,
            "light.porch",
            ListenOptions::new().new_value("on").old_value("off"),
        );
        let _to_dim = listen(&mut n, "light.porch", ListenOptions::new().new_value("dim"));

        let hits = n.matching(&delta("light.porch", "state", json!("on")), &Kwargs::new());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].handle, on_from_off);
        assert_eq!(hits[0].change.attribute.as_deref(), Some("state"));
        assert_eq!(hits[0].change.old, json!("off"));
        assert_eq!(hits[0].change.new, json!("on"));
    }

    #[test]
    fn test_attribute_filter() {
        let mut n = Notifier::new();
        let _state = listen(&mut n, "light.porch", ListenOptions::new());
        let brightness = listen(&mut n, "light.porch", ListenOptions::new().attribute("brightness"));

        let hits = n.matching(&delta("light.porch", "brightness", json!(200)), &Kwargs::new());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].handle, brightness);
        assert_eq!(hits[0].change.old, Value::Null);
    }

    #[test]
    fn test_wildcard_listener_gets_snapshots() {
        let mut n = Notifier::new();
        listen(&mut n, "light", ListenOptions::new().attribute("all"));

        let hits = n.matching(&delta("light.porch", "brightness", json!(200)), &Kwargs::new());
        assert_eq!(hits.len(), 1);
        let change = &hits[0].change;
        assert_eq!(change.attribute, None);
        assert_eq!(change.old, json!({"state": "off"}));
        assert_eq!(change.new, json!({"state": "off", "brightness": 200}));
    }

    #[test]
    fn test_extra_kwargs_override_registration_kwargs() {
        let mut n = Notifier::new();
        listen(
            &mut n,
            "light.porch",
            ListenOptions::new().kwarg("source", "app").kwarg("room", "porch"),
        );

        let mut extra = Kwargs::new();
        extra.insert("source".into(), json!("driver"));
        let hits = n.matching(&delta("light.porch", "state", json!("on")), &extra);
        assert_eq!(hits[0].change.kwargs.get("source"), Some(&json!("driver")));
        assert_eq!(hits[0].change.kwargs.get("room"), Some(&json!("porch")));
    }

    #[test]
    fn test_event_targets_merge_data() {
        let mut n = Notifier::new();
        let mut kwargs = Kwargs::new();
        kwargs.insert("who".into(), json!("listener"));
        kwargs.insert("keep".into(), json!(1));
        n.register_event(ListenHandle::new(), "doorbell", event_callback(|_, _, _| Ok(())), kwargs);
        n.register_event(ListenHandle::new(), "alarm", event_callback(|_, _, _| Ok(())), Kwargs::new());

        let mut data = Kwargs::new();
        data.insert("who".into(), json!("visitor"));
        let targets = n.event_targets("doorbell", &data);
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].1.get("who"), Some(&json!("visitor")));
        assert_eq!(targets[0].1.get("keep"), Some(&json!(1)));
    }
}
