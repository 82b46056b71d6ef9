//! Core environment context trait for Hearth apps.

use crate::error::EnvResult;
use crate::state::{ListenOptions, StateChange, StateReading};
use crate::types::{Kwargs, ListenHandle, ScheduleHandle};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;
use std::sync::Arc;

/// Callback fired by the scheduler with the kwargs it was registered with.
pub type TimerCallback = Arc<dyn Fn(&dyn HassContext, &Kwargs) -> EnvResult<()> + Send + Sync>;

/// Callback fired when a watched entity attribute changes.
pub type StateCallback = Arc<dyn Fn(&dyn HassContext, &StateChange) -> EnvResult<()> + Send + Sync>;

/// Callback fired for a named event; receives the event name and merged data.
pub type EventCallback = Arc<dyn Fn(&dyn HassContext, &str, &Kwargs) -> EnvResult<()> + Send + Sync>;

/// The central interface for environment interaction.
///
/// Apps are written against this trait only, so the same app code runs
/// against a live home-automation host or against the deterministic
/// simulation in `hearth_sim`.
///
/// # Re-entrancy
///
/// Callbacks receive the context they were fired from and may call any
/// method on it, including ones that fire further callbacks.
pub trait HassContext: Send + Sync {
    /// Returns the current instant.
    ///
    /// In simulation, this is the virtual clock.
    fn datetime(&self) -> NaiveDateTime;

    /// Returns the time-of-day part of the current instant.
    fn time(&self) -> NaiveTime {
        self.datetime().time()
    }

    /// Returns the date part of the current instant.
    fn date(&self) -> NaiveDate {
        self.datetime().date()
    }

    /// Runs `callback` once at `start`.
    fn run_at(
        &self,
        callback: TimerCallback,
        start: NaiveDateTime,
        kwargs: Kwargs,
    ) -> EnvResult<ScheduleHandle>;

    /// Runs `callback` once at `start` (alias kept for API parity).
    fn run_once(
        &self,
        callback: TimerCallback,
        start: NaiveDateTime,
        kwargs: Kwargs,
    ) -> EnvResult<ScheduleHandle>;

    /// Runs `callback` once, `delay` after the current instant.
    fn run_in(&self, callback: TimerCallback, delay: Duration, kwargs: Kwargs)
        -> EnvResult<ScheduleHandle>;

    /// Runs `callback` at `start` and every `interval` after it.
    fn run_every(
        &self,
        callback: TimerCallback,
        start: NaiveDateTime,
        interval: Duration,
        kwargs: Kwargs,
    ) -> EnvResult<ScheduleHandle>;

    /// Runs `callback` at `start` and every 24 hours after it.
    fn run_daily(
        &self,
        callback: TimerCallback,
        start: NaiveDateTime,
        kwargs: Kwargs,
    ) -> EnvResult<ScheduleHandle>;

    /// Runs `callback` at `start` and every hour after it.
    fn run_hourly(
        &self,
        callback: TimerCallback,
        start: NaiveDateTime,
        kwargs: Kwargs,
    ) -> EnvResult<ScheduleHandle>;

    /// Runs `callback` at `start` and every minute after it.
    fn run_minutely(
        &self,
        callback: TimerCallback,
        start: NaiveDateTime,
        kwargs: Kwargs,
    ) -> EnvResult<ScheduleHandle>;

    /// Schedules `callback` at sunrise.
    ///
    /// The simulation has no solar model; the handle is valid but never fires.
    fn run_at_sunrise(&self, callback: TimerCallback, kwargs: Kwargs) -> EnvResult<ScheduleHandle>;

    /// Schedules `callback` at sunset. See [`HassContext::run_at_sunrise`].
    fn run_at_sunset(&self, callback: TimerCallback, kwargs: Kwargs) -> EnvResult<ScheduleHandle>;

    /// Cancels a timer. Cancelling twice is fine; an unknown handle is an error.
    fn cancel_timer(&self, handle: ScheduleHandle) -> EnvResult<()>;

    /// Returns true if the timer exists, is not cancelled and can still fire.
    fn timer_running(&self, handle: ScheduleHandle) -> bool;

    /// Reads an attribute of an entity, or of every entity in a domain.
    ///
    /// `attribute` may be `"all"` to read whole attribute maps. `default`
    /// replaces falsy values.
    fn get_state(
        &self,
        entity: &str,
        attribute: &str,
        default: Option<Value>,
    ) -> EnvResult<StateReading>;

    /// Writes the `state` attribute of an entity.
    fn set_state(&self, entity: &str, state: Value) -> EnvResult<()>;

    /// Sets an entity's state to `"on"`; kwargs are forwarded to listeners.
    fn turn_on(&self, entity: &str, kwargs: Kwargs) -> EnvResult<()>;

    /// Sets an entity's state to `"off"`; kwargs are forwarded to listeners.
    fn turn_off(&self, entity: &str, kwargs: Kwargs) -> EnvResult<()>;

    /// Subscribes to changes of an entity or of every entity in a domain.
    fn listen_state(
        &self,
        callback: StateCallback,
        scope: &str,
        options: ListenOptions,
    ) -> EnvResult<ListenHandle>;

    /// Subscribes to a named event.
    fn listen_event(
        &self,
        callback: EventCallback,
        event: &str,
        kwargs: Kwargs,
    ) -> EnvResult<ListenHandle>;

    /// Fires a named event to every listener registered for it.
    fn fire_event(&self, event: &str, data: Kwargs) -> EnvResult<()>;

    /// Calls a host service, e.g. `"light/toggle"`.
    fn call_service(&self, service: &str, data: Kwargs) -> EnvResult<()>;

    /// Sends a notification.
    fn notify(&self, message: &str, name: Option<&str>) -> EnvResult<()>;

    /// Writes an informational log line on behalf of the app.
    fn log(&self, message: &str);

    /// Writes an error log line on behalf of the app.
    fn error(&self, message: &str);
}

/// Wraps a closure as a [`TimerCallback`].
pub fn timer_callback<F>(f: F) -> TimerCallback
where
    F: Fn(&dyn HassContext, &Kwargs) -> EnvResult<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wraps a closure as a [`StateCallback`].
pub fn state_callback<F>(f: F) -> StateCallback
where
    F: Fn(&dyn HassContext, &StateChange) -> EnvResult<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wraps a closure as an [`EventCallback`].
pub fn event_callback<F>(f: F) -> EventCallback
where
    F: Fn(&dyn HassContext, &str, &Kwargs) -> EnvResult<()> + Send + Sync + 'static,
{
    Arc::new(f)
}
