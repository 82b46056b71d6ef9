//! Simulation context implementing HassContext for deterministic testing.

use crate::calls::{CallLog, CallRecord};
use crate::clock::VirtualClock;
use crate::handles::HandleMint;
use crate::notifier::Notifier;
use crate::scheduler::Scheduler;
use crate::store::StateStore;

use chrono::{Duration, NaiveDateTime};
use hearth_env::{
    EntityId, EnvError, EnvResult, EventCallback, HassContext, Kwargs, ListenHandle,
    ListenOptions, Scope, ScheduleHandle, StateCallback, StateReading, TimerCallback,
    STATE_ATTRIBUTE,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info};

/// Locks a mutex, recovering the data if a panicking callback poisoned it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Options for [`SimContext::set`].
#[derive(Debug, Clone)]
pub struct SetOptions {
    /// Attribute to write (default: `state`)
    pub attribute: String,

    /// Value to report (and compare against) as the previous one
    pub previous: Option<Value>,

    /// Whether listeners run; defaults to "not in setup phase"
    pub trigger: Option<bool>,

    /// Extra kwargs merged over each listener's own kwargs
    pub kwargs: Kwargs,
}

impl Default for SetOptions {
    fn default() -> Self {
        Self {
            attribute: STATE_ATTRIBUTE.to_string(),
            previous: None,
            trigger: None,
            kwargs: Kwargs::new(),
        }
    }
}

impl SetOptions {
    /// Default options: write `state`, trigger unless in setup.
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes `attribute` instead of `state`.
    pub fn attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = attribute.into();
        self
    }

    /// Forces the previous value.
    pub fn previous(mut self, value: impl Into<Value>) -> Self {
        self.previous = Some(value.into());
        self
    }

    /// Forces listeners on or off regardless of the setup phase.
    pub fn trigger(mut self, trigger: bool) -> Self {
        self.trigger = Some(trigger);
        self
    }

    /// Adds an extra kwarg for listeners.
    pub fn kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }
}

/// Simulation context backed by a virtual clock and an in-memory state store.
///
/// This implements `HassContext` using:
/// - A virtual clock that only moves through [`SimContext::advance_to`]
/// - A timer arena fired in instant order
/// - An entity store whose writes notify matching listeners
/// - A seeded handle mint, so handles repeat across runs with the same seed
///
/// Clones share all state. No lock is held while a callback runs, so
/// callbacks may re-enter the context freely.
#[derive(Clone)]
pub struct SimContext {
    /// Master seed for this simulation
    seed: u64,

    /// When false, side-effecting primitives are recorded but not applied
    update_states: bool,

    /// Current simulated instant
    clock: Arc<Mutex<VirtualClock>>,

    /// Registered timers
    scheduler: Arc<Mutex<Scheduler>>,

    /// Entity attributes
    store: Arc<Mutex<StateStore>>,

    /// State and event listeners
    notifier: Arc<Mutex<Notifier>>,

    /// Handle source
    handles: Arc<Mutex<HandleMint>>,

    /// Every call made through `HassContext`
    calls: Arc<Mutex<CallLog>>,

    /// Set while a setup phase is active
    setup_active: Arc<AtomicBool>,
}

impl SimContext {
    /// Creates a new SimContext with the given seed, starting at `start`.
    pub fn new(seed: u64, start: NaiveDateTime) -> Self {
        Self {
            seed,
            update_states: true,
            clock: Arc::new(Mutex::new(VirtualClock::new(start))),
            scheduler: Arc::new(Mutex::new(Scheduler::new())),
            store: Arc::new(Mutex::new(StateStore::new())),
            notifier: Arc::new(Mutex::new(Notifier::new())),
            handles: Arc::new(Mutex::new(HandleMint::new(seed))),
            calls: Arc::new(Mutex::new(CallLog::new())),
            setup_active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Enables or disables applying side effects of app calls.
    pub fn with_update_states(mut self, update_states: bool) -> Self {
        self.update_states = update_states;
        self
    }

    /// Returns the context's seed.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Returns the current simulated instant.
    pub fn now(&self) -> NaiveDateTime {
        lock(&self.clock).now()
    }

    // ------------------------------------------------------------------
    // Clock & scheduler
    // ------------------------------------------------------------------

    /// Advances the clock to `target`, firing every due timer on the way.
    ///
    /// Timers fire in instant order (registration order on ties) and all see
    /// the pre-advance instant as "now"; the clock moves once the batch is
    /// done. A failing callback aborts the batch and leaves the clock where
    /// it was; fires it prevented stay due for the next advance.
    pub fn advance_to(&self, target: NaiveDateTime) -> EnvResult<()> {
        let current = {
            let clock = lock(&self.clock);
            if !clock.check_target(target)? {
                return Ok(());
            }
            clock.now()
        };

        let due = lock(&self.scheduler).collect_due(current, target);
        debug!(from = %current, to = %target, due = due.len(), "advancing clock");

        for (i, fire) in due.iter().enumerate() {
            let next = lock(&self.scheduler).begin_fire(fire.handle);
            let Some((callback, kwargs)) = next else {
                continue;
            };
            debug!(handle = %fire.handle, at = %fire.at, "timer fired");
            if let Err(e) = callback(self, &kwargs) {
                lock(&self.scheduler).release(&due[i + 1..]);
                return Err(e);
            }
        }

        lock(&self.clock).settle(target);
        Ok(())
    }

    /// Advances the clock by `delta`.
    pub fn advance_by(&self, delta: Duration) -> EnvResult<()> {
        let target = self
            .now()
            .checked_add_signed(delta)
            .ok_or_else(|| EnvError::invalid("advance target out of range"))?;
        self.advance_to(target)
    }

    /// Returns how often a timer has fired.
    pub fn fire_count(&self, handle: ScheduleHandle) -> EnvResult<u64> {
        lock(&self.scheduler).fire_count(handle)
    }

    /// Returns the total number of timer fires so far.
    pub fn total_fires(&self) -> u64 {
        lock(&self.scheduler).total_fires()
    }

    /// Returns the number of timers ever registered.
    pub fn timer_count(&self) -> usize {
        lock(&self.scheduler).len()
    }

    fn schedule(
        &self,
        method: &str,
        callback: TimerCallback,
        anchor: NaiveDateTime,
        period: Duration,
        kwargs: Kwargs,
    ) -> EnvResult<ScheduleHandle> {
        self.record(
            method,
            json!({
                "start": anchor,
                "interval_secs": period.num_seconds(),
                "kwargs": kwargs,
            }),
        );

        let handle = lock(&self.handles).schedule_handle();
        let mut scheduler = lock(&self.scheduler);
        scheduler.register(handle, anchor, period, callback, kwargs)?;
        if !self.update_states {
            scheduler.cancel(handle)?;
        }
        Ok(handle)
    }

    fn schedule_dormant(
        &self,
        method: &str,
        callback: TimerCallback,
        kwargs: Kwargs,
    ) -> EnvResult<ScheduleHandle> {
        self.record(method, json!({ "kwargs": kwargs }));
        let handle = lock(&self.handles).schedule_handle();
        let anchor = self.now();
        Ok(lock(&self.scheduler).register_dormant(handle, anchor, callback, kwargs))
    }

    // ------------------------------------------------------------------
    // State store & notifier
    // ------------------------------------------------------------------

    /// Writes an entity attribute and notifies matching listeners.
    ///
    /// Equal old and new values make this a no-op. During a setup phase the
    /// write is applied silently unless `options.trigger` says otherwise.
    pub fn set(&self, entity: &str, value: impl Into<Value>, options: SetOptions) -> EnvResult<()> {
        let id = EntityId::parse(entity)?;
        let trigger = options.trigger.unwrap_or(!self.is_setup_active());

        let delta = lock(&self.store).write(&id, &options.attribute, value.into(), options.previous);
        let Some(delta) = delta else {
            return Ok(());
        };
        if !trigger {
            debug!(entity = %id, attribute = %delta.attribute, "state set silently");
            return Ok(());
        }

        let notifications = lock(&self.notifier).matching(&delta, &options.kwargs);
        debug!(
            entity = %id,
            attribute = %delta.attribute,
            listeners = notifications.len(),
            "state changed"
        );
        for notification in notifications {
            (notification.callback)(self, &notification.change)?;
        }
        Ok(())
    }

    /// Reads the `state` attribute of an entity.
    pub fn state(&self, entity: &str) -> EnvResult<Value> {
        let reading = lock(&self.store).read(entity, STATE_ATTRIBUTE, None)?;
        Ok(reading.into_value())
    }

    /// Number of state listeners registered.
    pub fn listener_count(&self) -> usize {
        lock(&self.notifier).listener_count()
    }

    // ------------------------------------------------------------------
    // Setup phase
    // ------------------------------------------------------------------

    /// Enters a setup phase that ends when the returned guard is dropped.
    ///
    /// State written during the phase does not notify listeners. The flag is
    /// restored on every exit path, including `?` returns and panics.
    pub fn setup(&self) -> SetupGuard<'_> {
        let previous = self.setup_active.swap(true, Ordering::SeqCst);
        SetupGuard {
            ctx: self,
            previous,
        }
    }

    /// Runs `f` inside a setup phase.
    pub fn with_setup<R>(&self, f: impl FnOnce(&Self) -> R) -> R {
        let _guard = self.setup();
        f(self)
    }

    /// Sets the setup flag. Prefer [`SimContext::setup`].
    pub fn enter_setup(&self) {
        self.setup_active.store(true, Ordering::SeqCst);
    }

    /// Clears the setup flag.
    pub fn exit_setup(&self) {
        self.setup_active.store(false, Ordering::SeqCst);
    }

    /// Returns true while a setup phase is active.
    pub fn is_setup_active(&self) -> bool {
        self.setup_active.load(Ordering::SeqCst)
    }

    // ------------------------------------------------------------------
    // Call recording
    // ------------------------------------------------------------------

    fn record(&self, method: &str, args: Value) {
        let at = self.now();
        lock(&self.calls).record(method, args, at);
    }

    /// Returns every recorded call to `method`.
    pub fn calls(&self, method: &str) -> Vec<CallRecord> {
        lock(&self.calls).calls(method)
    }

    /// Returns how often `method` was called.
    pub fn call_count(&self, method: &str) -> usize {
        lock(&self.calls).count(method)
    }

    /// Returns a copy of the whole call log.
    pub fn call_log(&self) -> CallLog {
        lock(&self.calls).clone()
    }

    /// Forgets all recorded calls (e.g. those made by `initialize`).
    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }
}

/// Guard returned by [`SimContext::setup`].
pub struct SetupGuard<'a> {
    ctx: &'a SimContext,
    previous: bool,
}

impl Drop for SetupGuard<'_> {
    fn drop(&mut self) {
        self.ctx.setup_active.store(self.previous, Ordering::SeqCst);
    }
}

impl HassContext for SimContext {
    fn datetime(&self) -> NaiveDateTime {
        self.now()
    }

    fn run_at(
        &self,
        callback: TimerCallback,
        start: NaiveDateTime,
        kwargs: Kwargs,
    ) -> EnvResult<ScheduleHandle> {
        self.schedule("run_at", callback, start, Duration::zero(), kwargs)
    }

    fn run_once(
        &self,
        callback: TimerCallback,
        start: NaiveDateTime,
        kwargs: Kwargs,
    ) -> EnvResult<ScheduleHandle> {
        self.schedule("run_once", callback, start, Duration::zero(), kwargs)
    }

    fn run_in(
        &self,
        callback: TimerCallback,
        delay: Duration,
        kwargs: Kwargs,
    ) -> EnvResult<ScheduleHandle> {
        if delay < Duration::zero() {
            return Err(EnvError::invalid("run_in delay must not be negative"));
        }
        let start = self
            .now()
            .checked_add_signed(delay)
            .ok_or_else(|| EnvError::invalid("run_in delay out of range"))?;
        self.schedule("run_in", callback, start, Duration::zero(), kwargs)
    }

    fn run_every(
        &self,
        callback: TimerCallback,
        start: NaiveDateTime,
        interval: Duration,
        kwargs: Kwargs,
    ) -> EnvResult<ScheduleHandle> {
        if interval <= Duration::zero() {
            return Err(EnvError::invalid("run_every interval must be positive"));
        }
        self.schedule("run_every", callback, start, interval, kwargs)
    }

    fn run_daily(
        &self,
        callback: TimerCallback,
        start: NaiveDateTime,
        kwargs: Kwargs,
    ) -> EnvResult<ScheduleHandle> {
        self.schedule("run_daily", callback, start, Duration::days(1), kwargs)
    }

    fn run_hourly(
        &self,
        callback: TimerCallback,
        start: NaiveDateTime,
        kwargs: Kwargs,
    ) -> EnvResult<ScheduleHandle> {
        self.schedule("run_hourly", callback, start, Duration::hours(1), kwargs)
    }

    fn run_minutely(
        &self,
        callback: TimerCallback,
        start: NaiveDateTime,
        kwargs: Kwargs,
    ) -> EnvResult<ScheduleHandle> {
        self.schedule("run_minutely", callback, start, Duration::minutes(1), kwargs)
    }

    fn run_at_sunrise(&self, callback: TimerCallback, kwargs: Kwargs) -> EnvResult<ScheduleHandle> {
        self.schedule_dormant("run_at_sunrise", callback, kwargs)
    }

    fn run_at_sunset(&self, callback: TimerCallback, kwargs: Kwargs) -> EnvResult<ScheduleHandle> {
        self.schedule_dormant("run_at_sunset", callback, kwargs)
    }

    fn cancel_timer(&self, handle: ScheduleHandle) -> EnvResult<()> {
        self.record("cancel_timer", json!({ "handle": handle }));
        lock(&self.scheduler).cancel(handle)
    }

    fn timer_running(&self, handle: ScheduleHandle) -> bool {
        self.record("timer_running", json!({ "handle": handle }));
        lock(&self.scheduler).is_running(handle)
    }

    fn get_state(
        &self,
        entity: &str,
        attribute: &str,
        default: Option<Value>,
    ) -> EnvResult<StateReading> {
        self.record(
            "get_state",
            json!({ "entity_id": entity, "attribute": attribute, "default": default }),
        );
        debug!(entity, attribute, "getting state");
        lock(&self.store).read(entity, attribute, default.as_ref())
    }

    fn set_state(&self, entity: &str, state: Value) -> EnvResult<()> {
        self.record("set_state", json!({ "entity_id": entity, "state": state }));
        self.set(entity, state, SetOptions::new())
    }

    fn turn_on(&self, entity: &str, kwargs: Kwargs) -> EnvResult<()> {
        self.record("turn_on", json!({ "entity_id": entity, "kwargs": kwargs }));
        if !self.update_states {
            return Ok(());
        }
        self.set(entity, "on", SetOptions { kwargs, ..SetOptions::new() })
    }

    fn turn_off(&self, entity: &str, kwargs: Kwargs) -> EnvResult<()> {
        self.record("turn_off", json!({ "entity_id": entity, "kwargs": kwargs }));
        if !self.update_states {
            return Ok(());
        }
        self.set(entity, "off", SetOptions { kwargs, ..SetOptions::new() })
    }

    fn listen_state(
        &self,
        callback: StateCallback,
        scope: &str,
        options: ListenOptions,
    ) -> EnvResult<ListenHandle> {
        self.record(
            "listen_state",
            json!({
                "entity_id": scope,
                "attribute": options.attribute,
                "new": options.new,
                "old": options.old,
                "kwargs": options.kwargs,
            }),
        );
        let scope = Scope::parse(scope)?;
        let handle = lock(&self.handles).listen_handle();
        Ok(lock(&self.notifier).register(handle, &scope, callback, options))
    }

    fn listen_event(
        &self,
        callback: EventCallback,
        event: &str,
        kwargs: Kwargs,
    ) -> EnvResult<ListenHandle> {
        self.record("listen_event", json!({ "event": event, "kwargs": kwargs }));
        let handle = lock(&self.handles).listen_handle();
        Ok(lock(&self.notifier).register_event(handle, event, callback, kwargs))
    }

    fn fire_event(&self, event: &str, data: Kwargs) -> EnvResult<()> {
        self.record("fire_event", json!({ "event": event, "data": data }));
        let targets = lock(&self.notifier).event_targets(event, &data);
        debug!(event, listeners = targets.len(), "event fired");
        for (callback, kwargs) in targets {
            callback(self, event, &kwargs)?;
        }
        Ok(())
    }

    fn call_service(&self, service: &str, data: Kwargs) -> EnvResult<()> {
        self.record("call_service", json!({ "service": service, "data": data }));
        Ok(())
    }

    fn notify(&self, message: &str, name: Option<&str>) -> EnvResult<()> {
        self.record("notify", json!({ "message": message, "name": name }));
        Ok(())
    }

    fn log(&self, message: &str) {
        self.record("log", json!({ "message": message }));
        info!(target: "hearth::app", "{}", message);
    }

    fn error(&self, message: &str) {
        self.record("error", json!({ "message": message }));
        error!(target: "hearth::app", "{}", message);
    }
}
