//! Timer registry for the virtual clock.
//!
//! Records live in an insertion-ordered arena and are never removed:
//! cancellation only flips a flag, so a handle stays resolvable for the
//! lifetime of the simulation.

use crate::clock::first_at_or_after;
use chrono::{Duration, NaiveDateTime};
use hearth_env::{EnvError, EnvResult, Kwargs, ScheduleHandle, TimerCallback};
use std::collections::HashMap;
use tracing::debug;

/// One registered timer.
pub struct ScheduleRecord {
    /// Handle returned to the caller
    pub handle: ScheduleHandle,

    /// First (or only) fire instant
    pub anchor: NaiveDateTime,

    /// Spacing between fires; zero for one-shot timers
    pub period: Duration,

    /// Callback to invoke
    pub callback: TimerCallback,

    /// Kwargs passed on every invocation
    pub kwargs: Kwargs,

    /// Number of times the callback has been invoked
    pub fire_count: u64,

    /// Smallest instant not yet claimed by an advance; `None` once exhausted
    pub next_due: Option<NaiveDateTime>,

    /// Cancelled records are kept but never fire again
    pub canceled: bool,
}

impl ScheduleRecord {
    /// Returns true for timers that fire exactly once.
    pub fn is_one_shot(&self) -> bool {
        self.period.is_zero()
    }
}

/// A fire claimed by an advance, waiting to be invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueFire {
    /// Instant the fire belongs to
    pub at: NaiveDateTime,

    /// Timer that fires
    pub handle: ScheduleHandle,
}

/// All timers of a simulation.
#[derive(Default)]
pub struct Scheduler {
    /// Records in registration order
    records: Vec<ScheduleRecord>,

    /// Handle -> position in `records`
    index: HashMap<ScheduleHandle, usize>,
}

impl Scheduler {
    /// Creates an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a timer.
    ///
    /// A zero `period` registers a one-shot. An unfired one-shot whose anchor
    /// is already in the past fires on the next advance.
    pub fn register(
        &mut self,
        handle: ScheduleHandle,
        anchor: NaiveDateTime,
        period: Duration,
        callback: TimerCallback,
        kwargs: Kwargs,
    ) -> EnvResult<ScheduleHandle> {
        if period < Duration::zero() {
            return Err(EnvError::invalid(format!(
                "timer period must not be negative, got {}s",
                period.num_seconds()
            )));
        }
        debug!(%handle, %anchor, period_secs = period.num_seconds(), "timer registered");

        self.index.insert(handle, self.records.len());
        self.records.push(ScheduleRecord {
            handle,
            anchor,
            period,
            callback,
            kwargs,
            fire_count: 0,
            next_due: Some(anchor),
            canceled: false,
        });
        Ok(handle)
    }

    /// Registers a timer that holds a valid handle but is never due.
    ///
    /// Used for schedules the simulation cannot model, such as sunrise.
    pub fn register_dormant(
        &mut self,
        handle: ScheduleHandle,
        anchor: NaiveDateTime,
        callback: TimerCallback,
        kwargs: Kwargs,
    ) -> ScheduleHandle {
        debug!(%handle, "dormant timer registered");
        self.index.insert(handle, self.records.len());
        self.records.push(ScheduleRecord {
            handle,
            anchor,
            period: Duration::zero(),
            callback,
            kwargs,
            fire_count: 0,
            next_due: None,
            canceled: false,
        });
        handle
    }

    /// Marks a timer cancelled. Idempotent.
    pub fn cancel(&mut self, handle: ScheduleHandle) -> EnvResult<()> {
        let record = self.get_mut(handle)?;
        if !record.canceled {
            debug!(%handle, fires = record.fire_count, "timer cancelled");
        }
        record.canceled = true;
        Ok(())
    }

    /// Looks up a record.
    pub fn get(&self, handle: ScheduleHandle) -> EnvResult<&ScheduleRecord> {
        self.index
            .get(&handle)
            .and_then(|&i| self.records.get(i))
            .ok_or(EnvError::UnknownHandle(handle))
    }

    fn get_mut(&mut self, handle: ScheduleHandle) -> EnvResult<&mut ScheduleRecord> {
        self.index
            .get(&handle)
            .and_then(|&i| self.records.get_mut(i))
            .ok_or(EnvError::UnknownHandle(handle))
    }

    /// Returns true if the timer can still fire.
    pub fn is_running(&self, handle: ScheduleHandle) -> bool {
        self.get(handle)
            .map(|r| !r.canceled && r.next_due.is_some())
            .unwrap_or(false)
    }

    /// Returns how often a timer has fired.
    pub fn fire_count(&self, handle: ScheduleHandle) -> EnvResult<u64> {
        self.get(handle).map(|r| r.fire_count)
    }

    /// Total fires across every timer.
    pub fn total_fires(&self) -> u64 {
        self.records.iter().map(|r| r.fire_count).sum()
    }

    /// Number of registered timers, cancelled ones included.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no timer was ever registered.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Claims every fire due in `[current, target]`, ordered by instant.
    ///
    /// Fires sharing an instant keep registration order. Claimed instants are
    /// consumed: `next_due` moves past them, so a nested advance issued from a
    /// callback will not claim them again.
    pub fn collect_due(&mut self, current: NaiveDateTime, target: NaiveDateTime) -> Vec<DueFire> {
        let mut due = Vec::new();

        for record in self.records.iter_mut().filter(|r| !r.canceled) {
            let Some(next) = record.next_due else {
                continue;
            };

            if record.is_one_shot() {
                if next <= target {
                    due.push(DueFire {
                        at: next,
                        handle: record.handle,
                    });
                    record.next_due = None;
                }
                continue;
            }

            // Instants before `current` were passed without this timer being
            // asked; they are skipped, not replayed.
            let mut at = first_at_or_after(next, record.period, current);
            while let Some(instant) = at.filter(|t| *t <= target) {
                due.push(DueFire {
                    at: instant,
                    handle: record.handle,
                });
                at = instant.checked_add_signed(record.period);
            }
            record.next_due = at;
        }

        due.sort_by_key(|fire| fire.at);
        due
    }

    /// Returns claimed but unfired fires to their timers.
    ///
    /// Each timer's `next_due` goes back to its earliest returned instant, so
    /// the next advance claims those instants again. Used when a batch is
    /// aborted by a failing callback.
    pub fn release(&mut self, unfired: &[DueFire]) {
        for fire in unfired {
            if let Ok(record) = self.get_mut(fire.handle) {
                let next = record.next_due.map_or(fire.at, |n| n.min(fire.at));
                record.next_due = Some(next);
                debug!(handle = %fire.handle, next_due = %next, "unfired timer released");
            }
        }
    }

    /// Prepares a claimed fire for invocation.
    ///
    /// Returns `None` if the timer was cancelled after being claimed (for
    /// example by an earlier callback in the same batch). Otherwise bumps
    /// `fire_count` and returns what to invoke.
    pub fn begin_fire(&mut self, handle: ScheduleHandle) -> Option<(TimerCallback, Kwargs)> {
        let record = self.get_mut(handle).ok()?;
        if record.canceled {
            debug!(%handle, "skipping fire of timer cancelled mid-batch");
            return None;
        }
        record.fire_count += 1;
        Some((record.callback.clone(), record.kwargs.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use hearth_env::timer_callback;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2000, 5, 10)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn noop() -> TimerCallback {
        timer_callback(|_, _| Ok(()))
    }

    fn register(s: &mut Scheduler, anchor: NaiveDateTime, period_secs: i64) -> ScheduleHandle {
        s.register(
            ScheduleHandle::new(),
            anchor,
            Duration::seconds(period_secs),
            noop(),
            Kwargs::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_one_shot_claimed_once() {
        let mut s = Scheduler::new();
        let h = register(&mut s, at(12, 10, 0), 0);

        assert!(s.collect_due(at(12, 0, 0), at(12, 5, 0)).is_empty());
        let due = s.collect_due(at(12, 5, 0), at(12, 20, 0));
        assert_eq!(due, vec![DueFire { at: at(12, 10, 0), handle: h }]);
        assert!(s.collect_due(at(12, 20, 0), at(13, 0, 0)).is_empty());
        assert!(!s.is_running(h));
    }

    #[test]
    fn test_one_shot_in_past_still_fires() {
        let mut s = Scheduler::new();
        let h = register(&mut s, at(11, 0, 0), 0);

        let due = s.collect_due(at(12, 0, 0), at(12, 0, 1));
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].handle, h);
    }

    #[test]
    fn test_repeating_partial_advances() {
        let mut s = Scheduler::new();
        let h = register(&mut s, at(12, 10, 0), 90);

        assert_eq!(s.collect_due(at(12, 0, 0), at(12, 5, 0)).len(), 0);
        assert_eq!(s.collect_due(at(12, 5, 0), at(12, 10, 0)).len(), 1);
        assert_eq!(s.collect_due(at(12, 10, 0), at(12, 16, 0)).len(), 4);
        assert_eq!(s.get(h).unwrap().next_due, Some(at(12, 17, 30)));
    }

    #[test]
    fn test_repeating_anchor_in_past_skips_missed_instants() {
        let mut s = Scheduler::new();
        let h = register(&mut s, at(11, 0, 0), 60);

        let due = s.collect_due(at(12, 0, 0), at(12, 1, 0));
        assert_eq!(
            due.iter().map(|d| d.at).collect::<Vec<_>>(),
            vec![at(12, 0, 0), at(12, 1, 0)]
        );
        // Next advance must not replay 12:01
        let due = s.collect_due(at(12, 1, 0), at(12, 2, 0));
        assert_eq!(due.iter().map(|d| d.at).collect::<Vec<_>>(), vec![at(12, 2, 0)]);
        assert_eq!(s.get(h).unwrap().next_due, Some(at(12, 3, 0)));
    }

    #[test]
    fn test_due_sorted_by_instant_then_registration() {
        let mut s = Scheduler::new();
        let late = register(&mut s, at(12, 20, 0), 0);
        let every = register(&mut s, at(12, 10, 0), 600);
        let early = register(&mut s, at(12, 10, 0), 0);

        let due = s.collect_due(at(12, 0, 0), at(12, 20, 0));
        let order: Vec<_> = due.iter().map(|d| (d.at, d.handle)).collect();
        assert_eq!(
            order,
            vec![
                (at(12, 10, 0), every),
                (at(12, 10, 0), early),
                (at(12, 20, 0), late),
                (at(12, 20, 0), every),
            ]
        );
    }

    #[test]
    fn test_cancel_unknown_handle() {
        let mut s = Scheduler::new();
        let err = s.cancel(ScheduleHandle::new()).unwrap_err();
        assert!(matches!(err, EnvError::UnknownHandle(_)));
    }

    #[test]
    fn test_cancel_is_idempotent_and_stops_fires() {
        let mut s = Scheduler::new();
        let h = register(&mut s, at(12, 10, 0), 60);

        s.cancel(h).unwrap();
        s.cancel(h).unwrap();
        assert!(s.collect_due(at(12, 0, 0), at(13, 0, 0)).is_empty());
        assert!(!s.is_running(h));
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn test_begin_fire_counts_and_respects_cancel() {
        let mut s = Scheduler::new();
        let a = register(&mut s, at(12, 10, 0), 0);
        let b = register(&mut s, at(12, 10, 0), 0);

        let due = s.collect_due(at(12, 0, 0), at(12, 10, 0));
        assert_eq!(due.len(), 2);

        assert!(s.begin_fire(a).is_some());
        s.cancel(b).unwrap();
        assert!(s.begin_fire(b).is_none());

        assert_eq!(s.fire_count(a).unwrap(), 1);
        assert_eq!(s.fire_count(b).unwrap(), 0);
    }

    #[test]
    fn test_dormant_timer_never_due_but_cancellable() {
        let mut s = Scheduler::new();
        let h = s.register_dormant(ScheduleHandle::new(), at(12, 0, 0), noop(), Kwargs::new());

        assert!(s.collect_due(at(12, 0, 0), at(23, 0, 0)).is_empty());
        assert!(!s.is_running(h));
        assert!(s.cancel(h).is_ok());
    }

    #[test]
    fn test_release_restores_unfired_instants() {
        let mut s = Scheduler::new();
        let once = register(&mut s, at(12, 6, 0), 0);
        let every = register(&mut s, at(12, 1, 0), 60);

        let due = s.collect_due(at(12, 0, 0), at(12, 10, 0));
        assert!(!s.is_running(once));
        assert_eq!(s.get(every).unwrap().next_due, Some(at(12, 11, 0)));

        // everything from 12:04 on was never invoked
        let unfired: Vec<_> = due.into_iter().filter(|d| d.at >= at(12, 4, 0)).collect();
        s.release(&unfired);

        assert_eq!(s.get(once).unwrap().next_due, Some(at(12, 6, 0)));
        assert_eq!(s.get(every).unwrap().next_due, Some(at(12, 4, 0)));
        assert!(s.is_running(once));

        let again = s.collect_due(at(12, 0, 0), at(12, 10, 0));
        assert_eq!(again.len(), 8);
    }

    #[test]
    fn test_negative_period_rejected() {
        let mut s = Scheduler::new();
        let result = s.register(
            ScheduleHandle::new(),
            at(12, 0, 0),
            Duration::seconds(-5),
            noop(),
            Kwargs::new(),
        );
        assert!(matches!(result, Err(EnvError::InvalidArgument(_))));
        assert!(s.is_empty());
    }
}
