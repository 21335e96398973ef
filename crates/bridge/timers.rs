/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Component E: `setTimeout`/`setInterval`/`setImmediate`/
//! `queueMicrotask`/`process.nextTick`, grounded on `timers.rs`'s
//! `OneshotTimers`/`JsTimers` split — a handle-indexed active-timer table
//! plus a due-time ordering, fired by the loop's own step function rather
//! than a delegated OS timer wheel (the raw timer wheel is explicitly out
//! of scope per §1; this bridge supplies a cooperative poll instead, see
//! DESIGN.md).
//!
//! Timer and immediate callbacks hold engine values, which are not `Send`
//! (the engine is single-threaded by design) — so, unlike the loop's
//! generic `submit`, everything in this module runs and is only ever
//! touched from the loop thread. That is consistent with §4.E: every
//! scheduling entry point here is a *script-visible* global, and script
//! only ever runs on the loop thread.

use std::cell::{Cell, RefCell};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::rc::Rc;

use bridge_traits::{precise_time_ms, Engine, EngineValue, ImmediateId, IntervalId, MsDuration, TimeoutId};

use crate::error::BridgeError;
use crate::global::Bridge;
use crate::value::HostValue;

pub(crate) enum TimerCallback<E: Engine> {
    Js(E::Value, Vec<E::Value>),
    Native(Rc<dyn Fn(&Rc<Bridge<E>>)>),
}

impl<E: Engine> Clone for TimerCallback<E> {
    fn clone(&self) -> Self {
        match self {
            TimerCallback::Js(f, args) => TimerCallback::Js(f.clone(), args.clone()),
            TimerCallback::Native(f) => TimerCallback::Native(f.clone()),
        }
    }
}

struct TimerEntry<E: Engine> {
    callback: TimerCallback<E>,
    is_interval: bool,
    interval: MsDuration,
}

#[derive(Eq, PartialEq)]
struct DueEntry {
    due: MsDuration,
    seq: u64,
    handle: i32,
}

impl Ord for DueEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.due.cmp(&other.due).then(self.seq.cmp(&other.seq))
    }
}
impl PartialOrd for DueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Timer and immediate bookkeeping for one adapter. `setTimeout`/
/// `setInterval` share one handle space; `setImmediate` uses a disjoint
/// one (§3 invariant). Disjointness is guaranteed by drawing every handle,
/// timer or immediate alike, from the single `next_handle` counter below —
/// two independent counters both starting at 1 would hand out the same
/// value to the first timer and the first immediate. `TimeoutId`/
/// `IntervalId`/`ImmediateId` additionally make the three handle spaces
/// impossible to confuse at compile time.
pub struct Timers<E: Engine> {
    min_duration: MsDuration,
    next_handle: Cell<i32>,
    next_seq: Cell<u64>,
    active: RefCell<HashMap<i32, TimerEntry<E>>>,
    due: RefCell<BinaryHeap<Reverse<DueEntry>>>,
    immediates: RefCell<VecDeque<i32>>,
    immediate_callbacks: RefCell<HashMap<i32, TimerCallback<E>>>,
}

impl<E: Engine + 'static> Timers<E> {
    pub fn new(min_duration_ms: u64) -> Self {
        Timers {
            min_duration: MsDuration::new(min_duration_ms),
            next_handle: Cell::new(1),
            next_seq: Cell::new(0),
            active: RefCell::new(HashMap::new()),
            due: RefCell::new(BinaryHeap::new()),
            immediates: RefCell::new(VecDeque::new()),
            immediate_callbacks: RefCell::new(HashMap::new()),
        }
    }

    fn next_handle(&self) -> i32 {
        let h = self.next_handle.get();
        self.next_handle.set(h + 1);
        h
    }

    fn next_seq(&self) -> u64 {
        let s = self.next_seq.get();
        self.next_seq.set(s + 1);
        s
    }

    fn clamp_delay(&self, bridge: &Bridge<E>, delay: i64) -> Result<MsDuration, BridgeError> {
        let delay = if delay < 0 {
            if bridge.config().clamp_negative_delay {
                0
            } else {
                return Err(BridgeError::Range("delay must not be negative".into()));
            }
        } else {
            delay as u64
        };
        Ok(std::cmp::max(MsDuration::new(delay), self.min_duration))
    }

    /// `setTimeout` (§4.E). Shares its handle space with `setInterval`,
    /// wrapped in a distinct newtype so the two can't be confused at the
    /// call site; `TimeoutId`/`IntervalId` carry the same underlying
    /// counter.
    pub fn set_timeout(
        &self,
        bridge: &Bridge<E>,
        callback: TimerCallback<E>,
        delay: i64,
    ) -> Result<TimeoutId, BridgeError> {
        self.schedule(bridge, callback, delay, false).map(TimeoutId)
    }

    /// `setInterval` (§4.E). See [`Timers::set_timeout`].
    pub fn set_interval(
        &self,
        bridge: &Bridge<E>,
        callback: TimerCallback<E>,
        delay: i64,
    ) -> Result<IntervalId, BridgeError> {
        self.schedule(bridge, callback, delay, true).map(IntervalId)
    }

    fn schedule(
        &self,
        bridge: &Bridge<E>,
        callback: TimerCallback<E>,
        delay: i64,
        is_interval: bool,
    ) -> Result<i32, BridgeError> {
        let interval = self.clamp_delay(bridge, delay)?;
        let handle = self.next_handle();
        self.active.borrow_mut().insert(
            handle,
            TimerEntry {
                callback,
                is_interval,
                interval,
            },
        );
        let due = precise_time_ms(bridge.start_instant()) + interval;
        self.due.borrow_mut().push(Reverse(DueEntry {
            due,
            seq: self.next_seq(),
            handle,
        }));
        Ok(handle)
    }

    /// `clearTimeout`: tolerant of an already-fired or already-cleared
    /// handle (§4.E). A cancellation in the middle of a firing only
    /// prevents *subsequent* firings (§9 Open Question, pinned): a running
    /// callback already holds its own cloned copy of the closure, so
    /// removing the table entry here cannot affect a firing already in
    /// progress, only ones not yet started.
    pub fn clear_timeout(&self, id: TimeoutId) {
        self.active.borrow_mut().remove(&id.0);
    }

    /// `clearInterval`. See [`Timers::clear_timeout`].
    pub fn clear_interval(&self, id: IntervalId) {
        self.active.borrow_mut().remove(&id.0);
    }

    /// `setImmediate`: queues for the next "execute one macrotask" step
    /// (§5 ordering rule 4). Kept same-thread-only since the callback may
    /// hold an engine value. Drawn from the same counter as
    /// `setTimeout`/`setInterval`, so an `ImmediateId` is never numerically
    /// equal to a live `TimeoutId`/`IntervalId` (§3 disjointness).
    pub fn set_immediate(&self, callback: TimerCallback<E>) -> ImmediateId {
        let handle = self.next_handle();
        self.immediates.borrow_mut().push_back(handle);
        self.immediate_callbacks.borrow_mut().insert(handle, callback);
        ImmediateId(handle)
    }

    pub fn clear_immediate(&self, id: ImmediateId) {
        self.immediate_callbacks.borrow_mut().remove(&id.0);
    }

    pub fn has_pending_timers(&self) -> bool {
        !self.due.borrow().is_empty()
    }

    pub fn has_pending_immediates(&self) -> bool {
        !self.immediates.borrow().is_empty()
    }

    /// Fires every timer whose deadline has elapsed, oldest-due first.
    /// Returns whether anything fired. Timers armed during this call (by a
    /// callback that itself calls `setTimeout`) are not fired in the same
    /// pass, matching the teacher's "select timers to run" snapshot.
    pub fn fire_due(&self, bridge: &Rc<Bridge<E>>) -> bool {
        let now = precise_time_ms(bridge.start_instant());
        let mut to_run = Vec::new();
        {
            let mut due = self.due.borrow_mut();
            while let Some(Reverse(entry)) = due.peek() {
                if entry.due > now {
                    break;
                }
                let Reverse(entry) = due.pop().unwrap();
                to_run.push(entry.handle);
            }
        }
        if to_run.is_empty() {
            return false;
        }
        for handle in to_run {
            let fired = self
                .active
                .borrow()
                .get(&handle)
                .map(|entry| (entry.callback.clone(), entry.is_interval, entry.interval));
            let Some((callback, is_interval, interval)) = fired else {
                continue;
            };
            run_callback(bridge, &callback);
            if is_interval {
                if self.active.borrow().contains_key(&handle) {
                    let due = precise_time_ms(bridge.start_instant()) + interval;
                    self.due.borrow_mut().push(Reverse(DueEntry {
                        due,
                        seq: self.next_seq(),
                        handle,
                    }));
                }
            } else {
                self.active.borrow_mut().remove(&handle);
            }
        }
        true
    }

    /// Runs the next queued immediate, if any, skipping ones cleared since
    /// they were scheduled. Returns whether an immediate actually ran.
    pub fn run_one_immediate(&self, bridge: &Rc<Bridge<E>>) -> bool {
        loop {
            let handle = match self.immediates.borrow_mut().pop_front() {
                Some(h) => h,
                None => return false,
            };
            if let Some(callback) = self.immediate_callbacks.borrow_mut().remove(&handle) {
                run_callback(bridge, &callback);
                return true;
            }
        }
    }
}

fn run_callback<E: Engine + 'static>(bridge: &Rc<Bridge<E>>, callback: &TimerCallback<E>) {
    match callback {
        TimerCallback::Native(f) => f(bridge),
        TimerCallback::Js(func, args) => {
            let result = bridge.with_engine(|engine| {
                let undefined = engine.undefined();
                engine.call_function(func, &undefined, args)
            });
            if let Err(thrown) = result {
                let host: HostValue<E> = bridge.engine_value_to_host(&thrown);
                log::warn!("uncaught exception in timer callback: {host:?}");
            }
        }
    }
}

/// Installs `setTimeout`, `clearTimeout`, `setInterval`, `clearInterval`,
/// `setImmediate`, `clearImmediate`, `queueMicrotask`, and
/// `process.nextTick` onto the engine's global object (§6).
pub fn install<E: Engine + 'static>(bridge: &Rc<Bridge<E>>) {
    install_set_timeout(bridge, false);
    install_set_timeout(bridge, true);
    install_clear(bridge, "clearTimeout", false);
    install_clear(bridge, "clearInterval", true);
    install_set_immediate(bridge);
    install_clear_immediate(bridge);
    install_queue_microtask(bridge);
    install_next_tick(bridge);
}

fn install_set_timeout<E: Engine + 'static>(bridge: &Rc<Bridge<E>>, is_interval: bool) {
    let name = if is_interval { "setInterval" } else { "setTimeout" };
    let bridge_for_fn = bridge.clone();
    bridge.with_engine(|engine| {
        let global = engine.global_object();
        let f = engine.create_function(
            name,
            2,
            Rc::new(move |_this, args| {
                let bridge = bridge_for_fn.clone();
                let func = match args.first().cloned() {
                    Some(f) if f.is_callable() => f,
                    _ => {
                        return bridge.with_engine(|e| {
                            Err(e.create_error("setTimeout/setInterval requires a callable first argument"))
                        })
                    }
                };
                let delay = args
                    .get(1)
                    .map(|v| bridge.with_engine(|e| e.to_rust_number(v)))
                    .unwrap_or(0.0);
                let extra: Vec<E::Value> = args.iter().skip(2).cloned().collect();
                let result = if is_interval {
                    bridge
                        .timers
                        .set_interval(&bridge, TimerCallback::Js(func, extra), delay as i64)
                        .map(|id| id.0)
                } else {
                    bridge
                        .timers
                        .set_timeout(&bridge, TimerCallback::Js(func, extra), delay as i64)
                        .map(|id| id.0)
                };
                match result {
                    Ok(handle) => Ok(bridge.with_engine(|e| e.number(handle as f64))),
                    Err(err) => Err(bridge.with_engine(|e| e.create_error(&err.to_string()))),
                }
            }),
        );
        engine.set_property(&global, name, f);
    });
}

fn install_clear<E: Engine + 'static>(bridge: &Rc<Bridge<E>>, name: &'static str, is_interval: bool) {
    let bridge_for_fn = bridge.clone();
    bridge.with_engine(|engine| {
        let global = engine.global_object();
        let f = engine.create_function(
            name,
            1,
            Rc::new(move |_this, args| {
                let bridge = bridge_for_fn.clone();
                if let Some(handle) = args.first() {
                    let n = bridge.with_engine(|e| e.to_rust_number(handle)) as i32;
                    if is_interval {
                        bridge.timers.clear_interval(IntervalId(n));
                    } else {
                        bridge.timers.clear_timeout(TimeoutId(n));
                    }
                }
                Ok(bridge.with_engine(|e| e.undefined()))
            }),
        );
        engine.set_property(&global, name, f);
    });
}

fn install_set_immediate<E: Engine + 'static>(bridge: &Rc<Bridge<E>>) {
    let bridge_for_fn = bridge.clone();
    bridge.with_engine(|engine| {
        let global = engine.global_object();
        let f = engine.create_function(
            "setImmediate",
            1,
            Rc::new(move |_this, args| {
                let bridge = bridge_for_fn.clone();
                let func = match args.first().cloned() {
                    Some(f) if f.is_callable() => f,
                    _ => {
                        return bridge.with_engine(|e| {
                            Err(e.create_error("setImmediate requires a callable first argument"))
                        })
                    }
                };
                let extra: Vec<E::Value> = args.iter().skip(1).cloned().collect();
                let handle = bridge.timers.set_immediate(TimerCallback::Js(func, extra));
                Ok(bridge.with_engine(|e| e.number(handle.0 as f64)))
            }),
        );
        engine.set_property(&global, "setImmediate", f);
    });
}

fn install_clear_immediate<E: Engine + 'static>(bridge: &Rc<Bridge<E>>) {
    let bridge_for_fn = bridge.clone();
    bridge.with_engine(|engine| {
        let global = engine.global_object();
        let f = engine.create_function(
            "clearImmediate",
            1,
            Rc::new(move |_this, args| {
                let bridge = bridge_for_fn.clone();
                if let Some(handle) = args.first() {
                    let n = bridge.with_engine(|e| e.to_rust_number(handle));
                    bridge.timers.clear_immediate(ImmediateId(n as i32));
                }
                Ok(bridge.with_engine(|e| e.undefined()))
            }),
        );
        engine.set_property(&global, "clearImmediate", f);
    });
}

fn install_queue_microtask<E: Engine + 'static>(bridge: &Rc<Bridge<E>>) {
    let bridge_for_fn = bridge.clone();
    bridge.with_engine(|engine| {
        let global = engine.global_object();
        let f = engine.create_function(
            "queueMicrotask",
            1,
            Rc::new(move |_this, args| {
                let bridge = bridge_for_fn.clone();
                let func = match args.first().cloned() {
                    Some(f) if f.is_callable() => f,
                    _ => {
                        return bridge.with_engine(|e| {
                            Err(e.create_error("queueMicrotask requires a callable argument"))
                        })
                    }
                };
                let bridge2 = bridge.clone();
                bridge.microtasks().enqueue(move || {
                    let result = bridge2.with_engine(|engine| {
                        let undefined = engine.undefined();
                        engine.call_function(&func, &undefined, &[])
                    });
                    if let Err(thrown) = result {
                        let host: HostValue<E> = bridge2.engine_value_to_host(&thrown);
                        log::warn!("uncaught exception in queueMicrotask callback: {host:?}");
                    }
                });
                Ok(bridge.with_engine(|e| e.undefined()))
            }),
        );
        engine.set_property(&global, "queueMicrotask", f);
    });
}

/// `process.nextTick`, drained before the microtask queue (§9 Open
/// Question, pinned to a distinct lane).
fn install_next_tick<E: Engine + 'static>(bridge: &Rc<Bridge<E>>) {
    let bridge_for_fn = bridge.clone();
    bridge.with_engine(|engine| {
        let global = engine.global_object();
        let f = engine.create_function(
            "nextTick",
            1,
            Rc::new(move |_this, args| {
                let bridge = bridge_for_fn.clone();
                let func = match args.first().cloned() {
                    Some(f) if f.is_callable() => f,
                    _ => {
                        return bridge.with_engine(|e| {
                            Err(e.create_error("process.nextTick requires a callable argument"))
                        })
                    }
                };
                let extra: Vec<E::Value> = args.iter().skip(1).cloned().collect();
                let bridge2 = bridge.clone();
                bridge.next_tick_queue().enqueue(move || {
                    let result = bridge2.with_engine(|engine| {
                        let undefined = engine.undefined();
                        engine.call_function(&func, &undefined, &extra)
                    });
                    if let Err(thrown) = result {
                        let host: HostValue<E> = bridge2.engine_value_to_host(&thrown);
                        log::warn!("uncaught exception in process.nextTick callback: {host:?}");
                    }
                });
                Ok(bridge.with_engine(|e| e.undefined()))
            }),
        );
        let process = engine.create_object(&[]);
        engine.set_property(&process, "nextTick", f);
        engine.set_property(&global, "process", process);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::global::tests::test_bridge;
    use std::cell::RefCell;

    #[test]
    fn timeout_and_immediate_handles_are_disjoint_namespaces() {
        let bridge = test_bridge();
        let ran = Rc::new(RefCell::new(Vec::new()));
        let ran1 = ran.clone();
        let t = bridge
            .timers
            .set_timeout(
                &bridge,
                TimerCallback::Native(Rc::new(move |_b| ran1.borrow_mut().push("t"))),
                1000,
            )
            .unwrap();
        let ran2 = ran.clone();
        let imm = bridge
            .timers
            .set_immediate(TimerCallback::Native(Rc::new(move |_b| ran2.borrow_mut().push("i"))));
        // `TimeoutId` and `ImmediateId` are distinct types, so a timer
        // handle can no longer even be passed to `clear_immediate` by
        // mistake — the disjointness invariant is now enforced at compile
        // time as well as by the two handles' underlying values differing.
        assert_ne!(t.0, imm.0);
        bridge.timers.run_one_immediate(&bridge);
        assert_eq!(*ran.borrow(), vec!["i"]);
    }

    #[test]
    fn interval_reschedules_until_cleared() {
        let bridge = test_bridge();
        let count = Rc::new(RefCell::new(0));
        let count2 = count.clone();
        let handle_cell: Rc<RefCell<Option<IntervalId>>> = Rc::new(RefCell::new(None));
        let handle_cell2 = handle_cell.clone();
        bridge
            .timers
            .set_interval(
                &bridge,
                TimerCallback::Native(Rc::new(move |b| {
                    let mut c = count2.borrow_mut();
                    *c += 1;
                    if *c >= 3 {
                        if let Some(h) = *handle_cell2.borrow() {
                            b.timers.clear_interval(h);
                        }
                    }
                })),
                0,
            )
            .map(|handle| *handle_cell.borrow_mut() = Some(handle))
            .unwrap();
        for _ in 0..10 {
            bridge.timers.fire_due(&bridge);
        }
        assert_eq!(*count.borrow(), 3);
    }
}
