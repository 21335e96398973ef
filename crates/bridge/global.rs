/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! `Bridge` is this crate's analogue of the teacher's `GlobalScope`: the
//! object every other component reaches through to get at the engine, the
//! loop, the microtask queue, and per-adapter Web API state.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Instant;

use bridge_traits::Engine;

use crate::dom::console::Console;
use crate::dom::crypto::Crypto;
use crate::dom::performance::Performance;
use crate::dom::storage::Storage;
use crate::error::{BridgeError, BridgeResult};
use crate::loop_binding::{EventLoop, LoopHandle, ThreadGuard};
use crate::microtask::{MicrotaskQueue, NextTickQueue};
use crate::promise::Promise;
use crate::timers::Timers;
use crate::value::HostValue;

/// Knobs an embedder sets once, at bind time (§1.1 "Configuration" —
/// ambient stack the distilled spec is silent on).
pub struct BridgeConfig {
    /// `true`: a negative `setTimeout`/`setInterval` delay clamps to zero
    /// (the web-platform default). `false`: it raises `BridgeError::Range`
    /// instead. Pinned per-adapter so behavior is internally consistent
    /// (§9 Open Question).
    pub clamp_negative_delay: bool,
    /// Floor applied to every timer delay, mirroring the teacher's
    /// `js.timers.minimum_duration` pref (`OneshotTimers::slow_down`).
    pub min_timer_duration_ms: u64,
    /// Called with `(promise_id, debug_repr_of_reason)` for a rejection
    /// that reached a microtask checkpoint with no handler ever attached.
    /// Never called synchronously from inside `reject` (§7: "MAY be
    /// logged but MUST NOT abort the loop").
    pub unhandled_rejection_sink: Option<Rc<dyn Fn(u64, String)>>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            clamp_negative_delay: true,
            min_timer_duration_ms: 0,
            unhandled_rejection_sink: None,
        }
    }
}

pub struct Bridge<E: Engine> {
    engine: RefCell<E>,
    thread_guard: ThreadGuard,
    pub(crate) event_loop: EventLoop<Rc<Bridge<E>>>,
    loop_handle: LoopHandle<Rc<Bridge<E>>>,
    microtasks: MicrotaskQueue,
    next_tick: NextTickQueue,
    pub(crate) timers: Timers<E>,
    config: BridgeConfig,
    bound: Cell<bool>,
    start: Instant,
    pub(crate) console: RefCell<Console>,
    pub(crate) crypto: Crypto,
    pub(crate) performance: Performance,
    pub(crate) local_storage: Storage,
    pub(crate) session_storage: Storage,
    pub(crate) symbol_registry: RefCell<HashMap<String, u64>>,
    next_object_id: Cell<u64>,
    /// Caches the wrapped-promise object for each promise id so repeated
    /// wrapping of the same `Rc<Promise<E>>` is observably the same engine
    /// value (`Promise.resolve(p) === p`, §3 "Wrapped-promise object").
    promise_wrappers: RefCell<HashMap<u64, E::Value>>,
    /// Promises a [`crate::promise::PromiseResolver`] may still be holding
    /// for, keyed by id. A resolver only carries the id across threads
    /// (§9 "Sharing across threads"); the submitted closure looks the
    /// promise back up here once it's running on the loop thread.
    promise_registry: RefCell<HashMap<u64, Rc<Promise<E>>>>,
}

impl<E: Engine + 'static> Bridge<E> {
    /// Constructs the adapter state. Does not touch the engine's globals —
    /// call [`Bridge::bind`] for that, exactly once.
    pub fn new(engine: E, config: BridgeConfig) -> Rc<Self> {
        let event_loop = EventLoop::new();
        let loop_handle = event_loop.handle();
        let start = Instant::now();
        Rc::new(Bridge {
            engine: RefCell::new(engine),
            thread_guard: ThreadGuard::new(),
            timers: Timers::new(config.min_timer_duration_ms),
            event_loop,
            loop_handle,
            microtasks: MicrotaskQueue::new(),
            next_tick: NextTickQueue::new(),
            config,
            bound: Cell::new(false),
            start,
            console: RefCell::new(Console::new()),
            crypto: Crypto::new(),
            performance: Performance::new(start),
            local_storage: Storage::new(),
            session_storage: Storage::new(),
            symbol_registry: RefCell::new(HashMap::new()),
            next_object_id: Cell::new(1),
            promise_wrappers: RefCell::new(HashMap::new()),
            promise_registry: RefCell::new(HashMap::new()),
        })
    }

    /// Installs every global listed in §6 onto the engine. One-shot per
    /// adapter (§4.A).
    pub fn bind(self: &Rc<Self>) -> BridgeResult<()> {
        if self.bound.replace(true) {
            return Err(BridgeError::Type(
                "bridge globals have already been bound".into(),
            ));
        }
        self.thread_guard.assert_owner();
        crate::timers::install(self);
        crate::promise::PromiseFacade::install(self);
        crate::dom::install(self);
        Ok(())
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn loop_handle(&self) -> &LoopHandle<Rc<Bridge<E>>> {
        &self.loop_handle
    }

    pub fn microtasks(&self) -> &MicrotaskQueue {
        self.thread_guard.assert_owner();
        &self.microtasks
    }

    pub fn next_tick_queue(&self) -> &NextTickQueue {
        self.thread_guard.assert_owner();
        &self.next_tick
    }

    pub fn start_instant(&self) -> Instant {
        self.start
    }

    pub fn fresh_object_id(&self) -> u64 {
        let id = self.next_object_id.get();
        self.next_object_id.set(id + 1);
        id
    }

    /// Runs `f` with exclusive mutable access to the engine. Every engine
    /// touch in this crate funnels through here so the single-owner rule
    /// has one enforcement point.
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut E) -> R) -> R {
        self.thread_guard.assert_owner();
        f(&mut self.engine.borrow_mut())
    }

    pub fn engine_value_to_host(&self, v: &E::Value) -> HostValue<E> {
        self.with_engine(|engine| crate::value::from_engine(engine, v))
    }

    /// §5's ordering contract for a single iteration of the loop: drain
    /// next-tick, then drain microtasks (re-entrant enqueues extend both),
    /// then run one macrotask and repeat the microtask drain.
    pub fn drain_microtasks(&self) {
        loop {
            self.next_tick.checkpoint();
            self.microtasks.checkpoint();
            if self.next_tick.is_empty() && self.microtasks.is_empty() {
                break;
            }
        }
    }

    /// Runs one full tick of the event loop: one macrotask — a due timer,
    /// a queued immediate, or a submitted closure, in that order (§5 rule
    /// 4 treats all three as "a macrotask") — followed by a microtask
    /// checkpoint. Returns whether a macrotask ran.
    pub fn run_one_tick(self: &Rc<Self>) -> bool {
        let ran = self.timers.fire_due(self)
            || self.timers.run_one_immediate(self)
            || self.event_loop.tick(self);
        self.drain_microtasks();
        ran
    }

    /// Runs ticks until the loop has no more pending macrotasks and no
    /// timers left to fire — used by embedders and by tests that want a
    /// program to run to quiescence.
    pub fn run_to_completion(self: &Rc<Self>) {
        self.drain_microtasks();
        while self.run_one_tick() {}
    }

    pub fn has_pending_work(&self) -> bool {
        self.timers.has_pending_timers()
            || self.timers.has_pending_immediates()
            || self.event_loop.has_pending()
            || !self.microtasks.is_empty()
            || !self.next_tick.is_empty()
    }

    pub(crate) fn promise_wrapper(&self, id: u64) -> Option<E::Value> {
        self.promise_wrappers.borrow().get(&id).cloned()
    }

    pub(crate) fn set_promise_wrapper(&self, id: u64, value: E::Value) {
        self.promise_wrappers.borrow_mut().insert(id, value);
    }

    /// Registers `promise` so a [`crate::promise::PromiseResolver`] for it
    /// can find it again after crossing threads. Idempotent; a promise
    /// handed out to multiple resolvers registers once.
    pub(crate) fn register_promise(&self, promise: &Rc<Promise<E>>) {
        self.promise_registry.borrow_mut().entry(promise.id()).or_insert_with(|| promise.clone());
    }

    /// Removes and returns the registered promise for `id`, if any — called
    /// once, on the loop thread, by the closure a `PromiseResolver` submits.
    /// Removing on first take makes a second `resolve`/`reject` attempt for
    /// the same id a silent no-op, consistent with `Promise`'s own
    /// idempotent settlement.
    pub(crate) fn take_registered_promise(&self, id: u64) -> Option<Rc<Promise<E>>> {
        self.promise_registry.borrow_mut().remove(&id)
    }

    pub(crate) fn note_possibly_unhandled_rejection(&self, promise_id: u64, reason: HostValue<E>) {
        if let Some(sink) = &self.config.unhandled_rejection_sink {
            sink(promise_id, format!("{reason:?}"));
        } else {
            log::warn!("unhandled promise rejection (#{promise_id}): {reason:?}");
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    pub use crate::testutil::{test_bridge, RunScript};
}
