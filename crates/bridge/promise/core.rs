/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Component C: the chained promise state machine. Handler dispatch is
//! always submitted to the loop's microtask queue, never run synchronously
//! (§4.C "Handler scheduling — the microtask contract").

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use bridge_traits::{Engine, EngineValue, SubmitError};

use crate::global::Bridge;
use crate::loop_binding::LoopHandle;
use crate::value::{self, HostValue, ThreadSafeValue};

static NEXT_PROMISE_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_promise_id() -> u64 {
    NEXT_PROMISE_ID.fetch_add(1, Ordering::Relaxed)
}

pub enum PromiseState<E: Engine> {
    Pending,
    Fulfilled(HostValue<E>),
    Rejected(HostValue<E>),
}

impl<E: Engine> Clone for PromiseState<E> {
    fn clone(&self) -> Self {
        match self {
            PromiseState::Pending => PromiseState::Pending,
            PromiseState::Fulfilled(v) => PromiseState::Fulfilled(v.clone()),
            PromiseState::Rejected(v) => PromiseState::Rejected(v.clone()),
        }
    }
}

/// Tagged handler variant per the design notes ("Dynamic dispatch"):
/// fulfill vs. reject vs. pass-through, modeled as data rather than a
/// class hierarchy. `Finally` is handled one layer up in the facade, by
/// desugaring into a pair of `Native` handlers.
pub enum Handler<E: Engine> {
    /// Value/error pass-through — a null/undefined/non-callable handler.
    Passthrough,
    /// An engine-visible callback (`.then(f, r)` called from script).
    Js(E::Value),
    /// A Rust-native handler used internally by combinators and by
    /// `finally`'s desugaring.
    Native(Rc<dyn Fn(&Rc<Bridge<E>>, HostValue<E>) -> Result<HostValue<E>, HostValue<E>>>),
}

impl<E: Engine> Clone for Handler<E> {
    fn clone(&self) -> Self {
        match self {
            Handler::Passthrough => Handler::Passthrough,
            Handler::Js(v) => Handler::Js(v.clone()),
            Handler::Native(f) => Handler::Native(f.clone()),
        }
    }
}

impl<E: Engine> Handler<E> {
    pub fn native<F>(f: F) -> Self
    where
        F: Fn(&Rc<Bridge<E>>, HostValue<E>) -> Result<HostValue<E>, HostValue<E>>
            + 'static,
    {
        Handler::Native(Rc::new(f))
    }
}

struct HandlerEntry<E: Engine> {
    on_fulfill: Handler<E>,
    on_reject: Handler<E>,
    child: Rc<Promise<E>>,
}

/// A promise cell (§3). Identity is `id`; state transitions at most once.
pub struct Promise<E: Engine> {
    id: u64,
    state: RefCell<PromiseState<E>>,
    handlers: RefCell<Vec<HandlerEntry<E>>>,
    /// Set once any `.then`/`.catch` has observed this promise, so the
    /// unhandled-rejection sink (§7) only fires for rejections nobody ever
    /// looked at.
    handled: Cell<bool>,
}

impl<E: Engine + 'static> Promise<E> {
    pub fn new_pending() -> Rc<Self> {
        Rc::new(Promise {
            id: next_promise_id(),
            state: RefCell::new(PromiseState::Pending),
            handlers: RefCell::new(Vec::new()),
            handled: Cell::new(false),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_pending(&self) -> bool {
        matches!(&*self.state.borrow(), PromiseState::Pending)
    }

    pub fn state_snapshot(&self) -> PromiseState<E> {
        self.state.borrow().clone()
    }


    /// `resolve(value)`: idempotent (§4.C). Adopts a promise argument
    /// (fate chaining), adopts a thenable under a one-shot guard, and
    /// otherwise fulfills directly.
    pub fn resolve(self: &Rc<Self>, bridge: &Rc<Bridge<E>>, value: HostValue<E>) {
        if !self.is_pending() {
            return;
        }
        if let HostValue::Promise(ref other) = value {
            if other.id() == self.id {
                self.reject(
                    bridge,
                    HostValue::error("chaining cycle detected for promise"),
                );
                return;
            }
            let this = self.clone();
            let this_reject = self.clone();
            other.then(
                bridge,
                Handler::native(move |b, v| {
                    this.resolve(b, v);
                    Ok(HostValue::Undefined)
                }),
                Handler::native(move |b, e| {
                    this_reject.reject(b, e);
                    Ok(HostValue::Undefined)
                }),
            );
            return;
        }
        if let HostValue::Engine(ref v) = value {
            if v.is_object() {
                let then_fn = bridge.with_engine(|engine| engine.get_property(v, "then"));
                if let Some(then_fn) = then_fn {
                    if then_fn.is_callable() {
                        self.adopt_thenable(bridge, v.clone(), then_fn);
                        return;
                    }
                }
            }
        }
        self.settle(bridge, Ok(value));
    }

    /// `reject(reason)`: idempotent, no adoption — the reason is used as-is
    /// even when it is itself a promise (§4.C "Rejection reason
    /// preservation").
    pub fn reject(self: &Rc<Self>, bridge: &Rc<Bridge<E>>, reason: HostValue<E>) {
        if !self.is_pending() {
            return;
        }
        self.settle(bridge, Err(reason));
    }

    /// Invokes a foreign `then` under a one-shot guard: only the first of
    /// the two settlers has effect, matching native promise resolution
    /// functions (§4.C).
    fn adopt_thenable(self: &Rc<Self>, bridge: &Rc<Bridge<E>>, thenable: E::Value, then_fn: E::Value) {
        let guard = Rc::new(Cell::new(false));
        let this_resolve = self.clone();
        let guard_resolve = guard.clone();
        let bridge_resolve = bridge.clone();
        let resolve_native: bridge_traits::NativeFunction<E::Value> =
            Rc::new(move |_this, args| {
                if guard_resolve.replace(true) {
                    return Ok(bridge_resolve.with_engine(|e| e.undefined()));
                }
                let arg = args.first().cloned().unwrap_or_else(|| bridge_resolve.with_engine(|e| e.undefined()));
                let host = bridge_resolve.engine_value_to_host(&arg);
                this_resolve.resolve(&bridge_resolve, host);
                Ok(bridge_resolve.with_engine(|e| e.undefined()))
            });

        let this_reject = self.clone();
        let guard_reject = guard;
        let bridge_reject = bridge.clone();
        let reject_native: bridge_traits::NativeFunction<E::Value> = Rc::new(move |_this, args| {
            if guard_reject.replace(true) {
                return Ok(bridge_reject.with_engine(|e| e.undefined()));
            }
            let arg = args.first().cloned().unwrap_or_else(|| bridge_reject.with_engine(|e| e.undefined()));
            let host = bridge_reject.engine_value_to_host(&arg);
            this_reject.reject(&bridge_reject, host);
            Ok(bridge_reject.with_engine(|e| e.undefined()))
        });

        let outcome = bridge.with_engine(|engine| {
            let resolve_fn = engine.create_function("", 1, resolve_native);
            let reject_fn = engine.create_function("", 1, reject_native);
            let undefined = engine.undefined();
            engine.call_function(&then_fn, &thenable, &[resolve_fn, reject_fn])
        });
        if let Err(thrown) = outcome {
            let host = bridge.engine_value_to_host(&thrown);
            self.reject(bridge, host);
        }
    }

    fn settle(self: &Rc<Self>, bridge: &Rc<Bridge<E>>, outcome: Result<HostValue<E>, HostValue<E>>) {
        {
            let mut state = self.state.borrow_mut();
            if !matches!(&*state, PromiseState::Pending) {
                return;
            }
            *state = match &outcome {
                Ok(v) => PromiseState::Fulfilled(v.clone()),
                Err(e) => PromiseState::Rejected(e.clone()),
            };
        }
        if let Err(reason) = &outcome {
            if !self.handled.get() {
                bridge.note_possibly_unhandled_rejection(self.id, reason.clone());
            }
        }
        let queued: Vec<HandlerEntry<E>> = self.handlers.borrow_mut().drain(..).collect();
        for entry in queued {
            Self::schedule_dispatch(bridge, entry, outcome.clone());
        }
    }

    /// `.then(onFulfilled, onRejected)`: attaching to a pending promise
    /// queues the handler (FIFO); attaching to a settled one schedules it
    /// as a microtask immediately (§4.C).
    pub fn then(
        self: &Rc<Self>,
        bridge: &Rc<Bridge<E>>,
        on_fulfill: Handler<E>,
        on_reject: Handler<E>,
    ) -> Rc<Promise<E>> {
        self.handled.set(true);
        let child = Promise::new_pending();
        let entry = HandlerEntry {
            on_fulfill,
            on_reject,
            child: child.clone(),
        };
        let snapshot = self.state.borrow().clone();
        match snapshot {
            PromiseState::Pending => {
                self.handlers.borrow_mut().push(entry);
            }
            PromiseState::Fulfilled(v) => Self::schedule_dispatch(bridge, entry, Ok(v)),
            PromiseState::Rejected(e) => Self::schedule_dispatch(bridge, entry, Err(e)),
        }
        child
    }

    fn schedule_dispatch(
        bridge: &Rc<Bridge<E>>,
        entry: HandlerEntry<E>,
        outcome: Result<HostValue<E>, HostValue<E>>,
    ) {
        let bridge = bridge.clone();
        let bridge_for_dispatch = bridge.clone();
        bridge.microtasks().enqueue(move || {
            let handler = match &outcome {
                Ok(_) => entry.on_fulfill,
                Err(_) => entry.on_reject,
            };
            dispatch(&bridge_for_dispatch, &handler, outcome, &entry.child);
        });
    }
}

impl<E: Engine + 'static> Promise<E> {
    /// A `Send` handle that settles this promise from any thread (§4.C
    /// "promise settlement calls ... are safe to invoke from any thread";
    /// §9 "Sharing across threads"). Registers the promise with `bridge` so
    /// the submitted closure can find it again by id once it runs on the
    /// loop thread.
    pub fn thread_safe_resolver(self: &Rc<Self>, bridge: &Rc<Bridge<E>>) -> PromiseResolver<E> {
        bridge.register_promise(self);
        PromiseResolver {
            id: self.id,
            loop_handle: bridge.loop_handle().clone(),
        }
    }
}

/// A `Send`, `Clone` handle produced by [`Promise::thread_safe_resolver`]
/// that settles a specific promise from any thread. Carries only the
/// promise's id and a [`LoopHandle`] — never the promise itself, which is
/// `Rc`-rooted and engine-bound — so it is `Send` regardless of `E` (§9
/// "Sharing across threads").
pub struct PromiseResolver<E: Engine> {
    id: u64,
    loop_handle: LoopHandle<Rc<Bridge<E>>>,
}

impl<E: Engine> Clone for PromiseResolver<E> {
    fn clone(&self) -> Self {
        PromiseResolver {
            id: self.id,
            loop_handle: self.loop_handle.clone(),
        }
    }
}

impl<E: Engine + 'static> PromiseResolver<E> {
    /// Submits a `resolve` onto the loop thread. Fails with [`SubmitError`]
    /// once the loop has shut down; a no-op if the promise already settled
    /// or was already taken by a prior resolve/reject.
    pub fn resolve(&self, value: ThreadSafeValue) -> Result<(), SubmitError> {
        let id = self.id;
        self.loop_handle.submit(move |bridge: &Rc<Bridge<E>>| {
            if let Some(promise) = bridge.take_registered_promise(id) {
                let host = value.into_host_value();
                promise.resolve(bridge, host);
            }
        })
    }

    /// Submits a `reject` onto the loop thread. Same failure/no-op
    /// semantics as [`PromiseResolver::resolve`].
    pub fn reject(&self, value: ThreadSafeValue) -> Result<(), SubmitError> {
        let id = self.id;
        self.loop_handle.submit(move |bridge: &Rc<Bridge<E>>| {
            if let Some(promise) = bridge.take_registered_promise(id) {
                let host = value.into_host_value();
                promise.reject(bridge, host);
            }
        })
    }
}

/// Runs one handler with the settlement it corresponds to and resolves or
/// rejects `child` from its result. A thrown value from a JS handler, or
/// an `Err` from a native one, rejects `child` — handler exceptions never
/// escape the microtask drain (§4.C "Failure semantics").
fn dispatch<E: Engine + 'static>(
    bridge: &Rc<Bridge<E>>,
    handler: &Handler<E>,
    outcome: Result<HostValue<E>, HostValue<E>>,
    child: &Rc<Promise<E>>,
) {
    match handler {
        Handler::Passthrough => match outcome {
            Ok(v) => child.resolve(bridge, v),
            Err(e) => child.reject(bridge, e),
        },
        Handler::Native(f) => {
            let input = match outcome {
                Ok(v) => v,
                Err(e) => e,
            };
            match f(bridge, input) {
                Ok(v) => child.resolve(bridge, v),
                Err(e) => child.reject(bridge, e),
            }
        }
        Handler::Js(func) => {
            let input = match outcome {
                Ok(v) => v,
                Err(e) => e,
            };
            let result = bridge.with_engine(|engine| {
                let engine_input = value::to_engine(engine, input);
                let undefined = engine.undefined();
                engine.call_function(func, &undefined, &[engine_input])
            });
            match result {
                Ok(ret) => {
                    let host = bridge.engine_value_to_host(&ret);
                    child.resolve(bridge, host);
                }
                Err(thrown) => {
                    let host = bridge.engine_value_to_host(&thrown);
                    child.reject(bridge, host);
                }
            }
        }
    }
}
