/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! `AbortController`/`AbortSignal` (§6, §3 Abort). `AbortSignal.any` and
//! `.timeout` are both expressed as ordinary signals wired up with an
//! internal observer, the same composition technique `Promise.all` uses
//! for its elements (§4.D combinators) — no separate "composite signal"
//! type is needed.

use std::cell::RefCell;
use std::rc::Rc;

use bridge_traits::{Engine, EngineValue};

use crate::dom::dom_exception::{self, DomExceptionName};
use crate::global::Bridge;
use crate::timers::TimerCallback;

struct SignalState<E: Engine> {
    aborted: bool,
    reason: Option<E::Value>,
    listeners: Vec<E::Value>,
    observers: Vec<Rc<dyn Fn(&Rc<Bridge<E>>, &E::Value)>>,
    /// The engine-visible object for this signal, so `abort_signal` can
    /// mirror `aborted`/`reason` onto it — the canonical truth lives here
    /// in Rust, but script reads it back through ordinary property access.
    object: Option<E::Value>,
}

impl<E: Engine> SignalState<E> {
    fn new() -> Self {
        SignalState {
            aborted: false,
            reason: None,
            listeners: Vec::new(),
            observers: Vec::new(),
            object: None,
        }
    }
}

type Signal<E> = Rc<RefCell<SignalState<E>>>;

/// Aborts `state` with `reason`, idempotently (§3 Abort: a second `abort()`
/// is a no-op). Fires every JS listener and every internal observer
/// (`AbortSignal.any`'s composition, `.timeout`'s own signal) exactly once.
fn abort_signal<E: Engine + 'static>(bridge: &Rc<Bridge<E>>, state: &Signal<E>, reason: E::Value) {
    let (listeners, observers, object) = {
        let mut inner = state.borrow_mut();
        if inner.aborted {
            return;
        }
        inner.aborted = true;
        inner.reason = Some(reason.clone());
        (inner.listeners.clone(), inner.observers.clone(), inner.object.clone())
    };
    if let Some(obj) = object {
        bridge.with_engine(|e| {
            let aborted_value = e.boolean(true);
            e.set_property(&obj, "aborted", aborted_value);
            e.set_property(&obj, "reason", reason.clone());
        });
    }
    let undef = bridge.with_engine(|e| e.undefined());
    for listener in listeners {
        if listener.is_callable() {
            let _ = bridge.with_engine(|e| e.call_function(&listener, &undef, &[]));
        }
    }
    for observer in observers {
        observer(bridge, &reason);
    }
}

pub fn install<E: Engine + 'static>(bridge: &Rc<Bridge<E>>) {
    let bridge_for_controller = bridge.clone();
    let controller_ctor = bridge.with_engine(|e| {
        e.create_function(
            "AbortController",
            0,
            Rc::new(move |_this, _args| Ok(make_controller(&bridge_for_controller))),
        )
    });
    let global = bridge.with_engine(|e| e.global_object());
    bridge.with_engine(|e| e.set_property(&global, "AbortController", controller_ctor));

    let bridge_for_signal_ctor = bridge.clone();
    let signal_ctor = bridge.with_engine(|e| {
        e.create_function(
            "AbortSignal",
            0,
            Rc::new(move |_this, _args| {
                let state: Signal<E> = Rc::new(RefCell::new(SignalState::new()));
                Ok(make_signal_object(&bridge_for_signal_ctor, &state))
            }),
        )
    });

    let bridge_for_any = bridge.clone();
    let any_fn = bridge.with_engine(|e| {
        e.create_function(
            "any",
            1,
            Rc::new(move |_this, args| {
                let bridge = bridge_for_any.clone();
                let signals = args.first().cloned();
                let combined: Signal<E> = Rc::new(RefCell::new(SignalState::new()));
                let combined_obj = make_signal_object(&bridge, &combined);
                if let Some(list) = signals {
                    if let Some(len) = bridge.with_engine(|e| e.array_length(&list)) {
                        for i in 0..len {
                            if let Some(input) = bridge.with_engine(|e| e.array_get(&list, i)) {
                                link_into(&bridge, &input, &combined);
                            }
                        }
                    }
                }
                Ok(combined_obj)
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&signal_ctor, "any", any_fn));

    let bridge_for_timeout = bridge.clone();
    let timeout_fn = bridge.with_engine(|e| {
        e.create_function(
            "timeout",
            1,
            Rc::new(move |_this, args| {
                let bridge = bridge_for_timeout.clone();
                let ms = args
                    .first()
                    .map(|v| bridge.with_engine(|e| e.to_rust_number(v)))
                    .unwrap_or(0.0);
                let state: Signal<E> = Rc::new(RefCell::new(SignalState::new()));
                let obj = make_signal_object(&bridge, &state);
                let bridge_for_fire = bridge.clone();
                let state_for_fire = state.clone();
                let scheduled = bridge.timers.set_timeout(
                    &bridge,
                    TimerCallback::Native(Rc::new(move |b| {
                        let reason = dom_exception::make(b, DomExceptionName::Timeout, "signal timed out");
                        abort_signal(&bridge_for_fire, &state_for_fire, reason);
                    })),
                    ms as i64,
                );
                if scheduled.is_err() {
                    let reason = dom_exception::make(&bridge, DomExceptionName::Timeout, "signal timed out");
                    abort_signal(&bridge, &state, reason);
                }
                Ok(obj)
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&signal_ctor, "timeout", timeout_fn));

    bridge.with_engine(|e| e.set_property(&global, "AbortSignal", signal_ctor));
}

/// Wires `input` (an `AbortSignal`-shaped value) so that its abort, if any,
/// propagates to `combined` — used by `AbortSignal.any`. If `input` is
/// already aborted, `combined` aborts immediately with the same reason.
fn link_into<E: Engine + 'static>(bridge: &Rc<Bridge<E>>, input: &E::Value, combined: &Signal<E>) {
    let already_aborted = bridge
        .with_engine(|e| e.get_property(input, "aborted"))
        .map(|v| bridge.with_engine(|e| e.to_rust_bool(&v)))
        .unwrap_or(false);
    if already_aborted {
        let reason = bridge
            .with_engine(|e| e.get_property(input, "reason"))
            .unwrap_or_else(|| bridge.with_engine(|e| e.undefined()));
        abort_signal(bridge, combined, reason);
        return;
    }
    let combined_for_observer = combined.clone();
    if let Some(state) = signal_state_of(bridge, input) {
        state.borrow_mut().observers.push(Rc::new(move |b, reason| {
            abort_signal(b, &combined_for_observer, reason.clone());
        }));
    }
}

const SIGNAL_STATE_SLOT: &str = "abort-signal-state";

thread_local! {
    static SIGNAL_REGISTRY: RefCell<Vec<Box<dyn std::any::Any>>> = RefCell::new(Vec::new());
}

/// Recovers the Rust-side [`SignalState`] for a signal object created by
/// this module, via the internal-slot index into a per-thread registry
/// (the abstract `Engine` trait has no way to attach a typed Rust value to
/// an engine object directly, only a `u64` id — §4.B).
fn signal_state_of<E: Engine + 'static>(bridge: &Rc<Bridge<E>>, obj: &E::Value) -> Option<Signal<E>> {
    let id = bridge.with_engine(|e| e.get_internal_slot(obj, SIGNAL_STATE_SLOT))?;
    SIGNAL_REGISTRY.with(|r| {
        r.borrow()
            .get(id as usize)
            .and_then(|b| b.downcast_ref::<Signal<E>>())
            .cloned()
    })
}

fn register_signal_state<E: Engine + 'static>(state: Signal<E>) -> u64 {
    SIGNAL_REGISTRY.with(|r| {
        let mut r = r.borrow_mut();
        r.push(Box::new(state));
        (r.len() - 1) as u64
    })
}

fn make_signal_object<E: Engine + 'static>(bridge: &Rc<Bridge<E>>, state: &Signal<E>) -> E::Value {
    let obj = bridge.with_engine(|e| e.create_object(&[]));
    let slot_id = register_signal_state(state.clone());
    state.borrow_mut().object = Some(obj.clone());
    bridge.with_engine(|e| {
        let aborted = e.boolean(false);
        e.set_property(&obj, "aborted", aborted);
        let reason = e.undefined();
        e.set_property(&obj, "reason", reason);
        e.set_internal_slot(&obj, SIGNAL_STATE_SLOT, slot_id);
    });

    let state_for_add = state.clone();
    let bridge_for_add = bridge.clone();
    let add_listener_fn = bridge.with_engine(|e| {
        e.create_function(
            "addEventListener",
            2,
            Rc::new(move |_this, args| {
                if let Some(callback) = args.get(1).cloned() {
                    state_for_add.borrow_mut().listeners.push(callback);
                }
                Ok(bridge_for_add.with_engine(|e| e.undefined()))
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&obj, "addEventListener", add_listener_fn));

    let state_for_throw = state.clone();
    let bridge_for_throw = bridge.clone();
    let throw_if_aborted_fn = bridge.with_engine(|e| {
        e.create_function(
            "throwIfAborted",
            0,
            Rc::new(move |_this, _args| {
                let inner = state_for_throw.borrow();
                if inner.aborted {
                    Err(inner.reason.clone().unwrap_or_else(|| bridge_for_throw.with_engine(|e| e.undefined())))
                } else {
                    Ok(bridge_for_throw.with_engine(|e| e.undefined()))
                }
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&obj, "throwIfAborted", throw_if_aborted_fn));

    obj
}

fn make_controller<E: Engine + 'static>(bridge: &Rc<Bridge<E>>) -> E::Value {
    let controller = bridge.with_engine(|e| e.create_object(&[]));
    let state: Signal<E> = Rc::new(RefCell::new(SignalState::new()));
    let signal_obj = make_signal_object(bridge, &state);
    bridge.with_engine(|e| e.set_property(&controller, "signal", signal_obj));

    let bridge_for_abort = bridge.clone();
    let state_for_abort = state.clone();
    let abort_fn = bridge.with_engine(|e| {
        e.create_function(
            "abort",
            0,
            Rc::new(move |_this, args| {
                let reason = args.first().cloned().unwrap_or_else(|| {
                    dom_exception::make(&bridge_for_abort, DomExceptionName::Abort, "signal aborted without reason")
                });
                abort_signal(&bridge_for_abort, &state_for_abort, reason);
                Ok(bridge_for_abort.with_engine(|e| e.undefined()))
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&controller, "abort", abort_fn));

    controller
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::test_bridge;

    fn get<E: Engine + 'static>(bridge: &Rc<Bridge<E>>, obj: &E::Value, key: &str) -> E::Value {
        bridge.with_engine(|e| e.get_property(obj, key)).expect("property exists")
    }

    fn call<E: Engine + 'static>(bridge: &Rc<Bridge<E>>, obj: &E::Value, method: &str, args: &[E::Value]) -> Result<E::Value, E::Value> {
        let f = get(bridge, obj, method);
        bridge.with_engine(|e| e.call_function(&f, obj, args))
    }

    #[test]
    fn controller_abort_marks_its_signal_aborted() {
        let bridge = test_bridge();
        let controller = make_controller(&bridge);
        let signal = get(&bridge, &controller, "signal");
        call(&bridge, &controller, "abort", &[]).unwrap();
        let aborted = bridge.with_engine(|e| e.get_property(&signal, "aborted")).unwrap();
        assert_eq!(bridge.with_engine(|e| e.to_rust_bool(&aborted)), true);
    }

    #[test]
    fn throw_if_aborted_only_throws_after_abort() {
        let bridge = test_bridge();
        let controller = make_controller(&bridge);
        let signal = get(&bridge, &controller, "signal");
        assert!(call(&bridge, &signal, "throwIfAborted", &[]).is_ok());
        call(&bridge, &controller, "abort", &[]).unwrap();
        assert!(call(&bridge, &signal, "throwIfAborted", &[]).is_err());
    }

    #[test]
    fn second_abort_call_is_a_no_op() {
        let bridge = test_bridge();
        let controller = make_controller(&bridge);
        let signal = get(&bridge, &controller, "signal");
        let first_reason = bridge.with_engine(|e| e.string("first"));
        call(&bridge, &controller, "abort", &[first_reason]).unwrap();
        let second_reason = bridge.with_engine(|e| e.string("second"));
        call(&bridge, &controller, "abort", &[second_reason]).unwrap();
        let reason = bridge.with_engine(|e| e.get_property(&signal, "reason")).unwrap();
        assert_eq!(bridge.with_engine(|e| e.to_rust_string(&reason)), "first");
    }
}
