/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! `EventTarget`/`Event`/`CustomEvent` (§6, §3 Event), grounded on the
//! teacher pack's tree-walking dispatch algorithm but flattened: this
//! bridge has no DOM tree, so `dispatchEvent` only ever visits listeners
//! registered on the target it is called on. `stopPropagation` therefore
//! has no further node to stop at; only `stopImmediatePropagation` has an
//! observable effect, halting remaining listeners on the same target.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use bridge_traits::{Engine, EngineValue, NativeFunction};

use crate::global::Bridge;

const IMMEDIATE_STOPPED_SLOT: &str = "event-immediate-stopped";

struct Listener<E: Engine> {
    capture: bool,
    callback: E::Value,
}

type ListenerMap<E> = Rc<RefCell<HashMap<String, Vec<Listener<E>>>>>;

pub fn install<E: Engine + 'static>(bridge: &Rc<Bridge<E>>) {
    let bridge_for_target = bridge.clone();
    let event_target_ctor = bridge.with_engine(|e| {
        e.create_function(
            "EventTarget",
            0,
            Rc::new(move |_this, _args| Ok(make_event_target(&bridge_for_target))),
        )
    });
    let global = bridge.with_engine(|e| e.global_object());
    bridge.with_engine(|e| e.set_property(&global, "EventTarget", event_target_ctor));

    let bridge_for_event = bridge.clone();
    let event_ctor = bridge.with_engine(|e| {
        e.create_function(
            "Event",
            1,
            Rc::new(move |_this, args| {
                let bridge = bridge_for_event.clone();
                let event_type = arg_string(&bridge, args, 0);
                let (bubbles, cancelable) = read_event_init(&bridge, args.get(1));
                Ok(make_event(&bridge, &event_type, bubbles, cancelable, None))
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&global, "Event", event_ctor));

    let bridge_for_custom = bridge.clone();
    let custom_event_ctor = bridge.with_engine(|e| {
        e.create_function(
            "CustomEvent",
            1,
            Rc::new(move |_this, args| {
                let bridge = bridge_for_custom.clone();
                let event_type = arg_string(&bridge, args, 0);
                let (bubbles, cancelable) = read_event_init(&bridge, args.get(1));
                let detail = args.get(1).and_then(|opts| get_prop(&bridge, opts, "detail"));
                Ok(make_event(&bridge, &event_type, bubbles, cancelable, detail))
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&global, "CustomEvent", custom_event_ctor));
}

/// Reads `obj.key`, or `None` if `obj` has no such property (mirrors
/// `Engine::get_property`'s `Option` rather than defaulting to `undefined`,
/// so callers can distinguish "absent" from "present and undefined").
fn get_prop<E: Engine + 'static>(bridge: &Rc<Bridge<E>>, obj: &E::Value, key: &str) -> Option<E::Value> {
    bridge.with_engine(|e| e.get_property(obj, key))
}

fn get_prop_bool<E: Engine + 'static>(bridge: &Rc<Bridge<E>>, obj: &E::Value, key: &str) -> bool {
    match get_prop(bridge, obj, key) {
        Some(v) => bridge.with_engine(|e| e.to_rust_bool(&v)),
        None => false,
    }
}

fn make_event_target<E: Engine + 'static>(bridge: &Rc<Bridge<E>>) -> E::Value {
    let obj = bridge.with_engine(|e| e.create_object(&[]));
    let listeners: ListenerMap<E> = Rc::new(RefCell::new(HashMap::new()));

    let add_fn = bridge.with_engine(|e| {
        e.create_function("addEventListener", 2, native_add_listener(bridge, listeners.clone()))
    });
    bridge.with_engine(|e| e.set_property(&obj, "addEventListener", add_fn));

    let remove_listeners = listeners.clone();
    let bridge_for_remove = bridge.clone();
    let remove_fn = bridge.with_engine(|e| {
        e.create_function(
            "removeEventListener",
            2,
            Rc::new(move |_this, args| {
                let bridge = bridge_for_remove.clone();
                let event_type = arg_string(&bridge, args, 0);
                if let Some(callback) = args.get(1).cloned() {
                    let capture = read_capture_option(&bridge, args.get(2));
                    let mut map = remove_listeners.borrow_mut();
                    if let Some(list) = map.get_mut(&event_type) {
                        list.retain(|l| !(l.capture == capture && l.callback == callback));
                    }
                }
                Ok(bridge.with_engine(|e| e.undefined()))
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&obj, "removeEventListener", remove_fn));

    let bridge_for_dispatch = bridge.clone();
    let dispatch_fn = bridge.with_engine(|e| {
        e.create_function(
            "dispatchEvent",
            1,
            Rc::new(move |_this, args| {
                let bridge = bridge_for_dispatch.clone();
                let event = match args.first() {
                    Some(v) => v.clone(),
                    None => return Err(bridge.with_engine(|e| e.create_error("dispatchEvent requires an event"))),
                };
                let event_type = get_prop(&bridge, &event, "type")
                    .map(|v| bridge.with_engine(|e| e.to_rust_string(&v)))
                    .unwrap_or_default();
                let snapshot: Vec<E::Value> = listeners
                    .borrow()
                    .get(&event_type)
                    .map(|list| list.iter().map(|l| l.callback.clone()).collect())
                    .unwrap_or_default();
                for callback in snapshot {
                    if immediate_propagation_stopped(&bridge, &event) {
                        break;
                    }
                    if callback.is_callable() {
                        bridge.with_engine(|e| e.call_function(&callback, &event, &[event.clone()]))?;
                    }
                }
                let not_prevented = !get_prop_bool(&bridge, &event, "defaultPrevented");
                Ok(bridge.with_engine(|e| e.boolean(not_prevented)))
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&obj, "dispatchEvent", dispatch_fn));

    obj
}

fn native_add_listener<E: Engine + 'static>(bridge: &Rc<Bridge<E>>, listeners: ListenerMap<E>) -> NativeFunction<E::Value> {
    let bridge = bridge.clone();
    Rc::new(move |_this, args| {
        let event_type = arg_string(&bridge, args, 0);
        if let Some(callback) = args.get(1).cloned() {
            if callback.is_callable() {
                let capture = read_capture_option(&bridge, args.get(2));
                listeners
                    .borrow_mut()
                    .entry(event_type)
                    .or_default()
                    .push(Listener { capture, callback });
            }
        }
        Ok(bridge.with_engine(|e| e.undefined()))
    })
}

fn immediate_propagation_stopped<E: Engine + 'static>(bridge: &Rc<Bridge<E>>, event: &E::Value) -> bool {
    matches!(
        bridge.with_engine(|e| e.get_internal_slot(event, IMMEDIATE_STOPPED_SLOT)),
        Some(1)
    )
}

fn make_event<E: Engine + 'static>(
    bridge: &Rc<Bridge<E>>,
    event_type: &str,
    bubbles: bool,
    cancelable: bool,
    detail: Option<E::Value>,
) -> E::Value {
    let obj = bridge.with_engine(|e| e.create_object(&[]));
    bridge.with_engine(|e| {
        let type_value = e.string(event_type);
        e.set_property(&obj, "type", type_value);
        let bubbles_value = e.boolean(bubbles);
        e.set_property(&obj, "bubbles", bubbles_value);
        let cancelable_value = e.boolean(cancelable);
        e.set_property(&obj, "cancelable", cancelable_value);
        let prevented_value = e.boolean(false);
        e.set_property(&obj, "defaultPrevented", prevented_value);
        e.set_internal_slot(&obj, IMMEDIATE_STOPPED_SLOT, 0);
        if let Some(detail) = detail {
            e.set_property(&obj, "detail", detail);
        }
    });

    let obj_for_prevent = obj.clone();
    let bridge_for_prevent = bridge.clone();
    let prevent_default_fn = bridge.with_engine(|e| {
        e.create_function(
            "preventDefault",
            0,
            Rc::new(move |_this, _args| {
                if cancelable {
                    let value = bridge_for_prevent.with_engine(|e| e.boolean(true));
                    bridge_for_prevent.with_engine(|e| e.set_property(&obj_for_prevent, "defaultPrevented", value));
                }
                Ok(bridge_for_prevent.with_engine(|e| e.undefined()))
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&obj, "preventDefault", prevent_default_fn));

    // stopPropagation is a documented no-op here: with no DOM tree there is
    // nothing further to stop at. It still exists so script written against
    // a real DOM doesn't throw calling it.
    let bridge_for_stop = bridge.clone();
    let stop_propagation_fn = bridge.with_engine(|e| {
        e.create_function(
            "stopPropagation",
            0,
            Rc::new(move |_this, _args| Ok(bridge_for_stop.with_engine(|e| e.undefined()))),
        )
    });
    bridge.with_engine(|e| e.set_property(&obj, "stopPropagation", stop_propagation_fn));

    let obj_for_stop_immediate = obj.clone();
    let bridge_for_stop_immediate = bridge.clone();
    let stop_immediate_fn = bridge.with_engine(|e| {
        e.create_function(
            "stopImmediatePropagation",
            0,
            Rc::new(move |_this, _args| {
                bridge_for_stop_immediate.with_engine(|e| e.set_internal_slot(&obj_for_stop_immediate, IMMEDIATE_STOPPED_SLOT, 1));
                Ok(bridge_for_stop_immediate.with_engine(|e| e.undefined()))
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&obj, "stopImmediatePropagation", stop_immediate_fn));

    obj
}

fn read_capture_option<E: Engine + 'static>(bridge: &Rc<Bridge<E>>, option: Option<&E::Value>) -> bool {
    match option {
        None => false,
        Some(v) if v.is_object() => get_prop_bool(bridge, v, "capture"),
        Some(v) => bridge.with_engine(|e| e.to_rust_bool(v)),
    }
}

fn read_event_init<E: Engine + 'static>(bridge: &Rc<Bridge<E>>, init: Option<&E::Value>) -> (bool, bool) {
    match init {
        Some(v) if v.is_object() => (get_prop_bool(bridge, v, "bubbles"), get_prop_bool(bridge, v, "cancelable")),
        _ => (false, false),
    }
}

fn arg_string<E: Engine + 'static>(bridge: &Rc<Bridge<E>>, args: &[E::Value], index: usize) -> String {
    let v = args.get(index).cloned().unwrap_or_else(|| bridge.with_engine(|e| e.undefined()));
    bridge.with_engine(|e| e.to_rust_string(&v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::test_bridge;

    fn call<E: Engine + 'static>(bridge: &Rc<Bridge<E>>, obj: &E::Value, method: &str, args: &[E::Value]) -> E::Value {
        let f = get_prop(bridge, obj, method).expect("method exists");
        bridge.with_engine(|e| e.call_function(&f, obj, args)).expect("call succeeds")
    }

    #[test]
    fn dispatch_invokes_matching_listeners_and_reports_unprevented() {
        let bridge = test_bridge();
        install(&bridge);

        let target = make_event_target(&bridge);
        let seen = Rc::new(RefCell::new(0));
        let seen_for_closure = seen.clone();
        let bridge_for_listener = bridge.clone();
        let listener = bridge.with_engine(|e| {
            e.create_function(
                "listener",
                1,
                Rc::new(move |_this, _args| {
                    *seen_for_closure.borrow_mut() += 1;
                    Ok(bridge_for_listener.with_engine(|e| e.undefined()))
                }),
            )
        });
        let event_type = bridge.with_engine(|e| e.string("ping"));
        call(&bridge, &target, "addEventListener", &[event_type, listener]);

        let event = make_event(&bridge, "ping", false, true, None);
        let result = call(&bridge, &target, "dispatchEvent", &[event]);
        assert_eq!(*seen.borrow(), 1);
        assert_eq!(bridge.with_engine(|e| e.to_rust_bool(&result)), true);
    }

    #[test]
    fn prevent_default_is_a_no_op_when_not_cancelable() {
        let bridge = test_bridge();
        let event = make_event(&bridge, "scroll", true, false, None);
        let prevent_default = get_prop(&bridge, &event, "preventDefault").unwrap();
        let undef = bridge.with_engine(|e| e.undefined());
        bridge.with_engine(|e| e.call_function(&prevent_default, &event, &[])).unwrap();
        let prevented = get_prop_bool(&bridge, &event, "defaultPrevented");
        assert!(!prevented);
        let _ = undef;
    }

    #[test]
    fn stop_immediate_propagation_halts_remaining_listeners() {
        let bridge = test_bridge();
        let target = make_event_target(&bridge);

        let order = Rc::new(RefCell::new(Vec::new()));
        let order_a = order.clone();
        let bridge_a = bridge.clone();
        let first = bridge.with_engine(|e| {
            e.create_function(
                "first",
                1,
                Rc::new(move |_this, args| {
                    order_a.borrow_mut().push("first");
                    let event = args[0].clone();
                    let stop = get_prop(&bridge_a, &event, "stopImmediatePropagation").unwrap();
                    bridge_a.with_engine(|e| e.call_function(&stop, &event, &[]))?;
                    Ok(bridge_a.with_engine(|e| e.undefined()))
                }),
            )
        });
        let order_b = order.clone();
        let bridge_b = bridge.clone();
        let second = bridge.with_engine(|e| {
            e.create_function(
                "second",
                1,
                Rc::new(move |_this, _args| {
                    order_b.borrow_mut().push("second");
                    Ok(bridge_b.with_engine(|e| e.undefined()))
                }),
            )
        });

        let event_type = bridge.with_engine(|e| e.string("x"));
        call(&bridge, &target, "addEventListener", &[event_type.clone(), first]);
        call(&bridge, &target, "addEventListener", &[event_type, second]);

        let event = make_event(&bridge, "x", false, false, None);
        call(&bridge, &target, "dispatchEvent", &[event]);

        assert_eq!(*order.borrow(), vec!["first"]);
    }

    #[test]
    fn custom_event_carries_detail() {
        let bridge = test_bridge();
        let detail = bridge.with_engine(|e| e.number(42.0));
        let event = make_event(&bridge, "x", false, false, Some(detail.clone()));
        let read_back = get_prop(&bridge, &event, "detail").unwrap();
        assert_eq!(read_back, detail);
    }
}
