/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Integration coverage for the concrete scenarios and a sample of the
//! universal properties, exercised end to end through the public `Bridge`
//! surface (install, call into script-visible globals, drain).

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use bridge::Engine;
use common::{call, get, new_bridge, Value};

fn undef(bridge: &Rc<bridge::Bridge<common::TestEngine>>) -> Value {
    bridge.with_engine(|e| e.undefined())
}

/// S1: `Promise.resolve(1).then(x=>x+1).then(x=>x*2)` resolves `4`.
#[test]
fn s1_then_chain_composes_left_to_right() {
    let bridge = new_bridge();
    let global = bridge.with_engine(|e| e.global_object());
    let promise_ctor = get(&bridge, &global, "Promise");
    let resolve_fn = get(&bridge, &promise_ctor, "resolve");
    let one = bridge.with_engine(|e| e.number(1.0));
    let p = call(&bridge, &resolve_fn, &undef(&bridge), &[one]).unwrap();

    let then1 = get(&bridge, &p, "then");
    let add_one = bridge.with_engine(|e| {
        e.create_function(
            "addOne",
            1,
            Rc::new(|_this, args| {
                Ok(Value::Number(match &args[0] {
                    Value::Number(n) => n + 1.0,
                    _ => f64::NAN,
                }))
            }),
        )
    });
    let p2 = call(&bridge, &then1, &p, &[add_one]).unwrap();

    let then2 = get(&bridge, &p2, "then");
    let double = bridge.with_engine(|e| {
        e.create_function(
            "double",
            1,
            Rc::new(|_this, args| {
                Ok(Value::Number(match &args[0] {
                    Value::Number(n) => n * 2.0,
                    _ => f64::NAN,
                }))
            }),
        )
    });
    let result = Rc::new(RefCell::new(None));
    let result_for_capture = result.clone();
    let capture = bridge.with_engine(|e| {
        e.create_function(
            "capture",
            1,
            Rc::new(move |_this, args| {
                *result_for_capture.borrow_mut() = Some(args[0].clone());
                Ok(Value::Undefined)
            }),
        )
    });
    let p3 = call(&bridge, &then2, &p2, &[double]).unwrap();
    let then3 = get(&bridge, &p3, "then");
    call(&bridge, &then3, &p3, &[capture]).unwrap();

    bridge.run_to_completion();

    let value = result.borrow().clone();
    match value {
        Some(Value::Number(n)) => assert_eq!(n, 4.0),
        other => panic!("expected Some(Number(4)), got {other:?}"),
    }
}

/// S2: `const p = Promise.resolve(42); Promise.reject(p).catch(r => r === p)` resolves `true`
/// — rejection never unwraps a promise-valued reason.
#[test]
fn s2_reject_preserves_promise_identity_as_reason() {
    let bridge = new_bridge();
    let global = bridge.with_engine(|e| e.global_object());
    let promise_ctor = get(&bridge, &global, "Promise");
    let resolve_fn = get(&bridge, &promise_ctor, "resolve");
    let reject_fn = get(&bridge, &promise_ctor, "reject");

    let forty_two = bridge.with_engine(|e| e.number(42.0));
    let p = call(&bridge, &resolve_fn, &undef(&bridge), &[forty_two]).unwrap();
    let rejected = call(&bridge, &reject_fn, &undef(&bridge), &[p.clone()]).unwrap();

    let result = Rc::new(RefCell::new(None));
    let result_for_capture = result.clone();
    let p_for_capture = p.clone();
    let catch_cb = bridge.with_engine(|e| {
        e.create_function(
            "onReject",
            1,
            Rc::new(move |_this, args| {
                let same = args[0] == p_for_capture;
                *result_for_capture.borrow_mut() = Some(same);
                Ok(Value::Undefined)
            }),
        )
    });
    let catch_fn = get(&bridge, &rejected, "catch");
    call(&bridge, &catch_fn, &rejected, &[catch_cb]).unwrap();

    bridge.run_to_completion();

    assert_eq!(*result.borrow(), Some(true));
}

/// S3: microtasks (promise handlers) run before the next macrotask (timer),
/// even when the timer is scheduled first with a zero delay.
#[test]
fn s3_microtasks_run_before_macrotasks() {
    let bridge = new_bridge();
    let order = Rc::new(RefCell::new(Vec::new()));
    let global = bridge.with_engine(|e| e.global_object());

    let order_for_timer = order.clone();
    let timer_cb = bridge.with_engine(|e| {
        e.create_function(
            "onTimer",
            0,
            Rc::new(move |_this, _args| {
                order_for_timer.borrow_mut().push("timer");
                Ok(Value::Undefined)
            }),
        )
    });
    let set_timeout = get(&bridge, &global, "setTimeout");
    let zero = bridge.with_engine(|e| e.number(0.0));
    call(&bridge, &set_timeout, &undef(&bridge), &[timer_cb, zero]).unwrap();

    let promise_ctor = get(&bridge, &global, "Promise");
    let resolve_fn = get(&bridge, &promise_ctor, "resolve");
    let one = bridge.with_engine(|e| e.number(1.0));
    let p = call(&bridge, &resolve_fn, &undef(&bridge), &[one]).unwrap();
    let order_for_then = order.clone();
    let then_cb = bridge.with_engine(|e| {
        e.create_function(
            "onThen",
            1,
            Rc::new(move |_this, _args| {
                order_for_then.borrow_mut().push("microtask");
                Ok(Value::Undefined)
            }),
        )
    });
    let then_fn = get(&bridge, &p, "then");
    call(&bridge, &then_fn, &p, &[then_cb]).unwrap();

    bridge.run_to_completion();

    assert_eq!(*order.borrow(), vec!["microtask", "timer"]);
}

/// S4: `Promise.all([Promise.resolve(1), 2, Promise.resolve(3)])` resolves `[1, 2, 3]`.
#[test]
fn s4_promise_all_accepts_a_mix_of_promises_and_plain_values() {
    let bridge = new_bridge();
    let global = bridge.with_engine(|e| e.global_object());
    let promise_ctor = get(&bridge, &global, "Promise");
    let resolve_fn = get(&bridge, &promise_ctor, "resolve");
    let all_fn = get(&bridge, &promise_ctor, "all");

    let one = bridge.with_engine(|e| e.number(1.0));
    let p1 = call(&bridge, &resolve_fn, &undef(&bridge), &[one]).unwrap();
    let two = bridge.with_engine(|e| e.number(2.0));
    let three = bridge.with_engine(|e| e.number(3.0));
    let p3 = call(&bridge, &resolve_fn, &undef(&bridge), &[three]).unwrap();
    let items = bridge.with_engine(|e| e.create_array(&[p1, two, p3]));
    let combined = call(&bridge, &all_fn, &undef(&bridge), &[items]).unwrap();

    let result = Rc::new(RefCell::new(None));
    let result_for_then = result.clone();
    let then_cb = bridge.with_engine(|e| {
        e.create_function(
            "onResolved",
            1,
            Rc::new(move |_this, args| {
                *result_for_then.borrow_mut() = Some(args[0].clone());
                Ok(Value::Undefined)
            }),
        )
    });
    let then_fn = get(&bridge, &combined, "then");
    call(&bridge, &then_fn, &combined, &[then_cb]).unwrap();

    bridge.run_to_completion();

    let values = result.borrow().clone().expect("promise settled");
    let len = bridge.with_engine(|e| e.array_length(&values)).unwrap();
    assert_eq!(len, 3);
    let as_numbers: Vec<f64> = (0..len)
        .map(|i| {
            let v = bridge.with_engine(|e| e.array_get(&values, i)).unwrap();
            match v {
                Value::Number(n) => n,
                _ => f64::NAN,
            }
        })
        .collect();
    assert_eq!(as_numbers, vec![1.0, 2.0, 3.0]);
}

/// S7: header names with different casings iterate as lowercase, and
/// `.get()` comma-joins every value inserted under any casing of the name.
#[test]
fn s7_headers_normalizes_case_and_joins_values() {
    let bridge = new_bridge();
    let global = bridge.with_engine(|e| e.global_object());
    let ctor = get(&bridge, &global, "Headers");
    let headers = call(&bridge, &ctor, &undef(&bridge), &[]).unwrap();

    let append_fn = get(&bridge, &headers, "append");
    let x_upper = bridge.with_engine(|e| e.string("X"));
    let one = bridge.with_engine(|e| e.string("1"));
    call(&bridge, &append_fn, &headers, &[x_upper, one]).unwrap();
    let x_lower = bridge.with_engine(|e| e.string("x"));
    let two = bridge.with_engine(|e| e.string("2"));
    call(&bridge, &append_fn, &headers, &[x_lower, two]).unwrap();

    let get_fn = get(&bridge, &headers, "get");
    let x_query = bridge.with_engine(|e| e.string("X"));
    let value = call(&bridge, &get_fn, &headers, &[x_query]).unwrap();
    assert_eq!(bridge.with_engine(|e| e.to_rust_string(&value)), "1, 2");
}

/// S8: `append("a",1); append("a",2); set("a","only")` leaves a single
/// entry for "a", keeping its original position among other entries.
#[test]
fn s8_form_data_set_after_appends_collapses_to_one_entry() {
    let bridge = new_bridge();
    let global = bridge.with_engine(|e| e.global_object());
    let ctor = get(&bridge, &global, "FormData");
    let form = call(&bridge, &ctor, &undef(&bridge), &[]).unwrap();

    let append_fn = get(&bridge, &form, "append");
    let a = bridge.with_engine(|e| e.string("a"));
    let one = bridge.with_engine(|e| e.string("1"));
    call(&bridge, &append_fn, &form, &[a.clone(), one]).unwrap();
    let two = bridge.with_engine(|e| e.string("2"));
    call(&bridge, &append_fn, &form, &[a.clone(), two]).unwrap();

    let set_fn = get(&bridge, &form, "set");
    let only = bridge.with_engine(|e| e.string("only"));
    call(&bridge, &set_fn, &form, &[a.clone(), only]).unwrap();

    let get_all_fn = get(&bridge, &form, "getAll");
    let all = call(&bridge, &get_all_fn, &form, &[a]).unwrap();
    let len = bridge.with_engine(|e| e.array_length(&all)).unwrap();
    assert_eq!(len, 1);
    let first = bridge.with_engine(|e| e.array_get(&all, 0)).unwrap();
    assert_eq!(bridge.with_engine(|e| e.to_rust_string(&first)), "only");
}

/// Universal property: settlement is idempotent — resolving an
/// already-rejected promise has no observable effect.
#[test]
fn settlement_is_idempotent() {
    let bridge = new_bridge();
    let global = bridge.with_engine(|e| e.global_object());
    let promise_ctor = get(&bridge, &global, "Promise");
    let with_resolvers = get(&bridge, &promise_ctor, "withResolvers");
    let bundle = call(&bridge, &with_resolvers, &undef(&bridge), &[]).unwrap();
    let promise = get(&bridge, &bundle, "promise");
    let resolve = get(&bridge, &bundle, "resolve");
    let reject = get(&bridge, &bundle, "reject");

    let first = bridge.with_engine(|e| e.string("first"));
    call(&bridge, &reject, &undef(&bridge), &[first]).unwrap();
    let second = bridge.with_engine(|e| e.string("second"));
    call(&bridge, &resolve, &undef(&bridge), &[second]).unwrap();

    let result = Rc::new(RefCell::new(None));
    let result_for_catch = result.clone();
    let catch_cb = bridge.with_engine(|e| {
        e.create_function(
            "onReject",
            1,
            Rc::new(move |_this, args| {
                *result_for_catch.borrow_mut() = Some(args[0].clone());
                Ok(Value::Undefined)
            }),
        )
    });
    let catch_fn = get(&bridge, &promise, "catch");
    call(&bridge, &catch_fn, &promise, &[catch_cb]).unwrap();

    bridge.run_to_completion();

    let value = result.borrow().clone();
    match value {
        Some(Value::String(s)) => assert_eq!(&*s, "first"),
        other => panic!("expected Some(String(\"first\")), got {other:?}"),
    }
}

/// Universal property: handlers registered via multiple `.then()` calls on
/// the same settled promise run in FIFO registration order.
#[test]
fn handlers_run_in_fifo_registration_order() {
    let bridge = new_bridge();
    let global = bridge.with_engine(|e| e.global_object());
    let promise_ctor = get(&bridge, &global, "Promise");
    let resolve_fn = get(&bridge, &promise_ctor, "resolve");
    let one = bridge.with_engine(|e| e.number(1.0));
    let p = call(&bridge, &resolve_fn, &undef(&bridge), &[one]).unwrap();
    let then_fn = get(&bridge, &p, "then");

    let order = Rc::new(RefCell::new(Vec::new()));
    for label in ["first", "second", "third"] {
        let order_for_cb = order.clone();
        let cb = bridge.with_engine(|e| {
            e.create_function(
                label,
                1,
                Rc::new(move |_this, _args| {
                    order_for_cb.borrow_mut().push(label);
                    Ok(Value::Undefined)
                }),
            )
        });
        call(&bridge, &then_fn, &p, &[cb]).unwrap();
    }

    bridge.run_to_completion();

    assert_eq!(*order.borrow(), vec!["first", "second", "third"]);
}
