/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Component D: the engine-visible `Promise` constructor, its prototype
//! methods, and its statics (§4.D). Everything here is a thin skin over
//! [`super::core::Promise`] — the facade's only job is marshalling between
//! engine values and [`HostValue`], and keeping one wrapper object per
//! promise id so identity is preserved across repeated wrapping.

use std::rc::Rc;

use bridge_traits::{Engine, EngineValue, NativeFunction};

use crate::global::Bridge;
use crate::iterable;
use crate::value::{self, HostValue};

use super::combinators;
use super::core::{Handler, Promise};

const INTERNAL_SLOT: &str = "internal-promise";

pub struct PromiseFacade;

/// The `{promise, resolve, reject}` record returned by `Promise.withResolvers()`.
pub struct Resolvers<E: Engine> {
    pub promise: E::Value,
    pub resolve: E::Value,
    pub reject: E::Value,
}

impl PromiseFacade {
    /// Installs the `Promise` global with its prototype methods and statics.
    pub fn install<E: Engine + 'static>(bridge: &Rc<Bridge<E>>) {
        let ctor = make_native(bridge, "Promise", 1, promise_constructor);
        let resolve_fn = make_native(bridge, "resolve", 1, promise_resolve);
        let reject_fn = make_native(bridge, "reject", 1, promise_reject);
        let all_fn = make_native(bridge, "all", 1, promise_all);
        let race_fn = make_native(bridge, "race", 1, promise_race);
        let all_settled_fn = make_native(bridge, "allSettled", 1, promise_all_settled);
        let any_fn = make_native(bridge, "any", 1, promise_any);
        let try_fn = make_native(bridge, "try", 1, promise_try);
        let with_resolvers_fn = make_native(bridge, "withResolvers", 0, |bridge, _this, _args| {
            let r = with_resolvers(bridge);
            let obj = bridge.with_engine(|e| {
                e.create_object(&[
                    ("promise".to_string(), r.promise),
                    ("resolve".to_string(), r.resolve),
                    ("reject".to_string(), r.reject),
                ])
            });
            Ok(obj)
        });

        bridge.with_engine(|e| {
            e.set_property(&ctor, "resolve", resolve_fn);
            e.set_property(&ctor, "reject", reject_fn);
            e.set_property(&ctor, "all", all_fn);
            e.set_property(&ctor, "race", race_fn);
            e.set_property(&ctor, "allSettled", all_settled_fn);
            e.set_property(&ctor, "any", any_fn);
            e.set_property(&ctor, "try", try_fn);
            e.set_property(&ctor, "withResolvers", with_resolvers_fn);
        });

        let global = bridge.with_engine(|e| e.global_object());
        bridge.with_engine(|e| e.set_property(&global, "Promise", ctor));
    }

    /// Wraps a host promise as an engine value, reusing a cached wrapper if
    /// this promise has already been wrapped once.
    pub fn wrap<E: Engine + 'static>(bridge: &Rc<Bridge<E>>, promise: Rc<Promise<E>>) -> E::Value {
        wrap(bridge, promise)
    }

    /// True if `v` is a wrapped-promise object produced by [`Self::wrap`].
    pub fn is_wrapped<E: Engine + 'static>(bridge: &Bridge<E>, v: &E::Value) -> bool {
        is_wrapped(bridge, v)
    }
}

fn make_native<E, F>(bridge: &Rc<Bridge<E>>, name: &str, arity: u32, f: F) -> E::Value
where
    E: Engine + 'static,
    F: Fn(&Rc<Bridge<E>>, &E::Value, &[E::Value]) -> Result<E::Value, E::Value> + 'static,
{
    let bridge_for_closure = bridge.clone();
    let func: NativeFunction<E::Value> = Rc::new(move |this, args| f(&bridge_for_closure, this, args));
    bridge.with_engine(|e| e.create_function(name, arity, func))
}

fn arg<E: Engine + 'static>(bridge: &Bridge<E>, args: &[E::Value], index: usize) -> E::Value {
    args.get(index)
        .cloned()
        .unwrap_or_else(|| bridge.with_engine(|e| e.undefined()))
}

fn to_engine_err<E: Engine + 'static>(bridge: &Bridge<E>, host: HostValue<E>) -> E::Value {
    bridge.with_engine(|e| value::to_engine(e, host))
}

fn is_wrapped<E: Engine + 'static>(bridge: &Bridge<E>, v: &E::Value) -> bool {
    v.is_object() && bridge.with_engine(|e| e.get_internal_slot(v, INTERNAL_SLOT)).is_some()
}

fn to_handler<E: Engine + 'static>(v: Option<E::Value>) -> Handler<E> {
    match v {
        Some(f) if f.is_callable() => Handler::Js(f),
        _ => Handler::Passthrough,
    }
}

fn wrap<E: Engine + 'static>(bridge: &Rc<Bridge<E>>, promise: Rc<Promise<E>>) -> E::Value {
    let id = promise.id();
    if let Some(cached) = bridge.promise_wrapper(id) {
        return cached;
    }

    let obj = bridge.with_engine(|e| e.create_object(&[]));
    bridge.with_engine(|e| e.set_internal_slot(&obj, INTERNAL_SLOT, id));

    let then_target = promise.clone();
    let then_fn = make_native(bridge, "then", 2, move |bridge, _this, args| {
        let on_fulfill = args.get(0).cloned();
        let on_reject = args.get(1).cloned();
        let child = then_target.then(bridge, to_handler(on_fulfill), to_handler(on_reject));
        Ok(wrap(bridge, child))
    });
    bridge.with_engine(|e| e.set_property(&obj, "then", then_fn));

    let catch_target = promise.clone();
    let catch_fn = make_native(bridge, "catch", 1, move |bridge, _this, args| {
        let on_reject = args.get(0).cloned();
        let child = catch_target.then(bridge, Handler::Passthrough, to_handler(on_reject));
        Ok(wrap(bridge, child))
    });
    bridge.with_engine(|e| e.set_property(&obj, "catch", catch_fn));

    let finally_target = promise.clone();
    let finally_fn = make_native(bridge, "finally", 1, move |bridge, _this, args| {
        let callback = args.get(0).cloned();
        let child = finally_target.then(
            bridge,
            finally_fulfill_handler(callback.clone()),
            finally_reject_handler(callback),
        );
        Ok(wrap(bridge, child))
    });
    bridge.with_engine(|e| e.set_property(&obj, "finally", finally_fn));

    bridge.set_promise_wrapper(id, obj.clone());
    obj
}

fn call_finally_callback<E: Engine + 'static>(
    bridge: &Rc<Bridge<E>>,
    callback: &Option<E::Value>,
) -> Result<(), HostValue<E>> {
    if let Some(cb) = callback {
        if cb.is_callable() {
            let undef = bridge.with_engine(|e| e.undefined());
            if let Err(thrown) = bridge.with_engine(|e| e.call_function(cb, &undef, &[])) {
                return Err(bridge.engine_value_to_host(&thrown));
            }
        }
    }
    Ok(())
}

fn finally_fulfill_handler<E: Engine + 'static>(callback: Option<E::Value>) -> Handler<E> {
    Handler::native(move |bridge, value| match call_finally_callback(bridge, &callback) {
        Ok(()) => Ok(value),
        Err(e) => Err(e),
    })
}

fn finally_reject_handler<E: Engine + 'static>(callback: Option<E::Value>) -> Handler<E> {
    Handler::native(move |bridge, reason| match call_finally_callback(bridge, &callback) {
        Ok(()) => Err(reason),
        Err(e) => Err(e),
    })
}

fn promise_constructor<E: Engine + 'static>(
    bridge: &Rc<Bridge<E>>,
    _this: &E::Value,
    args: &[E::Value],
) -> Result<E::Value, E::Value> {
    let executor = arg(bridge, args, 0);
    if !executor.is_callable() {
        return Err(bridge.with_engine(|e| e.create_error("Promise resolver is not a function")));
    }

    let p = Promise::new_pending();

    let p_resolve = p.clone();
    let resolve_fn = make_native(bridge, "", 1, move |bridge, _this, args| {
        let v = arg(bridge, args, 0);
        p_resolve.resolve(bridge, bridge.engine_value_to_host(&v));
        Ok(bridge.with_engine(|e| e.undefined()))
    });
    let p_reject = p.clone();
    let reject_fn = make_native(bridge, "", 1, move |bridge, _this, args| {
        let v = arg(bridge, args, 0);
        p_reject.reject(bridge, bridge.engine_value_to_host(&v));
        Ok(bridge.with_engine(|e| e.undefined()))
    });

    let undef = bridge.with_engine(|e| e.undefined());
    if let Err(thrown) = bridge.with_engine(|e| e.call_function(&executor, &undef, &[resolve_fn, reject_fn])) {
        p.reject(bridge, bridge.engine_value_to_host(&thrown));
    }
    Ok(wrap(bridge, p))
}

fn promise_resolve<E: Engine + 'static>(
    bridge: &Rc<Bridge<E>>,
    _this: &E::Value,
    args: &[E::Value],
) -> Result<E::Value, E::Value> {
    let x = arg(bridge, args, 0);
    if is_wrapped(bridge, &x) {
        return Ok(x);
    }
    let p = Promise::new_pending();
    p.resolve(bridge, bridge.engine_value_to_host(&x));
    Ok(wrap(bridge, p))
}

fn promise_reject<E: Engine + 'static>(
    bridge: &Rc<Bridge<E>>,
    _this: &E::Value,
    args: &[E::Value],
) -> Result<E::Value, E::Value> {
    let x = arg(bridge, args, 0);
    let p = Promise::new_pending();
    // Rejection never unwraps `x` — identity of a promise-valued reason is
    // preserved (§4.C "Rejection reason preservation").
    p.reject(bridge, bridge.engine_value_to_host(&x));
    Ok(wrap(bridge, p))
}

fn promise_all<E: Engine + 'static>(
    bridge: &Rc<Bridge<E>>,
    _this: &E::Value,
    args: &[E::Value],
) -> Result<E::Value, E::Value> {
    let iterable_value = arg(bridge, args, 0);
    let items = iterable::consume_iterable(bridge, &iterable_value).map_err(|e| to_engine_err(bridge, e))?;
    Ok(wrap(bridge, combinators::all(bridge, items)))
}

fn promise_race<E: Engine + 'static>(
    bridge: &Rc<Bridge<E>>,
    _this: &E::Value,
    args: &[E::Value],
) -> Result<E::Value, E::Value> {
    let iterable_value = arg(bridge, args, 0);
    let items = iterable::consume_iterable(bridge, &iterable_value).map_err(|e| to_engine_err(bridge, e))?;
    Ok(wrap(bridge, combinators::race(bridge, items)))
}

fn promise_all_settled<E: Engine + 'static>(
    bridge: &Rc<Bridge<E>>,
    _this: &E::Value,
    args: &[E::Value],
) -> Result<E::Value, E::Value> {
    let iterable_value = arg(bridge, args, 0);
    let items = iterable::consume_iterable(bridge, &iterable_value).map_err(|e| to_engine_err(bridge, e))?;
    Ok(wrap(bridge, combinators::all_settled(bridge, items)))
}

fn promise_any<E: Engine + 'static>(
    bridge: &Rc<Bridge<E>>,
    _this: &E::Value,
    args: &[E::Value],
) -> Result<E::Value, E::Value> {
    let iterable_value = arg(bridge, args, 0);
    let items = iterable::consume_iterable(bridge, &iterable_value).map_err(|e| to_engine_err(bridge, e))?;
    Ok(wrap(bridge, combinators::any(bridge, items)))
}

fn promise_try<E: Engine + 'static>(
    bridge: &Rc<Bridge<E>>,
    _this: &E::Value,
    args: &[E::Value],
) -> Result<E::Value, E::Value> {
    let f = arg(bridge, args, 0);
    if !f.is_callable() {
        return Err(bridge.with_engine(|e| e.create_error("Promise.try argument is not a function")));
    }
    let rest = if args.len() > 1 { &args[1..] } else { &[] };
    let undef = bridge.with_engine(|e| e.undefined());
    let p = Promise::new_pending();
    match bridge.with_engine(|e| e.call_function(&f, &undef, rest)) {
        Ok(v) => p.resolve(bridge, bridge.engine_value_to_host(&v)),
        Err(thrown) => p.reject(bridge, bridge.engine_value_to_host(&thrown)),
    }
    Ok(wrap(bridge, p))
}

fn with_resolvers<E: Engine + 'static>(bridge: &Rc<Bridge<E>>) -> Resolvers<E> {
    let p = Promise::new_pending();
    let wrapped = wrap(bridge, p.clone());

    let p_resolve = p.clone();
    let resolve_fn = make_native(bridge, "resolve", 1, move |bridge, _this, args| {
        let v = arg(bridge, args, 0);
        p_resolve.resolve(bridge, bridge.engine_value_to_host(&v));
        Ok(bridge.with_engine(|e| e.undefined()))
    });
    let p_reject = p.clone();
    let reject_fn = make_native(bridge, "reject", 1, move |bridge, _this, args| {
        let v = arg(bridge, args, 0);
        p_reject.reject(bridge, bridge.engine_value_to_host(&v));
        Ok(bridge.with_engine(|e| e.undefined()))
    });

    Resolvers {
        promise: wrapped,
        resolve: resolve_fn,
        reject: reject_fn,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::global::tests::test_bridge;

    #[test]
    fn wrapping_the_same_promise_twice_returns_the_same_wrapper() {
        let bridge = test_bridge();
        let p = Promise::new_pending();
        let w1 = wrap(&bridge, p.clone());
        let w2 = wrap(&bridge, p.clone());
        assert_eq!(w1, w2);
    }

    #[test]
    fn resolve_returns_an_already_wrapped_promise_unchanged() {
        let bridge = test_bridge();
        let p = Promise::new_pending();
        let wrapped = wrap(&bridge, p);
        let result = promise_resolve(&bridge, &wrapped.clone(), &[wrapped.clone()]).unwrap();
        assert_eq!(result, wrapped);
    }

    #[test]
    fn non_callable_executor_throws_synchronously() {
        let bridge = test_bridge();
        let not_callable = bridge.with_engine(|e| e.number(1.0));
        let this = bridge.with_engine(|e| e.undefined());
        assert!(promise_constructor(&bridge, &this, &[not_callable]).is_err());
    }
}
