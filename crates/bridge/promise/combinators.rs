/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! `Promise.all/race/allSettled/any` (§4.C "Combinators"). Every combinator
//! treats each element the same way: wrap it in a fresh pending promise and
//! resolve that promise with the element, which gives thenable adoption
//! and promise fate-chaining for free via [`Promise::resolve`] — no
//! separate "is this already one of our promises" registry is needed.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use indexmap::IndexMap;

use bridge_traits::Engine;

use crate::global::Bridge;
use crate::value::HostValue;

use super::core::{Handler, Promise};

/// Wraps a single iterable element as a settlable promise (§4.C "All
/// combinators treat every non-promise element as if pre-resolved").
pub fn consume_settlable<E: Engine + 'static>(bridge: &Rc<Bridge<E>>, element: E::Value) -> Rc<Promise<E>> {
    let p = Promise::new_pending();
    let host = bridge.engine_value_to_host(&element);
    p.resolve(bridge, host);
    p
}

/// One element's outcome, as recorded by `allSettled`.
pub enum Settlement<E: Engine> {
    Fulfilled(HostValue<E>),
    Rejected(HostValue<E>),
}

impl<E: Engine> Settlement<E> {
    fn into_record(self) -> SettledRecord<E> {
        match self {
            Settlement::Fulfilled(value) => SettledRecord {
                status: "fulfilled",
                key: "value",
                value,
            },
            Settlement::Rejected(reason) => SettledRecord {
                status: "rejected",
                key: "reason",
                value: reason,
            },
        }
    }
}

/// A `{status, value}` or `{status, reason}` record, per `allSettled`'s
/// per-element result shape.
pub struct SettledRecord<E: Engine> {
    status: &'static str,
    key: &'static str,
    value: HostValue<E>,
}

impl<E: Engine> SettledRecord<E> {
    pub fn into_host(self) -> HostValue<E> {
        let mut map = IndexMap::new();
        map.insert("status".to_string(), HostValue::string(self.status));
        map.insert(self.key.to_string(), self.value);
        HostValue::Map(map)
    }
}

/// Builds the `.errors`-carrying rejection reason used by `any` (§4.C).
pub struct AggregateError;

impl AggregateError {
    pub fn build<E: Engine>(message: impl Into<String>, errors: Vec<HostValue<E>>) -> HostValue<E> {
        let mut extra = IndexMap::new();
        extra.insert("errors".to_string(), HostValue::Sequence(errors));
        HostValue::Error {
            message: message.into(),
            extra,
        }
    }
}

/// `Promise.all(iterable)`: resolves with positional values once every
/// element has fulfilled, rejects immediately with the first rejection.
pub fn all<E: Engine + 'static>(bridge: &Rc<Bridge<E>>, items: Vec<E::Value>) -> Rc<Promise<E>> {
    let result = Promise::new_pending();
    let n = items.len();
    if n == 0 {
        result.resolve(bridge, HostValue::Sequence(Vec::new()));
        return result;
    }
    let values: Rc<RefCell<Vec<HostValue<E>>>> =
        Rc::new(RefCell::new((0..n).map(|_| HostValue::Undefined).collect()));
    let remaining = Rc::new(Cell::new(n));
    for (i, el) in items.into_iter().enumerate() {
        let settlable = consume_settlable(bridge, el);
        let result_fulfill = result.clone();
        let result_reject = result.clone();
        let values_fulfill = values.clone();
        let remaining_fulfill = remaining.clone();
        settlable.then(
            bridge,
            Handler::native(move |b, v| {
                values_fulfill.borrow_mut()[i] = v;
                remaining_fulfill.set(remaining_fulfill.get() - 1);
                if remaining_fulfill.get() == 0 {
                    result_fulfill.resolve(b, HostValue::Sequence(values_fulfill.borrow().clone()));
                }
                Ok(HostValue::Undefined)
            }),
            Handler::native(move |b, e| {
                result_reject.reject(b, e);
                Ok(HostValue::Undefined)
            }),
        );
    }
    result
}

/// `Promise.race(iterable)`: settles with the first element to settle.
/// Empty iterable yields a forever-pending promise — no elements means no
/// handler ever attaches, so nothing ever settles `result`.
pub fn race<E: Engine + 'static>(bridge: &Rc<Bridge<E>>, items: Vec<E::Value>) -> Rc<Promise<E>> {
    let result = Promise::new_pending();
    for el in items {
        let settlable = consume_settlable(bridge, el);
        let result_fulfill = result.clone();
        let result_reject = result.clone();
        settlable.then(
            bridge,
            Handler::native(move |b, v| {
                result_fulfill.resolve(b, v);
                Ok(HostValue::Undefined)
            }),
            Handler::native(move |b, e| {
                result_reject.reject(b, e);
                Ok(HostValue::Undefined)
            }),
        );
    }
    result
}

/// `Promise.allSettled(iterable)`: always fulfills, with one
/// `{status, value|reason}` record per element in iteration order.
pub fn all_settled<E: Engine + 'static>(bridge: &Rc<Bridge<E>>, items: Vec<E::Value>) -> Rc<Promise<E>> {
    let result = Promise::new_pending();
    let n = items.len();
    if n == 0 {
        result.resolve(bridge, HostValue::Sequence(Vec::new()));
        return result;
    }
    let records: Rc<RefCell<Vec<HostValue<E>>>> =
        Rc::new(RefCell::new((0..n).map(|_| HostValue::Undefined).collect()));
    let remaining = Rc::new(Cell::new(n));
    for (i, el) in items.into_iter().enumerate() {
        let settlable = consume_settlable(bridge, el);
        let result_fulfill = result.clone();
        let result_reject = result.clone();
        let records_fulfill = records.clone();
        let records_reject = records.clone();
        let remaining_fulfill = remaining.clone();
        let remaining_reject = remaining.clone();
        settlable.then(
            bridge,
            Handler::native(move |b, v| {
                records_fulfill.borrow_mut()[i] = Settlement::Fulfilled(v).into_record().into_host();
                remaining_fulfill.set(remaining_fulfill.get() - 1);
                if remaining_fulfill.get() == 0 {
                    result_fulfill.resolve(b, HostValue::Sequence(records_fulfill.borrow().clone()));
                }
                Ok(HostValue::Undefined)
            }),
            Handler::native(move |b, e| {
                records_reject.borrow_mut()[i] = Settlement::Rejected(e).into_record().into_host();
                remaining_reject.set(remaining_reject.get() - 1);
                if remaining_reject.get() == 0 {
                    result_reject.resolve(b, HostValue::Sequence(records_reject.borrow().clone()));
                }
                Ok(HostValue::Undefined)
            }),
        );
    }
    result
}

/// `Promise.any(iterable)`: fulfills with the first fulfillment; rejects
/// with an aggregate error if every element rejects.
pub fn any<E: Engine + 'static>(bridge: &Rc<Bridge<E>>, items: Vec<E::Value>) -> Rc<Promise<E>> {
    let result = Promise::new_pending();
    let n = items.len();
    if n == 0 {
        result.reject(bridge, AggregateError::build("All promises were rejected", Vec::new()));
        return result;
    }
    let errors: Rc<RefCell<Vec<HostValue<E>>>> =
        Rc::new(RefCell::new((0..n).map(|_| HostValue::Undefined).collect()));
    let remaining = Rc::new(Cell::new(n));
    for (i, el) in items.into_iter().enumerate() {
        let settlable = consume_settlable(bridge, el);
        let result_fulfill = result.clone();
        let result_reject = result.clone();
        let errors_reject = errors.clone();
        let remaining_reject = remaining.clone();
        settlable.then(
            bridge,
            Handler::native(move |b, v| {
                result_fulfill.resolve(b, v);
                Ok(HostValue::Undefined)
            }),
            Handler::native(move |b, e| {
                errors_reject.borrow_mut()[i] = e;
                remaining_reject.set(remaining_reject.get() - 1);
                if remaining_reject.get() == 0 {
                    result_reject.reject(
                        b,
                        AggregateError::build("All promises were rejected", errors_reject.borrow().clone()),
                    );
                }
                Ok(HostValue::Undefined)
            }),
        );
    }
    result
}
