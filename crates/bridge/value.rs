/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Component B: bidirectional conversion between engine values and host
//! values, including wrapped promises (§4.B).

use std::rc::Rc;

use indexmap::IndexMap;

use bridge_traits::{Engine, EngineValue};

use crate::promise::Promise;

/// A value living on the host side of the boundary: either a primitive, a
/// host sequence/map destined to become an engine array/object, a host
/// promise, or an engine value being passed through unchanged.
///
/// Generic over the `Engine` itself, not just its value type: a wrapped
/// promise needs `Rc<Promise<E>>`, and `Promise<E>` in turn needs the full
/// `Engine` to call back into `Bridge::with_engine` when it settles.
pub enum HostValue<E: Engine> {
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    Sequence(Vec<HostValue<E>>),
    Map(IndexMap<String, HostValue<E>>),
    /// An error-shaped host value: message plus any extra enumerable keys,
    /// preserved through the boundary per §4.B.
    Error {
        message: String,
        extra: IndexMap<String, HostValue<E>>,
    },
    Promise(Rc<Promise<E>>),
    /// An engine value passed back through the marshaller unchanged,
    /// preserving its identity (§4.B).
    Engine(E::Value),
}

impl<E: Engine> Clone for HostValue<E> {
    fn clone(&self) -> Self {
        match self {
            HostValue::Undefined => HostValue::Undefined,
            HostValue::Null => HostValue::Null,
            HostValue::Boolean(b) => HostValue::Boolean(*b),
            HostValue::Number(n) => HostValue::Number(*n),
            HostValue::String(s) => HostValue::String(s.clone()),
            HostValue::Sequence(items) => HostValue::Sequence(items.clone()),
            HostValue::Map(map) => HostValue::Map(map.clone()),
            HostValue::Error { message, extra } => HostValue::Error {
                message: message.clone(),
                extra: extra.clone(),
            },
            HostValue::Promise(p) => HostValue::Promise(p.clone()),
            HostValue::Engine(v) => HostValue::Engine(v.clone()),
        }
    }
}

impl<E: Engine + 'static> std::fmt::Debug for HostValue<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostValue::Undefined => f.write_str("undefined"),
            HostValue::Null => f.write_str("null"),
            HostValue::Boolean(b) => write!(f, "{b}"),
            HostValue::Number(n) => write!(f, "{n}"),
            HostValue::String(s) => write!(f, "{s:?}"),
            HostValue::Sequence(items) => f.debug_list().entries(items).finish(),
            HostValue::Map(map) => f.debug_map().entries(map.iter()).finish(),
            HostValue::Error { message, .. } => write!(f, "Error({message:?})"),
            HostValue::Promise(p) => write!(f, "Promise(#{})", p.id()),
            HostValue::Engine(v) => write!(f, "Engine({v:?})"),
        }
    }
}

impl<E: Engine> HostValue<E> {
    pub fn string(s: impl Into<String>) -> Self {
        HostValue::String(s.into())
    }

    pub fn error(message: impl Into<String>) -> Self {
        HostValue::Error {
            message: message.into(),
            extra: IndexMap::new(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// Converts a marshalled host value into a live engine value. The inverse
/// of reading a settlement back out (see [`from_engine`]).
///
/// Host sequences become engine arrays by index assignment, preserving
/// order; host maps become plain objects with insertion order preserved.
/// Error-shaped values become engine errors whose `.message` is the host
/// message and whose extra keys are copied as own properties. A wrapped
/// promise needs the full `Bridge` to look up or populate the per-id
/// wrapper cache, so callers holding a `HostValue::Promise` should route it
/// through `crate::promise::PromiseFacade::wrap` instead of this function.
pub fn to_engine<E: Engine>(engine: &mut E, value: HostValue<E>) -> E::Value {
    match value {
        HostValue::Undefined => engine.undefined(),
        HostValue::Null => engine.null(),
        HostValue::Boolean(b) => engine.boolean(b),
        HostValue::Number(n) => engine.number(n),
        HostValue::String(s) => engine.string(&s),
        HostValue::Sequence(items) => {
            let values: Vec<E::Value> = items.into_iter().map(|v| to_engine(engine, v)).collect();
            engine.create_array(&values)
        }
        HostValue::Map(map) => {
            let entries: Vec<(String, E::Value)> = map
                .into_iter()
                .map(|(k, v)| (k, to_engine(engine, v)))
                .collect();
            engine.create_object(&entries)
        }
        HostValue::Error { message, extra } => {
            let err = engine.create_error(&message);
            for (k, v) in extra {
                let ev = to_engine(engine, v);
                engine.set_property(&err, &k, ev);
            }
            err
        }
        HostValue::Engine(v) => v,
        HostValue::Promise(_) => {
            unreachable!("wrapped-promise construction must go through PromiseFacade::wrap")
        }
    }
}

/// A `Send`-safe subset of [`HostValue`], carrying no engine handle and no
/// `Rc`. This is what a producer on another thread actually has in hand to
/// settle a promise with (§4.C "promise settlement calls ... are safe to
/// invoke from any thread") — anything richer would require marshalling an
/// engine value across threads, which this bridge never allows.
#[derive(Debug, Clone)]
pub enum ThreadSafeValue {
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    Sequence(Vec<ThreadSafeValue>),
    Map(IndexMap<String, ThreadSafeValue>),
    Error {
        message: String,
        extra: IndexMap<String, ThreadSafeValue>,
    },
}

impl ThreadSafeValue {
    pub fn string(s: impl Into<String>) -> Self {
        ThreadSafeValue::String(s.into())
    }

    pub fn error(message: impl Into<String>) -> Self {
        ThreadSafeValue::Error {
            message: message.into(),
            extra: IndexMap::new(),
        }
    }

    /// Widens back into a full [`HostValue`] once back on the loop thread,
    /// where an `Engine`/`Promise` variant would once again be meaningful.
    pub fn into_host_value<E: Engine>(self) -> HostValue<E> {
        match self {
            ThreadSafeValue::Undefined => HostValue::Undefined,
            ThreadSafeValue::Null => HostValue::Null,
            ThreadSafeValue::Boolean(b) => HostValue::Boolean(b),
            ThreadSafeValue::Number(n) => HostValue::Number(n),
            ThreadSafeValue::String(s) => HostValue::String(s),
            ThreadSafeValue::Sequence(items) => {
                HostValue::Sequence(items.into_iter().map(ThreadSafeValue::into_host_value).collect())
            }
            ThreadSafeValue::Map(map) => {
                HostValue::Map(map.into_iter().map(|(k, v)| (k, v.into_host_value())).collect())
            }
            ThreadSafeValue::Error { message, extra } => HostValue::Error {
                message,
                extra: extra.into_iter().map(|(k, v)| (k, v.into_host_value())).collect(),
            },
        }
    }
}

/// Extracts a best-effort host representation out of an arbitrary engine
/// value, for diagnostics and for handing non-promise settlement values
/// back to Rust call sites in tests. This is intentionally shallow for
/// objects (it does not recurse into arbitrary engine objects) since the
/// CORE never needs to deep-copy script-defined objects; only arrays are
/// walked structurally.
pub fn from_engine<E: Engine>(engine: &mut E, value: &E::Value) -> HostValue<E> {
    if value.is_undefined() {
        return HostValue::Undefined;
    }
    if value.is_null() {
        return HostValue::Null;
    }
    if let Some(len) = engine.array_length(value) {
        let mut items = Vec::with_capacity(len as usize);
        for i in 0..len {
            if let Some(item) = engine.array_get(value, i) {
                items.push(from_engine(engine, &item));
            } else {
                items.push(HostValue::Undefined);
            }
        }
        return HostValue::Sequence(items);
    }
    HostValue::Engine(value.clone())
}
