/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Component F: walks any engine-side iterable into a host sequence, array
//! fast-path first, falling back to the general `Symbol.iterator` protocol
//! (§4.F). Shared by every combinator in [`crate::promise::combinators`].

use bridge_traits::{Engine, EngineValue};

use crate::global::Bridge;
use crate::value::HostValue;

/// Consumes `v` eagerly into a `Vec` of engine values in iteration order.
/// Exceptions thrown by the iterator factory or by `.next()` are returned
/// as `Err` so callers can turn them into a rejection rather than a panic.
pub fn consume_iterable<E: Engine + 'static>(
    bridge: &Bridge<E>,
    v: &E::Value,
) -> Result<Vec<E::Value>, HostValue<E>> {
    if v.is_undefined() || v.is_null() {
        return Err(HostValue::error("cannot consume null or undefined"));
    }

    if let Some(len) = bridge.with_engine(|e| e.array_length(v)) {
        let mut items = Vec::with_capacity(len as usize);
        for i in 0..len {
            let item = bridge
                .with_engine(|e| e.array_get(v, i))
                .unwrap_or_else(|| bridge.with_engine(|e| e.undefined()));
            items.push(item);
        }
        return Ok(items);
    }

    let iterator_fn = bridge.with_engine(|e| e.get_property(v, "Symbol(Symbol.iterator)"));
    let iterator_fn = match iterator_fn {
        Some(f) => f,
        None => return Err(HostValue::error("not iterable: missing Symbol.iterator")),
    };
    if !iterator_fn.is_callable() {
        return Err(HostValue::error("symbol.iterator is not a function"));
    }

    let iterator = bridge
        .with_engine(|e| e.call_function(&iterator_fn, v, &[]))
        .map_err(|thrown| bridge.engine_value_to_host(&thrown))?;

    let next_fn = bridge
        .with_engine(|e| e.get_property(&iterator, "next"))
        .ok_or_else(|| HostValue::error("iterator.next is not a function"))?;
    if !next_fn.is_callable() {
        return Err(HostValue::error("iterator.next is not a function"));
    }

    let mut items = Vec::new();
    loop {
        let result = bridge
            .with_engine(|e| e.call_function(&next_fn, &iterator, &[]))
            .map_err(|thrown| bridge.engine_value_to_host(&thrown))?;

        // Malformed results (non-object, missing `done`) are tolerated:
        // `done` is treated as falsy and `value` as undefined (§4.F).
        let done = bridge
            .with_engine(|e| e.get_property(&result, "done"))
            .map(|d| bridge.with_engine(|e| e.to_rust_bool(&d)))
            .unwrap_or(false);
        if done {
            break;
        }
        let value = bridge
            .with_engine(|e| e.get_property(&result, "value"))
            .unwrap_or_else(|| bridge.with_engine(|e| e.undefined()));
        items.push(value);
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::global::tests::test_bridge;
    use bridge_traits::Engine;

    #[test]
    fn array_fast_path() {
        let bridge = test_bridge();
        let arr = bridge.with_engine(|e| {
            let items = vec![e.number(1.0), e.number(2.0), e.number(3.0)];
            e.create_array(&items)
        });
        let items = consume_iterable(&bridge, &arr).unwrap();
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn null_and_undefined_are_rejected() {
        let bridge = test_bridge();
        let undefined = bridge.with_engine(|e| e.undefined());
        let err = consume_iterable(&bridge, &undefined).unwrap_err();
        assert_eq!(err.as_str(), Some("cannot consume null or undefined"));
    }

    #[test]
    fn missing_symbol_iterator_is_rejected() {
        let bridge = test_bridge();
        let obj = bridge.with_engine(|e| e.create_object(&[]));
        let err = consume_iterable(&bridge, &obj).unwrap_err();
        assert_eq!(err.as_str(), Some("not iterable: missing Symbol.iterator"));
    }
}
