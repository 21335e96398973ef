/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! `structuredClone(value)` (§6). Deep-clones primitives, arrays, and plain
//! objects (walked via `Engine::get_own_keys`), with cycle detection.
//! Map/Set/Date/RegExp aren't modeled by any `Engine` primitive, so they
//! clone as plain objects of their own properties rather than round-trip
//! through their native shape; functions are rejected with a
//! `DataCloneError`, matching the platform's own refusal to clone callable
//! values.

use std::rc::Rc;

use bridge_traits::{Engine, EngineValue};

use crate::dom::dom_exception::{self, DomExceptionName};
use crate::global::Bridge;

/// Deep-clones arrays (rebuilding a fresh array per `Engine::create_array`)
/// and passes primitives through by value. Cycles are broken by an
/// identity-keyed seen-list using `PartialEq`'s engine-identity contract.
fn clone_value<E: Engine + 'static>(
    bridge: &Rc<Bridge<E>>,
    value: &E::Value,
    seen: &mut Vec<(E::Value, E::Value)>,
) -> Result<E::Value, E::Value> {
    if value.is_callable() {
        return Err(dom_exception::make(bridge, DomExceptionName::DataClone, "could not be cloned: function"));
    }
    if !value.is_object() {
        return Ok(value.clone());
    }
    if let Some((_, clone)) = seen.iter().find(|(original, _)| original == value) {
        return Ok(clone.clone());
    }
    if let Some(len) = bridge.with_engine(|e| e.array_length(value)) {
        let placeholder = bridge.with_engine(|e| e.create_array(&[]));
        seen.push((value.clone(), placeholder.clone()));
        let mut items = Vec::with_capacity(len as usize);
        for i in 0..len {
            let item = bridge
                .with_engine(|e| e.array_get(value, i))
                .unwrap_or_else(|| bridge.with_engine(|e| e.undefined()));
            items.push(clone_value(bridge, &item, seen)?);
        }
        let array = bridge.with_engine(|e| e.create_array(&items));
        if let Some(slot) = seen.iter_mut().find(|(original, _)| original == value) {
            slot.1 = array.clone();
        }
        return Ok(array);
    }

    let keys = bridge.with_engine(|e| e.get_own_keys(value));
    let placeholder = bridge.with_engine(|e| e.create_object(&[]));
    seen.push((value.clone(), placeholder.clone()));
    for key in keys {
        let prop = bridge
            .with_engine(|e| e.get_property(value, &key))
            .unwrap_or_else(|| bridge.with_engine(|e| e.undefined()));
        let cloned_prop = clone_value(bridge, &prop, seen)?;
        bridge.with_engine(|e| e.set_property(&placeholder, &key, cloned_prop));
    }
    Ok(placeholder)
}

pub fn install<E: Engine + 'static>(bridge: &Rc<Bridge<E>>) {
    let bridge_for_fn = bridge.clone();
    let clone_fn = bridge.with_engine(|e| {
        e.create_function(
            "structuredClone",
            1,
            Rc::new(move |_this, args| {
                let bridge = bridge_for_fn.clone();
                let input = args.first().cloned().unwrap_or_else(|| bridge.with_engine(|e| e.undefined()));
                let mut seen = Vec::new();
                clone_value(&bridge, &input, &mut seen)
            }),
        )
    });
    let global = bridge.with_engine(|e| e.global_object());
    bridge.with_engine(|e| e.set_property(&global, "structuredClone", clone_fn));
}
