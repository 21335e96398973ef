/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! `Symbol.for`/`Symbol.keyFor` (§6). The `Engine` trait has no primitive
//! for creating a genuine engine symbol, so this polyfills the global
//! symbol registry with plain objects carrying a `description` property and
//! an internal slot holding the registry id — good enough for the registry
//! contract (same key always returns the identical value, `keyFor` inverts
//! it) even though these aren't real ES symbols.

use std::cell::RefCell;
use std::rc::Rc;

use bridge_traits::Engine;

use crate::global::Bridge;

const SYMBOL_ID_SLOT: &str = "well-known-symbol-id";

thread_local! {
    static SYMBOL_VALUES: RefCell<Vec<Box<dyn std::any::Any>>> = RefCell::new(Vec::new());
}

pub fn install<E: Engine + 'static>(bridge: &Rc<Bridge<E>>) {
    let global = bridge.with_engine(|e| e.global_object());
    let symbol_ctor = match bridge.with_engine(|e| e.get_property(&global, "Symbol")) {
        Some(existing) => existing,
        None => {
            let bridge_for_ctor = bridge.clone();
            bridge.with_engine(|e| {
                e.create_function(
                    "Symbol",
                    1,
                    Rc::new(move |_this, args| {
                        let description = args
                            .first()
                            .map(|v| bridge_for_ctor.with_engine(|e| e.to_rust_string(v)))
                            .unwrap_or_default();
                        Ok(make_symbol_value(&bridge_for_ctor, &description))
                    }),
                )
            })
        }
    };

    let bridge_for_for = bridge.clone();
    let for_fn = bridge.with_engine(|e| {
        e.create_function(
            "for",
            1,
            Rc::new(move |_this, args| {
                let bridge = bridge_for_for.clone();
                let key = args
                    .first()
                    .map(|v| bridge.with_engine(|e| e.to_rust_string(v)))
                    .unwrap_or_default();
                Ok(symbol_for(&bridge, &key))
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&symbol_ctor, "for", for_fn));

    let bridge_for_key_for = bridge.clone();
    let key_for_fn = bridge.with_engine(|e| {
        e.create_function(
            "keyFor",
            1,
            Rc::new(move |_this, args| {
                let bridge = bridge_for_key_for.clone();
                let sym = args.first().cloned().unwrap_or_else(|| bridge.with_engine(|e| e.undefined()));
                match key_for(&bridge, &sym) {
                    Some(key) => Ok(bridge.with_engine(|e| e.string(&key))),
                    None => Ok(bridge.with_engine(|e| e.undefined())),
                }
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&symbol_ctor, "keyFor", key_for_fn));

    bridge.with_engine(|e| e.set_property(&global, "Symbol", symbol_ctor));
}

fn make_symbol_value<E: Engine + 'static>(bridge: &Rc<Bridge<E>>, description: &str) -> E::Value {
    let obj = bridge.with_engine(|e| e.create_object(&[]));
    let description_value = bridge.with_engine(|e| e.string(description));
    bridge.with_engine(|e| e.set_property(&obj, "description", description_value));
    obj
}

fn symbol_for<E: Engine + 'static>(bridge: &Rc<Bridge<E>>, key: &str) -> E::Value {
    if let Some(id) = bridge.symbol_registry.borrow().get(key).copied() {
        if let Some(existing) = SYMBOL_VALUES.with(|r| r.borrow().get(id as usize).and_then(|b| b.downcast_ref::<E::Value>().cloned())) {
            return existing;
        }
    }
    let value = make_symbol_value(bridge, key);
    let id = SYMBOL_VALUES.with(|r| {
        let mut r = r.borrow_mut();
        r.push(Box::new(value.clone()));
        (r.len() - 1) as u64
    });
    bridge.symbol_registry.borrow_mut().insert(key.to_string(), id);
    bridge.with_engine(|e| e.set_internal_slot(&value, SYMBOL_ID_SLOT, id));
    value
}

fn key_for<E: Engine + 'static>(bridge: &Rc<Bridge<E>>, value: &E::Value) -> Option<String> {
    let id = bridge.with_engine(|e| e.get_internal_slot(value, SYMBOL_ID_SLOT))?;
    bridge
        .symbol_registry
        .borrow()
        .iter()
        .find(|(_, v)| **v == id)
        .map(|(k, _)| k.clone())
}
