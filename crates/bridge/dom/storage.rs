/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! `localStorage`/`sessionStorage` (§6). Each global gets its own isolated
//! [`Storage`] instance; values are coerced to strings on write, matching
//! the Web Storage API's string-only contract.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use bridge_traits::Engine;

use crate::global::Bridge;

pub struct Storage {
    entries: RefCell<IndexMap<String, String>>,
}

impl Storage {
    pub fn new() -> Self {
        Storage {
            entries: RefCell::new(IndexMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn key(&self, index: usize) -> Option<String> {
        self.entries.borrow().get_index(index).map(|(k, _)| k.clone())
    }

    pub fn get_item(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    pub fn set_item(&self, key: &str, value: &str) {
        self.entries.borrow_mut().insert(key.to_string(), value.to_string());
    }

    pub fn remove_item(&self, key: &str) {
        self.entries.borrow_mut().shift_remove(key);
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

impl Default for Storage {
    fn default() -> Self {
        Storage::new()
    }
}

pub fn install<E: Engine + 'static>(bridge: &Rc<Bridge<E>>) {
    install_one(bridge, "localStorage", |b| &b.local_storage);
    install_one(bridge, "sessionStorage", |b| &b.session_storage);
}

fn install_one<E: Engine + 'static>(
    bridge: &Rc<Bridge<E>>,
    global_name: &'static str,
    pick: fn(&Bridge<E>) -> &Storage,
) {
    let storage_obj = bridge.with_engine(|e| e.create_object(&[]));

    let bridge_for_get = bridge.clone();
    let get_item_fn = bridge.with_engine(|e| {
        e.create_function(
            "getItem",
            1,
            Rc::new(move |_this, args| {
                let bridge = bridge_for_get.clone();
                let key = arg_string(&bridge, args, 0);
                match pick(&bridge).get_item(&key) {
                    Some(v) => Ok(bridge.with_engine(|e| e.string(&v))),
                    None => Ok(bridge.with_engine(|e| e.null())),
                }
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&storage_obj, "getItem", get_item_fn));

    let bridge_for_set = bridge.clone();
    let set_item_fn = bridge.with_engine(|e| {
        e.create_function(
            "setItem",
            2,
            Rc::new(move |_this, args| {
                let bridge = bridge_for_set.clone();
                let key = arg_string(&bridge, args, 0);
                let value = arg_string(&bridge, args, 1);
                pick(&bridge).set_item(&key, &value);
                Ok(bridge.with_engine(|e| e.undefined()))
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&storage_obj, "setItem", set_item_fn));

    let bridge_for_remove = bridge.clone();
    let remove_item_fn = bridge.with_engine(|e| {
        e.create_function(
            "removeItem",
            1,
            Rc::new(move |_this, args| {
                let bridge = bridge_for_remove.clone();
                let key = arg_string(&bridge, args, 0);
                pick(&bridge).remove_item(&key);
                Ok(bridge.with_engine(|e| e.undefined()))
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&storage_obj, "removeItem", remove_item_fn));

    let bridge_for_clear = bridge.clone();
    let clear_fn = bridge.with_engine(|e| {
        e.create_function(
            "clear",
            0,
            Rc::new(move |_this, _args| {
                pick(&bridge_for_clear).clear();
                Ok(bridge_for_clear.with_engine(|e| e.undefined()))
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&storage_obj, "clear", clear_fn));

    let bridge_for_key = bridge.clone();
    let key_fn = bridge.with_engine(|e| {
        e.create_function(
            "key",
            1,
            Rc::new(move |_this, args| {
                let bridge = bridge_for_key.clone();
                let index = args
                    .first()
                    .map(|v| bridge.with_engine(|e| e.to_rust_number(v)))
                    .unwrap_or(0.0);
                match pick(&bridge).key(index.max(0.0) as usize) {
                    Some(k) => Ok(bridge.with_engine(|e| e.string(&k))),
                    None => Ok(bridge.with_engine(|e| e.null())),
                }
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&storage_obj, "key", key_fn));

    let bridge_for_length = bridge.clone();
    let length_fn = bridge.with_engine(|e| {
        e.create_function(
            "length",
            0,
            Rc::new(move |_this, _args| {
                let n = pick(&bridge_for_length).len();
                Ok(bridge_for_length.with_engine(|e| e.number(n as f64)))
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&storage_obj, "length", length_fn));

    let global = bridge.with_engine(|e| e.global_object());
    bridge.with_engine(|e| e.set_property(&global, global_name, storage_obj));
}

fn arg_string<E: Engine + 'static>(bridge: &Rc<Bridge<E>>, args: &[E::Value], index: usize) -> String {
    let v = args.get(index).cloned().unwrap_or_else(|| bridge.with_engine(|e| e.undefined()));
    bridge.with_engine(|e| e.to_rust_string(&v))
}
