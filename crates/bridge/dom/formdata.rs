/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! `FormData` (§6): an ordered multi-map of name/value entries, grounded on
//! the same append/set semantics as [`crate::dom::headers`] but without
//! name normalization — `FormData` field names are case-sensitive.

use std::cell::RefCell;
use std::rc::Rc;

use bridge_traits::Engine;

use crate::global::Bridge;

#[derive(Default)]
pub struct FormEntries {
    entries: Vec<(String, String)>,
}

impl FormEntries {
    pub fn append(&mut self, name: &str, value: &str) {
        self.entries.push((name.to_string(), value.to_string()));
    }

    /// `set(name, value)`: replaces the first entry for `name` in place and
    /// removes every later one, matching the Fetch/XHR spec so the surviving
    /// entry keeps its original position among entries for other names.
    pub fn set(&mut self, name: &str, value: &str) {
        let mut replaced = false;
        self.entries.retain_mut(|(k, v)| {
            if k != name {
                return true;
            }
            if replaced {
                return false;
            }
            *v = value.to_string();
            replaced = true;
            true
        });
        if !replaced {
            self.entries.push((name.to_string(), value.to_string()));
        }
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.entries.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone())
    }

    pub fn get_all(&self, name: &str) -> Vec<String> {
        self.entries.iter().filter(|(k, _)| k == name).map(|(_, v)| v.clone()).collect()
    }

    pub fn has(&self, name: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == name)
    }

    pub fn delete(&mut self, name: &str) {
        self.entries.retain(|(k, _)| k != name);
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }
}

pub fn install<E: Engine + 'static>(bridge: &Rc<Bridge<E>>) {
    let bridge_for_ctor = bridge.clone();
    let ctor = bridge.with_engine(|e| {
        e.create_function(
            "FormData",
            0,
            Rc::new(move |_this, _args| Ok(make_form_data_object(&bridge_for_ctor, FormEntries::default()))),
        )
    });
    let global = bridge.with_engine(|e| e.global_object());
    bridge.with_engine(|e| e.set_property(&global, "FormData", ctor));
}

fn make_form_data_object<E: Engine + 'static>(bridge: &Rc<Bridge<E>>, entries: FormEntries) -> E::Value {
    let state = Rc::new(RefCell::new(entries));
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

    let state_for_get_all = state.clone();
    let bridge_for_get_all = bridge.clone();
    let get_all_fn = bridge.with_engine(|e| {
        e.create_function(
            "getAll",
            1,
            Rc::new(move |_this, args| {
                let bridge = bridge_for_get_all.clone();
                let name = arg_string(&bridge, args, 0);
                let values: Vec<E::Value> = state_for_get_all
                    .borrow()
                    .get_all(&name)
                    .into_iter()
                    .map(|v| bridge.with_engine(|e| e.string(&v)))
                    .collect();
                Ok(bridge.with_engine(|e| e.create_array(&values)))
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&obj, "getAll", get_all_fn));

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

    let state_for_entries = state;
    let bridge_for_entries = bridge.clone();
    let entries_fn = bridge.with_engine(|e| {
        e.create_function(
            "entries",
            0,
            Rc::new(move |_this, _args| {
                let bridge = bridge_for_entries.clone();
                let pairs: Vec<E::Value> = state_for_entries
                    .borrow()
                    .entries()
                    .iter()
                    .map(|(name, value)| {
                        let name_v = bridge.with_engine(|e| e.string(name));
                        let value_v = bridge.with_engine(|e| e.string(value));
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_after_multiple_appends_keeps_only_entry_at_first_position() {
        let mut form = FormEntries::default();
        form.append("a", "1");
        form.append("b", "x");
        form.append("a", "2");
        form.set("a", "only");
        assert_eq!(form.get_all("a"), vec!["only".to_string()]);
        assert_eq!(form.entries()[0], ("a".to_string(), "only".to_string()));
        assert_eq!(form.entries()[1], ("b".to_string(), "x".to_string()));
    }

    #[test]
    fn append_is_case_sensitive() {
        let mut form = FormEntries::default();
        form.append("A", "1");
        assert!(!form.has("a"));
    }

    #[test]
    fn delete_removes_every_entry_for_the_name() {
        let mut form = FormEntries::default();
        form.append("a", "1");
        form.append("a", "2");
        form.delete("a");
        assert!(form.get_all("a").is_empty());
    }
}
