/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! `performance.now()`/`.timeOrigin`/marks/measures (§6), grounded on the
//! teacher's `dom::performance::Performance` entry-buffer shape but backed
//! by a plain `Vec` rather than a GC-traced DOM list.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

use indexmap::IndexMap;

use bridge_traits::Engine;

use crate::global::Bridge;
use crate::value::{self, HostValue};

#[derive(Clone)]
struct Entry {
    name: String,
    entry_type: &'static str,
    start_time: f64,
    duration: f64,
}

pub struct Performance {
    origin: Instant,
    entries: RefCell<Vec<Entry>>,
}

impl Performance {
    pub fn new(origin: Instant) -> Self {
        Performance {
            origin,
            entries: RefCell::new(Vec::new()),
        }
    }

    pub fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }

    pub fn mark(&self, name: &str) {
        self.entries.borrow_mut().push(Entry {
            name: name.to_string(),
            entry_type: "mark",
            start_time: self.now(),
            duration: 0.0,
        });
    }

    /// `measure(name, startMark?, endMark?)`: both marks default to the
    /// time origin and "now", matching an omitted argument in the Web
    /// Performance API.
    pub fn measure(&self, name: &str, start_mark: Option<&str>, end_mark: Option<&str>) {
        let start = start_mark
            .and_then(|m| self.find_mark_time(m))
            .unwrap_or(0.0);
        let end = end_mark.and_then(|m| self.find_mark_time(m)).unwrap_or_else(|| self.now());
        self.entries.borrow_mut().push(Entry {
            name: name.to_string(),
            entry_type: "measure",
            start_time: start,
            duration: (end - start).max(0.0),
        });
    }

    fn find_mark_time(&self, name: &str) -> Option<f64> {
        self.entries
            .borrow()
            .iter()
            .rev()
            .find(|e| e.entry_type == "mark" && e.name == name)
            .map(|e| e.start_time)
    }

    pub fn clear_marks(&self, name: Option<&str>) {
        self.retain_except("mark", name);
    }

    pub fn clear_measures(&self, name: Option<&str>) {
        self.retain_except("measure", name);
    }

    pub fn clear_resource_timings(&self) {
        self.retain_except("resource", None);
    }

    fn retain_except(&self, entry_type: &'static str, name: Option<&str>) {
        self.entries.borrow_mut().retain(|e| {
            if e.entry_type != entry_type {
                return true;
            }
            match name {
                Some(n) => e.name != n,
                None => false,
            }
        });
    }

    fn entries_matching<E: Engine>(&self, entry_type: Option<&str>, name: Option<&str>) -> HostValue<E> {
        let items: Vec<HostValue<E>> = self
            .entries
            .borrow()
            .iter()
            .filter(|e| entry_type.map_or(true, |t| t == e.entry_type))
            .filter(|e| name.map_or(true, |n| n == e.name))
            .map(entry_to_host)
            .collect();
        HostValue::Sequence(items)
    }
}

fn entry_to_host<E: Engine>(entry: &Entry) -> HostValue<E> {
    let mut map = IndexMap::new();
    map.insert("name".to_string(), HostValue::string(entry.name.clone()));
    map.insert("entryType".to_string(), HostValue::string(entry.entry_type));
    map.insert("startTime".to_string(), HostValue::Number(entry.start_time));
    map.insert("duration".to_string(), HostValue::Number(entry.duration));
    HostValue::Map(map)
}

fn arg_string<E: Engine + 'static>(bridge: &Rc<Bridge<E>>, args: &[E::Value], index: usize) -> String {
    let v = args.get(index).cloned().unwrap_or_else(|| bridge.with_engine(|e| e.undefined()));
    bridge.with_engine(|e| e.to_rust_string(&v))
}

pub fn install<E: Engine + 'static>(bridge: &Rc<Bridge<E>>) {
    let perf_obj = bridge.with_engine(|e| e.create_object(&[]));
    let origin_value = bridge.with_engine(|e| e.number(0.0));
    bridge.with_engine(|e| e.set_property(&perf_obj, "timeOrigin", origin_value));

    let bridge_for_now = bridge.clone();
    let now_fn = bridge.with_engine(|e| {
        e.create_function(
            "now",
            0,
            Rc::new(move |_this, _args| {
                let n = bridge_for_now.performance.now();
                Ok(bridge_for_now.with_engine(|e| e.number(n)))
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&perf_obj, "now", now_fn));

    let bridge_for_mark = bridge.clone();
    let mark_fn = bridge.with_engine(|e| {
        e.create_function(
            "mark",
            1,
            Rc::new(move |_this, args| {
                let bridge = bridge_for_mark.clone();
                let name = arg_string(&bridge, args, 0);
                bridge.performance.mark(&name);
                Ok(bridge.with_engine(|e| e.undefined()))
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&perf_obj, "mark", mark_fn));

    let bridge_for_measure = bridge.clone();
    let measure_fn = bridge.with_engine(|e| {
        e.create_function(
            "measure",
            1,
            Rc::new(move |_this, args| {
                let bridge = bridge_for_measure.clone();
                let name = arg_string(&bridge, args, 0);
                let start_mark = args.get(1).map(|v| bridge.with_engine(|e| e.to_rust_string(v)));
                let end_mark = args.get(2).map(|v| bridge.with_engine(|e| e.to_rust_string(v)));
                bridge
                    .performance
                    .measure(&name, start_mark.as_deref(), end_mark.as_deref());
                Ok(bridge.with_engine(|e| e.undefined()))
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&perf_obj, "measure", measure_fn));

    let bridge_for_get_entries = bridge.clone();
    let get_entries_fn = bridge.with_engine(|e| {
        e.create_function(
            "getEntries",
            0,
            Rc::new(move |_this, _args| {
                let bridge = bridge_for_get_entries.clone();
                let host: HostValue<E> = bridge.performance.entries_matching(None, None);
                Ok(bridge.with_engine(|e| value::to_engine(e, host)))
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&perf_obj, "getEntries", get_entries_fn));

    let bridge_for_get_by_type = bridge.clone();
    let get_entries_by_type_fn = bridge.with_engine(|e| {
        e.create_function(
            "getEntriesByType",
            1,
            Rc::new(move |_this, args| {
                let bridge = bridge_for_get_by_type.clone();
                let entry_type = arg_string(&bridge, args, 0);
                let host: HostValue<E> = bridge.performance.entries_matching(Some(&entry_type), None);
                Ok(bridge.with_engine(|e| value::to_engine(e, host)))
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&perf_obj, "getEntriesByType", get_entries_by_type_fn));

    let bridge_for_get_by_name = bridge.clone();
    let get_entries_by_name_fn = bridge.with_engine(|e| {
        e.create_function(
            "getEntriesByName",
            1,
            Rc::new(move |_this, args| {
                let bridge = bridge_for_get_by_name.clone();
                let name = arg_string(&bridge, args, 0);
                let host: HostValue<E> = bridge.performance.entries_matching(None, Some(&name));
                Ok(bridge.with_engine(|e| value::to_engine(e, host)))
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&perf_obj, "getEntriesByName", get_entries_by_name_fn));

    let bridge_for_clear_marks = bridge.clone();
    let clear_marks_fn = bridge.with_engine(|e| {
        e.create_function(
            "clearMarks",
            0,
            Rc::new(move |_this, args| {
                let bridge = bridge_for_clear_marks.clone();
                let name = args.first().map(|v| bridge.with_engine(|e| e.to_rust_string(v)));
                bridge.performance.clear_marks(name.as_deref());
                Ok(bridge.with_engine(|e| e.undefined()))
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&perf_obj, "clearMarks", clear_marks_fn));

    let bridge_for_clear_measures = bridge.clone();
    let clear_measures_fn = bridge.with_engine(|e| {
        e.create_function(
            "clearMeasures",
            0,
            Rc::new(move |_this, args| {
                let bridge = bridge_for_clear_measures.clone();
                let name = args.first().map(|v| bridge.with_engine(|e| e.to_rust_string(v)));
                bridge.performance.clear_measures(name.as_deref());
                Ok(bridge.with_engine(|e| e.undefined()))
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&perf_obj, "clearMeasures", clear_measures_fn));

    let bridge_for_clear_resource = bridge.clone();
    let clear_resource_fn = bridge.with_engine(|e| {
        e.create_function(
            "clearResourceTimings",
            0,
            Rc::new(move |_this, _args| {
                bridge_for_clear_resource.performance.clear_resource_timings();
                Ok(bridge_for_clear_resource.with_engine(|e| e.undefined()))
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&perf_obj, "clearResourceTimings", clear_resource_fn));

    let global = bridge.with_engine(|e| e.global_object());
    bridge.with_engine(|e| e.set_property(&global, "performance", perf_obj));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::RunScript;

    #[test]
    fn measure_uses_marks_as_endpoints() {
        let perf = Performance::new(Instant::now());
        perf.mark("start");
        std::thread::sleep(std::time::Duration::from_millis(1));
        perf.mark("end");
        perf.measure("span", Some("start"), Some("end"));
        let host: HostValue<RunScript> = perf.entries_matching(Some("measure"), None);
        match host {
            HostValue::Sequence(items) => assert_eq!(items.len(), 1),
            _ => panic!("expected a sequence"),
        }
    }

    #[test]
    fn clear_marks_removes_only_marks() {
        let perf = Performance::new(Instant::now());
        perf.mark("a");
        perf.measure("m", None, None);
        perf.clear_marks(None);
        let marks: HostValue<RunScript> = perf.entries_matching(Some("mark"), None);
        let measures: HostValue<RunScript> = perf.entries_matching(Some("measure"), None);
        assert!(matches!(marks, HostValue::Sequence(items) if items.is_empty()));
        assert!(matches!(measures, HostValue::Sequence(items) if items.len() == 1));
    }
}
