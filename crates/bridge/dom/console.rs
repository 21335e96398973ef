/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! `console` (§6). Deliberately narrow: `log`/`warn`/`error`/`info`/`debug`
//! are absent by design — an embedder that wants those routes output
//! through its own channel rather than this bridge's. What remains is the
//! timing/counting/grouping surface, all of it routed through the `log`
//! facade rather than `println!` so an embedder controls where it lands.

use std::collections::HashMap;
use std::rc::Rc;
use std::time::Instant;

use bridge_traits::{Engine, NativeFunction};

use crate::global::Bridge;

pub struct Console {
    timers: HashMap<String, Instant>,
    counts: HashMap<String, u64>,
    group_depth: usize,
}

impl Console {
    pub fn new() -> Self {
        Console {
            timers: HashMap::new(),
            counts: HashMap::new(),
            group_depth: 0,
        }
    }

    fn indent(&self) -> String {
        "  ".repeat(self.group_depth)
    }

    pub fn time(&mut self, label: &str) {
        self.timers.insert(label.to_string(), Instant::now());
    }

    pub fn time_end(&mut self, label: &str) {
        match self.timers.remove(label) {
            Some(start) => log::debug!("{}{label}: {:?}", self.indent(), start.elapsed()),
            None => log::warn!("Timer '{label}' does not exist"),
        }
    }

    pub fn time_log(&self, label: &str) {
        match self.timers.get(label) {
            Some(start) => log::debug!("{}{label}: {:?}", self.indent(), start.elapsed()),
            None => log::warn!("Timer '{label}' does not exist"),
        }
    }

    pub fn count(&mut self, label: &str) {
        let n = self.counts.entry(label.to_string()).or_insert(0);
        *n += 1;
        let n = *n;
        log::debug!("{}{label}: {n}", self.indent());
    }

    pub fn count_reset(&mut self, label: &str) {
        self.counts.remove(label);
    }

    pub fn assert(&self, condition: bool, message: &str) {
        if !condition {
            log::warn!("{}Assertion failed: {message}", self.indent());
        }
    }

    pub fn table(&self, data: &str) {
        log::debug!("{}{data}", self.indent());
    }

    pub fn group(&mut self, label: &str) {
        log::debug!("{}{label}", self.indent());
        self.group_depth += 1;
    }

    pub fn group_end(&mut self) {
        self.group_depth = self.group_depth.saturating_sub(1);
    }

    pub fn trace(&self, message: &str) {
        log::trace!("{}{message}", self.indent());
    }

    pub fn clear(&mut self) {
        self.timers.clear();
        self.counts.clear();
        self.group_depth = 0;
    }

    pub fn dir(&self, value: &str) {
        log::debug!("{}{value}", self.indent());
    }
}

impl Default for Console {
    fn default() -> Self {
        Console::new()
    }
}

pub fn install<E: Engine + 'static>(bridge: &Rc<Bridge<E>>) {
    let console_obj = bridge.with_engine(|e| e.create_object(&[]));

    string_arg_method(bridge, &console_obj, "time", |c, s| c.time(s));
    string_arg_method(bridge, &console_obj, "timeEnd", |c, s| c.time_end(s));
    string_arg_method(bridge, &console_obj, "timeLog", |c, s| c.time_log(s));
    string_arg_method(bridge, &console_obj, "count", |c, s| c.count(s));
    string_arg_method(bridge, &console_obj, "countReset", |c, s| c.count_reset(s));
    string_arg_method(bridge, &console_obj, "table", |c, s| c.table(s));
    string_arg_method(bridge, &console_obj, "group", |c, s| c.group(s));
    string_arg_method(bridge, &console_obj, "groupCollapsed", |c, s| c.group(s));
    string_arg_method(bridge, &console_obj, "trace", |c, s| c.trace(s));
    string_arg_method(bridge, &console_obj, "dir", |c, s| c.dir(s));

    let bridge_for_group_end = bridge.clone();
    let group_end_fn = bridge.with_engine(|e| {
        e.create_function(
            "groupEnd",
            0,
            Rc::new(move |_this, _args| {
                bridge_for_group_end.console.borrow_mut().group_end();
                Ok(bridge_for_group_end.with_engine(|e| e.undefined()))
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&console_obj, "groupEnd", group_end_fn));

    let bridge_for_clear = bridge.clone();
    let clear_fn = bridge.with_engine(|e| {
        e.create_function(
            "clear",
            0,
            Rc::new(move |_this, _args| {
                bridge_for_clear.console.borrow_mut().clear();
                Ok(bridge_for_clear.with_engine(|e| e.undefined()))
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&console_obj, "clear", clear_fn));

    let bridge_for_assert = bridge.clone();
    let assert_fn = bridge.with_engine(|e| {
        e.create_function(
            "assert",
            2,
            Rc::new(move |_this, args| {
                let bridge = bridge_for_assert.clone();
                let condition = args
                    .first()
                    .map(|v| bridge.with_engine(|e| e.to_rust_bool(v)))
                    .unwrap_or(false);
                let message = args
                    .get(1)
                    .map(|v| bridge.with_engine(|e| e.to_rust_string(v)))
                    .unwrap_or_default();
                bridge.console.borrow().assert(condition, &message);
                Ok(bridge.with_engine(|e| e.undefined()))
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&console_obj, "assert", assert_fn));

    let global = bridge.with_engine(|e| e.global_object());
    bridge.with_engine(|e| e.set_property(&global, "console", console_obj));
}

/// Installs a single-string-argument console method, e.g. `console.time(label)`.
fn string_arg_method<E, F>(bridge: &Rc<Bridge<E>>, console_obj: &E::Value, name: &'static str, apply: F)
where
    E: Engine + 'static,
    F: Fn(&mut Console, &str) + 'static,
{
    let bridge_for_fn = bridge.clone();
    let f: NativeFunction<E::Value> = Rc::new(move |_this, args| {
        let bridge = bridge_for_fn.clone();
        let label = args
            .first()
            .map(|v| bridge.with_engine(|e| e.to_rust_string(v)))
            .unwrap_or_default();
        apply(&mut bridge.console.borrow_mut(), &label);
        Ok(bridge.with_engine(|e| e.undefined()))
    });
    let func = bridge.with_engine(|e| e.create_function(name, 1, f));
    bridge.with_engine(|e| e.set_property(console_obj, name, func));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_end_without_a_matching_time_does_not_panic() {
        let mut console = Console::new();
        console.time_end("missing");
    }

    #[test]
    fn count_increments_per_label() {
        let mut console = Console::new();
        console.count("a");
        console.count("a");
        console.count("b");
        assert_eq!(console.counts.get("a").copied(), Some(2));
        assert_eq!(console.counts.get("b").copied(), Some(1));
    }

    #[test]
    fn group_end_below_zero_saturates() {
        let mut console = Console::new();
        console.group_end();
        assert_eq!(console.group_depth, 0);
    }
}
