/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! A minimal in-process stand-in for a scripting engine, used only by this
//! crate's own tests so the promise/timer/iterable machinery can be
//! exercised without binding to a real interpreter.

#![cfg(test)]

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use bridge_traits::{Engine, EngineValue, NativeFunction};

use crate::global::{Bridge, BridgeConfig};

#[derive(Clone)]
pub enum RunValue {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Array(Rc<RefCell<Vec<RunValue>>>),
    Object(Rc<RefCell<IndexMap<String, RunValue>>>),
    Function(Rc<RunFunction>),
}

pub struct RunFunction {
    pub name: String,
    pub arity: u32,
    pub call: NativeFunction<RunValue>,
}

impl std::fmt::Debug for RunValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunValue::Undefined => write!(f, "undefined"),
            RunValue::Null => write!(f, "null"),
            RunValue::Bool(b) => write!(f, "{b}"),
            RunValue::Number(n) => write!(f, "{n}"),
            RunValue::String(s) => write!(f, "{s:?}"),
            RunValue::Array(a) => write!(f, "Array(len={})", a.borrow().len()),
            RunValue::Object(o) => write!(f, "Object(keys={:?})", o.borrow().keys().collect::<Vec<_>>()),
            RunValue::Function(func) => write!(f, "Function({})", func.name),
        }
    }
}

impl PartialEq for RunValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RunValue::Undefined, RunValue::Undefined) => true,
            (RunValue::Null, RunValue::Null) => true,
            (RunValue::Bool(a), RunValue::Bool(b)) => a == b,
            (RunValue::Number(a), RunValue::Number(b)) => a == b,
            (RunValue::String(a), RunValue::String(b)) => a == b,
            (RunValue::Array(a), RunValue::Array(b)) => Rc::ptr_eq(a, b),
            (RunValue::Object(a), RunValue::Object(b)) => Rc::ptr_eq(a, b),
            (RunValue::Function(a), RunValue::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl EngineValue for RunValue {
    fn is_object(&self) -> bool {
        matches!(self, RunValue::Array(_) | RunValue::Object(_) | RunValue::Function(_))
    }
    fn is_callable(&self) -> bool {
        matches!(self, RunValue::Function(_))
    }
    fn is_undefined(&self) -> bool {
        matches!(self, RunValue::Undefined)
    }
    fn is_null(&self) -> bool {
        matches!(self, RunValue::Null)
    }
}

/// A no-op "engine": evaluation is unsupported, but every other capability
/// (objects, arrays, function registration, property access) works
/// against plain Rust containers, which is all the CORE needs to be
/// exercised end to end.
#[derive(Default)]
pub struct RunScript;

impl Engine for RunScript {
    type Value = RunValue;

    fn eval(&mut self, _source: &str) -> Result<Self::Value, Self::Value> {
        Err(RunValue::String(Rc::from("eval is not supported by the test engine")))
    }

    fn global_object(&mut self) -> Self::Value {
        RunValue::Object(Rc::new(RefCell::new(IndexMap::new())))
    }

    fn undefined(&self) -> Self::Value {
        RunValue::Undefined
    }
    fn null(&self) -> Self::Value {
        RunValue::Null
    }
    fn boolean(&self, value: bool) -> Self::Value {
        RunValue::Bool(value)
    }
    fn number(&self, value: f64) -> Self::Value {
        RunValue::Number(value)
    }
    fn string(&self, value: &str) -> Self::Value {
        RunValue::String(Rc::from(value))
    }

    fn create_array(&mut self, items: &[Self::Value]) -> Self::Value {
        RunValue::Array(Rc::new(RefCell::new(items.to_vec())))
    }

    fn create_object(&mut self, entries: &[(String, Self::Value)]) -> Self::Value {
        let mut map = IndexMap::new();
        for (k, v) in entries {
            map.insert(k.clone(), v.clone());
        }
        RunValue::Object(Rc::new(RefCell::new(map)))
    }

    fn create_error(&mut self, message: &str) -> Self::Value {
        let mut map = IndexMap::new();
        map.insert("message".to_string(), RunValue::String(Rc::from(message)));
        map.insert("name".to_string(), RunValue::String(Rc::from("Error")));
        RunValue::Object(Rc::new(RefCell::new(map)))
    }

    fn create_function(&mut self, name: &str, arity: u32, f: NativeFunction<Self::Value>) -> Self::Value {
        RunValue::Function(Rc::new(RunFunction {
            name: name.to_string(),
            arity,
            call: f,
        }))
    }

    fn call_function(&mut self, f: &Self::Value, this: &Self::Value, args: &[Self::Value]) -> Result<Self::Value, Self::Value> {
        match f {
            RunValue::Function(func) => (func.call)(this, args),
            _ => Err(RunValue::String(Rc::from("value is not callable"))),
        }
    }

    fn get_property(&mut self, obj: &Self::Value, key: &str) -> Option<Self::Value> {
        match obj {
            RunValue::Object(map) => map.borrow().get(key).cloned(),
            RunValue::Array(arr) if key == "length" => Some(RunValue::Number(arr.borrow().len() as f64)),
            _ => None,
        }
    }

    fn set_property(&mut self, obj: &Self::Value, key: &str, value: Self::Value) {
        if let RunValue::Object(map) = obj {
            map.borrow_mut().insert(key.to_string(), value);
        }
    }

    fn get_own_keys(&mut self, v: &Self::Value) -> Vec<String> {
        match v {
            RunValue::Object(map) => map
                .borrow()
                .keys()
                .filter(|k| !k.starts_with('\0'))
                .cloned()
                .collect(),
            _ => Vec::new(),
        }
    }

    fn array_length(&mut self, v: &Self::Value) -> Option<u32> {
        match v {
            RunValue::Array(arr) => Some(arr.borrow().len() as u32),
            _ => None,
        }
    }

    fn array_get(&mut self, v: &Self::Value, index: u32) -> Option<Self::Value> {
        match v {
            RunValue::Array(arr) => arr.borrow().get(index as usize).cloned(),
            _ => None,
        }
    }

    fn to_rust_string(&mut self, v: &Self::Value) -> String {
        match v {
            RunValue::String(s) => s.to_string(),
            RunValue::Number(n) => n.to_string(),
            RunValue::Bool(b) => b.to_string(),
            RunValue::Undefined => "undefined".to_string(),
            RunValue::Null => "null".to_string(),
            other => format!("{other:?}"),
        }
    }

    fn to_rust_number(&mut self, v: &Self::Value) -> f64 {
        match v {
            RunValue::Number(n) => *n,
            RunValue::Bool(true) => 1.0,
            RunValue::Bool(false) => 0.0,
            RunValue::String(s) => s.parse().unwrap_or(f64::NAN),
            _ => f64::NAN,
        }
    }

    fn to_rust_bool(&mut self, v: &Self::Value) -> bool {
        match v {
            RunValue::Bool(b) => *b,
            RunValue::Undefined | RunValue::Null => false,
            RunValue::Number(n) => *n != 0.0 && !n.is_nan(),
            RunValue::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    fn get_internal_slot(&mut self, v: &Self::Value, name: &str) -> Option<u64> {
        match v {
            RunValue::Object(map) => match map.borrow().get(&format!("\0slot:{name}")) {
                Some(RunValue::Number(n)) => Some(*n as u64),
                _ => None,
            },
            _ => None,
        }
    }

    fn set_internal_slot(&mut self, v: &Self::Value, name: &str, id: u64) {
        if let RunValue::Object(map) = v {
            map.borrow_mut().insert(format!("\0slot:{name}"), RunValue::Number(id as f64));
        }
    }
}

pub fn test_bridge() -> Rc<Bridge<RunScript>> {
    Bridge::new(RunScript, BridgeConfig::default())
}
