/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! A minimal stand-in scripting engine for integration tests, mirroring the
//! library's own internal `testutil::RunScript` (unavailable here since
//! `tests/*` link the crate as an external consumer, not its own
//! `--cfg test` build) — plain Rust containers for objects/arrays/functions,
//! `eval` unsupported.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use bridge::{Engine, EngineValue};
use bridge_traits::NativeFunction;

#[derive(Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Rc<RefCell<IndexMap<String, Value>>>),
    Function(Rc<Func>),
}

pub struct Func {
    pub call: NativeFunction<Value>,
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Array(a) => write!(f, "Array(len={})", a.borrow().len()),
            Value::Object(o) => write!(f, "Object(keys={:?})", o.borrow().keys().collect::<Vec<_>>()),
            Value::Function(_) => write!(f, "Function"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl EngineValue for Value {
    fn is_object(&self) -> bool {
        matches!(self, Value::Array(_) | Value::Object(_) | Value::Function(_))
    }
    fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_))
    }
    fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }
    fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

#[derive(Default)]
pub struct TestEngine;

impl Engine for TestEngine {
    type Value = Value;

    fn eval(&mut self, _source: &str) -> Result<Self::Value, Self::Value> {
        Err(Value::String(Rc::from("eval is not supported by the test engine")))
    }

    fn global_object(&mut self) -> Self::Value {
        Value::Object(Rc::new(RefCell::new(IndexMap::new())))
    }

    fn undefined(&self) -> Self::Value {
        Value::Undefined
    }
    fn null(&self) -> Self::Value {
        Value::Null
    }
    fn boolean(&self, value: bool) -> Self::Value {
        Value::Bool(value)
    }
    fn number(&self, value: f64) -> Self::Value {
        Value::Number(value)
    }
    fn string(&self, value: &str) -> Self::Value {
        Value::String(Rc::from(value))
    }

    fn create_array(&mut self, items: &[Self::Value]) -> Self::Value {
        Value::Array(Rc::new(RefCell::new(items.to_vec())))
    }

    fn create_object(&mut self, entries: &[(String, Self::Value)]) -> Self::Value {
        let mut map = IndexMap::new();
        for (k, v) in entries {
            map.insert(k.clone(), v.clone());
        }
        Value::Object(Rc::new(RefCell::new(map)))
    }

    fn create_error(&mut self, message: &str) -> Self::Value {
        let mut map = IndexMap::new();
        map.insert("message".to_string(), Value::String(Rc::from(message)));
        map.insert("name".to_string(), Value::String(Rc::from("Error")));
        Value::Object(Rc::new(RefCell::new(map)))
    }

    fn create_function(&mut self, _name: &str, _arity: u32, f: NativeFunction<Self::Value>) -> Self::Value {
        Value::Function(Rc::new(Func { call: f }))
    }

    fn call_function(&mut self, f: &Self::Value, this: &Self::Value, args: &[Self::Value]) -> Result<Self::Value, Self::Value> {
        match f {
            Value::Function(func) => (func.call)(this, args),
            _ => Err(Value::String(Rc::from("value is not callable"))),
        }
    }

    fn get_property(&mut self, obj: &Self::Value, key: &str) -> Option<Self::Value> {
        match obj {
            Value::Object(map) => map.borrow().get(key).cloned(),
            Value::Array(arr) if key == "length" => Some(Value::Number(arr.borrow().len() as f64)),
            _ => None,
        }
    }

    fn set_property(&mut self, obj: &Self::Value, key: &str, value: Self::Value) {
        if let Value::Object(map) = obj {
            map.borrow_mut().insert(key.to_string(), value);
        }
    }

    fn get_own_keys(&mut self, v: &Self::Value) -> Vec<String> {
        match v {
            Value::Object(map) => map
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
            Value::Array(arr) => Some(arr.borrow().len() as u32),
            _ => None,
        }
    }

    fn array_get(&mut self, v: &Self::Value, index: u32) -> Option<Self::Value> {
        match v {
            Value::Array(arr) => arr.borrow().get(index as usize).cloned(),
            _ => None,
        }
    }

    fn to_rust_string(&mut self, v: &Self::Value) -> String {
        match v {
            Value::String(s) => s.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            other => format!("{other:?}"),
        }
    }

    fn to_rust_number(&mut self, v: &Self::Value) -> f64 {
        match v {
            Value::Number(n) => *n,
            Value::Bool(true) => 1.0,
            Value::Bool(false) => 0.0,
            Value::String(s) => s.parse().unwrap_or(f64::NAN),
            _ => f64::NAN,
        }
    }

    fn to_rust_bool(&mut self, v: &Self::Value) -> bool {
        match v {
            Value::Bool(b) => *b,
            Value::Undefined | Value::Null => false,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    fn get_internal_slot(&mut self, v: &Self::Value, name: &str) -> Option<u64> {
        match v {
            Value::Object(map) => match map.borrow().get(&format!("\0slot:{name}")) {
                Some(Value::Number(n)) => Some(*n as u64),
                _ => None,
            },
            _ => None,
        }
    }

    fn set_internal_slot(&mut self, v: &Self::Value, name: &str, id: u64) {
        if let Value::Object(map) = v {
            map.borrow_mut().insert(format!("\0slot:{name}"), Value::Number(id as f64));
        }
    }
}

pub fn new_bridge() -> Rc<bridge::Bridge<TestEngine>> {
    let bridge = bridge::Bridge::new(TestEngine, bridge::BridgeConfig::default());
    bridge.bind().expect("bind should succeed on a fresh bridge");
    bridge
}

pub fn get(bridge: &Rc<bridge::Bridge<TestEngine>>, obj: &Value, key: &str) -> Value {
    bridge.with_engine(|e| e.get_property(obj, key)).expect("property exists")
}

pub fn call(bridge: &Rc<bridge::Bridge<TestEngine>>, f: &Value, this: &Value, args: &[Value]) -> Result<Value, Value> {
    bridge.with_engine(|e| e.call_function(f, this, args))
}
