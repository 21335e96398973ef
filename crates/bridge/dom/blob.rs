/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! `Blob` (§6): an immutable byte buffer assembled from strings and other
//! blobs, with `.size`/`.type` reflected as plain properties and
//! `.text()`/`.arrayBuffer()`/`.slice()` returning settled promises, since
//! the real Blob methods are asynchronous even though nothing here actually
//! performs I/O.

use std::rc::Rc;

use bridge_traits::Engine;

use crate::global::Bridge;
use crate::promise::{Promise, PromiseFacade};
use crate::value::HostValue;

#[derive(Clone)]
pub struct BlobData {
    bytes: Rc<Vec<u8>>,
    mime_type: String,
}

impl BlobData {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn slice(&self, start: usize, end: usize, content_type: Option<String>) -> BlobData {
        let start = start.min(self.bytes.len());
        let end = end.clamp(start, self.bytes.len());
        BlobData {
            bytes: Rc::new(self.bytes[start..end].to_vec()),
            mime_type: content_type.unwrap_or_default(),
        }
    }
}

fn arg_string<E: Engine + 'static>(bridge: &Rc<Bridge<E>>, args: &[E::Value], index: usize) -> Option<String> {
    args.get(index).map(|v| bridge.with_engine(|e| e.to_rust_string(v)))
}

/// Wraps an already-known value as an immediately-resolved promise, since
/// `Blob`'s reader methods are asynchronous in the Web platform even though
/// nothing here performs real I/O.
fn resolved_promise<E: Engine + 'static>(bridge: &Rc<Bridge<E>>, value: E::Value) -> E::Value {
    let p = Promise::new_pending();
    p.resolve(bridge, HostValue::Engine(value));
    PromiseFacade::wrap(bridge, p)
}

fn read_parts<E: Engine + 'static>(bridge: &Rc<Bridge<E>>, parts: &E::Value) -> Vec<u8> {
    let mut out = Vec::new();
    if let Some(len) = bridge.with_engine(|e| e.array_length(parts)) {
        for i in 0..len {
            if let Some(part) = bridge.with_engine(|e| e.array_get(parts, i)) {
                if let Some(part_len) = bridge.with_engine(|e| e.array_length(&part)) {
                    for j in 0..part_len {
                        if let Some(byte) = bridge.with_engine(|e| e.array_get(&part, j)) {
                            out.push(bridge.with_engine(|e| e.to_rust_number(&byte)) as u8);
                        }
                    }
                } else {
                    let text = bridge.with_engine(|e| e.to_rust_string(&part));
                    out.extend_from_slice(text.as_bytes());
                }
            }
        }
    }
    out
}

pub fn install<E: Engine + 'static>(bridge: &Rc<Bridge<E>>) {
    let bridge_for_ctor = bridge.clone();
    let ctor = bridge.with_engine(|e| {
        e.create_function(
            "Blob",
            0,
            Rc::new(move |_this, args| {
                let bridge = bridge_for_ctor.clone();
                let bytes = match args.first() {
                    Some(parts) => read_parts(&bridge, parts),
                    None => Vec::new(),
                };
                let mime_type = args
                    .get(1)
                    .and_then(|opts| bridge.with_engine(|e| e.get_property(opts, "type")))
                    .map(|v| bridge.with_engine(|e| e.to_rust_string(&v)))
                    .unwrap_or_default();
                let data = BlobData {
                    bytes: Rc::new(bytes),
                    mime_type,
                };
                Ok(make_blob_object(&bridge, data))
            }),
        )
    });
    let global = bridge.with_engine(|e| e.global_object());
    bridge.with_engine(|e| e.set_property(&global, "Blob", ctor));
}

fn make_blob_object<E: Engine + 'static>(bridge: &Rc<Bridge<E>>, data: BlobData) -> E::Value {
    let obj = bridge.with_engine(|e| e.create_object(&[]));
    let size_value = bridge.with_engine(|e| e.number(data.size() as f64));
    bridge.with_engine(|e| e.set_property(&obj, "size", size_value));
    let type_value = bridge.with_engine(|e| e.string(&data.mime_type));
    bridge.with_engine(|e| e.set_property(&obj, "type", type_value));

    let data_for_text = data.clone();
    let bridge_for_text = bridge.clone();
    let text_fn = bridge.with_engine(|e| {
        e.create_function(
            "text",
            0,
            Rc::new(move |_this, _args| {
                let bridge = bridge_for_text.clone();
                let text = String::from_utf8_lossy(&data_for_text.bytes).into_owned();
                let value = bridge.with_engine(|e| e.string(&text));
                Ok(resolved_promise(&bridge, value))
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&obj, "text", text_fn));

    let data_for_array_buffer = data.clone();
    let bridge_for_array_buffer = bridge.clone();
    let array_buffer_fn = bridge.with_engine(|e| {
        e.create_function(
            "arrayBuffer",
            0,
            Rc::new(move |_this, _args| {
                let bridge = bridge_for_array_buffer.clone();
                let values: Vec<E::Value> = data_for_array_buffer
                    .bytes
                    .iter()
                    .map(|b| bridge.with_engine(|e| e.number(*b as f64)))
                    .collect();
                let array = bridge.with_engine(|e| e.create_array(&values));
                Ok(resolved_promise(&bridge, array))
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&obj, "arrayBuffer", array_buffer_fn));

    let data_for_slice = data;
    let bridge_for_slice = bridge.clone();
    let slice_fn = bridge.with_engine(|e| {
        e.create_function(
            "slice",
            2,
            Rc::new(move |_this, args| {
                let bridge = bridge_for_slice.clone();
                let start = args
                    .first()
                    .map(|v| bridge.with_engine(|e| e.to_rust_number(v)))
                    .unwrap_or(0.0)
                    .max(0.0) as usize;
                let end = args
                    .get(1)
                    .map(|v| bridge.with_engine(|e| e.to_rust_number(v)))
                    .unwrap_or(data_for_slice.size() as f64)
                    .max(0.0) as usize;
                let content_type = arg_string(&bridge, args, 2);
                let sliced = data_for_slice.slice(start, end, content_type);
                Ok(make_blob_object(&bridge, sliced))
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&obj, "slice", slice_fn));

    obj
}
