/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! `TextEncoder`/`TextDecoder` and `atob`/`btoa` (§6). Byte sequences cross
//! the boundary as plain arrays of numbers — the `Engine` trait has no
//! typed-array concept, so a `Uint8Array` is simply however the embedding
//! engine chooses to coerce a JS array of octets.

use std::rc::Rc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use bridge_traits::Engine;

use crate::dom::dom_exception::{self, DomExceptionName};
use crate::global::Bridge;

fn arg_string<E: Engine + 'static>(bridge: &Rc<Bridge<E>>, args: &[E::Value], index: usize) -> String {
    let v = args.get(index).cloned().unwrap_or_else(|| bridge.with_engine(|e| e.undefined()));
    bridge.with_engine(|e| e.to_rust_string(&v))
}

fn bytes_to_array<E: Engine + 'static>(bridge: &Rc<Bridge<E>>, bytes: &[u8]) -> E::Value {
    let values: Vec<E::Value> = bytes
        .iter()
        .map(|b| bridge.with_engine(|e| e.number(*b as f64)))
        .collect();
    bridge.with_engine(|e| e.create_array(&values))
}

/// Reads an array-like of octets back into bytes, clamping each element to
/// `u8` the way the Web IDL `[EnforceRange] octet` conversion does.
fn array_to_bytes<E: Engine + 'static>(bridge: &Rc<Bridge<E>>, value: &E::Value) -> Vec<u8> {
    let len = bridge.with_engine(|e| e.array_length(value)).unwrap_or(0);
    let mut out = Vec::with_capacity(len as usize);
    for i in 0..len {
        if let Some(item) = bridge.with_engine(|e| e.array_get(value, i)) {
            let n = bridge.with_engine(|e| e.to_rust_number(&item));
            out.push(n as u8);
        }
    }
    out
}

pub fn install<E: Engine + 'static>(bridge: &Rc<Bridge<E>>) {
    install_text_encoder(bridge);
    install_text_decoder(bridge);
    install_base64(bridge);
}

fn install_text_encoder<E: Engine + 'static>(bridge: &Rc<Bridge<E>>) {
    let bridge_for_ctor = bridge.clone();
    let ctor = bridge.with_engine(|e| {
        e.create_function(
            "TextEncoder",
            0,
            Rc::new(move |_this, _args| {
                let bridge = bridge_for_ctor.clone();
                let obj = bridge.with_engine(|e| e.create_object(&[]));
                let encoding_value = bridge.with_engine(|e| e.string("utf-8"));
                bridge.with_engine(|e| e.set_property(&obj, "encoding", encoding_value));

                let bridge_for_encode = bridge.clone();
                let encode_fn = bridge.with_engine(|e| {
                    e.create_function(
                        "encode",
                        1,
                        Rc::new(move |_this, args| {
                            let bridge = bridge_for_encode.clone();
                            let input = args.first().cloned().unwrap_or_else(|| bridge.with_engine(|e| e.undefined()));
                            let text = bridge.with_engine(|e| e.to_rust_string(&input));
                            Ok(bytes_to_array(&bridge, text.as_bytes()))
                        }),
                    )
                });
                bridge.with_engine(|e| e.set_property(&obj, "encode", encode_fn));
                Ok(obj)
            }),
        )
    });
    let global = bridge.with_engine(|e| e.global_object());
    bridge.with_engine(|e| e.set_property(&global, "TextEncoder", ctor));
}

fn install_text_decoder<E: Engine + 'static>(bridge: &Rc<Bridge<E>>) {
    let bridge_for_ctor = bridge.clone();
    let ctor = bridge.with_engine(|e| {
        e.create_function(
            "TextDecoder",
            0,
            Rc::new(move |_this, args| {
                let bridge = bridge_for_ctor.clone();
                let label = args
                    .first()
                    .map(|v| bridge.with_engine(|e| e.to_rust_string(v)))
                    .unwrap_or_else(|| "utf-8".to_string());
                let encoding = encoding_rs::Encoding::for_label(label.as_bytes()).ok_or_else(|| {
                    dom_exception::make(&bridge, DomExceptionName::NotSupported, &format!("unknown encoding: {label}"))
                })?;
                let fatal = args
                    .get(1)
                    .and_then(|opts| bridge.with_engine(|e| e.get_property(opts, "fatal")))
                    .map(|v| bridge.with_engine(|e| e.to_rust_bool(&v)))
                    .unwrap_or(false);
                let ignore_bom = args
                    .get(1)
                    .and_then(|opts| bridge.with_engine(|e| e.get_property(opts, "ignoreBOM")))
                    .map(|v| bridge.with_engine(|e| e.to_rust_bool(&v)))
                    .unwrap_or(false);

                let obj = bridge.with_engine(|e| e.create_object(&[]));
                let encoding_value = bridge.with_engine(|e| e.string(encoding.name()));
                bridge.with_engine(|e| e.set_property(&obj, "encoding", encoding_value));
                let fatal_value = bridge.with_engine(|e| e.boolean(fatal));
                bridge.with_engine(|e| e.set_property(&obj, "fatal", fatal_value));
                let ignore_bom_value = bridge.with_engine(|e| e.boolean(ignore_bom));
                bridge.with_engine(|e| e.set_property(&obj, "ignoreBOM", ignore_bom_value));

                let bridge_for_decode = bridge.clone();
                let decode_fn = bridge.with_engine(|e| {
                    e.create_function(
                        "decode",
                        1,
                        Rc::new(move |_this, args| {
                            let bridge = bridge_for_decode.clone();
                            let bytes = match args.first() {
                                Some(v) => array_to_bytes(&bridge, v),
                                None => Vec::new(),
                            };
                            let input: &[u8] = if ignore_bom {
                                strip_bom(encoding, &bytes)
                            } else {
                                &bytes
                            };
                            let (decoded, _, had_errors) = encoding.decode(input);
                            if fatal && had_errors {
                                return Err(dom_exception::make(&bridge, DomExceptionName::NotSupported, "decode error"));
                            }
                            Ok(bridge.with_engine(|e| e.string(&decoded)))
                        }),
                    )
                });
                bridge.with_engine(|e| e.set_property(&obj, "decode", decode_fn));
                Ok(obj)
            }),
        )
    });
    let global = bridge.with_engine(|e| e.global_object());
    bridge.with_engine(|e| e.set_property(&global, "TextDecoder", ctor));
}

fn strip_bom<'a>(encoding: &'static encoding_rs::Encoding, bytes: &'a [u8]) -> &'a [u8] {
    if encoding == encoding_rs::UTF_8 && bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        &bytes[3..]
    } else {
        bytes
    }
}

fn install_base64<E: Engine + 'static>(bridge: &Rc<Bridge<E>>) {
    let bridge_for_btoa = bridge.clone();
    let btoa_fn = bridge.with_engine(|e| {
        e.create_function(
            "btoa",
            1,
            Rc::new(move |_this, args| {
                let bridge = bridge_for_btoa.clone();
                let data = arg_string(&bridge, args, 0);
                let mut bytes = Vec::with_capacity(data.len());
                for ch in data.chars() {
                    let code = ch as u32;
                    if code > 0xFF {
                        return Err(dom_exception::make(
                            &bridge,
                            DomExceptionName::InvalidState,
                            "string contains characters outside of the Latin1 range",
                        ));
                    }
                    bytes.push(code as u8);
                }
                Ok(bridge.with_engine(|e| e.string(&BASE64.encode(&bytes))))
            }),
        )
    });
    let global = bridge.with_engine(|e| e.global_object());
    bridge.with_engine(|e| e.set_property(&global, "btoa", btoa_fn));

    let bridge_for_atob = bridge.clone();
    let atob_fn = bridge.with_engine(|e| {
        e.create_function(
            "atob",
            1,
            Rc::new(move |_this, args| {
                let bridge = bridge_for_atob.clone();
                let data = arg_string(&bridge, args, 0);
                let bytes = BASE64
                    .decode(data.trim())
                    .map_err(|_| dom_exception::make(&bridge, DomExceptionName::InvalidState, "invalid base64 data"))?;
                let decoded: String = bytes.iter().map(|b| *b as char).collect();
                Ok(bridge.with_engine(|e| e.string(&decoded)))
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&global, "atob", atob_fn));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::test_bridge;

    fn get<E: Engine + 'static>(bridge: &Rc<Bridge<E>>, obj: &E::Value, key: &str) -> E::Value {
        bridge.with_engine(|e| e.get_property(obj, key)).expect("property exists")
    }

    fn call<E: Engine + 'static>(bridge: &Rc<Bridge<E>>, obj: &E::Value, method: &str, args: &[E::Value]) -> Result<E::Value, E::Value> {
        let f = get(bridge, obj, method);
        bridge.with_engine(|e| e.call_function(&f, obj, args))
    }

    #[test]
    fn text_encoder_then_decoder_round_trips_ascii() {
        let bridge = test_bridge();
        let encoder_ctor = bridge.with_engine(|e| e.global_object());
        let encoder_ctor = get(&bridge, &encoder_ctor, "TextEncoder");
        let undef = bridge.with_engine(|e| e.undefined());
        let encoder = bridge.with_engine(|e| e.call_function(&encoder_ctor, &undef, &[])).unwrap();
        let input = bridge.with_engine(|e| e.string("hello"));
        let encoded = call(&bridge, &encoder, "encode", &[input]).unwrap();

        let global = bridge.with_engine(|e| e.global_object());
        let decoder_ctor = get(&bridge, &global, "TextDecoder");
        let decoder = bridge.with_engine(|e| e.call_function(&decoder_ctor, &undef, &[])).unwrap();
        let decoded = call(&bridge, &decoder, "decode", &[encoded]).unwrap();
        assert_eq!(bridge.with_engine(|e| e.to_rust_string(&decoded)), "hello");
    }

    #[test]
    fn btoa_then_atob_round_trips() {
        let bridge = test_bridge();
        let global = bridge.with_engine(|e| e.global_object());
        let btoa = get(&bridge, &global, "btoa");
        let atob = get(&bridge, &global, "atob");
        let undef = bridge.with_engine(|e| e.undefined());
        let input = bridge.with_engine(|e| e.string("hello world"));
        let encoded = bridge.with_engine(|e| e.call_function(&btoa, &undef, &[input])).unwrap();
        let decoded = bridge.with_engine(|e| e.call_function(&atob, &undef, &[encoded])).unwrap();
        assert_eq!(bridge.with_engine(|e| e.to_rust_string(&decoded)), "hello world");
    }

    #[test]
    fn btoa_rejects_non_latin1_input() {
        let bridge = test_bridge();
        let global = bridge.with_engine(|e| e.global_object());
        let btoa = get(&bridge, &global, "btoa");
        let undef = bridge.with_engine(|e| e.undefined());
        let input = bridge.with_engine(|e| e.string("\u{1F600}"));
        assert!(bridge.with_engine(|e| e.call_function(&btoa, &undef, &[input])).is_err());
    }
}
