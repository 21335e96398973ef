/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! `crypto.randomUUID()` / `crypto.getRandomValues()` (§6).

use std::rc::Rc;

use rand::RngCore;
use uuid::Uuid;

use bridge_traits::Engine;

use crate::dom::dom_exception::DomExceptionName;
use crate::error::BridgeError;
use crate::global::Bridge;

/// `getRandomValues` refuses buffers over this many bytes, per the Web
/// Crypto API's `QuotaExceededError` limit.
const MAX_RANDOM_VALUES_BYTES: usize = 65536;

pub struct Crypto;

impl Crypto {
    pub fn new() -> Self {
        Crypto
    }

    pub fn random_uuid(&self) -> String {
        Uuid::new_v4().to_string()
    }

    /// Fills `buffer` in place with cryptographically random bytes.
    pub fn get_random_values(&self, buffer: &mut [u8]) -> Result<(), BridgeError> {
        if buffer.len() > MAX_RANDOM_VALUES_BYTES {
            return Err(BridgeError::dom(
                DomExceptionName::QuotaExceeded,
                format!("getRandomValues buffer exceeds {MAX_RANDOM_VALUES_BYTES} bytes"),
            ));
        }
        rand::thread_rng().fill_bytes(buffer);
        Ok(())
    }
}

impl Default for Crypto {
    fn default() -> Self {
        Crypto::new()
    }
}

pub fn install<E: Engine + 'static>(bridge: &Rc<Bridge<E>>) {
    let crypto_obj = bridge.with_engine(|e| e.create_object(&[]));

    let bridge_for_uuid = bridge.clone();
    let random_uuid_fn = bridge.with_engine(|e| {
        e.create_function(
            "randomUUID",
            0,
            Rc::new(move |_this, _args| {
                let uuid = bridge_for_uuid.crypto.random_uuid();
                Ok(bridge_for_uuid.with_engine(|e| e.string(&uuid)))
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&crypto_obj, "randomUUID", random_uuid_fn));

    let bridge_for_random = bridge.clone();
    let get_random_values_fn = bridge.with_engine(|e| {
        e.create_function(
            "getRandomValues",
            1,
            Rc::new(move |_this, args| {
                let bridge = bridge_for_random.clone();
                let typed_array = match args.first() {
                    Some(v) => v.clone(),
                    None => return Err(bridge.with_engine(|e| e.create_error("getRandomValues requires an argument"))),
                };
                let len = bridge
                    .with_engine(|e| e.array_length(&typed_array))
                    .ok_or_else(|| bridge.with_engine(|e| e.create_error("getRandomValues requires an array-like argument")))?;
                let mut bytes = vec![0u8; len as usize];
                if let Err(err) = bridge.crypto.get_random_values(&mut bytes) {
                    return Err(bridge.with_engine(|e| e.create_error(&err.to_string())));
                }
                bridge.with_engine(|e| {
                    for (i, byte) in bytes.into_iter().enumerate() {
                        let value = e.number(byte as f64);
                        e.set_property(&typed_array, &i.to_string(), value);
                    }
                });
                Ok(typed_array)
            }),
        )
    });
    bridge.with_engine(|e| e.set_property(&crypto_obj, "getRandomValues", get_random_values_fn));

    let global = bridge.with_engine(|e| e.global_object());
    bridge.with_engine(|e| e.set_property(&global, "crypto", crypto_obj));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_uuid_is_well_formed() {
        let crypto = Crypto::new();
        let id = crypto.random_uuid();
        assert_eq!(id.len(), 36);
        assert_eq!(id.chars().filter(|&c| c == '-').count(), 4);
    }

    #[test]
    fn get_random_values_rejects_oversized_buffers() {
        let crypto = Crypto::new();
        let mut buf = vec![0u8; MAX_RANDOM_VALUES_BYTES + 1];
        assert!(crypto.get_random_values(&mut buf).is_err());
    }

    #[test]
    fn get_random_values_fills_the_whole_buffer() {
        let crypto = Crypto::new();
        let mut buf = vec![0u8; 32];
        crypto.get_random_values(&mut buf).unwrap();
        assert!(buf.iter().any(|&b| b != 0));
    }
}
