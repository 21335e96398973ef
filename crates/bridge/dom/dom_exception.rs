/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! `DOMException` names and their legacy numeric codes, per the WebIDL
//! exceptions table. Only the names this bridge actually raises are
//! listed; the rest of the WebIDL table is not load-bearing here.

use std::rc::Rc;

use bridge_traits::Engine;

use crate::global::Bridge;

/// A `DOMException.name`, each with its historical `.code` (0 for names
/// introduced after the legacy code table was frozen).
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum DomExceptionName {
    IndexSize,
    InvalidState,
    NotSupported,
    Abort,
    Timeout,
    DataClone,
    QuotaExceeded,
}

impl DomExceptionName {
    pub fn as_str(self) -> &'static str {
        match self {
            DomExceptionName::IndexSize => "IndexSizeError",
            DomExceptionName::InvalidState => "InvalidStateError",
            DomExceptionName::NotSupported => "NotSupportedError",
            DomExceptionName::Abort => "AbortError",
            DomExceptionName::Timeout => "TimeoutError",
            DomExceptionName::DataClone => "DataCloneError",
            DomExceptionName::QuotaExceeded => "QuotaExceededError",
        }
    }

    /// Legacy numeric code, per the WebIDL `DOMException` table. Names with
    /// no historical code return 0, matching the platform.
    pub fn code(self) -> u16 {
        match self {
            DomExceptionName::IndexSize => 1,
            DomExceptionName::InvalidState => 11,
            DomExceptionName::NotSupported => 9,
            DomExceptionName::Abort => 20,
            DomExceptionName::Timeout => 23,
            DomExceptionName::DataClone => 25,
            DomExceptionName::QuotaExceeded => 22,
        }
    }
}

impl std::fmt::Display for DomExceptionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every name this bridge can raise, in WebIDL table order — used to seed
/// both the constructor's static integer-code constants and `.name`
/// lookup-by-string for the `DOMException(message?, name?)` constructor.
const ALL_NAMES: &[DomExceptionName] = &[
    DomExceptionName::IndexSize,
    DomExceptionName::InvalidState,
    DomExceptionName::NotSupported,
    DomExceptionName::Abort,
    DomExceptionName::Timeout,
    DomExceptionName::DataClone,
    DomExceptionName::QuotaExceeded,
];

fn name_from_str(name: &str) -> Option<DomExceptionName> {
    ALL_NAMES.iter().copied().find(|n| n.as_str() == name)
}

/// Builds a `DOMException`-shaped object directly from Rust, for the
/// default reasons/errors other host APIs raise (`AbortSignal.timeout`,
/// `controller.abort()`'s default reason, `crypto.getRandomValues`'
/// `QuotaExceededError`) without round-tripping through the JS
/// constructor.
pub fn make<E: Engine + 'static>(bridge: &Rc<Bridge<E>>, name: DomExceptionName, message: &str) -> E::Value {
    bridge.with_engine(|e| {
        let obj = e.create_object(&[]);
        let message_value = e.string(message);
        e.set_property(&obj, "message", message_value);
        let name_value = e.string(name.as_str());
        e.set_property(&obj, "name", name_value);
        let code_value = e.number(name.code() as f64);
        e.set_property(&obj, "code", code_value);
        obj
    })
}

pub fn install<E: Engine + 'static>(bridge: &Rc<Bridge<E>>) {
    let bridge_for_ctor = bridge.clone();
    let ctor = bridge.with_engine(|e| {
        e.create_function(
            "DOMException",
            2,
            Rc::new(move |_this, args| {
                let bridge = bridge_for_ctor.clone();
                let message = args
                    .first()
                    .map(|v| bridge.with_engine(|e| e.to_rust_string(v)))
                    .unwrap_or_default();
                let name = args
                    .get(1)
                    .map(|v| bridge.with_engine(|e| e.to_rust_string(v)))
                    .unwrap_or_else(|| "Error".to_string());
                let code = name_from_str(&name).map(DomExceptionName::code).unwrap_or(0);
                Ok(bridge.with_engine(|e| {
                    let obj = e.create_object(&[]);
                    let message_value = e.string(&message);
                    e.set_property(&obj, "message", message_value);
                    let name_value = e.string(&name);
                    e.set_property(&obj, "name", name_value);
                    let code_value = e.number(code as f64);
                    e.set_property(&obj, "code", code_value);
                    obj
                }))
            }),
        )
    });

    bridge.with_engine(|e| {
        for name in ALL_NAMES {
            let code = name.code();
            if code == 0 {
                continue;
            }
            let constant_name = legacy_constant_name(*name);
            let value = e.number(code as f64);
            e.set_property(&ctor, constant_name, value);
        }
    });

    let global = bridge.with_engine(|e| e.global_object());
    bridge.with_engine(|e| e.set_property(&global, "DOMException", ctor));
}

fn legacy_constant_name(name: DomExceptionName) -> &'static str {
    match name {
        DomExceptionName::IndexSize => "INDEX_SIZE_ERR",
        DomExceptionName::InvalidState => "INVALID_STATE_ERR",
        DomExceptionName::NotSupported => "NOT_SUPPORTED_ERR",
        DomExceptionName::Abort => "ABORT_ERR",
        DomExceptionName::Timeout => "TIMEOUT_ERR",
        DomExceptionName::DataClone => "DATA_CLONE_ERR",
        DomExceptionName::QuotaExceeded => "QUOTA_EXCEEDED_ERR",
    }
}
