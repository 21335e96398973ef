/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Peripheral Web API veneer (§6, Component G): thin adapters over host
//! state, none introducing new CORE semantics. Each submodule owns its own
//! state struct plus an `install<E: Engine + 'static>(bridge)` that wires
//! its globals onto the engine; [`install`] below just calls all of them in
//! the order §6's table lists them.

pub mod abort;
pub mod blob;
pub mod console;
pub mod crypto;
pub mod dom_exception;
pub mod encoding;
pub mod event;
pub mod formdata;
pub mod headers;
pub mod performance;
pub mod storage;
pub mod structured_clone;
pub mod symbol;
pub mod url;

use std::rc::Rc;

use bridge_traits::Engine;

use crate::global::Bridge;

pub fn install<E: Engine + 'static>(bridge: &Rc<Bridge<E>>) {
    console::install(bridge);
    crypto::install(bridge);
    performance::install(bridge);
    storage::install(bridge);
    event::install(bridge);
    abort::install(bridge);
    encoding::install(bridge);
    url::install(bridge);
    headers::install(bridge);
    formdata::install(bridge);
    blob::install(bridge);
    dom_exception::install(bridge);
    structured_clone::install(bridge);
    symbol::install(bridge);
}
