/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Components C and D: the promise state machine (`core`) and the
//! engine-visible constructor/prototype/statics built on top of it
//! (`facade`).

mod combinators;
mod core;
mod facade;

pub use combinators::{consume_settlable, AggregateError, SettledRecord, Settlement};
pub use core::{Handler, Promise, PromiseResolver, PromiseState};
pub use facade::{PromiseFacade, Resolvers};
