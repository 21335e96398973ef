/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Turns a non-thread-safe, single-threaded scripting engine into an
//! asynchronous host environment: a cooperative event loop, a promise graph
//! integrated with that loop, and the Web-platform-style host APIs built on
//! top of both.
//!
//! The crate is organized the way the component table in the design
//! document lists them, leaves-first:
//!
//! - [`loop_binding`] — owns the loop and the engine, exposes `submit`.
//! - [`value`] — host value <-> engine value marshaller.
//! - [`promise`] — the promise state machine and its JS-visible facade.
//! - [`timers`], [`microtask`] — scheduling primitives built on the loop.
//! - [`iterable`] — the `Symbol.iterator` consumer shared by combinators.
//! - [`dom`] — the peripheral Web API veneer (Headers, URL, Storage, ...).

pub mod error;
pub mod global;
pub mod iterable;
pub mod loop_binding;
pub mod microtask;
pub mod promise;
pub mod timers;
pub mod value;

pub mod dom;

#[cfg(test)]
mod testutil;

pub use bridge_traits::{Engine, EngineValue, ImmediateId, IntervalId, MsDuration, TimeoutId};
pub use error::BridgeError;
pub use global::{Bridge, BridgeConfig};
pub use promise::PromiseResolver;
pub use value::{HostValue, ThreadSafeValue};
