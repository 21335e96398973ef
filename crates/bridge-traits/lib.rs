//! Shared types passed across the loop/engine boundary: timer and task
//! identifiers, the messages a submitted closure travels as, and the
//! `Engine`/`EngineValue` capability traits that stand in for the
//! scripting engine this bridge is built on top of.
//!
//! Nothing in this crate touches engine internals; it exists so that
//! `bridge` and any embedder-supplied engine adapter can agree on
//! vocabulary without either depending on the other's implementation.

mod engine;
mod ids;
mod messages;
mod time;

pub use engine::{Engine, EngineValue, NativeFunction};
pub use ids::{ImmediateId, IntervalId, TimeoutId};
pub use messages::{LoopMessage, SubmitError, Task};
pub use time::{precise_time_ms, MsDuration};
