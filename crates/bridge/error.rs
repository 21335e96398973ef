/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The synchronous error taxonomy (§7). Asynchronous failures never use
//! this type — they settle a promise with a [`crate::HostValue`] instead.

use crate::dom::dom_exception::DomExceptionName;

/// API-misuse and domain errors raised synchronously by bridge entry
/// points. Each variant names the standard JS error constructor an
/// embedder should surface it as.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Non-callable where callable was required, wrong arity, wrong-shaped
    /// constructor argument.
    #[error("TypeError: {0}")]
    Type(String),

    /// A value outside its accepted range (e.g. a too-large `getRandomValues` buffer).
    #[error("RangeError: {0}")]
    Range(String),

    /// Malformed URI input.
    #[error("URIError: {0}")]
    Uri(String),

    /// Malformed syntax, e.g. an unparsable script passed to a string timer callback.
    #[error("SyntaxError: {0}")]
    Syntax(String),

    /// A capability error a WHATWG spec says to raise as a `DOMException`
    /// of the given name.
    #[error("DOMException[{name:?}]: {message}")]
    Dom {
        name: DomExceptionName,
        message: String,
    },

    /// Submission to a loop that has already begun shutdown, for entry
    /// points documented to throw rather than return an invalid handle.
    #[error("InvalidStateError: bridge loop has shut down")]
    Shutdown,
}

impl BridgeError {
    pub fn dom(name: DomExceptionName, message: impl Into<String>) -> Self {
        BridgeError::Dom {
            name,
            message: message.into(),
        }
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;
