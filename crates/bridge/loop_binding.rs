/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Component A: the loop-↔-engine adapter. Owns the channel producers
//! schedule work onto and the single-owner-thread discipline that keeps
//! the engine from ever being touched off its designated thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::ThreadId;

use crossbeam_channel::{Receiver, Sender};

use bridge_traits::{LoopMessage, SubmitError, Task};

/// The loop-owning side: holds the receiver and the shutdown flag. Exactly
/// one `Loop` exists per `Bridge`; only the thread that calls [`Loop::run`]
/// or [`Loop::tick`] may ever dereference the engine context handed to a
/// task.
pub struct EventLoop<Ctx> {
    sender: Sender<LoopMessage<Ctx>>,
    receiver: Receiver<LoopMessage<Ctx>>,
    shutting_down: Arc<AtomicBool>,
}

impl<Ctx> Default for EventLoop<Ctx> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Ctx> EventLoop<Ctx> {
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        EventLoop {
            sender,
            receiver,
            shutting_down: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A cloneable, `Send` handle other components use to enqueue work.
    pub fn handle(&self) -> LoopHandle<Ctx> {
        LoopHandle {
            sender: self.sender.clone(),
            shutting_down: self.shutting_down.clone(),
        }
    }

    /// Runs one macrotask to completion if one is queued, returning whether
    /// anything ran. Callers drain microtasks between invocations (§5).
    pub fn tick(&self, ctx: &Ctx) -> bool {
        match self.receiver.try_recv() {
            Ok(LoopMessage::Task(task)) => {
                task(ctx);
                true
            }
            Ok(LoopMessage::Shutdown) => {
                self.shutting_down.store(true, Ordering::SeqCst);
                false
            }
            Err(_) => false,
        }
    }

    /// Blocks until a macrotask or shutdown arrives, running it. Returns
    /// `false` once shutdown has been observed and nothing more will run.
    pub fn tick_blocking(&self, ctx: &Ctx) -> bool {
        match self.receiver.recv() {
            Ok(LoopMessage::Task(task)) => {
                task(ctx);
                true
            }
            Ok(LoopMessage::Shutdown) | Err(_) => {
                self.shutting_down.store(true, Ordering::SeqCst);
                false
            }
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    pub fn has_pending(&self) -> bool {
        !self.receiver.is_empty()
    }
}

/// A `submit(fn)` primitive, safe to clone and hand to any thread. Submit
/// enqueues and returns once queued, never once executed (§4.A).
#[derive(Clone)]
pub struct LoopHandle<Ctx> {
    sender: Sender<LoopMessage<Ctx>>,
    shutting_down: Arc<AtomicBool>,
}

impl<Ctx> LoopHandle<Ctx> {
    /// Enqueues `f` to run with exclusive engine access, on the loop
    /// thread, the next time the loop processes a macrotask. Fails with
    /// [`SubmitError`] once shutdown has begun — the path user-facing
    /// scheduling calls (`setTimeout`, etc.) must use.
    pub fn submit<F>(&self, f: F) -> Result<(), SubmitError>
    where
        F: FnOnce(&Ctx) + Send + 'static,
    {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(SubmitError);
        }
        self.sender
            .send(LoopMessage::Task(Box::new(f)))
            .map_err(|_| SubmitError)
    }

    /// Enqueues `f`, dropping it silently if the loop has shut down. The
    /// path internal bookkeeping (timer cancellation cleanup) uses, per
    /// §4.A's failure semantics.
    pub fn submit_best_effort<F>(&self, f: F)
    where
        F: FnOnce(&Ctx) + Send + 'static,
    {
        let _ = self.submit(f);
    }

    pub fn request_shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        let _ = self.sender.send(LoopMessage::Shutdown);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }
}

/// Thread-affinity guard for the single-owner rule: panics if called from
/// any thread other than the one that first asserted ownership. A real
/// embedding would instead make this unsafe-but-trusted; we prefer a loud
/// failure over undefined behavior for a library whose whole point is
/// getting this invariant right.
pub struct ThreadGuard {
    owner: std::cell::Cell<Option<ThreadId>>,
}

impl Default for ThreadGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadGuard {
    pub fn new() -> Self {
        ThreadGuard {
            owner: std::cell::Cell::new(None),
        }
    }

    /// Binds the guard to the calling thread if unbound, then asserts the
    /// calling thread matches.
    pub fn assert_owner(&self) {
        let current = std::thread::current().id();
        match self.owner.get() {
            None => self.owner.set(Some(current)),
            Some(owner) => assert_eq!(
                owner, current,
                "bridge: engine touched from a thread other than the loop thread"
            ),
        }
    }
}
