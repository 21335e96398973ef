/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The microtask and next-tick lanes (component E), grounded on
//! `MicrotaskQueue::checkpoint`'s snapshot-then-drain loop: a queue
//! mutated during drain must not starve the draining loop, so each pass
//! takes the whole current queue out from under `RefCell` before running
//! anything, then loops again if new work showed up.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

type Job = Box<dyn FnOnce()>;

/// A FIFO of closures drained to empty before the loop proceeds to the
/// next task (§3 "Microtask queue").
#[derive(Default)]
pub struct MicrotaskQueue {
    queue: RefCell<VecDeque<Job>>,
    draining: Cell<bool>,
}

impl MicrotaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, job: impl FnOnce() + 'static) {
        self.queue.borrow_mut().push_back(Box::new(job));
    }

    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }

    /// Runs every queued microtask, including ones enqueued by microtasks
    /// that ran earlier in the same checkpoint (§4.E: "Fires ... during the
    /// current drain if invoked from another microtask"). Re-entrant calls
    /// (a microtask handler that itself triggers a checkpoint) are no-ops,
    /// matching the teacher's `performing_a_microtask_checkpoint` guard.
    pub fn checkpoint(&self) {
        if self.draining.get() {
            return;
        }
        self.draining.set(true);
        while !self.queue.borrow().is_empty() {
            let pending: VecDeque<Job> = self.queue.borrow_mut().drain(..).collect();
            for job in pending {
                job();
            }
        }
        self.draining.set(false);
    }

    pub fn clear(&self) {
        self.queue.borrow_mut().clear();
    }
}

/// The `process.nextTick` lane, drained to empty before the microtask
/// checkpoint runs (Open Question in §9, pinned: distinct lane, not an
/// alias — ADDED rationale in SPEC_FULL.md §1.2).
#[derive(Default)]
pub struct NextTickQueue {
    queue: RefCell<VecDeque<Job>>,
    draining: Cell<bool>,
}

impl NextTickQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, job: impl FnOnce() + 'static) {
        self.queue.borrow_mut().push_back(Box::new(job));
    }

    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }

    pub fn checkpoint(&self) {
        if self.draining.get() {
            return;
        }
        self.draining.set(true);
        while !self.queue.borrow().is_empty() {
            let pending: VecDeque<Job> = self.queue.borrow_mut().drain(..).collect();
            for job in pending {
                job();
            }
        }
        self.draining.set(false);
    }
}
