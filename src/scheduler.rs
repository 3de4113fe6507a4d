//! Frame-batched callback scheduling.
//!
//! Two queues, update and render, batch all pending callbacks onto a
//! single host-driven tick: [`Scheduler::run_frame`] runs every queued
//! update callback first, then every queued render callback, each in
//! registration order with the tick timestamp. Handles are monotonically
//! increasing and map to queue slots in O(1), so cancellation just nulls a
//! slot. Each queue's start-id marker resets when its snapshot is taken,
//! which keeps handles from flushed batches inert: they can never alias a
//! slot in a later batch.

use std::cell::RefCell;
use std::rc::Rc;

/// Handle to a scheduled frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameId(u64);

type FrameCallback = Box<dyn FnOnce(f64)>;

#[derive(Default)]
struct Queue {
    callbacks: Vec<Option<FrameCallback>>,
    next_id: u64,
    start_id: u64,
}

impl Queue {
    fn request(&mut self, callback: FrameCallback) -> FrameId {
        let id = self.next_id;
        self.next_id += 1;
        self.callbacks.push(Some(callback));
        FrameId(id)
    }

    fn cancel(&mut self, id: FrameId) {
        // Handles from already-flushed batches are inert.
        if id.0 < self.start_id {
            return;
        }
        let slot = (id.0 - self.start_id) as usize;
        if let Some(entry) = self.callbacks.get_mut(slot) {
            *entry = None;
        }
    }

    /// Take the current batch and open the next one.
    fn snapshot(&mut self) -> Vec<Option<FrameCallback>> {
        self.start_id = self.next_id;
        std::mem::take(&mut self.callbacks)
    }

    fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

/// Paired update/render callback queues batched onto one tick.
///
/// Clones share the same queues; the host drives [`Scheduler::run_frame`]
/// from its frame clock and may use [`Scheduler::needs_frame`] to idle when
/// nothing is pending.
#[derive(Clone, Default)]
pub struct Scheduler {
    inner: Rc<RefCell<State>>,
}

#[derive(Default)]
struct State {
    updates: Queue,
    renders: Queue,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `callback` for the next tick's update phase.
    pub fn request_update_frame(&self, callback: impl FnOnce(f64) + 'static) -> FrameId {
        self.inner.borrow_mut().updates.request(Box::new(callback))
    }

    /// Cancel an update callback; a no-op for handles of flushed batches.
    pub fn cancel_update_frame(&self, id: FrameId) {
        self.inner.borrow_mut().updates.cancel(id);
    }

    /// Schedule `callback` for the next tick's render phase.
    pub fn request_render_frame(&self, callback: impl FnOnce(f64) + 'static) -> FrameId {
        self.inner.borrow_mut().renders.request(Box::new(callback))
    }

    /// Cancel a render callback; a no-op for handles of flushed batches.
    pub fn cancel_render_frame(&self, id: FrameId) {
        self.inner.borrow_mut().renders.cancel(id);
    }

    /// Whether any callback is queued for the next tick.
    pub fn needs_frame(&self) -> bool {
        let state = self.inner.borrow();
        !state.updates.is_empty() || !state.renders.is_empty()
    }

    /// Flush one tick: all queued updates, then all queued renders.
    ///
    /// Callbacks registered while the tick runs land in the next batch of
    /// their queue, except that update callbacks may still enqueue render
    /// callbacks for this same tick (the render snapshot is taken after the
    /// update phase completes).
    pub fn run_frame(&self, timestamp: f64) {
        let updates = self.inner.borrow_mut().updates.snapshot();
        if !updates.is_empty() {
            log::trace!("frame {timestamp}: {} update callback(s)", updates.len());
        }
        for callback in updates.into_iter().flatten() {
            callback(timestamp);
        }
        let renders = self.inner.borrow_mut().renders.snapshot();
        if !renders.is_empty() {
            log::trace!("frame {timestamp}: {} render callback(s)", renders.len());
        }
        for callback in renders.into_iter().flatten() {
            callback(timestamp);
        }
    }
}
