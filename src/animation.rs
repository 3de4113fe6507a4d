//! Time-driven scalar interpolation over the frame scheduler.
//!
//! [`animate`] interpolates between two values across update frames and
//! reports each sample to a callback, finishing with exactly the target
//! value and a `done` flag. Handles carry an explicit status so callers can
//! tell a cancelled tween from one that has not finished yet. [`Animation`]
//! layers restart-replaces semantics on top for a single logical property,
//! and [`Ticker`] drives a plain `(elapsed, delta)` callback every frame.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::scheduler::{FrameId, Scheduler};

/// Easing functions over the unit interval.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Easing {
    /// `t`.
    Linear,
    /// Smoothstep, `t²(3 − 2t)`.
    #[default]
    EaseInOut,
    /// Any function mapping the unit interval into itself.
    Custom(fn(f64) -> f64),
}

impl Easing {
    pub fn evaluate(self, t: f64) -> f64 {
        match self {
            Easing::Linear => t,
            Easing::EaseInOut => t * t * (3.0 - 2.0 * t),
            Easing::Custom(function) => function(t),
        }
    }
}

/// Options for a scalar tween. Times are in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tween {
    pub from: f64,
    pub to: f64,
    pub duration: f64,
    pub delay: f64,
    pub easing: Easing,
}

impl Tween {
    pub fn new(from: f64, to: f64) -> Self {
        Self {
            from,
            to,
            ..Self::default()
        }
    }

    pub fn duration(mut self, duration: f64) -> Self {
        self.duration = duration;
        self
    }

    pub fn delay(mut self, delay: f64) -> Self {
        self.delay = delay;
        self
    }

    pub fn easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }
}

impl Default for Tween {
    fn default() -> Self {
        Self {
            from: 0.0,
            to: 1.0,
            duration: 250.0,
            delay: 0.0,
            easing: Easing::default(),
        }
    }
}

/// Terminal and non-terminal states of a tween.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TweenStatus {
    Running,
    Completed,
    Cancelled,
}

struct TweenShared {
    scheduler: Scheduler,
    tween: Tween,
    /// Timestamp of the first observed tick; delay counts from here.
    start: Cell<Option<f64>>,
    frame: Cell<Option<FrameId>>,
    status: Cell<TweenStatus>,
    on_change: RefCell<Box<dyn FnMut(f64, bool)>>,
}

/// Handle to a running tween. Clones observe and cancel the same tween.
#[derive(Clone)]
pub struct TweenHandle {
    shared: Rc<TweenShared>,
}

impl TweenHandle {
    pub fn status(&self) -> TweenStatus {
        self.shared.status.get()
    }

    /// Stop the tween. No callback fires after this, and the status stays
    /// `Cancelled`; cancelling twice or after completion is a no-op.
    pub fn cancel(&self) {
        if self.shared.status.get() != TweenStatus::Running {
            return;
        }
        self.shared.status.set(TweenStatus::Cancelled);
        if let Some(frame) = self.shared.frame.get() {
            self.shared.scheduler.cancel_update_frame(frame);
        }
    }
}

/// Interpolate from `tween.from` to `tween.to`, reporting each sample to
/// `on_change(value, done)` on update frames.
///
/// The first call happens on the next tick, never synchronously. The final
/// call delivers exactly `tween.to` with `done = true`, even when frame
/// timing overshoots the duration; with the provided easings every sample
/// stays inside `[from, to]` (or `[to, from]`).
pub fn animate(
    scheduler: &Scheduler,
    tween: Tween,
    on_change: impl FnMut(f64, bool) + 'static,
) -> TweenHandle {
    let shared = Rc::new(TweenShared {
        scheduler: scheduler.clone(),
        tween,
        start: Cell::new(None),
        frame: Cell::new(None),
        status: Cell::new(TweenStatus::Running),
        on_change: RefCell::new(Box::new(on_change)),
    });
    schedule_step(&shared);
    TweenHandle { shared }
}

fn schedule_step(shared: &Rc<TweenShared>) {
    let step_shared = shared.clone();
    let id = shared
        .scheduler
        .request_update_frame(move |timestamp| step(&step_shared, timestamp));
    shared.frame.set(Some(id));
}

fn step(shared: &Rc<TweenShared>, timestamp: f64) {
    if shared.status.get() != TweenStatus::Running {
        return;
    }
    let start = match shared.start.get() {
        Some(start) => start,
        None => {
            shared.start.set(Some(timestamp));
            timestamp
        }
    };
    let Tween {
        from,
        to,
        duration,
        delay,
        easing,
    } = shared.tween;
    let elapsed = timestamp - start - delay;
    if elapsed < 0.0 {
        schedule_step(shared);
    } else if elapsed >= duration {
        shared.status.set(TweenStatus::Completed);
        (shared.on_change.borrow_mut())(to, true);
    } else {
        let value = lerp(easing.evaluate(elapsed / duration), from, to);
        (shared.on_change.borrow_mut())(value, false);
        // The callback may have cancelled this very tween.
        if shared.status.get() == TweenStatus::Running {
            schedule_step(shared);
        }
    }
}

fn lerp(factor: f64, from: f64, to: f64) -> f64 {
    from * (1.0 - factor) + to * factor
}

/// At most one in-flight tween for one logical animated property.
///
/// `start` cancels whatever tween this `Animation` previously started before
/// starting the new one. Clones share the same slot, so event listeners can
/// each hold one.
#[derive(Clone, Default)]
pub struct Animation {
    current: Rc<RefCell<Option<TweenHandle>>>,
}

impl Animation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(
        &self,
        scheduler: &Scheduler,
        tween: Tween,
        on_change: impl FnMut(f64, bool) + 'static,
    ) -> TweenHandle {
        let previous = self.current.borrow_mut().take();
        if let Some(previous) = previous {
            previous.cancel();
        }
        let handle = animate(scheduler, tween, on_change);
        *self.current.borrow_mut() = Some(handle.clone());
        handle
    }

    pub fn cancel(&self) {
        let current = self.current.borrow_mut().take();
        if let Some(current) = current {
            current.cancel();
        }
    }
}

struct TickerState {
    scheduler: Scheduler,
    running: Cell<bool>,
    started: Cell<Option<f64>>,
    previous: Cell<f64>,
    frame: Cell<Option<FrameId>>,
    callback: RefCell<Box<dyn FnMut(f64, f64)>>,
}

/// Drives `callback(elapsed, delta)` every update frame until stopped.
/// Both values are in milliseconds; the first tick reports `(0, 0)`.
pub struct Ticker {
    state: Rc<TickerState>,
}

impl Ticker {
    pub fn start(scheduler: &Scheduler, callback: impl FnMut(f64, f64) + 'static) -> Self {
        let state = Rc::new(TickerState {
            scheduler: scheduler.clone(),
            running: Cell::new(true),
            started: Cell::new(None),
            previous: Cell::new(0.0),
            frame: Cell::new(None),
            callback: RefCell::new(Box::new(callback)),
        });
        schedule_tick(&state);
        Self { state }
    }

    pub fn stop(&self) {
        if !self.state.running.get() {
            return;
        }
        self.state.running.set(false);
        if let Some(frame) = self.state.frame.get() {
            self.state.scheduler.cancel_update_frame(frame);
        }
    }
}

fn schedule_tick(state: &Rc<TickerState>) {
    let tick_state = state.clone();
    let id = state
        .scheduler
        .request_update_frame(move |timestamp| tick(&tick_state, timestamp));
    state.frame.set(Some(id));
}

fn tick(state: &Rc<TickerState>, timestamp: f64) {
    if !state.running.get() {
        return;
    }
    let started = match state.started.get() {
        Some(started) => started,
        None => {
            state.started.set(Some(timestamp));
            state.previous.set(timestamp);
            timestamp
        }
    };
    let delta = timestamp - state.previous.get();
    state.previous.set(timestamp);
    (state.callback.borrow_mut())(timestamp - started, delta);
    if state.running.get() {
        schedule_tick(state);
    }
}
