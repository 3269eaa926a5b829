//! Trailing-edge debounce over a cancellable timer.
//!
//! Each call cancels the pending one and schedules a new one, so only the
//! last call inside the window fires. Calls are coalesced, never queued.

use std::cell::RefCell;
use std::rc::Rc;

/// Schedules one-shot callbacks. Dropping the returned handle cancels the
/// callback if it has not fired yet.
pub trait Timer {
    type Handle;

    fn schedule(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) -> Self::Handle;
}

pub struct Debouncer<T, Tm: Timer> {
    timer: Tm,
    delay_ms: u32,
    callback: Rc<dyn Fn(T)>,
    pending: Rc<RefCell<Option<Tm::Handle>>>,
}

impl<T: 'static, Tm: Timer> Debouncer<T, Tm>
where
    Tm::Handle: 'static,
{
    pub fn new(timer: Tm, delay_ms: u32, callback: impl Fn(T) + 'static) -> Self {
        Self {
            timer,
            delay_ms,
            callback: Rc::new(callback),
            pending: Rc::new(RefCell::new(None)),
        }
    }

    pub fn delay_ms(&self) -> u32 {
        self.delay_ms
    }

    /// Schedule `value` for delivery, replacing whatever was pending.
    pub fn call(&self, value: T) {
        self.cancel();
        let callback = Rc::clone(&self.callback);
        let slot = Rc::downgrade(&self.pending);
        let handle = self.timer.schedule(
            self.delay_ms,
            Box::new(move || {
                if let Some(slot) = slot.upgrade() {
                    slot.borrow_mut().take();
                }
                callback(value);
            }),
        );
        *self.pending.borrow_mut() = Some(handle);
    }

    /// Drop the pending call, if any.
    pub fn cancel(&self) {
        let previous = self.pending.borrow_mut().take();
        drop(previous);
    }

    pub fn is_pending(&self) -> bool {
        self.pending.borrow().is_some()
    }
}
