//! Progress reporting and cooperative cancellation.

use log::info;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Receives progress of long-running training phases.
pub trait ProgressListener {
    /// A phase with values between `min` and `max` begins.
    fn start(&mut self, message: &str, min: u64, max: u64);

    /// Current position within the phase.
    fn update(&mut self, value: u64);

    /// The phase has ended.
    fn stop(&mut self, message: &str);
}

/// Fans progress out to any number of listeners.
#[derive(Default)]
pub struct ProgressListeners<'a> {
    listeners: Vec<Box<dyn ProgressListener + 'a>>,
}

impl<'a> ProgressListeners<'a> {
    /// Creates an empty set of listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a listener.
    pub fn add<L: ProgressListener + 'a>(&mut self, listener: L) {
        self.listeners.push(Box::new(listener));
    }

    /// Number of listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Returns true if nobody is listening.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl ProgressListener for ProgressListeners<'_> {
    fn start(&mut self, message: &str, min: u64, max: u64) {
        for listener in &mut self.listeners {
            listener.start(message, min, max);
        }
    }

    fn update(&mut self, value: u64) {
        for listener in &mut self.listeners {
            listener.update(value);
        }
    }

    fn stop(&mut self, message: &str) {
        for listener in &mut self.listeners {
            listener.stop(message);
        }
    }
}

impl<L: ProgressListener + ?Sized> ProgressListener for &mut L {
    fn start(&mut self, message: &str, min: u64, max: u64) {
        (**self).start(message, min, max);
    }

    fn update(&mut self, value: u64) {
        (**self).update(value);
    }

    fn stop(&mut self, message: &str) {
        (**self).stop(message);
    }
}

/// Ignores all progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressListener for NoProgress {
    fn start(&mut self, _message: &str, _min: u64, _max: u64) {}
    fn update(&mut self, _value: u64) {}
    fn stop(&mut self, _message: &str) {}
}

/// Logs progress every ten percent.
#[derive(Debug, Default)]
pub struct LogProgress {
    message: String,
    min: u64,
    max: u64,
    last_decile: u64,
}

impl ProgressListener for LogProgress {
    fn start(&mut self, message: &str, min: u64, max: u64) {
        self.message = message.to_string();
        self.min = min;
        self.max = max;
        self.last_decile = 0;
        info!("{}", message);
    }

    fn update(&mut self, value: u64) {
        let span = self.max.saturating_sub(self.min).max(1);
        let decile = value.saturating_sub(self.min) * 10 / span;
        if decile > self.last_decile {
            self.last_decile = decile;
            info!("{}: {}%", self.message, decile * 10);
        }
    }

    fn stop(&mut self, message: &str) {
        info!("{}", message);
    }
}

/// Polled once per training step; returning true ends training early.
pub trait CancellationToken {
    /// Whether training should stop now.
    fn should_stop(&self) -> bool;
}

/// Never cancels.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverCancel;

impl CancellationToken for NeverCancel {
    fn should_stop(&self) -> bool {
        false
    }
}

impl CancellationToken for AtomicBool {
    fn should_stop(&self) -> bool {
        self.load(Ordering::Relaxed)
    }
}

impl<T: CancellationToken + ?Sized> CancellationToken for Arc<T> {
    fn should_stop(&self) -> bool {
        (**self).should_stop()
    }
}

/// Stops after a fixed number of polls.
#[derive(Debug)]
pub struct StopAfter {
    remaining: std::sync::atomic::AtomicUsize,
}

impl StopAfter {
    /// Allows `polls` steps before requesting a stop.
    pub fn new(polls: usize) -> Self {
        Self {
            remaining: std::sync::atomic::AtomicUsize::new(polls),
        }
    }
}

impl CancellationToken for StopAfter {
    fn should_stop(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_err()
    }
}
