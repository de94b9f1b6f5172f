//! Cycle stamped channels between units.
use std::collections::VecDeque;

/// Latency of command signals (command processor to unit).
pub const COMMAND_LATENCY: u64 = 1;
/// Latency of state signals (unit to command processor).
pub const STATE_LATENCY: u64 = 0;

/// An ordered, unbounded, point-to-point channel. Values written at cycle `N` become visible at
/// cycle `N + latency`.
#[derive(Debug)]
pub struct Signal<T> {
    name: &'static str,
    latency: u64,
    queue: VecDeque<(u64, T)>,
}

impl<T> Signal<T> {
    pub fn new(name: &'static str, latency: u64) -> Self {
        Self {
            name,
            latency,
            queue: VecDeque::new(),
        }
    }

    /// Creates a signal carrying commands into a unit.
    pub fn command(name: &'static str) -> Self {
        Self::new(name, COMMAND_LATENCY)
    }

    /// Creates a signal carrying state reports out of a unit.
    pub fn state(name: &'static str) -> Self {
        Self::new(name, STATE_LATENCY)
    }

    #[inline(always)]
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn write(&mut self, cycle: u64, value: T) {
        let visible = cycle + self.latency;
        debug_assert!(
            self.queue.back().is_none_or(|(at, _)| *at <= visible),
            "signal {} written out of order",
            self.name
        );

        self.queue.push_back((visible, value));
    }

    /// Pops the oldest value visible at `cycle`, if any.
    pub fn read(&mut self, cycle: u64) -> Option<T> {
        match self.queue.front() {
            Some((at, _)) if *at <= cycle => self.queue.pop_front().map(|(_, value)| value),
            _ => None,
        }
    }

    /// Pops every value visible at `cycle`, oldest first.
    pub fn drain(&mut self, cycle: u64) -> Vec<T> {
        let visible = self.queue.iter().take_while(|(at, _)| *at <= cycle).count();
        self.queue.drain(..visible).map(|(_, value)| value).collect()
    }

    /// Values in flight, including the ones not yet visible.
    pub fn pending(&self) -> impl Iterator<Item = &T> {
        self.queue.iter().map(|(_, value)| value)
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}
