//! Register updates deferred to a batch phase boundary.
use crate::system::regs::{Group, Reg, RegData};
use crate::system::units::Cookies;

/// Capacity of each update buffer.
pub const MAX_REGISTER_UPDATES: usize = 512;

#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub reg: Reg,
    pub sub: u32,
    pub data: RegData,
    pub cookies: Cookies,
}

/// A fixed capacity FIFO of register updates.
#[derive(Debug)]
pub struct UpdateBuffer {
    entries: Box<[Option<Update>]>,
    next: usize,
    next_free: usize,
    occupied: usize,
}

impl Default for UpdateBuffer {
    fn default() -> Self {
        Self {
            entries: std::iter::repeat_with(|| None)
                .take(MAX_REGISTER_UPDATES)
                .collect(),
            next: 0,
            next_free: 0,
            occupied: 0,
        }
    }
}

impl UpdateBuffer {
    #[inline(always)]
    pub fn occupied(&self) -> usize {
        self.occupied
    }

    #[inline(always)]
    pub fn free(&self) -> usize {
        MAX_REGISTER_UPDATES - self.occupied
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.occupied == 0
    }

    #[inline(always)]
    pub fn is_full(&self) -> bool {
        self.occupied == MAX_REGISTER_UPDATES
    }

    /// Queues an update. Gives it back if the buffer is full.
    pub fn push(&mut self, update: Update) -> Result<(), Update> {
        if self.is_full() {
            return Err(update);
        }

        self.entries[self.next_free] = Some(update);
        self.next_free = (self.next_free + 1) % MAX_REGISTER_UPDATES;
        self.occupied += 1;

        Ok(())
    }

    pub fn pop(&mut self) -> Option<Update> {
        if self.is_empty() {
            return None;
        }

        let update = self.entries[self.next].take();
        self.next = (self.next + 1) % MAX_REGISTER_UPDATES;
        self.occupied -= 1;

        update
    }

    pub fn clear(&mut self) {
        while self.pop().is_some() {}
    }
}

/// The geometry and fragment update buffers.
#[derive(Debug, Default)]
pub struct Updates {
    pub geometry: UpdateBuffer,
    pub fragment: UpdateBuffer,
}

impl Updates {
    pub fn get(&self, group: Group) -> &UpdateBuffer {
        match group {
            Group::Geometry => &self.geometry,
            Group::Fragment => &self.fragment,
        }
    }

    pub fn get_mut(&mut self, group: Group) -> &mut UpdateBuffer {
        match group {
            Group::Geometry => &mut self.geometry,
            Group::Fragment => &mut self.fragment,
        }
    }
}
