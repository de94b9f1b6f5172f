//! Simulation statistics.
use indexmap::IndexMap;
use strum::{IntoStaticStr, VariantArray};

use crate::system::cp::Status;

/// A named statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr, VariantArray)]
#[strum(serialize_all = "camelCase")]
pub enum Counter {
    RegWrites,
    BytesWritten,
    BytesRead,
    WriteTrans,
    Batches,
    Frames,
    BitBlits,
    ReadyCycles,
    DrawCycles,
    EndGeomCycles,
    EndFragCycles,
    ClearCycles,
    SwapCycles,
    FlushCycles,
    SaveRestoreStateCycles,
    BitBlitCycles,
    MemReadCycles,
    MemWriteCycles,
    MemPreLoadCycles,
}

impl Counter {
    /// The counter tracking how many cycles were spent in a given state.
    pub fn cycles_in(status: Status) -> Option<Self> {
        Some(match status {
            Status::Ready => Self::ReadyCycles,
            Status::Drawing => Self::DrawCycles,
            Status::EndGeometry => Self::EndGeomCycles,
            Status::EndFragment => Self::EndFragCycles,
            Status::MemoryRead => Self::MemReadCycles,
            Status::MemoryWrite => Self::MemWriteCycles,
            Status::MemoryPreload => Self::MemPreLoadCycles,
            Status::Swap | Status::DumpBuffer => Self::SwapCycles,
            Status::Blitting => Self::BitBlitCycles,
            Status::ClearColor | Status::ClearZ => Self::ClearCycles,
            Status::FlushColor | Status::FlushZ => Self::FlushCycles,
            Status::SaveStateColor
            | Status::RestoreStateColor
            | Status::SaveStateZ
            | Status::RestoreStateZ => Self::SaveRestoreStateCycles,
            Status::Reset | Status::Error => return None,
        })
    }
}

/// Statistics context of a simulation.
#[derive(Debug, Clone, Default)]
pub struct Statistics {
    values: [u64; Counter::VARIANTS.len()],
}

impl Statistics {
    #[inline(always)]
    pub fn inc(&mut self, counter: Counter) {
        self.add(counter, 1);
    }

    #[inline(always)]
    pub fn add(&mut self, counter: Counter, amount: u64) {
        self.values[counter as usize] += amount;
    }

    #[inline(always)]
    pub fn get(&self, counter: Counter) -> u64 {
        self.values[counter as usize]
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Every counter by name, in declaration order.
    pub fn report(&self) -> IndexMap<&'static str, u64> {
        Counter::VARIANTS
            .iter()
            .map(|&counter| (counter.into(), self.get(counter)))
            .collect()
    }
}
