//! State of the system (i.e. command processor and its view of the GPU).

pub mod cp;
pub mod regs;
pub mod signal;
pub mod units;

use std::path::PathBuf;

use crate::modules::trace::TraceModule;
use crate::modules::units::UnitsModule;
use crate::stats::Statistics;
use crate::system::cp::CommandProcessor;
use crate::system::regs::Registers;
use crate::system::units::{Links, Topology};

/// System configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub vertex_shaders: usize,
    pub fragment_shaders: usize,
    pub texture_units: usize,
    pub stamp_units: usize,
    /// Overlap the geometry phase of a batch with the fragment phase of the previous one.
    pub pipelined_batches: bool,
    /// Write every loaded shader program to the snapshot directory.
    pub dump_shaders: bool,
    /// Keep a copy of fetched transactions for external validation.
    pub validation: bool,
    /// Bytes per memory bus cycle.
    pub bus_width: u32,
    /// Directory for snapshots and dumps.
    pub snapshot_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vertex_shaders: 4,
            fragment_shaders: 4,
            texture_units: 4,
            stamp_units: 4,
            pipelined_batches: false,
            dump_shaders: false,
            validation: false,
            bus_width: 16,
            snapshot_dir: PathBuf::from("."),
        }
    }
}

impl Config {
    pub fn topology(&self) -> Topology {
        Topology {
            vertex_shaders: self.vertex_shaders,
            fragment_shaders: self.fragment_shaders,
            texture_units: self.texture_units,
            stamp_units: self.stamp_units,
        }
    }
}

/// System modules.
pub struct Modules {
    pub trace: Box<dyn TraceModule>,
    pub units: Box<dyn UnitsModule>,
}

/// System state.
pub struct System {
    /// System configuration.
    pub config: Config,
    /// System modules.
    pub modules: Modules,
    /// Current cycle.
    pub cycle: u64,
    /// The GPU register file.
    pub regs: Registers,
    /// The command processor state.
    pub cp: CommandProcessor,
    /// Signals to and from the units.
    pub links: Links,
    pub stats: Statistics,
}

impl System {
    pub fn new(mut modules: Modules, config: Config) -> Self {
        modules.trace.start();

        Self {
            cycle: 0,
            regs: Registers::default(),
            cp: CommandProcessor::new(config.bus_width, config.validation),
            links: Links::new(config.topology()),
            stats: Statistics::default(),

            config,
            modules,
        }
    }
}
