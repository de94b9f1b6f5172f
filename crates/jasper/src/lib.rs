pub mod modules;
pub mod stats;
pub mod system;

use crate::system::cp::debug::{self, CommandError};
use crate::system::{Modules, System, cp};

/// The Jasper GPU command processor simulator.
pub struct Jasper {
    /// System state.
    pub sys: System,
}

impl Jasper {
    pub fn new(modules: Modules, config: system::Config) -> Self {
        Self {
            sys: System::new(modules, config),
        }
    }

    /// Advances simulation by a single cycle: units first, then the command processor.
    pub fn clock(&mut self) {
        let sys = &mut self.sys;
        sys.modules.units.clock(sys.cycle, &mut sys.links);
        cp::clock(sys);
        sys.cycle += 1;
    }

    /// Advances simulation until the trace ends or `cycles` cycles elapse. Returns how many
    /// cycles were simulated.
    pub fn exec(&mut self, cycles: u64) -> u64 {
        let start = self.sys.cycle;
        while self.sys.cycle - start < cycles && !self.sys.is_end_of_trace() {
            self.clock();
        }

        self.sys.cycle - start
    }

    /// Runs until the trace ends.
    pub fn run(&mut self) -> u64 {
        self.exec(u64::MAX)
    }

    /// Executes a debug command.
    pub fn command(&mut self, line: &str) -> Result<(), CommandError> {
        debug::exec_command(&mut self.sys, line)
    }
}
