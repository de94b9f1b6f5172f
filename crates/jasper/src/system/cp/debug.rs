//! Debugging surface of the command processor.
use std::io::BufWriter;
use std::path::Path;
use std::str::FromStr;

use easyerr::{Error, ResultExt};

use crate::system::System;
use crate::system::cp::transaction::{Command, Transaction};

/// Number of slots of the validation log.
pub const VALIDATION_LOG_SLOTS: usize = 4;
/// File name of register snapshots.
pub const REGISTERS_SNAPSHOT: &str = "registers.snapshot";

/// Copies of the transactions fetched during the last frames, for external validation.
///
/// Transactions are recorded into the write slot, which moves to the next slot at the end of
/// every frame. Readers consume slots in the same order.
#[derive(Debug)]
pub struct ValidationLog {
    enabled: bool,
    slots: [Vec<Transaction>; VALIDATION_LOG_SLOTS],
    read: usize,
    write: usize,
}

impl ValidationLog {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            slots: Default::default(),
            read: 0,
            write: 0,
        }
    }

    #[inline(always)]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn record(&mut self, transaction: &Transaction) {
        if self.enabled {
            self.slots[self.write].push(transaction.clone());
        }
    }

    /// Moves recording to the next slot, discarding what it held.
    pub fn rotate(&mut self) {
        self.write = (self.write + 1) % VALIDATION_LOG_SLOTS;
        self.slots[self.write].clear();
    }

    /// Takes the oldest unread slot.
    pub fn take(&mut self) -> Vec<Transaction> {
        let log = std::mem::take(&mut self.slots[self.read]);
        self.read = (self.read + 1) % VALIDATION_LOG_SLOTS;
        log
    }
}

#[derive(Debug, Error)]
pub enum SaveRegistersError {
    #[error(transparent)]
    Io { source: std::io::Error },
    #[error(transparent)]
    Encode {
        source: ciborium::ser::Error<std::io::Error>,
    },
}

/// Writes the register file to `path`, as CBOR.
pub fn save_registers(sys: &System, path: &Path) -> Result<(), SaveRegistersError> {
    let file = std::fs::File::create(path).context(SaveRegistersCtx::Io)?;
    ciborium::into_writer(&sys.regs, BufWriter::new(file)).context(SaveRegistersCtx::Encode)?;

    Ok(())
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unknown command {name:?}")]
    Unknown { name: String },
    #[error("usage: {usage}")]
    Usage { usage: &'static str },
    #[error("a forced command is already pending")]
    Pending,
    #[error(transparent)]
    Snapshot { source: SaveRegistersError },
}

/// Debug commands, with their usage.
pub fn command_list() -> &'static [(&'static str, &'static str)] {
    &[
        ("state", "state - log the command processor state"),
        ("forceswap", "forceswap - swap buffers before the rest of the trace"),
        ("flushzst", "flushzst - flush the z-stencil caches"),
        ("flushcolor", "flushcolor - flush the color caches"),
        ("dumpcolor", "dumpcolor - dump the color buffer"),
        ("dumpdepth", "dumpdepth - dump the depth buffer"),
        ("dumpstencil", "dumpstencil - dump the stencil buffer"),
        ("saveregisters", "saveregisters - save the registers to the snapshot directory"),
        ("_saveregisters", "_saveregisters - saveregisters, without logging"),
        ("skip-draw", "skip-draw <on|off> - count draws without executing them"),
        ("skip-frames", "skip-frames <on|off> - count frames without rendering them"),
        ("force", "force <COMMAND> - process a GPU command before the rest of the trace"),
        ("validation", "validation <on|off> - record fetched transactions"),
    ]
}

fn usage(name: &str) -> CommandError {
    let usage = command_list()
        .iter()
        .find(|(command, _)| *command == name)
        .map_or("", |(_, usage)| usage);

    CommandError::Usage { usage }
}

/// Arms `command` to be processed before the rest of the trace.
fn force(sys: &mut System, command: Command) -> Result<(), CommandError> {
    sys.cp
        .force(Transaction::command(command))
        .map_err(|_| CommandError::Pending)?;

    tracing::info!(cycle = sys.cycle, ?command, "forced command armed");
    Ok(())
}

fn switch(name: &str, arg: Option<&str>) -> Result<bool, CommandError> {
    match arg {
        Some("on") => Ok(true),
        Some("off") => Ok(false),
        _ => Err(usage(name)),
    }
}

/// Executes a debug command line.
pub fn exec_command(sys: &mut System, line: &str) -> Result<(), CommandError> {
    let mut args = line.split_whitespace();
    let Some(name) = args.next() else {
        return Err(CommandError::Unknown {
            name: String::new(),
        });
    };
    let arg = args.next();

    match name {
        "state" => {
            tracing::info!(
                cycle = sys.cycle,
                state = sys.state_name(),
                frame = sys.cp.frame,
                batch = sys.cp.batch,
                geometry_updates = sys.cp.updates.geometry.occupied(),
                fragment_updates = sys.cp.updates.fragment.occupied(),
                free_tickets = sys.cp.memory.tickets.free(),
                "command processor state"
            );
        }
        "forceswap" => force(sys, Command::SwapBuffers)?,
        "flushzst" => force(sys, Command::FlushZStencil)?,
        "flushcolor" => force(sys, Command::FlushColor)?,
        "dumpcolor" => force(sys, Command::DumpColor)?,
        "dumpdepth" => force(sys, Command::DumpDepth)?,
        "dumpstencil" => force(sys, Command::DumpStencil)?,
        "saveregisters" | "_saveregisters" => {
            let path = sys.config.snapshot_dir.join(REGISTERS_SNAPSHOT);
            save_registers(sys, &path).context(CommandCtx::Snapshot)?;

            if name == "saveregisters" {
                tracing::info!("saved registers to {}", path.display());
            }
        }
        "skip-draw" => sys.cp.set_skip_draw(switch(name, arg)?),
        "skip-frames" => sys.cp.set_skip_frames(switch(name, arg)?),
        "validation" => sys.cp.set_validation_mode(switch(name, arg)?),
        "force" => {
            let command = arg
                .and_then(|arg| Command::from_str(arg).ok())
                .ok_or_else(|| usage(name))?;

            force(sys, command)?;
        }
        _ => {
            return Err(CommandError::Unknown {
                name: name.to_owned(),
            });
        }
    }

    Ok(())
}
