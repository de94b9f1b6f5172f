//! Command processor.
//!
//! Consumes the transaction trace one transaction at a time, keeps the GPU register file
//! up to date and drives every other unit through its command signal, reacting to the states the
//! units report back.

pub mod command;
pub mod debug;
pub mod memory;
pub mod transaction;
pub mod updates;
pub mod write;

#[cfg(test)]
mod test;

use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use crate::stats::Counter;
use crate::system::System;
use crate::system::cp::debug::ValidationLog;
use crate::system::cp::memory::Interface;
use crate::system::cp::transaction::{Event, Kind, Transaction};
use crate::system::cp::updates::Updates;
use crate::system::regs::Group;
use crate::system::units::{
    AssemblyCommand, AssemblyState, ClipperCommand, ClipperState, Cookies, Message,
    RasterCommand, RasterState, ShaderCommand, StreamerCommand, StreamerState, Targets,
};

/// Cycles the streamer needs between two consecutive draws.
pub const CONSECUTIVE_DRAW_DELAY: u32 = 2;
/// Cycles a z-stencil flush is kept waiting before the units are checked for completion.
pub const FLUSH_DELAY_CYCLES: u32 = 10_000;

/// State of the command processor, as stored in the status register.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, IntoStaticStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    #[default]
    Reset,
    Ready,
    Drawing,
    EndGeometry,
    EndFragment,
    MemoryRead,
    MemoryWrite,
    MemoryPreload,
    Swap,
    DumpBuffer,
    Blitting,
    ClearColor,
    ClearZ,
    FlushColor,
    FlushZ,
    SaveStateColor,
    RestoreStateColor,
    SaveStateZ,
    RestoreStateZ,
    Error,
}

/// Buffer dumped by a dump command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dump {
    Color,
    Depth,
    Stencil,
}

/// A fragment program load issued while a batch was in flight.
#[derive(Debug, Default)]
pub enum PendingLoad {
    #[default]
    None,
    /// Waiting for the fragment phase of the current batch to end.
    Stored(Transaction),
    /// Being loaded. Holds what was being processed when the load started.
    Loading {
        current: Option<Transaction>,
        process_new: bool,
    },
}

/// Last state reported by each unit.
#[derive(Debug, Clone, Default)]
pub struct UnitStates {
    pub streamer: StreamerState,
    pub assembly: AssemblyState,
    pub clipper: ClipperState,
    pub rasterizer: RasterState,
    pub zstencil: Vec<RasterState>,
    pub color: Vec<RasterState>,
    pub dac: RasterState,
}

impl UnitStates {
    /// Whether every z-stencil unit reported end.
    pub fn zstencil_end(&self) -> bool {
        self.zstencil.iter().all(|&state| state == RasterState::End)
    }

    /// Whether every color write unit reported end.
    pub fn color_end(&self) -> bool {
        self.color.iter().all(|&state| state == RasterState::End)
    }
}

/// Flags describing what happened during the last cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct Flags {
    pub swap_received: bool,
    pub batch_end: bool,
    pub command_end: bool,
    /// Persists once the initialization section of the trace ended.
    pub init_end: bool,
}

/// Outcome of processing a transaction.
#[derive(Debug)]
pub enum Outcome {
    /// Processed. Its command ends this cycle.
    Done,
    /// Processed. Its command ends when the command processor goes back to ready.
    Started,
    /// Still in use by a memory operation.
    Busy(Transaction),
    /// Can't be processed now. Must be retried untouched.
    Deferred(Transaction),
}

/// Command processor state.
#[derive(Debug)]
pub struct CommandProcessor {
    /// Transaction being processed, if any.
    pub current: Option<Transaction>,
    /// Whether the next transaction may be fetched.
    pub process_new: bool,
    /// Transaction injected by the debugger, processed before the trace.
    pub forced: Option<Transaction>,
    /// Whether the transaction being processed was injected by the debugger.
    pub forced_command: bool,
    /// The trace ran out of transactions.
    pub trace_end: bool,
    /// State to return to once a memory operation ends.
    pub stack: Status,
    /// Deferred register updates.
    pub updates: Updates,
    /// Geometry phase of the next batch started while the current one was finishing.
    pub geometry_started: bool,
    pub pending_load: PendingLoad,
    pub memory: Interface,
    pub units: UnitStates,
    pub flags: Flags,
    /// Draws are only counted, not executed.
    pub skip_draw: bool,
    /// Frames are only counted, not rendered.
    pub skip_frames: bool,
    /// Batches of the current frame.
    pub batch: u32,
    /// Frames rendered so far.
    pub frame: u32,
    /// Stamp units already acknowledged the flush step of a multi step command.
    pub stamp_end: bool,
    pub dump: Option<Dump>,
    pub flush_delay: u32,
    pub draw_cooldown: u32,
    /// Loaded programs, for dump file names.
    pub vertex_programs: u32,
    pub fragment_programs: u32,
    pub shader_programs: u32,
    pub last_event_cycle: [u64; Event::COUNT],
    pub validation: ValidationLog,
    /// Lineage of the transaction being processed.
    pub cookies: Cookies,
    next_transaction: u32,
    next_command: u32,
}

impl CommandProcessor {
    pub fn new(bus_width: u32, validation: bool) -> Self {
        Self {
            current: None,
            process_new: true,
            forced: None,
            forced_command: false,
            trace_end: false,
            stack: Status::Ready,
            updates: Updates::default(),
            geometry_started: false,
            pending_load: PendingLoad::None,
            memory: Interface::new(bus_width),
            units: UnitStates::default(),
            flags: Flags::default(),
            skip_draw: false,
            skip_frames: false,
            batch: 0,
            frame: 0,
            stamp_end: false,
            dump: None,
            flush_delay: 0,
            draw_cooldown: 0,
            vertex_programs: 0,
            fragment_programs: 0,
            shader_programs: 0,
            last_event_cycle: [0; Event::COUNT],
            validation: ValidationLog::new(validation),
            cookies: Cookies::default(),
            next_transaction: 0,
            next_command: 0,
        }
    }

    /// Cookies for a new command caused by the transaction being processed.
    pub fn lineage(&mut self) -> Cookies {
        let mut cookies = self.cookies.clone();
        cookies.push(self.next_command);
        self.next_command = self.next_command.wrapping_add(1);
        cookies
    }

    /// Whether a frame ended this cycle.
    #[inline(always)]
    pub fn is_swap(&self) -> bool {
        self.flags.swap_received
    }

    /// Whether a batch ended this cycle.
    #[inline(always)]
    pub fn end_of_batch(&self) -> bool {
        self.flags.batch_end
    }

    #[inline(always)]
    pub fn end_of_initialization(&self) -> bool {
        self.flags.init_end
    }

    /// Whether a transaction finished processing this cycle.
    #[inline(always)]
    pub fn end_of_command(&self) -> bool {
        self.flags.command_end
    }

    /// Whether the transaction that ended this cycle was injected by the debugger.
    pub fn end_of_forced_command(&self) -> bool {
        self.forced_command && self.flags.command_end
    }

    /// Arms a transaction to be processed before the rest of the trace.
    pub fn force(&mut self, transaction: Transaction) -> Result<(), Transaction> {
        if self.forced.is_some() {
            return Err(transaction);
        }

        self.forced = Some(transaction);
        Ok(())
    }

    pub fn set_skip_draw(&mut self, skip: bool) {
        self.skip_draw = skip;
    }

    pub fn set_skip_frames(&mut self, skip: bool) {
        self.skip_frames = skip;
    }

    pub fn set_validation_mode(&mut self, enabled: bool) {
        self.validation.set_enabled(enabled);
    }

    /// Takes the oldest unread slot of the validation log.
    pub fn transaction_log(&mut self) -> Vec<Transaction> {
        self.validation.take()
    }
}

impl System {
    /// Human readable name of the command processor state.
    pub fn state_name(&self) -> &'static str {
        self.regs.status.into()
    }

    /// Whether the trace ended and every command was processed.
    pub fn is_end_of_trace(&self) -> bool {
        self.cp.trace_end && self.regs.status == Status::Ready
    }
}

/// Sends a command to the streamer.
pub(crate) fn send_streamer(sys: &mut System, command: StreamerCommand) {
    let cookies = sys.cp.lineage();
    tracing::trace!(cycle = sys.cycle, ?command, "streamer");
    sys.links
        .streamer
        .command
        .write(sys.cycle, Message { cookies, command });
}

/// Sends a command to primitive assembly.
pub(crate) fn send_assembly(sys: &mut System, command: AssemblyCommand) {
    let cookies = sys.cp.lineage();
    tracing::trace!(cycle = sys.cycle, ?command, "primitive assembly");
    sys.links
        .assembly
        .command
        .write(sys.cycle, Message { cookies, command });
}

/// Sends a command to the clipper.
pub(crate) fn send_clipper(sys: &mut System, command: ClipperCommand) {
    let cookies = sys.cp.lineage();
    tracing::trace!(cycle = sys.cycle, ?command, "clipper");
    sys.links
        .clipper
        .command
        .write(sys.cycle, Message { cookies, command });
}

/// Sends a command to a subset of the rasterizer, every stamp unit and the DAC.
pub(crate) fn send_raster(sys: &mut System, targets: Targets, command: RasterCommand) {
    let cycle = sys.cycle;
    tracing::trace!(cycle, ?targets, ?command, "raster");

    if targets.contains(Targets::RASTERIZER) {
        let cookies = sys.cp.lineage();
        sys.links.rasterizer.command.write(
            cycle,
            Message {
                cookies,
                command: command.clone(),
            },
        );
    }

    if targets.contains(Targets::ZSTENCIL) {
        for link in &mut sys.links.zstencil {
            let cookies = sys.cp.lineage();
            link.command.write(
                cycle,
                Message {
                    cookies,
                    command: command.clone(),
                },
            );
        }
    }

    if targets.contains(Targets::COLOR) {
        for link in &mut sys.links.color {
            let cookies = sys.cp.lineage();
            link.command.write(
                cycle,
                Message {
                    cookies,
                    command: command.clone(),
                },
            );
        }
    }

    if targets.contains(Targets::DAC) {
        let cookies = sys.cp.lineage();
        sys.links
            .dac
            .command
            .write(cycle, Message { cookies, command });
    }
}

/// Sends a command to a subset of the shaders and texture units.
pub(crate) fn send_shaders(sys: &mut System, targets: Targets, command: ShaderCommand) {
    let cycle = sys.cycle;
    let links = &mut sys.links;
    let groups = [
        (Targets::VERTEX_SHADERS, &mut links.vertex_shaders),
        (Targets::FRAGMENT_SHADERS, &mut links.fragment_shaders),
        (Targets::TEXTURE, &mut links.texture_units),
    ];

    for (target, signals) in groups {
        if !targets.contains(target) {
            continue;
        }

        for signal in signals.iter_mut() {
            let cookies = sys.cp.lineage();
            signal.write(
                cycle,
                Message {
                    cookies,
                    command: command.clone(),
                },
            );
        }
    }
}

/// Sends a reset to every unit.
pub(crate) fn reset_units(sys: &mut System) {
    send_streamer(sys, StreamerCommand::Reset);
    send_assembly(sys, AssemblyCommand::Reset);
    send_clipper(sys, ClipperCommand::Reset);
    send_raster(
        sys,
        Targets::RASTERIZER | Targets::STAMP | Targets::DAC,
        RasterCommand::Reset,
    );
    send_shaders(
        sys,
        Targets::SHADERS | Targets::TEXTURE,
        ShaderCommand::Reset,
    );
}

/// Reads the state every unit reported for this cycle. Missing reports are fatal.
fn read_unit_states(sys: &mut System) {
    fn expect<T>(state: Option<T>, unit: &str, cycle: u64) -> T {
        state.unwrap_or_else(|| panic!("missing {unit} state at cycle {cycle}"))
    }

    let cycle = sys.cycle;
    let links = &mut sys.links;
    let units = &mut sys.cp.units;

    units.streamer = expect(links.streamer.state.read(cycle), "streamer", cycle);
    units.assembly = expect(links.assembly.state.read(cycle), "primitive assembly", cycle);
    units.clipper = expect(links.clipper.state.read(cycle), "clipper", cycle);
    units.rasterizer = expect(links.rasterizer.state.read(cycle), "rasterizer", cycle);
    units.zstencil = links
        .zstencil
        .iter_mut()
        .map(|link| expect(link.state.read(cycle), "z-stencil", cycle))
        .collect();
    units.color = links
        .color
        .iter_mut()
        .map(|link| expect(link.state.read(cycle), "color write", cycle))
        .collect();
    units.dac = expect(links.dac.state.read(cycle), "DAC", cycle);
}

/// Fetches the next transaction, from the debugger first and then from the trace.
fn fetch(sys: &mut System) {
    let transaction = match sys.cp.forced.take() {
        Some(forced) => {
            sys.cp.forced_command = true;
            Some(forced)
        }
        None => {
            sys.cp.forced_command = false;
            sys.modules.trace.next()
        }
    };

    let Some(mut transaction) = transaction else {
        if !sys.cp.trace_end {
            tracing::info!(cycle = sys.cycle, "end of trace");
        }

        sys.cp.trace_end = true;
        return;
    };

    transaction.cookies = Cookies::default();
    transaction.cookies.push(sys.cp.next_transaction);
    sys.cp.next_transaction = sys.cp.next_transaction.wrapping_add(1);

    sys.cp.validation.record(&transaction);

    if sys.cp.skip_frames && !transaction.locked {
        transaction.force_preload();
    }

    tracing::trace!(cycle = sys.cycle, kind = ?transaction.kind, "fetched transaction");

    sys.cp.current = Some(transaction);
    sys.cp.process_new = false;
}

/// Processes the current transaction, fetching a new one first if allowed.
fn process_transaction(sys: &mut System) {
    if sys.cp.process_new {
        fetch(sys);
    }

    let Some(transaction) = sys.cp.current.take() else {
        return;
    };

    sys.cp.cookies = transaction.cookies.clone();
    sys.cp.process_new = true;

    match dispatch(sys, transaction) {
        Outcome::Done => sys.cp.flags.command_end = true,
        Outcome::Started => (),
        Outcome::Busy(transaction) | Outcome::Deferred(transaction) => {
            sys.cp.current = Some(transaction);
            sys.cp.process_new = false;
        }
    }
}

fn dispatch(sys: &mut System, transaction: Transaction) -> Outcome {
    let ready = sys.regs.status == Status::Ready;
    match &transaction.kind {
        Kind::Write { .. } if ready => memory::start_write(sys, transaction),
        Kind::Preload { .. } if ready => memory::preload(sys, transaction),
        Kind::Write { .. } | Kind::Preload { .. } => Outcome::Deferred(transaction),
        Kind::Read { address, size } => {
            panic!("memory reads from the system are not supported ({size} bytes at {address:08X})")
        }
        Kind::RegWrite { .. } => write::process(sys, transaction),
        Kind::RegRead { reg, sub } => {
            tracing::warn!("register reads are not supported, ignoring read of {reg:?}[{sub}]");
            Outcome::Done
        }
        Kind::Command(_) => command::process(sys, transaction),
        Kind::InitEnd => {
            tracing::info!(cycle = sys.cycle, "end of initialization");
            sys.cp.flags.init_end = true;
            Outcome::Done
        }
        Kind::Event { event, message } => {
            let cycle = sys.cycle;
            let last = std::mem::replace(&mut sys.cp.last_event_cycle[*event as usize], cycle);
            let name: &'static str = (*event).into();
            tracing::info!(
                cycle,
                since_last = cycle - last,
                "{name} event: {message}"
            );

            Outcome::Done
        }
    }
}

/// Applies the oldest buffered update of a group, if any.
fn apply_buffered(sys: &mut System, group: Group) -> bool {
    match sys.cp.updates.get_mut(group).pop() {
        Some(update) => {
            write::apply_update(sys, update);
            true
        }
        None => false,
    }
}

/// Advances the command processor by a single cycle.
pub fn clock(sys: &mut System) {
    sys.cp.flags.swap_received = false;
    sys.cp.flags.batch_end = false;
    sys.cp.flags.command_end = false;

    memory::process(sys);
    read_unit_states(sys);

    sys.cp.draw_cooldown = sys.cp.draw_cooldown.saturating_sub(1);

    let status = sys.regs.status;
    match status {
        Status::Reset => reset(sys),
        Status::Ready => {
            if !apply_buffered(sys, Group::Geometry) && !apply_buffered(sys, Group::Fragment) {
                process_transaction(sys);
            }
        }
        Status::Drawing => drawing(sys),
        Status::EndGeometry => end_geometry(sys),
        Status::EndFragment => end_fragment(sys),
        Status::MemoryRead => memory::read_state(sys),
        Status::MemoryWrite => memory::write_state(sys),
        Status::MemoryPreload => {
            sys.regs.status = sys.cp.stack;
            sys.cp.flags.command_end = true;
        }
        Status::Swap => swap(sys),
        Status::DumpBuffer => dump_buffer(sys),
        Status::Blitting => blitting(sys),
        Status::ClearColor => {
            if sys.cp.units.color_end() {
                send_raster(sys, Targets::COLOR, RasterCommand::End);
                finish(sys);
            }
        }
        Status::ClearZ => {
            if sys.cp.units.rasterizer == RasterState::ClearEnd && sys.cp.units.zstencil_end() {
                send_raster(
                    sys,
                    Targets::RASTERIZER | Targets::ZSTENCIL,
                    RasterCommand::End,
                );
                finish(sys);
            }
        }
        Status::FlushZ => {
            if sys.cp.flush_delay > 0 {
                sys.cp.flush_delay -= 1;
            } else if sys.cp.units.zstencil_end() {
                send_raster(sys, Targets::ZSTENCIL, RasterCommand::End);
                finish(sys);
            }
        }
        Status::FlushColor | Status::SaveStateColor | Status::RestoreStateColor => {
            if sys.cp.units.color_end() {
                send_raster(sys, Targets::COLOR, RasterCommand::End);
                finish(sys);
            }
        }
        Status::SaveStateZ | Status::RestoreStateZ => {
            if sys.cp.units.zstencil_end() {
                send_raster(sys, Targets::ZSTENCIL, RasterCommand::End);
                finish(sys);
            }
        }
        Status::Error => panic!("command processor reached the error state at cycle {}", sys.cycle),
    }

    if let Some(counter) = Counter::cycles_in(status) {
        sys.stats.inc(counter);
    }
}

/// Ends a multi cycle command and goes back to ready.
fn finish(sys: &mut System) {
    sys.regs.status = Status::Ready;
    sys.cp.flags.command_end = true;
}

fn reset(sys: &mut System) {
    tracing::debug!(cycle = sys.cycle, "resetting GPU state");

    sys.regs.reset();
    sys.cp.updates.geometry.clear();
    sys.cp.updates.fragment.clear();
    sys.cp.geometry_started = false;
    sys.cp.pending_load = PendingLoad::None;
    sys.cp.batch = 0;
    sys.cp.draw_cooldown = 0;
    sys.cp.flush_delay = 0;
    sys.cp.dump = None;
    sys.cp.stamp_end = false;

    sys.regs.status = Status::Ready;
}

fn drawing(sys: &mut System) {
    if sys.cp.units.clipper == ClipperState::End {
        send_streamer(sys, StreamerCommand::End);
        send_assembly(sys, AssemblyCommand::End);
        send_clipper(sys, ClipperCommand::End);
        sys.regs.status = Status::EndGeometry;
    } else if sys.config.pipelined_batches {
        process_transaction(sys);
    }
}

fn end_geometry(sys: &mut System) {
    if !sys.cp.geometry_started && !sys.cp.updates.geometry.is_empty() {
        apply_buffered(sys, Group::Geometry);
    } else if sys.cp.units.color_end() {
        send_raster(
            sys,
            Targets::RASTERIZER | Targets::STAMP,
            RasterCommand::End,
        );
        sys.regs.status = Status::EndFragment;
    } else if sys.config.pipelined_batches {
        process_transaction(sys);
    }
}

fn end_fragment(sys: &mut System) {
    if apply_buffered(sys, Group::Fragment) {
        return;
    }

    match std::mem::take(&mut sys.cp.pending_load) {
        PendingLoad::None => (),
        PendingLoad::Stored(transaction) => {
            tracing::debug!(cycle = sys.cycle, "starting stored fragment program load");

            sys.cp.pending_load = PendingLoad::Loading {
                current: sys.cp.current.take(),
                process_new: sys.cp.process_new,
            };
            sys.cp.cookies = transaction.cookies.clone();
            memory::start_program_load(sys, memory::LoadTarget::Fragment);
            return;
        }
        PendingLoad::Loading {
            current,
            process_new,
        } => {
            sys.cp.current = current;
            sys.cp.process_new = process_new;
            return;
        }
    }

    if sys.cp.geometry_started {
        send_raster(
            sys,
            Targets::RASTERIZER | Targets::STAMP,
            RasterCommand::Draw,
        );
        sys.cp.geometry_started = false;
        sys.regs.status = Status::Drawing;
    } else {
        sys.regs.status = Status::Ready;
        if !sys.config.pipelined_batches {
            sys.cp.process_new = true;
        }
    }

    sys.cp.flags.batch_end = true;
}

fn swap(sys: &mut System) {
    if !sys.cp.stamp_end {
        if sys.cp.units.color_end() {
            send_raster(sys, Targets::COLOR, RasterCommand::End);
            send_raster(sys, Targets::DAC, RasterCommand::Swap);
            sys.cp.stamp_end = true;
        }
    } else if sys.cp.units.dac == RasterState::End {
        send_raster(sys, Targets::DAC, RasterCommand::End);
        end_frame(sys);
        finish(sys);
    }
}

/// Bookkeeping of a finished frame.
pub(crate) fn end_frame(sys: &mut System) {
    tracing::info!(cycle = sys.cycle, frame = sys.cp.frame, batches = sys.cp.batch, "end of frame");

    sys.cp.batch = 0;
    sys.cp.frame += 1;
    sys.cp.flags.swap_received = true;
    sys.cp.validation.rotate();
    sys.stats.inc(Counter::Frames);
}

fn dump_buffer(sys: &mut System) {
    let Some(dump) = sys.cp.dump else {
        panic!("dump state entered without a dump command");
    };

    if !sys.cp.stamp_end {
        let (units, end) = match dump {
            Dump::Color => (Targets::COLOR, sys.cp.units.color_end()),
            Dump::Depth | Dump::Stencil => (Targets::ZSTENCIL, sys.cp.units.zstencil_end()),
        };

        if end {
            let command = match dump {
                Dump::Color => RasterCommand::DumpColor,
                Dump::Depth => RasterCommand::DumpDepth,
                Dump::Stencil => RasterCommand::DumpStencil,
            };

            send_raster(sys, units, RasterCommand::End);
            send_raster(sys, Targets::DAC, command);
            sys.cp.stamp_end = true;
        }
    } else if sys.cp.units.dac == RasterState::End {
        send_raster(sys, Targets::DAC, RasterCommand::End);
        sys.cp.dump = None;
        finish(sys);
    }
}

fn blitting(sys: &mut System) {
    if !sys.cp.stamp_end {
        if sys.cp.units.color_end() {
            send_raster(sys, Targets::COLOR, RasterCommand::End);
            send_raster(sys, Targets::DAC, RasterCommand::Blit);
            sys.cp.stamp_end = true;
        }
    } else if sys.cp.units.dac == RasterState::End {
        send_raster(sys, Targets::DAC, RasterCommand::End);
        sys.stats.inc(Counter::BitBlits);
        finish(sys);
    }
}
