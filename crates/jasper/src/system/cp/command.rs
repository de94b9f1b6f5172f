//! GPU commands.
use crate::stats::Counter;
use crate::system::System;
use crate::system::cp::memory::{self, LoadTarget};
use crate::system::cp::transaction::{Command, Kind, Transaction};
use crate::system::cp::{
    CONSECUTIVE_DRAW_DELAY, Dump, FLUSH_DELAY_CYCLES, Outcome, PendingLoad, Status, end_frame,
    reset_units, send_assembly, send_clipper, send_raster, send_streamer,
};
use crate::system::units::{
    AssemblyCommand, ClipperCommand, RasterCommand, StreamerCommand, StreamerState, Targets,
};

/// Processes a command transaction.
pub fn process(sys: &mut System, transaction: Transaction) -> Outcome {
    let Kind::Command(command) = transaction.kind else {
        unreachable!("not a command transaction");
    };

    match sys.regs.status {
        Status::Ready => (),
        status @ (Status::Drawing | Status::EndGeometry) if sys.config.pipelined_batches => {
            return match command {
                Command::Draw if status == Status::EndGeometry => start_geometry(sys, transaction),
                Command::LoadFragmentProgram if !sys.cp.geometry_started => {
                    store_fragment_program(sys, transaction)
                }
                _ => Outcome::Deferred(transaction),
            };
        }
        _ => return Outcome::Deferred(transaction),
    }

    tracing::debug!(cycle = sys.cycle, ?command, "processing command");

    match command {
        Command::Reset => {
            reset_units(sys);
            sys.regs.status = Status::Reset;
            Outcome::Done
        }
        Command::Draw => draw(sys, transaction),
        Command::SwapBuffers => swap_buffers(sys),
        Command::DumpColor => dump(sys, Dump::Color),
        Command::DumpDepth => dump(sys, Dump::Depth),
        Command::DumpStencil => dump(sys, Dump::Stencil),
        Command::Blit => {
            send_raster(sys, Targets::COLOR, RasterCommand::Flush);
            sys.cp.stamp_end = false;
            sys.regs.status = Status::Blitting;
            Outcome::Started
        }
        Command::ClearBuffers | Command::ClearZBuffer => {
            panic!("{command:?} is not supported, use the separate color and z-stencil clears")
        }
        Command::ClearZStencilBuffer => {
            send_raster(
                sys,
                Targets::RASTERIZER | Targets::ZSTENCIL,
                RasterCommand::ClearZStencilBuffer,
            );
            sys.regs.status = Status::ClearZ;
            Outcome::Started
        }
        Command::ClearColorBuffer => {
            send_raster(sys, Targets::COLOR, RasterCommand::ClearColorBuffer);
            sys.regs.status = Status::ClearColor;
            Outcome::Started
        }
        Command::LoadVertexProgram => memory::start_program_load(sys, LoadTarget::Vertex),
        Command::LoadFragmentProgram => memory::start_program_load(sys, LoadTarget::Fragment),
        Command::LoadShaderProgram => memory::start_program_load(sys, LoadTarget::Shader),
        Command::FlushZStencil => {
            send_raster(sys, Targets::ZSTENCIL, RasterCommand::Flush);
            sys.cp.flush_delay = FLUSH_DELAY_CYCLES;
            sys.regs.status = Status::FlushZ;
            Outcome::Started
        }
        Command::FlushColor => stamp(sys, Targets::COLOR, RasterCommand::Flush, Status::FlushColor),
        Command::SaveColorState => stamp(
            sys,
            Targets::COLOR,
            RasterCommand::SaveState,
            Status::SaveStateColor,
        ),
        Command::RestoreColorState => stamp(
            sys,
            Targets::COLOR,
            RasterCommand::RestoreState,
            Status::RestoreStateColor,
        ),
        Command::ResetColorState => stamp(
            sys,
            Targets::COLOR,
            RasterCommand::ResetState,
            Status::RestoreStateColor,
        ),
        Command::SaveZStencilState => stamp(
            sys,
            Targets::ZSTENCIL,
            RasterCommand::SaveState,
            Status::SaveStateZ,
        ),
        Command::RestoreZStencilState => stamp(
            sys,
            Targets::ZSTENCIL,
            RasterCommand::RestoreState,
            Status::RestoreStateZ,
        ),
        Command::ResetZStencilState => stamp(
            sys,
            Targets::ZSTENCIL,
            RasterCommand::ResetState,
            Status::RestoreStateZ,
        ),
    }
}

/// Sends a command to the stamp units and waits for them to end it.
fn stamp(sys: &mut System, units: Targets, command: RasterCommand, status: Status) -> Outcome {
    send_raster(sys, units, command);
    sys.regs.status = status;
    Outcome::Started
}

fn can_draw(sys: &System) -> bool {
    sys.cp.units.streamer == StreamerState::Ready && sys.cp.draw_cooldown == 0
}

/// Counts a batch.
fn count_batch(sys: &mut System) {
    sys.cp.batch += 1;
    sys.stats.inc(Counter::Batches);
    sys.cp.draw_cooldown = CONSECUTIVE_DRAW_DELAY;
}

/// Counts a batch without drawing it.
fn skip_batch(sys: &mut System) -> Outcome {
    tracing::trace!(cycle = sys.cycle, batch = sys.cp.batch, "skipping draw");

    count_batch(sys);
    sys.cp.flags.batch_end = true;
    Outcome::Done
}

fn send_geometry_start(sys: &mut System) {
    send_streamer(sys, StreamerCommand::Start);
    send_assembly(sys, AssemblyCommand::Draw);
    send_clipper(sys, ClipperCommand::Start);
}

fn draw(sys: &mut System, transaction: Transaction) -> Outcome {
    if !can_draw(sys) {
        return Outcome::Deferred(transaction);
    }

    if sys.cp.skip_draw || sys.cp.skip_frames {
        return skip_batch(sys);
    }

    tracing::debug!(
        cycle = sys.cycle,
        frame = sys.cp.frame,
        batch = sys.cp.batch,
        "draw"
    );

    send_geometry_start(sys);
    send_raster(
        sys,
        Targets::RASTERIZER | Targets::STAMP,
        RasterCommand::Draw,
    );
    count_batch(sys);

    sys.regs.status = Status::Drawing;
    if !sys.config.pipelined_batches {
        sys.cp.process_new = false;
    }

    Outcome::Done
}

/// Starts the geometry phase of the next batch while the current one finishes.
fn start_geometry(sys: &mut System, transaction: Transaction) -> Outcome {
    if sys.cp.geometry_started || !can_draw(sys) {
        return Outcome::Deferred(transaction);
    }

    if sys.cp.skip_draw || sys.cp.skip_frames {
        return skip_batch(sys);
    }

    tracing::debug!(
        cycle = sys.cycle,
        frame = sys.cp.frame,
        batch = sys.cp.batch,
        "draw (geometry overlapped)"
    );

    send_geometry_start(sys);
    count_batch(sys);
    sys.cp.geometry_started = true;

    Outcome::Done
}

/// Keeps a fragment program load until the fragment phase of the current batch ends.
fn store_fragment_program(sys: &mut System, transaction: Transaction) -> Outcome {
    if !matches!(sys.cp.pending_load, PendingLoad::None) {
        return Outcome::Deferred(transaction);
    }

    tracing::debug!(cycle = sys.cycle, "fragment program load stored");
    sys.cp.pending_load = PendingLoad::Stored(transaction);
    Outcome::Done
}

fn swap_buffers(sys: &mut System) -> Outcome {
    if sys.cp.skip_frames {
        end_frame(sys);
        return Outcome::Done;
    }

    send_raster(sys, Targets::COLOR, RasterCommand::Swap);
    sys.cp.stamp_end = false;
    sys.regs.status = Status::Swap;
    Outcome::Started
}

fn dump(sys: &mut System, dump: Dump) -> Outcome {
    let units = match dump {
        Dump::Color => Targets::COLOR,
        Dump::Depth | Dump::Stencil => Targets::ZSTENCIL,
    };

    send_raster(sys, units, RasterCommand::Flush);
    sys.cp.dump = Some(dump);
    sys.cp.stamp_end = false;
    sys.regs.status = Status::DumpBuffer;
    Outcome::Started
}
