//! Memory interface of the command processor: writes from the trace, preloads and shader program
//! loads.
use std::path::PathBuf;

use crate::stats::Counter;
use crate::system::System;
use crate::system::cp::transaction::{Kind, Transaction};
use crate::system::cp::{Outcome, Status, send_shaders};
use crate::system::units::{MemoryState, MemoryTransaction, Message, ShaderCommand, Targets};

/// Largest transaction the memory controller accepts, in bytes.
pub const MAX_TRANSACTION_SIZE: u32 = 128;
/// Number of memory tickets.
pub const MAX_MEMORY_TICKETS: u32 = 256;

/// Pool of memory tickets. Every transaction in flight to the memory controller holds one.
#[derive(Debug, Clone)]
pub struct Tickets {
    free: u32,
    next: u32,
}

impl Default for Tickets {
    fn default() -> Self {
        Self {
            free: MAX_MEMORY_TICKETS,
            next: 0,
        }
    }
}

impl Tickets {
    #[inline(always)]
    pub fn free(&self) -> u32 {
        self.free
    }

    #[inline(always)]
    pub fn available(&self) -> bool {
        self.free > 0
    }

    /// Takes a ticket. Running out of tickets is fatal.
    pub fn issue(&mut self) -> u32 {
        assert!(self.free > 0, "no memory tickets available");

        self.free -= 1;
        let ticket = self.next;
        self.next = (self.next + 1) % MAX_MEMORY_TICKETS;

        ticket
    }

    pub fn release(&mut self) {
        assert!(
            self.free < MAX_MEMORY_TICKETS,
            "released more memory tickets than issued"
        );

        self.free += 1;
    }
}

/// What is travelling through the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    Write,
    ReadRequest,
    ReadData { size: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    pub kind: TransferKind,
    /// Remaining bus cycles.
    pub cycles: u32,
}

/// Destination of a shader program load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadTarget {
    Vertex,
    Fragment,
    Shader,
}

impl LoadTarget {
    fn prefix(self) -> &'static str {
        match self {
            Self::Vertex => "vertex",
            Self::Fragment => "fragment",
            Self::Shader => "shader",
        }
    }
}

/// A shader program being read from memory.
#[derive(Debug, Clone)]
pub struct ProgramRead {
    pub target: LoadTarget,
    pub address: u32,
    pub pc: u32,
    pub data: Vec<u8>,
    pub requested: u32,
    pub received: u32,
}

impl ProgramRead {
    #[inline(always)]
    pub fn size(&self) -> u32 {
        self.data.len() as u32
    }
}

/// Memory interface state.
#[derive(Debug, Clone)]
pub struct Interface {
    /// Transactions the memory controller accepts, as last reported.
    pub state: MemoryState,
    pub tickets: Tickets,
    /// Transfer occupying the bus, if any.
    pub transfer: Option<Transfer>,
    /// Bytes per bus cycle.
    pub bus_width: u32,
    /// Bytes of the current write already sent.
    pub sent: u32,
    pub read: Option<ProgramRead>,
}

impl Interface {
    pub fn new(bus_width: u32) -> Self {
        assert!(bus_width > 0, "memory bus width must not be zero");

        Self {
            state: MemoryState::default(),
            tickets: Tickets::default(),
            transfer: None,
            bus_width,
            sent: 0,
            read: None,
        }
    }

    #[inline(always)]
    pub fn bus_free(&self) -> bool {
        self.transfer.is_none()
    }

    /// Bus cycles needed to move `size` bytes.
    #[inline(always)]
    pub fn bus_cycles(&self, size: u32) -> u32 {
        size.div_ceil(self.bus_width).max(1)
    }
}

fn complete(sys: &mut System, kind: TransferKind) {
    match kind {
        TransferKind::Write => sys.cp.memory.tickets.release(),
        TransferKind::ReadRequest => (),
        TransferKind::ReadData { size } => {
            let Some(read) = &mut sys.cp.memory.read else {
                panic!("read data completed without a program load in progress");
            };

            read.received += size;
            sys.cp.memory.tickets.release();
            sys.stats.add(Counter::BytesRead, size as u64);
        }
    }
}

/// Advances the bus and consumes everything the memory controller sent this cycle.
pub fn process(sys: &mut System) {
    let cycle = sys.cycle;

    if let Some(transfer) = &mut sys.cp.memory.transfer {
        transfer.cycles -= 1;
        if transfer.cycles == 0 {
            let kind = transfer.kind;
            sys.cp.memory.transfer = None;
            complete(sys, kind);
        }
    }

    for message in sys.links.memory.response.drain(cycle) {
        match message.command {
            MemoryTransaction::State(state) => sys.cp.memory.state = state,
            MemoryTransaction::ReadData { ticket, cycles, data } => {
                assert!(
                    sys.cp.memory.bus_free(),
                    "read data (ticket {ticket}) received at cycle {cycle} while the memory bus is busy"
                );

                let Some(read) = &mut sys.cp.memory.read else {
                    panic!("read data (ticket {ticket}) received without a program load in progress");
                };

                let start = read.received as usize;
                let end = start + data.len();
                assert!(
                    end <= read.data.len(),
                    "read data overflows the program being loaded"
                );
                read.data[start..end].copy_from_slice(&data);

                let kind = TransferKind::ReadData {
                    size: data.len() as u32,
                };

                if cycles == 0 {
                    complete(sys, kind);
                } else {
                    sys.cp.memory.transfer = Some(Transfer { kind, cycles });
                }
            }
            other => panic!("unexpected memory transaction from the memory controller: {other:?}"),
        }
    }
}

fn send(sys: &mut System, transaction: MemoryTransaction) {
    let cookies = sys.cp.lineage();
    sys.links.memory.request.write(
        sys.cycle,
        Message {
            cookies,
            command: transaction,
        },
    );
}

/// Starts a memory write from the trace.
pub fn start_write(sys: &mut System, transaction: Transaction) -> Outcome {
    tracing::debug!(
        cycle = sys.cycle,
        size = transaction.size(),
        "starting memory write"
    );

    sys.cp.memory.sent = 0;
    sys.cp.stack = sys.regs.status;
    sys.regs.status = Status::MemoryWrite;

    Outcome::Busy(transaction)
}

/// Sends the next chunk of the current write, returning once the whole write was sent.
pub fn write_state(sys: &mut System) {
    let (address, size, chunk) = {
        let Some(Transaction {
            kind: Kind::Write { address, data },
            ..
        }) = &sys.cp.current
        else {
            panic!("memory write state without a memory write transaction");
        };

        let memory = &sys.cp.memory;
        let size = data.len() as u32;
        let sent = memory.sent;
        let can_send = sent < size
            && memory.bus_free()
            && memory.state.write_accept()
            && memory.tickets.available();

        let chunk = can_send.then(|| {
            let len = (size - sent).min(MAX_TRANSACTION_SIZE);
            data[sent as usize..(sent + len) as usize].to_vec()
        });

        (*address, size, chunk)
    };

    if let Some(chunk) = chunk {
        let len = chunk.len() as u32;
        let ticket = sys.cp.memory.tickets.issue();
        let target = address + sys.cp.memory.sent;

        tracing::trace!(cycle = sys.cycle, ticket, address = target, len, "memory write");
        send(
            sys,
            MemoryTransaction::WriteData {
                ticket,
                address: target,
                data: chunk,
            },
        );

        let cycles = sys.cp.memory.bus_cycles(len);
        sys.cp.memory.transfer = Some(Transfer {
            kind: TransferKind::Write,
            cycles,
        });
        sys.cp.memory.sent += len;

        sys.stats.inc(Counter::WriteTrans);
        sys.stats.add(Counter::BytesWritten, len as u64);
    }

    if sys.cp.memory.sent == size {
        sys.cp.memory.sent = 0;
        sys.cp.current = None;
        sys.cp.process_new = true;
        sys.cp.flags.command_end = true;
        sys.regs.status = sys.cp.stack;
    }
}

/// Writes memory directly, without spending bus cycles.
pub fn preload(sys: &mut System, transaction: Transaction) -> Outcome {
    if !sys.cp.memory.tickets.available() {
        return Outcome::Deferred(transaction);
    }

    let Kind::Preload { address, data } = transaction.kind else {
        unreachable!("not a preload transaction");
    };

    tracing::debug!(cycle = sys.cycle, address, size = data.len(), "memory preload");

    let ticket = sys.cp.memory.tickets.issue();
    send(sys, MemoryTransaction::PreloadData {
        ticket,
        address,
        data,
    });
    sys.cp.memory.tickets.release();

    sys.cp.stack = sys.regs.status;
    sys.regs.status = Status::MemoryPreload;

    Outcome::Started
}

fn request_chunk(sys: &mut System) {
    let memory = &mut sys.cp.memory;
    let Some(read) = &mut memory.read else {
        return;
    };

    let len = (read.size() - read.requested).min(MAX_TRANSACTION_SIZE);
    let address = read.address + read.requested;
    read.requested += len;

    let ticket = memory.tickets.issue();
    memory.transfer = Some(Transfer {
        kind: TransferKind::ReadRequest,
        cycles: 1,
    });

    tracing::trace!(cycle = sys.cycle, ticket, address, len, "memory read request");
    send(
        sys,
        MemoryTransaction::ReadRequest {
            ticket,
            address,
            size: len,
        },
    );
}

/// Starts loading a shader program into the shaders.
pub fn start_program_load(sys: &mut System, target: LoadTarget) -> Outcome {
    let regs = &sys.regs;
    let (address, size, pc) = match target {
        LoadTarget::Vertex => (
            regs.buffers.program + regs.vertex.address,
            regs.vertex.size,
            regs.vertex.start_pc,
        ),
        LoadTarget::Fragment => (
            regs.buffers.program + regs.fragment.address,
            regs.fragment.size,
            regs.fragment.start_pc,
        ),
        LoadTarget::Shader => (regs.shader.address, regs.shader.size, regs.shader.load_pc),
    };

    tracing::debug!(
        cycle = sys.cycle,
        ?target,
        address,
        size,
        pc,
        "loading shader program"
    );

    sys.cp.memory.read = Some(ProgramRead {
        target,
        address,
        pc,
        data: vec![0; size as usize],
        requested: 0,
        received: 0,
    });

    sys.cp.stack = sys.regs.status;
    sys.regs.status = Status::MemoryRead;

    let memory = &sys.cp.memory;
    if size > 0 && memory.bus_free() && memory.state.read_accept() {
        request_chunk(sys);
    }

    Outcome::Started
}

/// Requests the rest of the program being loaded and hands it to the shaders once complete.
pub fn read_state(sys: &mut System) {
    let Some(read) = &sys.cp.memory.read else {
        panic!("memory read state without a program load in progress");
    };

    if read.received == read.size() {
        finish_program_load(sys);
        return;
    }

    let memory = &sys.cp.memory;
    if read.requested < read.size()
        && memory.bus_free()
        && memory.state.read_accept()
        && memory.tickets.available()
    {
        request_chunk(sys);
    }
}

fn finish_program_load(sys: &mut System) {
    let Some(read) = sys.cp.memory.read.take() else {
        return;
    };

    let targets = match read.target {
        LoadTarget::Vertex => Targets::VERTEX_SHADERS,
        LoadTarget::Fragment => Targets::FRAGMENT_SHADERS,
        LoadTarget::Shader => Targets::SHADERS,
    };

    let counter = match read.target {
        LoadTarget::Vertex => &mut sys.cp.vertex_programs,
        LoadTarget::Fragment => &mut sys.cp.fragment_programs,
        LoadTarget::Shader => &mut sys.cp.shader_programs,
    };
    let id = *counter;
    *counter += 1;

    if sys.config.dump_shaders {
        dump_program(sys, read.target, id, &read.data);
    }

    tracing::debug!(
        cycle = sys.cycle,
        target = ?read.target,
        size = read.size(),
        "shader program loaded"
    );

    send_shaders(
        sys,
        targets,
        ShaderCommand::LoadProgram {
            pc: read.pc,
            code: read.data,
        },
    );

    sys.regs.status = sys.cp.stack;
    sys.cp.flags.command_end = true;
}

/// Path of the dump file of a loaded program.
pub fn dump_path(sys: &System, target: LoadTarget, id: u32) -> PathBuf {
    sys.config
        .snapshot_dir
        .join(format!("{}_program_{id:04}.bin", target.prefix()))
}

fn dump_program(sys: &System, target: LoadTarget, id: u32, code: &[u8]) {
    let path = dump_path(sys, target, id);
    if let Err(e) = std::fs::write(&path, code) {
        tracing::warn!("failed to dump shader program to {}: {e}", path.display());
    }
}
