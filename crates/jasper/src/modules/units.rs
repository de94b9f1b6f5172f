//! Units module interface.
use std::collections::VecDeque;

use rustc_hash::FxHashMap;

use crate::system::units::{
    AssemblyCommand, AssemblyState, ClipperCommand, ClipperState, Links, MemoryState,
    MemoryTransaction, Message, RasterCommand, RasterState, ShaderCommand, StreamerCommand,
    StreamerState,
};

/// The GPU units driven by the command processor.
pub trait UnitsModule: Send {
    /// Consumes the commands visible at `cycle` and reports the state of every unit for it.
    fn clock(&mut self, cycle: u64, links: &mut Links);
}

/// An implementation of [`UnitsModule`] that drops every command and reports idle units.
#[derive(Debug, Clone, Copy)]
pub struct NopUnitsModule;

impl UnitsModule for NopUnitsModule {
    fn clock(&mut self, cycle: u64, links: &mut Links) {
        links.streamer.command.drain(cycle);
        links.assembly.command.drain(cycle);
        links.clipper.command.drain(cycle);
        links.rasterizer.command.drain(cycle);
        links.dac.command.drain(cycle);
        links.memory.request.drain(cycle);
        links.memory.command.drain(cycle);

        links.streamer.state.write(cycle, StreamerState::Ready);
        links.assembly.state.write(cycle, AssemblyState::Ready);
        links.clipper.state.write(cycle, ClipperState::Ready);
        links.rasterizer.state.write(cycle, RasterState::Ready);
        for link in links.zstencil.iter_mut().chain(links.color.iter_mut()) {
            link.command.drain(cycle);
            link.state.write(cycle, RasterState::Ready);
        }
        links.dac.state.write(cycle, RasterState::Ready);

        for signal in links
            .vertex_shaders
            .iter_mut()
            .chain(links.fragment_shaders.iter_mut())
            .chain(links.texture_units.iter_mut())
        {
            signal.drain(cycle);
        }
    }
}

/// Configuration of [`IdealUnitsModule`].
#[derive(Debug, Clone, Copy)]
pub struct IdealConfig {
    /// Cycles every unit spends on a unit of work.
    pub latency: u32,
    /// Cycles the stamp units spend on a draw. Defaults to `latency`.
    pub fragment_latency: Option<u32>,
    /// Size of GPU memory, in bytes.
    pub memory_size: u64,
    /// Bytes per memory bus cycle.
    pub bus_width: u32,
}

impl Default for IdealConfig {
    fn default() -> Self {
        Self {
            latency: 4,
            fragment_latency: None,
            memory_size: 64 * 1024 * 1024,
            bus_width: 16,
        }
    }
}

/// A unit that finishes any work after a fixed latency.
#[derive(Debug, Clone, Copy)]
struct Unit<S> {
    state: S,
    countdown: u32,
    done: S,
}

impl<S: Copy> Unit<S> {
    fn new(state: S) -> Self {
        Self {
            state,
            countdown: 0,
            done: state,
        }
    }

    fn tick(&mut self) {
        if self.countdown > 0 {
            self.countdown -= 1;
            if self.countdown == 0 {
                self.state = self.done;
            }
        }
    }

    fn set(&mut self, state: S) {
        self.state = state;
        self.countdown = 0;
    }

    /// Enters `busy` and moves to `done` after `latency` cycles.
    fn work(&mut self, busy: S, done: S, latency: u32) {
        self.state = busy;
        self.done = done;
        self.countdown = latency.max(1);
    }
}

impl Unit<RasterState> {
    fn exec(&mut self, command: &RasterCommand, latency: u32) {
        use RasterState as S;

        match command {
            RasterCommand::Reset | RasterCommand::End => self.set(S::Ready),
            RasterCommand::RegWrite(_) => (),
            RasterCommand::Draw => self.work(S::Drawing, S::End, latency),
            RasterCommand::Swap => self.work(S::Swap, S::End, latency),
            RasterCommand::DumpColor | RasterCommand::DumpDepth | RasterCommand::DumpStencil => {
                self.work(S::DumpBuffer, S::End, latency)
            }
            RasterCommand::Blit => self.work(S::Blit, S::End, latency),
            RasterCommand::Flush => self.work(S::Flush, S::End, latency),
            RasterCommand::SaveState => self.work(S::SaveState, S::End, latency),
            RasterCommand::RestoreState => self.work(S::RestoreState, S::End, latency),
            RasterCommand::ResetState => self.work(S::ResetState, S::End, latency),
            RasterCommand::ClearColorBuffer => self.work(S::Clear, S::End, latency),
            RasterCommand::ClearZStencilBuffer => self.work(S::Clear, S::End, latency),
        }
    }
}

const PAGE_SIZE: usize = 4096;

/// Sparse GPU memory.
#[derive(Debug, Default)]
pub struct Memory {
    size: u64,
    pages: FxHashMap<u32, Box<[u8; PAGE_SIZE]>>,
}

impl Memory {
    pub fn new(size: u64) -> Self {
        Self {
            size,
            pages: FxHashMap::default(),
        }
    }

    fn check(&self, address: u32, len: usize) {
        assert!(
            address as u64 + len as u64 <= self.size,
            "memory access of {len} bytes at {address:08X} is out of bounds"
        );
    }

    pub fn write(&mut self, address: u32, data: &[u8]) {
        self.check(address, data.len());
        for (offset, &byte) in data.iter().enumerate() {
            let address = address as usize + offset;
            let page = self
                .pages
                .entry((address / PAGE_SIZE) as u32)
                .or_insert_with(|| Box::new([0; PAGE_SIZE]));

            page[address % PAGE_SIZE] = byte;
        }
    }

    pub fn read(&self, address: u32, len: u32) -> Vec<u8> {
        self.check(address, len as usize);
        (0..len as usize)
            .map(|offset| {
                let address = address as usize + offset;
                self.pages
                    .get(&((address / PAGE_SIZE) as u32))
                    .map_or(0, |page| page[address % PAGE_SIZE])
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingRead {
    ticket: u32,
    address: u32,
    size: u32,
}

/// A memory controller that always accepts transactions and answers reads in order.
#[derive(Debug)]
struct MemoryController {
    memory: Memory,
    bus_width: u32,
    reads: VecDeque<PendingRead>,
    next_free: u64,
}

impl MemoryController {
    fn clock(&mut self, cycle: u64, links: &mut Links) {
        let link = &mut links.memory;

        for message in link.request.drain(cycle) {
            match message.command {
                MemoryTransaction::WriteData { address, data, .. }
                | MemoryTransaction::PreloadData { address, data, .. } => {
                    self.memory.write(address, &data)
                }
                MemoryTransaction::ReadRequest {
                    ticket,
                    address,
                    size,
                } => self.reads.push_back(PendingRead {
                    ticket,
                    address,
                    size,
                }),
                other => panic!("unexpected memory transaction from the command processor: {other:?}"),
            }
        }

        for message in link.command.drain(cycle) {
            tracing::trace!(cycle, command = ?message.command, "memory controller");
        }

        if cycle >= self.next_free
            && let Some(read) = self.reads.pop_front()
        {
            let cycles = read.size.div_ceil(self.bus_width).max(1);
            let data = self.memory.read(read.address, read.size);
            link.response.write(
                cycle,
                Message {
                    cookies: Default::default(),
                    command: MemoryTransaction::ReadData {
                        ticket: read.ticket,
                        cycles,
                        data,
                    },
                },
            );

            self.next_free = cycle + cycles as u64;
        }

        link.response.write(
            cycle,
            Message {
                cookies: Default::default(),
                command: MemoryTransaction::State(MemoryState::both()),
            },
        );
    }
}

/// An implementation of [`UnitsModule`] where every unit finishes its work after a fixed latency.
#[derive(Debug)]
pub struct IdealUnitsModule {
    latency: u32,
    fragment_latency: u32,
    streamer: Unit<StreamerState>,
    assembly: Unit<AssemblyState>,
    clipper: Unit<ClipperState>,
    rasterizer: Unit<RasterState>,
    zstencil: Vec<Unit<RasterState>>,
    color: Vec<Unit<RasterState>>,
    dac: Unit<RasterState>,
    memory: MemoryController,
    /// Shader programs received by the shaders.
    pub programs: usize,
}

impl IdealUnitsModule {
    pub fn new(config: IdealConfig) -> Self {
        Self {
            latency: config.latency,
            fragment_latency: config.fragment_latency.unwrap_or(config.latency),
            streamer: Unit::new(StreamerState::Ready),
            assembly: Unit::new(AssemblyState::Ready),
            clipper: Unit::new(ClipperState::Ready),
            rasterizer: Unit::new(RasterState::Ready),
            zstencil: Vec::new(),
            color: Vec::new(),
            dac: Unit::new(RasterState::Ready),
            memory: MemoryController {
                memory: Memory::new(config.memory_size),
                bus_width: config.bus_width.max(1),
                reads: Default::default(),
                next_free: 0,
            },
            programs: 0,
        }
    }

    /// GPU memory.
    pub fn memory(&self) -> &Memory {
        &self.memory.memory
    }
}

impl UnitsModule for IdealUnitsModule {
    fn clock(&mut self, cycle: u64, links: &mut Links) {
        let latency = self.latency;
        let fragment_latency = self.fragment_latency;

        self.zstencil
            .resize_with(links.zstencil.len(), || Unit::new(RasterState::Ready));
        self.color
            .resize_with(links.color.len(), || Unit::new(RasterState::Ready));

        self.streamer.tick();
        for Message { command, .. } in links.streamer.command.drain(cycle) {
            match command {
                StreamerCommand::Reset | StreamerCommand::End => {
                    self.streamer.set(StreamerState::Ready)
                }
                StreamerCommand::Start => self.streamer.set(StreamerState::Streaming),
                StreamerCommand::RegWrite(_) => (),
            }
        }

        self.assembly.tick();
        for Message { command, .. } in links.assembly.command.drain(cycle) {
            match command {
                AssemblyCommand::Reset | AssemblyCommand::End | AssemblyCommand::Draw => {
                    self.assembly.set(AssemblyState::Ready)
                }
                AssemblyCommand::RegWrite(_) => (),
            }
        }

        self.clipper.tick();
        for Message { command, .. } in links.clipper.command.drain(cycle) {
            match command {
                ClipperCommand::Reset | ClipperCommand::End => self.clipper.set(ClipperState::Ready),
                ClipperCommand::Start => {
                    self.clipper
                        .work(ClipperState::Draw, ClipperState::End, latency)
                }
                ClipperCommand::RegWrite(_) => (),
            }
        }

        self.rasterizer.tick();
        for Message { command, .. } in links.rasterizer.command.drain(cycle) {
            match command {
                RasterCommand::ClearZStencilBuffer => {
                    self.rasterizer
                        .work(RasterState::Clear, RasterState::ClearEnd, latency)
                }
                RasterCommand::Draw => self.rasterizer.set(RasterState::Drawing),
                command => self.rasterizer.exec(&command, latency),
            }
        }

        let stamps = self
            .zstencil
            .iter_mut()
            .zip(links.zstencil.iter_mut())
            .chain(self.color.iter_mut().zip(links.color.iter_mut()));

        for (unit, link) in stamps {
            unit.tick();
            for Message { command, .. } in link.command.drain(cycle) {
                let latency = match command {
                    RasterCommand::Draw => fragment_latency,
                    _ => latency,
                };

                unit.exec(&command, latency);
            }
        }

        self.dac.tick();
        for Message { command, .. } in links.dac.command.drain(cycle) {
            self.dac.exec(&command, latency);
        }

        for signal in links
            .vertex_shaders
            .iter_mut()
            .chain(links.fragment_shaders.iter_mut())
            .chain(links.texture_units.iter_mut())
        {
            for Message { command, .. } in signal.drain(cycle) {
                if let ShaderCommand::LoadProgram { .. } = command {
                    self.programs += 1;
                }
            }
        }

        self.memory.clock(cycle, links);

        links.streamer.state.write(cycle, self.streamer.state);
        links.assembly.state.write(cycle, self.assembly.state);
        links.clipper.state.write(cycle, self.clipper.state);
        links.rasterizer.state.write(cycle, self.rasterizer.state);
        for (unit, link) in self.zstencil.iter().zip(links.zstencil.iter_mut()) {
            link.state.write(cycle, unit.state);
        }
        for (unit, link) in self.color.iter().zip(links.color.iter_mut()) {
            link.state.write(cycle, unit.state);
        }
        links.dac.state.write(cycle, self.dac.state);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::system::units::Topology;

    fn links() -> Links {
        Links::new(Topology {
            vertex_shaders: 1,
            fragment_shaders: 1,
            texture_units: 1,
            stamp_units: 2,
        })
    }

    fn message<C>(command: C) -> Message<C> {
        Message {
            cookies: Default::default(),
            command,
        }
    }

    #[test]
    fn sparse_memory() {
        let mut memory = Memory::new(1 << 20);
        memory.write(4090, &[1, 2, 3, 4, 5, 6, 7, 8]);

        assert_eq!(memory.read(4088, 12), [0, 0, 1, 2, 3, 4, 5, 6, 7, 8, 0, 0]);
        assert_eq!(memory.pages.len(), 2);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn memory_bounds() {
        Memory::new(4096).read(4090, 8);
    }

    #[test]
    fn reads_are_answered_in_order() {
        let mut units = IdealUnitsModule::new(IdealConfig {
            latency: 1,
            fragment_latency: None,
            memory_size: 1 << 20,
            bus_width: 16,
        });

        let mut links = links();
        let request = &mut links.memory.request;
        request.write(
            0,
            message(MemoryTransaction::PreloadData {
                ticket: 0,
                address: 0,
                data: (0..64).collect(),
            }),
        );
        request.write(
            0,
            message(MemoryTransaction::ReadRequest {
                ticket: 1,
                address: 0,
                size: 32,
            }),
        );
        request.write(
            0,
            message(MemoryTransaction::ReadRequest {
                ticket: 2,
                address: 32,
                size: 16,
            }),
        );

        let mut responses = Vec::new();
        for cycle in 0..8 {
            units.clock(cycle, &mut links);
            for response in links.memory.response.drain(cycle + 1) {
                if let MemoryTransaction::ReadData {
                    ticket,
                    cycles,
                    data,
                } = response.command
                {
                    responses.push((cycle, ticket, cycles, data));
                }
            }
        }

        assert_eq!(
            responses,
            [
                (1, 1, 2, (0..32).collect::<Vec<u8>>()),
                (3, 2, 1, (32..48).collect::<Vec<u8>>()),
            ]
        );
        assert_eq!(units.memory().read(60, 4), [60, 61, 62, 63]);
    }

    #[test]
    fn clipper_ends_after_latency() {
        let mut units = IdealUnitsModule::new(IdealConfig {
            latency: 3,
            ..Default::default()
        });

        let mut links = links();
        links.clipper.command.write(0, message(ClipperCommand::Start));
        links.vertex_shaders[0].write(
            0,
            message(ShaderCommand::LoadProgram {
                pc: 0,
                code: vec![0; 16],
            }),
        );

        let mut states = Vec::new();
        for cycle in 0..5 {
            units.clock(cycle, &mut links);
            states.push(links.clipper.state.read(cycle).unwrap());
        }

        use ClipperState::*;
        assert_eq!(states, [Ready, Draw, Draw, Draw, End]);
        assert_eq!(units.programs, 1);
        assert_eq!(links.color[1].state.len(), 5);
    }

    #[test]
    fn stamps_draw_for_fragment_latency() {
        let mut units = IdealUnitsModule::new(IdealConfig {
            latency: 1,
            fragment_latency: Some(3),
            ..Default::default()
        });

        let mut links = links();
        links.rasterizer.command.write(0, message(RasterCommand::Draw));
        links.clipper.command.write(0, message(ClipperCommand::Start));
        for link in &mut links.color {
            link.command.write(0, message(RasterCommand::Draw));
        }

        let mut clipper = Vec::new();
        let mut color = Vec::new();
        for cycle in 0..5 {
            units.clock(cycle, &mut links);
            clipper.push(links.clipper.state.read(cycle).unwrap());
            color.push(links.color[0].state.read(cycle).unwrap());
        }

        assert_eq!(
            clipper,
            [
                ClipperState::Ready,
                ClipperState::Draw,
                ClipperState::End,
                ClipperState::End,
                ClipperState::End
            ]
        );

        use RasterState::*;
        assert_eq!(color, [Ready, Drawing, Drawing, Drawing, End]);
        assert_eq!(links.rasterizer.state.drain(4).last(), Some(Drawing));
    }
}
