//! Downstream units as seen from the command processor.
//!
//! Every unit is reached through a command [`Signal`] and reports back through a state [`Signal`].
//! The command processor never looks inside a unit.

use bitos::bitos;
use serde::{Deserialize, Serialize};
use tinyvec::TinyVec;

use crate::system::regs::{Reg, RegData, ShaderTarget};
use crate::system::signal::Signal;

/// Causal trace ids of a command, oldest first.
pub type Cookies = TinyVec<[u32; 4]>;

/// A command tagged with the lineage of the transaction that caused it.
#[derive(Debug, Clone, PartialEq)]
pub struct Message<C> {
    pub cookies: Cookies,
    pub command: C,
}

/// A register value forwarded to a unit that caches it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegWrite {
    pub reg: Reg,
    pub sub: u32,
    pub data: RegData,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamerCommand {
    Reset,
    Start,
    End,
    RegWrite(RegWrite),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AssemblyCommand {
    Reset,
    Draw,
    End,
    RegWrite(RegWrite),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClipperCommand {
    Reset,
    Start,
    End,
    RegWrite(RegWrite),
}

/// Commands understood by the rasterizer, the stamp units (z-stencil and color write) and the
/// DAC.
#[derive(Debug, Clone, PartialEq)]
pub enum RasterCommand {
    Reset,
    Draw,
    End,
    RegWrite(RegWrite),
    Swap,
    DumpColor,
    DumpDepth,
    DumpStencil,
    Blit,
    Flush,
    SaveState,
    RestoreState,
    ResetState,
    ClearColorBuffer,
    ClearZStencilBuffer,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShaderCommand {
    Reset,
    ParamWrite { index: u32, value: [f32; 4] },
    LoadProgram { pc: u32, code: Vec<u8> },
    SetInitPc { target: ShaderTarget, pc: u32 },
    SetThreadResources { target: ShaderTarget, resources: u32 },
    SetInputAttribute { attribute: u32, active: bool },
    SetOutputAttribute { attribute: u32, active: bool },
    SetMultisampling(bool),
    SetMsaaSamples(u32),
    TextureRegWrite(RegWrite),
}

#[derive(Debug, Clone, PartialEq)]
pub enum McCommand {
    RegWrite(RegWrite),
}

/// Which kinds of memory transactions the memory controller currently accepts.
#[bitos(8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryState {
    #[bits(0)]
    pub read_accept: bool,
    #[bits(1)]
    pub write_accept: bool,
}

impl MemoryState {
    pub fn both() -> Self {
        Self::from_bits(0b11)
    }
}

/// Transactions exchanged with the memory controller.
#[derive(Debug, Clone, PartialEq)]
pub enum MemoryTransaction {
    ReadRequest {
        ticket: u32,
        address: u32,
        size: u32,
    },
    ReadData {
        ticket: u32,
        /// Bus cycles the transfer occupies.
        cycles: u32,
        data: Vec<u8>,
    },
    WriteData {
        ticket: u32,
        address: u32,
        data: Vec<u8>,
    },
    PreloadData {
        ticket: u32,
        address: u32,
        data: Vec<u8>,
    },
    State(MemoryState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StreamerState {
    #[default]
    Reset,
    Ready,
    Streaming,
    Waiting,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AssemblyState {
    #[default]
    Ready,
    Full,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ClipperState {
    #[default]
    Reset,
    Ready,
    Draw,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RasterState {
    #[default]
    Reset,
    Ready,
    Drawing,
    End,
    Clear,
    ClearEnd,
    Swap,
    DumpBuffer,
    Blit,
    Flush,
    SaveState,
    RestoreState,
    ResetState,
}

bitflags::bitflags! {
    /// A set of units caching a copy of some register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Targets: u16 {
        const STREAMER = 1 << 0;
        const ASSEMBLY = 1 << 1;
        const CLIPPER = 1 << 2;
        const RASTERIZER = 1 << 3;
        const ZSTENCIL = 1 << 4;
        const COLOR = 1 << 5;
        const DAC = 1 << 6;
        const TEXTURE = 1 << 7;
        const MEMORY = 1 << 8;
        const VERTEX_SHADERS = 1 << 9;
        const FRAGMENT_SHADERS = 1 << 10;

        /// Units of the per pixel back end.
        const STAMP = Self::ZSTENCIL.bits() | Self::COLOR.bits();
        const SHADERS = Self::VERTEX_SHADERS.bits() | Self::FRAGMENT_SHADERS.bits();
    }
}

/// Command and state signals of a single unit.
#[derive(Debug)]
pub struct Link<C, S> {
    pub command: Signal<Message<C>>,
    pub state: Signal<S>,
}

impl<C, S> Link<C, S> {
    pub fn new(command: &'static str, state: &'static str) -> Self {
        Self {
            command: Signal::command(command),
            state: Signal::state(state),
        }
    }
}

pub type StreamerLink = Link<StreamerCommand, StreamerState>;
pub type AssemblyLink = Link<AssemblyCommand, AssemblyState>;
pub type ClipperLink = Link<ClipperCommand, ClipperState>;
pub type RasterLink = Link<RasterCommand, RasterState>;

/// Memory controller side of the command processor.
#[derive(Debug)]
pub struct MemoryLink {
    /// Command processor to memory controller.
    pub request: Signal<Message<MemoryTransaction>>,
    /// Memory controller to command processor.
    pub response: Signal<Message<MemoryTransaction>>,
    pub command: Signal<Message<McCommand>>,
}

/// Unit counts of a simulated GPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Topology {
    pub vertex_shaders: usize,
    pub fragment_shaders: usize,
    pub texture_units: usize,
    pub stamp_units: usize,
}

/// Every signal between the command processor and the rest of the GPU.
#[derive(Debug)]
pub struct Links {
    pub streamer: StreamerLink,
    pub assembly: AssemblyLink,
    pub clipper: ClipperLink,
    pub rasterizer: RasterLink,
    pub zstencil: Vec<RasterLink>,
    pub color: Vec<RasterLink>,
    pub dac: RasterLink,
    pub vertex_shaders: Vec<Signal<Message<ShaderCommand>>>,
    pub fragment_shaders: Vec<Signal<Message<ShaderCommand>>>,
    pub texture_units: Vec<Signal<Message<ShaderCommand>>>,
    pub memory: MemoryLink,
}

impl Links {
    pub fn new(topology: Topology) -> Self {
        Self {
            streamer: Link::new("StreamerCommand", "StreamerState"),
            assembly: Link::new("PrimitiveAssemblyCommand", "PrimitiveAssemblyState"),
            clipper: Link::new("ClipperCommand", "ClipperState"),
            rasterizer: Link::new("RasterizerCommand", "RasterizerState"),
            zstencil: (0..topology.stamp_units)
                .map(|_| Link::new("ZStencilCommand", "ZStencilState"))
                .collect(),
            color: (0..topology.stamp_units)
                .map(|_| Link::new("ColorWriteCommand", "ColorWriteState"))
                .collect(),
            dac: Link::new("DACCommand", "DACState"),
            vertex_shaders: (0..topology.vertex_shaders)
                .map(|_| Signal::command("VertexShaderCommand"))
                .collect(),
            fragment_shaders: (0..topology.fragment_shaders)
                .map(|_| Signal::command("FragmentShaderCommand"))
                .collect(),
            texture_units: (0..topology.texture_units)
                .map(|_| Signal::command("TextureUnitCommand"))
                .collect(),
            memory: MemoryLink {
                request: Signal::command("CommProcMemoryWrite"),
                response: Signal::command("CommProcMemoryRead"),
                command: Signal::command("MemoryControllerCommand"),
            },
        }
    }

    pub fn topology(&self) -> Topology {
        Topology {
            vertex_shaders: self.vertex_shaders.len(),
            fragment_shaders: self.fragment_shaders.len(),
            texture_units: self.texture_units.len(),
            stamp_units: self.color.len(),
        }
    }
}
