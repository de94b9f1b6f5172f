//! AGP transactions, the input of the command processor.
use serde::{Deserialize, Serialize};
use strum::{EnumString, FromRepr, IntoStaticStr};

use crate::system::regs::{Reg, RegData};
use crate::system::units::Cookies;

/// Size of an AGP packet, in bytes.
pub const PACKET_SIZE: u32 = 32;

/// A GPU command.
#[rustfmt::skip]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, IntoStaticStr, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Command {
    Reset                = 0x00,
    Draw                 = 0x01,
    SwapBuffers          = 0x02,
    DumpColor            = 0x03,
    DumpDepth            = 0x04,
    DumpStencil          = 0x05,
    Blit                 = 0x06,
    ClearBuffers         = 0x07,
    ClearZBuffer         = 0x08,
    ClearZStencilBuffer  = 0x09,
    ClearColorBuffer     = 0x0A,
    LoadVertexProgram    = 0x0B,
    LoadFragmentProgram  = 0x0C,
    LoadShaderProgram    = 0x0D,
    FlushZStencil        = 0x0E,
    FlushColor           = 0x0F,
    SaveColorState       = 0x10,
    RestoreColorState    = 0x11,
    SaveZStencilState    = 0x12,
    RestoreZStencilState = 0x13,
    ResetColorState      = 0x14,
    ResetZStencilState   = 0x15,
}

impl Command {
    pub fn new(id: u8) -> Self {
        Self::from_repr(id).unwrap_or_else(|| panic!("unknown GPU command {id:02X}"))
    }
}

#[rustfmt::skip]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, IntoStaticStr, Serialize, Deserialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Event {
    EndOfFrame = 0x00,
    Unnamed    = 0x01,
}

impl Event {
    pub const COUNT: usize = 2;

    pub fn new(id: u8) -> Self {
        Self::from_repr(id).unwrap_or_else(|| panic!("unknown GPU event {id:02X}"))
    }
}

/// Payload of a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Kind {
    Write { address: u32, data: Vec<u8> },
    Read { address: u32, size: u32 },
    Preload { address: u32, data: Vec<u8> },
    RegWrite { reg: Reg, sub: u32, data: RegData },
    RegRead { reg: Reg, sub: u32 },
    Command(Command),
    InitEnd,
    Event { event: Event, message: String },
}

/// A unit of work coming from the trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub kind: Kind,
    /// Locked transactions are executed even while frames are skipped.
    #[serde(default)]
    pub locked: bool,
    #[serde(skip)]
    pub cookies: Cookies,
}

impl Transaction {
    pub fn new(kind: Kind) -> Self {
        Self {
            kind,
            locked: false,
            cookies: Cookies::default(),
        }
    }

    pub fn write(address: u32, data: Vec<u8>) -> Self {
        Self::new(Kind::Write { address, data })
    }

    pub fn preload(address: u32, data: Vec<u8>) -> Self {
        Self::new(Kind::Preload { address, data })
    }

    pub fn reg_write(reg: Reg, sub: u32, data: RegData) -> Self {
        Self::new(Kind::RegWrite { reg, sub, data })
    }

    pub fn command(command: Command) -> Self {
        Self::new(Kind::Command(command))
    }

    pub fn event(event: Event, message: impl Into<String>) -> Self {
        Self::new(Kind::Event {
            event,
            message: message.into(),
        })
    }

    /// Size of the payload, in bytes.
    pub fn size(&self) -> u32 {
        match &self.kind {
            Kind::Write { data, .. } | Kind::Preload { data, .. } => data.len() as u32,
            Kind::Read { size, .. } => *size,
            _ => 0,
        }
    }

    /// Number of AGP packets needed to transmit the transaction.
    pub fn packets(&self) -> u32 {
        self.size().div_ceil(PACKET_SIZE).max(1)
    }

    /// Turns a memory write into a preload, which updates memory without spending bus cycles.
    pub fn force_preload(&mut self) {
        if let Kind::Write { address, data } = &mut self.kind {
            self.kind = Kind::Preload {
                address: *address,
                data: std::mem::take(data),
            };
        }
    }
}
