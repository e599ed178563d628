pub mod arabian;
pub mod mario;
pub mod mrdo;


use crate::config::MachineKind;
use crate::graphics::FramePlane;
use crate::memory::MemoryBus;
use serde::{Deserialize, Serialize};

pub use arabian::Arabian;
pub use mario::Mario;
pub use mrdo::MrDo;

pub const INPUT_PORT_COUNT: usize = 8;

/// Interrupt line a machine asserts at vertical blank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    Irq,
    Nmi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundChip {
    Ay8910,
    Sn76496(u8),
    // Mario's separate sound CPU board, driven through latches
    MarioSoundBoard,
}

/// Externally observable side effects of bus writes, for collaborators outside this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusEvent {
    /// A byte routed unchanged to a sound chip.
    Sound {
        chip: SoundChip,
        port: u16,
        value: u8,
    },
    CoinCounter {
        counter: u8,
        active: bool,
    },
}

/// Input port and DIP switch bytes as supplied by the input layer. Ports idle high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputPorts([u8; INPUT_PORT_COUNT]);

impl InputPorts {
    pub fn get(&self, index: usize) -> u8 {
        self.0[index]
    }

    pub fn set(&mut self, index: usize, value: u8) {
        self.0[index] = value;
    }
}

impl Default for InputPorts {
    fn default() -> Self {
        Self([0xFF; INPUT_PORT_COUNT])
    }
}

/// A complete board as the CPU core and presentation layer see it.
pub trait Machine: MemoryBus {
    fn kind(&self) -> MachineKind;

    /// Update an input port. Indices past the machine's port count are ignored.
    fn set_input_port(&mut self, index: usize, value: u8);

    /// Advance per-frame hardware state at vertical blank and return the interrupt to raise, if
    /// any.
    fn vblank(&mut self) -> Option<Interrupt>;

    /// Bring the pen frame up to date with video memory.
    fn render_frame(&mut self);

    fn frame(&self) -> &FramePlane<u16>;

    /// Drain the events produced since the last call.
    fn take_events(&mut self) -> Vec<BusEvent>;
}

/// Any of the supported machines, for code that picks one at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ArcadeMachine {
    Arabian(Box<Arabian>),
    Mario(Box<Mario>),
    MrDo(Box<MrDo>),
}

macro_rules! delegate {
    ($self:expr, $machine:ident => $body:expr) => {
        match $self {
            Self::Arabian($machine) => $body,
            Self::Mario($machine) => $body,
            Self::MrDo($machine) => $body,
        }
    };
}

impl ArcadeMachine {
    /// Carry over state that save states do not contain (address decode tables, decoded
    /// graphics) from a freshly constructed machine of the same kind.
    pub(crate) fn move_unserializable_fields_from(&mut self, other: Self) {
        match (self, other) {
            (Self::Arabian(machine), Self::Arabian(other)) => {
                machine.move_unserializable_fields_from(*other);
            }
            (Self::Mario(machine), Self::Mario(other)) => {
                machine.move_unserializable_fields_from(*other);
            }
            (Self::MrDo(machine), Self::MrDo(other)) => {
                machine.move_unserializable_fields_from(*other);
            }
            (machine, other) => {
                log::warn!(
                    "not moving fields from {} into {}",
                    other.kind(),
                    machine.kind()
                );
            }
        }
    }
}

impl MemoryBus for ArcadeMachine {
    fn read(&self, address: u16) -> u8 {
        delegate!(self, machine => machine.read(address))
    }

    fn write(&mut self, address: u16, value: u8) {
        delegate!(self, machine => machine.write(address, value));
    }

    fn read_io(&self, port: u16) -> u8 {
        delegate!(self, machine => machine.read_io(port))
    }

    fn write_io(&mut self, port: u16, value: u8) {
        delegate!(self, machine => machine.write_io(port, value));
    }
}

impl Machine for ArcadeMachine {
    fn kind(&self) -> MachineKind {
        delegate!(self, machine => machine.kind())
    }

    fn set_input_port(&mut self, index: usize, value: u8) {
        delegate!(self, machine => machine.set_input_port(index, value));
    }

    fn vblank(&mut self) -> Option<Interrupt> {
        delegate!(self, machine => machine.vblank())
    }

    fn render_frame(&mut self) {
        delegate!(self, machine => machine.render_frame());
    }

    fn frame(&self) -> &FramePlane<u16> {
        delegate!(self, machine => machine.frame())
    }

    fn take_events(&mut self) -> Vec<BusEvent> {
        delegate!(self, machine => machine.take_events())
    }
}

impl From<Arabian> for ArcadeMachine {
    fn from(value: Arabian) -> Self {
        Self::Arabian(Box::new(value))
    }
}

impl From<Mario> for ArcadeMachine {
    fn from(value: Mario) -> Self {
        Self::Mario(Box::new(value))
    }
}

impl From<MrDo> for ArcadeMachine {
    fn from(value: MrDo) -> Self {
        Self::MrDo(Box::new(value))
    }
}
