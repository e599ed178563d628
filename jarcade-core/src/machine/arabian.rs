use crate::config::{MachineConfig, MachineKind};
use crate::graphics::blitter::BlitterEngine;
use crate::graphics::decode::{DecodedGraphicsRom, RawGraphicsRom};
use crate::graphics::{compose_blitter_planes, FramePlane, SCREEN_HEIGHT, SCREEN_WIDTH};
use crate::machine::{BusEvent, InputPorts, Interrupt, Machine, SoundChip};
use crate::memory::address::arabian as address;
use crate::memory::{
    AddressRange, AddressSpace, HandlerCall, MemoryBus, RangeKind, ReadMux, ReadOutcome, Register,
    RegisterBank,
};
use serde::{Deserialize, Serialize};

pub const PROGRAM_ROM_SIZE: usize = 0x8000;

// AY port B bit that switches MCU window reads from RAM to switches and clock
const MCU_SWITCH_SELECT: u8 = 0x10;
const MCU_WINDOW_LEN: u8 = 0x10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArabianHandler {
    In0,
    In1,
    Mcu,
    VideoRam,
    Blitter,
}

static READ_MAP: &[AddressRange<ArabianHandler>] = &[
    AddressRange::new(address::ROM_START, address::ROM_END, RangeKind::Rom),
    AddressRange::new(
        address::IN0,
        address::IN0,
        RangeKind::Handler(ArabianHandler::In0),
    ),
    AddressRange::new(
        address::IN1,
        address::IN1,
        RangeKind::Handler(ArabianHandler::In1),
    ),
    // Must precede RAM, which it overlaps
    AddressRange::new(
        address::MCU_WINDOW_START,
        address::MCU_WINDOW_END,
        RangeKind::Handler(ArabianHandler::Mcu),
    ),
    AddressRange::new(address::RAM_START, address::RAM_END, RangeKind::Ram),
];

static WRITE_MAP: &[AddressRange<ArabianHandler>] = &[
    AddressRange::new(address::ROM_START, address::ROM_END, RangeKind::Rom),
    AddressRange::new(
        address::VIDEO_RAM_START,
        address::VIDEO_RAM_END,
        RangeKind::Handler(ArabianHandler::VideoRam),
    ),
    AddressRange::new(
        address::MCU_WINDOW_START,
        address::MCU_WINDOW_END,
        RangeKind::Handler(ArabianHandler::Mcu),
    ),
    AddressRange::new(address::RAM_START, address::RAM_END, RangeKind::Ram),
    AddressRange::new(
        address::BLITTER_START,
        address::BLITTER_END,
        RangeKind::Handler(ArabianHandler::Blitter),
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArabianRegister {
    // Output ports of the AY-3-8910
    AyPortA,
    AyPortB,
    // Cells of the custom MCU window
    Mcu(u8),
}

impl Register for ArabianRegister {
    const COUNT: usize = 2 + MCU_WINDOW_LEN as usize;

    fn index(self) -> usize {
        match self {
            Self::AyPortA => 0,
            Self::AyPortB => 1,
            Self::Mcu(offset) => 2 + usize::from(offset % MCU_WINDOW_LEN),
        }
    }

    fn address(self) -> u16 {
        match self {
            Self::AyPortA | Self::AyPortB => address::AY_DATA_PORT,
            Self::Mcu(offset) => address::MCU_WINDOW_START + u16::from(offset % MCU_WINDOW_LEN),
        }
    }
}

/// Arabian: a Z80 driving a two-plane bitmap through a blitter and a direct video RAM window,
/// with an AY-3-8910 whose port B also steers the custom MCU window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Arabian {
    address_space: AddressSpace<ArabianHandler>,
    registers: RegisterBank<ArabianRegister>,
    blitter: BlitterEngine,
    #[serde(skip)]
    gfx: DecodedGraphicsRom,
    inputs: InputPorts,
    clock: u8,
    ay_register: u8,
    frame: FramePlane<u16>,
    #[serde(skip)]
    events: Vec<BusEvent>,
}

impl Arabian {
    pub fn new(config: MachineConfig, program_rom: &[u8], gfx: RawGraphicsRom) -> Self {
        let mut address_space = AddressSpace::new(READ_MAP, WRITE_MAP);
        address_space.load_rom(address::ROM_START, program_rom);

        let mut registers = RegisterBank::new();
        for offset in 0..MCU_WINDOW_LEN {
            registers.set_read_mux(
                ArabianRegister::Mcu(offset),
                ReadMux {
                    control: ArabianRegister::AyPortB,
                    mask: MCU_SWITCH_SELECT,
                },
            );
        }

        let orientation = config.rotation.orientation();
        let (width, height) = orientation.output_size(SCREEN_WIDTH, SCREEN_HEIGHT);

        // Compose the whole (blank) screen on the first frame
        let mut blitter = BlitterEngine::new(orientation);
        blitter.mark_all_dirty();

        Self {
            address_space,
            registers,
            blitter,
            gfx: gfx.decode(),
            inputs: InputPorts::default(),
            clock: 0,
            ay_register: 0,
            frame: FramePlane::new(width, height),
            events: Vec::new(),
        }
    }

    pub fn blitter(&self) -> &BlitterEngine {
        &self.blitter
    }

    pub fn registers(&self) -> &RegisterBank<ArabianRegister> {
        &self.registers
    }

    /// Frame counter the MCU exposes to the game.
    pub fn clock(&self) -> u8 {
        self.clock
    }

    fn read_handler(&self, HandlerCall { id, offset }: HandlerCall<ArabianHandler>) -> u8 {
        match id {
            ArabianHandler::In0 => self.inputs.get(0),
            ArabianHandler::In1 => self.inputs.get(1),
            ArabianHandler::Mcu => self.read_mcu(offset as u8),
            ArabianHandler::VideoRam | ArabianHandler::Blitter => {
                log::debug!("read from write-only {id:?} offset {offset:04X}");
                crate::memory::UNMAPPED_VALUE
            }
        }
    }

    fn read_mcu(&self, offset: u8) -> u8 {
        self.registers
            .read_muxed(ArabianRegister::Mcu(offset), || match offset {
                0..=5 => Some(self.inputs.get(2 + usize::from(offset))),
                6 => Some(self.clock >> 4),
                8 => Some(self.clock & 0x0F),
                _ => None,
            })
    }

    fn write_mcu(&mut self, offset: u8, value: u8) {
        // The latch is the window's RAM; reads with the switches deselected come back from it
        self.registers.write(ArabianRegister::Mcu(offset), value);
    }

    fn write_port_b(&mut self, value: u8) {
        let write = self.registers.write(ArabianRegister::AyPortB, value);

        // Coin counters are active low
        for counter in 0..2 {
            let mask = 1 << counter;
            if write.changed_bits(mask) {
                self.events.push(BusEvent::CoinCounter {
                    counter,
                    active: value & mask == 0,
                });
            }
        }

        if write.changed_bits(MCU_SWITCH_SELECT) {
            log::debug!(
                "MCU window now reads {}",
                if value & MCU_SWITCH_SELECT != 0 {
                    "switches"
                } else {
                    "RAM"
                }
            );
        }
    }

    pub(crate) fn move_unserializable_fields_from(&mut self, other: Self) {
        self.address_space
            .move_unserializable_fields_from(other.address_space);
        self.gfx = other.gfx;
    }
}

impl MemoryBus for Arabian {
    fn read(&self, address: u16) -> u8 {
        match self.address_space.read(address) {
            ReadOutcome::Value(value) => value,
            ReadOutcome::Handler(call) => self.read_handler(call),
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        let Some(HandlerCall { id, offset }) = self.address_space.write(address, value) else {
            return;
        };

        match id {
            ArabianHandler::VideoRam => self.blitter.write_video_ram(offset, value),
            ArabianHandler::Blitter => {
                self.blitter.write_register(offset, value, &self.gfx);
            }
            ArabianHandler::Mcu => self.write_mcu(offset as u8, value),
            ArabianHandler::In0 | ArabianHandler::In1 => {
                log::debug!("write to input port {id:?}: {value:02X}");
            }
        }
    }

    fn read_io(&self, port: u16) -> u8 {
        log::debug!("read from I/O port {port:04X}");
        crate::memory::UNMAPPED_VALUE
    }

    fn write_io(&mut self, port: u16, value: u8) {
        match port {
            address::AY_CONTROL_PORT => {
                self.ay_register = value & 0x0F;
            }
            address::AY_DATA_PORT => match self.ay_register {
                address::AY_PORT_A_REGISTER => {
                    self.registers.write(ArabianRegister::AyPortA, value);
                }
                address::AY_PORT_B_REGISTER => self.write_port_b(value),
                _ => {}
            },
            _ => {
                log::debug!("write to unmapped I/O port {port:04X}: {value:02X}");
                return;
            }
        }

        self.events.push(BusEvent::Sound {
            chip: SoundChip::Ay8910,
            port,
            value,
        });
    }
}

impl Machine for Arabian {
    fn kind(&self) -> MachineKind {
        MachineKind::Arabian
    }

    fn set_input_port(&mut self, index: usize, value: u8) {
        if index < crate::machine::INPUT_PORT_COUNT {
            self.inputs.set(index, value);
        }
    }

    fn vblank(&mut self) -> Option<Interrupt> {
        self.clock = self.clock.wrapping_add(1);
        Some(Interrupt::Irq)
    }

    fn render_frame(&mut self) {
        if let Some(rect) = self.blitter.take_dirty() {
            log::trace!("recomposing {rect:?}");
            compose_blitter_planes(
                self.blitter.plane_b(),
                self.blitter.plane_a(),
                rect,
                &mut self.frame,
            );
        }
    }

    fn frame(&self) -> &FramePlane<u16> {
        &self.frame
    }

    fn take_events(&mut self) -> Vec<BusEvent> {
        std::mem::take(&mut self.events)
    }
}
