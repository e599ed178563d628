use crate::config::{MachineConfig, MachineKind};
use crate::graphics::decode::{GfxElement, GfxLayout};
use crate::graphics::tilemap::{draw_sprite, SpriteEntry, TileCell, TileInfo, TileLayer};
use crate::graphics::{FramePlane, Orientation, SCREEN_HEIGHT, SCREEN_WIDTH};
use crate::machine::{BusEvent, InputPorts, Interrupt, Machine, SoundChip};
use crate::memory::address::mrdo as address;
use crate::memory::{
    AddressRange, AddressSpace, HandlerCall, MemoryBus, RangeKind, ReadOutcome, Register,
    RegisterBank,
};
use serde::{Deserialize, Serialize};
use tinyvec::ArrayVec;

pub const PROGRAM_ROM_SIZE: usize = 0x8000;
pub const CHAR_ROM_SIZE: usize = 0x2000;
pub const SPRITE_ROM_SIZE: usize = 0x2000;

const COLS: usize = 32;
const ROWS: usize = 32;
const CELL_COUNT: usize = COLS * ROWS;

const SPRITE_COUNT: usize = 64;
const SPRITE_PEN_BASE: u16 = 256;

pub static CHAR_LAYOUT: GfxLayout = GfxLayout {
    width: 8,
    height: 8,
    count: 512,
    plane_offsets: &[0, 512 * 8 * 8],
    x_offsets: &[7, 6, 5, 4, 3, 2, 1, 0],
    y_offsets: &[0, 8, 16, 24, 32, 40, 48, 56],
    increment: 8 * 8,
};

pub static SPRITE_LAYOUT: GfxLayout = GfxLayout {
    width: 16,
    height: 16,
    count: 128,
    // Each byte holds 4 pixels; the high nibble is the first plane
    plane_offsets: &[4, 0],
    x_offsets: &[
        3,
        2,
        1,
        0,
        8 + 3,
        8 + 2,
        8 + 1,
        8,
        16 + 3,
        16 + 2,
        16 + 1,
        16,
        24 + 3,
        24 + 2,
        24 + 1,
        24,
    ],
    y_offsets: &[
        0,
        32,
        2 * 32,
        3 * 32,
        4 * 32,
        5 * 32,
        6 * 32,
        7 * 32,
        8 * 32,
        9 * 32,
        10 * 32,
        11 * 32,
        12 * 32,
        13 * 32,
        14 * 32,
        15 * 32,
    ],
    increment: 64 * 8,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MrDoRegister {
    FlipScreen,
    Sound0,
    Sound1,
    ScrollX,
    ScrollY,
}

impl Register for MrDoRegister {
    const COUNT: usize = 5;

    fn index(self) -> usize {
        self as usize
    }

    fn address(self) -> u16 {
        match self {
            Self::FlipScreen => address::FLIP_SCREEN,
            Self::Sound0 => address::SN76496_0,
            Self::Sound1 => address::SN76496_1,
            Self::ScrollX => address::SCROLL_X_START,
            Self::ScrollY => address::SCROLL_Y_START,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MrDoHandler {
    Inputs,
    BackgroundRam,
    ForegroundRam,
    Latch(MrDoRegister),
}

static READ_MAP: &[AddressRange<MrDoHandler>] = &[
    AddressRange::new(address::ROM_START, address::ROM_END, RangeKind::Rom),
    AddressRange::new(
        address::BG_VIDEO_RAM_START,
        address::FG_VIDEO_RAM_END,
        RangeKind::Ram,
    ),
    AddressRange::new(
        address::INPUTS_START,
        address::INPUTS_END,
        RangeKind::Handler(MrDoHandler::Inputs),
    ),
    AddressRange::new(address::RAM_START, address::RAM_END, RangeKind::Ram),
];

static WRITE_MAP: &[AddressRange<MrDoHandler>] = &[
    AddressRange::new(address::ROM_START, address::ROM_END, RangeKind::Rom),
    AddressRange::new(
        address::BG_VIDEO_RAM_START,
        address::BG_VIDEO_RAM_END,
        RangeKind::Handler(MrDoHandler::BackgroundRam),
    ),
    AddressRange::new(
        address::FG_VIDEO_RAM_START,
        address::FG_VIDEO_RAM_END,
        RangeKind::Handler(MrDoHandler::ForegroundRam),
    ),
    AddressRange::new(
        address::SPRITE_RAM_START,
        address::SPRITE_RAM_END,
        RangeKind::Ram,
    ),
    AddressRange::new(
        address::FLIP_SCREEN,
        address::FLIP_SCREEN,
        RangeKind::Handler(MrDoHandler::Latch(MrDoRegister::FlipScreen)),
    ),
    AddressRange::new(
        address::SN76496_0,
        address::SN76496_0,
        RangeKind::Handler(MrDoHandler::Latch(MrDoRegister::Sound0)),
    ),
    AddressRange::new(
        address::SN76496_1,
        address::SN76496_1,
        RangeKind::Handler(MrDoHandler::Latch(MrDoRegister::Sound1)),
    ),
    AddressRange::new(address::RAM_START, address::RAM_END, RangeKind::Ram),
    AddressRange::new(
        address::SCROLL_X_START,
        address::SCROLL_X_END,
        RangeKind::Handler(MrDoHandler::Latch(MrDoRegister::ScrollX)),
    ),
    AddressRange::new(
        address::SCROLL_Y_START,
        address::SCROLL_Y_END,
        RangeKind::Handler(MrDoHandler::Latch(MrDoRegister::ScrollY)),
    ),
];

/// Mr. Do!: a Z80 with scrolling background and fixed foreground tile layers, 64 sprites, and
/// two SN76496 chips.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MrDo {
    address_space: AddressSpace<MrDoHandler>,
    registers: RegisterBank<MrDoRegister>,
    background: TileLayer,
    foreground: TileLayer,
    #[serde(skip)]
    fg_gfx: GfxElement,
    #[serde(skip)]
    bg_gfx: GfxElement,
    #[serde(skip)]
    sprite_gfx: GfxElement,
    inputs: InputPorts,
    orientation: Orientation,
    frame: FramePlane<u16>,
    #[serde(skip)]
    events: Vec<BusEvent>,
}

// Attribute byte: bit 7 is the tile code's bit 8, bit 6 forces the tile opaque, bits 5-0 colour
fn tile_info(cell: TileCell) -> TileInfo {
    let attribute = cell.attribute;
    TileInfo {
        code: usize::from(cell.tile_index) + (usize::from(attribute & 0x80) << 1),
        color: u16::from(attribute & 0x3F),
        opaque: attribute & 0x40 != 0,
    }
}

impl MrDo {
    pub fn new(
        config: MachineConfig,
        program_rom: &[u8],
        fg_gfx: GfxElement,
        bg_gfx: GfxElement,
        sprite_gfx: GfxElement,
    ) -> Self {
        let mut address_space = AddressSpace::new(READ_MAP, WRITE_MAP);
        address_space.load_rom(address::ROM_START, program_rom);

        let orientation = config.rotation.orientation();
        let (width, height) = orientation.output_size(SCREEN_WIDTH, SCREEN_HEIGHT);

        Self {
            address_space,
            registers: RegisterBank::new(),
            background: TileLayer::new(COLS, ROWS),
            foreground: TileLayer::new(COLS, ROWS),
            fg_gfx,
            bg_gfx,
            sprite_gfx,
            inputs: InputPorts::default(),
            orientation,
            frame: FramePlane::new(width, height),
            events: Vec::new(),
        }
    }

    pub fn background(&self) -> &TileLayer {
        &self.background
    }

    pub fn foreground(&self) -> &TileLayer {
        &self.foreground
    }

    pub fn registers(&self) -> &RegisterBank<MrDoRegister> {
        &self.registers
    }

    /// Parse the active sprites out of sprite RAM, in drawing order (last entry first).
    pub fn sprite_list(&self) -> ArrayVec<[SpriteEntry; 128]> {
        self.address_space
            .slice(address::SPRITE_RAM_START, SPRITE_COUNT * 4)
            .chunks_exact(4)
            .rev()
            .filter(|entry| entry[1] != 0)
            .map(|entry| SpriteEntry {
                tile_index: u16::from(entry[0]),
                x: i32::from(entry[3]),
                y: 256 - i32::from(entry[1]),
                flip_x: entry[2] & 0x10 != 0,
                flip_y: entry[2] & 0x20 != 0,
                color: u16::from(entry[2] & 0x0F),
            })
            .collect()
    }

    fn write_latch(&mut self, register: MrDoRegister, value: u8) {
        let write = self.registers.write(register, value);

        match register {
            MrDoRegister::FlipScreen => {
                if write.changed_bits(0x01) {
                    log::debug!("flip screen {}", value & 0x01 != 0);
                }
            }
            MrDoRegister::Sound0 | MrDoRegister::Sound1 => {
                let chip = u8::from(register == MrDoRegister::Sound1);
                self.events.push(BusEvent::Sound {
                    chip: SoundChip::Sn76496(chip),
                    port: register.address(),
                    value,
                });
            }
            MrDoRegister::ScrollX | MrDoRegister::ScrollY => {
                if write.changed() {
                    log::trace!("{register:?} {:02X} -> {value:02X}", write.previous);
                }
            }
        }
    }

    pub(crate) fn move_unserializable_fields_from(&mut self, other: Self) {
        self.address_space
            .move_unserializable_fields_from(other.address_space);
        self.fg_gfx = other.fg_gfx;
        self.bg_gfx = other.bg_gfx;
        self.sprite_gfx = other.sprite_gfx;
    }
}

// Video RAM holds attributes in the first 0x400 bytes and tile codes in the second
fn write_tile_ram(layer: &mut TileLayer, offset: u16, value: u8) {
    let offset = usize::from(offset);
    if offset < CELL_COUNT {
        layer.write_attribute(offset, value);
    } else {
        layer.write_tile_index(offset - CELL_COUNT, u16::from(value));
    }
}

impl MemoryBus for MrDo {
    fn read(&self, address: u16) -> u8 {
        match self.address_space.read(address) {
            ReadOutcome::Value(value) => value,
            ReadOutcome::Handler(HandlerCall { id, offset }) => match id {
                MrDoHandler::Inputs => self.inputs.get(usize::from(offset)),
                MrDoHandler::BackgroundRam | MrDoHandler::ForegroundRam | MrDoHandler::Latch(_) => {
                    log::debug!("read from write-only {id:?} offset {offset:04X}");
                    crate::memory::UNMAPPED_VALUE
                }
            },
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        let Some(HandlerCall { id, offset }) = self.address_space.write(address, value) else {
            return;
        };

        match id {
            MrDoHandler::BackgroundRam => {
                self.address_space.poke(address, value);
                write_tile_ram(&mut self.background, offset, value);
            }
            MrDoHandler::ForegroundRam => {
                self.address_space.poke(address, value);
                write_tile_ram(&mut self.foreground, offset, value);
            }
            MrDoHandler::Latch(register) => self.write_latch(register, value),
            MrDoHandler::Inputs => {
                log::debug!("write to input port {offset}: {value:02X}");
            }
        }
    }
}

impl Machine for MrDo {
    fn kind(&self) -> MachineKind {
        MachineKind::MrDo
    }

    fn set_input_port(&mut self, index: usize, value: u8) {
        if index < crate::machine::INPUT_PORT_COUNT {
            self.inputs.set(index, value);
        }
    }

    fn vblank(&mut self) -> Option<Interrupt> {
        Some(Interrupt::Irq)
    }

    fn render_frame(&mut self) {
        self.background.render(&self.bg_gfx, tile_info);
        self.foreground.render(&self.fg_gfx, tile_info);

        self.background.set_scroll(
            self.registers.read(MrDoRegister::ScrollX),
            self.registers.read(MrDoRegister::ScrollY),
        );

        let orientation = self
            .orientation
            .flipped(self.registers.is_set(MrDoRegister::FlipScreen, 0x01));

        self.frame.fill(0);
        self.background.composite(&mut self.frame, orientation);
        self.foreground.composite(&mut self.frame, orientation);

        for sprite in self.sprite_list() {
            draw_sprite(
                &mut self.frame,
                &self.sprite_gfx,
                &sprite,
                orientation,
                SPRITE_PEN_BASE,
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
