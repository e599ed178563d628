use crate::config::{MachineConfig, MachineKind};
use crate::graphics::decode::{GfxElement, GfxLayout};
use crate::graphics::tilemap::{draw_sprite, SpriteEntry, TileCell, TileInfo, TileLayer};
use crate::graphics::{FramePlane, Orientation, SCREEN_HEIGHT, SCREEN_WIDTH};
use crate::machine::{BusEvent, InputPorts, Interrupt, Machine, SoundChip};
use crate::memory::address::mario as address;
use crate::memory::{
    AddressRange, AddressSpace, HandlerCall, MemoryBus, RangeKind, ReadOutcome, Register,
    RegisterBank,
};
use serde::{Deserialize, Serialize};
use tinyvec::ArrayVec;

pub const PROGRAM_ROM_SIZE: usize = 0x7000;
// The last 4KB of program ROM sits at the top of the address space
pub const LOW_PROGRAM_ROM_SIZE: usize = 0x6000;

pub const CHAR_ROM_SIZE: usize = 0x2000;
pub const SPRITE_ROM_SIZE: usize = 0x6000;

const COLS: usize = 32;
const ROWS: usize = 32;

const SPRITE_COUNT: usize = 96;
const SPRITE_PEN_BASE: u16 = 64;

// Background scroll is offset from the latch value
const SCROLL_Y_OFFSET: u8 = 17;

pub static CHAR_LAYOUT: GfxLayout = GfxLayout {
    width: 8,
    height: 8,
    count: 512,
    plane_offsets: &[512 * 8 * 8, 0],
    x_offsets: &[0, 1, 2, 3, 4, 5, 6, 7],
    y_offsets: &[0, 8, 16, 24, 32, 40, 48, 56],
    increment: 8 * 8,
};

pub static SPRITE_LAYOUT: GfxLayout = GfxLayout {
    width: 16,
    height: 16,
    count: 256,
    plane_offsets: &[2 * 256 * 16 * 16, 256 * 16 * 16, 0],
    x_offsets: &[
        0,
        1,
        2,
        3,
        4,
        5,
        6,
        7,
        256 * 16 * 8,
        256 * 16 * 8 + 1,
        256 * 16 * 8 + 2,
        256 * 16 * 8 + 3,
        256 * 16 * 8 + 4,
        256 * 16 * 8 + 5,
        256 * 16 * 8 + 6,
        256 * 16 * 8 + 7,
    ],
    y_offsets: &[
        0,
        8,
        2 * 8,
        3 * 8,
        4 * 8,
        5 * 8,
        6 * 8,
        7 * 8,
        8 * 8,
        9 * 8,
        10 * 8,
        11 * 8,
        12 * 8,
        13 * 8,
        14 * 8,
        15 * 8,
    ],
    increment: 16 * 8,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarioRegister {
    MarioRun,
    LuigiRun,
    Scroll,
    TuneSelect,
    GfxBank,
    FlipScreen,
    PaletteBank,
    NmiEnable,
    DeathSample,
    CoinSample,
    CrabSample,
    TurtleSample,
    FlySample,
}

impl MarioRegister {
    const ALL: [Self; 13] = [
        Self::MarioRun,
        Self::LuigiRun,
        Self::Scroll,
        Self::TuneSelect,
        Self::GfxBank,
        Self::FlipScreen,
        Self::PaletteBank,
        Self::NmiEnable,
        Self::DeathSample,
        Self::CoinSample,
        Self::CrabSample,
        Self::TurtleSample,
        Self::FlySample,
    ];

    fn is_sound_latch(self) -> bool {
        matches!(
            self,
            Self::MarioRun
                | Self::LuigiRun
                | Self::TuneSelect
                | Self::DeathSample
                | Self::CoinSample
                | Self::CrabSample
                | Self::TurtleSample
                | Self::FlySample
        )
    }
}

impl Register for MarioRegister {
    const COUNT: usize = Self::ALL.len();

    fn index(self) -> usize {
        self as usize
    }

    fn address(self) -> u16 {
        match self {
            Self::MarioRun => address::IN0,
            Self::LuigiRun => address::IN1,
            Self::Scroll => address::SCROLL,
            Self::TuneSelect => address::TUNE_SELECT,
            Self::GfxBank => address::GFX_BANK,
            Self::FlipScreen => address::FLIP_SCREEN,
            Self::PaletteBank => address::PALETTE_BANK,
            Self::NmiEnable => address::NMI_ENABLE,
            Self::DeathSample => address::DEATH_SAMPLE,
            Self::CoinSample => address::COIN_SAMPLE,
            Self::CrabSample => address::CRAB_SAMPLE,
            Self::TurtleSample => address::TURTLE_SAMPLE,
            Self::FlySample => address::FLY_SAMPLE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarioHandler {
    In0,
    In1,
    Dsw,
    VideoRam,
    Latch(MarioRegister),
}

macro_rules! latch {
    ($register:ident, $address:expr) => {
        AddressRange::new(
            $address,
            $address,
            RangeKind::Handler(MarioHandler::Latch(MarioRegister::$register)),
        )
    };
}

static READ_MAP: &[AddressRange<MarioHandler>] = &[
    AddressRange::new(address::ROM_START, address::ROM_END, RangeKind::Rom),
    AddressRange::new(address::RAM_START, address::RAM_END, RangeKind::Ram),
    AddressRange::new(
        address::VIDEO_RAM_START,
        address::VIDEO_RAM_END,
        RangeKind::Ram,
    ),
    AddressRange::new(address::IN0, address::IN0, RangeKind::Handler(MarioHandler::In0)),
    AddressRange::new(address::IN1, address::IN1, RangeKind::Handler(MarioHandler::In1)),
    AddressRange::new(address::DSW, address::DSW, RangeKind::Handler(MarioHandler::Dsw)),
    AddressRange::new(address::HIGH_ROM_START, address::HIGH_ROM_END, RangeKind::Rom),
];

static WRITE_MAP: &[AddressRange<MarioHandler>] = &[
    AddressRange::new(address::ROM_START, address::ROM_END, RangeKind::Rom),
    AddressRange::new(
        address::RAM_START,
        address::SPRITE_RAM_START - 1,
        RangeKind::Ram,
    ),
    AddressRange::new(
        address::SPRITE_RAM_START,
        address::SPRITE_RAM_END,
        RangeKind::Ram,
    ),
    AddressRange::new(address::SPRITE_RAM_END + 1, address::RAM_END, RangeKind::Ram),
    AddressRange::new(address::UNUSED_START, address::UNUSED_END, RangeKind::Nop),
    AddressRange::new(
        address::VIDEO_RAM_START,
        address::VIDEO_RAM_END,
        RangeKind::Handler(MarioHandler::VideoRam),
    ),
    latch!(MarioRun, address::IN0),
    latch!(LuigiRun, address::IN1),
    latch!(Scroll, address::SCROLL),
    latch!(TuneSelect, address::TUNE_SELECT),
    latch!(GfxBank, address::GFX_BANK),
    latch!(FlipScreen, address::FLIP_SCREEN),
    latch!(PaletteBank, address::PALETTE_BANK),
    latch!(NmiEnable, address::NMI_ENABLE),
    latch!(DeathSample, address::DEATH_SAMPLE),
    latch!(CoinSample, address::COIN_SAMPLE),
    latch!(CrabSample, address::CRAB_SAMPLE),
    latch!(TurtleSample, address::TURTLE_SAMPLE),
    latch!(FlySample, address::FLY_SAMPLE),
    AddressRange::new(address::HIGH_ROM_START, address::HIGH_ROM_END, RangeKind::Rom),
];

/// Mario Bros.: a Z80 with one 32x32 background tile layer, 96 hardware sprites, and a separate
/// sound board fed through latches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mario {
    address_space: AddressSpace<MarioHandler>,
    registers: RegisterBank<MarioRegister>,
    background: TileLayer,
    #[serde(skip)]
    char_gfx: GfxElement,
    #[serde(skip)]
    sprite_gfx: GfxElement,
    inputs: InputPorts,
    orientation: Orientation,
    frame: FramePlane<u16>,
    #[serde(skip)]
    events: Vec<BusEvent>,
}

impl Mario {
    pub fn new(
        config: MachineConfig,
        program_rom: &[u8],
        char_gfx: GfxElement,
        sprite_gfx: GfxElement,
    ) -> Self {
        let mut address_space = AddressSpace::new(READ_MAP, WRITE_MAP);
        let split = program_rom.len().min(LOW_PROGRAM_ROM_SIZE);
        address_space.load_rom(address::ROM_START, &program_rom[..split]);
        address_space.load_rom(address::HIGH_ROM_START, &program_rom[split..]);

        let orientation = config.rotation.orientation();
        let (width, height) = orientation.output_size(SCREEN_WIDTH, SCREEN_HEIGHT);

        Self {
            address_space,
            registers: RegisterBank::new(),
            background: TileLayer::new(COLS, ROWS),
            char_gfx,
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

    pub fn registers(&self) -> &RegisterBank<MarioRegister> {
        &self.registers
    }

    fn write_latch(&mut self, register: MarioRegister, value: u8) {
        let write = self.registers.write(register, value);

        match register {
            MarioRegister::GfxBank | MarioRegister::PaletteBank if write.changed_bits(0x01) => {
                log::debug!("{register:?} switched to {}", value & 0x01);
                self.background.mark_all_dirty();
            }
            MarioRegister::NmiEnable if write.rose(0x01) => {
                log::debug!("vblank NMI enabled");
            }
            _ => {}
        }

        if register.is_sound_latch() {
            self.events.push(BusEvent::Sound {
                chip: SoundChip::MarioSoundBoard,
                port: register.address(),
                value,
            });
        }
    }

    fn gfx_bank(&self) -> u16 {
        u16::from(self.registers.read(MarioRegister::GfxBank) & 0x01)
    }

    fn palette_bank(&self) -> u16 {
        u16::from(self.registers.read(MarioRegister::PaletteBank) & 0x01)
    }

    /// Parse the active sprites out of sprite RAM.
    pub fn sprite_list(&self) -> ArrayVec<[SpriteEntry; 128]> {
        let palette_bank = self.palette_bank();
        self.address_space
            .slice(address::SPRITE_RAM_START, SPRITE_COUNT * 4)
            .chunks_exact(4)
            .filter(|entry| entry[0] != 0)
            .map(|entry| SpriteEntry {
                tile_index: u16::from(entry[2]),
                x: i32::from(entry[3]) - 8,
                y: 248 - i32::from(entry[0]),
                flip_x: entry[1] & 0x80 != 0,
                flip_y: entry[1] & 0x40 != 0,
                color: u16::from(entry[1] & 0x0F) + 16 * palette_bank,
            })
            .collect()
    }

    pub(crate) fn move_unserializable_fields_from(&mut self, other: Self) {
        self.address_space
            .move_unserializable_fields_from(other.address_space);
        self.char_gfx = other.char_gfx;
        self.sprite_gfx = other.sprite_gfx;
    }
}

impl MemoryBus for Mario {
    fn read(&self, address: u16) -> u8 {
        match self.address_space.read(address) {
            ReadOutcome::Value(value) => value,
            ReadOutcome::Handler(HandlerCall { id, offset }) => match id {
                MarioHandler::In0 => self.inputs.get(0),
                MarioHandler::In1 => self.inputs.get(1),
                MarioHandler::Dsw => self.inputs.get(2),
                MarioHandler::VideoRam | MarioHandler::Latch(_) => {
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
            MarioHandler::VideoRam => {
                self.address_space.poke(address, value);
                self.background
                    .write_tile_index(usize::from(offset), u16::from(value));
            }
            MarioHandler::Latch(register) => self.write_latch(register, value),
            MarioHandler::In0 | MarioHandler::In1 | MarioHandler::Dsw => {
                log::debug!("write to input port {id:?}: {value:02X}");
            }
        }
    }
}

impl Machine for Mario {
    fn kind(&self) -> MachineKind {
        MachineKind::Mario
    }

    fn set_input_port(&mut self, index: usize, value: u8) {
        if index < crate::machine::INPUT_PORT_COUNT {
            self.inputs.set(index, value);
        }
    }

    fn vblank(&mut self) -> Option<Interrupt> {
        self.registers
            .is_set(MarioRegister::NmiEnable, 0x01)
            .then_some(Interrupt::Nmi)
    }

    fn render_frame(&mut self) {
        let gfx_bank = self.gfx_bank();
        let palette_bank = self.palette_bank();
        self.background.render(&self.char_gfx, |cell: TileCell| TileInfo {
            code: usize::from(cell.tile_index) + 256 * usize::from(gfx_bank),
            color: (cell.tile_index >> 5) + 8 * palette_bank,
            opaque: true,
        });

        let scroll = self.registers.read(MarioRegister::Scroll);
        self.background
            .set_scroll(0, scroll.wrapping_add(SCROLL_Y_OFFSET));

        let orientation = self
            .orientation
            .flipped(self.registers.is_set(MarioRegister::FlipScreen, 0x01));
        self.background.composite(&mut self.frame, orientation);

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
