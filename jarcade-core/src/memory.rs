pub mod address;
pub mod registers;

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

pub use registers::{LatchWrite, ReadMux, Register, RegisterBank, RegisterCell};

/// Value the data bus floats to when nothing drives it.
pub const UNMAPPED_VALUE: u8 = 0xFF;

pub const ADDRESS_SPACE_SIZE: usize = 0x10000;

/// What a decoded address range is backed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RangeKind<H> {
    Rom,
    Ram,
    Handler(H),
    // Decoded but deliberately ignored
    Nop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRange<H> {
    pub start: u16,
    pub end_inclusive: u16,
    pub kind: RangeKind<H>,
}

impl<H> AddressRange<H> {
    pub const fn new(start: u16, end_inclusive: u16, kind: RangeKind<H>) -> Self {
        Self {
            start,
            end_inclusive,
            kind,
        }
    }

    pub fn contains(&self, address: u16) -> bool {
        (self.start..=self.end_inclusive).contains(&address)
    }
}

/// A handler invocation produced by address resolution; `offset` is relative to the start of the
/// matched range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerCall<H> {
    pub id: H,
    pub offset: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access<H> {
    // Index into the flat backing store
    Memory(usize),
    Handler(HandlerCall<H>),
    Ignored,
    Unmapped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome<H> {
    Value(u8),
    Handler(HandlerCall<H>),
}

/// The memory-mapped view of one CPU: ordered read and write decode tables over a flat 64KB
/// backing store.
///
/// Ranges are scanned in declaration order and the first match wins, so a narrow range declared
/// ahead of a wider one shadows that part of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct AddressSpace<H: 'static> {
    #[serde(skip)]
    read_map: &'static [AddressRange<H>],
    #[serde(skip)]
    write_map: &'static [AddressRange<H>],
    memory: Vec<u8>,
}

impl<H: Copy + Debug + 'static> AddressSpace<H> {
    pub fn new(read_map: &'static [AddressRange<H>], write_map: &'static [AddressRange<H>]) -> Self {
        Self {
            read_map,
            write_map,
            memory: vec![0; ADDRESS_SPACE_SIZE],
        }
    }

    /// Copy ROM contents into the backing store starting at the given address.
    ///
    /// # Panics
    ///
    /// Panics if the data would run past the end of the 16-bit address space.
    pub fn load_rom(&mut self, start: u16, data: &[u8]) {
        let start = usize::from(start);
        assert!(
            start + data.len() <= ADDRESS_SPACE_SIZE,
            "ROM of {} bytes does not fit at {start:04X}",
            data.len()
        );

        self.memory[start..start + data.len()].copy_from_slice(data);
    }

    pub fn resolve_read(&self, address: u16) -> Access<H> {
        resolve(self.read_map, address, false)
    }

    pub fn resolve_write(&self, address: u16) -> Access<H> {
        resolve(self.write_map, address, true)
    }

    /// Perform a read. Flat ranges are served directly; handler ranges are returned to the caller
    /// to dispatch.
    pub fn read(&self, address: u16) -> ReadOutcome<H> {
        match self.resolve_read(address) {
            Access::Memory(index) => ReadOutcome::Value(self.memory[index]),
            Access::Handler(call) => ReadOutcome::Handler(call),
            Access::Ignored => ReadOutcome::Value(UNMAPPED_VALUE),
            Access::Unmapped => {
                log::debug!("read from unmapped address {address:04X}");
                ReadOutcome::Value(UNMAPPED_VALUE)
            }
        }
    }

    /// Perform a write. Returns the handler to dispatch to if the address is handler-mapped.
    pub fn write(&mut self, address: u16, value: u8) -> Option<HandlerCall<H>> {
        match self.resolve_write(address) {
            Access::Memory(index) => {
                self.memory[index] = value;
                None
            }
            Access::Handler(call) => Some(call),
            Access::Ignored => {
                log::trace!("ignored write to {address:04X}: {value:02X}");
                None
            }
            Access::Unmapped => {
                log::debug!("write to unmapped address {address:04X}: {value:02X}");
                None
            }
        }
    }

    /// Raw access to the backing store, bypassing decode. Handlers use this for the storage that
    /// sits behind their range.
    pub fn peek(&self, address: u16) -> u8 {
        self.memory[usize::from(address)]
    }

    pub fn poke(&mut self, address: u16, value: u8) {
        self.memory[usize::from(address)] = value;
    }

    /// Borrow a contiguous block of the backing store, e.g. sprite RAM for a frame render.
    pub fn slice(&self, start: u16, len: usize) -> &[u8] {
        let start = usize::from(start);
        &self.memory[start..start + len]
    }

    pub(crate) fn move_unserializable_fields_from(&mut self, other: Self) {
        self.read_map = other.read_map;
        self.write_map = other.write_map;
    }
}

fn resolve<H: Copy>(ranges: &[AddressRange<H>], address: u16, is_write: bool) -> Access<H> {
    let Some(range) = ranges.iter().find(|range| range.contains(address)) else {
        return Access::Unmapped;
    };

    match range.kind {
        RangeKind::Ram => Access::Memory(usize::from(address)),
        RangeKind::Rom => {
            if is_write {
                Access::Ignored
            } else {
                Access::Memory(usize::from(address))
            }
        }
        RangeKind::Handler(id) => Access::Handler(HandlerCall {
            id,
            offset: address - range.start,
        }),
        RangeKind::Nop => Access::Ignored,
    }
}

/// The interface an (external) CPU core drives.
pub trait MemoryBus {
    fn read(&self, address: u16) -> u8;

    fn write(&mut self, address: u16, value: u8);

    /// Read from the separate I/O port space. Boards without one float the bus.
    fn read_io(&self, port: u16) -> u8 {
        log::debug!("read from unmapped I/O port {port:04X}");
        UNMAPPED_VALUE
    }

    fn write_io(&mut self, port: u16, value: u8) {
        log::debug!("write to unmapped I/O port {port:04X}: {value:02X}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum TestHandler {
        Narrow,
        Wide,
    }

    static READ_MAP: &[AddressRange<TestHandler>] = &[
        AddressRange::new(0x0000, 0x3FFF, RangeKind::Rom),
        AddressRange::new(0x8010, 0x801F, RangeKind::Handler(TestHandler::Narrow)),
        AddressRange::new(0x8000, 0x80FF, RangeKind::Ram),
        AddressRange::new(0x9000, 0x90FF, RangeKind::Handler(TestHandler::Wide)),
    ];

    static WRITE_MAP: &[AddressRange<TestHandler>] = &[
        AddressRange::new(0x0000, 0x3FFF, RangeKind::Rom),
        AddressRange::new(0x8000, 0x80FF, RangeKind::Ram),
        // Never reached, the RAM range above covers it
        AddressRange::new(0x8010, 0x801F, RangeKind::Handler(TestHandler::Narrow)),
        AddressRange::new(0x9000, 0x90FF, RangeKind::Handler(TestHandler::Wide)),
        AddressRange::new(0xA000, 0xA0FF, RangeKind::Nop),
    ];

    fn address_space() -> AddressSpace<TestHandler> {
        let mut address_space = AddressSpace::new(READ_MAP, WRITE_MAP);
        address_space.load_rom(0x0000, &[0x12, 0x34, 0x56]);
        address_space
    }

    #[test]
    fn ram_round_trip() {
        let mut address_space = address_space();

        for address in [0x8000, 0x8005, 0x80FF] {
            assert_eq!(None, address_space.write(address, 0x5A));
            assert_eq!(ReadOutcome::Value(0x5A), address_space.read(address));
        }
    }

    #[test]
    fn rom_is_read_only() {
        let mut address_space = address_space();

        assert_eq!(ReadOutcome::Value(0x34), address_space.read(0x0001));
        assert_eq!(None, address_space.write(0x0001, 0xFF));
        assert_eq!(ReadOutcome::Value(0x34), address_space.read(0x0001));
    }

    #[test]
    fn first_match_wins() {
        let mut address_space = address_space();

        // Read table declares the narrow handler ahead of RAM
        assert_eq!(
            ReadOutcome::Handler(HandlerCall {
                id: TestHandler::Narrow,
                offset: 0x05
            }),
            address_space.read(0x8015)
        );
        assert_eq!(ReadOutcome::Value(0x00), address_space.read(0x8020));

        // Write table declares RAM first, so the narrow handler is shadowed
        assert_eq!(None, address_space.write(0x8015, 0x77));
        assert_eq!(0x77, address_space.peek(0x8015));
    }

    #[test]
    fn handler_offsets() {
        let mut address_space = address_space();

        assert_eq!(
            Some(HandlerCall {
                id: TestHandler::Wide,
                offset: 0x00
            }),
            address_space.write(0x9000, 0x01)
        );
        assert_eq!(
            Some(HandlerCall {
                id: TestHandler::Wide,
                offset: 0xFF
            }),
            address_space.write(0x90FF, 0x01)
        );
    }

    #[test]
    fn unmapped_and_nop() {
        let mut address_space = address_space();

        assert_eq!(ReadOutcome::Value(UNMAPPED_VALUE), address_space.read(0xF000));
        assert_eq!(None, address_space.write(0xF000, 0x12));
        assert_eq!(0x00, address_space.peek(0xF000));

        assert_eq!(Access::Ignored, address_space.resolve_write(0xA010));
        assert_eq!(None, address_space.write(0xA010, 0x12));
        assert_eq!(0x00, address_space.peek(0xA010));
    }
}
