use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// A named memory-mapped latch on one machine's board.
pub trait Register: Copy + Eq + Debug {
    /// Number of distinct latches; `index` must map every register into `0..COUNT`.
    const COUNT: usize;

    fn index(self) -> usize;

    /// The CPU address the latch is written through.
    fn address(self) -> u16;
}

/// Snapshot of a single latch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterCell {
    pub address: u16,
    pub last_written: u8,
}

/// Result of a latch write, for drivers that react to edges or changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatchWrite {
    pub previous: u8,
    pub value: u8,
}

impl LatchWrite {
    pub fn changed(self) -> bool {
        self.previous != self.value
    }

    /// Return whether any of the masked bits differ between the old and new value.
    pub fn changed_bits(self, mask: u8) -> bool {
        (self.previous ^ self.value) & mask != 0
    }

    pub fn rose(self, mask: u8) -> bool {
        self.previous & mask == 0 && self.value & mask != 0
    }
}

/// Routes reads of a latch to an alternate source while bits in another latch are set, the way
/// boards reuse a spare output bit to switch a data multiplexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadMux<R> {
    pub control: R,
    pub mask: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterBank<R> {
    latches: Vec<u8>,
    muxes: Vec<Option<ReadMux<R>>>,
}

impl<R: Register> RegisterBank<R> {
    pub fn new() -> Self {
        Self {
            latches: vec![0; R::COUNT],
            muxes: vec![None; R::COUNT],
        }
    }

    /// Store a byte in the given latch.
    pub fn write(&mut self, register: R, value: u8) -> LatchWrite {
        let latch = &mut self.latches[register.index()];
        let previous = *latch;
        *latch = value;

        log::trace!("{register:?} latch {previous:02X} -> {value:02X}");

        LatchWrite { previous, value }
    }

    /// Return the last byte written to the given latch, ignoring any multiplexer.
    pub fn read(&self, register: R) -> u8 {
        self.latches[register.index()]
    }

    /// Return whether any of the masked bits are set in the given latch.
    pub fn is_set(&self, register: R, mask: u8) -> bool {
        self.read(register) & mask != 0
    }

    pub fn cell(&self, register: R) -> RegisterCell {
        RegisterCell {
            address: register.address(),
            last_written: self.read(register),
        }
    }

    pub fn set_read_mux(&mut self, register: R, mux: ReadMux<R>) {
        self.muxes[register.index()] = Some(mux);
    }

    /// Return whether reads of the given latch currently go to the alternate source.
    pub fn alternate_selected(&self, register: R) -> bool {
        match self.muxes[register.index()] {
            Some(ReadMux { control, mask }) => self.is_set(control, mask),
            None => false,
        }
    }

    /// Read a latch through its multiplexer. While the control bits are set, `alternate` is
    /// consulted; if it has nothing to drive for this latch, the stored byte shows through.
    pub fn read_muxed(&self, register: R, alternate: impl FnOnce() -> Option<u8>) -> u8 {
        if self.alternate_selected(register) {
            if let Some(value) = alternate() {
                return value;
            }
        }

        self.read(register)
    }
}

impl<R: Register> Default for RegisterBank<R> {
    fn default() -> Self {
        Self::new()
    }
}
