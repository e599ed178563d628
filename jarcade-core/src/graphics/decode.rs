use thiserror::Error;

/// Size of the blitter machine's graphics ROM region.
pub const BLITTER_GFX_SIZE: usize = 0x8000;

/// Distance between the two bytes of a source pair.
pub const BLITTER_GFX_HALF: usize = 0x4000;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum GfxDecodeError {
    #[error("blitter graphics ROM must be exactly {expected} bytes, was {actual}")]
    BlitterRomSize { expected: usize, actual: usize },
    #[error("graphics ROM too small for layout: need {required} bytes, have {actual}")]
    RomTooSmall { required: usize, actual: usize },
}

/// Reassemble 4 pixels from a wire-order byte pair.
///
/// Pixel k (k = 0 for the leftmost pixel) is spread across the pair: bit k and bit k+4 of the
/// first byte are nibble bits 0 and 1, bit k and bit k+4 of the second byte are nibble bits 2
/// and 3. Pixels 0 and 1 are packed into the first byte and pixels 2 and 3 into the second, the
/// left pixel of each in the low nibble.
pub fn decode_pair(v1: u8, v2: u8) -> (u8, u8) {
    let mut pixels = [0_u8; 4];
    for (bit, pixel) in pixels.iter_mut().enumerate() {
        *pixel = ((v1 >> bit) & 0x01)
            | (((v1 >> (bit + 4)) & 0x01) << 1)
            | (((v2 >> bit) & 0x01) << 2)
            | (((v2 >> (bit + 4)) & 0x01) << 3);
    }

    ((pixels[1] << 4) | pixels[0], (pixels[3] << 4) | pixels[2])
}

/// Convert the blitter graphics ROM from its wire layout to nibble-packed pixels, in place.
///
/// This must run exactly once on a given buffer; running it on already-decoded data scrambles
/// it. Prefer [`RawGraphicsRom::decode`], which makes a second decode impossible.
pub fn decode_in_place(rom: &mut [u8; BLITTER_GFX_SIZE]) {
    let (low, high) = rom.split_at_mut(BLITTER_GFX_HALF);
    for (v1, v2) in low.iter_mut().zip(high.iter_mut()) {
        (*v1, *v2) = decode_pair(*v1, *v2);
    }
}

/// Blitter graphics ROM as loaded, still in wire order.
#[derive(Debug, Clone)]
pub struct RawGraphicsRom(Box<[u8; BLITTER_GFX_SIZE]>);

impl RawGraphicsRom {
    pub fn new(data: Vec<u8>) -> Result<Self, GfxDecodeError> {
        let actual = data.len();
        let data: Box<[u8; BLITTER_GFX_SIZE]> =
            data.into_boxed_slice()
                .try_into()
                .map_err(|_| GfxDecodeError::BlitterRomSize {
                    expected: BLITTER_GFX_SIZE,
                    actual,
                })?;

        Ok(Self(data))
    }

    /// Consume the raw image and produce the nibble-packed image the blitter reads.
    pub fn decode(self) -> DecodedGraphicsRom {
        let mut data = self.0;
        decode_in_place(&mut data);

        log::debug!("decoded {BLITTER_GFX_SIZE} bytes of blitter graphics");

        DecodedGraphicsRom(data)
    }
}

/// Blitter graphics ROM after decoding: each byte holds two 4-bit pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedGraphicsRom(Box<[u8; BLITTER_GFX_SIZE]>);

impl DecodedGraphicsRom {
    /// The decoded byte pair for a 16-bit blitter source address. Only the low 14 bits select a
    /// pair.
    pub fn byte_pair(&self, source: u16) -> (u8, u8) {
        let index = usize::from(source) & (BLITTER_GFX_HALF - 1);
        (self.0[index], self.0[index + BLITTER_GFX_HALF])
    }

    /// The 4 pixel nibbles for a source address, leftmost first.
    pub fn pixels(&self, source: u16) -> [u8; 4] {
        let (val, val2) = self.byte_pair(source);
        [val & 0x0F, val >> 4, val2 & 0x0F, val2 >> 4]
    }
}

impl Default for DecodedGraphicsRom {
    fn default() -> Self {
        Self(Box::new([0; BLITTER_GFX_SIZE]))
    }
}

/// Inverse of [`decode_pair`] over unpacked pixels, for building fixtures.
#[cfg(test)]
pub(crate) fn encode_pixels(pixels: [u8; 4]) -> (u8, u8) {
    let mut v1 = 0;
    let mut v2 = 0;
    for (bit, nibble) in pixels.into_iter().enumerate() {
        v1 |= (nibble & 0x01) << bit;
        v1 |= ((nibble >> 1) & 0x01) << (bit + 4);
        v2 |= ((nibble >> 2) & 0x01) << bit;
        v2 |= ((nibble >> 3) & 0x01) << (bit + 4);
    }
    (v1, v2)
}

/// Description of how tiles or sprites are laid out in a bitplane ROM. Offsets are in bits,
/// bit 0 being the most significant bit of the first byte. The first plane supplies the most
/// significant bit of each pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GfxLayout {
    pub width: usize,
    pub height: usize,
    pub count: usize,
    pub plane_offsets: &'static [usize],
    pub x_offsets: &'static [usize],
    pub y_offsets: &'static [usize],
    // Bits between consecutive elements
    pub increment: usize,
}

impl GfxLayout {
    pub fn planes(&self) -> usize {
        self.plane_offsets.len()
    }

    /// Smallest ROM size in bytes that holds every element of the layout.
    pub fn required_bytes(&self) -> usize {
        if self.count == 0 {
            return 0;
        }

        let max = |offsets: &[usize]| offsets.iter().copied().max().unwrap_or(0);
        let last_bit = (self.count - 1) * self.increment
            + max(self.plane_offsets)
            + max(self.x_offsets)
            + max(self.y_offsets);
        last_bit / 8 + 1
    }
}

/// A decoded set of tiles or sprites, one byte per pixel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GfxElement {
    width: usize,
    height: usize,
    count: usize,
    planes: usize,
    pixels: Vec<u8>,
}

impl GfxElement {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Number of pens each colour code spans.
    pub fn colors(&self) -> u16 {
        1 << self.planes
    }

    /// Pixel value of an element; codes beyond the set wrap around. An empty set reads as
    /// transparent.
    pub fn pixel(&self, code: usize, x: usize, y: usize) -> u8 {
        if self.count == 0 {
            return 0;
        }

        let code = code % self.count;
        self.pixels[(code * self.height + y) * self.width + x]
    }
}

fn read_bit(rom: &[u8], bit: usize) -> bool {
    rom[bit / 8] & (0x80 >> (bit % 8)) != 0
}

/// Decode every element of a bitplane ROM according to the layout.
pub fn decode_gfx(layout: &GfxLayout, rom: &[u8]) -> Result<GfxElement, GfxDecodeError> {
    let required = layout.required_bytes();
    if rom.len() < required {
        return Err(GfxDecodeError::RomTooSmall {
            required,
            actual: rom.len(),
        });
    }

    let planes = layout.planes();
    let mut pixels = Vec::with_capacity(layout.count * layout.width * layout.height);
    for code in 0..layout.count {
        let base = code * layout.increment;
        for &y_offset in layout.y_offsets {
            for &x_offset in layout.x_offsets {
                let mut pixel = 0;
                for (plane, &plane_offset) in layout.plane_offsets.iter().enumerate() {
                    if read_bit(rom, base + plane_offset + y_offset + x_offset) {
                        pixel |= 1 << (planes - 1 - plane);
                    }
                }
                pixels.push(pixel);
            }
        }
    }

    Ok(GfxElement {
        width: layout.width,
        height: layout.height,
        count: layout.count,
        planes,
        pixels,
    })
}
