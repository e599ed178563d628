use crate::graphics::decode::DecodedGraphicsRom;
use crate::graphics::{DirtyRect, FramePlane, Orientation, SCREEN_HEIGHT, SCREEN_WIDTH};
use crate::serialize::{deserialize_array, serialize_array};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

pub const WINDOW_SIZE: usize = 0x80;

/// A write to a window offset with `offset & 7 == FIRE_OFFSET` starts a blit.
pub const FIRE_OFFSET: usize = 6;
pub const COMMAND_LEN: usize = FIRE_OFFSET + 1;

/// Source nibble that leaves the destination pixel untouched.
pub const TRANSPARENT_NIBBLE: u8 = 8;

// Plane mask bits
pub const PLANE_A: u8 = 0x01;
pub const PLANE_B: u8 = 0x04;

// Direct video RAM sub-channel selector bits, read from window offset 0
const SELECT_A_HIGH: u8 = 0x01;
const SELECT_A_LOW: u8 = 0x02;
const SELECT_B_HIGH: u8 = 0x04;
const SELECT_B_LOW: u8 = 0x08;

/// A blitter command as decoded from the register window at fire time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlitCommand {
    pub plane_mask: u8,
    pub source_offset: u16,
    /// Destination X in pixels; always a multiple of 4.
    pub dest_x: u8,
    pub dest_y: u8,
    /// Columns to copy minus one, in 4-pixel units.
    pub width: u8,
    /// Rows to copy minus one.
    pub height: u8,
}

impl BlitCommand {
    pub fn from_registers(registers: [u8; COMMAND_LEN]) -> Self {
        let [plane_mask, source_lsb, source_msb, dest_y, dest_x, height, width] = registers;
        Self {
            plane_mask,
            source_offset: u16::from_le_bytes([source_lsb, source_msb]),
            dest_y,
            // Each source byte pair covers 4 horizontal pixels
            dest_x: dest_x << 2,
            height,
            width,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlitterState {
    #[default]
    Idle,
    /// Bytes written since the last blit fired.
    Accumulating(u8),
}

// Data byte -> the 2-bit value of each of its 4 pixels: bit k is the low bit and bit k+4 the high
// bit of pixel k
static SUB_CHANNELS: Lazy<[[u8; 4]; 256]> = Lazy::new(|| {
    let mut table = [[0; 4]; 256];
    for (data, pixels) in (0..=u8::MAX).zip(table.iter_mut()) {
        for (k, pixel) in pixels.iter_mut().enumerate() {
            *pixel = (((data >> (4 + k)) & 0x01) << 1) | ((data >> k) & 0x01);
        }
    }
    table
});

/// The blitter machine's video hardware: a 128-byte command window, two 4-bit pixel planes, and
/// the direct video RAM path into the same planes.
///
/// Planes are stored in destination (post-orientation) coordinates. Every pixel write grows the
/// dirty rectangle, which the frame composer consumes with [`Self::take_dirty`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlitterEngine {
    #[serde(
        serialize_with = "serialize_array",
        deserialize_with = "deserialize_array"
    )]
    window: [u8; WINDOW_SIZE],
    plane_a: FramePlane<u8>,
    plane_b: FramePlane<u8>,
    orientation: Orientation,
    dirty: Option<DirtyRect>,
    state: BlitterState,
}

impl BlitterEngine {
    pub fn new(orientation: Orientation) -> Self {
        let (width, height) = orientation.output_size(SCREEN_WIDTH, SCREEN_HEIGHT);
        Self {
            window: [0; WINDOW_SIZE],
            plane_a: FramePlane::new(width, height),
            plane_b: FramePlane::new(width, height),
            orientation,
            dirty: None,
            state: BlitterState::Idle,
        }
    }

    /// Store a byte in the register window and, if it landed on a fire offset, run the blit
    /// described by the 7 bytes ending at that offset.
    ///
    /// The blit fires whether or not the other 6 bytes were written since the last blit; stale
    /// values left in the window are reused as-is. Games rely on this to repeat a blit by
    /// rewriting only the bytes that change.
    pub fn write_register(
        &mut self,
        offset: u16,
        value: u8,
        gfx: &DecodedGraphicsRom,
    ) -> Option<BlitCommand> {
        let offset = usize::from(offset) % WINDOW_SIZE;
        self.window[offset] = value;

        if offset & 0x07 != FIRE_OFFSET {
            self.state = match self.state {
                BlitterState::Idle => BlitterState::Accumulating(1),
                BlitterState::Accumulating(written) => {
                    BlitterState::Accumulating(written.saturating_add(1))
                }
            };
            return None;
        }

        let start = offset - FIRE_OFFSET;
        let mut registers = [0; COMMAND_LEN];
        registers.copy_from_slice(&self.window[start..=offset]);
        let command = BlitCommand::from_registers(registers);

        log::trace!("blit at window offset {start:02X}: {command:?}");

        self.execute(command, gfx);
        self.state = BlitterState::Idle;

        Some(command)
    }

    pub fn read_register(&self, offset: u16) -> u8 {
        self.window[usize::from(offset) % WINDOW_SIZE]
    }

    pub fn execute(&mut self, command: BlitCommand, gfx: &DecodedGraphicsRom) {
        let mut source = command.source_offset;
        let mut x = command.dest_x;
        for _ in 0..=command.width {
            for row in 0..=command.height {
                let y = command.dest_y.wrapping_add(row);
                self.blit_byte(x, y, gfx.pixels(source), command.plane_mask);
                source = source.wrapping_add(1);
            }
            x = x.wrapping_add(4);
        }
    }

    fn blit_byte(&mut self, x: u8, y: u8, pixels: [u8; 4], plane_mask: u8) {
        if plane_mask & (PLANE_A | PLANE_B) == 0 {
            return;
        }

        for (k, nibble) in pixels.into_iter().enumerate() {
            if nibble == TRANSPARENT_NIBBLE {
                continue;
            }

            let (dx, dy) = self.destination(usize::from(x) + k, usize::from(y));
            if plane_mask & PLANE_A != 0 {
                self.plane_a.set(dx, dy, nibble);
            }
            if plane_mask & PLANE_B != 0 {
                self.plane_b.set(dx, dy, nibble);
            }
            DirtyRect::include(&mut self.dirty, dx, dy);
        }
    }

    /// Handle a CPU write into the bitmap window. Each byte covers 4 horizontal pixels and
    /// updates only the 2-bit sub-channels selected by window offset 0, leaving the other bits of
    /// each pixel intact.
    pub fn write_video_ram(&mut self, offset: u16, data: u8) {
        let selector = self.window[0];
        if selector & (SELECT_A_HIGH | SELECT_A_LOW | SELECT_B_HIGH | SELECT_B_LOW) == 0 {
            log::trace!("video RAM write {offset:04X} with no sub-channel selected");
            return;
        }

        let x = usize::from((offset >> 8) & 0x3F) << 2;
        let y = usize::from(offset & 0xFF);

        for (k, &value) in SUB_CHANNELS[usize::from(data)].iter().enumerate() {
            let (dx, dy) = self.destination(x + k, y);

            if selector & (SELECT_A_HIGH | SELECT_A_LOW) != 0 {
                merge_sub_channels(self.plane_a.get_mut(dx, dy), selector, value);
            }
            if selector & (SELECT_B_HIGH | SELECT_B_LOW) != 0 {
                merge_sub_channels(self.plane_b.get_mut(dx, dy), selector >> 2, value);
            }
            DirtyRect::include(&mut self.dirty, dx, dy);
        }
    }

    fn destination(&self, x: usize, y: usize) -> (usize, usize) {
        self.orientation.transform(x, y, SCREEN_WIDTH, SCREEN_HEIGHT)
    }

    pub fn plane_a(&self) -> &FramePlane<u8> {
        &self.plane_a
    }

    pub fn plane_b(&self) -> &FramePlane<u8> {
        &self.plane_b
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn state(&self) -> BlitterState {
        self.state
    }

    /// Return and clear the area written since the last call.
    pub fn take_dirty(&mut self) -> Option<DirtyRect> {
        self.dirty.take()
    }

    /// Mark the whole screen for recomposition, e.g. after loading a save state.
    pub fn mark_all_dirty(&mut self) {
        self.dirty = Some(DirtyRect {
            min_x: 0,
            min_y: 0,
            max_x: self.plane_a.width() - 1,
            max_y: self.plane_a.height() - 1,
        });
    }
}

// `selector` bit 0 picks the high sub-channel (bits 3-2), bit 1 the low one (bits 1-0)
fn merge_sub_channels(pixel: &mut u8, selector: u8, value: u8) {
    if selector & 0x01 != 0 {
        *pixel = (*pixel & !0x0C) | (value << 2);
    }
    if selector & 0x02 != 0 {
        *pixel = (*pixel & !0x03) | value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::decode::{encode_pixels, RawGraphicsRom, BLITTER_GFX_HALF, BLITTER_GFX_SIZE};
    use crate::graphics::{compose_blitter_planes, PLANE_B_PEN_BASE};
    use rand::Rng;

    fn gfx_with(sources: &[(usize, [u8; 4])]) -> DecodedGraphicsRom {
        let mut raw = vec![0; BLITTER_GFX_SIZE];
        for &(source, pixels) in sources {
            let (v1, v2) = encode_pixels(pixels);
            raw[source] = v1;
            raw[source + BLITTER_GFX_HALF] = v2;
        }
        RawGraphicsRom::new(raw).expect("fixture is full size").decode()
    }

    fn issue(
        engine: &mut BlitterEngine,
        gfx: &DecodedGraphicsRom,
        base: u16,
        registers: [u8; COMMAND_LEN],
    ) -> Option<BlitCommand> {
        let mut fired = None;
        for (offset, value) in (base..).zip(registers) {
            fired = engine.write_register(offset, value, gfx);
        }
        fired
    }

    fn count_nonzero(plane: &FramePlane<u8>) -> usize {
        plane.pixels().iter().filter(|&&pixel| pixel != 0).count()
    }

    #[test]
    fn single_pixel_plane_a() {
        let gfx = gfx_with(&[(0, [0x3, 0x0, 0x0, 0x0])]);
        let mut engine = BlitterEngine::new(Orientation::IDENTITY);

        let command = issue(&mut engine, &gfx, 0, [PLANE_A, 0, 0, 0, 0, 0, 0]);

        assert_eq!(
            Some(BlitCommand {
                plane_mask: PLANE_A,
                source_offset: 0,
                dest_x: 0,
                dest_y: 0,
                width: 0,
                height: 0,
            }),
            command
        );
        assert_eq!(0x3, engine.plane_a().get(0, 0));
        assert_eq!(1, count_nonzero(engine.plane_a()));
        assert_eq!(0, count_nonzero(engine.plane_b()));
        assert_eq!(BlitterState::Idle, engine.state());
    }

    #[test]
    fn command_fields() {
        assert_eq!(
            BlitCommand {
                plane_mask: 0x05,
                source_offset: 0x1234,
                dest_x: 0x0C,
                dest_y: 0x40,
                width: 0x02,
                height: 0x07,
            },
            BlitCommand::from_registers([0x05, 0x34, 0x12, 0x40, 0x03, 0x07, 0x02])
        );

        // Destination X wraps within a byte
        assert_eq!(
            0xFC,
            BlitCommand::from_registers([0, 0, 0, 0, 0xFF, 0, 0]).dest_x
        );
    }

    #[test]
    fn blit_covers_columns_and_rows() {
        let gfx = gfx_with(&[
            (0x10, [1, 2, 3, 4]),
            (0x11, [5, 6, 7, 9]),
            (0x12, [10, 11, 12, 13]),
            (0x13, [14, 15, 1, 2]),
        ]);
        let mut engine = BlitterEngine::new(Orientation::IDENTITY);

        // 2 columns x 2 rows starting at (8, 20); source advances down each column first
        issue(&mut engine, &gfx, 0x08, [PLANE_B, 0x10, 0x00, 20, 2, 1, 1]);

        let plane = engine.plane_b();
        assert_eq!(&[1, 2, 3, 4, 10, 11, 12, 13], &plane.row(20)[8..16]);
        assert_eq!(&[5, 6, 7, 9, 14, 15, 1, 2], &plane.row(21)[8..16]);
        assert_eq!(0, count_nonzero(engine.plane_a()));
        assert_eq!(
            Some(DirtyRect {
                min_x: 8,
                min_y: 20,
                max_x: 15,
                max_y: 21
            }),
            engine.take_dirty()
        );
        assert_eq!(None, engine.take_dirty());
    }

    #[test]
    fn inert_plane_mask() {
        let gfx = gfx_with(&[(0, [1, 2, 3, 4])]);
        let mut engine = BlitterEngine::new(Orientation::IDENTITY);

        // Only bits 0x01 and 0x04 select planes
        let command = issue(&mut engine, &gfx, 0, [0xFA, 0, 0, 0, 0, 0, 0]);

        assert!(command.is_some());
        assert_eq!(0, count_nonzero(engine.plane_a()));
        assert_eq!(0, count_nonzero(engine.plane_b()));
        assert_eq!(None, engine.take_dirty());
    }

    #[test]
    fn transparent_nibble_sweep() {
        let mut rng = rand::thread_rng();

        for nibble in 0..16 {
            let fill = rng.gen_range(0..16);
            let fill = if fill == TRANSPARENT_NIBBLE { 0 } else { fill };
            let x = rng.gen_range(0..64_u8);
            let y = rng.gen_range(0..=u8::MAX);

            let gfx = gfx_with(&[(0, [fill; 4]), (1, [nibble; 4])]);
            let mut engine = BlitterEngine::new(Orientation::IDENTITY);

            issue(&mut engine, &gfx, 0, [PLANE_A | PLANE_B, 0, 0, y, x, 0, 0]);
            issue(&mut engine, &gfx, 0, [PLANE_A | PLANE_B, 1, 0, y, x, 0, 0]);

            let expected = if nibble == TRANSPARENT_NIBBLE {
                fill
            } else {
                nibble
            };
            for k in 0..4 {
                let dx = usize::from(x) * 4 + k;
                let dy = usize::from(y);
                assert_eq!(expected, engine.plane_a().get(dx, dy), "nibble {nibble}");
                assert_eq!(expected, engine.plane_b().get(dx, dy), "nibble {nibble}");
            }
        }
    }

    #[test]
    fn transparency_is_per_pixel() {
        let gfx = gfx_with(&[(0, [7, 7, 7, 7]), (1, [8, 1, 8, 2])]);
        let mut engine = BlitterEngine::new(Orientation::IDENTITY);

        issue(&mut engine, &gfx, 0, [PLANE_A, 0, 0, 0, 0, 0, 0]);
        issue(&mut engine, &gfx, 0, [PLANE_A, 1, 0, 0, 0, 0, 0]);

        assert_eq!(&[7, 1, 7, 2], &engine.plane_a().row(0)[..4]);
    }

    #[test]
    fn fires_with_stale_window_bytes() {
        // Intentional hardware quirk: writing only the fire offset repeats the last blit with
        // whatever else is in the window, even if the other bytes were never rewritten
        let gfx = gfx_with(&[(0, [1, 1, 1, 1]), (0x20, [2, 2, 2, 2])]);
        let mut engine = BlitterEngine::new(Orientation::IDENTITY);

        issue(&mut engine, &gfx, 0, [PLANE_A, 0, 0, 5, 1, 0, 0]);
        assert_eq!(1, engine.plane_a().get(4, 5));

        // New source only, then the fire byte
        assert_eq!(None, engine.write_register(1, 0x20, &gfx));
        assert_eq!(BlitterState::Accumulating(1), engine.state());
        let command = engine.write_register(6, 0, &gfx).expect("offset 6 fires");

        assert_eq!(0x20, command.source_offset);
        assert_eq!((4, 5), (command.dest_x, command.dest_y));
        assert_eq!(2, engine.plane_a().get(4, 5));
    }

    #[test]
    fn fires_only_on_offset_six_mod_eight() {
        let gfx = gfx_with(&[]);
        let mut engine = BlitterEngine::new(Orientation::IDENTITY);

        for offset in 0..WINDOW_SIZE as u16 {
            let fired = engine.write_register(offset, 0, &gfx).is_some();
            assert_eq!(offset % 8 == 6, fired, "offset {offset:02X}");
        }

        // Never-written command slots still fire, with all-zero parameters
        let mut engine = BlitterEngine::new(Orientation::IDENTITY);
        assert_eq!(
            Some(BlitCommand::from_registers([0; COMMAND_LEN])),
            engine.write_register(0x7E, 0, &gfx)
        );
        assert_eq!(0x00, engine.read_register(0x78));
    }

    #[test]
    fn oriented_blit_lands_on_transformed_pixel() {
        // Only the second pixel of the source is opaque, so the blit touches (5, 3) alone
        let gfx = gfx_with(&[(0, [8, 0xB, 8, 8])]);

        let cases = [
            ((false, false, false), (5, 3)),
            ((false, true, false), (250, 3)),
            ((false, false, true), (5, 252)),
            ((false, true, true), (250, 252)),
            ((true, false, false), (3, 5)),
            ((true, true, false), (252, 5)),
            ((true, false, true), (3, 250)),
            ((true, true, true), (252, 250)),
        ];

        for ((swap_xy, flip_x, flip_y), (x, y)) in cases {
            let orientation = Orientation {
                swap_xy,
                flip_x,
                flip_y,
            };
            let mut engine = BlitterEngine::new(orientation);

            issue(&mut engine, &gfx, 0, [PLANE_A, 0, 0, 3, 1, 0, 0]);

            assert_eq!(0xB, engine.plane_a().get(x, y), "{orientation:?}");
            assert_eq!(1, count_nonzero(engine.plane_a()), "{orientation:?}");
            assert_eq!(
                Some(DirtyRect::point(x, y)),
                engine.take_dirty(),
                "{orientation:?}"
            );
        }
    }

    #[test]
    fn video_ram_merges_sub_channels() {
        let gfx = gfx_with(&[(0, [0xF, 0xF, 0xF, 0xF])]);
        let mut engine = BlitterEngine::new(Orientation::IDENTITY);
        issue(&mut engine, &gfx, 0, [PLANE_A | PLANE_B, 0, 0, 0x10, 2, 0, 0]);
        engine.take_dirty();

        // Offset 0x0210 -> x = 2 * 4 = 8, y = 0x10
        // Data 0x21: pixel 0 low bit, pixel 1 high bit
        engine.write_register(0, SELECT_A_LOW, &gfx);
        engine.write_video_ram(0x0210, 0x21);

        assert_eq!(&[0xD, 0xE, 0xC, 0xC], &engine.plane_a().row(0x10)[8..12]);
        assert_eq!(&[0xF, 0xF, 0xF, 0xF], &engine.plane_b().row(0x10)[8..12]);

        engine.write_register(0, SELECT_B_HIGH, &gfx);
        engine.write_video_ram(0x0210, 0x84);

        // Pixel 2 low bit, pixel 3 high bit, into bits 3-2
        assert_eq!(&[0x3, 0x3, 0x7, 0xB], &engine.plane_b().row(0x10)[8..12]);
        assert_eq!(&[0xD, 0xE, 0xC, 0xC], &engine.plane_a().row(0x10)[8..12]);

        assert_eq!(
            Some(DirtyRect {
                min_x: 8,
                min_y: 0x10,
                max_x: 11,
                max_y: 0x10
            }),
            engine.take_dirty()
        );
    }

    #[test]
    fn video_ram_without_selector_is_inert() {
        let mut engine = BlitterEngine::new(Orientation::IDENTITY);
        engine.write_video_ram(0x0000, 0xFF);

        assert_eq!(0, count_nonzero(engine.plane_a()));
        assert_eq!(0, count_nonzero(engine.plane_b()));
        assert_eq!(None, engine.take_dirty());
    }

    #[test]
    fn two_overlapping_blits_then_sub_channel_write() {
        // 16-byte fixture: 8 source pairs at 0x0000-0x0007 and 0x4000-0x4007, written raw.
        // Pixel k takes first-byte bits k and k + 4, then second-byte bits k and k + 4.
        let mut raw = vec![0; BLITTER_GFX_SIZE];
        // [1, 2, 3, 4]
        raw[0x0000] = 0x65;
        raw[0x4000] = 0x08;
        // [5, 8, 6, 7]
        raw[0x0001] = 0xC9;
        raw[0x4001] = 0x2D;
        // [9, 10, 11, 12]
        raw[0x0002] = 0x65;
        raw[0x4002] = 0xF8;
        // [8, 8, 13, 14]
        raw[0x0003] = 0x84;
        raw[0x4003] = 0xFC;
        let gfx = RawGraphicsRom::new(raw).expect("fixture is full size").decode();
        let mut engine = BlitterEngine::new(Orientation::IDENTITY);

        // Plane B: 1 column x 2 rows at (0, 0) from source 0
        issue(&mut engine, &gfx, 0x00, [PLANE_B, 0, 0, 0, 0, 1, 0]);
        // Plane A: 2 columns x 1 row at (0, 1) from source 2, overlapping the second row
        issue(&mut engine, &gfx, 0x08, [PLANE_A, 2, 0, 1, 0, 0, 1]);

        assert_eq!(&[1, 2, 3, 4, 0, 0, 0, 0], &engine.plane_b().row(0)[..8]);
        assert_eq!(&[5, 0, 6, 7, 0, 0, 0, 0], &engine.plane_b().row(1)[..8]);
        assert_eq!(&[0; 8], &engine.plane_a().row(0)[..8]);
        assert_eq!(&[9, 10, 11, 12, 0, 0, 13, 14], &engine.plane_a().row(1)[..8]);

        // Plane A's low sub-channel at (0..4, 1), where plane B already holds pixels.
        // 0x22 sets bits 1 and 5, so pixel 1 gets 0b11 and the rest get 0b00.
        engine.write_register(0, SELECT_A_LOW, &gfx);
        engine.write_video_ram(0x0001, 0x22);

        assert_eq!(&[8, 11, 8, 12], &engine.plane_a().row(1)[..4]);
        assert_eq!(&[5, 0, 6, 7], &engine.plane_b().row(1)[..4]);

        let rect = engine.take_dirty().expect("pixels were written");
        assert_eq!(
            DirtyRect {
                min_x: 0,
                min_y: 0,
                max_x: 7,
                max_y: 1
            },
            rect
        );

        let mut frame = FramePlane::new(SCREEN_WIDTH, SCREEN_HEIGHT);
        compose_blitter_planes(engine.plane_b(), engine.plane_a(), rect, &mut frame);

        let b = |value: u16| PLANE_B_PEN_BASE + value;
        assert_eq!(&[b(1), b(2), b(3), b(4), b(0), b(0), b(0), b(0)], &frame.row(0)[..8]);
        assert_eq!(&[8, 11, 8, 12, b(0), b(0), 13, 14], &frame.row(1)[..8]);
    }

    #[test]
    fn blit_and_video_ram_agree_on_pixel_order() {
        let mut raw = vec![0; BLITTER_GFX_SIZE];
        raw[0] = 0x01;
        raw[BLITTER_GFX_HALF] = 0x00;
        let gfx = RawGraphicsRom::new(raw).expect("fixture is full size").decode();

        let mut blitted = BlitterEngine::new(Orientation::IDENTITY);
        issue(&mut blitted, &gfx, 0, [PLANE_A, 0, 0, 0, 0, 0, 0]);

        let mut written = BlitterEngine::new(Orientation::IDENTITY);
        written.write_register(0, SELECT_A_LOW, &gfx);
        written.write_video_ram(0x0000, 0x01);

        // Bit 0 of the source byte is the leftmost pixel on both paths
        assert_eq!(&[1, 0, 0, 0], &blitted.plane_a().row(0)[..4]);
        assert_eq!(&[1, 0, 0, 0], &written.plane_a().row(0)[..4]);
    }
}
