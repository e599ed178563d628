use crate::graphics::decode::GfxElement;
use crate::graphics::{FramePlane, Orientation};
use serde::{Deserialize, Serialize};

pub const TILE_SIZE: usize = 8;

/// One video RAM cell as the CPU last wrote it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TileCell {
    pub tile_index: u16,
    pub attribute: u8,
    pub dirty: bool,
}

/// How a driver wants a cell drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileInfo {
    pub code: usize,
    pub color: u16,
    /// Draw pixel value 0 instead of leaving it transparent.
    pub opaque: bool,
}

/// A scrollable grid of 8x8 tiles with per-cell dirty tracking.
///
/// The layer keeps its own pixel buffer in native (unrotated) coordinates. `render` redraws only
/// the dirty cells into it; `composite` copies it, scrolled and oriented, into a frame. Pixels
/// left transparent by the last render are `None` and do not overwrite the frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileLayer {
    cols: usize,
    rows: usize,
    cells: Vec<TileCell>,
    pixmap: FramePlane<Option<u16>>,
    scroll_x: u8,
    scroll_y: u8,
}

impl TileLayer {
    /// Create a layer with every cell dirty, so the first render draws everything.
    pub fn new(cols: usize, rows: usize) -> Self {
        Self {
            cols,
            rows,
            cells: vec![
                TileCell {
                    dirty: true,
                    ..TileCell::default()
                };
                cols * rows
            ],
            pixmap: FramePlane::new(cols * TILE_SIZE, rows * TILE_SIZE),
            scroll_x: 0,
            scroll_y: 0,
        }
    }

    pub fn width(&self) -> usize {
        self.cols * TILE_SIZE
    }

    pub fn height(&self) -> usize {
        self.rows * TILE_SIZE
    }

    pub fn cell(&self, index: usize) -> TileCell {
        self.cells[index]
    }

    /// Store a tile code; the cell is only marked dirty if the code changed. Returns whether it
    /// did.
    pub fn write_tile_index(&mut self, index: usize, tile_index: u16) -> bool {
        let cell = &mut self.cells[index];
        if cell.tile_index == tile_index {
            return false;
        }

        cell.tile_index = tile_index;
        cell.dirty = true;
        true
    }

    /// Store an attribute byte, with the same compare-before-dirty rule as tile codes.
    pub fn write_attribute(&mut self, index: usize, attribute: u8) -> bool {
        let cell = &mut self.cells[index];
        if cell.attribute == attribute {
            return false;
        }

        cell.attribute = attribute;
        cell.dirty = true;
        true
    }

    pub fn mark_dirty(&mut self, index: usize) {
        self.cells[index].dirty = true;
    }

    /// Invalidate the whole layer, e.g. when a bank latch changes what every code means.
    pub fn mark_all_dirty(&mut self) {
        for cell in &mut self.cells {
            cell.dirty = true;
        }
    }

    pub fn is_dirty(&self, index: usize) -> bool {
        self.cells[index].dirty
    }

    pub fn dirty_count(&self) -> usize {
        self.cells.iter().filter(|cell| cell.dirty).count()
    }

    pub fn set_scroll(&mut self, scroll_x: u8, scroll_y: u8) {
        self.scroll_x = scroll_x;
        self.scroll_y = scroll_y;
    }

    pub fn scroll(&self) -> (u8, u8) {
        (self.scroll_x, self.scroll_y)
    }

    /// Redraw every dirty cell into the layer's pixel buffer and clear the dirty set. Returns
    /// the number of cells drawn.
    pub fn render(&mut self, gfx: &GfxElement, tile_info: impl Fn(TileCell) -> TileInfo) -> usize {
        let mut drawn = 0;
        for (index, cell) in self.cells.iter_mut().enumerate() {
            if !cell.dirty {
                continue;
            }
            cell.dirty = false;
            drawn += 1;

            let info = tile_info(*cell);
            let base_x = (index % self.cols) * TILE_SIZE;
            let base_y = (index / self.cols) * TILE_SIZE;
            for y in 0..TILE_SIZE {
                for x in 0..TILE_SIZE {
                    let pixel = gfx.pixel(info.code, x, y);
                    let pen = (pixel != 0 || info.opaque)
                        .then(|| info.color * gfx.colors() + u16::from(pixel));
                    self.pixmap.set(base_x + x, base_y + y, pen);
                }
            }
        }

        if drawn != 0 {
            log::trace!("redrew {drawn} tiles");
        }

        drawn
    }

    /// Copy the layer into `frame`. Native screen pixel (x, y) shows layer pixel
    /// (x + scroll_x, y + scroll_y), wrapping around the layer edges.
    pub fn composite(&self, frame: &mut FramePlane<u16>, orientation: Orientation) {
        let width = self.width();
        let height = self.height();
        let scroll_x = usize::from(self.scroll_x);
        let scroll_y = usize::from(self.scroll_y);

        for y in 0..height {
            let src_y = (y + scroll_y) % height;
            for x in 0..width {
                if let Some(pen) = self.pixmap.get((x + scroll_x) % width, src_y) {
                    let (dx, dy) = orientation.transform(x, y, width, height);
                    frame.set(dx, dy, pen);
                }
            }
        }
    }
}

/// One sprite as read out of sprite RAM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpriteEntry {
    pub tile_index: u16,
    pub x: i32,
    pub y: i32,
    pub flip_x: bool,
    pub flip_y: bool,
    pub color: u16,
}

/// Draw a sprite into `frame` with pixel value 0 transparent, clipping at the native screen edges.
pub fn draw_sprite(
    frame: &mut FramePlane<u16>,
    gfx: &GfxElement,
    sprite: &SpriteEntry,
    orientation: Orientation,
    pen_base: u16,
) {
    // The frame is already in destination orientation; undo the swap to get native bounds
    let (native_width, native_height) = orientation.output_size(frame.width(), frame.height());
    let color_base = pen_base + sprite.color * gfx.colors();

    for sy in 0..gfx.height() {
        let src_y = if sprite.flip_y { gfx.height() - 1 - sy } else { sy };
        let Some(y) = screen_coordinate(sprite.y, sy, native_height) else {
            continue;
        };

        for sx in 0..gfx.width() {
            let Some(x) = screen_coordinate(sprite.x, sx, native_width) else {
                continue;
            };

            let src_x = if sprite.flip_x { gfx.width() - 1 - sx } else { sx };
            let pixel = gfx.pixel(usize::from(sprite.tile_index), src_x, src_y);
            if pixel == 0 {
                continue;
            }

            let (dx, dy) = orientation.transform(x, y, native_width, native_height);
            frame.set(dx, dy, color_base + u16::from(pixel));
        }
    }
}

fn screen_coordinate(origin: i32, offset: usize, limit: usize) -> Option<usize> {
    let offset = i32::try_from(offset).ok()?;
    usize::try_from(origin + offset)
        .ok()
        .filter(|&coordinate| coordinate < limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::decode::{decode_gfx, GfxLayout};

    static ONE_PLANE_LAYOUT: GfxLayout = GfxLayout {
        width: 8,
        height: 8,
        count: 4,
        plane_offsets: &[0],
        x_offsets: &[0, 1, 2, 3, 4, 5, 6, 7],
        y_offsets: &[0, 8, 16, 24, 32, 40, 48, 56],
        increment: 64,
    };

    // Tile 0 blank, tile 1 solid, tile 2 left column, tile 3 top row
    fn test_gfx() -> GfxElement {
        let mut rom = vec![0; 32];
        rom[8..16].fill(0xFF);
        rom[16..24].fill(0x80);
        rom[24] = 0xFF;
        decode_gfx(&ONE_PLANE_LAYOUT, &rom).expect("ROM matches layout")
    }

    fn plain_tiles(cell: TileCell) -> TileInfo {
        TileInfo {
            code: usize::from(cell.tile_index),
            color: u16::from(cell.attribute),
            opaque: false,
        }
    }

    #[test]
    fn write_compare_elision() {
        let mut layer = TileLayer::new(4, 4);
        layer.render(&test_gfx(), plain_tiles);
        assert_eq!(0, layer.dirty_count());

        // Same value as already stored
        assert!(!layer.write_tile_index(5, 0));
        assert!(!layer.write_attribute(5, 0));
        assert!(!layer.is_dirty(5));

        assert!(layer.write_tile_index(5, 1));
        assert!(layer.is_dirty(5));
        assert_eq!(1, layer.dirty_count());

        assert!(layer.write_attribute(6, 3));
        assert!(!layer.write_attribute(6, 3));
        assert_eq!(2, layer.dirty_count());
    }

    #[test]
    fn render_only_redraws_dirty_cells() {
        let gfx = test_gfx();
        let mut layer = TileLayer::new(2, 1);
        layer.write_tile_index(0, 1);
        layer.write_tile_index(1, 1);
        assert_eq!(2, layer.render(&gfx, plain_tiles));

        // Cell 1 is clean, so a render with a different lookup must leave its pixels alone
        layer.write_attribute(0, 2);
        let drawn = layer.render(&gfx, |cell| TileInfo {
            color: u16::from(cell.attribute) + 5,
            ..plain_tiles(cell)
        });

        assert_eq!(1, drawn);
        assert_eq!(0, layer.dirty_count());

        let mut frame = FramePlane::new(16, 8);
        layer.composite(&mut frame, Orientation::IDENTITY);
        // colour 7 with 2 pens per colour -> pen 15
        assert_eq!(15, frame.get(3, 3));
        // colour 0, pixel 1 -> pen 1
        assert_eq!(1, frame.get(12, 3));

        assert_eq!(0, layer.render(&gfx, plain_tiles));
    }

    #[test]
    fn composite_keys_transparent_pixels() {
        let mut layer = TileLayer::new(1, 1);
        layer.write_tile_index(0, 2);
        layer.render(&test_gfx(), plain_tiles);

        let mut frame = FramePlane::new(8, 8);
        frame.fill(99);
        layer.composite(&mut frame, Orientation::IDENTITY);

        assert_eq!(&[1, 99, 99, 99, 99, 99, 99, 99], frame.row(4));

        // Opaque tiles draw pixel 0 too
        layer.mark_dirty(0);
        layer.render(&test_gfx(), |cell| TileInfo {
            opaque: true,
            ..plain_tiles(cell)
        });
        layer.composite(&mut frame, Orientation::IDENTITY);
        assert_eq!(&[1, 0, 0, 0, 0, 0, 0, 0], frame.row(4));
    }

    #[test]
    fn composite_scroll_wraps() {
        let mut layer = TileLayer::new(2, 2);
        // Top-row tile in the bottom-right cell
        layer.write_tile_index(3, 3);
        layer.render(&test_gfx(), plain_tiles);
        layer.set_scroll(8, 12);

        let mut frame = FramePlane::new(16, 16);
        layer.composite(&mut frame, Orientation::IDENTITY);

        // Layer row 8 is drawn at screen row (8 - 12) mod 16 = 12, layer column 8 at column 0
        for x in 0..8 {
            assert_eq!(1, frame.get(x, 12), "x = {x}");
        }
        assert_eq!(0, frame.get(8, 12));
        assert_eq!(0, frame.get(0, 11));
    }

    #[test]
    fn composite_applies_orientation() {
        let mut layer = TileLayer::new(2, 1);
        layer.write_tile_index(0, 2);
        layer.render(&test_gfx(), plain_tiles);

        let orientation = Orientation {
            swap_xy: true,
            flip_x: false,
            flip_y: false,
        };
        let (width, height) = orientation.output_size(layer.width(), layer.height());
        let mut frame = FramePlane::new(width, height);
        layer.composite(&mut frame, orientation);

        // Left column of the native layer becomes the top row
        assert_eq!((8, 16), (frame.width(), frame.height()));
        assert_eq!(&[1; 8], frame.row(0));
        assert_eq!(&[0; 8], frame.row(1));
    }

    #[test]
    fn sprite_flips_and_transparency() {
        let gfx = test_gfx();
        let mut frame = FramePlane::new(16, 16);
        frame.fill(7);

        let sprite = SpriteEntry {
            tile_index: 2,
            x: 4,
            y: 2,
            color: 1,
            ..SpriteEntry::default()
        };
        draw_sprite(&mut frame, &gfx, &sprite, Orientation::IDENTITY, 64);

        // pen_base + colour * 2 + pixel
        assert_eq!(67, frame.get(4, 2));
        assert_eq!(67, frame.get(4, 9));
        assert_eq!(7, frame.get(5, 2));

        let mut frame = FramePlane::new(16, 16);
        draw_sprite(
            &mut frame,
            &gfx,
            &SpriteEntry {
                flip_x: true,
                ..sprite
            },
            Orientation::IDENTITY,
            64,
        );
        assert_eq!(67, frame.get(11, 2));
        assert_eq!(0, frame.get(4, 2));

        let mut frame = FramePlane::new(16, 16);
        draw_sprite(
            &mut frame,
            &gfx,
            &SpriteEntry {
                tile_index: 3,
                flip_y: true,
                ..sprite
            },
            Orientation::IDENTITY,
            64,
        );
        assert_eq!(67, frame.get(4, 9));
        assert_eq!(0, frame.get(4, 2));
    }

    #[test]
    fn sprite_clips_at_screen_edges() {
        let gfx = test_gfx();
        let mut frame = FramePlane::new(16, 16);

        draw_sprite(
            &mut frame,
            &gfx,
            &SpriteEntry {
                tile_index: 1,
                x: -4,
                y: 12,
                ..SpriteEntry::default()
            },
            Orientation::IDENTITY,
            0,
        );

        let drawn = frame.pixels().iter().filter(|&&pen| pen != 0).count();
        assert_eq!(4 * 4, drawn);
        assert_eq!(1, frame.get(0, 15));
        assert_eq!(1, frame.get(3, 12));
        assert_eq!(0, frame.get(4, 12));
    }
}
