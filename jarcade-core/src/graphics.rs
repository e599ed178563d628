pub mod blitter;
pub mod decode;
pub mod tilemap;

use serde::{Deserialize, Serialize};

pub const SCREEN_WIDTH: usize = 256;
pub const SCREEN_HEIGHT: usize = 256;

/// Pen offset of the blitter machine's background plane in the composed frame.
pub const PLANE_B_PEN_BASE: u16 = 16;

/// A 2D grid of pixels, one value per pixel (a colour index or pen).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FramePlane<T = u8> {
    width: usize,
    height: usize,
    pixels: Vec<T>,
}

impl<T: Copy + Default> FramePlane<T> {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![T::default(); width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn get(&self, x: usize, y: usize) -> T {
        self.pixels[y * self.width + x]
    }

    pub fn set(&mut self, x: usize, y: usize, value: T) {
        self.pixels[y * self.width + x] = value;
    }

    /// Mutable access to one pixel, for read-modify-write updates.
    pub fn get_mut(&mut self, x: usize, y: usize) -> &mut T {
        &mut self.pixels[y * self.width + x]
    }

    pub fn fill(&mut self, value: T) {
        self.pixels.fill(value);
    }

    pub fn pixels(&self) -> &[T] {
        &self.pixels
    }

    pub fn row(&self, y: usize) -> &[T] {
        &self.pixels[y * self.width..(y + 1) * self.width]
    }
}

/// Screen orientation as three independent flags. The swap is applied first, then the flips
/// on the swapped axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Orientation {
    pub swap_xy: bool,
    pub flip_x: bool,
    pub flip_y: bool,
}

impl Orientation {
    pub const IDENTITY: Self = Self {
        swap_xy: false,
        flip_x: false,
        flip_y: false,
    };

    /// Map a pixel position in the native `width`x`height` space to its destination.
    pub fn transform(self, x: usize, y: usize, width: usize, height: usize) -> (usize, usize) {
        let (x, y, width, height) = if self.swap_xy {
            (y, x, height, width)
        } else {
            (x, y, width, height)
        };

        let x = if self.flip_x { width - 1 - x } else { x };
        let y = if self.flip_y { height - 1 - y } else { y };

        (x, y)
    }

    /// Combine with a flip-screen latch: flipping the screen inverts both flip flags.
    #[must_use]
    pub fn flipped(self, flip_screen: bool) -> Self {
        Self {
            swap_xy: self.swap_xy,
            flip_x: self.flip_x ^ flip_screen,
            flip_y: self.flip_y ^ flip_screen,
        }
    }

    /// Dimensions of a destination plane for a native `width`x`height` source.
    pub fn output_size(self, width: usize, height: usize) -> (usize, usize) {
        if self.swap_xy {
            (height, width)
        } else {
            (width, height)
        }
    }
}

/// Inclusive bounding box of pixels written since the last redraw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirtyRect {
    pub min_x: usize,
    pub min_y: usize,
    pub max_x: usize,
    pub max_y: usize,
}

impl DirtyRect {
    pub fn point(x: usize, y: usize) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
        }
    }

    /// Grow an optional rectangle to cover the given pixel.
    pub fn include(rect: &mut Option<Self>, x: usize, y: usize) {
        match rect {
            Some(rect) => {
                rect.min_x = rect.min_x.min(x);
                rect.min_y = rect.min_y.min(y);
                rect.max_x = rect.max_x.max(x);
                rect.max_y = rect.max_y.max(y);
            }
            None => *rect = Some(Self::point(x, y)),
        }
    }

    pub fn width(&self) -> usize {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> usize {
        self.max_y - self.min_y + 1
    }
}

/// Compose the blitter machine's two planes into pens within `rect`: plane B is drawn first with
/// no transparency, then plane A on top keyed on colour 0.
pub fn compose_blitter_planes(
    plane_b: &FramePlane<u8>,
    plane_a: &FramePlane<u8>,
    rect: DirtyRect,
    out: &mut FramePlane<u16>,
) {
    for y in rect.min_y..=rect.max_y {
        for x in rect.min_x..=rect.max_x {
            let a = plane_a.get(x, y);
            let pen = if a != 0 {
                u16::from(a)
            } else {
                PLANE_B_PEN_BASE + u16::from(plane_b.get(x, y))
            };
            out.set(x, y, pen);
        }
    }
}
