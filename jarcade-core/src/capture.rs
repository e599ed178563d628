use crate::graphics::FramePlane;
use std::fs::File;
use std::io;
use std::io::BufWriter;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("error encoding PNG: {source}")]
    Encoding {
        #[from]
        source: png::EncodingError,
    },
    #[error("error writing frame: {source}")]
    FileSystem {
        #[from]
        source: io::Error,
    },
    #[error("frame dimensions {width}x{height} do not fit in a PNG")]
    Dimensions { width: usize, height: usize },
}

/// Fixed false-colour palette for pen frames. Pen 0 is black; pen bits 0-2, 3-5 and 6-8 drive
/// red, green and blue.
pub fn debug_color(pen: u16) -> [u8; 3] {
    if pen == 0 {
        return [0, 0, 0];
    }

    let channel = |shift: u16| 3 + 36 * ((pen >> shift) & 0x07) as u8;
    [channel(0), channel(3), channel(6)]
}

pub fn frame_to_rgb(frame: &FramePlane<u16>) -> Vec<u8> {
    frame
        .pixels()
        .iter()
        .flat_map(|&pen| debug_color(pen))
        .collect()
}

/// Write the pen frame as an 8-bit RGB PNG.
pub fn save_frame_png<P>(frame: &FramePlane<u16>, path: P) -> Result<(), CaptureError>
where
    P: AsRef<Path>,
{
    let dimensions_err = || CaptureError::Dimensions {
        width: frame.width(),
        height: frame.height(),
    };
    let width = u32::try_from(frame.width()).map_err(|_| dimensions_err())?;
    let height = u32::try_from(frame.height()).map_err(|_| dimensions_err())?;

    let file = File::create(path.as_ref())?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), width, height);
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);

    let mut writer = encoder.write_header()?;
    writer.write_image_data(&frame_to_rgb(frame))?;
    writer.finish()?;

    log::info!(
        "Wrote {width}x{height} frame to '{}'",
        path.as_ref().display()
    );

    Ok(())
}
