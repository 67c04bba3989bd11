//! Image decoding and color normalization

use std::io::Cursor;

use imageproc::image::{DynamicImage, ImageFormat, ImageReader, Rgb, RgbImage, RgbaImage};

use crate::error::DecodeError;

/// Decode image bytes into an opaque RGB raster
///
/// The format is sniffed from the data; `content_type` is only consulted
/// when sniffing fails. Transparent pixels are flattened onto white.
pub fn decode(data: &[u8], content_type: &str) -> Result<RgbImage, DecodeError> {
    let img = read(data, content_type)?;

    let (width, height) = (img.width(), img.height());
    if width == 0 || height == 0 {
        return Err(DecodeError::Empty { width, height });
    }

    log::trace!("Decoded {width}x{height} image as {:?}", img.color());
    Ok(normalize(img))
}

fn read(data: &[u8], content_type: &str) -> Result<DynamicImage, DecodeError> {
    let mut reader = ImageReader::new(Cursor::new(data)).with_guessed_format()?;

    if reader.format().is_none() {
        let hint = ImageFormat::from_mime_type(mime_essence(content_type))
            .ok_or(DecodeError::UnknownFormat)?;
        reader.set_format(hint);
    }

    Ok(reader.decode()?)
}

// "image/png; charset=binary" -> "image/png"
fn mime_essence(content_type: &str) -> &str {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
}

/// Convert any color model to RGB8
///
/// Palette images arrive here already expanded by the decoder, as RGBA when
/// the palette carries transparency and RGB otherwise.
pub(super) fn normalize(img: DynamicImage) -> RgbImage {
    if img.color().has_alpha() {
        flatten_onto_white(&img.into_rgba8())
    } else {
        img.into_rgb8()
    }
}

/// Composite an RGBA raster over an opaque white background
fn flatten_onto_white(img: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(img.width(), img.height(), |x, y| {
        let [r, g, b, a] = img.get_pixel(x, y).0;
        Rgb([blend(r, a), blend(g, a), blend(b, a)])
    })
}

#[inline]
fn blend(channel: u8, alpha: u8) -> u8 {
    let (c, a) = (channel as u32, alpha as u32);
    ((c * a + 255 * (255 - a) + 127) / 255) as u8
}
