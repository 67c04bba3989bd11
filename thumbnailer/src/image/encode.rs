//! Thumbnail encoding

use imageproc::image::codecs::jpeg::JpegEncoder;
use imageproc::image::RgbImage;

use crate::error::ThumbnailError;

pub const CONTENT_TYPE: &str = "image/jpeg";
pub const EXTENSION: &str = "jpg";

/// Compress an RGB raster to baseline JPEG with the specified quality
pub fn compress_to_jpeg<W>(img: &RgbImage, writer: &mut W, quality: u8) -> Result<(), ThumbnailError>
where
    W: std::io::Write,
{
    let mut encoder = JpegEncoder::new_with_quality(writer, quality);

    encoder.encode_image(img).map_err(ThumbnailError::Encode)?;

    Ok(())
}

pub(super) fn encode(img: &RgbImage, quality: u8) -> Result<Vec<u8>, ThumbnailError> {
    let (width, height) = img.dimensions();
    let mut buffer = Vec::with_capacity(width as usize * height as usize / 4);

    compress_to_jpeg(img, &mut buffer, quality)?;

    log::trace!("Encoded {width}x{height} JPEG, {} bytes", buffer.len());
    Ok(buffer)
}
