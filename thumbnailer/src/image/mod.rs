//! Image derivation: decode, square-crop, resize, encode

mod decode;
mod encode;
mod transform;

// Re-export public API
pub use decode::decode;
pub use encode::{compress_to_jpeg, CONTENT_TYPE, EXTENSION};
pub use transform::center_square;

use imageproc::image::RgbImage;

use crate::config::{ThumbnailerConfig, MAX_THUMBNAIL_SIZE};
use crate::error::ThumbnailError;

/// An encoded thumbnail ready to be stored
#[derive(Debug, Clone)]
pub struct Thumbnail {
    pub data: Vec<u8>,
    pub dimensions: (u32, u32),
}

impl Thumbnail {
    pub fn content_type(&self) -> &'static str {
        CONTENT_TYPE
    }
}

/// Run the full image pipeline over one source object
pub fn derive_thumbnail(
    data: &[u8],
    content_type: &str,
    config: &ThumbnailerConfig,
) -> Result<Thumbnail, ThumbnailError> {
    let img = decode(data, content_type)?;
    let img = square(&img, config.thumbnail_size)?;
    let data = encode::encode(&img, config.encode_quality)?;

    Ok(Thumbnail {
        data,
        dimensions: img.dimensions(),
    })
}

/// Reduce a normalized raster to a `size x size` thumbnail
pub fn square(img: &RgbImage, size: u32) -> Result<RgbImage, ThumbnailError> {
    if !(1..=MAX_THUMBNAIL_SIZE).contains(&size) {
        return Err(ThumbnailError::Resize(format!(
            "target size {size} outside 1..={MAX_THUMBNAIL_SIZE}"
        )));
    }
    transform::crop_and_resize(img, size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use imageproc::image::{load_from_memory, DynamicImage, ImageFormat, Rgb};
    use std::io::Cursor;

    fn png(w: u32, h: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(w, h, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn honours_configured_size() {
        let config = ThumbnailerConfig {
            thumbnail_size: 48,
            ..Default::default()
        };
        let thumb = derive_thumbnail(&png(120, 80), "image/png", &config).unwrap();

        assert_eq!(thumb.dimensions, (48, 48));
        let decoded = load_from_memory(&thumb.data).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (48, 48));
    }

    #[test]
    fn oversized_target_is_refused_before_allocating() {
        let config = ThumbnailerConfig {
            thumbnail_size: 65536,
            ..Default::default()
        };
        let result = derive_thumbnail(&png(4, 4), "image/png", &config);
        assert!(matches!(result, Err(ThumbnailError::Resize(_))));

        let img = RgbImage::from_pixel(2, 2, Rgb([0, 0, 0]));
        assert!(matches!(square(&img, 0), Err(ThumbnailError::Resize(_))));
    }

    #[test]
    fn decode_failures_are_tagged() {
        let result = derive_thumbnail(b"nope", "image/png", &ThumbnailerConfig::default());
        assert!(matches!(result, Err(ThumbnailError::Decode(_))));
    }
}
