//! Square crop and resize

use fast_image_resize as fr;
use fr::images::Image as FrImage;
use imageproc::image::{imageops, RgbImage};

use crate::error::ThumbnailError;

/// Centered square crop box `(left, top, size)`
///
/// `size` is the shorter side; offsets use floor division so odd
/// remainders leave the extra pixel on the right/bottom.
pub fn center_square(width: u32, height: u32) -> (u32, u32, u32) {
    let size = width.min(height);
    let left = (width - size) / 2;
    let top = (height - size) / 2;
    (left, top, size)
}

/// Crop the centered square and resize it to `target x target`
pub(super) fn crop_and_resize(img: &RgbImage, target: u32) -> Result<RgbImage, ThumbnailError> {
    let (width, height) = img.dimensions();
    let (left, top, size) = center_square(width, height);

    let square = if size == width && size == height {
        img.clone()
    } else {
        imageops::crop_imm(img, left, top, size, size).to_image()
    };

    log::trace!("Cropped {width}x{height} to {size}x{size} at ({left}, {top})");

    if size == target {
        return Ok(square);
    }

    resize_square(square, target)
}

/// Lanczos3 resize of a square RGB raster
fn resize_square(square: RgbImage, target: u32) -> Result<RgbImage, ThumbnailError> {
    let size = square.width();

    let src_image = FrImage::from_vec_u8(size, size, square.into_raw(), fr::PixelType::U8x3)
        .map_err(|e| ThumbnailError::Resize(format!("invalid source buffer: {e}")))?;
    let mut dst_image = FrImage::new(target, target, fr::PixelType::U8x3);

    let options =
        fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Lanczos3));

    let mut resizer = fr::Resizer::new();
    resizer
        .resize(&src_image, &mut dst_image, Some(&options))
        .map_err(|e| ThumbnailError::Resize(e.to_string()))?;

    RgbImage::from_raw(target, target, dst_image.into_vec())
        .ok_or_else(|| ThumbnailError::Resize("resized buffer has the wrong length".to_string()))
}
