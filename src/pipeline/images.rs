//! Image compressor
//!
//! Re-encodes raster images as JPEG under a per-backend profile: width is
//! capped (never enlarged), alpha is flattened onto white.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use rayon::prelude::*;

use crate::config::ImageProfile;
use crate::error::AssetError;
use crate::model::{EncodedImage, ImageBlock, LayoutBlock};

/// Composite any alpha channel over a white background
pub fn flatten_onto_white(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }
    let rgba = img.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let p = rgba.get_pixel(x, y).0;
        let a = p[3] as u32;
        let blend = |c: u8| ((c as u32 * a + 255 * (255 - a) + 127) / 255) as u8;
        image::Rgb([blend(p[0]), blend(p[1]), blend(p[2])])
    })
}

pub fn encode_jpeg(img: &RgbImage, quality: u8) -> Result<Vec<u8>, AssetError> {
    let mut out = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
        .encode_image(img)
        .map_err(|e| AssetError::Encode(e.to_string()))?;
    Ok(out.into_inner())
}

/// Decode, downscale to the profile width and re-encode as JPEG
pub fn compress_image(bytes: &[u8], profile: ImageProfile) -> Result<ImageBlock, AssetError> {
    let img = image::load_from_memory(bytes).map_err(|e| AssetError::Decode(e.to_string()))?;
    let (width, height) = (img.width(), img.height());
    if width == 0 || height == 0 {
        return Err(AssetError::Decode("image has no pixels".into()));
    }

    let img = if profile.max_width > 0 && width > profile.max_width {
        let new_height =
            ((height as u64 * profile.max_width as u64) / width as u64).max(1) as u32;
        img.resize_exact(profile.max_width, new_height, FilterType::Triangle)
    } else {
        img
    };

    let rgb = flatten_onto_white(&img);
    let bytes = encode_jpeg(&rgb, profile.quality)?;
    Ok(ImageBlock {
        bytes,
        intrinsic_width: rgb.width(),
        intrinsic_height: rgb.height(),
    })
}

/// Recompress an image and return it as a JPEG data URL
pub fn compress_to_data_url(image: &EncodedImage, profile: ImageProfile) -> Result<String, AssetError> {
    let block = compress_image(&image.bytes, profile)?;
    let encoded = EncodedImage {
        bytes: block.bytes,
        media_type: Some("image/jpeg".to_string()),
    };
    Ok(encoded.to_data_url())
}

/// Compress every image block in parallel, preserving block order.
///
/// Images that fail to decode are dropped with a warning; the second value is
/// how many were dropped.
pub fn compress_all(blocks: Vec<LayoutBlock>, profile: ImageProfile) -> (Vec<LayoutBlock>, usize) {
    let results: Vec<Option<LayoutBlock>> = blocks
        .into_par_iter()
        .enumerate()
        .map(|(index, block)| match block {
            LayoutBlock::Image(image) => match compress_image(&image.bytes, profile) {
                Ok(compressed) => Some(LayoutBlock::Image(compressed)),
                Err(e) => {
                    log::warn!("Dropping image block {}: {}", index, e);
                    None
                }
            },
            other => Some(other),
        })
        .collect();

    let dropped = results.iter().filter(|r| r.is_none()).count();
    (results.into_iter().flatten().collect(), dropped)
}
