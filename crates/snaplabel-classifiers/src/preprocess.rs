//! Image preparation ahead of inference
//!
//! Turns request pixels into an upright RGB image with exactly the geometry
//! the model declares:
//! 1. Decode (encoded bytes) or adopt (raw RGB8) the pixels
//! 2. Undo the EXIF orientation so the model sees upright content
//! 3. Crop and/or scale to the model's input geometry

use crate::model::InputGeometry;
use crate::request::ImageInput;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageReader, Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use snaplabel_core::{Error, Orientation, Result};
use std::io::Cursor;

/// How a source image is fitted to the model's input geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CropScale {
    /// Crop the centre to the target aspect ratio, then scale
    #[default]
    CenterCrop,
    /// Scale to fit entirely inside, padding the rest with black
    ScaleFit,
    /// Stretch to the exact geometry, ignoring aspect ratio
    ScaleFill,
}

impl std::str::FromStr for CropScale {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "center_crop" | "centre_crop" => Ok(Self::CenterCrop),
            "scale_fit" => Ok(Self::ScaleFit),
            "scale_fill" => Ok(Self::ScaleFill),
            other => Err(format!("unknown crop/scale mode '{}'", other)),
        }
    }
}

/// Decode request pixels, enforcing an upper bound on pixel count
pub fn decode(input: &ImageInput, max_pixels: u64) -> Result<DynamicImage> {
    match input {
        ImageInput::Encoded(bytes) => {
            let (width, height) = reader(bytes)?
                .into_dimensions()
                .map_err(|e| Error::invalid_input(format!("failed to read image header: {}", e)))?;
            check_pixel_budget(width, height, max_pixels)?;

            reader(bytes)?
                .decode()
                .map_err(|e| Error::invalid_input(format!("failed to decode image: {}", e)))
        }
        ImageInput::Rgb {
            width,
            height,
            pixels,
        } => {
            check_pixel_budget(*width, *height, max_pixels)?;
            RgbImage::from_raw(*width, *height, pixels.clone())
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(|| {
                    Error::invalid_input(format!(
                        "pixel buffer of {} bytes does not hold a {}x{} RGB image",
                        pixels.len(),
                        width,
                        height
                    ))
                })
        }
    }
}

fn reader(bytes: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| Error::invalid_input(format!("failed to detect image format: {}", e)))
}

fn check_pixel_budget(width: u32, height: u32, max_pixels: u64) -> Result<()> {
    let pixels = width as u64 * height as u64;
    if pixels == 0 {
        return Err(Error::invalid_input(format!(
            "image has no pixels ({}x{})",
            width, height
        )));
    }
    if pixels > max_pixels {
        return Err(Error::invalid_input(format!(
            "image has {} pixels, limit is {}",
            pixels, max_pixels
        )));
    }
    Ok(())
}

/// Rotate and mirror `image` so its content is upright
pub fn upright(image: DynamicImage, orientation: Orientation) -> DynamicImage {
    match orientation {
        Orientation::Up => image,
        Orientation::UpMirrored => image.fliph(),
        Orientation::Down => image.rotate180(),
        Orientation::DownMirrored => image.flipv(),
        Orientation::LeftMirrored => image.rotate90().fliph(),
        Orientation::Right => image.rotate90(),
        Orientation::RightMirrored => image.rotate90().flipv(),
        Orientation::Left => image.rotate270(),
    }
}

/// Fit an upright image to `geometry`
pub fn fit(image: &DynamicImage, geometry: InputGeometry, crop_scale: CropScale) -> RgbImage {
    let InputGeometry { width, height } = geometry;

    match crop_scale {
        CropScale::CenterCrop => {
            let (x, y, crop_width, crop_height) =
                center_region(image.width(), image.height(), geometry);
            image
                .crop_imm(x, y, crop_width, crop_height)
                .resize_exact(width, height, FilterType::Triangle)
                .to_rgb8()
        }
        CropScale::ScaleFill => image.resize_exact(width, height, FilterType::Triangle).to_rgb8(),
        CropScale::ScaleFit => {
            let fitted = image.resize(width, height, FilterType::Triangle).to_rgb8();
            let mut canvas = RgbImage::from_pixel(width, height, Rgb([0, 0, 0]));
            let x = (width - fitted.width()) / 2;
            let y = (height - fitted.height()) / 2;
            imageops::overlay(&mut canvas, &fitted, x as i64, y as i64);
            canvas
        }
    }
}

/// Largest centred region of a `src_width` x `src_height` image sharing the
/// aspect ratio of `geometry`, as `(x, y, width, height)`
///
/// Cropping before scaling keeps every intermediate buffer no larger than the
/// source, whatever its aspect ratio.
fn center_region(src_width: u32, src_height: u32, geometry: InputGeometry) -> (u32, u32, u32, u32) {
    let (sw, sh) = (src_width as u64, src_height as u64);
    let (tw, th) = (geometry.width as u64, geometry.height as u64);

    // Compare sw/sh against tw/th without division
    let (crop_width, crop_height) = if sw * th > tw * sh {
        ((sh * tw / th).max(1), sh)
    } else {
        (sw, (sw * th / tw).max(1))
    };

    let x = (sw - crop_width) / 2;
    let y = (sh - crop_height) / 2;
    (x as u32, y as u32, crop_width as u32, crop_height as u32)
}

/// Full preparation: orientation correction followed by crop/scale
pub fn prepare(
    image: DynamicImage,
    orientation: Orientation,
    geometry: InputGeometry,
    crop_scale: CropScale,
) -> RgbImage {
    let upright = upright(image, orientation);
    fit(&upright, geometry, crop_scale)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgb<u8> = Rgb([255, 0, 0]);
    const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

    /// 2x1 image stored with a red pixel on the left
    fn marker() -> DynamicImage {
        let mut img = RgbImage::from_pixel(2, 1, BLACK);
        img.put_pixel(0, 0, RED);
        DynamicImage::ImageRgb8(img)
    }

    fn red_position(img: &DynamicImage) -> (u32, u32) {
        let rgb = img.to_rgb8();
        rgb.enumerate_pixels()
            .find(|(_, _, p)| **p == RED)
            .map(|(x, y, _)| (x, y))
            .unwrap()
    }

    #[test]
    fn test_upright_identity() {
        let img = upright(marker(), Orientation::Up);
        assert_eq!((img.width(), img.height()), (2, 1));
        assert_eq!(red_position(&img), (0, 0));
    }

    #[test]
    fn test_upright_mirrors() {
        assert_eq!(red_position(&upright(marker(), Orientation::UpMirrored)), (1, 0));
        assert_eq!(red_position(&upright(marker(), Orientation::Down)), (1, 0));
        assert_eq!(red_position(&upright(marker(), Orientation::DownMirrored)), (0, 0));
    }

    #[test]
    fn test_upright_rotations_swap_dimensions() {
        for orientation in [
            Orientation::LeftMirrored,
            Orientation::Right,
            Orientation::RightMirrored,
            Orientation::Left,
        ] {
            let img = upright(marker(), orientation);
            assert_eq!((img.width(), img.height()), (1, 2), "{:?}", orientation);
        }

        // Stored left edge is the visual top for transpose and 90 clockwise
        assert_eq!(red_position(&upright(marker(), Orientation::LeftMirrored)), (0, 0));
        assert_eq!(red_position(&upright(marker(), Orientation::Right)), (0, 0));
        assert_eq!(red_position(&upright(marker(), Orientation::RightMirrored)), (0, 1));
        assert_eq!(red_position(&upright(marker(), Orientation::Left)), (0, 1));
    }

    #[test]
    fn test_fit_produces_exact_geometry() {
        let source = DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 10, RED));
        let geometry = InputGeometry::new(8, 8);

        for mode in [CropScale::CenterCrop, CropScale::ScaleFit, CropScale::ScaleFill] {
            let out = fit(&source, geometry, mode);
            assert_eq!(out.dimensions(), (8, 8), "{:?}", mode);
        }
    }

    #[test]
    fn test_scale_fit_letterboxes() {
        let source = DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 10, RED));
        let out = fit(&source, InputGeometry::new(8, 8), CropScale::ScaleFit);

        assert_eq!(*out.get_pixel(4, 0), BLACK);
        assert_eq!(*out.get_pixel(4, 4), RED);
    }

    #[test]
    fn test_center_crop_fills_frame() {
        let source = DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 10, RED));
        let out = fit(&source, InputGeometry::new(8, 8), CropScale::CenterCrop);

        assert!(out.pixels().all(|p| *p == RED));
    }

    #[test]
    fn test_center_region_keeps_target_aspect() {
        let square = InputGeometry::new(224, 224);

        assert_eq!(center_region(40, 10, square), (15, 0, 10, 10));
        assert_eq!(center_region(10, 40, square), (0, 15, 10, 10));
        assert_eq!(center_region(30, 30, square), (0, 0, 30, 30));
        assert_eq!(center_region(1, 100_000, square), (0, 49_999, 1, 1));
        assert_eq!(center_region(100, 100, InputGeometry::new(4, 2)), (0, 25, 100, 50));
    }

    #[test]
    fn test_fit_extreme_aspect_ratio() {
        let geometry = InputGeometry::new(224, 224);
        let tall = DynamicImage::ImageRgb8(RgbImage::from_pixel(1, 100_000, RED));
        let wide = DynamicImage::ImageRgb8(RgbImage::from_pixel(100_000, 1, RED));

        for mode in [CropScale::CenterCrop, CropScale::ScaleFit, CropScale::ScaleFill] {
            assert_eq!(fit(&tall, geometry, mode).dimensions(), (224, 224), "{:?}", mode);
            assert_eq!(fit(&wide, geometry, mode).dimensions(), (224, 224), "{:?}", mode);
        }
    }

    #[test]
    fn test_center_crop_takes_middle() {
        // Left and right thirds black, middle third red
        let source = DynamicImage::ImageRgb8(RgbImage::from_fn(30, 10, |x, _| {
            if (10..20).contains(&x) {
                RED
            } else {
                BLACK
            }
        }));
        let out = fit(&source, InputGeometry::new(4, 4), CropScale::CenterCrop);

        assert!(out.pixels().all(|p| *p == RED));
    }

    #[test]
    fn test_decode_raw_rgb() {
        let input = ImageInput::Rgb {
            width: 2,
            height: 1,
            pixels: vec![255, 0, 0, 0, 0, 0],
        };

        let img = decode(&input, 100).unwrap();
        assert_eq!(red_position(&img), (0, 0));
    }

    #[test]
    fn test_decode_rejects_short_buffer() {
        let input = ImageInput::Rgb {
            width: 2,
            height: 2,
            pixels: vec![0; 5],
        };
        assert!(matches!(decode(&input, 100), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_decode_rejects_garbage_bytes() {
        let input = ImageInput::Encoded(b"definitely not an image".to_vec());
        assert!(matches!(decode(&input, 100), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_decode_enforces_pixel_budget() {
        let input = ImageInput::Rgb {
            width: 10,
            height: 10,
            pixels: vec![0; 300],
        };
        assert!(matches!(decode(&input, 99), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_decode_png() {
        let mut bytes = Vec::new();
        marker()
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();

        let img = decode(&ImageInput::Encoded(bytes), 100).unwrap();
        assert_eq!((img.width(), img.height()), (2, 1));
    }

    #[test]
    fn test_crop_scale_from_str() {
        assert_eq!("center-crop".parse::<CropScale>().unwrap(), CropScale::CenterCrop);
        assert_eq!("scale_fit".parse::<CropScale>().unwrap(), CropScale::ScaleFit);
        assert!("stretchy".parse::<CropScale>().is_err());
    }
}
