use anyhow::Context;
use image::{imageops::FilterType, DynamicImage, GenericImageView};
use log::debug;
use tract_onnx::prelude::tract_ndarray::Array4;

/// Résolution d'entrée du classifieur (carré).
pub const INPUT_SIZE: u32 = 224;

/// Lot d'entrée NHWC `[1, 224, 224, 3]`, normalisé dans `[-1, 1]`.
pub type InputBatch = Array4<f32>;

/// Fenêtre carrée centrée `(x, y, côté)` pour une image `width × height`.
///
/// Paysage : région `h × h` centrée horizontalement, pleine hauteur.
/// Portrait : région `w × w` centrée verticalement. Un décalage en `.5`
/// est arrondi au pair, comme une boîte flottante passée à Pillow.
pub fn square_crop_box(width: u32, height: u32) -> (u32, u32, u32) {
    let side = width.min(height);
    (center_offset(width - side), center_offset(height - side), side)
}

fn center_offset(excess: u32) -> u32 {
    let half = excess / 2;
    if excess % 2 == 1 && half % 2 == 1 {
        half + 1
    } else {
        half
    }
}

pub fn center_crop(img: &DynamicImage) -> DynamicImage {
    let (width, height) = img.dimensions();
    let (x, y, side) = square_crop_box(width, height);
    if side == width && side == height {
        return img.clone();
    }
    img.crop_imm(x, y, side, side)
}

/// Normalisation MobileNet : `[0, 255]` vers `[-1, 1]`.
pub fn normalize(value: u8) -> f32 {
    value as f32 / 127.5 - 1.0
}

pub fn decode(bytes: &[u8]) -> anyhow::Result<DynamicImage> {
    image::load_from_memory(bytes).context("décodage de l'image impossible")
}

/// Recadrage carré, redimensionnement 224×224, conversion RGB et normalisation.
pub fn to_input_batch(img: &DynamicImage) -> InputBatch {
    let cropped = center_crop(img);
    let resized = cropped.resize_exact(INPUT_SIZE, INPUT_SIZE, FilterType::CatmullRom);
    let rgb = resized.to_rgb8();

    let size = INPUT_SIZE as usize;
    let batch = Array4::from_shape_fn((1, size, size, 3), |(_, y, x, c)| {
        normalize(rgb.get_pixel(x as u32, y as u32)[c])
    });
    debug!("Lot d'entrée prêt: {:?}", batch.shape());
    batch
}

pub fn prepare(bytes: &[u8]) -> anyhow::Result<InputBatch> {
    let img = decode(bytes)?;
    debug!("Image décodée: {}x{}", img.width(), img.height());
    Ok(to_input_batch(&img))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn encode_png(img: &RgbImage) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    /// Trois bandes de couleur égales le long de l'axe le plus long.
    fn banded(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            let (pos, len) = if width >= height { (x, width) } else { (y, height) };
            match pos * 3 / len {
                0 => Rgb([255, 0, 0]),
                1 => Rgb([0, 255, 0]),
                _ => Rgb([0, 0, 255]),
            }
        })
    }

    #[test]
    fn square_input_is_not_cropped() {
        assert_eq!(square_crop_box(300, 300), (0, 0, 300));
    }

    #[test]
    fn landscape_keeps_horizontal_center() {
        assert_eq!(square_crop_box(400, 300), (50, 0, 300));
        assert_eq!(square_crop_box(640, 480), (80, 0, 480));
    }

    #[test]
    fn half_pixel_offsets_round_to_even() {
        // (301-300)/2 = 0.5 -> 0 ; (303-300)/2 = 1.5 -> 2 ; (305-300)/2 = 2.5 -> 2
        assert_eq!(square_crop_box(301, 300), (0, 0, 300));
        assert_eq!(square_crop_box(303, 300), (2, 0, 300));
        assert_eq!(square_crop_box(305, 300), (2, 0, 300));
        assert_eq!(square_crop_box(300, 307), (0, 4, 300));
        for width in 300..340 {
            let (x, _, side) = square_crop_box(width, 300);
            assert!(x + side <= width);
        }
    }

    #[test]
    fn portrait_keeps_vertical_center() {
        assert_eq!(square_crop_box(300, 400), (0, 50, 300));
        assert_eq!(square_crop_box(1, 5), (0, 2, 1));
    }

    #[test]
    fn normalization_spans_unit_range() {
        assert_eq!(normalize(0), -1.0);
        assert_eq!(normalize(255), 1.0);
        assert!(normalize(128).abs() < 0.01);
    }

    #[test]
    fn landscape_batch_only_sees_middle_band() {
        let batch = prepare(&encode_png(&banded(300, 100))).unwrap();
        assert_eq!(batch.shape(), &[1, 224, 224, 3]);
        for y in [0, 100, 223] {
            for x in [0, 112, 223] {
                assert!((batch[[0, y, x, 0]] + 1.0).abs() < 1e-2);
                assert!((batch[[0, y, x, 1]] - 1.0).abs() < 1e-2);
                assert!((batch[[0, y, x, 2]] + 1.0).abs() < 1e-2);
            }
        }
    }

    #[test]
    fn portrait_batch_only_sees_middle_band() {
        let batch = prepare(&encode_png(&banded(90, 270))).unwrap();
        assert_eq!(batch.shape(), &[1, 224, 224, 3]);
        assert!((batch[[0, 0, 0, 1]] - 1.0).abs() < 1e-2);
        assert!((batch[[0, 223, 223, 1]] - 1.0).abs() < 1e-2);
        assert!((batch[[0, 112, 112, 0]] + 1.0).abs() < 1e-2);
    }

    #[test]
    fn alpha_channel_is_dropped() {
        let rgba = image::RgbaImage::from_pixel(50, 50, image::Rgba([255, 255, 255, 0]));
        let mut buf = Cursor::new(Vec::new());
        rgba.write_to(&mut buf, ImageFormat::Png).unwrap();

        let batch = prepare(buf.get_ref()).unwrap();
        assert_eq!(batch.shape(), &[1, 224, 224, 3]);
        assert!(batch.iter().all(|v| (*v - 1.0).abs() < 1e-2));
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        assert!(prepare(b"definitely not an image").is_err());
    }
}
