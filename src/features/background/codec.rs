use image::RgbaImage;
use thiserror::Error;

use crate::config::PngCompression;

/// 解码/编码错误，`Display` 保留底层库的原始信息
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("{0}")]
    Decode(#[from] image::ImageError),
    #[error("{0}")]
    Encode(#[from] png::EncodingError),
}

impl From<PngCompression> for png::Compression {
    fn from(value: PngCompression) -> Self {
        match value {
            PngCompression::Fast => png::Compression::Fast,
            PngCompression::Default => png::Compression::Default,
            PngCompression::Best => png::Compression::Best,
        }
    }
}

/// 按内容嗅探格式解码，并统一转换为 RGBA8（已是 RGBA 时不做改动）。
pub fn decode_to_rgba(bytes: &[u8]) -> Result<RgbaImage, CodecError> {
    let img = image::load_from_memory(bytes)?;
    Ok(img.into_rgba8())
}

/// 将 RGBA8 栅格编码为 8bit RGBA PNG。
pub fn encode_png(img: &RgbaImage, compression: PngCompression) -> Result<Vec<u8>, CodecError> {
    let (width, height) = img.dimensions();
    let mut out = Vec::with_capacity((width as usize * height as usize * 4) / 2);
    {
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_compression(compression.into());
        if compression == PngCompression::Fast {
            encoder.set_filter(png::FilterType::NoFilter);
        }
        let mut writer = encoder.write_header()?;
        writer.write_image_data(img.as_raw())?;
        writer.finish()?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Luma, Rgb, Rgba};
    use std::io::Cursor;

    fn encode_with_image(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, format).expect("encode test image");
        buf.into_inner()
    }

    #[test]
    fn rgb_jpeg_gains_opaque_alpha() {
        let src = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(8, 8, Rgb([10, 200, 30])));
        let bytes = encode_with_image(src, ImageFormat::Jpeg);

        let rgba = decode_to_rgba(&bytes).expect("decode jpeg");
        assert_eq!(rgba.dimensions(), (8, 8));
        assert!(rgba.pixels().all(|p| p.0[3] == 255));
    }

    #[test]
    fn grayscale_png_expands_to_rgba() {
        let src = DynamicImage::ImageLuma8(image::GrayImage::from_pixel(3, 2, Luma([77])));
        let bytes = encode_with_image(src, ImageFormat::Png);

        let rgba = decode_to_rgba(&bytes).expect("decode png");
        assert_eq!(rgba.get_pixel(2, 1), &Rgba([77, 77, 77, 255]));
    }

    #[test]
    fn encoded_png_round_trips_alpha() {
        let mut img = RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255]));
        img.put_pixel(0, 0, Rgba([0, 0, 0, 0]));

        for level in [PngCompression::Fast, PngCompression::Default, PngCompression::Best] {
            let png = encode_png(&img, level).expect("encode png");
            let back = image::load_from_memory_with_format(&png, ImageFormat::Png)
                .expect("decode png");
            assert_eq!(back.color(), image::ColorType::Rgba8);
            assert_eq!(back.into_rgba8(), img);
        }
    }

    #[test]
    fn garbage_input_reports_decoder_message() {
        let err = decode_to_rgba(b"definitely not an image").unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));
        assert!(!err.to_string().is_empty());
    }
}
