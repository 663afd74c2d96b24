//! 进程内去背景：以边缘像素估计背景色，从图像四周向内泛洪，
//! 把与背景色足够接近且与边缘连通的像素置为透明。
//!
//! 只适合纯色/近似纯色背景，不依赖任何模型文件。

use std::collections::VecDeque;

use axum::body::Bytes;
use image::RgbaImage;

use super::codec::{decode_to_rgba, encode_png};
use super::remover::{BackgroundRemover, RemovalError};
use crate::config::{LocalRemoverConfig, PngCompression};

#[derive(Debug, Clone, Copy)]
pub struct BorderKeyRemover {
    tolerance: f32,
    feather: f32,
    compression: PngCompression,
}

impl BorderKeyRemover {
    pub fn new(cfg: &LocalRemoverConfig, compression: PngCompression) -> Self {
        Self {
            tolerance: cfg.tolerance.max(0.0),
            feather: cfg.feather.max(0.0),
            compression,
        }
    }

    /// 解码 → 抠图 → 编码为 PNG（同步，调用方负责放到阻塞线程池）
    pub fn process(&self, input: &[u8]) -> Result<Vec<u8>, RemovalError> {
        let mut img = decode_to_rgba(input)?;
        self.key_out(&mut img);
        Ok(encode_png(&img, self.compression)?)
    }

    /// 原地修改 alpha 通道
    pub fn key_out(&self, img: &mut RgbaImage) {
        let Some(bg) = estimate_background(img) else {
            return;
        };
        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return;
        }
        let (w, h) = (width as usize, height as usize);
        let reach = self.tolerance + self.feather;

        let mut visited = vec![false; w * h];
        let mut queue = VecDeque::new();

        for x in 0..w {
            queue.push_back((x, 0));
            queue.push_back((x, h - 1));
        }
        for y in 0..h {
            queue.push_back((0, y));
            queue.push_back((w - 1, y));
        }

        while let Some((x, y)) = queue.pop_front() {
            let idx = y * w + x;
            if visited[idx] {
                continue;
            }
            visited[idx] = true;

            let px = img.get_pixel_mut(x as u32, y as u32);
            let alpha = px.0[3];
            let dist = color_distance(bg, [px.0[0], px.0[1], px.0[2]]);
            if alpha != 0 && dist > reach {
                continue;
            }

            if dist <= self.tolerance || alpha == 0 {
                px.0[3] = 0;
            } else {
                // 过渡带：距离越接近 reach 越不透明
                let keep = (dist - self.tolerance) / self.feather;
                px.0[3] = (f32::from(alpha) * keep.clamp(0.0, 1.0)).round() as u8;
            }

            if x > 0 {
                queue.push_back((x - 1, y));
            }
            if x + 1 < w {
                queue.push_back((x + 1, y));
            }
            if y > 0 {
                queue.push_back((x, y - 1));
            }
            if y + 1 < h {
                queue.push_back((x, y + 1));
            }
        }
    }
}

#[async_trait::async_trait]
impl BackgroundRemover for BorderKeyRemover {
    async fn remove(&self, input: Bytes) -> Result<Bytes, RemovalError> {
        let this = *self;
        let out = tokio::task::spawn_blocking(move || this.process(&input))
            .await
            .map_err(|e| RemovalError::Task(e.to_string()))??;
        Ok(Bytes::from(out))
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

/// 取边缘上非全透明像素的逐通道中位数作为背景色；边缘全透明时返回 None。
fn estimate_background(img: &RgbaImage) -> Option<[u8; 3]> {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return None;
    }

    let mut channels: [Vec<u8>; 3] = Default::default();
    let mut push = |x: u32, y: u32| {
        let p = img.get_pixel(x, y).0;
        if p[3] == 0 {
            return;
        }
        for (c, v) in channels.iter_mut().zip(p) {
            c.push(v);
        }
    };
    for x in 0..w {
        push(x, 0);
        if h > 1 {
            push(x, h - 1);
        }
    }
    for y in 1..h.saturating_sub(1) {
        push(0, y);
        if w > 1 {
            push(w - 1, y);
        }
    }

    if channels[0].is_empty() {
        return None;
    }
    let mut bg = [0u8; 3];
    for (out, c) in bg.iter_mut().zip(channels.iter_mut()) {
        c.sort_unstable();
        *out = c[c.len() / 2];
    }
    Some(bg)
}

fn color_distance(a: [u8; 3], b: [u8; 3]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(&x, y)| {
            let d = f32::from(x) - f32::from(y);
            d * d
        })
        .sum::<f32>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const RED: Rgba<u8> = Rgba([200, 20, 20, 255]);

    fn remover() -> BorderKeyRemover {
        BorderKeyRemover::new(&LocalRemoverConfig::default(), PngCompression::Fast)
    }

    /// 白底，中心是一个红色方框，方框内部再留一块白色
    fn framed_square() -> RgbaImage {
        let mut img = RgbaImage::from_pixel(20, 20, WHITE);
        for y in 5..15 {
            for x in 5..15 {
                img.put_pixel(x, y, RED);
            }
        }
        for y in 8..12 {
            for x in 8..12 {
                img.put_pixel(x, y, WHITE);
            }
        }
        img
    }

    #[test]
    fn estimate_background_uses_border_median() {
        let mut img = RgbaImage::from_pixel(5, 5, WHITE);
        img.put_pixel(0, 0, RED);
        assert_eq!(estimate_background(&img), Some([255, 255, 255]));
    }

    #[test]
    fn estimate_background_skips_transparent_border() {
        let img = RgbaImage::from_pixel(3, 3, Rgba([0, 0, 0, 0]));
        assert_eq!(estimate_background(&img), None);
    }

    #[test]
    fn key_out_clears_connected_background_only() {
        let mut img = framed_square();
        remover().key_out(&mut img);

        assert_eq!(img.get_pixel(0, 0).0[3], 0);
        assert_eq!(img.get_pixel(19, 19).0[3], 0);
        assert_eq!(img.get_pixel(4, 10).0[3], 0);
        // 主体保持不透明
        assert_eq!(img.get_pixel(6, 6).0[3], 255);
        // 与边缘不连通的白色区域不受影响
        assert_eq!(img.get_pixel(10, 10).0[3], 255);
    }

    #[test]
    fn feather_band_gets_partial_alpha() {
        let cfg = LocalRemoverConfig {
            tolerance: 10.0,
            feather: 20.0,
        };
        let remover = BorderKeyRemover::new(&cfg, PngCompression::Fast);
        let mut img = RgbaImage::from_pixel(3, 3, WHITE);
        // 距离白色 20（位于过渡带中点）
        img.put_pixel(1, 1, Rgba([255, 255, 235, 255]));
        remover.key_out(&mut img);

        let alpha = img.get_pixel(1, 1).0[3];
        assert!(alpha > 100 && alpha < 160, "alpha = {alpha}");
    }

    #[test]
    fn process_outputs_rgba_png() {
        let mut src = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(framed_square())
            .write_to(&mut src, image::ImageFormat::Png)
            .expect("encode source");

        let out = remover().process(src.get_ref()).expect("process");
        let decoded = image::load_from_memory(&out).expect("decode output");
        assert_eq!(decoded.color(), image::ColorType::Rgba8);
        assert_eq!(decoded.to_rgba8().get_pixel(0, 0).0[3], 0);
    }

    #[tokio::test]
    async fn remove_reports_decode_failure() {
        let err = remover()
            .remove(Bytes::from_static(b"not an image"))
            .await
            .unwrap_err();
        assert!(matches!(err, RemovalError::Codec(_)));
    }
}
