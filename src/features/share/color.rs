use super::models::{Bitmap, Rgb};

/// 参与平均的采样点上限；超过时按固定步长均匀抽样。
const MAX_SAMPLES: u64 = 100 * 100;

/// 代表色提取：整图 1×1 盒式平均（sRGB 各通道算术平均）。
///
/// 与设备无关、无 I/O；同一位图总是得到同一颜色。
#[derive(Debug, Clone, Copy, Default)]
pub struct ColorExtractor;

impl ColorExtractor {
    pub fn new() -> Self {
        Self
    }

    /// 提取代表色；零尺寸图片返回中性灰。
    pub fn extract(&self, bitmap: &Bitmap) -> Rgb {
        average_color(bitmap).unwrap_or(Rgb::NEUTRAL_GRAY)
    }

    /// 从编码字节提取；解码失败返回中性灰。
    pub fn extract_from_bytes(&self, bytes: &[u8]) -> Rgb {
        match Bitmap::decode(bytes) {
            Ok(bitmap) => self.extract(&bitmap),
            Err(e) => {
                tracing::debug!("取色解码失败，使用默认颜色: {e}");
                Rgb::NEUTRAL_GRAY
            }
        }
    }
}

/// 采样步长：保证采样点数不超过 `MAX_SAMPLES`，行列使用同一步长保持均匀。
fn sample_step(width: u32, height: u32) -> u32 {
    let total = u64::from(width) * u64::from(height);
    if total <= MAX_SAMPLES {
        return 1;
    }
    let ratio = (total as f64 / MAX_SAMPLES as f64).sqrt().ceil();
    ratio.max(1.0) as u32
}

fn average_color(bitmap: &Bitmap) -> Option<Rgb> {
    if bitmap.is_empty() {
        return None;
    }

    let img = bitmap.as_rgba();
    let (w, h) = img.dimensions();
    let step = sample_step(w, h) as usize;

    let mut total_r: u64 = 0;
    let mut total_g: u64 = 0;
    let mut total_b: u64 = 0;
    let mut count: u64 = 0;

    for y in (0..h).step_by(step) {
        for x in (0..w).step_by(step) {
            let px = img.get_pixel(x, y).0;
            total_r += u64::from(px[0]);
            total_g += u64::from(px[1]);
            total_b += u64::from(px[2]);
            count += 1;
        }
    }

    if count == 0 {
        return None;
    }

    // 四舍五入到最近整数
    let avg = |total: u64| ((total + count / 2) / count).min(255) as u8;
    Some(Rgb::new(avg(total_r), avg(total_g), avg(total_b)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn uniform_image_yields_exact_color() {
        let extractor = ColorExtractor::new();
        for color in [
            Rgb::new(0, 0, 0),
            Rgb::new(255, 255, 255),
            Rgb::new(12, 200, 99),
            Rgb::new(250, 1, 128),
        ] {
            let bmp = Bitmap::solid(640, 640, color);
            assert_eq!(extractor.extract(&bmp), color);
        }
    }

    #[test]
    fn two_tone_image_averages_channels() {
        let mut img = RgbaImage::new(4, 2);
        for (x, _, px) in img.enumerate_pixels_mut() {
            *px = if x < 2 {
                Rgba([200, 0, 0, 255])
            } else {
                Rgba([0, 0, 100, 255])
            };
        }
        let rgb = ColorExtractor::new().extract(&Bitmap::from_image(img));
        assert_eq!(rgb, Rgb::new(100, 0, 50));
    }

    #[test]
    fn extraction_is_deterministic() {
        let mut img = RgbaImage::new(333, 517);
        for (x, y, px) in img.enumerate_pixels_mut() {
            *px = Rgba([(x % 256) as u8, (y % 256) as u8, ((x * y) % 256) as u8, 255]);
        }
        let bmp = Bitmap::from_image(img);
        let extractor = ColorExtractor::new();
        assert_eq!(extractor.extract(&bmp), extractor.extract(&bmp.clone()));
    }

    #[test]
    fn degenerate_inputs_fall_back_to_gray() {
        let extractor = ColorExtractor::new();
        let empty = Bitmap::from_raw(0, 0, Vec::new()).unwrap();
        assert_eq!(extractor.extract(&empty), Rgb::NEUTRAL_GRAY);
        assert_eq!(
            extractor.extract_from_bytes(b"definitely not an image"),
            Rgb::NEUTRAL_GRAY
        );
    }

    #[test]
    fn large_images_are_subsampled() {
        assert_eq!(sample_step(100, 100), 1);
        assert_eq!(sample_step(200, 200), 2);
        assert!(sample_step(3000, 3000) >= 30);
    }
}
