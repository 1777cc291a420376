use std::fmt::Write;
use std::fs;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Instant;

use base64::{Engine as _, engine::general_purpose::STANDARD as base64_engine};
use image::ColorType;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, RgbaImage};
use lru::LruCache;
use resvg::usvg::{self, Options as UsvgOptions, fontdb};
use resvg::{
    render,
    tiny_skia::{Pixmap, Transform},
};

use super::composition::{
    CANVAS_HEIGHT, CANVAS_WIDTH, Composition, GradientDirection, ImageRegion, Node, Paint, Rgba,
    Stroke, TextAnchor,
};
use crate::config::{AppConfig, RenderConfig};
use crate::error::AppError;
use crate::features::share::models::{Bitmap, Rgb, TrackKey};

const MONOSPACE_FAMILY: &str = "'JetBrains Mono', 'Courier New', monospace";

// 全局字体数据库单例（首次初始化时的字体目录生效）
static GLOBAL_FONT_DB: OnceLock<Arc<fontdb::Database>> = OnceLock::new();

/// 栅格化器：把绘制指令树转换为固定分辨率位图。
///
/// 同步、无副作用；预渲染与按需回退两条路径共用同一实现。
pub trait ArtifactRasterizer: Send + Sync + 'static {
    fn rasterize(&self, composition: &Composition) -> Result<Bitmap, AppError>;
}

/// 在阻塞线程池中执行栅格化，避免阻塞异步运行时线程。
pub async fn rasterize_blocking(
    rasterizer: Arc<dyn ArtifactRasterizer>,
    composition: Composition,
) -> Result<Bitmap, AppError> {
    tokio::task::spawn_blocking(move || rasterizer.rasterize(&composition))
        .await
        .map_err(|e| AppError::Internal(format!("阻塞渲染任务执行失败: {e}")))?
}

fn init_font_db(font_dir: &Path) -> Arc<fontdb::Database> {
    let mut font_db = fontdb::Database::new();
    font_db.load_system_fonts();

    // 加载自定义字体
    if let Ok(entries) = fs::read_dir(font_dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            let is_font = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| {
                    ext.eq_ignore_ascii_case("ttf") || ext.eq_ignore_ascii_case("otf")
                });
            if path.is_file()
                && is_font
                && let Err(e) = font_db.load_font_file(&path)
            {
                tracing::error!("加载字体文件失败 '{}': {}", path.display(), e);
            }
        }
    }
    tracing::debug!("字体数据库初始化完成: faces={}", font_db.len());

    Arc::new(font_db)
}

/// 获取全局字体数据库
pub fn get_global_font_db(font_dir: &Path) -> Arc<fontdb::Database> {
    GLOBAL_FONT_DB
        .get_or_init(|| init_font_db(font_dir))
        .clone()
}

// 预缩放封面 Data URI 缓存键（身份 + 目标尺寸）
#[derive(Hash, Eq, PartialEq, Clone, Debug)]
struct ScaledImageKey {
    key: TrackKey,
    w: u32,
    h: u32,
}

/// 基于 SVG + resvg 的栅格化器
pub struct SvgRasterizer {
    settings: RenderConfig,
    font_db: Arc<fontdb::Database>,
    // 值中保留源位图句柄，命中时校验是同一份像素
    scaled_images: Mutex<LruCache<ScaledImageKey, (Bitmap, String)>>,
}

impl SvgRasterizer {
    pub fn new(settings: RenderConfig) -> Self {
        let font_db = get_global_font_db(Path::new(&settings.font_dir));
        let capacity = NonZeroUsize::new(settings.image_uri_cache_size.max(1))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            settings,
            font_db,
            scaled_images: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// 使用全局渲染配置
    pub fn from_global() -> Self {
        Self::new(AppConfig::global().render.clone())
    }

    fn filter(&self) -> FilterType {
        if self.settings.optimize_speed {
            FilterType::Triangle
        } else {
            FilterType::Lanczos3
        }
    }

    /// 将位图按目标尺寸等比裁剪填充（xMidYMid slice），编码为 JPEG Data URI。
    fn scaled_image_data_uri(&self, region: &ImageRegion) -> Option<String> {
        let target_w = region.frame.width.ceil().max(0.0) as u32;
        let target_h = region.frame.height.ceil().max(0.0) as u32;
        if target_w == 0 || target_h == 0 || region.bitmap.is_empty() {
            return None;
        }
        let key = ScaledImageKey {
            key: region.key.clone(),
            w: target_w,
            h: target_h,
        };
        if let Ok(mut cache) = self.scaled_images.lock()
            && let Some((source, uri)) = cache.get(&key)
            && source.ptr_eq(&region.bitmap)
        {
            return Some(uri.clone());
        }

        let src = DynamicImage::ImageRgba8(region.bitmap.as_rgba().clone());
        let rgb = src
            .resize_to_fill(target_w, target_h, self.filter())
            .to_rgb8();

        let mut out = Vec::new();
        let quality = self.settings.jpeg_quality.clamp(1, 100);
        let mut enc = JpegEncoder::new_with_quality(&mut out, quality);
        if let Err(e) = enc.encode(&rgb, target_w, target_h, ColorType::Rgb8.into()) {
            tracing::warn!("封面 JPEG 编码失败 ({}): {e}", region.key);
            return None;
        }
        let uri = format!("data:image/jpeg;base64,{}", base64_engine.encode(out));
        if let Ok(mut cache) = self.scaled_images.lock() {
            cache.put(key, (region.bitmap.clone(), uri.clone()));
        }
        Some(uri)
    }

    /// 生成 SVG 文本（预览工具也会直接输出）
    pub fn to_svg(&self, composition: &Composition) -> Result<String, AppError> {
        let mut writer = SvgWriter {
            out: String::with_capacity(64 * 1024),
            next_id: 0,
        };
        writer.document(composition, &self.settings.font_family, &mut |region| {
            self.scaled_image_data_uri(region)
        })?;
        Ok(writer.out)
    }

    fn usvg_options(&self) -> UsvgOptions<'static> {
        let speed = self.settings.optimize_speed;
        UsvgOptions {
            fontdb: self.font_db.clone(),
            font_family: self.settings.font_family.clone(),
            font_size: 16.0,
            languages: vec!["en".to_string(), "zh-CN".to_string()],
            shape_rendering: if speed {
                usvg::ShapeRendering::OptimizeSpeed
            } else {
                usvg::ShapeRendering::GeometricPrecision
            },
            text_rendering: if speed {
                usvg::TextRendering::OptimizeSpeed
            } else {
                usvg::TextRendering::OptimizeLegibility
            },
            image_rendering: if speed {
                usvg::ImageRendering::OptimizeSpeed
            } else {
                usvg::ImageRendering::OptimizeQuality
            },
            ..Default::default()
        }
    }
}

impl ArtifactRasterizer for SvgRasterizer {
    fn rasterize(&self, composition: &Composition) -> Result<Bitmap, AppError> {
        if composition.width != CANVAS_WIDTH || composition.height != CANVAS_HEIGHT {
            return Err(AppError::ImageRendererError(format!(
                "画布尺寸必须为 {CANVAS_WIDTH}x{CANVAS_HEIGHT}，实际为 {}x{}",
                composition.width, composition.height
            )));
        }

        // 分段计时，定位瓶颈
        let t0 = Instant::now();
        let svg = self.to_svg(composition)?;
        let t_svg = t0.elapsed();

        let tree = usvg::Tree::from_data(svg.as_bytes(), &self.usvg_options())
            .map_err(|e| AppError::ImageRendererError(format!("Failed to parse SVG: {e}")))?;
        let t_parse = t0.elapsed();

        let mut pixmap = Pixmap::new(CANVAS_WIDTH, CANVAS_HEIGHT)
            .ok_or_else(|| AppError::ImageRendererError("Failed to create pixmap".to_string()))?;
        render(&tree, Transform::default(), &mut pixmap.as_mut());
        let t_raster = t0.elapsed();

        // tiny-skia 使用预乘 alpha，转回普通 RGBA8
        let mut rgba = Vec::with_capacity((CANVAS_WIDTH * CANVAS_HEIGHT * 4) as usize);
        for px in pixmap.pixels() {
            let c = px.demultiply();
            rgba.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
        }
        let image = RgbaImage::from_raw(CANVAS_WIDTH, CANVAS_HEIGHT, rgba).ok_or_else(|| {
            AppError::ImageRendererError("pixmap 尺寸与像素数据不一致".to_string())
        })?;
        let t_total = t0.elapsed();

        tracing::debug!(
            "栅格化内部分段: SVG生成={:?}, 解析={:?}, 栅格化={:?}, 转换={:?}, 总计={:?}",
            t_svg,
            t_parse - t_svg,
            t_raster - t_parse,
            t_total - t_raster,
            t_total
        );

        Ok(Bitmap::from_image(image))
    }
}

/// 转义 XML 特殊字符；XML 1.0 不允许出现的字符（控制字符、U+FFFE/U+FFFF）替换为 U+FFFD。
fn escape_xml(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if is_xml_char(c) => out.push(c),
            _ => out.push(char::REPLACEMENT_CHARACTER),
        }
    }
    out
}

fn is_xml_char(c: char) -> bool {
    matches!(
        c,
        '\t' | '\n' | '\r'
            | '\u{20}'..='\u{D7FF}'
            | '\u{E000}'..='\u{FFFD}'
            | '\u{10000}'..='\u{10FFFF}'
    )
}

fn fmt_err(e: std::fmt::Error) -> AppError {
    AppError::ImageRendererError(format!("SVG formatting error: {e}"))
}

fn hex(rgb: Rgb) -> String {
    rgb.to_hex()
}

/// 绘制指令树 → SVG 文本
struct SvgWriter {
    out: String,
    next_id: u32,
}

impl SvgWriter {
    fn id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{}", self.next_id)
    }

    fn document(
        &mut self,
        c: &Composition,
        font_family: &str,
        resolve: &mut dyn FnMut(&ImageRegion) -> Option<String>,
    ) -> Result<(), AppError> {
        let (w, h) = (c.width, c.height);
        writeln!(
            self.out,
            r#"<svg width="{w}" height="{h}" viewBox="0 0 {w} {h}" xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink">"#
        )
        .map_err(fmt_err)?;
        writeln!(
            self.out,
            r#"<style>* {{ font-family: "{}", "Helvetica Neue", Arial, "Noto Sans CJK SC", sans-serif; }}</style>"#,
            escape_xml(font_family)
        )
        .map_err(fmt_err)?;
        writeln!(
            self.out,
            r#"<rect x="0" y="0" width="{w}" height="{h}" fill="{}" />"#,
            hex(c.background)
        )
        .map_err(fmt_err)?;
        for node in &c.nodes {
            self.node(node, resolve)?;
        }
        writeln!(self.out, "</svg>").map_err(fmt_err)?;
        Ok(())
    }

    /// 返回 fill 属性串；渐变会先写入 defs
    fn paint(&mut self, paint: &Paint) -> Result<String, AppError> {
        match paint {
            Paint::Solid(rgba) => Ok(solid_attrs("fill", *rgba)),
            Paint::LinearGradient { direction, stops } => {
                let id = self.id("grad");
                let (x2, y2) = match direction {
                    GradientDirection::Vertical => ("0%", "100%"),
                    GradientDirection::Horizontal => ("100%", "0%"),
                    GradientDirection::Diagonal => ("100%", "100%"),
                };
                write!(
                    self.out,
                    r#"<defs><linearGradient id="{id}" x1="0%" y1="0%" x2="{x2}" y2="{y2}">"#
                )
                .map_err(fmt_err)?;
                for (offset, color) in stops {
                    write!(
                        self.out,
                        r#"<stop offset="{:.1}%" stop-color="{}" stop-opacity="{:.3}" />"#,
                        offset.clamp(0.0, 1.0) * 100.0,
                        hex(color.rgb),
                        color.alpha
                    )
                    .map_err(fmt_err)?;
                }
                writeln!(self.out, "</linearGradient></defs>").map_err(fmt_err)?;
                Ok(format!(r#"fill="url(#{id})""#))
            }
        }
    }

    fn node(
        &mut self,
        node: &Node,
        resolve: &mut dyn FnMut(&ImageRegion) -> Option<String>,
    ) -> Result<(), AppError> {
        match node {
            Node::Rect {
                frame,
                radius,
                fill,
                stroke,
            } => {
                let fill = self.paint(fill)?;
                writeln!(
                    self.out,
                    r#"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" rx="{radius:.1}" ry="{radius:.1}" {fill}{} />"#,
                    frame.x,
                    frame.y,
                    frame.width,
                    frame.height,
                    stroke_attrs(stroke.as_ref())
                )
                .map_err(fmt_err)?;
            }
            Node::Circle {
                cx,
                cy,
                r,
                fill,
                stroke,
            } => {
                let fill = self.paint(fill)?;
                writeln!(
                    self.out,
                    r#"<circle cx="{cx:.1}" cy="{cy:.1}" r="{r:.1}" {fill}{} />"#,
                    stroke_attrs(stroke.as_ref())
                )
                .map_err(fmt_err)?;
            }
            Node::Line {
                x1,
                y1,
                x2,
                y2,
                stroke,
            } => {
                writeln!(
                    self.out,
                    r#"<line x1="{x1:.1}" y1="{y1:.1}" x2="{x2:.1}" y2="{y2:.1}"{} />"#,
                    stroke_attrs(Some(stroke))
                )
                .map_err(fmt_err)?;
            }
            Node::Text(run) => {
                let anchor = match run.anchor {
                    TextAnchor::Start => "start",
                    TextAnchor::Middle => "middle",
                    TextAnchor::End => "end",
                };
                let mut extra = String::new();
                if run.letter_spacing != 0.0 {
                    extra.push_str(&format!(r#" letter-spacing="{:.1}""#, run.letter_spacing));
                }
                if run.italic {
                    extra.push_str(r#" font-style="italic""#);
                }
                if run.monospace {
                    extra.push_str(&format!(r#" font-family="{MONOSPACE_FAMILY}""#));
                }
                writeln!(
                    self.out,
                    r#"<text x="{:.1}" y="{:.1}" font-size="{:.1}" font-weight="{}" text-anchor="{anchor}" {}{extra}>{}</text>"#,
                    run.x,
                    run.y,
                    run.size,
                    run.weight,
                    solid_attrs("fill", run.fill),
                    escape_xml(&run.content)
                )
                .map_err(fmt_err)?;
            }
            Node::Image(region) => self.image(region, resolve)?,
            Node::Group { region, children } => {
                writeln!(self.out, r#"<g class="{region:?}">"#).map_err(fmt_err)?;
                for child in children {
                    self.node(child, resolve)?;
                }
                writeln!(self.out, "</g>").map_err(fmt_err)?;
            }
        }
        Ok(())
    }

    fn image(
        &mut self,
        region: &ImageRegion,
        resolve: &mut dyn FnMut(&ImageRegion) -> Option<String>,
    ) -> Result<(), AppError> {
        let f = region.frame;
        let Some(href) = resolve(region) else {
            // 预缩放失败时退化为中性灰占位
            writeln!(
                self.out,
                r#"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" rx="{r:.1}" ry="{r:.1}" fill="{}" />"#,
                f.x,
                f.y,
                f.width,
                f.height,
                hex(Rgb::NEUTRAL_GRAY),
                r = region.radius
            )
            .map_err(fmt_err)?;
            return Ok(());
        };

        let clip = if region.radius > 0.0 {
            let id = self.id("clip");
            writeln!(
                self.out,
                r#"<defs><clipPath id="{id}"><rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" rx="{r:.1}" ry="{r:.1}" /></clipPath></defs>"#,
                f.x,
                f.y,
                f.width,
                f.height,
                r = region.radius
            )
            .map_err(fmt_err)?;
            format!(r#" clip-path="url(#{id})""#)
        } else {
            String::new()
        };
        writeln!(
            self.out,
            r#"<image href="{}" x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" preserveAspectRatio="xMidYMid slice"{clip} />"#,
            escape_xml(&href),
            f.x,
            f.y,
            f.width,
            f.height
        )
        .map_err(fmt_err)?;
        Ok(())
    }
}

fn solid_attrs(attr: &str, rgba: Rgba) -> String {
    if rgba.alpha >= 1.0 {
        format!(r#"{attr}="{}""#, hex(rgba.rgb))
    } else {
        format!(
            r#"{attr}="{}" {attr}-opacity="{:.3}""#,
            hex(rgba.rgb),
            rgba.alpha
        )
    }
}

fn stroke_attrs(stroke: Option<&Stroke>) -> String {
    let Some(stroke) = stroke else {
        return String::new();
    };
    let mut out = format!(
        r#" {} stroke-width="{:.1}""#,
        solid_attrs("stroke", stroke.color),
        stroke.width
    );
    if stroke.dash > 0.0 {
        out.push_str(&format!(r#" stroke-dasharray="{:.1} {:.1}""#, stroke.dash, stroke.dash));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::image::composition::{Frame, Region, TextRun};

    fn rasterizer() -> SvgRasterizer {
        SvgRasterizer::new(RenderConfig {
            optimize_speed: true,
            ..RenderConfig::default()
        })
    }

    #[test]
    fn escapes_text_content() {
        assert_eq!(escape_xml("R&B <3 \"x\""), "R&amp;B &lt;3 &quot;x&quot;");
        let mut c = Composition::new(Rgb::BLACK);
        c.push(Node::Text(TextRun::new(0.0, 10.0, "Tom & Jerry", 12.0, Rgb::WHITE)));
        let svg = rasterizer().to_svg(&c).unwrap();
        assert!(svg.contains("Tom &amp; Jerry"));
    }

    #[test]
    fn non_xml_characters_are_replaced() {
        assert_eq!(escape_xml("Mid\u{1}night\u{FFFF}"), "Mid\u{FFFD}night\u{FFFD}");
        assert_eq!(escape_xml("tab\tok\n"), "tab\tok\n");

        let mut c = Composition::new(Rgb::BLACK);
        c.push(Node::Text(TextRun::new(0.0, 10.0, "Mid\u{1}night", 12.0, Rgb::WHITE)));
        let bitmap = rasterizer().rasterize(&c).unwrap();
        assert_eq!((bitmap.width(), bitmap.height()), (CANVAS_WIDTH, CANVAS_HEIGHT));
    }

    #[test]
    fn rasterizes_background_and_shapes() {
        let red = Rgb::new(220, 20, 60);
        let mut c = Composition::new(red);
        c.push(Node::rect(
            Frame::new(0.0, 0.0, 100.0, 100.0),
            Paint::solid(Rgb::WHITE),
        ));
        let bmp = rasterizer().rasterize(&c).unwrap();
        assert_eq!((bmp.width(), bmp.height()), (CANVAS_WIDTH, CANVAS_HEIGHT));
        assert_eq!(bmp.as_rgba().get_pixel(50, 50).0, [255, 255, 255, 255]);
        assert_eq!(bmp.as_rgba().get_pixel(500, 1000).0, [220, 20, 60, 255]);
    }

    #[test]
    fn embeds_images_and_reuses_scaled_uri() {
        let art = Bitmap::solid(64, 64, Rgb::new(0, 0, 255));
        let mut c = Composition::new(Rgb::BLACK);
        c.push(Node::group(
            Region::Hero,
            vec![Node::image(
                Frame::new(100.0, 100.0, 200.0, 200.0),
                12.0,
                TrackKey::User,
                art.clone(),
            )],
        ));
        let r = rasterizer();
        let svg = r.to_svg(&c).unwrap();
        assert!(svg.contains("data:image/jpeg;base64,"));
        assert!(svg.contains("clip-path"));
        assert_eq!(r.scaled_images.lock().unwrap().len(), 1);

        let bmp = r.rasterize(&c).unwrap();
        let px = bmp.as_rgba().get_pixel(200, 200).0;
        assert!(px[2] > 200 && px[0] < 40, "expected blue, got {px:?}");
        assert_eq!(r.scaled_images.lock().unwrap().len(), 1);
    }

    #[test]
    fn wrong_canvas_size_is_rejected() {
        let mut c = Composition::new(Rgb::BLACK);
        c.width = 512;
        let err = rasterizer().rasterize(&c).unwrap_err();
        assert!(matches!(err, AppError::ImageRendererError(_)));
    }

    #[test]
    fn gradients_get_unique_ids() {
        let mut c = Composition::new(Rgb::BLACK);
        for _ in 0..2 {
            c.push(Node::rect(
                Frame::new(0.0, 0.0, 10.0, 10.0),
                Paint::gradient(GradientDirection::Vertical, Rgb::WHITE, Rgb::BLACK),
            ));
        }
        let svg = rasterizer().to_svg(&c).unwrap();
        assert!(svg.contains(r#"id="grad1""#));
        assert!(svg.contains(r#"id="grad2""#));
    }
}
