//! 与绘图后端无关的绘制指令树。
//!
//! 样式模板只产出 [`Composition`]；栅格化器负责把它交给具体后端（当前为 SVG + resvg）。
//! 所有坐标都是 1080×1920 逻辑画布上的绝对坐标。

use crate::features::share::models::{Bitmap, Rgb, TrackKey};

/// 固定逻辑画布宽度
pub const CANVAS_WIDTH: u32 = 1080;
/// 固定逻辑画布高度
pub const CANVAS_HEIGHT: u32 = 1920;

/// 带透明度的颜色
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub rgb: Rgb,
    pub alpha: f32,
}

impl Rgba {
    pub fn opaque(rgb: Rgb) -> Self {
        Self { rgb, alpha: 1.0 }
    }

    pub fn with_alpha(rgb: Rgb, alpha: f32) -> Self {
        Self {
            rgb,
            alpha: alpha.clamp(0.0, 1.0),
        }
    }
}

impl From<Rgb> for Rgba {
    fn from(rgb: Rgb) -> Self {
        Rgba::opaque(rgb)
    }
}

/// 渐变方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradientDirection {
    Vertical,
    Horizontal,
    Diagonal,
}

/// 填充方式
#[derive(Debug, Clone, PartialEq)]
pub enum Paint {
    Solid(Rgba),
    LinearGradient {
        direction: GradientDirection,
        stops: Vec<(f32, Rgba)>,
    },
}

impl Paint {
    pub fn solid(rgb: Rgb) -> Self {
        Paint::Solid(Rgba::opaque(rgb))
    }

    pub fn translucent(rgb: Rgb, alpha: f32) -> Self {
        Paint::Solid(Rgba::with_alpha(rgb, alpha))
    }

    /// 两色线性渐变
    pub fn gradient(direction: GradientDirection, from: Rgb, to: Rgb) -> Self {
        Paint::LinearGradient {
            direction,
            stops: vec![(0.0, Rgba::opaque(from)), (1.0, Rgba::opaque(to))],
        }
    }
}

/// 轴对齐矩形区域
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Frame {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center_x(&self) -> f32 {
        self.x + self.width / 2.0
    }
}

/// 描边
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub color: Rgba,
    pub width: f32,
    /// 虚线段长（0 表示实线）
    pub dash: f32,
}

impl Stroke {
    pub fn solid(color: Rgba, width: f32) -> Self {
        Self {
            color,
            width,
            dash: 0.0,
        }
    }

    pub fn dashed(color: Rgba, width: f32, dash: f32) -> Self {
        Self { color, width, dash }
    }
}

/// 文本锚点
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAnchor {
    Start,
    Middle,
    End,
}

/// 单行文本
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub x: f32,
    /// 基线 y 坐标
    pub y: f32,
    pub content: String,
    pub size: f32,
    pub weight: u16,
    pub fill: Rgba,
    pub anchor: TextAnchor,
    pub letter_spacing: f32,
    pub italic: bool,
    pub monospace: bool,
}

impl TextRun {
    pub fn new(x: f32, y: f32, content: impl Into<String>, size: f32, fill: Rgb) -> Self {
        Self {
            x,
            y,
            content: content.into(),
            size,
            weight: 400,
            fill: Rgba::opaque(fill),
            anchor: TextAnchor::Start,
            letter_spacing: 0.0,
            italic: false,
            monospace: false,
        }
    }

    pub fn weight(mut self, weight: u16) -> Self {
        self.weight = weight;
        self
    }

    pub fn bold(self) -> Self {
        self.weight(700)
    }

    pub fn anchor(mut self, anchor: TextAnchor) -> Self {
        self.anchor = anchor;
        self
    }

    pub fn centered(self) -> Self {
        self.anchor(TextAnchor::Middle)
    }

    pub fn spacing(mut self, letter_spacing: f32) -> Self {
        self.letter_spacing = letter_spacing;
        self
    }

    pub fn alpha(mut self, alpha: f32) -> Self {
        self.fill = Rgba::with_alpha(self.fill.rgb, alpha);
        self
    }

    pub fn italic(mut self) -> Self {
        self.italic = true;
        self
    }

    pub fn monospace(mut self) -> Self {
        self.monospace = true;
        self
    }
}

/// 图片区域（按 cover 方式填充裁剪）
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRegion {
    pub frame: Frame,
    pub radius: f32,
    /// 图片来源身份（后端用于缓存预缩放结果）
    pub key: TrackKey,
    pub bitmap: Bitmap,
}

/// 区域标签，用于测试与调试时定位子树
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    Background,
    Header,
    Hero,
    ThumbnailRow,
    FriendList,
    Swatches,
    Footer,
    /// 缺失封面的占位色块
    Placeholder,
    /// 纯装饰区域，不承载任何信息（随机条码等）
    Decoration,
}

/// 绘制节点
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Rect {
        frame: Frame,
        radius: f32,
        fill: Paint,
        stroke: Option<Stroke>,
    },
    Circle {
        cx: f32,
        cy: f32,
        r: f32,
        fill: Paint,
        stroke: Option<Stroke>,
    },
    Line {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        stroke: Stroke,
    },
    Text(TextRun),
    Image(ImageRegion),
    Group {
        region: Region,
        children: Vec<Node>,
    },
}

impl Node {
    pub fn rect(frame: Frame, fill: Paint) -> Self {
        Node::Rect {
            frame,
            radius: 0.0,
            fill,
            stroke: None,
        }
    }

    pub fn rounded(frame: Frame, radius: f32, fill: Paint) -> Self {
        Node::Rect {
            frame,
            radius,
            fill,
            stroke: None,
        }
    }

    pub fn circle(cx: f32, cy: f32, r: f32, fill: Paint) -> Self {
        Node::Circle {
            cx,
            cy,
            r,
            fill,
            stroke: None,
        }
    }

    pub fn line(x1: f32, y1: f32, x2: f32, y2: f32, stroke: Stroke) -> Self {
        Node::Line {
            x1,
            y1,
            x2,
            y2,
            stroke,
        }
    }

    pub fn image(frame: Frame, radius: f32, key: TrackKey, bitmap: Bitmap) -> Self {
        Node::Image(ImageRegion {
            frame,
            radius,
            key,
            bitmap,
        })
    }

    pub fn group(region: Region, children: Vec<Node>) -> Self {
        Node::Group { region, children }
    }

    /// 深度优先遍历（包含自身）
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Node)) {
        visit(self);
        if let Node::Group { children, .. } = self {
            for child in children {
                child.walk(visit);
            }
        }
    }
}

/// 一张分享图的完整绘制指令
#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    pub width: u32,
    pub height: u32,
    pub background: Rgb,
    pub nodes: Vec<Node>,
}

impl Composition {
    /// 固定尺寸的空白画布
    pub fn new(background: Rgb) -> Self {
        Self {
            width: CANVAS_WIDTH,
            height: CANVAS_HEIGHT,
            background,
            nodes: Vec::new(),
        }
    }

    pub fn push(&mut self, node: Node) {
        self.nodes.push(node);
    }

    /// 查找第一个指定区域的分组
    pub fn region(&self, region: Region) -> Option<&Node> {
        let mut found = None;
        for node in &self.nodes {
            node.walk(&mut |n| {
                if found.is_none()
                    && let Node::Group { region: r, .. } = n
                    && *r == region
                {
                    found = Some(n);
                }
            });
            if found.is_some() {
                break;
            }
        }
        found
    }

    /// 指定区域内的所有图片区域
    pub fn images_in(&self, region: Region) -> Vec<&ImageRegion> {
        let mut out = Vec::new();
        if let Some(group) = self.region(region) {
            group.walk(&mut |n| {
                if let Node::Image(img) = n {
                    out.push(img);
                }
            });
        }
        out
    }

    /// 所有文本内容（按绘制顺序）
    pub fn texts(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for node in &self.nodes {
            node.walk(&mut |n| {
                if let Node::Text(run) = n {
                    out.push(run.content.as_str());
                }
            });
        }
        out
    }

    /// 去掉纯装饰区域后的副本（用于幂等性比较）
    pub fn without_decoration(&self) -> Composition {
        fn strip(nodes: &[Node]) -> Vec<Node> {
            nodes
                .iter()
                .filter(|n| {
                    !matches!(
                        n,
                        Node::Group {
                            region: Region::Decoration,
                            ..
                        }
                    )
                })
                .map(|n| match n {
                    Node::Group { region, children } => Node::Group {
                        region: *region,
                        children: strip(children),
                    },
                    other => other.clone(),
                })
                .collect()
        }
        Composition {
            width: self.width,
            height: self.height,
            background: self.background,
            nodes: strip(&self.nodes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_lookup_descends_into_groups() {
        let bmp = Bitmap::solid(2, 2, Rgb::WHITE);
        let mut c = Composition::new(Rgb::BLACK);
        c.push(Node::group(
            Region::Hero,
            vec![Node::group(
                Region::ThumbnailRow,
                vec![Node::image(
                    Frame::new(0.0, 0.0, 10.0, 10.0),
                    0.0,
                    TrackKey::User,
                    bmp,
                )],
            )],
        ));
        assert_eq!(c.images_in(Region::ThumbnailRow).len(), 1);
        assert_eq!(c.images_in(Region::Hero).len(), 1);
        assert!(c.region(Region::Footer).is_none());
    }

    #[test]
    fn decoration_is_stripped_recursively() {
        let mut c = Composition::new(Rgb::BLACK);
        c.push(Node::group(
            Region::Footer,
            vec![
                Node::Text(TextRun::new(0.0, 0.0, "keep", 10.0, Rgb::WHITE)),
                Node::group(Region::Decoration, vec![Node::rect(
                    Frame::new(0.0, 0.0, 1.0, 1.0),
                    Paint::solid(Rgb::WHITE),
                )]),
            ],
        ));
        let stripped = c.without_decoration();
        assert!(stripped.region(Region::Decoration).is_none());
        assert_eq!(stripped.texts(), vec!["keep"]);
        assert_eq!((stripped.width, stripped.height), (CANVAS_WIDTH, CANVAS_HEIGHT));
    }
}
