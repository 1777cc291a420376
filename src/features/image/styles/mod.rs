//! 六种分享图样式。每个样式都是纯函数：`(&RenderSnapshot) -> Composition`。

mod festival;
mod magazine;
mod mixtape;
mod notifications;
mod palette;
mod ticket;

use chrono::{Datelike, NaiveDate};
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

use super::composition::{Composition, Frame, GradientDirection, Node, Paint, Region, TextRun};
use super::layout::{self, MAX_FRIEND_ROWS, RowEntry};
use crate::features::share::models::{FriendTrack, RenderSnapshot, Rgb, Style, TrackKey};

/// 样式工厂：按样式生成绘制指令树
pub fn compose(style: Style, snapshot: &RenderSnapshot) -> Composition {
    match style {
        Style::Magazine => magazine::compose(snapshot),
        Style::Festival => festival::compose(snapshot),
        Style::Mixtape => mixtape::compose(snapshot),
        Style::Notifications => notifications::compose(snapshot),
        Style::Palette => palette::compose(snapshot),
        Style::Ticket => ticket::compose(snapshot),
    }
}

/// 装饰性随机数：以会话日期与样式为种子，同一快照的输出可逐字节复现。
pub(crate) fn decorative_rng(style: Style, date: NaiveDate) -> StdRng {
    let day = u64::from(date.num_days_from_ce().unsigned_abs());
    StdRng::seed_from_u64((day << 8) | style.index() as u64)
}

/// 随机宽度的装饰条码，整体标记为装饰区域
pub(crate) fn random_bars(rng: &mut StdRng, frame: Frame, color: Rgb) -> Node {
    let mut bars = Vec::new();
    let mut x = frame.x;
    while x < frame.right() {
        let width: f32 = rng.gen_range(2.0..9.0);
        let width = width.min(frame.right() - x);
        bars.push(Node::rect(
            Frame::new(x, frame.y, width, frame.height),
            Paint::solid(color),
        ));
        x += width + rng.gen_range(3.0..8.0);
    }
    Node::group(Region::Decoration, bars)
}

/// 封面或占位色块（缺失时使用该条目的主色，取不到主色则为中性灰）
pub(crate) fn cover(snapshot: &RenderSnapshot, key: &TrackKey, frame: Frame, radius: f32) -> Node {
    match snapshot.image(key) {
        Some(bitmap) => Node::image(frame, radius, key.clone(), bitmap.clone()),
        None => {
            let base = snapshot.color(key);
            let glyph_size = (frame.width.min(frame.height) * 0.4).max(8.0);
            Node::group(
                Region::Placeholder,
                vec![
                    Node::rounded(
                        frame,
                        radius,
                        Paint::gradient(
                            GradientDirection::Diagonal,
                            base.lighten(0.15),
                            base.darken(0.25),
                        ),
                    ),
                    Node::Text(
                        TextRun::new(
                            frame.center_x(),
                            frame.y + frame.height / 2.0 + glyph_size * 0.35,
                            "♪",
                            glyph_size,
                            base.contrasting_text(),
                        )
                        .centered()
                        .alpha(0.6),
                    ),
                ],
            )
        }
    }
}

/// 封面行：只含有位图的条目，最多 4 个，边长按数量分档，整体以 (center_x, center_y) 居中。
pub(crate) fn art_row(
    snapshot: &RenderSnapshot,
    edge_for: fn(usize) -> f32,
    center_x: f32,
    center_y: f32,
    gap: f32,
    radius: f32,
) -> (Node, f32) {
    let entries: Vec<RowEntry<'_>> = layout::art_row(snapshot);
    let edge = edge_for(entries.len());
    let y = center_y - edge / 2.0;
    let xs = layout::row_positions(entries.len(), edge, gap, center_x);
    let nodes = entries
        .into_iter()
        .zip(xs)
        .map(|(entry, x)| {
            Node::image(
                Frame::new(x, y, edge, edge),
                radius,
                entry.key,
                entry.bitmap.clone(),
            )
        })
        .collect();
    (Node::group(Region::ThumbnailRow, nodes), edge)
}

/// 好友列表：最多 4 行，不足时只展示已有条目
pub(crate) fn listed_friends(snapshot: &RenderSnapshot) -> &[FriendTrack] {
    let friends = &snapshot.share().friend_tracks;
    &friends[..friends.len().min(MAX_FRIEND_ROWS)]
}

/// 页脚品牌字样
pub(crate) fn brand_footer(y: f32, color: Rgb) -> Node {
    Node::group(
        Region::Footer,
        vec![
            Node::Text(
                TextRun::new(540.0, y, "phlock", 40.0, color)
                    .bold()
                    .centered()
                    .spacing(4.0),
            ),
            Node::Text(
                TextRun::new(540.0, y + 44.0, "your daily music circle", 24.0, color)
                    .centered()
                    .alpha(0.6),
            ),
        ],
    )
}
