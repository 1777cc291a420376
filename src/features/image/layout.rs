//! 各样式共用的布局规则：缩略图行的按数量分档、文本回退与截断。

use chrono::NaiveDate;
use unicode_width::UnicodeWidthChar;

use crate::features::share::models::{Bitmap, RenderSnapshot, Track, TrackKey};

/// 单行最多展示的封面数
pub const MAX_ROW_ENTRIES: usize = 4;
/// 好友列表最多展示的行数
pub const MAX_FRIEND_ROWS: usize = 4;

/// 艺人名缺失时的占位（长文本位置）
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
/// 艺人名缺失时的占位（紧凑位置）
pub const UNKNOWN_SHORT: &str = "Unknown";

const ELLIPSIS: char = '…';

/// 磁带窗口缩略图边长：1 张 140，2~3 张 120，4 张及以上 100。
pub fn thumbnail_edge(count: usize) -> f32 {
    match count {
        0 | 1 => 140.0,
        2..=3 => 120.0,
        _ => 100.0,
    }
}

/// 票根条码行封面边长：与 [`thumbnail_edge`] 同一分档，100/84/72。
pub fn barcode_edge(count: usize) -> f32 {
    match count {
        0 | 1 => 100.0,
        2..=3 => 84.0,
        _ => 72.0,
    }
}

/// 行内的一格封面
#[derive(Debug, Clone)]
pub struct RowEntry<'a> {
    pub key: TrackKey,
    pub track: &'a Track,
    pub bitmap: &'a Bitmap,
}

/// 参与封面行的条目：先过滤掉没有位图的条目，再取前 4 个。
///
/// 缺失的封面不占位，后续条目前移，行宽按新的数量重新分档。
pub fn art_row(snapshot: &RenderSnapshot) -> Vec<RowEntry<'_>> {
    snapshot
        .share()
        .entries()
        .filter_map(|(key, track)| {
            let bitmap = snapshot.image(&key)?;
            Some(RowEntry { key, track, bitmap })
        })
        .take(MAX_ROW_ENTRIES)
        .collect()
}

/// 一行等边正方形的横向位置（整体居中）
pub fn row_positions(count: usize, edge: f32, gap: f32, center_x: f32) -> Vec<f32> {
    if count == 0 {
        return Vec::new();
    }
    let total = edge * count as f32 + gap * (count - 1) as f32;
    let start = center_x - total / 2.0;
    (0..count).map(|i| start + i as f32 * (edge + gap)).collect()
}

/// 艺人名，缺失时使用 "Unknown Artist"
pub fn artist_or_unknown(track: &Track) -> &str {
    track.artist().unwrap_or(UNKNOWN_ARTIST)
}

/// 艺人名，缺失时使用 "Unknown"
pub fn artist_or_short(track: &Track) -> &str {
    track.artist().unwrap_or(UNKNOWN_SHORT)
}

/// 歌曲名；空白时使用 "Untitled"
pub fn title_of(track: &Track) -> &str {
    let name = track.name.trim();
    if name.is_empty() { "Untitled" } else { name }
}

/// 按显示宽度截断（全角字符计 2 列），超出时以省略号结尾。
pub fn truncate(text: &str, max_columns: usize) -> String {
    let text = text.trim();
    let mut width = 0usize;
    let total: usize = text.chars().map(|c| c.width().unwrap_or(0)).sum();
    if total <= max_columns {
        return text.to_string();
    }
    let budget = max_columns.saturating_sub(1);
    let mut out = String::new();
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if width + w > budget {
            break;
        }
        width += w;
        out.push(ch);
    }
    let mut out = out.trim_end().to_string();
    out.push(ELLIPSIS);
    out
}

/// 按字号估算单行可容纳的列数（拉丁字符约为 0.55em 宽）
pub fn columns_for(width: f32, font_size: f32) -> usize {
    if font_size <= 0.0 {
        return 0;
    }
    (width / (font_size * 0.55)).floor().max(1.0) as usize
}

/// 截断到给定宽度与字号
pub fn fit(text: &str, width: f32, font_size: f32) -> String {
    truncate(text, columns_for(width, font_size))
}

/// 长日期："OCTOBER 19, 2026"
pub fn long_date(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string().to_uppercase()
}

/// 短日期："10.19.26"
pub fn short_date(date: NaiveDate) -> String {
    date.format("%m.%d.%y").to_string()
}

/// 星期："MONDAY"
pub fn weekday(date: NaiveDate) -> String {
    date.format("%A").to_string().to_uppercase()
}
