use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDate;
use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// 单首歌曲（分享数据加载时创建，之后只读）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist_name: Option<String>,
    #[serde(
        default,
        alias = "albumArtURL",
        skip_serializing_if = "Option::is_none"
    )]
    pub album_art_url: Option<String>,
}

impl Track {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            artist_name: None,
            album_art_url: None,
        }
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist_name = Some(artist.into());
        self
    }

    pub fn with_album_art(mut self, url: impl Into<String>) -> Self {
        self.album_art_url = Some(url.into());
        self
    }

    /// 艺人名；缺失或空白时返回 `None`，由调用方统一套用占位文本。
    pub fn artist(&self) -> Option<&str> {
        self.artist_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// 有效的封面 URL（空串视为缺失）
    pub fn art_url(&self) -> Option<&str> {
        self.album_art_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// 好友分享的歌曲
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendTrack {
    #[serde(flatten)]
    pub track: Track,
    pub username: String,
    /// 稳定身份（好友/分享记录 ID）
    pub id: String,
}

impl FriendTrack {
    pub fn new(id: impl Into<String>, username: impl Into<String>, track: Track) -> Self {
        Self {
            track,
            username: username.into(),
            id: id.into(),
        }
    }

    pub fn key(&self) -> TrackKey {
        TrackKey::Friend(self.id.clone())
    }
}

/// 图片/颜色映射所用的身份键。用户自己的歌曲使用哨兵键 `User`。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TrackKey {
    User,
    Friend(String),
}

impl fmt::Display for TrackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKey::User => f.write_str("user"),
            TrackKey::Friend(id) => write!(f, "friend:{id}"),
        }
    }
}

/// 一次分享会话的源数据快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareSnapshot {
    pub date: NaiveDate,
    pub user_display_name: String,
    pub user_track: Track,
    #[serde(default)]
    pub friend_tracks: Vec<FriendTrack>,
}

impl ShareSnapshot {
    /// 按展示顺序列出所有条目：用户自己的歌曲在前，好友按原顺序在后。
    pub fn entries(&self) -> impl Iterator<Item = (TrackKey, &Track)> {
        std::iter::once((TrackKey::User, &self.user_track)).chain(
            self.friend_tracks
                .iter()
                .map(|friend| (friend.key(), &friend.track)),
        )
    }
}

/// 解码后的位图（非预乘 RGBA8）。克隆只增加引用计数。
#[derive(Clone)]
pub struct Bitmap {
    image: Arc<RgbaImage>,
}

impl Bitmap {
    pub fn from_image(image: RgbaImage) -> Self {
        Self {
            image: Arc::new(image),
        }
    }

    /// 由原始 RGBA8 像素构建；长度与尺寸不符时返回 `None`。
    pub fn from_raw(width: u32, height: u32, rgba: Vec<u8>) -> Option<Self> {
        RgbaImage::from_raw(width, height, rgba).map(Self::from_image)
    }

    /// 纯色位图（测试与占位使用）
    pub fn solid(width: u32, height: u32, color: Rgb) -> Self {
        Self::from_image(RgbaImage::from_pixel(
            width,
            height,
            image::Rgba([color.r, color.g, color.b, 255]),
        ))
    }

    /// 从编码后的字节（PNG/JPEG/...）解码
    pub fn decode(bytes: &[u8]) -> Result<Self, image::ImageError> {
        let img = image::load_from_memory(bytes)?;
        Ok(Self::from_image(img.to_rgba8()))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn as_rgba(&self) -> &RgbaImage {
        &self.image
    }

    /// 编码为 PNG，交给系统分享面板使用
    pub fn encode_png(&self) -> Result<Vec<u8>, AppError> {
        let (w, h) = (self.width(), self.height());
        let mut out = Vec::with_capacity((w as usize) * (h as usize));
        {
            let mut encoder = png::Encoder::new(&mut out, w, h);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            encoder.set_compression(png::Compression::Default);
            let mut writer = encoder.write_header().map_err(|e| {
                AppError::ImageRendererError(format!("PNG write_header error: {e}"))
            })?;
            writer.write_image_data(self.image.as_raw()).map_err(|e| {
                AppError::ImageRendererError(format!("PNG write_image_data error: {e}"))
            })?;
            writer
                .finish()
                .map_err(|e| AppError::ImageRendererError(format!("PNG finish error: {e}")))?;
        }
        Ok(out)
    }

    /// 两个句柄是否指向同一份像素（不比较内容）
    pub fn ptr_eq(&self, other: &Bitmap) -> bool {
        Arc::ptr_eq(&self.image, &other.image)
    }
}

impl PartialEq for Bitmap {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || *self.image == *other.image
    }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

/// sRGB 颜色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// 取色失败时的统一默认值
    pub const NEUTRAL_GRAY: Rgb = Rgb::new(128, 128, 128);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// 相对亮度（0..1，近似 Rec.709 权重）
    pub fn luminance(self) -> f32 {
        (0.2126 * f32::from(self.r) + 0.7152 * f32::from(self.g) + 0.0722 * f32::from(self.b))
            / 255.0
    }

    /// 线性插值：t=0 为自身，t=1 为 `other`
    pub fn mix(self, other: Rgb, t: f32) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let lerp = |a: u8, b: u8| -> u8 {
            (f32::from(a) + (f32::from(b) - f32::from(a)) * t).round() as u8
        };
        Rgb::new(
            lerp(self.r, other.r),
            lerp(self.g, other.g),
            lerp(self.b, other.b),
        )
    }

    pub fn darken(self, amount: f32) -> Rgb {
        self.mix(Rgb::BLACK, amount)
    }

    pub fn lighten(self, amount: f32) -> Rgb {
        self.mix(Rgb::WHITE, amount)
    }

    /// 与该底色对比度足够的文字颜色
    pub fn contrasting_text(self) -> Rgb {
        if self.luminance() > 0.6 {
            Rgb::new(17, 17, 17)
        } else {
            Rgb::WHITE
        }
    }
}

/// 分享会话的渲染数据：源数据 + 已获取的封面与主色。
///
/// 只能通过 [`RenderSnapshotBuilder`] 构建，构建后不可变；
/// 缺失的图片/颜色是合法的永久状态，不会自动重试。
#[derive(Debug, Clone)]
pub struct RenderSnapshot {
    share: Arc<ShareSnapshot>,
    images: HashMap<TrackKey, Bitmap>,
    colors: HashMap<TrackKey, Rgb>,
    complete: bool,
}

impl RenderSnapshot {
    pub fn builder(share: Arc<ShareSnapshot>) -> RenderSnapshotBuilder {
        RenderSnapshotBuilder {
            share,
            images: HashMap::new(),
            colors: HashMap::new(),
        }
    }

    /// 尚未获取任何资源的初始快照
    pub fn pending(share: Arc<ShareSnapshot>) -> Self {
        Self {
            share,
            images: HashMap::new(),
            colors: HashMap::new(),
            complete: false,
        }
    }

    pub fn share(&self) -> &ShareSnapshot {
        &self.share
    }

    pub fn image(&self, key: &TrackKey) -> Option<&Bitmap> {
        self.images.get(key)
    }

    pub fn has_image(&self, key: &TrackKey) -> bool {
        self.images.contains_key(key)
    }

    /// 取色结果；缺失时统一回退到中性灰。
    pub fn color(&self, key: &TrackKey) -> Rgb {
        self.color_opt(key).unwrap_or(Rgb::NEUTRAL_GRAY)
    }

    pub fn color_opt(&self, key: &TrackKey) -> Option<Rgb> {
        self.colors.get(key).copied()
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// 所有条目是否都已落定（成功或失败）
    pub fn is_complete(&self) -> bool {
        self.complete
    }
}

/// [`RenderSnapshot`] 的一次性构建器
#[derive(Debug, Clone)]
pub struct RenderSnapshotBuilder {
    share: Arc<ShareSnapshot>,
    images: HashMap<TrackKey, Bitmap>,
    colors: HashMap<TrackKey, Rgb>,
}

impl RenderSnapshotBuilder {
    pub fn image(mut self, key: TrackKey, bitmap: Bitmap) -> Self {
        self.images.insert(key, bitmap);
        self
    }

    pub fn color(mut self, key: TrackKey, color: Rgb) -> Self {
        self.colors.insert(key, color);
        self
    }

    pub(crate) fn insert(&mut self, key: TrackKey, bitmap: Option<Bitmap>, color: Option<Rgb>) {
        if let Some(bitmap) = bitmap {
            self.images.insert(key.clone(), bitmap);
        }
        if let Some(color) = color {
            self.colors.insert(key, color);
        }
    }

    /// 当前进度的不可变快照（装配过程中逐步发布）
    pub(crate) fn snapshot(&self) -> RenderSnapshot {
        RenderSnapshot {
            share: self.share.clone(),
            images: self.images.clone(),
            colors: self.colors.clone(),
            complete: false,
        }
    }

    /// 构建最终快照
    pub fn build(self) -> RenderSnapshot {
        RenderSnapshot {
            share: self.share,
            images: self.images,
            colors: self.colors,
            complete: true,
        }
    }
}

/// 分享图样式（固定 6 种，顺序即浏览顺序）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    Magazine,
    Festival,
    Mixtape,
    Notifications,
    Palette,
    Ticket,
}

impl Style {
    pub const ALL: [Style; 6] = [
        Style::Magazine,
        Style::Festival,
        Style::Mixtape,
        Style::Notifications,
        Style::Palette,
        Style::Ticket,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn next(self) -> Style {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn previous(self) -> Style {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }

    /// 稳定的小写标签（配置、文件名、日志）
    pub fn tag(self) -> &'static str {
        match self {
            Style::Magazine => "magazine",
            Style::Festival => "festival",
            Style::Mixtape => "mixtape",
            Style::Notifications => "notifications",
            Style::Palette => "palette",
            Style::Ticket => "ticket",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Style::Magazine => "Magazine",
            Style::Festival => "Festival",
            Style::Mixtape => "Mixtape",
            Style::Notifications => "Notifications",
            Style::Palette => "Palette",
            Style::Ticket => "Ticket",
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Style {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Style::ALL
            .into_iter()
            .find(|style| style.tag().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AppError::Validation(format!("未知样式: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn share() -> Arc<ShareSnapshot> {
        Arc::new(ShareSnapshot {
            date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            user_display_name: "Ada".into(),
            user_track: Track::new("Song").with_album_art("https://a/1.jpg"),
            friend_tracks: vec![
                FriendTrack::new("f1", "bob", Track::new("One")),
                FriendTrack::new("f2", "cy", Track::new("Two").with_artist("  ")),
            ],
        })
    }

    #[test]
    fn entries_put_user_first() {
        let share = share();
        let keys: Vec<TrackKey> = share.entries().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec![
                TrackKey::User,
                TrackKey::Friend("f1".into()),
                TrackKey::Friend("f2".into())
            ]
        );
    }

    #[test]
    fn blank_artist_is_absent() {
        let share = share();
        assert_eq!(share.friend_tracks[1].track.artist(), None);
        assert_eq!(share.user_track.art_url(), Some("https://a/1.jpg"));
    }

    #[test]
    fn style_browsing_wraps() {
        assert_eq!(Style::Magazine.previous(), Style::Ticket);
        assert_eq!(Style::Ticket.next(), Style::Magazine);
        assert_eq!(Style::ALL.len(), 6);
        for (i, style) in Style::ALL.into_iter().enumerate() {
            assert_eq!(style.index(), i);
            assert_eq!(style.tag().parse::<Style>().unwrap(), style);
        }
        assert!("disco".parse::<Style>().is_err());
    }

    #[test]
    fn missing_color_defaults_to_gray() {
        let snap = RenderSnapshot::builder(share())
            .color(TrackKey::User, Rgb::new(1, 2, 3))
            .build();
        assert_eq!(snap.color(&TrackKey::User), Rgb::new(1, 2, 3));
        assert_eq!(
            snap.color(&TrackKey::Friend("f1".into())),
            Rgb::NEUTRAL_GRAY
        );
        assert!(snap.is_complete());
        assert!(!RenderSnapshot::pending(share()).is_complete());
    }

    #[test]
    fn snapshot_json_uses_camel_case() {
        let raw = r#"{
            "date": "2026-10-19",
            "userDisplayName": "Ada",
            "userTrack": {"name": "Song", "artistName": "Band", "albumArtURL": "https://x/y.jpg"},
            "friendTracks": [{"name": "One", "username": "bob", "id": "f1"}]
        }"#;
        let parsed: ShareSnapshot = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.user_track.art_url(), Some("https://x/y.jpg"));
        assert_eq!(parsed.friend_tracks[0].username, "bob");
        assert_eq!(parsed.friend_tracks[0].track.artist(), None);
    }

    #[test]
    fn png_encoding_roundtrips_dimensions() {
        let bmp = Bitmap::solid(3, 2, Rgb::new(10, 20, 30));
        let png = bmp.encode_png().unwrap();
        let back = Bitmap::decode(&png).unwrap();
        assert_eq!((back.width(), back.height()), (3, 2));
        assert_eq!(back, bmp);
    }
}
