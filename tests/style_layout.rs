use std::sync::Arc;

use chrono::NaiveDate;
use futures_util::future::BoxFuture;

use phlock_share::config::{FetchConfig, RenderConfig};
use phlock_share::features::image::composition::Region;
use phlock_share::features::share::{FriendTrack, Rgb, Track, TrackKey};
use phlock_share::{
    ArtifactRasterizer, AssetFetcher, Bitmap, FetchError, RenderDataAssembler, RenderSnapshot,
    ShareSnapshot, Style, SvgRasterizer, compose,
};

/// `broken` 中的 URL 失败，其余返回纯色位图
struct StubFetcher {
    broken: Vec<String>,
}

impl AssetFetcher for StubFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Bitmap, FetchError>> {
        Box::pin(async move {
            if self.broken.iter().any(|b| b == url) {
                Err(FetchError::Status(404))
            } else {
                Ok(Bitmap::solid(24, 24, Rgb::new(180, 40, 90)))
            }
        })
    }
}

fn friend(i: usize, with_art: bool) -> FriendTrack {
    let mut track = Track::new(format!("Song {i}")).with_artist(format!("Artist {i}"));
    if with_art {
        track = track.with_album_art(format!("https://img/{i}.jpg"));
    }
    FriendTrack::new(format!("f{i}"), format!("friend{i}"), track)
}

fn share(friends: Vec<FriendTrack>) -> Arc<ShareSnapshot> {
    Arc::new(ShareSnapshot {
        date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
        user_display_name: "Ada".into(),
        user_track: Track::new("Mine")
            .with_artist("Me")
            .with_album_art("https://img/user.jpg"),
        friend_tracks: friends,
    })
}

async fn assemble(share: Arc<ShareSnapshot>, broken: &[&str]) -> RenderSnapshot {
    let fetcher = Arc::new(StubFetcher {
        broken: broken.iter().map(|s| s.to_string()).collect(),
    });
    RenderDataAssembler::new(fetcher, &FetchConfig::default())
        .assemble(share)
        .await
}

fn row_keys(style: Style, snap: &RenderSnapshot) -> (Vec<TrackKey>, Vec<f32>) {
    let composition = compose(style, snap);
    let images = composition.images_in(Region::ThumbnailRow);
    (
        images.iter().map(|img| img.key.clone()).collect(),
        images.iter().map(|img| img.frame.width).collect(),
    )
}

#[tokio::test]
async fn mixtape_row_takes_first_four_present_images() {
    // 5 位好友，其中 2 位没有封面
    let share = share(vec![
        friend(1, true),
        friend(2, false),
        friend(3, true),
        friend(4, false),
        friend(5, true),
    ]);
    let snap = assemble(share, &[]).await;

    let (keys, edges) = row_keys(Style::Mixtape, &snap);
    assert_eq!(
        keys,
        vec![
            TrackKey::User,
            TrackKey::Friend("f1".into()),
            TrackKey::Friend("f3".into()),
            TrackKey::Friend("f5".into()),
        ]
    );
    assert!(edges.iter().all(|e| (*e - 100.0).abs() < f32::EPSILON));
}

#[tokio::test]
async fn failed_image_reflows_the_row() {
    let friends = || vec![friend(1, true), friend(2, true), friend(3, true)];

    let full = assemble(share(friends()), &[]).await;
    let (keys, edges) = row_keys(Style::Mixtape, &full);
    assert_eq!(keys.len(), 4);
    assert_eq!(edges[0], 100.0);

    // 第 2 位好友的封面获取失败：行内只剩 3 张，尺寸放大到 120 且不留空位
    let partial = assemble(share(friends()), &["https://img/2.jpg"]).await;
    let (keys, edges) = row_keys(Style::Mixtape, &partial);
    assert_eq!(
        keys,
        vec![
            TrackKey::User,
            TrackKey::Friend("f1".into()),
            TrackKey::Friend("f3".into()),
        ]
    );
    assert!(edges.iter().all(|e| (*e - 120.0).abs() < f32::EPSILON));
    assert_eq!(partial.color(&TrackKey::Friend("f2".into())), Rgb::NEUTRAL_GRAY);

    // 票根条码使用自己的尺寸表
    let (keys, edges) = row_keys(Style::Ticket, &partial);
    assert_eq!(keys.len(), 3);
    assert!(edges.iter().all(|e| (*e - 84.0).abs() < f32::EPSILON));
}

#[tokio::test]
async fn composing_twice_is_identical() {
    let snap = assemble(
        share(vec![friend(1, true), friend(2, false), friend(3, true)]),
        &[],
    )
    .await;
    for style in Style::ALL {
        let a = compose(style, &snap);
        let b = compose(style, &snap);
        assert_eq!(a.without_decoration(), b.without_decoration(), "{style}");
        // 装饰随机数以日期和样式为种子，整体也逐项一致
        assert_eq!(a, b, "{style}");
    }
}

#[tokio::test]
async fn every_style_mentions_the_user_track() {
    let snap = assemble(share(vec![friend(1, true)]), &[]).await;
    for style in Style::ALL {
        let composition = compose(style, &snap);
        let texts = composition.texts().join("\n");
        assert!(
            texts.contains("Mine") || texts.contains("MINE"),
            "{style} should show the user's pick"
        );
        assert_eq!((composition.width, composition.height), (1080, 1920));
    }
}

#[tokio::test]
async fn every_style_rasterizes_at_full_size() {
    let snap = assemble(share(vec![friend(1, true), friend(2, false)]), &[]).await;
    let rasterizer = SvgRasterizer::new(RenderConfig {
        optimize_speed: true,
        ..RenderConfig::default()
    });
    for style in Style::ALL {
        let bitmap = rasterizer.rasterize(&compose(style, &snap)).unwrap();
        assert_eq!((bitmap.width(), bitmap.height()), (1080, 1920), "{style}");
        assert!(!bitmap.encode_png().unwrap().is_empty());
    }
}

#[tokio::test]
async fn control_characters_in_names_still_rasterize() {
    let share = Arc::new(ShareSnapshot {
        date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
        user_display_name: "A\u{0}da".into(),
        user_track: Track::new("Mid\u{1}night")
            .with_artist("M\u{1b}83")
            .with_album_art("https://img/user.jpg"),
        friend_tracks: vec![FriendTrack::new(
            "f1",
            "bo\u{7}b",
            Track::new("Get\u{FFFF}Lucky").with_artist("Daft\u{8}Punk"),
        )],
    });
    let snap = assemble(share, &[]).await;
    let rasterizer = SvgRasterizer::new(RenderConfig {
        optimize_speed: true,
        ..RenderConfig::default()
    });
    for style in Style::ALL {
        let bitmap = rasterizer.rasterize(&compose(style, &snap)).unwrap();
        assert_eq!((bitmap.width(), bitmap.height()), (1080, 1920), "{style}");
    }
}

#[test]
fn pending_snapshot_still_composes_every_style() {
    let snap = RenderSnapshot::pending(share(vec![friend(1, true), friend(2, true)]));
    for style in Style::ALL {
        let composition = compose(style, &snap);
        assert!(composition.images_in(Region::ThumbnailRow).is_empty());
        assert!(composition.texts().contains(&"phlock"), "{style}");
    }
}
