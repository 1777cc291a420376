use super::{brand_footer, cover, listed_friends};
use crate::features::image::composition::{
    Composition, Frame, Node, Paint, Region, Stroke, TextRun,
};
use crate::features::image::layout::{artist_or_unknown, fit, long_date, title_of};
use crate::features::share::models::{RenderSnapshot, Rgb, TrackKey};

const SWATCH_TOP: f32 = 1130.0;
const SWATCH_H: f32 = 420.0;
const SIDE: f32 = 80.0;
const SWATCH_GAP: f32 = 16.0;

/// 色卡：用户封面 + 每首歌的主色色条（附十六进制色值）
pub(super) fn compose(snapshot: &RenderSnapshot) -> Composition {
    let share = snapshot.share();
    let paper = Rgb::new(246, 244, 240);
    let ink = Rgb::new(28, 28, 30);

    let mut c = Composition::new(paper);
    c.push(Node::group(
        Region::Header,
        vec![
            Node::Text(
                TextRun::new(SIDE, 170.0, "today's palette", 76.0, ink).weight(800),
            ),
            Node::Text(
                TextRun::new(SIDE, 225.0, long_date(share.date), 28.0, ink)
                    .spacing(4.0)
                    .alpha(0.6),
            ),
        ],
    ));

    let art = Frame::new(SIDE, 280.0, 620.0, 620.0);
    let user_color = snapshot.color(&TrackKey::User);
    c.push(Node::group(
        Region::Hero,
        vec![
            cover(snapshot, &TrackKey::User, art, 28.0),
            Node::rounded(
                Frame::new(
                    art.right() + 30.0,
                    art.y,
                    1080.0 - SIDE - art.right() - 30.0,
                    art.height,
                ),
                28.0,
                Paint::solid(user_color),
            ),
            Node::Text(
                TextRun::new(
                    art.right() + 60.0,
                    art.bottom() - 40.0,
                    user_color.to_hex(),
                    34.0,
                    user_color.contrasting_text(),
                )
                .monospace(),
            ),
            Node::Text(
                TextRun::new(
                    SIDE,
                    art.bottom() + 90.0,
                    fit(title_of(&share.user_track), 920.0, 64.0),
                    64.0,
                    ink,
                )
                .bold(),
            ),
            Node::Text(
                TextRun::new(
                    SIDE,
                    art.bottom() + 140.0,
                    fit(artist_or_unknown(&share.user_track), 920.0, 34.0),
                    34.0,
                    ink,
                )
                .alpha(0.7),
            ),
        ],
    ));

    // 色条：用户在前，好友最多 4 个
    let mut swatches: Vec<(TrackKey, String)> =
        vec![(TrackKey::User, share.user_display_name.clone())];
    swatches.extend(
        listed_friends(snapshot)
            .iter()
            .map(|f| (f.key(), f.username.clone())),
    );
    let n = swatches.len() as f32;
    let width = (1080.0 - SIDE * 2.0 - SWATCH_GAP * (n - 1.0)) / n;
    let mut nodes = Vec::new();
    for (i, (key, who)) in swatches.iter().enumerate() {
        let color = snapshot.color(key);
        let frame = Frame::new(SIDE + i as f32 * (width + SWATCH_GAP), SWATCH_TOP, width, SWATCH_H);
        nodes.push(Node::Rect {
            frame,
            radius: 20.0,
            fill: Paint::solid(color),
            stroke: Some(Stroke::solid(ink.into(), 2.0)),
        });
        nodes.push(Node::Text(
            TextRun::new(
                frame.center_x(),
                frame.bottom() - 60.0,
                color.to_hex(),
                (width / 7.0).min(28.0),
                color.contrasting_text(),
            )
            .centered()
            .monospace(),
        ));
        nodes.push(Node::Text(
            TextRun::new(
                frame.center_x(),
                frame.bottom() + 50.0,
                fit(who, width, 26.0),
                26.0,
                ink,
            )
            .centered(),
        ));
    }
    c.push(Node::group(Region::Swatches, nodes));

    c.push(brand_footer(1800.0, ink));
    c
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::share::models::{FriendTrack, ShareSnapshot, Track};
    use chrono::NaiveDate;
    use std::sync::Arc;

    #[test]
    fn swatches_use_extracted_colors_or_gray() {
        let share = Arc::new(ShareSnapshot {
            date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            user_display_name: "Ada".into(),
            user_track: Track::new("Mine"),
            friend_tracks: vec![FriendTrack::new("f1", "bob", Track::new("x"))],
        });
        let snap = RenderSnapshot::builder(share)
            .color(TrackKey::User, Rgb::new(0x12, 0x34, 0x56))
            .build();
        let c = compose(&snap);
        let texts = c.texts();
        assert!(texts.contains(&"#123456"));
        assert!(texts.contains(&"#808080"));
        assert!(texts.contains(&"bob"));
    }
}
