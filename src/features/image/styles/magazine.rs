use super::{brand_footer, cover, listed_friends};
use crate::features::image::composition::{
    Composition, Frame, GradientDirection, Node, Paint, Region, Stroke, TextAnchor, TextRun,
};
use crate::features::image::layout::{artist_or_short, artist_or_unknown, fit, long_date, title_of};
use crate::features::share::models::{RenderSnapshot, Rgb, TrackKey};

const MARGIN: f32 = 80.0;
const HERO_EDGE: f32 = 920.0;

/// 杂志封面：刊头 + 大幅封面 + 标题 + “本期嘉宾”好友列表
pub(super) fn compose(snapshot: &RenderSnapshot) -> Composition {
    let share = snapshot.share();
    let accent = snapshot.color(&TrackKey::User);
    let paper = accent.lighten(0.85);
    let ink = Rgb::new(20, 20, 24);

    let mut c = Composition::new(paper);
    c.push(Node::group(
        Region::Background,
        vec![Node::rect(
            Frame::new(0.0, 0.0, 1080.0, 1920.0),
            Paint::gradient(GradientDirection::Vertical, paper, accent.lighten(0.6)),
        )],
    ));

    // 刊头
    c.push(Node::group(
        Region::Header,
        vec![
            Node::Text(
                TextRun::new(540.0, 170.0, "PHLOCK", 150.0, ink)
                    .weight(900)
                    .centered()
                    .spacing(18.0),
            ),
            Node::line(
                MARGIN,
                205.0,
                1080.0 - MARGIN,
                205.0,
                Stroke::solid(ink.into(), 3.0),
            ),
            Node::Text(TextRun::new(MARGIN, 245.0, long_date(share.date), 26.0, ink).bold()),
            Node::Text(
                TextRun::new(1080.0 - MARGIN, 245.0, "THE DAILY ISSUE", 26.0, ink)
                    .bold()
                    .anchor(TextAnchor::End),
            ),
        ],
    ));

    // 封面大图
    let hero = Frame::new((1080.0 - HERO_EDGE) / 2.0, 290.0, HERO_EDGE, HERO_EDGE);
    let headline_y = hero.bottom() + 110.0;
    c.push(Node::group(
        Region::Hero,
        vec![
            cover(snapshot, &TrackKey::User, hero, 0.0),
            Node::rect(
                Frame::new(hero.x, hero.bottom() - 70.0, 360.0, 70.0),
                Paint::solid(accent),
            ),
            Node::Text(
                TextRun::new(
                    hero.x + 28.0,
                    hero.bottom() - 24.0,
                    "COVER STORY",
                    28.0,
                    accent.contrasting_text(),
                )
                .bold()
                .spacing(6.0),
            ),
            Node::Text(
                TextRun::new(
                    MARGIN,
                    headline_y,
                    fit(title_of(&share.user_track), 1080.0 - MARGIN * 2.0, 84.0),
                    84.0,
                    ink,
                )
                .weight(800),
            ),
            Node::Text(
                TextRun::new(
                    MARGIN,
                    headline_y + 60.0,
                    format!(
                        "{} · picked by {}",
                        fit(artist_or_unknown(&share.user_track), 520.0, 38.0),
                        fit(&share.user_display_name, 300.0, 38.0)
                    ),
                    38.0,
                    ink,
                )
                .italic()
                .alpha(0.8),
            ),
        ],
    ));

    // 好友列表（最多 4 行）
    let friends = listed_friends(snapshot);
    let mut rows = Vec::new();
    if !friends.is_empty() {
        let top = headline_y + 130.0;
        rows.push(Node::Text(
            TextRun::new(MARGIN, top, "ALSO IN THIS ISSUE", 26.0, accent.darken(0.3))
                .bold()
                .spacing(4.0),
        ));
        for (i, friend) in friends.iter().enumerate() {
            let y = top + 56.0 + i as f32 * 52.0;
            rows.push(Node::Text(
                TextRun::new(MARGIN, y, format!("{:02}", i + 1), 30.0, accent.darken(0.3))
                    .bold()
                    .monospace(),
            ));
            rows.push(Node::Text(TextRun::new(
                MARGIN + 70.0,
                y,
                format!(
                    "{} · {} ({})",
                    fit(title_of(&friend.track), 380.0, 30.0),
                    fit(artist_or_short(&friend.track), 260.0, 30.0),
                    fit(&friend.username, 180.0, 30.0)
                ),
                30.0,
                ink,
            )));
        }
    }
    c.push(Node::group(Region::FriendList, rows));

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
    fn unknown_artist_placeholder_in_headline() {
        let share = Arc::new(ShareSnapshot {
            date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            user_display_name: "Ada".into(),
            user_track: Track::new("Untold"),
            friend_tracks: vec![FriendTrack::new("f1", "bob", Track::new("One"))],
        });
        let snap = RenderSnapshot::builder(share).build();
        let c = compose(&snap);
        let texts = c.texts();
        assert!(texts.iter().any(|t| t.starts_with("Unknown Artist")));
        assert!(texts.iter().any(|t| t.contains("Unknown (bob)")));
        // 只有一个好友时只渲染一行
        assert_eq!(texts.iter().filter(|t| t.starts_with("0")).count(), 1);
    }
}
