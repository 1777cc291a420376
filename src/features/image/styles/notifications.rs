use super::{brand_footer, cover, listed_friends};
use crate::features::image::composition::{
    Composition, Frame, GradientDirection, Node, Paint, Region, TextAnchor, TextRun,
};
use crate::features::image::layout::{artist_or_unknown, fit, long_date, title_of, weekday};
use crate::features::share::models::{RenderSnapshot, Rgb, Track, TrackKey};

const CARD_X: f32 = 60.0;
const CARD_W: f32 = 960.0;
const CARD_H: f32 = 180.0;
const CARD_GAP: f32 = 24.0;
const ICON: f32 = 112.0;

/// 锁屏通知：时间与日期在上，每首歌一张通知卡片
pub(super) fn compose(snapshot: &RenderSnapshot) -> Composition {
    let share = snapshot.share();
    let accent = snapshot.color(&TrackKey::User);
    let text = Rgb::WHITE;

    let mut c = Composition::new(accent.darken(0.6));
    c.push(Node::group(
        Region::Background,
        vec![Node::rect(
            Frame::new(0.0, 0.0, 1080.0, 1920.0),
            Paint::gradient(GradientDirection::Diagonal, accent.darken(0.2), accent.darken(0.75)),
        )],
    ));

    c.push(Node::group(
        Region::Header,
        vec![
            Node::Text(
                TextRun::new(
                    540.0,
                    250.0,
                    format!("{}, {}", weekday(share.date), long_date(share.date)),
                    34.0,
                    text,
                )
                .centered()
                .alpha(0.85),
            ),
            Node::Text(TextRun::new(540.0, 440.0, "9:41", 200.0, text).weight(300).centered()),
        ],
    ));

    let mut cards = Vec::new();
    let mut y = 600.0;
    cards.extend(card(
        snapshot,
        &TrackKey::User,
        &share.user_track,
        &format!("{} picked today's song", fit(&share.user_display_name, 420.0, 34.0)),
        "now",
        y,
    ));
    for (i, friend) in listed_friends(snapshot).iter().enumerate() {
        y += CARD_H + CARD_GAP;
        cards.extend(card(
            snapshot,
            &friend.key(),
            &friend.track,
            &format!("{} shared a song", fit(&friend.username, 420.0, 34.0)),
            &format!("{}m ago", (i + 1) * 7),
            y,
        ));
    }
    c.push(Node::group(Region::FriendList, cards));

    c.push(brand_footer(1800.0, text));
    c
}

fn card(
    snapshot: &RenderSnapshot,
    key: &TrackKey,
    track: &Track,
    headline: &str,
    when: &str,
    y: f32,
) -> Vec<Node> {
    let frame = Frame::new(CARD_X, y, CARD_W, CARD_H);
    let icon = Frame::new(frame.x + 34.0, frame.y + (CARD_H - ICON) / 2.0, ICON, ICON);
    let text_x = icon.right() + 32.0;
    let text_w = frame.right() - text_x - 40.0;
    vec![
        Node::rounded(frame, 40.0, Paint::translucent(Rgb::WHITE, 0.82)),
        cover(snapshot, key, icon, 22.0),
        Node::Text(
            TextRun::new(text_x, frame.y + 58.0, "PHLOCK", 24.0, Rgb::new(90, 90, 96))
                .bold()
                .spacing(2.0),
        ),
        Node::Text(
            TextRun::new(frame.right() - 40.0, frame.y + 58.0, when, 24.0, Rgb::new(90, 90, 96))
                .anchor(TextAnchor::End),
        ),
        Node::Text(
            TextRun::new(text_x, frame.y + 104.0, headline, 34.0, Rgb::new(20, 20, 24)).bold(),
        ),
        Node::Text(TextRun::new(
            text_x,
            frame.y + 148.0,
            format!(
                "{} · {}",
                fit(title_of(track), text_w * 0.55, 30.0),
                fit(artist_or_unknown(track), text_w * 0.4, 30.0)
            ),
            30.0,
            Rgb::new(50, 50, 56),
        )),
    ]
}
