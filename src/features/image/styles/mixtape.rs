use super::{art_row, brand_footer, listed_friends};
use crate::features::image::composition::{
    Composition, Frame, GradientDirection, Node, Paint, Region, Stroke, TextRun,
};
use crate::features::image::layout::{
    artist_or_unknown, fit, short_date, thumbnail_edge, title_of,
};
use crate::features::share::models::{RenderSnapshot, Rgb, TrackKey};

const BODY: Frame = Frame {
    x: 90.0,
    y: 360.0,
    width: 900.0,
    height: 660.0,
};
const WINDOW: Frame = Frame {
    x: 150.0,
    y: 640.0,
    width: 780.0,
    height: 260.0,
};
const ROW_GAP: f32 = 16.0;

/// 磁带：标签写用户名与日期，磁带窗口内是封面行，下方为 A 面曲目表
pub(super) fn compose(snapshot: &RenderSnapshot) -> Composition {
    let share = snapshot.share();
    let accent = snapshot.color(&TrackKey::User);
    let bg = Rgb::new(24, 22, 28);
    let text = Rgb::new(240, 236, 228);

    let mut c = Composition::new(bg);
    c.push(Node::group(
        Region::Header,
        vec![
            Node::Text(
                TextRun::new(540.0, 190.0, "MIXTAPE", 110.0, text)
                    .weight(900)
                    .centered()
                    .spacing(12.0),
            ),
            Node::Text(
                TextRun::new(540.0, 260.0, "today's songs from the circle", 32.0, text)
                    .centered()
                    .italic()
                    .alpha(0.7),
            ),
        ],
    ));

    // 磁带外壳与标签
    let label = Frame::new(150.0, 410.0, 780.0, 190.0);
    let mut cassette = vec![
        Node::rounded(
            BODY,
            40.0,
            Paint::gradient(GradientDirection::Diagonal, accent.lighten(0.1), accent.darken(0.35)),
        ),
        Node::rounded(label, 16.0, Paint::solid(Rgb::new(250, 246, 236))),
        Node::line(
            label.x + 30.0,
            label.y + 120.0,
            label.right() - 30.0,
            label.y + 120.0,
            Stroke::solid(Rgb::new(200, 60, 60).into(), 3.0),
        ),
        Node::Text(
            TextRun::new(
                label.x + 30.0,
                label.y + 90.0,
                format!("{}'s mix", fit(&share.user_display_name, 520.0, 56.0)),
                56.0,
                Rgb::new(30, 30, 30),
            )
            .bold()
            .italic(),
        ),
        Node::Text(
            TextRun::new(
                label.x + 30.0,
                label.y + 165.0,
                format!("SIDE A · {}", short_date(share.date)),
                28.0,
                Rgb::new(60, 60, 60),
            )
            .monospace(),
        ),
        Node::rounded(WINDOW, 24.0, Paint::solid(Rgb::new(18, 18, 20))),
    ];
    // 卷轴
    for cx in [WINDOW.x + 70.0, WINDOW.right() - 70.0] {
        let cy = WINDOW.y + WINDOW.height / 2.0;
        cassette.push(Node::circle(cx, cy, 44.0, Paint::solid(Rgb::new(52, 48, 44))));
        cassette.push(Node::circle(cx, cy, 14.0, Paint::solid(Rgb::new(18, 18, 20))));
    }
    c.push(Node::group(Region::Hero, cassette));

    // 磁带窗口封面行（边长按数量分档，140/120/100）
    let (row, _) = art_row(
        snapshot,
        thumbnail_edge,
        WINDOW.center_x(),
        WINDOW.y + WINDOW.height / 2.0,
        ROW_GAP,
        10.0,
    );
    c.push(row);

    // 曲目表
    let mut tracks = vec![Node::Text(
        TextRun::new(BODY.x, 1120.0, "TRACKLIST", 30.0, accent.lighten(0.4))
            .bold()
            .spacing(6.0),
    )];
    let entries = std::iter::once((String::from("you"), &share.user_track)).chain(
        listed_friends(snapshot)
            .iter()
            .map(|f| (f.username.clone(), &f.track)),
    );
    for (i, (who, track)) in entries.enumerate() {
        let y = 1190.0 + i as f32 * 96.0;
        tracks.push(Node::Text(
            TextRun::new(BODY.x, y, format!("A{}", i + 1), 34.0, accent.lighten(0.4))
                .bold()
                .monospace(),
        ));
        tracks.push(Node::Text(
            TextRun::new(BODY.x + 90.0, y, fit(title_of(track), 800.0, 40.0), 40.0, text).bold(),
        ));
        tracks.push(Node::Text(
            TextRun::new(
                BODY.x + 90.0,
                y + 38.0,
                format!(
                    "{} · {}",
                    fit(artist_or_unknown(track), 520.0, 26.0),
                    fit(&who, 260.0, 26.0)
                ),
                26.0,
                text,
            )
            .alpha(0.65),
        ));
    }
    c.push(Node::group(Region::FriendList, tracks));

    c.push(brand_footer(1800.0, text));
    c
}
