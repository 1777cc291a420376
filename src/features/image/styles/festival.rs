use super::{brand_footer, cover, decorative_rng, listed_friends, random_bars};
use crate::features::image::composition::{
    Composition, Frame, GradientDirection, Node, Paint, Region, Stroke, TextRun,
};
use crate::features::image::layout::{artist_or_short, fit, long_date, title_of, weekday};
use crate::features::share::models::{RenderSnapshot, Rgb, Style, TrackKey};

const ART_EDGE: f32 = 440.0;

/// 音乐节海报：头牌为用户的歌，好友按阵容逐行缩小排列，底部腕带
pub(super) fn compose(snapshot: &RenderSnapshot) -> Composition {
    let share = snapshot.share();
    let top = snapshot.color(&TrackKey::User);
    let bottom = listed_friends(snapshot)
        .first()
        .map(|f| snapshot.color(&f.key()))
        .unwrap_or(top)
        .darken(0.55);
    let text = Rgb::WHITE;

    let mut c = Composition::new(bottom);
    c.push(Node::group(
        Region::Background,
        vec![
            Node::rect(
                Frame::new(0.0, 0.0, 1080.0, 1920.0),
                Paint::gradient(GradientDirection::Vertical, top.darken(0.1), bottom),
            ),
            Node::circle(540.0, 560.0, 380.0, Paint::translucent(Rgb::WHITE, 0.08)),
            Node::circle(540.0, 560.0, 300.0, Paint::translucent(Rgb::WHITE, 0.08)),
        ],
    ));

    c.push(Node::group(
        Region::Header,
        vec![
            Node::Text(
                TextRun::new(540.0, 180.0, "PHLOCK FEST", 96.0, text)
                    .weight(900)
                    .centered()
                    .spacing(10.0),
            ),
            Node::Text(
                TextRun::new(
                    540.0,
                    240.0,
                    format!("{} · {}", weekday(share.date), long_date(share.date)),
                    30.0,
                    text,
                )
                .centered()
                .spacing(4.0)
                .alpha(0.85),
            ),
        ],
    ));

    let art = Frame::new((1080.0 - ART_EDGE) / 2.0, 340.0, ART_EDGE, ART_EDGE);
    c.push(Node::group(
        Region::Hero,
        vec![
            cover(snapshot, &TrackKey::User, art, ART_EDGE / 2.0),
            Node::Circle {
                cx: art.center_x(),
                cy: art.y + ART_EDGE / 2.0,
                r: ART_EDGE / 2.0 + 6.0,
                fill: Paint::translucent(Rgb::BLACK, 0.0),
                stroke: Some(Stroke::solid(text.into(), 6.0)),
            },
            Node::Text(
                TextRun::new(540.0, 900.0, "HEADLINER", 28.0, text)
                    .bold()
                    .centered()
                    .spacing(8.0)
                    .alpha(0.7),
            ),
            Node::Text(
                TextRun::new(
                    540.0,
                    990.0,
                    fit(title_of(&share.user_track), 960.0, 86.0).to_uppercase(),
                    86.0,
                    text,
                )
                .weight(900)
                .centered(),
            ),
            Node::Text(
                TextRun::new(
                    540.0,
                    1045.0,
                    format!("presented by {}", fit(&share.user_display_name, 600.0, 32.0)),
                    32.0,
                    text,
                )
                .centered()
                .alpha(0.85),
            ),
        ],
    ));

    // 阵容：字号逐行递减
    let mut lineup = Vec::new();
    let mut y = 1150.0;
    for (i, friend) in listed_friends(snapshot).iter().enumerate() {
        let size = 56.0 - i as f32 * 6.0;
        lineup.push(Node::Text(
            TextRun::new(
                540.0,
                y,
                fit(artist_or_short(&friend.track), 940.0, size).to_uppercase(),
                size,
                text,
            )
            .bold()
            .centered(),
        ));
        lineup.push(Node::Text(
            TextRun::new(
                540.0,
                y + 34.0,
                format!(
                    "{} · via {}",
                    fit(title_of(&friend.track), 560.0, 24.0),
                    fit(&friend.username, 300.0, 24.0)
                ),
                24.0,
                text,
            )
            .centered()
            .alpha(0.7),
        ));
        y += size + 60.0;
    }
    c.push(Node::group(Region::FriendList, lineup));

    // 腕带：左侧文字，右侧装饰条码
    let band = Frame::new(90.0, 1640.0, 900.0, 110.0);
    let mut rng = decorative_rng(Style::Festival, share.date);
    c.push(Node::group(
        Region::Footer,
        vec![
            Node::rounded(band, 55.0, Paint::solid(top.lighten(0.2))),
            Node::Text(
                TextRun::new(
                    band.x + 60.0,
                    band.y + 68.0,
                    "ALL ACCESS",
                    36.0,
                    top.lighten(0.2).contrasting_text(),
                )
                .weight(800)
                .spacing(6.0),
            ),
            random_bars(
                &mut rng,
                Frame::new(band.right() - 380.0, band.y + 25.0, 300.0, 60.0),
                top.lighten(0.2).contrasting_text(),
            ),
        ],
    ));

    c.push(brand_footer(1820.0, text));
    c
}
