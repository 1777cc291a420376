use chrono::{Datelike, NaiveDate};

use super::{art_row, brand_footer, cover, decorative_rng, listed_friends, random_bars};
use crate::features::image::composition::{
    Composition, Frame, Node, Paint, Region, Stroke, TextAnchor, TextRun,
};
use crate::features::image::layout::{
    artist_or_short, artist_or_unknown, barcode_edge, fit, long_date, short_date, title_of,
};
use crate::features::share::models::{RenderSnapshot, Rgb, Style, TrackKey};

const TICKET: Frame = Frame {
    x: 90.0,
    y: 220.0,
    width: 900.0,
    height: 1480.0,
};
const PERFORATION_Y: f32 = 1240.0;
const INSET: f32 = 60.0;

/// 演出票根：正券写歌曲与同行好友，副券上是封面条码行与装饰条码
pub(super) fn compose(snapshot: &RenderSnapshot) -> Composition {
    let share = snapshot.share();
    let accent = snapshot.color(&TrackKey::User);
    let paper = Rgb::new(250, 247, 240);
    let ink = Rgb::new(24, 24, 28);

    let mut c = Composition::new(accent.darken(0.5));
    c.push(Node::group(
        Region::Background,
        vec![Node::rounded(TICKET, 36.0, Paint::solid(paper))],
    ));

    let left = TICKET.x + INSET;
    let right = TICKET.right() - INSET;
    c.push(Node::group(
        Region::Header,
        vec![
            Node::rect(
                Frame::new(TICKET.x, TICKET.y + 60.0, TICKET.width, 110.0),
                Paint::solid(accent),
            ),
            Node::Text(
                TextRun::new(left, TICKET.y + 135.0, "ADMIT ONE", 52.0, accent.contrasting_text())
                    .weight(900)
                    .spacing(8.0),
            ),
            Node::Text(
                TextRun::new(
                    right,
                    TICKET.y + 135.0,
                    short_date(share.date),
                    40.0,
                    accent.contrasting_text(),
                )
                .monospace()
                .anchor(TextAnchor::End),
            ),
        ],
    ));

    let art = Frame::new(left, TICKET.y + 230.0, 300.0, 300.0);
    let info_x = art.right() + 40.0;
    c.push(Node::group(
        Region::Hero,
        vec![
            cover(snapshot, &TrackKey::User, art, 12.0),
            Node::Text(
                TextRun::new(info_x, art.y + 40.0, "NOW PLAYING", 24.0, ink)
                    .bold()
                    .spacing(4.0)
                    .alpha(0.6),
            ),
            Node::Text(
                TextRun::new(
                    info_x,
                    art.y + 110.0,
                    fit(title_of(&share.user_track), right - info_x, 54.0),
                    54.0,
                    ink,
                )
                .weight(800),
            ),
            Node::Text(
                TextRun::new(
                    info_x,
                    art.y + 165.0,
                    fit(artist_or_unknown(&share.user_track), right - info_x, 34.0),
                    34.0,
                    ink,
                )
                .alpha(0.75),
            ),
            Node::Text(
                TextRun::new(
                    info_x,
                    art.y + 250.0,
                    format!(
                        "HOLDER  {}",
                        fit(&share.user_display_name, right - info_x - 140.0, 28.0)
                    ),
                    28.0,
                    ink,
                )
                .monospace(),
            ),
            Node::Text(
                TextRun::new(left, art.bottom() + 80.0, long_date(share.date), 30.0, ink)
                    .bold()
                    .spacing(3.0),
            ),
        ],
    ));

    // 同行好友（最多 4 行）
    let mut guests = Vec::new();
    let list_top = art.bottom() + 160.0;
    for (i, friend) in listed_friends(snapshot).iter().enumerate() {
        let y = list_top + i as f32 * 70.0;
        guests.push(Node::Text(
            TextRun::new(left, y, format!("SEAT {}", i + 1), 26.0, accent.darken(0.3))
                .monospace()
                .bold(),
        ));
        guests.push(Node::Text(TextRun::new(
            left + 170.0,
            y,
            format!(
                "{} · {}",
                fit(&friend.username, 200.0, 30.0),
                fit(artist_or_short(&friend.track), 380.0, 30.0)
            ),
            30.0,
            ink,
        )));
    }
    c.push(Node::group(Region::FriendList, guests));

    // 撕线：两侧缺口 + 虚线
    c.push(Node::group(
        Region::Footer,
        vec![
            Node::circle(TICKET.x, PERFORATION_Y, 36.0, Paint::solid(accent.darken(0.5))),
            Node::circle(TICKET.right(), PERFORATION_Y, 36.0, Paint::solid(accent.darken(0.5))),
            Node::line(
                TICKET.x + 50.0,
                PERFORATION_Y,
                TICKET.right() - 50.0,
                PERFORATION_Y,
                Stroke::dashed(Rgb::new(160, 156, 150).into(), 4.0, 14.0),
            ),
        ],
    ));

    // 副券：封面条码行（100/84/72）
    let (row, edge) = art_row(snapshot, barcode_edge, 540.0, PERFORATION_Y + 120.0, 12.0, 4.0);
    c.push(row);

    // 装饰条码（随机宽度，以日期为种子）
    let mut rng = decorative_rng(Style::Ticket, share.date);
    let bars_top = PERFORATION_Y + 120.0 + edge / 2.0 + 40.0;
    c.push(random_bars(
        &mut rng,
        Frame::new(left + 60.0, bars_top, right - left - 120.0, 90.0),
        ink,
    ));
    c.push(Node::Text(
        TextRun::new(
            540.0,
            TICKET.bottom() - 30.0,
            format!("No. {:06}", serial(share.date)),
            24.0,
            ink,
        )
        .monospace()
        .centered()
        .alpha(0.6),
    ));

    c.push(brand_footer(1790.0, Rgb::WHITE));
    c
}

/// 票号：只依赖日期，保证同一快照的输出稳定
fn serial(date: NaiveDate) -> u64 {
    (u64::from(date.num_days_from_ce().unsigned_abs()) * 7919) % 1_000_000
}
