//! 本地预览工具：读取分享数据，跑一遍完整的分享会话，把每种样式输出为 PNG。
//!
//! 仅用于开发调试：
//! - 封面通过真实 HTTP 获取（受 `fetch` 配置约束）；
//! - `--no-wait` 跳过预渲染等待，可以观察回退路径的输出。

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use phlock_share::features::image::{SvgRasterizer, compose};
use phlock_share::features::share::{
    JsonFileShareDataProvider, ShareDataProvider, ShareServices, ShareSession, ShareSnapshot, Style,
};
use phlock_share::config::LoggingConfig;
use phlock_share::{AppConfig, ArtifactOrigin};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse(std::env::args().skip(1).collect());
    if args.help {
        print_help();
        return Ok(());
    }

    AppConfig::init_global()?;
    init_tracing(&AppConfig::global().logging);

    let share = match (&args.input, &args.user) {
        (Some(path), _) => {
            let raw = fs::read(path)?;
            serde_json::from_slice::<ShareSnapshot>(&raw)?
        }
        (None, Some(user)) => {
            let provider = JsonFileShareDataProvider::from_global();
            tracing::info!("从 {} 读取分享数据", provider.dir().display());
            provider.get_share_data(user).await?
        }
        (None, None) => {
            print_help();
            return Err("需要 --input PATH 或 --user ID".into());
        }
    };

    let styles: Vec<Style> = match args.style.as_deref() {
        Some(tag) => vec![tag.parse()?],
        None => Style::ALL.to_vec(),
    };

    let services = ShareServices::from_global()?;
    let t0 = Instant::now();
    let mut session = ShareSession::start(&services, share);
    if !args.no_wait {
        let report = session.wait_ready().await?;
        println!(
            "预渲染完成: 成功={}, 失败={}, 耗时={:?}",
            report.rendered,
            report.failed,
            t0.elapsed()
        );
    }

    fs::create_dir_all(&args.out_dir)?;
    let svg_writer = args.svg.then(SvgRasterizer::from_global);
    for style in styles {
        let artifact = session.request_artifact(style)?;
        let png = artifact.bitmap.encode_png()?;
        let path = args.out_dir.join(format!("{}.png", style.tag()));
        fs::write(&path, png)?;
        let origin = match artifact.origin {
            ArtifactOrigin::Cached => "cache",
            ArtifactOrigin::Fallback => "fallback",
        };
        println!("{:<14} {:<8} -> {}", style.display_name(), origin, path.display());

        if let Some(writer) = &svg_writer {
            let svg = writer.to_svg(&compose(style, &session.latest_snapshot()))?;
            fs::write(args.out_dir.join(format!("{}.svg", style.tag())), svg)?;
        }
    }

    session.close();
    Ok(())
}

/// `RUST_LOG` 优先；未设置时使用配置中的 `logging.level`
fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter(&logging.level).into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let _ = match logging.format.as_str() {
        "compact" => builder.compact().try_init(),
        "pretty" => builder.pretty().try_init(),
        _ => builder.try_init(),
    };
}

/// 纯级别（如 `debug`）只作用于本 crate；带 `=` 或 `,` 的视为完整过滤指令
fn default_filter(level: &str) -> String {
    let level = level.trim();
    if level.is_empty() {
        "phlock_share=info".to_string()
    } else if level.contains('=') || level.contains(',') {
        level.to_string()
    } else {
        format!("phlock_share={level}")
    }
}

struct Args {
    help: bool,
    input: Option<PathBuf>,
    user: Option<String>,
    style: Option<String>,
    out_dir: PathBuf,
    svg: bool,
    no_wait: bool,
}

impl Args {
    fn parse(argv: Vec<String>) -> Self {
        let mut args = Self {
            help: false,
            input: None,
            user: None,
            style: None,
            out_dir: PathBuf::from("share_preview"),
            svg: false,
            no_wait: false,
        };

        let mut it = argv.into_iter();
        while let Some(a) = it.next() {
            match a.as_str() {
                "-h" | "--help" => args.help = true,
                "--input" => {
                    args.input = it.next().map(PathBuf::from);
                }
                "--user" => {
                    args.user = it.next();
                }
                "--style" => {
                    args.style = it.next();
                }
                "--out-dir" => {
                    if let Some(v) = it.next() {
                        args.out_dir = PathBuf::from(v);
                    }
                }
                "--svg" => args.svg = true,
                "--no-wait" => args.no_wait = true,
                _ => {}
            }
        }
        args
    }
}

fn print_help() {
    println!(
        r#"share_preview（分享图本地预览）

用法：
  cargo run --bin share_preview -- --input resources/share/ada.json
  cargo run --bin share_preview -- --user ada --style mixtape --svg

常用参数：
  --input PATH       直接读取分享数据 JSON（camelCase 字段）
  --user ID          从 share.user_data_dir 读取 {{ID}}.json
  --style TAG        只输出一种样式（magazine|festival|mixtape|notifications|palette|ticket）
  --out-dir DIR      输出目录（默认 ./share_preview）
  --svg              同时输出构图的 SVG 文本
  --no-wait          不等待预渲染，直接走回退路径
"#
    );
}
