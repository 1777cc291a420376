use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// 全局配置单例
static CONFIG: OnceCell<AppConfig> = OnceCell::new();

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: String,
    /// 日志格式：full | compact | pretty
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "full".to_string(),
        }
    }
}

/// 封面获取配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// 单次获取超时（毫秒），超时与获取失败同等处理
    #[serde(default = "FetchConfig::default_timeout_ms")]
    pub timeout_ms: u64,
    /// 同时进行的获取任务上限
    #[serde(default = "FetchConfig::default_max_concurrent")]
    pub max_concurrent: usize,
    /// 单张图片的字节上限
    #[serde(default = "FetchConfig::default_max_image_bytes")]
    pub max_image_bytes: u64,
    /// 请求使用的 User-Agent
    #[serde(default = "FetchConfig::default_user_agent")]
    pub user_agent: String,
}

impl FetchConfig {
    fn default_timeout_ms() -> u64 {
        8_000
    }
    fn default_max_concurrent() -> usize {
        6
    }
    fn default_max_image_bytes() -> u64 {
        10 * 1024 * 1024
    }
    fn default_user_agent() -> String {
        concat!("phlock-share/", env!("CARGO_PKG_VERSION")).to_string()
    }

    /// 获取超时时间
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.max(1))
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: Self::default_timeout_ms(),
            max_concurrent: Self::default_max_concurrent(),
            max_image_bytes: Self::default_max_image_bytes(),
            user_agent: Self::default_user_agent(),
        }
    }
}

/// 图片渲染配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// 是否优先速度渲染（OptimizeSpeed），提升栅格化性能，可能略降画质
    #[serde(default)]
    pub optimize_speed: bool,
    /// 自定义字体目录（ttf/otf）
    #[serde(default = "RenderConfig::default_font_dir")]
    pub font_dir: String,
    /// 首选字体族
    #[serde(default = "RenderConfig::default_font_family")]
    pub font_family: String,
    /// 内嵌封面的 JPEG 质量（1-100）
    #[serde(default = "RenderConfig::default_jpeg_quality")]
    pub jpeg_quality: u8,
    /// 预缩放封面 Data URI 的 LRU 容量
    #[serde(default = "RenderConfig::default_image_uri_cache_size")]
    pub image_uri_cache_size: usize,
}

impl RenderConfig {
    fn default_font_dir() -> String {
        "resources/fonts".to_string()
    }
    fn default_font_family() -> String {
        "Inter".to_string()
    }
    fn default_jpeg_quality() -> u8 {
        85
    }
    fn default_image_uri_cache_size() -> usize {
        64
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            optimize_speed: false,
            font_dir: Self::default_font_dir(),
            font_family: Self::default_font_family(),
            jpeg_quality: Self::default_jpeg_quality(),
            image_uri_cache_size: Self::default_image_uri_cache_size(),
        }
    }
}

/// 分享数据配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareConfig {
    /// JSON 分享数据目录（`{user_id}.json`）
    #[serde(default = "ShareConfig::default_user_data_dir")]
    pub user_data_dir: String,
}

impl ShareConfig {
    fn default_user_data_dir() -> String {
        "./resources/share".to_string()
    }
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            user_data_dir: Self::default_user_data_dir(),
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    /// 封面获取配置
    #[serde(default)]
    pub fetch: FetchConfig,
    /// 图片渲染配置
    #[serde(default)]
    pub render: RenderConfig,
    /// 分享数据配置
    #[serde(default)]
    pub share: ShareConfig,
}

impl AppConfig {
    /// 从配置文件加载配置，支持环境变量覆盖
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path();

        tracing::info!("正在从 {:?} 加载配置文件", config_path);

        let builder = ConfigBuilder::builder()
            // 配置文件可缺省，全部字段都有默认值
            .add_source(File::from(config_path).required(false))
            // 支持环境变量覆盖，例如：APP_FETCH__TIMEOUT_MS
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = builder.try_deserialize()?;

        tracing::debug!(
            "配置加载完成: fetch.timeout_ms = {}, fetch.max_concurrent = {}",
            config.fetch.timeout_ms,
            config.fetch.max_concurrent
        );

        Ok(config)
    }

    /// 获取全局配置单例
    ///
    /// 未调用 `init_global()` 时（库调用方、测试）回退为默认配置。
    pub fn global() -> &'static AppConfig {
        CONFIG.get_or_init(|| {
            tracing::debug!("全局配置未初始化，使用默认配置");
            AppConfig::default()
        })
    }

    /// 初始化全局配置
    pub fn init_global() -> Result<(), ConfigError> {
        let config = Self::load()?;
        CONFIG
            .set(config)
            .map_err(|_| ConfigError::Message("配置已经被初始化".to_string()))?;
        Ok(())
    }

    /// 获取配置文件路径（可通过 `PHLOCK_SHARE_CONFIG` 指定）
    fn get_config_path() -> PathBuf {
        std::env::var("PHLOCK_SHARE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"))
    }

    /// 获取分享数据目录
    pub fn user_data_dir(&self) -> PathBuf {
        PathBuf::from(&self.share.user_data_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.fetch.timeout_duration(), Duration::from_millis(8_000));
        assert_eq!(cfg.fetch.max_concurrent, 6);
        assert_eq!(cfg.render.jpeg_quality, 85);
        assert!(cfg.fetch.user_agent.starts_with("phlock-share/"));
    }

    #[test]
    fn partial_toml_falls_back_to_field_defaults() {
        let cfg: AppConfig = ConfigBuilder::builder()
            .add_source(File::from_str(
                "[fetch]\ntimeout_ms = 1500\n[render]\noptimize_speed = true\n",
                config::FileFormat::Toml,
            ))
            .build()
            .and_then(|c| c.try_deserialize())
            .expect("deserialize config");

        assert_eq!(cfg.fetch.timeout_ms, 1500);
        assert_eq!(cfg.fetch.max_concurrent, 6);
        assert!(cfg.render.optimize_speed);
        assert_eq!(cfg.render.font_dir, "resources/fonts");
        assert_eq!(cfg.logging.level, "info");
    }
}
