use thiserror::Error;

/// 应用统一错误类型
#[derive(Error, Debug)]
pub enum AppError {
    /// 网络请求错误
    #[error("网络错误: {0}")]
    Network(String),
    /// 上游请求超时（包含 connect/read 等阶段）
    #[error("请求超时: {0}")]
    Timeout(String),

    /// 图片解码错误
    #[error("解码错误: {0}")]
    Decode(String),

    /// 分享数据不可用（此时不会进入渲染流程）
    #[error("分享数据不可用: {0}")]
    DataUnavailable(String),

    /// 参数校验错误
    #[error("参数校验错误: {0}")]
    Validation(String),

    /// 图像渲染错误
    #[error("图像渲染错误: {0}")]
    ImageRendererError(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    Internal(String),

    /// 配置加载错误
    #[error("配置错误: {0}")]
    Config(#[from] config::ConfigError),
}

impl AppError {
    /// 稳定的错误码，用于程序化处理（日志、预览工具的退出信息）。
    pub fn stable_code(&self) -> &'static str {
        match self {
            AppError::Network(_) => "UPSTREAM_ERROR",
            AppError::Timeout(_) => "UPSTREAM_TIMEOUT",
            AppError::Decode(_) => "DECODE_FAILED",
            AppError::DataUnavailable(_) => "SHARE_DATA_UNAVAILABLE",
            AppError::Validation(_) => "VALIDATION_FAILED",
            AppError::ImageRendererError(_) => "IMAGE_RENDER_FAILED",
            AppError::Internal(_) => "INTERNAL_ERROR",
            AppError::Config(_) => "CONFIG_INVALID",
        }
    }
}

/// 单张封面获取失败的原因。
///
/// 仅在获取链路内部使用：装配器会把任何 `FetchError` 吸收为“该条目没有位图”，
/// 不会向调用方传播。
#[derive(Error, Debug)]
pub enum FetchError {
    /// 网络请求错误
    #[error("网络错误: {0}")]
    Network(String),

    /// 非 2xx 响应
    #[error("非成功状态码: {0}")]
    Status(u16),

    /// 超时
    #[error("超时")]
    Timeout,

    /// 响应体超过上限
    #[error("响应过大: {0} 字节")]
    TooLarge(u64),

    /// 图片解码失败
    #[error("解码失败: {0}")]
    Decode(String),
}

// =============== Error conversions for common external errors ===============

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if let Some(status) = err.status() {
            FetchError::Status(status.as_u16())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

impl From<image::ImageError> for FetchError {
    fn from(err: image::ImageError) -> Self {
        FetchError::Decode(err.to_string())
    }
}

impl From<FetchError> for AppError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Timeout => AppError::Timeout("封面获取超时".to_string()),
            FetchError::Decode(e) => AppError::Decode(e),
            other => AppError::Network(other.to_string()),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(format!("I/O 错误: {err}"))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::DataUnavailable(format!("JSON 解析错误: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::{AppError, FetchError};

    #[test]
    fn fetch_timeout_maps_to_app_timeout() {
        let app: AppError = FetchError::Timeout.into();
        assert_eq!(app.stable_code(), "UPSTREAM_TIMEOUT");
        let app: AppError = FetchError::Status(404).into();
        assert_eq!(app.stable_code(), "UPSTREAM_ERROR");
    }

    #[test]
    fn undecodable_bytes_become_decode_failure() {
        let err = image::load_from_memory(b"not an image").expect_err("garbage");
        let fe: FetchError = err.into();
        assert!(matches!(fe, FetchError::Decode(_)), "got {fe:?}");
    }

    #[test]
    fn malformed_share_json_is_data_unavailable() {
        let err = serde_json::from_str::<serde_json::Value>("{ broken").expect_err("bad json");
        let app: AppError = err.into();
        assert!(matches!(app, AppError::DataUnavailable(_)));
    }
}
