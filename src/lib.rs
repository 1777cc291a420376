/// 统一错误处理模块
pub mod error;

/// 配置模块
pub mod config;

/// 功能聚合模块
pub mod features;

/// HTTP Client 复用工具
pub mod http;

// 导出常用类型供外部使用
pub use config::AppConfig;
pub use error::{AppError, FetchError};
pub use features::image::{ArtifactRasterizer, Composition, SvgRasterizer, compose};
pub use features::share::{
    Artifact, ArtifactOrigin, AssetFetcher, Bitmap, PrerenderCache, RenderDataAssembler,
    RenderSnapshot, ShareServices, ShareSession, ShareSnapshot, Style,
};
