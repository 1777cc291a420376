use std::collections::HashMap;
use std::path::{Path, PathBuf};

use futures_util::future::BoxFuture;

use super::models::ShareSnapshot;
use crate::config::AppConfig;
use crate::error::AppError;

/// 分享源数据提供方（社交关系、每日选歌等外部系统的边界）。
///
/// 失败时整个分享流程直接报错，不进入渲染核心。
pub trait ShareDataProvider: Send + Sync + 'static {
    fn get_share_data<'a>(&'a self, user_id: &'a str)
    -> BoxFuture<'a, Result<ShareSnapshot, AppError>>;
}

/// 内存中的固定数据（测试与演示）
#[derive(Debug, Clone, Default)]
pub struct StaticShareDataProvider {
    shares: HashMap<String, ShareSnapshot>,
}

impl StaticShareDataProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_share(mut self, user_id: impl Into<String>, share: ShareSnapshot) -> Self {
        self.shares.insert(user_id.into(), share);
        self
    }
}

impl ShareDataProvider for StaticShareDataProvider {
    fn get_share_data<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, Result<ShareSnapshot, AppError>> {
        Box::pin(async move {
            self.shares
                .get(user_id)
                .cloned()
                .ok_or_else(|| AppError::DataUnavailable(format!("用户 {user_id} 没有分享数据")))
        })
    }
}

/// 从目录读取 `{user_id}.json`（camelCase 字段）
#[derive(Debug, Clone)]
pub struct JsonFileShareDataProvider {
    dir: PathBuf,
}

impl JsonFileShareDataProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// 使用全局配置中的 `share.user_data_dir`
    pub fn from_global() -> Self {
        Self::new(AppConfig::global().user_data_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, user_id: &str) -> Result<PathBuf, AppError> {
        let valid = !user_id.is_empty()
            && user_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(AppError::Validation(format!("非法的用户 ID: {user_id:?}")));
        }
        Ok(self.dir.join(format!("{user_id}.json")))
    }
}

impl ShareDataProvider for JsonFileShareDataProvider {
    fn get_share_data<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, Result<ShareSnapshot, AppError>> {
        Box::pin(async move {
            let path = self.path_for(user_id)?;
            let raw = match tokio::fs::read(&path).await {
                Ok(raw) => raw,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(AppError::DataUnavailable(format!(
                        "分享数据不存在: {}",
                        path.display()
                    )));
                }
                Err(e) => return Err(e.into()),
            };
            let share: ShareSnapshot = serde_json::from_slice(&raw)?;
            tracing::debug!(
                "已加载分享数据: user={}, friends={}",
                user_id,
                share.friend_tracks.len()
            );
            Ok(share)
        })
    }
}
