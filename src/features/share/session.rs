use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::assembler::RenderDataAssembler;
use super::fetcher::{AssetFetcher, HttpAssetFetcher};
use super::models::{RenderSnapshot, ShareSnapshot, Style};
use super::prerender::{Artifact, ArtifactCache, PopulateReport, PrerenderCache};
use super::provider::ShareDataProvider;
use crate::config::{AppConfig, FetchConfig};
use crate::error::AppError;
use crate::features::image::{ArtifactRasterizer, SvgRasterizer};

/// 会话依赖：封面获取器、栅格化器与获取配置
#[derive(Clone)]
pub struct ShareServices {
    pub fetcher: Arc<dyn AssetFetcher>,
    pub rasterizer: Arc<dyn ArtifactRasterizer>,
    pub fetch: FetchConfig,
}

impl ShareServices {
    pub fn new(
        fetcher: Arc<dyn AssetFetcher>,
        rasterizer: Arc<dyn ArtifactRasterizer>,
        fetch: FetchConfig,
    ) -> Self {
        Self {
            fetcher,
            rasterizer,
            fetch,
        }
    }

    /// 按全局配置装配真实的 HTTP 获取器与 SVG 栅格化器
    pub fn from_global() -> Result<Self, AppError> {
        let fetcher = HttpAssetFetcher::from_global()?;
        Ok(Self::new(
            Arc::new(fetcher),
            Arc::new(SvgRasterizer::from_global()),
            AppConfig::global().fetch.clone(),
        ))
    }
}

/// 一次分享面板的生命周期：装配渲染数据、后台预渲染、响应分享请求。
///
/// 会话关闭（或被丢弃）时后台任务随之取消，缓存随会话一起释放。
pub struct ShareSession {
    share: Arc<ShareSnapshot>,
    progress: watch::Receiver<Arc<RenderSnapshot>>,
    prerender: Arc<PrerenderCache>,
    task: Option<JoinHandle<PopulateReport>>,
    report: Option<PopulateReport>,
    selected: Style,
}

impl ShareSession {
    /// 从数据提供方加载分享数据并开启会话；数据不可用时直接返回错误。
    pub async fn open(
        services: &ShareServices,
        provider: &dyn ShareDataProvider,
        user_id: &str,
    ) -> Result<Self, AppError> {
        let share = provider.get_share_data(user_id).await.inspect_err(|e| {
            tracing::warn!("分享数据加载失败: user={user_id}, 原因={e}");
        })?;
        Ok(Self::start(services, share))
    }

    /// 以已有的分享数据开启会话，立即在后台开始装配与预渲染。
    pub fn start(services: &ShareServices, share: ShareSnapshot) -> Self {
        let share = Arc::new(share);
        let (tx, rx) = watch::channel(Arc::new(RenderSnapshot::pending(share.clone())));
        let prerender = Arc::new(PrerenderCache::new(services.rasterizer.clone()));
        let assembler = RenderDataAssembler::new(services.fetcher.clone(), &services.fetch);

        let task = {
            let share = share.clone();
            let prerender = prerender.clone();
            tokio::spawn(async move {
                let snapshot = assembler.assemble_with_progress(share, &tx).await;
                prerender.populate(snapshot).await
            })
        };
        tracing::info!(
            "分享会话已开启: user={}, friends={}",
            share.user_display_name,
            share.friend_tracks.len()
        );

        Self {
            share,
            progress: rx,
            prerender,
            task: Some(task),
            report: None,
            selected: Style::ALL[0],
        }
    }

    pub fn share(&self) -> &ShareSnapshot {
        &self.share
    }

    /// 当前最新的渲染快照（可能尚未装配完成）
    pub fn latest_snapshot(&self) -> Arc<RenderSnapshot> {
        self.progress.borrow().clone()
    }

    /// 订阅渲染快照的更新
    pub fn subscribe(&self) -> watch::Receiver<Arc<RenderSnapshot>> {
        self.progress.clone()
    }

    pub fn cache(&self) -> &ArtifactCache {
        self.prerender.cache()
    }

    pub fn selected_style(&self) -> Style {
        self.selected
    }

    pub fn select(&mut self, style: Style) {
        self.selected = style;
    }

    pub fn next_style(&mut self) -> Style {
        self.selected = self.selected.next();
        self.selected
    }

    pub fn previous_style(&mut self) -> Style {
        self.selected = self.selected.previous();
        self.selected
    }

    /// 后台任务是否已结束（完成或取消）
    pub fn is_ready(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// 获取某个样式的分享图：缓存命中直接返回，否则基于最新快照回退渲染。
    pub fn request_artifact(&self, style: Style) -> Result<Artifact, AppError> {
        let latest = self.latest_snapshot();
        self.prerender.request_artifact(style, &latest)
    }

    /// 当前选中样式的分享图（交给系统分享面板）
    pub fn share_selected(&self) -> Result<Artifact, AppError> {
        self.request_artifact(self.selected)
    }

    /// 等待装配与预渲染全部结束
    pub async fn wait_ready(&mut self) -> Result<PopulateReport, AppError> {
        if let Some(report) = self.report {
            return Ok(report);
        }
        let Some(task) = self.task.take() else {
            return Err(AppError::Internal("预渲染任务已取消".to_string()));
        };
        let report = task.await.map_err(|e| {
            if e.is_cancelled() {
                AppError::Internal("预渲染任务已取消".to_string())
            } else {
                AppError::Internal(format!("预渲染任务异常退出: {e}"))
            }
        })?;
        self.report = Some(report);
        Ok(report)
    }

    /// 关闭会话：取消尚未完成的后台任务
    pub fn close(mut self) {
        self.abort();
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take()
            && !task.is_finished()
        {
            task.abort();
            tracing::info!(
                "分享会话关闭，取消预渲染: 已缓存样式={}",
                self.prerender.cache().len()
            );
        }
    }
}

impl Drop for ShareSession {
    fn drop(&mut self) {
        self.abort();
    }
}
