use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use futures_util::stream;
use tokio::sync::watch;
use tokio::time::timeout;

use super::color::ColorExtractor;
use super::fetcher::AssetFetcher;
use super::models::{RenderSnapshot, ShareSnapshot, TrackKey};
use crate::config::FetchConfig;
use crate::error::FetchError;

/// 同一 URL 的一次获取任务，结果由所有共享该 URL 的身份复用。
#[derive(Debug)]
struct FetchJob {
    url: String,
    keys: Vec<TrackKey>,
}

/// 渲染数据装配器：并发获取封面、取色，产出不可变的 [`RenderSnapshot`]。
///
/// 是“进行中”状态的唯一持有者；每个会话只运行一次。
pub struct RenderDataAssembler {
    fetcher: Arc<dyn AssetFetcher>,
    extractor: ColorExtractor,
    fetch_timeout: Duration,
    max_concurrent: usize,
}

impl RenderDataAssembler {
    pub fn new(fetcher: Arc<dyn AssetFetcher>, cfg: &FetchConfig) -> Self {
        Self {
            fetcher,
            extractor: ColorExtractor::new(),
            fetch_timeout: cfg.timeout_duration(),
            max_concurrent: cfg.max_concurrent.max(1),
        }
    }

    pub fn with_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    /// 装配完整快照（不发布中间进度）
    pub async fn assemble(&self, share: Arc<ShareSnapshot>) -> RenderSnapshot {
        let (tx, _rx) = watch::channel(Arc::new(RenderSnapshot::pending(share.clone())));
        let snapshot = self.assemble_with_progress(share, &tx).await;
        Arc::unwrap_or_clone(snapshot)
    }

    /// 装配快照，并在每个条目落定后通过 `progress` 发布一份新的不可变快照。
    ///
    /// 最后一次发布的即为完整快照（`is_complete() == true`），同时作为返回值。
    pub async fn assemble_with_progress(
        &self,
        share: Arc<ShareSnapshot>,
        progress: &watch::Sender<Arc<RenderSnapshot>>,
    ) -> Arc<RenderSnapshot> {
        let t0 = Instant::now();
        let jobs = collect_jobs(&share);
        let job_count = jobs.len();
        tracing::info!(
            "开始装配分享渲染数据: 条目={}, 获取任务={}",
            share.friend_tracks.len() + 1,
            job_count
        );

        let mut builder = RenderSnapshot::builder(share.clone());
        let mut fetched = 0usize;

        let mut results = stream::iter(jobs)
            .map(|job| {
                let fetcher = self.fetcher.clone();
                let fetch_timeout = self.fetch_timeout;
                async move {
                    let t_fetch = Instant::now();
                    let result = match timeout(fetch_timeout, fetcher.fetch(&job.url)).await {
                        Ok(result) => result,
                        Err(_) => Err(FetchError::Timeout),
                    };
                    (job, result, t_fetch.elapsed())
                }
            })
            .buffer_unordered(self.max_concurrent);

        while let Some((job, result, elapsed)) = results.next().await {
            let (bitmap, color) = match result {
                Ok(bitmap) => {
                    let color = self.extractor.extract(&bitmap);
                    fetched += 1;
                    tracing::debug!(
                        "封面获取完成: url={}, size={}x{}, color={}, 耗时={:?}",
                        job.url,
                        bitmap.width(),
                        bitmap.height(),
                        color.to_hex(),
                        elapsed
                    );
                    (Some(bitmap), Some(color))
                }
                Err(e) => {
                    tracing::warn!("封面获取失败（按缺失处理）: url={}, 原因={}", job.url, e);
                    (None, None)
                }
            };
            for key in job.keys {
                builder.insert(key, bitmap.clone(), color);
            }
            progress.send_replace(Arc::new(builder.snapshot()));
        }

        let snapshot = Arc::new(builder.build());
        progress.send_replace(snapshot.clone());
        tracing::info!(
            "分享渲染数据装配完成: 成功={}/{}, 总计={:?}",
            fetched,
            job_count,
            t0.elapsed()
        );
        snapshot
    }
}

/// 收集获取任务：没有 URL 的条目直接视为缺失；相同 URL 只获取一次。
fn collect_jobs(share: &ShareSnapshot) -> Vec<FetchJob> {
    let mut jobs: Vec<FetchJob> = Vec::new();
    let mut by_url: HashMap<String, usize> = HashMap::new();

    for (key, track) in share.entries() {
        let Some(url) = track.art_url() else {
            tracing::debug!("条目 {key} 没有封面 URL，跳过获取");
            continue;
        };
        match by_url.get(url) {
            Some(&idx) => jobs[idx].keys.push(key),
            None => {
                by_url.insert(url.to_string(), jobs.len());
                jobs.push(FetchJob {
                    url: url.to_string(),
                    keys: vec![key],
                });
            }
        }
    }
    jobs
}
