use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use super::models::{Bitmap, RenderSnapshot, Style};
use crate::error::AppError;
use crate::features::image::{ArtifactRasterizer, compose, rasterize_blocking};

/// 分享图来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactOrigin {
    /// 预渲染缓存命中
    Cached,
    /// 缓存未命中，按需同步渲染
    Fallback,
}

/// 某个样式的一张成品分享图
#[derive(Debug, Clone)]
pub struct Artifact {
    pub style: Style,
    pub bitmap: Bitmap,
    pub origin: ArtifactOrigin,
}

/// 预渲染结果的只读视图（可克隆，多读者共享）
#[derive(Debug, Clone, Default)]
pub struct ArtifactCache {
    entries: Arc<RwLock<HashMap<Style, Bitmap>>>,
}

impl ArtifactCache {
    pub fn get(&self, style: Style) -> Option<Bitmap> {
        self.entries
            .read()
            .ok()
            .and_then(|entries| entries.get(&style).cloned())
    }

    pub fn contains(&self, style: Style) -> bool {
        self.entries
            .read()
            .map(|entries| entries.contains_key(&style))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 已缓存的样式（按浏览顺序）
    pub fn styles(&self) -> Vec<Style> {
        Style::ALL
            .into_iter()
            .filter(|style| self.contains(*style))
            .collect()
    }
}

/// 缓存写端。只由 [`PrerenderCache::populate`] 使用，条目一经写入不再覆盖。
#[derive(Debug)]
struct CacheWriter {
    entries: Arc<RwLock<HashMap<Style, Bitmap>>>,
}

impl CacheWriter {
    fn insert_once(&self, style: Style, bitmap: Bitmap) -> Result<bool, AppError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| AppError::Internal("分享图缓存锁已损坏".to_string()))?;
        if entries.contains_key(&style) {
            return Ok(false);
        }
        entries.insert(style, bitmap);
        Ok(true)
    }
}

/// 一次预渲染的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PopulateReport {
    pub rendered: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// 会话级预渲染缓存：`populate` 是唯一写者，`request_artifact` 只读。
pub struct PrerenderCache {
    reader: ArtifactCache,
    // 持锁期间才能写入；并发的 populate 会排队执行
    writer: tokio::sync::Mutex<CacheWriter>,
    rasterizer: Arc<dyn ArtifactRasterizer>,
}

impl PrerenderCache {
    pub fn new(rasterizer: Arc<dyn ArtifactRasterizer>) -> Self {
        let reader = ArtifactCache::default();
        let writer = CacheWriter {
            entries: reader.entries.clone(),
        };
        Self {
            reader,
            writer: tokio::sync::Mutex::new(writer),
            rasterizer,
        }
    }

    /// 只读视图
    pub fn cache(&self) -> &ArtifactCache {
        &self.reader
    }

    pub fn rasterizer(&self) -> &Arc<dyn ArtifactRasterizer> {
        &self.rasterizer
    }

    /// 按固定顺序为 6 种样式构图并栅格化，成功的写入缓存。
    ///
    /// 失败的样式保持缺失，之后可通过回退路径重新尝试。
    /// 任务被取消时已写入的条目保留有效。
    pub async fn populate(&self, snapshot: Arc<RenderSnapshot>) -> PopulateReport {
        let writer = self.writer.lock().await;
        let t0 = Instant::now();
        let mut report = PopulateReport::default();

        for style in Style::ALL {
            if self.reader.contains(style) {
                report.skipped += 1;
                continue;
            }
            let t_style = Instant::now();
            let composition = compose(style, &snapshot);
            match rasterize_blocking(self.rasterizer.clone(), composition).await {
                Ok(bitmap) => match writer.insert_once(style, bitmap) {
                    Ok(true) => {
                        report.rendered += 1;
                        tracing::debug!("预渲染完成: style={style}, 耗时={:?}", t_style.elapsed());
                    }
                    Ok(false) => report.skipped += 1,
                    Err(e) => {
                        report.failed += 1;
                        tracing::warn!("预渲染写入失败: style={style}, 原因={e}");
                    }
                },
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!("预渲染失败（该样式保持缺失）: style={style}, 原因={e}");
                }
            }
        }

        tracing::info!(
            "预渲染结束: 成功={}, 跳过={}, 失败={}, 总计={:?}",
            report.rendered,
            report.skipped,
            report.failed,
            t0.elapsed()
        );
        report
    }

    /// 获取某个样式的分享图：命中缓存直接返回；否则基于 `latest` 同步构图并栅格化。
    ///
    /// 回退结果不会写回缓存。栅格化失败即本次分享失败，调用方不应继续分发。
    pub fn request_artifact(
        &self,
        style: Style,
        latest: &RenderSnapshot,
    ) -> Result<Artifact, AppError> {
        if let Some(bitmap) = self.reader.get(style) {
            tracing::debug!("分享图命中缓存: style={style}");
            return Ok(Artifact {
                style,
                bitmap,
                origin: ArtifactOrigin::Cached,
            });
        }

        let t0 = Instant::now();
        let composition = compose(style, latest);
        let bitmap = self.rasterizer.rasterize(&composition).inspect_err(|e| {
            tracing::warn!("回退渲染失败: style={style}, 原因={e}");
        })?;
        tracing::info!(
            "分享图回退渲染: style={style}, 已有封面={}, 快照完整={}, 耗时={:?}",
            latest.image_count(),
            latest.is_complete(),
            t0.elapsed()
        );
        Ok(Artifact {
            style,
            bitmap,
            origin: ArtifactOrigin::Fallback,
        })
    }

    /// [`Self::request_artifact`] 的异步版本：回退渲染放入阻塞线程池
    pub async fn request_artifact_async(
        &self,
        style: Style,
        latest: Arc<RenderSnapshot>,
    ) -> Result<Artifact, AppError> {
        if let Some(bitmap) = self.reader.get(style) {
            return Ok(Artifact {
                style,
                bitmap,
                origin: ArtifactOrigin::Cached,
            });
        }
        let composition = compose(style, &latest);
        let bitmap = rasterize_blocking(self.rasterizer.clone(), composition).await?;
        Ok(Artifact {
            style,
            bitmap,
            origin: ArtifactOrigin::Fallback,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::image::Composition;
    use crate::features::share::models::{Rgb, ShareSnapshot, Track};
    use chrono::NaiveDate;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 假栅格化器：按调用序号输出纯色位图；`fail_calls` 中的序号失败。
    struct CountingRasterizer {
        calls: AtomicUsize,
        fail_calls: Mutex<Vec<usize>>,
    }

    impl CountingRasterizer {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl ArtifactRasterizer for CountingRasterizer {
        fn rasterize(&self, _composition: &Composition) -> Result<Bitmap, AppError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_calls.lock().unwrap().contains(&n) {
                return Err(AppError::ImageRendererError(format!("call {n} failed")));
            }
            Ok(Bitmap::solid(2, 2, Rgb::new(n as u8, 0, 0)))
        }
    }

    fn snapshot() -> Arc<RenderSnapshot> {
        let share = Arc::new(ShareSnapshot {
            date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            user_display_name: "Ada".into(),
            user_track: Track::new("Song"),
            friend_tracks: Vec::new(),
        });
        Arc::new(RenderSnapshot::builder(share).build())
    }

    #[tokio::test]
    async fn populate_fills_every_style_once() {
        let rasterizer = Arc::new(CountingRasterizer::new());
        let cache = PrerenderCache::new(rasterizer.clone());
        let report = cache.populate(snapshot()).await;
        assert_eq!(report.rendered, 6);
        assert_eq!(cache.cache().styles(), Style::ALL.to_vec());

        // 再次填充不重复渲染，条目只写一次
        let first = cache.cache().get(Style::Magazine).unwrap();
        let again = cache.populate(snapshot()).await;
        assert_eq!(again.skipped, 6);
        assert_eq!(rasterizer.calls.load(Ordering::SeqCst), 6);
        assert!(cache.cache().get(Style::Magazine).unwrap().ptr_eq(&first));
    }

    #[tokio::test]
    async fn failed_style_stays_absent_and_can_be_retried() {
        let rasterizer = Arc::new(CountingRasterizer::new());
        // 第 3 次调用（mixtape）失败
        rasterizer.fail_calls.lock().unwrap().push(2);
        let cache = PrerenderCache::new(rasterizer.clone());
        let report = cache.populate(snapshot()).await;
        assert_eq!((report.rendered, report.failed), (5, 1));
        assert!(!cache.cache().contains(Style::Mixtape));

        // 回退路径重新计算，但不写回缓存
        let artifact = cache.request_artifact(Style::Mixtape, &snapshot()).unwrap();
        assert_eq!(artifact.origin, ArtifactOrigin::Fallback);
        assert!(!cache.cache().contains(Style::Mixtape));

        // 之后的 populate 补齐缺失的样式
        let report = cache.populate(snapshot()).await;
        assert_eq!((report.rendered, report.skipped), (1, 5));
        assert!(cache.cache().contains(Style::Mixtape));
    }

    #[test]
    fn cache_hit_does_not_rasterize() {
        let rasterizer = Arc::new(CountingRasterizer::new());
        let cache = PrerenderCache::new(rasterizer.clone());
        let writer = CacheWriter {
            entries: cache.reader.entries.clone(),
        };
        assert!(writer.insert_once(Style::Ticket, Bitmap::solid(1, 1, Rgb::WHITE)).unwrap());
        assert!(!writer.insert_once(Style::Ticket, Bitmap::solid(1, 1, Rgb::BLACK)).unwrap());

        let artifact = cache.request_artifact(Style::Ticket, &snapshot()).unwrap();
        assert_eq!(artifact.origin, ArtifactOrigin::Cached);
        assert_eq!(artifact.bitmap, Bitmap::solid(1, 1, Rgb::WHITE));
        assert_eq!(rasterizer.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn fallback_failure_produces_no_artifact() {
        let rasterizer = Arc::new(CountingRasterizer::new());
        rasterizer.fail_calls.lock().unwrap().push(0);
        let cache = PrerenderCache::new(rasterizer);
        let err = cache.request_artifact(Style::Palette, &snapshot()).unwrap_err();
        assert!(matches!(err, AppError::ImageRendererError(_)));
        assert!(cache.cache().is_empty());
    }

    #[tokio::test]
    async fn async_request_falls_back_off_thread() {
        let cache = PrerenderCache::new(Arc::new(CountingRasterizer::new()));
        let artifact = cache
            .request_artifact_async(Style::Festival, snapshot())
            .await
            .unwrap();
        assert_eq!(artifact.origin, ArtifactOrigin::Fallback);
        assert_eq!(artifact.style, Style::Festival);
    }
}
