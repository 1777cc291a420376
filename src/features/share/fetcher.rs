use futures_util::StreamExt;
use futures_util::future::BoxFuture;
use reqwest::Client;

use super::models::Bitmap;
use crate::config::FetchConfig;
use crate::error::FetchError;

/// 响应体预分配上限，只影响内存分配策略。
const BODY_PREALLOC_CAP: usize = 1024 * 1024;

/// 封面获取器：按 URL 获取并解码为位图。
///
/// 每次调用只尝试一次；失败由调用方吸收为“没有位图”。
/// 以显式依赖注入装配器，测试中可替换为假实现。
pub trait AssetFetcher: Send + Sync + 'static {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Bitmap, FetchError>>;
}

/// 基于 reqwest 的 HTTP(S) 获取器
#[derive(Debug, Clone)]
pub struct HttpAssetFetcher {
    client: Client,
    max_bytes: u64,
}

impl HttpAssetFetcher {
    pub fn new(client: Client, max_bytes: u64) -> Self {
        Self { client, max_bytes }
    }

    /// 使用全局复用的 Client 与全局获取配置
    pub fn from_global() -> Result<Self, FetchError> {
        let client = crate::http::client_fetch()?.clone();
        let max_bytes = crate::config::AppConfig::global().fetch.max_image_bytes;
        Ok(Self::new(client, max_bytes))
    }

    /// 按给定配置构建独立 Client
    pub fn from_config(cfg: &FetchConfig) -> Result<Self, FetchError> {
        let client = crate::http::build_fetch_client(cfg)?;
        Ok(Self::new(client, cfg.max_image_bytes))
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        // 先按 Content-Length 快速拒绝（缺失或不可信时仍由流式累计兜底）
        if let Some(content_len) = response.content_length()
            && content_len > self.max_bytes
        {
            return Err(FetchError::TooLarge(content_len));
        }

        let prealloc = usize::try_from(self.max_bytes)
            .unwrap_or(usize::MAX)
            .min(BODY_PREALLOC_CAP);
        let mut stream = response.bytes_stream();
        let mut out = Vec::with_capacity(prealloc);
        let mut total: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            total = total.saturating_add(chunk.len() as u64);
            if total > self.max_bytes {
                return Err(FetchError::TooLarge(total));
            }
            out.extend_from_slice(&chunk);
        }
        Ok(out)
    }
}

impl AssetFetcher for HttpAssetFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Bitmap, FetchError>> {
        Box::pin(async move {
            let bytes = self.download(url).await?;
            // 解码属于 CPU 密集型操作，放入阻塞线程池
            let bitmap = tokio::task::spawn_blocking(move || Bitmap::decode(&bytes))
                .await
                .map_err(|e| FetchError::Decode(format!("解码任务执行失败: {e}")))??;
            Ok(bitmap)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::share::models::Rgb;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// 极简 HTTP 桩：对任何请求返回固定状态与响应体。
    async fn serve_once(status: &'static str, body: Vec<u8>) -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind tcp listener");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let body = body.clone();
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    let _ = socket.read(&mut buf).await;
                    let head = format!(
                        "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        body.len()
                    );
                    let _ = socket.write_all(head.as_bytes()).await;
                    let _ = socket.write_all(&body).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        addr
    }

    fn fetcher(max_bytes: u64) -> HttpAssetFetcher {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .expect("build client");
        HttpAssetFetcher::new(client, max_bytes)
    }

    #[tokio::test]
    async fn fetches_and_decodes_png() {
        let png = Bitmap::solid(4, 4, Rgb::new(9, 8, 7)).encode_png().unwrap();
        let addr = serve_once("200 OK", png).await;
        let bmp = fetcher(1024 * 1024)
            .fetch(&format!("http://{addr}/art.png"))
            .await
            .expect("fetch ok");
        assert_eq!((bmp.width(), bmp.height()), (4, 4));
    }

    #[tokio::test]
    async fn non_success_status_is_failure() {
        let addr = serve_once("404 Not Found", b"nope".to_vec()).await;
        let err = fetcher(1024)
            .fetch(&format!("http://{addr}/missing.png"))
            .await
            .expect_err("404 must fail");
        assert!(matches!(err, FetchError::Status(404)), "got {err:?}");
    }

    #[tokio::test]
    async fn garbage_body_is_decode_failure() {
        let addr = serve_once("200 OK", b"<html>not an image</html>".to_vec()).await;
        let err = fetcher(1024)
            .fetch(&format!("http://{addr}/art.png"))
            .await
            .expect_err("garbage must fail");
        assert!(matches!(err, FetchError::Decode(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let addr = serve_once("200 OK", vec![0u8; 4096]).await;
        let err = fetcher(1024)
            .fetch(&format!("http://{addr}/huge.png"))
            .await
            .expect_err("too large must fail");
        assert!(matches!(err, FetchError::TooLarge(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn stalled_server_is_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind tcp listener");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    // 只接受连接，不写响应
                    tokio::time::sleep(Duration::from_secs(3)).await;
                    drop(socket);
                });
            }
        });

        let client = Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("build client");
        let err = HttpAssetFetcher::new(client, 1024)
            .fetch(&format!("http://{addr}/slow.png"))
            .await
            .expect_err("stalled fetch must fail");
        assert!(matches!(err, FetchError::Timeout), "got {err:?}");
    }
}
