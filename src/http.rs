use once_cell::sync::OnceCell;
use reqwest::Client;

use crate::config::{AppConfig, FetchConfig};

/// 全局复用的 HTTP Client（统一连接池/Keep-Alive），避免每次会话重复创建。
///
/// 说明：
/// - 按全局 `fetch` 配置构建，timeout 与 User-Agent 固定；
/// - `Client` 本身是线程安全的，适合全局复用。
static CLIENT_FETCH: OnceCell<Client> = OnceCell::new();

/// 按给定获取配置构建 Client（测试或自定义配置时使用）。
pub fn build_fetch_client(cfg: &FetchConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(cfg.timeout_duration())
        .user_agent(cfg.user_agent.clone())
        .build()
}

/// 全局获取配置对应的 HTTP Client。
pub fn client_fetch() -> Result<&'static Client, reqwest::Error> {
    CLIENT_FETCH.get_or_try_init(|| build_fetch_client(&AppConfig::global().fetch))
}
