//! Shared HTTP client for Access Analyzer requests.
//!
//! One client is created per server and reused for every validation so that
//! connections and TLS sessions to the regional endpoint are pooled.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

const USER_AGENT: &str = concat!("policy-checks-lsp/", env!("CARGO_PKG_VERSION"));

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub fn create_shared_client() -> anyhow::Result<Arc<Client>> {
    let client = Client::builder()
        .user_agent(USER_AGENT)
        .timeout(DEFAULT_TIMEOUT)
        .connect_timeout(CONNECT_TIMEOUT)
        .pool_idle_timeout(POOL_IDLE_TIMEOUT)
        .pool_max_idle_per_host(4)
        .tcp_keepalive(Duration::from_secs(60))
        .build()?;

    Ok(Arc::new(client))
}
