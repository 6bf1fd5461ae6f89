//! Keep-warm pinger for a deployment on a free hosting tier that idles
//! after inactivity.
//!
//! Every interval: `GET {url}/health`, then `GET {url}/`. The first round
//! runs immediately. Failures are logged and the loop carries on; only the
//! shutdown future ends it.

use std::future::Future;

use serde::Deserialize;
use tokio::time::MissedTickBehavior;

use crate::config::KeepAliveConfig;

#[derive(Debug, thiserror::Error)]
pub enum KeepAliveError {
    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

/// Result of a single GET.
#[derive(Debug, Clone, PartialEq)]
pub enum PingOutcome {
    /// 2xx. `status` is the body's `status` field when it has one.
    Healthy {
        status: String,
        uptime_secs: Option<u64>,
    },
    /// Non-2xx status code.
    Unhealthy(u16),
    Timeout,
    Failed(String),
}

impl PingOutcome {
    pub fn is_healthy(&self) -> bool {
        matches!(self, PingOutcome::Healthy { .. })
    }

    fn log(&self, url: &str, timeout_secs: u64) {
        match self {
            PingOutcome::Healthy {
                status,
                uptime_secs,
            } => tracing::info!(url, status = %status, uptime_secs = ?uptime_secs, "Ping successful"),
            PingOutcome::Unhealthy(code) => {
                tracing::warn!(url, status = *code, "Ping returned error status")
            }
            PingOutcome::Timeout => {
                tracing::warn!(url, timeout_secs, "Ping timed out")
            }
            PingOutcome::Failed(e) => tracing::error!(url, error = %e, "Ping failed"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    status: Option<String>,
    uptime_secs: Option<u64>,
}

pub struct Pinger {
    client: reqwest::Client,
    config: KeepAliveConfig,
}

impl Pinger {
    pub fn new(config: KeepAliveConfig) -> Result<Self, KeepAliveError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| KeepAliveError::Client(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &KeepAliveConfig {
        &self.config
    }

    /// GET `{backend_url}{path}` and classify the response.
    pub async fn ping(&self, path: &str) -> PingOutcome {
        let url = format!("{}{}", self.config.backend_url, path);
        let outcome = match self.client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => {
                let body = resp.json::<StatusBody>().await.ok();
                PingOutcome::Healthy {
                    status: body
                        .as_ref()
                        .and_then(|b| b.status.clone())
                        .unwrap_or_else(|| "unknown".into()),
                    uptime_secs: body.and_then(|b| b.uptime_secs),
                }
            }
            Ok(resp) => PingOutcome::Unhealthy(resp.status().as_u16()),
            Err(e) if e.is_timeout() => PingOutcome::Timeout,
            Err(e) => PingOutcome::Failed(e.to_string()),
        };
        outcome.log(&url, self.config.request_timeout.as_secs());
        outcome
    }

    /// One keep-warm round: health endpoint, then root.
    pub async fn ping_once(&self) -> (PingOutcome, PingOutcome) {
        let health = self.ping("/health").await;
        let root = self.ping("/").await;
        (health, root)
    }
}

/// Ping on every interval until `shutdown` resolves. Returns the number of
/// completed rounds.
pub async fn run<F>(config: KeepAliveConfig, shutdown: F) -> Result<u64, KeepAliveError>
where
    F: Future<Output = ()>,
{
    let pinger = Pinger::new(config)?;
    tracing::info!(
        url = %pinger.config().backend_url,
        interval_secs = pinger.config().interval.as_secs(),
        "Keep-alive started"
    );

    let mut ticker = tokio::time::interval(pinger.config().interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    let mut rounds = 0u64;
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!(rounds, "Keep-alive stopped");
                return Ok(rounds);
            }
            _ = ticker.tick() => {
                let (health, _) = pinger.ping_once().await;
                rounds += 1;
                if !health.is_healthy() {
                    tracing::debug!(rounds, "Backend not healthy, next attempt on schedule");
                }
            }
        }
    }
}
