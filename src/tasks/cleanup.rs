//! Cache Sweeper Task
//!
//! Background task that periodically removes expired cache entries and
//! in-flight entries past their safeguard. Expired entries are dropped lazily
//! on read anyway; the sweep bounds memory held by entries nobody reads again.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::client::ApiClient;

/// Spawns a background task that sweeps `client` every `interval`.
///
/// The task runs until aborted through the returned handle.
///
/// # Example
/// ```ignore
/// let client = ApiClient::builder(config).build()?;
/// let sweeper = spawn_cleanup_task(client.clone(), Duration::from_secs(30));
/// // Later, during shutdown:
/// sweeper.abort();
/// ```
pub fn spawn_cleanup_task(client: ApiClient, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            interval_ms = interval.as_millis() as u64,
            "starting cache sweeper"
        );

        loop {
            tokio::time::sleep(interval).await;

            let report = client.sweep();
            if report.expired_entries > 0 || report.stale_flights > 0 {
                info!(
                    expired_entries = report.expired_entries,
                    stale_flights = report.stale_flights,
                    "sweep removed entries"
                );
            } else {
                debug!("sweep found nothing to remove");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RequestOptions;
    use crate::config::ClientConfig;
    use crate::transport::{Transport, TransportError, TransportRequest, TransportResponse};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;

    struct EchoTransport;

    #[async_trait]
    impl Transport for EchoTransport {
        async fn execute(
            &self,
            request: TransportRequest,
        ) -> Result<TransportResponse, TransportError> {
            Ok(TransportResponse {
                status: 200,
                body: json!({ "path": request.path }),
            })
        }
    }

    fn client() -> ApiClient {
        ApiClient::builder(ClientConfig::default())
            .transport(Arc::new(EchoTransport))
            .build()
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_removes_expired_entries() {
        let client = client();
        client
            .get(
                "/slots",
                RequestOptions::new().cache_ttl(Duration::from_secs(1)),
            )
            .await
            .unwrap();
        assert_eq!(client.cache_stats().total_entries, 1);

        let handle = spawn_cleanup_task(client.clone(), Duration::from_secs(1));

        tokio::time::sleep(Duration::from_millis(2500)).await;

        let stats = client.cache_stats();
        assert_eq!(stats.total_entries, 0, "expired entry should have been swept");
        assert_eq!(stats.expirations, 1);

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_preserves_fresh_entries() {
        let client = client();
        client
            .get(
                "/services",
                RequestOptions::new().cache_ttl(Duration::from_secs(3600)),
            )
            .await
            .unwrap();

        let handle = spawn_cleanup_task(client.clone(), Duration::from_secs(1));

        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(client.cache_stats().total_entries, 1);
        handle.abort();
    }

    #[tokio::test]
    async fn test_sweeper_can_be_aborted() {
        let handle = spawn_cleanup_task(client(), Duration::from_secs(1));

        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "task should be finished after abort");
    }
}
