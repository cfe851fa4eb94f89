//! WooCommerce client trait
//!
//! Stores talk to the network only through [`WooClient`]. Request
//! construction, authentication and retries belong to implementations.

use crate::error::TransportError;
use crate::types::{RootApiResponse, StatsRequest, StatsResponse};
use async_trait::async_trait;
use std::sync::Arc;

/// WooCommerce transport
///
/// Implementations must be `Send + Sync`: one client is shared by every
/// store and called from whichever context the store runs on.
#[async_trait]
pub trait WooClient: Send + Sync {
    /// Fetch order stats for a site
    async fn fetch_stats(&self, request: &StatsRequest) -> Result<StatsResponse, TransportError>;

    /// Fetch the root API description of a site, including its namespaces
    async fn fetch_api_namespaces(&self, site_id: i64) -> Result<RootApiResponse, TransportError>;
}

#[async_trait]
impl<C: WooClient + ?Sized> WooClient for Arc<C> {
    async fn fetch_stats(&self, request: &StatsRequest) -> Result<StatsResponse, TransportError> {
        (**self).fetch_stats(request).await
    }

    async fn fetch_api_namespaces(&self, site_id: i64) -> Result<RootApiResponse, TransportError> {
        (**self).fetch_api_namespaces(site_id).await
    }
}

/// Client decorator logging every call and its outcome at debug level
#[derive(Debug, Clone)]
pub struct LoggingClient<C> {
    inner: C,
}

impl<C: WooClient> LoggingClient<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

#[async_trait]
impl<C: WooClient> WooClient for LoggingClient<C> {
    async fn fetch_stats(&self, request: &StatsRequest) -> Result<StatsResponse, TransportError> {
        log::debug!(
            "fetch_stats site={} unit={} date={} quantity={}",
            request.site_id,
            request.unit,
            request.date,
            request.quantity
        );
        let result = self.inner.fetch_stats(request).await;
        if let Err(e) = &result {
            log::debug!("fetch_stats site={} failed: {}", request.site_id, e);
        }
        result
    }

    async fn fetch_api_namespaces(&self, site_id: i64) -> Result<RootApiResponse, TransportError> {
        log::debug!("fetch_api_namespaces site={}", site_id);
        let result = self.inner.fetch_api_namespaces(site_id).await;
        if let Err(e) = &result {
            log::debug!("fetch_api_namespaces site={} failed: {}", site_id, e);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OrderStatsApiUnit;
    use std::sync::Mutex;

    /// Mock client for testing
    #[derive(Debug, Default)]
    struct MockClient {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl WooClient for MockClient {
        async fn fetch_stats(
            &self,
            request: &StatsRequest,
        ) -> Result<StatsResponse, TransportError> {
            self.calls.lock().unwrap().push(request.date.clone());
            Ok(StatsResponse {
                date: Some(request.date.clone()),
                ..StatsResponse::default()
            })
        }

        async fn fetch_api_namespaces(
            &self,
            _site_id: i64,
        ) -> Result<RootApiResponse, TransportError> {
            Err(TransportError::Network("offline".to_string()))
        }
    }

    fn request() -> StatsRequest {
        StatsRequest {
            site_id: 42,
            unit: OrderStatsApiUnit::Day,
            date: "2019-01-28".to_string(),
            quantity: 30,
            force: false,
            start_date: None,
            end_date: None,
        }
    }

    #[tokio::test]
    async fn test_logging_client_delegates() {
        let client = LoggingClient::new(Arc::new(MockClient::default()));

        let response = client.fetch_stats(&request()).await.unwrap();

        assert_eq!(response.date.as_deref(), Some("2019-01-28"));
        assert_eq!(*client.inner().calls.lock().unwrap(), vec!["2019-01-28"]);
    }

    #[tokio::test]
    async fn test_logging_client_passes_errors_through() {
        let client = LoggingClient::new(MockClient::default());

        let result = client.fetch_api_namespaces(42).await;

        assert_eq!(result, Err(TransportError::Network("offline".to_string())));
    }
}
