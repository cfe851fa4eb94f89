//! Supported WooCommerce API version per site

use crate::actions::{ApiVersionPayload, SiteAction, WcAction};
use crate::site::SiteModel;
use crate::stats_store::classify_transport_error;
use async_trait::async_trait;
use flux_dispatcher::{ChangeEvent, Store, StoreContext, StoreError, ThreadMode};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use wc_client::WooClient;

pub const SITE_API_STORE: &str = "site-api";
pub const CAUSE_FETCH_API_VERSION: &str = "fetch-api-version";

/// Main-context store remembering the newest API namespace each site supports
pub struct SiteApiStore {
    client: Arc<dyn WooClient>,
    versions: RwLock<HashMap<i32, String>>,
}

impl SiteApiStore {
    pub fn new(client: Arc<dyn WooClient>) -> Self {
        Self {
            client,
            versions: RwLock::new(HashMap::new()),
        }
    }

    /// Last fetched namespace for `site`, e.g. "wc/v3"
    pub fn supported_api_version(&self, site: &SiteModel) -> Option<String> {
        self.versions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&site.id)
            .cloned()
    }

    async fn fetch_api_version(&self, site: &SiteModel) -> Result<String, StoreError> {
        let root = self
            .client
            .fetch_api_namespaces(site.site_id)
            .await
            .map_err(classify_transport_error)?;

        root.max_woo_api_version()
            .map(str::to_string)
            .ok_or_else(|| StoreError::invalid_response("no WooCommerce API"))
    }
}

#[async_trait]
impl Store<WcAction> for SiteApiStore {
    fn name(&self) -> &'static str {
        SITE_API_STORE
    }

    fn thread_mode(&self) -> ThreadMode {
        ThreadMode::Main
    }

    fn handles(&self, action: &WcAction) -> bool {
        matches!(action, WcAction::Site(SiteAction::FetchApiVersion(_)))
    }

    async fn on_action(&self, action: &WcAction, ctx: &StoreContext<WcAction>) {
        let WcAction::Site(SiteAction::FetchApiVersion(site)) = action else {
            return;
        };

        let outcome = self.fetch_api_version(site).await;
        let event = ChangeEvent::new(SITE_API_STORE, CAUSE_FETCH_API_VERSION);
        let event = match &outcome {
            Ok(version) => {
                log::debug!("{}: site {} supports {}", SITE_API_STORE, site.id, version);
                self.versions
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(site.id, version.clone());
                event.with_rows_affected(1)
            }
            Err(e) => {
                log::warn!("{}: site {}: {}", SITE_API_STORE, site.id, e);
                event.with_error(e.clone())
            }
        };

        ctx.dispatch(WcAction::Site(SiteAction::FetchedApiVersion(
            ApiVersionPayload {
                site: site.clone(),
                outcome,
            },
        )));
        ctx.emit_change(event);
    }
}
