//! WooCommerce actions
//!
//! One closed enum per store domain, nested in the root [`WcAction`].
//! Requests are named imperatively, results in the past tense.

use crate::granularity::StatsGranularity;
use crate::site::SiteModel;
use crate::stats_store::StatsKey;
use flux_dispatcher::{Action, StoreError};

/// Root action type routed by the dispatcher
#[derive(Debug, Clone, PartialEq)]
pub enum WcAction {
    Stats(StatsAction),
    Site(SiteAction),
}

impl Action for WcAction {
    fn namespace(&self) -> &'static str {
        match self {
            WcAction::Stats(_) => "wc_stats",
            WcAction::Site(_) => "wc_site",
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            WcAction::Stats(StatsAction::FetchOrderStats(_)) => "FETCH_ORDER_STATS",
            WcAction::Stats(StatsAction::FetchedOrderStats(_)) => "FETCHED_ORDER_STATS",
            WcAction::Site(SiteAction::FetchApiVersion(_)) => "FETCH_SITE_API_VERSION",
            WcAction::Site(SiteAction::FetchedApiVersion(_)) => "FETCHED_SITE_API_VERSION",
        }
    }
}

impl From<StatsAction> for WcAction {
    fn from(action: StatsAction) -> Self {
        WcAction::Stats(action)
    }
}

impl From<SiteAction> for WcAction {
    fn from(action: SiteAction) -> Self {
        WcAction::Site(action)
    }
}

/// Order stats domain
#[derive(Debug, Clone, PartialEq)]
pub enum StatsAction {
    FetchOrderStats(FetchOrderStatsPayload),
    FetchedOrderStats(FetchedOrderStatsPayload),
}

/// Site domain
#[derive(Debug, Clone, PartialEq)]
pub enum SiteAction {
    FetchApiVersion(SiteModel),
    FetchedApiVersion(ApiVersionPayload),
}

/// Request for a site's order stats
///
/// Without a start and end date the store fetches its default window ending
/// today on the site.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOrderStatsPayload {
    pub site: SiteModel,
    pub granularity: StatsGranularity,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub force_refresh: bool,
}

impl FetchOrderStatsPayload {
    pub fn new(site: SiteModel, granularity: StatsGranularity) -> Self {
        Self {
            site,
            granularity,
            start_date: None,
            end_date: None,
            force_refresh: false,
        }
    }

    /// Request an ad-hoc date range (`%Y-%m-%d`)
    pub fn custom(
        site: SiteModel,
        granularity: StatsGranularity,
        start_date: impl Into<String>,
        end_date: impl Into<String>,
    ) -> Self {
        Self {
            start_date: Some(start_date.into()),
            end_date: Some(end_date.into()),
            ..Self::new(site, granularity)
        }
    }

    pub fn with_force_refresh(mut self) -> Self {
        self.force_refresh = true;
        self
    }

    /// Custom iff both range ends are given and non-empty
    pub fn is_custom(&self) -> bool {
        let present = |date: &Option<String>| date.as_deref().is_some_and(|d| !d.trim().is_empty());
        present(&self.start_date) && present(&self.end_date)
    }
}

/// Result of one `FetchOrderStats`
///
/// `outcome` carries the number of rows written, or the classified error.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedOrderStatsPayload {
    pub site: SiteModel,
    pub granularity: StatsGranularity,
    pub key: StatsKey,
    pub outcome: Result<usize, StoreError>,
}

impl FetchedOrderStatsPayload {
    pub fn is_error(&self) -> bool {
        self.outcome.is_err()
    }

    pub fn error(&self) -> Option<&StoreError> {
        self.outcome.as_ref().err()
    }
}

/// Result of one `FetchApiVersion`
#[derive(Debug, Clone, PartialEq)]
pub struct ApiVersionPayload {
    pub site: SiteModel,
    /// Newest supported namespace, e.g. "wc/v3"
    pub outcome: Result<String, StoreError>,
}
