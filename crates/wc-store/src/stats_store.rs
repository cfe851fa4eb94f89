//! Order stats store
//!
//! Fetches order stats through the [`WooClient`], caches them in a
//! [`StatsPersistence`] table and answers synchronous queries from it.
//!
//! Every fetch is keyed by (site, granularity, quantity, end date). A fetch
//! that was dispatched while an earlier fetch for the same key was still in
//! flight reuses that fetch's outcome instead of calling the transport
//! again; it still produces its own `FetchedOrderStats` action.

use crate::actions::{FetchOrderStatsPayload, FetchedOrderStatsPayload, StatsAction, WcAction};
use crate::granularity::{quantity_by_granularity, StatsGranularity};
use crate::persistence::{insert_or_update_order_stats, OrderStatsRow, StatsPersistence, StatsQuery};
use crate::site::{parse_date, SiteModel, DATE_FORMAT};
use async_trait::async_trait;
use chrono::NaiveDate;
use flux_config::StatsConfig;
use flux_dispatcher::{ChangeEvent, Store, StoreContext, StoreError, ThreadMode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};
use wc_client::{StatsRequest, StatsResponse, TransportError, WooClient};

pub const ORDER_STATS_STORE: &str = "order-stats";
pub const CAUSE_FETCH_ORDER_STATS: &str = "fetch-order-stats";

/// Identity of one stats window
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatsKey {
    /// Local site id
    pub site: i32,
    pub granularity: StatsGranularity,
    pub quantity: u32,
    /// `%Y-%m-%d`
    pub end_date: String,
}

impl StatsKey {
    fn query(&self) -> StatsQuery {
        StatsQuery::Exact {
            site: self.site,
            unit: self.granularity.api_unit(),
            quantity: self.quantity,
            end_date: self.end_date.clone(),
        }
    }
}

/// Per-key fetch progress
#[derive(Debug, Clone, PartialEq)]
pub enum FetchState {
    Idle,
    /// Transport call running for the fetch dispatched as `sequence`
    Fetching { sequence: u64 },
    /// Last fetch finished when the dispatcher was at `completed_at`
    Completed {
        completed_at: u64,
        outcome: Result<usize, StoreError>,
    },
}

/// Background store owning cached order stats
pub struct OrderStatsStore {
    client: Arc<dyn WooClient>,
    db: Arc<dyn StatsPersistence>,
    config: StatsConfig,
    fetches: RwLock<HashMap<StatsKey, FetchState>>,
}

impl OrderStatsStore {
    pub fn new(
        client: Arc<dyn WooClient>,
        db: Arc<dyn StatsPersistence>,
        config: StatsConfig,
    ) -> Self {
        Self {
            client,
            db,
            config,
            fetches: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &StatsConfig {
        &self.config
    }

    /// Period count for a date range, `default_quantity` without one
    pub fn get_quantity_by_granularity(
        &self,
        start_date: Option<&str>,
        end_date: Option<&str>,
        granularity: StatsGranularity,
        default_quantity: u32,
    ) -> u32 {
        quantity_by_granularity(
            start_date,
            end_date,
            granularity,
            default_quantity,
            self.config.week_start,
        )
    }

    /// Cached row for a window; without quantity and date, the first row
    /// for the site and granularity
    pub fn get_raw_stats(
        &self,
        site: &SiteModel,
        granularity: StatsGranularity,
        quantity: Option<u32>,
        date: Option<&str>,
    ) -> Option<OrderStatsRow> {
        let query = match (quantity, date.filter(|d| !d.is_empty())) {
            (Some(quantity), Some(date)) => StatsQuery::Exact {
                site: site.id,
                unit: granularity.api_unit(),
                quantity,
                end_date: date.to_string(),
            },
            _ => StatsQuery::SiteAndUnit {
                site: site.id,
                unit: granularity.api_unit(),
            },
        };
        self.db.select(&query)
    }

    /// Total sales per period
    pub fn get_revenue_stats(
        &self,
        site: &SiteModel,
        granularity: StatsGranularity,
        quantity: Option<u32>,
        date: Option<&str>,
    ) -> BTreeMap<String, f64> {
        self.get_raw_stats(site, granularity, quantity, date)
            .map(|row| row.values_by_period("total_sales", Value::as_f64))
            .unwrap_or_default()
    }

    /// Order count per period
    pub fn get_order_stats(
        &self,
        site: &SiteModel,
        granularity: StatsGranularity,
        quantity: Option<u32>,
        date: Option<&str>,
    ) -> BTreeMap<String, i64> {
        self.get_raw_stats(site, granularity, quantity, date)
            .map(|row| row.values_by_period("orders", Value::as_i64))
            .unwrap_or_default()
    }

    /// Currency of the site's first cached row
    pub fn get_stats_currency(&self, site: &SiteModel) -> Option<String> {
        self.db
            .select(&StatsQuery::Site { site: site.id })
            .and_then(|row| row.currency())
    }

    /// The site's custom-range row, if one is cached
    pub fn get_custom_stats(&self, site: &SiteModel) -> Option<OrderStatsRow> {
        self.db.select(&StatsQuery::Custom { site: site.id })
    }

    pub fn fetch_state(&self, key: &StatsKey) -> FetchState {
        self.fetches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
            .unwrap_or(FetchState::Idle)
    }

    fn set_fetch_state(&self, key: &StatsKey, state: FetchState) {
        self.fetches
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone(), state);
    }

    async fn fetch_order_stats(
        &self,
        payload: &FetchOrderStatsPayload,
        ctx: &StoreContext<WcAction>,
    ) {
        let granularity = payload.granularity;
        let custom = payload.is_custom();
        let quantity = self.get_quantity_by_granularity(
            payload.start_date.as_deref(),
            payload.end_date.as_deref(),
            granularity,
            granularity.default_quantity(&self.config),
        );

        let end = if custom {
            payload.end_date.as_deref().and_then(parse_date)
        } else {
            Some(payload.site.today())
        };
        let key = StatsKey {
            site: payload.site.id,
            granularity,
            quantity,
            end_date: match end {
                Some(end) => end.format(DATE_FORMAT).to_string(),
                None => payload.end_date.clone().unwrap_or_default(),
            },
        };

        let outcome = match end {
            Some(end) => self.fetch_window(&key, end, payload, ctx).await,
            None => Err(StoreError::generic(format!(
                "invalid end date {:?}",
                key.end_date
            ))),
        };

        if let Err(e) = &outcome {
            log::warn!("{}: fetch {:?} failed: {}", ORDER_STATS_STORE, key, e);
        }

        let event = ChangeEvent::new(ORDER_STATS_STORE, CAUSE_FETCH_ORDER_STATS);
        let event = match &outcome {
            Ok(rows) => event.with_rows_affected(*rows),
            Err(e) => event.with_error(e.clone()),
        };

        ctx.dispatch(WcAction::Stats(StatsAction::FetchedOrderStats(
            FetchedOrderStatsPayload {
                site: payload.site.clone(),
                granularity,
                key,
                outcome,
            },
        )));
        ctx.emit_change(event);
    }

    async fn fetch_window(
        &self,
        key: &StatsKey,
        end: NaiveDate,
        payload: &FetchOrderStatsPayload,
        ctx: &StoreContext<WcAction>,
    ) -> Result<usize, StoreError> {
        if !payload.force_refresh {
            if let FetchState::Completed {
                completed_at,
                outcome,
            } = self.fetch_state(key)
            {
                if ctx.sequence() <= completed_at {
                    log::debug!(
                        "{}: #{} coalesced into fetch finished at #{}",
                        ORDER_STATS_STORE,
                        ctx.sequence(),
                        completed_at
                    );
                    return outcome;
                }
            }
        }

        if self.config.cache_mode.should_read() && !payload.force_refresh {
            if self.db.select(&key.query()).is_some() {
                log::debug!("{}: cache HIT for {:?}", ORDER_STATS_STORE, key);
                return Ok(0);
            }
            log::debug!("{}: cache MISS for {:?}", ORDER_STATS_STORE, key);
        }

        self.set_fetch_state(
            key,
            FetchState::Fetching {
                sequence: ctx.sequence(),
            },
        );

        let custom = payload.is_custom();
        let request = StatsRequest {
            site_id: payload.site.site_id,
            unit: key.granularity.api_unit(),
            date: end.format(key.granularity.api_date_format()).to_string(),
            quantity: key.quantity,
            force: payload.force_refresh,
            start_date: custom
                .then(|| payload.start_date.as_deref().map(str::trim).map(str::to_string))
                .flatten(),
            end_date: custom.then(|| key.end_date.clone()),
        };

        let outcome = match self.client.fetch_stats(&request).await {
            Ok(response) => self.store_response(key, &request, response),
            Err(e) => Err(classify_transport_error(e)),
        };

        self.set_fetch_state(
            key,
            FetchState::Completed {
                completed_at: ctx.dispatcher().sequence(),
                outcome: outcome.clone(),
            },
        );
        outcome
    }

    fn store_response(
        &self,
        key: &StatsKey,
        request: &StatsRequest,
        response: StatsResponse,
    ) -> Result<usize, StoreError> {
        if !response.has_table() {
            return Err(StoreError::invalid_response(
                "stats response is missing fields or data",
            ));
        }
        if !self.config.cache_mode.should_write() {
            return Ok(0);
        }

        let row = OrderStatsRow {
            id: 0,
            local_site_id: key.site,
            unit: request.unit,
            quantity: key.quantity,
            date: request.date.clone(),
            start_date: request.start_date.clone().unwrap_or_default(),
            end_date: key.end_date.clone(),
            is_custom: request.start_date.is_some(),
            fields: response.fields.unwrap_or(Value::Null),
            data: response.data.unwrap_or(Value::Null),
        };
        Ok(insert_or_update_order_stats(self.db.as_ref(), row))
    }
}

/// Map a transport failure onto the store error taxonomy
pub fn classify_transport_error(error: TransportError) -> StoreError {
    if error.is_malformed_response() {
        StoreError::invalid_response(error.to_string())
    } else {
        StoreError::transport(error.to_string())
    }
}

#[async_trait]
impl Store<WcAction> for OrderStatsStore {
    fn name(&self) -> &'static str {
        ORDER_STATS_STORE
    }

    fn thread_mode(&self) -> ThreadMode {
        ThreadMode::Background
    }

    fn handles(&self, action: &WcAction) -> bool {
        matches!(action, WcAction::Stats(StatsAction::FetchOrderStats(_)))
    }

    async fn on_action(&self, action: &WcAction, ctx: &StoreContext<WcAction>) {
        match action {
            WcAction::Stats(StatsAction::FetchOrderStats(payload)) => {
                self.fetch_order_stats(payload, ctx).await
            }
            // Produced by this store
            WcAction::Stats(StatsAction::FetchedOrderStats(_)) => {}
            WcAction::Site(_) => {}
        }
    }
}
