//! WooCommerce stores on the flux dispatcher
//!
//! ```text
//!   FetchOrderStats ──▶ OrderStatsStore (background) ──▶ WooClient
//!                            │            │
//!                            │            └──▶ StatsPersistence (merge rule)
//!                            ▼
//!                    FetchedOrderStats + ChangeEvent
//!
//!   FetchApiVersion ──▶ SiteApiStore (main) ──▶ FetchedApiVersion + ChangeEvent
//! ```
//!
//! The composition root builds one [`Dispatcher`](flux_dispatcher::Dispatcher)
//! over [`WcAction`], one client and one stats table, and registers the stores:
//!
//! ```rust,ignore
//! let config = FluxConfig::load();
//! let dispatcher = Dispatcher::<WcAction>::with_config(&config)?;
//! let db = match config.stats.cache_file {
//!     Some(_) => OrderStatsTable::from_config(&config.stats),
//!     None => OrderStatsTable::open_default()?,
//! };
//! let db = Arc::new(db);
//! let stats = Arc::new(OrderStatsStore::new(client.clone(), db, config.stats.clone()));
//! dispatcher.register(stats.clone());
//! dispatcher.dispatch(StatsAction::FetchOrderStats(payload).into());
//! ```

pub mod actions;
pub mod api_version_store;
pub mod granularity;
pub mod persistence;
pub mod site;
pub mod stats_store;

pub use actions::{
    ApiVersionPayload, FetchOrderStatsPayload, FetchedOrderStatsPayload, SiteAction, StatsAction,
    WcAction,
};
pub use api_version_store::{SiteApiStore, CAUSE_FETCH_API_VERSION, SITE_API_STORE};
pub use granularity::{quantity_by_granularity, StatsGranularity};
pub use persistence::{
    insert_or_update_order_stats, OrderStatsRow, OrderStatsTable, StatsPersistence, StatsQuery,
};
pub use site::{SiteModel, DATE_FORMAT};
pub use stats_store::{
    classify_transport_error, FetchState, OrderStatsStore, StatsKey, CAUSE_FETCH_ORDER_STATS,
    ORDER_STATS_STORE,
};
