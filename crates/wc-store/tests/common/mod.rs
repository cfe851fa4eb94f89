//! Shared fixtures for store integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use flux_config::StatsConfig;
use flux_dispatcher::{ChangeEvent, Dispatcher, Store, StoreContext, ThreadMode};
use serde_json::json;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use wc_client::{RootApiResponse, StatsRequest, StatsResponse, TransportError, WooClient};
use wc_store::{
    FetchedOrderStatsPayload, OrderStatsStore, OrderStatsTable, SiteAction, SiteApiStore,
    StatsAction, WcAction,
};

pub const WAIT: Duration = Duration::from_secs(5);

/// Programmable transport recording every stats request
pub struct MockWooClient {
    delay: Duration,
    stats: Mutex<Result<StatsResponse, TransportError>>,
    namespaces: Mutex<Result<RootApiResponse, TransportError>>,
    requests: Mutex<Vec<StatsRequest>>,
}

impl MockWooClient {
    pub fn new() -> Self {
        Self {
            delay: Duration::ZERO,
            stats: Mutex::new(Ok(sample_response())),
            namespaces: Mutex::new(Ok(RootApiResponse::default())),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_stats(self, outcome: Result<StatsResponse, TransportError>) -> Self {
        *self.stats.lock().unwrap() = outcome;
        self
    }

    pub fn with_namespaces(self, outcome: Result<RootApiResponse, TransportError>) -> Self {
        *self.namespaces.lock().unwrap() = outcome;
        self
    }

    pub fn requests(&self) -> Vec<StatsRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl WooClient for MockWooClient {
    async fn fetch_stats(&self, request: &StatsRequest) -> Result<StatsResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.stats.lock().unwrap().clone()
    }

    async fn fetch_api_namespaces(&self, _site_id: i64) -> Result<RootApiResponse, TransportError> {
        self.namespaces.lock().unwrap().clone()
    }
}

pub fn sample_response() -> StatsResponse {
    StatsResponse {
        date: Some("2019-01-28".to_string()),
        unit: Some("day".to_string()),
        quantity: Some("2".to_string()),
        fields: Some(json!(["period", "orders", "total_sales", "currency"])),
        data: Some(json!([
            ["2019-01-27", 1, 10.0, "USD"],
            ["2019-01-28", 3, 42.5, "USD"]
        ])),
    }
}

/// Forwards every result action to the test thread
struct ResultRecorder {
    tx: Mutex<mpsc::Sender<WcAction>>,
}

#[async_trait]
impl Store<WcAction> for ResultRecorder {
    fn name(&self) -> &'static str {
        "result-recorder"
    }

    fn thread_mode(&self) -> ThreadMode {
        ThreadMode::Immediate
    }

    fn handles(&self, action: &WcAction) -> bool {
        matches!(
            action,
            WcAction::Stats(StatsAction::FetchedOrderStats(_))
                | WcAction::Site(SiteAction::FetchedApiVersion(_))
        )
    }

    async fn on_action(&self, action: &WcAction, _ctx: &StoreContext<WcAction>) {
        let _ = self.tx.lock().unwrap().send(action.clone());
    }
}

pub struct Harness {
    pub dispatcher: Dispatcher<WcAction>,
    pub client: Arc<MockWooClient>,
    pub db: Arc<OrderStatsTable>,
    pub stats: Arc<OrderStatsStore>,
    pub site_api: Arc<SiteApiStore>,
    results: mpsc::Receiver<WcAction>,
    changes: mpsc::Receiver<(ChangeEvent, bool)>,
}

impl Harness {
    pub fn new(config: StatsConfig, client: MockWooClient) -> Self {
        Self::with_table(config, client, OrderStatsTable::in_memory())
    }

    pub fn with_table(config: StatsConfig, client: MockWooClient, table: OrderStatsTable) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        let dispatcher = Dispatcher::new(2).unwrap();
        let client = Arc::new(client);
        let db = Arc::new(table);
        let stats = Arc::new(OrderStatsStore::new(client.clone(), db.clone(), config));
        let site_api = Arc::new(SiteApiStore::new(client.clone()));

        let (tx, results) = mpsc::channel();
        assert!(dispatcher.register(Arc::new(ResultRecorder { tx: Mutex::new(tx) })));
        assert!(dispatcher.register(stats.clone()));
        assert!(dispatcher.register(site_api.clone()));

        let (change_tx, changes) = mpsc::channel();
        let change_tx = Mutex::new(change_tx);
        dispatcher.add_observer(Arc::new(move |event: &ChangeEvent| {
            let on_main = thread::current().name() == Some("flux-main");
            let _ = change_tx.lock().unwrap().send((event.clone(), on_main));
        }));

        Self {
            dispatcher,
            client,
            db,
            stats,
            site_api,
            results,
            changes,
        }
    }

    pub fn dispatch(&self, action: impl Into<WcAction>) {
        self.dispatcher.dispatch(action.into());
    }

    pub fn next_result(&self) -> WcAction {
        self.results.recv_timeout(WAIT).expect("no result action")
    }

    pub fn next_stats_result(&self) -> FetchedOrderStatsPayload {
        match self.next_result() {
            WcAction::Stats(StatsAction::FetchedOrderStats(payload)) => payload,
            other => panic!("unexpected action {:?}", other),
        }
    }

    pub fn next_change(&self) -> (ChangeEvent, bool) {
        self.changes.recv_timeout(WAIT).expect("no change event")
    }
}
