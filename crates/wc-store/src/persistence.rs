//! Order stats persistence
//!
//! Rows are cached API responses keyed by (site, unit, quantity, end date).
//! [`OrderStatsTable`] keeps them in memory and optionally mirrors them to a
//! JSON file so they outlive the store instance.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use wc_client::OrderStatsApiUnit;

/// One cached order stats response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatsRow {
    /// Assigned by the table; 0 until first written
    #[serde(default)]
    pub id: u64,
    pub local_site_id: i32,
    pub unit: OrderStatsApiUnit,
    pub quantity: u32,
    /// Period date as sent to the API
    pub date: String,
    /// Custom range start, empty for default rows
    #[serde(default)]
    pub start_date: String,
    pub end_date: String,
    #[serde(default)]
    pub is_custom: bool,
    pub fields: Value,
    pub data: Value,
}

impl OrderStatsRow {
    fn column(&self, name: &str) -> Option<usize> {
        self.fields
            .as_array()?
            .iter()
            .position(|field| field.as_str() == Some(name))
    }

    fn rows(&self) -> impl Iterator<Item = &Vec<Value>> {
        self.data
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(Value::as_array)
    }

    /// Values of `column` keyed by period
    ///
    /// Periods whose value `extract` rejects are left out.
    pub fn values_by_period<T>(
        &self,
        column: &str,
        extract: impl Fn(&Value) -> Option<T>,
    ) -> BTreeMap<String, T> {
        let (Some(period), Some(index)) = (self.column("period"), self.column(column)) else {
            return BTreeMap::new();
        };

        self.rows()
            .filter_map(|row| {
                let period = row.get(period)?.as_str()?;
                let value = extract(row.get(index)?)?;
                Some((period.to_string(), value))
            })
            .collect()
    }

    /// Currency reported by the first period
    pub fn currency(&self) -> Option<String> {
        let index = self.column("currency")?;
        self.rows()
            .next()?
            .get(index)?
            .as_str()
            .map(str::to_string)
    }
}

/// Row selector understood by [`StatsPersistence`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatsQuery {
    Exact {
        site: i32,
        unit: OrderStatsApiUnit,
        quantity: u32,
        end_date: String,
    },
    SiteAndUnit {
        site: i32,
        unit: OrderStatsApiUnit,
    },
    Custom {
        site: i32,
    },
    /// Custom rows of `site` other than the row with `id`
    CustomExcept {
        site: i32,
        id: u64,
    },
    Site {
        site: i32,
    },
}

impl StatsQuery {
    pub fn matches(&self, row: &OrderStatsRow) -> bool {
        match self {
            StatsQuery::Exact {
                site,
                unit,
                quantity,
                end_date,
            } => {
                row.local_site_id == *site
                    && row.unit == *unit
                    && row.quantity == *quantity
                    && row.end_date == *end_date
            }
            StatsQuery::SiteAndUnit { site, unit } => {
                row.local_site_id == *site && row.unit == *unit
            }
            StatsQuery::Custom { site } => row.local_site_id == *site && row.is_custom,
            StatsQuery::CustomExcept { site, id } => {
                row.local_site_id == *site && row.is_custom && row.id != *id
            }
            StatsQuery::Site { site } => row.local_site_id == *site,
        }
    }
}

/// Storage collaborator of the order stats store
///
/// Implementations serialize their own writes; `select` returns the oldest
/// matching row.
pub trait StatsPersistence: Send + Sync {
    fn select(&self, query: &StatsQuery) -> Option<OrderStatsRow>;

    fn select_all(&self) -> Vec<OrderStatsRow>;

    /// Replace the row with the same id, or insert under a fresh id when
    /// `row.id` is unknown. Returns the number of rows written.
    fn upsert(&self, row: OrderStatsRow) -> usize;

    fn delete(&self, query: &StatsQuery) -> usize;
}

/// Write `row`, keyed by (site, unit, quantity, end date)
///
/// A matching row is updated in place and keeps its id. Writing a custom row
/// evicts every other custom row of the same site, so each site keeps at
/// most one, even when the custom window collides with a default one.
pub fn insert_or_update_order_stats(db: &dyn StatsPersistence, mut row: OrderStatsRow) -> usize {
    let key = StatsQuery::Exact {
        site: row.local_site_id,
        unit: row.unit,
        quantity: row.quantity,
        end_date: row.end_date.clone(),
    };
    row.id = db.select(&key).map_or(0, |existing| existing.id);

    if row.is_custom {
        let evicted = db.delete(&StatsQuery::CustomExcept {
            site: row.local_site_id,
            id: row.id,
        });
        if evicted > 0 {
            log::debug!(
                "Evicted {} custom stats row(s) for site {}",
                evicted,
                row.local_site_id
            );
        }
    }

    db.upsert(row)
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TableState {
    next_id: u64,
    rows: Vec<OrderStatsRow>,
}

/// In-memory stats table with optional JSON file backing
#[derive(Debug)]
pub struct OrderStatsTable {
    state: Mutex<TableState>,
    path: Option<PathBuf>,
}

impl OrderStatsTable {
    /// A table that lives only as long as the process
    pub fn in_memory() -> Self {
        Self {
            state: Mutex::new(TableState::default()),
            path: None,
        }
    }

    /// Open a table backed by `path`, loading existing rows
    ///
    /// A missing file starts an empty table; an unreadable one is logged and
    /// replaced on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = match load_state(&path) {
            Ok(Some(state)) => {
                log::debug!(
                    "Loaded {} stats row(s) from {}",
                    state.rows.len(),
                    path.display()
                );
                state
            }
            Ok(None) => TableState::default(),
            Err(e) => {
                log::warn!("Failed to load stats table: {:#}", e);
                TableState::default()
            }
        };

        Self {
            state: Mutex::new(state),
            path: Some(path),
        }
    }

    /// Table persisted under the platform cache directory
    pub fn open_default() -> Result<Self> {
        Ok(Self::open(flux_config::stats_cache_path()?))
    }

    /// File-backed when `cache_file` is set, in-memory otherwise
    pub fn from_config(config: &flux_config::StatsConfig) -> Self {
        match &config.cache_file {
            Some(path) => Self::open(path),
            None => Self::in_memory(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.lock().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, TableState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, state: &TableState) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = save_state(path, state) {
            log::warn!("Failed to save stats table: {:#}", e);
        }
    }
}

fn load_state(path: &Path) -> Result<Option<TableState>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let state = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(Some(state))
}

fn save_state(path: &Path, state: &TableState) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let content = serde_json::to_string_pretty(state).context("Failed to serialize stats table")?;
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

impl StatsPersistence for OrderStatsTable {
    fn select(&self, query: &StatsQuery) -> Option<OrderStatsRow> {
        self.lock()
            .rows
            .iter()
            .find(|row| query.matches(row))
            .cloned()
    }

    fn select_all(&self) -> Vec<OrderStatsRow> {
        self.lock().rows.clone()
    }

    fn upsert(&self, mut row: OrderStatsRow) -> usize {
        let mut state = self.lock();

        let position = match row.id {
            0 => None,
            id => state.rows.iter().position(|existing| existing.id == id),
        };
        match position {
            Some(index) => state.rows[index] = row,
            None => {
                state.next_id += 1;
                row.id = state.next_id;
                state.rows.push(row);
            }
        }

        self.persist(&state);
        1
    }

    fn delete(&self, query: &StatsQuery) -> usize {
        let mut state = self.lock();
        let before = state.rows.len();
        state.rows.retain(|row| !query.matches(row));
        let deleted = before - state.rows.len();

        if deleted > 0 {
            self.persist(&state);
        }
        deleted
    }
}
