//! WooCommerce API data transfer objects
//!
//! These mirror the wire shapes returned by the stats and root endpoints.
//! Every field is optional: the store decides what an incomplete response
//! means.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Newest WooCommerce REST namespace first
pub const WOO_API_NAMESPACES: [&str; 3] = ["wc/v3", "wc/v2", "wc/v1"];

/// Period unit understood by the order stats endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatsApiUnit {
    Day,
    Week,
    Month,
    Year,
}

impl OrderStatsApiUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatsApiUnit::Day => "day",
            OrderStatsApiUnit::Week => "week",
            OrderStatsApiUnit::Month => "month",
            OrderStatsApiUnit::Year => "year",
        }
    }
}

impl fmt::Display for OrderStatsApiUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of one order stats request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatsRequest {
    /// Remote id of the site
    pub site_id: i64,

    pub unit: OrderStatsApiUnit,

    /// Last period to report, formatted for `unit` (e.g. "2019-W05")
    pub date: String,

    /// Number of periods ending at `date`
    pub quantity: u32,

    /// Bypass server side caches
    pub force: bool,

    /// Start of a custom range as `%Y-%m-%d`
    pub start_date: Option<String>,

    /// End of a custom range as `%Y-%m-%d`
    pub end_date: Option<String>,
}

/// Order stats response
///
/// `fields` names the columns and `data` holds one array per period:
///
/// ```json
/// { "fields": ["period", "orders", "total_sales", "currency"],
///   "data": [["2019-01-28", 3, 42.5, "USD"]] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsResponse {
    pub date: Option<String>,
    pub unit: Option<String>,
    pub quantity: Option<String>,
    pub fields: Option<Value>,
    pub data: Option<Value>,
}

impl StatsResponse {
    /// Both the column names and the rows are present as arrays
    pub fn has_table(&self) -> bool {
        matches!(
            (&self.fields, &self.data),
            (Some(Value::Array(_)), Some(Value::Array(_)))
        )
    }
}

/// Root (`/`) API discovery response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootApiResponse {
    pub name: Option<String>,
    pub namespaces: Option<Vec<String>>,
}

impl RootApiResponse {
    /// Newest WooCommerce namespace the site exposes
    pub fn max_woo_api_version(&self) -> Option<&'static str> {
        let namespaces = self.namespaces.as_ref()?;
        WOO_API_NAMESPACES
            .into_iter()
            .find(|candidate| namespaces.iter().any(|ns| ns == candidate))
    }
}
