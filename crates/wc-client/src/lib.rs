//! WooCommerce API transport contract
//!
//! ```text
//! ┌──────────────────────────────┐
//! │        WooClient trait       │
//! │  - fetch_stats()             │
//! │  - fetch_api_namespaces()    │
//! └──────────────────────────────┘
//!                │
//!        ┌───────┴────────┐
//!        ▼                ▼
//!   HTTP client      LoggingClient
//!   (external)       (decorator)
//! ```
//!
//! The HTTP implementation lives with the application; stores depend only on
//! the trait and the DTOs in [`types`].

pub mod client;
pub mod error;
pub mod types;

pub use client::{LoggingClient, WooClient};
pub use error::TransportError;
pub use types::{
    OrderStatsApiUnit, RootApiResponse, StatsRequest, StatsResponse, WOO_API_NAMESPACES,
};
