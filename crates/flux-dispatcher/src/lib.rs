//! flux-dispatcher - typed action bus for thread-affine stores
//!
//! ```text
//!   caller ──dispatch(action)──▶ Dispatcher ──▶ Immediate stores (caller's thread)
//!                                   │
//!                                   ├──▶ lane ──▶ Main store      ("flux-main")
//!                                   └──▶ lane ──▶ Background store ("flux-background" pool)
//!
//!   store ──emit_change──▶ Dispatcher ──▶ observers ("flux-main")
//! ```
//!
//! Each store sees its actions in dispatch order, one at a time. Stores react
//! to actions by updating their own state and dispatching derived actions;
//! they never call each other.

pub mod action;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod observer;
pub mod store;

pub use action::Action;
pub use dispatcher::Dispatcher;
pub use error::{ErrorKind, StoreError};
pub use executor::{block_on_current, Executor};
pub use observer::{ChangeEvent, ChangeObserver, ObserverId};
pub use store::{Store, StoreContext, ThreadMode};
