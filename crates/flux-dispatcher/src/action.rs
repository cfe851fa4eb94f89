//! Action contract
//!
//! The application defines one closed enum of actions. Each variant is a type
//! tag and its fields are the payload, so an action with a tag but no payload
//! shape cannot be constructed. Domains are separated by nesting one enum per
//! namespace inside the root enum.

use std::fmt;

/// An immutable typed event routed through the [`Dispatcher`](crate::Dispatcher)
pub trait Action: Clone + fmt::Debug + Send + Sync + 'static {
    /// Namespace of the store domain this action belongs to
    fn namespace(&self) -> &'static str;

    /// Type tag, unique within the namespace
    fn type_name(&self) -> &'static str;
}
