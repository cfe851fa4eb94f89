//! Store contract
//!
//! A store owns one slice of application state. It declares which actions it
//! handles and the execution context its handler needs; the [`Dispatcher`]
//! reads both directly from the store when it is registered and on every
//! dispatch. Stores never call each other, they only dispatch actions.

use crate::action::Action;
use crate::dispatcher::Dispatcher;
use crate::observer::ChangeEvent;
use async_trait::async_trait;

/// Execution context a store's handler runs on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ThreadMode {
    /// Synchronously on the dispatching thread, before `dispatch` returns
    ///
    /// Exception: a dispatch issued from inside an Immediate handler to an
    /// Immediate store that is busy on another thread is run by that thread
    /// once its current invocation ends.
    #[default]
    Immediate,
    /// On the single dedicated main context
    Main,
    /// On the background worker pool
    Background,
}

/// Per-delivery context handed to [`Store::on_action`]
pub struct StoreContext<A: Action> {
    dispatcher: Dispatcher<A>,
    sequence: u64,
}

impl<A: Action> StoreContext<A> {
    pub(crate) fn new(dispatcher: Dispatcher<A>, sequence: u64) -> Self {
        Self {
            dispatcher,
            sequence,
        }
    }

    /// Dispatcher the action was delivered by
    pub fn dispatcher(&self) -> &Dispatcher<A> {
        &self.dispatcher
    }

    /// Sequence number assigned to the action when it was dispatched
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Dispatch a derived action back into the bus
    pub fn dispatch(&self, action: A) {
        self.dispatcher.dispatch(action);
    }

    /// Notify observers that this store's state changed
    pub fn emit_change(&self, event: ChangeEvent) {
        self.dispatcher.emit_change(event);
    }
}

/// A unit of state ownership reacting to actions
///
/// Handler invocations for one store are delivered in dispatch order and
/// never overlap, whatever the [`ThreadMode`]. Read accessors on concrete
/// stores may be called from any thread while a handler runs.
#[async_trait]
pub trait Store<A: Action>: Send + Sync + 'static {
    /// Name used in logs and change events
    fn name(&self) -> &'static str;

    /// Execution context the handler requires; read once per registration
    fn thread_mode(&self) -> ThreadMode;

    /// Whether this store wants to see `action`
    fn handles(&self, action: &A) -> bool;

    /// Handle one action
    ///
    /// Failures are recovered here: classify them and publish them through a
    /// derived action or [`StoreContext::emit_change`].
    async fn on_action(&self, action: &A, ctx: &StoreContext<A>);

    /// Called once after a successful registration
    fn on_register(&self) {
        log::debug!("{}: on_register", self.name());
    }
}
