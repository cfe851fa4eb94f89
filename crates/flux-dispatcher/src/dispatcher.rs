//! Dispatcher - the central action bus
//!
//! Stores register with a dispatcher handle owned by the composition root.
//! Every dispatched action is offered to each registered store that handles
//! it, on the execution context the store declared:
//!
//! - Immediate stores run on the caller's thread before `dispatch` returns.
//!   A per-store slot serializes callers; a dispatch issued from inside the
//!   store's own handler is queued and drained by the running invocation.
//! - Main and Background stores each own a serial lane task, so their
//!   deliveries stay FIFO and never overlap.
//!
//! Registration liveness is re-checked after a delivery obtains its store's
//! execution slot, so nothing reaches a store after `unregister` returns.
//! The slot belongs to the store instance rather than to one registration:
//! re-registering a store whose old invocation is still running makes new
//! deliveries wait for it.

use crate::action::Action;
use crate::executor::{block_on_current, Executor};
use crate::observer::{ChangeEvent, ChangeObserver, ObserverId};
use crate::store::{Store, StoreContext, ThreadMode};
use flux_config::FluxConfig;
use futures::FutureExt;
use std::cell::Cell;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::thread::{self, ThreadId};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

type ObserverList = Arc<RwLock<Vec<(ObserverId, Arc<dyn ChangeObserver>)>>>;

/// Handle to the action bus
///
/// Cloning is cheap; all clones share the same registry and execution
/// contexts. The contexts shut down when the last handle is dropped.
pub struct Dispatcher<A: Action> {
    inner: Arc<Inner<A>>,
}

struct Inner<A: Action> {
    executor: Executor,
    registrations: RwLock<Vec<Arc<Registration<A>>>>,
    slots: Mutex<HashMap<usize, Weak<StoreSlot<A>>>>,
    observers: ObserverList,
    change_tx: UnboundedSender<ChangeEvent>,
    sequence: AtomicU64,
    next_observer_id: AtomicU64,
}

struct Registration<A: Action> {
    store: Arc<dyn Store<A>>,
    live: Arc<AtomicBool>,
    slot: Arc<StoreSlot<A>>,
    route: Route<A>,
}

enum Route<A: Action> {
    Immediate,
    Lane(UnboundedSender<Delivery<A>>),
}

struct Delivery<A> {
    action: A,
    sequence: u64,
}

/// Execution slot shared by every registration of one store instance
struct StoreSlot<A> {
    /// Held by a lane across each invocation
    gate: tokio::sync::Mutex<()>,
    immediate: Mutex<ImmediateState<A>>,
    idle: Condvar,
}

struct ImmediateState<A> {
    running_on: Option<ThreadId>,
    queued: VecDeque<Queued<A>>,
}

/// Delivery handed to the thread currently running the store
struct Queued<A> {
    delivery: Delivery<A>,
    live: Arc<AtomicBool>,
}

impl<A> Default for StoreSlot<A> {
    fn default() -> Self {
        Self {
            gate: tokio::sync::Mutex::new(()),
            immediate: Mutex::new(ImmediateState {
                running_on: None,
                queued: VecDeque::new(),
            }),
            idle: Condvar::new(),
        }
    }
}

thread_local! {
    /// Number of Immediate handlers running on this thread
    static IMMEDIATE_DEPTH: Cell<usize> = const { Cell::new(0) };
}

struct ImmediateScope;

impl ImmediateScope {
    fn enter() -> Self {
        IMMEDIATE_DEPTH.with(|depth| depth.set(depth.get() + 1));
        Self
    }

    fn is_active() -> bool {
        IMMEDIATE_DEPTH.with(|depth| depth.get() > 0)
    }
}

impl Drop for ImmediateScope {
    fn drop(&mut self) {
        IMMEDIATE_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn same_store<A: Action>(a: &Arc<dyn Store<A>>, b: &Arc<dyn Store<A>>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

fn store_key<A: Action>(store: &Arc<dyn Store<A>>) -> usize {
    Arc::as_ptr(store) as *const () as usize
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl<A: Action> Dispatcher<A> {
    /// Create a dispatcher with `background_workers` pool threads
    pub fn new(background_workers: usize) -> io::Result<Self> {
        let executor = Executor::new(background_workers)?;
        let observers: ObserverList = Arc::new(RwLock::new(Vec::new()));
        let (change_tx, change_rx) = mpsc::unbounded_channel();

        executor.spawn(
            ThreadMode::Main,
            run_observers(Arc::clone(&observers), change_rx),
        );

        Ok(Self {
            inner: Arc::new(Inner {
                executor,
                registrations: RwLock::new(Vec::new()),
                slots: Mutex::new(HashMap::new()),
                observers,
                change_tx,
                sequence: AtomicU64::new(0),
                next_observer_id: AtomicU64::new(0),
            }),
        })
    }

    /// Create a dispatcher sized from the application config
    pub fn with_config(config: &FluxConfig) -> io::Result<Self> {
        Self::new(config.worker_count())
    }

    /// Add a store to the routing table
    ///
    /// Returns `false` (and changes nothing) when this store instance is
    /// already registered.
    pub fn register(&self, store: Arc<dyn Store<A>>) -> bool {
        let mut registrations = self
            .inner
            .registrations
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if registrations
            .iter()
            .any(|registration| same_store(&registration.store, &store))
        {
            log::debug!("Dispatcher: {} already registered", store.name());
            return false;
        }

        let live = Arc::new(AtomicBool::new(true));
        let slot = self.slot_for(&store);
        let mode = store.thread_mode();
        let route = match mode {
            ThreadMode::Immediate => Route::Immediate,
            ThreadMode::Main | ThreadMode::Background => {
                let (tx, rx) = mpsc::unbounded_channel();
                self.inner.executor.spawn(
                    mode,
                    run_lane(
                        Arc::clone(&store),
                        Arc::clone(&live),
                        Arc::clone(&slot),
                        Arc::downgrade(&self.inner),
                        rx,
                    ),
                );
                Route::Lane(tx)
            }
        };

        registrations.push(Arc::new(Registration {
            store: Arc::clone(&store),
            live,
            slot,
            route,
        }));
        drop(registrations);

        log::debug!("Dispatcher: registered {} ({:?})", store.name(), mode);
        store.on_register();
        true
    }

    /// Execution slot of `store`, shared with any earlier registration of
    /// the same instance that is still running or queued
    fn slot_for(&self, store: &Arc<dyn Store<A>>) -> Arc<StoreSlot<A>> {
        let mut slots = lock(&self.inner.slots);
        slots.retain(|_, slot| slot.strong_count() > 0);

        let key = store_key(store);
        if let Some(slot) = slots.get(&key).and_then(Weak::upgrade) {
            log::debug!("Dispatcher: {} reuses its execution slot", store.name());
            return slot;
        }
        let slot = Arc::new(StoreSlot::default());
        slots.insert(key, Arc::downgrade(&slot));
        slot
    }

    /// Remove a store from the routing table
    ///
    /// Deliveries still queued for the store are skipped. An invocation that
    /// already started is allowed to finish.
    pub fn unregister(&self, store: &Arc<dyn Store<A>>) -> bool {
        let mut registrations = self
            .inner
            .registrations
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let Some(position) = registrations
            .iter()
            .position(|registration| same_store(&registration.store, store))
        else {
            return false;
        };

        let registration = registrations.remove(position);
        registration.live.store(false, Ordering::Release);
        log::debug!("Dispatcher: unregistered {}", store.name());
        true
    }

    pub fn is_registered(&self, store: &Arc<dyn Store<A>>) -> bool {
        self.inner
            .registrations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|registration| same_store(&registration.store, store))
    }

    pub fn registered_count(&self) -> usize {
        self.inner
            .registrations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Sequence number of the most recently dispatched action
    pub fn sequence(&self) -> u64 {
        self.inner.sequence.load(Ordering::SeqCst)
    }

    /// Deliver `action` to every registered store that handles it
    ///
    /// Returns once all Immediate handlers have run; Main and Background
    /// handlers are only queued. Called from inside an Immediate handler,
    /// a delivery to an Immediate store busy on another thread is handed to
    /// that thread instead. Handler failures never reach the caller.
    pub fn dispatch(&self, action: A) {
        let sequence = self.inner.sequence.fetch_add(1, Ordering::SeqCst) + 1;

        let snapshot: Vec<Arc<Registration<A>>> = self
            .inner
            .registrations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let targets: Vec<_> = snapshot
            .into_iter()
            .filter(|registration| registration.store.handles(&action))
            .collect();

        if targets.is_empty() {
            log::trace!(
                "Dispatcher: no store handles {}::{}",
                action.namespace(),
                action.type_name()
            );
            return;
        }

        log::debug!(
            "Dispatcher: #{} {}::{} -> {} store(s)",
            sequence,
            action.namespace(),
            action.type_name(),
            targets.len()
        );

        // Queue lanes first so derived actions from Immediate handlers
        // cannot overtake this action on any lane.
        for registration in &targets {
            if let Route::Lane(tx) = &registration.route {
                let delivery = Delivery {
                    action: action.clone(),
                    sequence,
                };
                if tx.send(delivery).is_err() {
                    log::error!(
                        "Dispatcher: lane for {} is closed",
                        registration.store.name()
                    );
                }
            }
        }

        for registration in &targets {
            if let Route::Immediate = registration.route {
                let delivery = Delivery {
                    action: action.clone(),
                    sequence,
                };
                self.deliver_immediate(registration, delivery);
            }
        }
    }

    fn deliver_immediate(&self, registration: &Registration<A>, delivery: Delivery<A>) {
        let slot = &registration.slot;
        let me = thread::current().id();
        let mut state = lock(&slot.immediate);

        // Queue instead of waiting when the store is busy and this thread is
        // itself inside an Immediate handler: either the same store re-enters,
        // or waiting could close a cycle with the thread running the store.
        if state.running_on == Some(me)
            || (state.running_on.is_some() && ImmediateScope::is_active())
        {
            state.queued.push_back(Queued {
                delivery,
                live: Arc::clone(&registration.live),
            });
            return;
        }

        while state.running_on.is_some() {
            state = slot
                .idle
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.running_on = Some(me);
        drop(state);

        let mut next = Some(Queued {
            delivery,
            live: Arc::clone(&registration.live),
        });
        while let Some(queued) = next.take() {
            if queued.live.load(Ordering::Acquire) {
                self.run_immediate(registration.store.as_ref(), queued.delivery);
            } else {
                log::debug!(
                    "Dispatcher: skipping delivery to unregistered {}",
                    registration.store.name()
                );
            }

            let mut state = lock(&slot.immediate);
            next = state.queued.pop_front();
            if next.is_none() {
                state.running_on = None;
                slot.idle.notify_all();
            }
        }
    }

    fn run_immediate(&self, store: &dyn Store<A>, delivery: Delivery<A>) {
        let _runtime = self.inner.executor.enter();
        let _scope = ImmediateScope::enter();
        let ctx = StoreContext::new(self.clone(), delivery.sequence);

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            block_on_current(store.on_action(&delivery.action, &ctx))
        }));

        if let Err(payload) = result {
            log::error!(
                "Dispatcher: {} panicked handling {}::{}: {}",
                store.name(),
                delivery.action.namespace(),
                delivery.action.type_name(),
                panic_message(payload.as_ref())
            );
        }
    }

    /// Subscribe to change events; delivered on the main context
    pub fn add_observer(&self, observer: Arc<dyn ChangeObserver>) -> ObserverId {
        let id = ObserverId(self.inner.next_observer_id.fetch_add(1, Ordering::Relaxed));
        self.inner
            .observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, observer));
        id
    }

    pub fn remove_observer(&self, id: ObserverId) -> bool {
        let mut observers = self
            .inner
            .observers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = observers.len();
        observers.retain(|(observer_id, _)| *observer_id != id);
        observers.len() != before
    }

    /// Publish a store's change notification to observers
    pub fn emit_change(&self, event: ChangeEvent) {
        if let Err(e) = self.inner.change_tx.send(event) {
            log::error!("Dispatcher: failed to emit change: {}", e);
        }
    }

    /// Whether the calling thread is the main context
    pub fn is_main_thread(&self) -> bool {
        self.inner.executor.is_main_thread()
    }
}

impl<A: Action> Clone for Dispatcher<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: Action> fmt::Debug for Dispatcher<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registered", &self.registered_count())
            .field("sequence", &self.sequence())
            .finish()
    }
}

/// Serial delivery loop for one Main or Background store
async fn run_lane<A: Action>(
    store: Arc<dyn Store<A>>,
    live: Arc<AtomicBool>,
    slot: Arc<StoreSlot<A>>,
    inner: Weak<Inner<A>>,
    mut rx: UnboundedReceiver<Delivery<A>>,
) {
    while let Some(delivery) = rx.recv().await {
        let _turn = slot.gate.lock().await;
        if !live.load(Ordering::Acquire) {
            log::debug!(
                "Dispatcher: skipping delivery to unregistered {}",
                store.name()
            );
            continue;
        }
        let Some(inner) = inner.upgrade() else {
            break;
        };

        let ctx = StoreContext::new(Dispatcher { inner }, delivery.sequence);
        let result = AssertUnwindSafe(store.on_action(&delivery.action, &ctx))
            .catch_unwind()
            .await;

        if let Err(payload) = result {
            log::error!(
                "Dispatcher: {} panicked handling {}::{}: {}",
                store.name(),
                delivery.action.namespace(),
                delivery.action.type_name(),
                panic_message(payload.as_ref())
            );
        }
    }

    log::debug!("Dispatcher: lane for {} stopped", store.name());
}

async fn run_observers(observers: ObserverList, mut rx: UnboundedReceiver<ChangeEvent>) {
    while let Some(event) = rx.recv().await {
        let snapshot: Vec<_> = observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();

        for observer in snapshot {
            let result = panic::catch_unwind(AssertUnwindSafe(|| observer.on_change(&event)));
            if let Err(payload) = result {
                log::error!(
                    "Dispatcher: observer panicked on change from {}: {}",
                    event.store,
                    panic_message(payload.as_ref())
                );
            }
        }
    }
}
