//! # Event Bridge
//!
//! Typed signal plumbing between the outside world and the coordinator.
//!
//! [`SignalBus`] is an explicit publish/subscribe instance: there is no
//! ambient global registration. Subscribers attach per signal kind, either as
//! callbacks ([`SignalBus::on`]) or as channel streams ([`SignalBus::watch`]),
//! and every subscription is removed symmetrically when its handle is dropped.
//!
//! [`EventBridge`] owns the inbound side: it maintains an explicit table
//! mapping each inbound signal kind to exactly one bound handler, translates
//! payloads into coordinator (or auto-lock guard) calls, and tracks every
//! registration so [`EventBridge::cleanup`] leaves no orphaned listener
//! behind.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::guard::AutoLockGuard;
use crate::session::signals::{InboundKind, InboundSignal, Signal};
use crate::session::SessionCoordinator;

enum SignalSink<S> {
    Callback(Arc<dyn Fn(&S) + Send + Sync>),
    Channel(async_channel::Sender<S>),
}

impl<S> Clone for SignalSink<S> {
    fn clone(&self) -> Self {
        match self {
            SignalSink::Callback(cb) => SignalSink::Callback(cb.clone()),
            SignalSink::Channel(tx) => SignalSink::Channel(tx.clone()),
        }
    }
}

struct SinkEntry<S> {
    id: u64,
    sink: SignalSink<S>,
}

struct BusInner<S: Signal> {
    next_id: AtomicU64,
    sinks: Mutex<HashMap<S::Kind, Vec<SinkEntry<S>>>>,
}

/// Typed publish/subscribe bus.
///
/// Cloning is cheap and shares the subscriber table; emitting never holds the
/// table lock while running handlers, so handlers may freely subscribe,
/// unsubscribe, or emit again.
pub struct SignalBus<S: Signal> {
    inner: Arc<BusInner<S>>,
}

impl<S: Signal> Clone for SignalBus<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: Signal> SignalBus<S> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                next_id: AtomicU64::new(1),
                sinks: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Register a callback for one signal kind.
    ///
    /// The returned subscription removes the callback when dropped. A handler
    /// that panics is isolated: the panic is logged and later handlers still
    /// run.
    pub fn on(
        &self,
        kind: S::Kind,
        handler: impl Fn(&S) + Send + Sync + 'static,
    ) -> BusSubscription<S> {
        self.attach(kind, SignalSink::Callback(Arc::new(handler)))
    }

    /// Subscribe to one signal kind as an unbounded channel stream.
    ///
    /// The sender side is detached automatically once the receiver is
    /// dropped.
    pub fn watch(&self, kind: S::Kind) -> async_channel::Receiver<S> {
        let (tx, rx) = async_channel::unbounded();
        self.attach(kind, SignalSink::Channel(tx));
        rx
    }

    /// Publish a signal to every subscriber of its kind, in registration
    /// order.
    pub fn emit(&self, signal: S) {
        let entries: Vec<SinkEntry<S>> = {
            let sinks = self.inner.sinks.lock();
            match sinks.get(&signal.kind()) {
                Some(list) => list
                    .iter()
                    .map(|e| SinkEntry {
                        id: e.id,
                        sink: e.sink.clone(),
                    })
                    .collect(),
                None => Vec::new(),
            }
        };

        tracing::debug!(signal = signal.name(), subscribers = entries.len(), "Signal emitted");

        let mut closed = Vec::new();
        for entry in &entries {
            match &entry.sink {
                SignalSink::Callback(callback) => {
                    if catch_unwind(AssertUnwindSafe(|| callback(&signal))).is_err() {
                        tracing::error!(signal = signal.name(), "Signal handler panicked");
                    }
                }
                SignalSink::Channel(tx) => {
                    if tx.try_send(signal.clone()).is_err() {
                        closed.push(entry.id);
                    }
                }
            }
        }

        // Channels whose receivers are gone are dropped lazily here.
        if !closed.is_empty() {
            let mut sinks = self.inner.sinks.lock();
            if let Some(list) = sinks.get_mut(&signal.kind()) {
                list.retain(|e| !closed.contains(&e.id));
            }
        }
    }

    /// Number of live subscribers for a kind.
    pub fn subscriber_count(&self, kind: S::Kind) -> usize {
        self.inner
            .sinks
            .lock()
            .get(&kind)
            .map(|l| l.len())
            .unwrap_or(0)
    }

    fn attach(&self, kind: S::Kind, sink: SignalSink<S>) -> BusSubscription<S> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .sinks
            .lock()
            .entry(kind)
            .or_default()
            .push(SinkEntry { id, sink });
        BusSubscription {
            id,
            kind,
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl<S: Signal> Default for SignalBus<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle for one bus registration. Dropping it removes the subscriber
/// immediately; no further signals are delivered after the drop returns.
pub struct BusSubscription<S: Signal> {
    id: u64,
    kind: S::Kind,
    inner: Weak<BusInner<S>>,
}

impl<S: Signal> BusSubscription<S> {
    /// Explicit, consuming unsubscribe.
    pub fn unsubscribe(self) {}
}

impl<S: Signal> Drop for BusSubscription<S> {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            let mut sinks = inner.sinks.lock();
            if let Some(list) = sinks.get_mut(&self.kind) {
                list.retain(|e| e.id != self.id);
            }
        }
    }
}

/// Translates inbound signals into coordinator calls.
///
/// One handler per inbound kind; every registration is tracked so teardown is
/// complete. Handlers never leak errors into the dispatch mechanism: each
/// coordinator operation routes its own failures through the error handler,
/// and the bridge merely observes the outcome at debug level.
pub struct EventBridge {
    registrations: Vec<BusSubscription<InboundSignal>>,
}

impl EventBridge {
    /// Bind every inbound signal kind to its coordinator operation.
    pub fn connect(
        coordinator: Arc<SessionCoordinator>,
        guard: AutoLockGuard,
        bus: &SignalBus<InboundSignal>,
    ) -> Self {
        let mut registrations = Vec::with_capacity(InboundKind::all().len());

        registrations.push(bus.on(InboundKind::Navigate, {
            let coordinator = coordinator.clone();
            move |signal| {
                if let InboundSignal::Navigate(screen) = signal {
                    let coordinator = coordinator.clone();
                    let screen = *screen;
                    tokio::spawn(async move {
                        dispatch("navigate", coordinator.set_current_screen(screen).await);
                    });
                }
            }
        }));

        registrations.push(bus.on(InboundKind::AccountSelectedRequest, {
            let coordinator = coordinator.clone();
            move |signal| {
                if let InboundSignal::AccountSelectedRequest { address } = signal {
                    let coordinator = coordinator.clone();
                    let address = address.clone();
                    tokio::spawn(async move {
                        dispatch(
                            "account-selected-request",
                            coordinator.set_selected_account(&address).await,
                        );
                    });
                }
            }
        }));

        registrations.push(bus.on(InboundKind::NetworkChangeRequest, {
            let coordinator = coordinator.clone();
            move |signal| {
                if let InboundSignal::NetworkChangeRequest { network_id } = signal {
                    let coordinator = coordinator.clone();
                    let network_id = network_id.clone();
                    tokio::spawn(async move {
                        dispatch(
                            "network-change-request",
                            coordinator.set_active_network(&network_id).await,
                        );
                    });
                }
            }
        }));

        registrations.push(bus.on(InboundKind::SignRequested, {
            let coordinator = coordinator.clone();
            move |signal| {
                if let InboundSignal::SignRequested(request) = signal {
                    let coordinator = coordinator.clone();
                    let request = request.clone();
                    tokio::spawn(async move {
                        dispatch(
                            "sign-requested",
                            coordinator.receive_signing_request(request).await,
                        );
                    });
                }
            }
        }));

        registrations.push(bus.on(InboundKind::ConnectRequested, {
            let coordinator = coordinator.clone();
            move |signal| {
                if let InboundSignal::ConnectRequested { origin } = signal {
                    let coordinator = coordinator.clone();
                    let origin = origin.clone();
                    tokio::spawn(async move {
                        dispatch(
                            "connect-requested",
                            coordinator.receive_connect_request(&origin).await,
                        );
                    });
                }
            }
        }));

        registrations.push(bus.on(InboundKind::ConnectApproved, {
            let coordinator = coordinator.clone();
            move |signal| {
                if let InboundSignal::ConnectApproved = signal {
                    let coordinator = coordinator.clone();
                    tokio::spawn(async move {
                        dispatch("connect-approved", coordinator.approve_connect().await);
                    });
                }
            }
        }));

        registrations.push(bus.on(InboundKind::ConnectCancelled, {
            let coordinator = coordinator.clone();
            move |signal| {
                if let InboundSignal::ConnectCancelled = signal {
                    let coordinator = coordinator.clone();
                    tokio::spawn(async move {
                        dispatch("connect-cancelled", coordinator.cancel_connect().await);
                    });
                }
            }
        }));

        registrations.push(bus.on(InboundKind::SignApproved, {
            let coordinator = coordinator.clone();
            move |signal| {
                if let InboundSignal::SignApproved = signal {
                    let coordinator = coordinator.clone();
                    tokio::spawn(async move {
                        dispatch(
                            "sign-approved",
                            coordinator.approve_pending_request().await.map(|_| ()),
                        );
                    });
                }
            }
        }));

        registrations.push(bus.on(InboundKind::SignRejected, {
            let coordinator = coordinator.clone();
            move |signal| {
                if let InboundSignal::SignRejected = signal {
                    let coordinator = coordinator.clone();
                    tokio::spawn(async move {
                        dispatch("sign-rejected", coordinator.reject_pending_request().await);
                    });
                }
            }
        }));

        registrations.push(bus.on(InboundKind::SettingsChangeRequest, {
            let coordinator = coordinator.clone();
            move |signal| {
                if let InboundSignal::SettingsChangeRequest(settings) = signal {
                    let coordinator = coordinator.clone();
                    let settings = settings.clone();
                    tokio::spawn(async move {
                        dispatch(
                            "settings-changed-request",
                            coordinator.update_settings(settings).await,
                        );
                    });
                }
            }
        }));

        registrations.push(bus.on(InboundKind::ResetConnectionState, {
            let coordinator = coordinator.clone();
            move |signal| {
                if let InboundSignal::ResetConnectionState = signal {
                    let coordinator = coordinator.clone();
                    tokio::spawn(async move {
                        dispatch(
                            "reset-connection-state",
                            coordinator.reset_connection_state().await,
                        );
                    });
                }
            }
        }));

        registrations.push(bus.on(InboundKind::UserActivity, {
            let guard = guard.clone();
            move |signal| {
                if let InboundSignal::UserActivity(_) = signal {
                    guard.record_activity();
                }
            }
        }));

        tracing::info!(handlers = registrations.len(), "Event bridge connected");
        Self { registrations }
    }

    /// Number of live inbound registrations.
    pub fn registration_count(&self) -> usize {
        self.registrations.len()
    }

    /// Remove every listener this bridge added. Subsequent inbound signals
    /// are ignored entirely.
    pub fn cleanup(&mut self) {
        let removed = self.registrations.len();
        self.registrations.clear();
        tracing::info!(removed, "Event bridge cleaned up");
    }
}

// Coordinator operations route their own failures through the error handler
// before returning, so the bridge only records the outcome.
fn dispatch<T>(signal: &'static str, result: crate::core::error::Result<T>) {
    if let Err(err) = result {
        tracing::debug!(signal, code = %err.code, "Inbound signal handler failed");
    }
}
