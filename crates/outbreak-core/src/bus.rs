//! In-process publish/subscribe for simulation events.
//!
//! Producers call [`EventBus::log`], which enqueues the event and returns
//! immediately. A single delivery thread, started with [`EventBus::start`],
//! drains the queue and invokes every subscriber in subscription order,
//! one at a time. Events logged from one context are delivered in log
//! order. A panicking subscriber is isolated: the panic is logged and the
//! remaining subscribers still see the event.
//!
//! The delivery thread is detached. A drain that times out leaves it
//! finishing the backlog in the background; nothing waits on it, so a
//! stuck subscriber cannot hold up the caller or runtime shutdown.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use outbreak_types::Event;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// A registered event callback.
pub type Subscriber = Box<dyn FnMut(&Event) + Send>;

/// Errors raised by the event bus lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// [`EventBus::start`] was called twice.
    #[error("event bus delivery already started")]
    AlreadyStarted,

    /// Subscribers did not finish the queued events in time.
    #[error("event bus did not drain within {timeout_ms} ms")]
    DrainTimeout {
        /// The drain budget that was exceeded.
        timeout_ms: u128,
    },

    /// The delivery thread could not be spawned.
    #[error("failed to spawn event bus delivery thread: {source}")]
    Spawn {
        /// The underlying OS error.
        #[from]
        source: std::io::Error,
    },

    /// The delivery thread exited without signalling completion.
    #[error("event bus delivery thread exited before draining")]
    DeliveryLost,
}

/// Event queue plus the subscribers it fans out to.
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
    registered: AtomicUsize,
    sender: Option<mpsc::UnboundedSender<Event>>,
    receiver: Option<mpsc::UnboundedReceiver<Event>>,
    drained: Option<oneshot::Receiver<u64>>,
}

impl core::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .field("open", &self.sender.is_some())
            .field("started", &self.drained.is_some())
            .finish()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Create an idle bus. Events logged before [`start`](Self::start) are
    /// queued, not lost.
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            subscribers: Arc::new(Mutex::new(Vec::new())),
            registered: AtomicUsize::new(0),
            sender: Some(sender),
            receiver: Some(receiver),
            drained: None,
        }
    }

    /// Register a subscriber for the lifetime of the bus.
    ///
    /// Safe to call while delivery is running, including from another
    /// subscriber. A subscriber added mid-event starts with the next event.
    pub fn subscribe<F>(&self, subscriber: F)
    where
        F: FnMut(&Event) + Send + 'static,
    {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(subscriber));
        self.registered.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.registered.load(Ordering::Relaxed)
    }

    /// Enqueue an event for delivery. Never blocks.
    ///
    /// Events logged after [`close`](Self::close) are dropped.
    pub fn log(&self, event: Event) {
        let Some(sender) = &self.sender else {
            debug!(event = event.type_name(), "event logged on a closed bus");
            return;
        };
        if sender.send(event).is_err() {
            warn!("event bus delivery thread is gone; event dropped");
        }
    }

    /// Spawn the detached delivery thread.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::AlreadyStarted`] on a second call, or
    /// [`BusError::Spawn`] if the thread cannot be created.
    pub fn start(&mut self) -> Result<(), BusError> {
        let receiver = self.receiver.take().ok_or(BusError::AlreadyStarted)?;
        let subscribers = Arc::clone(&self.subscribers);
        let (done, drained) = oneshot::channel();
        thread::Builder::new()
            .name("event-bus".into())
            .spawn(move || {
                let delivered = deliver(receiver, &subscribers);
                // The closer may have given up waiting.
                let _ = done.send(delivered);
            })?;
        self.drained = Some(drained);
        Ok(())
    }

    /// Stop accepting events and wait for the queued ones to be delivered.
    ///
    /// On timeout the delivery thread keeps running until the backlog is
    /// done; it is not joined.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::DrainTimeout`] if delivery does not finish within
    /// `timeout`, or [`BusError::DeliveryLost`] if the thread died.
    pub async fn close(&mut self, timeout: Duration) -> Result<(), BusError> {
        self.sender = None;
        self.receiver = None;
        let Some(drained) = self.drained.take() else {
            return Ok(());
        };
        match tokio::time::timeout(timeout, drained).await {
            Ok(Ok(_delivered)) => Ok(()),
            Ok(Err(_closed)) => Err(BusError::DeliveryLost),
            Err(_elapsed) => Err(BusError::DrainTimeout {
                timeout_ms: timeout.as_millis(),
            }),
        }
    }
}

/// Drain `receiver` until every sender is gone. The subscriber list is
/// taken out of the mutex for each event so callbacks run unlocked.
fn deliver(
    mut receiver: mpsc::UnboundedReceiver<Event>,
    subscribers: &Mutex<Vec<Subscriber>>,
) -> u64 {
    let mut delivered: u64 = 0;
    while let Some(event) = receiver.blocking_recv() {
        let mut active =
            std::mem::take(&mut *subscribers.lock().unwrap_or_else(PoisonError::into_inner));
        for (index, subscriber) in active.iter_mut().enumerate() {
            if panic::catch_unwind(AssertUnwindSafe(|| subscriber(&event))).is_err() {
                warn!(
                    subscriber = index,
                    event = event.type_name(),
                    "subscriber panicked, continuing with the next one"
                );
            }
        }
        let mut guard = subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        let added = std::mem::replace(&mut *guard, active);
        guard.extend(added);
        delivered = delivered.saturating_add(1);
    }
    debug!(delivered, "event bus drained");
    delivered
}
