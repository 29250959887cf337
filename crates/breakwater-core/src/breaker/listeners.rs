//! State-change listener registry and dispatcher
//!
//! Transitions are published onto a bounded queue drained by one dispatcher
//! thread per breaker. Listeners never run on a caller's thread and never
//! while breaker state is locked. A listener that panics is logged and
//! reported to the panic hook; the breaker and other listeners carry on.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};

use super::config::{ListenerPanicHook, StateListener};
use super::types::StateChange;

/// Pending state changes a breaker buffers before dropping new ones
pub const LISTENER_QUEUE_CAPACITY: usize = 256;

/// Handle returned when registering a listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Entries = Arc<Mutex<Vec<(ListenerId, StateListener)>>>;

pub(crate) struct Listeners {
    name: String,
    entries: Entries,
    next_id: AtomicU64,
    panic_hook: Option<ListenerPanicHook>,
    sender: OnceCell<mpsc::Sender<StateChange>>,
}

impl Listeners {
    pub(crate) fn new(name: String, panic_hook: Option<ListenerPanicHook>) -> Self {
        Self {
            name,
            entries: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(1),
            panic_hook,
            sender: OnceCell::new(),
        }
    }

    pub(crate) fn add(&self, listener: StateListener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.lock().push((id, listener));
        self.ensure_dispatcher();
        id
    }

    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        entries.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Queue a change for delivery. Never blocks.
    pub(crate) fn publish(&self, change: StateChange) {
        let Some(sender) = self.sender.get() else {
            return;
        };

        match sender.try_send(change) {
            Ok(()) => {}
            Err(TrySendError::Full(change)) => {
                tracing::warn!(
                    circuit = %self.name,
                    from = %change.from,
                    to = %change.to,
                    "Listener queue full, dropping state change event"
                );
            }
            Err(TrySendError::Closed(change)) => {
                tracing::warn!(
                    circuit = %self.name,
                    from = %change.from,
                    to = %change.to,
                    "Listener dispatcher is gone, dropping state change event"
                );
            }
        }
    }

    fn ensure_dispatcher(&self) {
        self.sender.get_or_init(|| {
            let (tx, rx) = mpsc::channel(LISTENER_QUEUE_CAPACITY);
            let entries = Arc::clone(&self.entries);
            let hook = self.panic_hook.clone();

            let spawned = thread::Builder::new()
                .name(format!("breaker-events-{}", self.name))
                .spawn(move || dispatch(rx, entries, hook));

            if let Err(e) = spawned {
                tracing::error!(
                    circuit = %self.name,
                    error = %e,
                    "Failed to start listener dispatcher, state changes will not be delivered"
                );
            }
            tx
        });
    }
}

fn dispatch(
    mut rx: mpsc::Receiver<StateChange>,
    entries: Entries,
    hook: Option<ListenerPanicHook>,
) {
    while let Some(change) = rx.blocking_recv() {
        // Snapshot so listeners may (un)register without deadlocking
        let listeners: Vec<StateListener> = entries
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in listeners {
            deliver(&listener, &change, hook.as_ref());
        }
    }
}

fn deliver(listener: &StateListener, change: &StateChange, hook: Option<&ListenerPanicHook>) {
    let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| listener(change))) else {
        return;
    };

    let message = panic_message(&*payload);
    tracing::error!(
        circuit = %change.name,
        from = %change.from,
        to = %change.to,
        panic = %message,
        "State change listener panicked"
    );

    if let Some(hook) = hook {
        if panic::catch_unwind(AssertUnwindSafe(|| hook(change, &message))).is_err() {
            tracing::error!(circuit = %change.name, "Listener panic hook panicked");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
