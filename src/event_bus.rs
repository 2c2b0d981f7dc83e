//! A small in-process pub/sub bus used to hand decrypted events to the host
//! application. Listeners run sequentially and in registration order so a
//! `keychange` listener can mutate the event and have the dispatcher observe
//! the mutation once `dispatch` returns.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

type BoxFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// A boxed async listener. Boxed rather than generic so `EventBus` can hold
/// a heterogeneous `Vec` of listeners per event name.
pub type Listener<T> = Box<dyn Fn(&mut T) -> BoxFuture<'static> + Send + Sync>;

/// Dispatches named events to their registered listeners, one at a time, in
/// registration order. A listener that panics or errors never reaches this
/// bus directly — callers are expected to catch and log inside the listener
/// body, matching the fault-isolation the dispatcher needs to keep draining
/// envelopes after a faulty listener.
pub struct EventBus<T> {
    listeners: Mutex<HashMap<String, Vec<Listener<T>>>>,
}

impl<T> Default for EventBus<T> {
    fn default() -> Self {
        EventBus {
            listeners: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> EventBus<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for `name`. Multiple listeners for the same name
    /// all run, in the order they were added.
    pub fn on(&self, name: impl Into<String>, listener: Listener<T>) {
        self.listeners
            .lock()
            .unwrap()
            .entry(name.into())
            .or_default()
            .push(listener);
    }

    /// Run every listener registered for `name` against `event`, sequentially.
    /// Mutations a listener makes to `event` are visible to later listeners
    /// and to the caller once this returns.
    pub async fn dispatch(&self, name: &str, event: &mut T) {
        let count = {
            let guard = self.listeners.lock().unwrap();
            guard.get(name).map(|v| v.len()).unwrap_or(0)
        };
        for i in 0..count {
            // Re-acquire the lock per-iteration so we never hold it across
            // an await point; listeners are append-only so indices stay valid.
            let fut = {
                let guard = self.listeners.lock().unwrap();
                match guard.get(name).and_then(|v| v.get(i)) {
                    Some(listener) => listener(event),
                    None => continue,
                }
            };
            fut.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn listeners_run_in_registration_order() {
        let bus: EventBus<Vec<u32>> = EventBus::new();
        bus.on(
            "evt",
            Box::new(|log: &mut Vec<u32>| {
                log.push(1);
                Box::pin(async {})
            }),
        );
        bus.on(
            "evt",
            Box::new(|log: &mut Vec<u32>| {
                log.push(2);
                Box::pin(async {})
            }),
        );

        let mut log = Vec::new();
        bus.dispatch("evt", &mut log).await;
        assert_eq!(log, vec![1, 2]);
    }

    #[tokio::test]
    async fn dispatch_on_unregistered_name_is_a_no_op() {
        let bus: EventBus<u32> = EventBus::new();
        let mut value = 0;
        bus.dispatch("nothing", &mut value).await;
        assert_eq!(value, 0);
    }

    #[tokio::test]
    async fn listener_mutation_is_visible_after_dispatch_returns() {
        let bus: EventBus<bool> = EventBus::new();
        bus.on(
            "keychange",
            Box::new(|accepted: &mut bool| {
                *accepted = true;
                Box::pin(async {})
            }),
        );
        let mut accepted = false;
        bus.dispatch("keychange", &mut accepted).await;
        assert!(accepted);
    }

    #[tokio::test]
    async fn multiple_listeners_can_count_invocations() {
        let bus: EventBus<()> = EventBus::new();
        let counter = Arc::new(AtomicU32::new(0));
        for _ in 0..3 {
            let c = counter.clone();
            bus.on(
                "tick",
                Box::new(move |_: &mut ()| {
                    let c = c.clone();
                    Box::pin(async move {
                        c.fetch_add(1, Ordering::SeqCst);
                    })
                }),
            );
        }
        bus.dispatch("tick", &mut ()).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }
}
