//! Stateless pub-sub for engine events
//!
//! Components subscribe to engine events and react to them without any access to engine state; a handler receives
//! only the event itself. Handlers are async and each event is handled on its own task.
use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use tokio::{sync::mpsc, task::JoinSet};

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct EventHandler<E: Send + Sync + 'static> {
    receiver: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size);
        Self { receiver, sender, handler }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.sender.clone())
    }

    /// Runs until every producer has been dropped, then waits for in-flight handlers to finish.
    pub async fn start_handler(self) {
        let Self { mut receiver, sender, handler } = self;
        debug!("📬️ Starting event handler");
        // Only subscribers keep the channel open from here on
        drop(sender);
        let mut jobs = JoinSet::new();
        while let Some(ev) = receiver.recv().await {
            trace!("📬️ Handling event");
            let handler = Arc::clone(&handler);
            jobs.spawn(async move { (handler)(ev).await });
            // reap finished jobs so the set doesn't grow without bound
            while jobs.try_join_next().is_some() {}
        }
        debug!("📬️ All producers dropped. Waiting for {} handler(s) to complete", jobs.len());
        while let Some(result) = jobs.join_next().await {
            if let Err(e) = result {
                warn!("📬️ An event handler task failed: {e}");
            }
        }
        debug!("📬️ Event handler has shut down");
    }
}

#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    pub fn new(sender: mpsc::Sender<E>) -> Self {
        Self { sender }
    }

    pub async fn publish_event(&self, event: E) {
        if let Err(e) = self.sender.send(event).await {
            error!("📬️ Failed to publish event: {e}");
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;

    #[tokio::test]
    async fn every_event_is_handled_before_shutdown() {
        let _ = env_logger::try_init();
        let total = Arc::new(AtomicU64::new(0));
        let t2 = total.clone();
        let handler: Handler<u64> = Arc::new(move |v| {
            let total = total.clone();
            Box::pin(async move {
                tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
                total.fetch_add(v, Ordering::SeqCst);
            })
        });
        let event_handler = EventHandler::new(1, handler);
        let evens = event_handler.subscribe();
        let odds = event_handler.subscribe();
        tokio::spawn(async move {
            for v in (0..10).step_by(2) {
                evens.publish_event(v).await;
            }
        });
        tokio::spawn(async move {
            for v in (1..10).step_by(2) {
                odds.publish_event(v).await;
            }
        });
        event_handler.start_handler().await;
        assert_eq!(t2.load(Ordering::SeqCst), 45);
    }
}
