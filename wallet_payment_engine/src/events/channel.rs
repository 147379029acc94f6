//! Fire-and-forget event channel.
//!
//! One [`EventHandler`] owns the receiving end of an mpsc channel and a single hook closure; any number of
//! [`EventProducer`]s feed it from the ledger flows. Delivery is strictly one-way: a handler sees the event payload
//! and nothing else, and a slow or panicking hook can never stall or roll back the database transaction that
//! produced the event. Hooks may be async; each event is handled on its own spawned task.
use std::{
    future::Future,
    pin::Pin,
    sync::{atomic::AtomicI64, Arc},
};

use log::*;
use tokio::sync::mpsc;

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct EventHandler<E: Send + Sync + 'static> {
    inbox: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    hook: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(buffer_size: usize, hook: Handler<E>) -> Self {
        let (sender, inbox) = mpsc::channel(buffer_size);
        Self { inbox, sender, hook }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.sender.clone())
    }

    /// Consumes the handler and processes events until every producer has been dropped.
    pub async fn start_handler(mut self) {
        debug!("📬️ Starting event handler");
        // Once the internal sender is gone, the channel closes when the last producer drops, and the loop ends.
        drop(self.sender);
        let in_flight = Arc::new(AtomicI64::new(0));
        while let Some(event) = self.inbox.recv().await {
            trace!("📬️ Handling event");
            let hook = Arc::clone(&self.hook);
            in_flight.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let counter = in_flight.clone();
            tokio::spawn(async move {
                (hook)(event).await;
                counter.fetch_sub(1, std::sync::atomic::Ordering::Relaxed);
                trace!("📬️ Event handled");
            });
        }
        // Channel closed; give spawned hooks a chance to drain before reporting shutdown.
        match tokio::spawn(async move {
            while in_flight.load(std::sync::atomic::Ordering::SeqCst) > 0 {
                debug!("📬️ Waiting for in-flight hooks to finish");
                tokio::time::sleep(tokio::time::Duration::from_millis(1000)).await;
            }
        })
        .await
        {
            Ok(_) => debug!("📬️ Event handler shutting down gracefully"),
            Err(e) => warn!("📬️ Event handler shutdown process failed: {e}"),
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
            error!("📬️ Failed to send event: {e}");
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicI64 as Tally, Ordering};

    use super::*;

    #[tokio::test]
    async fn every_published_amount_reaches_the_hook() {
        let _ = env_logger::try_init();
        let tally = Arc::new(Tally::new(0));
        let seen = tally.clone();
        let hook = Arc::new(move |amount: i64| {
            let tally = tally.clone();
            Box::pin(async move {
                debug!("Hook credited {amount}");
                tally.fetch_add(amount, Ordering::SeqCst);
                tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
        // Buffer of one, so producers contend for channel capacity as well.
        let handler = EventHandler::new(1, hook);
        let webhook_side = handler.subscribe();
        let verify_side = handler.subscribe();
        tokio::spawn(async move {
            for amount in [100, 250, 400] {
                webhook_side.publish_event(amount).await;
            }
        });
        tokio::spawn(async move {
            for amount in [50, 75, 125] {
                verify_side.publish_event(amount).await;
            }
        });

        handler.start_handler().await;
        assert_eq!(seen.load(Ordering::SeqCst), 1000);
    }
}
