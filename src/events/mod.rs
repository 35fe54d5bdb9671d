use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Domain events emitted by the services after state changes commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Account events
    UserRegistered(Uuid),
    UserLoggedIn(Uuid),
    UserDeleted(Uuid),

    // Catalog events
    CakeCreated(Uuid),
    CakeUpdated(Uuid),
    CakeDeleted(Uuid),
    ImageStored(Uuid),

    // Cart events
    CartItemAdded { cart_id: Uuid, cake_id: Uuid },
    CartItemUpdated { cart_id: Uuid, cake_id: Uuid },
    CartItemRemoved { cart_id: Uuid, cake_id: Uuid },
    CartCleared(Uuid),

    // Coupon events
    CouponCreated(Uuid),
    CouponRedeemed { coupon_id: Uuid, user_id: Uuid, order_id: Uuid },

    // Order events
    OrderPlaced { order_id: Uuid, user_id: Uuid },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event; failure to enqueue is logged but never fails the
    /// request that produced the event.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event.clone()).await {
            warn!("Event dropped: {:?} ({})", event, e);
        }
    }
}

/// Drains the event channel. Events currently only feed the structured log;
/// a real dispatcher (email, webhooks) would hang off this loop.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderPlaced { order_id, user_id } => {
                info!(%order_id, %user_id, "order placed");
            }
            Event::CouponRedeemed {
                coupon_id,
                user_id,
                order_id,
            } => {
                info!(%coupon_id, %user_id, %order_id, "coupon redeemed");
            }
            other => info!("Received event: {:?}", other),
        }
    }

    error!("Event channel closed; processing loop exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_event() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);

        sender.send(Event::UserRegistered(Uuid::new_v4())).await.unwrap();
        assert!(matches!(rx.recv().await, Some(Event::UserRegistered(_))));
    }

    #[tokio::test]
    async fn send_or_log_swallows_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);

        // Must not panic or error out.
        sender.send_or_log(Event::CartCleared(Uuid::new_v4())).await;
    }
}
