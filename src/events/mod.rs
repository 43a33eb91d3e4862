use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Facts published after a ledger write has committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    StockEntryRecorded {
        entry_id: i32,
        product_id: i32,
        quantity: i32,
        user_id: i32,
    },
    StockEntryDeleted {
        entry_id: i32,
        product_id: i32,
    },
    ExitOrderCreated {
        exit_id: i32,
        ticket_number: String,
        item_count: usize,
        total_quantity: i64,
        user_id: i32,
    },
    InventoryAdjusted {
        product_id: i32,
        previous_stock: i64,
        new_stock: i64,
        reason: String,
        user_id: i32,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Publishes after a commit. A closed channel is logged, never surfaced:
    /// the ledger write it describes has already happened.
    pub async fn publish(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "event dropped");
        }
    }
}

/// Drains the channel until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::StockEntryRecorded {
                entry_id,
                product_id,
                quantity,
                user_id,
            } => info!(entry_id, product_id, quantity, user_id, "stock entry recorded"),
            Event::StockEntryDeleted {
                entry_id,
                product_id,
            } => info!(entry_id, product_id, "stock entry deleted"),
            Event::ExitOrderCreated {
                exit_id,
                ticket_number,
                item_count,
                total_quantity,
                user_id,
            } => info!(
                exit_id,
                ticket_number = %ticket_number,
                item_count,
                total_quantity,
                user_id,
                "exit order created"
            ),
            Event::InventoryAdjusted {
                product_id,
                previous_stock,
                new_stock,
                reason,
                user_id,
            } => info!(
                product_id,
                previous_stock,
                new_stock,
                reason = %reason,
                user_id,
                "inventory adjusted"
            ),
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_on_closed_channel_does_not_fail() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);

        assert!(sender
            .send(Event::StockEntryDeleted {
                entry_id: 1,
                product_id: 1
            })
            .await
            .is_err());
        sender
            .publish(Event::StockEntryDeleted {
                entry_id: 1,
                product_id: 1,
            })
            .await;
    }

    #[tokio::test]
    async fn process_events_stops_when_senders_drop() {
        let (tx, rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        sender
            .publish(Event::ExitOrderCreated {
                exit_id: 3,
                ticket_number: "INC-1".into(),
                item_count: 2,
                total_quantity: 5,
                user_id: 1,
            })
            .await;
        drop(sender);

        tokio::time::timeout(std::time::Duration::from_secs(1), process_events(rx))
            .await
            .expect("loop exits once the channel closes");
    }
}
