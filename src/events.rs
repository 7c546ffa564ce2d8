use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

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

    /// Fire-and-forget send used after a transaction has committed. A full
    /// queue or closed consumer must not fail the already-committed request.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Event delivery failed: {}", e);
        }
    }
}

// Domain events emitted after their transaction commits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    StockMovementRecorded {
        movement_id: Uuid,
        product_id: Uuid,
        quantity: Decimal,
        quantity_after: Decimal,
    },
    LowStock {
        product_id: Uuid,
        stock: Decimal,
        min_stock: Decimal,
    },

    PurchaseOrderCreated(Uuid),
    PurchaseOrderSubmitted(Uuid),
    PurchaseOrderApproved(Uuid),
    PurchaseOrderReceived {
        purchase_order_id: Uuid,
        fully_received: bool,
    },
    PurchaseOrderCancelled(Uuid),

    StockOpnameCreated(Uuid),
    StockOpnameCompleted {
        opname_id: Uuid,
        adjusted_products: usize,
    },
    StockOpnameCancelled(Uuid),

    SaleCreated {
        sale_id: Uuid,
        invoice_number: String,
        total_amount: Decimal,
    },
}

/// Consumes the event queue. Handlers here are intentionally thin; the
/// events exist so downstream consumers (notifications, reporting) can be
/// attached without touching the services that emit them.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::LowStock {
                product_id,
                stock,
                min_stock,
            } => {
                warn!(
                    "Low stock: product={} stock={} min_stock={}",
                    product_id, stock, min_stock
                );
            }
            other => {
                info!("Received event: {:?}", other);
            }
        }
    }

    info!("Event processing loop stopped");
}
