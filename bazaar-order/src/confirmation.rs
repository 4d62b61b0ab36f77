use bazaar_core::{EmailMessage, NotificationQueue, Principal};
use chrono::FixedOffset;

use crate::models::Order;

/// Composes the "order placed" email and hands it to the background
/// dispatcher. Sending never blocks and never fails the caller.
#[derive(Clone)]
pub struct ConfirmationMailer {
    queue: NotificationQueue,
    sales_inbox: Option<String>,
    offset: FixedOffset,
}

impl ConfirmationMailer {
    pub fn new(queue: NotificationQueue, sales_inbox: Option<String>, offset: FixedOffset) -> Self {
        Self { queue, sales_inbox, offset }
    }

    pub fn compose(&self, order: &Order, requester: &Principal) -> EmailMessage {
        let mut to = vec![requester.email.clone()];
        if let Some(inbox) = &self.sales_inbox {
            if inbox != &requester.email {
                to.push(inbox.clone());
            }
        }

        let placed_at = order
            .created_at
            .with_timezone(&self.offset)
            .format("%Y-%m-%d %H:%M:%S");
        let brand = order
            .order_items
            .first()
            .and_then(|item| item.brand.as_deref())
            .unwrap_or("-");
        let lines: Vec<String> = order
            .order_items
            .iter()
            .map(|item| {
                format!(
                    "  - {} x{} @ {} (serial {})",
                    item.name, item.qty, item.price, item.serial_number
                )
            })
            .collect();
        let address = &order.shipping_address;

        let body = format!(
            "Hi {},\n\n\
             Your order has been successfully placed.\n\n\
             Order: {}\n\
             Order date: {}\n\
             Order total: {}\n\
             Customer ID: {}\n\
             Customer email: {}\n\
             Brand: {}\n\n\
             Items:\n{}\n\n\
             Ship to: {}, {} {}, {}\n\n\
             Thank you for choosing us!",
            requester.username,
            order.id,
            placed_at,
            order.total_price,
            requester.id,
            requester.email,
            brand,
            lines.join("\n"),
            address.address,
            address.city,
            address.postal_code,
            address.country,
        );

        EmailMessage::new(to, "New Order Confirmation", body)
    }

    pub fn send(&self, order: &Order, requester: &Principal) {
        if !self.queue.enqueue(self.compose(order, requester)) {
            tracing::warn!(order_id = %order.id, "Order confirmation was not queued");
        }
    }
}
