//! Notification sink
//!
//! The engine emits notices and moves on; delivery to customers/admins is a
//! downstream consumer's job and is best-effort by contract.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use milkway_types::{CustomerId, DeliveryEventId, SubscriptionId, VendorId};

/// Events the fulfillment engine emits for asynchronous consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FulfillmentNotice {
    /// An occurrence's date elapsed with no matching delivery event
    OccurrenceMissed {
        /// Owning subscription
        subscription_id: SubscriptionId,
        /// Subscribing customer
        customer_id: CustomerId,
        /// Fulfilling vendor
        vendor_id: VendorId,
        /// The missed delivery date
        date: NaiveDate,
    },
    /// A delivery event lost a resolution race or duplicated a resolved
    /// occurrence
    ConflictDetected {
        /// Owning subscription
        subscription_id: SubscriptionId,
        /// The conflicting event
        event_id: DeliveryEventId,
        /// Occurrence date the event contended for, when one was chosen
        date: Option<NaiveDate>,
    },
}

/// Fire-and-forget notice consumer
pub trait NotificationSink: Send + Sync {
    /// Publish a notice. Must not block the caller.
    fn publish(&self, notice: FulfillmentNotice);
}

/// Sink that forwards notices over a bounded channel
///
/// When the channel is full the notice is dropped with a warning; delivery
/// is best-effort per the notification contract.
pub struct ChannelSink {
    tx: mpsc::Sender<FulfillmentNotice>,
}

impl ChannelSink {
    /// Create a sink and the receiving half for the consumer task
    pub fn new(depth: usize) -> (Self, mpsc::Receiver<FulfillmentNotice>) {
        let (tx, rx) = mpsc::channel(depth);
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelSink {
    fn publish(&self, notice: FulfillmentNotice) {
        if let Err(err) = self.tx.try_send(notice) {
            tracing::warn!(error = %err, "notification channel full, dropping notice");
        }
    }
}

impl std::fmt::Debug for ChannelSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelSink").finish_non_exhaustive()
    }
}

/// Sink that only logs notices; useful in development and tests
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn publish(&self, notice: FulfillmentNotice) {
        tracing::info!(?notice, "fulfillment notice");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_sink_delivers() {
        let (sink, mut rx) = ChannelSink::new(4);
        let notice = FulfillmentNotice::OccurrenceMissed {
            subscription_id: SubscriptionId::new(),
            customer_id: CustomerId::new(),
            vendor_id: VendorId::new(),
            date: chrono::NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
        };
        sink.publish(notice.clone());
        assert_eq!(rx.recv().await, Some(notice));
    }

    #[test]
    fn test_channel_sink_drops_when_full() {
        let (sink, _rx) = ChannelSink::new(1);
        let notice = FulfillmentNotice::ConflictDetected {
            subscription_id: SubscriptionId::new(),
            event_id: DeliveryEventId::new(),
            date: None,
        };
        // Second publish overflows the depth-1 channel; it must not panic
        // or block.
        sink.publish(notice.clone());
        sink.publish(notice);
    }
}
