//! Domain event publishing over NATS.
//!
//! Publishing happens after commit and is best-effort: a broker failure is logged and never
//! undoes or fails the operation that raised the event.

use tracing::{debug, warn};

use crate::domain::events::DomainEvent;

#[derive(Clone, Default)]
pub struct EventPublisher {
    nats: Option<async_nats::Client>,
}

impl EventPublisher {
    pub fn new(nats: async_nats::Client) -> Self {
        Self { nats: Some(nats) }
    }

    /// Publisher that only logs events.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub async fn publish(&self, events: Vec<DomainEvent>) {
        for event in events {
            let subject = event.subject();
            let Some(client) = &self.nats else {
                debug!(%subject, "event not published: no broker configured");
                continue;
            };
            let payload = match serde_json::to_vec(&event) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(%subject, error = %e, "failed to encode event");
                    continue;
                }
            };
            if let Err(e) = client.publish(subject.clone(), payload.into()).await {
                warn!(%subject, error = %e, "failed to publish event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::OrderEvent;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_disabled_publisher_swallows_events() {
        let publisher = EventPublisher::disabled();
        publisher.publish(vec![DomainEvent::Order(OrderEvent::Cancelled { order_id: Uuid::now_v7() })]).await;
    }
}
